use std::path::Path;

use anyhow::Context;
use crd_migrate::mapping::MappingSpec;

datatest_stable::harness! {
    { test = test, root = "tests/crd-migrate/testdata", pattern = r".*/mapping.yaml" },
}

// Each case directory holds a `mapping.yaml`, a `source.yaml` stream of records, and either an
// `expected.yaml` with the mapped documents or an `expected.stderr` with a fragment of the error.
fn test(path: &Path) -> datatest_stable::Result<()> {
    let dir = path.parent().unwrap();
    let input = std::fs::read_to_string(dir.join("source.yaml")).context("reading source")?;
    let mut out = Vec::new();

    let result = crd_migrate::load_yaml::<MappingSpec>(path)
        .and_then(|mapping| crd_migrate::transform(&mapping, &input, &mut out));

    match result {
        Ok(_) => {
            let actual = String::from_utf8(out)?;
            snapshot(&dir.join("expected.yaml"), &actual)?;
        }
        Err(err) => {
            let expected_path = dir.join("expected.stderr");
            let actual = format!("{err:#}");
            if !expected_path.exists() {
                return Err(format!("unexpected error for {}: {actual}", dir.display()).into());
            }

            let expected = std::fs::read_to_string(&expected_path)?;
            if !actual.contains(expected.trim()) {
                return Err(format!(
                    "error for {} does not mention `{}`:\n{actual}",
                    dir.display(),
                    expected.trim()
                )
                .into());
            }
        }
    }

    Ok(())
}

// Documents are compared as values so formatting differences in the YAML emitter do not matter.
fn snapshot(path: &Path, actual: &str) -> datatest_stable::Result<()> {
    if !path.exists() || std::env::var("UPDATE_SNAPSHOTS").is_ok() {
        std::fs::write(path, actual).context("writing snapshot")?;
        return Ok(());
    }

    let expected = std::fs::read_to_string(path).context("reading snapshot")?;
    if documents(&expected)? == documents(actual)? {
        return Ok(());
    }

    let chunks = dissimilar::diff(&expected, actual);
    eprintln!(
        "Snapshot mismatch for {}:\n{}",
        path.display(),
        format_chunks(chunks)
    );

    Err(format!("Snapshot mismatch for {}", path.display()).into())
}

fn documents(s: &str) -> anyhow::Result<Vec<serde_json::Value>> {
    s.split("---\n")
        .map(str::trim)
        .filter(|doc| !doc.is_empty())
        .map(|doc| serde_yaml::from_str(doc).with_context(|| format!("parsing YAML document\n{doc}")))
        .collect()
}

fn format_chunks(chunks: Vec<dissimilar::Chunk<'_>>) -> String {
    let mut buf = String::new();
    for chunk in chunks {
        let formatted = match chunk {
            dissimilar::Chunk::Equal(text) => text.into(),
            dissimilar::Chunk::Delete(text) => format!("\x1b[4m\x1b[31m{}\x1b[0m", text),
            dissimilar::Chunk::Insert(text) => format!("\x1b[4m\x1b[32m{}\x1b[0m", text),
        };
        buf.push_str(&formatted);
    }
    buf
}
