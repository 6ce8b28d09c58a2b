use std::{io::Write, path::Path};

use anyhow::{Context, bail};
use compact_str::CompactString;
use serde::{Deserialize, de::DeserializeOwned};

use self::{checkpoint::Checkpoint, mapping::MappingSpec};

pub mod checkpoint;
pub mod cluster;
pub mod config;
pub mod mapping;
pub mod migrate;
pub mod path;

pub type Str = CompactString;

/// A dynamically shaped resource, as returned by the API server or built by a [`MappingSpec`].
pub type Record = serde_json::Value;

pub type Object = serde_json::Map<String, Record>;

pub trait PathExt {
    /// Displays the path relative to the working directory where possible.
    fn pretty(&self) -> String;
}

impl PathExt for Path {
    fn pretty(&self) -> String {
        std::env::current_dir()
            .ok()
            .and_then(|cwd| self.strip_prefix(cwd).ok())
            .unwrap_or(self)
            .display()
            .to_string()
    }
}

pub fn load_yaml<T>(path: impl AsRef<Path>) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();
    if !path.exists() {
        bail!("path does not exist: {}", path.pretty());
    }

    let file = std::fs::File::open(path)?;
    Ok(serde_yaml::from_reader(file)?)
}

/// Reads every record from a YAML stream.
///
/// Documents may be single resources or `*List` wrappers (as printed by `kubectl get -o yaml`),
/// whose `items` are expanded in place. Empty documents are ignored.
pub fn parse_records(input: &str) -> anyhow::Result<Vec<Record>> {
    let mut records = Vec::new();
    for (i, document) in serde_yaml::Deserializer::from_str(input).enumerate() {
        let record =
            Record::deserialize(document).with_context(|| format!("parsing YAML document {i}"))?;

        match record {
            Record::Null => {}
            Record::Object(mut obj) => {
                let is_list = obj
                    .get("kind")
                    .and_then(Record::as_str)
                    .is_some_and(|kind| kind.ends_with("List"));

                match obj.remove("items") {
                    Some(Record::Array(items)) if is_list => records.extend(items),
                    Some(items) => {
                        obj.insert("items".into(), items);
                        records.push(Record::Object(obj));
                    }
                    None => records.push(Record::Object(obj)),
                }
            }
            other => bail!(
                "expected YAML document {i} to be a mapping but found {}",
                path::describe(&other)
            ),
        }
    }

    Ok(records)
}

/// Maps every record of a YAML stream without touching a cluster, writing the results in
/// checkpoint format. Returns the number of records written.
pub fn transform(mapping: &MappingSpec, input: &str, out: impl Write) -> anyhow::Result<usize> {
    let mut checkpoint = Checkpoint::from_writer(out);
    for record in parse_records(input)? {
        let name = migrate::record_name(&record);
        let name = name.as_deref().unwrap_or("<unnamed>");
        let target = mapping
            .apply(&record)
            .with_context(|| format!("mapping record `{name}`"))?;
        let document = serde_yaml::to_string(&target)
            .with_context(|| format!("serializing record `{name}`"))?;
        checkpoint.append(&document)?;
    }

    Ok(checkpoint.len())
}
