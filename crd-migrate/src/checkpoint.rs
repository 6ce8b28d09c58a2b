use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use anyhow::Context;

use crate::PathExt;

pub const DOCUMENT_SEPARATOR: &str = "---";

/// Local log of every record submitted during a run, one YAML document each.
///
/// Only written to. A later run truncates it and relies on the destination cluster, not on this
/// file, to find what was already migrated.
#[derive(Debug)]
pub struct Checkpoint<W = BufWriter<File>> {
    out: W,
    documents: usize,
}

impl Checkpoint {
    /// Creates the file at `path`, truncating anything left by a previous run.
    pub fn create(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("creating checkpoint file {}", path.pretty()))?;
        Ok(Checkpoint::from_writer(BufWriter::new(file)))
    }
}

impl<W: Write> Checkpoint<W> {
    pub fn from_writer(out: W) -> Self {
        Checkpoint { out, documents: 0 }
    }

    /// Appends one serialized document followed by a separator line.
    ///
    /// Flushed immediately so an aborted run leaves only whole documents behind.
    pub fn append(&mut self, document: &str) -> io::Result<()> {
        self.out.write_all(document.as_bytes())?;
        if !document.ends_with('\n') {
            self.out.write_all(b"\n")?;
        }
        writeln!(self.out, "{DOCUMENT_SEPARATOR}")?;
        self.out.flush()?;
        self.documents += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.documents
    }

    pub fn is_empty(&self) -> bool {
        self.documents == 0
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
