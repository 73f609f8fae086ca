use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Writer, WriterBuilder};

use super::error::Error;
use super::store::temp_path;

const HEADER: [&str; 2] = ["reactant_smiles", "product_smiles"];

/// Append-only `reactant_smiles,product_smiles` trail of written examples.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    writer: Writer<File>,
}

impl AuditLog {
    /// Opens the log for appending, keeping only its first `keep` data rows.
    ///
    /// Rows past `keep` belong to examples that were never committed and
    /// are discarded. `keep == 0` starts a fresh file. Kept rows are written
    /// to a sibling temporary file that replaces the log once synced.
    pub fn open(path: &Path, keep: usize) -> Result<Self, Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let kept = if keep > 0 {
            read_rows(path, keep)?
        } else {
            Vec::new()
        };

        let tmp = temp_path(path);
        let mut fresh = WriterBuilder::new()
            .from_path(&tmp)
            .map_err(|e| Error::csv(&tmp, e))?;
        fresh.write_record(HEADER).map_err(|e| Error::csv(&tmp, e))?;
        for row in &kept {
            fresh.write_record(row).map_err(|e| Error::csv(&tmp, e))?;
        }
        let file = fresh
            .into_inner()
            .map_err(|e| Error::io(&tmp, e.into_error()))?;
        file.sync_all().map_err(|e| Error::io(&tmp, e))?;
        drop(file);
        fs::rename(&tmp, path).map_err(|e| Error::io(path, e))?;

        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| Error::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: WriterBuilder::new().has_headers(false).from_writer(file),
        })
    }

    pub fn append(&mut self, reactant: &str, product: &str) -> Result<(), Error> {
        self.writer
            .write_record([reactant, product])
            .map_err(|e| Error::csv(&self.path, e))
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.writer.flush().map_err(|e| Error::io(&self.path, e))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_rows(path: &Path, limit: usize) -> Result<Vec<StringRecord>, Error> {
    let mut reader = match ReaderBuilder::new().has_headers(true).from_path(path) {
        Ok(r) => r,
        Err(e) if is_not_found(&e) => return Ok(Vec::new()),
        Err(e) => return Err(Error::csv(path, e)),
    };
    reader
        .records()
        .take(limit)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Error::csv(path, e))
}

fn is_not_found(e: &csv::Error) -> bool {
    matches!(e.kind(), csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound)
}

/// Number of data rows in an audit file; 0 when it does not exist.
pub fn count_rows(path: &Path) -> Result<usize, Error> {
    read_rows(path, usize::MAX).map(|rows| rows.len())
}
