use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::AtlasError;
use crate::record::{HEADER, Record, is_header_line, passes_geo_filter};

/// The canonical metadata table: one durable TSV, append-or-heal only. The
/// file doubles as the progress checkpoint, so writes either append or
/// publish a complete replacement.
#[derive(Debug, Clone)]
pub struct Table {
    path: Utf8PathBuf,
}

impl Table {
    pub fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn filtered_path(&self) -> Utf8PathBuf {
        let name = self.path.file_name().unwrap_or("output.tsv");
        match self.path.parent() {
            Some(parent) => parent.join(format!("filtered_{name}")),
            None => Utf8PathBuf::from(format!("filtered_{name}")),
        }
    }

    pub fn has_content(&self) -> bool {
        fs::metadata(self.path.as_std_path())
            .map(|meta| meta.len() > 0)
            .unwrap_or(false)
    }

    // Writes the fixed header only when the table is absent or empty.
    pub fn ensure_header(&self) -> Result<(), AtlasError> {
        if self.has_content() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_str().is_empty() {
                fs::create_dir_all(parent.as_std_path())
                    .map_err(|err| AtlasError::TableIo(format!("{}: {err}", self.path)))?;
            }
        }
        fs::write(self.path.as_std_path(), format!("{HEADER}\n"))
            .map_err(|err| AtlasError::TableIo(format!("{}: {err}", self.path)))
    }

    pub fn processed_accessions(&self) -> Result<HashSet<String>, AtlasError> {
        if !self.has_content() {
            return Ok(HashSet::new());
        }
        read_key_column(&self.path)
            .map_err(|err| AtlasError::TableIo(format!("{}: {err}", self.path)))
    }

    /// Appends newly assembled records; prior rows are never rewritten. A
    /// key already present in `existing` (or earlier in the batch) means the
    /// upstream resolver was bypassed, which is a bug, not data.
    pub fn append_records(
        &self,
        records: &[Record],
        existing: &HashSet<String>,
    ) -> Result<usize, AtlasError> {
        self.ensure_header()?;
        let mut batch_keys = HashSet::new();
        for record in records {
            if existing.contains(&record.accession) || !batch_keys.insert(record.accession.clone())
            {
                return Err(AtlasError::DuplicateAccession(record.accession.clone()));
            }
        }

        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(self.path.as_std_path())
            .map_err(|err| AtlasError::TableIo(format!("{}: {err}", self.path)))?;
        for record in records {
            writeln!(file, "{}", record.to_line())
                .map_err(|err| AtlasError::TableIo(format!("{}: {err}", self.path)))?;
        }
        Ok(records.len())
    }

    pub fn read_lines(&self) -> Result<Vec<String>, AtlasError> {
        let content = fs::read_to_string(self.path.as_std_path())
            .map_err(|err| AtlasError::TableIo(format!("{}: {err}", self.path)))?;
        Ok(content.lines().map(str::to_string).collect())
    }

    /// Publishes a full replacement. Readers observe either the old table or
    /// the new one, never a prefix.
    pub fn replace_contents(&self, lines: &[String]) -> Result<(), AtlasError> {
        write_atomic(&self.path, lines)
    }

    /// Regenerates the filtered view from scratch, in canonical order.
    /// Returns the number of qualifying rows.
    pub fn rebuild_filtered(&self) -> Result<usize, AtlasError> {
        let mut output = vec![HEADER.to_string()];
        let mut kept = 0usize;

        if self.has_content() {
            let mut first = true;
            for line in self.read_lines()? {
                if line.trim().is_empty() {
                    continue;
                }
                if first {
                    first = false;
                    if is_header_line(&line) {
                        continue;
                    }
                }
                let parts: Vec<&str> = line.split('\t').collect();
                if passes_geo_filter(&parts) {
                    output.push(line);
                    kept += 1;
                }
            }
        }

        write_atomic(&self.filtered_path(), &output)?;
        Ok(kept)
    }
}

/// First column of every data line in a table-shaped file.
pub fn read_key_column(path: &Utf8Path) -> io::Result<HashSet<String>> {
    let content = fs::read_to_string(path.as_std_path())?;
    let mut keys = HashSet::new();
    let mut first = true;
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if first {
            first = false;
            if is_header_line(line) {
                continue;
            }
        }
        let key = line.split('\t').next().unwrap_or("").trim();
        if !key.is_empty() {
            keys.insert(key.to_string());
        }
    }
    Ok(keys)
}

fn write_atomic(path: &Utf8Path, lines: &[String]) -> Result<(), AtlasError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
        _ => Utf8PathBuf::from("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| AtlasError::TableIo(format!("{path}: {err}")))?;

    let mut temp = tempfile::Builder::new()
        .prefix(".asm-atlas")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| AtlasError::TableIo(format!("{path}: {err}")))?;
    for line in lines {
        writeln!(temp, "{line}").map_err(|err| AtlasError::TableIo(format!("{path}: {err}")))?;
    }
    if path.as_std_path().exists() {
        fs::remove_file(path.as_std_path())
            .map_err(|err| AtlasError::TableIo(format!("{path}: {err}")))?;
    }
    temp.persist(path.as_std_path())
        .map_err(|err| AtlasError::TableIo(format!("{path}: {err}")))?;
    Ok(())
}
