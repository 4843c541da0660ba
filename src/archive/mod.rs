// src/archive/mod.rs
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

use crate::error::{IngestError, Result};

pub mod naming;

pub use naming::path_to_csvnum;

/// A zip archive holding exactly one CSV file.
pub struct SingleEntryArchive {
    path: PathBuf,
    entry_name: String,
    archive: ZipArchive<BufReader<File>>,
}

impl SingleEntryArchive {
    #[tracing::instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let format_err = |detail: String| IngestError::ArchiveFormat {
            path: path.clone(),
            detail,
        };

        let file = File::open(&path).map_err(|e| format_err(format!("cannot open: {e}")))?;
        let mut archive = ZipArchive::new(BufReader::new(file))
            .map_err(|e| format_err(format!("not a readable zip archive: {e}")))?;

        if archive.len() != 1 {
            return Err(format_err(format!(
                "expected exactly one file, found {}",
                archive.len()
            )));
        }
        let entry_name = archive
            .by_index(0)
            .map_err(|e| format_err(format!("cannot read entry: {e}")))?
            .name()
            .to_string();
        debug!(entry = %entry_name, "opened archive");

        Ok(Self {
            path,
            entry_name,
            archive,
        })
    }

    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    /// Sequential reader over the single entry's decompressed bytes.
    pub fn entry(&mut self) -> Result<impl Read + '_> {
        let path = self.path.clone();
        self.archive
            .by_index(0)
            .map_err(|e| IngestError::ArchiveFormat {
                path,
                detail: format!("cannot read entry: {e}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;
    use zip::CompressionMethod;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, body) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn exposes_the_single_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trip_data_1.csv.zip");
        write_zip(&path, &[("trip_data_1.csv", "a,b\n1,2\n")]);

        let mut archive = SingleEntryArchive::open(&path).unwrap();
        assert_eq!(archive.entry_name(), "trip_data_1.csv");

        let mut body = String::new();
        archive.entry().unwrap().read_to_string(&mut body).unwrap();
        assert_eq!(body, "a,b\n1,2\n");
    }

    #[test]
    fn rejects_archives_without_exactly_one_entry() {
        let dir = tempdir().unwrap();

        let two = dir.path().join("two.zip");
        write_zip(&two, &[("a.csv", "x\n"), ("b.csv", "y\n")]);
        let err = SingleEntryArchive::open(&two).err().unwrap();
        assert!(matches!(err, IngestError::ArchiveFormat { .. }), "{err}");
        assert!(err.to_string().contains("found 2"));

        let empty = dir.path().join("empty.zip");
        write_zip(&empty, &[]);
        let err = SingleEntryArchive::open(&empty).err().unwrap();
        assert!(err.to_string().contains("found 0"));
    }

    #[test]
    fn rejects_non_zip_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trip_data_1.csv.zip");
        std::fs::write(&path, "medallion,hack_license\n").unwrap();
        let err = SingleEntryArchive::open(&path).err().unwrap();
        assert!(matches!(err, IngestError::ArchiveFormat { .. }));
    }
}
