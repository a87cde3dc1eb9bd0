//! ZIP extraction into a request-scoped scratch directory
//!
//! Every upload is unpacked into its own directory under the configured
//! scratch root. The directory is owned by [`ScratchArea`] and removed when
//! that value is dropped, so success, parse failures and storage failures
//! all release it.

use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, warn};
use zip::{result::ZipError, ZipArchive};

/// Suffix that identifies the payload file inside an upload.
pub const CSV_SUFFIX: &str = ".csv";

const SCRATCH_PREFIX: &str = "prices-upload-";

/// Errors raised while unpacking an upload
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Archive is corrupt: {0}")]
    Corrupt(#[from] ZipError),

    #[error("Archive entry '{entry}' is unreadable: {source}")]
    CorruptEntry {
        entry: String,
        #[source]
        source: io::Error,
    },

    #[error("Archive entry '{0}' escapes the extraction directory")]
    UnsafeEntry(String),

    #[error("No .csv file found in archive")]
    CsvNotFound,

    #[error("Failed to prepare scratch directory: {0}")]
    Scratch(#[source] io::Error),

    #[error("Failed to extract '{entry}': {source}")]
    Extraction {
        entry: String,
        #[source]
        source: io::Error,
    },
}

impl ArchiveError {
    /// Whether the failure was caused by the uploaded bytes rather than
    /// the local filesystem.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ArchiveError::Corrupt(_)
                | ArchiveError::CorruptEntry { .. }
                | ArchiveError::UnsafeEntry(_)
                | ArchiveError::CsvNotFound
        )
    }
}

/// Extracted contents of one upload
#[derive(Debug)]
pub struct ScratchArea {
    dir: TempDir,
}

impl ScratchArea {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// First `.csv` file in sorted listing order.
    ///
    /// Files in a directory are considered before its subdirectories.
    pub fn locate_csv(&self) -> Result<PathBuf, ArchiveError> {
        find_first_csv(self.path())?.ok_or(ArchiveError::CsvNotFound)
    }

    /// Remove the directory now, logging instead of failing if that is
    /// not possible.
    pub fn release(self) {
        let path = self.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!(path = %path.display(), error = %e, "Failed to remove scratch directory");
        }
    }
}

/// Unpack `archive` into a fresh directory below `scratch_root`.
pub fn extract(archive: &[u8], scratch_root: &Path) -> Result<ScratchArea, ArchiveError> {
    fs::create_dir_all(scratch_root).map_err(ArchiveError::Scratch)?;
    let dir = tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempdir_in(scratch_root)
        .map_err(ArchiveError::Scratch)?;

    let mut zip = ZipArchive::new(Cursor::new(archive))?;
    debug!(entries = zip.len(), scratch = %dir.path().display(), "Extracting archive");

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let name = entry.name().to_string();

        let relative = entry
            .enclosed_name()
            .ok_or_else(|| ArchiveError::UnsafeEntry(name.clone()))?;
        let destination = dir.path().join(&relative);
        if !destination.starts_with(dir.path()) {
            return Err(ArchiveError::UnsafeEntry(name));
        }

        let extraction_error = |source: io::Error| ArchiveError::Extraction {
            entry: name.clone(),
            source,
        };

        if entry.is_dir() {
            fs::create_dir_all(&destination).map_err(extraction_error)?;
            continue;
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(extraction_error)?;
        }
        let mut file = fs::File::create(&destination).map_err(extraction_error)?;
        let written = copy_entry(&mut entry, &mut file, &name)?;
        debug!(entry = %name, bytes = written, "Extracted entry");
    }

    Ok(ScratchArea { dir })
}

/// Remembers whether a read failed, so a failed copy can be blamed on the
/// archive or on the scratch filesystem.
struct EntryReader<R> {
    inner: R,
    failed: bool,
}

impl<R: Read> Read for EntryReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let result = self.inner.read(buf);
        if let Err(e) = &result {
            self.failed = e.kind() != io::ErrorKind::Interrupted;
        }
        result
    }
}

fn copy_entry<R: Read, W: Write>(
    reader: R,
    writer: &mut W,
    name: &str,
) -> Result<u64, ArchiveError> {
    let mut reader = EntryReader {
        inner: reader,
        failed: false,
    };
    let written = io::copy(&mut reader, writer).map_err(|source| {
        if reader.failed {
            ArchiveError::CorruptEntry {
                entry: name.to_string(),
                source,
            }
        } else {
            ArchiveError::Extraction {
                entry: name.to_string(),
                source,
            }
        }
    })?;
    writer.flush().map_err(|source| ArchiveError::Extraction {
        entry: name.to_string(),
        source,
    })?;
    Ok(written)
}

fn find_first_csv(dir: &Path) -> Result<Option<PathBuf>, ArchiveError> {
    let listing_error = |source: io::Error| ArchiveError::Extraction {
        entry: dir.display().to_string(),
        source,
    };

    let mut entries = fs::read_dir(dir)
        .map_err(listing_error)?
        .collect::<io::Result<Vec<_>>>()
        .map_err(listing_error)?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut subdirs = Vec::new();
    for entry in entries {
        let file_type = entry.file_type().map_err(listing_error)?;
        if file_type.is_dir() {
            subdirs.push(entry.path());
        } else if file_type.is_file() && entry.file_name().to_string_lossy().ends_with(CSV_SUFFIX)
        {
            return Ok(Some(entry.path()));
        }
    }

    for subdir in subdirs {
        if let Some(found) = find_first_csv(&subdir)? {
            return Ok(Some(found));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            if name.ends_with('/') {
                writer
                    .add_directory(name.trim_end_matches('/'), SimpleFileOptions::default())
                    .unwrap();
            } else {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_extract_recreates_structure() {
        let root = tempfile::tempdir().unwrap();
        let archive = build_zip(&[
            ("readme.txt", "hello"),
            ("nested/", ""),
            ("nested/deeper/data.csv", "a,b\n"),
        ]);

        let scratch = extract(&archive, root.path()).unwrap();
        assert!(scratch.path().starts_with(root.path()));
        assert!(scratch.path().join("readme.txt").is_file());
        assert!(scratch.path().join("nested/deeper/data.csv").is_file());
    }

    #[test]
    fn test_locate_prefers_sorted_top_level_files() {
        let root = tempfile::tempdir().unwrap();
        let archive = build_zip(&[
            ("a_dir/first.csv", "x\n"),
            ("zeta.csv", "z\n"),
            ("beta.csv", "b\n"),
            ("alpha.txt", "not csv"),
        ]);

        let scratch = extract(&archive, root.path()).unwrap();
        let found = scratch.locate_csv().unwrap();
        assert_eq!(found.file_name().unwrap(), "beta.csv");
    }

    #[test]
    fn test_locate_descends_into_directories() {
        let root = tempfile::tempdir().unwrap();
        let archive = build_zip(&[("export/prices.csv", "x\n"), ("notes.md", "")]);

        let scratch = extract(&archive, root.path()).unwrap();
        let found = scratch.locate_csv().unwrap();
        assert!(found.ends_with("export/prices.csv"));
    }

    #[test]
    fn test_locate_without_csv() {
        let root = tempfile::tempdir().unwrap();
        let archive = build_zip(&[("data.txt", "1,2,3")]);

        let scratch = extract(&archive, root.path()).unwrap();
        assert!(matches!(scratch.locate_csv(), Err(ArchiveError::CsvNotFound)));
    }

    #[test]
    fn test_corrupt_archive() {
        let root = tempfile::tempdir().unwrap();
        let err = extract(b"definitely not a zip file", root.path()).unwrap_err();
        assert!(matches!(err, ArchiveError::Corrupt(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_rejects_parent_directory_entries() {
        let root = tempfile::tempdir().unwrap();
        let archive = build_zip(&[("../escape.csv", "x\n")]);

        let err = extract(&archive, root.path()).unwrap_err();
        assert!(matches!(err, ArchiveError::UnsafeEntry(ref name) if name == "../escape.csv"));
        assert!(!root.path().join("escape.csv").exists());
    }

    #[test]
    fn test_scratch_removed_on_drop_and_release() {
        let root = tempfile::tempdir().unwrap();
        let archive = build_zip(&[("data.csv", "x\n")]);

        let dropped = extract(&archive, root.path()).unwrap();
        let dropped_path = dropped.path().to_path_buf();
        drop(dropped);
        assert!(!dropped_path.exists());

        let released = extract(&archive, root.path()).unwrap();
        let released_path = released.path().to_path_buf();
        released.release();
        assert!(!released_path.exists());
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::InvalidData, "bad crc"))
        }
    }

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_copy_entry_attributes_failures() {
        let mut sink = Vec::new();
        let err = copy_entry(Broken, &mut sink, "data.csv").unwrap_err();
        assert!(matches!(err, ArchiveError::CorruptEntry { ref entry, .. } if entry == "data.csv"));
        assert!(err.is_client_error());

        let err = copy_entry(&b"a,b\n"[..], &mut Broken, "data.csv").unwrap_err();
        assert!(matches!(err, ArchiveError::Extraction { .. }));
        assert!(!err.is_client_error());

        let written = copy_entry(&b"a,b\n"[..], &mut sink, "data.csv").unwrap();
        assert_eq!(written, 4);
        assert_eq!(sink, b"a,b\n");
    }

    #[test]
    fn test_scratch_removed_after_failed_extraction() {
        let root = tempfile::tempdir().unwrap();
        let archive = build_zip(&[("ok.csv", "x\n"), ("../bad.csv", "y\n")]);

        assert!(extract(&archive, root.path()).is_err());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
