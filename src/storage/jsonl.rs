//! JSONL (JSON Lines) storage.
//!
//! Each line is a valid JSON object representing one record.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::StorageError;

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// JSONL file writer.
pub struct JsonlWriter<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    /// Create a new JSONL writer for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the parent directory exists.
    fn ensure_dir(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Sibling temp file, unique per process and per write.
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        name.push(format!(".{}.{}.tmp", std::process::id(), seq));
        self.path.with_file_name(name)
    }

    /// Replace the whole file with `records`.
    ///
    /// The records are written to a sibling temp file, synced, then renamed
    /// over the target, so readers see either the old or the new contents.
    /// The parent directory is synced after the rename so the new entry
    /// survives a crash. On any error the temp file is removed and the
    /// target is left as it was.
    pub fn write_all(&self, records: &[T]) -> Result<usize, StorageError> {
        self.ensure_dir()?;

        let temp_path = self.temp_path();
        let count = match self.write_temp(&temp_path, records) {
            Ok(count) => count,
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            warn!("Failed to replace {:?}: {}", self.path, e);
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        self.sync_parent()?;
        debug!("Wrote {} records to {:?}", count, self.path);

        Ok(count)
    }

    #[cfg(unix)]
    fn sync_parent(&self) -> Result<(), StorageError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        File::open(parent)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_parent(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn write_temp(&self, temp_path: &Path, records: &[T]) -> Result<usize, StorageError> {
        let file = File::create(temp_path)?;
        let mut writer = BufWriter::new(file);
        let mut count = 0;

        for record in records {
            let json = serde_json::to_string(record)?;
            writeln!(writer, "{}", json)?;
            count += 1;
        }

        writer.flush()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        Ok(count)
    }
}

/// JSONL file reader.
pub struct JsonlReader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    /// Create a new JSONL reader for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Check if the file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read all records, skipping lines that fail to parse.
    ///
    /// A missing file reads as empty.
    pub fn read_all(&self) -> Result<Vec<T>, StorageError> {
        self.read_lines(false)
    }

    /// Read all records, failing on the first line that does not parse.
    pub fn read_all_strict(&self) -> Result<Vec<T>, StorageError> {
        self.read_lines(true)
    }

    fn read_lines(&self, strict: bool) -> Result<Vec<T>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line_num = idx + 1;
            let line = line?;

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) if strict => {
                    return Err(StorageError::Corrupt {
                        path: self.path.clone(),
                        line: line_num,
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(
                        "Failed to parse line {} in {:?}: {}",
                        line_num, self.path, e
                    );
                }
            }
        }

        debug!("Read {} records from {:?}", records.len(), self.path);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestRecord {
        id: String,
        value: u32,
    }

    fn record(id: &str, value: u32) -> TestRecord {
        TestRecord {
            id: id.to_string(),
            value,
        }
    }

    #[test]
    fn test_jsonl_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.jsonl");

        let records = vec![record("1", 100), record("2", 200)];

        let writer: JsonlWriter<TestRecord> = JsonlWriter::new(path.clone());
        assert_eq!(writer.write_all(&records).unwrap(), 2);

        let reader: JsonlReader<TestRecord> = JsonlReader::new(path);
        assert_eq!(reader.read_all().unwrap(), records);
    }

    #[test]
    fn test_write_all_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("dir").join("x.jsonl");

        let writer: JsonlWriter<TestRecord> = JsonlWriter::new(path.clone());
        writer.write_all(&[record("1", 1)]).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_write_all_overwrites_and_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("overwrite.jsonl");

        let writer: JsonlWriter<TestRecord> = JsonlWriter::new(path.clone());
        let reader: JsonlReader<TestRecord> = JsonlReader::new(path.clone());

        writer.write_all(&[record("old", 1)]).unwrap();
        writer
            .write_all(&[record("new1", 2), record("new2", 3)])
            .unwrap();

        let read = reader.read_all().unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].id, "new1");

        assert!(temp_files(temp_dir.path()).is_empty());
    }

    fn temp_files(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect()
    }

    #[test]
    fn test_write_all_failed_rename_removes_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("target.jsonl");

        // A non-empty directory cannot be replaced by a file.
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();

        let writer: JsonlWriter<TestRecord> = JsonlWriter::new(path.clone());
        assert!(writer.write_all(&[record("1", 1)]).is_err());

        assert!(temp_files(temp_dir.path()).is_empty());
        assert!(path.is_dir());
        assert_eq!(fs::read_to_string(path.join("keep")).unwrap(), "x");
    }

    #[test]
    fn test_temp_paths_are_unique() {
        let temp_dir = TempDir::new().unwrap();
        let writer: JsonlWriter<TestRecord> = JsonlWriter::new(temp_dir.path().join("a.jsonl"));

        let first = writer.temp_path();
        let second = writer.temp_path();
        assert_ne!(first, second);
        assert_eq!(first.parent(), second.parent());
    }

    #[test]
    fn test_write_all_empty_truncates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.jsonl");

        let writer: JsonlWriter<TestRecord> = JsonlWriter::new(path.clone());
        writer.write_all(&[record("1", 1)]).unwrap();
        writer.write_all(&[]).unwrap();

        let reader: JsonlReader<TestRecord> = JsonlReader::new(path);
        assert!(reader.exists());
        assert!(reader.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_jsonl_read_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nonexistent.jsonl");

        let reader: JsonlReader<TestRecord> = JsonlReader::new(path);
        assert!(!reader.exists());
        assert!(reader.read_all().unwrap().is_empty());
        assert!(reader.read_all_strict().unwrap().is_empty());
    }

    #[test]
    fn test_read_all_skips_bad_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad_lines.jsonl");

        fs::write(
            &path,
            r#"{"id":"1","value":1}
not-valid-json

{"id":"2","value":2}
"#,
        )
        .unwrap();

        let reader: JsonlReader<TestRecord> = JsonlReader::new(path);
        let records = reader.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, "2");
    }

    #[test]
    fn test_read_all_strict_reports_bad_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("strict.jsonl");

        fs::write(&path, "{\"id\":\"1\",\"value\":1}\nnot-valid-json\n").unwrap();

        let reader: JsonlReader<TestRecord> = JsonlReader::new(path);
        match reader.read_all_strict() {
            Err(StorageError::Corrupt { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected corrupt error, got {:?}", other),
        }
    }
}
