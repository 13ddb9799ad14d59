use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::error::RecordError;
use crate::models::{Book, Member};

/// Books file used when nothing else is configured, relative to the working
/// directory.
pub const DEFAULT_BOOKS_FILE: &str = "books.txt";
/// Members file used when nothing else is configured.
pub const DEFAULT_MEMBERS_FILE: &str = "members.txt";

/// The pair of files a library lives in. Handles are only held for the
/// duration of a single load or save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatFileStore {
    books_path: PathBuf,
    members_path: PathBuf,
}

impl Default for FlatFileStore {
    fn default() -> Self {
        Self::new(DEFAULT_BOOKS_FILE, DEFAULT_MEMBERS_FILE)
    }
}

impl FlatFileStore {
    pub fn new(books_path: impl Into<PathBuf>, members_path: impl Into<PathBuf>) -> Self {
        Self {
            books_path: books_path.into(),
            members_path: members_path.into(),
        }
    }

    /// Both files with their default names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join(DEFAULT_BOOKS_FILE), dir.join(DEFAULT_MEMBERS_FILE))
    }

    pub fn books_path(&self) -> &Path {
        &self.books_path
    }

    pub fn members_path(&self) -> &Path {
        &self.members_path
    }

    pub fn load_books(&self) -> Result<Loaded<Book>> {
        super::load_books(&self.books_path)
    }

    pub fn load_members(&self) -> Result<Loaded<Member>> {
        super::load_members(&self.members_path)
    }

    pub fn save_books<'a>(&self, books: impl IntoIterator<Item = &'a Book>) -> Result<()> {
        super::save_books(&self.books_path, books)
    }

    pub fn save_members<'a>(&self, members: impl IntoIterator<Item = &'a Member>) -> Result<()> {
        super::save_members(&self.members_path, members)
    }
}

/// A stored line that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number within the file.
    pub line_number: usize,
    pub error: RecordError,
}

/// Result of reading one file: everything that decoded plus what was dropped.
/// `interrupted` is set when reading stopped partway through; `records` then
/// holds what came before the failure.
#[derive(Debug)]
pub struct Loaded<T> {
    pub records: Vec<T>,
    pub skipped: Vec<SkippedLine>,
    pub interrupted: Option<anyhow::Error>,
}

impl<T> Default for Loaded<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            skipped: Vec::new(),
            interrupted: None,
        }
    }
}

impl<T> Loaded<T> {
    /// True when every line of the file was looked at.
    pub fn is_complete(&self) -> bool {
        self.interrupted.is_none()
    }
}

/// Read `path` line by line, decoding each non-blank line with `decode`.
/// A missing file is an empty collection; malformed lines, including ones
/// that are not valid UTF-8, are skipped.
pub(crate) fn read_records<T>(
    path: &Path,
    kind: &str,
    decode: impl Fn(&str) -> Result<T, RecordError>,
) -> Result<Loaded<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), kind, "no stored file yet");
            return Ok(Loaded::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to open {}", path.display()));
        }
    };

    let mut loaded = Loaded::default();
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut line_number = 0usize;
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                warn!(path = %path.display(), line = line_number + 1, error = %err, "reading stopped early");
                loaded.interrupted = Some(
                    anyhow::Error::new(err)
                        .context(format!("failed to read {} past line {line_number}", path.display())),
                );
                break;
            }
        }
        line_number += 1;

        let decoded = match std::str::from_utf8(strip_line_ending(&buf)) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => decode(line),
            Err(_) => Err(RecordError::InvalidEncoding),
        };
        match decoded {
            Ok(record) => loaded.records.push(record),
            Err(error) => {
                debug!(path = %path.display(), line = line_number, %error, "skipping malformed {kind} line");
                loaded.skipped.push(SkippedLine { line_number, error });
            }
        }
    }

    info!(
        path = %path.display(),
        loaded = loaded.records.len(),
        skipped = loaded.skipped.len(),
        complete = loaded.is_complete(),
        "loaded {kind} file"
    );
    Ok(loaded)
}

/// Drop a trailing `\n` or `\r\n`.
fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Overwrite `path` with one line per record, creating parent directories
/// when needed.
pub(crate) fn write_records(path: &Path, lines: impl IntoIterator<Item = String>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let mut count = 0usize;
    for line in lines {
        writeln!(writer, "{line}").with_context(|| format!("failed to write {}", path.display()))?;
        count += 1;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;

    debug!(path = %path.display(), records = count, "saved file");
    Ok(())
}

/// Split on commas keeping trailing empty fields (`"a,b,"` has three parts).
pub(crate) fn split_fields(line: &str) -> Vec<&str> {
    line.split(',').collect()
}

/// Parse an id field the way stored rows write them: plain digits, no sign or
/// padding.
pub(crate) fn parse_id(field: &'static str, value: &str) -> Result<u32, RecordError> {
    value.parse::<u32>().map_err(|_| RecordError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn split_keeps_trailing_empty_fields() {
        assert_eq!(split_fields("201,Ada,ada@example.com,"), vec!["201", "Ada", "ada@example.com", ""]);
        assert_eq!(split_fields(""), vec![""]);
    }

    #[test]
    fn parse_id_rejects_signs_and_text() {
        assert_eq!(parse_id("id", "101"), Ok(101));
        assert!(parse_id("id", "-5").is_err());
        assert!(parse_id("id", " 101").is_err());
        assert!(parse_id("id", "abc").is_err());
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let loaded = read_records(&dir.path().join("absent.txt"), "book", |line| {
            Ok(line.to_string())
        })
        .unwrap();
        assert!(loaded.records.is_empty());
        assert!(loaded.skipped.is_empty());
    }

    #[test]
    fn write_creates_parent_directories_and_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("data.txt");
        write_records(&path, vec!["one".to_string(), "two".to_string()]).unwrap();
        write_records(&path, vec!["three".to_string()]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "three\n");
    }

    #[test]
    fn blank_lines_are_ignored_and_bad_lines_counted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.txt");
        fs::write(&path, "1\n\n   \nx\n3\n").unwrap();
        let loaded = read_records(&path, "number", |line| parse_id("id", line)).unwrap();
        assert_eq!(loaded.records, vec![1, 3]);
        assert_eq!(loaded.skipped.len(), 1);
        assert_eq!(loaded.skipped[0].line_number, 4);
    }

    #[test]
    fn invalid_utf8_line_is_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.txt");
        fs::write(&path, b"1\r\n2\xe9\n3\n").unwrap();
        let loaded = read_records(&path, "number", |line| parse_id("id", line)).unwrap();
        assert_eq!(loaded.records, vec![1, 3]);
        assert_eq!(loaded.skipped.len(), 1);
        assert_eq!(loaded.skipped[0].line_number, 2);
        assert_eq!(loaded.skipped[0].error, RecordError::InvalidEncoding);
        assert!(loaded.is_complete());
    }

    #[test]
    fn line_endings_are_stripped() {
        assert_eq!(strip_line_ending(b"a,b\r\n"), b"a,b");
        assert_eq!(strip_line_ending(b"a,b\n"), b"a,b");
        assert_eq!(strip_line_ending(b"a,b"), b"a,b");
    }

    #[test]
    fn default_store_uses_working_directory_names() {
        let store = FlatFileStore::default();
        assert_eq!(store.books_path(), Path::new("books.txt"));
        assert_eq!(store.members_path(), Path::new("members.txt"));
        let store = FlatFileStore::in_dir("/srv/library");
        assert_eq!(store.members_path(), Path::new("/srv/library/members.txt"));
    }
}
