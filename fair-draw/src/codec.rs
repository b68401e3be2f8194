//! Reading and writing rosters as a two-column delimited text table.
//!
//! ```text
//! Name;Counter
//! Alice;0
//! Bob;2
//! ```
//!
//! On read the header line is discarded and the delimiter (`;` or `,`) is
//! detected from it. On write the output is always UTF-8 with a byte-order mark,
//! semicolon separated, with CRLF line endings, so spreadsheet tools open it
//! without an import dialog.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{LoadError, SaveError};
use crate::roster::{Entry, Roster, SENTINEL_NAMES};

const BOM: &str = "\u{feff}";
const HEADER: &str = "Name;Counter";
const LINE_END: &str = "\r\n";

/// Parses a roster from raw file contents.
///
/// Rows with an empty or sentinel name are dropped and counters that are missing
/// or malformed become 0. Fails only when no row survives.
pub fn parse(raw: &[u8]) -> Result<Roster, LoadError> {
    let text = String::from_utf8_lossy(raw);
    let text = text.strip_prefix(BOM).unwrap_or(&text);

    let mut lines = text.lines();
    let Some(header) = lines.next() else {
        return Err(LoadError::NoEntries);
    };
    let delimiter = detect_delimiter(header);
    debug!(%delimiter, "detected roster delimiter");

    let entries: Vec<Entry> = lines.filter_map(|line| parse_row(line, delimiter)).collect();
    if entries.is_empty() {
        return Err(LoadError::NoEntries);
    }
    Ok(Roster::new(entries))
}

/// Picks `;` unless the header holds strictly more commas than semicolons.
pub fn detect_delimiter(header: &str) -> char {
    let semicolons = header.matches(';').count();
    let commas = header.matches(',').count();
    if semicolons >= commas { ';' } else { ',' }
}

fn parse_row(line: &str, delimiter: char) -> Option<Entry> {
    if line.trim().is_empty() {
        return None;
    }

    let mut fields = line.splitn(3, delimiter);
    let name = trim_field(fields.next().unwrap_or_default());
    if name.is_empty() || SENTINEL_NAMES.contains(&name) {
        return None;
    }

    let counter = fields
        .next()
        .and_then(|field| trim_field(field).parse::<u32>().ok())
        .unwrap_or(0);

    Some(Entry::new(name, counter))
}

fn trim_field(field: &str) -> &str {
    field.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
}

/// Encodes a roster in the on-disk format.
pub fn serialize(roster: &Roster) -> Vec<u8> {
    let mut out = String::with_capacity(BOM.len() + HEADER.len() + 2 + roster.len() * 16);
    out.push_str(BOM);
    out.push_str(HEADER);
    out.push_str(LINE_END);
    for entry in roster.iter() {
        out.push_str(&entry.name);
        out.push(';');
        out.push_str(&entry.counter.to_string());
        out.push_str(LINE_END);
    }
    out.into_bytes()
}

/// Reads and parses a roster file.
pub fn load_file(path: &Path) -> Result<Roster, LoadError> {
    let raw = fs::read(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let roster = parse(&raw)?;
    info!(path = %path.display(), entries = roster.len(), "loaded roster");
    Ok(roster)
}

/// Writes the roster next to `path` and then moves it into place.
///
/// A failed rename (another device, a locked target) falls back to copying the
/// temporary file over the target. The temporary file never outlives the call.
pub fn save(path: &Path, roster: &Roster) -> Result<(), SaveError> {
    let tmp = temp_path(path);
    if let Err(source) = fs::write(&tmp, serialize(roster)) {
        let _ = fs::remove_file(&tmp);
        return Err(SaveError::WriteTemp { path: tmp, source });
    }

    if let Err(rename) = fs::rename(&tmp, path) {
        warn!(path = %path.display(), error = %rename, "rename failed, copying instead");
        let copied = fs::copy(&tmp, path);
        let _ = fs::remove_file(&tmp);
        if let Err(source) = copied {
            return Err(SaveError::Replace {
                path: path.to_path_buf(),
                rename,
                source,
            });
        }
    }

    info!(path = %path.display(), entries = roster.len(), "saved roster");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(roster: &Roster) -> Vec<&str> {
        roster.iter().map(|entry| entry.name.as_str()).collect()
    }

    #[test]
    fn parses_semicolon_table() {
        let roster = parse(b"Name;Counter\nAlice;0\nBob;2\nCharlie;0\n").unwrap();
        assert_eq!(names(&roster), vec!["Alice", "Bob", "Charlie"]);
        assert_eq!(roster.counters(), vec![0, 2, 0]);
    }

    #[test]
    fn strips_bom_and_handles_crlf() {
        let roster = parse("\u{feff}Name;Counter\r\nAlice;3\r\n".as_bytes()).unwrap();
        assert_eq!(names(&roster), vec!["Alice"]);
        assert_eq!(roster.counters(), vec![3]);
    }

    #[test]
    fn comma_header_selects_comma() {
        assert_eq!(detect_delimiter("A,B"), ',');
        assert_eq!(detect_delimiter("A;B"), ';');
        assert_eq!(detect_delimiter("A;B,C"), ';');
        assert_eq!(detect_delimiter("Name"), ';');

        let roster = parse(b"Name,Counter\nAlice,1\nBob, 4\n").unwrap();
        assert_eq!(names(&roster), vec!["Alice", "Bob"]);
        assert_eq!(roster.counters(), vec![1, 4]);
    }

    #[test]
    fn drops_sentinel_and_blank_names() {
        let raw = b"Name;Counter\nnan;1\n  ;2\nNone;0\n\n   \nNaN;5\n  Dora  ;1\n";
        let roster = parse(raw).unwrap();
        // Sentinel matching is case-sensitive.
        assert_eq!(names(&roster), vec!["NaN", "Dora"]);
        assert_eq!(roster.counters(), vec![5, 1]);
    }

    #[test]
    fn malformed_or_missing_counters_become_zero() {
        let raw = b"Name;Counter\nAlice\nBob;x\nCarol;-2\nDave;7;extra;fields\n";
        let roster = parse(raw).unwrap();
        assert_eq!(names(&roster), vec!["Alice", "Bob", "Carol", "Dave"]);
        assert_eq!(roster.counters(), vec![0, 0, 0, 7]);
    }

    #[test]
    fn counters_with_trailing_junk_are_not_truncated() {
        let raw = b"Name;Counter\nAlice;1.5\nBob;3abc\nCarol; 4 \n";
        let roster = parse(raw).unwrap();
        assert_eq!(roster.counters(), vec![0, 0, 4]);
    }

    #[test]
    fn empty_input_is_load_error() {
        assert!(matches!(parse(b""), Err(LoadError::NoEntries)));
        assert!(matches!(parse(b"Name;Counter\n"), Err(LoadError::NoEntries)));
        assert!(matches!(
            parse(b"Name;Counter\nnan;0\nNone;1\n"),
            Err(LoadError::NoEntries)
        ));
    }

    #[test]
    fn serialize_writes_bom_header_and_crlf() {
        let roster = Roster::new(vec![Entry::new("Alice", 0), Entry::new("Bob", 2)]);
        let bytes = serialize(&roster);
        assert_eq!(
            bytes,
            "\u{feff}Name;Counter\r\nAlice;0\r\nBob;2\r\n".as_bytes()
        );
    }

    #[test]
    fn serialize_then_parse_keeps_rows() {
        let raw = b"Name,Counter\nAlice,1\nnan,3\nBob,0\n";
        let roster = parse(raw).unwrap();
        let reparsed = parse(&serialize(&roster)).unwrap();
        assert_eq!(reparsed, roster);
    }

    #[test]
    fn save_replaces_target_and_removes_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names.csv");
        fs::write(&path, "Name;Counter\nOld;9\n").unwrap();

        let roster = Roster::new(vec![Entry::new("Alice", 1), Entry::new("Bob", 0)]);
        save(&path, &roster).unwrap();

        assert_eq!(load_file(&path).unwrap(), roster);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("names.csv");
        let roster = Roster::new(vec![Entry::new("Alice", 0)]);

        let err = save(&path, &roster).unwrap_err();
        assert!(matches!(err, SaveError::WriteTemp { .. }));
    }

    #[test]
    fn load_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_file(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));
    }
}
