//! In-memory roster of draw candidates.
//!
//! The roster is the state that every draw reads and that committed draws
//! mutate. An entry's identity is its position: indices stay stable for as long
//! as a roster is loaded and are reassigned when it is replaced.

use serde::{Deserialize, Serialize};

use crate::error::DrawError;

/// Names a spreadsheet export writes into empty cells. Never valid entry names.
pub const SENTINEL_NAMES: &[&str] = &["nan", "None"];

/// A named candidate and how many times it has been drawn, relative to the
/// least-drawn entry once the roster is normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    pub counter: u32,
}

impl Entry {
    pub fn new(name: impl Into<String>, counter: u32) -> Self {
        Self {
            name: name.into(),
            counter,
        }
    }
}

/// Ordered list of entries, in file order.
///
/// Does no normalization of its own; see [`crate::fairness::normalize`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    entries: Vec<Entry>,
}

impl Roster {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    /// Replaces every entry at once.
    pub fn load(&mut self, entries: Vec<Entry>) {
        self.entries = entries;
    }

    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [Entry] {
        &mut self.entries
    }

    /// Name of the entry at `index`, or an index error.
    pub fn name(&self, index: usize) -> Result<&str, DrawError> {
        self.entries
            .get(index)
            .map(|entry| entry.name.as_str())
            .ok_or(DrawError::Index {
                index,
                len: self.entries.len(),
            })
    }

    /// Adds one draw to the entry at `index` and returns the new counter.
    pub fn increment_counter(&mut self, index: usize) -> Result<u32, DrawError> {
        let len = self.entries.len();
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(DrawError::Index { index, len })?;
        entry.counter = entry.counter.saturating_add(1);
        Ok(entry.counter)
    }

    /// Rejects empty, untrimmed and sentinel names, which the file format
    /// cannot carry through a save and reload.
    pub fn validate_names(&self) -> Result<(), DrawError> {
        for (index, entry) in self.entries.iter().enumerate() {
            let name = entry.name.as_str();
            if name.trim().is_empty() {
                return Err(DrawError::InvalidInput(format!("entry {index} has an empty name")));
            }
            if name.trim() != name {
                return Err(DrawError::InvalidInput(format!(
                    "entry {index} name {name:?} has surrounding whitespace"
                )));
            }
            if SENTINEL_NAMES.contains(&name) {
                return Err(DrawError::InvalidInput(format!(
                    "entry {index} uses the reserved name {name:?}"
                )));
            }
        }
        Ok(())
    }

    /// Snapshot of every counter, in roster order.
    pub fn counters(&self) -> Vec<u32> {
        self.entries.iter().map(|entry| entry.counter).collect()
    }
}

impl FromIterator<Entry> for Roster {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_returns_new_counter() {
        let mut roster: Roster = [Entry::new("Alice", 0), Entry::new("Bob", 2)]
            .into_iter()
            .collect();

        assert_eq!(roster.increment_counter(1).unwrap(), 3);
        assert_eq!(roster.counters(), vec![0, 3]);
    }

    #[test]
    fn increment_out_of_range_is_index_error() {
        let mut roster = Roster::new(vec![Entry::new("Alice", 0)]);

        let err = roster.increment_counter(5).unwrap_err();
        assert!(matches!(err, DrawError::Index { index: 5, len: 1 }));
        assert_eq!(roster.counters(), vec![0]);
    }

    #[test]
    fn load_replaces_all_entries() {
        let mut roster = Roster::new(vec![Entry::new("Alice", 4)]);
        roster.load(vec![Entry::new("Bob", 0), Entry::new("Carol", 1)]);

        assert_eq!(roster.len(), 2);
        assert_eq!(roster.name(0).unwrap(), "Bob");
        assert!(roster.name(2).is_err());
    }

    #[test]
    fn validate_names_rejects_what_a_reload_would_drop() {
        let ok = Roster::new(vec![Entry::new("Alice", 0), Entry::new("nan cat", 1)]);
        assert!(ok.validate_names().is_ok());

        for bad in ["", "  ", "nan", "None", " Bob", "Bob\t"] {
            let roster = Roster::new(vec![Entry::new("Alice", 0), Entry::new(bad, 0)]);
            let err = roster.validate_names().unwrap_err();
            assert!(matches!(err, DrawError::InvalidInput(_)), "{bad:?} accepted");
        }
    }
}
