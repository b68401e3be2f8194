//! Fairness rules: who may win next, and keeping counters small.
//!
//! An entry is eligible while its counter equals the roster-wide minimum, so an
//! entry that has been drawn more often than someone else can never win before
//! that someone catches up.

use crate::roster::Roster;

/// Indices of every entry whose counter equals the roster-wide minimum, in
/// roster order. Empty for an empty roster.
pub fn eligible(roster: &Roster) -> Vec<usize> {
    let Some(min) = min_counter(roster) else {
        return Vec::new();
    };
    roster
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.counter == min)
        .map(|(index, _)| index)
        .collect()
}

/// Subtracts the minimum counter from every entry so the minimum becomes 0.
///
/// Differences between counters are preserved. Returns the amount subtracted.
pub fn normalize(roster: &mut Roster) -> u32 {
    let Some(min) = min_counter(roster) else {
        return 0;
    };
    if min > 0 {
        for entry in roster.entries_mut() {
            entry.counter -= min;
        }
    }
    min
}

fn min_counter(roster: &Roster) -> Option<u32> {
    roster.iter().map(|entry| entry.counter).min()
}
