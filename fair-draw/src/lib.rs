//! Fair, repeatable random selection from a roster of named candidates.
//!
//! Each candidate carries a "times drawn" counter. Only candidates with the
//! lowest counter can win, so nobody is drawn twice before everyone else has
//! caught up. A draw is presented as a decelerating scan over the candidates
//! followed by a blinking reveal before the counter is committed.
//!
//! - [`roster`] holds the candidates and their counters.
//! - [`fairness`] computes the eligible set and keeps counters normalized.
//! - [`codec`] reads and writes the delimited roster file, replacing it
//!   atomically on save.
//! - [`engine`] is the batch state machine: path construction, scan animation,
//!   reveal, blink, commit, and continuation to the next draw.
//! - [`clock`] defines wakeups and a virtual-time driver for tests.
//! - [`runtime`] runs an engine on a tokio task behind an async handle.
//! - [`events`] is the outbound notification interface.
//! - [`config`] holds animation timing, [`error`] the error taxonomy and
//!   [`cli`] the command-line definition of the `fair-draw` binary.

pub mod cli;
pub mod clock;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod fairness;
pub mod roster;
pub mod runtime;

pub use engine::{DrawEngine, EngineStatus, Phase};
pub use error::{ConfigError, DrawError, LoadError, SaveError};
pub use events::{DrawEvent, EventSink};
pub use roster::{Entry, Roster};
