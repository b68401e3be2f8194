//! The draw state machine.
//!
//! One [`DrawEngine`] owns one roster and runs at most one batch at a time. A
//! batch of `n` winners is processed as `n` single draws, each going through:
//!
//! ```text
//! BuildingPath -> Scanning -> Revealed -> Blinking -> Settling
//!       ^                                               |
//!       +------------------ next draw ------------------+
//!                                                       |
//!                                        BatchDone -> Idle
//! ```
//!
//! Transitions never block. A transition that needs time to pass returns a
//! [`Wakeup`] and the driver calls [`DrawEngine::tick`] once it is due (see
//! [`crate::clock`]). Only the settle step mutates the roster, so cancelling at
//! any earlier point leaves every counter as it was before the interrupted draw.

use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, error, info, trace, warn};

use crate::clock::{Ticket, Wakeup};
use crate::codec;
use crate::config::DrawConfig;
use crate::error::DrawError;
use crate::events::{DrawEvent, EventSink};
use crate::fairness;
use crate::roster::Roster;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    BuildingPath,
    Scanning,
    Revealed,
    Blinking,
    Settling,
    BatchDone,
    Cancelled,
}

/// Point-in-time view of an engine, for display.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub phase: Phase,
    pub roster: Roster,
    pub source: Option<PathBuf>,
    pub drawn: usize,
    pub total: usize,
    pub marked_winners: Vec<usize>,
}

/// Bookkeeping for one requested batch.
#[derive(Debug)]
struct DrawBatch {
    total: usize,
    drawn: usize,
    /// Winners in draw order.
    selected: Vec<usize>,
    /// Winners not to be drawn again while other eligible entries remain.
    excluded: BTreeSet<usize>,
}

impl DrawBatch {
    fn new(total: usize) -> Self {
        Self {
            total,
            drawn: 0,
            selected: Vec::with_capacity(total),
            excluded: BTreeSet::new(),
        }
    }
}

/// Animation state of the single draw in progress.
#[derive(Debug)]
struct AnimationRun {
    path: VecDeque<usize>,
    winner: usize,
    /// Current scan delay in milliseconds.
    current_delay: f64,
    highlighted: Option<usize>,
    revealed: bool,
    /// Whether the winner already carried a mark from an earlier draw.
    was_marked: bool,
    blink_remaining: u32,
    lit: bool,
}

pub struct DrawEngine<S, R = StdRng> {
    roster: Roster,
    source: Option<PathBuf>,
    config: DrawConfig,
    sink: S,
    rng: R,
    phase: Phase,
    batch: Option<DrawBatch>,
    run: Option<AnimationRun>,
    marked: BTreeSet<usize>,
    next_ticket: u64,
    pending: Option<Ticket>,
}

impl<S: EventSink> DrawEngine<S, StdRng> {
    /// Creates an idle engine with an empty roster and an OS-seeded generator.
    pub fn new(sink: S) -> Self {
        Self::with_rng(sink, StdRng::from_entropy())
    }
}

impl<S: EventSink, R: Rng> DrawEngine<S, R> {
    pub fn with_rng(sink: S, rng: R) -> Self {
        Self {
            roster: Roster::default(),
            source: None,
            config: DrawConfig::default(),
            sink,
            rng,
            phase: Phase::Idle,
            batch: None,
            run: None,
            marked: BTreeSet::new(),
            next_ticket: 0,
            pending: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// File the roster is saved to when a batch completes.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn config(&self) -> &DrawConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Entries currently carrying a winner mark.
    pub fn marked_winners(&self) -> impl Iterator<Item = usize> + '_ {
        self.marked.iter().copied()
    }

    pub fn status(&self) -> EngineStatus {
        let (drawn, total) = self
            .batch
            .as_ref()
            .map_or((0, 0), |batch| (batch.drawn, batch.total));
        EngineStatus {
            phase: self.phase,
            roster: self.roster.clone(),
            source: self.source.clone(),
            drawn,
            total,
            marked_winners: self.marked.iter().copied().collect(),
        }
    }

    /// Replaces the configuration. Refused while a batch is in flight.
    pub fn set_config(&mut self, config: DrawConfig) -> Result<(), DrawError> {
        self.ensure_idle()?;
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Installs a roster, optionally tied to the file it is saved back to.
    pub fn load_roster(&mut self, roster: Roster, source: Option<PathBuf>) -> Result<(), DrawError> {
        self.ensure_idle()?;
        roster.validate_names()?;
        info!(entries = roster.len(), source = ?source, "roster installed");
        self.roster = roster;
        self.source = source;
        self.marked.clear();
        Ok(())
    }

    /// Reads `path` and installs its roster. On failure the current roster and
    /// path are kept and a load error is reported.
    pub fn load_file(&mut self, path: impl Into<PathBuf>) -> Result<(), DrawError> {
        self.ensure_idle()?;
        let path = path.into();
        match codec::load_file(&path) {
            Ok(roster) => self.load_roster(roster, Some(path)),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to load roster");
                self.sink.emit(DrawEvent::LoadError {
                    message: err.to_string(),
                });
                Err(err.into())
            }
        }
    }

    /// Re-reads the file the current roster came from.
    pub fn reload(&mut self) -> Result<(), DrawError> {
        self.ensure_idle()?;
        let Some(path) = self.source.clone() else {
            return Err(DrawError::InvalidInput("no roster file loaded".to_string()));
        };
        self.load_file(path)
    }

    /// Removes every winner mark.
    pub fn clear_winner_marks(&mut self) {
        self.marked.clear();
        self.sink.emit(DrawEvent::WinnerMarksCleared);
    }

    /// Starts a batch of `count` draws, clamped to the roster size.
    ///
    /// The first scan highlight is emitted right away. Returns the wakeup for
    /// the next step, or `None` if the batch was cancelled straight away.
    pub fn start_batch(&mut self, count: usize) -> Result<Option<Wakeup>, DrawError> {
        self.ensure_idle()?;
        if self.roster.is_empty() {
            return Err(DrawError::InvalidInput("roster is empty".to_string()));
        }
        if count < 1 {
            return Err(DrawError::InvalidInput(
                "at least one entry must be drawn".to_string(),
            ));
        }

        let total = count.min(self.roster.len());
        info!(requested = count, total, "starting batch");
        self.batch = Some(DrawBatch::new(total));
        self.phase = Phase::BuildingPath;
        Ok(self.build_path())
    }

    /// Abandons the batch in flight. Counters of the interrupted draw are left
    /// untouched; draws already committed in this batch stay committed.
    ///
    /// Returns `false` if there was nothing to cancel.
    pub fn cancel(&mut self) -> bool {
        if self.is_idle() {
            return false;
        }
        self.abort("cancelled");
        true
    }

    /// Advances the state machine. Ticks with a superseded ticket are ignored.
    pub fn tick(&mut self, ticket: Ticket) -> Option<Wakeup> {
        if self.pending != Some(ticket) {
            trace!(?ticket, "ignoring stale tick");
            return None;
        }
        self.pending = None;

        match self.phase {
            Phase::BuildingPath => self.build_path(),
            Phase::Scanning => self.scan_step(),
            Phase::Revealed | Phase::Blinking => self.blink_step(),
            Phase::Settling => self.settle(),
            Phase::BatchDone => self.finish_batch(),
            Phase::Idle | Phase::Cancelled => None,
        }
    }

    fn ensure_idle(&self) -> Result<(), DrawError> {
        if self.is_idle() {
            Ok(())
        } else {
            Err(DrawError::Busy)
        }
    }

    fn schedule(&mut self, delay: Duration) -> Option<Wakeup> {
        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        self.pending = Some(ticket);
        Some(Wakeup { delay, ticket })
    }

    fn build_path(&mut self) -> Option<Wakeup> {
        let mut eligible = fairness::eligible(&self.roster);
        if eligible.is_empty() {
            fairness::normalize(&mut self.roster);
            eligible = fairness::eligible(&self.roster);
        }
        if eligible.is_empty() {
            error!("no eligible entries even after normalization");
            return self.abort("no drawable entries");
        }

        let Some(batch) = self.batch.as_ref() else {
            error!("building a scan path without a batch");
            return self.abort("internal error: no active batch");
        };
        let mut pool: Vec<usize> = eligible
            .iter()
            .copied()
            .filter(|index| !batch.excluded.contains(index))
            .collect();
        if pool.is_empty() {
            debug!("every eligible entry already won this batch, allowing repeats");
            pool = eligible;
        }

        let winner = pool[self.rng.gen_range(0..pool.len())];
        let path = scan_path(
            &pool,
            winner,
            self.config.spin_rounds,
            self.config.rollout_factor,
            &mut self.rng,
        );
        debug!(pool = pool.len(), winner, steps = path.len(), "built scan path");

        self.run = Some(AnimationRun {
            path,
            winner,
            current_delay: self.config.scan_fast_delay_ms as f64,
            highlighted: None,
            revealed: false,
            was_marked: self.marked.contains(&winner),
            blink_remaining: 0,
            lit: false,
        });
        self.phase = Phase::Scanning;
        self.scan_step()
    }

    fn scan_step(&mut self) -> Option<Wakeup> {
        let growth = self.config.scan_growth_factor;
        let slow = self.config.scan_slow_delay_ms as f64;
        let blink_toggles = self.config.blink_toggle_count;
        let Some(run) = self.run.as_mut() else {
            return self.abort("internal error: no active draw");
        };

        if let Some(index) = run.path.pop_front() {
            run.highlighted = Some(index);
            run.current_delay = (run.current_delay * growth).min(slow);
            let delay = Duration::from_millis(run.current_delay.round() as u64);
            self.sink.emit(DrawEvent::ScanHighlight { index });
            return self.schedule(delay);
        }

        let winner = run.winner;
        run.highlighted = Some(winner);
        run.revealed = true;
        run.blink_remaining = blink_toggles;
        run.lit = true;
        self.sink.emit(DrawEvent::ScanHighlight { index: winner });
        self.sink.emit(DrawEvent::WinnerRevealed { index: winner });
        self.marked.insert(winner);
        if let Some(batch) = self.batch.as_mut() {
            batch.selected.push(winner);
            batch.excluded.insert(winner);
        }
        self.phase = Phase::Revealed;
        self.schedule(self.config.blink_interval())
    }

    fn blink_step(&mut self) -> Option<Wakeup> {
        self.phase = Phase::Blinking;
        let Some(run) = self.run.as_mut() else {
            return self.abort("internal error: no active draw");
        };
        let winner = run.winner;

        if run.blink_remaining > 0 {
            run.blink_remaining -= 1;
            run.lit = !run.lit;
            let on = run.lit;
            self.sink.emit(DrawEvent::WinnerBlinkToggle { index: winner, on });
            return self.schedule(self.config.blink_interval());
        }

        if !run.lit {
            run.lit = true;
            self.sink.emit(DrawEvent::WinnerBlinkToggle { index: winner, on: true });
        }
        if let Some(index) = run.highlighted.take() {
            self.sink.emit(DrawEvent::ScanHighlightCleared { index });
        }
        self.phase = Phase::Settling;
        self.schedule(self.config.settle_pause())
    }

    fn settle(&mut self) -> Option<Wakeup> {
        let Some(winner) = self.run.as_ref().map(|run| run.winner) else {
            return self.abort("internal error: no active draw");
        };

        let before = self.roster.counters();
        if let Err(err) = self.roster.increment_counter(winner) {
            error!(error = %err, "winner is no longer part of the roster");
            return self.abort(format!("internal error: {err}"));
        }
        fairness::normalize(&mut self.roster);
        for (index, (old, entry)) in before.iter().zip(self.roster.iter()).enumerate() {
            if *old != entry.counter {
                self.sink.emit(DrawEvent::CounterChanged {
                    index,
                    value: entry.counter,
                });
            }
        }
        self.run = None;

        let name = self.roster.name(winner).map(str::to_owned).unwrap_or_default();
        let Some(batch) = self.batch.as_mut() else {
            return self.abort("internal error: no active batch");
        };
        batch.drawn += 1;
        let (drawn, total) = (batch.drawn, batch.total);
        info!(drawn, total, winner = %name, index = winner, "draw committed");
        self.sink.emit(DrawEvent::BatchProgress {
            drawn,
            total,
            winner: name,
        });

        if drawn < total {
            self.phase = Phase::BuildingPath;
            self.schedule(self.config.next_draw_pause())
        } else {
            self.phase = Phase::BatchDone;
            self.schedule(self.config.finish_pause())
        }
    }

    fn finish_batch(&mut self) -> Option<Wakeup> {
        let winners: Vec<String> = self
            .batch
            .take()
            .map(|batch| batch.selected)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|index| self.roster.get(index).map(|entry| entry.name.clone()))
            .collect();

        self.persist();
        info!(?winners, "batch complete");
        self.sink.emit(DrawEvent::BatchComplete { winners });
        self.phase = Phase::Idle;
        None
    }

    /// Tears down the batch in flight and returns to idle.
    fn abort(&mut self, reason: impl Into<String>) -> Option<Wakeup> {
        let reason = reason.into();
        self.phase = Phase::Cancelled;
        self.pending = None;

        if let Some(run) = self.run.take() {
            if let Some(index) = run.highlighted {
                self.sink.emit(DrawEvent::ScanHighlightCleared { index });
            }
            if run.revealed && !run.was_marked {
                self.marked.remove(&run.winner);
                self.sink.emit(DrawEvent::WinnerBlinkToggle {
                    index: run.winner,
                    on: false,
                });
            }
        }
        let committed = self.batch.take().map_or(0, |batch| batch.drawn);
        if committed > 0 {
            self.persist();
        }

        warn!(reason = %reason, committed, "batch cancelled");
        self.sink.emit(DrawEvent::BatchCancelled { reason });
        self.phase = Phase::Idle;
        None
    }

    /// Saves the roster to its file, if it has one. Failures are reported and
    /// otherwise ignored: the in-memory counters stay as they are.
    fn persist(&mut self) {
        let Some(path) = self.source.as_deref() else {
            return;
        };
        if let Err(err) = codec::save(path, &self.roster) {
            warn!(path = %path.display(), error = %err, "failed to save roster");
            self.sink.emit(DrawEvent::SaveError {
                message: err.to_string(),
            });
        }
    }
}

/// Sequence of entries the scan cursor visits before landing on `winner`.
///
/// `rounds` full laps over `pool`, then a walk from a random position that
/// stops on `winner` once it has taken at least `ceil(pool.len() * rollout_factor)`
/// steps. The walk is capped at that length plus two laps, after which `winner`
/// is appended directly.
pub fn scan_path<R: Rng + ?Sized>(
    pool: &[usize],
    winner: usize,
    rounds: u32,
    rollout_factor: f64,
    rng: &mut R,
) -> VecDeque<usize> {
    let mut path = VecDeque::new();
    if pool.is_empty() {
        path.push_back(winner);
        return path;
    }

    for _ in 0..rounds {
        path.extend(pool.iter().copied());
    }

    let rollout = (pool.len() as f64 * rollout_factor).ceil() as usize;
    let cap = rollout + 2 * pool.len();
    let mut cursor = rng.gen_range(0..pool.len());
    let mut steps = 0;
    loop {
        let index = pool[cursor];
        path.push_back(index);
        steps += 1;
        if steps >= rollout && index == winner {
            break;
        }
        if steps >= cap {
            path.push_back(winner);
            break;
        }
        cursor = (cursor + 1) % pool.len();
    }
    path
}
