//! Tokio driver for the draw engine.
//!
//! A single worker task owns the [`DrawEngine`]. Callers talk to it through an
//! [`EngineHandle`], whose requests are queued on an mpsc channel and processed
//! one at a time, so the roster is only ever touched from the worker. Engine
//! wakeups become `sleep_until` deadlines in the worker's `select!` loop; a new
//! wakeup always replaces the previous one, and cancelling drops it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info};

use crate::clock::{Ticket, Wakeup};
use crate::config::DrawConfig;
use crate::engine::{DrawEngine, EngineStatus};
use crate::error::DrawError;
use crate::events::DrawEvent;
use crate::roster::Roster;

type EventSender = mpsc::UnboundedSender<DrawEvent>;

/// Async API to an engine running on its own task.
///
/// Every method waits for the worker to process the request. Errors from the
/// engine are returned as [`DrawError`] inside the `anyhow::Error` and can be
/// recovered with `downcast_ref`.
#[derive(Clone)]
pub struct EngineHandle {
    request_tx: mpsc::UnboundedSender<EngineRequest>,
}

impl EngineHandle {
    /// Starts a batch of `count` draws. Fails with [`DrawError::Busy`] while a
    /// batch is running.
    pub async fn start_batch(&self, count: usize) -> Result<()> {
        let (respond_to, resp_rx) = oneshot::channel();
        self.send(EngineRequest::StartBatch { count, respond_to })?;
        resp_rx.await.context("start response channel closed")??;
        Ok(())
    }

    /// Cancels the running batch. Returns whether anything was running.
    pub async fn cancel(&self) -> Result<bool> {
        let (respond_to, resp_rx) = oneshot::channel();
        self.send(EngineRequest::Cancel { respond_to })?;
        resp_rx.await.context("cancel response channel closed")
    }

    /// Loads a roster file and remembers it as the save target.
    pub async fn load_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        let (respond_to, resp_rx) = oneshot::channel();
        self.send(EngineRequest::LoadFile {
            path: path.into(),
            respond_to,
        })?;
        resp_rx.await.context("load response channel closed")??;
        Ok(())
    }

    /// Installs an in-memory roster. Without a `source` nothing is saved.
    pub async fn load_roster(&self, roster: Roster, source: Option<PathBuf>) -> Result<()> {
        let (respond_to, resp_rx) = oneshot::channel();
        self.send(EngineRequest::LoadRoster {
            roster,
            source,
            respond_to,
        })?;
        resp_rx.await.context("load response channel closed")??;
        Ok(())
    }

    pub async fn reload(&self) -> Result<()> {
        let (respond_to, resp_rx) = oneshot::channel();
        self.send(EngineRequest::Reload { respond_to })?;
        resp_rx.await.context("reload response channel closed")??;
        Ok(())
    }

    /// Replaces the configuration. Fails with [`DrawError::Busy`] while a batch
    /// is running.
    pub async fn set_config(&self, config: DrawConfig) -> Result<()> {
        let (respond_to, resp_rx) = oneshot::channel();
        self.send(EngineRequest::Configure { config, respond_to })?;
        resp_rx.await.context("config response channel closed")??;
        Ok(())
    }

    pub async fn clear_winner_marks(&self) -> Result<()> {
        self.send(EngineRequest::ClearMarks)
    }

    pub async fn status(&self) -> Result<EngineStatus> {
        let (respond_to, resp_rx) = oneshot::channel();
        self.send(EngineRequest::Status { respond_to })?;
        resp_rx.await.context("status response channel closed")
    }

    /// Stops the worker. A running batch is cancelled first.
    pub fn shutdown(&self) -> Result<()> {
        self.send(EngineRequest::Shutdown)
    }

    fn send(&self, request: EngineRequest) -> Result<()> {
        self.request_tx
            .send(request)
            .map_err(|_| anyhow::anyhow!("draw engine worker has stopped"))
    }
}

enum EngineRequest {
    StartBatch {
        count: usize,
        respond_to: oneshot::Sender<Result<(), DrawError>>,
    },
    Cancel {
        respond_to: oneshot::Sender<bool>,
    },
    LoadFile {
        path: PathBuf,
        respond_to: oneshot::Sender<Result<(), DrawError>>,
    },
    LoadRoster {
        roster: Roster,
        source: Option<PathBuf>,
        respond_to: oneshot::Sender<Result<(), DrawError>>,
    },
    Reload {
        respond_to: oneshot::Sender<Result<(), DrawError>>,
    },
    Configure {
        config: DrawConfig,
        respond_to: oneshot::Sender<Result<(), DrawError>>,
    },
    ClearMarks,
    Status {
        respond_to: oneshot::Sender<EngineStatus>,
    },
    Shutdown,
}

/// Spawns a worker task around a fresh engine using `rng`.
///
/// Returns the handle, the event stream and the worker's join handle. The worker
/// exits on [`EngineHandle::shutdown`] or once every handle is dropped.
pub fn spawn_engine<R>(rng: R) -> (EngineHandle, mpsc::UnboundedReceiver<DrawEvent>, JoinHandle<()>)
where
    R: Rng + Send + 'static,
{
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let worker = Worker {
        engine: DrawEngine::with_rng(event_tx, rng),
        request_rx,
        timer: None,
    };
    let join = tokio::spawn(worker.run());
    (EngineHandle { request_tx }, event_rx, join)
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    at: Instant,
    ticket: Ticket,
}

struct Worker<R> {
    engine: DrawEngine<EventSender, R>,
    request_rx: mpsc::UnboundedReceiver<EngineRequest>,
    timer: Option<Timer>,
}

impl<R: Rng> Worker<R> {
    async fn run(mut self) {
        loop {
            let (at, ticket) = match self.timer {
                Some(timer) => (timer.at, Some(timer.ticket)),
                None => (Instant::now(), None),
            };

            tokio::select! {
                request = self.request_rx.recv() => {
                    let Some(request) = request else {
                        break;
                    };
                    if !self.handle_request(request) {
                        break;
                    }
                }
                () = time::sleep_until(at), if ticket.is_some() => {
                    self.timer = None;
                    if let Some(ticket) = ticket {
                        let next = self.engine.tick(ticket);
                        self.arm(next);
                    }
                }
            }
        }

        self.engine.cancel();
        info!("draw engine worker stopped");
    }

    /// Returns `false` when the worker should stop.
    fn handle_request(&mut self, request: EngineRequest) -> bool {
        match request {
            EngineRequest::StartBatch { count, respond_to } => {
                let result = self.engine.start_batch(count).map(|wakeup| self.arm(wakeup));
                let _ = respond_to.send(result);
            }
            EngineRequest::Cancel { respond_to } => {
                let cancelled = self.engine.cancel();
                self.timer = None;
                let _ = respond_to.send(cancelled);
            }
            EngineRequest::LoadFile { path, respond_to } => {
                let _ = respond_to.send(self.engine.load_file(path));
            }
            EngineRequest::LoadRoster {
                roster,
                source,
                respond_to,
            } => {
                let _ = respond_to.send(self.engine.load_roster(roster, source));
            }
            EngineRequest::Reload { respond_to } => {
                let _ = respond_to.send(self.engine.reload());
            }
            EngineRequest::Configure { config, respond_to } => {
                let _ = respond_to.send(self.engine.set_config(config));
            }
            EngineRequest::ClearMarks => self.engine.clear_winner_marks(),
            EngineRequest::Status { respond_to } => {
                let _ = respond_to.send(self.engine.status());
            }
            EngineRequest::Shutdown => return false,
        }
        true
    }

    fn arm(&mut self, wakeup: Option<Wakeup>) {
        self.timer = wakeup.map(|wakeup| {
            debug!(delay_ms = wakeup.delay.as_millis() as u64, phase = ?self.engine.phase(), "next tick");
            Timer {
                at: Instant::now() + wakeup.delay,
                ticket: wakeup.ticket,
            }
        });
    }
}
