//! Notifications the engine sends to whatever presents the draw.
//!
//! The engine never renders anything. It reports highlight changes, counter
//! updates and batch progress as [`DrawEvent`]s through an [`EventSink`].

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DrawEvent {
    /// The scan cursor moved to `index`.
    ScanHighlight { index: usize },
    /// The scan cursor was removed.
    ScanHighlightCleared { index: usize },
    /// `index` won the current draw.
    WinnerRevealed { index: usize },
    /// The winner mark of `index` was switched on or off.
    WinnerBlinkToggle { index: usize, on: bool },
    /// All winner marks were removed.
    WinnerMarksCleared,
    CounterChanged { index: usize, value: u32 },
    BatchProgress {
        drawn: usize,
        total: usize,
        winner: String,
    },
    /// Winner names in draw order.
    BatchComplete { winners: Vec<String> },
    BatchCancelled { reason: String },
    LoadError { message: String },
    SaveError { message: String },
}

/// Receiver of engine notifications.
pub trait EventSink {
    fn emit(&mut self, event: DrawEvent);
}

impl EventSink for Vec<DrawEvent> {
    fn emit(&mut self, event: DrawEvent) {
        self.push(event);
    }
}

impl EventSink for UnboundedSender<DrawEvent> {
    fn emit(&mut self, event: DrawEvent) {
        // A dropped receiver only means nobody is watching.
        let _ = self.send(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: DrawEvent) {
        (**self).emit(event);
    }
}

/// Logs every event and keeps nothing. Useful when no presentation layer exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: DrawEvent) {
        match &event {
            DrawEvent::ScanHighlight { .. } | DrawEvent::WinnerBlinkToggle { .. } => {
                trace!(?event)
            }
            DrawEvent::BatchProgress {
                drawn,
                total,
                winner,
            } => info!(drawn, total, winner = %winner, "draw committed"),
            DrawEvent::BatchComplete { winners } => info!(?winners, "batch complete"),
            DrawEvent::BatchCancelled { reason } => warn!(reason = %reason, "batch cancelled"),
            DrawEvent::LoadError { message } => warn!(error = %message, "load failed"),
            DrawEvent::SaveError { message } => warn!(error = %message, "save failed"),
            _ => debug!(?event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_string(&DrawEvent::WinnerBlinkToggle { index: 2, on: false })
            .unwrap();
        assert_eq!(json, r#"{"type":"winner_blink_toggle","index":2,"on":false}"#);
    }

    #[tokio::test]
    async fn channel_sink_forwards_events() {
        let (mut tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.emit(DrawEvent::ScanHighlight { index: 1 });
        assert_eq!(rx.recv().await, Some(DrawEvent::ScanHighlight { index: 1 }));
    }
}
