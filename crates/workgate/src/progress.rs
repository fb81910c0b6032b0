//! Progress channel between workers and the console sink.
//!
//! Workers never touch stdout directly; they emit events through a clonable
//! sender and the binary drains the receiver. Keeps the work loop testable
//! and keeps diagnostics (stderr) separate from demo output (stdout).

use std::fmt;
use std::io;

use tokio::sync::mpsc;

use crate::worker::WorkerId;

/// One observable step of worker progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub id: WorkerId,
    pub step: u32,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Worker[{}] is working...", self.id)
    }
}

/// Handle workers use to emit progress events.
///
/// Sends are queued on an unbounded channel and never block the worker.
#[derive(Clone)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressSender {
    /// Create a connected sender/receiver pair.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send_step(&self, id: WorkerId, step: u32) -> io::Result<()> {
        self.tx
            .send(ProgressEvent { id, step })
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "progress channel closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_the_demo_line() {
        let event = ProgressEvent {
            id: WorkerId(3),
            step: 0,
        };
        assert_eq!(event.to_string(), "Worker[3] is working...");
    }

    #[tokio::test]
    async fn events_arrive_in_send_order() {
        let (sender, mut rx) = ProgressSender::channel();

        sender.send_step(WorkerId(0), 0).unwrap();
        sender.send_step(WorkerId(0), 1).unwrap();

        assert_eq!(
            rx.recv().await,
            Some(ProgressEvent {
                id: WorkerId(0),
                step: 0
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(ProgressEvent {
                id: WorkerId(0),
                step: 1
            })
        );
    }

    #[test]
    fn send_after_receiver_dropped_errors() {
        let (sender, rx) = ProgressSender::channel();
        drop(rx);

        assert!(sender.send_step(WorkerId(1), 0).is_err());
    }
}
