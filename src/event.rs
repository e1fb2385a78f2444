//! Gesture signalling between the button monitor and the display loop.

use log::{debug, warn};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

/// Capacity of the gesture channel. Gestures are rare compared to the
/// display tick, so a single slot is enough.
pub const GESTURE_CAPACITY: usize = 1;

/// Classified outcome of a power-button pulse, or a request derived from one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    Reboot,
    Shutdown,
    SwitchScreen,
    /// Sent ahead of a reboot/shutdown so the display can blank itself.
    StopDisplay,
}

/// Creates the single gesture channel shared by the button and display tasks.
///
/// # Example
///
/// ```
/// use argononed::event::{self, Gesture};
///
/// let (tx, mut rx) = event::gesture_channel();
/// assert!(tx.emit(Gesture::SwitchScreen));
/// assert_eq!(rx.poll(), Some(Gesture::SwitchScreen));
/// assert_eq!(rx.poll(), None);
/// ```
pub fn gesture_channel() -> (GestureSender, GestureReceiver) {
    with_capacity(GESTURE_CAPACITY)
}

fn with_capacity(capacity: usize) -> (GestureSender, GestureReceiver) {
    let (sender, receiver) = mpsc::channel(capacity);
    (GestureSender { sender }, GestureReceiver { receiver })
}

/// Writing half, owned by the button monitor.
#[derive(Debug, Clone)]
pub struct GestureSender {
    sender: mpsc::Sender<Gesture>,
}

impl GestureSender {
    /// Publishes a gesture without ever waiting.
    ///
    /// Returns `false` when the gesture could not be delivered because the
    /// slot is still occupied or the display loop is gone.
    pub fn emit(&self, gesture: Gesture) -> bool {
        match self.sender.try_send(gesture) {
            Ok(()) => {
                debug!("Gesture {gesture:?} emitted");
                true
            }
            Err(TrySendError::Full(g)) => {
                warn!("Gesture channel full, dropping {g:?}");
                false
            }
            Err(TrySendError::Closed(g)) => {
                debug!("No display listening, dropping {g:?}");
                false
            }
        }
    }
}

/// Reading half, owned by the display controller.
#[derive(Debug)]
pub struct GestureReceiver {
    receiver: mpsc::Receiver<Gesture>,
}

impl GestureReceiver {
    /// Takes the pending gesture, if any. Never suspends.
    pub fn poll(&mut self) -> Option<Gesture> {
        match self.receiver.try_recv() {
            Ok(gesture) => Some(gesture),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::time::{Duration, sleep};

    #[test]
    fn poll_on_empty_channel_returns_none() {
        let (_tx, mut rx) = gesture_channel();
        assert_eq!(rx.poll(), None);
    }

    #[test]
    fn emit_and_poll_single_gesture() {
        let (tx, mut rx) = gesture_channel();

        assert!(tx.emit(Gesture::StopDisplay));
        assert_eq!(rx.poll(), Some(Gesture::StopDisplay));
        assert_eq!(rx.poll(), None);
    }

    #[test]
    fn emit_never_blocks_when_full() {
        let (tx, mut rx) = gesture_channel();

        assert!(tx.emit(Gesture::SwitchScreen));
        // Slot occupied: the second gesture is dropped, not queued.
        assert!(!tx.emit(Gesture::StopDisplay));

        assert_eq!(rx.poll(), Some(Gesture::SwitchScreen));
        assert_eq!(rx.poll(), None);
    }

    #[test]
    fn emit_after_receiver_dropped_reports_failure() {
        let (tx, rx) = gesture_channel();
        drop(rx);

        assert!(!tx.emit(Gesture::StopDisplay));
    }

    #[test]
    fn poll_after_sender_dropped_returns_none() {
        let (tx, mut rx) = gesture_channel();
        drop(tx);

        assert_eq!(rx.poll(), None);
    }

    #[test]
    fn larger_channel_preserves_fifo_order() {
        let (tx, mut rx) = with_capacity(4);

        assert!(tx.emit(Gesture::SwitchScreen));
        assert!(tx.emit(Gesture::StopDisplay));

        assert_eq!(rx.poll(), Some(Gesture::SwitchScreen));
        assert_eq!(rx.poll(), Some(Gesture::StopDisplay));
    }

    #[tokio::test]
    async fn gesture_crosses_task_boundary() {
        let (tx, mut rx) = gesture_channel();

        let publisher = tokio::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            tx.emit(Gesture::SwitchScreen)
        });
        assert!(publisher.await.unwrap());

        assert_eq!(rx.poll(), Some(Gesture::SwitchScreen));
    }
}
