use tokio::sync::broadcast;

pub type ShutdownSender = broadcast::Sender<()>;
pub type ShutdownReceiver = broadcast::Receiver<()>;

/// Broadcast channel size for shutdown notifications (single signal fan-out).
const SHUTDOWN_CHANNEL_CAPACITY: usize = 1;

#[must_use]
pub fn shutdown_channel() -> (ShutdownSender, ShutdownReceiver) {
    broadcast::channel::<()>(SHUTDOWN_CHANNEL_CAPACITY)
}

/// Latching view over a shutdown receiver.
///
/// Once a shutdown is observed the signal stays triggered. A closed channel
/// means no shutdown can arrive any more, so it never triggers.
#[derive(Debug)]
pub struct ShutdownSignal {
    receiver: ShutdownReceiver,
    triggered: bool,
}

impl ShutdownSignal {
    #[must_use]
    pub const fn new(receiver: ShutdownReceiver) -> Self {
        Self {
            receiver,
            triggered: false,
        }
    }

    #[must_use]
    pub fn from_sender(sender: &ShutdownSender) -> Self {
        Self::new(sender.subscribe())
    }

    /// Non-blocking check.
    pub fn is_triggered(&mut self) -> bool {
        if self.triggered {
            return true;
        }
        match self.receiver.try_recv() {
            Ok(()) | Err(broadcast::error::TryRecvError::Lagged(_)) => {
                self.triggered = true;
            }
            Err(broadcast::error::TryRecvError::Empty)
            | Err(broadcast::error::TryRecvError::Closed) => {}
        }
        self.triggered
    }

    /// Resolves when shutdown fires; pends forever on a closed channel.
    pub async fn triggered(&mut self) {
        if self.triggered {
            return;
        }
        match self.receiver.recv().await {
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                self.triggered = true;
            }
            Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};

    #[test]
    fn signal_latches_after_first_send() -> AppResult<()> {
        let (tx, _) = shutdown_channel();
        let mut signal = ShutdownSignal::from_sender(&tx);
        if signal.is_triggered() {
            return Err(AppError::validation("Signal fired before any send"));
        }
        tx.send(())
            .map_err(|err| AppError::validation(format!("send failed: {}", err)))?;
        if !signal.is_triggered() || !signal.is_triggered() {
            return Err(AppError::validation("Signal should stay triggered"));
        }
        Ok(())
    }

    #[test]
    fn closed_channel_never_triggers() -> AppResult<()> {
        let (tx, _) = shutdown_channel();
        let mut signal = ShutdownSignal::from_sender(&tx);
        drop(tx);
        if signal.is_triggered() {
            return Err(AppError::validation("Closed channel must not trigger"));
        }
        Ok(())
    }
}
