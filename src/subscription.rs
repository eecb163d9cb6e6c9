use crate::error::{HassError, Result};
use crate::state::EntityState;
use tokio::sync::broadcast;

/// One delivery on the entity-state stream
///
/// Emitted for every snapshot returned by a states poll and for every
/// state-changed event, with no deduplication: treat each delivery as
/// "latest known", not as a diff.
#[derive(Debug, Clone)]
pub struct StateUpdate {
    pub entity_id: String,
    pub state: EntityState,
}

/// Receiver for entity-state updates
pub struct StateReceiver {
    rx: broadcast::Receiver<StateUpdate>,
}

impl StateReceiver {
    pub(crate) fn new(rx: broadcast::Receiver<StateUpdate>) -> Self {
        Self { rx }
    }

    /// Receive the next state update
    pub async fn recv(&mut self) -> Result<StateUpdate> {
        self.rx.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => HassError::ConnectionClosed,
            broadcast::error::RecvError::Lagged(n) => {
                HassError::ChannelError(format!("Lagged by {} messages", n))
            }
        })
    }

    /// Try to receive a state update without blocking
    ///
    /// Returns `None` if no update is available.
    pub fn try_recv(&mut self) -> Result<Option<StateUpdate>> {
        match self.rx.try_recv() {
            Ok(update) => Ok(Some(update)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(HassError::ConnectionClosed),
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                Err(HassError::ChannelError(format!("Lagged by {} messages", n)))
            }
        }
    }
}
