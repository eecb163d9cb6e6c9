use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, Mutex};

use crate::config::Config;
use crate::controller::{Controller, ControllerOptions, Pending, ResponseCallback, Shared};
use crate::media::{MediaPlayer, Remote};
use crate::protocol::Command;
use crate::subscription::{StateReceiver, StateUpdate};
use crate::transport::{self, ReconnectConfig};

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Client for a Home Assistant server's WebSocket API
///
/// `HassClient` owns the connection: it spawns the transport and protocol
/// controller tasks, and every handle cloned from it talks to the same
/// connection. The handshake (auth, event subscription, initial states
/// poll) runs in the background; consume [`subscribe_states`] to observe
/// entity state as it arrives.
///
/// Commands are best-effort: submission never fails synchronously, and
/// protocol faults are logged rather than returned. Callers that need
/// delivery guarantees must build idempotent commands and their own
/// acknowledgment layer on top.
///
/// [`subscribe_states`]: HassClient::subscribe_states
///
/// # Example
///
/// ```no_run
/// use hass_ws::{Config, HassClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::new("192.168.1.10", 8123, "long-lived-token");
///     let client = HassClient::connect(config);
///
///     let mut updates = client.subscribe_states();
///     while let Ok(update) = updates.recv().await {
///         println!("{} -> {}", update.entity_id, update.state.state);
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct HassClient {
    shared: Arc<Mutex<Shared>>,
    updates: broadcast::Sender<StateUpdate>,
}

impl HassClient {
    /// Connect with default retry and controller settings
    ///
    /// Returns immediately; the first connection attempt and the auth
    /// handshake happen in the background, and the transport keeps
    /// reconnecting with backoff on its own. Must be called from within a
    /// Tokio runtime.
    pub fn connect(config: Config) -> Self {
        Self::connect_with(config, ControllerOptions::default(), ReconnectConfig::default())
    }

    /// Connect with explicit controller and reconnect tuning
    pub fn connect_with(
        config: Config,
        options: ControllerOptions,
        reconnect: ReconnectConfig,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (updates_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);

        let controller = Controller::new(
            config.access_token.clone(),
            options,
            outbound_tx,
            updates_tx.clone(),
        );
        let shared = controller.shared();

        transport::spawn(config.url(), reconnect, outbound_rx, events_tx);
        tokio::spawn(controller.run(events_rx));

        Self {
            shared,
            updates: updates_tx,
        }
    }

    /// Submit a command envelope
    ///
    /// The command is assigned the next correlation id and handed to the
    /// transport. If a continuation is given it is invoked at most once,
    /// with the result payload of a successful response; it is dropped
    /// uninvoked on failure, timeout, or disconnect.
    pub async fn send_command(&self, cmd: Command, continuation: Option<ResponseCallback>) {
        let action = continuation.map(Pending::Callback);
        self.shared.lock().await.send_command(cmd, action);
    }

    /// Request a fresh snapshot of every entity
    ///
    /// Results are not returned here: each returned state is projected and
    /// emitted individually on the state stream.
    pub async fn poll_states(&self) {
        self.shared
            .lock()
            .await
            .send_command(Command::get_states(), Some(Pending::PollStates));
    }

    /// Fire-and-forget service call, e.g. `media_player.volume_set`
    pub async fn call_service(
        &self,
        domain: impl Into<String>,
        service: impl Into<String>,
        service_data: Value,
    ) {
        self.send_command(Command::call_service(domain, service, service_data), None)
            .await;
    }

    /// Liveness probe; the pong is logged, not surfaced
    pub async fn ping(&self) {
        self.send_command(Command::ping(), None).await;
    }

    /// Subscribe to the entity-state stream
    ///
    /// Every states-poll snapshot and every state-changed event is
    /// delivered, in processing order, with no deduplication. Multiple
    /// subscriptions can be active simultaneously.
    pub fn subscribe_states(&self) -> StateReceiver {
        StateReceiver::new(self.updates.subscribe())
    }

    /// Control handle for a `media_player` entity
    pub fn media_player(&self, entity_id: impl Into<String>) -> MediaPlayer {
        MediaPlayer::new(self.clone(), entity_id.into())
    }

    /// Control handle for a `remote` entity
    pub fn remote(&self, entity_id: impl Into<String>) -> Remote {
        Remote::new(self.clone(), entity_id.into())
    }
}
