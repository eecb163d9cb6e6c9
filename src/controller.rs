use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::Instant;

use crate::error::HassError;
use crate::protocol::{Command, CommandResponse, EventMessage, ServerMessage};
use crate::state::{project, EntityState};
use crate::subscription::StateUpdate;

/// Notification from the transport layer
#[derive(Debug)]
pub(crate) enum TransportEvent {
    /// The physical connection is up
    Connected,
    /// The physical connection dropped; the transport will retry on its own
    Disconnected,
    /// One inbound text frame
    Message(String),
}

/// Continuation invoked with a successful response's optional result payload
///
/// Called at most once, from the inbound-processing path. A continuation for
/// a command that fails, never gets answered, or is pending when the
/// connection drops is discarded without being invoked.
pub type ResponseCallback = Box<dyn FnOnce(Option<Value>) + Send + 'static>;

/// What to do when the response for a pending command id arrives
pub(crate) enum Pending {
    /// `subscribe_events` acknowledged: start the states poll
    Subscribe,
    /// `get_states` answered: project and emit each snapshot
    PollStates,
    /// Caller-provided continuation
    Callback(ResponseCallback),
}

struct PendingEntry {
    since: Instant,
    action: Pending,
}

/// Connection lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Disconnected,
    Connected,
    Authenticating,
    Authenticated,
    Subscribing,
    Subscribed,
    Ready,
}

/// Bound on credential resends after `auth_invalid`
#[derive(Debug, Clone, Default)]
pub struct AuthRetryPolicy {
    /// Maximum resends per connection. `None` resends until the transport
    /// reconnects, which matches the protocol's historical behavior.
    pub max_attempts: Option<u32>,
}

/// Controller tuning knobs
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub auth_retry: AuthRetryPolicy,

    /// Pending commands older than this are dropped from the correlation
    /// table without their continuation being invoked
    pub pending_timeout: Duration,

    /// How often the pending-command sweep runs
    pub sweep_interval: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            auth_retry: AuthRetryPolicy::default(),
            pending_timeout: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(5),
        }
    }
}

/// State shared between the controller task and client handles
///
/// All mutation goes through this mutex: the command-id counter, the
/// correlation table, and the outbound queue stay consistent even when the
/// host calls into the client from several tasks.
pub(crate) struct Shared {
    next_id: u64,
    pending: HashMap<u64, PendingEntry>,
    outbound: mpsc::UnboundedSender<String>,
}

impl Shared {
    /// Assign the next command id, register the continuation, and hand the
    /// encoded frame to the transport
    ///
    /// Ids start at 1 and are strictly increasing for the lifetime of one
    /// connection. No readiness check is made here: a send while the
    /// transport is down is dropped by the transport, and the failure
    /// surfaces through the `Disconnected` event rather than to the caller.
    pub(crate) fn send_command(&mut self, mut cmd: Command, action: Option<Pending>) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        cmd.id = Some(id);

        if let Some(action) = action {
            self.pending.insert(
                id,
                PendingEntry {
                    since: Instant::now(),
                    action,
                },
            );
        }

        self.send_raw(&cmd);
        id
    }

    /// Encode and send a command as-is, without assigning an id.
    /// Only the auth handshake uses this.
    fn send_raw(&self, cmd: &Command) {
        match cmd.encode() {
            Ok(text) => {
                tracing::debug!("TX: {text}");
                let _ = self.outbound.send(text);
            }
            Err(e) => tracing::error!("Failed to encode command: {e}"),
        }
    }

    fn clear_pending(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }
}

/// The protocol controller
///
/// Owns the connection state machine, performs the auth handshake, assigns
/// and correlates command ids, decodes inbound frames, and republishes
/// entity state on a broadcast channel. Inbound messages are processed
/// strictly in arrival order from a single task; protocol faults are logged
/// and never propagate to callers.
pub(crate) struct Controller {
    shared: Arc<Mutex<Shared>>,
    updates: broadcast::Sender<StateUpdate>,
    access_token: String,
    options: ControllerOptions,
    phase: Phase,
    auth_retries: u32,
}

impl Controller {
    pub(crate) fn new(
        access_token: String,
        options: ControllerOptions,
        outbound: mpsc::UnboundedSender<String>,
        updates: broadcast::Sender<StateUpdate>,
    ) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                next_id: 0,
                pending: HashMap::new(),
                outbound,
            })),
            updates,
            access_token,
            options,
            phase: Phase::Disconnected,
            auth_retries: 0,
        }
    }

    pub(crate) fn shared(&self) -> Arc<Mutex<Shared>> {
        self.shared.clone()
    }

    /// Drive the controller until the transport channel closes
    pub(crate) async fn run(mut self, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
        let mut sweep = tokio::time::interval(self.options.sweep_interval);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                _ = sweep.tick() => self.sweep_pending().await,
            }
        }

        tracing::debug!("Controller loop exiting");
    }

    async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                tracing::info!("Transport connected, starting auth handshake");
                {
                    // fresh connection, fresh id space
                    let mut shared = self.shared.lock().await;
                    shared.next_id = 0;
                    shared.clear_pending();
                }
                self.phase = Phase::Connected;
                self.auth_retries = 0;
                self.start_auth().await;
            }
            TransportEvent::Disconnected => {
                let dropped = self.shared.lock().await.clear_pending();
                if dropped > 0 {
                    tracing::warn!("Discarded {dropped} pending command(s) on disconnect");
                }
                self.phase = Phase::Disconnected;
            }
            TransportEvent::Message(text) => {
                tracing::debug!("RX: {text}");
                match ServerMessage::decode(&text) {
                    Ok(msg) => self.dispatch(msg).await,
                    // one bad frame never tears down the connection
                    Err(e) => tracing::warn!("Dropping inbound frame: {e}"),
                }
            }
        }
    }

    async fn dispatch(&mut self, msg: ServerMessage) {
        match msg {
            // The server may request auth spontaneously, or we may have
            // raced it by sending credentials on connect; both paths
            // converge here.
            ServerMessage::AuthRequired => {
                tracing::info!("Server requested authentication");
                self.start_auth().await;
            }
            ServerMessage::AuthOk => {
                tracing::info!("Authentication successful");
                self.phase = Phase::Authenticated;
                self.auth_retries = 0;
                self.subscribe().await;
            }
            ServerMessage::AuthInvalid { message } => self.on_auth_invalid(message).await,
            ServerMessage::Result(resp) => self.on_result(resp).await,
            ServerMessage::Event(event) => self.on_event(event),
            ServerMessage::Pong { id } => tracing::debug!(?id, "Pong received"),
            ServerMessage::Unknown(kind) => {
                tracing::warn!("{}", HassError::UnrecognizedMessage(kind));
            }
        }
    }

    async fn start_auth(&mut self) {
        self.phase = Phase::Authenticating;
        let auth = Command::auth(self.access_token.as_str());
        self.shared.lock().await.send_raw(&auth);
    }

    async fn on_auth_invalid(&mut self, message: Option<String>) {
        let reason = message.unwrap_or_else(|| "<no reason given>".to_string());
        tracing::warn!("{}", HassError::AuthenticationRejected(reason));

        match self.options.auth_retry.max_attempts {
            Some(max) if self.auth_retries >= max => {
                tracing::error!(
                    retries = self.auth_retries,
                    "Giving up on authentication until the transport reconnects"
                );
            }
            _ => {
                self.auth_retries += 1;
                self.start_auth().await;
            }
        }
    }

    async fn subscribe(&mut self) {
        self.phase = Phase::Subscribing;
        self.shared
            .lock()
            .await
            .send_command(Command::subscribe_events(), Some(Pending::Subscribe));
    }

    async fn on_result(&mut self, resp: CommandResponse) {
        // Remove-exactly-once: a duplicate or unknown id misses the table
        // and is silently dropped.
        let entry = self.shared.lock().await.pending.remove(&resp.id);

        if !resp.success {
            // The pending entry (if any) has been dropped without invoking
            // its continuation. Callers needing to observe failures must
            // layer their own acknowledgments.
            tracing::warn!(
                "{}",
                HassError::CommandFailed {
                    id: resp.id,
                    code: resp.error_code().to_string(),
                    message: resp.error_message().to_string(),
                }
            );
            return;
        }

        match entry.map(|e| e.action) {
            None => tracing::debug!("Result {} had no continuation registered", resp.id),
            Some(Pending::Subscribe) => {
                tracing::info!("Subscribed to state changes, polling current states");
                self.phase = Phase::Subscribed;
                self.shared
                    .lock()
                    .await
                    .send_command(Command::get_states(), Some(Pending::PollStates));
            }
            Some(Pending::PollStates) => {
                self.emit_states_poll(resp.result);
                self.phase = Phase::Ready;
            }
            Some(Pending::Callback(callback)) => callback(resp.result),
        }
    }

    fn emit_states_poll(&self, result: Option<Value>) {
        let Some(Value::Array(states)) = result else {
            tracing::warn!("get_states result was not an array");
            return;
        };

        tracing::info!("Poll returned {} entity state(s)", states.len());
        for raw in &states {
            self.emit_state(project(raw));
        }
    }

    fn on_event(&self, event: EventMessage) {
        let Some(data) = event.event.and_then(|e| e.data) else {
            tracing::debug!("Dropping event without payload");
            return;
        };
        let Some(new_state) = data.new_state else {
            // e.g. an entity was removed; nothing to emit
            tracing::debug!(entity_id = ?data.entity_id, "Dropping event without new_state");
            return;
        };

        let mut state = project(&new_state);
        if state.entity_id.is_empty() {
            match data.entity_id {
                Some(id) => state.entity_id = id,
                None => {
                    tracing::debug!("Dropping event with no entity_id anywhere");
                    return;
                }
            }
        }
        self.emit_state(state);
    }

    fn emit_state(&self, state: EntityState) {
        if state.entity_id.is_empty() {
            tracing::debug!("Skipping state snapshot without entity_id");
            return;
        }
        // send only fails when there are no subscribers, which is fine
        let _ = self.updates.send(StateUpdate {
            entity_id: state.entity_id.clone(),
            state,
        });
    }

    /// Drop correlation entries whose response never came
    async fn sweep_pending(&mut self) {
        let timeout = self.options.pending_timeout;
        self.shared.lock().await.pending.retain(|id, entry| {
            let keep = entry.since.elapsed() < timeout;
            if !keep {
                tracing::warn!("Expiring command {id} after {timeout:?} without a response");
            }
            keep
        });
    }
}
