use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::controller::TransportEvent;

/// Exponential backoff configuration for transport reconnection
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on the backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

enum SessionEnd {
    /// Server sent a close frame or the stream ended
    Clean,
    /// Read or write error
    Failed,
    /// The client side went away; stop the transport entirely
    Shutdown,
}

/// Spawn the transport task
///
/// Owns the physical WebSocket: connects with backoff, forwards inbound text
/// frames and connection-state changes to the controller over `events`, and
/// drains `outbound` into the socket. Text queued while disconnected is
/// dropped; the controller sees the failure as a `Disconnected` event.
pub(crate) fn spawn(
    url: String,
    reconnect: ReconnectConfig,
    outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TransportEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(transport_loop(url, reconnect, outbound, events))
}

async fn transport_loop(
    url: String,
    reconnect: ReconnectConfig,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut attempt: u32 = 0;

    loop {
        // anything queued while we were down is stale; drop it
        let mut dropped = 0usize;
        while outbound.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!("Dropped {dropped} outbound frame(s) queued while disconnected");
        }

        tracing::info!("Connecting to {url}");
        match connect_async(&url).await {
            Ok((ws_stream, _)) => {
                if events.send(TransportEvent::Connected).is_err() {
                    return;
                }
                attempt = 0;

                let end = run_session(ws_stream, &mut outbound, &events).await;

                if events.send(TransportEvent::Disconnected).is_err() {
                    return;
                }
                match end {
                    SessionEnd::Clean => {
                        tracing::info!("Connection closed cleanly, reconnecting");
                        continue;
                    }
                    SessionEnd::Failed => {}
                    SessionEnd::Shutdown => return,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "Failed to connect");
            }
        }

        if events.is_closed() {
            return;
        }
        if let Some(max) = reconnect.max_retries {
            if attempt >= max {
                tracing::error!(max_retries = max, "Reconnection limit reached, giving up");
                return;
            }
        }

        let delay = backoff_delay(attempt, &reconnect);
        tracing::info!(delay_ms = delay.as_millis() as u64, attempt, "Waiting before reconnect");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Pump one established connection until it drops
async fn run_session(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    outbound: &mut mpsc::UnboundedReceiver<String>,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> SessionEnd {
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if events.send(TransportEvent::Message(text)).is_err() {
                        return SessionEnd::Shutdown;
                    }
                }
                Some(Ok(Message::Ping(_))) => {
                    // tungstenite answers pings on its own
                    tracing::trace!("WebSocket ping");
                }
                Some(Ok(Message::Close(_))) => {
                    tracing::info!("WebSocket close frame received");
                    return SessionEnd::Clean;
                }
                Some(Err(e)) => {
                    tracing::error!("WebSocket error: {e}");
                    return SessionEnd::Failed;
                }
                None => {
                    tracing::info!("WebSocket stream ended");
                    return SessionEnd::Clean;
                }
                _ => {}
            },
            msg = outbound.recv() => match msg {
                Some(text) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        tracing::error!("Failed to send message: {e}");
                        return SessionEnd::Failed;
                    }
                }
                None => {
                    // all client handles dropped
                    let _ = write.send(Message::Close(None)).await;
                    return SessionEnd::Shutdown;
                }
            },
        }
    }
}

/// Exponential backoff with deterministic jitter
///
/// `delay = min(initial * 2^attempt, max)`, then spread by up to ±25% so a
/// fleet of clients does not reconnect in lockstep.
fn backoff_delay(attempt: u32, config: &ReconnectConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(attempt.min(16) as i32);
    let capped = base.min(config.max_delay.as_secs_f64());
    let jitter = 1.0 + 0.25 * ((attempt as f64 * 7.3).sin());
    Duration::from_secs_f64((capped * jitter).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_grows_then_caps() {
        let config = ReconnectConfig::default();
        let d0 = backoff_delay(0, &config);
        let d1 = backoff_delay(1, &config);
        let d2 = backoff_delay(2, &config);
        assert!(d1 > d0);
        assert!(d2 > d1);

        // jitter can add at most 25% above the cap
        let d20 = backoff_delay(20, &config);
        assert!(d20 <= Duration::from_secs_f64(30.0 * 1.25));
    }
}
