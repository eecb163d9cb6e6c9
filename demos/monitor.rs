//! Connect to a Home Assistant server and print entity-state updates.
//!
//! Usage:
//!
//! ```text
//! cargo run --example monitor -- <host> <access-token> [port]
//! ```

use hass_ws::{Config, HassClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().expect("usage: monitor <host> <access-token> [port]");
    let token = args.next().expect("usage: monitor <host> <access-token> [port]");
    let port = args.next().map(|p| p.parse()).transpose()?.unwrap_or(8123);

    let client = HassClient::connect(Config::new(host, port, token));

    let mut updates = client.subscribe_states();
    loop {
        let update = updates.recv().await?;
        let name = update
            .state
            .attributes
            .friendly_name
            .as_deref()
            .unwrap_or(&update.entity_id)
            .to_string();
        println!("{:<40} {:<12} {}", update.entity_id, update.state.state, name);
    }
}
