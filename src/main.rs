// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Roadsense Link console

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roadsense_link::bluetooth::{BluezTransport, Command, ConnectionState, LinkSession};
use roadsense_link::config::Config;
use roadsense_link::events::EventProcessor;
use roadsense_link::state::AppState;

const HELP: &str = "\
Commands:
  connect              connect to the paired logger
  disconnect           close the link
  status               show link summary and query the logger
  devices              list paired devices
  sync                 send the local time
  quit                 exit
  <command>            any logger command, e.g. start, stop, view 3, SETWHEEL=2.1";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("roadsense_link=info".parse()?),
        )
        .init();

    info!("Starting Roadsense Link v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load()?;
    info!("Configuration loaded");

    let transport = Arc::new(BluezTransport::new(config.link.rfcomm_channel).await?);

    // Create application state
    let state = AppState::new();

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let session = LinkSession::new(config, transport, event_tx);

    let json = std::env::args().any(|arg| arg == "--json");
    let processor = EventProcessor::new(state.clone()).with_json_telemetry(json);
    tokio::spawn(processor.run(event_rx));

    println!("{}", HELP);
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line? else {
                    info!("Input closed");
                    break;
                };
                if !handle_input(&session, &state, line.trim()).await {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    session.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}

/// Run one console command. Returns `false` to exit.
async fn handle_input(session: &LinkSession, state: &AppState, line: &str) -> bool {
    match line.to_lowercase().as_str() {
        "" => {}
        "quit" | "exit" => return false,
        "help" => println!("{}", HELP),
        "connect" => {
            let session = session.clone();
            tokio::spawn(async move {
                if let Err(e) = session.connect().await {
                    if e.is_connect_failure() {
                        warn!("Connect failed, type 'connect' to retry");
                    }
                }
            });
        }
        "disconnect" => session.disconnect().await,
        "status" => {
            println!("{}", state.status_line());
            println!("Queued commands: {}", session.queued_commands());
            if session.state() == ConnectionState::Connected {
                if let Err(e) = session.request_status() {
                    error!("{}", e);
                }
            }
        }
        "devices" => match session.available_devices().await {
            Ok(devices) if devices.is_empty() => println!("No paired devices"),
            Ok(devices) => {
                for name in devices {
                    println!("  {}", name);
                }
            }
            Err(e) => error!("Could not list devices: {}", e),
        },
        "sync" => {
            if let Err(e) = session.sync_time() {
                error!("{}", e);
            }
        }
        _ => match Command::parse(line) {
            Some(command) => {
                if let Err(e) = session.enqueue(command) {
                    error!("{}", e);
                }
            }
            None => println!("Unknown command: {} (type 'help')", line),
        },
    }
    true
}
