use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::Level;

use saucier_core::ids::SessionId;
use saucier_core::transport::{ChunkStream, ResponseTransport, TransportError};
use saucier_engine::{ChatOrchestrator, NullClipboard};
use saucier_store::autosave::{save_now, spawn_autosave};
use saucier_store::{ChatStore, PersistedState, StateVault, STATE_NAMESPACE};
use saucier_telemetry::TelemetryConfig;

const AUTOSAVE_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "saucier", about = "Streaming cooking-assistant conversation engine")]
struct Args {
    /// Where the persisted state database lives.
    #[arg(long)]
    state_path: Option<PathBuf>,

    /// Default log level (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Offline stand-in for a real response transport so the REPL always works.
struct CannedTransport;

#[async_trait::async_trait]
impl ResponseTransport for CannedTransport {
    async fn produce(
        &self,
        content: &str,
        _session_id: &SessionId,
    ) -> Result<ChunkStream, TransportError> {
        let reply = format!(
            "On \"{content}\": taste as you go, season in layers, and keep your knives sharp."
        );
        let chunks: Vec<Result<String, TransportError>> = reply
            .split_inclusive(' ')
            .map(|part| Ok(part.to_string()))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = args.log_level.parse::<Level>().unwrap_or(Level::INFO);
    saucier_telemetry::init(&TelemetryConfig {
        log_level,
        module_levels: Vec::new(),
    });

    let state_path = args.state_path.unwrap_or_else(default_state_path);
    let vault = StateVault::open(&state_path).context("open state vault")?;

    let store = Arc::new(ChatStore::new());
    if let Some(raw) = vault.load(STATE_NAMESPACE).context("load persisted state")? {
        store.hydrate(PersistedState::decode(&raw));
        tracing::info!(sessions = store.sessions().len(), "state rehydrated");
    }

    let autosave = spawn_autosave(store.clone(), vault.clone(), AUTOSAVE_DEBOUNCE);

    let mut notices = store.subscribe_notices();
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            match notice.message {
                Some(message) => eprintln!("* {}: {message}", notice.title),
                None => eprintln!("* {}", notice.title),
            }
        }
    });

    let orchestrator =
        ChatOrchestrator::new(store.clone(), Arc::new(CannedTransport), Arc::new(NullClipboard));

    println!("saucier ready. Ask a cooking question, or /new, /sessions, /quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "/quit" => break,
            "/new" => {
                store.create_session(None);
                println!("started a new session");
            }
            "/sessions" => {
                let current = store.current_session_id();
                for session in store.sessions() {
                    let marker = if Some(&session.id) == current.as_ref() {
                        "*"
                    } else {
                        " "
                    };
                    println!(
                        "{marker} {}  {} ({} messages)",
                        session.id,
                        session.title,
                        session.messages.len()
                    );
                }
            }
            "" => {}
            question => {
                orchestrator.send_message(question).await;
                if let Some(reply) = store
                    .current_session()
                    .and_then(|s| s.messages.last().cloned())
                {
                    println!("{}", reply.content);
                }
            }
        }
    }

    autosave.abort();
    save_now(&store, &vault).context("final save")?;
    Ok(())
}

fn default_state_path() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
        .join(".saucier")
        .join("state.db")
}
