//! Dialog console - runs the built-in dialogs over stdin/stdout
//!
//! Every input line is one turn in a single conversation. A line holding a
//! JSON object is sent as a card payload instead of text, and `/end` clears
//! the conversation's dialog stack.

use async_trait::async_trait;
use dialog_runtime::dialogs::builtin_dialogs;
use dialog_runtime::services::{
    KeywordClassifier, LoggingClassifier, OutboundChannel, ServiceError, StaticKnowledgeBase,
};
use dialog_runtime::state::{MemoryStore, SqliteStore, StateStore};
use dialog_runtime::{Activity, OutboundMessage, RouterConfig, TurnRouter};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONVERSATION_ID: &str = "console";
const USER_ID: &str = "console-user";

/// Prints replies to stdout
struct ConsoleChannel;

#[async_trait]
impl OutboundChannel for ConsoleChannel {
    async fn send(&self, _conversation_id: &str, message: &OutboundMessage) -> Result<(), ServiceError> {
        let mut line = format!("bot> {}\n", message.text);
        if !message.suggestions.is_empty() {
            line.push_str(&format!("     [{}]\n", message.suggestions.join(" | ")));
        }
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ServiceError::delivery(e.to_string()))?;
        stdout
            .flush()
            .await
            .map_err(|e| ServiceError::delivery(e.to_string()))
    }
}

fn activity_for(line: &str) -> Activity {
    match serde_json::from_str::<serde_json::Value>(line) {
        Ok(value) if value.is_object() => Activity::message(CONVERSATION_ID, USER_ID, "").with_value(value),
        _ => Activity::message(CONVERSATION_ID, USER_ID, line),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they never interleave with replies
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dialog_runtime=info,dialog_console=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var_os("DIALOG_LOG_JSON").is_some() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let store: Arc<dyn StateStore> = match std::env::var("DIALOG_DB_PATH") {
        Ok(path) => {
            if let Some(parent) = std::path::Path::new(&path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            tracing::info!(path = %path, "Opening state database");
            Arc::new(SqliteStore::open(&path)?)
        }
        Err(_) => {
            tracing::info!("DIALOG_DB_PATH not set, state is kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let config = RouterConfig::from_env();
    tracing::info!(
        strategy = ?config.strategy,
        score_threshold = config.score_threshold,
        sentiment_threshold = config.sentiment_threshold,
        "Router configured"
    );

    let classifier = Arc::new(LoggingClassifier::new(Arc::new(
        KeywordClassifier::with_default_rules()?,
    )));
    let router = TurnRouter::new(
        builtin_dialogs()?,
        store,
        classifier,
        Arc::new(ConsoleChannel),
        config,
    )
    .with_knowledge_base(Arc::new(StaticKnowledgeBase::with_default_entries()?));

    tracing::info!(dialogs = ?router.dialogs().ids(), "Dialog console ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == "/end" {
            router.end_conversation(CONVERSATION_ID).await?;
            continue;
        }

        // Failed turns have already apologized to the user
        if let Err(e) = router.process_turn(activity_for(line)).await {
            tracing::debug!(error = %e, "Continuing after failed turn");
        }
    }

    Ok(())
}
