//! Confirmation gate for destructive migrations
//!
//! Every step that can lose data asks a [`ConfirmationOracle`] first. The
//! terminal oracle blocks on a y/n answer; the automatic one accepts
//! everything and is meant for non-interactive environments.

use async_trait::async_trait;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Answers yes/no to a destructive migration step
#[async_trait]
pub trait ConfirmationOracle: Send + Sync {
    async fn confirm(&self, message: &str) -> bool;
}

/// Shared confirmation oracle
pub type Confirmation = Arc<dyn ConfirmationOracle>;

/// Prompts on the terminal.
///
/// Tables are reconciled concurrently, so prompts are serialized: each one
/// holds the terminal from writing the question until its answer is read.
#[derive(Debug, Default)]
pub struct TtyConfirmation {
    terminal: Mutex<()>,
}

impl TtyConfirmation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one blocking prompt/answer exchange while holding the terminal
    async fn exchange<F>(&self, prompt: String, ask: F) -> io::Result<String>
    where
        F: FnOnce(String) -> io::Result<String> + Send + 'static,
    {
        let _terminal = self.terminal.lock().await;
        tokio::task::spawn_blocking(move || ask(prompt))
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Interrupted, e))?
    }
}

fn ask_terminal(prompt: String) -> io::Result<String> {
    let mut stdout = io::stdout();
    stdout.write_all(prompt.as_bytes())?;
    stdout.flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(input)
}

#[async_trait]
impl ConfirmationOracle for TtyConfirmation {
    async fn confirm(&self, message: &str) -> bool {
        let prompt = format!("Migration: {} (y/n): ", message);

        match self.exchange(prompt, ask_terminal).await {
            Ok(input) => is_yes(&input),
            Err(e) => {
                tracing::error!(error = %e, "Failed to read confirmation, treating as refusal");
                false
            }
        }
    }
}

/// Accepts every step without asking
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirm;

#[async_trait]
impl ConfirmationOracle for AutoConfirm {
    async fn confirm(&self, message: &str) -> bool {
        tracing::info!(message = message, "Migration step confirmed automatically");
        true
    }
}

fn is_yes(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}
