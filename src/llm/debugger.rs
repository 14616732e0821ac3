use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::Message;

/// Step-through hook invoked after every completion when a request enables debugging.
///
/// A debugger only observes; it never influences what the loop does next.
#[async_trait]
pub trait Debugger: Send + Sync {
    async fn step(&self, tag: &str, conversation: &[Message], response: &str) -> Result<()>;
}

/// Prints each exchange to stderr and waits for Enter on stdin
pub struct StdinDebugger;

#[async_trait]
impl Debugger for StdinDebugger {
    async fn step(&self, tag: &str, conversation: &[Message], response: &str) -> Result<()> {
        eprintln!("==== {} ({} messages) ====", tag, conversation.len());
        for message in conversation {
            eprintln!("--- {} ---\n{}", message.role, message.content);
        }
        eprintln!("--- response ---\n{}", response);
        eprintln!("[{}] press Enter to continue", tag);

        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .context("failed to read from stdin")?;
        Ok(())
    }
}
