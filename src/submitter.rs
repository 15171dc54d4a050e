//! Sequential message submission with confirmation tracking.
//!
//! One signing key owns one mutable sequence counter, so messages are
//! submitted strictly one at a time: read the counter, send, then poll
//! until the counter advances or the confirmation window closes.
//! Concurrent sends would race on the counter and could double-spend or
//! be silently dropped; do not parallelize this path.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::chain::{ChainSender, OutboundMessage};
use crate::models::TradeResult;

/// Default pause between confirmation polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default hard ceiling on the confirmation wait per message.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(180);

/// Submits messages through a [`ChainSender`], one at a time.
pub struct Submitter<S: ChainSender> {
    sender: S,
    poll_interval: Duration,
    confirm_timeout: Duration,
}

impl<S: ChainSender> Submitter<S> {
    pub fn new(sender: S) -> Self {
        Submitter {
            sender,
            poll_interval: DEFAULT_POLL_INTERVAL,
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
        }
    }

    /// Overrides the poll cadence and confirmation ceiling.
    pub fn with_timing(mut self, poll_interval: Duration, confirm_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.confirm_timeout = confirm_timeout;
        self
    }

    /// Submits each message in order, waiting for the previous one to
    /// confirm (or time out) before sending the next.
    ///
    /// Best-effort per entry: a failed or unconfirmed message is
    /// recorded and never aborts the rest of the batch. An unconfirmed
    /// result is not a hard failure — the message may still land after
    /// the window closes.
    pub async fn submit(&self, messages: &[OutboundMessage]) -> Vec<TradeResult> {
        let mut results = Vec::with_capacity(messages.len());
        for (i, message) in messages.iter().enumerate() {
            results.push(self.submit_one(i, message).await);
        }
        results
    }

    async fn submit_one(&self, index: usize, message: &OutboundMessage) -> TradeResult {
        let started = Instant::now();

        let sequence = match self.sender.sequence_number().await {
            Ok(s) => s,
            Err(e) => {
                warn!(index, error = %e, "sequence number read failed");
                return TradeResult {
                    sequence_number: None,
                    confirmed: false,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    error: Some(format!("sequence number read failed: {e}")),
                };
            }
        };

        if let Err(e) = self.sender.send(message).await {
            warn!(index, sequence, error = %e, "send failed");
            return TradeResult {
                sequence_number: Some(sequence),
                confirmed: false,
                elapsed_ms: started.elapsed().as_millis() as u64,
                error: Some(format!("send failed: {e}")),
            };
        }
        info!(
            index,
            sequence,
            destination = %message.destination,
            "message sent, awaiting confirmation"
        );

        let confirmed = self.await_confirmation(sequence, started).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if confirmed {
            info!(index, sequence, elapsed_ms, "message confirmed");
        } else {
            warn!(index, sequence, elapsed_ms, "confirmation window closed");
        }
        TradeResult {
            sequence_number: Some(sequence),
            confirmed,
            elapsed_ms,
            error: None,
        }
    }

    /// Polls until the sequence counter advances past `sequence`. The
    /// timeout is a hard ceiling; there is no indefinite waiting.
    async fn await_confirmation(&self, sequence: u32, started: Instant) -> bool {
        loop {
            let elapsed = started.elapsed();
            if elapsed >= self.confirm_timeout {
                return false;
            }
            let nap = self.poll_interval.min(self.confirm_timeout - elapsed);
            tokio::time::sleep(nap).await;

            match self.sender.sequence_number().await {
                Ok(current) if current > sequence => return true,
                Ok(_) => {}
                // Transient read failures don't end the wait; the
                // ceiling above bounds the total time.
                Err(e) => warn!(sequence, error = %e, "confirmation poll failed"),
            }
        }
    }
}
