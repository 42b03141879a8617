//! Source consumption
//!
//! The loop that pulls raw events from a delivery transport and hands them
//! to the `EventSink`. Transport specifics live behind the `EventSource`
//! trait; the crate ships a JSONL reader for files and stdin, used for
//! local replay and development.
//!
//! Fault handling follows the sink's verdict: `on_error` decides whether a
//! fault is retryable, and retries run through exponential backoff until
//! the budget is spent.

use async_trait::async_trait;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::time::timeout;

use crate::backoff::ExponentialBackoff;
use crate::decoder::RawPost;
use crate::listener::EventSink;
use crate::shutdown::ShutdownToken;

/// How long one poll waits for an event before re-checking the shutdown
/// token.
pub const SOURCE_POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// Transport-level fault reported by a source.
#[derive(Debug)]
pub struct SourceFault {
    pub code: u16,
    pub message: String,
}

impl std::fmt::Display for SourceFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Source fault (code {}): {}", self.code, self.message)
    }
}

impl std::error::Error for SourceFault {}

impl From<std::io::Error> for SourceFault {
    fn from(err: std::io::Error) -> Self {
        SourceFault {
            code: 503,
            message: err.to_string(),
        }
    }
}

/// One delivery transport. `next_event` must be cancel-safe: the source
/// loop races it against its poll timeout.
#[async_trait]
pub trait EventSource: Send {
    /// Next raw event, or `Ok(None)` once the source is exhausted.
    async fn next_event(&mut self) -> Result<Option<RawPost>, SourceFault>;
}

/// Why the source loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOutcome {
    /// The source reported end of stream.
    Exhausted,
    /// The shutdown token was observed at a poll boundary.
    ShutdownRequested,
    /// The sink judged a fault terminal (e.g. rate-limit/ban).
    Terminal,
    /// Transport faults outlasted the retry budget.
    RetriesExhausted,
}

/// Pump events from `source` into `sink` until one of the four outcomes.
pub async fn run_source_loop<S: EventSource>(
    source: &mut S,
    sink: &EventSink,
    shutdown: &ShutdownToken,
) -> SourceOutcome {
    let mut backoff =
        ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60), 10);

    loop {
        if shutdown.is_requested() {
            log::info!("Shutdown requested - disconnecting source");
            return SourceOutcome::ShutdownRequested;
        }

        match timeout(SOURCE_POLL_TIMEOUT, source.next_event()).await {
            // Idle poll; go back and re-check the shutdown token.
            Err(_) => continue,
            Ok(Ok(Some(raw))) => {
                sink.on_event(raw);
                backoff.reset();
            }
            Ok(Ok(None)) => {
                log::info!("Event source exhausted");
                return SourceOutcome::Exhausted;
            }
            Ok(Err(fault)) => {
                log::warn!("{}", fault);
                if !sink.on_error(fault.code) {
                    return SourceOutcome::Terminal;
                }
                if backoff.wait().await.is_err() {
                    log::error!("❌ Source retry budget exhausted - giving up");
                    return SourceOutcome::RetriesExhausted;
                }
            }
        }
    }
}

/// Reads raw posts as JSON lines from any buffered async reader. Malformed
/// lines are logged and skipped; they never abort the stream. Filter terms,
/// when present, keep only posts whose text mentions at least one term.
pub struct JsonlEventSource<R> {
    lines: Lines<R>,
    filter_terms: Vec<String>,
}

impl JsonlEventSource<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl JsonlEventSource<BufReader<File>> {
    pub async fn open(path: impl AsRef<std::path::Path>) -> Result<Self, SourceFault> {
        let file = File::open(path).await?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R> JsonlEventSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            filter_terms: Vec::new(),
        }
    }

    pub fn with_filter(mut self, terms: Vec<String>) -> Self {
        self.filter_terms = terms.into_iter().map(|t| t.to_lowercase()).collect();
        self
    }

    fn matches(&self, raw: &RawPost) -> bool {
        if self.filter_terms.is_empty() {
            return true;
        }
        let text = raw
            .extended_text
            .as_deref()
            .unwrap_or(&raw.text)
            .to_lowercase();
        self.filter_terms.iter().any(|term| text.contains(term))
    }
}

#[async_trait]
impl<R> EventSource for JsonlEventSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_event(&mut self) -> Result<Option<RawPost>, SourceFault> {
        loop {
            match self.lines.next_line().await? {
                Some(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<RawPost>(&line) {
                        Ok(raw) if self.matches(&raw) => return Ok(Some(raw)),
                        Ok(raw) => {
                            log::debug!("Post {} filtered out", raw.id);
                        }
                        Err(e) => {
                            log::warn!("Skipping malformed event line: {}", e);
                        }
                    }
                }
                None => return Ok(None),
            }
        }
    }
}
