//! Batch accumulator and writer task
//!
//! The single consumer of the record channel. Owns the backlog maps and
//! both table stores, so no lock guards any of them. Runs a linear state
//! machine: RUNNING (poll, accumulate, flush at the threshold) →
//! DRAINING (exactly one final flush of whatever remains) → STOPPED.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::decoder::DecodedRecord;
use crate::records::{AuthorRecord, PostRecord};
use crate::shutdown::ShutdownToken;
use crate::store::{StoreError, TableStore};

/// How long one dequeue waits before re-checking the shutdown token.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(100);

const THROUGHPUT_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Counters reported by the writer task when it stops.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriterStats {
    pub records_received: u64,
    pub flushes: u64,
    pub posts_merged: u64,
    pub authors_merged: u64,
}

pub(crate) async fn run_writer(
    mut rx: mpsc::UnboundedReceiver<DecodedRecord>,
    shutdown: ShutdownToken,
    mut posts: TableStore<PostRecord>,
    mut authors: TableStore<AuthorRecord>,
    backlog_sz: usize,
) -> Result<WriterStats, StoreError> {
    let mut post_backlog: HashMap<u64, PostRecord> = HashMap::new();
    let mut author_backlog: HashMap<u64, AuthorRecord> = HashMap::new();
    let mut stats = WriterStats::default();

    let mut window_count = 0u64;
    let mut window_start = Instant::now();

    // RUNNING: poll until shutdown is requested or every producer is gone.
    // Records still queued when shutdown arrives are not read; only the
    // accumulated backlog is drained to disk.
    while !shutdown.is_requested() {
        match timeout(POLL_TIMEOUT, rx.recv()).await {
            Ok(Some(record)) => {
                // Later arrival for the same id overwrites the earlier one,
                // deduplicating within the batch.
                post_backlog.insert(record.post.post_id, record.post);
                author_backlog.insert(record.author.author_id, record.author);
                stats.records_received += 1;
                window_count += 1;

                if post_backlog.len().max(author_backlog.len()) >= backlog_sz {
                    log::info!("Backlog full - writing batch to disk");
                    flush_tables(
                        &mut posts,
                        &mut authors,
                        &mut post_backlog,
                        &mut author_backlog,
                        &mut stats,
                    )?;
                }

                if window_start.elapsed() >= THROUGHPUT_LOG_INTERVAL {
                    let rate = window_count as f64 / window_start.elapsed().as_secs_f64();
                    log::info!(
                        "📊 Ingestion rate: {:.1} records/sec (total: {})",
                        rate,
                        stats.records_received
                    );
                    window_count = 0;
                    window_start = Instant::now();
                }
            }
            // Producers dropped: nothing more will ever arrive.
            Ok(None) => break,
            // Empty poll is the ordinary steady state; re-check the flag.
            Err(_) => continue,
        }
    }

    // DRAINING: exactly one final flush. Zero-size is a no-op, not an error.
    if post_backlog.len().max(author_backlog.len()) > 0 {
        log::warn!(
            "Writing remaining backlog to disk ({} posts, {} authors)",
            post_backlog.len(),
            author_backlog.len()
        );
        flush_tables(
            &mut posts,
            &mut authors,
            &mut post_backlog,
            &mut author_backlog,
            &mut stats,
        )?;
    }

    log::info!(
        "Exiting write loop: {} records received, {} flushes",
        stats.records_received,
        stats.flushes
    );

    Ok(stats)
}

/// Merge both backlogs into their tables and rewrite the backing files.
/// Fixed order: posts before authors. A crash between the two leaves the
/// author table one batch behind the post table; accepted inconsistency
/// window rather than a multi-table transaction.
fn flush_tables(
    posts: &mut TableStore<PostRecord>,
    authors: &mut TableStore<AuthorRecord>,
    post_backlog: &mut HashMap<u64, PostRecord>,
    author_backlog: &mut HashMap<u64, AuthorRecord>,
    stats: &mut WriterStats,
) -> Result<(), StoreError> {
    let merged_posts = posts
        .flush(post_backlog.drain().map(|(_, v)| v))
        .map_err(|e| {
            log::error!("❌ Fatal: failed to flush post table: {}", e);
            e
        })?;
    let merged_authors = authors
        .flush(author_backlog.drain().map(|(_, v)| v))
        .map_err(|e| {
            log::error!("❌ Fatal: failed to flush author table: {}", e);
            e
        })?;

    stats.posts_merged += merged_posts as u64;
    stats.authors_merged += merged_authors as u64;
    stats.flushes += 1;

    Ok(())
}
