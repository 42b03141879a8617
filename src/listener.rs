//! Event delivery surface
//!
//! The only interface the source's delivery context touches. Decoding and
//! enqueueing run synchronously on the caller and never block: the channel
//! is unbounded, trading memory for never stalling upstream delivery.

use tokio::sync::mpsc;

use crate::decoder::{decode_event, DecodedRecord, RawPost};

/// HTTP-style code the source reports when the server rate-limits a
/// client that reconnects too aggressively. Terminal: retrying makes it
/// worse, the stream must stop.
pub const CODE_RATE_LIMITED: u16 = 420;

/// Producer handle into the write queue. Cheap to clone.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<DecodedRecord>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<DecodedRecord>) -> Self {
        Self { tx }
    }

    /// Decode one raw event and enqueue every resulting record.
    pub fn on_event(&self, raw: RawPost) {
        for record in decode_event(raw) {
            log::debug!(
                "Queueing post {} by @{}",
                record.post.post_id,
                record.author.handle
            );
            if self.tx.send(record).is_err() {
                // Writer already stopped; records submitted after stop are
                // dropped by contract.
                log::debug!("Record dropped: writer is no longer running");
            }
        }
    }

    /// Source error callback. Returns whether the source should keep
    /// retrying (with its own backoff) or stop permanently.
    pub fn on_error(&self, status_code: u16) -> bool {
        log::warn!("Got error code from event source: {}", status_code);

        if status_code == CODE_RATE_LIMITED {
            log::error!("❌ Rate limited - disconnecting for good");
            return false;
        }

        log::warn!("Reconnecting, with backoff");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn raw(id: u64) -> RawPost {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "text": format!("post {}", id),
            "created_at": Utc.with_ymd_and_hms(2020, 10, 25, 12, 0, 0).unwrap(),
            "author": {
                "id": id + 100,
                "name": "Author",
                "handle": "author",
                "created_at": Utc.with_ymd_and_hms(2019, 5, 1, 0, 0, 0).unwrap()
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_on_event_enqueues_decoded_record() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(tx);

        sink.on_event(raw(1));

        let record = rx.recv().await.unwrap();
        assert_eq!(record.post.post_id, 1);
    }

    #[tokio::test]
    async fn test_quote_enqueues_both_records() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(tx);

        let mut wrapper = raw(2);
        wrapper.quoted_post = Some(Box::new(raw(1)));
        sink.on_event(wrapper);

        assert_eq!(rx.recv().await.unwrap().post.post_id, 2);
        assert_eq!(rx.recv().await.unwrap().post.post_id, 1);
    }

    #[test]
    fn test_on_error_stops_on_rate_limit() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(tx);

        assert!(!sink.on_error(CODE_RATE_LIMITED));
        assert!(sink.on_error(503));
    }

    #[tokio::test]
    async fn test_on_event_after_stop_is_dropped_silently() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(tx);
        drop(rx);

        // Must not panic or block.
        sink.on_event(raw(1));
    }
}
