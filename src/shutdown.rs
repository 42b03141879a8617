//! Cooperative shutdown signaling
//!
//! An explicit token passed into both the source loop and the writer task.
//! Cancellation is observed at poll-timeout boundaries, never preemptively.

use tokio::sync::watch;

/// Owner side: requests shutdown. Cloneable so a signal handler and the
/// lifecycle controller can share it.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: std::sync::Arc<watch::Sender<bool>>,
}

/// Observer side, held by the loops that must wind down.
#[derive(Debug, Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

/// Create a linked handle/token pair, initially not requested.
pub fn shutdown_pair() -> (ShutdownHandle, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (
        ShutdownHandle {
            tx: std::sync::Arc::new(tx),
        },
        ShutdownToken { rx },
    )
}

impl ShutdownHandle {
    pub fn request(&self) {
        // Receivers may already be gone during teardown; nothing to do then.
        let _ = self.tx.send(true);
    }

    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            rx: self.tx.subscribe(),
        }
    }
}

impl ShutdownToken {
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_observes_request() {
        let (handle, token) = shutdown_pair();
        assert!(!token.is_requested());

        handle.request();
        assert!(token.is_requested());
    }

    #[test]
    fn test_cloned_tokens_share_state() {
        let (handle, token) = shutdown_pair();
        let other = token.clone();
        let third = handle.token();

        handle.request();
        assert!(token.is_requested());
        assert!(other.is_requested());
        assert!(third.is_requested());
    }
}
