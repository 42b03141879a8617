use std::time::Duration;
use tokio::time::sleep;

/// Doubling retry delay with a cap and a retry budget.
#[derive(Debug)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    max_retries: u32,
    attempt: u32,
}

#[derive(Debug)]
pub struct RetriesExhausted;

impl std::fmt::Display for RetriesExhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Maximum retry attempts exceeded")
    }
}

impl std::error::Error for RetriesExhausted {}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, max_retries: u32) -> Self {
        Self {
            initial,
            max,
            max_retries,
            attempt: 0,
        }
    }

    pub async fn wait(&mut self) -> Result<(), RetriesExhausted> {
        if self.attempt >= self.max_retries {
            return Err(RetriesExhausted);
        }

        let delay = self
            .initial
            .saturating_mul(2u32.saturating_pow(self.attempt))
            .min(self.max);

        log::warn!(
            "⏳ Retry attempt {} of {} in {:.1}s",
            self.attempt + 1,
            self.max_retries,
            delay.as_secs_f64()
        );

        sleep(delay).await;
        self.attempt += 1;
        Ok(())
    }

    /// Called after a healthy stretch so the next fault starts cheap again.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_budget_is_enforced() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_millis(10), Duration::from_millis(40), 2);

        assert!(backoff.wait().await.is_ok());
        assert!(backoff.wait().await.is_ok());
        assert!(backoff.wait().await.is_err());

        backoff.reset();
        assert!(backoff.wait().await.is_ok());
    }
}
