use async_trait::async_trait;

use crate::{PatternMatch, Result};

/// Abstraction over the alert channel.
///
/// `TelegramNotifier` in `crates/notify` implements this; tests substitute
/// counting fakes to assert dedup behavior.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one pattern alert. Fails with `Error::NotificationDelivery`;
    /// the caller must not mark the alert as sent in that case.
    async fn send_pattern_alert(
        &self,
        pattern: &PatternMatch,
        symbol: &str,
        timeframe: &str,
        current_price: f64,
    ) -> Result<()>;

    /// One-shot connectivity check sent at startup.
    async fn send_startup(&self) -> Result<()>;

    /// Operational error alert (e.g. a scan unit entering its failed state).
    async fn send_error(&self, message: &str) -> Result<()>;
}
