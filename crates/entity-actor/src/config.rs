//! Runtime tuning for entity actors.

use std::time::Duration;

/// Settings shared by every actor spawned from one [`ActorHost`](crate::ActorHost).
#[derive(Debug, Clone, PartialEq)]
pub struct ActorConfig {
    /// Capacity of each actor's request mailbox.
    pub mailbox_size: usize,
    /// Capacity of each subscriber channel. A subscriber that falls this far behind is dropped.
    pub subscriber_buffer: usize,
    /// Debounce window: a pending record waits at most this long before a flush starts.
    pub flush_interval: Duration,
    /// Queue length that triggers an immediate flush; also the maximum batch size.
    pub flush_threshold: usize,
    /// A flush running longer than this is treated as failed.
    pub flush_timeout: Duration,
    /// Stop actors that received no request for this long. `None` keeps them forever.
    pub idle_timeout: Option<Duration>,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_size: 64,
            subscriber_buffer: 32,
            flush_interval: Duration::from_secs(3),
            flush_threshold: 100,
            flush_timeout: Duration::from_secs(10),
            idle_timeout: Some(Duration::from_secs(600)),
        }
    }
}

impl ActorConfig {
    /// Clamps values that would stall an actor (zero capacities or batch sizes).
    pub fn normalized(mut self) -> Self {
        self.mailbox_size = self.mailbox_size.max(1);
        self.subscriber_buffer = self.subscriber_buffer.max(1);
        self.flush_threshold = self.flush_threshold.max(1);
        self
    }
}
