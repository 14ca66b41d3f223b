//! Typed clients that hide message passing behind domain methods.

pub mod engagement_client;

pub use engagement_client::EngagementClient;
