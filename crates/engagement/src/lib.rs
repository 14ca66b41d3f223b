//! # Engagement Aggregation
//!
//! Real-time engagement counters for a news platform: likes, saves, shares, comments
//! and views per article, plus platform-wide metrics. Every entity is owned by one
//! actor that applies interactions serially, pushes changes to live subscribers and
//! mirrors its records into the System-of-Record in the background.
//!
//! This library exposes the core modules of the application for integration testing.

pub mod clients;
pub mod engagement_actor;
pub mod lifecycle;
pub mod model;
pub mod system_of_record;
