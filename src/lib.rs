//! Particulate-matter alert service for Korean air-quality data.
//!
//! Polls AirKorea (and KMA for the weather digest) through data.go.kr,
//! normalizes the responses, classifies and filters them, and delivers one
//! formatted message to Telegram per run.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod error;
pub mod forecast;
pub mod format;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod notify;
pub mod pipeline;
pub mod regions;
