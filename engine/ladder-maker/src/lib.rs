//! Ladder Maker
//!
//! A constant-interval market maker. Each configured market carries a ladder of
//! post-only limit orders spaced a fixed fraction of a reference price apart.
//! When a rung fills, the ladder moves its midpoint and re-places the rung on
//! the opposite side, earning the spread between adjacent rungs.
//!
//! State for every ladder is saved after each tick so a restart resumes where
//! the previous process stopped.

pub mod book;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod service;
pub mod signals;

pub use book::Ladder;
pub use config::{load_config, LadderMakerConfig, MarketConfig};
pub use error::LadderError;
pub use models::*;
pub use service::{LadderHandle, LadderService};
