//! # Exchange Connector
//!
//! The narrow exchange capability the ladder engine trades through, plus one
//! REST adapter per supported venue.
//!
//! ## Architecture
//!
//! - **Exchange**: object-safe async trait every venue implements
//! - **BittrexClient / VertpigClient / PoloniexClient**: venue adapters, each owning
//!   its credentials and HTTP client
//! - **MockExchange**: scriptable in-memory venue for tests and dry runs
//! - **connect**: builds the configured venue as an `Arc<dyn Exchange>`

pub mod bittrex;
pub mod config;
pub mod error;
pub mod exchange;
pub mod mock;
pub mod poloniex;
pub mod signing;
pub mod types;
pub mod vertpig;

pub use bittrex::BittrexClient;
pub use config::{connect, VenueConfig, VenueKind};
pub use error::{ExchangeError, Result};
pub use exchange::Exchange;
pub use mock::MockExchange;
pub use poloniex::PoloniexClient;
pub use types::{Side, Ticker};
pub use vertpig::VertpigClient;
