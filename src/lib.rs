//! Paper Trading Client Library
//!
//! Client-side adapter for the on-chain paper trading program. Builds, signs,
//! submits, and reconciles transactions across the ephemeral rollup and the
//! canonical base chain.

pub mod accounts;
pub mod aggregator;
pub mod client;
pub mod config;
pub mod ecs;
pub mod error;
pub mod instructions;
pub mod pairs;
pub mod pda;
pub mod scale;
pub mod signer;
pub mod submit;
pub mod venue;

// Re-export commonly used types
pub use client::{AccountStatus, InitializeOutcome, PaperTradingClient};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use submit::SubmissionReceipt;
pub use venue::{VenueKind, VenueTransport};
