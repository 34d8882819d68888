//! LABS Staking Ledger
//!
//! Off-chain mirror of on-chain staking activity: per-wallet balances, a
//! single global aggregate, an append-only activity log and the reward-rate
//! configuration.
//!
//! # Architecture
//!
//! - **Single Writer**: every mutation goes through one actor task, so wallet
//!   and aggregate updates never race
//! - **Atomic Commits**: a wallet row and the aggregate row are written in one
//!   RocksDB `WriteBatch`
//! - **Best-effort History**: activity events never fail a balance mutation
//! - **Signed Admin Path**: the reward rate changes only with a valid Ed25519
//!   signature from the configured administrator key
//!
//! # Invariants
//!
//! - Balances are never negative at rest
//! - `total_xlabs_claimed` only increases
//! - Aggregate totals equal the sum of wallet rows (maintained by deltas)
//! - Activity events are never modified or deleted

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod storage;
pub mod ledger;
pub mod reconciler;
pub mod settlement;
pub mod activity;
pub mod analytics;
pub mod admin;
pub mod crypto;
pub mod error;
pub mod actor;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, ErrorCategory, Result};
pub use types::{
    ActivityEvent, ActivityKind, ClaimTotals, DailyClaimBucket, DailyStakeBucket, GlobalAggregate,
    PendingTotals, RewardRateRecord, StakeDirection, WalletAccount, WalletAddress,
};
pub use activity::ActivityRecorder;
pub use admin::{AdminGate, RateUpdateRequest};
pub use analytics::{ConsistencyReport, LeaderboardEntry};
pub use ledger::{Ledger, Registration};
pub use storage::Storage;
pub use config::Config;
pub use metrics::Metrics;
