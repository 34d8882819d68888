//! Main ledger orchestration layer
//!
//! This module ties together storage, the writer actor and the admin gate
//! into the high-level API used by the HTTP service.
//!
//! # Example
//!
//! ```no_run
//! use stake_ledger::{Config, Ledger, StakeDirection};
//!
//! #[tokio::main]
//! async fn main() -> stake_ledger::Result<()> {
//!     let config = Config::default();
//!     let ledger = Ledger::open(config).await?;
//!
//!     ledger.register_wallet("7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU").await?;
//!     ledger
//!         .apply_stake_delta("7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU", 100, StakeDirection::Stake)
//!         .await?;
//!
//!     let series = ledger.query_daily_series(30).await?;
//!     assert_eq!(series.len(), 30);
//!
//!     ledger.shutdown().await
//! }
//! ```

use crate::{
    activity::ActivityRecorder,
    actor::{spawn_ledger_actor, LedgerHandle},
    admin::{AdminGate, RateUpdateRequest},
    analytics::{self, ConsistencyReport, LeaderboardEntry, SeriesWindow},
    metrics::Metrics,
    storage::StorageStats,
    types::{
        ClaimTotals, DailyClaimBucket, DailyStakeBucket, GlobalAggregate, PendingTotals,
        RewardRateRecord, StakeDirection, WalletAccount, WalletAddress,
    },
    Config, Error, Result, Storage,
};
use chrono::Utc;
use std::sync::Arc;

/// Outcome of a wallet connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// The wallet account, new or existing
    pub account: WalletAccount,

    /// `true` when this call created the account
    pub first_visit: bool,
}

/// Main ledger interface
#[derive(Debug)]
pub struct Ledger {
    /// Actor handle for mutations
    handle: LedgerHandle,

    /// Direct storage access (for reads of committed state)
    storage: Arc<Storage>,

    /// Reward-rate update verification
    gate: AdminGate,

    /// Metrics shared with the actor
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open ledger with configuration, recording activity in the same store
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let storage = Arc::new(Storage::open(&config)?);
        let recorder: Arc<dyn ActivityRecorder> = storage.clone();
        Self::assemble(config, storage, recorder)
    }

    /// Open ledger with a separate activity recorder
    pub async fn with_recorder(config: Config, recorder: Arc<dyn ActivityRecorder>) -> Result<Self> {
        config.validate()?;
        let storage = Arc::new(Storage::open(&config)?);
        Self::assemble(config, storage, recorder)
    }

    fn assemble(
        config: Config,
        storage: Arc<Storage>,
        recorder: Arc<dyn ActivityRecorder>,
    ) -> Result<Self> {
        let metrics = Metrics::new()
            .map_err(|e| Error::Other(format!("Failed to create metrics: {}", e)))?;
        let handle = spawn_ledger_actor(storage.clone(), recorder, metrics.clone(), &config);
        let gate = AdminGate::new(&config.admin);

        if !gate.is_configured() {
            tracing::warn!("No admin public key configured, reward-rate updates will be refused");
        }

        tracing::info!(
            data_dir = %config.data_dir.display(),
            batching = config.batching.enabled,
            "Ledger opened"
        );

        Ok(Self {
            handle,
            storage,
            gate,
            metrics,
            config,
        })
    }

    /// Record a wallet connection, creating the account on first visit
    pub async fn register_wallet(&self, wallet: &str) -> Result<Registration> {
        let wallet = WalletAddress::parse(wallet)?;
        let (account, first_visit) = self.handle.register_wallet(wallet).await?;
        Ok(Registration {
            account,
            first_visit,
        })
    }

    /// Overwrite the on-chain snapshot balances of a known wallet
    pub async fn sync_balances(
        &self,
        wallet: &str,
        labs_balance: u64,
        staked_balance: u64,
    ) -> Result<WalletAccount> {
        let wallet = WalletAddress::parse(wallet)?;
        self.handle
            .sync_balances(wallet, labs_balance, staked_balance)
            .await
    }

    /// Stake or unstake `amount` on a known wallet
    ///
    /// The activity event is written after the balances commit; a failed
    /// activity write is logged and counted but does not fail this call.
    pub async fn apply_stake_delta(
        &self,
        wallet: &str,
        amount: u64,
        direction: StakeDirection,
    ) -> Result<WalletAccount> {
        let wallet = WalletAddress::parse(wallet)?;
        if amount == 0 {
            return Err(Error::InvalidAmount("Amount must be positive".to_string()));
        }
        self.handle.apply_stake_delta(wallet, amount, direction).await
    }

    /// Set the wallet's pending claim to an absolute value
    pub async fn register_pending(&self, wallet: &str, pending_amount: u64) -> Result<PendingTotals> {
        let wallet = WalletAddress::parse(wallet)?;
        self.handle.register_pending(wallet, pending_amount).await
    }

    /// Confirm a claim of `amount` from the wallet's pending bucket
    pub async fn settle_claim(&self, wallet: &str, amount: u64) -> Result<ClaimTotals> {
        let wallet = WalletAddress::parse(wallet)?;
        if amount == 0 {
            return Err(Error::InvalidAmount("Amount must be positive".to_string()));
        }
        self.handle.settle_claim(wallet, amount).await
    }

    /// Daily staked/unstaked/net buckets for the last `days` UTC days
    pub async fn query_daily_series(&self, days: i64) -> Result<Vec<DailyStakeBucket>> {
        let window = SeriesWindow::new(days, Utc::now().date_naive())?;
        let events = self.handle.query_activity(window.start, window.end).await?;
        Ok(analytics::daily_stake_series(&window, &events))
    }

    /// Daily claimed buckets for the last `days` UTC days
    pub async fn query_claim_series(&self, days: i64) -> Result<Vec<DailyClaimBucket>> {
        let window = SeriesWindow::new(days, Utc::now().date_naive())?;
        let events = self.handle.query_activity(window.start, window.end).await?;
        Ok(analytics::daily_claim_series(&window, &events))
    }

    /// Full wallet record
    pub fn get_wallet(&self, wallet: &str) -> Result<WalletAccount> {
        let wallet = WalletAddress::parse(wallet)?;
        self.storage
            .get_wallet(&wallet)?
            .ok_or_else(|| Error::WalletNotFound(wallet.to_string()))
    }

    /// The global aggregate, zeroed before the first wallet
    pub fn global_stats(&self) -> Result<GlobalAggregate> {
        Ok(self
            .storage
            .get_aggregate()?
            .unwrap_or_else(|| GlobalAggregate::empty(0)))
    }

    /// Wallets with the most confirmed claims
    pub async fn top_claimers(&self, limit: Option<usize>) -> Result<Vec<LeaderboardEntry>> {
        let wallets = self.scan_wallets().await?;
        Ok(analytics::top_claimers(&wallets, analytics::leaderboard_limit(limit)))
    }

    /// Wallets with the largest pending claim
    pub async fn top_pending(&self, limit: Option<usize>) -> Result<Vec<LeaderboardEntry>> {
        let wallets = self.scan_wallets().await?;
        Ok(analytics::top_pending(&wallets, analytics::leaderboard_limit(limit)))
    }

    /// Full wallet scan on the blocking pool
    async fn scan_wallets(&self) -> Result<Vec<WalletAccount>> {
        let storage = self.storage.clone();
        tokio::task::spawn_blocking(move || storage.list_wallets())
            .await
            .map_err(|e| Error::Concurrency(format!("Wallet scan task failed: {}", e)))?
    }

    /// Compare the incremental aggregate with sums over wallet rows
    pub async fn check_aggregate_consistency(&self) -> Result<ConsistencyReport> {
        self.handle.audit_aggregate().await
    }

    /// Current reward rate, the configured initial rate before any update
    pub fn reward_rate(&self) -> Result<RewardRateRecord> {
        Ok(self
            .storage
            .get_reward_rate()?
            .unwrap_or_else(|| RewardRateRecord::initial(self.config.admin.initial_reward_rate)))
    }

    /// Verify and persist an admin reward-rate update
    pub async fn update_reward_rate(&self, request: &RateUpdateRequest) -> Result<RewardRateRecord> {
        let update = match self.gate.authorize(request) {
            Ok(update) => update,
            Err(e) => {
                tracing::warn!(
                    public_key = request.public_key.as_deref().unwrap_or("<none>"),
                    error = %e,
                    "Reward-rate update rejected"
                );
                self.metrics.record_admin_rejection(e.category().as_str());
                return Err(e);
            }
        };

        match self.handle.persist_reward_rate(update).await {
            Ok(record) => Ok(record),
            Err(e) => {
                self.metrics.record_admin_rejection(e.category().as_str());
                Err(e)
            }
        }
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Storage statistics
    pub fn storage_stats(&self) -> Result<StorageStats> {
        self.storage.get_stats()
    }

    /// Configuration the ledger was opened with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Flush batch immediately (for testing/shutdown)
    pub async fn flush_batch(&self) -> Result<()> {
        self.handle.flush_batch().await
    }

    /// Shutdown ledger
    pub async fn shutdown(&self) -> Result<()> {
        self.handle.shutdown().await
    }
}
