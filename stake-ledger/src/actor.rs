//! Actor-based concurrency for the ledger
//!
//! Every mutation is a message to one writer task:
//! - One logical writer eliminates lost updates on wallet rows and the
//!   aggregate, including the read-before-write of `register_pending`
//! - Wallet and aggregate rows are committed in one `WriteBatch`
//! - Activity events are batched and flushed on size or timeout
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 HTTP handlers                         │
//! │             Many concurrent requests                  │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │  read wallet + aggregate → transition → WriteBatch    │
//! │  ┌────────────────────────────────────────────────┐  │
//! │  │ Batch: Vec<ActivityEvent>                      │  │
//! │  │ Timer: 50ms or 100 events → flush_batch()     │  │
//! │  └────────────────────────────────────────────────┘  │
//! │                       │                               │
//! │                       ▼                               │
//! │           ActivityRecorder::append()                  │
//! │       (failures logged and counted, never fatal)      │
//! └───────────────────────────────────────────────────────┘
//! ```

use crate::{
    activity::{validate_event, ActivityRecorder},
    admin::AuthorizedRateUpdate,
    analytics::{audit_aggregate, ConsistencyReport},
    metrics::Metrics,
    reconciler, settlement,
    types::{
        ActivityEvent, ActivityKind, ClaimTotals, GlobalAggregate, PendingTotals,
        RewardRateRecord, StakeDirection, WalletAccount, WalletAddress,
    },
    Config, Error, Result, Storage,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Duration};

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Create the wallet account if it was never observed
    RegisterWallet {
        wallet: WalletAddress,
        response: oneshot::Sender<Result<(WalletAccount, bool)>>,
    },

    /// Overwrite on-chain snapshot balances
    SyncBalances {
        wallet: WalletAddress,
        labs_balance: u64,
        staked_balance: u64,
        response: oneshot::Sender<Result<WalletAccount>>,
    },

    /// Stake or unstake
    ApplyStakeDelta {
        wallet: WalletAddress,
        amount: u64,
        direction: StakeDirection,
        response: oneshot::Sender<Result<WalletAccount>>,
    },

    /// Replace the pending claim
    RegisterPending {
        wallet: WalletAddress,
        pending_amount: u64,
        response: oneshot::Sender<Result<PendingTotals>>,
    },

    /// Confirm a claim
    SettleClaim {
        wallet: WalletAddress,
        amount: u64,
        response: oneshot::Sender<Result<ClaimTotals>>,
    },

    /// Activity events in `[start, end]`, after flushing the batch
    QueryActivity {
        start: i64,
        end: i64,
        response: oneshot::Sender<Result<Vec<ActivityEvent>>>,
    },

    /// Recompute totals from wallet rows
    AuditAggregate {
        response: oneshot::Sender<Result<ConsistencyReport>>,
    },

    /// Persist an authorized reward rate
    PersistRewardRate {
        update: AuthorizedRateUpdate,
        response: oneshot::Sender<Result<RewardRateRecord>>,
    },

    /// Flush batch immediately (for testing/shutdown)
    FlushBatch {
        response: oneshot::Sender<Result<()>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes ledger messages
#[derive(Debug)]
pub struct LedgerActor {
    /// Wallet, aggregate and config rows
    storage: Arc<Storage>,

    /// Activity sink
    recorder: Arc<dyn ActivityRecorder>,

    /// Metrics
    metrics: Metrics,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,

    /// Pending activity events
    batch: Vec<ActivityEvent>,

    /// Maximum batch size (events)
    max_batch_size: usize,

    /// Batch timeout
    batch_timeout: Duration,

    /// Batching enabled
    batching_enabled: bool,

    /// Rate served before the first admin update
    initial_reward_rate: Decimal,

    /// Refuse signatures already accepted once
    reject_replayed_signatures: bool,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        storage: Arc<Storage>,
        recorder: Arc<dyn ActivityRecorder>,
        metrics: Metrics,
        mailbox: mpsc::Receiver<LedgerMessage>,
        config: &Config,
    ) -> Self {
        Self {
            storage,
            recorder,
            metrics,
            mailbox,
            batch: Vec::with_capacity(config.batching.max_batch_size),
            max_batch_size: config.batching.max_batch_size,
            batch_timeout: Duration::from_millis(config.batching.batch_timeout_ms.max(1)),
            batching_enabled: config.batching.enabled,
            initial_reward_rate: config.admin.initial_reward_rate,
            reject_replayed_signatures: config.admin.reject_replayed_signatures,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let mut batch_timer = interval(self.batch_timeout);
        batch_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // Process incoming messages
                Some(msg) = self.mailbox.recv() => {
                    if let LedgerMessage::Shutdown = msg {
                        self.flush_batch();
                        break;
                    }

                    self.handle_message(msg);

                    // Check if batch is full
                    if self.batching_enabled && self.batch.len() >= self.max_batch_size {
                        self.flush_batch();
                    }
                }

                // Batch timeout expired
                _ = batch_timer.tick(), if self.batching_enabled && !self.batch.is_empty() => {
                    self.flush_batch();
                }

                // Mailbox closed
                else => {
                    self.flush_batch();
                    break;
                }
            }
        }

        tracing::debug!("Ledger actor stopped");
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::RegisterWallet { wallet, response } => {
                let result = self.timed("register_wallet", |actor| actor.register_wallet(wallet));
                let _ = response.send(result);
            }

            LedgerMessage::SyncBalances {
                wallet,
                labs_balance,
                staked_balance,
                response,
            } => {
                let result = self.timed("sync_balances", |actor| {
                    actor.sync_balances(wallet, labs_balance, staked_balance)
                });
                let _ = response.send(result);
            }

            LedgerMessage::ApplyStakeDelta {
                wallet,
                amount,
                direction,
                response,
            } => {
                let operation = match direction {
                    StakeDirection::Stake => "stake",
                    StakeDirection::Unstake => "unstake",
                };
                let result = self.timed(operation, |actor| {
                    actor.apply_stake_delta(wallet, amount, direction)
                });
                let _ = response.send(result);
            }

            LedgerMessage::RegisterPending {
                wallet,
                pending_amount,
                response,
            } => {
                let result = self.timed("register_pending", |actor| {
                    actor.register_pending(wallet, pending_amount)
                });
                let _ = response.send(result);
            }

            LedgerMessage::SettleClaim {
                wallet,
                amount,
                response,
            } => {
                let result = self.timed("settle_claim", |actor| actor.settle_claim(wallet, amount));
                let _ = response.send(result);
            }

            LedgerMessage::QueryActivity {
                start,
                end,
                response,
            } => {
                self.flush_batch();
                let _ = response.send(self.recorder.events_between(start, end));
            }

            LedgerMessage::AuditAggregate { response } => {
                let result = self.audit_aggregate();
                let _ = response.send(result);
            }

            LedgerMessage::PersistRewardRate { update, response } => {
                let result =
                    self.timed("update_reward_rate", |actor| actor.persist_reward_rate(update));
                let _ = response.send(result);
            }

            LedgerMessage::FlushBatch { response } => {
                self.flush_batch();
                let _ = response.send(Ok(()));
            }

            LedgerMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }

    fn timed<T>(&mut self, operation: &str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let started = Instant::now();
        let result = f(self);
        self.metrics
            .record_mutation(operation, result.is_ok(), started.elapsed().as_secs_f64());
        if let Err(ref e) = result {
            tracing::debug!(operation, error = %e, "Mutation rejected");
        }
        result
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn load_aggregate(&self, now: i64) -> Result<GlobalAggregate> {
        Ok(self
            .storage
            .get_aggregate()?
            .unwrap_or_else(|| GlobalAggregate::empty(now)))
    }

    fn load_existing(&self, wallet: &WalletAddress) -> Result<WalletAccount> {
        self.storage
            .get_wallet(wallet)?
            .ok_or_else(|| Error::WalletNotFound(wallet.to_string()))
    }

    fn register_wallet(&mut self, wallet: WalletAddress) -> Result<(WalletAccount, bool)> {
        let now = Self::now();
        let existing = self.storage.get_wallet(&wallet)?;
        if let Some(account) = existing {
            return Ok((account, false));
        }

        let mut aggregate = self.load_aggregate(now)?;
        let (account, created) = reconciler::register_wallet(None, wallet, &mut aggregate, now);
        self.storage.put_wallet_and_aggregate(&account, &aggregate)?;

        tracing::info!(
            wallet = %account.wallet_address,
            total_users = aggregate.total_users,
            "New wallet registered"
        );
        Ok((account, created))
    }

    fn sync_balances(
        &mut self,
        wallet: WalletAddress,
        labs_balance: u64,
        staked_balance: u64,
    ) -> Result<WalletAccount> {
        let mut account = self.load_existing(&wallet)?;
        reconciler::sync_balances(&mut account, labs_balance, staked_balance, Self::now());
        self.storage.put_wallet(&account)?;
        Ok(account)
    }

    fn apply_stake_delta(
        &mut self,
        wallet: WalletAddress,
        amount: u64,
        direction: StakeDirection,
    ) -> Result<WalletAccount> {
        let now = Self::now();
        let mut account = self.load_existing(&wallet)?;
        let mut aggregate = self.load_aggregate(now)?;

        reconciler::apply_stake_delta(&mut account, &mut aggregate, amount, direction, now)?;
        self.storage.put_wallet_and_aggregate(&account, &aggregate)?;

        tracing::info!(
            wallet = %wallet,
            amount,
            direction = ?direction,
            staked_balance = account.staked_balance,
            total_staked = aggregate.total_staked,
            "Stake delta applied"
        );

        self.record_activity(ActivityEvent::new(wallet, amount, direction.activity_kind(), now));
        Ok(account)
    }

    fn register_pending(
        &mut self,
        wallet: WalletAddress,
        pending_amount: u64,
    ) -> Result<PendingTotals> {
        let now = Self::now();
        let existing = self.storage.get_wallet(&wallet)?;
        let mut aggregate = self.load_aggregate(now)?;

        let (mut account, created) =
            reconciler::register_wallet(existing, wallet, &mut aggregate, now);
        let totals = settlement::register_pending(&mut account, &mut aggregate, pending_amount, now)?;
        self.storage.put_wallet_and_aggregate(&account, &aggregate)?;

        tracing::info!(
            wallet = %account.wallet_address,
            pending = totals.user_pending_claim,
            global_pending = totals.global_pending_claim,
            created,
            "Pending claim registered"
        );
        Ok(totals)
    }

    fn settle_claim(&mut self, wallet: WalletAddress, amount: u64) -> Result<ClaimTotals> {
        let now = Self::now();
        let mut account = self.load_existing(&wallet)?;
        let mut aggregate = self.load_aggregate(now)?;

        let totals = settlement::settle_claim(&mut account, &mut aggregate, amount, now)?;
        self.storage.put_wallet_and_aggregate(&account, &aggregate)?;

        tracing::info!(
            wallet = %wallet,
            amount,
            total_claimed = totals.user_total_claimed,
            "Claim settled"
        );

        self.record_activity(ActivityEvent::new(wallet, amount, ActivityKind::Claim, now));
        Ok(totals)
    }

    fn audit_aggregate(&mut self) -> Result<ConsistencyReport> {
        let wallets = self.storage.list_wallets()?;
        let aggregate = self.load_aggregate(Self::now())?;
        let report = audit_aggregate(&wallets, aggregate);

        if !report.consistent {
            tracing::warn!(
                wallets = report.wallet_count,
                total_users = report.aggregate.total_users,
                total_staked = report.aggregate.total_staked,
                summed_staked = report.summed_staked,
                total_pending = report.aggregate.total_pending_xlabs,
                summed_pending = report.summed_pending_xlabs,
                "Global aggregate drifted from wallet rows"
            );
        }
        Ok(report)
    }

    fn persist_reward_rate(&mut self, update: AuthorizedRateUpdate) -> Result<RewardRateRecord> {
        if self.reject_replayed_signatures
            && self.storage.has_signature_digest(&update.signature_digest)?
        {
            return Err(Error::Unauthorized("Signature already used".to_string()));
        }

        let current = self
            .storage
            .get_reward_rate()?
            .unwrap_or_else(|| RewardRateRecord::initial(self.initial_reward_rate));

        let record = RewardRateRecord {
            rate: update.rate,
            version: current.version + 1,
            updated_at: Some(Self::now()),
            updated_by: Some(update.admin_key),
        };
        self.storage
            .put_reward_rate(&record, Some(&update.signature_digest))?;

        tracing::info!(
            previous = %current.rate,
            rate = %record.rate,
            version = record.version,
            "Reward rate updated"
        );
        Ok(record)
    }

    /// Queue or write an activity event; failures never reach the caller
    fn record_activity(&mut self, event: ActivityEvent) {
        if let Err(e) = validate_event(&event) {
            tracing::warn!(error = %e, "Dropping malformed activity event");
            self.metrics.record_activity_failure(1);
            return;
        }

        if self.batching_enabled {
            self.batch.push(event);
        } else {
            self.write_events(std::slice::from_ref(&event));
        }
    }

    /// Flush current batch to the recorder
    fn flush_batch(&mut self) {
        if self.batch.is_empty() {
            return;
        }

        let events = std::mem::take(&mut self.batch);
        tracing::debug!("Flushing batch of {} activity events", events.len());
        self.metrics.record_batch_flush(events.len());
        self.write_events(&events);
    }

    fn write_events(&self, events: &[ActivityEvent]) {
        match self.recorder.append(events) {
            Ok(()) => self.metrics.record_activity_written(events.len()),
            Err(e) => {
                tracing::error!(
                    count = events.len(),
                    error = %e,
                    "Failed to record activity, balances already committed"
                );
                self.metrics.record_activity_failure(events.len());
            }
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> LedgerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Register a wallet, `true` if it was created
    pub async fn register_wallet(&self, wallet: WalletAddress) -> Result<(WalletAccount, bool)> {
        self.request(|response| LedgerMessage::RegisterWallet { wallet, response })
            .await
    }

    /// Overwrite snapshot balances
    pub async fn sync_balances(
        &self,
        wallet: WalletAddress,
        labs_balance: u64,
        staked_balance: u64,
    ) -> Result<WalletAccount> {
        self.request(|response| LedgerMessage::SyncBalances {
            wallet,
            labs_balance,
            staked_balance,
            response,
        })
        .await
    }

    /// Stake or unstake
    pub async fn apply_stake_delta(
        &self,
        wallet: WalletAddress,
        amount: u64,
        direction: StakeDirection,
    ) -> Result<WalletAccount> {
        self.request(|response| LedgerMessage::ApplyStakeDelta {
            wallet,
            amount,
            direction,
            response,
        })
        .await
    }

    /// Replace the pending claim
    pub async fn register_pending(
        &self,
        wallet: WalletAddress,
        pending_amount: u64,
    ) -> Result<PendingTotals> {
        self.request(|response| LedgerMessage::RegisterPending {
            wallet,
            pending_amount,
            response,
        })
        .await
    }

    /// Confirm a claim
    pub async fn settle_claim(&self, wallet: WalletAddress, amount: u64) -> Result<ClaimTotals> {
        self.request(|response| LedgerMessage::SettleClaim {
            wallet,
            amount,
            response,
        })
        .await
    }

    /// Activity events in `[start, end]`
    pub async fn query_activity(&self, start: i64, end: i64) -> Result<Vec<ActivityEvent>> {
        self.request(|response| LedgerMessage::QueryActivity {
            start,
            end,
            response,
        })
        .await
    }

    /// Compare the aggregate with recomputed sums
    pub async fn audit_aggregate(&self) -> Result<ConsistencyReport> {
        self.request(|response| LedgerMessage::AuditAggregate { response })
            .await
    }

    /// Persist an authorized reward rate
    pub async fn persist_reward_rate(&self, update: AuthorizedRateUpdate) -> Result<RewardRateRecord> {
        self.request(|response| LedgerMessage::PersistRewardRate { update, response })
            .await
    }

    /// Flush batch immediately (for testing)
    pub async fn flush_batch(&self) -> Result<()> {
        self.request(|response| LedgerMessage::FlushBatch { response })
            .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(
    storage: Arc<Storage>,
    recorder: Arc<dyn ActivityRecorder>,
    metrics: Metrics,
    config: &Config,
) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(1000); // Bounded channel for backpressure
    let actor = LedgerActor::new(storage, recorder, metrics, rx, config);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(batching: bool) -> (tempfile::TempDir, Arc<Storage>, Metrics, LedgerHandle) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        config.batching.enabled = batching;
        config.batching.max_batch_size = 10;
        config.batching.batch_timeout_ms = 50;

        let storage = Arc::new(Storage::open(&config).unwrap());
        let metrics = Metrics::new().unwrap();
        let handle = spawn_ledger_actor(storage.clone(), storage.clone(), metrics.clone(), &config);
        (temp_dir, storage, metrics, handle)
    }

    fn wallet(name: &str) -> WalletAddress {
        WalletAddress::parse(name).unwrap()
    }

    #[tokio::test]
    async fn test_actor_spawn_and_shutdown() {
        let (_dir, _storage, _metrics, handle) = setup(true);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_register_commits_wallet_and_aggregate() {
        let (_dir, storage, _metrics, handle) = setup(false);

        let (account, created) = handle.register_wallet(wallet("wallet-a")).await.unwrap();
        assert!(created);
        assert_eq!(account.staked_balance, 0);

        let (_, created_again) = handle.register_wallet(wallet("wallet-a")).await.unwrap();
        assert!(!created_again);

        assert_eq!(storage.get_aggregate().unwrap().unwrap().total_users, 1);
        assert!(storage.get_wallet(&wallet("wallet-a")).unwrap().is_some());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_stake_on_unknown_wallet_is_not_found() {
        let (_dir, _storage, _metrics, handle) = setup(false);

        let result = handle
            .apply_stake_delta(wallet("ghost"), 5, StakeDirection::Stake)
            .await;
        assert!(matches!(result, Err(Error::WalletNotFound(_))));

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_batching() {
        let (_dir, _storage, metrics, handle) = setup(true);
        handle.register_wallet(wallet("wallet-a")).await.unwrap();

        for _ in 0..5 {
            handle
                .apply_stake_delta(wallet("wallet-a"), 10, StakeDirection::Stake)
                .await
                .unwrap();
        }

        // Query flushes the pending batch first
        let events = handle.query_activity(0, i64::MAX).await.unwrap();
        assert_eq!(events.len(), 5);
        assert!(events.iter().all(|e| e.kind == ActivityKind::Stake));
        assert_eq!(metrics.activity_events_total.get(), 5);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_batch_flushes_on_timeout() {
        let (_dir, storage, _metrics, handle) = setup(true);
        handle.register_wallet(wallet("wallet-a")).await.unwrap();
        handle
            .apply_stake_delta(wallet("wallet-a"), 10, StakeDirection::Stake)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(storage.events_between(0, i64::MAX).unwrap().len(), 1);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_register_pending_creates_wallet() {
        let (_dir, storage, _metrics, handle) = setup(false);

        let totals = handle.register_pending(wallet("wallet-b"), 40).await.unwrap();
        assert_eq!(totals.user_pending_claim, 40);
        assert_eq!(totals.global_pending_claim, 40);

        let aggregate = storage.get_aggregate().unwrap().unwrap();
        assert_eq!(aggregate.total_users, 1);

        handle.shutdown().await.unwrap();
    }
}
