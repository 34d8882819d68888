//! Core types for the staking ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode) in storage
//! - camelCase JSON at the HTTP boundary
//! - Integer token base units for balances, exact decimal for the reward rate

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Fixed identifier of the global aggregate row
pub const GLOBAL_AGGREGATE_ID: &str = "global";

/// External-chain wallet address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Parse a wallet address, trimming surrounding whitespace
    pub fn parse(raw: &str) -> crate::Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(crate::Error::InvalidRequest(
                "Wallet address is required".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Off-chain mirror of one wallet's balances and claim history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAccount {
    /// Wallet address (unique key)
    pub wallet_address: WalletAddress,

    /// Primary token balance (on-chain snapshot)
    pub labs_balance: u64,

    /// Reward token balance
    #[serde(rename = "xLabsBalance")]
    pub xlabs_balance: u64,

    /// Currently staked amount
    pub staked_balance: u64,

    /// Cumulative unstaked amount
    pub unstaked_balance: u64,

    /// Accrued rewards not yet registered as claimable
    pub pending_rewards: u64,

    /// Confirmed claimed rewards (never decreases)
    #[serde(rename = "totalXLabsClaimed")]
    pub total_xlabs_claimed: u64,

    /// Claimable rewards awaiting settlement
    #[serde(rename = "pendingXLabsClaim")]
    pub pending_xlabs_claim: u64,

    /// Reward accrual checkpoint
    pub interest_index: u64,

    /// First time the wallet was observed (unix seconds)
    pub first_visit_time: i64,

    /// Last stake (unix seconds)
    pub last_stake_time: Option<i64>,

    /// Last unstake (unix seconds)
    pub last_unstake_time: Option<i64>,

    /// Last balance snapshot (unix seconds)
    pub last_balance_update: Option<i64>,

    /// Last confirmed claim (unix seconds)
    pub last_claim_time: Option<i64>,

    /// Last pending update (unix seconds)
    pub last_pending_update: Option<i64>,
}

impl WalletAccount {
    /// Zero-balance account observed at `now`
    pub fn new(wallet_address: WalletAddress, now: i64) -> Self {
        Self {
            wallet_address,
            labs_balance: 0,
            xlabs_balance: 0,
            staked_balance: 0,
            unstaked_balance: 0,
            pending_rewards: 0,
            total_xlabs_claimed: 0,
            pending_xlabs_claim: 0,
            interest_index: 0,
            first_visit_time: now,
            last_stake_time: None,
            last_unstake_time: None,
            last_balance_update: None,
            last_claim_time: None,
            last_pending_update: None,
        }
    }
}

/// Single row summarizing all wallet accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalAggregate {
    /// Number of wallet accounts ever created
    pub total_users: u64,

    /// Σ staked_balance
    pub total_staked: u64,

    /// Σ total_xlabs_claimed
    #[serde(rename = "totalXLabsClaimed")]
    pub total_xlabs_claimed: u64,

    /// Σ pending_xlabs_claim
    #[serde(rename = "totalPendingXLabs")]
    pub total_pending_xlabs: u64,

    /// Last mutation (unix seconds)
    pub last_updated: i64,

    /// Incremented on every committed write
    pub version: u64,
}

impl GlobalAggregate {
    /// Empty aggregate created alongside the first wallet
    pub fn empty(now: i64) -> Self {
        Self {
            total_users: 0,
            total_staked: 0,
            total_xlabs_claimed: 0,
            total_pending_xlabs: 0,
            last_updated: now,
            version: 0,
        }
    }

    /// Stamp a committed mutation
    pub fn touch(&mut self, now: i64) {
        self.last_updated = now;
        self.version += 1;
    }
}

/// Kind of recorded activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ActivityKind {
    /// Tokens moved into the staking position
    Stake = 1,
    /// Tokens withdrawn from the staking position
    Unstake = 2,
    /// Pending rewards confirmed as claimed
    Claim = 3,
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActivityKind::Stake => "stake",
            ActivityKind::Unstake => "unstake",
            ActivityKind::Claim => "claim",
        };
        write!(f, "{}", s)
    }
}

/// Direction of a stake delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StakeDirection {
    /// Increase staked balance
    Stake,
    /// Decrease staked balance
    Unstake,
}

impl StakeDirection {
    /// From the wire `isStaking` flag
    pub fn from_is_staking(is_staking: bool) -> Self {
        if is_staking {
            StakeDirection::Stake
        } else {
            StakeDirection::Unstake
        }
    }

    /// Activity kind recorded for this direction
    pub fn activity_kind(&self) -> ActivityKind {
        match self {
            StakeDirection::Stake => ActivityKind::Stake,
            StakeDirection::Unstake => ActivityKind::Unstake,
        }
    }
}

/// Immutable activity record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    /// Unique event ID (UUIDv7 for time-ordering)
    pub event_id: Uuid,

    /// Wallet that performed the action
    pub wallet_address: WalletAddress,

    /// Amount in token base units
    pub amount: u64,

    /// What happened
    pub kind: ActivityKind,

    /// When it happened (unix seconds)
    pub timestamp: i64,
}

impl ActivityEvent {
    /// New event stamped with a fresh ID
    pub fn new(wallet_address: WalletAddress, amount: u64, kind: ActivityKind, timestamp: i64) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            wallet_address,
            amount,
            kind,
            timestamp,
        }
    }

    /// UTC calendar day of the event
    pub fn day(&self) -> Option<NaiveDate> {
        DateTime::<Utc>::from_timestamp(self.timestamp, 0).map(|dt| dt.date_naive())
    }
}

/// Persisted reward-rate configuration value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardRateRecord {
    /// Reward rate in percent
    pub rate: Decimal,

    /// 0 until the first admin update
    pub version: u64,

    /// Last update (unix seconds)
    pub updated_at: Option<i64>,

    /// Administrator key that signed the last update (base58)
    pub updated_by: Option<String>,
}

impl RewardRateRecord {
    /// Record served before any admin update
    pub fn initial(rate: Decimal) -> Self {
        Self {
            rate,
            version: 0,
            updated_at: None,
            updated_by: None,
        }
    }
}

/// Per-wallet and global pending totals after `register_pending`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTotals {
    /// Wallet's pending claim
    pub user_pending_claim: u64,
    /// Aggregate pending claim
    pub global_pending_claim: u64,
}

/// Claimed and pending totals after `settle_claim`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimTotals {
    /// Wallet's confirmed claims
    pub user_total_claimed: u64,
    /// Aggregate confirmed claims
    pub global_total_claimed: u64,
    /// Wallet's remaining pending claim
    pub user_pending_claim: u64,
    /// Aggregate remaining pending claim
    pub global_pending_claim: u64,
}

/// One day of stake activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStakeBucket {
    /// Calendar day (UTC), serialized as YYYY-MM-DD
    pub date: NaiveDate,
    /// Sum of stake events
    pub staked: u64,
    /// Sum of unstake events
    pub unstaked: u64,
    /// staked − unstaked
    pub net: i128,
}

impl DailyStakeBucket {
    /// Zero-valued bucket
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            staked: 0,
            unstaked: 0,
            net: 0,
        }
    }
}

/// One day of claim activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyClaimBucket {
    /// Calendar day (UTC), serialized as YYYY-MM-DD
    pub date: NaiveDate,
    /// Sum of claim events
    pub claimed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_address_rejects_blank() {
        assert!(WalletAddress::parse("   ").is_err());
        assert_eq!(
            WalletAddress::parse(" 7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU ")
                .unwrap()
                .as_str(),
            "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU"
        );
    }

    #[test]
    fn test_new_account_is_zeroed() {
        let account = WalletAccount::new(WalletAddress::parse("wallet-a").unwrap(), 1_700_000_000);
        assert_eq!(account.staked_balance, 0);
        assert_eq!(account.pending_xlabs_claim, 0);
        assert_eq!(account.total_xlabs_claimed, 0);
        assert_eq!(account.first_visit_time, 1_700_000_000);
    }

    #[test]
    fn test_wallet_json_field_names() {
        let account = WalletAccount::new(WalletAddress::parse("wallet-a").unwrap(), 0);
        let json = serde_json::to_value(&account).unwrap();
        assert!(json.get("totalXLabsClaimed").is_some());
        assert!(json.get("pendingXLabsClaim").is_some());
        assert!(json.get("stakedBalance").is_some());
        assert_eq!(json["walletAddress"], "wallet-a");
    }

    #[test]
    fn test_event_day() {
        let event = ActivityEvent::new(
            WalletAddress::parse("wallet-a").unwrap(),
            5,
            ActivityKind::Stake,
            1_700_000_000, // 2023-11-14T22:13:20Z
        );
        assert_eq!(event.day(), NaiveDate::from_ymd_opt(2023, 11, 14));
    }

    #[test]
    fn test_aggregate_touch_bumps_version() {
        let mut aggregate = GlobalAggregate::empty(0);
        aggregate.touch(42);
        aggregate.touch(43);
        assert_eq!(aggregate.version, 2);
        assert_eq!(aggregate.last_updated, 43);
    }
}
