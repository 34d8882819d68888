use crate::errors::{ApiError, Result};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use stake_ledger::{
    analytics::LeaderboardEntry, DailyClaimBucket, DailyStakeBucket, RewardRateRecord,
    WalletAccount,
};

// ============== Requests ==============
//
// Fields are optional so that a missing field is answered with a validation
// error naming it, rather than a generic body rejection.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    pub wallet_address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBalancesRequest {
    pub wallet_address: Option<String>,
    pub labs_balance: Option<i64>,
    pub staked_balance: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePendingRequest {
    pub wallet_address: Option<String>,
    pub pending_amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeActivityRequest {
    pub wallet_address: Option<String>,
    pub amount: Option<i64>,
    pub is_staking: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub wallet_address: Option<String>,
    pub amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

/// Non-blank wallet address or a validation error
pub fn require_wallet(wallet_address: Option<&str>) -> Result<&str> {
    match wallet_address.map(str::trim) {
        Some(wallet) if !wallet.is_empty() => Ok(wallet),
        _ => Err(ApiError::missing_fields("walletAddress")),
    }
}

/// Non-negative base-unit amount
pub fn to_amount(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| {
        ApiError::Ledger(stake_ledger::Error::InvalidAmount(format!(
            "{} cannot be negative",
            field
        )))
    })
}

// ============== Responses ==============

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub wallet_address: String,
    pub first_visit: bool,
    #[serde(rename = "totalXLabsClaimed")]
    pub total_xlabs_claimed: u64,
    #[serde(rename = "pendingXLabsClaim")]
    pub pending_xlabs_claim: u64,
    pub staked_balance: u64,
}

impl UserSummary {
    pub fn new(account: &WalletAccount, first_visit: bool) -> Self {
        Self {
            wallet_address: account.wallet_address.to_string(),
            first_visit,
            total_xlabs_claimed: account.total_xlabs_claimed,
            pending_xlabs_claim: account.pending_xlabs_claim,
            staked_balance: account.staked_balance,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub success: bool,
    pub user: UserSummary,
}

#[derive(Debug, Serialize)]
pub struct Balances {
    pub labs: u64,
    pub staked: u64,
}

#[derive(Debug, Serialize)]
pub struct UpdateBalancesResponse {
    pub success: bool,
    pub balances: Balances,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePendingResponse {
    pub success: bool,
    pub user_pending_claim: u64,
    pub global_pending_claim: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeActivityResponse {
    pub success: bool,
    pub message: String,
    pub amount: u64,
    pub is_staking: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResponse {
    pub success: bool,
    pub message: String,
    pub amount: u64,
    pub user_total_claimed: u64,
    pub global_total_claimed: u64,
    pub user_pending_claim: u64,
    pub global_pending_claim: u64,
}

#[derive(Debug, Serialize)]
pub struct StakeSeriesResponse {
    pub success: bool,
    pub data: Vec<DailyStakeBucket>,
    pub days: i64,
}

#[derive(Debug, Serialize)]
pub struct ClaimSeriesResponse {
    pub success: bool,
    pub data: Vec<DailyClaimBucket>,
    pub days: i64,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub success: bool,
    pub data: Vec<LeaderboardEntry>,
}

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub success: bool,
    pub user: WalletAccount,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardRateResponse {
    pub success: bool,
    pub apy: f64,
    pub version: u64,
    pub updated_at: Option<i64>,
    pub updated_by: Option<String>,
}

impl From<RewardRateRecord> for RewardRateResponse {
    fn from(record: RewardRateRecord) -> Self {
        Self {
            success: true,
            apy: record.rate.to_f64().unwrap_or_default(),
            version: record.version,
            updated_at: record.updated_at,
            updated_by: record.updated_by,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRateResponse {
    pub success: bool,
    pub message: String,
    pub new_apy: f64,
    pub version: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
    pub version: String,
    pub wallets: u64,
}
