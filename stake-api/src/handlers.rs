use crate::errors::{ApiError, Result};
use crate::models::{
    require_wallet, to_amount, Balances, ClaimRequest, ClaimResponse, ClaimSeriesResponse,
    ConnectRequest, ConnectResponse, HealthResponse, LeaderboardQuery, LeaderboardResponse,
    RewardRateResponse, SeriesQuery, StakeActivityRequest, StakeActivityResponse,
    StakeSeriesResponse, UpdateBalancesRequest, UpdateBalancesResponse, UpdatePendingRequest,
    UpdatePendingResponse, UpdateRateResponse, UserSummary, WalletResponse,
};
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use rust_decimal::prelude::ToPrimitive;
use serde_json::json;
use stake_ledger::{analytics::ConsistencyReport, Ledger, RateUpdateRequest, StakeDirection};
use std::sync::Arc;
use tracing::info;

/// Default chart window
const DEFAULT_SERIES_DAYS: i64 = 30;

pub type AppState = Arc<Ledger>;

/// Health check endpoint
pub async fn health_check(State(ledger): State<AppState>) -> Json<HealthResponse> {
    let wallets = ledger.storage_stats().map(|s| s.approximate_wallets);

    Json(HealthResponse {
        status: if wallets.is_ok() { "healthy" } else { "degraded" },
        service: ledger.config().service_name.clone(),
        version: ledger.config().service_version.clone(),
        wallets: wallets.unwrap_or_default(),
    })
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint(State(ledger): State<AppState>) -> Result<impl IntoResponse> {
    let body = ledger.metrics().encode()?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

/// Register a wallet connection
pub async fn connect_wallet(
    State(ledger): State<AppState>,
    body: std::result::Result<Json<ConnectRequest>, JsonRejection>,
) -> Result<Json<ConnectResponse>> {
    let Json(request) = body?;
    let wallet = require_wallet(request.wallet_address.as_deref())?;

    let registration = ledger.register_wallet(wallet).await?;
    if registration.first_visit {
        info!(wallet, "First visit");
    }

    Ok(Json(ConnectResponse {
        success: true,
        user: UserSummary::new(&registration.account, registration.first_visit),
    }))
}

/// Overwrite snapshot balances
pub async fn update_balances(
    State(ledger): State<AppState>,
    body: std::result::Result<Json<UpdateBalancesRequest>, JsonRejection>,
) -> Result<Json<UpdateBalancesResponse>> {
    let Json(request) = body?;
    let wallet = require_wallet(request.wallet_address.as_deref())?;
    // A snapshot is absolute: an omitted balance is read as 0, not as unchanged
    let labs = to_amount(request.labs_balance.unwrap_or(0), "labsBalance")?;
    let staked = to_amount(request.staked_balance.unwrap_or(0), "stakedBalance")?;

    let account = ledger.sync_balances(wallet, labs, staked).await?;

    Ok(Json(UpdateBalancesResponse {
        success: true,
        balances: Balances {
            labs: account.labs_balance,
            staked: account.staked_balance,
        },
    }))
}

/// Replace a wallet's pending claim
pub async fn update_pending(
    State(ledger): State<AppState>,
    body: std::result::Result<Json<UpdatePendingRequest>, JsonRejection>,
) -> Result<Json<UpdatePendingResponse>> {
    let Json(request) = body?;
    let (wallet, pending) = match (request.wallet_address.as_deref(), request.pending_amount) {
        (Some(wallet), Some(pending)) if !wallet.trim().is_empty() => (wallet.trim(), pending),
        _ => return Err(ApiError::missing_fields("walletAddress, pendingAmount")),
    };
    let pending = to_amount(pending, "pendingAmount")?;

    let totals = ledger.register_pending(wallet, pending).await?;

    Ok(Json(UpdatePendingResponse {
        success: true,
        user_pending_claim: totals.user_pending_claim,
        global_pending_claim: totals.global_pending_claim,
    }))
}

/// Record a stake or unstake
pub async fn record_stake(
    State(ledger): State<AppState>,
    body: std::result::Result<Json<StakeActivityRequest>, JsonRejection>,
) -> Result<Json<StakeActivityResponse>> {
    let Json(request) = body?;
    let (wallet, amount) = match (request.wallet_address.as_deref(), request.amount) {
        (Some(wallet), Some(amount)) if !wallet.trim().is_empty() => (wallet.trim(), amount),
        _ => return Err(ApiError::missing_fields("walletAddress, amount")),
    };
    let amount = to_amount(amount, "amount")?;
    let is_staking = request.is_staking.unwrap_or(true);

    ledger
        .apply_stake_delta(wallet, amount, StakeDirection::from_is_staking(is_staking))
        .await?;

    let message = if is_staking {
        "Staking activity recorded"
    } else {
        "Unstaking activity recorded"
    };

    Ok(Json(StakeActivityResponse {
        success: true,
        message: message.to_string(),
        amount,
        is_staking,
    }))
}

/// Confirm a claim
pub async fn record_claim(
    State(ledger): State<AppState>,
    body: std::result::Result<Json<ClaimRequest>, JsonRejection>,
) -> Result<Json<ClaimResponse>> {
    let Json(request) = body?;
    let (wallet, amount) = match (request.wallet_address.as_deref(), request.amount) {
        (Some(wallet), Some(amount)) if !wallet.trim().is_empty() => (wallet.trim(), amount),
        _ => return Err(ApiError::missing_fields("walletAddress, amount")),
    };
    let amount = to_amount(amount, "amount")?;

    let totals = ledger.settle_claim(wallet, amount).await?;

    Ok(Json(ClaimResponse {
        success: true,
        message: "Claim recorded".to_string(),
        amount,
        user_total_claimed: totals.user_total_claimed,
        global_total_claimed: totals.global_total_claimed,
        user_pending_claim: totals.user_pending_claim,
        global_pending_claim: totals.global_pending_claim,
    }))
}

/// Daily staking chart
pub async fn staking_series(
    State(ledger): State<AppState>,
    query: std::result::Result<Query<SeriesQuery>, QueryRejection>,
) -> Result<Json<StakeSeriesResponse>> {
    let Query(query) = query?;
    let days = query.days.unwrap_or(DEFAULT_SERIES_DAYS);

    let data = ledger.query_daily_series(days).await?;
    Ok(Json(StakeSeriesResponse {
        success: true,
        data,
        days,
    }))
}

/// Daily rewards chart
pub async fn rewards_series(
    State(ledger): State<AppState>,
    query: std::result::Result<Query<SeriesQuery>, QueryRejection>,
) -> Result<Json<ClaimSeriesResponse>> {
    let Query(query) = query?;
    let days = query.days.unwrap_or(DEFAULT_SERIES_DAYS);

    let data = ledger.query_claim_series(days).await?;
    Ok(Json(ClaimSeriesResponse {
        success: true,
        data,
        days,
    }))
}

/// Verify and apply an admin reward-rate update
pub async fn update_apy(
    State(ledger): State<AppState>,
    body: std::result::Result<Json<RateUpdateRequest>, JsonRejection>,
) -> Result<Json<UpdateRateResponse>> {
    let Json(request) = body?;

    let record = ledger.update_reward_rate(&request).await?;

    Ok(Json(UpdateRateResponse {
        success: true,
        message: "APY updated successfully".to_string(),
        new_apy: record.rate.to_f64().unwrap_or_default(),
        version: record.version,
    }))
}

/// Current reward rate
pub async fn get_reward_rate(State(ledger): State<AppState>) -> Result<Json<RewardRateResponse>> {
    Ok(Json(ledger.reward_rate()?.into()))
}

/// Full wallet record
pub async fn get_wallet(
    State(ledger): State<AppState>,
    Path(wallet): Path<String>,
) -> Result<Json<WalletResponse>> {
    let user = ledger.get_wallet(&wallet)?;
    Ok(Json(WalletResponse {
        success: true,
        user,
    }))
}

/// Global aggregate
pub async fn global_stats(State(ledger): State<AppState>) -> Result<Json<serde_json::Value>> {
    let stats = ledger.global_stats()?;
    Ok(Json(json!({
        "success": true,
        "stats": stats,
    })))
}

/// Aggregate drift report
pub async fn consistency(State(ledger): State<AppState>) -> Result<Json<serde_json::Value>> {
    let report: ConsistencyReport = ledger.check_aggregate_consistency().await?;
    Ok(Json(json!({
        "success": true,
        "report": report,
    })))
}

/// Top wallets by confirmed claims
pub async fn top_claimers(
    State(ledger): State<AppState>,
    query: std::result::Result<Query<LeaderboardQuery>, QueryRejection>,
) -> Result<Json<LeaderboardResponse>> {
    let Query(query) = query?;
    Ok(Json(LeaderboardResponse {
        success: true,
        data: ledger.top_claimers(query.limit).await?,
    }))
}

/// Top wallets by pending claim
pub async fn top_pending(
    State(ledger): State<AppState>,
    query: std::result::Result<Query<LeaderboardQuery>, QueryRejection>,
) -> Result<Json<LeaderboardResponse>> {
    let Query(query) = query?;
    Ok(Json(LeaderboardResponse {
        success: true,
        data: ledger.top_pending(query.limit).await?,
    }))
}
