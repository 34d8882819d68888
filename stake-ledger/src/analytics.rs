//! Query aggregation over activity history and wallet rows
//!
//! Series are fixed-length: one bucket per UTC calendar day covering
//! `[today - days + 1, today]`, oldest first. Idle days produce zero buckets,
//! so the output length always equals `days`.

use crate::{
    types::{ActivityEvent, ActivityKind, DailyClaimBucket, DailyStakeBucket, GlobalAggregate,
        WalletAccount},
    Error, Result,
};
use chrono::{Days, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Smallest accepted chart window
pub const MIN_SERIES_DAYS: i64 = 1;

/// Largest accepted chart window
pub const MAX_SERIES_DAYS: i64 = 365;

/// Default leaderboard size
pub const DEFAULT_LEADERBOARD_LIMIT: usize = 10;

/// Largest leaderboard size
pub const MAX_LEADERBOARD_LIMIT: usize = 100;

/// Validated chart window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesWindow {
    /// Number of buckets
    pub days: u32,
    /// Oldest day in the window
    pub first_day: NaiveDate,
    /// Unix seconds at the start of `first_day`
    pub start: i64,
    /// Unix seconds at the last second of `today`
    pub end: i64,
}

impl SeriesWindow {
    /// Window of `days` days ending with `today`
    pub fn new(days: i64, today: NaiveDate) -> Result<Self> {
        if !(MIN_SERIES_DAYS..=MAX_SERIES_DAYS).contains(&days) {
            return Err(Error::InvalidRange(format!(
                "Days parameter must be between {} and {}",
                MIN_SERIES_DAYS, MAX_SERIES_DAYS
            )));
        }

        let first_day = today
            .checked_sub_days(Days::new(days as u64 - 1))
            .ok_or_else(|| Error::InvalidRange("Window starts before calendar range".to_string()))?;
        let next_day = today
            .checked_add_days(Days::new(1))
            .ok_or_else(|| Error::InvalidRange("Window ends after calendar range".to_string()))?;

        Ok(Self {
            days: days as u32,
            first_day,
            start: first_day.and_time(NaiveTime::MIN).and_utc().timestamp(),
            end: next_day.and_time(NaiveTime::MIN).and_utc().timestamp() - 1,
        })
    }

    fn bucket_index(&self, event: &ActivityEvent) -> Option<usize> {
        let day = event.day()?;
        let offset = (day - self.first_day).num_days();
        if offset >= 0 && offset < self.days as i64 {
            Some(offset as usize)
        } else {
            None
        }
    }

    fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.first_day.iter_days().take(self.days as usize)
    }
}

/// Per-day staked, unstaked and net amounts
pub fn daily_stake_series(window: &SeriesWindow, events: &[ActivityEvent]) -> Vec<DailyStakeBucket> {
    let mut buckets: Vec<DailyStakeBucket> = window.dates().map(DailyStakeBucket::empty).collect();

    for event in events {
        let Some(index) = window.bucket_index(event) else {
            continue;
        };
        let bucket = &mut buckets[index];
        match event.kind {
            ActivityKind::Stake => {
                bucket.staked = bucket.staked.saturating_add(event.amount);
                bucket.net += event.amount as i128;
            }
            ActivityKind::Unstake => {
                bucket.unstaked = bucket.unstaked.saturating_add(event.amount);
                bucket.net -= event.amount as i128;
            }
            ActivityKind::Claim => {}
        }
    }

    buckets
}

/// Per-day claimed amounts
pub fn daily_claim_series(window: &SeriesWindow, events: &[ActivityEvent]) -> Vec<DailyClaimBucket> {
    let mut buckets: Vec<DailyClaimBucket> = window
        .dates()
        .map(|date| DailyClaimBucket { date, claimed: 0 })
        .collect();

    for event in events.iter().filter(|e| e.kind == ActivityKind::Claim) {
        if let Some(index) = window.bucket_index(event) {
            buckets[index].claimed = buckets[index].claimed.saturating_add(event.amount);
        }
    }

    buckets
}

/// Leaderboard row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// Wallet address
    pub wallet_address: String,
    /// Confirmed claims
    #[serde(rename = "totalXLabsClaimed")]
    pub total_xlabs_claimed: u64,
    /// Pending claim
    #[serde(rename = "pendingXLabsClaim")]
    pub pending_xlabs_claim: u64,
    /// Last claim (unix seconds)
    pub last_claim_time: Option<i64>,
    /// Last pending update (unix seconds)
    pub last_pending_update: Option<i64>,
}

impl From<&WalletAccount> for LeaderboardEntry {
    fn from(account: &WalletAccount) -> Self {
        Self {
            wallet_address: account.wallet_address.to_string(),
            total_xlabs_claimed: account.total_xlabs_claimed,
            pending_xlabs_claim: account.pending_xlabs_claim,
            last_claim_time: account.last_claim_time,
            last_pending_update: account.last_pending_update,
        }
    }
}

/// Clamp a requested leaderboard size
pub fn leaderboard_limit(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .clamp(1, MAX_LEADERBOARD_LIMIT)
}

/// Wallets with the most confirmed claims (only those with any)
pub fn top_claimers(wallets: &[WalletAccount], limit: usize) -> Vec<LeaderboardEntry> {
    let mut ranked: Vec<&WalletAccount> =
        wallets.iter().filter(|w| w.total_xlabs_claimed > 0).collect();
    ranked.sort_by(|a, b| b.total_xlabs_claimed.cmp(&a.total_xlabs_claimed));
    ranked.into_iter().take(limit).map(LeaderboardEntry::from).collect()
}

/// Wallets with the largest pending claim (only those with any)
pub fn top_pending(wallets: &[WalletAccount], limit: usize) -> Vec<LeaderboardEntry> {
    let mut ranked: Vec<&WalletAccount> =
        wallets.iter().filter(|w| w.pending_xlabs_claim > 0).collect();
    ranked.sort_by(|a, b| b.pending_xlabs_claim.cmp(&a.pending_xlabs_claim));
    ranked.into_iter().take(limit).map(LeaderboardEntry::from).collect()
}

/// Incremental aggregate compared against sums recomputed from wallet rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    /// Number of wallet rows
    pub wallet_count: u64,
    /// Aggregate as maintained by deltas
    pub aggregate: GlobalAggregate,
    /// Σ staked_balance over wallets
    pub summed_staked: u64,
    /// Σ total_xlabs_claimed over wallets
    #[serde(rename = "summedXLabsClaimed")]
    pub summed_xlabs_claimed: u64,
    /// Σ pending_xlabs_claim over wallets
    #[serde(rename = "summedPendingXLabs")]
    pub summed_pending_xlabs: u64,
    /// All four relations hold
    pub consistent: bool,
}

/// Recompute totals from wallet rows and compare
///
/// Snapshot syncs overwrite `staked_balance` without touching the aggregate,
/// so staked drift is expected after a sync and reported, never repaired.
pub fn audit_aggregate(wallets: &[WalletAccount], aggregate: GlobalAggregate) -> ConsistencyReport {
    let summed_staked = wallets.iter().fold(0u64, |acc, w| acc.saturating_add(w.staked_balance));
    let summed_xlabs_claimed = wallets
        .iter()
        .fold(0u64, |acc, w| acc.saturating_add(w.total_xlabs_claimed));
    let summed_pending_xlabs = wallets
        .iter()
        .fold(0u64, |acc, w| acc.saturating_add(w.pending_xlabs_claim));
    let wallet_count = wallets.len() as u64;

    let consistent = aggregate.total_users == wallet_count
        && aggregate.total_staked == summed_staked
        && aggregate.total_xlabs_claimed == summed_xlabs_claimed
        && aggregate.total_pending_xlabs == summed_pending_xlabs;

    ConsistencyReport {
        wallet_count,
        aggregate,
        summed_staked,
        summed_xlabs_claimed,
        summed_pending_xlabs,
        consistent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WalletAddress;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn event_on(date: NaiveDate, hour: u32, amount: u64, kind: ActivityKind) -> ActivityEvent {
        let ts = date.and_hms_opt(hour, 0, 0).unwrap().and_utc().timestamp();
        ActivityEvent::new(WalletAddress::parse("wallet-a").unwrap(), amount, kind, ts)
    }

    #[test]
    fn test_window_bounds() {
        assert!(matches!(SeriesWindow::new(0, day(2024, 3, 10)), Err(Error::InvalidRange(_))));
        assert!(matches!(SeriesWindow::new(366, day(2024, 3, 10)), Err(Error::InvalidRange(_))));

        let window = SeriesWindow::new(7, day(2024, 3, 10)).unwrap();
        assert_eq!(window.first_day, day(2024, 3, 4));
        assert_eq!(window.end - window.start + 1, 7 * 86_400);
    }

    #[test]
    fn test_stake_series_fills_idle_days() {
        let today = day(2024, 3, 10);
        let window = SeriesWindow::new(5, today).unwrap();
        let events = vec![
            event_on(day(2024, 3, 6), 9, 100, ActivityKind::Stake),
            event_on(day(2024, 3, 6), 18, 30, ActivityKind::Unstake),
            event_on(day(2024, 3, 10), 23, 7, ActivityKind::Stake),
            event_on(day(2024, 3, 10), 1, 50, ActivityKind::Claim),
            // Outside the window
            event_on(day(2024, 3, 5), 12, 999, ActivityKind::Stake),
        ];

        let series = daily_stake_series(&window, &events);
        assert_eq!(series.len(), 5);
        assert_eq!(series[0].date, day(2024, 3, 6));
        assert_eq!(series[0].staked, 100);
        assert_eq!(series[0].unstaked, 30);
        assert_eq!(series[0].net, 70);
        assert_eq!(series[1], DailyStakeBucket::empty(day(2024, 3, 7)));
        assert_eq!(series[4].date, today);
        assert_eq!(series[4].staked, 7);
    }

    #[test]
    fn test_claim_series_ignores_stakes() {
        let today = day(2024, 1, 2);
        let window = SeriesWindow::new(2, today).unwrap();
        let events = vec![
            event_on(day(2024, 1, 1), 3, 12, ActivityKind::Claim),
            event_on(day(2024, 1, 1), 4, 40, ActivityKind::Stake),
        ];

        let series = daily_claim_series(&window, &events);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].claimed, 12);
        assert_eq!(series[1].claimed, 0);
    }

    #[test]
    fn test_leaderboards_skip_zero_rows() {
        let mut a = WalletAccount::new(WalletAddress::parse("a").unwrap(), 0);
        let mut b = WalletAccount::new(WalletAddress::parse("b").unwrap(), 0);
        let c = WalletAccount::new(WalletAddress::parse("c").unwrap(), 0);
        a.total_xlabs_claimed = 5;
        b.total_xlabs_claimed = 9;
        b.pending_xlabs_claim = 3;

        let wallets = vec![a, b, c];
        let claimers = top_claimers(&wallets, 10);
        assert_eq!(claimers.len(), 2);
        assert_eq!(claimers[0].wallet_address, "b");

        let pending = top_pending(&wallets, 10);
        assert_eq!(pending.len(), 1);
        assert_eq!(leaderboard_limit(Some(1_000)), MAX_LEADERBOARD_LIMIT);
        assert_eq!(leaderboard_limit(None), DEFAULT_LEADERBOARD_LIMIT);
    }

    #[test]
    fn test_audit_detects_drift() {
        let mut a = WalletAccount::new(WalletAddress::parse("a").unwrap(), 0);
        a.staked_balance = 10;
        let mut aggregate = GlobalAggregate::empty(0);
        aggregate.total_users = 1;
        aggregate.total_staked = 10;

        assert!(audit_aggregate(&[a.clone()], aggregate.clone()).consistent);

        a.staked_balance = 12;
        let report = audit_aggregate(&[a], aggregate);
        assert!(!report.consistent);
        assert_eq!(report.summed_staked, 12);
    }
}
