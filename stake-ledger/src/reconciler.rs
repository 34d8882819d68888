//! Balance reconciliation
//!
//! Two mutation paths touch a wallet's staked balance:
//!
//! - **Delta** (`apply_stake_delta`): a stake or unstake observed by the
//!   client. The only path allowed to move `GlobalAggregate::total_staked`.
//! - **Snapshot** (`sync_balances`): absolute values read from the chain to
//!   correct drift. Never touches the aggregate.
//!
//! Functions here are pure state transitions. They validate first and only
//! assign once every checked operation has succeeded, so a failed call leaves
//! both rows untouched. The actor commits the result in one batch.

use crate::{
    types::{GlobalAggregate, StakeDirection, WalletAccount},
    Error, Result,
};

/// Register a wallet if it has not been observed before
///
/// Returns `true` when a new account was created.
pub fn register_wallet(
    existing: Option<WalletAccount>,
    wallet_address: crate::WalletAddress,
    aggregate: &mut GlobalAggregate,
    now: i64,
) -> (WalletAccount, bool) {
    match existing {
        Some(account) => (account, false),
        None => {
            aggregate.total_users += 1;
            aggregate.touch(now);
            (WalletAccount::new(wallet_address, now), true)
        }
    }
}

/// Apply a stake or unstake delta to a wallet and the aggregate
pub fn apply_stake_delta(
    account: &mut WalletAccount,
    aggregate: &mut GlobalAggregate,
    amount: u64,
    direction: StakeDirection,
    now: i64,
) -> Result<()> {
    if amount == 0 {
        return Err(Error::InvalidAmount(
            "Stake amount must be positive".to_string(),
        ));
    }

    match direction {
        StakeDirection::Stake => {
            let staked = account
                .staked_balance
                .checked_add(amount)
                .ok_or_else(|| Error::InvalidAmount("Staked balance overflow".to_string()))?;
            let total = aggregate
                .total_staked
                .checked_add(amount)
                .ok_or_else(|| Error::InvalidAmount("Total staked overflow".to_string()))?;

            account.staked_balance = staked;
            account.last_stake_time = Some(now);
            aggregate.total_staked = total;
        }
        StakeDirection::Unstake => {
            let staked = account.staked_balance.checked_sub(amount).ok_or_else(|| {
                Error::InvalidAmount(format!(
                    "Unstake amount {} exceeds staked balance {}",
                    amount, account.staked_balance
                ))
            })?;
            let unstaked = account
                .unstaked_balance
                .checked_add(amount)
                .ok_or_else(|| Error::InvalidAmount("Unstaked balance overflow".to_string()))?;

            // Snapshots may have raised a wallet above what the aggregate saw
            let total = match aggregate.total_staked.checked_sub(amount) {
                Some(total) => total,
                None => {
                    tracing::warn!(
                        wallet = %account.wallet_address,
                        amount,
                        total_staked = aggregate.total_staked,
                        "Aggregate staked total below unstake amount, clamping to zero"
                    );
                    0
                }
            };

            account.staked_balance = staked;
            account.unstaked_balance = unstaked;
            account.last_unstake_time = Some(now);
            aggregate.total_staked = total;
        }
    }

    aggregate.touch(now);
    Ok(())
}

/// Overwrite the on-chain snapshot values of a wallet
pub fn sync_balances(
    account: &mut WalletAccount,
    labs_balance: u64,
    staked_balance: u64,
    now: i64,
) {
    account.labs_balance = labs_balance;
    account.staked_balance = staked_balance;
    account.last_balance_update = Some(now);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WalletAddress;

    fn account() -> WalletAccount {
        WalletAccount::new(WalletAddress::parse("wallet-a").unwrap(), 0)
    }

    #[test]
    fn test_register_new_wallet_counts_user() {
        let mut aggregate = GlobalAggregate::empty(0);
        let addr = WalletAddress::parse("wallet-a").unwrap();

        let (created, first) = register_wallet(None, addr.clone(), &mut aggregate, 10);
        assert!(first);
        assert_eq!(aggregate.total_users, 1);

        let (_, first) = register_wallet(Some(created), addr, &mut aggregate, 11);
        assert!(!first);
        assert_eq!(aggregate.total_users, 1);
    }

    #[test]
    fn test_stake_then_unstake_restores_totals() {
        let mut account = account();
        let mut aggregate = GlobalAggregate::empty(0);
        aggregate.total_staked = 500;

        apply_stake_delta(&mut account, &mut aggregate, 250, StakeDirection::Stake, 1).unwrap();
        assert_eq!(account.staked_balance, 250);
        assert_eq!(aggregate.total_staked, 750);
        assert_eq!(account.last_stake_time, Some(1));

        apply_stake_delta(&mut account, &mut aggregate, 250, StakeDirection::Unstake, 2).unwrap();
        assert_eq!(account.staked_balance, 0);
        assert_eq!(account.unstaked_balance, 250);
        assert_eq!(aggregate.total_staked, 500);
        assert_eq!(account.last_unstake_time, Some(2));
    }

    #[test]
    fn test_zero_amount_rejected() {
        let mut account = account();
        let mut aggregate = GlobalAggregate::empty(0);
        let err = apply_stake_delta(&mut account, &mut aggregate, 0, StakeDirection::Stake, 1)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));
        assert_eq!(aggregate.version, 0);
    }

    #[test]
    fn test_unstake_beyond_balance_leaves_state_untouched() {
        let mut account = account();
        account.staked_balance = 10;
        let mut aggregate = GlobalAggregate::empty(0);
        aggregate.total_staked = 10;

        let before = (account.clone(), aggregate.clone());
        let err = apply_stake_delta(&mut account, &mut aggregate, 11, StakeDirection::Unstake, 1)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));
        assert_eq!((account, aggregate), before);
    }

    #[test]
    fn test_sync_does_not_touch_aggregate() {
        let mut account = account();
        sync_balances(&mut account, 1_000, 400, 99);
        assert_eq!(account.labs_balance, 1_000);
        assert_eq!(account.staked_balance, 400);
        assert_eq!(account.last_balance_update, Some(99));
    }
}
