//! Claim settlement
//!
//! Moves reward amounts between the pending and confirmed-claimed buckets of a
//! wallet and mirrors the movement on the aggregate.
//!
//! `register_pending` receives an absolute value while the aggregate needs a
//! delta, so the previous per-wallet value is read before it is replaced. This
//! read-modify-write is safe only because the actor is the single writer.
//!
//! A claim larger than the wallet's pending amount is rejected rather than
//! clamped: pending never goes negative and nothing is committed.

use crate::{
    types::{ClaimTotals, GlobalAggregate, PendingTotals, WalletAccount},
    Error, Result,
};

/// Replace a wallet's pending claim and shift the aggregate by the difference
pub fn register_pending(
    account: &mut WalletAccount,
    aggregate: &mut GlobalAggregate,
    pending_amount: u64,
    now: i64,
) -> Result<PendingTotals> {
    let previous = account.pending_xlabs_claim;

    let total = if pending_amount >= previous {
        aggregate
            .total_pending_xlabs
            .checked_add(pending_amount - previous)
            .ok_or_else(|| Error::InvalidAmount("Total pending overflow".to_string()))?
    } else {
        let decrease = previous - pending_amount;
        aggregate.total_pending_xlabs.checked_sub(decrease).unwrap_or_else(|| {
            tracing::warn!(
                wallet = %account.wallet_address,
                decrease,
                total_pending = aggregate.total_pending_xlabs,
                "Aggregate pending total below decrease, clamping to zero"
            );
            0
        })
    };

    account.pending_xlabs_claim = pending_amount;
    account.last_pending_update = Some(now);
    aggregate.total_pending_xlabs = total;
    aggregate.touch(now);

    Ok(PendingTotals {
        user_pending_claim: account.pending_xlabs_claim,
        global_pending_claim: aggregate.total_pending_xlabs,
    })
}

/// Confirm a claim: pending → claimed, for the wallet and the aggregate
pub fn settle_claim(
    account: &mut WalletAccount,
    aggregate: &mut GlobalAggregate,
    amount: u64,
    now: i64,
) -> Result<ClaimTotals> {
    if amount == 0 {
        return Err(Error::InvalidAmount(
            "Claim amount must be positive".to_string(),
        ));
    }

    if amount > account.pending_xlabs_claim {
        return Err(Error::InvalidAmount(format!(
            "Claim amount {} exceeds pending claim {}",
            amount, account.pending_xlabs_claim
        )));
    }

    let user_claimed = account
        .total_xlabs_claimed
        .checked_add(amount)
        .ok_or_else(|| Error::InvalidAmount("Claimed total overflow".to_string()))?;
    let global_claimed = aggregate
        .total_xlabs_claimed
        .checked_add(amount)
        .ok_or_else(|| Error::InvalidAmount("Global claimed total overflow".to_string()))?;
    let global_pending = aggregate.total_pending_xlabs.saturating_sub(amount);

    account.pending_xlabs_claim -= amount;
    account.total_xlabs_claimed = user_claimed;
    account.last_claim_time = Some(now);
    aggregate.total_xlabs_claimed = global_claimed;
    aggregate.total_pending_xlabs = global_pending;
    aggregate.touch(now);

    Ok(ClaimTotals {
        user_total_claimed: account.total_xlabs_claimed,
        global_total_claimed: aggregate.total_xlabs_claimed,
        user_pending_claim: account.pending_xlabs_claim,
        global_pending_claim: aggregate.total_pending_xlabs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WalletAddress;

    fn account(name: &str) -> WalletAccount {
        WalletAccount::new(WalletAddress::parse(name).unwrap(), 0)
    }

    #[test]
    fn test_register_pending_tracks_difference() {
        let mut a = account("wallet-a");
        let mut b = account("wallet-b");
        let mut aggregate = GlobalAggregate::empty(0);

        register_pending(&mut a, &mut aggregate, 100, 1).unwrap();
        register_pending(&mut b, &mut aggregate, 40, 2).unwrap();
        assert_eq!(aggregate.total_pending_xlabs, 140);

        // Absolute, not additive
        let totals = register_pending(&mut a, &mut aggregate, 30, 3).unwrap();
        assert_eq!(totals.user_pending_claim, 30);
        assert_eq!(totals.global_pending_claim, 70);
        assert_eq!(a.last_pending_update, Some(3));
    }

    #[test]
    fn test_settle_moves_pending_to_claimed() {
        let mut a = account("wallet-a");
        let mut aggregate = GlobalAggregate::empty(0);
        register_pending(&mut a, &mut aggregate, 100, 1).unwrap();

        let totals = settle_claim(&mut a, &mut aggregate, 60, 2).unwrap();
        assert_eq!(
            totals,
            ClaimTotals {
                user_total_claimed: 60,
                global_total_claimed: 60,
                user_pending_claim: 40,
                global_pending_claim: 40,
            }
        );
        assert_eq!(a.last_claim_time, Some(2));
    }

    #[test]
    fn test_settle_over_pending_rejected() {
        let mut a = account("wallet-a");
        let mut aggregate = GlobalAggregate::empty(0);
        register_pending(&mut a, &mut aggregate, 10, 1).unwrap();

        let before = (a.clone(), aggregate.clone());
        let err = settle_claim(&mut a, &mut aggregate, 11, 2).unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));
        assert_eq!((a, aggregate), before);
    }

    #[test]
    fn test_settle_zero_rejected() {
        let mut a = account("wallet-a");
        let mut aggregate = GlobalAggregate::empty(0);
        assert!(settle_claim(&mut a, &mut aggregate, 0, 1).is_err());
    }
}
