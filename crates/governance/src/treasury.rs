//! Treasury: the shared value pool and the assets it manages

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{GovernanceError, GovernanceResult};
use crate::types::{Amount, AssetId};

/// Balance plus held assets. The balance can never go negative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treasury {
    balance: Amount,
    holdings: BTreeSet<AssetId>,
}

impl Treasury {
    /// Create a treasury funded with `balance`
    pub fn new(balance: Amount) -> Self {
        Self {
            balance,
            holdings: BTreeSet::new(),
        }
    }

    /// Current balance
    pub fn balance(&self) -> Amount {
        self.balance
    }

    /// Credit the treasury
    pub fn deposit(&mut self, amount: Amount) -> GovernanceResult<Amount> {
        self.balance = self.balance.checked_add(amount).ok_or_else(|| {
            GovernanceError::ArithmeticOverflow(format!(
                "deposit of {} onto balance {}",
                amount, self.balance
            ))
        })?;
        trace!("Treasury credited {}, balance {}", amount, self.balance);
        Ok(self.balance)
    }

    /// Debit the treasury, failing without change if the balance is short
    pub fn withdraw(&mut self, amount: Amount) -> GovernanceResult<Amount> {
        if amount > self.balance {
            return Err(GovernanceError::InsufficientFunds {
                requested: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        trace!("Treasury debited {}, balance {}", amount, self.balance);
        Ok(self.balance)
    }

    /// Whether `asset` is currently held
    pub fn holds(&self, asset: &AssetId) -> bool {
        self.holdings.contains(asset)
    }

    /// Record a purchased asset
    pub fn acquire(&mut self, asset: AssetId) {
        debug!("Treasury now holds asset {}", asset);
        self.holdings.insert(asset);
    }

    /// Drop a sold asset, returning whether it was held
    pub fn release(&mut self, asset: &AssetId) -> bool {
        let removed = self.holdings.remove(asset);
        if removed {
            debug!("Treasury released asset {}", asset);
        }
        removed
    }

    /// Held assets in id order
    pub fn holdings(&self) -> impl Iterator<Item = &AssetId> {
        self.holdings.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_and_withdraw() {
        let mut treasury = Treasury::new(100);
        assert_eq!(treasury.deposit(50).unwrap(), 150);
        assert_eq!(treasury.withdraw(120).unwrap(), 30);
        assert_eq!(treasury.balance(), 30);
    }

    #[test]
    fn test_overdraw_leaves_balance_untouched() {
        let mut treasury = Treasury::new(10);
        let err = treasury.withdraw(11).unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::InsufficientFunds { requested: 11, available: 10 }
        ));
        assert_eq!(treasury.balance(), 10);
    }

    #[test]
    fn test_withdraw_entire_balance() {
        let mut treasury = Treasury::new(10);
        assert_eq!(treasury.withdraw(10).unwrap(), 0);
    }

    #[test]
    fn test_deposit_overflow() {
        let mut treasury = Treasury::new(Amount::MAX);
        assert!(matches!(
            treasury.deposit(1),
            Err(GovernanceError::ArithmeticOverflow(_))
        ));
        assert_eq!(treasury.balance(), Amount::MAX);
    }

    #[test]
    fn test_holdings() {
        let mut treasury = Treasury::default();
        let asset = AssetId::from("X");
        assert!(!treasury.holds(&asset));

        treasury.acquire(asset.clone());
        assert!(treasury.holds(&asset));
        assert_eq!(treasury.holdings().count(), 1);

        assert!(treasury.release(&asset));
        assert!(!treasury.release(&asset));
    }
}
