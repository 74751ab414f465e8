use tracing::warn;

use crate::error::WalletError;

pub const DEFAULT_BALANCE: f64 = 1000.0;

/// Single non-negative balance. Credits are additive; debits are gated and
/// leave the balance untouched when they fail.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualWallet {
    balance: f64,
    initial_balance: f64,
}

impl Default for VirtualWallet {
    fn default() -> Self {
        Self::new(DEFAULT_BALANCE)
    }
}

impl VirtualWallet {
    /// Negative or non-finite starting balances are treated as zero.
    pub fn new(initial_balance: f64) -> Self {
        let initial_balance = if initial_balance.is_finite() {
            initial_balance.max(0.0)
        } else {
            0.0
        };
        VirtualWallet {
            balance: initial_balance,
            initial_balance,
        }
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    fn check(amount: f64) -> Result<(), WalletError> {
        if amount.is_finite() && amount >= 0.0 {
            Ok(())
        } else {
            Err(WalletError::InvalidAmount(amount))
        }
    }

    /// Returns the new balance.
    pub fn credit(&mut self, amount: f64) -> Result<f64, WalletError> {
        Self::check(amount)?;
        self.balance += amount;
        Ok(self.balance)
    }

    /// Returns the new balance.
    pub fn debit(&mut self, amount: f64) -> Result<f64, WalletError> {
        Self::check(amount)?;
        if amount > self.balance {
            warn!(
                "Debit of {:.2} rejected: balance is {:.2}",
                amount, self.balance
            );
            return Err(WalletError::InsufficientFunds {
                requested: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        Ok(self.balance)
    }

    pub fn has_sufficient_funds(&self, amount: f64) -> bool {
        self.balance >= amount
    }

    /// Restore the starting balance.
    pub fn reset(&mut self) -> f64 {
        self.balance = self.initial_balance;
        self.balance
    }
}
