use tracing::{debug, info};

use crate::error::CustodyError;
use crate::events::FundEvent;
use crate::registry::BenefactorRegistry;
use crate::types::{Amount, Principal};

/// Benefactor-only deposit gate and the fund's aggregate custodied balance.
///
/// Deposits are not tied to any allowance. The balance only constrains
/// withdrawals in aggregate.
#[derive(Clone, Debug, Default)]
pub struct FundGateway {
    balance: Amount,
}

impl FundGateway {
    pub fn new() -> Self {
        Self { balance: 0 }
    }

    /// Accept `amount` from `caller`, returning the new balance and the
    /// deposit notification.
    pub fn deposit(
        &mut self,
        registry: &BenefactorRegistry,
        caller: &Principal,
        amount: Amount,
    ) -> Result<(Amount, FundEvent), CustodyError> {
        registry.require_benefactor(caller)?;
        let balance = self
            .balance
            .checked_add(amount)
            .ok_or(CustodyError::BalanceOverflow {
                balance: self.balance,
                amount,
            })?;
        self.balance = balance;

        info!(depositor = %caller, amount, balance, "Deposit accepted");
        Ok((
            balance,
            FundEvent::FundsDeposited {
                depositor: caller.clone(),
                amount,
                balance,
            },
        ))
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn ensure_available(&self, amount: Amount) -> Result<(), CustodyError> {
        if self.balance < amount {
            debug!(balance = self.balance, requested = amount, "Fund balance too low");
            return Err(CustodyError::InsufficientFunds {
                balance: self.balance,
                requested: amount,
            });
        }
        Ok(())
    }

    pub(crate) fn debit(&mut self, amount: Amount) -> Result<(), CustodyError> {
        self.ensure_available(amount)?;
        self.balance -= amount;
        Ok(())
    }

    /// Return a debited amount after a rolled-back payout.
    pub(crate) fn credit(&mut self, amount: Amount) {
        self.balance = self.balance.saturating_add(amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> BenefactorRegistry {
        BenefactorRegistry::new(vec![Principal::new("a"), Principal::new("b")], 10).unwrap()
    }

    #[test]
    fn benefactor_deposit_accepted() {
        let mut gateway = FundGateway::new();
        let (balance, event) = gateway.deposit(&registry(), &Principal::new("a"), 40).unwrap();
        assert_eq!(balance, 40);
        assert_eq!(gateway.balance(), 40);
        assert!(matches!(event, FundEvent::FundsDeposited { amount: 40, .. }));
    }

    #[test]
    fn outsider_deposit_rejected() {
        let mut gateway = FundGateway::new();
        let err = gateway
            .deposit(&registry(), &Principal::new("e"), 40)
            .unwrap_err();
        assert!(err.is_authorization());
        assert_eq!(gateway.balance(), 0);
    }

    #[test]
    fn overflow_rejected() {
        let mut gateway = FundGateway::new();
        gateway.deposit(&registry(), &Principal::new("a"), u64::MAX).unwrap();
        assert!(matches!(
            gateway.deposit(&registry(), &Principal::new("b"), 1),
            Err(CustodyError::BalanceOverflow { .. })
        ));
        assert_eq!(gateway.balance(), u64::MAX);
    }

    #[test]
    fn debit_requires_available_balance() {
        let mut gateway = FundGateway::new();
        gateway.deposit(&registry(), &Principal::new("a"), 5).unwrap();
        assert!(matches!(
            gateway.debit(6),
            Err(CustodyError::InsufficientFunds {
                balance: 5,
                requested: 6
            })
        ));
        gateway.debit(5).unwrap();
        assert_eq!(gateway.balance(), 0);
        gateway.credit(5);
        assert_eq!(gateway.balance(), 5);
    }
}
