//! Construction parameters for an allowance fund.

use serde::{Deserialize, Serialize};

use crate::types::{Amount, Principal};

/// Fund construction parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundConfig {
    /// Fixed co-owner set, in order
    #[serde(default)]
    pub benefactors: Vec<Principal>,

    /// Cap on any single allowance
    #[serde(default = "default_maximum_allowance")]
    pub maximum_allowance: Amount,

    /// Deposits applied right after construction
    #[serde(default)]
    pub opening_deposits: Vec<OpeningDeposit>,
}

/// A deposit applied when the fund is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningDeposit {
    pub depositor: Principal,
    pub amount: Amount,
}

impl Default for FundConfig {
    fn default() -> Self {
        Self {
            benefactors: Vec::new(),
            maximum_allowance: default_maximum_allowance(),
            opening_deposits: Vec::new(),
        }
    }
}

fn default_maximum_allowance() -> Amount {
    1_000_000
}

impl FundConfig {
    pub fn new(benefactors: Vec<Principal>, maximum_allowance: Amount) -> Self {
        Self {
            benefactors,
            maximum_allowance,
            opening_deposits: Vec::new(),
        }
    }

    pub fn with_deposit(mut self, depositor: impl Into<String>, amount: Amount) -> Self {
        self.opening_deposits.push(OpeningDeposit {
            depositor: Principal::new(depositor),
            amount,
        });
        self
    }
}
