//! Randomized operation sequences must never break the fund invariants.

use custody_core::{AllowanceFund, AllowanceId, FundEvent, InMemoryPayout, Principal};
use proptest::prelude::*;

const ACTORS: [&str; 6] = ["A", "B", "C", "D", "X", "Y"];

#[derive(Debug, Clone)]
enum Op {
    Deposit { caller: usize, amount: u64 },
    Create { caller: usize, amount: u64, beneficiary: usize, required: usize },
    Approve { caller: usize, id: u64 },
    Withdraw { caller: usize, id: u64, amount: u64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..ACTORS.len(), 0u64..30).prop_map(|(caller, amount)| Op::Deposit { caller, amount }),
        (0..ACTORS.len(), 0u64..14, 0..ACTORS.len(), 0usize..6).prop_map(
            |(caller, amount, beneficiary, required)| Op::Create {
                caller,
                amount,
                beneficiary,
                required,
            }
        ),
        (0..ACTORS.len(), 0u64..8).prop_map(|(caller, id)| Op::Approve { caller, id }),
        (0..ACTORS.len(), 0u64..8, 0u64..8)
            .prop_map(|(caller, id, amount)| Op::Withdraw { caller, id, amount }),
    ]
}

fn actor(index: usize) -> Principal {
    Principal::new(ACTORS[index])
}

proptest! {
    #[test]
    fn invariants_hold_after_every_operation(ops in proptest::collection::vec(op_strategy(), 0..60)) {
        let benefactors = vec![actor(0), actor(1), actor(2), actor(3)];
        let mut fund = AllowanceFund::new(benefactors, 10).unwrap();
        let rail = InMemoryPayout::new();

        for op in ops {
            let before_events = fund.events().len();
            let before_balance = fund.balance();
            let before_active = fund.active_allowances();

            let result = match op {
                Op::Deposit { caller, amount } => fund.deposit(&actor(caller), amount).map(|_| ()),
                Op::Create { caller, amount, beneficiary, required } => fund
                    .create_allowance(&actor(caller), amount, actor(beneficiary), required)
                    .map(|_| ()),
                Op::Approve { caller, id } => fund.approve_allowance(&actor(caller), AllowanceId(id)),
                Op::Withdraw { caller, id, amount } => fund
                    .withdraw_allowed(&actor(caller), AllowanceId(id), amount, &rail)
                    .map(|_| ()),
            };

            if result.is_err() {
                prop_assert_eq!(fund.events().len(), before_events);
                prop_assert_eq!(fund.balance(), before_balance);
                prop_assert_eq!(fund.active_allowances(), before_active);
            }

            let violations = fund.check_invariants();
            prop_assert!(violations.is_empty(), "violations: {:?}", violations);
        }

        // Exactly one unlock per allowance whose threshold was reached, none otherwise
        for index in 1..=fund.summary().allowances_created as u64 {
            let id = AllowanceId(index);
            let snap = fund.get_allowance(id).unwrap();
            let unlocks = fund
                .events_for(id)
                .iter()
                .filter(|e| matches!(e, FundEvent::AllowanceUnlocked { .. }))
                .count();
            prop_assert_eq!(unlocks, usize::from(snap.unlocked));

            let exhaustions = fund
                .events_for(id)
                .iter()
                .filter(|e| matches!(e, FundEvent::AllowanceExhausted { .. }))
                .count();
            prop_assert_eq!(exhaustions, usize::from(!snap.active));
            prop_assert!(snap.spent <= snap.total);
        }

        let paid: u64 = rail.receipts().iter().map(|r| r.instruction.amount).sum();
        let deposited: u64 = fund
            .events()
            .iter()
            .filter_map(|r| match r.event {
                FundEvent::FundsDeposited { amount, .. } => Some(amount),
                _ => None,
            })
            .sum();
        prop_assert_eq!(deposited - paid, fund.balance());
    }
}
