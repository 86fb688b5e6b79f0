use std::sync::Arc;

use proptest::prelude::*;

use devdao_common::ManualClock;
use devdao_governance::*;

#[derive(Debug, Clone)]
enum Op {
    Create { member: usize, sell: bool, asset: u8 },
    Vote { member: usize, proposal: u64, yay: bool },
    Execute { proposal: u64 },
    Deposit { amount: u32 },
    Quit { member: usize },
    Wait { secs: u64 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..4usize, any::<bool>(), 0..3u8).prop_map(|(member, sell, asset)| Op::Create {
            member,
            sell,
            asset
        }),
        (0..4usize, 0..6u64, any::<bool>()).prop_map(|(member, proposal, yay)| Op::Vote {
            member,
            proposal,
            yay
        }),
        (0..6u64).prop_map(|proposal| Op::Execute { proposal }),
        (0..50u32).prop_map(|amount| Op::Deposit { amount }),
        (0..4usize).prop_map(|member| Op::Quit { member }),
        (0..200u64).prop_map(|secs| Op::Wait { secs }),
    ]
}

proptest! {
    #[test]
    fn test_quit_payout_matches_exact_division(
        balance in 0u128..1_000_000_000_000u128,
        supply in 1u64..1_000,
        share in 0u64..1_000,
    ) {
        let tokens = share % supply + 1;
        let expected = balance * tokens as u128 / supply as u128;
        prop_assert_eq!(quit_payout(balance, tokens, supply), expected);
    }

    #[test]
    fn test_quit_payout_never_exceeds_balance(
        balance in any::<u128>(),
        supply in 1u64..,
        share in any::<u64>(),
    ) {
        let tokens = share % supply + 1;
        prop_assert!(quit_payout(balance, tokens, supply) <= balance);
    }

    #[test]
    fn test_ledger_invariants_hold_under_random_operations(ops in prop::collection::vec(op(), 1..40)) {
        tokio_test::block_on(async {
            let clock = Arc::new(ManualClock::new(0));
            let registry = Arc::new(NftRegistry::new(10, clock.clone()));
            let members: Vec<Address> = (0..4).map(|i| Address::new(format!("member-{}", i))).collect();
            for (i, member) in members.iter().enumerate() {
                registry.mint_many(member, i as u64 + 1).await.unwrap();
            }

            let payouts = Arc::new(InMemoryPayouts::new());
            let engine = GovernanceEngine::new(
                GovernanceConfig {
                    voting_period_secs: 100,
                    initial_treasury: 60,
                    ..GovernanceConfig::default()
                },
                Collaborators {
                    oracle: registry.clone(),
                    marketplace: Arc::new(FixedPriceMarketplace::new(25)),
                    payouts: payouts.clone(),
                    clock: clock.clone(),
                },
            )
            .unwrap();

            let mut deposited: Amount = 60;
            for op in ops {
                let before = engine.proposal_count().await;
                match op {
                    Op::Create { member, sell, asset } => {
                        let kind = if sell { ProposalKind::Sell } else { ProposalKind::Buy };
                        let asset = AssetId::new(format!("asset-{}", asset));
                        let created = engine.create(kind, asset, &members[member]).await;
                        match created {
                            Ok(id) => prop_assert_eq!(id, ProposalId(before as u64)),
                            Err(_) => prop_assert_eq!(engine.proposal_count().await, before),
                        }
                    }
                    Op::Vote { member, proposal, yay } => {
                        let choice = if yay { VoteChoice::Yay } else { VoteChoice::Nay };
                        let _ = engine.vote(ProposalId(proposal), choice, &members[member]).await;
                    }
                    Op::Execute { proposal } => {
                        let _ = engine.execute(ProposalId(proposal), &members[0]).await;
                    }
                    Op::Deposit { amount } => {
                        engine.deposit(amount as Amount).await.unwrap();
                        deposited += amount as Amount;
                    }
                    Op::Quit { member } => {
                        let _ = engine.quit(&members[member]).await;
                    }
                    Op::Wait { secs } => clock.advance(secs),
                }
            }

            // Every unit is in the treasury, was paid out, or bought an asset
            let mut paid_out: Amount = 0;
            for member in &members {
                paid_out += payouts.received(member).await;
            }
            let proposals = engine.proposals().await;
            let mut spent: Amount = 0;
            for proposal in &proposals {
                if proposal.outcome == Some(ProposalOutcome::Approved) {
                    match proposal.kind {
                        ProposalKind::Buy => spent += 25,
                        ProposalKind::Sell => deposited += 25,
                    }
                }
            }
            prop_assert_eq!(engine.balance().await + paid_out + spent, deposited);

            for (index, proposal) in proposals.iter().enumerate() {
                prop_assert_eq!(proposal.id, ProposalId(index as u64));
                prop_assert_eq!(proposal.executed, proposal.outcome.is_some());
                prop_assert_eq!(proposal.deadline, proposal.created_at + 100);
            }
            Ok(())
        })?;
    }
}
