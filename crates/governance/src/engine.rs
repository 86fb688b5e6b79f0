//! Governance engine
//!
//! The engine owns the proposal ledger and the treasury and drives them
//! against the injected collaborators. Every mutating call holds the state
//! write lock from validation to the last external call, so mutations are
//! totally ordered and readers only ever see settled state.
//!
//! Each operation follows the same shape: validate, compute, apply local
//! changes, call out, and undo the local changes if the call fails.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use devdao_common::{Clock, Configuration};

use crate::config::{GovernanceConfig, VoteWeightPolicy};
use crate::error::{ExternalError, GovernanceError, GovernanceResult};
use crate::events::{EventEnvelope, GovernanceEvent, EVENT_CHANNEL_CAPACITY};
use crate::ledger::ProposalLedger;
use crate::marketplace::Marketplace;
use crate::membership::MembershipOracle;
use crate::payout::PayoutRail;
use crate::storage::{load_snapshot, save_snapshot, LedgerSnapshot, LedgerStore};
use crate::treasury::Treasury;
use crate::types::{
    Address, Amount, AssetId, Proposal, ProposalId, ProposalKind, ProposalOutcome,
    ProposalStatus, VoteChoice,
};

/// External services a governance instance talks to
#[derive(Clone)]
pub struct Collaborators {
    pub oracle: Arc<dyn MembershipOracle>,
    pub marketplace: Arc<dyn Marketplace>,
    pub payouts: Arc<dyn PayoutRail>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Default)]
struct GovernanceState {
    ledger: ProposalLedger,
    treasury: Treasury,
    /// Holders already paid out whose tokens could not be burned
    pending_exits: BTreeSet<Address>,
}

impl GovernanceState {
    /// Refuse holders with an unfinished exit
    fn ensure_not_exiting(&self, holder: &Address) -> GovernanceResult<()> {
        if self.pending_exits.contains(holder) {
            debug!("{} has an unfinished exit", holder);
            return Err(GovernanceError::NotAMember(holder.clone()));
        }
        Ok(())
    }
}

/// `floor(balance * tokens / supply)` without overflowing.
///
/// Splitting the balance into quotient and remainder keeps every
/// intermediate product below `balance` or below `supply * tokens`.
pub fn quit_payout(balance: Amount, tokens: u64, supply: u64) -> Amount {
    if supply == 0 {
        return 0;
    }
    let supply = Amount::from(supply);
    let tokens = Amount::from(tokens);
    (balance / supply) * tokens + (balance % supply) * tokens / supply
}

/// A single governance instance
pub struct GovernanceEngine {
    config: GovernanceConfig,
    oracle: Arc<dyn MembershipOracle>,
    marketplace: Arc<dyn Marketplace>,
    payouts: Arc<dyn PayoutRail>,
    clock: Arc<dyn Clock>,
    state: RwLock<GovernanceState>,
    events: broadcast::Sender<EventEnvelope>,
}

impl GovernanceEngine {
    /// Create an engine with an empty ledger and a treasury holding
    /// `config.initial_treasury`
    pub fn new(config: GovernanceConfig, collaborators: Collaborators) -> GovernanceResult<Self> {
        let state = GovernanceState {
            treasury: Treasury::new(config.initial_treasury),
            ..GovernanceState::default()
        };
        Self::with_state(config, collaborators, state)
    }

    /// Rebuild an engine from a persisted snapshot
    pub fn from_snapshot(
        config: GovernanceConfig,
        collaborators: Collaborators,
        snapshot: LedgerSnapshot,
    ) -> GovernanceResult<Self> {
        let state = GovernanceState {
            ledger: ProposalLedger::restore(snapshot.proposals)?,
            treasury: snapshot.treasury,
            pending_exits: snapshot.pending_exits,
        };
        Self::with_state(config, collaborators, state)
    }

    /// Load state from `store`, or start fresh if it holds nothing
    pub async fn restore(
        config: GovernanceConfig,
        collaborators: Collaborators,
        store: &dyn LedgerStore,
    ) -> GovernanceResult<Self> {
        match load_snapshot(store).await? {
            Some(snapshot) => {
                info!(
                    "Restoring governance state with {} proposals",
                    snapshot.proposals.len()
                );
                Self::from_snapshot(config, collaborators, snapshot)
            }
            None => {
                info!("No persisted governance state, starting fresh");
                Self::new(config, collaborators)
            }
        }
    }

    fn with_state(
        config: GovernanceConfig,
        collaborators: Collaborators,
        state: GovernanceState,
    ) -> GovernanceResult<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config,
            oracle: collaborators.oracle,
            marketplace: collaborators.marketplace,
            payouts: collaborators.payouts,
            clock: collaborators.clock,
            state: RwLock::new(state),
            events,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events.subscribe()
    }

    fn emit(&self, event: GovernanceEvent) {
        if self.events.send(EventEnvelope::now(event)).is_err() {
            debug!("No event subscribers");
        }
    }

    /// Current token balance of `holder`, failing if it is zero
    async fn require_member(&self, holder: &Address) -> GovernanceResult<u64> {
        let balance = self.oracle.balance_of(holder).await?;
        if balance == 0 {
            return Err(GovernanceError::NotAMember(holder.clone()));
        }
        Ok(balance)
    }

    // --------------------------------------------------------------
    // Mutations
    // --------------------------------------------------------------

    /// Open a proposal to buy or sell `asset_id`
    pub async fn create(
        &self,
        kind: ProposalKind,
        asset_id: AssetId,
        requester: &Address,
    ) -> GovernanceResult<ProposalId> {
        let mut state = self.state.write().await;
        let now = self.clock.now();

        state.ensure_not_exiting(requester)?;
        self.require_member(requester).await?;

        match kind {
            ProposalKind::Buy => {
                if state.treasury.holds(&asset_id) || !self.marketplace.available(&asset_id).await? {
                    return Err(GovernanceError::AssetUnavailable(asset_id));
                }
            }
            ProposalKind::Sell => {
                if !state.treasury.holds(&asset_id) {
                    return Err(GovernanceError::AssetNotHeld(asset_id));
                }
            }
        }

        let id = state.ledger.open(
            kind,
            asset_id.clone(),
            requester.clone(),
            now,
            self.config.voting_period_secs,
        )?;
        let deadline = state.ledger.get(id)?.deadline;

        info!("{} opened proposal {} to {} asset {}", requester, id, kind, asset_id);
        self.emit(GovernanceEvent::ProposalCreated {
            proposal_id: id,
            kind,
            asset_id,
            proposer: requester.clone(),
            deadline,
        });
        Ok(id)
    }

    /// Cast `voter`'s ballot on proposal `id`
    pub async fn vote(
        &self,
        id: ProposalId,
        choice: VoteChoice,
        voter: &Address,
    ) -> GovernanceResult<()> {
        let mut state = self.state.write().await;
        let now = self.clock.now();

        state.ensure_not_exiting(voter)?;
        let current = self.require_member(voter).await?;
        let created_at = state.ledger.ensure_can_vote(id, voter, now)?.created_at;

        let weight = match self.config.vote_weight_policy {
            VoteWeightPolicy::Live => current,
            VoteWeightPolicy::Snapshot => self.oracle.balance_of_at(voter, created_at).await?,
        };
        if weight == 0 {
            debug!("{} held no tokens when proposal {} was created", voter, id);
            return Err(GovernanceError::NotAMember(voter.clone()));
        }

        state.ledger.record_vote(id, voter, choice, weight, now)?;

        info!("{} voted {:?} on proposal {} with weight {}", voter, choice, id, weight);
        self.emit(GovernanceEvent::VoteCast {
            proposal_id: id,
            voter: voter.clone(),
            choice,
            weight,
        });
        Ok(())
    }

    /// Finalize proposal `id` once its deadline has passed.
    ///
    /// An approved proposal settles its trade; a rejected one is frozen with
    /// no economic effect. An approved BUY the treasury cannot afford fails
    /// with `InsufficientFunds` and stays executable.
    pub async fn execute(
        &self,
        id: ProposalId,
        executor: &Address,
    ) -> GovernanceResult<ProposalOutcome> {
        let mut state = self.state.write().await;
        let now = self.clock.now();

        if self.config.members_only_execution {
            state.ensure_not_exiting(executor)?;
            self.require_member(executor).await?;
        }

        let proposal = state.ledger.ensure_executable(id, now)?.clone();

        if !proposal.is_approved() {
            state.ledger.mark_executed(id, ProposalOutcome::Rejected)?;
            info!(
                "Proposal {} rejected ({} yay / {} nay), executed by {}",
                id, proposal.yay_votes, proposal.nay_votes, executor
            );
            self.emit(GovernanceEvent::ProposalExecuted {
                proposal_id: id,
                outcome: ProposalOutcome::Rejected,
                settled: 0,
            });
            return Ok(ProposalOutcome::Rejected);
        }

        let settled = match proposal.kind {
            ProposalKind::Buy => self.settle_buy(&mut state.treasury, &proposal.asset_id).await?,
            ProposalKind::Sell => self.settle_sell(&mut state.treasury, &proposal.asset_id).await?,
        };
        state.ledger.mark_executed(id, ProposalOutcome::Approved)?;

        info!(
            "Proposal {} approved ({} yay / {} nay): {} asset {} for {}, executed by {}",
            id, proposal.yay_votes, proposal.nay_votes, proposal.kind, proposal.asset_id, settled, executor
        );
        self.emit(GovernanceEvent::ProposalExecuted {
            proposal_id: id,
            outcome: ProposalOutcome::Approved,
            settled,
        });
        Ok(ProposalOutcome::Approved)
    }

    async fn settle_buy(&self, treasury: &mut Treasury, asset: &AssetId) -> GovernanceResult<Amount> {
        if treasury.holds(asset) {
            return Err(GovernanceError::AssetUnavailable(asset.clone()));
        }

        let price = self.marketplace.get_price(asset).await?;
        treasury.withdraw(price)?;

        if let Err(e) = self.marketplace.buy(asset, price).await {
            warn!("Purchase of {} failed, returning {} to treasury: {}", asset, price, e);
            treasury.deposit(price)?;
            return Err(e.into());
        }

        treasury.acquire(asset.clone());
        Ok(price)
    }

    async fn settle_sell(&self, treasury: &mut Treasury, asset: &AssetId) -> GovernanceResult<Amount> {
        if !treasury.holds(asset) {
            return Err(GovernanceError::AssetNotHeld(asset.clone()));
        }

        let quoted = self.marketplace.get_price(asset).await?;
        if treasury.balance().checked_add(quoted).is_none() {
            return Err(GovernanceError::ArithmeticOverflow(format!(
                "treasury balance {} cannot take proceeds {} for {}",
                treasury.balance(),
                quoted,
                asset
            )));
        }

        let proceeds = self.marketplace.sell(asset).await?;
        treasury.release(asset);
        if let Err(e) = treasury.deposit(proceeds) {
            // Proceeds above the quote; the asset is gone either way
            error!("Sold {} but could not credit {} proceeds: {}", asset, proceeds, e);
            return Err(e);
        }

        Ok(proceeds)
    }

    /// Leave the DAO: receive a proportional share of the treasury and burn
    /// every membership token. Returns the payout.
    ///
    /// A holder whose earlier quit was paid but not burned only retries the
    /// burn and receives nothing further.
    pub async fn quit(&self, holder: &Address) -> GovernanceResult<Amount> {
        let mut state = self.state.write().await;

        if state.pending_exits.contains(holder) {
            let burned = self.oracle.burn_all(holder).await?;
            state.pending_exits.remove(holder);

            info!("Finished exit of {}, burned {} tokens", holder, burned);
            self.emit(GovernanceEvent::MemberQuit {
                member: holder.clone(),
                tokens_burned: burned,
                payout: 0,
            });
            return Ok(0);
        }

        let tokens = self.require_member(holder).await?;
        let supply = self.oracle.total_supply().await?;
        if supply < tokens {
            return Err(ExternalError::rejected(
                "membership registry",
                format!("total supply {} below balance {} of {}", supply, tokens, holder),
            )
            .into());
        }

        let payout = quit_payout(state.treasury.balance(), tokens, supply);
        state.treasury.withdraw(payout)?;

        if payout > 0 {
            if let Err(e) = self.payouts.transfer(holder, payout).await {
                warn!("Payout of {} to {} failed, quit aborted: {}", payout, holder, e);
                state.treasury.deposit(payout)?;
                return Err(e.into());
            }
        }

        let burned = match self.oracle.burn_all(holder).await {
            Ok(burned) => burned,
            Err(e) => {
                // The payout already left the system and cannot be recalled
                error!(
                    "Paid {} to {} but burning their tokens failed: {}",
                    payout, holder, e
                );
                state.pending_exits.insert(holder.clone());
                return Err(e.into());
            }
        };

        info!(
            "{} quit with {} of {} tokens, paid {}",
            holder, tokens, supply, payout
        );
        self.emit(GovernanceEvent::MemberQuit {
            member: holder.clone(),
            tokens_burned: burned,
            payout,
        });
        Ok(payout)
    }

    /// Credit the treasury, returning the new balance
    pub async fn deposit(&self, amount: Amount) -> GovernanceResult<Amount> {
        let mut state = self.state.write().await;
        let balance = state.treasury.deposit(amount)?;

        info!("Deposited {} into treasury, balance {}", amount, balance);
        self.emit(GovernanceEvent::Deposited { amount, balance });
        Ok(balance)
    }

    // --------------------------------------------------------------
    // Queries
    // --------------------------------------------------------------

    /// Snapshot of proposal `id`
    pub async fn get(&self, id: ProposalId) -> GovernanceResult<Proposal> {
        self.state.read().await.ledger.get(id).cloned()
    }

    /// Every proposal in id order
    pub async fn proposals(&self) -> Vec<Proposal> {
        self.state.read().await.ledger.proposals().to_vec()
    }

    /// Number of proposals ever created
    pub async fn proposal_count(&self) -> usize {
        self.state.read().await.ledger.len()
    }

    /// Lifecycle position of proposal `id` right now
    pub async fn proposal_status(&self, id: ProposalId) -> GovernanceResult<ProposalStatus> {
        let now = self.clock.now();
        Ok(self.state.read().await.ledger.get(id)?.status(now))
    }

    /// Treasury balance
    pub async fn balance(&self) -> Amount {
        self.state.read().await.treasury.balance()
    }

    /// Holders whose exit is paid but not yet burned
    pub async fn pending_exits(&self) -> Vec<Address> {
        self.state.read().await.pending_exits.iter().cloned().collect()
    }

    /// Assets the treasury holds
    pub async fn holdings(&self) -> Vec<AssetId> {
        self.state.read().await.treasury.holdings().cloned().collect()
    }

    /// Weight `holder` would vote with on proposal `id` right now
    pub async fn voting_power(&self, holder: &Address, id: ProposalId) -> GovernanceResult<u64> {
        let created_at = {
            let state = self.state.read().await;
            if state.pending_exits.contains(holder) {
                return Ok(0);
            }
            state.ledger.get(id)?.created_at
        };
        let weight = match self.config.vote_weight_policy {
            VoteWeightPolicy::Live => self.oracle.balance_of(holder).await?,
            VoteWeightPolicy::Snapshot => self.oracle.balance_of_at(holder, created_at).await?,
        };
        Ok(weight)
    }

    /// Copy of everything the core persists
    pub async fn snapshot(&self) -> LedgerSnapshot {
        let state = self.state.read().await;
        LedgerSnapshot {
            proposals: state.ledger.proposals().to_vec(),
            treasury: state.treasury.clone(),
            pending_exits: state.pending_exits.clone(),
        }
    }

    /// Write the current state to `store`
    pub async fn persist(&self, store: &dyn LedgerStore) -> GovernanceResult<()> {
        let snapshot = self.snapshot().await;
        save_snapshot(store, &snapshot).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::FixedPriceMarketplace;
    use crate::membership::NftRegistry;
    use crate::payout::InMemoryPayouts;
    use devdao_common::ManualClock;

    #[test]
    fn test_quit_payout_rounds_down() {
        assert_eq!(quit_payout(50, 2, 10), 10);
        assert_eq!(quit_payout(99, 1, 10), 9);
        assert_eq!(quit_payout(7, 3, 3), 7);
        assert_eq!(quit_payout(0, 1, 10), 0);
        assert_eq!(quit_payout(10, 1, 0), 0);
    }

    #[test]
    fn test_quit_payout_large_balance() {
        let balance = Amount::MAX - 1;
        assert_eq!(quit_payout(balance, 1, 1), balance);
        assert_eq!(quit_payout(balance, 1, 2), balance / 2);
    }

    async fn engine() -> (Arc<ManualClock>, Arc<NftRegistry>, GovernanceEngine) {
        let clock = Arc::new(ManualClock::new(1_000));
        let registry = Arc::new(NftRegistry::new(10, clock.clone()));
        let collaborators = Collaborators {
            oracle: registry.clone(),
            marketplace: Arc::new(FixedPriceMarketplace::new(20)),
            payouts: Arc::new(InMemoryPayouts::new()),
            clock: clock.clone(),
        };
        let config = GovernanceConfig {
            initial_treasury: 100,
            ..GovernanceConfig::default()
        };
        let engine = GovernanceEngine::new(config, collaborators).unwrap();
        (clock, registry, engine)
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let clock = Arc::new(ManualClock::new(0));
        let collaborators = Collaborators {
            oracle: Arc::new(NftRegistry::new(10, clock.clone())),
            marketplace: Arc::new(FixedPriceMarketplace::new(20)),
            payouts: Arc::new(InMemoryPayouts::new()),
            clock,
        };
        let config = GovernanceConfig {
            voting_period_secs: 0,
            ..GovernanceConfig::default()
        };
        assert!(matches!(
            GovernanceEngine::new(config, collaborators),
            Err(GovernanceError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_events_follow_mutations() {
        let (clock, registry, engine) = engine().await;
        let alice = Address::from("alice");
        registry.mint(&alice).await.unwrap();

        let mut events = engine.subscribe();
        let id = engine
            .create(ProposalKind::Buy, AssetId::from("X"), &alice)
            .await
            .unwrap();
        engine.vote(id, VoteChoice::Yay, &alice).await.unwrap();
        clock.advance(300);
        engine.execute(id, &alice).await.unwrap();

        let kinds: Vec<GovernanceEvent> = (0..3)
            .map(|_| events.try_recv().unwrap().event)
            .collect();
        assert!(matches!(kinds[0], GovernanceEvent::ProposalCreated { deadline: 1_300, .. }));
        assert!(matches!(kinds[1], GovernanceEvent::VoteCast { weight: 1, .. }));
        assert!(matches!(
            kinds[2],
            GovernanceEvent::ProposalExecuted { outcome: ProposalOutcome::Approved, settled: 20, .. }
        ));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_call_emits_nothing() {
        let (_, _, engine) = engine().await;
        let mut events = engine.subscribe();

        let result = engine
            .create(ProposalKind::Buy, AssetId::from("X"), &Address::from("nobody"))
            .await;
        assert!(matches!(result, Err(GovernanceError::NotAMember(_))));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_proposal_status_follows_clock() {
        let (clock, registry, engine) = engine().await;
        let alice = Address::from("alice");
        registry.mint(&alice).await.unwrap();

        let id = engine
            .create(ProposalKind::Buy, AssetId::from("X"), &alice)
            .await
            .unwrap();
        assert_eq!(engine.proposal_status(id).await.unwrap(), ProposalStatus::Active);

        clock.advance(300);
        assert_eq!(
            engine.proposal_status(id).await.unwrap(),
            ProposalStatus::AwaitingExecution
        );

        engine.execute(id, &alice).await.unwrap();
        assert_eq!(
            engine.proposal_status(id).await.unwrap(),
            ProposalStatus::Executed(ProposalOutcome::Rejected)
        );
    }
}
