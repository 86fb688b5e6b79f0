//! Proposal ledger
//!
//! The ledger is the append-only proposal table and the state machine each
//! proposal walks through. It has no knowledge of membership or markets; the
//! engine decides eligibility and weight, the ledger enforces deadlines,
//! single votes and single execution.

use tracing::debug;

use devdao_common::Timestamp;

use crate::error::{GovernanceError, GovernanceResult};
use crate::storage::StorageError;
use crate::types::{Address, AssetId, Proposal, ProposalId, ProposalKind, ProposalOutcome, VoteChoice};

/// Append-only table of proposals indexed by id
#[derive(Debug, Clone, Default)]
pub struct ProposalLedger {
    proposals: Vec<Proposal>,
}

impl ProposalLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from persisted proposals, which must be gapless and
    /// ordered by id from 0
    pub fn restore(proposals: Vec<Proposal>) -> GovernanceResult<Self> {
        for (index, proposal) in proposals.iter().enumerate() {
            if proposal.id.index() != index {
                return Err(StorageError::Corrupt(format!(
                    "proposal {} stored at position {}",
                    proposal.id, index
                ))
                .into());
            }
            if proposal.executed != proposal.outcome.is_some() {
                return Err(StorageError::Corrupt(format!(
                    "proposal {} has inconsistent execution state",
                    proposal.id
                ))
                .into());
            }
        }
        Ok(Self { proposals })
    }

    /// Id the next proposal will receive
    pub fn next_id(&self) -> ProposalId {
        ProposalId(self.proposals.len() as u64)
    }

    /// Number of proposals ever created
    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    /// Whether no proposal was ever created
    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    /// All proposals in id order
    pub fn proposals(&self) -> &[Proposal] {
        &self.proposals
    }

    /// Look up a proposal
    pub fn get(&self, id: ProposalId) -> GovernanceResult<&Proposal> {
        self.proposals
            .get(id.index())
            .ok_or(GovernanceError::ProposalNotFound(id))
    }

    fn get_mut(&mut self, id: ProposalId) -> GovernanceResult<&mut Proposal> {
        self.proposals
            .get_mut(id.index())
            .ok_or(GovernanceError::ProposalNotFound(id))
    }

    /// Append a new proposal whose voting closes `voting_period` after `now`
    pub fn open(
        &mut self,
        kind: ProposalKind,
        asset_id: AssetId,
        proposer: Address,
        now: Timestamp,
        voting_period: u64,
    ) -> GovernanceResult<ProposalId> {
        let deadline = now.checked_add(voting_period).ok_or_else(|| {
            GovernanceError::ArithmeticOverflow(format!(
                "deadline {} + {} out of range",
                now, voting_period
            ))
        })?;

        let id = self.next_id();
        self.proposals
            .push(Proposal::new(id, kind, asset_id, proposer, now, deadline));

        debug!("Opened proposal {} with deadline {}", id, deadline);
        Ok(id)
    }

    /// Check that `voter` may vote on `id` at `now`
    pub fn ensure_can_vote(
        &self,
        id: ProposalId,
        voter: &Address,
        now: Timestamp,
    ) -> GovernanceResult<&Proposal> {
        let proposal = self.get(id)?;
        if !proposal.is_open_for_voting(now) {
            return Err(GovernanceError::VotingClosed(id));
        }
        if proposal.has_voted(voter) {
            return Err(GovernanceError::AlreadyVoted {
                proposal: id,
                voter: voter.clone(),
            });
        }
        Ok(proposal)
    }

    /// Count a ballot of `weight` for `voter`
    pub fn record_vote(
        &mut self,
        id: ProposalId,
        voter: &Address,
        choice: VoteChoice,
        weight: u64,
        now: Timestamp,
    ) -> GovernanceResult<()> {
        self.ensure_can_vote(id, voter, now)?;
        let proposal = self.get_mut(id)?;

        let tally = match choice {
            VoteChoice::Yay => &mut proposal.yay_votes,
            VoteChoice::Nay => &mut proposal.nay_votes,
        };
        *tally = tally.checked_add(weight).ok_or_else(|| {
            GovernanceError::ArithmeticOverflow(format!("vote tally on proposal {}", id))
        })?;
        proposal.voters.insert(voter.clone());

        debug!(
            "Recorded {:?} vote of weight {} from {} on proposal {}",
            choice, weight, voter, id
        );
        Ok(())
    }

    /// Check that `id` may be executed at `now`
    pub fn ensure_executable(&self, id: ProposalId, now: Timestamp) -> GovernanceResult<&Proposal> {
        let proposal = self.get(id)?;
        if proposal.is_open_for_voting(now) {
            return Err(GovernanceError::VotingInProgress(id));
        }
        if proposal.executed {
            return Err(GovernanceError::AlreadyExecuted(id));
        }
        Ok(proposal)
    }

    /// Freeze `id` with its outcome
    pub fn mark_executed(&mut self, id: ProposalId, outcome: ProposalOutcome) -> GovernanceResult<()> {
        let proposal = self.get_mut(id)?;
        if proposal.executed {
            return Err(GovernanceError::AlreadyExecuted(id));
        }
        proposal.executed = true;
        proposal.outcome = Some(outcome);

        debug!("Proposal {} executed as {:?}", id, outcome);
        Ok(())
    }
}
