//! Core governance types

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use devdao_common::Timestamp;

/// Amount of treasury value, in the smallest unit
pub type Amount = u128;

/// Identity of a token holder
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Create a new address
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Get the address as a string reference
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of an external marketplace asset
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetId(String);

impl AssetId {
    /// Create a new asset id
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Get the asset id as a string reference
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AssetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Sequential proposal identifier, starting at 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProposalId(pub u64);

impl ProposalId {
    /// Position of this proposal in the append-only table
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a proposal asks the treasury to do with its asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalKind {
    /// Purchase the asset from the marketplace
    Buy,
    /// Sell a held asset back to the marketplace
    Sell,
}

impl fmt::Display for ProposalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposalKind::Buy => write!(f, "BUY"),
            ProposalKind::Sell => write!(f, "SELL"),
        }
    }
}

/// A ballot choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Yay,
    Nay,
}

/// How an executed proposal was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalOutcome {
    /// More yay than nay weight; the trade was settled
    Approved,
    /// Nay weight matched or exceeded yay; nothing was traded
    Rejected,
}

/// Lifecycle position of a proposal at a given time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Deadline not reached, votes accepted
    Active,
    /// Deadline reached, waiting for someone to execute
    AwaitingExecution,
    /// Finalized
    Executed(ProposalOutcome),
}

/// A timed ballot to buy or sell one asset with treasury funds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Sequential identifier
    pub id: ProposalId,
    /// The asset this proposal concerns
    pub asset_id: AssetId,
    /// Buy or sell
    pub kind: ProposalKind,
    /// Member that created the proposal
    pub proposer: Address,
    /// When the proposal was created
    pub created_at: Timestamp,
    /// Votes are accepted strictly before this time
    pub deadline: Timestamp,
    /// Accumulated weight in favour
    pub yay_votes: u64,
    /// Accumulated weight against
    pub nay_votes: u64,
    /// Set once, on successful execution
    pub executed: bool,
    /// Decision recorded at execution
    pub outcome: Option<ProposalOutcome>,
    /// Holders that already voted
    pub voters: BTreeSet<Address>,
}

impl Proposal {
    /// Create a fresh proposal with no votes
    pub fn new(
        id: ProposalId,
        kind: ProposalKind,
        asset_id: AssetId,
        proposer: Address,
        created_at: Timestamp,
        deadline: Timestamp,
    ) -> Self {
        Self {
            id,
            asset_id,
            kind,
            proposer,
            created_at,
            deadline,
            yay_votes: 0,
            nay_votes: 0,
            executed: false,
            outcome: None,
            voters: BTreeSet::new(),
        }
    }

    /// Whether votes are still accepted at `now`
    pub fn is_open_for_voting(&self, now: Timestamp) -> bool {
        now < self.deadline
    }

    /// Whether `voter` already cast a ballot
    pub fn has_voted(&self, voter: &Address) -> bool {
        self.voters.contains(voter)
    }

    /// Simple majority: strictly more yay than nay
    pub fn is_approved(&self) -> bool {
        self.yay_votes > self.nay_votes
    }

    /// Status of the proposal at `now`
    pub fn status(&self, now: Timestamp) -> ProposalStatus {
        match self.outcome {
            Some(outcome) if self.executed => ProposalStatus::Executed(outcome),
            _ if self.is_open_for_voting(now) => ProposalStatus::Active,
            _ => ProposalStatus::AwaitingExecution,
        }
    }
}
