//! Error types for governance operations

use thiserror::Error;

use crate::storage::StorageError;
use crate::types::{Address, Amount, AssetId, ProposalId};

/// Failure reported by an external collaborator (oracle, marketplace, payout rail)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExternalError {
    /// The collaborator refused the request
    #[error("{service} rejected the call: {reason}")]
    Rejected { service: String, reason: String },

    /// The collaborator could not be reached or did not answer
    #[error("{service} is unavailable: {reason}")]
    Unavailable { service: String, reason: String },
}

impl ExternalError {
    /// Create a rejection error
    pub fn rejected<S: Into<String>, R: Into<String>>(service: S, reason: R) -> Self {
        ExternalError::Rejected {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Create an unavailability error
    pub fn unavailable<S: Into<String>, R: Into<String>>(service: S, reason: R) -> Self {
        ExternalError::Unavailable {
            service: service.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for calls into external collaborators
pub type ExternalResult<T> = Result<T, ExternalError>;

/// Error types for governance operations
#[derive(Error, Debug)]
pub enum GovernanceError {
    /// Caller holds no membership token
    #[error("{0} is not a member")]
    NotAMember(Address),

    /// Unknown proposal id
    #[error("Proposal not found: {0}")]
    ProposalNotFound(ProposalId),

    /// Voting deadline has passed
    #[error("Voting on proposal {0} is closed")]
    VotingClosed(ProposalId),

    /// Voting deadline has not passed yet
    #[error("Voting on proposal {0} is still in progress")]
    VotingInProgress(ProposalId),

    /// Voter already voted on this proposal
    #[error("{voter} already voted on proposal {proposal}")]
    AlreadyVoted { proposal: ProposalId, voter: Address },

    /// Proposal has already been executed
    #[error("Proposal {0} has already been executed")]
    AlreadyExecuted(ProposalId),

    /// Asset cannot be bought (already held or not for sale)
    #[error("Asset {0} is not available for purchase")]
    AssetUnavailable(AssetId),

    /// Asset is not among the treasury holdings
    #[error("Asset {0} is not held by the treasury")]
    AssetNotHeld(AssetId),

    /// Treasury cannot cover the requested amount
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Amount, available: Amount },

    /// An external collaborator failed
    #[error("External call failed: {0}")]
    ExternalCallFailed(#[from] ExternalError),

    /// Amount arithmetic left the representable range
    #[error("Arithmetic overflow: {0}")]
    ArithmeticOverflow(String),

    /// Persistence error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] devdao_common::Error),
}

impl GovernanceError {
    /// Whether a retry of the same call can succeed later without other
    /// proposals changing state (only underfunded executions)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GovernanceError::InsufficientFunds { .. })
    }
}

/// Result type for governance operations
pub type GovernanceResult<T> = Result<T, GovernanceError>;
