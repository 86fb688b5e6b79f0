//! Governance module for DevDAO
//!
//! A token-gated governance ledger: members holding a membership NFT open
//! proposals to buy or sell marketplace assets, vote on them until a
//! deadline, and execute the majority decision against a shared treasury.
//! Members can quit at any time for a proportional share of the treasury.
//!
//! Membership, the marketplace and the payout rail are external services
//! reached through the [`MembershipOracle`], [`Marketplace`] and
//! [`PayoutRail`] traits. In-memory implementations of each are bundled.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod marketplace;
pub mod membership;
pub mod payout;
pub mod storage;
pub mod treasury;
pub mod types;

pub use config::{GovernanceConfig, VoteWeightPolicy};
pub use engine::{quit_payout, Collaborators, GovernanceEngine};
pub use error::{ExternalError, ExternalResult, GovernanceError, GovernanceResult};
pub use events::{EventEnvelope, GovernanceEvent};
pub use ledger::ProposalLedger;
pub use marketplace::{FixedPriceMarketplace, Marketplace};
pub use membership::{MembershipOracle, NftRegistry, TokenId};
pub use payout::{InMemoryPayouts, PayoutRail};
pub use storage::{FileStore, LedgerSnapshot, LedgerStore, MemoryStore, StorageError};
pub use treasury::Treasury;
pub use types::{
    Address, Amount, AssetId, Proposal, ProposalId, ProposalKind, ProposalOutcome,
    ProposalStatus, VoteChoice,
};
