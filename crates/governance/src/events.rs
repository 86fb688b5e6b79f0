//! Governance events emitted after each successful state change

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Address, Amount, AssetId, ProposalId, ProposalKind, ProposalOutcome, VoteChoice};

/// Capacity of the engine's broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Something that happened to the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernanceEvent {
    ProposalCreated {
        proposal_id: ProposalId,
        kind: ProposalKind,
        asset_id: AssetId,
        proposer: Address,
        deadline: u64,
    },
    VoteCast {
        proposal_id: ProposalId,
        voter: Address,
        choice: VoteChoice,
        weight: u64,
    },
    ProposalExecuted {
        proposal_id: ProposalId,
        outcome: ProposalOutcome,
        /// Price paid or proceeds received, zero when rejected
        settled: Amount,
    },
    Deposited {
        amount: Amount,
        balance: Amount,
    },
    MemberQuit {
        member: Address,
        tokens_burned: u64,
        payout: Amount,
    },
}

/// An event with the wall-clock time it was emitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub emitted_at: DateTime<Utc>,
    pub event: GovernanceEvent,
}

impl EventEnvelope {
    /// Stamp `event` with the current time
    pub fn now(event: GovernanceEvent) -> Self {
        Self {
            emitted_at: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = GovernanceEvent::Deposited { amount: 5, balance: 105 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["deposited"]["balance"], 105);
    }
}
