//! Payout rail used to hand treasury value to exiting members

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ExternalError, ExternalResult};
use crate::types::{Address, Amount};

const SERVICE: &str = "payout rail";

/// Moves value out of the treasury to a holder
#[async_trait]
pub trait PayoutRail: Send + Sync {
    /// Send `amount` to `to`
    async fn transfer(&self, to: &Address, amount: Amount) -> ExternalResult<()>;
}

/// In-memory rail recording what every address received
#[derive(Default)]
pub struct InMemoryPayouts {
    received: RwLock<HashMap<Address, Amount>>,
    blocked: RwLock<HashSet<Address>>,
}

impl InMemoryPayouts {
    /// Create an empty rail
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future transfer to `address` fail
    pub async fn block(&self, address: &Address) {
        self.blocked.write().await.insert(address.clone());
    }

    /// Total received by `address`
    pub async fn received(&self, address: &Address) -> Amount {
        self.received
            .read()
            .await
            .get(address)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl PayoutRail for InMemoryPayouts {
    async fn transfer(&self, to: &Address, amount: Amount) -> ExternalResult<()> {
        if self.blocked.read().await.contains(to) {
            return Err(ExternalError::rejected(
                SERVICE,
                format!("{} cannot receive funds", to),
            ));
        }

        let mut received = self.received.write().await;
        let total = received.entry(to.clone()).or_insert(0);
        *total = total.checked_add(amount).ok_or_else(|| {
            ExternalError::rejected(SERVICE, format!("balance of {} would overflow", to))
        })?;

        debug!("Paid {} to {}", amount, to);
        Ok(())
    }
}
