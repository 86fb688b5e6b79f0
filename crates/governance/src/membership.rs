//! Membership oracle
//!
//! Membership is owning at least one token of the DAO's NFT collection. The
//! governance engine only observes ownership through [`MembershipOracle`];
//! the one mutation it ever requests is `burn_all` when a member quits.
//!
//! [`NftRegistry`] is an in-memory collection with a capped supply that keeps
//! per-holder balance checkpoints, so it can also answer historical queries.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use devdao_common::{Clock, Timestamp};

use crate::error::{ExternalError, ExternalResult};
use crate::types::Address;

const SERVICE: &str = "membership registry";

/// Read access to token ownership plus the exit hook
#[async_trait]
pub trait MembershipOracle: Send + Sync {
    /// Number of tokens `holder` owns now
    async fn balance_of(&self, holder: &Address) -> ExternalResult<u64>;

    /// Number of tokens `holder` owned as of `at`
    async fn balance_of_at(&self, holder: &Address, at: Timestamp) -> ExternalResult<u64>;

    /// Outstanding tokens
    async fn total_supply(&self) -> ExternalResult<u64>;

    /// Destroy every token `holder` owns, returning how many were burned
    async fn burn_all(&self, holder: &Address) -> ExternalResult<u64>;
}

/// Token identifier within the collection
pub type TokenId = u64;

#[derive(Debug, Default)]
struct RegistryState {
    owners: BTreeMap<TokenId, Address>,
    next_token_id: TokenId,
    /// Balance history per holder, appended on every change
    checkpoints: HashMap<Address, Vec<(Timestamp, u64)>>,
}

impl RegistryState {
    fn balance(&self, holder: &Address) -> u64 {
        self.checkpoints
            .get(holder)
            .and_then(|history| history.last())
            .map(|(_, balance)| *balance)
            .unwrap_or(0)
    }

    fn balance_at(&self, holder: &Address, at: Timestamp) -> u64 {
        self.checkpoints
            .get(holder)
            .and_then(|history| history.iter().rev().find(|(ts, _)| *ts <= at))
            .map(|(_, balance)| *balance)
            .unwrap_or(0)
    }

    fn record(&mut self, holder: &Address, now: Timestamp, balance: u64) {
        let history = self.checkpoints.entry(holder.clone()).or_default();
        match history.last_mut() {
            Some(last) if last.0 == now => last.1 = balance,
            _ => history.push((now, balance)),
        }
    }
}

/// In-memory NFT collection with a capped supply
pub struct NftRegistry {
    max_supply: u64,
    clock: Arc<dyn Clock>,
    state: RwLock<RegistryState>,
}

impl NftRegistry {
    /// Create an empty collection
    pub fn new(max_supply: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_supply,
            clock,
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Mint the next token to `to`
    pub async fn mint(&self, to: &Address) -> ExternalResult<TokenId> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        if state.owners.len() as u64 >= self.max_supply {
            return Err(ExternalError::rejected(
                SERVICE,
                format!("max supply of {} reached", self.max_supply),
            ));
        }

        let token_id = state.next_token_id;
        state.next_token_id += 1;
        state.owners.insert(token_id, to.clone());

        let balance = state.balance(to) + 1;
        state.record(to, now, balance);

        debug!("Minted token {} to {}", token_id, to);
        Ok(token_id)
    }

    /// Mint `count` tokens to `to`
    pub async fn mint_many(&self, to: &Address, count: u64) -> ExternalResult<Vec<TokenId>> {
        let mut minted = Vec::with_capacity(count as usize);
        for _ in 0..count {
            minted.push(self.mint(to).await?);
        }
        Ok(minted)
    }

    /// Move `token_id` from `from` to `to`
    pub async fn transfer(
        &self,
        from: &Address,
        to: &Address,
        token_id: TokenId,
    ) -> ExternalResult<()> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        match state.owners.get(&token_id) {
            Some(owner) if owner == from => {}
            Some(_) => {
                return Err(ExternalError::rejected(
                    SERVICE,
                    format!("{} does not own token {}", from, token_id),
                ))
            }
            None => {
                return Err(ExternalError::rejected(
                    SERVICE,
                    format!("token {} does not exist", token_id),
                ))
            }
        }

        state.owners.insert(token_id, to.clone());
        let from_balance = state.balance(from) - 1;
        state.record(from, now, from_balance);
        let to_balance = state.balance(to) + 1;
        state.record(to, now, to_balance);

        debug!("Transferred token {} from {} to {}", token_id, from, to);
        Ok(())
    }

    /// Tokens owned by `holder`, in id order
    pub async fn tokens_of(&self, holder: &Address) -> Vec<TokenId> {
        let state = self.state.read().await;
        state
            .owners
            .iter()
            .filter(|(_, owner)| *owner == holder)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Owner of `token_id`, if minted and not burned
    pub async fn owner_of(&self, token_id: TokenId) -> Option<Address> {
        self.state.read().await.owners.get(&token_id).cloned()
    }
}

#[async_trait]
impl MembershipOracle for NftRegistry {
    async fn balance_of(&self, holder: &Address) -> ExternalResult<u64> {
        Ok(self.state.read().await.balance(holder))
    }

    async fn balance_of_at(&self, holder: &Address, at: Timestamp) -> ExternalResult<u64> {
        Ok(self.state.read().await.balance_at(holder, at))
    }

    async fn total_supply(&self) -> ExternalResult<u64> {
        Ok(self.state.read().await.owners.len() as u64)
    }

    async fn burn_all(&self, holder: &Address) -> ExternalResult<u64> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        let before = state.owners.len();
        state.owners.retain(|_, owner| owner != holder);
        let burned = (before - state.owners.len()) as u64;

        if burned > 0 {
            state.record(holder, now, 0);
            info!("Burned {} membership tokens of {}", burned, holder);
        }
        Ok(burned)
    }
}
