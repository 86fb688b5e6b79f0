//! Marketplace adapter
//!
//! The governance engine trades through [`Marketplace`]. Every call may fail;
//! the engine is responsible for undoing its own bookkeeping when one does.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ExternalError, ExternalResult};
use crate::types::{Amount, AssetId};

const SERVICE: &str = "marketplace";

/// Price quotes and trade execution for external assets
#[async_trait]
pub trait Marketplace: Send + Sync {
    /// Current price of `asset`
    async fn get_price(&self, asset: &AssetId) -> ExternalResult<Amount>;

    /// Whether `asset` can be bought right now
    async fn available(&self, asset: &AssetId) -> ExternalResult<bool>;

    /// Buy `asset`, paying exactly `amount`
    async fn buy(&self, asset: &AssetId, amount: Amount) -> ExternalResult<()>;

    /// Sell `asset` back, returning the proceeds
    async fn sell(&self, asset: &AssetId) -> ExternalResult<Amount>;
}

/// In-memory marketplace that quotes one price for every asset.
///
/// An asset can be bought once; selling returns it to the market at the
/// same price.
pub struct FixedPriceMarketplace {
    price: Amount,
    /// Assets bought and not yet sold back, with the amount paid
    sold: RwLock<HashMap<AssetId, Amount>>,
}

impl FixedPriceMarketplace {
    /// Create a market quoting `price` for every asset
    pub fn new(price: Amount) -> Self {
        Self {
            price,
            sold: RwLock::new(HashMap::new()),
        }
    }

    /// Number of assets currently bought out of the market
    pub async fn sold_count(&self) -> usize {
        self.sold.read().await.len()
    }
}

#[async_trait]
impl Marketplace for FixedPriceMarketplace {
    async fn get_price(&self, _asset: &AssetId) -> ExternalResult<Amount> {
        Ok(self.price)
    }

    async fn available(&self, asset: &AssetId) -> ExternalResult<bool> {
        Ok(!self.sold.read().await.contains_key(asset))
    }

    async fn buy(&self, asset: &AssetId, amount: Amount) -> ExternalResult<()> {
        if amount != self.price {
            return Err(ExternalError::rejected(
                SERVICE,
                format!("asset {} costs {}, got {}", asset, self.price, amount),
            ));
        }

        let mut sold = self.sold.write().await;
        if sold.contains_key(asset) {
            return Err(ExternalError::rejected(
                SERVICE,
                format!("asset {} is already sold", asset),
            ));
        }
        sold.insert(asset.clone(), amount);

        debug!("Marketplace sold asset {} for {}", asset, amount);
        Ok(())
    }

    async fn sell(&self, asset: &AssetId) -> ExternalResult<Amount> {
        let mut sold = self.sold.write().await;
        if sold.remove(asset).is_none() {
            return Err(ExternalError::rejected(
                SERVICE,
                format!("asset {} was not bought here", asset),
            ));
        }

        debug!("Marketplace bought back asset {} for {}", asset, self.price);
        Ok(self.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_buy_requires_exact_price() {
        let market = FixedPriceMarketplace::new(20);
        let asset = AssetId::from("X");

        assert!(market.buy(&asset, 19).await.is_err());
        assert!(market.available(&asset).await.unwrap());

        market.buy(&asset, 20).await.unwrap();
        assert!(!market.available(&asset).await.unwrap());
        assert_eq!(market.sold_count().await, 1);
    }

    #[tokio::test]
    async fn test_asset_sold_once() {
        let market = FixedPriceMarketplace::new(20);
        let asset = AssetId::from("X");

        market.buy(&asset, 20).await.unwrap();
        assert!(matches!(
            market.buy(&asset, 20).await,
            Err(ExternalError::Rejected { .. })
        ));
    }

    #[tokio::test]
    async fn test_sell_back() {
        let market = FixedPriceMarketplace::new(20);
        let asset = AssetId::from("X");

        assert!(market.sell(&asset).await.is_err());

        market.buy(&asset, 20).await.unwrap();
        assert_eq!(market.sell(&asset).await.unwrap(), 20);
        assert!(market.available(&asset).await.unwrap());
    }
}
