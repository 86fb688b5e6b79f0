use std::sync::Arc;

use tempfile::tempdir;

use devdao::common::{Configuration, ManualClock};
use devdao::governance::*;

const CONFIG: &str = r#"
voting_period_secs: 600
vote_weight_policy: snapshot
max_supply: 5
asset_price: 30
initial_treasury: 100
"#;

struct Node {
    registry: Arc<NftRegistry>,
    clock: Arc<ManualClock>,
    market: Arc<FixedPriceMarketplace>,
    payouts: Arc<InMemoryPayouts>,
}

impl Node {
    fn new(config: &GovernanceConfig) -> Self {
        let clock = Arc::new(ManualClock::new(50_000));
        Self {
            registry: Arc::new(NftRegistry::new(config.max_supply, clock.clone())),
            market: Arc::new(FixedPriceMarketplace::new(config.asset_price)),
            payouts: Arc::new(InMemoryPayouts::new()),
            clock,
        }
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators {
            oracle: self.registry.clone(),
            marketplace: self.market.clone(),
            payouts: self.payouts.clone(),
            clock: self.clock.clone(),
        }
    }
}

#[tokio::test]
async fn test_lifecycle_across_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("devdao.yaml");
    std::fs::write(&path, CONFIG).unwrap();
    let config = GovernanceConfig::from_file(&path).unwrap();
    assert_eq!(config.vote_weight_policy, VoteWeightPolicy::Snapshot);

    let node = Node::new(&config);
    let founder = Address::from("founder");
    let member = Address::from("member");
    node.registry.mint_many(&founder, 3).await.unwrap();
    node.registry.mint_many(&member, 2).await.unwrap();
    assert!(node.registry.mint(&member).await.is_err());

    let store = FileStore::new(dir.path().join("data")).await.unwrap();
    let engine = GovernanceEngine::restore(config.clone(), node.collaborators(), &store)
        .await
        .unwrap();
    assert_eq!(engine.balance().await, 100);

    let id = engine
        .create(ProposalKind::Buy, AssetId::from("painting"), &member)
        .await
        .unwrap();
    engine.vote(id, VoteChoice::Yay, &founder).await.unwrap();
    engine.vote(id, VoteChoice::Nay, &member).await.unwrap();
    engine.persist(&store).await.unwrap();
    drop(engine);

    // Reopen from disk and finish the proposal
    let store = FileStore::new(dir.path().join("data")).await.unwrap();
    let engine = GovernanceEngine::restore(config.clone(), node.collaborators(), &store)
        .await
        .unwrap();
    assert_eq!(engine.proposal_status(id).await.unwrap(), ProposalStatus::Active);

    node.clock.advance(600);
    assert_eq!(engine.execute(id, &member).await.unwrap(), ProposalOutcome::Approved);
    assert_eq!(engine.balance().await, 70);
    assert_eq!(engine.holdings().await, vec![AssetId::from("painting")]);

    // 2 of 5 tokens: floor(70 * 2 / 5)
    assert_eq!(engine.quit(&member).await.unwrap(), 28);
    assert_eq!(node.payouts.received(&member).await, 28);
    assert_eq!(engine.balance().await, 42);
    engine.persist(&store).await.unwrap();

    let snapshot = storage::load_snapshot(&store).await.unwrap().unwrap();
    assert_eq!(snapshot.treasury.balance(), 42);
    assert_eq!(snapshot.proposals.len(), 1);
    assert_eq!(snapshot.proposals[0].outcome, Some(ProposalOutcome::Approved));
}

#[tokio::test]
async fn test_corrupt_state_refuses_to_start() {
    let dir = tempdir().unwrap();
    let config = GovernanceConfig::default();
    let node = Node::new(&config);

    let store = FileStore::new(dir.path()).await.unwrap();
    store.put(storage::LEDGER_KEY, b"{\"proposals\": [").await.unwrap();

    let result = GovernanceEngine::restore(config, node.collaborators(), &store).await;
    assert!(matches!(result, Err(GovernanceError::Storage(_))));
}

#[test]
fn test_version() {
    assert!(!devdao::version::VERSION.is_empty());
}
