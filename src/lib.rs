//! DevDAO
//!
//! An NFT-gated governance ledger: token holders propose, vote on and
//! execute purchases and sales of marketplace assets with a collectively
//! managed treasury.

/// Module version information
pub mod version {
    /// The current version of the DevDAO library
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

pub use devdao_common as common;
pub use devdao_governance as governance;
