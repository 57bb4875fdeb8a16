//! # LOVE20 Client
//!
//! Read aggregation and multi-step transaction coordination for the LOVE20
//! protocol.
//!
//! ## Architecture
//!
//! - **Chain**: `ChainClient` seam over an ethers provider, with Multicall3 batching
//! - **Batch**: slot-addressed batched reads that tolerate partial failure
//! - **Cache**: JSON TTL cache over pluggable storage
//! - **Dispatch**: extension factory → closed set of extension views
//! - **Tx**: approve → act sequences with gated, observable steps
//! - **Errors**: revert decoding, error banner and reporting sink
//! - **Views**: token, governance, pool, rewards and action loaders

pub mod batch;
pub mod cache;
pub mod chain;
pub mod derive;
pub mod dispatch;
pub mod error;
pub mod errors;
pub mod memo;
pub mod pending;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tx;
pub mod views;

// Re-export commonly used types
pub use batch::{BatchExecutor, BatchResults, BatchStats, ReadBatch, Slot, SlotStatus};
pub use cache::{CacheOptions, LocalCache};
pub use chain::{ChainClient, ContractCall, EthersChainClient};
pub use dispatch::ExtensionView;
pub use error::{first_error, ClientError, Result};
pub use errors::{ErrorBanner, ErrorReporter, Locale};
pub use memo::ViewMemo;
pub use pending::{OperationId, PendingWriteLog};
pub use tx::{TxSequence, TxState, TxStep};

/// Current version of the client crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
