//! Ledger account hierarchy engine
//!
//! Builds ordered account trees from store records, filters and searches
//! them, tracks expansion and selection by account id, validates moves and
//! aggregates per-account and roll-up statistics from ledger entries.

pub mod builder;
pub mod error;
pub mod filter;
pub mod memory;
pub mod models;
pub mod moves;
pub mod scope;
pub mod session;
pub mod source;
pub mod state;
pub mod statistics;
pub mod tree;
pub mod types;

pub use builder::{BuildOutput, BuildWarning, BuildWarningKind, TreeBuilder, TreeOptions};
pub use error::{CoreError, CoreResult, ErrorCode, ErrorSeverity};
pub use filter::{filter, search};
pub use memory::{MemoryStore, StoreSnapshot};
pub use models::{
    AccountAggregate, AccountGroup, AccountInput, AccountNode, AccountRecord, AccountStatistics,
    AccountUpdate, HierarchyFilter, LedgerEntryRef, NewAccount,
};
pub use moves::{MovePreview, MoveValidation, MoveValidator};
pub use scope::StatisticsScope;
pub use session::Hierarchy;
pub use source::{AccountSource, AccountSourceRef, LedgerSource, LedgerSourceRef};
pub use state::{ExpansionState, SelectionState};
pub use statistics::{
    AggregationOutcome, AggregationReport, AggregationStrategy, AggregationToken,
    StatisticsAggregator, StatisticsOptions,
};
pub use tree::HierarchySummary;
pub use types::{AccountType, MoveOperation, NormalBalance, SearchField};
