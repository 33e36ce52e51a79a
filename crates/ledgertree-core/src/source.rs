//! Boundary traits for the account store and the ledger store

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::CoreResult;
use crate::models::{AccountAggregate, AccountRecord, AccountUpdate, LedgerEntryRef, NewAccount};
use crate::scope::StatisticsScope;

/// Account store reference type
pub type AccountSourceRef = Arc<dyn AccountSource>;

/// Ledger store reference type
pub type LedgerSourceRef = Arc<dyn LedgerSource>;

/// Persistent account store.
///
/// Implementations validate id/code uniqueness and refuse to delete an
/// account with a non-zero balance.
#[async_trait]
pub trait AccountSource: Send + Sync {
    /// List every account visible in `scope`
    async fn list_accounts(&self, scope: &StatisticsScope) -> CoreResult<Vec<AccountRecord>>;

    /// Create an account and return its record
    async fn create_account(&self, account: NewAccount) -> CoreResult<AccountRecord>;

    /// Apply a partial update
    async fn update_account(&self, id: &str, update: AccountUpdate) -> CoreResult<AccountRecord>;

    /// Delete an account
    async fn delete_account(&self, id: &str) -> CoreResult<()>;

    /// Reparent an account; `None` makes it a root
    async fn move_account(&self, id: &str, new_parent_id: Option<&str>) -> CoreResult<()>;
}

/// Ledger entry store
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Per-account aggregates for every account with entries in `scope`
    async fn account_aggregate_statistics(
        &self,
        scope: &StatisticsScope,
    ) -> CoreResult<Vec<AccountAggregate>>;

    /// Entries posted to one account, at most `limit` of them
    async fn entries_for_account(
        &self,
        account_id: &str,
        limit: usize,
    ) -> CoreResult<Vec<LedgerEntryRef>>;
}
