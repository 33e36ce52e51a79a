//! In-memory account and ledger store
//!
//! Implements both boundary traits over locked vectors. Used by the command
//! line front end to serve fixture files and by tests, which can make the
//! bulk query or individual per-account queries fail on purpose.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::models::{AccountAggregate, AccountRecord, AccountUpdate, LedgerEntryRef, NewAccount};
use crate::scope::StatisticsScope;
use crate::source::{AccountSource, LedgerSource};

/// Serialisable store contents (the CLI's data file format)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSnapshot {
    pub accounts: Vec<AccountRecord>,
    pub entries: Vec<LedgerEntryRef>,
}

/// Account and ledger store held in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: RwLock<Vec<AccountRecord>>,
    entries: RwLock<Vec<LedgerEntryRef>>,
    failing_accounts: RwLock<HashSet<String>>,
    fail_bulk: AtomicBool,
    next_id: AtomicU64,
    entry_queries: AtomicUsize,
}

impl MemoryStore {
    pub fn new(accounts: Vec<AccountRecord>, entries: Vec<LedgerEntryRef>) -> Self {
        Self {
            accounts: RwLock::new(accounts),
            entries: RwLock::new(entries),
            next_id: AtomicU64::new(1),
            ..Default::default()
        }
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self::new(snapshot.accounts, snapshot.entries)
    }

    /// Record an entry and move the account's stored balance accordingly
    pub fn post_entry(&self, entry: LedgerEntryRef) -> CoreResult<()> {
        let mut accounts = self.write_accounts()?;
        if let Some(account) = accounts
            .iter_mut()
            .find(|a| a.id.as_deref() == Some(entry.account_id.as_str()))
        {
            if let Some(account_type) = account.account_type {
                account.balance +=
                    account_type.signed_balance(entry.debit_amount, entry.credit_amount);
            }
        }
        drop(accounts);
        self.write_entries()?.push(entry);
        Ok(())
    }

    /// Make the bulk aggregate query fail (or succeed again)
    pub fn set_bulk_failure(&self, fail: bool) {
        self.fail_bulk.store(fail, Ordering::SeqCst);
    }

    /// Make per-account entry queries for `account_id` fail
    pub fn fail_entries_for(&self, account_id: &str) -> CoreResult<()> {
        self.failing_accounts
            .write()
            .map_err(|_| ledger_poisoned())?
            .insert(account_id.to_string());
        Ok(())
    }

    /// Number of per-account entry queries served so far
    pub fn entry_query_count(&self) -> usize {
        self.entry_queries.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> CoreResult<StoreSnapshot> {
        Ok(StoreSnapshot {
            accounts: self.read_accounts()?.clone(),
            entries: self.read_entries()?.clone(),
        })
    }

    fn read_accounts(&self) -> CoreResult<RwLockReadGuard<'_, Vec<AccountRecord>>> {
        self.accounts.read().map_err(|_| accounts_poisoned())
    }

    fn write_accounts(&self) -> CoreResult<RwLockWriteGuard<'_, Vec<AccountRecord>>> {
        self.accounts.write().map_err(|_| accounts_poisoned())
    }

    fn read_entries(&self) -> CoreResult<RwLockReadGuard<'_, Vec<LedgerEntryRef>>> {
        self.entries.read().map_err(|_| ledger_poisoned())
    }

    fn write_entries(&self) -> CoreResult<RwLockWriteGuard<'_, Vec<LedgerEntryRef>>> {
        self.entries.write().map_err(|_| ledger_poisoned())
    }
}

fn accounts_poisoned() -> CoreError {
    CoreError::AccountSource {
        message: "account table lock poisoned".to_string(),
    }
}

fn ledger_poisoned() -> CoreError {
    CoreError::LedgerSource {
        message: "ledger entry lock poisoned".to_string(),
    }
}

fn code_taken(accounts: &[AccountRecord], code: &str, organization_id: Option<&str>, except: Option<&str>) -> bool {
    accounts.iter().any(|a| {
        a.code.as_deref() == Some(code)
            && a.organization_id.as_deref() == organization_id
            && a.id.as_deref() != except
    })
}

fn is_descendant(accounts: &[AccountRecord], ancestor: &str, candidate: &str) -> bool {
    let mut current = Some(candidate.to_string());
    let mut seen = HashSet::new();
    while let Some(id) = current {
        if id == ancestor {
            return true;
        }
        if !seen.insert(id.clone()) {
            return false;
        }
        current = accounts
            .iter()
            .find(|a| a.id.as_deref() == Some(id.as_str()))
            .and_then(|a| a.parent_id.clone());
    }
    false
}

#[async_trait]
impl AccountSource for MemoryStore {
    async fn list_accounts(&self, scope: &StatisticsScope) -> CoreResult<Vec<AccountRecord>> {
        Ok(self
            .read_accounts()?
            .iter()
            .filter(|a| scope.includes_organization(a.organization_id.as_deref()))
            .cloned()
            .collect())
    }

    async fn create_account(&self, account: NewAccount) -> CoreResult<AccountRecord> {
        let mut accounts = self.write_accounts()?;

        if code_taken(&accounts, &account.code, account.organization_id.as_deref(), None) {
            return Err(CoreError::DuplicateEntry {
                entry: format!("account code {}", account.code),
            });
        }
        if let Some(ref parent_id) = account.parent_id {
            if !accounts.iter().any(|a| a.id.as_ref() == Some(parent_id)) {
                return Err(CoreError::AccountNotFound { id: parent_id.clone() });
            }
        }

        // Skip generated ids already used by loaded records
        let id = loop {
            let candidate = format!("acc-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
            if !accounts.iter().any(|a| a.id.as_deref() == Some(candidate.as_str())) {
                break candidate;
            }
        };
        let record = AccountRecord {
            id: Some(id),
            code: Some(account.code),
            name: Some(account.name),
            description: account.description,
            account_type: Some(account.account_type),
            is_active: account.is_active,
            parent_id: account.parent_id,
            organization_id: account.organization_id,
            balance: Decimal::ZERO,
        };
        accounts.push(record.clone());
        Ok(record)
    }

    async fn update_account(&self, id: &str, update: AccountUpdate) -> CoreResult<AccountRecord> {
        let mut accounts = self.write_accounts()?;

        let position = accounts
            .iter()
            .position(|a| a.id.as_deref() == Some(id))
            .ok_or_else(|| CoreError::AccountNotFound { id: id.to_string() })?;

        if let Some(ref code) = update.code {
            let organization = accounts[position].organization_id.clone();
            if code_taken(&accounts, code, organization.as_deref(), Some(id)) {
                return Err(CoreError::DuplicateEntry {
                    entry: format!("account code {}", code),
                });
            }
        }

        let record = &mut accounts[position];
        if let Some(code) = update.code {
            record.code = Some(code);
        }
        if let Some(name) = update.name {
            record.name = Some(name);
        }
        if let Some(description) = update.description {
            record.description = Some(description);
        }
        if let Some(is_active) = update.is_active {
            record.is_active = is_active;
        }
        Ok(record.clone())
    }

    async fn delete_account(&self, id: &str) -> CoreResult<()> {
        let mut accounts = self.write_accounts()?;

        let position = accounts
            .iter()
            .position(|a| a.id.as_deref() == Some(id))
            .ok_or_else(|| CoreError::AccountNotFound { id: id.to_string() })?;

        let balance = accounts[position].balance;
        if !balance.is_zero() {
            return Err(CoreError::DeleteRefused {
                id: id.to_string(),
                reason: format!("balance is {}", balance),
            });
        }
        if accounts.iter().any(|a| a.parent_id.as_deref() == Some(id)) {
            return Err(CoreError::DeleteRefused {
                id: id.to_string(),
                reason: "account has child accounts".to_string(),
            });
        }

        accounts.remove(position);
        Ok(())
    }

    async fn move_account(&self, id: &str, new_parent_id: Option<&str>) -> CoreResult<()> {
        let mut accounts = self.write_accounts()?;

        if let Some(parent_id) = new_parent_id {
            if !accounts.iter().any(|a| a.id.as_deref() == Some(parent_id)) {
                return Err(CoreError::AccountNotFound { id: parent_id.to_string() });
            }
            if is_descendant(&accounts, id, parent_id) {
                return Err(CoreError::InvalidMove {
                    errors: vec![format!("{} is {} or one of its descendants", parent_id, id)],
                });
            }
        }

        let record = accounts
            .iter_mut()
            .find(|a| a.id.as_deref() == Some(id))
            .ok_or_else(|| CoreError::AccountNotFound { id: id.to_string() })?;
        record.parent_id = new_parent_id.map(str::to_string);
        Ok(())
    }
}

#[async_trait]
impl LedgerSource for MemoryStore {
    async fn account_aggregate_statistics(
        &self,
        scope: &StatisticsScope,
    ) -> CoreResult<Vec<AccountAggregate>> {
        if self.fail_bulk.load(Ordering::SeqCst) {
            return Err(CoreError::LedgerSource {
                message: "aggregate query unavailable".to_string(),
            });
        }

        let in_scope: HashSet<String> = self
            .read_accounts()?
            .iter()
            .filter(|a| scope.includes_organization(a.organization_id.as_deref()))
            .filter_map(|a| a.id.clone())
            .collect();

        let mut rows: HashMap<String, (HashSet<String>, AccountAggregate)> = HashMap::new();
        for entry in self.read_entries()?.iter() {
            if !in_scope.contains(&entry.account_id) || !scope.contains(&entry.date) {
                continue;
            }
            let (transactions, row) = rows.entry(entry.account_id.clone()).or_insert_with(|| {
                (
                    HashSet::new(),
                    AccountAggregate {
                        account_id: entry.account_id.clone(),
                        transaction_count: 0,
                        total_debit: Decimal::ZERO,
                        total_credit: Decimal::ZERO,
                        last_transaction_date: None,
                    },
                )
            });
            transactions.insert(entry.transaction_id.clone());
            row.transaction_count = transactions.len() as u64;
            row.total_debit += entry.debit_amount;
            row.total_credit += entry.credit_amount;
            row.last_transaction_date = row.last_transaction_date.max(Some(entry.date));
        }

        let mut aggregates: Vec<AccountAggregate> = rows.into_values().map(|(_, row)| row).collect();
        aggregates.sort_by(|a, b| a.account_id.cmp(&b.account_id));
        Ok(aggregates)
    }

    async fn entries_for_account(
        &self,
        account_id: &str,
        limit: usize,
    ) -> CoreResult<Vec<LedgerEntryRef>> {
        self.entry_queries.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failing_accounts
            .read()
            .map_err(|_| ledger_poisoned())?
            .contains(account_id);
        if failing {
            return Err(CoreError::LedgerSource {
                message: format!("entries for {} unavailable", account_id),
            });
        }

        Ok(self
            .read_entries()?
            .iter()
            .filter(|e| e.account_id == account_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::types::AccountType;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn store() -> MemoryStore {
        MemoryStore::new(
            vec![
                AccountRecord::new("cash", "1100", "Cash", AccountType::Asset).with_organization("org"),
                AccountRecord::new("sales", "4000", "Sales", AccountType::Revenue).with_organization("org"),
                AccountRecord::new("other", "1100", "Other cash", AccountType::Asset)
                    .with_organization("org-2"),
            ],
            vec![],
        )
    }

    fn new_account(code: &str, parent: Option<&str>) -> NewAccount {
        NewAccount {
            code: code.to_string(),
            name: format!("Account {}", code),
            description: None,
            account_type: AccountType::Asset,
            parent_id: parent.map(str::to_string),
            organization_id: Some("org".to_string()),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_list_accounts_by_organization() {
        let store = store();
        assert_eq!(store.list_accounts(&StatisticsScope::organization("org")).await.unwrap().len(), 2);
        assert_eq!(store.list_accounts(&StatisticsScope::all()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_post_entry_updates_balance() {
        let store = store();
        store.post_entry(LedgerEntryRef::debit("cash", "t1", date(1), Decimal::from(100))).unwrap();
        store.post_entry(LedgerEntryRef::credit("sales", "t1", date(1), Decimal::from(100))).unwrap();

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.accounts[0].balance, Decimal::from(100));
        assert_eq!(snapshot.accounts[1].balance, Decimal::from(100));
        assert_eq!(snapshot.entries.len(), 2);
    }

    #[tokio::test]
    async fn test_aggregates_count_distinct_transactions() {
        let store = store();
        store.post_entry(LedgerEntryRef::debit("cash", "t1", date(1), Decimal::from(30))).unwrap();
        store.post_entry(LedgerEntryRef::debit("cash", "t1", date(1), Decimal::from(20))).unwrap();
        store.post_entry(LedgerEntryRef::credit("cash", "t2", date(5), Decimal::from(10))).unwrap();
        store.post_entry(LedgerEntryRef::debit("other", "t3", date(2), Decimal::from(1))).unwrap();

        let rows = store
            .account_aggregate_statistics(&StatisticsScope::organization("org"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].account_id, "cash");
        assert_eq!(rows[0].transaction_count, 2);
        assert_eq!(rows[0].total_debit, Decimal::from(50));
        assert_eq!(rows[0].total_credit, Decimal::from(10));
        assert_eq!(rows[0].last_transaction_date, Some(date(5)));
    }

    #[tokio::test]
    async fn test_failure_hooks() {
        let store = store();
        store.set_bulk_failure(true);
        assert!(store.account_aggregate_statistics(&StatisticsScope::all()).await.is_err());

        store.fail_entries_for("cash").unwrap();
        assert!(store.entries_for_account("cash", 10).await.is_err());
        assert!(store.entries_for_account("sales", 10).await.is_ok());
        assert_eq!(store.entry_query_count(), 2);
    }

    #[tokio::test]
    async fn test_create_enforces_code_uniqueness_per_organization() {
        let store = store();
        let err = store.create_account(new_account("1100", None)).await.unwrap_err();
        assert!(matches!(err, CoreError::DuplicateEntry { .. }));

        let created = store.create_account(new_account("1200", Some("cash"))).await.unwrap();
        assert_eq!(created.parent_id.as_deref(), Some("cash"));
        assert!(created.id.unwrap().starts_with("acc-"));

        let err = store.create_account(new_account("1300", Some("ghost"))).await.unwrap_err();
        assert!(matches!(err, CoreError::AccountNotFound { .. }));
    }

    #[tokio::test]
    async fn test_generated_id_skips_existing_ids() {
        let store = MemoryStore::new(
            vec![
                AccountRecord::new("acc-1", "1000", "Assets", AccountType::Asset).with_organization("org"),
                AccountRecord::new("acc-2", "2000", "Loans", AccountType::Liability).with_organization("org"),
            ],
            vec![],
        );

        let created = store.create_account(new_account("1100", Some("acc-1"))).await.unwrap();
        assert_eq!(created.id.as_deref(), Some("acc-3"));

        let accounts = store.list_accounts(&StatisticsScope::all()).await.unwrap();
        let mut ids: Vec<&str> = accounts.iter().filter_map(|a| a.id.as_deref()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn test_poisoned_account_table_reports_account_source() {
        let store = Arc::new(store());
        let holder = Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = holder.accounts.write().unwrap();
            panic!("writer died holding the account table");
        })
        .join();

        let err = store.list_accounts(&StatisticsScope::all()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AccountSourceError);
        // The ledger side is unaffected
        assert!(store.entries_for_account("cash", 10).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_account() {
        let store = store();
        let updated = store
            .update_account(
                "sales",
                AccountUpdate {
                    name: Some("Product sales".to_string()),
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name.as_deref(), Some("Product sales"));
        assert!(!updated.is_active);

        let err = store
            .update_account(
                "sales",
                AccountUpdate {
                    code: Some("1100".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateEntry { .. }));
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let store = store();
        store.post_entry(LedgerEntryRef::debit("cash", "t1", date(1), Decimal::from(5))).unwrap();
        let err = store.delete_account("cash").await.unwrap_err();
        assert!(matches!(err, CoreError::DeleteRefused { .. }));

        store.delete_account("sales").await.unwrap();
        assert!(matches!(
            store.delete_account("sales").await.unwrap_err(),
            CoreError::AccountNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_move_rejects_descendant_target() {
        let store = store();
        store.move_account("sales", Some("cash")).await.unwrap();
        let err = store.move_account("cash", Some("sales")).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidMove { .. }));

        store.move_account("sales", None).await.unwrap();
        let accounts = store.list_accounts(&StatisticsScope::all()).await.unwrap();
        assert!(accounts.iter().all(|a| a.parent_id.is_none()));
    }
}
