//! Core data models for the account hierarchy

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::{AccountType, NormalBalance, SearchField};

/// Account as delivered by the account store.
///
/// Identity and classification are optional here because the store is not
/// trusted: records missing `id`, `name` or `accountType` are reported and
/// left out of the tree instead of failing the whole build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub id: Option<String>,
    /// Account code used for default ordering (e.g. "1100")
    #[serde(default)]
    pub code: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub account_type: Option<AccountType>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
    /// Current balance as reported by the store
    #[serde(default)]
    pub balance: Decimal,
}

fn default_active() -> bool {
    true
}

impl AccountRecord {
    /// Convenience constructor for a well-formed record
    pub fn new(id: &str, code: &str, name: &str, account_type: AccountType) -> Self {
        Self {
            id: Some(id.to_string()),
            code: Some(code.to_string()),
            name: Some(name.to_string()),
            description: None,
            account_type: Some(account_type),
            is_active: true,
            parent_id: None,
            organization_id: None,
            balance: Decimal::ZERO,
        }
    }

    pub fn with_parent(mut self, parent_id: &str) -> Self {
        self.parent_id = Some(parent_id.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_organization(mut self, organization_id: &str) -> Self {
        self.organization_id = Some(organization_id.to_string());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// A group of accounts delivered already bucketed (e.g. by account type)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountGroup {
    pub key: String,
    #[serde(default)]
    pub label: Option<String>,
    pub accounts: Vec<AccountRecord>,
}

/// Shape of the input handed to the tree builder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "shape", content = "items", rename_all = "lowercase")]
pub enum AccountInput {
    /// Flat list, hierarchy expressed through `parentId`
    Flat(Vec<AccountRecord>),
    /// Two-level grouping: group -> accounts (with `parentId` inside)
    Grouped(Vec<AccountGroup>),
}

impl AccountInput {
    /// Flatten into a single record list
    pub fn into_records(self) -> Vec<AccountRecord> {
        match self {
            AccountInput::Flat(records) => records,
            AccountInput::Grouped(groups) => groups
                .into_iter()
                .flat_map(|group| group.accounts)
                .collect(),
        }
    }
}

impl From<Vec<AccountRecord>> for AccountInput {
    fn from(records: Vec<AccountRecord>) -> Self {
        AccountInput::Flat(records)
    }
}

/// One ledger account placed in the tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountNode {
    pub id: String,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub account_type: AccountType,
    pub normal_balance: NormalBalance,
    pub is_active: bool,
    pub organization_id: Option<String>,
    /// Balance reported by the account store
    pub balance: Decimal,

    // Structural fields, derived by the builder
    pub parent_id: Option<String>,
    pub level: usize,
    /// Ancestor ids, root first, immediate parent last
    pub path: Vec<String>,
    pub children: Vec<AccountNode>,
    pub has_children: bool,
    pub is_expanded: bool,

    // Edit capabilities, derived by the builder
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_add_child: bool,
    pub can_move: bool,

    /// Attached by the statistics aggregator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<AccountStatistics>,
}

impl AccountNode {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Balance used by filters: computed own balance when statistics are
    /// attached, otherwise the store balance
    pub fn current_balance(&self) -> Decimal {
        self.statistics
            .as_ref()
            .map(|s| s.balance)
            .unwrap_or(self.balance)
    }

    /// Number of nodes below this one
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }

    /// Ids of every node below this one, pre-order
    pub fn descendant_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for child in &self.children {
            ids.push(child.id.clone());
            ids.extend(child.descendant_ids());
        }
        ids
    }

    /// Deepest level found in this subtree (the node's own level for leaves)
    pub fn deepest_level(&self) -> usize {
        self.children
            .iter()
            .map(AccountNode::deepest_level)
            .max()
            .unwrap_or(self.level)
    }

    /// Text of one searchable field
    pub fn field_text(&self, field: SearchField) -> Option<&str> {
        match field {
            SearchField::Code => Some(self.code.as_str()),
            SearchField::Name => Some(self.name.as_str()),
            SearchField::Description => self.description.as_deref(),
        }
    }
}

/// Per-node statistics computed from ledger entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatistics {
    pub total_transactions: u64,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    /// Own balance, signed by account type
    pub balance: Decimal,
    /// Own balance plus the roll-up of every descendant
    pub total_balance: Decimal,
    pub child_count: usize,
    pub descendant_count: usize,
    pub has_transactions: bool,
    pub last_transaction_date: Option<NaiveDate>,
}

impl AccountStatistics {
    /// Statistics for a node with no usable ledger data
    pub fn zeroed(child_count: usize, descendant_count: usize) -> Self {
        Self {
            total_transactions: 0,
            total_debit: Decimal::ZERO,
            total_credit: Decimal::ZERO,
            balance: Decimal::ZERO,
            total_balance: Decimal::ZERO,
            child_count,
            descendant_count,
            has_transactions: false,
            last_transaction_date: None,
        }
    }
}

/// Ledger entry line as exposed by the ledger store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryRef {
    pub account_id: String,
    pub debit_amount: Decimal,
    pub credit_amount: Decimal,
    pub transaction_id: String,
    pub date: NaiveDate,
}

impl LedgerEntryRef {
    pub fn debit(account_id: &str, transaction_id: &str, date: NaiveDate, amount: Decimal) -> Self {
        Self {
            account_id: account_id.to_string(),
            debit_amount: amount,
            credit_amount: Decimal::ZERO,
            transaction_id: transaction_id.to_string(),
            date,
        }
    }

    pub fn credit(account_id: &str, transaction_id: &str, date: NaiveDate, amount: Decimal) -> Self {
        Self {
            account_id: account_id.to_string(),
            debit_amount: Decimal::ZERO,
            credit_amount: amount,
            transaction_id: transaction_id.to_string(),
            date,
        }
    }
}

/// One row of the bulk per-account aggregate query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountAggregate {
    pub account_id: String,
    pub transaction_count: u64,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub last_transaction_date: Option<NaiveDate>,
}

/// Criteria for strict tree filtering
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HierarchyFilter {
    pub account_type: Option<AccountType>,
    pub is_active: Option<bool>,
    /// `Some(true)` keeps non-zero balances, `Some(false)` keeps zero balances
    pub has_balance: Option<bool>,
    pub parent_id: Option<String>,
    pub organization_id: Option<String>,
    /// Exact level
    pub level: Option<usize>,
    /// Inclusive upper bound on level
    pub max_level: Option<usize>,
    pub search_text: Option<String>,
    /// Fields the search text is matched against; empty means all fields
    pub search_fields: Vec<SearchField>,
    pub min_balance: Option<Decimal>,
    pub max_balance: Option<Decimal>,
}

impl HierarchyFilter {
    /// True when no criterion is present
    pub fn is_empty(&self) -> bool {
        self.account_type.is_none()
            && self.is_active.is_none()
            && self.has_balance.is_none()
            && self.parent_id.is_none()
            && self.organization_id.is_none()
            && self.level.is_none()
            && self.max_level.is_none()
            && self
                .search_text
                .as_deref()
                .map_or(true, |text| text.trim().is_empty())
            && self.min_balance.is_none()
            && self.max_balance.is_none()
    }
}

/// Payload for creating an account through the account store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub account_type: AccountType,
    pub parent_id: Option<String>,
    pub organization_id: Option<String>,
    pub is_active: bool,
}

/// Partial update for an existing account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountUpdate {
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}
