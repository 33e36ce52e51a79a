//! Basic types for the account hierarchy

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use ledgertree_config::SearchField;

/// Account type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Asset accounts (cash, bank, receivables)
    Asset,
    /// Liability accounts (payables, loans)
    Liability,
    /// Equity accounts (owner's capital, retained earnings)
    Equity,
    /// Revenue accounts (sales, interest income)
    Revenue,
    /// Expense accounts (rent, salaries)
    Expense,
}

impl AccountType {
    /// Side on which this account type normally carries its balance
    pub fn normal_balance(&self) -> NormalBalance {
        match self {
            AccountType::Asset | AccountType::Expense => NormalBalance::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => {
                NormalBalance::Credit
            }
        }
    }

    /// Signed balance for the given debit/credit totals
    pub fn signed_balance(&self, total_debit: Decimal, total_credit: Decimal) -> Decimal {
        match self.normal_balance() {
            NormalBalance::Debit => total_debit - total_credit,
            NormalBalance::Credit => total_credit - total_debit,
        }
    }

    pub fn all() -> [AccountType; 5] {
        [
            AccountType::Asset,
            AccountType::Liability,
            AccountType::Equity,
            AccountType::Revenue,
            AccountType::Expense,
        ]
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asset" | "assets" => Ok(AccountType::Asset),
            "liability" | "liabilities" => Ok(AccountType::Liability),
            "equity" => Ok(AccountType::Equity),
            "revenue" | "income" => Ok(AccountType::Revenue),
            "expense" | "expenses" => Ok(AccountType::Expense),
            _ => Err(format!("Invalid account type: {}", s)),
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountType::Asset => write!(f, "asset"),
            AccountType::Liability => write!(f, "liability"),
            AccountType::Equity => write!(f, "equity"),
            AccountType::Revenue => write!(f, "revenue"),
            AccountType::Expense => write!(f, "expense"),
        }
    }
}

/// Normal balance side of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalBalance {
    Debit,
    Credit,
}

impl std::fmt::Display for NormalBalance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalBalance::Debit => write!(f, "debit"),
            NormalBalance::Credit => write!(f, "credit"),
        }
    }
}

/// Structural edit requested by a drag/drop or a move dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoveOperation {
    /// Source becomes the last child of the target
    MoveInto,
    /// Source becomes the sibling placed before the target
    MoveBefore,
    /// Source becomes the sibling placed after the target
    MoveAfter,
}

impl std::str::FromStr for MoveOperation {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "move-into" | "into" => Ok(MoveOperation::MoveInto),
            "move-before" | "before" => Ok(MoveOperation::MoveBefore),
            "move-after" | "after" => Ok(MoveOperation::MoveAfter),
            _ => Err(format!("Invalid move operation: {}", s)),
        }
    }
}

impl std::fmt::Display for MoveOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoveOperation::MoveInto => write!(f, "move-into"),
            MoveOperation::MoveBefore => write!(f, "move-before"),
            MoveOperation::MoveAfter => write!(f, "move-after"),
        }
    }
}
