//! Tree builder: turns account records into an ordered hierarchy
//!
//! Nodes are placed top-down starting from the roots, so every child copies
//! its level and path from a parent that is already final, whatever order the
//! records arrived in. Records whose parent chain never reaches a root form a
//! cycle; the first cycle member in input order is promoted to a root and the
//! cycle is reported as a warning.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use ledgertree_config::TreeConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{AccountInput, AccountNode, AccountRecord};
use crate::types::AccountType;

/// Builder settings derived from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeOptions {
    /// Deepest level a node may occupy
    pub max_depth: usize,
    /// Nodes with `level <= default_expand_level` start expanded
    pub default_expand_level: usize,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self::from(&TreeConfig::default())
    }
}

impl From<&TreeConfig> for TreeOptions {
    fn from(config: &TreeConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            default_expand_level: config.default_expand_level,
        }
    }
}

/// Kind of structural problem found in the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildWarningKind {
    /// Record has no id; excluded
    MissingId,
    /// Record has no name; excluded
    MissingName,
    /// Record has no account type; excluded
    MissingAccountType,
    /// A record with the same id was seen earlier; excluded
    DuplicateId,
    /// Record names itself as parent; placed as a root
    SelfParent,
    /// Record closes a parent cycle; placed as a root
    CycleDetected,
}

/// A per-record problem reported by the builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildWarning {
    /// Position of the record in the input
    pub index: usize,
    pub id: Option<String>,
    pub kind: BuildWarningKind,
    pub message: String,
}

/// Result of a build: best-effort tree plus what had to be repaired or dropped
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub roots: Vec<AccountNode>,
    pub warnings: Vec<BuildWarning>,
}

/// Record that passed validation
#[derive(Debug)]
struct ValidAccount {
    index: usize,
    id: String,
    code: String,
    name: String,
    description: Option<String>,
    account_type: AccountType,
    is_active: bool,
    parent_id: Option<String>,
    organization_id: Option<String>,
    balance: Decimal,
}

/// Builds account trees
#[derive(Debug, Clone, Default)]
pub struct TreeBuilder {
    options: TreeOptions,
}

impl TreeBuilder {
    pub fn new(options: TreeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    /// Build from a flat record list
    pub fn build(&self, records: Vec<AccountRecord>) -> BuildOutput {
        self.build_input(AccountInput::Flat(records))
    }

    /// Build from either input shape
    pub fn build_input(&self, input: AccountInput) -> BuildOutput {
        let mut warnings = Vec::new();
        let accounts = validate_records(input.into_records(), &mut warnings);
        let count = accounts.len();

        let index: HashMap<&str, usize> = accounts
            .iter()
            .enumerate()
            .map(|(pos, account)| (account.id.as_str(), pos))
            .collect();

        // Resolve parent pointers; unresolved parents make a root
        let mut parent: Vec<Option<usize>> = Vec::with_capacity(count);
        for (pos, account) in accounts.iter().enumerate() {
            let resolved = account
                .parent_id
                .as_deref()
                .and_then(|parent_id| index.get(parent_id).copied());
            if resolved == Some(pos) {
                warnings.push(BuildWarning {
                    index: account.index,
                    id: Some(account.id.clone()),
                    kind: BuildWarningKind::SelfParent,
                    message: format!("Account {} lists itself as parent", account.id),
                });
                parent.push(None);
            } else {
                parent.push(resolved);
            }
        }

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); count];
        let mut roots: Vec<usize> = Vec::new();
        for (pos, p) in parent.iter().enumerate() {
            match p {
                Some(p) => children[*p].push(pos),
                None => roots.push(pos),
            }
        }

        let mut placed = vec![false; count];
        for &root in &roots {
            mark_subtree(root, &children, &mut placed);
        }

        // Whatever is still unplaced hangs off a parent cycle
        for start in 0..count {
            if placed[start] {
                continue;
            }
            let mut seen = HashSet::new();
            let mut current = start;
            while seen.insert(current) {
                match parent[current] {
                    Some(p) => current = p,
                    None => break,
                }
            }

            if let Some(p) = parent[current].take() {
                children[p].retain(|&c| c != current);
            }
            let account = &accounts[current];
            warnings.push(BuildWarning {
                index: account.index,
                id: Some(account.id.clone()),
                kind: BuildWarningKind::CycleDetected,
                message: format!(
                    "Parent cycle through account {}; placed as a root",
                    account.id
                ),
            });
            roots.push(current);
            mark_subtree(current, &children, &mut placed);
        }

        let mut nodes: Vec<AccountNode> = roots
            .iter()
            .map(|&root| self.assemble(root, None, Vec::new(), &accounts, &children))
            .collect();
        sort_siblings(&mut nodes);

        for warning in &warnings {
            log::warn!("Account tree: {}", warning.message);
        }
        log::debug!(
            "Built account tree: {} accounts, {} roots, {} warnings",
            count,
            nodes.len(),
            warnings.len()
        );

        BuildOutput {
            roots: nodes,
            warnings,
        }
    }

    fn assemble(
        &self,
        pos: usize,
        parent_id: Option<&str>,
        path: Vec<String>,
        accounts: &[ValidAccount],
        children: &[Vec<usize>],
    ) -> AccountNode {
        let account = &accounts[pos];
        let level = path.len();

        let mut child_path = path.clone();
        child_path.push(account.id.clone());
        let mut child_nodes: Vec<AccountNode> = children[pos]
            .iter()
            .map(|&child| {
                self.assemble(child, Some(account.id.as_str()), child_path.clone(), accounts, children)
            })
            .collect();
        sort_siblings(&mut child_nodes);

        AccountNode {
            id: account.id.clone(),
            code: account.code.clone(),
            name: account.name.clone(),
            description: account.description.clone(),
            account_type: account.account_type,
            normal_balance: account.account_type.normal_balance(),
            is_active: account.is_active,
            organization_id: account.organization_id.clone(),
            balance: account.balance,
            parent_id: parent_id.map(str::to_string),
            level,
            path,
            has_children: !child_nodes.is_empty(),
            children: child_nodes,
            is_expanded: level <= self.options.default_expand_level,
            can_edit: true,
            can_delete: account.balance.is_zero(),
            can_add_child: level < self.options.max_depth,
            can_move: true,
            statistics: None,
        }
    }
}

fn validate_records(records: Vec<AccountRecord>, warnings: &mut Vec<BuildWarning>) -> Vec<ValidAccount> {
    let mut accounts = Vec::with_capacity(records.len());
    let mut seen: HashSet<String> = HashSet::new();

    for (index, record) in records.into_iter().enumerate() {
        let id = match record.id.filter(|id| !id.trim().is_empty()) {
            Some(id) => id,
            None => {
                warnings.push(BuildWarning {
                    index,
                    id: None,
                    kind: BuildWarningKind::MissingId,
                    message: format!("Record #{} has no id; skipped", index),
                });
                continue;
            }
        };

        let name = match record.name.filter(|name| !name.trim().is_empty()) {
            Some(name) => name,
            None => {
                warnings.push(BuildWarning {
                    index,
                    message: format!("Account {} has no name; skipped", id),
                    id: Some(id),
                    kind: BuildWarningKind::MissingName,
                });
                continue;
            }
        };

        let account_type = match record.account_type {
            Some(account_type) => account_type,
            None => {
                warnings.push(BuildWarning {
                    index,
                    message: format!("Account {} has no account type; skipped", id),
                    id: Some(id),
                    kind: BuildWarningKind::MissingAccountType,
                });
                continue;
            }
        };

        if !seen.insert(id.clone()) {
            warnings.push(BuildWarning {
                index,
                message: format!("Duplicate account id {}; later record skipped", id),
                id: Some(id),
                kind: BuildWarningKind::DuplicateId,
            });
            continue;
        }

        accounts.push(ValidAccount {
            index,
            id,
            code: record.code.unwrap_or_default(),
            name,
            description: record.description,
            account_type,
            is_active: record.is_active,
            parent_id: record.parent_id,
            organization_id: record.organization_id,
            balance: record.balance,
        });
    }

    accounts
}

fn mark_subtree(root: usize, children: &[Vec<usize>], placed: &mut [bool]) {
    let mut stack = vec![root];
    while let Some(pos) = stack.pop() {
        if placed[pos] {
            continue;
        }
        placed[pos] = true;
        stack.extend(children[pos].iter().copied());
    }
}

/// Sibling order: code, then name. Missing codes sort first.
pub fn compare_siblings(a: &AccountNode, b: &AccountNode) -> Ordering {
    a.code.cmp(&b.code).then_with(|| a.name.cmp(&b.name))
}

/// Sort one sibling list in place (children are sorted when built)
pub fn sort_siblings(nodes: &mut [AccountNode]) {
    nodes.sort_by(compare_siblings);
}
