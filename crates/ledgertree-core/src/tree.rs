//! Read helpers over a built account tree

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::AccountNode;
use crate::state::ExpansionState;
use crate::types::AccountType;

/// Pre-order iterator over a forest
pub struct Walk<'a> {
    stack: Vec<&'a AccountNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a AccountNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Visit every node, parents before children, siblings in order
pub fn walk(roots: &[AccountNode]) -> Walk<'_> {
    Walk {
        stack: roots.iter().rev().collect(),
    }
}

pub fn find_node<'a>(roots: &'a [AccountNode], id: &str) -> Option<&'a AccountNode> {
    walk(roots).find(|node| node.id == id)
}

pub fn find_node_mut<'a>(roots: &'a mut [AccountNode], id: &str) -> Option<&'a mut AccountNode> {
    for node in roots.iter_mut() {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_node_mut(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}

/// Immediate children of `parent_id`, or the roots when `None`
pub fn siblings_under<'a>(roots: &'a [AccountNode], parent_id: Option<&str>) -> &'a [AccountNode] {
    match parent_id {
        None => roots,
        Some(parent_id) => find_node(roots, parent_id)
            .map(|parent| parent.children.as_slice())
            .unwrap_or(&[]),
    }
}

/// Nodes from the root down to (and including) `id`
pub fn breadcrumbs<'a>(roots: &'a [AccountNode], id: &str) -> Vec<&'a AccountNode> {
    let Some(target) = find_node(roots, id) else {
        return Vec::new();
    };
    let mut trail: Vec<&AccountNode> = target
        .path
        .iter()
        .filter_map(|ancestor| find_node(roots, ancestor))
        .collect();
    trail.push(target);
    trail
}

pub fn count_nodes(roots: &[AccountNode]) -> usize {
    walk(roots).count()
}

/// Deepest level present; 0 for an empty forest
pub fn max_level(roots: &[AccountNode]) -> usize {
    walk(roots).map(|node| node.level).max().unwrap_or(0)
}

/// Flattened rows a renderer shows: every root, plus the children of each
/// shown node that is expanded
pub fn visible_nodes<'a>(roots: &'a [AccountNode], expansion: &ExpansionState) -> Vec<&'a AccountNode> {
    let mut rows = Vec::new();
    let mut stack: Vec<&AccountNode> = roots.iter().rev().collect();
    while let Some(node) = stack.pop() {
        rows.push(node);
        if expansion.is_expanded(&node.id) {
            stack.extend(node.children.iter().rev());
        }
    }
    rows
}

/// Shape summary of a tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchySummary {
    pub total_accounts: usize,
    pub root_count: usize,
    pub max_level: usize,
    pub active_accounts: usize,
    pub inactive_accounts: usize,
    pub by_type: HashMap<AccountType, usize>,
}

impl HierarchySummary {
    pub fn from_roots(roots: &[AccountNode]) -> Self {
        let mut summary = HierarchySummary {
            root_count: roots.len(),
            ..Default::default()
        };
        for node in walk(roots) {
            summary.total_accounts += 1;
            summary.max_level = summary.max_level.max(node.level);
            if node.is_active {
                summary.active_accounts += 1;
            } else {
                summary.inactive_accounts += 1;
            }
            *summary.by_type.entry(node.account_type).or_insert(0) += 1;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TreeBuilder;
    use crate::models::AccountRecord;

    fn sample() -> Vec<AccountNode> {
        TreeBuilder::default()
            .build(vec![
                AccountRecord::new("A", "1", "Assets", AccountType::Asset),
                AccountRecord::new("A1", "11", "Cash", AccountType::Asset).with_parent("A"),
                AccountRecord::new("A11", "111", "Petty cash", AccountType::Asset).with_parent("A1"),
                AccountRecord::new("A2", "12", "Bank", AccountType::Asset).with_parent("A"),
                AccountRecord::new("L", "2", "Liabilities", AccountType::Liability).inactive(),
            ])
            .roots
    }

    #[test]
    fn test_walk_is_preorder() {
        let roots = sample();
        let ids: Vec<&str> = walk(&roots).map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "A1", "A11", "A2", "L"]);
    }

    #[test]
    fn test_find_node() {
        let mut roots = sample();
        assert_eq!(find_node(&roots, "A11").map(|n| n.level), Some(2));
        assert!(find_node(&roots, "nope").is_none());

        find_node_mut(&mut roots, "A2").unwrap().name = "Bank accounts".to_string();
        assert_eq!(find_node(&roots, "A2").unwrap().name, "Bank accounts");
    }

    #[test]
    fn test_siblings_under_and_breadcrumbs() {
        let roots = sample();
        assert_eq!(siblings_under(&roots, None).len(), 2);
        assert_eq!(siblings_under(&roots, Some("A")).len(), 2);
        assert!(siblings_under(&roots, Some("missing")).is_empty());

        let trail: Vec<&str> = breadcrumbs(&roots, "A11").iter().map(|n| n.id.as_str()).collect();
        assert_eq!(trail, vec!["A", "A1", "A11"]);
    }

    #[test]
    fn test_visible_nodes_follow_expansion() {
        let roots = sample();
        let mut expansion = ExpansionState::new();
        assert_eq!(visible_nodes(&roots, &expansion).len(), 2);

        expansion.expand("A");
        let ids: Vec<&str> = visible_nodes(&roots, &expansion).iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "A1", "A2", "L"]);

        // Expanded but hidden under a collapsed parent
        expansion.collapse("A");
        expansion.expand("A1");
        assert_eq!(visible_nodes(&roots, &expansion).len(), 2);
    }

    #[test]
    fn test_summary() {
        let roots = sample();
        let summary = HierarchySummary::from_roots(&roots);
        assert_eq!(summary.total_accounts, 5);
        assert_eq!(summary.root_count, 2);
        assert_eq!(summary.max_level, 2);
        assert_eq!(summary.inactive_accounts, 1);
        assert_eq!(summary.by_type.get(&AccountType::Asset), Some(&4));
        assert_eq!(count_nodes(&roots), 5);
        assert_eq!(max_level(&roots), 2);
    }
}
