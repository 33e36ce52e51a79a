//! Tree pruning: strict filtering and ancestor-preserving search
//!
//! `filter` drops a failing node together with its whole subtree.
//! `search` keeps a matching node with its full subtree, and keeps a
//! non-matching node only as the ancestor of a deeper match.

use crate::models::{AccountNode, HierarchyFilter};
use crate::types::SearchField;

/// Case-insensitive substring match over the chosen fields.
/// An empty field list means every field.
pub fn text_matches(node: &AccountNode, needle_lower: &str, fields: &[SearchField]) -> bool {
    let all = SearchField::all();
    let fields = if fields.is_empty() { all.as_slice() } else { fields };
    fields.iter().any(|field| {
        node.field_text(*field)
            .map_or(false, |text| text.to_lowercase().contains(needle_lower))
    })
}

/// Whether a node satisfies every criterion present in `criteria`
pub fn matches(node: &AccountNode, criteria: &HierarchyFilter) -> bool {
    if let Some(account_type) = criteria.account_type {
        if node.account_type != account_type {
            return false;
        }
    }

    if let Some(is_active) = criteria.is_active {
        if node.is_active != is_active {
            return false;
        }
    }

    let balance = node.current_balance();

    if let Some(has_balance) = criteria.has_balance {
        if balance.is_zero() == has_balance {
            return false;
        }
    }

    if let Some(ref parent_id) = criteria.parent_id {
        if node.parent_id.as_ref() != Some(parent_id) {
            return false;
        }
    }

    if let Some(ref organization_id) = criteria.organization_id {
        if node.organization_id.as_ref() != Some(organization_id) {
            return false;
        }
    }

    if let Some(level) = criteria.level {
        if node.level != level {
            return false;
        }
    }

    if let Some(max_level) = criteria.max_level {
        if node.level > max_level {
            return false;
        }
    }

    if let Some(min_balance) = criteria.min_balance {
        if balance < min_balance {
            return false;
        }
    }

    if let Some(max_balance) = criteria.max_balance {
        if balance > max_balance {
            return false;
        }
    }

    if let Some(text) = criteria.search_text.as_deref() {
        let needle = text.trim().to_lowercase();
        if !needle.is_empty() && !text_matches(node, &needle, &criteria.search_fields) {
            return false;
        }
    }

    true
}

/// Strict filter: a node is kept only if it matches on its own, and its
/// children are filtered the same way
pub fn filter(nodes: &[AccountNode], criteria: &HierarchyFilter) -> Vec<AccountNode> {
    if criteria.is_empty() {
        return nodes.to_vec();
    }
    filter_level(nodes, criteria)
}

fn filter_level(nodes: &[AccountNode], criteria: &HierarchyFilter) -> Vec<AccountNode> {
    nodes
        .iter()
        .filter(|node| matches(node, criteria))
        .map(|node| {
            let mut kept = node.clone();
            kept.children = filter_level(&node.children, criteria);
            kept.has_children = !kept.children.is_empty();
            kept
        })
        .collect()
}

/// Text search that keeps the ancestor chain of every match
pub fn search(nodes: &[AccountNode], text: &str, fields: &[SearchField]) -> Vec<AccountNode> {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return nodes.to_vec();
    }
    search_level(nodes, &needle, fields)
}

fn search_level(nodes: &[AccountNode], needle: &str, fields: &[SearchField]) -> Vec<AccountNode> {
    let mut results = Vec::new();
    for node in nodes {
        if text_matches(node, needle, fields) {
            results.push(node.clone());
            continue;
        }

        let matching = search_level(&node.children, needle, fields);
        if !matching.is_empty() {
            let mut ancestor = node.clone();
            ancestor.children = matching;
            ancestor.has_children = true;
            results.push(ancestor);
        }
    }
    results
}
