//! Expansion and selection state, keyed by account id
//!
//! Both containers only hold ids. They never touch the tree, so they survive
//! a rebuild: `rekey` drops ids that no longer exist and keeps the rest.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::filter;
use crate::models::{AccountNode, HierarchyFilter};
use crate::tree::{find_node, siblings_under, walk};

/// Which nodes are expanded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionState {
    expanded: HashSet<String>,
}

impl ExpansionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from the builder's default expansion flags
    pub fn from_tree(roots: &[AccountNode]) -> Self {
        Self {
            expanded: walk(roots)
                .filter(|node| node.is_expanded)
                .map(|node| node.id.clone())
                .collect(),
        }
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    pub fn expand(&mut self, id: &str) {
        self.expanded.insert(id.to_string());
    }

    pub fn collapse(&mut self, id: &str) {
        self.expanded.remove(id);
    }

    /// Flip one node; returns the new state
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.expanded.remove(id) {
            false
        } else {
            self.expanded.insert(id.to_string());
            true
        }
    }

    pub fn expand_all(&mut self, roots: &[AccountNode]) {
        self.expanded = walk(roots).map(|node| node.id.clone()).collect();
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    /// Expand exactly the nodes with `level < level_limit`
    pub fn expand_to_level(&mut self, roots: &[AccountNode], level_limit: usize) {
        self.expanded = walk(roots)
            .filter(|node| node.level < level_limit)
            .map(|node| node.id.clone())
            .collect();
    }

    /// Expand every ancestor of `id` so that it becomes visible.
    /// The target itself is left as it was. Returns false for unknown ids.
    pub fn expand_to_node(&mut self, roots: &[AccountNode], id: &str) -> bool {
        match find_node(roots, id) {
            Some(node) => {
                self.expanded.extend(node.path.iter().cloned());
                true
            }
            None => false,
        }
    }

    /// Drop ids that are not in the (rebuilt) tree
    pub fn rekey(&mut self, roots: &[AccountNode]) {
        let present: HashSet<&str> = walk(roots).map(|node| node.id.as_str()).collect();
        self.expanded.retain(|id| present.contains(id.as_str()));
    }

    /// Expanded ids, sorted
    pub fn expanded_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.expanded.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }
}

/// Which nodes are selected
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    selected: HashSet<String>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    /// Single-select replaces the selection with `id`;
    /// multi-select toggles `id` in or out of it.
    pub fn select_node(&mut self, id: &str, multi_select: bool) {
        if multi_select {
            if !self.selected.remove(id) {
                self.selected.insert(id.to_string());
            }
        } else {
            self.selected.clear();
            self.selected.insert(id.to_string());
        }
    }

    pub fn deselect_node(&mut self, id: &str) {
        self.selected.remove(id);
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn select_all(&mut self, roots: &[AccountNode]) {
        self.selected = walk(roots).map(|node| node.id.clone()).collect();
    }

    /// Select every node that satisfies `criteria` on its own
    pub fn select_by_filter(&mut self, roots: &[AccountNode], criteria: &HierarchyFilter) {
        self.selected = walk(roots)
            .filter(|node| filter::matches(node, criteria))
            .map(|node| node.id.clone())
            .collect();
    }

    /// Select the immediate children of `parent_id`
    pub fn select_children(&mut self, roots: &[AccountNode], parent_id: &str) {
        self.selected = siblings_under(roots, Some(parent_id))
            .iter()
            .map(|node| node.id.clone())
            .collect();
    }

    /// Select every node sharing `id`'s parent, excluding `id`
    pub fn select_siblings(&mut self, roots: &[AccountNode], id: &str) {
        let Some(node) = find_node(roots, id) else {
            return;
        };
        self.selected = siblings_under(roots, node.parent_id.as_deref())
            .iter()
            .filter(|sibling| sibling.id != id)
            .map(|sibling| sibling.id.clone())
            .collect();
    }

    /// Drop ids that are not in the (rebuilt) tree
    pub fn rekey(&mut self, roots: &[AccountNode]) {
        let present: HashSet<&str> = walk(roots).map(|node| node.id.as_str()).collect();
        self.selected.retain(|id| present.contains(id.as_str()));
    }

    /// Selected ids, sorted
    pub fn selected_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.selected.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}
