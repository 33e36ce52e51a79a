//! Move validation
//!
//! Decides whether a drag-and-drop style move is allowed and previews where
//! the source subtree would land. Nothing here mutates the tree or talks to a
//! store; callers apply a valid move through [`crate::source::AccountSource`]
//! and rebuild.

use ledgertree_config::TreeConfig;
use serde::{Deserialize, Serialize};

use crate::models::AccountNode;
use crate::tree::find_node;
use crate::types::MoveOperation;

/// Where a valid move would put the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePreview {
    /// New parent, `None` when the source becomes a root
    pub new_parent_id: Option<String>,
    pub new_level: usize,
    /// The source followed by every descendant that moves with it
    pub moving_ids: Vec<String>,
}

/// Decision returned by [`MoveValidator::validate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<MovePreview>,
}

impl MoveValidation {
    fn rejected(errors: Vec<String>) -> Self {
        Self {
            is_valid: false,
            errors,
            preview: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveValidator {
    max_depth: usize,
}

impl Default for MoveValidator {
    fn default() -> Self {
        Self::from(&TreeConfig::default())
    }
}

impl From<&TreeConfig> for MoveValidator {
    fn from(config: &TreeConfig) -> Self {
        Self::new(config.max_depth)
    }
}

impl MoveValidator {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Validate moving `source_id` relative to `target_id`.
    ///
    /// `MoveInto` makes the target the new parent; `MoveBefore` and
    /// `MoveAfter` reparent the source under the target's own parent.
    /// Problems are collected into `errors` rather than returned as `Err`.
    pub fn validate(
        &self,
        roots: &[AccountNode],
        source_id: &str,
        target_id: &str,
        operation: MoveOperation,
    ) -> MoveValidation {
        if source_id == target_id {
            return MoveValidation::rejected(vec![format!(
                "Cannot move account {} relative to itself",
                source_id
            )]);
        }

        let mut errors = Vec::new();
        let source = find_node(roots, source_id);
        let target = find_node(roots, target_id);
        if source.is_none() {
            errors.push(format!("Source account {} not found", source_id));
        }
        if target.is_none() {
            errors.push(format!("Target account {} not found", target_id));
        }
        let (Some(source), Some(target)) = (source, target) else {
            return MoveValidation::rejected(errors);
        };

        let (new_parent_id, new_level) = match operation {
            MoveOperation::MoveInto => (Some(target.id.clone()), target.level + 1),
            MoveOperation::MoveBefore | MoveOperation::MoveAfter => {
                (target.parent_id.clone(), target.level)
            }
        };

        // The new parent must not sit inside the moving subtree
        if let Some(ref parent_id) = new_parent_id {
            if parent_id == source_id || target.path.iter().any(|id| id == source_id) {
                errors.push(format!(
                    "Cannot move account {} under its own descendant {}",
                    source_id, parent_id
                ));
            }
        }

        if new_level > self.max_depth {
            errors.push(format!(
                "New level {} exceeds the maximum depth of {}",
                new_level, self.max_depth
            ));
        } else {
            let subtree_depth = source.deepest_level() - source.level;
            if new_level + subtree_depth > self.max_depth {
                errors.push(format!(
                    "Moved subtree would reach level {}, beyond the maximum depth of {}",
                    new_level + subtree_depth,
                    self.max_depth
                ));
            }
        }

        if !errors.is_empty() {
            return MoveValidation::rejected(errors);
        }

        let mut moving_ids = vec![source.id.clone()];
        moving_ids.extend(source.descendant_ids());

        MoveValidation {
            is_valid: true,
            errors,
            preview: Some(MovePreview {
                new_parent_id,
                new_level,
                moving_ids,
            }),
        }
    }
}
