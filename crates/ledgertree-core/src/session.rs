//! Hierarchy session
//!
//! Owns the current tree snapshot together with the caller's expansion and
//! selection state, and routes structural edits through the account source.
//! Every edit ends in a full rebuild; the tree is never patched in place.

use std::sync::Arc;

use ledgertree_config::Config;

use crate::builder::{BuildWarning, TreeBuilder, TreeOptions};
use crate::error::{CoreError, CoreResult};
use crate::filter;
use crate::models::{AccountNode, AccountRecord, AccountUpdate, HierarchyFilter, NewAccount};
use crate::moves::{MovePreview, MoveValidation, MoveValidator};
use crate::scope::StatisticsScope;
use crate::source::{AccountSourceRef, LedgerSourceRef};
use crate::state::{ExpansionState, SelectionState};
use crate::statistics::{AggregationOutcome, AggregationToken, StatisticsAggregator, StatisticsOptions};
use crate::tree::{self, HierarchySummary};
use crate::types::{MoveOperation, SearchField};

pub struct Hierarchy {
    accounts: AccountSourceRef,
    builder: TreeBuilder,
    validator: MoveValidator,
    aggregator: Arc<StatisticsAggregator>,
    search_fields: Vec<SearchField>,

    loaded: bool,
    scope: StatisticsScope,
    roots: Vec<AccountNode>,
    warnings: Vec<BuildWarning>,
    expansion: ExpansionState,
    selection: SelectionState,
}

impl Hierarchy {
    pub fn new(config: &Config, accounts: AccountSourceRef, ledger: LedgerSourceRef) -> Self {
        Self {
            accounts,
            builder: TreeBuilder::new(TreeOptions::from(&config.tree)),
            validator: MoveValidator::from(&config.tree),
            aggregator: Arc::new(StatisticsAggregator::new(
                ledger,
                StatisticsOptions::from(&config.statistics),
            )),
            search_fields: config.search.default_fields.clone(),
            loaded: false,
            scope: StatisticsScope::default(),
            roots: Vec::new(),
            warnings: Vec::new(),
            expansion: ExpansionState::new(),
            selection: SelectionState::new(),
        }
    }

    // ==================== Loading ====================

    /// Fetch accounts for `scope` and rebuild the tree.
    ///
    /// The first load seeds expansion from the builder's defaults; later loads
    /// keep expansion and selection for ids that still exist. Any aggregation
    /// still running against the previous snapshot is abandoned.
    pub async fn load(&mut self, scope: &StatisticsScope) -> CoreResult<()> {
        let records = self.accounts.list_accounts(scope).await?;
        let output = self.builder.build(records);

        self.aggregator.abandon();
        self.roots = output.roots;
        self.warnings = output.warnings;
        self.scope = scope.clone();

        if self.loaded {
            self.expansion.rekey(&self.roots);
        } else {
            self.expansion = ExpansionState::from_tree(&self.roots);
        }
        self.selection.rekey(&self.roots);
        self.loaded = true;

        log::info!(
            "Loaded {} accounts in {} roots ({}, {} warnings)",
            tree::count_nodes(&self.roots),
            self.roots.len(),
            scope.description(),
            self.warnings.len()
        );
        Ok(())
    }

    /// Rebuild with the scope of the last load
    pub async fn reload(&mut self) -> CoreResult<()> {
        let scope = self.scope.clone();
        self.load(&scope).await
    }

    fn ensure_loaded(&self) -> CoreResult<()> {
        if self.loaded {
            Ok(())
        } else {
            Err(CoreError::NotLoaded)
        }
    }

    // ==================== Statistics ====================

    /// Start an aggregation run over a copy of the current tree.
    /// Feed the computed copy back through [`Hierarchy::apply_statistics`].
    pub fn begin_statistics(&self) -> CoreResult<(AggregationToken, Vec<AccountNode>)> {
        self.ensure_loaded()?;
        Ok((self.aggregator.begin(), self.roots.clone()))
    }

    /// Install a computed snapshot if its run is still the current one
    pub fn apply_statistics(&mut self, token: &AggregationToken, computed: Vec<AccountNode>) -> bool {
        if !token.is_current() {
            log::debug!("Dropping statistics snapshot of generation {}", token.generation());
            return false;
        }
        self.roots = computed;
        true
    }

    /// Compute statistics for the current tree and install them
    pub async fn refresh_statistics(&mut self, scope: &StatisticsScope) -> CoreResult<AggregationOutcome> {
        let (token, mut snapshot) = self.begin_statistics()?;
        let aggregator = Arc::clone(&self.aggregator);
        let outcome = aggregator.compute_statistics(&token, &mut snapshot, scope).await;
        if outcome.is_applied() && !self.apply_statistics(&token, snapshot) {
            return Ok(AggregationOutcome::Discarded {
                generation: token.generation(),
            });
        }
        Ok(outcome)
    }

    pub fn aggregator(&self) -> Arc<StatisticsAggregator> {
        Arc::clone(&self.aggregator)
    }

    // ==================== Structural edits ====================

    pub fn validate_move(
        &self,
        source_id: &str,
        target_id: &str,
        operation: MoveOperation,
    ) -> CoreResult<MoveValidation> {
        self.ensure_loaded()?;
        Ok(self.validator.validate(&self.roots, source_id, target_id, operation))
    }

    /// Validate, persist through the account source, then rebuild.
    /// The moved account is revealed in the expansion state.
    pub async fn move_account(
        &mut self,
        source_id: &str,
        target_id: &str,
        operation: MoveOperation,
    ) -> CoreResult<MovePreview> {
        let validation = self.validate_move(source_id, target_id, operation)?;
        let preview = match validation.preview {
            Some(preview) if validation.is_valid => preview,
            _ => {
                log::debug!(
                    "Rejected {} of {} relative to {}: {}",
                    operation,
                    source_id,
                    target_id,
                    validation.errors.join("; ")
                );
                return Err(CoreError::InvalidMove {
                    errors: validation.errors,
                });
            }
        };

        self.accounts
            .move_account(source_id, preview.new_parent_id.as_deref())
            .await?;
        self.reload().await?;
        self.expansion.expand_to_node(&self.roots, source_id);

        log::info!(
            "Moved {} ({} accounts) to level {}",
            source_id,
            preview.moving_ids.len(),
            preview.new_level
        );
        Ok(preview)
    }

    pub async fn create_account(&mut self, account: NewAccount) -> CoreResult<AccountRecord> {
        self.ensure_loaded()?;
        if let Some(parent_id) = account.parent_id.as_deref() {
            let parent = tree::find_node(&self.roots, parent_id).ok_or_else(|| {
                CoreError::AccountNotFound {
                    id: parent_id.to_string(),
                }
            })?;
            if !parent.can_add_child {
                return Err(CoreError::InvalidRecord {
                    message: format!(
                        "{} is at level {} and cannot take child accounts",
                        parent_id, parent.level
                    ),
                });
            }
        }

        let record = self.accounts.create_account(account).await?;
        self.reload().await?;
        Ok(record)
    }

    pub async fn update_account(&mut self, id: &str, update: AccountUpdate) -> CoreResult<AccountRecord> {
        self.ensure_loaded()?;
        let record = self.accounts.update_account(id, update).await?;
        self.reload().await?;
        Ok(record)
    }

    /// Delete an account. Refused locally when the node cannot be deleted.
    pub async fn delete_account(&mut self, id: &str) -> CoreResult<()> {
        self.ensure_loaded()?;
        let node = tree::find_node(&self.roots, id)
            .ok_or_else(|| CoreError::AccountNotFound { id: id.to_string() })?;
        if !node.can_delete {
            return Err(CoreError::DeleteRefused {
                id: id.to_string(),
                reason: format!("balance is {}", node.balance),
            });
        }

        self.accounts.delete_account(id).await?;
        self.reload().await
    }

    // ==================== Views ====================

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn roots(&self) -> &[AccountNode] {
        &self.roots
    }

    pub fn warnings(&self) -> &[BuildWarning] {
        &self.warnings
    }

    pub fn scope(&self) -> &StatisticsScope {
        &self.scope
    }

    pub fn find(&self, id: &str) -> Option<&AccountNode> {
        tree::find_node(&self.roots, id)
    }

    pub fn filter(&self, criteria: &HierarchyFilter) -> Vec<AccountNode> {
        filter::filter(&self.roots, criteria)
    }

    /// Search over the configured default fields
    pub fn search(&self, text: &str) -> Vec<AccountNode> {
        filter::search(&self.roots, text, &self.search_fields)
    }

    pub fn search_in(&self, text: &str, fields: &[SearchField]) -> Vec<AccountNode> {
        filter::search(&self.roots, text, fields)
    }

    pub fn visible_nodes(&self) -> Vec<&AccountNode> {
        tree::visible_nodes(&self.roots, &self.expansion)
    }

    pub fn summary(&self) -> HierarchySummary {
        HierarchySummary::from_roots(&self.roots)
    }

    // ==================== Expansion / selection ====================

    pub fn expansion(&self) -> &ExpansionState {
        &self.expansion
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn expand(&mut self, id: &str) {
        self.expansion.expand(id);
    }

    pub fn collapse(&mut self, id: &str) {
        self.expansion.collapse(id);
    }

    pub fn toggle_node(&mut self, id: &str) -> bool {
        self.expansion.toggle(id)
    }

    pub fn expand_all(&mut self) {
        self.expansion.expand_all(&self.roots);
    }

    pub fn collapse_all(&mut self) {
        self.expansion.collapse_all();
    }

    pub fn expand_to_level(&mut self, level: usize) {
        self.expansion.expand_to_level(&self.roots, level);
    }

    pub fn expand_to_node(&mut self, id: &str) -> bool {
        self.expansion.expand_to_node(&self.roots, id)
    }

    pub fn select_node(&mut self, id: &str, multi_select: bool) {
        self.selection.select_node(id, multi_select);
    }

    pub fn deselect_node(&mut self, id: &str) {
        self.selection.deselect_node(id);
    }

    pub fn select_all(&mut self) {
        self.selection.select_all(&self.roots);
    }

    pub fn select_children(&mut self, parent_id: &str) {
        self.selection.select_children(&self.roots, parent_id);
    }

    pub fn select_siblings(&mut self, id: &str) {
        self.selection.select_siblings(&self.roots, id);
    }

    pub fn select_by_filter(&mut self, criteria: &HierarchyFilter) {
        self.selection.select_by_filter(&self.roots, criteria);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear_selection();
    }
}
