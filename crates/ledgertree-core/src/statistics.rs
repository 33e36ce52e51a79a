//! Statistics aggregation
//!
//! Attaches an [`AccountStatistics`] block to every node of a built tree.
//! Own totals come from one bulk aggregate query when it is enabled and
//! returns data, otherwise from per-account entry queries that fan out one
//! tree level at a time, deepest level first. Once every own total has
//! settled the tree is walked post-order and each node's roll-up balance is
//! its own signed balance plus the roll-ups of its children.
//!
//! Every run carries an [`AggregationToken`]. Starting a newer run or calling
//! [`StatisticsAggregator::abandon`] invalidates older tokens, and a run whose
//! token is no longer current never writes to the tree.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use ledgertree_config::StatisticsConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use crate::error::{CoreError, CoreResult, DefaultErrorLogger, ErrorContext, ErrorLogger};
use crate::models::{AccountAggregate, AccountNode, AccountStatistics, LedgerEntryRef};
use crate::scope::StatisticsScope;
use crate::source::LedgerSourceRef;
use crate::tree::walk;

/// Aggregator settings, derived from [`StatisticsConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatisticsOptions {
    /// Try the bulk aggregate query before falling back to per-account queries
    pub use_bulk_strategy: bool,
    /// Entry limit passed to each per-account query
    pub fallback_entry_limit: usize,
}

impl Default for StatisticsOptions {
    fn default() -> Self {
        Self {
            use_bulk_strategy: true,
            fallback_entry_limit: 10_000,
        }
    }
}

impl From<&StatisticsConfig> for StatisticsOptions {
    fn from(config: &StatisticsConfig) -> Self {
        Self {
            use_bulk_strategy: config.use_bulk_strategy,
            fallback_entry_limit: config.fallback_entry_limit,
        }
    }
}

/// Generation tag of one aggregation run
#[derive(Debug, Clone)]
pub struct AggregationToken {
    generation: u64,
    counter: Arc<AtomicU64>,
}

impl AggregationToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// False once a newer run has begun or the run was abandoned
    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.generation
    }
}

/// Where the own totals of a run came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationStrategy {
    /// One bulk aggregate query
    Bulk,
    /// Per-account entry queries
    Fallback,
    /// Neither strategy produced data; every node was zeroed
    Defaulted,
}

impl std::fmt::Display for AggregationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationStrategy::Bulk => write!(f, "bulk"),
            AggregationStrategy::Fallback => write!(f, "fallback"),
            AggregationStrategy::Defaulted => write!(f, "defaulted"),
        }
    }
}

/// What an applied run did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationReport {
    pub generation: u64,
    pub strategy: AggregationStrategy,
    pub node_count: usize,
    /// Accounts whose own totals could not be fetched
    pub failed_nodes: Vec<String>,
}

/// Result of [`StatisticsAggregator::compute_statistics`]
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationOutcome {
    /// Statistics were written to the tree
    Applied(AggregationReport),
    /// The token went stale before results could be written; the tree is untouched
    Discarded { generation: u64 },
}

impl AggregationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, AggregationOutcome::Applied(_))
    }
}

/// Own totals of one account, before signing and roll-up
#[derive(Debug, Clone, Default, PartialEq)]
struct OwnTotals {
    transaction_count: u64,
    total_debit: Decimal,
    total_credit: Decimal,
    last_transaction_date: Option<NaiveDate>,
}

impl From<&AccountAggregate> for OwnTotals {
    fn from(row: &AccountAggregate) -> Self {
        Self {
            transaction_count: row.transaction_count,
            total_debit: row.total_debit,
            total_credit: row.total_credit,
            last_transaction_date: row.last_transaction_date,
        }
    }
}

impl OwnTotals {
    /// Sum the entries of `account_id` that fall inside `scope`
    fn from_entries(account_id: &str, entries: &[LedgerEntryRef], scope: &StatisticsScope) -> Self {
        let mut totals = OwnTotals::default();
        let mut transactions = HashSet::new();
        for entry in entries
            .iter()
            .filter(|e| e.account_id == account_id && scope.contains(&e.date))
        {
            transactions.insert(entry.transaction_id.as_str());
            totals.total_debit += entry.debit_amount;
            totals.total_credit += entry.credit_amount;
            totals.last_transaction_date = totals.last_transaction_date.max(Some(entry.date));
        }
        totals.transaction_count = transactions.len() as u64;
        totals
    }
}

/// Own totals gathered for a whole tree
struct Gathered {
    strategy: AggregationStrategy,
    totals: HashMap<String, OwnTotals>,
    failed: HashSet<String>,
}

/// Computes per-node and roll-up statistics from a ledger source
pub struct StatisticsAggregator {
    ledger: LedgerSourceRef,
    options: StatisticsOptions,
    generation: Arc<AtomicU64>,
    logger: Arc<dyn ErrorLogger>,
}

impl StatisticsAggregator {
    pub fn new(ledger: LedgerSourceRef, options: StatisticsOptions) -> Self {
        Self {
            ledger,
            options,
            generation: Arc::new(AtomicU64::new(0)),
            logger: Arc::new(DefaultErrorLogger),
        }
    }

    /// Replace the logger used to report a total aggregation failure
    pub fn with_logger(mut self, logger: Arc<dyn ErrorLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn options(&self) -> StatisticsOptions {
        self.options
    }

    /// Start a new run. Tokens from earlier runs stop being current.
    pub fn begin(&self) -> AggregationToken {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        AggregationToken {
            generation,
            counter: Arc::clone(&self.generation),
        }
    }

    /// Invalidate every outstanding token without starting a new run
    pub fn abandon(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Gather own totals for every node of `roots`, then attach statistics in
    /// place, provided `token` is still current. Structural fields are never
    /// modified.
    pub async fn compute_statistics(
        &self,
        token: &AggregationToken,
        roots: &mut [AccountNode],
        scope: &StatisticsScope,
    ) -> AggregationOutcome {
        let node_count = walk(roots).count();
        log::debug!(
            "Aggregating statistics for {} accounts (generation {}, {})",
            node_count,
            token.generation(),
            scope.description()
        );

        let gathered = match self.gather(token, roots, scope).await {
            Some(gathered) => gathered,
            None => return self.discard(token),
        };

        if !token.is_current() {
            return self.discard(token);
        }

        for root in roots.iter_mut() {
            apply(root, &gathered);
        }

        let mut failed_nodes: Vec<String> = gathered.failed.into_iter().collect();
        failed_nodes.sort();

        log::debug!(
            "Statistics applied for {} accounts via {} strategy ({} failed)",
            node_count,
            gathered.strategy,
            failed_nodes.len()
        );

        AggregationOutcome::Applied(AggregationReport {
            generation: token.generation(),
            strategy: gathered.strategy,
            node_count,
            failed_nodes,
        })
    }

    fn discard(&self, token: &AggregationToken) -> AggregationOutcome {
        log::debug!(
            "Discarding statistics of superseded generation {}",
            token.generation()
        );
        AggregationOutcome::Discarded {
            generation: token.generation(),
        }
    }

    /// Own totals for every node, or `None` if the run went stale midway
    async fn gather(
        &self,
        token: &AggregationToken,
        roots: &[AccountNode],
        scope: &StatisticsScope,
    ) -> Option<Gathered> {
        let ids: HashSet<&str> = walk(roots).map(|node| node.id.as_str()).collect();

        if self.options.use_bulk_strategy {
            match self.ledger.account_aggregate_statistics(scope).await {
                Ok(rows) if !rows.is_empty() => {
                    let totals = rows
                        .iter()
                        .filter(|row| ids.contains(row.account_id.as_str()))
                        .map(|row| (row.account_id.clone(), OwnTotals::from(row)))
                        .collect();
                    return Some(Gathered {
                        strategy: AggregationStrategy::Bulk,
                        totals,
                        failed: HashSet::new(),
                    });
                }
                Ok(_) => {
                    log::warn!("Bulk statistics query returned no rows, falling back to per-account queries");
                }
                Err(e) => {
                    log::warn!("Bulk statistics query failed, falling back to per-account queries: {}", e);
                }
            }
        }

        if !token.is_current() {
            return None;
        }

        self.gather_per_account(token, roots, scope).await
    }

    /// Fallback: one query per account, siblings of a level in parallel,
    /// deepest level first
    async fn gather_per_account(
        &self,
        token: &AggregationToken,
        roots: &[AccountNode],
        scope: &StatisticsScope,
    ) -> Option<Gathered> {
        let mut levels: Vec<Vec<String>> = Vec::new();
        for node in walk(roots) {
            if levels.len() <= node.level {
                levels.resize_with(node.level + 1, Vec::new);
            }
            levels[node.level].push(node.id.clone());
        }

        let mut totals = HashMap::new();
        let mut failures: Vec<(String, String)> = Vec::new();

        for level in levels.iter().rev() {
            let mut queries = JoinSet::new();
            for id in level {
                let ledger = Arc::clone(&self.ledger);
                let id = id.clone();
                let limit = self.options.fallback_entry_limit;
                queries.spawn(async move {
                    let result = ledger.entries_for_account(&id, limit).await;
                    (id, result)
                });
            }

            let mut pending: HashSet<&str> = level.iter().map(String::as_str).collect();
            while let Some(joined) = queries.join_next().await {
                match joined {
                    Ok((id, Ok(entries))) => {
                        pending.remove(id.as_str());
                        totals.insert(id.clone(), OwnTotals::from_entries(&id, &entries, scope));
                    }
                    Ok((id, Err(e))) => {
                        pending.remove(id.as_str());
                        failures.push((id, e.to_string()));
                    }
                    // A panicked query is identified by elimination below
                    Err(e) => log::debug!("Per-account statistics task aborted: {}", e),
                }
            }
            failures.extend(
                pending
                    .into_iter()
                    .map(|id| (id.to_string(), "query task did not complete".to_string())),
            );

            if !token.is_current() {
                return None;
            }
        }

        let node_count: usize = levels.iter().map(Vec::len).sum();
        let strategy = if node_count > 0 && failures.len() == node_count {
            self.report_total_failure(scope, node_count, &failures);
            AggregationStrategy::Defaulted
        } else {
            for (id, reason) in &failures {
                log::warn!("Statistics unavailable for account {}: {}", id, reason);
            }
            AggregationStrategy::Fallback
        };

        Some(Gathered {
            strategy,
            totals,
            failed: failures.into_iter().map(|(id, _)| id).collect(),
        })
    }

    fn report_total_failure(&self, scope: &StatisticsScope, node_count: usize, failures: &[(String, String)]) {
        let error = CoreError::LedgerSource {
            message: format!("no statistics could be retrieved for any of {} accounts", node_count),
        };
        let context = ErrorContext::new("compute_statistics")
            .with_scope(scope.organization_id.clone())
            .with_data("nodes", serde_json::json!(node_count))
            .with_data(
                "first_failure",
                serde_json::json!(failures.first().map(|(_, reason)| reason.as_str())),
            );
        self.logger.log_error(&error, &context);
    }
}

/// Attach statistics to `node` and its subtree, children first.
/// Returns the node's roll-up balance.
fn apply(node: &mut AccountNode, gathered: &Gathered) -> Decimal {
    let children_total: Decimal = node
        .children
        .iter_mut()
        .map(|child| apply(child, gathered))
        .sum();

    let child_count = node.children.len();
    let descendant_count = node.descendant_count();

    // A failed own query zeroes the node's own figures; its children still roll up
    if gathered.failed.contains(&node.id) {
        let mut statistics = AccountStatistics::zeroed(child_count, descendant_count);
        statistics.total_balance = children_total;
        node.statistics = Some(statistics);
        return children_total;
    }

    let own = gathered.totals.get(&node.id).cloned().unwrap_or_default();
    let balance = node
        .account_type
        .signed_balance(own.total_debit, own.total_credit);
    let total_balance = balance + children_total;

    node.statistics = Some(AccountStatistics {
        total_transactions: own.transaction_count,
        total_debit: own.total_debit,
        total_credit: own.total_credit,
        balance,
        total_balance,
        child_count,
        descendant_count,
        has_transactions: own.transaction_count > 0,
        last_transaction_date: own.last_transaction_date,
    });

    total_balance
}

/// Convenience wrapper for a one-off run
pub async fn compute_statistics(
    aggregator: &StatisticsAggregator,
    roots: &mut [AccountNode],
    scope: &StatisticsScope,
) -> CoreResult<AggregationReport> {
    let token = aggregator.begin();
    match aggregator.compute_statistics(&token, roots, scope).await {
        AggregationOutcome::Applied(report) => Ok(report),
        AggregationOutcome::Discarded { generation } => Err(CoreError::InternalError {
            message: format!("statistics generation {} was superseded", generation),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TreeBuilder;
    use crate::memory::MemoryStore;
    use crate::models::AccountRecord;
    use crate::source::LedgerSource;
    use crate::tree::find_node;
    use crate::types::AccountType;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    fn fallback_only() -> StatisticsOptions {
        StatisticsOptions {
            use_bulk_strategy: false,
            ..Default::default()
        }
    }

    fn stats<'a>(roots: &'a [AccountNode], id: &str) -> &'a AccountStatistics {
        find_node(roots, id).unwrap().statistics.as_ref().unwrap()
    }

    /// root -> child -> grandchild, all assets
    fn chain() -> (Vec<AccountNode>, Arc<MemoryStore>) {
        let records = vec![
            AccountRecord::new("R", "1", "Root", AccountType::Asset),
            AccountRecord::new("C", "11", "Child", AccountType::Asset).with_parent("R"),
            AccountRecord::new("G", "111", "Grandchild", AccountType::Asset).with_parent("C"),
        ];
        let roots = TreeBuilder::default().build(records.clone()).roots;
        let store = MemoryStore::new(
            records,
            vec![
                LedgerEntryRef::debit("R", "t1", date(1), dec(5)),
                LedgerEntryRef::debit("C", "t2", date(2), dec(30)),
                LedgerEntryRef::credit("C", "t3", date(3), dec(10)),
                LedgerEntryRef::debit("G", "t4", date(4), dec(7)),
            ],
        );
        (roots, Arc::new(store))
    }

    /// Five nodes: A -> {A1, A2 -> A21}, L
    fn five_nodes() -> (Vec<AccountNode>, Arc<MemoryStore>) {
        let records = vec![
            AccountRecord::new("A", "1", "Assets", AccountType::Asset),
            AccountRecord::new("A1", "11", "Cash", AccountType::Asset).with_parent("A"),
            AccountRecord::new("A2", "12", "Bank", AccountType::Asset).with_parent("A"),
            AccountRecord::new("A21", "121", "Savings", AccountType::Asset).with_parent("A2"),
            AccountRecord::new("L", "2", "Loans", AccountType::Liability),
        ];
        let roots = TreeBuilder::default().build(records.clone()).roots;
        let store = MemoryStore::new(
            records,
            vec![
                LedgerEntryRef::debit("A1", "t1", date(1), dec(100)),
                LedgerEntryRef::debit("A2", "t2", date(2), dec(40)),
                LedgerEntryRef::debit("A21", "t3", date(3), dec(15)),
                LedgerEntryRef::credit("L", "t3", date(3), dec(15)),
            ],
        );
        (roots, Arc::new(store))
    }

    #[tokio::test]
    async fn test_sign_convention() {
        let records = vec![
            AccountRecord::new("A", "1", "Cash", AccountType::Asset),
            AccountRecord::new("L", "2", "Loan", AccountType::Liability),
        ];
        let mut roots = TreeBuilder::default().build(records.clone()).roots;
        let mut entries = Vec::new();
        for id in ["A", "L"] {
            entries.push(LedgerEntryRef::debit(id, "t1", date(1), dec(100)));
            entries.push(LedgerEntryRef::credit(id, "t2", date(2), dec(40)));
        }
        let store = Arc::new(MemoryStore::new(records, entries));

        let aggregator = StatisticsAggregator::new(store, StatisticsOptions::default());
        let report = compute_statistics(&aggregator, &mut roots, &StatisticsScope::all())
            .await
            .unwrap();

        assert_eq!(report.strategy, AggregationStrategy::Bulk);
        assert_eq!(stats(&roots, "A").balance, dec(60));
        assert_eq!(stats(&roots, "L").balance, dec(-60));
        assert_eq!(stats(&roots, "A").total_transactions, 2);
    }

    #[tokio::test]
    async fn test_roll_up_in_both_strategies() {
        for options in [StatisticsOptions::default(), fallback_only()] {
            let (mut roots, store) = chain();
            let aggregator = StatisticsAggregator::new(store, options);
            compute_statistics(&aggregator, &mut roots, &StatisticsScope::all())
                .await
                .unwrap();

            // b0 = 5, b1 = 20, b2 = 7
            assert_eq!(stats(&roots, "G").total_balance, dec(7));
            assert_eq!(stats(&roots, "C").balance, dec(20));
            assert_eq!(stats(&roots, "C").total_balance, dec(27));
            assert_eq!(stats(&roots, "R").total_balance, dec(32));
            assert_eq!(stats(&roots, "R").descendant_count, 2);
            assert_eq!(stats(&roots, "R").child_count, 1);
            assert_eq!(stats(&roots, "C").last_transaction_date, Some(date(3)));
        }
    }

    #[tokio::test]
    async fn test_structure_untouched() {
        let (mut roots, store) = chain();
        let before: Vec<(String, usize, Vec<String>)> = walk(&roots)
            .map(|n| (n.id.clone(), n.level, n.path.clone()))
            .collect();

        let aggregator = StatisticsAggregator::new(store, fallback_only());
        compute_statistics(&aggregator, &mut roots, &StatisticsScope::all())
            .await
            .unwrap();

        let after: Vec<(String, usize, Vec<String>)> = walk(&roots)
            .map(|n| (n.id.clone(), n.level, n.path.clone()))
            .collect();
        assert_eq!(before, after);
        assert!(walk(&roots).all(|n| n.statistics.is_some()));
    }

    #[tokio::test]
    async fn test_one_failing_node_is_isolated() {
        let (mut roots, store) = five_nodes();
        store.fail_entries_for("A1").unwrap();

        let aggregator = StatisticsAggregator::new(store, fallback_only());
        let report = compute_statistics(&aggregator, &mut roots, &StatisticsScope::all())
            .await
            .unwrap();

        assert_eq!(report.strategy, AggregationStrategy::Fallback);
        assert_eq!(report.failed_nodes, vec!["A1".to_string()]);

        let cash = stats(&roots, "A1");
        assert_eq!(*cash, AccountStatistics::zeroed(0, 0));
        assert!(!cash.has_transactions);

        assert_eq!(stats(&roots, "A2").balance, dec(40));
        assert_eq!(stats(&roots, "A2").total_balance, dec(55));
        assert_eq!(stats(&roots, "A21").balance, dec(15));
        assert_eq!(stats(&roots, "L").balance, dec(15));
        assert_eq!(stats(&roots, "A").total_balance, dec(55));
    }

    #[tokio::test]
    async fn test_failed_parent_keeps_children_roll_up() {
        let (mut roots, store) = five_nodes();
        store.fail_entries_for("A2").unwrap();

        let aggregator = StatisticsAggregator::new(store, fallback_only());
        let report = compute_statistics(&aggregator, &mut roots, &StatisticsScope::all())
            .await
            .unwrap();
        assert_eq!(report.failed_nodes, vec!["A2".to_string()]);

        let bank = stats(&roots, "A2");
        assert_eq!(bank.total_transactions, 0);
        assert_eq!(bank.balance, Decimal::ZERO);
        assert_eq!(bank.total_debit, Decimal::ZERO);
        assert!(!bank.has_transactions);
        assert_eq!(bank.child_count, 1);
        assert_eq!(bank.total_balance, dec(15));

        assert_eq!(stats(&roots, "A21").total_balance, dec(15));
        // A1 (100) plus the savings under the failed bank account
        assert_eq!(stats(&roots, "A").total_balance, dec(115));
    }

    #[tokio::test]
    async fn test_bulk_failure_falls_back() {
        let (mut roots, store) = five_nodes();
        store.set_bulk_failure(true);

        let aggregator = StatisticsAggregator::new(store.clone(), StatisticsOptions::default());
        let report = compute_statistics(&aggregator, &mut roots, &StatisticsScope::all())
            .await
            .unwrap();

        assert_eq!(report.strategy, AggregationStrategy::Fallback);
        assert_eq!(store.entry_query_count(), 5);
        assert_eq!(stats(&roots, "A").total_balance, dec(155));
    }

    #[tokio::test]
    async fn test_empty_bulk_result_falls_back() {
        let records = vec![AccountRecord::new("A", "1", "Cash", AccountType::Asset)];
        let mut roots = TreeBuilder::default().build(records.clone()).roots;
        let store = Arc::new(MemoryStore::new(records, vec![]));

        let aggregator = StatisticsAggregator::new(store.clone(), StatisticsOptions::default());
        let report = compute_statistics(&aggregator, &mut roots, &StatisticsScope::all())
            .await
            .unwrap();

        assert_eq!(report.strategy, AggregationStrategy::Fallback);
        assert_eq!(store.entry_query_count(), 1);
        assert_eq!(*stats(&roots, "A"), AccountStatistics::zeroed(0, 0));
    }

    #[tokio::test]
    async fn test_bulk_missing_row_still_rolls_up() {
        let (mut roots, store) = chain();
        // Only G has entries in this window
        let scope = StatisticsScope::all().with_period(Some(date(4)), None);

        let aggregator = StatisticsAggregator::new(store.clone(), StatisticsOptions::default());
        let report = compute_statistics(&aggregator, &mut roots, &scope).await.unwrap();

        assert_eq!(report.strategy, AggregationStrategy::Bulk);
        assert_eq!(store.entry_query_count(), 0);
        assert_eq!(stats(&roots, "R").balance, Decimal::ZERO);
        assert!(!stats(&roots, "R").has_transactions);
        assert_eq!(stats(&roots, "R").total_balance, dec(7));
    }

    #[tokio::test]
    async fn test_fallback_respects_date_window() {
        let (mut roots, store) = chain();
        let scope = StatisticsScope::all().with_period(None, Some(date(2)));

        let aggregator = StatisticsAggregator::new(store, fallback_only());
        compute_statistics(&aggregator, &mut roots, &scope).await.unwrap();

        assert_eq!(stats(&roots, "C").total_debit, dec(30));
        assert_eq!(stats(&roots, "C").total_credit, Decimal::ZERO);
        assert_eq!(stats(&roots, "G").total_transactions, 0);
        assert_eq!(stats(&roots, "R").total_balance, dec(35));
    }

    #[derive(Default)]
    struct RecordingLogger {
        errors: Mutex<Vec<String>>,
    }

    impl ErrorLogger for RecordingLogger {
        fn log_error(&self, error: &CoreError, _context: &ErrorContext) {
            self.errors.lock().unwrap().push(error.to_string());
        }

        fn log_warning(&self, _message: &str, _context: &ErrorContext) {}
    }

    #[tokio::test]
    async fn test_total_failure_defaults_every_node() {
        let (mut roots, store) = five_nodes();
        store.set_bulk_failure(true);
        for id in ["A", "A1", "A2", "A21", "L"] {
            store.fail_entries_for(id).unwrap();
        }

        let logger = Arc::new(RecordingLogger::default());
        let aggregator = StatisticsAggregator::new(store, StatisticsOptions::default())
            .with_logger(logger.clone());
        let report = compute_statistics(&aggregator, &mut roots, &StatisticsScope::all())
            .await
            .unwrap();

        assert_eq!(report.strategy, AggregationStrategy::Defaulted);
        assert_eq!(report.failed_nodes.len(), 5);
        assert_eq!(logger.errors.lock().unwrap().len(), 1);
        assert!(walk(&roots).all(|n| {
            let s = n.statistics.as_ref().unwrap();
            s.total_transactions == 0 && s.total_balance.is_zero() && !s.has_transactions
        }));
        assert_eq!(stats(&roots, "A").descendant_count, 3);
    }

    #[tokio::test]
    async fn test_stale_token_is_discarded() {
        let (mut roots, store) = chain();
        let aggregator = StatisticsAggregator::new(store, StatisticsOptions::default());

        let first = aggregator.begin();
        let second = aggregator.begin();
        assert!(!first.is_current());
        assert!(second.is_current());

        let outcome = aggregator
            .compute_statistics(&first, &mut roots, &StatisticsScope::all())
            .await;
        assert_eq!(outcome, AggregationOutcome::Discarded { generation: 1 });
        assert!(walk(&roots).all(|n| n.statistics.is_none()));

        let outcome = aggregator
            .compute_statistics(&second, &mut roots, &StatisticsScope::all())
            .await;
        assert!(outcome.is_applied());
    }

    /// Ledger whose per-account queries wait for permits
    struct GatedLedger {
        inner: Arc<MemoryStore>,
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl LedgerSource for GatedLedger {
        async fn account_aggregate_statistics(
            &self,
            scope: &StatisticsScope,
        ) -> CoreResult<Vec<AccountAggregate>> {
            self.inner.account_aggregate_statistics(scope).await
        }

        async fn entries_for_account(&self, account_id: &str, limit: usize) -> CoreResult<Vec<LedgerEntryRef>> {
            let _permit = self.gate.acquire().await.map_err(|e| CoreError::LedgerSource {
                message: e.to_string(),
            })?;
            self.inner.entries_for_account(account_id, limit).await
        }
    }

    #[tokio::test]
    async fn test_abandon_in_flight_run() {
        let (mut roots, store) = chain();
        let gate = Arc::new(Semaphore::new(0));
        let ledger = Arc::new(GatedLedger {
            inner: store,
            gate: gate.clone(),
        });
        let aggregator = StatisticsAggregator::new(ledger, fallback_only());
        let token = aggregator.begin();
        let scope = StatisticsScope::all();

        let release = async {
            tokio::task::yield_now().await;
            aggregator.abandon();
            gate.add_permits(16);
        };
        let (outcome, _) = tokio::join!(
            aggregator.compute_statistics(&token, &mut roots, &scope),
            release
        );

        assert!(!outcome.is_applied());
        assert!(walk(&roots).all(|n| n.statistics.is_none()));
    }

    #[test]
    fn test_options_from_config() {
        let config = StatisticsConfig {
            use_bulk_strategy: false,
            fallback_entry_limit: 50,
        };
        let options = StatisticsOptions::from(&config);
        assert!(!options.use_bulk_strategy);
        assert_eq!(options.fallback_entry_limit, 50);
    }
}
