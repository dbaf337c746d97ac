// Copyright 2025 RiverCDC Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rivercdc_common::{ChangefeedId, DispatcherId, NodeId};
use rivercdc_pb::{TableSpan, TableSpanStatus};

use super::group::{checker_factory, CheckerFactory, GroupCheckResult, GroupChecker, GroupId};
use super::span::SpanReplication;
use super::tracker::LifecycleIndex;

type TaskMap = HashMap<DispatcherId, Arc<SpanReplication>>;

/// Everything guarded by the db lock. Write critical sections always update
/// the schema and table indices together with the lifecycle tracker, so
/// readers never observe a half-applied multi-step update.
struct DbCore {
    /// Every span task, the table trigger span included.
    all_tasks: TaskMap,
    /// Secondary indices; empty inner maps are pruned.
    schema_tasks: HashMap<i64, TaskMap>,
    table_tasks: HashMap<i64, TaskMap>,
    /// Scheduling lifecycle of every task except the table trigger span,
    /// which is never scheduled.
    tracker: LifecycleIndex<Arc<SpanReplication>>,
    /// Lazily created per-group policy checkers.
    checkers: HashMap<GroupId, Box<dyn GroupChecker>>,
}

impl DbCore {
    fn new() -> Self {
        Self {
            all_tasks: HashMap::new(),
            schema_tasks: HashMap::new(),
            table_tasks: HashMap::new(),
            tracker: LifecycleIndex::new(),
            checkers: HashMap::new(),
        }
    }

    fn put_ddl_dispatcher(&mut self, ddl_span: &Arc<SpanReplication>) {
        // not scheduled, but reachable by id and through both secondary
        // indices: dispatchers report block events with the sentinel table id
        self.all_tasks.insert(ddl_span.id, ddl_span.clone());
        self.table_tasks
            .entry(ddl_span.span.table_id)
            .or_default()
            .insert(ddl_span.id, ddl_span.clone());
        self.schema_tasks
            .entry(ddl_span.schema_id())
            .or_default()
            .insert(ddl_span.id, ddl_span.clone());
    }

    fn add_to_indices(&mut self, span: &Arc<SpanReplication>) {
        self.all_tasks.insert(span.id, span.clone());
        self.schema_tasks
            .entry(span.schema_id())
            .or_default()
            .insert(span.id, span.clone());
        self.table_tasks
            .entry(span.span.table_id)
            .or_default()
            .insert(span.id, span.clone());
    }

    fn remove_span(&mut self, span: &Arc<SpanReplication>) {
        self.tracker.remove(span);

        let schema_id = span.schema_id();
        let table_id = span.span.table_id;
        if let Some(tasks) = self.schema_tasks.get_mut(&schema_id) {
            tasks.remove(&span.id);
            if tasks.is_empty() {
                self.schema_tasks.remove(&schema_id);
            }
        }
        if let Some(tasks) = self.table_tasks.get_mut(&table_id) {
            tasks.remove(&span.id);
            if tasks.is_empty() {
                self.table_tasks.remove(&table_id);
            }
        }
        self.all_tasks.remove(&span.id);

        if let Some(checker) = self.checkers.get_mut(&span.group_id()) {
            checker.remove_replica(span.id);
        }
    }

    fn add_absent(&mut self, spans: &[Arc<SpanReplication>]) {
        for span in spans {
            self.add_to_indices(span);
            self.tracker.add_absent(span.clone());
        }
    }
}

/// The in-memory span index of one changefeed.
pub struct ReplicationDb {
    changefeed_id: ChangefeedId,
    ddl_span: Arc<SpanReplication>,
    core: RwLock<DbCore>,
    new_group_checker: CheckerFactory,
}

impl ReplicationDb {
    pub fn new(
        changefeed_id: ChangefeedId,
        ddl_span: Arc<SpanReplication>,
        enable_table_across_nodes: bool,
    ) -> Self {
        let db = Self {
            new_group_checker: checker_factory(changefeed_id.clone(), enable_table_across_nodes),
            changefeed_id,
            ddl_span,
            core: RwLock::new(DbCore::new()),
        };
        db.core.write().put_ddl_dispatcher(&db.ddl_span);
        db
    }

    /// The table trigger event dispatcher's span.
    pub fn ddl_dispatcher(&self) -> Arc<SpanReplication> {
        self.ddl_span.clone()
    }

    /// Looks a task up across all partitions, the table trigger included.
    pub fn get_task_by_id(&self, id: DispatcherId) -> Option<Arc<SpanReplication>> {
        self.core.read().all_tasks.get(&id).cloned()
    }

    /// Total task count, the table trigger included.
    pub fn task_size(&self) -> usize {
        self.core.read().all_tasks.len()
    }

    pub fn is_table_exists(&self, table_id: i64) -> bool {
        self.core
            .read()
            .table_tasks
            .get(&table_id)
            .is_some_and(|tasks| !tasks.is_empty())
    }

    pub fn get_tasks_by_schema_id(&self, schema_id: i64) -> Vec<Arc<SpanReplication>> {
        self.core
            .read()
            .schema_tasks
            .get(&schema_id)
            .map(|tasks| tasks.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_task_size_by_schema_id(&self, schema_id: i64) -> usize {
        self.core
            .read()
            .schema_tasks
            .get(&schema_id)
            .map_or(0, |tasks| tasks.len())
    }

    pub fn get_tasks_by_table_ids(&self, table_ids: &[i64]) -> Vec<Arc<SpanReplication>> {
        let core = self.core.read();
        table_ids
            .iter()
            .filter_map(|table_id| core.table_tasks.get(table_id))
            .flat_map(|tasks| tasks.values().cloned())
            .collect()
    }

    /// Every span in the db; block events with the `All` influence need the
    /// table trigger span too, so it is included.
    pub fn get_all_tasks(&self) -> Vec<Arc<SpanReplication>> {
        self.core.read().all_tasks.values().cloned().collect()
    }

    pub fn get_absent(&self, max: usize) -> Vec<Arc<SpanReplication>> {
        self.core.read().tracker.absent().take(max).cloned().collect()
    }

    pub fn absent_size(&self) -> usize {
        self.core.read().tracker.absent_size()
    }

    pub fn get_scheduling(&self) -> Vec<Arc<SpanReplication>> {
        self.core.read().tracker.scheduling().cloned().collect()
    }

    pub fn get_replicating(&self) -> Vec<Arc<SpanReplication>> {
        self.core.read().tracker.replicating().cloned().collect()
    }

    pub fn get_task_size_by_node_id(&self, node: &NodeId) -> usize {
        self.core.read().tracker.task_size_by_node(node)
    }

    pub fn get_replicating_size_by_node_id(&self, node: &NodeId) -> usize {
        self.core.read().tracker.replicating_size_by_node(node)
    }

    pub fn get_tasks_by_node_id(&self, node: &NodeId) -> Vec<Arc<SpanReplication>> {
        self.core.read().tracker.tasks_by_node(node).cloned().collect()
    }

    /// Adds spans nobody runs yet.
    pub fn add_absent(&self, spans: Vec<Arc<SpanReplication>>) {
        self.core.write().add_absent(&spans);
    }

    /// Installs a span that a bootstrap response reported as already working
    /// on its node.
    pub fn add_replicating(&self, span: Arc<SpanReplication>) {
        let mut core = self.core.write();
        core.add_to_indices(&span);
        core.tracker.add_replicating(span);
    }

    pub fn mark_span_absent(&self, span: &Arc<SpanReplication>) {
        self.core.write().tracker.mark_absent(span);
    }

    pub fn mark_span_scheduling(&self, span: &Arc<SpanReplication>) {
        self.core.write().tracker.mark_scheduling(span);
    }

    pub fn mark_span_replicating(&self, span: &Arc<SpanReplication>) {
        self.core.write().tracker.mark_replicating(span);
    }

    /// Moves the span's binding from `old` to `new` and marks it scheduling.
    pub fn bind_span_to_node(
        &self,
        old: Option<&NodeId>,
        new: NodeId,
        span: &Arc<SpanReplication>,
    ) {
        self.core.write().tracker.bind_to_node(old, new, span);
    }

    /// Removes the span whatever its state. Unknown ids are an expected race
    /// (e.g. a drop-table barrier beat an operator), not an error.
    pub fn force_remove(&self, id: DispatcherId) {
        let mut core = self.core.write();
        let Some(span) = core.all_tasks.get(&id).cloned() else {
            tracing::warn!(
                changefeed = %self.changefeed_id,
                span = %id,
                "span not found, ignore remove action"
            );
            return;
        };
        tracing::info!(changefeed = %self.changefeed_id, span = %id, "remove span");
        core.remove_span(&span);
    }

    /// Replaces `old_replications` with fresh absent spans covering
    /// `new_spans`. The new spans inherit changefeed, tso handle and schema
    /// from the first old one; their checkpoint is the minimum of
    /// `checkpoint_ts` and every old span's checkpoint, so no change between
    /// the regions' split points is lost.
    ///
    /// # Panics
    ///
    /// When `old_replications` is empty or contains a span the db does not
    /// know: both mean the caller's view diverged from the db, which is an
    /// unrecoverable invariant violation.
    pub fn replace_replica_set(
        &self,
        old_replications: &[Arc<SpanReplication>],
        new_spans: &[TableSpan],
        checkpoint_ts: u64,
    ) -> Vec<Arc<SpanReplication>> {
        assert!(
            !old_replications.is_empty(),
            "replace replica set with no old spans, changefeed {}",
            self.changefeed_id
        );

        let mut core = self.core.write();
        let mut checkpoint_ts = checkpoint_ts;
        for old in old_replications {
            if !core.all_tasks.contains_key(&old.id) {
                panic!(
                    "old replica set not found, changefeed {}, span {}",
                    self.changefeed_id, old.id
                );
            }
            checkpoint_ts = checkpoint_ts.min(old.checkpoint_ts());
            core.remove_span(old);
        }

        let template = &old_replications[0];
        let news = new_spans
            .iter()
            .map(|span| {
                SpanReplication::new(
                    template.changefeed_id.clone(),
                    DispatcherId::new(),
                    template.tso_client(),
                    template.schema_id(),
                    span.clone(),
                    checkpoint_ts,
                )
            })
            .collect::<Vec<_>>();
        core.add_absent(&news);
        news
    }

    /// Removes every task and returns the scheduled ones so the caller can
    /// tell their nodes; absent removals are silent.
    pub fn try_remove_all(&self) -> Vec<Arc<SpanReplication>> {
        let mut core = self.core.write();
        let scheduled = core
            .tracker
            .replicating()
            .chain(core.tracker.scheduling())
            .cloned()
            .collect::<Vec<_>>();
        *core = DbCore::new();
        core.put_ddl_dispatcher(&self.ddl_span);
        scheduled
    }

    /// Removes every task of the given tables, returning the scheduled ones.
    pub fn try_remove_by_table_ids(&self, table_ids: &[i64]) -> Vec<Arc<SpanReplication>> {
        let mut core = self.core.write();
        let mut scheduled = Vec::new();
        for table_id in table_ids {
            let tasks = core
                .table_tasks
                .get(table_id)
                .map(|tasks| tasks.values().cloned().collect::<Vec<_>>())
                .unwrap_or_default();
            for task in tasks {
                core.remove_span(&task);
                if task.is_scheduled() {
                    scheduled.push(task);
                }
            }
        }
        scheduled
    }

    /// Removes every task of one schema, returning the scheduled ones.
    pub fn try_remove_by_schema_id(&self, schema_id: i64) -> Vec<Arc<SpanReplication>> {
        let mut core = self.core.write();
        let tasks = core
            .schema_tasks
            .get(&schema_id)
            .map(|tasks| tasks.values().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        let mut scheduled = Vec::new();
        for task in tasks {
            core.remove_span(&task);
            if task.is_scheduled() {
                scheduled.push(task);
            }
        }
        scheduled
    }

    /// Re-indexes every span of `table_id` under `new_schema_id`; called when
    /// a rename moves a table across schemas. The table trigger span keeps
    /// the sentinel table id, so it is never touched here.
    pub fn update_schema_id(&self, table_id: i64, new_schema_id: i64) {
        let mut core = self.core.write();
        let tasks = core
            .table_tasks
            .get(&table_id)
            .map(|tasks| tasks.values().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        for task in tasks {
            let old_schema_id = task.schema_id();
            if old_schema_id == new_schema_id {
                continue;
            }
            task.set_schema_id(new_schema_id);
            if let Some(old_map) = core.schema_tasks.get_mut(&old_schema_id) {
                old_map.remove(&task.id);
                if old_map.is_empty() {
                    core.schema_tasks.remove(&old_schema_id);
                }
            }
            core.schema_tasks
                .entry(new_schema_id)
                .or_default()
                .insert(task.id, task);
        }
    }

    /// Applies a heartbeat observation to the span and its group checker.
    pub fn update_status(&self, span: &Arc<SpanReplication>, status: &TableSpanStatus) {
        span.update_status(status);
        let mut core = self.core.write();
        let checker = core
            .checkers
            .entry(span.group_id())
            .or_insert_with(|| (self.new_group_checker)(span.group_id()));
        checker.update_status(span);
    }

    /// Runs the group's policy checker, emitting at most `batch` decisions.
    pub fn check_by_group(&self, group: GroupId, batch: usize) -> Vec<GroupCheckResult> {
        let mut core = self.core.write();
        let checker = core
            .checkers
            .entry(group)
            .or_insert_with(|| (self.new_group_checker)(group));
        checker.check(batch)
    }

    /// Groups that currently have a checker.
    pub fn group_ids(&self) -> Vec<GroupId> {
        self.core.read().checkers.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use rivercdc_pb::{full_table_span, table_span_end_key, table_span_start_key};

    use crate::test_utils::{mock_tso_client, new_db, new_span};

    use super::*;

    fn partition_sizes(db: &ReplicationDb) -> (usize, usize, usize) {
        (
            db.absent_size(),
            db.get_scheduling().len(),
            db.get_replicating().len(),
        )
    }

    fn assert_partition_arithmetic(db: &ReplicationDb) {
        let (absent, scheduling, replicating) = partition_sizes(db);
        // +1 is the table trigger span, which has no schedulable partition
        assert_eq!(db.task_size(), absent + scheduling + replicating + 1);
    }

    #[test]
    fn test_add_absent_and_force_remove_round_trip() {
        let db = new_db(false);
        assert_eq!(db.task_size(), 1);

        let span = new_span(&db, 7, 42, 100);
        db.add_absent(vec![span.clone()]);
        assert_eq!(db.task_size(), 2);
        assert!(db.is_table_exists(42));
        assert_eq!(db.get_tasks_by_schema_id(7).len(), 1);
        assert_partition_arithmetic(&db);

        db.force_remove(span.id);
        assert_eq!(db.task_size(), 1);
        assert!(!db.is_table_exists(42));
        assert!(db.get_tasks_by_schema_id(7).is_empty());
        assert_partition_arithmetic(&db);

        // removing twice is a warning, not an error
        db.force_remove(span.id);
        assert_eq!(db.task_size(), 1);
    }

    #[test]
    fn test_mark_cycle_is_idempotent_on_absent() {
        let db = new_db(false);
        let span = new_span(&db, 7, 42, 100);
        db.add_absent(vec![span.clone()]);

        db.bind_span_to_node(None, NodeId::from("node-1"), &span);
        db.mark_span_replicating(&span);
        assert_eq!(partition_sizes(&db), (0, 0, 1));

        db.mark_span_absent(&span);
        assert_eq!(partition_sizes(&db), (1, 0, 0));
        assert!(span.node_id().is_none());
        assert_partition_arithmetic(&db);
    }

    #[test]
    fn test_update_schema_id_moves_index() {
        let db = new_db(false);
        let span = new_span(&db, 7, 42, 100);
        db.add_absent(vec![span.clone()]);

        db.update_schema_id(42, 9);
        assert!(db.get_tasks_by_schema_id(7).is_empty());
        assert_eq!(db.get_tasks_by_schema_id(9).len(), 1);
        assert_eq!(db.get_tasks_by_table_ids(&[42]).len(), 1);
        assert_eq!(span.schema_id(), 9);
        assert_partition_arithmetic(&db);
    }

    #[test]
    fn test_update_schema_id_skips_ddl_span() {
        let db = new_db(false);
        let ddl_schema = db.ddl_dispatcher().schema_id();
        db.update_schema_id(db.ddl_dispatcher().span.table_id, 99);
        // the sentinel table id never matches a user table
        assert_eq!(db.ddl_dispatcher().schema_id(), ddl_schema);
    }

    #[test]
    fn test_replace_replica_set_takes_min_checkpoint() {
        let db = new_db(true);
        let span = new_span(&db, 7, 42, 200);
        db.add_absent(vec![span.clone()]);

        let mid = [table_span_start_key(42), b"m".to_vec()].concat();
        let left = TableSpan {
            table_id: 42,
            start_key: table_span_start_key(42),
            end_key: mid.clone(),
        };
        let right = TableSpan {
            table_id: 42,
            start_key: mid,
            end_key: table_span_end_key(42),
        };
        let news = db.replace_replica_set(&[span.clone()], &[left, right], 150);

        assert!(db.get_task_by_id(span.id).is_none());
        assert_eq!(news.len(), 2);
        for new in &news {
            assert_eq!(new.checkpoint_ts(), 150);
            assert_eq!(new.schema_id(), 7);
            assert!(db.get_task_by_id(new.id).is_some());
        }
        assert_eq!(db.absent_size(), 2);
        assert_partition_arithmetic(&db);
    }

    #[test]
    fn test_replace_replica_set_keeps_older_checkpoint() {
        let db = new_db(true);
        let span = new_span(&db, 7, 42, 120);
        db.add_absent(vec![span.clone()]);
        let news = db.replace_replica_set(&[span], &[full_table_span(42)], 300);
        assert_eq!(news[0].checkpoint_ts(), 120);
    }

    #[test]
    #[should_panic(expected = "no old spans")]
    fn test_replace_replica_set_rejects_empty_olds() {
        let db = new_db(true);
        db.replace_replica_set(&[], &[full_table_span(42)], 100);
    }

    #[test]
    #[should_panic(expected = "old replica set not found")]
    fn test_replace_replica_set_unknown_old_panics() {
        let db = new_db(true);
        let stranger = SpanReplication::new(
            ChangefeedId::in_default_namespace("test"),
            DispatcherId::new(),
            mock_tso_client(),
            7,
            full_table_span(42),
            100,
        );
        db.replace_replica_set(&[stranger], &[full_table_span(42)], 100);
    }

    #[test]
    fn test_try_remove_returns_only_scheduled() {
        let db = new_db(false);
        let absent = new_span(&db, 7, 42, 100);
        let scheduled = new_span(&db, 7, 43, 100);
        db.add_absent(vec![absent, scheduled.clone()]);
        db.bind_span_to_node(None, NodeId::from("node-1"), &scheduled);

        let removed = db.try_remove_by_table_ids(&[42, 43]);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, scheduled.id);
        assert_eq!(db.task_size(), 1);
        assert_partition_arithmetic(&db);
    }

    #[test]
    fn test_try_remove_with_no_tables_is_a_noop() {
        let db = new_db(false);
        let span = new_span(&db, 7, 42, 100);
        db.add_absent(vec![span]);
        assert!(db.try_remove_by_table_ids(&[]).is_empty());
        assert_eq!(db.task_size(), 2);
    }

    #[test]
    fn test_try_remove_by_schema_id() {
        let db = new_db(false);
        let a = new_span(&db, 7, 42, 100);
        let b = new_span(&db, 8, 43, 100);
        db.add_absent(vec![a, b.clone()]);
        db.bind_span_to_node(None, NodeId::from("node-1"), &b);

        assert!(db.try_remove_by_schema_id(7).is_empty());
        let removed = db.try_remove_by_schema_id(8);
        assert_eq!(removed.len(), 1);
        assert_eq!(db.task_size(), 1);
    }

    #[test]
    fn test_try_remove_all_keeps_ddl_span() {
        let db = new_db(false);
        let a = new_span(&db, 7, 42, 100);
        let b = new_span(&db, 7, 43, 100);
        db.add_absent(vec![a.clone(), b]);
        db.bind_span_to_node(None, NodeId::from("node-1"), &a);
        db.mark_span_replicating(&a);

        let removed = db.try_remove_all();
        assert_eq!(removed.len(), 1);
        assert_eq!(db.task_size(), 1);
        assert!(db.get_task_by_id(db.ddl_dispatcher().id).is_some());
        assert_partition_arithmetic(&db);
    }

    #[test]
    fn test_secondary_indices_stay_consistent() {
        let db = new_db(false);
        let spans = (0..5)
            .map(|i| new_span(&db, 7 + (i % 2), 40 + i, 100))
            .collect::<Vec<_>>();
        db.add_absent(spans.clone());

        for span in &spans {
            let by_table = db.get_tasks_by_table_ids(&[span.span.table_id]);
            assert_eq!(by_table.len(), 1);
            assert_eq!(by_table[0].id, span.id);
            assert!(db
                .get_tasks_by_schema_id(span.schema_id())
                .iter()
                .any(|t| t.id == span.id));
        }
        assert_partition_arithmetic(&db);
    }
}
