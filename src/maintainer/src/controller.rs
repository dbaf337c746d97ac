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

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rivercdc_common::{ChangefeedId, DispatcherId, NodeId, ReplicaConfig, Table, TableFilter};
use rivercdc_pb::{
    full_table_span, ComponentState, MaintainerBootstrapResponse, MaintainerPostBootstrapRequest,
    SchemaInfo, TableInfo, TableSpan, TableSpanStatus,
};

use crate::barrier::Barrier;
use crate::error::{MaintainerError, MaintainerResult};
use crate::messaging::{new_remove_dispatcher_message, MessageCenter};
use crate::operator::OperatorController;
use crate::replica::{ReplicationDb, SpanReplication};
use crate::scheduler::SchedulerController;
use crate::schema::SchemaStore;
use crate::split::{find_holes, SpanSplitter};
use crate::task::{spawn_periodic, TaskHandle};
use crate::tso::TsoClient;
use crate::watcher::NodeRegistry;

const OPERATOR_TICK_INTERVAL: Duration = Duration::from_millis(500);

const MOVE_TABLE_POLL_INTERVAL: Duration = Duration::from_millis(500);
const MOVE_TABLE_MAX_POLLS: usize = 30;

/// The control plane of one changefeed: composes the replication db, the
/// operator controller and the schedulers, drives bootstrap, and routes
/// heartbeat statuses.
pub struct Controller {
    bootstrapped: AtomicBool,
    changefeed_id: ChangefeedId,
    start_checkpoint_ts: u64,
    ddl_dispatcher_id: DispatcherId,

    db: Arc<ReplicationDb>,
    operator_controller: Arc<OperatorController>,
    scheduler_controller: SchedulerController,
    message_center: Arc<dyn MessageCenter>,
    nodes: Arc<NodeRegistry>,
    tso_client: Arc<dyn TsoClient>,
    schema_store: Arc<dyn SchemaStore>,
    splitter: Option<Arc<dyn SpanSplitter>>,
    enable_table_across_nodes: bool,
    config: ReplicaConfig,

    task_handles: Mutex<Vec<TaskHandle>>,
}

impl Controller {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        changefeed_id: ChangefeedId,
        checkpoint_ts: u64,
        tso_client: Arc<dyn TsoClient>,
        schema_store: Arc<dyn SchemaStore>,
        splitter: Arc<dyn SpanSplitter>,
        message_center: Arc<dyn MessageCenter>,
        nodes: Arc<NodeRegistry>,
        config: ReplicaConfig,
        ddl_span: Arc<SpanReplication>,
    ) -> Arc<Self> {
        let enable_table_across_nodes = config.scheduler.enable_table_across_nodes;
        let splitter = enable_table_across_nodes.then_some(splitter);
        let db = Arc::new(ReplicationDb::new(
            changefeed_id.clone(),
            ddl_span.clone(),
            enable_table_across_nodes,
        ));
        let operator_controller = Arc::new(OperatorController::new(
            changefeed_id.clone(),
            db.clone(),
            message_center.clone(),
            config.scheduler.batch_size,
        ));
        let scheduler_controller = SchedulerController::new(
            changefeed_id.clone(),
            &config.scheduler,
            db.clone(),
            operator_controller.clone(),
            nodes.clone(),
            splitter.clone(),
        );
        Arc::new(Self {
            bootstrapped: AtomicBool::new(false),
            changefeed_id,
            start_checkpoint_ts: checkpoint_ts,
            ddl_dispatcher_id: ddl_span.id,
            db,
            operator_controller,
            scheduler_controller,
            message_center,
            nodes,
            tso_client,
            schema_store,
            splitter,
            enable_table_across_nodes,
            config,
            task_handles: Mutex::new(Vec::new()),
        })
    }

    pub fn changefeed_id(&self) -> &ChangefeedId {
        &self.changefeed_id
    }

    pub fn ddl_dispatcher_id(&self) -> DispatcherId {
        self.ddl_dispatcher_id
    }

    /// Reconciles with whatever dispatchers the nodes already run, then
    /// starts the periodic machinery. Runs exactly once per maintainer.
    ///
    /// # Panics
    ///
    /// On a second call, or when no node reported a usable checkpoint:
    /// either means the maintainer's premise is broken and it must be
    /// rebuilt from scratch.
    pub async fn finish_bootstrap(
        self: &Arc<Self>,
        cached_resp: HashMap<NodeId, MaintainerBootstrapResponse>,
        is_mysql_compatible: bool,
    ) -> MaintainerResult<(Arc<Barrier>, MaintainerPostBootstrapRequest)> {
        if self.bootstrapped.swap(true, Ordering::SeqCst) {
            panic!("already bootstrapped, changefeed {}", self.changefeed_id);
        }
        tracing::info!(
            changefeed = %self.changefeed_id,
            nodes = cached_resp.len(),
            "all nodes have sent bootstrap response"
        );

        // 1. the real start ts is the furthest reported checkpoint
        let mut start_ts = 0;
        for (node, resp) in &cached_resp {
            tracing::info!(
                changefeed = %self.changefeed_id,
                node = %node,
                checkpoint_ts = resp.checkpoint_ts,
                spans = resp.spans.len(),
                "received bootstrap response"
            );
            start_ts = start_ts.max(resp.checkpoint_ts);
        }
        if start_ts == 0 {
            panic!(
                "can not find the start ts from the bootstrap response, changefeed {}",
                self.changefeed_id
            );
        }
        self.db.ddl_dispatcher().force_checkpoint_ts(start_ts);

        // 2. what should exist, according to the schema store at start ts
        let tables = self.load_tables(start_ts).await?;

        // 3. what does exist, according to the nodes
        let mut working_map: HashMap<i64, BTreeMap<TableSpan, Arc<SpanReplication>>> =
            HashMap::new();
        for (node, resp) in &cached_resp {
            for info in &resp.spans {
                let Some(id) = info.id.as_ref().map(DispatcherId::from_pb) else {
                    continue;
                };
                if id == self.ddl_dispatcher_id {
                    tracing::info!(
                        changefeed = %self.changefeed_id,
                        node = %node,
                        "skip table trigger event dispatcher"
                    );
                    continue;
                }
                let Some(span) = info.span.clone() else { continue };
                let status = TableSpanStatus {
                    id: info.id,
                    component_status: info.component_status,
                    checkpoint_ts: info.checkpoint_ts,
                    state: info.block_state.clone(),
                    event_size_per_second: 0.0,
                };
                let replication = SpanReplication::new_working(
                    self.changefeed_id.clone(),
                    id,
                    self.tso_client.clone(),
                    info.schema_id,
                    span.clone(),
                    &status,
                    node.clone(),
                );
                working_map
                    .entry(span.table_id)
                    .or_default()
                    .insert(span, replication);
            }
        }

        // 4. install reported spans, create what is missing
        let mut schema_infos: HashMap<i64, SchemaInfo> = HashMap::new();
        for table in &tables {
            let schema_info = schema_infos
                .entry(table.schema_id)
                .or_insert_with(|| new_schema_info(table, is_mysql_compatible));
            schema_info.tables.push(new_table_info(table, is_mysql_compatible));

            match working_map.remove(&table.table_id) {
                None => {
                    self.add_new_table(table.clone(), self.start_checkpoint_ts).await;
                }
                Some(table_map) => {
                    tracing::info!(
                        changefeed = %self.changefeed_id,
                        table_id = table.table_id,
                        spans = table_map.len(),
                        "table already working in other nodes"
                    );
                    for replication in table_map.values() {
                        self.db.add_replicating(replication.clone());
                    }
                    if self.enable_table_across_nodes {
                        let holes = find_holes(&table_map, &full_table_span(table.table_id));
                        self.add_new_spans(table.schema_id, holes, self.start_checkpoint_ts);
                    }
                }
            }
        }

        // a table can be reported but missing from the schema snapshot when
        // its drop ddl was written by the trigger dispatcher before every
        // node passed it; those dispatchers are simply ignored
        for table_id in working_map.keys() {
            tracing::warn!(
                changefeed = %self.changefeed_id,
                table_id,
                "found a table not in the initial table map"
            );
        }

        // 5. resume half-coordinated block events
        let barrier = Arc::new(Barrier::new(self.clone(), self.enable_table_across_nodes));
        barrier.handle_bootstrap_response(&cached_resp);

        // 6. start the periodic machinery
        let mut handles = self.scheduler_controller.start();
        let operator_controller = self.operator_controller.clone();
        handles.push(spawn_periodic(
            "operator-controller",
            OPERATOR_TICK_INTERVAL,
            move || operator_controller.execute(),
        ));
        self.task_handles.lock().extend(handles);

        let mut schemas = schema_infos.into_values().collect::<Vec<_>>();
        schemas.sort_by_key(|info| info.schema_id);
        Ok((
            barrier,
            MaintainerPostBootstrapRequest {
                changefeed_id: Some(self.changefeed_id.to_pb()),
                table_trigger_event_dispatcher_id: Some(self.ddl_dispatcher_id.to_pb()),
                schemas,
            },
        ))
    }

    /// Routes one heartbeat's span statuses: operator progress first, then
    /// orphan cleanup, then the db update.
    pub fn handle_status(&self, from: &NodeId, statuses: &[TableSpanStatus]) {
        for status in statuses {
            let Some(id) = status.id.as_ref().map(DispatcherId::from_pb) else {
                continue;
            };
            self.operator_controller
                .update_operator_status(id, from, status);
            let Some(span) = self.get_task(id) else {
                if status.component_status() != ComponentState::Working {
                    continue;
                }
                if !self.operator_controller.has_operator(id) {
                    // the span left the db first (e.g. a drop-table barrier),
                    // the dispatcher outlived it
                    tracing::warn!(
                        changefeed = %self.changefeed_id,
                        from = %from,
                        span = %id,
                        "no span found, remove it"
                    );
                    let _ = self.message_center.send_command(
                        new_remove_dispatcher_message(from.clone(), &self.changefeed_id, id),
                    );
                }
                continue;
            };
            let node_id = span.node_id();
            if node_id.as_ref() != Some(from) {
                // split brain; the next operator tick reconciles
                tracing::warn!(
                    changefeed = %self.changefeed_id,
                    from = %from,
                    node = ?node_id,
                    span = %id,
                    "node id not match"
                );
                continue;
            }
            self.db.update_status(&span, status);
        }
    }

    /// Creates the spans of a table this changefeed starts replicating,
    /// splitting across nodes when enabled. Adding a table twice is an
    /// expected race with the barrier and is ignored.
    pub async fn add_new_table(&self, table: Table, start_ts: u64) {
        if self.db.is_table_exists(table.table_id) {
            tracing::warn!(
                changefeed = %self.changefeed_id,
                schema_id = table.schema_id,
                table_id = table.table_id,
                "table already added, ignore"
            );
            return;
        }
        let table_span = full_table_span(table.table_id);
        let spans = match &self.splitter {
            Some(splitter) => {
                splitter
                    .split(&table_span, self.nodes.node_count().max(1))
                    .await
            }
            None => vec![table_span],
        };
        self.add_new_spans(table.schema_id, spans, start_ts);
    }

    fn add_new_spans(&self, schema_id: i64, spans: Vec<TableSpan>, start_ts: u64) {
        let replications = spans
            .into_iter()
            .map(|span| {
                SpanReplication::new(
                    self.changefeed_id.clone(),
                    DispatcherId::new(),
                    self.tso_client.clone(),
                    schema_id,
                    span,
                    start_ts,
                )
            })
            .collect::<Vec<_>>();
        self.db.add_absent(replications);
    }

    async fn load_tables(&self, start_ts: u64) -> MaintainerResult<Vec<Table>> {
        let filter = TableFilter::new(&self.config.filter);
        let tables = self
            .schema_store
            .all_physical_tables(start_ts, &filter)
            .await
            .map_err(MaintainerError::schema_store)?;
        tracing::info!(
            changefeed = %self.changefeed_id,
            count = tables.len(),
            "loaded tables from schema store"
        );
        Ok(tables)
    }

    pub fn get_task(&self, id: DispatcherId) -> Option<Arc<SpanReplication>> {
        self.db.get_task_by_id(id)
    }

    pub fn get_tasks_by_schema_id(&self, schema_id: i64) -> Vec<Arc<SpanReplication>> {
        self.db.get_tasks_by_schema_id(schema_id)
    }

    pub fn get_task_size_by_schema_id(&self, schema_id: i64) -> usize {
        self.db.get_task_size_by_schema_id(schema_id)
    }

    pub fn get_tasks_by_table_ids(&self, table_ids: &[i64]) -> Vec<Arc<SpanReplication>> {
        self.db.get_tasks_by_table_ids(table_ids)
    }

    pub fn get_all_tasks(&self) -> Vec<Arc<SpanReplication>> {
        self.db.get_all_tasks()
    }

    pub fn task_size(&self) -> usize {
        self.db.task_size()
    }

    pub fn get_task_size_by_node_id(&self, node: &NodeId) -> usize {
        self.db.get_task_size_by_node_id(node)
    }

    pub fn get_all_nodes(&self) -> Vec<NodeId> {
        self.nodes.alive_nodes()
    }

    pub fn remove_all_tasks(&self) {
        self.operator_controller.remove_all_tasks();
    }

    pub fn remove_tasks_by_schema_id(&self, schema_id: i64) {
        self.operator_controller.remove_tasks_by_schema_id(schema_id);
    }

    pub fn remove_tasks_by_table_ids(&self, table_ids: &[i64]) {
        self.operator_controller.remove_tasks_by_table_ids(table_ids);
    }

    /// Re-indexes a renamed table under its new schema.
    pub fn update_schema_id(&self, table_id: i64, new_schema_id: i64) {
        self.db.update_schema_id(table_id, new_schema_id);
    }

    /// A node left the cluster. Only the operator controller reacts right
    /// away; the db catches up as the converted operators finish.
    pub fn remove_node(&self, id: &NodeId) {
        self.operator_controller.on_node_removed(id);
    }

    /// True once every span replicates and no operator is in flight.
    pub fn schedule_finished(&self) -> bool {
        self.db.absent_size() == 0 && self.operator_controller.operator_size() == 0
    }

    pub fn operator_size(&self) -> usize {
        self.operator_controller.operator_size()
    }

    /// Cancels every periodic task; the components become inert.
    pub fn stop(&self) {
        for handle in self.task_handles.lock().iter_mut() {
            handle.cancel();
        }
    }

    /// Test helper: forces a whole (unsplit) table onto `target_node` and
    /// waits for the move to finish, polling on a fixed cadence with a hard
    /// budget of `MOVE_TABLE_MAX_POLLS` attempts.
    pub async fn move_table(&self, table_id: i64, target_node: NodeId) -> MaintainerResult<()> {
        if !self.db.is_table_exists(table_id) {
            return Err(MaintainerError::table_not_found(table_id));
        }
        if !self.nodes.is_alive(&target_node) {
            return Err(MaintainerError::node_not_found(target_node));
        }
        let replications = self.db.get_tasks_by_table_ids(&[table_id]);
        let [replication] = replications.as_slice() else {
            return Err(MaintainerError::table_not_found(table_id));
        };
        let Some(origin) = replication.node_id() else {
            return Err(MaintainerError::table_not_found(table_id));
        };
        if origin == target_node {
            return Ok(());
        }

        let op = self.operator_controller.new_move_operator(
            replication.clone(),
            origin,
            target_node,
        );
        let id = replication.id;
        self.operator_controller.add_operator(op);

        for attempt in 0..MOVE_TABLE_MAX_POLLS {
            if !self.operator_controller.has_operator(id) {
                return Ok(());
            }
            tracing::info!(attempt, "wait for move table operator to finish");
            tokio::time::sleep(MOVE_TABLE_POLL_INTERVAL).await;
        }
        Err(MaintainerError::move_table_timeout(table_id))
    }
}

fn new_schema_info(table: &Table, is_mysql_compatible: bool) -> SchemaInfo {
    let mut info = SchemaInfo::default();
    if is_mysql_compatible {
        info.schema_id = table.schema_id;
    } else {
        info.schema_name = table.schema_name.clone();
    }
    info
}

fn new_table_info(table: &Table, is_mysql_compatible: bool) -> TableInfo {
    let mut info = TableInfo::default();
    if is_mysql_compatible {
        info.table_id = table.table_id;
    } else {
        info.table_name = table.table_name.clone();
    }
    info
}

#[cfg(test)]
mod tests {
    use rivercdc_pb::{table_span_start_key, ScheduleAction};

    use crate::messaging::MaintainerMessage;
    use crate::test_utils::{
        bootstrap_response, new_controller, responses_from, working_status,
    };

    use super::*;

    fn empty_bootstrap(checkpoint_ts: u64) -> HashMap<NodeId, MaintainerBootstrapResponse> {
        responses_from(vec![("node-1", bootstrap_response(checkpoint_ts, vec![]))])
    }

    /// Adding one table with splitting off: one absent span, scheduled by
    /// the basic scheduler on its next tick.
    #[tokio::test(start_paused = true)]
    async fn test_add_one_table_no_split() {
        let ctx = new_controller(
            ReplicaConfig::default(),
            vec![Table::new(7, 42)],
            &["node-1"],
        );
        let (_, post) = ctx
            .controller
            .finish_bootstrap(empty_bootstrap(100), true)
            .await
            .unwrap();
        assert_eq!(post.schemas.len(), 1);
        assert_eq!(post.schemas[0].schema_id, 7);

        assert_eq!(ctx.controller.task_size(), 2);
        let tasks = ctx.controller.get_tasks_by_schema_id(7);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].span.table_id, 42);
        assert_eq!(tasks[0].checkpoint_ts(), 1);

        // the scheduler picks the absent span up and the operator rpc lands
        tokio::time::sleep(Duration::from_secs(2)).await;
        let span = &ctx.controller.get_tasks_by_table_ids(&[42])[0];
        assert_eq!(span.node_id(), Some(NodeId::from("node-1")));
        let create_sent = ctx.message_center.take_messages().iter().any(|msg| {
            matches!(
                &msg.message,
                MaintainerMessage::ScheduleDispatcherRequest(req)
                    if req.schedule_action() == ScheduleAction::Create
            )
        });
        assert!(create_sent);

        // the working report finishes the add operator
        ctx.controller
            .handle_status(&NodeId::from("node-1"), &[working_status(span.id, 120)]);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(ctx.controller.schedule_finished());
        assert_eq!(ctx.controller.db.get_replicating().len(), 1);
        ctx.controller.stop();
    }

    /// Renaming table 42 from schema 7 to schema 9 re-indexes it.
    #[tokio::test(start_paused = true)]
    async fn test_rename_across_schemas() {
        let ctx = new_controller(
            ReplicaConfig::default(),
            vec![Table::new(7, 42)],
            &["node-1"],
        );
        ctx.controller
            .finish_bootstrap(empty_bootstrap(100), true)
            .await
            .unwrap();

        ctx.controller.update_schema_id(42, 9);
        assert!(ctx.controller.get_tasks_by_schema_id(7).is_empty());
        assert_eq!(ctx.controller.get_tasks_by_schema_id(9).len(), 1);
        assert_eq!(ctx.controller.get_tasks_by_table_ids(&[42]).len(), 1);
        ctx.controller.stop();
    }

    /// Bootstrap installs reported spans as replicating and only creates
    /// what the schema store knows but no node runs.
    #[tokio::test(start_paused = true)]
    async fn test_bootstrap_reconciles_working_spans() {
        let ctx = new_controller(
            ReplicaConfig::default(),
            vec![Table::new(7, 42), Table::new(7, 43)],
            &["node-1", "node-2"],
        );
        let reported = DispatcherId::new();
        let responses = responses_from(vec![
            (
                "node-1",
                bootstrap_response(200, vec![(reported, 7, full_table_span(42), 180)]),
            ),
            ("node-2", bootstrap_response(150, vec![])),
        ]);
        ctx.controller.finish_bootstrap(responses, true).await.unwrap();

        // the reported span is replicating where it was found
        let span = ctx.controller.get_task(reported).unwrap();
        assert_eq!(span.node_id(), Some(NodeId::from("node-1")));
        assert_eq!(ctx.controller.db.get_replicating().len(), 1);
        // table 43 was created from scratch
        assert_eq!(ctx.controller.db.absent_size(), 1);
        // the ddl dispatcher checkpoint moved to the bootstrap start ts
        assert_eq!(ctx.controller.db.ddl_dispatcher().checkpoint_ts(), 200);
        ctx.controller.stop();
    }

    /// A dispatcher whose table is gone from the schema snapshot is ignored
    /// with a warning, not installed.
    #[tokio::test(start_paused = true)]
    async fn test_bootstrap_ignores_dropped_table_dispatcher() {
        let ctx = new_controller(
            ReplicaConfig::default(),
            vec![Table::new(7, 42)],
            &["node-1"],
        );
        let live = DispatcherId::new();
        let dropped = DispatcherId::new();
        let responses = responses_from(vec![(
            "node-1",
            bootstrap_response(
                100,
                vec![
                    (live, 7, full_table_span(42), 100),
                    (dropped, 7, full_table_span(99), 100),
                ],
            ),
        )]);
        ctx.controller.finish_bootstrap(responses, true).await.unwrap();
        assert!(ctx.controller.get_task(live).is_some());
        assert!(ctx.controller.get_task(dropped).is_none());
        assert_eq!(ctx.controller.task_size(), 2);
        ctx.controller.stop();
    }

    /// With splitting on, the gaps a bootstrap leaves in a table's key range
    /// are filled with fresh absent spans.
    #[tokio::test(start_paused = true)]
    async fn test_bootstrap_fills_holes_when_split_enabled() {
        let mut config = ReplicaConfig::default();
        config.scheduler.enable_table_across_nodes = true;
        let ctx = new_controller(config, vec![Table::new(7, 42)], &["node-1"]);
        let reported = DispatcherId::new();
        let mid = [table_span_start_key(42), b"m".to_vec()].concat();
        let head = TableSpan {
            table_id: 42,
            start_key: table_span_start_key(42),
            end_key: mid.clone(),
        };
        let responses = responses_from(vec![(
            "node-1",
            bootstrap_response(100, vec![(reported, 7, head, 100)]),
        )]);
        ctx.controller.finish_bootstrap(responses, true).await.unwrap();

        let spans = ctx.controller.get_tasks_by_table_ids(&[42]);
        assert_eq!(spans.len(), 2);
        assert_eq!(ctx.controller.db.get_replicating().len(), 1);
        assert_eq!(ctx.controller.db.absent_size(), 1);
        let hole = ctx.controller.db.get_absent(1).pop().unwrap();
        assert_eq!(hole.span.start_key, mid);
        ctx.controller.stop();
    }

    #[tokio::test(start_paused = true)]
    #[should_panic(expected = "already bootstrapped")]
    async fn test_double_bootstrap_panics() {
        let ctx = new_controller(ReplicaConfig::default(), vec![], &["node-1"]);
        ctx.controller
            .finish_bootstrap(empty_bootstrap(100), true)
            .await
            .unwrap();
        let _ = ctx.controller.finish_bootstrap(empty_bootstrap(100), true).await;
    }

    #[tokio::test(start_paused = true)]
    #[should_panic(expected = "can not find the start ts")]
    async fn test_bootstrap_requires_a_checkpoint() {
        let ctx = new_controller(ReplicaConfig::default(), vec![], &["node-1"]);
        let _ = ctx.controller.finish_bootstrap(empty_bootstrap(0), true).await;
    }

    /// An unknown working dispatcher with no operator gets told to remove
    /// itself; a stopped one triggers nothing.
    #[tokio::test(start_paused = true)]
    async fn test_orphan_dispatcher_cleanup() {
        let ctx = new_controller(ReplicaConfig::default(), vec![], &["node-1"]);
        ctx.controller
            .finish_bootstrap(empty_bootstrap(100), true)
            .await
            .unwrap();
        ctx.message_center.take_messages();

        let orphan = DispatcherId::new();
        let node = NodeId::from("node-1");
        ctx.controller.handle_status(&node, &[working_status(orphan, 100)]);
        let sent = ctx.message_center.take_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, node);
        let MaintainerMessage::RemoveDispatcherRequest(req) = &sent[0].message else {
            panic!("expected remove dispatcher request");
        };
        assert_eq!(req.dispatcher_id, Some(orphan.to_pb()));

        // the follow-up stopped report is silent
        let mut stopped = working_status(orphan, 100);
        stopped.set_component_status(ComponentState::Stopped);
        ctx.controller.handle_status(&node, &[stopped]);
        assert!(ctx.message_center.take_messages().is_empty());
        ctx.controller.stop();
    }

    /// A report from a node that does not own the span is logged and
    /// dropped; the recorded state stays put.
    #[tokio::test(start_paused = true)]
    async fn test_status_from_wrong_node_is_ignored() {
        let ctx = new_controller(
            ReplicaConfig::default(),
            vec![Table::new(7, 42)],
            &["node-1"],
        );
        let reported = DispatcherId::new();
        let responses = responses_from(vec![(
            "node-1",
            bootstrap_response(100, vec![(reported, 7, full_table_span(42), 100)]),
        )]);
        ctx.controller.finish_bootstrap(responses, true).await.unwrap();

        let span = ctx.controller.get_task(reported).unwrap();
        let before = span.checkpoint_ts();
        ctx.controller
            .handle_status(&NodeId::from("node-9"), &[working_status(reported, 999)]);
        assert_eq!(span.checkpoint_ts(), before);
        ctx.controller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_table() {
        let ctx = new_controller(
            ReplicaConfig::default(),
            vec![Table::new(7, 42)],
            &["node-1", "node-2"],
        );
        let reported = DispatcherId::new();
        let responses = responses_from(vec![(
            "node-1",
            bootstrap_response(100, vec![(reported, 7, full_table_span(42), 100)]),
        )]);
        ctx.controller.finish_bootstrap(responses, true).await.unwrap();

        let controller = ctx.controller.clone();
        let mover = tokio::spawn(async move {
            controller.move_table(42, NodeId::from("node-2")).await
        });

        // the origin stops, then the destination comes up
        tokio::time::sleep(Duration::from_millis(700)).await;
        let mut stopped = working_status(reported, 110);
        stopped.set_component_status(ComponentState::Stopped);
        ctx.controller.handle_status(&NodeId::from("node-1"), &[stopped]);
        tokio::time::sleep(Duration::from_millis(700)).await;
        ctx.controller
            .handle_status(&NodeId::from("node-2"), &[working_status(reported, 120)]);

        mover.await.unwrap().unwrap();
        let span = ctx.controller.get_task(reported).unwrap();
        assert_eq!(span.node_id(), Some(NodeId::from("node-2")));
        ctx.controller.stop();
    }

    /// Nothing answers the move: the helper gives up with the typed timeout
    /// after its 30-attempt budget.
    #[tokio::test(start_paused = true)]
    async fn test_move_table_timeout() {
        let ctx = new_controller(
            ReplicaConfig::default(),
            vec![Table::new(7, 42)],
            &["node-1", "node-2"],
        );
        let reported = DispatcherId::new();
        let responses = responses_from(vec![(
            "node-1",
            bootstrap_response(100, vec![(reported, 7, full_table_span(42), 100)]),
        )]);
        ctx.controller.finish_bootstrap(responses, true).await.unwrap();
        // silence the operator machinery so the move never completes
        ctx.controller.stop();

        let err = ctx
            .controller
            .move_table(42, NodeId::from("node-2"))
            .await
            .unwrap_err();
        assert!(err.is_move_table_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_table_rejects_unknown_table_and_node() {
        let ctx = new_controller(ReplicaConfig::default(), vec![], &["node-1"]);
        ctx.controller
            .finish_bootstrap(empty_bootstrap(100), true)
            .await
            .unwrap();
        assert!(ctx
            .controller
            .move_table(42, NodeId::from("node-1"))
            .await
            .is_err());
        ctx.controller.stop();

        let ctx = new_controller(
            ReplicaConfig::default(),
            vec![Table::new(7, 42)],
            &["node-1"],
        );
        let reported = DispatcherId::new();
        let responses = responses_from(vec![(
            "node-1",
            bootstrap_response(100, vec![(reported, 7, full_table_span(42), 100)]),
        )]);
        ctx.controller.finish_bootstrap(responses, true).await.unwrap();
        assert!(ctx
            .controller
            .move_table(42, NodeId::from("node-9"))
            .await
            .is_err());
        ctx.controller.stop();
    }

    /// Node removal converts the in-flight work and frees its spans.
    #[tokio::test(start_paused = true)]
    async fn test_remove_node_returns_spans_to_absent() {
        let ctx = new_controller(
            ReplicaConfig::default(),
            vec![Table::new(7, 42)],
            &["node-1", "node-2"],
        );
        let reported = DispatcherId::new();
        let responses = responses_from(vec![(
            "node-1",
            bootstrap_response(100, vec![(reported, 7, full_table_span(42), 100)]),
        )]);
        ctx.controller.finish_bootstrap(responses, true).await.unwrap();

        ctx.nodes.remove_node(&NodeId::from("node-1"));
        ctx.controller.remove_node(&NodeId::from("node-1"));
        let span = ctx.controller.get_task(reported).unwrap();
        assert!(span.node_id().is_none());
        assert_eq!(ctx.controller.db.absent_size(), 1);
        ctx.controller.stop();
    }
}
