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
use std::time::Duration;

use rivercdc_common::{ChangefeedId, DispatcherId, NodeId};
use rivercdc_pb::{
    Action, BlockState, DispatcherAction, DispatcherStatus, HeartBeatResponse, InfluenceType,
    InfluencedDispatchers, InfluencedTables, DDL_SPAN_TABLE_ID,
};

use crate::controller::Controller;
use crate::messaging::{MaintainerMessage, TargetMessage, Topic};
use crate::range_checker::{RangeChecker, TableCountChecker, TableSpanRangeChecker};

const RESEND_INTERVAL: Duration = Duration::from_secs(1);
const WARNING_INTERVAL: Duration = Duration::from_secs(10);

/// One blocking event (a DDL or a sync point) reported by many dispatchers.
/// All of them pause at `commit_ts`; one writer applies the effect
/// downstream, the rest pass through once the writer is done.
pub struct BarrierEvent {
    changefeed_id: ChangefeedId,
    controller: Arc<Controller>,
    commit_ts: u64,
    is_sync_point: bool,
    selected: bool,
    writer_dispatcher: Option<DispatcherId>,
    writer_dispatcher_advanced: bool,
    /// The table trigger event dispatcher is among the blocked set, so it
    /// must be the writer even for a `Normal` influence.
    table_trigger_dispatcher_related: bool,

    blocked_dispatchers: InfluencedTables,
    drop_dispatchers: Option<InfluencedTables>,
    new_tables: Vec<rivercdc_pb::Table>,
    schema_id_change: Vec<rivercdc_pb::SchemaIdChange>,

    /// Before selection: which blocked dispatchers reported. After
    /// selection (the checker is reset): which dispatchers acknowledged the
    /// write or pass.
    range_checker: Box<dyn RangeChecker>,
    last_resend_time: Option<tokio::time::Instant>,
    last_warning_log_time: tokio::time::Instant,
}

impl BarrierEvent {
    pub(super) fn new(
        changefeed_id: ChangefeedId,
        controller: Arc<Controller>,
        state: &BlockState,
        dynamic_split_enabled: bool,
    ) -> Self {
        let blocked_dispatchers = state
            .block_tables
            .clone()
            .expect("block state without blocked tables");
        let range_checker = new_range_checker(&controller, &blocked_dispatchers, dynamic_split_enabled);
        let event = Self {
            changefeed_id: changefeed_id.clone(),
            controller,
            commit_ts: state.block_ts,
            is_sync_point: state.is_sync_point,
            selected: false,
            writer_dispatcher: None,
            writer_dispatcher_advanced: false,
            table_trigger_dispatcher_related: false,
            blocked_dispatchers,
            drop_dispatchers: state.need_dropped_tables.clone(),
            new_tables: state.need_added_tables.clone(),
            schema_id_change: state.updated_schemas.clone(),
            range_checker,
            last_resend_time: None,
            last_warning_log_time: tokio::time::Instant::now(),
        };
        tracing::info!(
            changefeed = %changefeed_id,
            block_ts = event.commit_ts,
            sync_point = event.is_sync_point,
            influence = event.blocked_dispatchers.influence_type().as_str_name(),
            "new block event is created"
        );
        event
    }

    pub fn commit_ts(&self) -> u64 {
        self.commit_ts
    }

    pub fn is_sync_point(&self) -> bool {
        self.is_sync_point
    }

    pub fn selected(&self) -> bool {
        self.selected
    }

    pub fn writer_dispatcher(&self) -> Option<DispatcherId> {
        self.writer_dispatcher
    }

    pub fn is_writer(&self, id: DispatcherId) -> bool {
        self.writer_dispatcher == Some(id)
    }

    pub fn writer_advanced(&self) -> bool {
        self.writer_dispatcher_advanced
    }

    pub(super) fn set_table_trigger_related(&mut self) {
        self.table_trigger_dispatcher_related = true;
    }

    /// Records one dispatcher's report against the coverage checker.
    pub(super) fn mark_dispatcher_event_done(&mut self, dispatcher_id: DispatcherId) {
        let Some(span) = self.controller.get_task(dispatcher_id) else {
            tracing::warn!(
                changefeed = %self.changefeed_id,
                dispatcher = %dispatcher_id,
                "dispatcher not found, ignore"
            );
            return;
        };
        self.range_checker
            .add_sub_range(span.span.table_id, &span.span.start_key, &span.span.end_key);
    }

    pub(super) fn all_dispatcher_reported(&self) -> bool {
        self.range_checker.is_fully_covered()
    }

    /// All blocked dispatchers reached `commit_ts`: elect the writer, reset
    /// the checker (starting the acknowledgement round) and build the write
    /// action. Returns `None` when the writer's node is unknown; the resend
    /// tick retries then.
    pub(super) fn select_writer(&mut self, reported: &[DispatcherId]) -> Option<TargetMessage> {
        let writer = match self.blocked_dispatchers.influence_type() {
            InfluenceType::Db | InfluenceType::All => {
                // the table trigger event dispatcher writes every multi-table ddl
                self.controller.ddl_dispatcher_id()
            }
            InfluenceType::Normal => {
                if self.table_trigger_dispatcher_related {
                    self.controller.ddl_dispatcher_id()
                } else {
                    *reported.last().expect("writer election with no reporters")
                }
            }
        };

        self.range_checker.reset();
        self.selected = true;
        self.writer_dispatcher = Some(writer);
        // the write action goes out with this selection
        self.last_resend_time = Some(tokio::time::Instant::now());
        tracing::info!(
            changefeed = %self.changefeed_id,
            dispatcher = %writer,
            commit_ts = self.commit_ts,
            influence = self.blocked_dispatchers.influence_type().as_str_name(),
            "all dispatchers reported, select one to write"
        );
        self.writer_action_message()
    }

    /// The write action is visible downstream; the writer's span, like every
    /// other blocked one, now owes an acknowledgement.
    pub(super) fn set_writer_advanced(&mut self) {
        self.writer_dispatcher_advanced = true;
        if let Some(writer) = self.writer_dispatcher {
            self.mark_dispatcher_event_done(writer);
        }
    }

    /// Applies the scheduling side effects of the event: dropped tables,
    /// created tables, schema moves.
    pub(super) fn schedule_block_event(&self) {
        if let Some(dropped) = &self.drop_dispatchers {
            match dropped.influence_type() {
                InfluenceType::Db => {
                    tracing::info!(
                        changefeed = %self.changefeed_id,
                        commit_ts = self.commit_ts,
                        schema_id = dropped.schema_id,
                        "remove tables of schema"
                    );
                    self.controller.remove_tasks_by_schema_id(dropped.schema_id);
                }
                InfluenceType::Normal => {
                    tracing::info!(
                        changefeed = %self.changefeed_id,
                        commit_ts = self.commit_ts,
                        tables = ?dropped.table_ids,
                        "remove tables"
                    );
                    self.controller.remove_tasks_by_table_ids(&dropped.table_ids);
                }
                InfluenceType::All => {
                    tracing::info!(
                        changefeed = %self.changefeed_id,
                        commit_ts = self.commit_ts,
                        "remove all tables by barrier"
                    );
                    self.controller.remove_all_tasks();
                }
            }
        }

        for add in &self.new_tables {
            tracing::info!(
                changefeed = %self.changefeed_id,
                commit_ts = self.commit_ts,
                schema_id = add.schema_id,
                table_id = add.table_id,
                "add new table"
            );
            let controller = self.controller.clone();
            let table = rivercdc_common::Table::new(add.schema_id, add.table_id);
            let start_ts = self.commit_ts;
            // the splitter may suspend, keep it off the transport task
            tokio::spawn(async move {
                controller.add_new_table(table, start_ts).await;
            });
        }

        for change in &self.schema_id_change {
            tracing::info!(
                changefeed = %self.changefeed_id,
                commit_ts = self.commit_ts,
                table_id = change.table_id,
                old_schema_id = change.old_schema_id,
                new_schema_id = change.new_schema_id,
                "update schema id"
            );
            self.controller
                .update_schema_id(change.table_id, change.new_schema_id);
        }
    }

    /// Builds the pass actions for every blocked dispatcher except the
    /// writer, one message per destination node.
    pub(super) fn pass_action_messages(&self) -> Vec<TargetMessage> {
        let mut by_node: HashMap<NodeId, TargetMessage> = HashMap::new();
        match self.blocked_dispatchers.influence_type() {
            InfluenceType::Db => {
                for task in self
                    .controller
                    .get_tasks_by_schema_id(self.blocked_dispatchers.schema_id)
                {
                    let Some(node) = task.node_id() else { continue };
                    by_node
                        .entry(node.clone())
                        .or_insert_with(|| self.new_pass_action_message(node));
                }
            }
            InfluenceType::All => {
                for node in self.controller.get_all_nodes() {
                    by_node
                        .entry(node.clone())
                        .or_insert_with(|| self.new_pass_action_message(node));
                }
            }
            InfluenceType::Normal => {
                for task in self
                    .controller
                    .get_tasks_by_table_ids(&self.blocked_dispatchers.table_ids)
                {
                    if self.is_writer(task.id) {
                        continue;
                    }
                    let Some(node) = task.node_id() else { continue };
                    let msg = by_node
                        .entry(node.clone())
                        .or_insert_with(|| self.new_pass_action_message(node));
                    let MaintainerMessage::HeartBeatResponse(resp) = &mut msg.message else {
                        unreachable!("pass action is always a heartbeat response");
                    };
                    resp.dispatcher_statuses[0]
                        .influenced_dispatchers
                        .as_mut()
                        .expect("pass action carries influenced dispatchers")
                        .dispatcher_ids
                        .push(task.id.to_pb());
                }
            }
        }
        by_node.into_values().collect()
    }

    /// Re-pushes the pending action, at most once per second. A diagnostic
    /// warning citing the current coverage fires every ten seconds until the
    /// event resolves.
    pub(super) fn resend(&mut self) -> Vec<TargetMessage> {
        let now = tokio::time::Instant::now();
        if now.duration_since(self.last_warning_log_time) > WARNING_INTERVAL {
            tracing::warn!(
                changefeed = %self.changefeed_id,
                commit_ts = self.commit_ts,
                sync_point = self.is_sync_point,
                selected = self.selected,
                writer_advanced = self.writer_dispatcher_advanced,
                coverage = self.range_checker.detail(),
                "barrier event is not resolved"
            );
            self.last_warning_log_time = now;
        }

        if let Some(last) = self.last_resend_time {
            if now.duration_since(last) < RESEND_INTERVAL {
                return Vec::new();
            }
        }
        // still collecting block reports, nothing to push
        if !self.selected {
            return Vec::new();
        }
        self.last_resend_time = Some(now);

        if !self.writer_dispatcher_advanced {
            self.writer_action_message().into_iter().collect()
        } else {
            self.pass_action_messages()
        }
    }

    fn writer_action_message(&self) -> Option<TargetMessage> {
        let writer = self.writer_dispatcher?;
        let node = match self.controller.get_task(writer).and_then(|t| t.node_id()) {
            Some(node) => node,
            None => {
                tracing::warn!(
                    changefeed = %self.changefeed_id,
                    commit_ts = self.commit_ts,
                    sync_point = self.is_sync_point,
                    "writer dispatcher not found"
                );
                return None;
            }
        };
        Some(TargetMessage::new(
            node,
            Topic::HeartbeatCollector,
            MaintainerMessage::HeartBeatResponse(HeartBeatResponse {
                changefeed_id: Some(self.changefeed_id.to_pb()),
                dispatcher_statuses: vec![DispatcherStatus {
                    influenced_dispatchers: Some(InfluencedDispatchers {
                        influence_type: InfluenceType::Normal as i32,
                        dispatcher_ids: vec![writer.to_pb()],
                        schema_id: 0,
                        exclude_dispatcher_id: None,
                    }),
                    action: Some(self.action(Action::Write)),
                }],
            }),
        ))
    }

    fn new_pass_action_message(&self, node: NodeId) -> TargetMessage {
        let exclude = self
            .writer_dispatcher
            .map(|writer| writer.to_pb())
            .filter(|_| {
                self.blocked_dispatchers.influence_type() != InfluenceType::Normal
            });
        TargetMessage::new(
            node,
            Topic::HeartbeatCollector,
            MaintainerMessage::HeartBeatResponse(HeartBeatResponse {
                changefeed_id: Some(self.changefeed_id.to_pb()),
                dispatcher_statuses: vec![DispatcherStatus {
                    influenced_dispatchers: Some(InfluencedDispatchers {
                        influence_type: self.blocked_dispatchers.influence_type,
                        dispatcher_ids: Vec::new(),
                        schema_id: self.blocked_dispatchers.schema_id,
                        exclude_dispatcher_id: exclude,
                    }),
                    action: Some(self.action(Action::Pass)),
                }],
            }),
        )
    }

    fn action(&self, action: Action) -> DispatcherAction {
        DispatcherAction {
            action: action as i32,
            commit_ts: self.commit_ts,
            is_sync_point: self.is_sync_point,
        }
    }
}

/// Picks the coverage strategy for one event from its influence scope. With
/// splitting enabled only key ranges prove coverage; otherwise counting
/// distinct tables is enough. Db and All scopes always include the table
/// trigger event dispatcher, hence the sentinel table id / the +1.
fn new_range_checker(
    controller: &Arc<Controller>,
    blocked: &InfluencedTables,
    dynamic_split_enabled: bool,
) -> Box<dyn RangeChecker> {
    match blocked.influence_type() {
        InfluenceType::Normal => {
            if dynamic_split_enabled {
                Box::new(TableSpanRangeChecker::new(blocked.table_ids.iter().copied()))
            } else {
                Box::new(TableCountChecker::new(blocked.table_ids.len()))
            }
        }
        InfluenceType::Db => {
            if dynamic_split_enabled {
                let mut table_ids = controller
                    .get_tasks_by_schema_id(blocked.schema_id)
                    .iter()
                    .map(|task| task.span.table_id)
                    .collect::<Vec<_>>();
                table_ids.push(DDL_SPAN_TABLE_ID);
                Box::new(TableSpanRangeChecker::new(table_ids))
            } else {
                Box::new(TableCountChecker::new(
                    controller.get_task_size_by_schema_id(blocked.schema_id) + 1,
                ))
            }
        }
        InfluenceType::All => {
            if dynamic_split_enabled {
                let mut table_ids = controller
                    .get_all_tasks()
                    .iter()
                    .map(|task| task.span.table_id)
                    .collect::<Vec<_>>();
                table_ids.push(DDL_SPAN_TABLE_ID);
                Box::new(TableSpanRangeChecker::new(table_ids))
            } else {
                Box::new(TableCountChecker::new(controller.task_size()))
            }
        }
    }
}
