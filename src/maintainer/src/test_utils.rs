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

//! Mock collaborators and builders shared by the crate's tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rivercdc_common::{ChangefeedId, DispatcherId, NodeId, ReplicaConfig, Table, TableFilter};
use rivercdc_pb::{
    full_table_span, BlockState, ComponentState, InfluenceType, InfluencedTables,
    MaintainerBootstrapResponse, TableSpan, TableSpanStatus,
};

use crate::controller::Controller;
use crate::error::MaintainerResult;
use crate::messaging::{MessageCenter, TargetMessage};
use crate::replica::{ReplicationDb, SpanReplication};
use crate::schema::SchemaStore;
use crate::split::SpanSplitter;
use crate::tso::TsoClient;
use crate::watcher::{NodeInfo, NodeRegistry};

pub struct MockTsoClient;

#[async_trait]
impl TsoClient for MockTsoClient {
    async fn get_ts(&self) -> anyhow::Result<(i64, i64)> {
        Ok((0, 0))
    }
}

pub fn mock_tso_client() -> Arc<dyn TsoClient> {
    Arc::new(MockTsoClient)
}

/// Captures every outbound message for assertions.
#[derive(Default)]
pub struct MockMessageCenter {
    messages: Mutex<Vec<TargetMessage>>,
}

impl MockMessageCenter {
    pub fn take_messages(&self) -> Vec<TargetMessage> {
        std::mem::take(&mut *self.messages.lock())
    }
}

impl MessageCenter for MockMessageCenter {
    fn send_command(&self, msg: TargetMessage) -> MaintainerResult<()> {
        self.messages.lock().push(msg);
        Ok(())
    }
}

/// Serves a fixed table list, applying the filter like the real store does.
#[derive(Default)]
pub struct MockSchemaStore {
    pub tables: Vec<Table>,
}

impl MockSchemaStore {
    pub fn new(tables: Vec<Table>) -> Self {
        Self { tables }
    }
}

#[async_trait]
impl SchemaStore for MockSchemaStore {
    async fn all_physical_tables(
        &self,
        _snapshot_ts: u64,
        filter: &TableFilter,
    ) -> anyhow::Result<Vec<Table>> {
        Ok(self
            .tables
            .iter()
            .filter(|t| filter.matches(&t.schema_name, &t.table_name))
            .cloned()
            .collect())
    }
}

/// Splits any span in two at `start_key ∥ 0x80`; enough to exercise the
/// split paths without region metadata.
pub struct EvenSplitter;

#[async_trait]
impl SpanSplitter for EvenSplitter {
    async fn split(&self, span: &TableSpan, _capture_count: usize) -> Vec<TableSpan> {
        let mut mid = span.start_key.clone();
        mid.push(0x80);
        vec![
            TableSpan {
                table_id: span.table_id,
                start_key: span.start_key.clone(),
                end_key: mid.clone(),
            },
            TableSpan {
                table_id: span.table_id,
                start_key: mid,
                end_key: span.end_key.clone(),
            },
        ]
    }
}

pub fn even_splitter() -> Arc<dyn SpanSplitter> {
    Arc::new(EvenSplitter)
}

/// Never splits; the whole-table span stays as is.
pub struct PassthroughSplitter;

#[async_trait]
impl SpanSplitter for PassthroughSplitter {
    async fn split(&self, span: &TableSpan, _capture_count: usize) -> Vec<TableSpan> {
        vec![span.clone()]
    }
}

pub fn passthrough_splitter() -> Arc<dyn SpanSplitter> {
    Arc::new(PassthroughSplitter)
}

pub fn test_changefeed_id() -> ChangefeedId {
    ChangefeedId::in_default_namespace("test")
}

/// A fresh db whose table trigger dispatcher lives on `node-1`.
pub fn new_db(enable_table_across_nodes: bool) -> ReplicationDb {
    let ddl_span = SpanReplication::new_ddl_span(
        test_changefeed_id(),
        DispatcherId::new(),
        mock_tso_client(),
        1,
        NodeId::from("node-1"),
    );
    ReplicationDb::new(test_changefeed_id(), ddl_span, enable_table_across_nodes)
}

/// A whole-table span replication, not yet added to the db.
pub fn new_span(
    _db: &ReplicationDb,
    schema_id: i64,
    table_id: i64,
    checkpoint_ts: u64,
) -> Arc<SpanReplication> {
    SpanReplication::new(
        test_changefeed_id(),
        DispatcherId::new(),
        mock_tso_client(),
        schema_id,
        full_table_span(table_id),
        checkpoint_ts,
    )
}

pub fn working_status(id: DispatcherId, checkpoint_ts: u64) -> TableSpanStatus {
    let mut status = TableSpanStatus {
        id: Some(id.to_pb()),
        checkpoint_ts,
        ..Default::default()
    };
    status.set_component_status(ComponentState::Working);
    status
}

/// A blocked report for a `Normal`-influence event over `table_ids`.
pub fn blocked_status(
    id: DispatcherId,
    checkpoint_ts: u64,
    block_ts: u64,
    table_ids: Vec<i64>,
) -> TableSpanStatus {
    let mut status = working_status(id, checkpoint_ts);
    status.state = Some(BlockState {
        is_blocked: true,
        block_ts,
        block_tables: Some(InfluencedTables {
            influence_type: InfluenceType::Normal as i32,
            table_ids,
            schema_id: 0,
        }),
        need_dropped_tables: None,
        need_added_tables: Vec::new(),
        updated_schemas: Vec::new(),
        is_sync_point: false,
    });
    status
}

/// A blocked report whose influence covers the whole changefeed.
pub fn blocked_status_all(id: DispatcherId, checkpoint_ts: u64, block_ts: u64) -> TableSpanStatus {
    let mut status = working_status(id, checkpoint_ts);
    status.state = Some(BlockState {
        is_blocked: true,
        block_ts,
        block_tables: Some(InfluencedTables {
            influence_type: InfluenceType::All as i32,
            table_ids: Vec::new(),
            schema_id: 0,
        }),
        need_dropped_tables: None,
        need_added_tables: Vec::new(),
        updated_schemas: Vec::new(),
        is_sync_point: false,
    });
    status
}

/// A non-blocked report at the event's ts: the dispatcher acknowledges the
/// write or pass.
pub fn ack_status(id: DispatcherId, checkpoint_ts: u64, block_ts: u64) -> TableSpanStatus {
    let mut status = working_status(id, checkpoint_ts);
    status.state = Some(BlockState {
        is_blocked: false,
        block_ts,
        block_tables: None,
        need_dropped_tables: None,
        need_added_tables: Vec::new(),
        updated_schemas: Vec::new(),
        is_sync_point: false,
    });
    status
}

pub fn heartbeat(statuses: Vec<TableSpanStatus>) -> rivercdc_pb::HeartBeatRequest {
    rivercdc_pb::HeartBeatRequest {
        changefeed_id: Some(test_changefeed_id().to_pb()),
        watermark: 0,
        statuses,
    }
}

pub struct TestContext {
    pub controller: Arc<Controller>,
    pub message_center: Arc<MockMessageCenter>,
    pub nodes: Arc<NodeRegistry>,
}

/// A controller with mock collaborators; `alive` nodes are registered and
/// the table trigger dispatcher lives on the first of them.
pub fn new_controller(
    config: ReplicaConfig,
    tables: Vec<Table>,
    alive: &[&str],
) -> TestContext {
    let nodes = Arc::new(NodeRegistry::new());
    for name in alive {
        nodes.upsert_node(NodeInfo {
            id: NodeId::from(*name),
            advertise_addr: String::new(),
        });
    }
    let message_center = Arc::new(MockMessageCenter::default());
    let ddl_span = SpanReplication::new_ddl_span(
        test_changefeed_id(),
        DispatcherId::new(),
        mock_tso_client(),
        1,
        NodeId::from(alive[0]),
    );
    let controller = Controller::new(
        test_changefeed_id(),
        1,
        mock_tso_client(),
        Arc::new(MockSchemaStore::new(tables)),
        passthrough_splitter(),
        message_center.clone(),
        nodes.clone(),
        config,
        ddl_span,
    );
    TestContext {
        controller,
        message_center,
        nodes,
    }
}

/// One bootstrap response covering `spans`, each already working.
pub fn bootstrap_response(
    checkpoint_ts: u64,
    spans: Vec<(DispatcherId, i64, TableSpan, u64)>,
) -> MaintainerBootstrapResponse {
    MaintainerBootstrapResponse {
        changefeed_id: Some(test_changefeed_id().to_pb()),
        checkpoint_ts,
        spans: spans
            .into_iter()
            .map(|(id, schema_id, span, checkpoint_ts)| {
                let mut info = rivercdc_pb::BootstrapTableSpan {
                    id: Some(id.to_pb()),
                    schema_id,
                    span: Some(span),
                    checkpoint_ts,
                    ..Default::default()
                };
                info.set_component_status(ComponentState::Working);
                info
            })
            .collect(),
    }
}

/// Shorthand for a one-node response map.
pub fn responses_from(
    entries: Vec<(&str, MaintainerBootstrapResponse)>,
) -> HashMap<NodeId, MaintainerBootstrapResponse> {
    entries
        .into_iter()
        .map(|(node, resp)| (NodeId::from(node), resp))
        .collect()
}
