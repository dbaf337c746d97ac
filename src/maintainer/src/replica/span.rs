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

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rivercdc_common::{ChangefeedId, DispatcherId, NodeId};
use rivercdc_pb::{
    ddl_span, BlockState, ComponentState, TableSpan, TableSpanStatus, DDL_SPAN_TABLE_ID,
};

use crate::tso::TsoClient;

use super::group::GroupId;

/// The last state a dispatcher reported for its span.
#[derive(Clone, Debug)]
pub struct ReplicationStatus {
    pub component_status: ComponentState,
    pub checkpoint_ts: u64,
    pub block_state: Option<BlockState>,
    pub event_size_per_second: f32,
}

impl ReplicationStatus {
    fn initial(checkpoint_ts: u64) -> Self {
        Self {
            component_status: ComponentState::Absent,
            checkpoint_ts,
            block_state: None,
            event_size_per_second: 0.0,
        }
    }
}

/// The unit of scheduling: one table span of one changefeed, owned by at
/// most one dispatcher at a time. Handles are shared (`Arc`) between the
/// replication db, operators and the barrier, so the mutable parts sit
/// behind their own locks; every multi-field update still goes through the
/// db's lock.
pub struct SpanReplication {
    pub changefeed_id: ChangefeedId,
    pub id: DispatcherId,
    pub span: TableSpan,
    group_id: GroupId,
    tso_client: Arc<dyn TsoClient>,
    schema_id: Mutex<i64>,
    node_id: RwLock<Option<NodeId>>,
    status: Mutex<ReplicationStatus>,
}

impl SpanReplication {
    /// A span that is not scheduled anywhere yet.
    pub fn new(
        changefeed_id: ChangefeedId,
        id: DispatcherId,
        tso_client: Arc<dyn TsoClient>,
        schema_id: i64,
        span: TableSpan,
        checkpoint_ts: u64,
    ) -> Arc<Self> {
        Arc::new(Self {
            changefeed_id,
            id,
            group_id: GroupId::for_span(&span),
            span,
            tso_client,
            schema_id: Mutex::new(schema_id),
            node_id: RwLock::new(None),
            status: Mutex::new(ReplicationStatus::initial(checkpoint_ts)),
        })
    }

    /// A span reported by a bootstrap response: already working on `node`.
    pub fn new_working(
        changefeed_id: ChangefeedId,
        id: DispatcherId,
        tso_client: Arc<dyn TsoClient>,
        schema_id: i64,
        span: TableSpan,
        status: &TableSpanStatus,
        node: NodeId,
    ) -> Arc<Self> {
        let replication = Self::new(
            changefeed_id,
            id,
            tso_client,
            schema_id,
            span,
            status.checkpoint_ts,
        );
        replication.update_status(status);
        *replication.node_id.write() = Some(node);
        replication
    }

    /// The table trigger event dispatcher's span, always present and never
    /// balanced. `node` is where the trigger dispatcher runs.
    pub fn new_ddl_span(
        changefeed_id: ChangefeedId,
        id: DispatcherId,
        tso_client: Arc<dyn TsoClient>,
        checkpoint_ts: u64,
        node: NodeId,
    ) -> Arc<Self> {
        let replication = Self::new(
            changefeed_id,
            id,
            tso_client,
            DDL_SPAN_TABLE_ID,
            ddl_span(),
            checkpoint_ts,
        );
        *replication.node_id.write() = Some(node);
        replication
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn schema_id(&self) -> i64 {
        *self.schema_id.lock()
    }

    pub fn set_schema_id(&self, schema_id: i64) {
        *self.schema_id.lock() = schema_id;
    }

    pub fn node_id(&self) -> Option<NodeId> {
        self.node_id.read().clone()
    }

    pub fn set_node_id(&self, node: Option<NodeId>) {
        *self.node_id.write() = node;
    }

    pub fn is_scheduled(&self) -> bool {
        self.node_id.read().is_some()
    }

    pub fn status(&self) -> ReplicationStatus {
        self.status.lock().clone()
    }

    pub fn checkpoint_ts(&self) -> u64 {
        self.status.lock().checkpoint_ts
    }

    pub fn is_working(&self) -> bool {
        self.status.lock().component_status == ComponentState::Working
    }

    pub fn tso_client(&self) -> Arc<dyn TsoClient> {
        self.tso_client.clone()
    }

    /// Applies a heartbeat observation. A stale report (checkpoint behind
    /// what we already recorded) only refreshes the component state.
    pub fn update_status(&self, status: &TableSpanStatus) {
        let mut current = self.status.lock();
        if status.checkpoint_ts >= current.checkpoint_ts {
            current.checkpoint_ts = status.checkpoint_ts;
            current.block_state = status.state.clone();
            current.event_size_per_second = status.event_size_per_second;
        }
        current.component_status = status.component_status();
    }

    /// Overwrites the recorded checkpoint, used when bootstrap pins the
    /// start ts of the table trigger event dispatcher.
    pub fn force_checkpoint_ts(&self, checkpoint_ts: u64) {
        self.status.lock().checkpoint_ts = checkpoint_ts;
    }
}

impl std::fmt::Debug for SpanReplication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpanReplication")
            .field("changefeed", &self.changefeed_id)
            .field("id", &self.id)
            .field("table_id", &self.span.table_id)
            .field("schema_id", &self.schema_id())
            .field("node", &self.node_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rivercdc_pb::full_table_span;

    use crate::test_utils::mock_tso_client;

    use super::*;

    fn span(table_id: i64, checkpoint_ts: u64) -> Arc<SpanReplication> {
        SpanReplication::new(
            ChangefeedId::in_default_namespace("test"),
            DispatcherId::new(),
            mock_tso_client(),
            1,
            full_table_span(table_id),
            checkpoint_ts,
        )
    }

    #[test]
    fn test_stale_checkpoint_keeps_progress() {
        let replication = span(1, 100);
        let mut status = TableSpanStatus {
            id: Some(replication.id.to_pb()),
            checkpoint_ts: 200,
            ..Default::default()
        };
        status.set_component_status(ComponentState::Working);
        replication.update_status(&status);
        assert_eq!(replication.checkpoint_ts(), 200);
        assert!(replication.is_working());

        status.checkpoint_ts = 150;
        status.set_component_status(ComponentState::Stopped);
        replication.update_status(&status);
        // the checkpoint never regresses, the component state still follows
        assert_eq!(replication.checkpoint_ts(), 200);
        assert!(!replication.is_working());
    }

    #[test]
    fn test_ddl_span_identity() {
        let ddl = SpanReplication::new_ddl_span(
            ChangefeedId::in_default_namespace("test"),
            DispatcherId::new(),
            mock_tso_client(),
            10,
            NodeId::from("node-1"),
        );
        assert_eq!(ddl.span.table_id, DDL_SPAN_TABLE_ID);
        assert_eq!(ddl.node_id(), Some(NodeId::from("node-1")));
        assert_eq!(ddl.checkpoint_ts(), 10);
    }
}
