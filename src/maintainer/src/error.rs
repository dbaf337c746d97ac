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

use rivercdc_common::NodeId;

pub type MaintainerResult<T> = std::result::Result<T, MaintainerError>;

#[derive(thiserror::Error, Debug)]
enum MaintainerErrorInner {
    #[error("table {0} not found")]
    TableNotFound(i64),

    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    #[error("move table timeout: table {0}")]
    MoveTableTimeout(i64),

    #[error("schema store error: {0}")]
    SchemaStore(anyhow::Error),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error(transparent)]
    Internal(anyhow::Error),
}

/// Error type of the maintainer core.
///
/// Invariant violations (double bootstrap, a missing old replica set in a
/// replace) are not represented here. They indicate corrupted in-memory
/// state, so they panic and let the changefeed supervisor rebuild the
/// maintainer from a fresh bootstrap.
#[derive(thiserror::Error, Debug)]
#[error("{inner}")]
pub struct MaintainerError {
    inner: Box<MaintainerErrorInner>,
}

impl From<MaintainerErrorInner> for MaintainerError {
    fn from(inner: MaintainerErrorInner) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }
}

impl MaintainerError {
    pub fn table_not_found(table_id: i64) -> Self {
        MaintainerErrorInner::TableNotFound(table_id).into()
    }

    pub fn node_not_found(node: NodeId) -> Self {
        MaintainerErrorInner::NodeNotFound(node).into()
    }

    pub fn move_table_timeout(table_id: i64) -> Self {
        MaintainerErrorInner::MoveTableTimeout(table_id).into()
    }

    pub fn schema_store(e: anyhow::Error) -> Self {
        MaintainerErrorInner::SchemaStore(e).into()
    }

    pub fn rpc(reason: impl Into<String>) -> Self {
        MaintainerErrorInner::Rpc(reason.into()).into()
    }

    pub fn is_move_table_timeout(&self) -> bool {
        matches!(*self.inner, MaintainerErrorInner::MoveTableTimeout(_))
    }
}

impl From<anyhow::Error> for MaintainerError {
    fn from(e: anyhow::Error) -> Self {
        MaintainerErrorInner::Internal(e).into()
    }
}
