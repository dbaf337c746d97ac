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

use async_trait::async_trait;
use rivercdc_common::{Table, TableFilter};

/// Read side of the schema store: physical table enumeration at a timestamp.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// All physical tables visible at `snapshot_ts` that pass `filter`.
    /// Partitioned tables are flattened to one entry per partition.
    async fn all_physical_tables(
        &self,
        snapshot_ts: u64,
        filter: &TableFilter,
    ) -> anyhow::Result<Vec<Table>>;
}
