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

/// One physical table as enumerated by the schema store at a timestamp.
/// A partitioned logical table yields one entry per partition.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Table {
    pub schema_id: i64,
    pub table_id: i64,
    pub schema_name: String,
    pub table_name: String,
}

impl Table {
    pub fn new(schema_id: i64, table_id: i64) -> Self {
        Self {
            schema_id,
            table_id,
            ..Default::default()
        }
    }
}
