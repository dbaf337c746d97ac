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

use std::collections::HashSet;

use super::RangeChecker;

/// Coverage by counting distinct table ids. Sufficient when dynamic span
/// splitting is off: every table is exactly one dispatcher, so key ranges
/// carry no extra information.
pub struct TableCountChecker {
    expected: usize,
    reported: HashSet<i64>,
}

impl TableCountChecker {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            reported: HashSet::with_capacity(expected),
        }
    }
}

impl RangeChecker for TableCountChecker {
    fn add_sub_range(&mut self, table_id: i64, _start_key: &[u8], _end_key: &[u8]) {
        self.reported.insert(table_id);
    }

    fn is_fully_covered(&self) -> bool {
        self.reported.len() >= self.expected
    }

    fn reset(&mut self) {
        self.reported.clear();
    }

    fn detail(&self) -> String {
        format!("reported {}/{} tables", self.reported.len(), self.expected)
    }
}
