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

use serde::{Deserialize, Serialize};

/// The `[filter]` section of the changefeed configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct FilterConfig {
    /// `schema.table` patterns, `*` matching any single name component.
    /// An empty list admits everything.
    pub rules: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            rules: vec!["*.*".to_owned()],
        }
    }
}

/// Table name predicate handed to the schema store when enumerating the
/// tables a changefeed replicates. System schemas are always excluded.
#[derive(Clone, Debug)]
pub struct TableFilter {
    rules: Vec<(String, String)>,
}

const SYSTEM_SCHEMAS: &[&str] = &["information_schema", "performance_schema", "mysql", "sys"];

impl TableFilter {
    pub fn new(config: &FilterConfig) -> Self {
        let rules = config
            .rules
            .iter()
            .filter_map(|rule| {
                let (schema, table) = rule.split_once('.')?;
                Some((schema.to_owned(), table.to_owned()))
            })
            .collect();
        Self { rules }
    }

    pub fn matches(&self, schema: &str, table: &str) -> bool {
        if SYSTEM_SCHEMAS.contains(&schema) {
            return false;
        }
        self.rules
            .iter()
            .any(|(s, t)| component_matches(s, schema) && component_matches(t, table))
    }
}

impl Default for TableFilter {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}

fn component_matches(pattern: &str, name: &str) -> bool {
    pattern == "*" || pattern == name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(rules: &[&str]) -> TableFilter {
        TableFilter::new(&FilterConfig {
            rules: rules.iter().map(|r| r.to_string()).collect(),
        })
    }

    #[test]
    fn test_default_admits_user_tables() {
        let f = TableFilter::default();
        assert!(f.matches("shop", "orders"));
        assert!(!f.matches("mysql", "user"));
    }

    #[test]
    fn test_rule_matching() {
        let f = filter(&["shop.*", "billing.invoices"]);
        assert!(f.matches("shop", "orders"));
        assert!(f.matches("billing", "invoices"));
        assert!(!f.matches("billing", "refunds"));
        assert!(!f.matches("other", "orders"));
    }

    #[test]
    fn test_malformed_rule_is_skipped() {
        let f = filter(&["no-dot", "shop.orders"]);
        assert!(f.matches("shop", "orders"));
        assert!(!f.matches("no-dot", "no-dot"));
    }
}
