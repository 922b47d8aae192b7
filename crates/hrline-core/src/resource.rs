//! Resource declarations: what to fetch, how to page it, how to load it

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::paginate::PaginationStrategy;

/// One record as returned by the API
pub type Record = serde_json::Value;

/// Whether the destination table is truncated before the first batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    #[default]
    Replace,
    Append,
}

impl std::fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Replace => f.write_str("replace"),
            Self::Append => f.write_str("append"),
        }
    }
}

fn default_data_selector() -> String {
    "data".to_string()
}

/// A REST collection to extract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Unique name; also the destination table name
    pub name: String,
    /// Endpoint path relative to the API base URL
    pub path: String,
    /// Static query parameters sent with every page
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub paginator: PaginationStrategy,
    /// Dot-path of the record array in the response body
    #[serde(default = "default_data_selector")]
    pub data_selector: String,
    #[serde(default)]
    pub write_policy: WritePolicy,
}

impl ResourceSpec {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        paginator: PaginationStrategy,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            params: BTreeMap::new(),
            paginator,
            data_selector: default_data_selector(),
            write_policy: WritePolicy::default(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_data_selector(mut self, selector: impl Into<String>) -> Self {
        self.data_selector = selector.into();
        self
    }

    pub fn with_write_policy(mut self, policy: WritePolicy) -> Self {
        self.write_policy = policy;
        self
    }
}
