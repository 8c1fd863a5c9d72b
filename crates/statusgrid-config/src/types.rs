//! Service and query definitions.
//!
//! These are immutable after the configuration is loaded; the poller shares
//! them across evaluation tasks behind an `Arc`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::expression::Expression;

/// Group assigned to services that do not name one.
pub const DEFAULT_GROUP: &str = "default";

/// One monitored service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceSpec {
    pub name: String,
    /// Display group. Empty in the file means [`DEFAULT_GROUP`].
    #[serde(default)]
    pub group: String,
    pub query: QueryDefinition,
}

impl ServiceSpec {
    /// The group this service belongs to, falling back to the default group.
    pub fn group_name(&self) -> &str {
        if self.group.is_empty() {
            DEFAULT_GROUP
        } else {
            &self.group
        }
    }
}

/// How a service's health is queried and interpreted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryDefinition {
    /// Raw PromQL text.
    pub query: String,
    /// Optional threshold applied to the numeric result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<Expression>,
    /// History window for the range query.
    #[serde(default, with = "crate::duration")]
    pub range: Duration,
    /// Resolution of the range query.
    #[serde(default, with = "crate::duration")]
    pub step: Duration,
    /// Interpret the result as a boolean: non-zero is healthy.
    #[serde(default, rename = "bool")]
    pub bool_value: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub units: String,
}

impl QueryDefinition {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            expression: None,
            range: Duration::ZERO,
            step: Duration::ZERO,
            bool_value: false,
            units: String::new(),
        }
    }
}
