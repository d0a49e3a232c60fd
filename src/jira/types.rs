use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Jira issue with the context used for summaries.
///
/// The capitalized aliases accept blobs written by earlier perfdive releases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
  #[serde(alias = "Key")]
  pub key: String,
  #[serde(default, alias = "Summary")]
  pub summary: String,
  #[serde(default, alias = "Description")]
  pub description: String,
  #[serde(default, alias = "Status")]
  pub status: String,
  #[serde(default)]
  pub issue_type: String,
  #[serde(default, alias = "Assignee")]
  pub assignee: String,
  #[serde(alias = "Created")]
  pub created: Option<DateTime<Utc>>,
  #[serde(alias = "Updated")]
  pub updated: Option<DateTime<Utc>>,
  #[serde(default)]
  pub comments: Vec<Comment>,
  #[serde(default)]
  pub history: Vec<HistoryItem>,
  #[serde(default)]
  pub labels: Vec<String>,
  #[serde(default)]
  pub components: Vec<String>,
  #[serde(default)]
  pub priority: String,
  pub time_tracking: Option<TimeTracking>,
  #[serde(default)]
  pub custom_fields: BTreeMap<String, serde_json::Value>,
}

impl Issue {
  /// Minimal issue with only a key and summary.
  pub fn new(key: impl Into<String>, summary: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      summary: summary.into(),
      description: String::new(),
      status: String::new(),
      issue_type: String::new(),
      assignee: String::new(),
      created: None,
      updated: None,
      comments: Vec::new(),
      history: Vec::new(),
      labels: Vec::new(),
      components: Vec::new(),
      priority: String::new(),
      time_tracking: None,
      custom_fields: BTreeMap::new(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
  pub id: String,
  pub author: String,
  pub body: String,
  pub created: DateTime<Utc>,
  pub updated: DateTime<Utc>,
}

/// One changelog entry (a set of field changes made together)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
  pub id: String,
  pub author: String,
  pub created: DateTime<Utc>,
  pub items: Vec<HistoryChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryChange {
  pub field: String,
  #[serde(default)]
  pub field_type: String,
  #[serde(default)]
  pub from: String,
  #[serde(default, rename = "from_string")]
  pub from_text: String,
  #[serde(default)]
  pub to: String,
  #[serde(default, rename = "to_string")]
  pub to_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeTracking {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub original_estimate: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub remaining_estimate: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub time_spent: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub worklog_total: String,
}
