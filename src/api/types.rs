use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A daily goal as seen for one particular date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
  pub id: u64,
  pub title: String,
  #[serde(default)]
  pub description: Option<String>,
  /// Whether the goal was achieved on the queried date
  pub completed: bool,
  /// Progress record backing the achievement, if any
  #[serde(default)]
  pub progress_id: Option<u64>,
  #[serde(default)]
  pub streak: u32,
}

/// Server's answer to an achievement toggle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleAchievementResponse {
  pub achieved: bool,
  #[serde(default)]
  pub progress_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
  pub id: u64,
  pub title: String,
  pub completed: bool,
  #[serde(default)]
  pub due_date: Option<NaiveDate>,
  #[serde(default)]
  pub priority: Option<Priority>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
  Low,
  Medium,
  High,
}

/// Which goals a list shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalFilter {
  #[default]
  All,
  Achieved,
  Pending,
}

impl GoalFilter {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::All => "all",
      Self::Achieved => "achieved",
      Self::Pending => "pending",
    }
  }

  /// Next filter in the cycle shown by the `f` key
  pub fn next(self) -> Self {
    match self {
      Self::All => Self::Achieved,
      Self::Achieved => Self::Pending,
      Self::Pending => Self::All,
    }
  }
}

impl fmt::Display for GoalFilter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoFilter {
  #[default]
  All,
  Active,
  Completed,
}

impl TodoFilter {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::All => "all",
      Self::Active => "active",
      Self::Completed => "completed",
    }
  }

  pub fn next(self) -> Self {
    match self {
      Self::All => Self::Active,
      Self::Active => Self::Completed,
      Self::Completed => Self::All,
    }
  }
}

impl fmt::Display for TodoFilter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
