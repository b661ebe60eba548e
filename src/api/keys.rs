//! Query keys for backend resources.

use chrono::NaiveDate;

use crate::cache::QueryKey;

use super::types::{GoalFilter, TodoFilter};

/// Cache keys for API queries.
///
/// Exact variants address one cached list; the prefix variants address
/// every list a mutation may touch.
#[derive(Clone, Debug)]
pub enum AppQueryKey {
  /// Goals for one date under one filter
  Goals { date: NaiveDate, filter: GoalFilter },
  /// Every goal list for a date, whatever the filter
  GoalsForDate { date: NaiveDate },
  /// Todos under one filter
  Todos { filter: TodoFilter },
  /// Every todo list
  AllTodos,
}

impl From<&AppQueryKey> for QueryKey {
  fn from(key: &AppQueryKey) -> Self {
    match key {
      AppQueryKey::Goals { date, filter } => QueryKey::new("goals")
        .with("date")
        .with(date.format("%Y-%m-%d"))
        .with("filter")
        .with(filter),
      AppQueryKey::GoalsForDate { date } => QueryKey::new("goals")
        .with("date")
        .with(date.format("%Y-%m-%d")),
      AppQueryKey::Todos { filter } => QueryKey::new("todos").with("filter").with(filter),
      AppQueryKey::AllTodos => QueryKey::new("todos"),
    }
  }
}

impl From<AppQueryKey> for QueryKey {
  fn from(key: AppQueryKey) -> Self {
    (&key).into()
  }
}
