//! In-process backend used by tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use super::client::RemoteApi;
use super::error::ApiError;
use super::types::{Goal, GoalFilter, Todo, TodoFilter, ToggleAchievementResponse};

/// Backend double holding goals and todos in memory.
///
/// Queued failures are returned by the next toggles instead of applying
/// them. With a gate installed, toggles wait until the test releases a
/// permit, which lets tests observe the cache mid-flight.
#[derive(Default)]
pub struct FakeApi {
  goals: Mutex<Vec<Goal>>,
  todos: Mutex<Vec<Todo>>,
  failures: Mutex<VecDeque<ApiError>>,
  gate: Option<Arc<Semaphore>>,
  toggles_started: AtomicUsize,
}

impl FakeApi {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_goals(self, goals: Vec<Goal>) -> Self {
    *self.goals.lock().unwrap() = goals;
    self
  }

  pub fn with_todos(self, todos: Vec<Todo>) -> Self {
    *self.todos.lock().unwrap() = todos;
    self
  }

  /// Make toggles wait for a permit on the returned semaphore
  pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
    let gate = Arc::new(Semaphore::new(0));
    self.gate = Some(gate.clone());
    (self, gate)
  }

  pub fn fail_next(&self, error: ApiError) {
    self.failures.lock().unwrap().push_back(error);
  }

  pub fn toggles_started(&self) -> usize {
    self.toggles_started.load(Ordering::SeqCst)
  }

  pub fn goals(&self) -> Vec<Goal> {
    self.goals.lock().unwrap().clone()
  }

  pub fn todos(&self) -> Vec<Todo> {
    self.todos.lock().unwrap().clone()
  }

  async fn enter_toggle(&self) -> Result<(), ApiError> {
    self.toggles_started.fetch_add(1, Ordering::SeqCst);
    if let Some(gate) = &self.gate {
      gate
        .acquire()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?
        .forget();
    }
    match self.failures.lock().unwrap().pop_front() {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }
}

fn not_found(what: &str) -> ApiError {
  ApiError::Rejected {
    status: 404,
    message: format!("{} not found", what),
  }
}

#[async_trait]
impl RemoteApi for FakeApi {
  async fn list_goals(&self, _date: NaiveDate, filter: GoalFilter) -> Result<Vec<Goal>, ApiError> {
    Ok(
      self
        .goals()
        .into_iter()
        .filter(|g| match filter {
          GoalFilter::All => true,
          GoalFilter::Achieved => g.completed,
          GoalFilter::Pending => !g.completed,
        })
        .collect(),
    )
  }

  async fn toggle_achievement(
    &self,
    goal_id: u64,
    _date: NaiveDate,
  ) -> Result<ToggleAchievementResponse, ApiError> {
    self.enter_toggle().await?;

    let mut goals = self.goals.lock().unwrap();
    let goal = goals
      .iter_mut()
      .find(|g| g.id == goal_id)
      .ok_or_else(|| not_found("Goal"))?;
    goal.completed = !goal.completed;
    goal.progress_id = goal.completed.then_some(1000 + goal_id);

    Ok(ToggleAchievementResponse {
      achieved: goal.completed,
      progress_id: goal.progress_id,
    })
  }

  async fn list_todos(&self, filter: TodoFilter) -> Result<Vec<Todo>, ApiError> {
    Ok(
      self
        .todos()
        .into_iter()
        .filter(|t| match filter {
          TodoFilter::All => true,
          TodoFilter::Active => !t.completed,
          TodoFilter::Completed => t.completed,
        })
        .collect(),
    )
  }

  async fn toggle_todo(&self, todo_id: u64) -> Result<Todo, ApiError> {
    self.enter_toggle().await?;

    let mut todos = self.todos.lock().unwrap();
    let todo = todos
      .iter_mut()
      .find(|t| t.id == todo_id)
      .ok_or_else(|| not_found("Todo"))?;
    todo.completed = !todo.completed;
    Ok(todo.clone())
  }
}

pub fn goal(id: u64, completed: bool) -> Goal {
  Goal {
    id,
    title: format!("Goal {}", id),
    description: None,
    completed,
    progress_id: None,
    streak: 0,
  }
}

pub fn todo(id: u64, completed: bool) -> Todo {
  Todo {
    id,
    title: format!("Todo {}", id),
    completed,
    due_date: None,
    priority: None,
  }
}
