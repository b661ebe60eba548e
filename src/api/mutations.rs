//! Toggle mutations for goals and todos.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

use crate::cache::QueryKey;
use crate::mutation::OptimisticMutation;

use super::client::RemoteApi;
use super::error::ApiError;
use super::keys::AppQueryKey;
use super::types::{Goal, Todo, ToggleAchievementResponse};

/// Flip a goal's achievement for one date.
///
/// Touches every cached goal list for that date, whatever its filter.
pub struct ToggleGoalAchievement {
  api: Arc<dyn RemoteApi>,
  goal_id: u64,
  date: NaiveDate,
}

impl ToggleGoalAchievement {
  pub fn new(api: Arc<dyn RemoteApi>, goal_id: u64, date: NaiveDate) -> Self {
    Self { api, goal_id, date }
  }
}

#[async_trait]
impl OptimisticMutation for ToggleGoalAchievement {
  type Data = Vec<Goal>;
  type Output = ToggleAchievementResponse;

  fn describe(&self) -> String {
    format!("toggle goal {} for {}", self.goal_id, self.date)
  }

  fn affected(&self) -> QueryKey {
    AppQueryKey::GoalsForDate { date: self.date }.into()
  }

  fn apply_optimistic(&self, goals: &mut Vec<Goal>) {
    for goal in goals.iter_mut().filter(|g| g.id == self.goal_id) {
      goal.completed = !goal.completed;
    }
  }

  async fn commit(&self) -> Result<ToggleAchievementResponse, ApiError> {
    self.api.toggle_achievement(self.goal_id, self.date).await
  }

  fn reconcile(&self, output: &ToggleAchievementResponse, goals: &mut Vec<Goal>) {
    for goal in goals.iter_mut().filter(|g| g.id == self.goal_id) {
      goal.completed = output.achieved;
      goal.progress_id = output.progress_id;
    }
  }
}

/// Flip a todo's completion. Touches every cached todo list.
pub struct ToggleTodo {
  api: Arc<dyn RemoteApi>,
  todo_id: u64,
}

impl ToggleTodo {
  pub fn new(api: Arc<dyn RemoteApi>, todo_id: u64) -> Self {
    Self { api, todo_id }
  }
}

#[async_trait]
impl OptimisticMutation for ToggleTodo {
  type Data = Vec<Todo>;
  type Output = Todo;

  fn describe(&self) -> String {
    format!("toggle todo {}", self.todo_id)
  }

  fn affected(&self) -> QueryKey {
    AppQueryKey::AllTodos.into()
  }

  fn apply_optimistic(&self, todos: &mut Vec<Todo>) {
    for todo in todos.iter_mut().filter(|t| t.id == self.todo_id) {
      todo.completed = !todo.completed;
    }
  }

  async fn commit(&self) -> Result<Todo, ApiError> {
    self.api.toggle_todo(self.todo_id).await
  }

  fn reconcile(&self, output: &Todo, todos: &mut Vec<Todo>) {
    for todo in todos.iter_mut().filter(|t| t.id == output.id) {
      *todo = output.clone();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::fake::{goal, todo, FakeApi};
  use crate::api::types::{GoalFilter, TodoFilter};
  use crate::cache::{MemoryStore, QueryClient};
  use crate::mutation::{MutationController, RecordingNotifier};
  use color_eyre::Report;
  use std::time::Duration;
  use tokio::sync::oneshot;

  fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
  }

  fn goals_key(filter: GoalFilter) -> QueryKey {
    AppQueryKey::Goals {
      date: date(),
      filter,
    }
    .into()
  }

  fn setup(api: FakeApi) -> (Arc<FakeApi>, MutationController, Arc<RecordingNotifier>) {
    let api = Arc::new(api);
    let client = QueryClient::new(Arc::new(MemoryStore::new()));
    let notifier = Arc::new(RecordingNotifier::new());
    let controller = MutationController::new(client, notifier.clone());
    (api, controller, notifier)
  }

  fn cached_goals(controller: &MutationController, filter: GoalFilter) -> Vec<Goal> {
    controller
      .client()
      .get_query_data(&goals_key(filter))
      .unwrap()
      .unwrap()
  }

  fn completed_flags(goals: &[Goal]) -> Vec<(u64, bool)> {
    goals.iter().map(|g| (g.id, g.completed)).collect()
  }

  /// Wait until the fake backend has received `n` toggle calls
  async fn wait_for_toggles(api: &FakeApi, n: usize) {
    for _ in 0..100 {
      if api.toggles_started() >= n {
        return;
      }
      tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("backend never received {} toggles", n);
  }

  #[tokio::test]
  async fn test_cache_flipped_before_server_answers() {
    let (fake, gate) = FakeApi::new()
      .with_goals(vec![goal(1, false), goal(2, true)])
      .gated();
    let (api, controller, notifier) = setup(fake);
    controller
      .client()
      .set_query_data(&goals_key(GoalFilter::All), &api.goals())
      .unwrap();

    let handle = controller.spawn(ToggleGoalAchievement::new(api.clone(), 1, date()));

    // Applied synchronously by spawn, before the request is answered
    assert_eq!(
      completed_flags(&cached_goals(&controller, GoalFilter::All)),
      vec![(1, true), (2, true)]
    );
    wait_for_toggles(&api, 1).await;
    assert_eq!(
      completed_flags(&cached_goals(&controller, GoalFilter::All)),
      vec![(1, true), (2, true)]
    );

    gate.add_permits(1);
    let outcome = handle.await.unwrap();

    assert!(outcome.is_confirmed());
    let goals = cached_goals(&controller, GoalFilter::All);
    assert_eq!(completed_flags(&goals), vec![(1, true), (2, true)]);
    assert_eq!(goals[0].progress_id, Some(1001));
    assert!(controller
      .client()
      .is_invalidated(&goals_key(GoalFilter::All))
      .unwrap());
    assert!(notifier.notifications().is_empty());
  }

  #[tokio::test]
  async fn test_rejected_toggle_restores_exact_cache() {
    let (api, controller, notifier) =
      setup(FakeApi::new().with_goals(vec![goal(1, false), goal(2, true)]));
    api.fail_next(ApiError::Rejected {
      status: 404,
      message: "Goal not found".to_string(),
    });
    let client = controller.client().clone();
    client
      .set_query_data(&goals_key(GoalFilter::All), &api.goals())
      .unwrap();
    let before = client.entries(&goals_key(GoalFilter::All)).unwrap();

    let outcome = controller
      .execute(ToggleGoalAchievement::new(api.clone(), 1, date()))
      .await;

    assert!(!outcome.is_confirmed());
    assert_eq!(client.entries(&goals_key(GoalFilter::All)).unwrap(), before);
    assert_eq!(
      cached_goals(&controller, GoalFilter::All),
      vec![goal(1, false), goal(2, true)]
    );

    let notifications = notifier.notifications();
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].message.contains("Goal not found"));
  }

  #[tokio::test]
  async fn test_failure_rolls_back_every_filtered_list() {
    let (api, controller, _) =
      setup(FakeApi::new().with_goals(vec![goal(1, false), goal(2, true)]));
    api.fail_next(ApiError::Network("connection refused".to_string()));
    let client = controller.client().clone();
    client
      .set_query_data(&goals_key(GoalFilter::All), &api.goals())
      .unwrap();
    client
      .set_query_data(&goals_key(GoalFilter::Pending), &vec![goal(1, false)])
      .unwrap();
    let prefix: QueryKey = AppQueryKey::GoalsForDate { date: date() }.into();
    let before = client.entries(&prefix).unwrap();

    let pending = controller.begin(ToggleGoalAchievement::new(api.clone(), 1, date()));
    assert_eq!(
      completed_flags(&cached_goals(&controller, GoalFilter::Pending)),
      vec![(1, true)]
    );
    pending.settle().await;

    assert_eq!(client.entries(&prefix).unwrap(), before);
  }

  #[tokio::test]
  async fn test_parity_of_successful_toggles() {
    let (api, controller, notifier) =
      setup(FakeApi::new().with_goals(vec![goal(1, false), goal(2, true)]));
    controller
      .client()
      .set_query_data(&goals_key(GoalFilter::All), &api.goals())
      .unwrap();

    for n in 1..=5 {
      let outcome = controller
        .execute(ToggleGoalAchievement::new(api.clone(), 1, date()))
        .await;
      assert!(outcome.is_confirmed());

      let goals = cached_goals(&controller, GoalFilter::All);
      assert_eq!(goals[0].completed, n % 2 == 1, "after {} toggles", n);
      assert!(goals[1].completed);
    }
    assert!(notifier.notifications().is_empty());
  }

  #[tokio::test]
  async fn test_toggle_without_cached_goals_is_harmless() {
    let (api, controller, _) = setup(FakeApi::new().with_goals(vec![goal(1, false)]));

    let outcome = controller
      .execute(ToggleGoalAchievement::new(api.clone(), 1, date()))
      .await;

    assert!(outcome.is_confirmed());
    assert!(api.goals()[0].completed);
    assert!(controller
      .client()
      .get_query_data::<Vec<Goal>>(&goals_key(GoalFilter::All))
      .unwrap()
      .is_none());
  }

  #[tokio::test]
  async fn test_other_dates_untouched() {
    let (api, controller, _) = setup(FakeApi::new().with_goals(vec![goal(1, false)]));
    let tomorrow: QueryKey = AppQueryKey::Goals {
      date: date().succ_opt().unwrap(),
      filter: GoalFilter::All,
    }
    .into();
    controller
      .client()
      .set_query_data(&tomorrow, &vec![goal(1, false)])
      .unwrap();

    controller
      .execute(ToggleGoalAchievement::new(api.clone(), 1, date()))
      .await;

    let cached: Vec<Goal> = controller
      .client()
      .get_query_data(&tomorrow)
      .unwrap()
      .unwrap();
    assert!(!cached[0].completed);
    assert!(!controller.client().is_invalidated(&tomorrow).unwrap());
  }

  #[tokio::test]
  async fn test_toggle_todo_roundtrip() {
    let (api, controller, notifier) =
      setup(FakeApi::new().with_todos(vec![todo(1, false), todo(2, false)]));
    let key: QueryKey = AppQueryKey::Todos {
      filter: TodoFilter::All,
    }
    .into();
    controller
      .client()
      .set_query_data(&key, &vec![todo(1, false), todo(2, false)])
      .unwrap();

    let outcome = controller.execute(ToggleTodo::new(api.clone(), 2)).await;
    assert!(outcome.is_confirmed());
    let cached: Vec<Todo> = controller.client().get_query_data(&key).unwrap().unwrap();
    assert_eq!(cached, vec![todo(1, false), todo(2, true)]);

    api.fail_next(ApiError::Network("timeout".to_string()));
    let before = controller.client().entries(&key).unwrap();
    let outcome = controller.execute(ToggleTodo::new(api.clone(), 1)).await;
    assert!(!outcome.is_confirmed());
    assert_eq!(controller.client().entries(&key).unwrap(), before);
    assert_eq!(notifier.notifications().len(), 1);
  }

  #[tokio::test]
  async fn test_list_fetch_overtaken_by_toggle_is_discarded() {
    let (api, controller, _) = setup(FakeApi::new().with_goals(vec![goal(1, false)]));
    let client = controller.client().clone();
    let key = goals_key(GoalFilter::All);
    client.set_query_data(&key, &api.goals()).unwrap();
    client.invalidate_queries(&key).unwrap();

    // The list request leaves before the toggle and answers with the old state
    let (answer, old_list) = oneshot::channel::<Vec<Goal>>();
    let fetching = tokio::spawn({
      let client = client.clone();
      let key = key.clone();
      async move {
        client
          .fetch(&key, || async move { Ok::<_, Report>(old_list.await?) })
          .await
      }
    });
    tokio::task::yield_now().await;

    let outcome = controller
      .execute(ToggleGoalAchievement::new(api.clone(), 1, date()))
      .await;
    assert!(outcome.is_confirmed());
    answer.send(vec![goal(1, false)]).unwrap();
    fetching.await.unwrap().unwrap();

    assert!(api.goals()[0].completed);
    let cached = cached_goals(&controller, GoalFilter::All);
    assert!(cached[0].completed);
    assert_eq!(cached[0].progress_id, Some(1001));
    assert!(client.is_invalidated(&key).unwrap());
  }

  #[tokio::test]
  async fn test_overlapping_toggles_on_different_dates_settle_independently() {
    let (fake, gate) = FakeApi::new().with_goals(vec![goal(1, false)]).gated();
    let (api, controller, notifier) = setup(fake);
    let client = controller.client().clone();
    let tomorrow = date().succ_opt().unwrap();
    let tomorrow_key: QueryKey = AppQueryKey::Goals {
      date: tomorrow,
      filter: GoalFilter::All,
    }
    .into();
    client
      .set_query_data(&goals_key(GoalFilter::All), &vec![goal(1, false)])
      .unwrap();
    client
      .set_query_data(&tomorrow_key, &vec![goal(1, false)])
      .unwrap();
    let tomorrow_before = client.entries(&tomorrow_key).unwrap();

    let first = controller.spawn(ToggleGoalAchievement::new(api.clone(), 1, date()));
    wait_for_toggles(&api, 1).await;
    let second = controller.spawn(ToggleGoalAchievement::new(api.clone(), 1, tomorrow));
    wait_for_toggles(&api, 2).await;

    assert!(cached_goals(&controller, GoalFilter::All)[0].completed);
    let optimistic: Vec<Goal> = client.get_query_data(&tomorrow_key).unwrap().unwrap();
    assert!(optimistic[0].completed);

    // Gate permits are handed out in arrival order
    gate.add_permits(1);
    assert!(first.await.unwrap().is_confirmed());
    api.fail_next(ApiError::Network("timed out".to_string()));
    gate.add_permits(1);
    assert!(!second.await.unwrap().is_confirmed());

    assert!(cached_goals(&controller, GoalFilter::All)[0].completed);
    assert!(client.is_invalidated(&goals_key(GoalFilter::All)).unwrap());
    assert_eq!(client.entries(&tomorrow_key).unwrap(), tomorrow_before);
    assert_eq!(notifier.notifications().len(), 1);
  }

  #[tokio::test]
  async fn test_same_key_overlap_last_settled_wins() {
    let (api, controller, notifier) = setup(FakeApi::new().with_goals(vec![goal(1, false)]));
    controller
      .client()
      .set_query_data(&goals_key(GoalFilter::All), &api.goals())
      .unwrap();

    let first = controller.begin(ToggleGoalAchievement::new(api.clone(), 1, date()));
    let second = controller.begin(ToggleGoalAchievement::new(api.clone(), 1, date()));
    assert!(!cached_goals(&controller, GoalFilter::All)[0].completed);

    // The later toggle settles first and the server accepts it
    assert!(second.settle().await.is_confirmed());
    assert!(api.goals()[0].completed);
    assert!(cached_goals(&controller, GoalFilter::All)[0].completed);

    // The earlier one fails afterwards; its rollback is the last write
    api.fail_next(ApiError::Network("connection reset".to_string()));
    assert!(!first.settle().await.is_confirmed());
    assert!(!cached_goals(&controller, GoalFilter::All)[0].completed);
    assert!(api.goals()[0].completed);
    assert_eq!(notifier.notifications().len(), 1);
  }
}
