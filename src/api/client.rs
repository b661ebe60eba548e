use async_trait::async_trait;
use chrono::NaiveDate;
use color_eyre::{eyre::eyre, Result};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;

use super::error::ApiError;
use super::types::{Goal, GoalFilter, Todo, TodoFilter, ToggleAchievementResponse};

/// Operations the backend exposes.
///
/// Kept behind a trait so the mutation controller and views can be driven
/// by an in-process fake.
#[async_trait]
pub trait RemoteApi: Send + Sync {
  /// Goals with their achievement state for `date`
  async fn list_goals(&self, date: NaiveDate, filter: GoalFilter) -> Result<Vec<Goal>, ApiError>;

  /// Flip the achievement of a goal on `date`
  async fn toggle_achievement(
    &self,
    goal_id: u64,
    date: NaiveDate,
  ) -> Result<ToggleAchievementResponse, ApiError>;

  async fn list_todos(&self, filter: TodoFilter) -> Result<Vec<Todo>, ApiError>;

  /// Flip the completion of a todo, returning its new state
  async fn toggle_todo(&self, todo_id: u64) -> Result<Todo, ApiError>;
}

/// REST client for the backend
#[derive(Clone)]
pub struct HttpApi {
  http: reqwest::Client,
  base: Url,
  token: String,
}

impl HttpApi {
  pub fn new(config: &Config) -> Result<Self> {
    let token = Config::get_api_token()?;
    Self::with_token(&config.api.url, token, Duration::from_secs(config.api.timeout_secs))
  }

  pub fn with_token(base_url: &str, token: String, timeout: Duration) -> Result<Self> {
    let base =
      Url::parse(base_url).map_err(|e| eyre!("Invalid API URL '{}': {}", base_url, e))?;
    if base.cannot_be_a_base() {
      return Err(eyre!("API URL cannot be used as a base: {}", base_url));
    }

    let http = reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(concat!("daybook/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base, token })
  }

  /// Base URL with `segments` appended as path components
  fn endpoint(&self, segments: &[&str]) -> Url {
    let mut url = self.base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url
  }

  /// Send an authenticated request and decode a JSON response
  async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
    let response = request.bearer_auth(&self.token).send().await?;
    let status = response.status();
    debug!(url = %response.url(), %status, "api response");

    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      let err = ApiError::rejected(status, &body);
      warn!(%status, error = %err, "api request rejected");
      return Err(err);
    }

    Ok(response.json::<T>().await?)
  }
}

#[async_trait]
impl RemoteApi for HttpApi {
  async fn list_goals(&self, date: NaiveDate, filter: GoalFilter) -> Result<Vec<Goal>, ApiError> {
    let url = self.endpoint(&["goals"]);
    let date = date.format("%Y-%m-%d").to_string();
    self
      .send(
        self
          .http
          .get(url)
          .query(&[("date", date.as_str()), ("filter", filter.as_str())]),
      )
      .await
  }

  async fn toggle_achievement(
    &self,
    goal_id: u64,
    date: NaiveDate,
  ) -> Result<ToggleAchievementResponse, ApiError> {
    let id = goal_id.to_string();
    let url = self.endpoint(&["goals", &id, "achievements"]);
    let body = serde_json::json!({ "date": date.format("%Y-%m-%d").to_string() });
    self.send(self.http.post(url).json(&body)).await
  }

  async fn list_todos(&self, filter: TodoFilter) -> Result<Vec<Todo>, ApiError> {
    let url = self.endpoint(&["todos"]);
    self
      .send(self.http.get(url).query(&[("filter", filter.as_str())]))
      .await
  }

  async fn toggle_todo(&self, todo_id: u64) -> Result<Todo, ApiError> {
    let id = todo_id.to_string();
    let url = self.endpoint(&["todos", &id, "toggle"]);
    self.send(self.http.post(url)).await
  }
}
