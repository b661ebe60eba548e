use crate::api::{AppQueryKey, Goal, GoalFilter, ToggleGoalAchievement};
use crate::app::Services;
use crate::cache::{CacheSource, QueryKey};
use crate::query::{Query, QueryState};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{source_label, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use tracing::debug;

/// Daily goals for one date
pub struct GoalListView {
  services: Services,
  date: NaiveDate,
  filter: GoalFilter,
  query: Query<CacheSource>,
  list_state: ListState,
}

impl GoalListView {
  pub fn new(services: Services, date: NaiveDate, filter: GoalFilter) -> Self {
    let mut query = Self::build_query(&services, date, filter);
    query.fetch();

    Self {
      services,
      date,
      filter,
      query,
      list_state: ListState::default(),
    }
  }

  fn build_query(services: &Services, date: NaiveDate, filter: GoalFilter) -> Query<CacheSource> {
    let queries = services.queries.clone();
    let api = services.api.clone();

    Query::new(move || {
      let queries = queries.clone();
      let api = api.clone();
      async move {
        let key: QueryKey = AppQueryKey::Goals { date, filter }.into();
        queries
          .fetch(&key, || async move {
            api
              .list_goals(date, filter)
              .await
              .map_err(color_eyre::Report::from)
          })
          .await
          .map(|result| {
            debug!(%key, count = result.data.len(), source = ?result.source, "goals loaded");
            result.source
          })
          .map_err(|e| e.to_string())
      }
    })
  }

  fn key(&self) -> QueryKey {
    AppQueryKey::Goals {
      date: self.date,
      filter: self.filter,
    }
    .into()
  }

  /// Goals as currently cached, including optimistic changes
  fn goals(&self) -> Vec<Goal> {
    self
      .services
      .queries
      .get_query_data(&self.key())
      .ok()
      .flatten()
      .unwrap_or_default()
  }

  fn reload(&mut self) {
    self.query = Self::build_query(&self.services, self.date, self.filter);
    self.query.fetch();
  }

  fn shift_date(&mut self, days: i64) {
    if let Some(date) = self.date.checked_add_signed(chrono::Duration::days(days)) {
      self.date = date;
      self.list_state.select(Some(0));
      self.reload();
    }
  }

  fn toggle_selected(&mut self) {
    let Some(idx) = self.list_state.selected() else {
      return;
    };
    if let Some(goal) = self.goals().get(idx) {
      debug!(goal_id = goal.id, date = %self.date, "toggling goal achievement");
      self.services.mutations.spawn(ToggleGoalAchievement::new(
        self.services.api.clone(),
        goal.id,
        self.date,
      ));
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let goals = self.goals();
    ensure_valid_selection(&mut self.list_state, goals.len());

    let done = goals.iter().filter(|g| g.completed).count();
    let status = match self.query.state() {
      QueryState::Loading => " (loading...)".to_string(),
      QueryState::Error(e) => format!(" (error: {})", truncate(e, 40)),
      QueryState::Success(source) => source_label(*source),
      QueryState::Idle => String::new(),
    };
    let title = format!(
      " Goals {} [{}] {}/{}{} ",
      self.date.format("%a %Y-%m-%d"),
      self.filter,
      done,
      goals.len(),
      status
    );

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if goals.is_empty() && !self.query.is_loading() {
      let content = if self.query.error().is_some() {
        "Failed to load goals. Press 'r' to retry."
      } else {
        "No goals for this day."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = goals
      .iter()
      .map(|goal| {
        let (mark, color) = if goal.completed {
          ("[x]", Color::Green)
        } else {
          ("[ ]", Color::White)
        };
        let mut spans = vec![
          Span::styled(mark, Style::default().fg(color)),
          Span::raw(" "),
          Span::styled(truncate(&goal.title, 50), Style::default().fg(color)),
        ];
        if goal.streak > 0 {
          spans.push(Span::styled(
            format!("  streak {}", goal.streak),
            Style::default().fg(Color::Yellow),
          ));
        }
        ListItem::new(Line::from(spans))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for GoalListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char(' ') | KeyCode::Enter => self.toggle_selected(),
      KeyCode::Char('h') | KeyCode::Left => self.shift_date(-1),
      KeyCode::Char('l') | KeyCode::Right => self.shift_date(1),
      KeyCode::Char('f') => {
        self.filter = self.filter.next();
        self.reload();
      }
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    format!("Goals [{}]", self.date)
  }

  fn tick(&mut self) {
    self.query.poll();

    // A confirmed mutation invalidates our entry: refetch once. Offline
    // results wait for a manual refresh instead of retrying every tick.
    let settled_online = matches!(
      self.query.state(),
      QueryState::Success(CacheSource::Network | CacheSource::CacheFresh)
    );
    if settled_online && self.services.queries.is_invalidated(&self.key()).unwrap_or(false) {
      self.query.refetch();
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("space", "toggle"),
      ShortcutInfo::new("h/l", "day"),
      ShortcutInfo::new("f", "filter"),
      ShortcutInfo::new("r", "refresh"),
      ShortcutInfo::new(":", "command"),
    ]
  }
}
