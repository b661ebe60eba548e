use crate::api::{AppQueryKey, Priority, Todo, TodoFilter, ToggleTodo};
use crate::app::Services;
use crate::cache::{CacheSource, QueryKey};
use crate::query::{Query, QueryState};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{priority_color, source_label, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use tracing::debug;

pub struct TodoListView {
  services: Services,
  filter: TodoFilter,
  query: Query<CacheSource>,
  list_state: ListState,
}

impl TodoListView {
  pub fn new(services: Services) -> Self {
    let filter = TodoFilter::default();
    let mut query = Self::build_query(&services, filter);
    query.fetch();

    Self {
      services,
      filter,
      query,
      list_state: ListState::default(),
    }
  }

  fn build_query(services: &Services, filter: TodoFilter) -> Query<CacheSource> {
    let queries = services.queries.clone();
    let api = services.api.clone();

    Query::new(move || {
      let queries = queries.clone();
      let api = api.clone();
      async move {
        let key: QueryKey = AppQueryKey::Todos { filter }.into();
        queries
          .fetch(&key, || async move {
            api
              .list_todos(filter)
              .await
              .map_err(color_eyre::Report::from)
          })
          .await
          .map(|result| {
            debug!(%key, count = result.data.len(), source = ?result.source, "todos loaded");
            result.source
          })
          .map_err(|e| e.to_string())
      }
    })
  }

  fn key(&self) -> QueryKey {
    AppQueryKey::Todos {
      filter: self.filter,
    }
    .into()
  }

  fn todos(&self) -> Vec<Todo> {
    self
      .services
      .queries
      .get_query_data(&self.key())
      .ok()
      .flatten()
      .unwrap_or_default()
  }

  fn toggle_selected(&mut self) {
    let Some(idx) = self.list_state.selected() else {
      return;
    };
    if let Some(todo) = self.todos().get(idx) {
      self
        .services
        .mutations
        .spawn(ToggleTodo::new(self.services.api.clone(), todo.id));
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let todos = self.todos();
    ensure_valid_selection(&mut self.list_state, todos.len());

    let open = todos.iter().filter(|t| !t.completed).count();
    let status = match self.query.state() {
      QueryState::Loading => " (loading...)".to_string(),
      QueryState::Error(e) => format!(" (error: {})", truncate(e, 40)),
      QueryState::Success(source) => source_label(*source),
      QueryState::Idle => String::new(),
    };
    let title = format!(" Todos [{}] {} open{} ", self.filter, open, status);

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if todos.is_empty() && !self.query.is_loading() {
      let content = if self.query.error().is_some() {
        "Failed to load todos. Press 'r' to retry."
      } else {
        "Nothing to do."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = todos
      .iter()
      .map(|todo| {
        let mark = if todo.completed { "[x]" } else { "[ ]" };
        let title_style = if todo.completed {
          Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::CROSSED_OUT)
        } else {
          Style::default()
        };
        let priority = match todo.priority {
          Some(Priority::High) => "!!!",
          Some(Priority::Medium) => "!! ",
          Some(Priority::Low) => "!  ",
          None => "   ",
        };
        let due = todo
          .due_date
          .map(|d| d.format("%Y-%m-%d").to_string())
          .unwrap_or_default();

        ListItem::new(Line::from(vec![
          Span::raw(mark),
          Span::raw(" "),
          Span::styled(priority, Style::default().fg(priority_color(todo.priority))),
          Span::raw(" "),
          Span::styled(format!("{:<50}", truncate(&todo.title, 50)), title_style),
          Span::styled(due, Style::default().fg(Color::Cyan)),
        ]))
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

impl View for TodoListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char(' ') | KeyCode::Enter => self.toggle_selected(),
      KeyCode::Char('f') => {
        self.filter = self.filter.next();
        self.query = Self::build_query(&self.services, self.filter);
        self.query.fetch();
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
    "Todos".to_string()
  }

  fn tick(&mut self) {
    self.query.poll();

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
      ShortcutInfo::new("space", "done"),
      ShortcutInfo::new("f", "filter"),
      ShortcutInfo::new("r", "refresh"),
      ShortcutInfo::new(":", "command"),
    ]
  }
}
