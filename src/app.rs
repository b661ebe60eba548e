use crate::api::{HttpApi, RemoteApi};
use crate::cache::{CacheStore, MemoryStore, QueryClient, SqliteStore};
use crate::config::{CacheBackend, Config};
use crate::event::{Event, EventHandler};
use crate::mutation::{MutationController, Notification, Notifier};
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult, Toast};
use crate::ui::view::{View, ViewAction};
use crate::ui::views::{GoalListView, TodoListView};
use chrono::{Local, NaiveDate};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use tracing::{debug, info};

/// Which list the app opens with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum StartView {
  #[default]
  Goals,
  Todos,
}

/// Handles shared by every view: the backend, the query cache and the
/// mutation controller writing into it.
#[derive(Clone)]
pub struct Services {
  pub api: Arc<dyn RemoteApi>,
  pub queries: QueryClient,
  pub mutations: MutationController,
}

impl Services {
  pub fn new(config: &Config, notifier: Arc<dyn Notifier>) -> Result<Self> {
    let store: Arc<dyn CacheStore> = match config.cache.backend {
      CacheBackend::Memory => Arc::new(MemoryStore::new()),
      CacheBackend::Sqlite => Arc::new(SqliteStore::open()?),
    };
    info!(backend = ?config.cache.backend, "opened query cache");

    let queries = QueryClient::new(store).with_stale_time(config.cache.stale_time()?);
    let api: Arc<dyn RemoteApi> = Arc::new(HttpApi::new(config)?);

    Ok(Self::from_parts(api, queries, notifier))
  }

  fn from_parts(api: Arc<dyn RemoteApi>, queries: QueryClient, notifier: Arc<dyn Notifier>) -> Self {
    Self {
      api,
      mutations: MutationController::new(queries.clone(), notifier),
      queries,
    }
  }

  #[cfg(test)]
  pub fn for_tests(api: Arc<dyn RemoteApi>) -> Self {
    Self::from_parts(
      api,
      QueryClient::new(Arc::new(MemoryStore::new())),
      Arc::new(crate::mutation::RecordingNotifier::new()),
    )
  }
}

/// Main application state
pub struct App {
  config: Config,
  services: Services,

  /// Date the goal list shows when (re)opened
  date: NaiveDate,

  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  command: CommandInput,
  toast: Toast,
  should_quit: bool,
}

impl App {
  pub fn new(config: Config, services: Services, date: NaiveDate, start: StartView) -> Self {
    let mut app = Self {
      config,
      services,
      date,
      view_stack: Vec::new(),
      command: CommandInput::new(),
      toast: Toast::default(),
      should_quit: false,
    };
    let root = match start {
      StartView::Goals => app.goal_view(),
      StartView::Todos => app.todo_view(),
    };
    app.view_stack.push(root);
    app
  }

  pub async fn run(&mut self, mut events: EventHandler) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.event_loop(&mut terminal, &mut events).await;

    // Cleanup terminal, even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop<B: Backend>(
    &mut self,
    terminal: &mut Terminal<B>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }
    Ok(())
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn toast(&self) -> &Toast {
    &self.toast
  }

  pub fn command(&self) -> &CommandInput {
    &self.command
  }

  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self.view_stack.iter().map(|v| v.breadcrumb_label()).collect()
  }

  /// Short context shown in the header
  pub fn context_label(&self) -> String {
    self.date.format("%a %d %b").to_string()
  }

  fn goal_view(&self) -> Box<dyn View> {
    Box::new(GoalListView::new(
      self.services.clone(),
      self.date,
      self.config.default_filter,
    ))
  }

  fn todo_view(&self) -> Box<dyn View> {
    Box::new(TodoListView::new(self.services.clone()))
  }

  fn set_root(&mut self, view: Box<dyn View>) {
    self.view_stack.clear();
    self.view_stack.push(view);
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {
        self.toast.tick();
        for view in &mut self.view_stack {
          view.tick();
        }
      }
      Event::Notify(notification) => self.toast.show(notification),
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    match self.command.handle_key(key) {
      KeyResult::Event(CommandEvent::Submitted(cmd)) => {
        self.execute_command(&cmd);
        return;
      }
      KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
      KeyResult::NotHandled => {}
    }

    if key.code == KeyCode::Char('x') {
      self.toast.dismiss();
      return;
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::Quit,
    };
    match action {
      ViewAction::None => {}
      ViewAction::Pop => {
        self.view_stack.pop();
        if self.view_stack.is_empty() {
          self.should_quit = true;
        }
      }
      ViewAction::Quit => self.should_quit = true,
    }
  }

  fn execute_command(&mut self, cmd: &str) {
    debug!(cmd, "executing command");
    match cmd {
      "goals" => self.set_root(self.goal_view()),
      "todos" => self.set_root(self.todo_view()),
      "today" => {
        self.date = Local::now().date_naive();
        self.set_root(self.goal_view());
        self.toast.show(Notification::info(format!(
          "Showing goals for {}",
          self.date
        )));
      }
      "quit" => self.should_quit = true,
      "" => {}
      other => self
        .toast
        .show(Notification::error(format!("Unknown command: {}", other))),
    }
  }
}
