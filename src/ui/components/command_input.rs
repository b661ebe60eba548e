use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::commands::{self, Command};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
  /// Resolved command name (or the raw input if nothing matched)
  Submitted(String),
  Cancelled,
}

/// `:` prompt with autocomplete
#[derive(Debug, Clone, Default)]
pub struct CommandInput {
  input: TextInput,
  active: bool,
  selected: usize,
}

impl CommandInput {
  pub fn new() -> Self {
    Self {
      input: TextInput::new(),
      active: false,
      selected: 0,
    }
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  fn suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(&self.input.value())
  }

  fn close(&mut self) {
    self.active = false;
    self.input.clear();
    self.selected = 0;
  }

  /// Handles activation (`:`) too, so call it for every key.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<CommandEvent> {
    if !self.active {
      if key.code == KeyCode::Char(':') {
        self.active = true;
        return KeyResult::Handled;
      }
      return KeyResult::NotHandled;
    }

    let suggestion_count = self.suggestions().len();
    match key.code {
      KeyCode::Esc => {
        self.close();
        KeyResult::Event(CommandEvent::Cancelled)
      }
      KeyCode::Enter => {
        let command = self
          .suggestions()
          .get(self.selected)
          .map(|cmd| cmd.name.to_string())
          .unwrap_or_else(|| self.input.value().trim().to_lowercase());
        self.close();
        KeyResult::Event(CommandEvent::Submitted(command))
      }
      KeyCode::Backspace if self.input.is_empty() => {
        self.close();
        KeyResult::Event(CommandEvent::Cancelled)
      }
      KeyCode::Tab | KeyCode::Down => {
        if suggestion_count > 0 {
          self.selected = (self.selected + 1) % suggestion_count;
        }
        KeyResult::Handled
      }
      KeyCode::BackTab | KeyCode::Up => {
        if suggestion_count > 0 {
          self.selected = (self.selected + suggestion_count - 1) % suggestion_count;
        }
        KeyResult::Handled
      }
      _ => match self.input.handle_key(key) {
        InputResult::Consumed => {
          self.selected = 0;
          KeyResult::Handled
        }
        // Enter/Esc are intercepted above; swallow everything else while open
        _ => KeyResult::Handled,
      },
    }
  }

  /// Draw the prompt and suggestions; callers check `is_active` first.
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    let suggestions = self.suggestions();
    let shown = suggestions.len().min(8) as u16;
    let width = overlay_width(area.width);
    let height = (3 + shown).min(area.height);
    let overlay = Rect::new(area.x + 1, area.y + 1, width, height).intersection(area);

    frame.render_widget(Clear, overlay);
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(" Command ");
    let inner = block.inner(overlay);
    frame.render_widget(block, overlay);

    if inner.height == 0 {
      return;
    }

    let [input_area, list_area] =
      Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(inner);

    let prompt = Line::from(vec![
      Span::styled(":", Style::default().fg(Color::Yellow)),
      Span::raw(self.input.value()),
      Span::styled("_", Style::default().fg(Color::Yellow)),
    ]);
    frame.render_widget(Paragraph::new(prompt), input_area);

    if suggestions.is_empty() || list_area.height == 0 {
      return;
    }

    let items: Vec<ListItem> = suggestions
      .iter()
      .take(8)
      .map(|cmd| {
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<10}", cmd.name), Style::default().fg(Color::Cyan)),
          Span::styled(cmd.description, Style::default().fg(Color::DarkGray)),
        ]))
      })
      .collect();

    let list = List::new(items).highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));
    let mut state = ListState::default();
    state.select(Some(self.selected));
    frame.render_stateful_widget(list, list_area, &mut state);
  }
}

/// 60% of the screen, between 30 and 60 columns, never wider than the screen
fn overlay_width(screen_width: u16) -> u16 {
  let share = (u32::from(screen_width) * 60 / 100).clamp(30, 60) as u16;
  share.min(screen_width)
}
