use crate::mutation::{Notification, NotificationLevel};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;
use std::time::{Duration, Instant};

/// One-line banner showing the latest notification until it expires
#[derive(Debug)]
pub struct Toast {
  current: Option<(Notification, Instant)>,
  ttl: Duration,
}

impl Default for Toast {
  fn default() -> Self {
    Self::new(Duration::from_secs(5))
  }
}

impl Toast {
  pub fn new(ttl: Duration) -> Self {
    Self { current: None, ttl }
  }

  /// Replace whatever is showing
  pub fn show(&mut self, notification: Notification) {
    self.current = Some((notification, Instant::now()));
  }

  pub fn current(&self) -> Option<&Notification> {
    self.current.as_ref().map(|(n, _)| n)
  }

  /// Drop the notification once it has been visible for the ttl
  pub fn tick(&mut self) {
    if let Some((_, shown_at)) = &self.current {
      if shown_at.elapsed() >= self.ttl {
        self.current = None;
      }
    }
  }

  pub fn dismiss(&mut self) {
    self.current = None;
  }

  pub fn render(&self, frame: &mut Frame, area: Rect) {
    let Some(notification) = self.current() else {
      return;
    };

    let (label, color) = match notification.level {
      NotificationLevel::Error => (" error ", Color::Red),
      NotificationLevel::Info => (" info ", Color::Blue),
    };

    let line = Line::from(vec![
      Span::styled(label, Style::default().bg(color).fg(Color::White).bold()),
      Span::raw(" "),
      Span::styled(notification.message.as_str(), Style::default().fg(color)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
  }
}
