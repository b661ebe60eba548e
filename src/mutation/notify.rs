//! User-visible notifications raised by mutations.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
  Info,
  Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  pub level: NotificationLevel,
  pub message: String,
}

impl Notification {
  pub fn info(message: impl Into<String>) -> Self {
    Self {
      level: NotificationLevel::Info,
      message: message.into(),
    }
  }

  pub fn error(message: impl Into<String>) -> Self {
    Self {
      level: NotificationLevel::Error,
      message: message.into(),
    }
  }
}

/// Sink for notifications (the TUI toast, or a recorder in tests).
pub trait Notifier: Send + Sync {
  fn notify(&self, notification: Notification);
}

#[cfg(test)]
pub use recording::RecordingNotifier;

#[cfg(test)]
mod recording {
  use super::{Notification, Notifier};
  use std::sync::Mutex;

  #[derive(Debug, Default)]
  pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
  }

  impl RecordingNotifier {
    pub fn new() -> Self {
      Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
      self.seen.lock().unwrap().clone()
    }
  }

  impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
      self.seen.lock().unwrap().push(notification);
    }
  }
}
