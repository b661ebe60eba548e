use crate::api::Priority;
use crate::cache::CacheSource;
use ratatui::prelude::Color;

/// Truncate a string to at most `max_len` characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Title suffix telling the user where the list came from
pub fn source_label(source: CacheSource) -> String {
  match source {
    CacheSource::Network => String::new(),
    CacheSource::CacheFresh => " (cached)".to_string(),
    CacheSource::Offline => " (offline)".to_string(),
  }
}

pub fn priority_color(priority: Option<Priority>) -> Color {
  match priority {
    Some(Priority::High) => Color::Red,
    Some(Priority::Medium) => Color::Yellow,
    Some(Priority::Low) => Color::Green,
    None => Color::DarkGray,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("läuft über den berg", 8), "läuft...");
  }

  #[test]
  fn test_source_label() {
    assert_eq!(source_label(CacheSource::Network), "");
    assert_eq!(source_label(CacheSource::CacheFresh), " (cached)");
    assert_eq!(source_label(CacheSource::Offline), " (offline)");
  }

  #[test]
  fn test_priority_color() {
    assert_eq!(priority_color(Some(Priority::High)), Color::Red);
    assert_eq!(priority_color(None), Color::DarkGray);
  }
}
