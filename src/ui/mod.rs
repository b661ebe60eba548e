pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use crate::app::App;
use ratatui::prelude::*;
use ratatui::widgets::ListState;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let [header_area, content_area, toast_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(1),
    Constraint::Length(1),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  let shortcuts = app.current_view().map(|v| v.shortcuts()).unwrap_or_default();
  renderfns::draw_header(
    frame,
    header_area,
    &app.config().api.url,
    &app.context_label(),
    &shortcuts,
  );

  if let Some(view) = app.current_view_mut() {
    view.render(frame, content_area);
  }

  app.toast().render(frame, toast_area);
  renderfns::draw_footer(frame, footer_area, &app.breadcrumb());

  // Drawn last so it sits above the list
  if app.command().is_active() {
    app.command().render_overlay(frame, content_area);
  }
}

/// Keep the selection inside a list of `len` items, selecting the first
/// item when nothing is selected yet.
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  if len == 0 {
    state.select(None);
    return;
  }
  match state.selected() {
    Some(idx) if idx >= len => state.select(Some(len - 1)),
    None => state.select(Some(0)),
    _ => {}
  }
}
