use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the footer: view breadcrumb on the left, global keys on the right
pub fn draw_footer(frame: &mut Frame, area: Rect, breadcrumb: &[String]) {
  let last = breadcrumb.len().saturating_sub(1);
  let mut spans = vec![Span::raw(" ")];

  for (i, part) in breadcrumb.iter().enumerate() {
    if i > 0 {
      spans.push(Span::styled(" > ", Style::default().fg(Color::DarkGray)));
    }
    let style = if i == last {
      Style::default().fg(Color::Cyan).bold()
    } else {
      Style::default().fg(Color::White)
    };
    spans.push(Span::styled(part.as_str(), style));
  }

  let [left, right] =
    Layout::horizontal([Constraint::Min(0), Constraint::Length(28)]).areas(area);

  frame.render_widget(
    Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black)),
    left,
  );
  frame.render_widget(
    Paragraph::new("x dismiss  ctrl-c quit ")
      .alignment(Alignment::Right)
      .style(Style::default().bg(Color::Black).fg(Color::DarkGray)),
    right,
  );
}
