use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Footer bar: view breadcrumb, plus a status message on the right.
pub fn draw_footer(frame: &mut Frame, area: Rect, breadcrumb: &[String], status: Option<&str>) {
  let mut spans = vec![Span::raw(" ")];

  for (i, part) in breadcrumb.iter().enumerate() {
    if i > 0 {
      spans.push(Span::styled(" > ", Style::default().fg(Color::DarkGray)));
    }

    let style = if i == breadcrumb.len() - 1 {
      Style::default().fg(Color::Cyan).bold()
    } else {
      Style::default().fg(Color::White)
    };
    spans.push(Span::styled(part.clone(), style));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);

  if let Some(status) = status {
    let status = Paragraph::new(format!("{} ", status))
      .alignment(Alignment::Right)
      .style(Style::default().fg(Color::Yellow).bg(Color::Black));
    frame.render_widget(status, area);
  }
}
