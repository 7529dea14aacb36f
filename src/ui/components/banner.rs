use ratatui::prelude::*;
use ratatui::widgets::Paragraph;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
  Info,
  Success,
  Warning,
  Error,
}

impl Level {
  fn color(self) -> Color {
    match self {
      Level::Info => Color::Cyan,
      Level::Success => Color::Green,
      Level::Warning => Color::Yellow,
      Level::Error => Color::Red,
    }
  }

  fn lifetime(self) -> Duration {
    match self {
      Level::Info | Level::Success => Duration::from_secs(5),
      Level::Warning | Level::Error => Duration::from_secs(10),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
  pub level: Level,
  pub text: String,
}

/// Handle views use to post notices to the banner.
#[derive(Debug, Clone)]
pub struct Notices {
  tx: mpsc::UnboundedSender<Notice>,
}

impl Notices {
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx }, rx)
  }

  pub fn post(&self, level: Level, text: impl Into<String>) {
    let _ = self.tx.send(Notice {
      level,
      text: text.into(),
    });
  }

  pub fn info(&self, text: impl Into<String>) {
    self.post(Level::Info, text);
  }

  pub fn success(&self, text: impl Into<String>) {
    self.post(Level::Success, text);
  }

  pub fn warn(&self, text: impl Into<String>) {
    self.post(Level::Warning, text);
  }

  pub fn error(&self, text: impl Into<String>) {
    self.post(Level::Error, text);
  }
}

/// Transient one-line notices, shown one at a time in arrival order.
#[derive(Debug, Default)]
pub struct Banner {
  queue: VecDeque<Notice>,
  /// When the front notice started showing
  shown_at: Option<Instant>,
}

impl Banner {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, notice: Notice) {
    self.queue.push_back(notice);
  }

  /// Drop the current notice once it has been up for its lifetime.
  pub fn tick(&mut self, now: Instant) {
    let front = match self.queue.front() {
      Some(notice) => notice,
      None => return,
    };

    match self.shown_at {
      None => self.shown_at = Some(now),
      Some(at) if now.duration_since(at) >= front.level.lifetime() => {
        self.queue.pop_front();
        self.shown_at = if self.queue.is_empty() { None } else { Some(now) };
      }
      Some(_) => {}
    }
  }

  /// Dismiss the current notice.
  pub fn dismiss(&mut self) {
    self.queue.pop_front();
    self.shown_at = None;
  }

  pub fn current(&self) -> Option<&Notice> {
    self.queue.front()
  }

  pub fn render(&self, frame: &mut Frame, area: Rect) {
    let notice = match self.current() {
      Some(notice) => notice,
      None => return,
    };

    let more = if self.queue.len() > 1 {
      format!("  (+{} more, Ctrl-X to dismiss)", self.queue.len() - 1)
    } else {
      String::new()
    };
    let line = Line::from(vec![
      Span::styled(
        format!(" {} ", notice.text),
        Style::default().fg(Color::Black).bg(notice.level.color()),
      ),
      Span::styled(more, Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
  }
}
