use crossterm::event::KeyEvent;
use ratatui::prelude::*;

/// A key hint shown in the header.
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  /// Lower is shown first
  pub priority: u8,
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// What the app should do after a view handled a key.
pub enum ViewAction {
  None,
  Push(Box<dyn View>),
  /// Go back; quits from the root view
  Pop,
}

/// A screen on the app's view stack.
///
/// Views own their data and background work; the app only routes keys,
/// forwards ticks, and draws the chrome around them.
pub trait View {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  fn render(&mut self, frame: &mut Frame, area: Rect);

  fn breadcrumb_label(&self) -> String;

  /// Short context for the header, e.g. the roster size
  fn context(&self) -> String {
    self.breadcrumb_label()
  }

  /// Poll background work. Called on every tick, for every view on the stack.
  fn tick(&mut self) {}

  /// Called when the view is back on top after the one above it was popped.
  fn resume(&mut self) {}

  /// Status line text, e.g. sync progress
  fn status(&self) -> Option<String> {
    None
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![ShortcutInfo::new("q", "back").with_priority(200)]
  }
}
