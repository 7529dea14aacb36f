use crate::event::{Event, EventHandler};
use crate::tracker::LiveTracker;
use crate::ui;
use crate::ui::components::{Banner, Notice, Notices};
use crate::ui::view::{View, ViewAction};
use crate::ui::views::RosterView;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::info;

/// Main application state
pub struct App {
  /// Navigation stack - the roster is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// Notice currently shown above the footer, plus the queue behind it
  banner: Banner,

  /// Notices posted by views and their background work
  notices_rx: mpsc::UnboundedReceiver<Notice>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  /// Build the root view. Must run inside the tokio runtime: an auto-sync
  /// may start right away.
  pub fn new(tracker: LiveTracker) -> Self {
    let (notices, notices_rx) = Notices::channel();
    let mut roster = RosterView::new(tracker, notices);
    if roster.auto_sync_if_due() {
      info!("Started scheduled sync");
    }

    Self {
      view_stack: vec![Box::new(roster)],
      banner: Banner::new(),
      notices_rx,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let result = self.event_loop().await;

    // Cleanup terminal, even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(&mut self) -> Result<()> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    let mut events = EventHandler::new(Duration::from_millis(250));

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key),
        Some(Event::Tick) => self.tick(),
        None => break,
      }
    }
    Ok(())
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
      match key.code {
        KeyCode::Char('c') => {
          self.should_quit = true;
          return;
        }
        KeyCode::Char('x') => {
          self.banner.dismiss();
          return;
        }
        _ => {}
      }
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::Pop,
    };
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
          if let Some(view) = self.view_stack.last_mut() {
            view.resume();
          }
        } else {
          self.should_quit = true;
        }
      }
    }
  }

  fn tick(&mut self) {
    // Views below the top keep their background work going
    for view in &mut self.view_stack {
      view.tick();
    }

    while let Ok(notice) = self.notices_rx.try_recv() {
      self.banner.push(notice);
    }
    self.banner.tick(Instant::now());
  }

  // Accessors for UI rendering
  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut (dyn View + 'static)> {
    self.view_stack.last_mut().map(|v| v.as_mut())
  }

  pub fn banner(&self) -> &Banner {
    &self.banner
  }

  /// Status of the topmost view that has one, so a sync started on the
  /// roster stays visible from a detail view.
  pub fn status(&self) -> Option<String> {
    self.view_stack.iter().rev().find_map(|v| v.status())
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }
}
