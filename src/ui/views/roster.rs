use chrono::{Local, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};
use tracing::warn;

use crate::codeforces::Transport;
use crate::commands::{describe_report, sorted};
use crate::export;
use crate::query::{Job, JobUpdate};
use crate::store::KeyValueStore;
use crate::students::Student;
use crate::sync::{should_auto_sync, SyncOutcome, SyncProgress, SyncReport};
use crate::tracker::{FullSync, Tracker};
use crate::ui::components::{KeyResult, Notices, SearchEvent, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{format_rating, rating_color, time_ago, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::StudentDetailView;

#[derive(Debug)]
enum SyncDone {
  One(SyncReport),
  All(FullSync),
}

/// The student table: filtering, syncing, reminders and deletion.
pub struct RosterView<S: KeyValueStore + 'static, T: Transport + 'static> {
  tracker: Tracker<S, T>,
  notices: Notices,
  /// Sorted by name
  students: Vec<Student>,
  load_error: Option<String>,
  filter: String,
  search: SearchInput,
  table_state: TableState,
  sync: Job<SyncProgress, SyncDone>,
  progress: Option<SyncProgress>,
  pending_delete: Option<Student>,
}

impl<S: KeyValueStore + 'static, T: Transport + 'static> RosterView<S, T> {
  pub fn new(tracker: Tracker<S, T>, notices: Notices) -> Self {
    let mut view = Self {
      tracker,
      notices,
      students: Vec::new(),
      load_error: None,
      filter: String::new(),
      search: SearchInput::new(),
      table_state: TableState::default(),
      sync: Job::new(),
      progress: None,
      pending_delete: None,
    };
    view.reload();
    view
  }

  fn reload(&mut self) {
    match self.tracker.students.list() {
      Ok(students) => {
        self.students = sorted(students);
        self.load_error = None;
      }
      Err(e) => {
        warn!(error = %e, "Failed to load students");
        self.load_error = Some(e.to_string());
      }
    }
  }

  /// Students whose name contains the filter, case-insensitively.
  fn visible(&self) -> Vec<&Student> {
    let needle = self.filter.trim().to_lowercase();
    self
      .students
      .iter()
      .filter(|s| needle.is_empty() || s.name.to_lowercase().contains(&needle))
      .collect()
  }

  fn selected(&self) -> Option<Student> {
    let index = self.table_state.selected()?;
    self.visible().get(index).map(|s| (*s).clone())
  }

  /// Start a full sync when the schedule says one is due.
  pub fn auto_sync_if_due(&mut self) -> bool {
    let settings = self.tracker.sync_state.settings();
    let last = self.tracker.sync_state.last_global_sync();
    if !should_auto_sync(last, &settings, &Local::now(), self.students.len()) {
      return false;
    }

    if last.is_some() {
      self.start_full_sync("Auto-syncing all students in background...")
    } else {
      self.start_full_sync("Performing initial data sync for all students...")
    }
  }

  fn sync_all(&mut self) -> bool {
    self.start_full_sync("Starting global data refresh from Codeforces...")
  }

  fn start_full_sync(&mut self, announcement: &str) -> bool {
    let tracker = self.tracker.clone();
    let started = self.sync.start(move |progress| async move {
      tracker
        .sync_all_and_remind(progress)
        .await
        .map(SyncDone::All)
        .map_err(|e| e.to_string())
    });

    if started {
      self.notices.info(announcement);
    } else {
      self.notices.warn("A sync is already running.");
    }
    started
  }

  fn sync_selected(&mut self) -> bool {
    let student = match self.selected() {
      Some(student) => student,
      None => return false,
    };

    let tracker = self.tracker.clone();
    let name = student.name.clone();
    let started = self.sync.start(move |mut progress| async move {
      progress(SyncProgress {
        index: 0,
        total: 1,
        name: student.name.clone(),
      });
      Ok(SyncDone::One(
        tracker.synchronizer.sync_student(&student, true).await,
      ))
    });

    if started {
      self.notices.info(format!("Syncing {}...", name));
    } else {
      self.notices.warn("A sync is already running.");
    }
    started
  }

  fn finish_sync(&mut self, result: Result<SyncDone, String>) {
    self.progress = None;
    match result {
      Ok(SyncDone::One(report)) => match report.outcome {
        SyncOutcome::Complete => self.notices.success(describe_report(&report)),
        SyncOutcome::Partial(_) => self.notices.warn(describe_report(&report)),
        SyncOutcome::Failed(_) => self.notices.error(describe_report(&report)),
      },
      Ok(SyncDone::All(result)) => {
        for reminder in &result.reminders {
          self.notices.warn(reminder.message.clone());
        }
        let failed = result
          .reports
          .iter()
          .filter(|r| matches!(r.outcome, SyncOutcome::Failed(_)))
          .count();
        if failed == 0 {
          self
            .notices
            .success("Global sync completed. Inactivity checks performed.");
        } else {
          self.notices.warn(format!(
            "Global sync completed; {} of {} students could not be synced.",
            failed,
            result.reports.len()
          ));
        }
      }
      Err(e) => self
        .notices
        .error(format!("Global sync failed: {}", e)),
    }
    self.reload();
  }

  fn toggle_reminders(&mut self) {
    let student = match self.selected() {
      Some(student) => student,
      None => return,
    };

    let disabled = !student.reminders_disabled;
    match self.tracker.students.set_reminders_disabled(student.id, disabled) {
      Ok(updated) => {
        let state = if updated.reminders_disabled { "disabled" } else { "enabled" };
        self
          .notices
          .success(format!("Reminders {} for {}.", state, updated.name));
      }
      Err(e) => self.notices.error(format!(
        "Failed to update reminder status for {}: {}",
        student.name, e
      )),
    }
    self.reload();
  }

  fn confirm_delete(&mut self) {
    let student = match self.pending_delete.take() {
      Some(student) => student,
      None => return,
    };
    if self.sync.is_running() {
      self.notices.warn("Wait for the running sync to finish.");
      return;
    }

    match self.tracker.students.delete(student.id) {
      Ok(removed) => self.notices.success(format!("Deleted {}.", removed.name)),
      Err(e) => self.notices.error(format!("Failed to delete {}: {}", student.name, e)),
    }
    self.reload();
  }

  fn remind(&mut self) {
    let reminders = self.tracker.notifier.scan(&self.students, Utc::now());
    if reminders.is_empty() {
      self.notices.success("No inactive students.");
    }
    for reminder in reminders {
      self.notices.warn(reminder.message);
    }
    self.reload();
  }

  fn export(&mut self) {
    let path = std::path::Path::new(export::DEFAULT_EXPORT_FILE);
    match export::write_roster_csv(&self.students, path) {
      Ok(()) => self
        .notices
        .success(format!("Exported {} students to {}.", self.students.len(), path.display())),
      Err(e) => self.notices.error(e.to_string()),
    }
  }

  fn render_table(&mut self, frame: &mut Frame, area: Rect) {
    let now = Utc::now();
    let len = self.visible().len();
    ensure_valid_selection(&mut self.table_state, len);

    let title = if self.filter.is_empty() {
      format!(" Students ({}) ", self.students.len())
    } else {
      format!(" Students ({}/{}) [/{}] ", len, self.students.len(), self.filter)
    };
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 {
      let text = if let Some(e) = &self.load_error {
        format!("Failed to load students: {}", e)
      } else if self.students.is_empty() {
        "No students yet. Add one with `cftrack add --name <name> --handle <handle>`.".to_string()
      } else {
        "No students match the filter.".to_string()
      };
      let paragraph = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let header = Row::new(vec![
      "Name",
      "Handle",
      "Rating",
      "Max",
      "Last synced",
      "Last submission",
      "Reminders",
    ])
    .style(Style::default().fg(Color::DarkGray).bold());

    let rows: Vec<Row> = self
      .visible()
      .into_iter()
      .map(|s| {
        let reminders = if s.reminders_disabled {
          Cell::from("off").style(Style::default().fg(Color::DarkGray))
        } else {
          Cell::from(s.reminder_count.to_string())
        };
        Row::new(vec![
          Cell::from(truncate(&s.name, 24)),
          Cell::from(truncate(&s.handle, 20)).style(Style::default().fg(rating_color(s.current_rating))),
          Cell::from(format_rating(s.current_rating)).style(Style::default().fg(rating_color(s.current_rating))),
          Cell::from(format_rating(s.max_rating)).style(Style::default().fg(rating_color(s.max_rating))),
          Cell::from(time_ago(s.last_synced_at, now)),
          Cell::from(time_ago(s.last_submission_at, now)),
          reminders,
        ])
      })
      .collect();

    let widths = [
      Constraint::Min(16),
      Constraint::Length(20),
      Constraint::Length(7),
      Constraint::Length(7),
      Constraint::Length(12),
      Constraint::Length(16),
      Constraint::Length(9),
    ];
    let table = Table::new(rows, widths)
      .header(header)
      .block(block)
      .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");

    frame.render_stateful_widget(table, area, &mut self.table_state);
  }

  fn render_delete_prompt(&self, frame: &mut Frame, area: Rect) {
    let student = match &self.pending_delete {
      Some(student) => student,
      None => return,
    };

    let width = area.width.min(56);
    let popup = Rect::new(
      area.x + (area.width - width) / 2,
      area.y + (area.height / 2).saturating_sub(2),
      width,
      area.height.min(5),
    );
    frame.render_widget(Clear, popup);

    let text = vec![
      Line::from(format!("Delete {} ({})?", student.name, student.handle)),
      Line::from(Span::styled(
        "This cannot be undone.  y: delete  n: cancel",
        Style::default().fg(Color::DarkGray),
      )),
    ];
    let paragraph = Paragraph::new(text).block(
      Block::default()
        .title(" Confirm ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red)),
    );
    frame.render_widget(paragraph, popup);
  }
}

impl<S: KeyValueStore + 'static, T: Transport + 'static> View for RosterView<S, T> {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.pending_delete.is_some() {
      match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => self.confirm_delete(),
        _ => self.pending_delete = None,
      }
      return ViewAction::None;
    }

    match self.search.handle_key(key) {
      KeyResult::Event(SearchEvent::Changed(filter)) => {
        self.filter = filter;
        self.table_state.select(Some(0));
        return ViewAction::None;
      }
      KeyResult::Event(SearchEvent::Submitted) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.table_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.table_state.select_previous(),
      KeyCode::Enter => {
        if let Some(student) = self.selected() {
          return ViewAction::Push(Box::new(StudentDetailView::new(
            student,
            self.tracker.clone(),
            self.notices.clone(),
          )));
        }
      }
      KeyCode::Char('s') => {
        self.sync_selected();
      }
      KeyCode::Char('S') => {
        self.sync_all();
      }
      KeyCode::Char('n') | KeyCode::Char('d') | KeyCode::Char('R') if self.sync.is_running() => {
        self.notices.warn("Wait for the running sync to finish.");
      }
      KeyCode::Char('n') => self.toggle_reminders(),
      KeyCode::Char('d') => self.pending_delete = self.selected(),
      KeyCode::Char('R') => self.remind(),
      KeyCode::Char('x') => self.export(),
      KeyCode::Char('r') => self.reload(),
      KeyCode::Esc if !self.filter.is_empty() => self.filter.clear(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_table(frame, area);
    self.search.render_overlay(frame, area);
    self.render_delete_prompt(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Students".to_string()
  }

  fn context(&self) -> String {
    format!("{} students", self.students.len())
  }

  fn tick(&mut self) {
    for update in self.sync.poll() {
      match update {
        JobUpdate::Progress(progress) => self.progress = Some(progress),
        JobUpdate::Done(result) => self.finish_sync(result),
      }
    }
  }

  fn resume(&mut self) {
    self.reload();
  }

  fn status(&self) -> Option<String> {
    if !self.sync.is_running() {
      return None;
    }
    Some(match &self.progress {
      Some(p) => format!("Syncing {}/{}: {}", p.index + 1, p.total, p.name),
      None => "Syncing...".to_string(),
    })
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("/", "filter").with_priority(10),
      ShortcutInfo::new("s", "sync").with_priority(20),
      ShortcutInfo::new("S", "sync all").with_priority(30),
      ShortcutInfo::new("n", "reminders").with_priority(40),
      ShortcutInfo::new("R", "remind").with_priority(50),
      ShortcutInfo::new("d", "delete").with_priority(60),
      ShortcutInfo::new("x", "export").with_priority(70),
      ShortcutInfo::new("q", "quit").with_priority(200),
    ]
  }
}
