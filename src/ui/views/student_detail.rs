use chrono::{Duration, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::symbols;
use ratatui::widgets::{
  Axis, BarChart, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, TableState,
};

use crate::codeforces::{Submission, Transport};
use crate::commands::describe_report;
use crate::contests::{fetch_contest_details, ContestDetails, ContestHistory, ContestWindow, DETAILS_BATCH};
use crate::query::{Job, JobUpdate, Query};
use crate::stats::{ProblemStats, ProblemWindow, STATS_SUBMISSION_COUNT};
use crate::store::KeyValueStore;
use crate::students::Student;
use crate::sync::{SyncOutcome, SyncReport};
use crate::tracker::Tracker;
use crate::ui::components::Notices;
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{format_rating, format_time, rating_color, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};

/// Profile, contest history and problem stats of one student.
pub struct StudentDetailView<S: KeyValueStore + 'static, T: Transport + 'static> {
  student: Student,
  tracker: Tracker<S, T>,
  notices: Notices,
  history: Query<ContestHistory>,
  /// Batch of contest details in flight
  details: Option<Query<Vec<ContestDetails>>>,
  submissions: Query<Vec<Submission>>,
  contest_window: ContestWindow,
  problem_window: ProblemWindow,
  stats: Option<ProblemStats>,
  table_state: TableState,
  sync: Job<(), SyncReport>,
}

impl<S: KeyValueStore + 'static, T: Transport + 'static> StudentDetailView<S, T> {
  pub fn new(student: Student, tracker: Tracker<S, T>, notices: Notices) -> Self {
    let history = {
      let client = tracker.client.clone();
      let handle = student.handle.clone();
      Query::new(move |force| {
        let client = client.clone();
        let handle = handle.clone();
        async move {
          client
            .rating_history(&handle, force)
            .await
            .map(ContestHistory::new)
            .map_err(|e| e.to_string())
        }
      })
    };

    let submissions = {
      let client = tracker.client.clone();
      let handle = student.handle.clone();
      Query::new(move |force| {
        let client = client.clone();
        let handle = handle.clone();
        async move {
          client
            .submissions(&handle, STATS_SUBMISSION_COUNT, force)
            .await
            .map_err(|e| e.to_string())
        }
      })
    };

    let mut view = Self {
      student,
      tracker,
      notices,
      history,
      details: None,
      submissions,
      contest_window: ContestWindow::default(),
      problem_window: ProblemWindow::default(),
      stats: None,
      table_state: TableState::default(),
      sync: Job::new(),
    };
    view.history.fetch();
    view.submissions.fetch();
    view
  }

  fn details_loading(&self) -> bool {
    self.details.as_ref().is_some_and(|q| q.is_loading())
  }

  /// Request details for the next batch of in-window contests.
  fn load_more(&mut self, force: bool) {
    if self.details_loading() {
      return;
    }
    let history = match self.history.data() {
      Some(history) => history,
      None => return,
    };

    let batch = history.pending_batch(Utc::now(), DETAILS_BATCH);
    if batch.is_empty() {
      return;
    }

    let client = self.tracker.client.clone();
    let handle = self.student.handle.clone();
    let mut query = Query::new(move |force| {
      let client = client.clone();
      let handle = handle.clone();
      let batch = batch.clone();
      async move {
        fetch_contest_details(&client, &handle, &batch, force)
          .await
          .map_err(|e| e.to_string())
      }
    });
    if force {
      query.refetch();
    } else {
      query.fetch();
    }
    self.details = Some(query);
  }

  fn cycle_contest_window(&mut self) {
    self.contest_window = self.contest_window.next();
    let now = Utc::now();
    let needs_details = match self.history.data_mut() {
      Some(history) => {
        history.set_window(self.contest_window);
        history.detailed(now).is_empty() && history.has_more(now)
      }
      None => false,
    };
    self.table_state.select(Some(0));
    if needs_details {
      self.load_more(false);
    }
  }

  fn cycle_problem_window(&mut self) {
    self.problem_window = self.problem_window.next();
    self.recompute_stats();
  }

  fn recompute_stats(&mut self) {
    self.stats = self
      .submissions
      .data()
      .map(|subs| ProblemStats::compute(subs, self.problem_window, Utc::now()));
  }

  fn refresh(&mut self) {
    self.details = None;
    self.history.refetch();
    self.submissions.refetch();
  }

  fn start_sync(&mut self) {
    let tracker = self.tracker.clone();
    let student = self.student.clone();
    let started = self.sync.start(move |_| async move {
      Ok(tracker.synchronizer.sync_student(&student, true).await)
    });

    if started {
      self.notices.info(format!("Syncing {}...", self.student.name));
    } else {
      self.notices.warn("A sync is already running.");
    }
  }

  fn finish_sync(&mut self, report: SyncReport) {
    match &report.outcome {
      SyncOutcome::Complete => self.notices.success(describe_report(&report)),
      SyncOutcome::Partial(_) => self.notices.warn(describe_report(&report)),
      SyncOutcome::Failed(_) => self.notices.error(describe_report(&report)),
    }
    if !matches!(report.outcome, SyncOutcome::Failed(_)) {
      self.student = report.student;
      self.refresh();
    }
  }

  fn render_profile(&self, frame: &mut Frame, area: Rect) {
    let s = &self.student;
    let label = Style::default().fg(Color::DarkGray);
    let reminders = if s.reminders_disabled {
      format!("{} sent, disabled", s.reminder_count)
    } else {
      format!("{} sent", s.reminder_count)
    };

    let lines = vec![
      Line::from(vec![
        Span::styled("Handle:   ", label),
        Span::styled(s.handle.clone(), Style::default().fg(rating_color(s.current_rating)).bold()),
      ]),
      Line::from(vec![Span::styled("Email:    ", label), Span::raw(or_dash(&s.email))]),
      Line::from(vec![Span::styled("Phone:    ", label), Span::raw(or_dash(&s.phone))]),
      Line::from(vec![
        Span::styled("Rating:   ", label),
        Span::styled(format_rating(s.current_rating), Style::default().fg(rating_color(s.current_rating))),
        Span::styled("  max ", label),
        Span::styled(format_rating(s.max_rating), Style::default().fg(rating_color(s.max_rating))),
      ]),
      Line::from(vec![Span::styled("Synced:   ", label), Span::raw(format_time(s.last_synced_at))]),
      Line::from(vec![Span::styled("Active:   ", label), Span::raw(format_time(s.last_submission_at))]),
      Line::from(vec![Span::styled("Reminders:", label), Span::raw(format!(" {}", reminders))]),
    ];

    let paragraph = Paragraph::new(lines).block(
      Block::default()
        .title(format!(" {} ", s.name))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue)),
    );
    frame.render_widget(paragraph, area);
  }

  fn render_problem_stats(&self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(format!(" Problems · {} ", self.problem_window.label()))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let stats = match (&self.stats, self.submissions.error()) {
      (_, Some(e)) => {
        let p = Paragraph::new(format!("Failed to load submissions: {}", e))
          .block(block)
          .style(Style::default().fg(Color::Red));
        frame.render_widget(p, area);
        return;
      }
      (Some(stats), None) => stats,
      (None, None) => {
        let p = Paragraph::new("Loading submissions...")
          .block(block)
          .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(p, area);
        return;
      }
    };

    let label = Style::default().fg(Color::DarkGray);
    let tags = stats
      .top_tags
      .iter()
      .take(5)
      .map(|(tag, n)| format!("{} ({})", tag, n))
      .collect::<Vec<_>>()
      .join(", ");
    let mut lines = vec![
      Line::from(vec![
        Span::styled("Solved:        ", label),
        Span::raw(stats.total_solved.to_string()),
      ]),
      Line::from(vec![
        Span::styled("Hardest:       ", label),
        Span::styled(
          format_rating(stats.most_difficult),
          Style::default().fg(rating_color(stats.most_difficult)),
        ),
      ]),
      Line::from(vec![
        Span::styled("Avg rating:    ", label),
        Span::raw(stats.average_rating.to_string()),
      ]),
      Line::from(vec![
        Span::styled("Per day:       ", label),
        Span::raw(format!("{:.2}", stats.average_per_day)),
      ]),
      Line::from(vec![
        Span::styled("Submissions:   ", label),
        Span::raw(stats.submissions_in_window.to_string()),
      ]),
      Line::from(vec![Span::styled("Tags:          ", label), Span::raw(or_dash(&tags))]),
    ];
    lines.push(self.heatmap_line(stats, area.width.saturating_sub(2) as usize));

    frame.render_widget(Paragraph::new(lines).block(block), area);
  }

  /// One cell per day, oldest on the left, shaded by submission count.
  fn heatmap_line(&self, stats: &ProblemStats, width: usize) -> Line<'static> {
    let days = (self.problem_window.days() as usize).min(width);
    let today = Utc::now().date_naive();
    let cells = (0..days).rev().map(|offset| {
      let day = today - Duration::days(offset as i64);
      let count = stats.heatmap.get(&day).copied().unwrap_or(0);
      let color = match count {
        0 => Color::DarkGray,
        1..=2 => Color::Green,
        3..=5 => Color::LightGreen,
        _ => Color::Yellow,
      };
      Span::styled("■", Style::default().fg(color))
    });
    Line::from(cells.collect::<Vec<_>>())
  }

  fn render_rating_chart(&self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(format!(" Rating · {} ", self.contest_window.label()))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let series = self
      .history
      .data()
      .map(|h| h.rating_series(Utc::now()))
      .unwrap_or_default();
    if series.is_empty() {
      let text = if self.history.is_loading() {
        "Loading rating history..."
      } else {
        "No rated contests in this window."
      };
      let p = Paragraph::new(text).block(block).style(Style::default().fg(Color::DarkGray));
      frame.render_widget(p, area);
      return;
    }

    let points: Vec<(f64, f64)> = series
      .iter()
      .map(|p| (p.at.timestamp() as f64, p.rating as f64))
      .collect();
    let (min_x, max_x) = (points[0].0, points[points.len() - 1].0.max(points[0].0 + 1.0));
    let min_y = series.iter().map(|p| p.rating).min().unwrap_or(0) - 100;
    let max_y = series.iter().map(|p| p.rating).max().unwrap_or(0) + 100;
    let first = series[0].at.format("%Y-%m-%d").to_string();
    let last = series[series.len() - 1].at.format("%Y-%m-%d").to_string();

    let dataset = Dataset::default()
      .marker(symbols::Marker::Braille)
      .graph_type(GraphType::Line)
      .style(Style::default().fg(Color::Cyan))
      .data(&points);
    let chart = Chart::new(vec![dataset])
      .block(block)
      .x_axis(
        Axis::default()
          .bounds([min_x, max_x])
          .labels(vec![Span::raw(first), Span::raw(last)])
          .style(Style::default().fg(Color::DarkGray)),
      )
      .y_axis(
        Axis::default()
          .bounds([min_y as f64, max_y as f64])
          .labels(vec![Span::raw(min_y.to_string()), Span::raw(max_y.to_string())])
          .style(Style::default().fg(Color::DarkGray)),
      );
    frame.render_widget(chart, area);
  }

  fn render_buckets(&self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(" Solved by rating ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let stats = match &self.stats {
      Some(stats) if stats.buckets.iter().any(|b| b.count > 0) => stats,
      _ => {
        let p = Paragraph::new("No rated problems solved in this window.")
          .block(block)
          .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(p, area);
        return;
      }
    };

    let bars: Vec<(&str, u64)> = stats
      .buckets
      .iter()
      .map(|b| (b.label.as_str(), b.count as u64))
      .collect();
    let chart = BarChart::default()
      .block(block)
      .data(bars.as_slice())
      .bar_width(9)
      .bar_gap(1)
      .bar_style(Style::default().fg(Color::Green))
      .value_style(Style::default().fg(Color::Black).bg(Color::Green));
    frame.render_widget(chart, area);
  }

  fn render_contests(&mut self, frame: &mut Frame, area: Rect) {
    let now = Utc::now();
    let mut title = format!(" Contests · {} ", self.contest_window.label());
    if self.details_loading() {
      title.push_str("· loading... ");
    } else if self.history.data().is_some_and(|h| h.has_more(now)) {
      title.push_str("· m: load more ");
    }
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if let Some(e) = self.history.error() {
      let p = Paragraph::new(format!("Failed to load contest history: {}", e))
        .block(block)
        .style(Style::default().fg(Color::Red));
      frame.render_widget(p, area);
      return;
    }
    let details_error = self.details.as_ref().and_then(|q| q.error()).map(str::to_string);

    let history = match self.history.data() {
      Some(history) => history,
      None => {
        let p = Paragraph::new("Loading contest history...")
          .block(block)
          .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(p, area);
        return;
      }
    };

    let detailed = history.detailed(now);
    if detailed.is_empty() {
      let text = match details_error {
        Some(e) => format!("Failed to load contest details: {}", e),
        None if history.in_window(now).is_empty() => "No contests in this window.".to_string(),
        None => "Loading contest details...".to_string(),
      };
      let p = Paragraph::new(text).block(block).style(Style::default().fg(Color::DarkGray));
      frame.render_widget(p, area);
      return;
    }

    let header = Row::new(vec!["Contest", "Date", "Rank", "Change", "Rating", "Solved", "Unsolved"])
      .style(Style::default().fg(Color::DarkGray).bold());
    let rows: Vec<Row> = detailed
      .iter()
      .map(|d| {
        let delta = d.delta();
        let delta_style = if delta >= 0 {
          Style::default().fg(Color::Green)
        } else {
          Style::default().fg(Color::Red)
        };
        let (solved, unsolved) = match &d.details_error {
          Some(_) => (
            Cell::from("?").style(Style::default().fg(Color::Red)),
            Cell::from("unavailable").style(Style::default().fg(Color::Red)),
          ),
          None => (
            Cell::from(format!("{}/{}", d.solved, d.total)),
            Cell::from(d.unsolved.to_string()),
          ),
        };
        Row::new(vec![
          Cell::from(truncate(&d.contest_name, 48)),
          Cell::from(d.updated_at.format("%Y-%m-%d").to_string()),
          Cell::from(d.rank.to_string()),
          Cell::from(format!("{:+}", delta)).style(delta_style),
          Cell::from(d.new_rating.to_string()).style(Style::default().fg(rating_color(Some(d.new_rating)))),
          solved,
          unsolved,
        ])
      })
      .collect();
    let len = rows.len();

    let widths = [
      Constraint::Min(20),
      Constraint::Length(10),
      Constraint::Length(7),
      Constraint::Length(7),
      Constraint::Length(7),
      Constraint::Length(9),
      Constraint::Length(11),
    ];
    let table = Table::new(rows, widths)
      .header(header)
      .block(block)
      .row_highlight_style(Style::default().bg(Color::DarkGray))
      .highlight_symbol("> ");

    ensure_valid_selection(&mut self.table_state, len);
    frame.render_stateful_widget(table, area, &mut self.table_state);
  }
}

fn or_dash(s: &str) -> String {
  if s.trim().is_empty() {
    "-".to_string()
  } else {
    s.to_string()
  }
}

impl<S: KeyValueStore + 'static, T: Transport + 'static> View for StudentDetailView<S, T> {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      KeyCode::Char('j') | KeyCode::Down => self.table_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.table_state.select_previous(),
      KeyCode::Char('w') => self.cycle_contest_window(),
      KeyCode::Char('p') => self.cycle_problem_window(),
      KeyCode::Char('m') => self.load_more(false),
      KeyCode::Char('r') => self.refresh(),
      KeyCode::Char('s') => self.start_sync(),
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let rows = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(9),
        Constraint::Length(10),
        Constraint::Min(6),
      ])
      .split(area);
    let top = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
      .split(rows[0]);
    let charts = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
      .split(rows[1]);

    self.render_profile(frame, top[0]);
    self.render_problem_stats(frame, top[1]);
    self.render_rating_chart(frame, charts[0]);
    self.render_buckets(frame, charts[1]);
    self.render_contests(frame, rows[2]);
  }

  fn breadcrumb_label(&self) -> String {
    self.student.name.clone()
  }

  fn context(&self) -> String {
    format!("{} ({})", self.student.name, self.student.handle)
  }

  fn tick(&mut self) {
    if self.history.poll() {
      match self.history.data_mut() {
        Some(history) => {
          history.set_window(self.contest_window);
          self.load_more(false);
        }
        None => {
          if let Some(e) = self.history.error() {
            self
              .notices
              .error(format!("Failed to load contest history for {}: {}", self.student.handle, e));
          }
        }
      }
    }

    let finished = self.details.as_mut().is_some_and(|q| q.poll());
    if finished {
      if let Some(query) = self.details.take() {
        match query.state().data() {
          Some(details) => {
            if let Some(history) = self.history.data_mut() {
              history.merge(details.clone());
            }
          }
          None => {
            if let Some(e) = query.error() {
              self.notices.error(format!("Failed to load contest details: {}", e));
            }
            self.details = Some(query);
          }
        }
      }
    }

    if self.submissions.poll() {
      self.recompute_stats();
      if let Some(e) = self.submissions.error() {
        self
          .notices
          .error(format!("Failed to load submissions for {}: {}", self.student.handle, e));
      }
    }

    for update in self.sync.poll() {
      match update {
        JobUpdate::Progress(()) => {}
        JobUpdate::Done(Ok(report)) => self.finish_sync(report),
        JobUpdate::Done(Err(e)) => self.notices.error(e),
      }
    }
  }

  fn status(&self) -> Option<String> {
    if self.sync.is_running() {
      Some(format!("Syncing {}...", self.student.name))
    } else if self.history.is_loading() || self.submissions.is_loading() {
      Some("Loading from Codeforces...".to_string())
    } else if self.details_loading() {
      Some("Loading contest details...".to_string())
    } else {
      None
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("w", "contest range").with_priority(10),
      ShortcutInfo::new("p", "problem range").with_priority(20),
      ShortcutInfo::new("m", "more contests").with_priority(30),
      ShortcutInfo::new("r", "refresh").with_priority(40),
      ShortcutInfo::new("s", "sync").with_priority(50),
      ShortcutInfo::new("q", "back").with_priority(200),
    ]
  }
}
