//! Non-interactive subcommands.

use chrono::{DateTime, Local, Utc};
use clap::{Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;

use crate::codeforces::Transport;
use crate::contests::{fetch_contest_details, ContestHistory, ContestWindow, DETAILS_BATCH};
use crate::export;
use crate::stats::{ProblemStats, ProblemWindow, STATS_SUBMISSION_COUNT};
use crate::store::KeyValueStore;
use crate::students::{NewStudent, Student, StudentChanges};
use crate::sync::{should_auto_sync, SyncOutcome, SyncReport, SyncSettings};
use crate::tracker::Tracker;
use crate::ui::renderfns::truncate;

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Interactive dashboard (default)
  Dashboard,
  /// List students
  List,
  /// Add a student
  Add {
    #[arg(long)]
    name: String,
    #[arg(long)]
    handle: String,
    #[arg(long, default_value = "")]
    email: String,
    #[arg(long, default_value = "")]
    phone: String,
    /// Skip fetching the new student's rating and activity
    #[arg(long)]
    no_sync: bool,
  },
  /// Edit a student's contact details
  Edit {
    /// Student id, id prefix, or handle
    student: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    handle: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    /// Skip re-syncing when the handle changes
    #[arg(long)]
    no_sync: bool,
  },
  /// Remove a student and its cached data
  Remove {
    /// Student id, id prefix, or handle
    student: String,
  },
  /// Show a student's profile, recent contests and problem stats
  Show {
    /// Student id, id prefix, or handle
    student: String,
    #[arg(long, value_enum, default_value_t = ContestRange::Year)]
    contests: ContestRange,
    #[arg(long, value_enum, default_value_t = ProblemRange::Month)]
    problems: ProblemRange,
  },
  /// Sync one student, or everyone when no student is given
  Sync {
    /// Student id, id prefix, or handle
    student: Option<String>,
    /// Bypass cached API responses
    #[arg(short, long)]
    force: bool,
  },
  /// Raise reminders for inactive students
  Remind,
  /// Turn inactivity reminders on or off for a student
  Reminders {
    /// Student id, id prefix, or handle
    student: String,
    #[arg(value_enum)]
    state: Toggle,
  },
  /// Export the roster as CSV
  Export {
    /// Output file
    #[arg(short, long, default_value = export::DEFAULT_EXPORT_FILE)]
    out: PathBuf,
    /// Print to stdout instead of writing a file
    #[arg(long, conflicts_with = "out")]
    stdout: bool,
  },
  /// Show or change the automatic sync schedule
  Schedule {
    /// Hour of day (0-23) at which a sync becomes due
    #[arg(long)]
    hour: Option<u32>,
    /// Days between automatic syncs
    #[arg(long)]
    every: Option<u32>,
  },
  /// Run a full sync if the schedule says one is due (for cron)
  Auto,
  /// Manage the API response cache
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
  /// Drop every cached API response
  Clear,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
  On,
  Off,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContestRange {
  Month,
  Quarter,
  Year,
  All,
}

impl From<ContestRange> for ContestWindow {
  fn from(range: ContestRange) -> Self {
    match range {
      ContestRange::Month => ContestWindow::Days30,
      ContestRange::Quarter => ContestWindow::Days90,
      ContestRange::Year => ContestWindow::Days365,
      ContestRange::All => ContestWindow::All,
    }
  }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemRange {
  Week,
  Month,
  Quarter,
}

impl From<ProblemRange> for ProblemWindow {
  fn from(range: ProblemRange) -> Self {
    match range {
      ProblemRange::Week => ProblemWindow::Days7,
      ProblemRange::Month => ProblemWindow::Days30,
      ProblemRange::Quarter => ProblemWindow::Days90,
    }
  }
}

/// Run a subcommand other than the dashboard.
pub async fn run<S: KeyValueStore, T: Transport>(tracker: &Tracker<S, T>, command: Command) -> Result<()> {
  match command {
    Command::Dashboard => Err(eyre!("The dashboard is not a batch command")),
    Command::List => {
      let students = sorted(tracker.students.list()?);
      if students.is_empty() {
        println!("No students yet. Add one with `cftrack add --name <name> --handle <handle>`.");
        return Ok(());
      }
      println!(
        "{:<8} {:<24} {:<20} {:>7} {:>7}  {:<19}  {}",
        "ID", "NAME", "HANDLE", "RATING", "MAX", "LAST SYNCED", "REMINDERS"
      );
      for student in &students {
        println!("{}", list_row(student));
      }
      Ok(())
    }
    Command::Add {
      name,
      handle,
      email,
      phone,
      no_sync,
    } => {
      let student = tracker.students.add(NewStudent {
        name: name.trim().to_string(),
        email: email.trim().to_string(),
        phone: phone.trim().to_string(),
        handle: handle.trim().to_string(),
      })?;
      println!("Added {} ({}) as {}.", student.name, student.handle, short_id(&student));
      if !no_sync {
        sync_after_change(tracker, &student).await;
      }
      Ok(())
    }
    Command::Edit {
      student,
      name,
      handle,
      email,
      phone,
      no_sync,
    } => {
      let changes = StudentChanges {
        name,
        email,
        phone,
        handle,
      };
      if changes.is_empty() {
        return Err(eyre!("Nothing to change; pass at least one of --name, --handle, --email, --phone"));
      }
      let current = tracker.students.resolve(&student)?;
      let updated = tracker.students.edit(current.id, changes)?;
      println!("Updated {} ({}).", updated.name, updated.handle);
      if !no_sync && !current.has_handle(&updated.handle) {
        sync_after_change(tracker, &updated).await;
      }
      Ok(())
    }
    Command::Remove { student } => {
      let current = tracker.students.resolve(&student)?;
      let removed = tracker.students.delete(current.id)?;
      println!("Removed {} ({}).", removed.name, removed.handle);
      Ok(())
    }
    Command::Show {
      student,
      contests,
      problems,
    } => show(tracker, &student, contests.into(), problems.into()).await,
    Command::Sync { student, force } => match student {
      Some(selector) => {
        let current = tracker.students.resolve(&selector)?;
        let report = tracker.synchronizer.sync_student(&current, force).await;
        println!("{}", describe_report(&report));
        match report.outcome {
          SyncOutcome::Failed(_) => Err(eyre!("Sync failed for {}", current.handle)),
          _ => Ok(()),
        }
      }
      None => full_sync(tracker).await,
    },
    Command::Remind => {
      let students = tracker.students.list()?;
      let reminders = tracker.notifier.scan(&students, Utc::now());
      if reminders.is_empty() {
        println!("Everyone has been active in the last {} days.", tracker.notifier.threshold_days());
      }
      for reminder in reminders {
        println!("{}", reminder.message);
      }
      Ok(())
    }
    Command::Reminders { student, state } => {
      let current = tracker.students.resolve(&student)?;
      let updated = tracker
        .students
        .set_reminders_disabled(current.id, state == Toggle::Off)?;
      let label = if updated.reminders_disabled { "off" } else { "on" };
      println!("Reminders for {} are now {}.", updated.name, label);
      Ok(())
    }
    Command::Export { out, stdout } => {
      let students = sorted(tracker.students.list()?);
      if stdout {
        println!("{}", export::roster_csv(&students)?);
      } else {
        export::write_roster_csv(&students, &out)?;
        println!("Exported {} students to {}.", students.len(), out.display());
      }
      Ok(())
    }
    Command::Schedule { hour, every } => {
      let mut settings = tracker.sync_state.settings();
      if hour.is_some() || every.is_some() {
        settings = SyncSettings {
          hour: hour.unwrap_or(settings.hour),
          frequency_days: every.unwrap_or(settings.frequency_days),
        };
        if !settings.is_valid() {
          return Err(eyre!("Hour must be 0-23 and the interval at least one day"));
        }
        tracker.sync_state.save_settings(&settings)?;
      }

      let last = tracker.sync_state.last_global_sync();
      let roster_len = tracker.students.list()?.len();
      let due = should_auto_sync(last, &settings, &Local::now(), roster_len);
      println!(
        "Sync every {} day(s) at {:02}:00. Last full sync: {}. Due now: {}.",
        settings.frequency_days,
        settings.hour,
        format_time(last),
        if due { "yes" } else { "no" }
      );
      Ok(())
    }
    Command::Auto => {
      let settings = tracker.sync_state.settings();
      let last = tracker.sync_state.last_global_sync();
      let roster_len = tracker.students.list()?.len();
      if !should_auto_sync(last, &settings, &Local::now(), roster_len) {
        println!("No sync due.");
        return Ok(());
      }
      full_sync(tracker).await
    }
    Command::Cache {
      action: CacheAction::Clear,
    } => {
      let removed = tracker.client.cache().clear();
      println!("Removed {} cached responses.", removed);
      Ok(())
    }
  }
}

async fn full_sync<S: KeyValueStore, T: Transport>(tracker: &Tracker<S, T>) -> Result<()> {
  let result = tracker
    .sync_all_and_remind(|p| eprintln!("[{}/{}] Syncing {}...", p.index + 1, p.total, p.name))
    .await?;

  for report in &result.reports {
    println!("{}", describe_report(report));
  }
  for reminder in &result.reminders {
    println!("{}", reminder.message);
  }

  let failed = result
    .reports
    .iter()
    .filter(|r| !r.outcome.is_complete())
    .count();
  println!(
    "Synced {} students ({} with errors).",
    result.reports.len(),
    failed
  );
  Ok(())
}

async fn show<S: KeyValueStore, T: Transport>(
  tracker: &Tracker<S, T>,
  selector: &str,
  window: ContestWindow,
  problem_window: ProblemWindow,
) -> Result<()> {
  let student = tracker.students.resolve(selector)?;
  let now = Utc::now();

  println!("{} ({})", student.name, student.handle);
  println!("  Email:           {}", or_dash(&student.email));
  println!("  Phone:           {}", or_dash(&student.phone));
  println!("  Rating:          {}", rating_pair(&student));
  println!("  Last synced:     {}", format_time(student.last_synced_at));
  println!("  Last submission: {}", format_time(student.last_submission_at));
  println!(
    "  Reminders:       {} sent{}",
    student.reminder_count,
    if student.reminders_disabled { " (disabled)" } else { "" }
  );

  println!();
  println!("Contests ({})", window.label());
  match tracker.client.rating_history(&student.handle, false).await {
    Ok(changes) => {
      let mut history = ContestHistory::new(changes);
      history.set_window(window);
      let batch = history.pending_batch(now, DETAILS_BATCH);
      match fetch_contest_details(&tracker.client, &student.handle, &batch, false).await {
        Ok(details) => history.merge(details),
        Err(e) => println!("  Could not load solve counts: {}", e),
      }
      let detailed = history.detailed(now);
      if detailed.is_empty() {
        println!("  No rated contests in this period.");
      }
      for contest in detailed {
        let solved = match &contest.details_error {
          Some(_) => "n/a".to_string(),
          None => format!("{}/{}", contest.solved, contest.total),
        };
        println!(
          "  {}  {:<40} rank {:>6}  {:>+5} -> {:<5} solved {}",
          contest.updated_at.with_timezone(&Local).format("%Y-%m-%d"),
          truncate(&contest.contest_name, 40),
          contest.rank,
          contest.delta(),
          contest.new_rating,
          solved
        );
      }
      if history.has_more(now) {
        println!("  (older contests omitted)");
      }
    }
    Err(e) => println!("  Could not load contest history: {}", e),
  }

  println!();
  println!("Problems ({})", problem_window.label());
  match tracker
    .client
    .submissions(&student.handle, STATS_SUBMISSION_COUNT, false)
    .await
  {
    Ok(submissions) => {
      let stats = ProblemStats::compute(&submissions, problem_window, now);
      println!("  Solved:          {}", stats.total_solved);
      println!(
        "  Hardest:         {}",
        stats
          .most_difficult
          .map_or_else(|| "-".to_string(), |r| r.to_string())
      );
      println!(
        "  Average rating:  {}",
        if stats.average_rating > 0 {
          stats.average_rating.to_string()
        } else {
          "-".to_string()
        }
      );
      println!("  Per day:         {:.2}", stats.average_per_day);
      let tags: Vec<String> = stats
        .top_tags
        .iter()
        .map(|(tag, count)| format!("{} ({})", tag, count))
        .collect();
      if !tags.is_empty() {
        println!("  Top tags:        {}", tags.join(", "));
      }
    }
    Err(e) => println!("  Could not load submissions: {}", e),
  }

  Ok(())
}

/// Students ordered by name, case-insensitively.
pub fn sorted(mut students: Vec<Student>) -> Vec<Student> {
  students.sort_by_key(|s| s.name.to_lowercase());
  students
}

pub fn short_id(student: &Student) -> String {
  student.id.to_string()[..8].to_string()
}

fn list_row(student: &Student) -> String {
  format!(
    "{:<8} {:<24} {:<20} {:>7} {:>7}  {:<19}  {}",
    short_id(student),
    truncate(&student.name, 24),
    truncate(&student.handle, 20),
    rating(student.current_rating),
    rating(student.max_rating),
    format_time(student.last_synced_at),
    if student.reminders_disabled {
      "off".to_string()
    } else {
      student.reminder_count.to_string()
    }
  )
}

/// Fetch fresh data for a student whose handle was just set. The student is
/// already saved, so a failed sync is reported but does not fail the command.
async fn sync_after_change<S: KeyValueStore, T: Transport>(tracker: &Tracker<S, T>, student: &Student) {
  let report = tracker.synchronizer.sync_student(student, true).await;
  println!("{}", describe_report(&report));
  if let SyncOutcome::Failed(_) = report.outcome {
    println!("Retry later with `cftrack sync {}`.", student.handle);
  }
}

pub fn describe_report(report: &SyncReport) -> String {
  let who = format!("{} ({})", report.student.name, report.student.handle);
  match &report.outcome {
    SyncOutcome::Complete => format!("{}: synced, rating {}", who, rating_pair(&report.student)),
    SyncOutcome::Partial(failures) => {
      let reasons: Vec<String> = failures.iter().map(|f| f.to_string()).collect();
      format!("{}: partially synced ({})", who, reasons.join("; "))
    }
    SyncOutcome::Failed(failures) => {
      let reasons: Vec<String> = failures.iter().map(|f| f.to_string()).collect();
      format!("{}: sync failed ({})", who, reasons.join("; "))
    }
  }
}

fn rating(value: Option<i32>) -> String {
  value.map_or_else(|| "-".to_string(), |r| r.to_string())
}

fn rating_pair(student: &Student) -> String {
  format!(
    "{} (max {})",
    rating(student.current_rating),
    rating(student.max_rating)
  )
}

fn format_time(at: Option<DateTime<Utc>>) -> String {
  at.map_or_else(
    || "never".to_string(),
    |at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
  )
}

fn or_dash(value: &str) -> &str {
  if value.is_empty() {
    "-"
  } else {
    value
  }
}
