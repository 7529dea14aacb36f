use chrono::{DateTime, Local, Utc};
use ratatui::prelude::Color;

/// Truncate to at most `max_chars` characters, ending in "..." when cut.
pub fn truncate(s: &str, max_chars: usize) -> String {
  if s.chars().count() <= max_chars {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Codeforces rank colour for a rating.
pub fn rating_color(rating: Option<i32>) -> Color {
  match rating {
    None => Color::DarkGray,
    Some(r) if r < 1200 => Color::Gray,
    Some(r) if r < 1400 => Color::Green,
    Some(r) if r < 1600 => Color::Cyan,
    Some(r) if r < 1900 => Color::Blue,
    Some(r) if r < 2100 => Color::Magenta,
    Some(r) if r < 2400 => Color::Yellow,
    Some(_) => Color::Red,
  }
}

pub fn format_rating(rating: Option<i32>) -> String {
  rating.map_or_else(|| "N/A".to_string(), |r| r.to_string())
}

/// Local date and time, or "Never".
pub fn format_time(at: Option<DateTime<Utc>>) -> String {
  at.map_or_else(
    || "Never".to_string(),
    |at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
  )
}

/// Coarse age like "5m ago" or "3d ago".
pub fn time_ago(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
  let at = match at {
    Some(at) => at,
    None => return "Never".to_string(),
  };

  let elapsed = now - at;
  if elapsed.num_minutes() < 1 {
    "just now".to_string()
  } else if elapsed.num_hours() < 1 {
    format!("{}m ago", elapsed.num_minutes())
  } else if elapsed.num_days() < 1 {
    format!("{}h ago", elapsed.num_hours())
  } else {
    format!("{}d ago", elapsed.num_days())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;

  #[test]
  fn test_truncate() {
    assert_eq!(truncate("hello", 10), "hello");
    assert_eq!(truncate("hello", 5), "hello");
    assert_eq!(truncate("hello world", 8), "hello...");
    assert_eq!(truncate("Łukasz Świątek", 9), "Łukasz...");
  }

  #[test]
  fn test_rating_color() {
    assert_eq!(rating_color(None), Color::DarkGray);
    assert_eq!(rating_color(Some(1199)), Color::Gray);
    assert_eq!(rating_color(Some(1400)), Color::Cyan);
    assert_eq!(rating_color(Some(3000)), Color::Red);
  }

  #[test]
  fn test_time_ago() {
    let now = Utc::now();
    assert_eq!(time_ago(None, now), "Never");
    assert_eq!(time_ago(Some(now - Duration::seconds(20)), now), "just now");
    assert_eq!(time_ago(Some(now - Duration::minutes(5)), now), "5m ago");
    assert_eq!(time_ago(Some(now - Duration::hours(3)), now), "3h ago");
    assert_eq!(time_ago(Some(now - Duration::days(9)), now), "9d ago");
  }
}
