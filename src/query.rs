//! Background work for the dashboard.
//!
//! The UI thread never awaits network calls. Instead it starts a [`Query`]
//! (one result) or a [`Job`] (progress updates, then one result), keeps
//! drawing, and polls on every tick.
//!
//! ```ignore
//! let client = tracker.client.clone();
//! let mut history = Query::new(move |force| {
//!   let client = client.clone();
//!   let handle = handle.clone();
//!   async move { client.rating_history(&handle, force).await.map_err(|e| e.to_string()) }
//! });
//! history.fetch();
//!
//! // on tick
//! if history.poll() {
//!   // redraw
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum QueryState<T> {
  Idle,
  Loading,
  Success(T),
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;
type FetcherFn<T> = Box<dyn Fn(bool) -> BoxFuture<T> + Send + Sync>;

/// A re-runnable async load.
///
/// The fetcher receives the `force` flag: `false` for [`Query::fetch`], `true`
/// for [`Query::refetch`], so a refresh can bypass the API cache.
pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, String>>>,
}

impl<T: Send + 'static> Query<T> {
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn(bool) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move |force| Box::pin(fetcher(force))),
      receiver: None,
    }
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn data_mut(&mut self) -> Option<&mut T> {
    match &mut self.state {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// Start loading unless a load is already running.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start(false);
  }

  /// Reload, bypassing caches. A load already running is abandoned.
  pub fn refetch(&mut self) {
    self.receiver = None;
    self.start(true);
  }

  /// Pick up a finished load. Returns `true` when the state changed.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.state = QueryState::Success(data);
        self.receiver = None;
        true
      }
      Ok(Err(error)) => {
        self.state = QueryState::Error(error);
        self.receiver = None;
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        self.state = QueryState::Error("Load was cancelled".to_string());
        self.receiver = None;
        true
      }
    }
  }

  fn start(&mut self, force: bool) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = QueryState::Loading;

    let future = (self.fetcher)(force);
    tokio::spawn(async move {
      let _ = tx.send(future.await);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}

/// What a running [`Job`] reported since the last poll.
#[derive(Debug, PartialEq)]
pub enum JobUpdate<P, T> {
  Progress(P),
  Done(Result<T, String>),
}

enum JobMessage<P, T> {
  Progress(P),
  Done(Result<T, String>),
}

/// A one-shot background task that streams progress.
///
/// At most one run is active; [`Job::start`] while running is refused, which
/// is how the dashboard ignores repeated sync triggers.
pub struct Job<P, T> {
  receiver: Option<mpsc::UnboundedReceiver<JobMessage<P, T>>>,
}

impl<P: Send + 'static, T: Send + 'static> Job<P, T> {
  pub fn new() -> Self {
    Self { receiver: None }
  }

  pub fn is_running(&self) -> bool {
    self.receiver.is_some()
  }

  /// Spawn `work`, handing it a callback for progress. Returns `false`
  /// without starting anything when a run is already in flight.
  pub fn start<W, Fut>(&mut self, work: W) -> bool
  where
    W: FnOnce(Box<dyn FnMut(P) + Send>) -> Fut,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    if self.is_running() {
      return false;
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let progress_tx = tx.clone();
    let report: Box<dyn FnMut(P) + Send> = Box::new(move |p| {
      let _ = progress_tx.send(JobMessage::Progress(p));
    });
    let future = work(report);

    tokio::spawn(async move {
      let _ = tx.send(JobMessage::Done(future.await));
    });
    self.receiver = Some(rx);
    true
  }

  /// Drain everything reported since the last poll, oldest first.
  pub fn poll(&mut self) -> Vec<JobUpdate<P, T>> {
    let mut updates = Vec::new();
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return updates,
    };

    loop {
      match receiver.try_recv() {
        Ok(JobMessage::Progress(p)) => updates.push(JobUpdate::Progress(p)),
        Ok(JobMessage::Done(result)) => {
          updates.push(JobUpdate::Done(result));
          self.receiver = None;
          break;
        }
        Err(mpsc::error::TryRecvError::Empty) => break,
        Err(mpsc::error::TryRecvError::Disconnected) => {
          updates.push(JobUpdate::Done(Err("Task ended unexpectedly".to_string())));
          self.receiver = None;
          break;
        }
      }
    }
    updates
  }
}

impl<P: Send + 'static, T: Send + 'static> Default for Job<P, T> {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  #[tokio::test]
  async fn test_query_success() {
    let mut query = Query::new(|_| async { Ok::<_, String>(vec![1, 2, 3]) });
    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(query.is_loading());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(query.poll());
    assert_eq!(query.data(), Some(&vec![1, 2, 3]));
  }

  #[tokio::test]
  async fn test_query_error() {
    let mut query: Query<i32> = Query::new(|_| async { Err("user not found".to_string()) });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert_eq!(query.error(), Some("user not found"));
  }

  #[tokio::test]
  async fn test_refetch_forces_and_drops_pending() {
    let counter = Arc::new(AtomicU32::new(0));
    let forced = Arc::new(AtomicBool::new(false));
    let (c, f) = (counter.clone(), forced.clone());

    let mut query = Query::new(move |force| {
      let counter = c.clone();
      let forced = f.clone();
      async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        if force {
          forced.store(true, Ordering::SeqCst);
        }
        Ok::<_, String>(counter.fetch_add(1, Ordering::SeqCst))
      }
    });

    query.fetch();
    query.fetch();
    tokio::time::sleep(Duration::from_millis(5)).await;
    query.refetch();
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert!(query.poll());
    assert_eq!(query.data(), Some(&1));
    assert!(forced.load(Ordering::SeqCst));
  }

  #[tokio::test]
  async fn test_job_reports_progress_then_result() {
    let mut job: Job<usize, &'static str> = Job::new();

    let started = job.start(|mut progress| async move {
      for i in 0..3 {
        progress(i);
      }
      Ok("done")
    });
    assert!(started);
    assert!(job.is_running());

    tokio::time::sleep(Duration::from_millis(10)).await;
    let updates = job.poll();

    assert_eq!(
      updates,
      vec![
        JobUpdate::Progress(0),
        JobUpdate::Progress(1),
        JobUpdate::Progress(2),
        JobUpdate::Done(Ok("done")),
      ]
    );
    assert!(!job.is_running());
  }

  #[tokio::test]
  async fn test_job_refuses_second_start() {
    let mut job: Job<(), u32> = Job::new();
    assert!(job.start(|_| async {
      tokio::time::sleep(Duration::from_millis(30)).await;
      Ok(1)
    }));
    assert!(!job.start(|_| async { Ok(2) }));

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(job.poll(), vec![JobUpdate::Done(Ok(1))]);
    assert!(job.start(|_| async { Ok(3) }));
  }
}
