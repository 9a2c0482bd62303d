//! Serializes every engine call onto one worker thread.
//!
//! Tasks run strictly in submission order and only one is ever in flight.
//! A task that waits for completion keeps the worker busy until the engine
//! reports that the voice finished, the task is cancelled, or its timeout
//! elapses. Urgent operations (pause and resume) may run while the worker
//! waits.
use crate::backends::EngineSet;
use crate::config::TaskSettings;
use crate::error::SpeechError;
use crate::metadata::split_qualified;
use anyhow::anyhow;
use log::{debug, info, warn};
use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
pub type OperationOk = Box<dyn Any + Send + Sync>;
pub type OperationResult = Result<OperationOk, SpeechError>;
type Operation = Box<dyn FnOnce(&mut EngineSet) -> OperationResult + Send>;
pub type IdleHook = Box<dyn Fn() + Send>;
pub type TaskId = u64;
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TaskState {
  #[default]
  Idle,
  Running(TaskId, String),
  AwaitingDone(TaskId, String),
  Cancelled(TaskId),
  TimedOut(TaskId),
  Completed(TaskId),
  Failed(TaskId),
}
impl TaskState {
  fn voice(&self) -> Option<&str> {
    match self {
      TaskState::Running(_, voice) | TaskState::AwaitingDone(_, voice) => Some(voice),
      _ => None,
    }
  }
}
struct Task {
  id: TaskId,
  voice: String,
  operation: Operation,
  wait: bool,
  cancelled: Arc<AtomicBool>,
  timeout: Option<Duration>,
  result_tx: mpsc::Sender<OperationResult>,
}
struct Urgent {
  operation: Operation,
  result_tx: mpsc::Sender<OperationResult>,
}
#[derive(Default)]
struct Inner {
  tasks: VecDeque<Task>,
  urgent: VecDeque<Urgent>,
  state: TaskState,
  done: bool,
  cancel_current: bool,
  stopping: bool,
}
#[derive(Default)]
struct Shared {
  inner: Mutex<Inner>,
  wake: Condvar,
}
impl Shared {
  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
/// Cheap handle engines use to report that a voice finished speaking.
#[derive(Clone)]
pub struct DoneSignal {
  shared: Arc<Shared>,
}
impl DoneSignal {
  pub fn signal(&self, voice: &str) {
    let mut inner = self.shared.lock();
    if inner.state.voice() == Some(voice) {
      inner.done = true;
      self.shared.wake.notify_all();
    } else {
      debug!("Ignoring done signal from {voice}, it is not the active voice");
    }
  }
}
pub struct TaskHandle {
  cancelled: Arc<AtomicBool>,
  result_rx: mpsc::Receiver<OperationResult>,
}
impl TaskHandle {
  /// Cancels this task only. Takes effect before dispatch or while the task
  /// waits for its done signal.
  pub fn cancel(&self) {
    self.cancelled.store(true, Ordering::Release);
  }
  pub fn wait(self) -> OperationResult {
    self
      .result_rx
      .recv()
      .unwrap_or_else(|_| Err(SpeechError::WorkerStopped))
  }
  /// Non-blocking. The outcome is handed out once.
  pub fn try_outcome(&self) -> Option<OperationResult> {
    match self.result_rx.try_recv() {
      Ok(result) => Some(result),
      Err(mpsc::TryRecvError::Empty) => None,
      Err(mpsc::TryRecvError::Disconnected) => Some(Err(SpeechError::WorkerStopped)),
    }
  }
}
pub struct TaskManager {
  shared: Arc<Shared>,
  settings: TaskSettings,
  next_id: AtomicU64,
  worker: Mutex<Option<JoinHandle<()>>>,
}
impl TaskManager {
  pub fn start(
    engines: EngineSet,
    settings: TaskSettings,
    idle: Option<IdleHook>,
  ) -> Result<Self, SpeechError> {
    let shared = Arc::new(Shared::default());
    let worker = Worker {
      shared: shared.clone(),
      engines,
      poll: Duration::from_millis(settings.poll_interval_ms.max(1)),
      idle,
    };
    let handle = thread::Builder::new()
      .name("worldvoice-dispatch".to_owned())
      .spawn(move || worker.run())
      .map_err(SpeechError::into_initialize_failed)?;
    Ok(TaskManager {
      shared,
      settings,
      next_id: AtomicU64::new(1),
      worker: Mutex::new(Some(handle)),
    })
  }
  pub fn done_signal(&self) -> DoneSignal {
    DoneSignal {
      shared: self.shared.clone(),
    }
  }
  pub fn signal_done(&self, voice: &str) {
    self.done_signal().signal(voice);
  }
  /// Queues `operation` for `voice`. With `wait` set the worker stays on the
  /// task until the voice reports it is done.
  pub fn submit<T, F>(&self, voice: &str, wait: bool, operation: F) -> TaskHandle
  where
    T: Any + Send + Sync,
    F: FnOnce(&mut EngineSet) -> Result<T, SpeechError> + Send + 'static,
  {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let cancelled = Arc::new(AtomicBool::new(false));
    let (result_tx, result_rx) = mpsc::channel();
    let task = Task {
      id,
      voice: voice.to_owned(),
      operation: Box::new(move |engines| {
        operation(engines).map(|value| Box::new(value) as OperationOk)
      }),
      wait,
      cancelled: cancelled.clone(),
      timeout: if wait {
        self.settings.speak_timeout_ms.map(Duration::from_millis)
      } else {
        None
      },
      result_tx,
    };
    let mut inner = self.shared.lock();
    if inner.stopping {
      let _ = task.result_tx.send(Err(SpeechError::WorkerStopped));
    } else {
      inner.tasks.push_back(task);
      self.shared.wake.notify_all();
    }
    TaskHandle {
      cancelled,
      result_rx,
    }
  }
  /// Runs `operation` on the worker and blocks for its result. Must not be
  /// called from inside another operation.
  pub fn perform<T, F>(&self, voice: &str, operation: F) -> Result<T, SpeechError>
  where
    T: Any + Send + Sync,
    F: FnOnce(&mut EngineSet) -> Result<T, SpeechError> + Send + 'static,
  {
    let result = self.submit(voice, false, operation).wait()?;
    result
      .downcast::<T>()
      .map(|value| *value)
      .map_err(|_| SpeechError::into_unknown(anyhow!("Task returned an unexpected type")))
  }
  /// Runs `operation` ahead of the queue, even while a task waits for its
  /// done signal.
  pub fn interrupt<F>(&self, operation: F) -> TaskHandle
  where
    F: FnOnce(&mut EngineSet) -> Result<(), SpeechError> + Send + 'static,
  {
    let (result_tx, result_rx) = mpsc::channel();
    let urgent = Urgent {
      operation: Box::new(move |engines| operation(engines).map(|()| Box::new(()) as OperationOk)),
      result_tx,
    };
    let mut inner = self.shared.lock();
    if inner.stopping {
      let _ = urgent.result_tx.send(Err(SpeechError::WorkerStopped));
    } else {
      inner.urgent.push_back(urgent);
      self.shared.wake.notify_all();
    }
    TaskHandle {
      cancelled: Arc::new(AtomicBool::new(false)),
      result_rx,
    }
  }
  /// Stops the voice that is speaking right now. Queued tasks still run.
  pub fn cancel_current(&self) -> bool {
    let mut inner = self.shared.lock();
    if inner.state.voice().is_none() {
      return false;
    }
    inner.cancel_current = true;
    self.shared.wake.notify_all();
    true
  }
  /// Drains the queue, marking every drained task cancelled, and stops the
  /// active voice. Returns how many queued tasks were dropped.
  pub fn cancel(&self) -> usize {
    let drained = {
      let mut inner = self.shared.lock();
      let drained = inner.tasks.drain(..).collect::<Vec<Task>>();
      if inner.state.voice().is_some() {
        inner.cancel_current = true;
      }
      self.shared.wake.notify_all();
      drained
    };
    for task in &drained {
      task.cancelled.store(true, Ordering::Release);
      let _ = task.result_tx.send(Err(SpeechError::TaskCancelled));
    }
    if !drained.is_empty() {
      debug!("Cancelled {} queued tasks", drained.len());
    }
    drained.len()
  }
  pub fn state(&self) -> TaskState {
    self.shared.lock().state.clone()
  }
  pub fn pending(&self) -> usize {
    self.shared.lock().tasks.len()
  }
  /// Cancels everything, stops the worker and waits for it to exit. Engines
  /// are switched off by the worker on its way out.
  pub fn shutdown(&self) {
    self.cancel();
    self.shared.lock().stopping = true;
    self.shared.wake.notify_all();
    let handle = self
      .worker
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take();
    if let Some(handle) = handle {
      if handle.thread().id() == thread::current().id() {
        return;
      }
      if handle.join().is_err() {
        warn!("Dispatch worker panicked");
      }
    }
  }
}
impl Drop for TaskManager {
  fn drop(&mut self) {
    self.shutdown();
  }
}
enum Work {
  Urgent(Urgent),
  Task(Task),
}
struct Worker {
  shared: Arc<Shared>,
  engines: EngineSet,
  poll: Duration,
  idle: Option<IdleHook>,
}
impl Worker {
  fn next(&self) -> Option<Work> {
    let mut inner = self.shared.lock();
    loop {
      if let Some(urgent) = inner.urgent.pop_front() {
        return Some(Work::Urgent(urgent));
      }
      if inner.stopping {
        return None;
      }
      if let Some(task) = inner.tasks.pop_front() {
        inner.state = TaskState::Running(task.id, task.voice.clone());
        inner.done = false;
        inner.cancel_current = false;
        return Some(Work::Task(task));
      }
      inner = self
        .shared
        .wake
        .wait(inner)
        .unwrap_or_else(PoisonError::into_inner);
    }
  }
  fn run(mut self) {
    debug!("Dispatch worker started");
    while let Some(work) = self.next() {
      match work {
        Work::Urgent(urgent) => self.run_urgent(urgent),
        Work::Task(task) => self.run_task(task),
      }
    }
    for (name, engine) in self.engines.iter_mut() {
      if let Err(error) = engine.engine_off() {
        warn!("Failed to switch off {name}: {error}");
      }
    }
    info!("Dispatch worker stopped");
  }
  fn run_urgent(&mut self, urgent: Urgent) {
    let result = (urgent.operation)(&mut self.engines);
    let _ = urgent.result_tx.send(result);
  }
  fn set_state(&self, state: TaskState) {
    self.shared.lock().state = state;
  }
  fn stop(&mut self, voice: &str) {
    let Some((engine, name)) = split_qualified(voice) else {
      warn!("Cannot stop {voice}, it is not an engine qualified voice name");
      return;
    };
    if let Err(error) = self
      .engines
      .get_mut(engine)
      .and_then(|engine| engine.stop(name))
    {
      warn!("Failed to stop {voice}: {error}");
    }
  }
  fn run_task(&mut self, task: Task) {
    let Task {
      id,
      voice,
      operation,
      wait,
      cancelled,
      timeout,
      result_tx,
    } = task;
    let outcome = if cancelled.load(Ordering::Acquire) {
      debug!("Task {id} for {voice} was cancelled before dispatch");
      self.set_state(TaskState::Cancelled(id));
      Err(SpeechError::TaskCancelled)
    } else {
      match operation(&mut self.engines) {
        Err(error) => {
          warn!("Task {id} for {voice} failed: {error}");
          self.set_state(TaskState::Failed(id));
          Err(error)
        }
        Ok(value) if !wait => {
          self.set_state(TaskState::Completed(id));
          Ok(value)
        }
        Ok(value) => self
          .await_done(id, &voice, &cancelled, timeout)
          .map(|()| value),
      }
    };
    let spoke = wait && outcome.is_ok();
    let _ = result_tx.send(outcome);
    let idle = {
      let mut inner = self.shared.lock();
      inner.state = TaskState::Idle;
      inner.tasks.is_empty()
    };
    if spoke && idle {
      if let Some(hook) = &self.idle {
        hook();
      }
    }
  }
  fn await_done(
    &mut self,
    id: TaskId,
    voice: &str,
    cancelled: &AtomicBool,
    timeout: Option<Duration>,
  ) -> Result<(), SpeechError> {
    let shared = self.shared.clone();
    let deadline = timeout.map(|timeout| Instant::now() + timeout);
    let mut inner = shared.lock();
    inner.state = TaskState::AwaitingDone(id, voice.to_owned());
    loop {
      if let Some(urgent) = inner.urgent.pop_front() {
        drop(inner);
        self.run_urgent(urgent);
        inner = shared.lock();
        continue;
      }
      if inner.done {
        inner.state = TaskState::Completed(id);
        return Ok(());
      }
      if inner.cancel_current || cancelled.load(Ordering::Acquire) {
        inner.cancel_current = false;
        inner.state = TaskState::Cancelled(id);
        drop(inner);
        debug!("Task {id} for {voice} cancelled while speaking");
        self.stop(voice);
        return Err(SpeechError::TaskCancelled);
      }
      let now = Instant::now();
      let poll = match (deadline, timeout) {
        (Some(deadline), Some(timeout)) if now >= deadline => {
          inner.state = TaskState::TimedOut(id);
          drop(inner);
          warn!("{voice} did not finish speaking within {timeout:?}");
          self.stop(voice);
          return Err(SpeechError::TaskTimedOut(timeout.as_millis()));
        }
        (Some(deadline), _) => self.poll.min(deadline - now),
        _ => self.poll,
      };
      inner = shared
        .wake
        .wait_timeout(inner, poll)
        .unwrap_or_else(PoisonError::into_inner)
        .0;
    }
  }
}
