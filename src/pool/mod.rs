//! SM-030: Bounded worker pool for the preprocessing transform.
//!
//! A dispatcher task owns the FIFO queue and the slot table. Slots are OS
//! threads fed through mailboxes; completions and timer expiries come back
//! as events. Each dispatch carries a unique id, and a completion is matched
//! by that id rather than by slot.
//!
//! On timeout the caller is rejected at once and the dispatch's cancel flag
//! is raised. The slot stays draining until its thread hands back the late
//! result, so no more than `concurrency` transforms ever run at the same time.

pub mod preprocess;
mod slot;

use crate::core::types::SolverConfig;
use preprocess::{CancelFlag, Preprocessor};
use slot::{Completion, Job};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Why a pool task did not produce output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("worker task failed: {0}")]
    Failed(String),

    #[error("worker task timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("failed to post payload to slot {slot}: {reason}")]
    Submission { slot: usize, reason: String },

    #[error("worker pool needs at least one slot")]
    NoSlots,

    #[error("worker pool is shut down")]
    Closed,
}

impl PoolError {
    /// Timeouts may be retried with a larger bound.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PoolError::Timeout { .. })
    }

    /// The slot refused the payload; nothing ran.
    pub fn is_submission(&self) -> bool {
        matches!(self, PoolError::Submission { .. })
    }
}

type Reply = oneshot::Sender<Result<String, PoolError>>;

/// A queued unit of work.
struct Task {
    payload: String,
    reply: Reply,
}

/// Messages from slot threads and timers back to the dispatcher.
pub(crate) enum Event {
    Completed(Completion),
    TimedOut { slot: usize, dispatch: u64 },
}

/// Completion handle of a submitted task. Resolves exactly once.
#[derive(Debug)]
pub struct TaskHandle {
    rx: oneshot::Receiver<Result<String, PoolError>>,
}

impl TaskHandle {
    pub async fn wait(self) -> Result<String, PoolError> {
        self.rx.await.map_err(|_| PoolError::Closed)?
    }
}

/// Handle to a running pool. Dropping it lets queued work drain, then stops
/// the dispatcher and its slot threads.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    submissions: mpsc::UnboundedSender<Task>,
    concurrency: usize,
    timeout: Duration,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("len", &self.payload.len()).finish()
    }
}

impl WorkerPool {
    /// Start a pool with `concurrency` slots. Must run inside a tokio runtime.
    pub fn start(
        concurrency: usize,
        timeout: Duration,
        preprocessor: Arc<dyn Preprocessor>,
    ) -> Result<Self, PoolError> {
        if concurrency == 0 {
            return Err(PoolError::NoSlots);
        }
        let (submissions, submission_rx) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::unbounded_channel();

        let mut slots = Vec::with_capacity(concurrency);
        for id in 0..concurrency {
            let mailbox = match slot::spawn_worker(id, 0, Arc::clone(&preprocessor), events.clone()) {
                Ok(mailbox) => {
                    info!(slot = id, "worker {} initialized", id + 1);
                    Some(mailbox)
                }
                Err(e) => {
                    error!(slot = id, error = %e, "failed to initialize worker {}", id + 1);
                    None
                }
            };
            slots.push(Slot {
                id,
                generation: 0,
                mailbox,
                state: SlotState::Idle,
            });
        }
        let ready = slots.iter().filter(|s| s.mailbox.is_some()).count();
        info!("initialized {}/{} workers", ready, concurrency);

        let dispatcher = Dispatcher {
            slots,
            queue: VecDeque::new(),
            next_dispatch: 0,
            timeout,
            preprocessor,
            events,
        };
        tokio::spawn(dispatcher.run(submission_rx, event_rx));

        Ok(Self {
            submissions,
            concurrency,
            timeout,
        })
    }

    /// Start a pool sized and timed from configuration.
    pub fn from_config(
        config: &SolverConfig,
        preprocessor: Arc<dyn Preprocessor>,
    ) -> Result<Self, PoolError> {
        Self::start(config.concurrency, config.task_timeout(), preprocessor)
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Queue a payload. The returned handle resolves or rejects exactly once.
    pub fn submit(&self, payload: String) -> TaskHandle {
        let (reply, rx) = oneshot::channel();
        // A closed dispatcher drops the task and with it the reply sender,
        // which resolves the handle as `Closed`.
        let _ = self.submissions.send(Task { payload, reply });
        TaskHandle { rx }
    }

    /// Submit and wait.
    pub async fn execute(&self, payload: String) -> Result<String, PoolError> {
        self.submit(payload).wait().await
    }
}

enum SlotState {
    Idle,
    Busy(InFlight),
    /// Timed out; waiting for the thread to return from `dispatch`.
    Draining { dispatch: u64 },
}

struct InFlight {
    dispatch: u64,
    reply: Reply,
    timer: JoinHandle<()>,
    cancel: CancelFlag,
}

struct Slot {
    id: usize,
    generation: u32,
    mailbox: Option<crossbeam::channel::Sender<Job>>,
    state: SlotState,
}

struct Dispatcher {
    slots: Vec<Slot>,
    queue: VecDeque<Task>,
    next_dispatch: u64,
    timeout: Duration,
    preprocessor: Arc<dyn Preprocessor>,
    events: mpsc::UnboundedSender<Event>,
}

impl Dispatcher {
    async fn run(
        mut self,
        mut submissions: mpsc::UnboundedReceiver<Task>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        let mut open = true;
        loop {
            tokio::select! {
                task = submissions.recv(), if open => match task {
                    Some(task) => self.queue.push_back(task),
                    None => open = false,
                },
                Some(event) = events.recv() => self.handle(event),
                else => break,
            }
            self.dispatch();
            if !open && self.queue.is_empty() && self.all_idle() {
                debug!("worker pool drained, shutting down");
                break;
            }
        }
    }

    fn all_idle(&self) -> bool {
        self.slots
            .iter()
            .all(|s| matches!(s.state, SlotState::Idle))
    }

    /// Hand queued tasks to idle slots, oldest first.
    fn dispatch(&mut self) {
        while !self.queue.is_empty() {
            let Some(index) = self
                .slots
                .iter()
                .position(|s| matches!(s.state, SlotState::Idle))
            else {
                return;
            };
            let Some(task) = self.queue.pop_front() else {
                return;
            };
            let dispatch = self.next_dispatch;
            self.next_dispatch += 1;

            if self.slots[index].mailbox.is_none() {
                self.respawn(index);
            }
            let slot = &mut self.slots[index];
            let Some(mailbox) = slot.mailbox.as_ref() else {
                error!(slot = slot.id, dispatch, "failed to post message to worker");
                let _ = task.reply.send(Err(PoolError::Submission {
                    slot: slot.id,
                    reason: "slot has no running worker".to_string(),
                }));
                continue;
            };

            let cancel = CancelFlag::new();
            let job = Job {
                dispatch,
                payload: task.payload,
                cancel: cancel.clone(),
            };
            if let Err(e) = mailbox.send(job) {
                error!(slot = slot.id, dispatch, "failed to post message to worker");
                slot.mailbox = None;
                let _ = task.reply.send(Err(PoolError::Submission {
                    slot: slot.id,
                    reason: format!("worker mailbox closed ({} bytes dropped)", e.0.payload.len()),
                }));
                continue;
            }

            let timer = {
                let events = self.events.clone();
                let timeout = self.timeout;
                let slot_id = slot.id;
                tokio::spawn(async move {
                    tokio::time::sleep(timeout).await;
                    let _ = events.send(Event::TimedOut {
                        slot: slot_id,
                        dispatch,
                    });
                })
            };
            debug!(slot = slot.id, dispatch, queued = self.queue.len(), "task dispatched");
            slot.state = SlotState::Busy(InFlight {
                dispatch,
                reply: task.reply,
                timer,
                cancel,
            });
        }
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Completed(completion) => self.on_completed(completion),
            Event::TimedOut { slot, dispatch } => self.on_timeout(slot, dispatch),
        }
    }

    /// Take the in-flight record of `slot` if it belongs to `dispatch`.
    fn take_in_flight(&mut self, slot: usize, dispatch: u64) -> Option<InFlight> {
        let entry = self.slots.get_mut(slot)?;
        match &entry.state {
            SlotState::Busy(in_flight) if in_flight.dispatch == dispatch => {}
            _ => return None,
        }
        match std::mem::replace(&mut entry.state, SlotState::Idle) {
            SlotState::Busy(in_flight) => Some(in_flight),
            other => {
                entry.state = other;
                None
            }
        }
    }

    fn on_completed(&mut self, completion: Completion) {
        let Some(in_flight) = self.take_in_flight(completion.slot, completion.dispatch) else {
            self.release_drained(completion.slot, completion.dispatch);
            return;
        };
        in_flight.timer.abort();
        let result = completion.outcome.map_err(|message| {
            error!(slot = completion.slot, dispatch = completion.dispatch, error = %message, "worker task failed");
            PoolError::Failed(message)
        });
        let _ = in_flight.reply.send(result);
    }

    fn on_timeout(&mut self, slot: usize, dispatch: u64) {
        let Some(in_flight) = self.take_in_flight(slot, dispatch) else {
            return;
        };
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        error!(slot, dispatch, timeout_ms, "worker task timeout");
        in_flight.cancel.cancel();
        self.slots[slot].state = SlotState::Draining { dispatch };
        let _ = in_flight.reply.send(Err(PoolError::Timeout { timeout_ms }));
    }

    /// A late completion frees its draining slot; its result is dropped.
    fn release_drained(&mut self, slot: usize, dispatch: u64) {
        let Some(entry) = self.slots.get_mut(slot) else {
            return;
        };
        if matches!(entry.state, SlotState::Draining { dispatch: d } if d == dispatch) {
            entry.state = SlotState::Idle;
        }
        debug!(slot, dispatch, "stale completion discarded");
    }

    fn respawn(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        slot.generation = slot.generation.wrapping_add(1);
        match slot::spawn_worker(
            slot.id,
            slot.generation,
            Arc::clone(&self.preprocessor),
            self.events.clone(),
        ) {
            Ok(mailbox) => slot.mailbox = Some(mailbox),
            Err(e) => warn!(slot = slot.id, error = %e, "failed to respawn worker"),
        }
    }
}
