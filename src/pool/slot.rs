//! SM-031: Slot worker threads (one mailbox, one transform at a time).

use super::preprocess::{CancelFlag, Preprocessor};
use super::Event;
use crossbeam::channel::{self, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Payload handed to a slot for one dispatch.
pub(crate) struct Job {
    pub dispatch: u64,
    pub payload: String,
    pub cancel: CancelFlag,
}

/// Terminal signal of one slot turn.
#[derive(Debug)]
pub(crate) struct Completion {
    pub slot: usize,
    pub dispatch: u64,
    pub outcome: Result<String, String>,
}

/// Spawn the backing thread for a slot and return its mailbox.
/// The thread exits once the mailbox sender is dropped.
pub(crate) fn spawn_worker(
    slot: usize,
    generation: u32,
    preprocessor: Arc<dyn Preprocessor>,
    events: UnboundedSender<Event>,
) -> std::io::Result<Sender<Job>> {
    let (tx, rx) = channel::unbounded::<Job>();
    std::thread::Builder::new()
        .name(format!("sigsmith-slot-{}.{}", slot, generation))
        .spawn(move || {
            while let Ok(job) = rx.recv() {
                let outcome = run_job(preprocessor.as_ref(), &job);
                let completion = Completion {
                    slot,
                    dispatch: job.dispatch,
                    outcome,
                };
                if events.send(Event::Completed(completion)).is_err() {
                    break;
                }
            }
        })?;
    Ok(tx)
}

/// Run the transform, turning a panic into a failure signal.
fn run_job(preprocessor: &dyn Preprocessor, job: &Job) -> Result<String, String> {
    match panic::catch_unwind(AssertUnwindSafe(|| {
        preprocessor.preprocess(&job.payload, &job.cancel)
    })) {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(format!("transform panicked: {}", message))
        }
    }
}
