//! Fixed-size pool of parser threads.
//!
//! Each worker owns a request channel and runs the tokenize, parse, extract
//! pipeline. Replies from all workers flow into one channel read by a
//! collector thread, which matches them to waiting callers by task id and
//! hands the worker back to the idle list. A worker that panics fails its
//! task and is retired; callers fall back to parsing on their own thread
//! whenever no worker is idle.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use eventlens_data::ParsedEvent;
use eventlens_script::ScriptError;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// Text in, events out.
pub type Pipeline = fn(&str) -> Result<Vec<ParsedEvent>, ScriptError>;

enum WorkerMessage {
    Parse { id: Uuid, content: String },
    Shutdown,
}

enum WorkerReply {
    Done {
        worker: usize,
        id: Uuid,
        outcome: Result<Vec<ParsedEvent>, ScriptError>,
    },
    Crashed {
        worker: usize,
        message: String,
    },
}

struct Pending {
    worker: usize,
    reply: Sender<EngineResult<Vec<ParsedEvent>>>,
}

#[derive(Default)]
struct PoolState {
    /// Request channel per worker; `None` once the worker is gone.
    senders: Vec<Option<Sender<WorkerMessage>>>,
    idle: Vec<usize>,
    pending: HashMap<Uuid, Pending>,
    disposed: bool,
}

fn lock(state: &Mutex<PoolState>) -> MutexGuard<'_, PoolState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ParserPool {
    pipeline: Pipeline,
    state: Arc<Mutex<PoolState>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    collector: Mutex<Option<JoinHandle<()>>>,
}

impl ParserPool {
    /// Pool of `size` workers (at least one) running [`eventlens_script::parse_events`].
    pub fn new(size: usize) -> Self {
        Self::with_pipeline(size, eventlens_script::parse_events)
    }

    pub fn with_pipeline(size: usize, pipeline: Pipeline) -> Self {
        let size = size.max(1);
        let (reply_tx, reply_rx) = mpsc::channel();
        let state = Arc::new(Mutex::new(PoolState::default()));
        let mut handles = Vec::with_capacity(size);

        {
            let mut guard = lock(&state);
            for index in 0..size {
                let (tx, rx) = mpsc::channel();
                let replies = reply_tx.clone();
                let spawned = thread::Builder::new()
                    .name(format!("eventlens-parser-{index}"))
                    .spawn(move || worker_loop(index, pipeline, &rx, &replies));
                match spawned {
                    Ok(handle) => {
                        handles.push(handle);
                        guard.senders.push(Some(tx));
                        guard.idle.push(index);
                    },
                    Err(e) => {
                        warn!("could not start parser worker {index}: {e}");
                        guard.senders.push(None);
                    },
                }
            }
        }
        drop(reply_tx);

        let collector_state = Arc::clone(&state);
        let collector = thread::Builder::new()
            .name("eventlens-parser-collector".to_string())
            .spawn(move || collect_replies(&collector_state, &reply_rx));
        let collector = match collector {
            Ok(handle) => Some(handle),
            Err(e) => {
                // Without a collector no reply could be delivered.
                warn!("could not start parser collector: {e}");
                let mut guard = lock(&state);
                guard.idle.clear();
                None
            },
        };

        info!("parser pool started with {} worker(s)", handles.len());
        Self {
            pipeline,
            state,
            handles: Mutex::new(handles),
            collector: Mutex::new(collector),
        }
    }

    /// Workers still able to take tasks.
    pub fn live_workers(&self) -> usize {
        lock(&self.state).senders.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_shut_down(&self) -> bool {
        lock(&self.state).disposed
    }

    /// Parse `content` on an idle worker, or on the calling thread if every
    /// worker is busy.
    ///
    /// # Errors
    /// [`EngineError::Shutdown`] after [`ParserPool::shutdown`],
    /// [`EngineError::WorkerFailure`] if the worker crashed, or the script
    /// error from the pipeline.
    pub fn parse(&self, content: &str) -> EngineResult<Vec<ParsedEvent>> {
        let (tx, rx) = mpsc::channel();
        let id = Uuid::new_v4();
        {
            let mut state = lock(&self.state);
            if state.disposed {
                return Err(EngineError::Shutdown);
            }
            let Some(worker) = state.idle.pop() else {
                drop(state);
                debug!("no idle parser worker, parsing on caller thread");
                return (self.pipeline)(content).map_err(EngineError::from);
            };
            let request = WorkerMessage::Parse {
                id,
                content: content.to_string(),
            };
            let sent = state.senders[worker].as_ref().is_some_and(|sender| sender.send(request).is_ok());
            if !sent {
                state.senders[worker] = None;
                drop(state);
                warn!("parser worker {worker} is gone, parsing on caller thread");
                return (self.pipeline)(content).map_err(EngineError::from);
            }
            state.pending.insert(id, Pending { worker, reply: tx });
            debug!("task {id} dispatched to parser worker {worker}");
        }
        rx.recv().unwrap_or(Err(EngineError::Shutdown))
    }

    /// Reject in-flight tasks, stop every worker, and join all threads.
    /// Calling it again does nothing.
    pub fn shutdown(&self) {
        let (senders, pending) = {
            let mut state = lock(&self.state);
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.idle.clear();
            (std::mem::take(&mut state.senders), std::mem::take(&mut state.pending))
        };
        for (_, task) in pending {
            let _ = task.reply.send(Err(EngineError::Shutdown));
        }
        for sender in senders.iter().flatten() {
            let _ = sender.send(WorkerMessage::Shutdown);
        }
        drop(senders);

        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in handles {
            let name = handle.thread().name().unwrap_or("parser worker").to_string();
            if handle.join().is_err() {
                warn!("{name} did not terminate cleanly");
            }
        }
        let collector = self.collector.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(collector) = collector
            && collector.join().is_err()
        {
            warn!("parser collector did not terminate cleanly");
        }
        info!("parser pool shut down");
    }
}

impl Drop for ParserPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(index: usize, pipeline: Pipeline, requests: &Receiver<WorkerMessage>, replies: &Sender<WorkerReply>) {
    while let Ok(message) = requests.recv() {
        let (id, content) = match message {
            WorkerMessage::Parse { id, content } => (id, content),
            WorkerMessage::Shutdown => break,
        };
        match panic::catch_unwind(AssertUnwindSafe(|| pipeline(&content))) {
            Ok(outcome) => {
                if replies
                    .send(WorkerReply::Done {
                        worker: index,
                        id,
                        outcome,
                    })
                    .is_err()
                {
                    break;
                }
            },
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "worker panicked".to_string());
                let _ = replies.send(WorkerReply::Crashed { worker: index, message });
                break;
            },
        }
    }
    debug!("parser worker {index} exiting");
}

fn collect_replies(state: &Mutex<PoolState>, replies: &Receiver<WorkerReply>) {
    while let Ok(reply) = replies.recv() {
        let mut state = lock(state);
        match reply {
            WorkerReply::Done { worker, id, outcome } => {
                if !state.disposed && state.senders.get(worker).is_some_and(Option::is_some) {
                    state.idle.push(worker);
                }
                if let Some(task) = state.pending.remove(&id) {
                    let _ = task.reply.send(outcome.map_err(EngineError::from));
                }
            },
            WorkerReply::Crashed { worker, message } => {
                warn!("parser worker {worker} crashed: {message}");
                if let Some(slot) = state.senders.get_mut(worker) {
                    *slot = None;
                }
                state.idle.retain(|idle| *idle != worker);
                let failed: Vec<Uuid> = state
                    .pending
                    .iter()
                    .filter(|(_, task)| task.worker == worker)
                    .map(|(id, _)| *id)
                    .collect();
                for id in failed {
                    if let Some(task) = state.pending.remove(&id) {
                        let _ = task.reply.send(Err(EngineError::WorkerFailure {
                            worker,
                            message: message.clone(),
                        }));
                    }
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Tags each event with the thread that parsed it; `boom` panics, `slow` sleeps.
    fn probe(content: &str) -> Result<Vec<ParsedEvent>, ScriptError> {
        if content.contains("boom") {
            panic!("probe exploded");
        }
        if content.contains("slow") {
            thread::sleep(Duration::from_millis(300));
        }
        let thread_name = thread::current().name().unwrap_or("unnamed").to_string();
        Ok(vec![ParsedEvent {
            id: thread_name,
            ..ParsedEvent::default()
        }])
    }

    #[test]
    fn parses_real_scripts_on_workers() {
        let pool = ParserPool::new(2);
        let events = pool
            .parse("namespace = test\ncountry_event = { id = test.1 }")
            .unwrap();
        assert_eq!(events[0].qualified_id(), "test.1");
    }

    #[test]
    fn script_errors_come_back_typed() {
        let pool = ParserPool::new(1);
        let err = pool.parse("a = { b = 1").unwrap_err();
        assert!(matches!(err, EngineError::Script(ScriptError::Parse { .. })));
        // The worker is still usable.
        assert!(pool.parse("country_event = { id = x.1 }").is_ok());
    }

    #[test]
    fn work_runs_on_pool_threads() {
        let pool = ParserPool::with_pipeline(1, probe);
        let events = pool.parse("fast").unwrap();
        assert_eq!(events[0].id, "eventlens-parser-0");
    }

    #[test]
    fn busy_pool_falls_back_to_caller() {
        let pool = ParserPool::with_pipeline(1, probe);
        thread::scope(|scope| {
            let slow = scope.spawn(|| pool.parse("slow"));
            thread::sleep(Duration::from_millis(50));
            let fast = pool.parse("fast").unwrap();
            assert!(!fast[0].id.starts_with("eventlens-parser"));
            let slow = slow.join().unwrap().unwrap();
            assert_eq!(slow[0].id, "eventlens-parser-0");
        });
    }

    #[test]
    fn crashed_worker_fails_only_its_task() {
        let pool = ParserPool::with_pipeline(1, probe);
        let err = pool.parse("boom").unwrap_err();
        match err {
            EngineError::WorkerFailure { worker, message } => {
                assert_eq!(worker, 0);
                assert!(message.contains("probe exploded"));
            },
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(pool.live_workers(), 0);
        // Later calls still succeed on the caller thread.
        let events = pool.parse("fine").unwrap();
        assert!(!events[0].id.starts_with("eventlens-parser"));
    }

    #[test]
    fn shutdown_rejects_in_flight_and_new_work() {
        let pool = ParserPool::with_pipeline(1, probe);
        thread::scope(|scope| {
            let slow = scope.spawn(|| pool.parse("slow"));
            thread::sleep(Duration::from_millis(50));
            pool.shutdown();
            assert!(matches!(slow.join().unwrap(), Err(EngineError::Shutdown)));
        });
        assert!(pool.is_shut_down());
        assert!(matches!(pool.parse("fast"), Err(EngineError::Shutdown)));
        pool.shutdown();
    }
}
