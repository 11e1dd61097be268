use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, oneshot};

use super::{Engine, InboundEvent, TurnError, TurnReply};

pub(crate) type TurnOutcome = Result<TurnReply, TurnError>;

/// A turn waiting for its session worker.
pub(crate) struct QueuedTurn {
    pub event: InboundEvent,
    pub respond: oneshot::Sender<TurnOutcome>,
}

struct WorkerHandle {
    generation: u64,
    sender: mpsc::UnboundedSender<QueuedTurn>,
}

/// One worker per session key. Turns for a key run in arrival order; keys run
/// concurrently. Workers with no traffic for `idle` retire.
pub(crate) struct SessionQueues {
    workers: Arc<Mutex<HashMap<String, WorkerHandle>>>,
    next_generation: AtomicU64,
    idle: Duration,
}

impl SessionQueues {
    pub(crate) fn new(idle: Duration) -> Self {
        Self {
            workers: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
            idle,
        }
    }

    pub(crate) async fn active_workers(&self) -> usize {
        self.workers.lock().await.len()
    }

    /// Hands the turn to the key's worker. The send happens under the map lock,
    /// so a worker deciding to retire sees every turn already queued for it.
    pub(crate) async fn enqueue(&self, engine: &Arc<Engine>, turn: QueuedTurn) {
        let key = turn.event.session_key.clone();
        let mut workers = self.workers.lock().await;

        let turn = match workers.get(&key) {
            Some(handle) => match handle.sender.send(turn) {
                Ok(()) => return,
                // Worker task is gone without deregistering.
                Err(err) => err.0,
            },
            None => turn,
        };

        let handle = self.spawn_worker(&key, engine);
        if handle.sender.send(turn).is_err() {
            tracing::warn!("session worker rejected its first turn");
        }
        workers.insert(key, handle);
    }

    fn spawn_worker(&self, key: &str, engine: &Arc<Engine>) -> WorkerHandle {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        spawn_queue_worker(
            key.to_string(),
            generation,
            receiver,
            Arc::clone(engine),
            Arc::clone(&self.workers),
            self.idle,
        );
        WorkerHandle { generation, sender }
    }
}

fn spawn_queue_worker(
    key: String,
    generation: u64,
    mut receiver: mpsc::UnboundedReceiver<QueuedTurn>,
    engine: Arc<Engine>,
    workers: Arc<Mutex<HashMap<String, WorkerHandle>>>,
    idle: Duration,
) {
    tokio::spawn(async move {
        loop {
            match tokio::time::timeout(idle, receiver.recv()).await {
                Ok(Some(turn)) => run_turn(&engine, turn).await,
                Ok(None) => break,
                Err(_) => {
                    let mut workers = workers.lock().await;
                    // A turn sent while the timer fired keeps this worker alive.
                    if !receiver.is_empty() {
                        continue;
                    }
                    if workers
                        .get(&key)
                        .is_some_and(|handle| handle.generation == generation)
                    {
                        workers.remove(&key);
                    }
                    receiver.close();
                    tracing::trace!(generation, "session worker retired");
                    break;
                }
            }
        }
    });
}

async fn run_turn(engine: &Engine, turn: QueuedTurn) {
    let outcome = engine.process(turn.event).await;
    let _ = turn.respond.send(outcome);
}
