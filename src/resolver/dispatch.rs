//! Background dispatch of graph and event writes.
//!
//! Resolution enqueues side effects with a non-blocking `try_send` on a
//! bounded channel; a dedicated worker thread applies them. A full queue
//! drops the write and counts it. Sink failures are logged and counted,
//! never reported back to the request that caused them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, warn};

use crate::error::{ExecutionError, ResolveResult};
use crate::events::Event;
use crate::sinks::{EntityEdge, EntityNode, EventPublisher, GraphMirror};

/// One best-effort secondary write.
#[derive(Debug, Clone)]
pub enum SideEffect {
    /// Upsert a graph node.
    Node(EntityNode),
    /// Upsert a graph edge.
    Edge(EntityEdge),
    /// Publish an event.
    Event(Box<Event>),
}

impl SideEffect {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Node(_) => "graph_node",
            Self::Edge(_) => "graph_edge",
            Self::Event(_) => "event",
        }
    }
}

#[derive(Debug)]
enum DispatchMsg {
    Apply(SideEffect),
    /// Acknowledged once every earlier message has been applied.
    Flush { reply: Sender<()> },
}

/// Owns the side-effect worker thread.
#[derive(Debug)]
pub struct SideEffectDispatcher {
    tx: Sender<DispatchMsg>,
    dropped: AtomicU64,
    failed: Arc<AtomicU64>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl SideEffectDispatcher {
    /// Spawns the worker with a queue of `capacity` (at least one) messages.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to spawn the worker thread.
    #[must_use]
    pub fn new(
        capacity: usize,
        graph: Arc<dyn GraphMirror>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        let (tx, rx) = bounded::<DispatchMsg>(capacity.max(1));
        let failed = Arc::new(AtomicU64::new(0));

        let thread_failed = Arc::clone(&failed);
        let join = thread::Builder::new()
            .name("entity-resolution-side-effects".to_string())
            .spawn(move || worker_loop(&rx, graph.as_ref(), events.as_ref(), &thread_failed))
            .expect("failed to spawn side-effect worker");

        Self {
            tx,
            dropped: AtomicU64::new(0),
            failed,
            join: Mutex::new(Some(join)),
        }
    }

    /// Non-blocking enqueue. Returns false when the write was dropped.
    pub fn submit(&self, effect: SideEffect) -> bool {
        let kind = effect.kind();
        match self.tx.try_send(DispatchMsg::Apply(effect)) {
            Ok(()) => true,
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(kind, dropped, "side-effect queue full; write dropped");
                false
            }
        }
    }

    /// Blocks until everything submitted before this call has been applied.
    ///
    /// # Errors
    ///
    /// Returns `WorkerUnavailable` if the worker has exited.
    pub fn flush(&self) -> ResolveResult<()> {
        let unavailable = || ExecutionError::WorkerUnavailable {
            message: "side-effect worker is not running".to_string(),
        };

        let (reply, done) = bounded::<()>(1);
        self.tx
            .send(DispatchMsg::Flush { reply })
            .map_err(|_| unavailable())?;
        done.recv().map_err(|_| unavailable())?;
        Ok(())
    }

    /// Writes dropped because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Writes a sink rejected.
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

impl Drop for SideEffectDispatcher {
    fn drop(&mut self) {
        // Close the queue so the worker drains it and exits, then join.
        let (closed, _) = bounded::<DispatchMsg>(1);
        drop(std::mem::replace(&mut self.tx, closed));

        if let Ok(mut guard) = self.join.lock() {
            if let Some(handle) = guard.take() {
                if handle.join().is_err() {
                    warn!("side-effect worker panicked");
                }
            }
        }
    }
}

fn worker_loop(
    rx: &Receiver<DispatchMsg>,
    graph: &dyn GraphMirror,
    events: &dyn EventPublisher,
    failed: &AtomicU64,
) {
    for msg in rx {
        match msg {
            DispatchMsg::Apply(effect) => {
                let kind = effect.kind();
                let outcome = match &effect {
                    SideEffect::Node(node) => graph.upsert_node(node),
                    SideEffect::Edge(edge) => graph.upsert_edge(edge),
                    SideEffect::Event(event) => events.publish(event),
                };
                if let Err(error) = outcome {
                    failed.fetch_add(1, Ordering::Relaxed);
                    warn!(kind, %error, "side-effect write failed");
                }
            }
            DispatchMsg::Flush { reply } => {
                let _ = reply.send(());
            }
        }
    }
    debug!("side-effect worker stopped");
}
