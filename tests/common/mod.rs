#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use entity_resolution::resolver::{CancellationToken, Collaborators, Resolver};
use entity_resolution::sinks::{RecordingEventPublisher, RecordingGraphMirror};
use entity_resolution::{
    CandidateStore, Config, Entity, EntityId, EntityLink, EntityType, InMemoryCandidateStore,
    InMemoryJobStore, StorageError,
};

/// In-memory store with switchable failures.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryCandidateStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    get_delay_ms: AtomicU64,
    creates: AtomicUsize,
    cancel_after: Mutex<Option<(usize, CancellationToken)>>,
}

impl FlakyStore {
    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    /// Delays every `get`, widening read-then-write windows.
    pub fn slow_gets(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.get_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Cancels `token` once `creates` entities have been created.
    pub fn cancel_after_creates(&self, creates: usize, token: CancellationToken) {
        *self.cancel_after.lock().unwrap() = Some((creates, token));
    }

    fn read_guard(&self) -> Result<(), StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::ConnectionError("read replica down".into()));
        }
        Ok(())
    }

    fn write_guard(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::ConnectionError("primary down".into()));
        }
        Ok(())
    }
}

impl CandidateStore for FlakyStore {
    fn find_by_identifier(
        &self,
        entity_type: &EntityType,
        key: &str,
        value: &str,
    ) -> Result<Vec<Entity>, StorageError> {
        self.read_guard()?;
        self.inner.find_by_identifier(entity_type, key, value)
    }

    fn find_by_fuzzy_name(
        &self,
        entity_type: &EntityType,
        standardized_name: &str,
        threshold: f64,
    ) -> Result<Vec<Entity>, StorageError> {
        self.read_guard()?;
        self.inner.find_by_fuzzy_name(entity_type, standardized_name, threshold)
    }

    fn create(&self, entity: Entity) -> Result<(), StorageError> {
        self.write_guard()?;
        self.inner.create(entity)?;

        let created = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, token)) = self.cancel_after.lock().unwrap().as_ref() {
            if created >= *after {
                token.cancel();
            }
        }
        Ok(())
    }

    fn get(&self, id: EntityId) -> Result<Option<Entity>, StorageError> {
        self.read_guard()?;
        let delay = self.get_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }
        self.inner.get(id)
    }

    fn update(&self, entity: Entity) -> Result<(), StorageError> {
        self.write_guard()?;
        self.inner.update(entity)
    }

    fn create_link(&self, link: EntityLink) -> Result<(), StorageError> {
        self.write_guard()?;
        self.inner.create_link(link)
    }

    fn links_for(&self, id: EntityId) -> Result<Vec<EntityLink>, StorageError> {
        self.read_guard()?;
        self.inner.links_for(id)
    }
}

pub struct Harness {
    pub resolver: Resolver,
    pub store: Arc<FlakyStore>,
    pub jobs: Arc<InMemoryJobStore>,
    pub graph: Arc<RecordingGraphMirror>,
    pub events: Arc<RecordingEventPublisher>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        let store = Arc::new(FlakyStore::default());
        let jobs = Arc::new(InMemoryJobStore::new());
        let graph = Arc::new(RecordingGraphMirror::new());
        let events = Arc::new(RecordingEventPublisher::new());

        let resolver = Resolver::new(
            config,
            Collaborators {
                store: store.clone(),
                jobs: jobs.clone(),
                graph: graph.clone(),
                events: events.clone(),
            },
        )
        .unwrap();

        Self {
            resolver,
            store,
            jobs,
            graph,
            events,
        }
    }

    pub fn with_auto_merge(threshold: f64) -> Self {
        let mut config = Config::default();
        config.resolution.auto_merge_threshold = threshold;
        Self::with_config(&config)
    }

    pub fn entity_count(&self) -> usize {
        self.store.inner.len().unwrap()
    }
}
