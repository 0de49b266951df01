use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use rustc_hash::FxHashSet;

use super::{ResourceTable, ResourceType};
use crate::errors::{ArborError, Result};

const MAX_WORKERS: usize = 4;

struct Job {
    path: String,
    file: PathBuf,
}

struct Fetched {
    path: String,
    bytes: std::io::Result<Vec<u8>>,
}

type ReadyCallback = Box<dyn FnOnce(&ResourceTable)>;

/// Pending-count latch over a pool of file readers.
///
/// Every [`load`](Self::load) bumps `total` and `pending`; every arrival
/// decrements `pending`. When it reaches zero the ready callback fires,
/// once. Files are read on worker threads and decoded on the thread that
/// drains results.
///
/// ```rust,ignore
/// let mut loader = Loader::new("assets")?;
/// loader.load(["shaders/terrain.vert", "scene.json"]);
/// let resources = loader.wait()?;
/// ```
pub struct Loader {
    root: PathBuf,
    resources: ResourceTable,
    requested: FxHashSet<String>,

    total: usize,
    pending: usize,
    failed: usize,

    jobs: Option<flume::Sender<Job>>,
    results: flume::Receiver<Fetched>,
    workers: Vec<JoinHandle<()>>,
    on_ready: Option<ReadyCallback>,
}

impl Loader {
    /// Spawns the reader pool. Paths passed to [`load`](Self::load) are
    /// relative to `root`.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let (job_tx, job_rx) = flume::unbounded::<Job>();
        let (result_tx, result_rx) = flume::unbounded::<Fetched>();

        let count = std::thread::available_parallelism()
            .map_or(1, std::num::NonZeroUsize::get)
            .min(MAX_WORKERS);
        let mut workers = Vec::with_capacity(count);
        for index in 0..count {
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("arbor-loader-{index}"))
                .spawn(move || {
                    for job in jobs.iter() {
                        let bytes = std::fs::read(&job.file);
                        if results.send(Fetched { path: job.path, bytes }).is_err() {
                            break;
                        }
                    }
                })?;
            workers.push(handle);
        }

        Ok(Self {
            root: root.as_ref().to_path_buf(),
            resources: ResourceTable::new(),
            requested: FxHashSet::default(),
            total: 0,
            pending: 0,
            failed: 0,
            jobs: Some(job_tx),
            results: result_rx,
            workers,
            on_ready: None,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Callback run with the finished table when `pending` reaches zero.
    /// If nothing is pending it runs at the next [`poll`](Self::poll).
    pub fn on_ready(&mut self, callback: impl FnOnce(&ResourceTable) + 'static) {
        self.on_ready = Some(Box::new(callback));
    }

    /// Queues paths. Paths already loaded or queued are skipped.
    pub fn load<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let Some(jobs) = &self.jobs else {
            return;
        };
        for path in paths {
            let path = path.into();
            if self.resources.contains(&path) || !self.requested.insert(path.clone()) {
                continue;
            }
            let file = self.root.join(&path);
            log::debug!("Loading {}", file.display());
            self.total += 1;
            self.pending += 1;
            if jobs.send(Job { path, file }).is_err() {
                log::error!("Loader worker pool is gone");
            }
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.pending == 0
    }

    #[must_use]
    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourceTable {
        &mut self.resources
    }

    /// Drains arrived files without blocking. Returns `true` once nothing
    /// is pending. The first failure is returned as an error.
    pub fn poll(&mut self) -> Result<bool> {
        while let Ok(fetched) = self.results.try_recv() {
            self.accept(fetched)?;
        }
        self.fire_ready();
        Ok(self.is_ready())
    }

    /// Blocks until every queued path has arrived.
    pub fn wait(&mut self) -> Result<&ResourceTable> {
        while self.pending > 0 {
            let fetched = self
                .results
                .recv()
                .map_err(|_| ArborError::ResourceNotFound("loader results channel closed".into()))?;
            self.accept(fetched)?;
        }
        self.fire_ready();
        Ok(&self.resources)
    }

    /// Finishes loading and hands over the table.
    pub fn finish(mut self) -> Result<ResourceTable> {
        self.wait()?;
        Ok(std::mem::take(&mut self.resources))
    }

    fn accept(&mut self, fetched: Fetched) -> Result<()> {
        self.pending = self.pending.saturating_sub(1);
        let Fetched { path, bytes } = fetched;
        let decoded = bytes
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ArborError::ResourceNotFound(path.clone()),
                _ => ArborError::Io(e),
            })
            .and_then(|bytes| ResourceType::from_path(&path).decode(&path, bytes));
        match decoded {
            Ok(resource) => {
                log::debug!("Loaded {path} ({} pending)", self.pending);
                self.resources.insert(path, resource);
                Ok(())
            }
            Err(e) => {
                self.failed += 1;
                log::error!("Failed to load {path}: {e}");
                Err(e)
            }
        }
    }

    fn fire_ready(&mut self) {
        if self.pending == 0
            && let Some(callback) = self.on_ready.take()
        {
            log::info!("Loaded {} resources", self.total);
            callback(&self.resources);
        }
    }
}

impl Drop for Loader {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loops.
        self.jobs = None;
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
