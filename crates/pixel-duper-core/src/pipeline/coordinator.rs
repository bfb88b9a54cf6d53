use super::queue::WorkQueue;
use crate::cache::SignatureCache;
use crate::cluster::DuplicateGroups;
use crate::config::AppConfig;
use crate::decode::ImageDecoder;
use crate::file_id::FileId;
use crate::index::InvertedIndex;
use crate::matcher::MatchParams;
use crate::signature::Signature;
use crate::telemetry::Telemetry;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Hash,
    Process,
    Match,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Hash => write!(f, "hash"),
            Phase::Process => write!(f, "process"),
            Phase::Match => write!(f, "match"),
        }
    }
}

/// "More work may still arrive" flags, one per phase. Only the driver clears them.
#[derive(Debug)]
pub struct PhaseFlags {
    hash: AtomicBool,
    process: AtomicBool,
    matching: AtomicBool,
}

impl Default for PhaseFlags {
    fn default() -> Self {
        Self {
            hash: AtomicBool::new(true),
            process: AtomicBool::new(true),
            matching: AtomicBool::new(true),
        }
    }
}

impl PhaseFlags {
    fn flag(&self, phase: Phase) -> &AtomicBool {
        match phase {
            Phase::Hash => &self.hash,
            Phase::Process => &self.process,
            Phase::Match => &self.matching,
        }
    }

    pub fn is_active(&self, phase: Phase) -> bool {
        self.flag(phase).load(Ordering::Acquire)
    }

    pub fn finish(&self, phase: Phase) {
        self.flag(phase).store(false, Ordering::Release);
    }

    pub fn finish_all(&self) {
        for phase in [Phase::Hash, Phase::Process, Phase::Match] {
            self.finish(phase);
        }
    }
}

/// Number of workers currently inside each phase loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerCounts {
    pub started: usize,
    pub hashing: usize,
    pub processing: usize,
    pub matching: usize,
}

impl WorkerCounts {
    fn slot(&mut self, phase: Phase) -> &mut usize {
        match phase {
            Phase::Hash => &mut self.hashing,
            Phase::Process => &mut self.processing,
            Phase::Match => &mut self.matching,
        }
    }

    pub fn in_phase(&self, phase: Phase) -> usize {
        match phase {
            Phase::Hash => self.hashing,
            Phase::Process => self.processing,
            Phase::Match => self.matching,
        }
    }

    pub fn live(&self) -> usize {
        self.hashing + self.processing + self.matching
    }
}

/// Worker counters plus a condition variable the driver waits on.
///
/// Counters are only moved by the workers themselves; the driver only reads.
#[derive(Debug, Default)]
pub struct WorkerState {
    counts: Mutex<WorkerCounts>,
    changed: Condvar,
}

impl WorkerState {
    fn lock(&self) -> MutexGuard<'_, WorkerCounts> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enter(&self, phase: Phase) {
        let mut counts = self.lock();
        counts.started += 1;
        *counts.slot(phase) += 1;
        self.changed.notify_all();
    }

    pub fn transition(&self, from: Phase, to: Phase) {
        let mut counts = self.lock();
        *counts.slot(from) -= 1;
        *counts.slot(to) += 1;
        self.changed.notify_all();
    }

    pub fn leave(&self, phase: Phase) {
        let mut counts = self.lock();
        *counts.slot(phase) -= 1;
        self.changed.notify_all();
    }

    /// Enter `phase` and return a slot that leaves whatever phase it is in
    /// when dropped, unwinding included.
    pub fn join(&self, phase: Phase) -> WorkerSlot<'_> {
        self.enter(phase);
        WorkerSlot { state: self, phase }
    }

    pub fn snapshot(&self) -> WorkerCounts {
        *self.lock()
    }

    /// Block until `workers` workers have entered their first phase.
    pub fn wait_started(&self, workers: usize, recheck: Duration) {
        let mut counts = self.lock();
        while counts.started < workers {
            counts = self
                .changed
                .wait_timeout(counts, recheck)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Phase barrier: block until no worker is left inside `phase`.
    pub fn wait_drained(&self, phase: Phase, recheck: Duration) {
        let mut counts = self.lock();
        while counts.in_phase(phase) != 0 {
            counts = self
                .changed
                .wait_timeout(counts, recheck)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

/// A worker's place in the counters.
pub struct WorkerSlot<'a> {
    state: &'a WorkerState,
    phase: Phase,
}

impl WorkerSlot<'_> {
    pub fn advance(&mut self, to: Phase) {
        self.state.transition(self.phase, to);
        self.phase = to;
    }
}

impl Drop for WorkerSlot<'_> {
    fn drop(&mut self) {
        self.state.leave(self.phase);
    }
}

/// Everything the workers share for one pipeline run.
pub struct PipelineContext {
    pub grid_width: u32,
    pub grid_height: u32,
    pub poll_interval: Duration,
    pub params: MatchParams,
    pub decoder: Arc<dyn ImageDecoder>,
    pub cache: SignatureCache,
    pub index: InvertedIndex,
    pub groups: Mutex<DuplicateGroups>,
    pub bad_files: Mutex<Vec<FileId>>,
    /// Signatures produced during Process, handed to the match queue by the driver.
    pub processed: Mutex<Vec<(FileId, Signature)>>,
    pub telemetry: Telemetry,
    pub file_queue: WorkQueue<FileId>,
    pub signature_queue: WorkQueue<(FileId, Signature)>,
    pub flags: PhaseFlags,
    pub workers: WorkerState,
}

impl PipelineContext {
    pub fn new(config: &AppConfig, cache: SignatureCache, decoder: Arc<dyn ImageDecoder>) -> Self {
        Self {
            grid_width: config.grid_width,
            grid_height: config.grid_height,
            poll_interval: config.poll_interval(),
            params: MatchParams::from(config),
            decoder,
            cache,
            index: InvertedIndex::new(),
            groups: Mutex::new(DuplicateGroups::new()),
            bad_files: Mutex::new(Vec::new()),
            processed: Mutex::new(Vec::new()),
            telemetry: Telemetry::new(),
            file_queue: WorkQueue::new(config.queue_capacity),
            signature_queue: WorkQueue::new(config.queue_capacity),
            flags: PhaseFlags::default(),
            workers: WorkerState::default(),
        }
    }

    /// Index a signature and keep it for the match phase.
    pub fn publish(&self, id: FileId, signature: Signature) {
        let quantized = signature.quantized(self.params.quantize_num, self.params.quantize_den);
        self.index.insert(&id, &quantized);
        self.processed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, signature));
    }

    pub fn add_bad_file(&self, id: FileId) {
        self.bad_files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id);
    }

    pub fn take_processed(&self) -> Vec<(FileId, Signature)> {
        std::mem::take(&mut *self.processed.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
