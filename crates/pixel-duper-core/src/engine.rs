use crate::cache::SignatureCache;
use crate::cluster::{recluster, DuplicateGroup, DuplicateGroups};
use crate::config::{self, AppConfig};
use crate::decode::{ImageDecoder, StandardDecoder};
use crate::error::Error;
use crate::file_id::FileId;
use crate::pipeline::{run_worker, Phase, PipelineContext};
use crate::progress::ProgressReporter;
use crate::scanner;
use crate::telemetry::TelemetrySnapshot;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

pub struct ScanEngine {
    config: AppConfig,
    decoder: Arc<dyn ImageDecoder>,
}

#[derive(Debug)]
pub struct ScanResult {
    pub total_files: usize,
    pub bad_files: Vec<FileId>,
    pub groups: DuplicateGroups,
    pub telemetry: TelemetrySnapshot,
    pub scan_duration: Duration,
    pub hash_duration: Duration,
    pub process_duration: Duration,
    pub match_duration: Duration,
    pub cache_entries: usize,
    pub cache_saved: bool,
}

impl ScanResult {
    /// Merge overlapping groups, catch-all included, into disjoint clusters.
    pub fn reclustered(&self) -> Vec<DuplicateGroup> {
        recluster(self.groups.all())
    }
}

impl ScanEngine {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            decoder: Arc::new(StandardDecoder),
        }
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn ImageDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Walk the configured roots and run the pipeline over every file found.
    pub fn scan(&self, reporter: &dyn ProgressReporter) -> Result<ScanResult, Error> {
        let non_overlapping = config::non_overlapping_directories(self.config.root_paths.clone());
        info!("Processing directories: {:?}", non_overlapping);

        let root_path_slices: Vec<&str> = non_overlapping.iter().map(|s| s.as_str()).collect();
        let ignore_pattern_slices: Vec<&str> =
            self.config.ignore_patterns.iter().map(|s| s.as_str()).collect();

        reporter.on_scan_start();
        info!("Scanning files...");
        let scan_start = Instant::now();
        let files = scanner::collect_input_files(&root_path_slices, &ignore_pattern_slices)?;
        let scan_duration = scan_start.elapsed();
        reporter.on_scan_complete(files.len(), scan_duration.as_secs_f64());
        debug!(
            "Scan completed in {:.2}s, {} files",
            scan_duration.as_secs_f64(),
            files.len()
        );

        let mut result = self.run(files, reporter)?;
        result.scan_duration = scan_duration;
        Ok(result)
    }

    /// Run Hash, Process and Match over `files` with the configured worker pool.
    pub fn run(
        &self,
        files: Vec<PathBuf>,
        reporter: &dyn ProgressReporter,
    ) -> Result<ScanResult, Error> {
        self.config.validate()?;
        let cache_path = PathBuf::from(&self.config.cache_path);
        let cache = SignatureCache::load(
            &cache_path,
            self.config.grid_width,
            self.config.grid_height,
        );
        let ctx = PipelineContext::new(&self.config, cache, Arc::clone(&self.decoder));
        let ids: Vec<FileId> = files.into_iter().map(FileId::from).collect();

        let mut timings = PhaseTimings::default();
        let mut cache_saved = false;

        thread::scope(|s| -> Result<(), Error> {
            let mut spawned = 0;
            for i in 0..self.config.workers {
                let spawn = thread::Builder::new()
                    .name(format!("pixel-worker-{i}"))
                    .spawn_scoped(s, || run_worker(&ctx));
                if let Err(e) = spawn {
                    ctx.flags.finish_all();
                    return Err(e.into());
                }
                spawned += 1;
            }
            ctx.workers.wait_started(spawned, ctx.poll_interval);
            debug!("{} workers started", spawned);

            info!("Hashing {} files...", ids.len());
            timings.hash = drive_phase(&ctx, Phase::Hash, &ids, reporter, |id| {
                ctx.file_queue.push(id.clone())
            });

            info!("Extracting signatures...");
            timings.process = drive_phase(&ctx, Phase::Process, &ids, reporter, |id| {
                ctx.file_queue.push(id.clone())
            });

            let save_start = Instant::now();
            // A failed save only costs the next run its warm start.
            match ctx.cache.save(&cache_path) {
                Ok(saved) => {
                    cache_saved = saved;
                    if saved {
                        reporter
                            .on_cache_saved(ctx.cache.len(), save_start.elapsed().as_secs_f64());
                    }
                }
                Err(e) => error!("Failed to save cache '{}': {}", cache_path.display(), e),
            }

            let signatures = ctx.take_processed();
            info!("Matching {} signatures...", signatures.len());
            timings.matching = drive_phase(&ctx, Phase::Match, &signatures, reporter, |item| {
                ctx.signature_queue.push(item.clone())
            });
            Ok(())
        })?;

        let mut groups = ctx
            .groups
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        groups.sort_matches();
        let mut bad_files = ctx
            .bad_files
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        bad_files.sort();

        info!(
            "{} duplicate groups, {} bright files, {} bad files",
            groups.len(),
            groups.catch_all().len(),
            bad_files.len()
        );

        Ok(ScanResult {
            total_files: ids.len(),
            bad_files,
            groups,
            telemetry: ctx.telemetry.snapshot(),
            scan_duration: Duration::ZERO,
            hash_duration: timings.hash,
            process_duration: timings.process,
            match_duration: timings.matching,
            cache_entries: ctx.cache.len(),
            cache_saved,
        })
    }
}

#[derive(Default)]
struct PhaseTimings {
    hash: Duration,
    process: Duration,
    matching: Duration,
}

/// Queue every item for `phase`, clear its flag, then wait for the phase barrier.
fn drive_phase<T>(
    ctx: &PipelineContext,
    phase: Phase,
    items: &[T],
    reporter: &dyn ProgressReporter,
    push: impl Fn(&T),
) -> Duration {
    let start = Instant::now();
    let total = items.len();
    reporter.on_phase_start(phase, total);
    for (i, item) in items.iter().enumerate() {
        push(item);
        reporter.on_phase_progress(phase, i + 1, total);
    }
    ctx.flags.finish(phase);
    ctx.workers.wait_drained(phase, ctx.poll_interval);

    let elapsed = start.elapsed();
    reporter.on_phase_complete(phase, elapsed.as_secs_f64());
    debug!("{} phase completed in {:.2}s", phase, elapsed.as_secs_f64());
    elapsed
}
