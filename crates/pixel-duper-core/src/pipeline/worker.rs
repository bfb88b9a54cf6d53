use super::coordinator::{Phase, PipelineContext};
use crate::cache::format_timestamp;
use crate::error::Error;
use crate::file_id::FileId;
use crate::hasher;
use crate::matcher::match_file;
use crate::signature::Signature;
use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::sync::PoisonError;
use std::time::Instant;
use tracing::{debug, error, trace, warn};

/// Body of one pipeline worker: Hash, Process and Match loops in order.
///
/// A panic while handling one file is caught and treated as that file's
/// failure. The worker slot is released even if the worker itself unwinds.
pub fn run_worker(ctx: &PipelineContext) {
    let mut slot = ctx.workers.join(Phase::Hash);
    let recomputed = hash_loop(ctx);
    ctx.telemetry.add_hash_recomputes(recomputed);

    slot.advance(Phase::Process);
    process_loop(ctx);

    slot.advance(Phase::Match);
    match_loop(ctx);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Returns the number of files whose content hash changed.
fn hash_loop(ctx: &PipelineContext) -> usize {
    let mut recomputed = 0;
    loop {
        let Some(id) = ctx.file_queue.pop(ctx.poll_interval) else {
            if ctx.flags.is_active(Phase::Hash) {
                continue;
            }
            break;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| hash_one(ctx, &id)))
            .unwrap_or_else(|payload| Err(Error::Other(panic_message(&*payload))));
        match outcome {
            Ok(true) => recomputed += 1,
            Ok(false) => {}
            Err(e) => {
                error!("Error hashing '{}': {}", id, e);
                ctx.cache.remove_entry(&id);
            }
        }
    }
    recomputed
}

fn hash_one(ctx: &PipelineContext, id: &FileId) -> Result<bool, Error> {
    let start = Instant::now();
    let mtime = fs::metadata(id.path())?.modified()?;
    let timestamp = format_timestamp(mtime);

    if ctx.cache.is_fresh(id, &timestamp) {
        trace!("Unchanged since last scan: {}", id);
        return Ok(false);
    }

    let (hash, bytes) = hasher::hash_file(id.path())?;
    let changed = ctx.cache.record_hash(id, timestamp, hash);
    ctx.telemetry.record_hash(bytes, start.elapsed());
    if changed {
        trace!("Content changed: {}", id);
    }
    Ok(changed)
}

fn process_loop(ctx: &PipelineContext) {
    loop {
        let Some(id) = ctx.file_queue.pop(ctx.poll_interval) else {
            if ctx.flags.is_active(Phase::Process) {
                continue;
            }
            break;
        };
        let path = id.clone();
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| process_one(ctx, id))) {
            error!("Error processing '{}': {}", path, panic_message(&*payload));
        }
    }
}

fn process_one(ctx: &PipelineContext, id: FileId) {
    let start = Instant::now();

    if ctx.cache.has_signature(&id) {
        if let Some(signature) = ctx.cache.signature(&id) {
            trace!("Reusing cached signature for {}", id);
            ctx.publish(id, signature);
            ctx.telemetry.record_process(0, false, start.elapsed());
            return;
        }
        debug!("Cached signature for {} does not fit the grid", id);
    }

    recompute(ctx, id, start);
}

/// Read, decode and extract a fresh signature. Shared by cache misses and
/// cached records that failed validation.
fn recompute(ctx: &PipelineContext, id: FileId, start: Instant) {
    ctx.cache.mark_recompute();

    let read_start = Instant::now();
    let bytes = match hasher::read_full_file(id.path()) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Error reading '{}': {}", id, e);
            return;
        }
    };
    ctx.telemetry
        .record_read(bytes.len() as u64, read_start.elapsed());

    match extract(ctx, &bytes) {
        Ok(signature) => {
            ctx.cache.store_signature(&id, signature.clone());
            ctx.publish(id, signature);
            ctx.telemetry
                .record_process(bytes.len() as u64, true, start.elapsed());
        }
        Err(e) => {
            warn!("Bad image '{}': {}", id, e);
            ctx.cache.remove_entry(&id);
            ctx.add_bad_file(id);
        }
    }
}

/// Decode and extract. A decoder panic counts as a decode error.
fn extract(ctx: &PipelineContext, bytes: &[u8]) -> Result<Signature, Error> {
    let decode_start = Instant::now();
    let buffer = panic::catch_unwind(AssertUnwindSafe(|| ctx.decoder.decode(bytes)))
        .unwrap_or_else(|payload| {
            Err(Error::Decode(format!("decoder panicked: {}", panic_message(&*payload))))
        })?;
    ctx.telemetry
        .record_decode(buffer.bytes() as u64, decode_start.elapsed());
    Signature::extract(&buffer, ctx.grid_width, ctx.grid_height)
}

fn match_loop(ctx: &PipelineContext) {
    loop {
        let Some((id, signature)) = ctx.signature_queue.pop(ctx.poll_interval) else {
            if ctx.flags.is_active(Phase::Match) {
                continue;
            }
            break;
        };

        let start = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let reader = ctx.index.reader();
            match_file(&id, &signature, &reader, &ctx.params)
        }));
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(payload) => {
                error!("Error matching '{}': {}", id, panic_message(&*payload));
                continue;
            }
        };

        if outcome.bright || outcome.group.is_some() {
            let mut groups = ctx.groups.lock().unwrap_or_else(PoisonError::into_inner);
            if outcome.bright {
                groups.add_to_catch_all(id.clone());
            }
            if let Some(group) = outcome.group {
                trace!("{} matches {} files", id, group.len() - 1);
                groups.push(group);
            }
        }
        ctx.telemetry.record_match(start.elapsed());
    }
}
