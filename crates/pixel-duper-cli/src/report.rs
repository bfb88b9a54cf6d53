use anyhow::Context;
use colored::*;
use pixel_duper_core::{DuplicateGroup, FileId, ImageDecoder, ScanResult, TelemetrySnapshot};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// One reported file: path plus what can be learned without a full decode.
struct FileLine {
    path: String,
    dimensions: Option<(u32, u32)>,
    bytes: u64,
}

fn describe(id: &FileId, decoder: &dyn ImageDecoder) -> FileLine {
    let bytes = fs::metadata(id.path()).map(|m| m.len()).unwrap_or(0);
    let dimensions = match decoder.peek_file_dimensions(id.path()) {
        Ok(dims) => Some(dims),
        Err(e) => {
            warn!("Cannot read image size of '{}': {}", id, e);
            None
        }
    };
    FileLine {
        path: id.to_string(),
        dimensions,
        bytes,
    }
}

fn format_dimensions(dimensions: Option<(u32, u32)>) -> String {
    match dimensions {
        Some((w, h)) => format!("{}x{}", w, h),
        None => "?".to_string(),
    }
}

pub fn print_groups(groups: &[DuplicateGroup], decoder: &dyn ImageDecoder) {
    for (n, group) in groups.iter().enumerate() {
        if group.is_empty() {
            continue;
        }
        println!(
            "{} {} ({} files)",
            "Group".bold(),
            format!("{}", n + 1).bold(),
            group.len()
        );
        for id in group {
            let line = describe(id, decoder);
            println!(
                "    {:>11}  {:>10}  {}",
                format_dimensions(line.dimensions).cyan(),
                line.bytes,
                line.path
            );
        }
    }
}

pub fn print_bad_files(bad_files: &[FileId]) {
    if bad_files.is_empty() {
        return;
    }
    println!("{} ({})", "Unreadable images".red().bold(), bad_files.len());
    for id in bad_files {
        println!("    {}", id);
    }
}

pub fn print_summary(result: &ScanResult, reported_groups: usize) {
    info!(
        "Scan: {}, Hash: {}, Process: {}, Match: {}",
        format!("{:.2}s", result.scan_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.hash_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.process_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.match_duration.as_secs_f64()).green(),
    );
    print_telemetry(&result.telemetry);
    info!(
        "{} files, {} duplicate groups, {} bad files, {} cache entries{}",
        result.total_files,
        format!("{}", reported_groups).red(),
        format!("{}", result.bad_files.len()).red(),
        result.cache_entries,
        if result.cache_saved { " (saved)" } else { "" },
    );
}

fn print_telemetry(t: &TelemetrySnapshot) {
    info!(
        "Hashed {} files ({} changed), {:.2} GiB at {:.1} MiB/s",
        t.hash.count,
        t.hash.recomputed,
        t.hash.gib(),
        t.hash.mib_per_sec()
    );
    info!(
        "Read {} files, {:.2} GiB at {:.1} MiB/s",
        t.read.count,
        t.read.gib(),
        t.read.mib_per_sec()
    );
    info!(
        "Decoded {} images ({:.1} files/s)",
        t.decode.count,
        t.decode.files_per_sec()
    );
    info!(
        "Processed {} files, {} recomputed ({:.1} files/s)",
        t.process.count,
        t.process.recomputed,
        t.process.files_per_sec()
    );
    info!(
        "Matched {} signatures in {:.2}s",
        t.matching.count,
        t.matching.duration.as_secs_f64()
    );
}

pub fn write_csv(
    path: &Path,
    groups: &[DuplicateGroup],
    decoder: &dyn ImageDecoder,
) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["group", "path", "width", "height", "bytes"])?;

    for (n, group) in groups.iter().enumerate() {
        for id in group {
            let line = describe(id, decoder);
            let (w, h) = line
                .dimensions
                .map(|(w, h)| (w.to_string(), h.to_string()))
                .unwrap_or_default();
            writer.write_record([
                (n + 1).to_string(),
                line.path,
                w,
                h,
                line.bytes.to_string(),
            ])?;
        }
    }

    writer.flush()?;
    info!("Wrote {} groups to {}", groups.len(), path.display());
    Ok(())
}
