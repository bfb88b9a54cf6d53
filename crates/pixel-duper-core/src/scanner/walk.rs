use crate::platform::{self, FileIdentity};
use dashmap::DashMap;
use glob::Pattern;
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// Parallel directory traversal. Returns every regular file under `root_paths`
/// not matched by an ignore glob, one path per underlying file, sorted.
///
/// Symlinked files are followed; symlinked directories are not descended.
/// Paths reaching the same file (hard links, symlinks) collapse to the
/// lexicographically smallest one.
pub fn collect_input_files(root_paths: &[&str], ignore_globs: &[&str]) -> io::Result<Vec<PathBuf>> {
    let by_identity: DashMap<FileIdentity, PathBuf> = DashMap::new();
    let unidentified: DashMap<PathBuf, ()> = DashMap::new();

    let ignore_patterns: Vec<Pattern> = ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect();

    let sink = Sink {
        by_identity: &by_identity,
        unidentified: &unidentified,
    };

    root_paths.par_iter().try_for_each(|root| {
        let root = Path::new(root);
        if root.is_file() {
            sink.add(root);
            Ok(())
        } else {
            visit_dirs(root, &sink, &ignore_patterns)
        }
    })?;

    let mut files: Vec<PathBuf> = by_identity
        .into_iter()
        .map(|(_, path)| path)
        .chain(unidentified.into_iter().map(|(path, _)| path))
        .collect();
    files.sort();
    files.dedup();
    debug!("Collected {} input files", files.len());
    Ok(files)
}

struct Sink<'a> {
    by_identity: &'a DashMap<FileIdentity, PathBuf>,
    unidentified: &'a DashMap<PathBuf, ()>,
}

impl Sink<'_> {
    fn add(&self, path: &Path) {
        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(err) => {
                warn!("Error getting metadata for {}: {}", path.display(), err);
                return;
            }
        };
        if !metadata.is_file() {
            return;
        }

        match platform::file_identity(path, &metadata) {
            Some(identity) => {
                let mut slot = self
                    .by_identity
                    .entry(identity)
                    .or_insert_with(|| path.to_path_buf());
                if path < slot.as_path() {
                    debug!("{} aliases {}", slot.display(), path.display());
                    *slot = path.to_path_buf();
                } else if path != slot.as_path() {
                    debug!("{} aliases {}", path.display(), slot.display());
                }
            }
            None => {
                self.unidentified.insert(path.to_path_buf(), ());
            }
        }
    }
}

fn visit_dirs(dir: &Path, sink: &Sink<'_>, ignore_patterns: &[Pattern]) -> io::Result<()> {
    if !dir.is_dir() {
        warn!("Skipping {}: not a directory", dir.display());
        return Ok(());
    }

    if ignore_patterns
        .iter()
        .any(|pattern| pattern.matches_path(dir))
    {
        return Ok(());
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            if err.kind() == io::ErrorKind::PermissionDenied {
                error!(
                    "Access denied reading directory {}: {}",
                    dir.display(),
                    err
                );
                return Ok(());
            } else {
                return Err(io::Error::new(
                    err.kind(),
                    format!("Error reading directory {}: {}", dir.display(), err),
                ));
            }
        }
    };

    entries.par_bridge().try_for_each(|entry_result| {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Error reading entry in directory {}: {}", dir.display(), err);
                return Ok(());
            }
        };

        let path = entry.path();
        if ignore_patterns
            .iter()
            .any(|pattern| pattern.matches_path(&path))
        {
            return Ok(());
        }

        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(err) => {
                warn!("Error getting file type for {}: {}", path.display(), err);
                return Ok(());
            }
        };

        if file_type.is_dir() {
            visit_dirs(&path, sink, ignore_patterns)?;
        } else {
            sink.add(&path);
        }
        Ok(())
    })
}
