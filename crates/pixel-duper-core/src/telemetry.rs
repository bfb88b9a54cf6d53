use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Running totals for one pipeline phase.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseStats {
    pub count: usize,
    pub bytes: u64,
    pub recomputed: usize,
    pub duration: Duration,
}

impl PhaseStats {
    pub fn files_per_sec(&self) -> f64 {
        rate(self.count as f64, self.duration)
    }

    pub fn mib_per_sec(&self) -> f64 {
        rate(self.bytes as f64 / 1024.0 / 1024.0, self.duration)
    }

    pub fn gib(&self) -> f64 {
        self.bytes as f64 / 1024.0 / 1024.0 / 1024.0
    }
}

fn rate(amount: f64, duration: Duration) -> f64 {
    let secs = duration.as_secs_f64();
    if secs > 0.0 {
        amount / secs
    } else {
        0.0
    }
}

/// Per-phase counters shared by every worker. Each phase has its own lock.
#[derive(Debug, Default)]
pub struct Telemetry {
    hash: Mutex<PhaseStats>,
    read: Mutex<PhaseStats>,
    decode: Mutex<PhaseStats>,
    process: Mutex<PhaseStats>,
    matching: Mutex<PhaseStats>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub hash: PhaseStats,
    pub read: PhaseStats,
    pub decode: PhaseStats,
    pub process: PhaseStats,
    pub matching: PhaseStats,
}

fn update(stats: &Mutex<PhaseStats>, f: impl FnOnce(&mut PhaseStats)) {
    f(&mut stats.lock().unwrap_or_else(PoisonError::into_inner));
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hash(&self, bytes: u64, elapsed: Duration) {
        update(&self.hash, |s| {
            s.count += 1;
            s.bytes += bytes;
            s.duration += elapsed;
        });
    }

    /// Content changes found by one worker over the whole hash phase.
    pub fn add_hash_recomputes(&self, recomputed: usize) {
        update(&self.hash, |s| s.recomputed += recomputed);
    }

    pub fn record_read(&self, bytes: u64, elapsed: Duration) {
        update(&self.read, |s| {
            s.count += 1;
            s.bytes += bytes;
            s.duration += elapsed;
        });
    }

    pub fn record_decode(&self, bytes: u64, elapsed: Duration) {
        update(&self.decode, |s| {
            s.count += 1;
            s.bytes += bytes;
            s.duration += elapsed;
        });
    }

    /// A processed file; `bytes` is zero and `recomputed` false for cache hits.
    pub fn record_process(&self, bytes: u64, recomputed: bool, elapsed: Duration) {
        update(&self.process, |s| {
            s.count += 1;
            s.bytes += bytes;
            s.recomputed += usize::from(recomputed);
            s.duration += elapsed;
        });
    }

    pub fn record_match(&self, elapsed: Duration) {
        update(&self.matching, |s| {
            s.count += 1;
            s.duration += elapsed;
        });
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let get = |m: &Mutex<PhaseStats>| *m.lock().unwrap_or_else(PoisonError::into_inner);
        TelemetrySnapshot {
            hash: get(&self.hash),
            read: get(&self.read),
            decode: get(&self.decode),
            process: get(&self.process),
            matching: get(&self.matching),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let t = Telemetry::new();
        t.record_process(100, true, Duration::from_millis(10));
        t.record_process(0, false, Duration::from_millis(10));
        t.add_hash_recomputes(3);
        let snap = t.snapshot();
        assert_eq!(snap.process.count, 2);
        assert_eq!(snap.process.recomputed, 1);
        assert_eq!(snap.process.bytes, 100);
        assert_eq!(snap.hash.recomputed, 3);
    }

    #[test]
    fn test_rates_handle_zero_duration() {
        let stats = PhaseStats {
            count: 10,
            bytes: 1024 * 1024,
            recomputed: 0,
            duration: Duration::ZERO,
        };
        assert_eq!(stats.files_per_sec(), 0.0);
        let stats = PhaseStats {
            duration: Duration::from_secs(2),
            ..stats
        };
        assert_eq!(stats.files_per_sec(), 5.0);
        assert_eq!(stats.mib_per_sec(), 0.5);
    }
}
