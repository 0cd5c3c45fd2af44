//! Progress reporting for long category passes.

use std::sync::{Mutex, PoisonError};

/// Receives progress for one labelled task at a time.
pub trait Progress: Send + Sync {
    /// Begin a task. `total` is the expected number of steps, if known.
    fn start(&self, label: &str, total: Option<u64>);

    fn step(&self);

    fn end(&self);
}

/// Discards all progress.
pub struct NoProgress;

impl Progress for NoProgress {
    fn start(&self, _label: &str, _total: Option<u64>) {}
    fn step(&self) {}
    fn end(&self) {}
}

#[derive(Default)]
struct Task {
    label: String,
    total: Option<u64>,
    done: u64,
}

/// Reports progress through the log: start and end at info, a debug tick
/// every 10% of the expected total (every step when verbose).
pub struct LogProgress {
    verbose: bool,
    task: Mutex<Task>,
}

impl LogProgress {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            task: Mutex::new(Task::default()),
        }
    }

    fn task(&self) -> std::sync::MutexGuard<'_, Task> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Progress for LogProgress {
    fn start(&self, label: &str, total: Option<u64>) {
        let mut task = self.task();
        *task = Task {
            label: label.to_string(),
            total,
            done: 0,
        };
        match total {
            Some(total) => tracing::info!("{label} ({total} expected)"),
            None => tracing::info!("{label}"),
        }
    }

    fn step(&self) {
        let mut task = self.task();
        task.done += 1;
        if should_tick(task.done, task.total, self.verbose) {
            match task.total {
                Some(total) => tracing::debug!("{}: {}/{}", task.label, task.done, total),
                None => tracing::debug!("{}: {}", task.label, task.done),
            }
        }
    }

    fn end(&self) {
        let task = self.task();
        tracing::info!("{} done ({} processed)", task.label, task.done);
    }
}

fn should_tick(done: u64, total: Option<u64>, verbose: bool) -> bool {
    if verbose {
        return true;
    }
    match total {
        Some(total) if total > 0 => done % (total / 10).max(1) == 0,
        _ => false,
    }
}
