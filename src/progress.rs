//! Progress reporting.

use itertools::Itertools;
use log::{debug, info, warn};
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Mutex, PoisonError,
    },
    time::Instant,
};

/// Receives the progress of a run.
///
/// Only the thread driving the run calls it, never a compute step.
pub trait ProgressTracker {
    fn begin_sub_task(&self, name: &str);

    fn end_sub_task(&self, name: &str);

    /// `amount` more units of the current sub-task are done.
    fn log_progress(&self, amount: u64);

    fn log_debug(&self, message: &str);

    fn log_warning(&self, message: &str);

    fn log_message(&self, message: &str);

    /// Called once when the run releases its resources.
    fn release(&self);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyProgressTracker;

impl ProgressTracker for EmptyProgressTracker {
    fn begin_sub_task(&self, _name: &str) {}

    fn end_sub_task(&self, _name: &str) {}

    fn log_progress(&self, _amount: u64) {}

    fn log_debug(&self, _message: &str) {}

    fn log_warning(&self, _message: &str) {}

    fn log_message(&self, _message: &str) {}

    fn release(&self) {}
}

/// Reports through the `log` facade.
///
/// Sub-task start and end go to `info!` together with the elapsed time.
/// Progress is reported every 10 percent of `volume` units.
pub struct LoggingProgressTracker {
    task_name: String,
    volume: u64,
    progress: AtomicU64,
    stack: Mutex<Vec<(String, Instant)>>,
    released: AtomicBool,
}

impl LoggingProgressTracker {
    pub fn new(task_name: &str, volume: u64) -> Self {
        Self {
            task_name: String::from(task_name),
            volume,
            progress: AtomicU64::new(0),
            stack: Mutex::new(vec![]),
            released: AtomicBool::new(false),
        }
    }

    fn path(&self, stack: &[(String, Instant)]) -> String {
        std::iter::once(self.task_name.as_str())
            .chain(stack.iter().map(|(name, _)| name.as_str()))
            .join(" :: ")
    }
}

impl ProgressTracker for LoggingProgressTracker {
    fn begin_sub_task(&self, name: &str) {
        let mut stack = self.stack.lock().unwrap_or_else(PoisonError::into_inner);
        stack.push((String::from(name), Instant::now()));
        self.progress.store(0, Ordering::Relaxed);
        info!("{} :: Start", self.path(&stack));
    }

    fn end_sub_task(&self, name: &str) {
        let mut stack = self.stack.lock().unwrap_or_else(PoisonError::into_inner);
        if stack.last().map_or(false, |(top, _)| top == name) {
            let path = self.path(&stack);
            if let Some((_, started)) = stack.pop() {
                info!("{} :: Finished in {:?}", path, started.elapsed());
            }
        } else {
            warn!("{} :: unbalanced end of `{}`", self.path(&stack), name);
        }
    }

    fn log_progress(&self, amount: u64) {
        if self.volume == 0 {
            return;
        }
        let before = self.progress.fetch_add(amount, Ordering::Relaxed);
        let (before, after) = (
            before * 10 / self.volume,
            (before + amount) * 10 / self.volume,
        );
        if after > before {
            info!("{} {}%", self.task_name, after.min(10) * 10);
        }
    }

    fn log_debug(&self, message: &str) {
        debug!("{} :: {}", self.task_name, message);
    }

    fn log_warning(&self, message: &str) {
        warn!("{} :: {}", self.task_name, message);
    }

    fn log_message(&self, message: &str) {
        info!("{} :: {}", self.task_name, message);
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            let stack = self.stack.lock().unwrap_or_else(PoisonError::into_inner);
            if !stack.is_empty() {
                warn!("{} :: released with open sub-tasks", self.path(&stack));
            }
        }
    }
}

/// Ends its sub-task when dropped, also on early return and unwinding.
pub struct SubTask<'a> {
    tracker: &'a dyn ProgressTracker,
    name: String,
}

impl<'a> SubTask<'a> {
    pub fn begin(tracker: &'a dyn ProgressTracker, name: &str) -> Self {
        tracker.begin_sub_task(name);
        Self {
            tracker,
            name: String::from(name),
        }
    }
}

impl Drop for SubTask<'_> {
    fn drop(&mut self) {
        self.tracker.end_sub_task(&self.name);
    }
}

/// The static shape of a tracked task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressTask {
    name: String,
    volume: u64,
    sub_tasks: Vec<ProgressTask>,
}

impl ProgressTask {
    pub fn leaf(name: &str, volume: u64) -> Self {
        Self {
            name: String::from(name),
            volume,
            sub_tasks: vec![],
        }
    }

    pub fn new(name: &str, sub_tasks: Vec<ProgressTask>) -> Self {
        Self {
            name: String::from(name),
            volume: sub_tasks.iter().map(|t| t.volume).sum(),
            sub_tasks,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn volume(&self) -> u64 {
        self.volume
    }

    pub fn sub_tasks(&self) -> &[ProgressTask] {
        &self.sub_tasks
    }

    fn render(&self, depth: usize) -> String {
        std::iter::once(format!("{}{} ({})", "  ".repeat(depth), self.name, self.volume))
            .chain(self.sub_tasks.iter().map(|t| t.render(depth + 1)))
            .join("\n")
    }
}

impl fmt::Display for ProgressTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ProgressTracker for Recorder {
        fn begin_sub_task(&self, name: &str) {
            self.events.lock().unwrap().push(format!("begin {}", name));
        }

        fn end_sub_task(&self, name: &str) {
            self.events.lock().unwrap().push(format!("end {}", name));
        }

        fn log_progress(&self, _amount: u64) {}

        fn log_debug(&self, _message: &str) {}

        fn log_warning(&self, _message: &str) {}

        fn log_message(&self, _message: &str) {}

        fn release(&self) {}
    }

    fn early_return(tracker: &dyn ProgressTracker) -> Result<(), ()> {
        let _outer = SubTask::begin(tracker, "outer");
        let _inner = SubTask::begin(tracker, "inner");
        Err(())
    }

    #[test]
    fn test_sub_task_guard() {
        let recorder = Recorder::default();
        assert!(early_return(&recorder).is_err());
        assert_eq!(
            *recorder.events.lock().unwrap(),
            ["begin outer", "begin inner", "end inner", "end outer"]
        );
    }

    #[test]
    fn test_logging_tracker() {
        let tracker = LoggingProgressTracker::new("test", 10);
        {
            let _task = SubTask::begin(&tracker, "compute");
            (0..10).for_each(|_| tracker.log_progress(1));
            assert_eq!(tracker.progress.load(Ordering::Relaxed), 10);
        }
        assert!(tracker.stack.lock().unwrap().is_empty());
        tracker.end_sub_task("never started");
        tracker.release();
        tracker.release();
        assert!(tracker.released.load(Ordering::Relaxed));
    }

    #[test]
    fn test_progress_task() {
        let task = ProgressTask::new(
            "root",
            vec![ProgressTask::leaf("a", 3), ProgressTask::leaf("b", 4)],
        );
        assert_eq!(task.volume(), 7);
        assert_eq!(task.sub_tasks()[1].name(), "b");
        assert_eq!(task.to_string(), "root (7)\n  a (3)\n  b (4)");
    }
}
