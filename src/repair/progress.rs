//! Phase progress for scans and rewrites
//!
//! The core only sees [`ProgressReporter`]; terminal drawing (indicatif)
//! stays behind it. Phases with an unknown size, like the commit walk,
//! get a spinner instead of a bar.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

pub trait ProgressHandle {
    fn inc(&self, n: u64);
    /// Close the phase; `summary` is shown in place of the bar
    fn finish_with(&self, summary: &str);
}

pub trait ProgressReporter {
    fn start(&self, phase: &str, total: Option<u64>) -> Box<dyn ProgressHandle>;
}

/// How the repair reports its phases on the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Bars and spinners on stderr
    Terminal,
    Hidden,
}

impl Progress {
    fn bar(phase: &str, total: Option<u64>) -> ProgressBar {
        let pb = ProgressBar::with_draw_target(total, ProgressDrawTarget::stderr());
        let style = match total {
            Some(_) => ProgressStyle::with_template(
                "{spinner:.green} {msg:<20} [{bar:36.cyan/blue}] {pos}/{len} {elapsed}",
            )
            .map(|style| style.progress_chars("#>-")),
            None => ProgressStyle::with_template("{spinner:.green} {msg:<20} {pos} {elapsed}"),
        };
        if let Ok(style) = style {
            pb.set_style(style);
        }
        if total.is_none() {
            pb.enable_steady_tick(Duration::from_millis(120));
        }
        pb.set_message(phase.to_string());
        pb
    }
}

impl ProgressReporter for Progress {
    fn start(&self, phase: &str, total: Option<u64>) -> Box<dyn ProgressHandle> {
        match self {
            Progress::Terminal => Box::new(BarHandle(Self::bar(phase, total))),
            Progress::Hidden => Box::new(SilentHandle),
        }
    }
}

struct BarHandle(ProgressBar);

impl ProgressHandle for BarHandle {
    fn inc(&self, n: u64) {
        self.0.inc(n);
    }

    fn finish_with(&self, summary: &str) {
        if summary.is_empty() {
            self.0.finish_and_clear();
        } else {
            self.0.finish_with_message(summary.to_string());
        }
    }
}

/// Draws nothing (benchmarks, tests, JSON output)
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn start(&self, _phase: &str, _total: Option<u64>) -> Box<dyn ProgressHandle> {
        Box::new(SilentHandle)
    }
}

struct SilentHandle;

impl ProgressHandle for SilentHandle {
    fn inc(&self, _n: u64) {}
    fn finish_with(&self, _summary: &str) {}
}

/// One phase as seen by [`RecordingProgress`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseRecord {
    pub phase: String,
    pub total: Option<u64>,
    pub done: u64,
    pub finished: bool,
}

/// Keeps every phase it is handed
#[derive(Debug, Default)]
pub struct RecordingProgress {
    phases: Rc<RefCell<Vec<PhaseRecord>>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phases(&self) -> Vec<PhaseRecord> {
        self.phases.borrow().clone()
    }
}

impl ProgressReporter for RecordingProgress {
    fn start(&self, phase: &str, total: Option<u64>) -> Box<dyn ProgressHandle> {
        let mut phases = self.phases.borrow_mut();
        phases.push(PhaseRecord {
            phase: phase.to_string(),
            total,
            ..Default::default()
        });
        Box::new(RecordingHandle {
            phases: Rc::clone(&self.phases),
            index: phases.len() - 1,
        })
    }
}

struct RecordingHandle {
    phases: Rc<RefCell<Vec<PhaseRecord>>>,
    index: usize,
}

impl ProgressHandle for RecordingHandle {
    fn inc(&self, n: u64) {
        if let Some(record) = self.phases.borrow_mut().get_mut(self.index) {
            record.done += n;
        }
    }

    fn finish_with(&self, _summary: &str) {
        if let Some(record) = self.phases.borrow_mut().get_mut(self.index) {
            record.finished = true;
        }
    }
}
