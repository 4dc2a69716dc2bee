use std::cell::Cell;
use std::io::{self, Write};
use std::time::Instant;

/// Line-count progress on stderr, independent of the log subscriber.
pub struct ConsoleProgress {
    enabled: bool,
    every: usize,
    next_report: Cell<usize>,
    t0: Instant,
}

impl ConsoleProgress {
    /// `every == 0` disables the periodic line counts but keeps the summary.
    pub fn new(enabled: bool, every: usize) -> Self {
        Self {
            enabled,
            every,
            next_report: Cell::new(every),
            t0: Instant::now(),
        }
    }

    pub fn lines(&self, done: usize) {
        if !self.enabled || self.every == 0 || done < self.next_report.get() {
            return;
        }
        while self.next_report.get() <= done {
            self.next_report.set(self.next_report.get() + self.every);
        }
        let secs = self.t0.elapsed().as_secs_f64();
        let rate = if secs > 0.0 { done as f64 / secs } else { 0.0 };
        self.write_line(&format!("lines {done} ({rate:.0}/s)"));
    }

    pub fn finish(&self, done: usize, malformed: usize) {
        if !self.enabled {
            return;
        }
        self.write_line(&format!("done: {done} lines, {malformed} malformed"));
    }

    fn write_line(&self, msg: &str) {
        let ts = fmt_elapsed(self.t0.elapsed().as_secs_f64());
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "[{ts}] {msg}");
    }
}

fn fmt_elapsed(seconds: f64) -> String {
    let seconds = seconds.max(0.0) as u64;
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}
