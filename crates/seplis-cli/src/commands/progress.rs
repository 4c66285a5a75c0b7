use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;

/// Progress over the tasks of one `run`
///
/// Hidden when the terminal is not interactive; progress is then reported
/// through structured logs instead.
pub struct TaskProgress {
    bar: ProgressBar,
    interactive: bool,
}

impl TaskProgress {
    pub fn new(total: usize, enabled: bool) -> Self {
        let interactive = enabled && is_interactive();
        let bar = if interactive {
            ProgressBar::new(total as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
        }
        Self { bar, interactive }
    }

    pub fn start(&self, task: &str) {
        if self.interactive {
            self.bar.set_message(format!("Running {}...", task));
        } else {
            tracing::info!(operation = "progress", task = task, "Starting task");
        }
    }

    pub fn finish_task(&self) {
        self.bar.inc(1);
    }

    /// Print around the bar without tearing it
    pub fn suspend<F: FnOnce()>(&self, f: F) {
        self.bar.suspend(f);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

pub fn is_interactive() -> bool {
    std::io::stdout().is_terminal() && std::io::stderr().is_terminal()
}
