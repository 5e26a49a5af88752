use std::fmt::Write;

use indicatif::{ProgressBar, ProgressState, ProgressStyle};

/// Displays a progress bar over the selected scenarios to show the user how many are left.
pub struct ScenarioProgress {
    bar: ProgressBar,
}

impl ScenarioProgress {
    /// Create a progress bar for `total` scenarios. It is never drawn when `hidden` is set.
    pub fn new(total: usize, hidden: bool) -> Self {
        if hidden {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new(total as u64);
        match ProgressStyle::with_template(
            "{spinner:.green} [{wide_bar:.cyan/blue}] {pos}/{len} ({remaining} left) [{elapsed_precise}] {msg}",
        ) {
            Ok(style) => bar.set_style(
                style
                    .with_key("remaining", |state: &ProgressState, w: &mut dyn Write| {
                        let remaining = state.len().unwrap_or(0).saturating_sub(state.pos());
                        let _ = write!(w, "{remaining}");
                    })
                    .progress_chars("#>-"),
            ),
            Err(e) => log::warn!("Failed to set progress style: {e}"),
        }

        Self { bar }
    }

    /// Show which scenario is running.
    pub fn start_scenario(&self, group: &str, scenario: &str) {
        self.bar.set_message(format!("{group}.{scenario}"));
    }

    pub fn finish_scenario(&self) {
        self.bar.inc(1);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
