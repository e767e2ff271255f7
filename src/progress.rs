use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str = "{prefix:<28} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>6}/{len:6} {msg}";

/// Bar for a per-image loop; hidden automatically when stderr is not a terminal.
pub fn progress_bar(len: usize, prefix: impl Into<String>) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template(TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    bar.set_style(style);
    bar.set_prefix(prefix.into());
    bar
}
