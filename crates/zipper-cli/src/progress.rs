//! Progress bar for adding files to an archive.

use console::Term;
use indicatif::ProgressBar;
use indicatif::ProgressStyle;

/// CLI progress bar for `create`.
///
/// Shows the file count and bytes added. Cleared on drop.
pub struct CliProgress {
    bar: ProgressBar,
    label: String,
    bytes_added: u64,
}

impl CliProgress {
    /// Creates a progress bar over `total` files.
    #[must_use]
    pub fn new(total: usize, message: &str) -> Self {
        let bar = ProgressBar::new(total as u64);

        // Template: "Adding (15.2 MB) [████████░░░░] 42/100 files"
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} files")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        bar.set_message(message.to_string());

        Self {
            bar,
            label: message.to_string(),
            bytes_added: 0,
        }
    }

    /// Creates a bar that draws nothing.
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            label: String::new(),
            bytes_added: 0,
        }
    }

    /// Checks if we should show progress (TTY detection).
    #[must_use]
    pub fn should_show() -> bool {
        Term::stdout().is_term()
    }

    /// Records one finished file of `bytes` bytes.
    pub fn file_added(&mut self, bytes: u64) {
        self.bytes_added += bytes;
        self.bar.inc(1);
        self.bar.set_message(format!("{} ({})", self.label, humanize_bytes(self.bytes_added)));
    }

    /// Records a skipped file.
    pub fn file_skipped(&self) {
        self.bar.inc(1);
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Converts bytes to human-readable format (KB, MB, GB, TB).
fn humanize_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.1} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
