//! Output formatting for the CLI.

use console::{pad_str, style, Alignment};
use edge_cache::CacheStatus;
use indicatif::{ProgressBar, ProgressStyle};

enum Stream {
    Out,
    Err,
}

/// Output handler for CLI messages.
///
/// In JSON mode only `json` and `error` print; everything else is silent.
#[derive(Clone)]
pub struct Output {
    verbose: bool,
    json: bool,
}

impl Output {
    /// Create a new output handler.
    pub fn new(verbose: bool, json: bool) -> Self {
        Self { verbose, json }
    }

    /// Print an info message.
    pub fn info(&self, msg: &str) {
        self.line(Stream::Out, style("ℹ").blue().to_string(), msg.to_string());
    }

    /// Print a success message.
    pub fn success(&self, msg: &str) {
        self.line(Stream::Out, style("✓").green().to_string(), msg.to_string());
    }

    /// Print a warning message.
    pub fn warn(&self, msg: &str) {
        self.line(Stream::Err, style("⚠").yellow().to_string(), msg.to_string());
    }

    /// Print an error message. In JSON mode this is a `{"error": ...}` object.
    pub fn error(&self, msg: &str) {
        if self.json {
            eprintln!("{}", serde_json::json!({ "error": msg }));
            return;
        }
        self.line(Stream::Err, style("✗").red().to_string(), style(msg).red().to_string());
    }

    /// Print a debug message (only in verbose mode).
    pub fn debug(&self, msg: &str) {
        if self.verbose {
            self.line(Stream::Err, style("→").dim().to_string(), style(msg).dim().to_string());
        }
    }

    fn line(&self, stream: Stream, glyph: String, msg: String) {
        if self.json {
            return;
        }
        match stream {
            Stream::Out => println!("{} {}", glyph, msg),
            Stream::Err => eprintln!("{} {}", glyph, msg),
        }
    }

    /// Print a header/title.
    pub fn header(&self, msg: &str) {
        if self.json {
            return;
        }
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print JSON output.
    pub fn json<T: serde::Serialize>(&self, value: &T) {
        if let Ok(json) = serde_json::to_string_pretty(value) {
            println!("{}", json);
        }
    }

    /// Print a key-value pair.
    pub fn kv(&self, key: &str, value: &str) {
        if self.json {
            return;
        }
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(&self, item: &str) {
        if self.json {
            return;
        }
        println!("  {} {}", style("•").dim(), item);
    }

    /// Print a table row. Columns past the end of `widths` are left unpadded.
    pub fn table_row(&self, cols: &[&str], widths: &[usize]) {
        if self.json {
            return;
        }
        let formatted: Vec<String> = cols
            .iter()
            .enumerate()
            .map(|(i, col)| match widths.get(i) {
                Some(width) => pad_str(col, *width, Alignment::Left, None).into_owned(),
                None => col.to_string(),
            })
            .collect();
        println!("  {}", formatted.join("  "));
    }

    /// Create a progress bar.
    pub fn progress(&self, len: u64, msg: &str) -> ProgressBar {
        if self.json {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len);
        if let Ok(bar) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(bar.progress_chars("#>-"));
        }
        pb.set_message(msg.to_string());
        pb
    }

    /// Check if JSON mode is enabled.
    pub fn is_json(&self) -> bool {
        self.json
    }
}

/// Colored badge for a cache status.
pub fn status_badge(status: CacheStatus) -> String {
    let label = status.to_string();
    match status {
        CacheStatus::Hit | CacheStatus::Stale => style(label).green().to_string(),
        CacheStatus::Miss => style(label).cyan().to_string(),
        CacheStatus::Fallback => style(label).yellow().to_string(),
        CacheStatus::Offline => style(label).red().to_string(),
        CacheStatus::Bypass => style(label).dim().to_string(),
    }
}

/// Format a duration in milliseconds as a human-readable string.
pub fn format_millis(ms: u128) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else {
        format!("{}m {}s", ms / 60_000, (ms % 60_000) / 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(42), "42ms");
        assert_eq!(format_millis(1500), "1.50s");
        assert_eq!(format_millis(125_000), "2m 5s");
    }

    #[test]
    fn test_status_badge_keeps_label() {
        console::set_colors_enabled(false);
        assert_eq!(status_badge(CacheStatus::Fallback), "FALLBACK");
        assert_eq!(status_badge(CacheStatus::Bypass), "BYPASS");
    }
}
