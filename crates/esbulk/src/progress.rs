//! 📊 progress.rs: "Are we there yet?" Every load, every time, forever.
//!
//! 🚀 Two clocks tick here. The parser's byte offset says how far into the input we
//! are; the sink worker says how many documents and bulk bytes actually landed. The
//! bar follows the first, the table shows both.
//!
//! ⚠️ Watching this progress bar will not make it go faster. Science says no.
//!
//! 🦆 The duck has nothing to do with this module. It's just vibing.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

// -- 📏 one mebibyte, not a megabyte, pedants. there's a difference and I will die on this hill.
const MIB: u64 = 1024 * 1024;

/// 📦 Raw bytes into something a human can read, scaled to the input size.
fn format_bytes(bytes: u64, scale: u64) -> String {
    if scale >= 512 * MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if scale >= MIB {
        format!("{:.2} KiB", bytes as f64 / 1024.0)
    } else {
        // -- 🐛 raw bytes mode. small files need love too.
        format!("{} bytes", bytes)
    }
}

/// 🔢 1000000 → "1,000,000". You're welcome, eyes.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ MM:SS, or HH:MM:SS if you should probably call your mom. It's been a while.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 📡 Throughput at this very moment, give or take a five-second window.
struct Rates {
    docs_per_sec: f64,
    input_mib_per_sec: f64,
    percent_per_sec: f64,
}

/// 📊 Tracks input bytes, documents, batches and bulk bytes, and draws them on stderr.
///
/// When progress is switched off the bar is hidden, but the numbers still add up. The
/// sink worker doesn't need to know either way.
pub(crate) struct ProgressMetrics {
    source_name: String,
    /// 📏 0 when we have no idea (hello, stdin)
    total_size: u64,
    /// 📄 parser byte offset, bumped from the parser thread
    input_bytes: Arc<AtomicU64>,
    total_docs: u64,
    total_batches: u64,
    request_bytes: u64,
    progress_bar: ProgressBar,
    /// 🔄 (when, input bytes, docs) samples, oldest first
    rate_samples: VecDeque<(Instant, u64, u64)>,
    start_time: Instant,
}

impl std::fmt::Debug for ProgressMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("ProgressMetrics")
            .field("source_name", &self.source_name)
            .field("total_size", &self.total_size)
            .field("total_docs", &self.total_docs)
            .field("total_batches", &self.total_batches)
            .field("request_bytes", &self.request_bytes)
            .finish()
    }
}

impl ProgressMetrics {
    pub(crate) fn new(
        source_name: String,
        total_size: u64,
        input_bytes: Arc<AtomicU64>,
        visible: bool,
    ) -> Self {
        let progress_bar = if visible {
            ProgressBar::new(total_size)
        } else {
            ProgressBar::hidden()
        };
        // -- 🎨 cyan because it's classy, blue because it's calm. the template is a literal,
        // -- but if indicatif ever disagrees we keep the default look instead of panicking
        let style = ProgressStyle::default_bar()
            .template("{msg}\n| [{bar:40.cyan/blue}]")
            .map(|style| style.progress_chars("=>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style);

        let start_time = Instant::now();
        // -- 🔄 seed the rate window with t=0 so we don't divide by zero like animals
        let mut rate_samples = VecDeque::new();
        rate_samples.push_back((start_time, 0u64, 0u64));

        Self {
            source_name,
            total_size,
            input_bytes,
            total_docs: 0,
            total_batches: 0,
            request_bytes: 0,
            progress_bar,
            rate_samples,
            start_time,
        }
    }

    /// 🔄 One batch landed: `docs` operations in a `bytes`-long request body.
    pub(crate) fn update(&mut self, docs: u64, bytes: u64) {
        self.total_docs += docs;
        self.total_batches += 1;
        self.request_bytes += bytes;

        let input_bytes = self.input_bytes.load(Ordering::Relaxed);
        let rates = self.calculate_rates(input_bytes);
        self.render(input_bytes, rates);
        self.progress_bar.set_position(input_bytes);
    }

    pub(crate) fn total_docs(&self) -> u64 {
        self.total_docs
    }

    pub(crate) fn total_batches(&self) -> u64 {
        self.total_batches
    }

    pub(crate) fn request_bytes(&self) -> u64 {
        self.request_bytes
    }

    /// ✅ Ring the bell. We made it.
    pub(crate) fn finish(&self) {
        self.progress_bar.finish();
    }

    /// 💀 Leave the bar where it died, so the last numbers stay on screen next to the error.
    pub(crate) fn abandon(&self) {
        self.progress_bar.abandon();
    }

    fn calculate_rates(&mut self, input_bytes: u64) -> Rates {
        let now = Instant::now();
        let window = Duration::from_secs(5);
        // -- 🔄 evict stale samples, like a bouncer at a club but for data points
        while let Some(&(timestamp, _, _)) = self.rate_samples.front() {
            if now.duration_since(timestamp) > window {
                self.rate_samples.pop_front();
            } else {
                break;
            }
        }
        self.rate_samples.push_back((now, input_bytes, self.total_docs));

        if let Some(&(oldest_time, oldest_bytes, oldest_docs)) = self.rate_samples.front() {
            let elapsed = now.duration_since(oldest_time).as_secs_f64();
            if elapsed > 0.0 {
                let bytes_delta = input_bytes.saturating_sub(oldest_bytes);
                let docs_delta = self.total_docs.saturating_sub(oldest_docs);
                let percent_delta = if self.total_size > 0 {
                    (bytes_delta as f64 / self.total_size as f64) * 100.0
                } else {
                    0.0
                };
                return Rates {
                    docs_per_sec: docs_delta as f64 / elapsed,
                    input_mib_per_sec: (bytes_delta as f64 / elapsed) / MIB as f64,
                    percent_per_sec: percent_delta / elapsed,
                };
            }
        }

        // -- 💤 not enough elapsed time yet, return zeros and maintain composure
        Rates {
            docs_per_sec: 0.0,
            input_mib_per_sec: 0.0,
            percent_per_sec: 0.0,
        }
    }

    /// 🎨 The table under the bar:
    /// ```text
    /// | source: <name>
    /// | [=====>----------]
    ///   <docs/s>       <total docs>
    ///   <MiB/s>        <input bytes progress>
    ///   <batches>      <bulk bytes sent>
    ///   <%/s>          <%>
    ///   <elapsed>      <remaining>
    /// ```
    fn render(&self, input_bytes: u64, rates: Rates) {
        let scale = self.total_size.max(input_bytes);
        let percent = if self.total_size > 0 {
            (input_bytes as f64 / self.total_size as f64) * 100.0
        } else {
            0.0
        };

        let elapsed = self.start_time.elapsed();
        let remaining = if percent > 0.0 {
            // 🔮 linear extrapolation, assumes the future looks like the past
            let total_estimated = elapsed.as_secs_f64() / (percent / 100.0);
            let remaining_secs = total_estimated - elapsed.as_secs_f64();
            if remaining_secs > 0.0 {
                format_duration(Duration::from_secs_f64(remaining_secs))
            } else {
                "--:--".to_string()
            }
        } else {
            // -- ⚠️ stdin has no size, so no ETA. we're flying blind, captain
            "--:--".to_string()
        };

        let input_progress = if self.total_size > 0 {
            format!(
                "{} / {}",
                format_bytes(input_bytes, scale),
                format_bytes(self.total_size, scale)
            )
        } else {
            format_bytes(input_bytes, scale)
        };

        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        let row = |left: String, right: String| {
            vec![
                Cell::new(left).set_alignment(CellAlignment::Right),
                Cell::new(right).set_alignment(CellAlignment::Right),
            ]
        };
        table.add_row(row(
            format!("{} Docs/s", format_number(rates.docs_per_sec as u64)),
            format!("{} Docs", format_number(self.total_docs)),
        ));
        table.add_row(row(
            format!("{:.2} MiB/s", rates.input_mib_per_sec),
            input_progress,
        ));
        table.add_row(row(
            format!("{} Batches", format_number(self.total_batches)),
            format!("{} sent", format_bytes(self.request_bytes, scale)),
        ));
        table.add_row(row(
            format!("{:.2} %/s", rates.percent_per_sec),
            format!("{:.2}%", percent),
        ));
        table.add_row(row(
            format!("{} elapsed", format_duration(elapsed)),
            format!("{} remaining", remaining),
        ));

        self.progress_bar
            .set_message(format!("source: {}\n{}", self.source_name, table));
    }
}
