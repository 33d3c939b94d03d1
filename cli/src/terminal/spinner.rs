use indicatif::ProgressStyle;

const TICKS: &[&str] = &[
    "▁▁▁▁▁",
    "▁▂▂▂▁",
    "▁▄▂▄▁",
    "▂▄▆▄▂",
    "▄▆█▆▄",
    "▂▄▆▄▂",
    "▁▄▂▄▁",
    "▁▂▂▂▁",
];

pub const TIP: &str = "You can press 'q' to finish early";

/// Style for the spinner shown while a scan phase span is open.
pub fn progress_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.blue} {span_name:.bold} {wide_msg} {elapsed:.dim}")
        .map(|style| style.tick_strings(TICKS))
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
