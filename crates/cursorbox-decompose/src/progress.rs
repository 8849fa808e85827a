// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Progress extraction and text rendering for running tools

use nom::{
    character::complete::{char, digit1, multispace0},
    combinator::{opt, recognize},
    IResult, Parser,
};

/// Cells in the determinate bar
pub const BAR_WIDTH: usize = 20;
/// Positions the indeterminate block travels before bouncing
const TRAVEL: u64 = 16;
const BLOCK: usize = 4;
/// Status text longer than this is shortened
pub const STATUS_MAX_CHARS: usize = 40;
/// Lines shown when a tool fails
pub const FAILURE_TAIL_LINES: usize = 8;

const FILLED: char = '\u{2588}';
const EMPTY: char = '\u{2591}';

fn percent_at(input: &str) -> IResult<&str, &str> {
    let (input, number) = recognize((digit1, opt((char('.'), digit1)))).parse(input)?;
    let (input, _) = (multispace0, char('%')).parse(input)?;
    Ok((input, number))
}

/// First `<number>%` in a line, e.g. `"Voxelizing 42.5 %"` gives 42.5
pub fn parse_percent(line: &str) -> Option<f64> {
    line.char_indices()
        .filter(|(_, c)| c.is_ascii_digit())
        .find_map(|(i, _)| percent_at(&line[i..]).ok())
        .and_then(|(_, number)| lexical_core::parse(number.as_bytes()).ok())
}

/// `[████░░░…]  42.5%`
pub fn bar_determinate(percent: f64) -> String {
    let p = if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) };
    let filled = ((BAR_WIDTH as f64) * p / 100.0) as usize;
    let mut bar = String::with_capacity(BAR_WIDTH * 3 + 10);
    bar.push('[');
    bar.extend(std::iter::repeat(FILLED).take(filled));
    bar.extend(std::iter::repeat(EMPTY).take(BAR_WIDTH - filled));
    bar.push_str(&format!("] {:5.1}%", p));
    bar
}

/// Bouncing block for tools that report no percentage
pub fn bar_indeterminate(tick: u64) -> String {
    let mut pos = tick % (2 * TRAVEL);
    if pos >= TRAVEL {
        pos = 2 * TRAVEL - pos;
    }
    let pos = pos as usize;
    let width = TRAVEL as usize + BLOCK;
    let cells: String = (0..width)
        .map(|i| if (pos..pos + BLOCK).contains(&i) { FILLED } else { EMPTY })
        .collect();
    format!("[{}]", cells)
}

/// Shorten a status line to [`STATUS_MAX_CHARS`]
pub fn truncate_status(status: &str) -> String {
    let status = status.trim();
    if status.chars().count() > STATUS_MAX_CHARS {
        let head: String = status.chars().take(STATUS_MAX_CHARS - 3).collect();
        format!("{}...", head)
    } else {
        status.to_string()
    }
}

/// One progress line: `[V-HACD] Cube: [bar] 3.2s  status`
pub fn render_progress_line(
    tool: &str,
    object: &str,
    percent: Option<f64>,
    tick: u64,
    elapsed_secs: f64,
    status: &str,
) -> String {
    let visual = match percent {
        Some(p) => bar_determinate(p),
        None => bar_indeterminate(tick),
    };
    let mut line = format!("[{}] {}: {} {:.1}s", tool, object, visual, elapsed_secs);
    let status = truncate_status(status);
    if !status.is_empty() {
        line.push_str("  ");
        line.push_str(&status);
    }
    line
}

/// Last lines of tool output for a failure report
pub fn failure_tail<S: AsRef<str>>(lines: &[S]) -> String {
    if lines.is_empty() {
        return "(no output)".to_string();
    }
    let start = lines.len().saturating_sub(FAILURE_TAIL_LINES);
    lines[start..]
        .iter()
        .map(|l| l.as_ref())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent("Progress: 42%"), Some(42.0));
        assert_eq!(parse_percent("Voxelizing 42.5 %"), Some(42.5));
        assert_eq!(parse_percent("step 3 of 10: 70%"), Some(70.0));
        assert_eq!(parse_percent("v1.2 ready"), None);
        assert_eq!(parse_percent("no numbers"), None);
    }

    #[test]
    fn test_bar_determinate() {
        let bar = bar_determinate(50.0);
        assert_eq!(bar.chars().filter(|&c| c == FILLED).count(), 10);
        assert_eq!(bar.chars().filter(|&c| c == EMPTY).count(), 10);
        assert!(bar.ends_with("]  50.0%"));
        assert!(bar_determinate(250.0).ends_with("] 100.0%"));
        assert!(!bar_determinate(-5.0).contains(FILLED));
    }

    #[test]
    fn test_bar_indeterminate_bounces() {
        let start = |tick| bar_indeterminate(tick).chars().position(|c| c == FILLED);
        assert_eq!(start(0), Some(1));
        assert_eq!(start(16), Some(17));
        assert_eq!(start(17), Some(16));
        assert_eq!(start(32), start(0));
        assert_eq!(bar_indeterminate(5).chars().filter(|&c| c == FILLED).count(), 4);
    }

    #[test]
    fn test_truncate_status() {
        assert_eq!(truncate_status("  short  "), "short");
        let long = "x".repeat(60);
        let cut = truncate_status(&long);
        assert_eq!(cut.chars().count(), 40);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_render_line() {
        assert_eq!(
            render_progress_line("CoACD", "Cube", Some(10.0), 0, 1.24, ""),
            format!("[CoACD] Cube: {} 1.2s", bar_determinate(10.0))
        );
        let line = render_progress_line("V-HACD", "Cube", None, 3, 0.0, "Merging hulls");
        assert!(line.ends_with("0.0s  Merging hulls"));
    }

    #[test]
    fn test_failure_tail() {
        let empty: [&str; 0] = [];
        assert_eq!(failure_tail(&empty), "(no output)");
        let lines: Vec<String> = (0..12).map(|i| format!("line {}", i)).collect();
        let tail = failure_tail(&lines);
        assert!(tail.starts_with("line 4\n"));
        assert!(tail.ends_with("line 11"));
    }
}
