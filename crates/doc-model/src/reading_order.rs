//! Reading-order reconstruction for one page of glyph runs.
//!
//! Glyph runs arrive in content-stream order with no line or paragraph structure.
//! Runs are sorted top-to-bottom (PDF Y grows upwards) and left-to-right within a line,
//! then joined with breaks inferred from the vertical distance between neighbours.

use crate::run::TextRun;
use serde::{Deserialize, Serialize};

/// Distance thresholds in document units.
///
/// These are layout heuristics, not font metrics: raising `line_break_threshold`
/// merges visually distinct lines, lowering it splits superscripts and short lines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingOrderConfig {
    /// Runs whose Y differs by at most this much share a line.
    pub same_line_tolerance: f32,
    /// Vertical jumps above this insert a line break.
    pub line_break_threshold: f32,
    /// Vertical jumps above this insert a paragraph break.
    pub paragraph_break_threshold: f32,
}

impl Default for ReadingOrderConfig {
    fn default() -> Self {
        Self { same_line_tolerance: 5.0, line_break_threshold: 10.0, paragraph_break_threshold: 100.0 }
    }
}

pub const LINE_BREAK: &str = "\n";
pub const PARAGRAPH_BREAK: &str = "\n\n";

/// Indices of `runs` in reading order.
///
/// Ties (including identical positions) keep their extraction order. Non-finite
/// coordinates sort consistently under `total_cmp` and each forms its own line.
pub fn reading_order(runs: &[TextRun], config: &ReadingOrderConfig) -> Vec<usize> {
    let mut order: Vec<usize> = (0..runs.len()).collect();
    order.sort_by(|&a, &b| runs[b].y().total_cmp(&runs[a].y()));

    let mut lines: Vec<Vec<usize>> = Vec::new();
    for index in order {
        match lines.last_mut() {
            Some(line)
                if (runs[line[0]].y() - runs[index].y()).abs() <= config.same_line_tolerance =>
            {
                line.push(index);
            }
            _ => lines.push(vec![index]),
        }
    }

    lines
        .into_iter()
        .flat_map(|mut line| {
            line.sort_by(|&a, &b| runs[a].x().total_cmp(&runs[b].x()));
            line
        })
        .collect()
}

/// Reorders `runs` in place into reading order.
pub fn sort_runs(runs: &mut Vec<TextRun>, config: &ReadingOrderConfig) {
    let order = reading_order(runs, config);
    let mut slots: Vec<Option<TextRun>> = runs.drain(..).map(Some).collect();
    runs.extend(order.into_iter().filter_map(|index| slots[index].take()));
}

/// Joins runs that are already in reading order into the page's linear text.
pub fn join_runs(runs: &[TextRun], config: &ReadingOrderConfig) -> String {
    let mut text = String::new();
    let mut previous_y: Option<f32> = None;

    for run in runs {
        if let Some(prev) = previous_y {
            let delta = (run.y() - prev).abs();
            if delta > config.paragraph_break_threshold {
                text.push_str(PARAGRAPH_BREAK);
            } else if delta > config.line_break_threshold {
                text.push_str(LINE_BREAK);
            } else if !text.is_empty() && !text.ends_with(char::is_whitespace) {
                text.push(' ');
            }
        }

        text.push_str(&run.content);
        previous_y = Some(run.y());
    }

    text
}

/// Sorts a page's runs and produces its linear text in one pass.
pub fn reconstruct(mut runs: Vec<TextRun>, config: &ReadingOrderConfig) -> (Vec<TextRun>, String) {
    sort_runs(&mut runs, config);
    let text = join_runs(&runs, config);
    (runs, text)
}
