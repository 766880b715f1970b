//! Pure core integration functions.
//!
//! Glue between the engine and the command-line shell: a plain-text chunk
//! renderer and formatters for assemblies and metrics. Everything here is
//! free of I/O so it can be tested directly.

use crate::model::RenderError;
use crate::render::{Assembly, Block, MetricsSnapshot};
use std::fmt::Write as _;

/// Tab stop used when expanding tabs.
pub const TAB_WIDTH: usize = 4;

/// Chunk content produced by [`render_plain_text`]: one string per line.
pub type PlainLines = Vec<String>;

/// Render chunk text as plain lines, expanding tabs and trimming trailing
/// whitespace.
///
/// Fails on text containing NUL bytes, which usually means a binary file
/// was opened by mistake.
///
/// # Examples
///
/// ```
/// use chunkview::integration::render_plain_text;
///
/// let lines = render_plain_text("a\tb  \nc\n").unwrap();
/// assert_eq!(lines, vec!["a   b".to_string(), "c".to_string()]);
/// ```
pub fn render_plain_text(chunk_text: &str) -> Result<PlainLines, RenderError> {
    if chunk_text.contains('\0') {
        return Err(RenderError::failed("chunk contains NUL bytes"));
    }
    Ok(chunk_text.lines().map(expand_tabs).collect())
}

fn expand_tabs(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut column = 0;
    for ch in line.chars() {
        if ch == '\t' {
            let pad = TAB_WIDTH - column % TAB_WIDTH;
            out.push_str(&" ".repeat(pad));
            column += pad;
        } else {
            out.push(ch);
            column += 1;
        }
    }
    out.truncate(out.trim_end().len());
    out
}

/// Format an assembly for a terminal.
///
/// Rendered lines are prefixed with their 1-based document line number.
/// Spacers, placeholders and fallbacks each become one bracketed marker
/// line.
pub fn format_assembly(assembly: &Assembly<PlainLines>) -> String {
    let mut out = String::new();
    for block in assembly.blocks() {
        // Writing into a String cannot fail.
        let _ = match block {
            Block::Spacer { lines, height } => writeln!(
                out,
                "[{} lines not shown, height {:.0}]",
                lines.len(),
                height
            ),
            Block::Rendered { lines, content, .. } => {
                for (number, text) in lines.clone().zip(content.iter()) {
                    let _ = writeln!(out, "{:>6}  {}", number + 1, text);
                }
                Ok(())
            }
            Block::Placeholder {
                chunk,
                lines,
                placeholder_lines,
                ..
            } => writeln!(
                out,
                "[chunk {} pending: lines {}-{}, showing {} placeholder lines]",
                chunk,
                lines.start + 1,
                lines.end,
                placeholder_lines
            ),
            Block::Fallback { chunk, lines, reason, .. } => writeln!(
                out,
                "[chunk {} failed: lines {}-{}: {}]",
                chunk,
                lines.start + 1,
                lines.end,
                reason
            ),
        };
    }
    out
}

/// One-line summary of engine counters.
pub fn format_metrics(metrics: &MetricsSnapshot) -> String {
    let last = metrics
        .last_render_time
        .map_or_else(|| "n/a".to_string(), |d| format!("{}us", d.as_micros()));
    format!(
        "hits={} misses={} hit_rate={:.2} rendered={} failed={} last_render={}",
        metrics.hits,
        metrics.misses,
        metrics.cache_hit_rate,
        metrics.rendered,
        metrics.failed,
        last
    )
}
