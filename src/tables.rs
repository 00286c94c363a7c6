// src/tables.rs
// Line-adjacency heuristic that pulls table-like regions out of raw page text.
//
// A line looks tabular when, after trimming, it still holds a run of two or
// more whitespace characters (column padding) or a pipe. Consecutive tabular
// lines form one region. Indented prose and single padded lines are accepted
// false positives.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{Chunk, Page};

static COLUMN_GAP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{2,}").expect("column gap pattern is valid"));

pub fn is_candidate_line(line: &str) -> bool {
    line.contains('|') || COLUMN_GAP.is_match(line)
}

/// Returns each contiguous table-like region of `page_text`, with its lines
/// trimmed and re-joined by `\n`.
pub fn detect_tables(page_text: &str) -> Vec<String> {
    let mut tables = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in page_text.split('\n').map(str::trim) {
        if is_candidate_line(line) {
            current.push(line);
        } else if !current.is_empty() {
            tables.push(current.join("\n"));
            current.clear();
        }
    }
    if !current.is_empty() {
        tables.push(current.join("\n"));
    }

    tables
}

/// Runs [`detect_tables`] on every page's raw text and wraps the regions as
/// `table` chunks carrying the page number.
pub fn table_chunks(pages: &[Page]) -> Vec<Chunk> {
    pages
        .iter()
        .flat_map(|page| {
            detect_tables(&page.text)
                .into_iter()
                .map(move |text| Chunk::table(text, page.page))
        })
        .collect()
}
