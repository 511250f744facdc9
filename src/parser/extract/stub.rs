use scraper::ElementRef;

use super::{collapse_text, non_empty, ParsedComponent};
use crate::parser::classify::ComponentType;

/// Fallback for unrecognized blocks and for blocks whose typed parser
/// failed: keep the position and the raw text, attempt nothing structured.
pub fn parse(cmpt: &ElementRef, rank: usize) -> Vec<ParsedComponent> {
    let mut record = ParsedComponent::new(ComponentType::Unknown, rank);
    record.text = non_empty(collapse_text(cmpt));
    vec![record]
}

// ── Tests ──
