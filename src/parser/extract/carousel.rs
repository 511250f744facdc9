use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::{heading_text, item_fields, ExtractError, ParsedComponent, SubItem};
use crate::parser::classify::ComponentType;

static CARD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("g-inner-card").unwrap());

/// Parse a card carousel (top stories, videos). The section heading becomes
/// the record title and each card a sub-item.
pub fn parse(
    cmpt_type: ComponentType,
    cmpt: &ElementRef,
    rank: usize,
) -> Result<Vec<ParsedComponent>, ExtractError> {
    let sub_items: Vec<SubItem> = cmpt
        .select(&CARD)
        .map(|card| {
            let (title, url, cite) = item_fields(&card);
            SubItem { title, url, cite }
        })
        .collect();

    if sub_items.is_empty() {
        return Err(ExtractError::MissingPrimaryItem { cmpt_type, rank });
    }

    let mut record = ParsedComponent::new(cmpt_type, rank);
    record.title = heading_text(cmpt);
    record.sub_items = sub_items;
    Ok(vec![record])
}

// ── Tests ──
