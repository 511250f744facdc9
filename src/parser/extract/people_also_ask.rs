use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::{collapse_text, non_empty, ExtractError, ParsedComponent, SubItem};
use crate::parser::classify::ComponentType;

static QUESTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.related-question-pair").unwrap());

/// Parse a people-also-ask block: one sub-item per question. Expanded
/// answers are lazy-loaded by the page and are not present in the fetched
/// markup, so the question text is all there is.
pub fn parse(cmpt: &ElementRef, rank: usize) -> Result<Vec<ParsedComponent>, ExtractError> {
    let sub_items: Vec<SubItem> = cmpt
        .select(&QUESTION)
        .map(|q| {
            let title = q
                .value()
                .attr("data-q")
                .map(str::to_string)
                .or_else(|| non_empty(collapse_text(&q)));
            SubItem { title, ..SubItem::default() }
        })
        .collect();

    if sub_items.is_empty() {
        return Err(ExtractError::MissingPrimaryItem {
            cmpt_type: ComponentType::PeopleAlsoAsk,
            rank,
        });
    }

    let mut record = ParsedComponent::new(ComponentType::PeopleAlsoAsk, rank);
    record.sub_items = sub_items;
    Ok(vec![record])
}

// ── Tests ──
