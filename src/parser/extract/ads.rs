use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::{item_fields, ExtractError, ParsedComponent, SubItem};
use crate::parser::classify::ComponentType;

static TEXT_AD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div[data-text-ad], div.uEierd").unwrap());
static SHOPPING_UNIT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.pla-unit, div.mnr-c").unwrap());

/// Parse an ad block. One block holds one or more ad units; the first unit's
/// fields double as the block's own title/url/cite and every unit becomes a
/// sub-item, so a block of three text ads yields one record with three
/// sub-items.
pub fn parse(
    cmpt_type: ComponentType,
    cmpt: &ElementRef,
    rank: usize,
) -> Result<Vec<ParsedComponent>, ExtractError> {
    let unit_selector: &Selector = match cmpt_type {
        ComponentType::ShoppingAds => &SHOPPING_UNIT,
        _ => &TEXT_AD,
    };

    let mut units: Vec<ElementRef> = cmpt.select(unit_selector).collect();
    if units.is_empty() {
        // A lone ad unit can itself be the top-level block.
        if cmpt.value().attr("data-text-ad").is_some() {
            units.push(*cmpt);
        } else {
            return Err(ExtractError::MissingPrimaryItem { cmpt_type, rank });
        }
    }

    let (title, url, cite) = item_fields(&units[0]);
    let sub_items = units
        .iter()
        .map(|unit| {
            let (title, url, cite) = item_fields(unit);
            SubItem { title, url, cite }
        })
        .collect();

    Ok(vec![ParsedComponent {
        cmpt_type,
        rank,
        sub_rank: 0,
        title,
        url,
        cite,
        text: None,
        sub_items,
    }])
}

// ── Tests ──
