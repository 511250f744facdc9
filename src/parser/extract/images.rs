use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::{ExtractError, ParsedComponent, SubItem};
use crate::parser::classify::ComponentType;

static IMAGE_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.img-brk a[href], a.bia").unwrap());
static IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());

/// Parse an inline image strip: one sub-item per image link, titled by the
/// image's alt text when the page provides one.
pub fn parse(cmpt: &ElementRef, rank: usize) -> Result<Vec<ParsedComponent>, ExtractError> {
    let sub_items: Vec<SubItem> = cmpt
        .select(&IMAGE_LINK)
        .map(|a| SubItem {
            title: a
                .select(&IMG)
                .next()
                .and_then(|img| img.value().attr("alt"))
                .filter(|alt| !alt.is_empty())
                .map(str::to_string),
            url: a.value().attr("href").map(str::to_string),
            cite: None,
        })
        .collect();

    if sub_items.is_empty() {
        return Err(ExtractError::MissingPrimaryItem { cmpt_type: ComponentType::Images, rank });
    }

    let mut record = ParsedComponent::new(ComponentType::Images, rank);
    record.sub_items = sub_items;
    Ok(vec![record])
}

// ── Tests ──
