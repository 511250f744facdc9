use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::{anchor_url, heading_text, ExtractError, ParsedComponent, SubItem};
use crate::parser::classify::ComponentType;

static PLACE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.VkpGBb").unwrap());
static PLACE_NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.dbg0pd, div[role='heading']").unwrap());

/// Parse a local results block: the map plus a short list of places. Places
/// sometimes render without the map's link targets, so every field stays
/// optional.
pub fn parse(cmpt: &ElementRef, rank: usize) -> Result<Vec<ParsedComponent>, ExtractError> {
    let sub_items = cmpt
        .select(&PLACE)
        .map(|place| SubItem {
            title: place
                .select(&PLACE_NAME)
                .next()
                .map(|n| n.text().collect::<String>().trim().to_string())
                .filter(|n| !n.is_empty()),
            url: anchor_url(&place),
            cite: None,
        })
        .collect();

    let mut record = ParsedComponent::new(ComponentType::LocalResults, rank);
    record.title = heading_text(cmpt);
    record.sub_items = sub_items;
    Ok(vec![record])
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn first_div(doc: &Html) -> ElementRef<'_> {
        let sel = Selector::parse("div").unwrap();
        doc.select(&sel).next().unwrap()
    }

    #[test]
    fn places_under_the_map() {
        let html = r#"<div>
            <img id="lu_map" alt="Map of coffee shops">
            <div class="VkpGBb"><div class="dbg0pd">Blue Bottle Coffee</div><a href="https://maps.example.com/1">directions</a></div>
            <div class="VkpGBb"><div class="dbg0pd">Ritual Roasters</div></div>
        </div>"#;
        let doc = Html::parse_fragment(html);
        let records = parse(&first_div(&doc), 3).unwrap();
        let subs = &records[0].sub_items;
        assert_eq!(records[0].cmpt_type, ComponentType::LocalResults);
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].title.as_deref(), Some("Blue Bottle Coffee"));
        assert_eq!(subs[0].url.as_deref(), Some("https://maps.example.com/1"));
        assert_eq!(subs[1].url, None);
    }

    #[test]
    fn map_without_places_still_parses() {
        let doc = Html::parse_fragment(r#"<div><img id="lu_map" alt="Map"></div>"#);
        let records = parse(&first_div(&doc), 0).unwrap();
        assert!(records[0].sub_items.is_empty());
    }
}
