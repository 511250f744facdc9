use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::{collapse_text, heading_text, non_empty, ExtractError, ParsedComponent, SubItem};
use crate::parser::classify::ComponentType;

static PROFILE_ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href*='twitter.com']").unwrap());
static CARD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("g-inner-card").unwrap());

/// Parse a tweet carousel: the profile link anchors the record, each card's
/// text and permalink become a sub-item.
pub fn parse(cmpt: &ElementRef, rank: usize) -> Result<Vec<ParsedComponent>, ExtractError> {
    let profile = cmpt.select(&PROFILE_ANCHOR).next().ok_or(ExtractError::MissingPrimaryItem {
        cmpt_type: ComponentType::TwitterCards,
        rank,
    })?;

    let sub_items = cmpt
        .select(&CARD)
        .map(|card| SubItem {
            title: non_empty(collapse_text(&card)),
            url: card
                .select(&PROFILE_ANCHOR)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(str::to_string),
            cite: None,
        })
        .collect();

    let mut record = ParsedComponent::new(ComponentType::TwitterCards, rank);
    record.title = heading_text(cmpt);
    record.url = profile.value().attr("href").map(str::to_string);
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
    fn profile_and_tweets() {
        let html = r#"<div>
            <div role="heading">Rust Language (@rustlang) / Twitter</div>
            <a href="https://twitter.com/rustlang">@rustlang</a>
            <g-scrolling-carousel>
                <g-inner-card>Announcing Rust 1.75 <a href="https://twitter.com/rustlang/status/1">link</a></g-inner-card>
                <g-inner-card>This week in Rust <a href="https://twitter.com/rustlang/status/2">link</a></g-inner-card>
            </g-scrolling-carousel>
        </div>"#;
        let doc = Html::parse_fragment(html);
        let records = parse(&first_div(&doc), 4).unwrap();
        let r = &records[0];
        assert_eq!(r.cmpt_type, ComponentType::TwitterCards);
        assert_eq!(r.url.as_deref(), Some("https://twitter.com/rustlang"));
        assert_eq!(r.sub_items.len(), 2);
        assert!(r.sub_items[0].title.as_deref().unwrap().contains("1.75"));
        assert_eq!(r.sub_items[1].url.as_deref(), Some("https://twitter.com/rustlang/status/2"));
    }

    #[test]
    fn missing_profile_is_an_error() {
        let html = r#"<div><g-scrolling-carousel><g-inner-card>orphan</g-inner-card></g-scrolling-carousel></div>"#;
        let doc = Html::parse_fragment(html);
        let err = parse(&first_div(&doc), 0).unwrap_err();
        assert_eq!(
            err,
            ExtractError::MissingPrimaryItem { cmpt_type: ComponentType::TwitterCards, rank: 0 }
        );
    }
}
