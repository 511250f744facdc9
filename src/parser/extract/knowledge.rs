use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::{anchor_url, cite_text, collapse_text, heading_text, non_empty, ExtractError, ParsedComponent};
use crate::parser::classify::ComponentType;

static DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.kno-rdesc span, div[data-attrid='description'] span").unwrap());

/// Parse a knowledge panel. The panel container is the classifier's own
/// signal, so extraction is fully optional: heading, first outbound link,
/// citation and the description paragraph.
pub fn parse(cmpt: &ElementRef, rank: usize) -> Result<Vec<ParsedComponent>, ExtractError> {
    let mut record = ParsedComponent::new(ComponentType::KnowledgePanel, rank);
    record.title = heading_text(cmpt);
    record.url = anchor_url(cmpt);
    record.cite = cite_text(cmpt);
    record.text = cmpt.select(&DESCRIPTION).next().and_then(|d| non_empty(collapse_text(&d)));
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
    fn panel_fields() {
        let html = r#"<div class="kp-blk">
            <h2>Rust (programming language)</h2>
            <a href="https://en.wikipedia.org/wiki/Rust_(programming_language)">Wikipedia</a>
            <div class="kno-rdesc"><span>Rust is a general-purpose programming language.</span></div>
        </div>"#;
        let doc = Html::parse_fragment(html);
        let records = parse(&first_div(&doc), 0).unwrap();
        let r = &records[0];
        assert_eq!(r.cmpt_type, ComponentType::KnowledgePanel);
        assert_eq!(r.title.as_deref(), Some("Rust (programming language)"));
        assert!(r.url.as_deref().unwrap().contains("wikipedia.org"));
        assert_eq!(r.text.as_deref(), Some("Rust is a general-purpose programming language."));
    }

    #[test]
    fn bare_panel_still_parses() {
        let doc = Html::parse_fragment(r#"<div class="kp-blk"><img alt="logo"></div>"#);
        let records = parse(&first_div(&doc), 2).unwrap();
        assert_eq!(records[0].title, None);
        assert_eq!(records[0].url, None);
        assert_eq!(records[0].text, None);
        assert_eq!(records[0].rank, 2);
    }
}
