use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};

use super::{collapse_text, item_fields, non_empty, ExtractError, ParsedComponent};
use crate::parser::classify::ComponentType;

static PRIMARY_ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div[data-hveid][data-ved]").unwrap());
static SNIPPET: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.VwiC3b, div.IsZvec").unwrap());
static DATE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][a-z]{2} \d{1,2}, \d{4} — ").unwrap());

/// Parse a standard organic result: title, link target, citation and the
/// snippet paragraph when present.
pub fn parse(cmpt: &ElementRef, rank: usize) -> Result<Vec<ParsedComponent>, ExtractError> {
    // Some rollouts put the marker pair on the block itself rather than on
    // an inner div.
    let el = cmpt.value();
    let primary = if el.attr("data-hveid").is_some() && el.attr("data-ved").is_some() {
        *cmpt
    } else {
        cmpt.select(&PRIMARY_ITEM).next().ok_or(ExtractError::MissingPrimaryItem {
            cmpt_type: ComponentType::General,
            rank,
        })?
    };

    let (title, url, cite) = item_fields(&primary);
    // Snippets sometimes lead with a publication date; keep the prose only.
    let text = cmpt
        .select(&SNIPPET)
        .next()
        .and_then(|s| non_empty(collapse_text(&s)))
        .map(|s| DATE_PREFIX.replace(&s, "").into_owned());

    Ok(vec![ParsedComponent {
        cmpt_type: ComponentType::General,
        rank,
        sub_rank: 0,
        title,
        url,
        cite,
        text,
        sub_items: Vec::new(),
    }])
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
    fn full_result() {
        let html = r#"<div class="g">
            <div data-hveid="CAk" data-ved="2ah">
                <a href="https://www.rust-lang.org/"><h3>Rust Programming Language</h3></a>
                <cite>rust-lang.org</cite>
            </div>
            <div class="VwiC3b">A language empowering everyone to build reliable software.</div>
        </div>"#;
        let doc = Html::parse_fragment(html);
        let records = parse(&first_div(&doc), 1).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.cmpt_type, ComponentType::General);
        assert_eq!(r.title.as_deref(), Some("Rust Programming Language"));
        assert_eq!(r.url.as_deref(), Some("https://www.rust-lang.org/"));
        assert_eq!(r.cite.as_deref(), Some("rust-lang.org"));
        assert_eq!(r.text.as_deref(), Some("A language empowering everyone to build reliable software."));
    }

    #[test]
    fn marker_pair_on_block_itself() {
        let html = r#"<div class="g" data-hveid="CAk" data-ved="2ah">
            <a href="https://example.org/"><h3>Flat markup</h3></a>
        </div>"#;
        let doc = Html::parse_fragment(html);
        let records = parse(&first_div(&doc), 0).unwrap();
        assert_eq!(records[0].title.as_deref(), Some("Flat markup"));
    }

    #[test]
    fn dated_snippet_keeps_prose_only() {
        let html = r#"<div class="g">
            <div data-hveid="CAk" data-ved="2ah"><h3>Release notes</h3></div>
            <div class="VwiC3b">Dec 28, 2023 — Version 1.75 stabilizes async fn in traits.</div>
        </div>"#;
        let doc = Html::parse_fragment(html);
        let records = parse(&first_div(&doc), 0).unwrap();
        assert_eq!(records[0].text.as_deref(), Some("Version 1.75 stabilizes async fn in traits."));
    }

    #[test]
    fn missing_anchor_leaves_url_absent() {
        let html = r#"<div class="g">
            <div data-hveid="CAk" data-ved="2ah"><h3>No link</h3></div>
        </div>"#;
        let doc = Html::parse_fragment(html);
        let records = parse(&first_div(&doc), 0).unwrap();
        assert_eq!(records[0].title.as_deref(), Some("No link"));
        assert_eq!(records[0].url, None);
        assert_eq!(records[0].cite, None);
    }

    #[test]
    fn unmarked_block_is_an_error() {
        let html = r#"<div class="g"><h3>Stray heading</h3></div>"#;
        let doc = Html::parse_fragment(html);
        let err = parse(&first_div(&doc), 7).unwrap_err();
        assert_eq!(
            err,
            ExtractError::MissingPrimaryItem { cmpt_type: ComponentType::General, rank: 7 }
        );
    }
}
