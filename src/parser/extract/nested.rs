use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::{item_fields, ExtractError, ParsedComponent, SubItem};
use crate::parser::classify::ComponentType;

static PRIMARY_ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div[data-hveid][data-ved]").unwrap());
static SUB_LIST: LazyLock<Selector> = LazyLock::new(|| Selector::parse("ul.FxLDp").unwrap());
static SUB_ITEM: LazyLock<Selector> = LazyLock::new(|| Selector::parse("li").unwrap());

/// Parse a nested component: one primary result followed by an embedded
/// list of sub-results.
///
/// The primary item is the descendant carrying both marker attributes; its
/// absence is the one block-level failure this parser reports. Title, url
/// and cite are independent optional extractions, for the primary item and
/// for every list item alike. A missing sub-items list just means an empty
/// `sub_items`.
pub fn parse(
    cmpt: &ElementRef,
    rank: usize,
    sub_rank: usize,
) -> Result<Vec<ParsedComponent>, ExtractError> {
    let primary = cmpt.select(&PRIMARY_ITEM).next().ok_or(ExtractError::MissingPrimaryItem {
        cmpt_type: ComponentType::Nested,
        rank,
    })?;

    let (title, url, cite) = item_fields(&primary);

    let sub_items = match cmpt.select(&SUB_LIST).next() {
        Some(list) => list
            .select(&SUB_ITEM)
            .map(|li| {
                let (title, url, cite) = item_fields(&li);
                SubItem { title, url, cite }
            })
            .collect(),
        None => Vec::new(),
    };

    Ok(vec![ParsedComponent {
        cmpt_type: ComponentType::Nested,
        rank,
        sub_rank,
        title,
        url,
        cite,
        text: None,
        sub_items,
    }])
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    const NESTED_HTML: &str = r#"<div class="g">
        <div data-hveid="CAoQAA" data-ved="2ahUKE">
            <a href="/url?q=http://example.com"><h3>Example Title</h3></a>
            <cite>example.com</cite>
        </div>
        <ul class="FxLDp">
            <li>
                <a href="/url?q=http://example.com/one"><h3>First Sub</h3></a>
                <cite>example.com/one</cite>
            </li>
            <li>
                <a href="/url?q=http://example.com/two"><h3>Second Sub</h3></a>
                <cite>example.com/two</cite>
            </li>
        </ul>
    </div>"#;

    fn first_div(doc: &Html) -> ElementRef<'_> {
        let sel = Selector::parse("div").unwrap();
        doc.select(&sel).next().unwrap()
    }

    #[test]
    fn primary_and_sub_items() {
        let doc = Html::parse_fragment(NESTED_HTML);
        let records = parse(&first_div(&doc), 0, 0).unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.cmpt_type, ComponentType::Nested);
        assert_eq!(record.title.as_deref(), Some("Example Title"));
        assert_eq!(record.url.as_deref(), Some("/url?q=http://example.com"));
        assert_eq!(record.cite.as_deref(), Some("example.com"));

        assert_eq!(record.sub_items.len(), 2);
        assert_eq!(record.sub_items[0].title.as_deref(), Some("First Sub"));
        assert_eq!(record.sub_items[0].url.as_deref(), Some("/url?q=http://example.com/one"));
        assert_eq!(record.sub_items[0].cite.as_deref(), Some("example.com/one"));
        assert_eq!(record.sub_items[1].title.as_deref(), Some("Second Sub"));
        assert_eq!(record.sub_items[1].cite.as_deref(), Some("example.com/two"));
    }

    #[test]
    fn carries_supplied_sub_rank() {
        let doc = Html::parse_fragment(NESTED_HTML);
        let records = parse(&first_div(&doc), 3, 2).unwrap();
        assert_eq!(records[0].rank, 3);
        assert_eq!(records[0].sub_rank, 2);
    }

    #[test]
    fn missing_list_yields_primary_alone() {
        let html = r#"<div class="g">
            <div data-hveid="CAoQAA" data-ved="2ahUKE">
                <a href="/url?q=http://example.com"><h3>Example Title</h3></a>
            </div>
        </div>"#;
        let doc = Html::parse_fragment(html);
        let records = parse(&first_div(&doc), 0, 0).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title.as_deref(), Some("Example Title"));
        assert!(records[0].sub_items.is_empty());
    }

    #[test]
    fn partial_sub_item_fields_stay_independent() {
        let html = r#"<div class="g">
            <div data-hveid="CAoQAA" data-ved="2ahUKE"><h3>Main</h3></div>
            <ul class="FxLDp">
                <li><h3>No link here</h3></li>
                <li><a href="/url?q=http://example.com/b">bare link</a></li>
            </ul>
        </div>"#;
        let doc = Html::parse_fragment(html);
        let records = parse(&first_div(&doc), 0, 0).unwrap();
        let subs = &records[0].sub_items;
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].title.as_deref(), Some("No link here"));
        assert_eq!(subs[0].url, None);
        assert_eq!(subs[1].title, None);
        assert_eq!(subs[1].url.as_deref(), Some("/url?q=http://example.com/b"));
    }

    #[test]
    fn missing_primary_is_an_error() {
        let html = r#"<div class="g"><ul class="FxLDp"><li>orphan</li></ul></div>"#;
        let doc = Html::parse_fragment(html);
        let err = parse(&first_div(&doc), 5, 0).unwrap_err();
        assert_eq!(
            err,
            ExtractError::MissingPrimaryItem { cmpt_type: ComponentType::Nested, rank: 5 }
        );
    }
}
