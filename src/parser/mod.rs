pub mod classify;
pub mod extract;

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use crate::db::{ParsedSerp, SerpPage};
pub use classify::{Classifier, ComponentType};
pub use extract::{ExtractError, ParsedComponent, SubItem};

static RESULT_BLOCKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div#rso > div").unwrap());
static FALLBACK_BLOCKS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.g").unwrap());

/// Top-level result blocks of a page, in document order. Older rollouts lack
/// the results container id, so fall back to the bare result class.
pub fn extract_components(doc: &Html) -> Vec<ElementRef<'_>> {
    let mut blocks: Vec<ElementRef> = doc.select(&RESULT_BLOCKS).collect();
    if blocks.is_empty() {
        blocks = doc.select(&FALLBACK_BLOCKS).collect();
    }
    blocks.retain(|b| b.text().any(|t| !t.trim().is_empty()));
    blocks
}

/// Classify and parse every result block of a fetched page.
///
/// Each block is a pure classify+dispatch pass: blocks share no state, and
/// `rank` is assigned from document position. A block whose typed parser
/// reports a missing primary item degrades to a raw-text record; the rest
/// of the page parses regardless.
pub fn parse_serp(html: &str) -> Vec<ParsedComponent> {
    let doc = Html::parse_document(html);
    let classifier = Classifier::new();
    let mut components = Vec::new();

    for (rank, cmpt) in extract_components(&doc).into_iter().enumerate() {
        let cmpt_type = classifier.classify(&cmpt);
        match extract::dispatch(cmpt_type, &cmpt, rank, 0) {
            Ok(records) => components.extend(records),
            Err(err) => {
                warn!(rank, %err, "block extraction failed, keeping raw text");
                components.extend(extract::stub::parse(&cmpt, rank));
            }
        }
    }

    components
}

/// Parse one stored page into rows ready for the database.
pub fn process_page(page: &SerpPage) -> ParsedSerp {
    let span = tracing::info_span!("parse_serp", serp_id = page.serp_id, query = %page.query);
    let _enter = span.enter();
    ParsedSerp {
        serp_id: page.serp_id,
        query: page.query.clone(),
        components: parse_serp(&page.html),
    }
}

// ── Tests ──
