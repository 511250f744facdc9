pub mod ads;
pub mod carousel;
pub mod general;
pub mod images;
pub mod knowledge;
pub mod local;
pub mod nested;
pub mod people_also_ask;
pub mod stub;
pub mod twitter;

use std::sync::LazyLock;

use scraper::{ElementRef, Selector};
use serde::Serialize;
use thiserror::Error;

use super::classify::ComponentType;

static ITEM_HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, div[role='heading']").unwrap());
static ITEM_ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static ITEM_CITE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("cite").unwrap());

/// One embedded result inside a component, e.g. a sub-result of a nested
/// block or a card in a carousel. Position within the parent's `sub_items`
/// vector is the item's order; sub-items carry no rank of their own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubItem {
    pub title: Option<String>,
    pub url: Option<String>,
    pub cite: Option<String>,
}

/// Normalized record for one classified result block.
///
/// `rank` is the block's 0-based document position on the page; `sub_rank`
/// is the position within a parent block when the assembler supplies one,
/// 0 otherwise. Everything else is optional: a missing field is absent, not
/// an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedComponent {
    #[serde(rename = "type")]
    pub cmpt_type: ComponentType,
    pub rank: usize,
    pub sub_rank: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cite: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_items: Vec<SubItem>,
}

impl ParsedComponent {
    pub fn new(cmpt_type: ComponentType, rank: usize) -> Self {
        ParsedComponent {
            cmpt_type,
            rank,
            sub_rank: 0,
            title: None,
            url: None,
            cite: None,
            text: None,
            sub_items: Vec::new(),
        }
    }
}

/// Block-level extraction failure. Missing optional fields never raise;
/// only the absence of a type's defining primary item does, and the page
/// assembler decides how to degrade.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("{cmpt_type} component at rank {rank} is missing its primary item")]
    MissingPrimaryItem { cmpt_type: ComponentType, rank: usize },
}

/// Route one classified block to the parser responsible for its type.
///
/// The match is exhaustive over `ComponentType`, so adding a type is a
/// compile-time-checked addition here plus one classifier rule. `Unknown`
/// routes to the stub parser, which keeps the raw text and position.
pub fn dispatch(
    cmpt_type: ComponentType,
    cmpt: &ElementRef,
    rank: usize,
    sub_rank: usize,
) -> Result<Vec<ParsedComponent>, ExtractError> {
    match cmpt_type {
        ComponentType::Ad | ComponentType::ShoppingAds => ads::parse(cmpt_type, cmpt, rank),
        ComponentType::PeopleAlsoAsk => people_also_ask::parse(cmpt, rank),
        ComponentType::KnowledgePanel => knowledge::parse(cmpt, rank),
        ComponentType::TwitterCards => twitter::parse(cmpt, rank),
        ComponentType::TopStories | ComponentType::Videos => carousel::parse(cmpt_type, cmpt, rank),
        ComponentType::Images => images::parse(cmpt, rank),
        ComponentType::LocalResults => local::parse(cmpt, rank),
        ComponentType::Nested => nested::parse(cmpt, rank, sub_rank),
        ComponentType::General => general::parse(cmpt, rank),
        ComponentType::Unknown => Ok(stub::parse(cmpt, rank)),
    }
}

/// Whitespace-collapsed text of an element's first heading-level descendant.
pub(crate) fn heading_text(el: &ElementRef) -> Option<String> {
    el.select(&ITEM_HEADING).next().and_then(|h| non_empty(collapse_text(&h)))
}

/// Link target of an element's first anchor.
pub(crate) fn anchor_url(el: &ElementRef) -> Option<String> {
    el.select(&ITEM_ANCHOR)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string)
}

/// Text of an element's first citation node.
pub(crate) fn cite_text(el: &ElementRef) -> Option<String> {
    el.select(&ITEM_CITE).next().and_then(|c| non_empty(collapse_text(&c)))
}

/// The three standard result fields, each an independent optional extraction.
pub(crate) fn item_fields(el: &ElementRef) -> (Option<String>, Option<String>, Option<String>) {
    (heading_text(el), anchor_url(el), cite_text(el))
}

pub(crate) fn collapse_text(el: &ElementRef) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

// ── Tests ──
