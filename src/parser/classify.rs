use std::fmt;
use std::sync::LazyLock;

use scraper::{ElementRef, Selector};
use serde::Serialize;

static SHOPPING_UNIT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.cu-container, div.commercial-unit-desktop-top").unwrap());
static AD_ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div[data-text-ad], div.uEierd").unwrap());
static PAA_QUESTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.related-question-pair").unwrap());
static KP_BLOCK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.kp-wholepage, div.knowledge-panel").unwrap());
static CAROUSEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("g-scrolling-carousel").unwrap());
static TWITTER_ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href*='twitter.com']").unwrap());
static IMAGE_GRID: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.img-brk").unwrap());
static LOCAL_MAP: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#lu_map").unwrap());
static NESTED_LIST: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ul.FxLDp").unwrap());
static MARKED_ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div[data-hveid][data-ved]").unwrap());
static SECTION_HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div[role='heading'], h2, h3").unwrap());

/// Semantic category of one result block. The markup carries no authoritative
/// labels, so every tag here is inferred from structural signals and `Unknown`
/// is the reserved fallback for anything the rules don't recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    Ad,
    ShoppingAds,
    PeopleAlsoAsk,
    KnowledgePanel,
    TwitterCards,
    TopStories,
    Videos,
    Images,
    LocalResults,
    Nested,
    General,
    Unknown,
}

impl ComponentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::Ad => "ad",
            ComponentType::ShoppingAds => "shopping_ads",
            ComponentType::PeopleAlsoAsk => "people_also_ask",
            ComponentType::KnowledgePanel => "knowledge_panel",
            ComponentType::TwitterCards => "twitter_cards",
            ComponentType::TopStories => "top_stories",
            ComponentType::Videos => "videos",
            ComponentType::Images => "images",
            ComponentType::LocalResults => "local_results",
            ComponentType::Nested => "nested",
            ComponentType::General => "general",
            ComponentType::Unknown => "unknown",
        }
    }

    /// Inverse of `as_str`; unrecognized tags resolve to `Unknown`.
    pub fn from_tag(tag: &str) -> ComponentType {
        match tag {
            "ad" => ComponentType::Ad,
            "shopping_ads" => ComponentType::ShoppingAds,
            "people_also_ask" => ComponentType::PeopleAlsoAsk,
            "knowledge_panel" => ComponentType::KnowledgePanel,
            "twitter_cards" => ComponentType::TwitterCards,
            "top_stories" => ComponentType::TopStories,
            "videos" => ComponentType::Videos,
            "images" => ComponentType::Images,
            "local_results" => ComponentType::LocalResults,
            "nested" => ComponentType::Nested,
            "general" => ComponentType::General,
            _ => ComponentType::Unknown,
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Rule = (fn(&ElementRef) -> bool, ComponentType);

/// Priority-ordered structural rules, first match wins.
///
/// The rule list is built once and carried by value; there is no process-wide
/// dispatch table. Ordering matters: a nested block's container also matches
/// the weaker general-result signals, and a people-also-ask block sits inside
/// knowledge-panel styled markup, so the specific rules come first.
pub struct Classifier {
    rules: Vec<Rule>,
}

impl Classifier {
    pub fn new() -> Self {
        let rules: Vec<Rule> = vec![
            (is_shopping_ads, ComponentType::ShoppingAds),
            (is_ad, ComponentType::Ad),
            (is_people_also_ask, ComponentType::PeopleAlsoAsk),
            (is_knowledge_panel, ComponentType::KnowledgePanel),
            (is_twitter_cards, ComponentType::TwitterCards),
            (is_top_stories, ComponentType::TopStories),
            (is_videos, ComponentType::Videos),
            (is_images, ComponentType::Images),
            (is_local_results, ComponentType::LocalResults),
            (is_nested, ComponentType::Nested),
            (is_general, ComponentType::General),
        ];
        Classifier { rules }
    }

    /// Classify one result block. Never fails: a block no rule claims is
    /// `Unknown`, and absent attributes are non-matches rather than errors.
    pub fn classify(&self, cmpt: &ElementRef) -> ComponentType {
        self.rules
            .iter()
            .find(|(predicate, _)| predicate(cmpt))
            .map(|(_, cmpt_type)| *cmpt_type)
            .unwrap_or(ComponentType::Unknown)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

fn has_class(cmpt: &ElementRef, name: &str) -> bool {
    cmpt.value().classes().any(|c| c == name)
}

fn has_descendant(cmpt: &ElementRef, selector: &Selector) -> bool {
    cmpt.select(selector).next().is_some()
}

/// Text of the block's first section heading, if any.
fn heading_starts_with(cmpt: &ElementRef, prefix: &str) -> bool {
    cmpt.select(&SECTION_HEADING)
        .next()
        .map(|h| {
            h.text()
                .collect::<String>()
                .trim()
                .starts_with(prefix)
        })
        .unwrap_or(false)
}

fn is_shopping_ads(cmpt: &ElementRef) -> bool {
    has_class(cmpt, "commercial-unit-desktop-top") || has_descendant(cmpt, &SHOPPING_UNIT)
}

fn is_ad(cmpt: &ElementRef) -> bool {
    cmpt.value().attr("data-text-ad").is_some()
        || matches!(cmpt.value().id(), Some("tads") | Some("tadsb"))
        || has_class(cmpt, "ads-ad")
        || has_descendant(cmpt, &AD_ITEM)
}

fn is_people_also_ask(cmpt: &ElementRef) -> bool {
    has_descendant(cmpt, &PAA_QUESTION)
}

fn is_knowledge_panel(cmpt: &ElementRef) -> bool {
    has_class(cmpt, "kp-blk") || has_class(cmpt, "knowledge-panel") || has_descendant(cmpt, &KP_BLOCK)
}

fn is_twitter_cards(cmpt: &ElementRef) -> bool {
    has_descendant(cmpt, &CAROUSEL) && has_descendant(cmpt, &TWITTER_ANCHOR)
}

fn is_top_stories(cmpt: &ElementRef) -> bool {
    has_descendant(cmpt, &CAROUSEL) && heading_starts_with(cmpt, "Top stories")
}

fn is_videos(cmpt: &ElementRef) -> bool {
    has_descendant(cmpt, &CAROUSEL) && heading_starts_with(cmpt, "Videos")
}

fn is_images(cmpt: &ElementRef) -> bool {
    matches!(cmpt.value().id(), Some("imagebox_bigimages")) || has_descendant(cmpt, &IMAGE_GRID)
}

fn is_local_results(cmpt: &ElementRef) -> bool {
    has_descendant(cmpt, &LOCAL_MAP)
}

fn is_nested(cmpt: &ElementRef) -> bool {
    has_descendant(cmpt, &NESTED_LIST)
}

fn is_general(cmpt: &ElementRef) -> bool {
    let el = cmpt.value();
    has_class(cmpt, "g")
        || has_descendant(cmpt, &MARKED_ITEM)
        || (el.attr("data-hveid").is_some() && el.attr("data-ved").is_some())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn classify(html: &str) -> ComponentType {
        let doc = Html::parse_fragment(html);
        let sel = Selector::parse("div").unwrap();
        let cmpt = doc.select(&sel).next().unwrap();
        Classifier::new().classify(&cmpt)
    }

    #[test]
    fn general_result() {
        let html = r#"<div class="g"><div data-hveid="C1" data-ved="2a"><h3>Title</h3></div></div>"#;
        assert_eq!(classify(html), ComponentType::General);
    }

    #[test]
    fn nested_beats_general() {
        // The container also carries the general-result signals; the nested
        // list marker must win.
        let html = r#"<div class="g">
            <div data-hveid="C1" data-ved="2a"><h3>Main</h3></div>
            <ul class="FxLDp"><li>one</li></ul>
        </div>"#;
        assert_eq!(classify(html), ComponentType::Nested);
    }

    #[test]
    fn ad_block() {
        let html = r#"<div id="tads"><div data-text-ad="1"><h3>Buy now</h3></div></div>"#;
        assert_eq!(classify(html), ComponentType::Ad);
    }

    #[test]
    fn shopping_beats_ad() {
        let html = r#"<div><div class="cu-container"><div data-text-ad="1">x</div></div></div>"#;
        assert_eq!(classify(html), ComponentType::ShoppingAds);
    }

    #[test]
    fn people_also_ask_beats_knowledge() {
        // PAA blocks reuse knowledge-panel styling; the question pair marker
        // is the stronger signal.
        let html = r#"<div class="kp-blk"><div class="related-question-pair">Why?</div></div>"#;
        assert_eq!(classify(html), ComponentType::PeopleAlsoAsk);
    }

    #[test]
    fn knowledge_panel() {
        let html = r#"<div class="kp-blk"><h2>Rust</h2></div>"#;
        assert_eq!(classify(html), ComponentType::KnowledgePanel);
    }

    #[test]
    fn top_stories_carousel() {
        let html = r#"<div><div role="heading">Top stories</div><g-scrolling-carousel></g-scrolling-carousel></div>"#;
        assert_eq!(classify(html), ComponentType::TopStories);
    }

    #[test]
    fn videos_carousel() {
        let html = r#"<div><div role="heading">Videos</div><g-scrolling-carousel></g-scrolling-carousel></div>"#;
        assert_eq!(classify(html), ComponentType::Videos);
    }

    #[test]
    fn twitter_beats_plain_carousel() {
        let html = r#"<div><div role="heading">Results from twitter</div>
            <g-scrolling-carousel><a href="https://twitter.com/rustlang">@rustlang</a></g-scrolling-carousel></div>"#;
        assert_eq!(classify(html), ComponentType::TwitterCards);
    }

    #[test]
    fn local_results_map() {
        let html = r#"<div><img id="lu_map" alt="Map"><div class="VkpGBb">A place</div></div>"#;
        assert_eq!(classify(html), ComponentType::LocalResults);
    }

    #[test]
    fn unmatched_is_unknown() {
        assert_eq!(classify("<div><p>nothing to see</p></div>"), ComponentType::Unknown);
    }

    #[test]
    fn missing_attributes_are_non_matches() {
        // Only one half of the marker pair: not a general result.
        let html = r#"<div><div data-hveid="C1"><h3>Half marked</h3></div></div>"#;
        assert_eq!(classify(html), ComponentType::Unknown);
    }

    #[test]
    fn classification_is_deterministic() {
        let html = r#"<div class="g">
            <div data-hveid="C1" data-ved="2a"><h3>Main</h3></div>
            <ul class="FxLDp"><li>one</li></ul>
        </div>"#;
        let doc = Html::parse_fragment(html);
        let sel = Selector::parse("div").unwrap();
        let cmpt = doc.select(&sel).next().unwrap();
        let classifier = Classifier::new();
        let first = classifier.classify(&cmpt);
        for _ in 0..10 {
            assert_eq!(classifier.classify(&cmpt), first);
        }
    }

    #[test]
    fn tag_round_trip() {
        for cmpt_type in [
            ComponentType::Ad,
            ComponentType::ShoppingAds,
            ComponentType::PeopleAlsoAsk,
            ComponentType::KnowledgePanel,
            ComponentType::TwitterCards,
            ComponentType::TopStories,
            ComponentType::Videos,
            ComponentType::Images,
            ComponentType::LocalResults,
            ComponentType::Nested,
            ComponentType::General,
            ComponentType::Unknown,
        ] {
            assert_eq!(ComponentType::from_tag(cmpt_type.as_str()), cmpt_type);
        }
    }
}
