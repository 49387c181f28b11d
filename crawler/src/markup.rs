use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

lazy_static! {
    static ref ANCHORS: Selector = Selector::parse("a[href]").expect("valid selector");
}

/// Elements whose content is neither indexed nor searched for links.
const BLOCK_ELEMENTS: &[&str] = &["head", "script", "style", "noscript", "svg", "template"];

fn inside_block<'a>(mut ancestors: impl Iterator<Item = &'a Node>) -> bool {
    ancestors.any(|n| n.as_element().is_some_and(|e| BLOCK_ELEMENTS.contains(&e.name())))
}

/// Canonical form used for deduplication: the `url` crate's serialization without fragment.
pub fn normalize(url: &Url) -> Url {
    let mut clean = url.clone();
    clean.set_fragment(None);
    clean
}

/// Absolute `http`/`https` links in document order, resolved against `base`.
pub fn extract_links(base: &Url, html: &str) -> Vec<Url> {
    let doc = Html::parse_document(html);
    doc.select(&ANCHORS)
        .filter(|a| !inside_block(a.ancestors().map(|n| n.value())))
        .filter_map(|a: ElementRef<'_>| a.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|u| normalize(&u))
        .collect()
}

/// Visible text of the document with entities decoded; text nodes are separated by spaces.
pub fn strip_markup(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut parts = Vec::new();
    for node in doc.tree.root().descendants() {
        if let Some(text) = node.value().as_text() {
            if !inside_block(node.ancestors().map(|n| n.value())) {
                parts.push(&**text);
            }
        }
    }
    parts.join(" ")
}
