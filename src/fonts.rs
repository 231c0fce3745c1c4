//! Web-font stylesheet injection
//!
//! Font families named by a creative config are loaded from the hosted
//! web-font CSS API through a single `<link rel="stylesheet">` placed at the
//! top of `<head>`.

use once_cell::sync::Lazy;
use regex::Regex;
use url::form_urlencoded;

use crate::model::CreativeConfig;

pub const FONT_CSS_ENDPOINT: &str = "https://fonts.googleapis.com/css2";

// `<head>` or `<head attr=..>`, but not `<header>`
static HEAD_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<head(?:\s[^>]*)?>").expect("head pattern is valid"));

/// Collect the distinct font family names declared under `creative.fonts`.
///
/// Only string values directly under `fonts` count; nested objects such as
/// `size` hold CSS lengths, not families. Order follows declaration
/// (`heading`, `body`, then any extra slots by name).
pub fn extract_font_families(creative: &CreativeConfig) -> Vec<String> {
    let Some(fonts) = &creative.fonts else {
        return Vec::new();
    };

    let declared = [fonts.heading.as_deref(), fonts.body.as_deref()]
        .into_iter()
        .flatten()
        .chain(fonts.extra.values().filter_map(|v| v.as_str()));

    let mut families: Vec<String> = Vec::new();
    for family in declared.map(str::trim).filter(|f| !f.is_empty()) {
        if !families.iter().any(|f| f == family) {
            families.push(family.to_string());
        }
    }
    families
}

/// Build the stylesheet URL for a set of families.
///
/// Spaces inside a family name become `+`, one `family=` pair per font.
pub fn font_stylesheet_url(families: &[String]) -> Option<String> {
    if families.is_empty() {
        return None;
    }
    let mut query = form_urlencoded::Serializer::new(String::new());
    for family in families {
        query.append_pair("family", family);
    }
    query.append_pair("display", "swap");
    Some(format!("{}?{}", FONT_CSS_ENDPOINT, query.finish()))
}

pub fn font_link_tag(families: &[String]) -> Option<String> {
    font_stylesheet_url(families)
        .map(|href| format!(r#"<link href="{}" rel="stylesheet">"#, href.replace('&', "&amp;")))
}

/// Insert the font stylesheet link right after the opening `<head>` tag.
///
/// An empty family list leaves the HTML untouched. A document without a
/// `<head>` is wrapped in a minimal scaffold.
pub fn inject_font_directive(html: &str, families: &[String]) -> String {
    let Some(link) = font_link_tag(families) else {
        return html.to_string();
    };

    match HEAD_OPEN.find(html) {
        Some(head) => {
            let mut out = String::with_capacity(html.len() + link.len() + 4);
            out.push_str(&html[..head.end()]);
            out.push_str("\n  ");
            out.push_str(&link);
            out.push_str(&html[head.end()..]);
            out
        }
        None => format!(
            "<!DOCTYPE html><html><head>\n  {}\n</head><body>{}</body></html>",
            link, html
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn creative(v: serde_json::Value) -> CreativeConfig {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn extracts_unique_families() {
        let c = creative(json!({
            "fonts": {
                "heading": "Open Sans",
                "body": "Open Sans",
                "accent": "Roboto Mono",
                "size": { "title": "48px" },
                "weight": 700
            }
        }));
        assert_eq!(extract_font_families(&c), vec!["Open Sans", "Roboto Mono"]);
        assert!(extract_font_families(&CreativeConfig::default()).is_empty());
    }

    #[test]
    fn url_joins_families() {
        let url = font_stylesheet_url(&["Open Sans".into(), "Lato".into()]).unwrap();
        assert_eq!(
            url,
            "https://fonts.googleapis.com/css2?family=Open+Sans&family=Lato&display=swap"
        );
        assert_eq!(font_stylesheet_url(&[]), None);
    }

    #[test]
    fn empty_family_set_is_identity() {
        let html = "<html><head><title>x</title></head></html>";
        assert_eq!(inject_font_directive(html, &[]), html);
    }

    #[test]
    fn injects_after_head_case_insensitive() {
        let html = r#"<html><HEAD lang="en"><title>x</title></HEAD><body><header>h</header></body></html>"#;
        let out = inject_font_directive(html, &["Inter".into()]);
        assert!(out.starts_with(r#"<html><HEAD lang="en">"#));
        let link_at = out.find("<link").unwrap();
        assert!(link_at < out.find("<title>").unwrap());
        assert!(out.contains("family=Inter&amp;display=swap"));
        assert_eq!(out.matches("<link").count(), 1);
    }

    #[test]
    fn does_not_mistake_header_for_head() {
        let html = "<header>Top</header>";
        let out = inject_font_directive(html, &["Inter".into()]);
        assert!(out.starts_with("<!DOCTYPE html><html><head>"));
        assert!(out.ends_with("<body><header>Top</header></body></html>"));
    }
}
