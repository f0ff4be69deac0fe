use lazy_static::lazy_static;
use scraper::{Html, Node, Selector};

use crate::{Error, Result};

/// Plain text pulled out of a raw document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub body: String,
    /// Title, heading and emphasis text
    pub key: String,
}

pub trait TextExtractor: Send + Sync {
    fn extract(&self, raw: &str) -> Result<Extracted>;
}

lazy_static! {
    static ref SEL_TITLE: Selector = Selector::parse("title").expect("valid selector");
    static ref SEL_HEADINGS: Selector = Selector::parse("h1, h2, h3").expect("valid selector");
    static ref SEL_BOLD: Selector = Selector::parse("b, strong").expect("valid selector");
}

/// HTML pages. Script and style contents are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

impl HtmlExtractor {
    fn visible_text(doc: &Html) -> String {
        let mut parts: Vec<&str> = Vec::new();
        for node in doc.tree.root().descendants() {
            let Node::Text(text) = node.value() else { continue };
            let hidden = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .map_or(false, |e| matches!(e.name(), "script" | "style"))
            });
            if !hidden {
                parts.push(&**text);
            }
        }
        parts.join(" ").trim().to_string()
    }

    fn key_text(doc: &Html) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(title) = doc.select(&SEL_TITLE).next() {
            parts.push(title.text().collect::<String>().trim().to_string());
        }
        for sel in [&*SEL_HEADINGS, &*SEL_BOLD] {
            for el in doc.select(sel) {
                parts.push(el.text().collect::<Vec<_>>().join(" ").trim().to_string());
            }
        }
        parts.retain(|p| !p.is_empty());
        parts.join(" ")
    }
}

impl TextExtractor for HtmlExtractor {
    fn extract(&self, raw: &str) -> Result<Extracted> {
        if raw.contains('\0') {
            return Err(Error::Extraction("document contains NUL bytes".into()));
        }
        let doc = Html::parse_document(raw);
        Ok(Extracted { body: Self::visible_text(&doc), key: Self::key_text(&doc) })
    }
}

/// Treats the whole document as body text with no key text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, raw: &str) -> Result<Extracted> {
        Ok(Extracted { body: raw.to_string(), key: String::new() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title>Cat Facts</title><style>.x { color: red }</style></head>
        <body><h1>All about cats</h1><p>Cats chase <b>mice</b> and <strong>laser</strong> dots.</p>
        <script>var hidden = "dog";</script><h4>small print</h4></body></html>"#;

    #[test]
    fn body_skips_script_and_style() {
        let out = HtmlExtractor.extract(PAGE).unwrap();
        assert!(out.body.contains("Cats chase"));
        assert!(out.body.contains("mice"));
        assert!(!out.body.contains("hidden"));
        assert!(!out.body.contains("color"));
    }

    #[test]
    fn key_text_collects_title_headings_and_bold() {
        let out = HtmlExtractor.extract(PAGE).unwrap();
        assert_eq!(out.key, "Cat Facts All about cats mice laser");
    }

    #[test]
    fn nul_bytes_fail_extraction() {
        assert!(HtmlExtractor.extract("<p>a\0b</p>").is_err());
    }
}
