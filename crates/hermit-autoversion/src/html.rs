//! HTML version oracles: CSS selectors, plus the narrow XPath shape
//! manifests actually use, translated onto the same selector engine.
//!
//! Supported XPath subset: `//tag` and `/tag` steps, `[@attr='value']`
//! predicates, and a trailing `/text()` or `/@attr` extraction step.
//! Anything else is rejected.

use hermit_core::{Error, Result};
use scraper::{Html, Selector};

/// What to pull out of each matched element.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Extract {
    Text,
    Attr(String),
}

/// Evaluate a CSS selector, collecting the text of each match.
pub fn css_versions(body: &str, css: &str) -> Result<Vec<String>> {
    let selector = Selector::parse(css)
        .map_err(|e| Error::other("html", format!("invalid CSS selector {css:?}: {e}")))?;
    let document = Html::parse_document(body);
    Ok(document
        .select(&selector)
        .map(|element| element.text().collect::<String>())
        .collect())
}

/// Evaluate the supported XPath subset.
pub fn xpath_versions(body: &str, xpath: &str) -> Result<Vec<String>> {
    let (css, extract) = xpath_to_css(xpath)?;
    let selector = Selector::parse(&css).map_err(|e| {
        Error::other(
            "html",
            format!("XPath {xpath:?} translated to invalid selector {css:?}: {e}"),
        )
    })?;
    let document = Html::parse_document(body);
    Ok(document
        .select(&selector)
        .filter_map(|element| match &extract {
            Extract::Text => Some(element.text().collect::<String>()),
            Extract::Attr(name) => element.value().attr(name).map(str::to_string),
        })
        .collect())
}

/// Translate the XPath subset to a CSS selector plus an extraction mode.
fn xpath_to_css(xpath: &str) -> Result<(String, Extract)> {
    let bad = |detail: &str| {
        Error::other(
            "html",
            format!("unsupported XPath {xpath:?}: {detail}"),
        )
    };
    if !xpath.starts_with('/') {
        return Err(bad("expression must start with / or //"));
    }

    let mut css = String::new();
    let mut extract = Extract::Text;
    let mut rest = xpath;
    while !rest.is_empty() {
        let descendant = if let Some(tail) = rest.strip_prefix("//") {
            rest = tail;
            true
        } else if let Some(tail) = rest.strip_prefix('/') {
            rest = tail;
            false
        } else {
            return Err(bad("expected step separator"));
        };

        let end = rest.find('/').unwrap_or(rest.len());
        let step = &rest[..end];
        rest = &rest[end..];
        if step.is_empty() {
            return Err(bad("empty step"));
        }

        if step == "text()" {
            if !rest.is_empty() {
                return Err(bad("text() must be the final step"));
            }
            extract = Extract::Text;
            break;
        }
        if let Some(attr) = step.strip_prefix('@') {
            if !rest.is_empty() {
                return Err(bad("attribute extraction must be the final step"));
            }
            extract = Extract::Attr(attr.to_string());
            break;
        }

        let (tag, predicates) = match step.find('[') {
            Some(idx) => (&step[..idx], &step[idx..]),
            None => (step, ""),
        };
        if tag.is_empty()
            || !(tag == "*" || tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
        {
            return Err(bad("unsupported step"));
        }
        if !css.is_empty() {
            css.push_str(if descendant { " " } else { " > " });
        }
        css.push_str(tag);

        let mut preds = predicates;
        while !preds.is_empty() {
            let Some(close) = preds.find(']') else {
                return Err(bad("unterminated predicate"));
            };
            let pred = &preds[1..close];
            preds = &preds[close + 1..];
            let Some(pred) = pred.strip_prefix('@') else {
                return Err(bad("only attribute predicates are supported"));
            };
            match pred.split_once('=') {
                Some((name, value)) => {
                    let value = value.trim_matches(|c| c == '\'' || c == '"');
                    css.push_str(&format!("[{name}=\"{value}\"]"));
                }
                None => css.push_str(&format!("[{pred}]")),
            }
        }
    }

    if css.is_empty() {
        return Err(bad("no element steps"));
    }
    Ok((css, extract))
}
