//! Thin helpers over the `hcl-edit` AST.
//!
//! Manifest values keep Hermit's `${var}` interpolation markers as literal
//! text: HCL parses them as templates, so string extraction re-renders
//! template nodes back to their source form instead of evaluating them.

use hcl_edit::expr::{Expression, ObjectKey};
use hcl_edit::structure::{Block, BlockLabel, Body};
use hcl_edit::template::{Element, StringTemplate};
use hcl_edit::Span;
use hermit_core::{Error, Result};
use std::path::Path;

/// Parse an HCL body, mapping parse failures to `InvalidManifest`.
pub fn parse_body(path: &Path, src: &str) -> Result<Body> {
    hcl_edit::parser::parse_body(src)
        .map_err(|e| Error::manifest(path, e.to_string().replace('\n', " ")))
}

/// 1-based line number of a byte offset.
#[must_use]
pub fn line_of(src: &str, offset: usize) -> usize {
    let offset = offset.min(src.len());
    src.as_bytes()[..offset].iter().filter(|&&b| b == b'\n').count() + 1
}

/// 1-based line of a spanned AST item, 0 when the span is unavailable
/// (synthetic nodes).
#[must_use]
pub fn item_line<T: Span>(src: &str, item: &T) -> usize {
    item.span().map_or(0, |span| line_of(src, span.start))
}

/// Label text of a block label (ident or quoted string).
#[must_use]
pub fn label_str(label: &BlockLabel) -> &str {
    match label {
        BlockLabel::Ident(ident) => ident.value().as_str(),
        BlockLabel::String(s) => s.value().as_str(),
    }
}

/// All labels of a block as strings.
#[must_use]
pub fn labels(block: &Block) -> Vec<String> {
    block.labels.iter().map(|l| label_str(l).to_string()).collect()
}

/// Render a string template back to its literal source form, keeping
/// `${...}` interpolation markers intact.
#[must_use]
pub fn template_to_string(template: &StringTemplate) -> String {
    let mut out = String::new();
    for element in template.iter() {
        match element {
            Element::Literal(lit) => out.push_str(lit.value()),
            Element::Interpolation(interp) => {
                out.push_str("${");
                match &interp.expr {
                    Expression::Variable(var) => out.push_str(var.value().as_str()),
                    expr => out.push_str(expr.to_string().trim()),
                }
                out.push('}');
            }
            // Template directives (%{ if ... }) are not part of the
            // manifest language; render them opaquely.
            Element::Directive(directive) => {
                let mut tmpl = hcl_edit::template::Template::new();
                tmpl.push(directive.clone());
                out.push_str(&tmpl.to_string());
            }
        }
    }
    out
}

/// Extract a string value, accepting plain strings and templates.
#[must_use]
pub fn expr_str(expr: &Expression) -> Option<String> {
    match expr {
        Expression::String(s) => Some(s.value().clone()),
        Expression::StringTemplate(t) => Some(template_to_string(t)),
        _ => None,
    }
}

/// Extract a boolean value.
#[must_use]
pub fn expr_bool(expr: &Expression) -> Option<bool> {
    match expr {
        Expression::Bool(b) => Some(*b.value()),
        _ => None,
    }
}

/// Extract a non-negative integer value.
#[must_use]
pub fn expr_usize(expr: &Expression) -> Option<usize> {
    match expr {
        Expression::Number(n) => n.value().as_u64().and_then(|v| usize::try_from(v).ok()),
        _ => None,
    }
}

/// Extract a list of strings.
#[must_use]
pub fn expr_str_list(expr: &Expression) -> Option<Vec<String>> {
    match expr {
        Expression::Array(array) => {
            let mut out = Vec::new();
            for item in array.iter() {
                out.push(expr_str(item)?);
            }
            Some(out)
        }
        _ => None,
    }
}

/// Extract an object of string values, preserving declaration order.
#[must_use]
pub fn expr_str_map(expr: &Expression) -> Option<Vec<(String, String)>> {
    match expr {
        Expression::Object(object) => {
            let mut out = Vec::new();
            for (key, value) in object.iter() {
                out.push((object_key_str(key)?, expr_str(value.expr())?));
            }
            Some(out)
        }
        _ => None,
    }
}

/// Key text of an object entry (ident or quoted string).
#[must_use]
pub fn object_key_str(key: &ObjectKey) -> Option<String> {
    match key {
        ObjectKey::Ident(ident) => Some(ident.value().as_str().to_string()),
        ObjectKey::Expression(expr) => expr_str(expr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hcl_edit::structure::Structure;

    fn parse(src: &str) -> Body {
        parse_body(Path::new("test.hcl"), src).unwrap()
    }

    #[test]
    fn strings_keep_interpolation_markers() {
        let body = parse(r#"source = "https://example.com/go${version}.${os}-${arch}.tar.gz""#);
        let attr = match body.iter().next().unwrap() {
            Structure::Attribute(attr) => attr,
            Structure::Block(_) => panic!("expected attribute"),
        };
        assert_eq!(
            expr_str(&attr.value).unwrap(),
            "https://example.com/go${version}.${os}-${arch}.tar.gz"
        );
    }

    #[test]
    fn lists_and_maps() {
        let body = parse(
            r#"
binaries = ["bin/go", "bin/gofmt"]
env = {
  "GOROOT": "${root}",
  PATH: "${root}/bin:${PATH}",
}
"#,
        );
        let mut attrs = body.iter().filter_map(|s| match s {
            Structure::Attribute(attr) => Some(attr),
            Structure::Block(_) => None,
        });
        let binaries = attrs.next().unwrap();
        assert_eq!(
            expr_str_list(&binaries.value).unwrap(),
            vec!["bin/go".to_string(), "bin/gofmt".to_string()]
        );
        let env = attrs.next().unwrap();
        assert_eq!(
            expr_str_map(&env.value).unwrap(),
            vec![
                ("GOROOT".to_string(), "${root}".to_string()),
                ("PATH".to_string(), "${root}/bin:${PATH}".to_string()),
            ]
        );
    }

    #[test]
    fn line_numbers() {
        let src = "description = \"x\"\nversion \"1.0\" {\n}\n";
        let body = parse(src);
        let block = body
            .iter()
            .find_map(|s| match s {
                Structure::Block(block) => Some(block),
                Structure::Attribute(_) => None,
            })
            .unwrap();
        assert_eq!(item_line(src, block), 2);
    }
}
