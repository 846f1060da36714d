/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Splits a fetched page fragment into body markup, scripts and styles.
//!
//! The fragment is parsed with html5ever so the split follows the same tree
//! construction rules the browser applies. Every `<script>` and `<style>` is
//! lifted out in document order, wherever it appears; the remaining `<body>`
//! children become the markup that is placed into the content area.

use html5ever::serialize::{SerializeOpts, TraversalScope, serialize};
use html5ever::tendril::TendrilSink;
use html5ever::{ParseOpts, parse_document};
use log::debug;
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use url::Url;

use crate::model::page::{ParsedPage, ScriptRecord};

/// Parse `raw` and lift its scripts and styles.
///
/// External script sources are resolved against `base` when one is given and
/// the source parses as a relative reference; otherwise they are kept verbatim.
pub fn split_page(raw: &str, base: Option<&Url>) -> ParsedPage {
    let dom = parse_document(RcDom::default(), ParseOpts::default()).one(raw);

    let mut page = ParsedPage::default();
    lift_resources(&dom.document, base, &mut page);

    page.markup = find_element(&dom.document, "body")
        .map(|body| serialize_children(&body))
        .unwrap_or_default();

    debug!(
        "split page: {} bytes of markup, {} scripts, {} styles",
        page.markup.len(),
        page.scripts.len(),
        page.styles.len()
    );
    page
}

fn lift_resources(node: &Handle, base: Option<&Url>, page: &mut ParsedPage) {
    let children: Vec<Handle> = node.children.borrow().clone();
    let mut lifted_any = false;

    for child in &children {
        match element_name(child).as_deref() {
            Some("script") => {
                page.scripts.push(script_record(child, base));
                lifted_any = true;
            },
            Some("style") => {
                page.styles.push(text_content(child));
                lifted_any = true;
            },
            _ => lift_resources(child, base, page),
        }
    }

    if lifted_any {
        node.children
            .borrow_mut()
            .retain(|child| !matches!(element_name(child).as_deref(), Some("script" | "style")));
    }
}

fn script_record(node: &Handle, base: Option<&Url>) -> ScriptRecord {
    match attribute(node, "src").filter(|src| !src.trim().is_empty()) {
        Some(src) => ScriptRecord::External {
            src: resolve_source(&src, base),
        },
        None => ScriptRecord::Inline {
            content: text_content(node),
        },
    }
}

fn resolve_source(src: &str, base: Option<&Url>) -> String {
    base.and_then(|base| base.join(src).ok())
        .map(String::from)
        .unwrap_or_else(|| src.to_owned())
}

fn element_name(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

fn attribute(node: &Handle, wanted: &str) -> Option<String> {
    let NodeData::Element { attrs, .. } = &node.data else {
        return None;
    };
    attrs
        .borrow()
        .iter()
        .find(|attr| &*attr.name.local == wanted)
        .map(|attr| attr.value.to_string())
}

fn text_content(node: &Handle) -> String {
    let mut text = String::new();
    for child in node.children.borrow().iter() {
        if let NodeData::Text { contents } = &child.data {
            text.push_str(&contents.borrow());
        }
    }
    text
}

fn find_element(node: &Handle, wanted: &str) -> Option<Handle> {
    if element_name(node).as_deref() == Some(wanted) {
        return Some(node.clone());
    }
    node.children
        .borrow()
        .iter()
        .find_map(|child| find_element(child, wanted))
}

fn serialize_children(node: &Handle) -> String {
    let mut bytes = Vec::new();
    let handle = SerializableHandle::from(node.clone());
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..Default::default()
    };
    if let Err(err) = serialize(&mut bytes, &handle, opts) {
        debug!("page markup serialization stopped early: {err}");
    }
    String::from_utf8_lossy(&bytes).trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_and_styles_are_lifted_in_document_order() {
        let raw = r#"
            <style>.a { color: red; }</style>
            <div id="board">Board</div>
            <script src="/static/js/board.js"></script>
            <section><script>window.boardReady = true;</script></section>
            <style>.b { color: blue; }</style>
        "#;
        let page = split_page(raw, None);

        assert_eq!(
            page.scripts,
            vec![
                ScriptRecord::External {
                    src: "/static/js/board.js".into()
                },
                ScriptRecord::Inline {
                    content: "window.boardReady = true;".into()
                },
            ]
        );
        assert_eq!(page.styles, vec![".a { color: red; }", ".b { color: blue; }"]);
        assert!(page.markup.contains(r#"<div id="board">Board</div>"#));
        assert!(page.markup.contains("<section></section>"));
        assert!(!page.markup.contains("<script"));
        assert!(!page.markup.contains("<style"));
    }

    #[test]
    fn test_external_sources_resolve_against_base() {
        let base = Url::parse("http://localhost:8080/pages/tasks.html").unwrap();
        let page = split_page(r#"<script src="../js/tasks.js"></script><p>x</p>"#, Some(&base));
        assert_eq!(
            page.scripts,
            vec![ScriptRecord::External {
                src: "http://localhost:8080/js/tasks.js".into()
            }]
        );
    }

    #[test]
    fn test_fragment_without_resources_keeps_markup() {
        let page = split_page("<h1>Reports</h1><p>Nothing yet</p>", None);
        assert_eq!(page.resource_count(), 0);
        assert_eq!(page.markup, "<h1>Reports</h1><p>Nothing yet</p>");
    }

    #[test]
    fn test_unclosed_markup_is_still_split() {
        let page = split_page("<div><span>open<script>var a = 1;</script>", None);
        assert_eq!(page.scripts.len(), 1);
        assert!(page.markup.starts_with("<div><span>open"));
    }

    #[test]
    fn test_empty_src_counts_as_inline() {
        let page = split_page(r#"<script src="">run()</script>"#, None);
        assert_eq!(
            page.scripts,
            vec![ScriptRecord::Inline {
                content: "run()".into()
            }]
        );
    }
}
