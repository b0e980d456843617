// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Static HTML helpers over the pre-interaction body

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// Nodes visited before giving up on finding a title
pub const TITLE_SCAN_NODES: usize = 100;

/// Extract the document title from raw HTML.
///
/// Only a `<title>` under `<head>` counts, and only its first child text.
/// The walk stops after `max_nodes` nodes (0 means the default of 100).
pub fn title_from_html(html: &str, max_nodes: usize) -> String {
    let max_nodes = if max_nodes == 0 { TITLE_SCAN_NODES } else { max_nodes };

    let dom = match parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
    {
        Ok(dom) => dom,
        Err(_) => return String::new(),
    };

    let mut walker = TitleWalker {
        visited: 0,
        max_nodes,
    };
    walker.walk(&dom.document, false).unwrap_or_default()
}

struct TitleWalker {
    visited: usize,
    max_nodes: usize,
}

impl TitleWalker {
    fn walk(&mut self, handle: &Handle, in_head: bool) -> Option<String> {
        if self.visited >= self.max_nodes {
            return None;
        }
        self.visited += 1;

        let mut in_head = in_head;
        if let NodeData::Element { name, .. } = &handle.data {
            match name.local.as_ref() {
                "title" if in_head => return first_text(handle),
                "head" => in_head = true,
                _ => {}
            }
        }

        for child in handle.children.borrow().iter() {
            if let Some(title) = self.walk(child, in_head) {
                return Some(title);
            }
        }
        None
    }
}

fn first_text(handle: &Handle) -> Option<String> {
    let children = handle.children.borrow();
    match children.first().map(|c| &c.data) {
        Some(NodeData::Text { contents }) => {
            let text = contents.borrow().to_string();
            (!text.is_empty()).then_some(text)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_in_head() {
        let html = "<html><head><title>Sign in to your account</title></head><body></body></html>";
        assert_eq!(title_from_html(html, 100), "Sign in to your account");
    }

    #[test]
    fn test_title_is_not_trimmed() {
        let html = "<html><head><title>  Office 365 </title></head></html>";
        assert_eq!(title_from_html(html, 0), "  Office 365 ");
    }

    #[test]
    fn test_svg_title_in_body_ignored() {
        let html = r#"<html><head></head><body><svg><title>icon</title></svg></body></html>"#;
        assert_eq!(title_from_html(html, 100), "");
    }

    #[test]
    fn test_node_limit() {
        let mut html = String::from("<html><head>");
        for i in 0..200 {
            html.push_str(&format!("<meta name=\"m{}\" content=\"x\">", i));
        }
        html.push_str("<title>late</title></head></html>");

        assert_eq!(title_from_html(&html, 100), "");
        assert_eq!(title_from_html(&html, 1000), "late");
    }

    #[test]
    fn test_missing_title() {
        assert_eq!(title_from_html("", 100), "");
        assert_eq!(title_from_html("<p>no head here</p>", 100), "");
    }
}
