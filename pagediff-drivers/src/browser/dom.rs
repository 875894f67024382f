//! Visible text of a rendered DOM.
//!
//! [`extract_text`] is a pure depth-first walk over anything implementing
//! [`DomNode`]: the live browser hands back a [`DomSnapshot`] and tests use
//! parsed HTML. Subtrees of [`EXCLUDED_TAGS`] contribute nothing, childless
//! elements contribute their trimmed text, and inner elements join their
//! children's contributions with a space.

use anyhow::{bail, Result};
use pagediff_common::collapse_whitespace;
use serde::Deserialize;
use serde_json::Value;

pub const EXCLUDED_TAGS: [&str; 4] = ["script", "style", "noscript", "iframe"];

pub trait DomNode: Sized {
    fn tag_name(&self) -> &str;
    fn children(&self) -> Vec<Self>;
    fn text_content(&self) -> String;
}

enum Visit<N> {
    Done(String),
    Inner(Frame<N>),
}

struct Frame<N> {
    children: std::vec::IntoIter<N>,
    parts: Vec<String>,
}

fn visit<N: DomNode>(node: &N) -> Visit<N> {
    let tag = node.tag_name();
    if EXCLUDED_TAGS.iter().any(|t| tag.eq_ignore_ascii_case(t)) {
        return Visit::Done(String::new());
    }

    let children = node.children();
    if children.is_empty() {
        return Visit::Done(node.text_content().trim().to_string());
    }
    Visit::Inner(Frame {
        children: children.into_iter(),
        parts: Vec::new(),
    })
}

/// Depth-first text of `node`. Uses an explicit stack, so nesting depth is
/// bounded by memory rather than the thread stack.
pub fn extract_text<N: DomNode>(node: &N) -> String {
    let mut stack = match visit(node) {
        Visit::Done(text) => return text,
        Visit::Inner(frame) => vec![frame],
    };

    loop {
        let next = stack.last_mut().and_then(|frame| frame.children.next());
        match next {
            Some(child) => match visit(&child) {
                Visit::Done(text) => {
                    if let Some(frame) = stack.last_mut() {
                        if !text.is_empty() {
                            frame.parts.push(text);
                        }
                    }
                }
                Visit::Inner(frame) => stack.push(frame),
            },
            None => {
                let Some(done) = stack.pop() else {
                    return String::new();
                };
                let text = done.parts.join(" ");
                match stack.last_mut() {
                    Some(parent) => {
                        if !text.is_empty() {
                            parent.parts.push(text);
                        }
                    }
                    None => return text,
                }
            }
        }
    }
}

/// [`extract_text`] with whitespace runs collapsed.
pub fn visible_text<N: DomNode>(root: &N) -> String {
    collapse_whitespace(&extract_text(root))
}

/// Element tree captured from a live page by
/// [`DOM_SNAPSHOT`](super::scripts::DOM_SNAPSHOT).
#[derive(Debug, Clone, PartialEq)]
pub struct DomSnapshot {
    nodes: Vec<SnapshotNode>,
}

#[derive(Debug, Clone, PartialEq)]
struct SnapshotNode {
    tag: String,
    text: String,
    children: Vec<usize>,
}

#[derive(Deserialize)]
struct RawNode {
    tag: String,
    #[serde(default)]
    parent: Option<usize>,
    #[serde(default)]
    text: Option<String>,
}

impl DomSnapshot {
    /// Rebuild the tree from the script's flat node list. `Ok(None)` when the
    /// page had no body.
    pub fn from_value(value: Value) -> Result<Option<Self>> {
        if value.is_null() {
            return Ok(None);
        }
        let raw: Vec<RawNode> = serde_json::from_value(value)?;
        if raw.is_empty() {
            return Ok(None);
        }

        let mut nodes: Vec<SnapshotNode> = Vec::with_capacity(raw.len());
        for (index, node) in raw.into_iter().enumerate() {
            match node.parent {
                None if index == 0 => {}
                Some(parent) if parent < index => nodes[parent].children.push(index),
                other => bail!("malformed DOM snapshot: node {index} has parent {other:?}"),
            }
            nodes.push(SnapshotNode {
                tag: node.tag,
                text: node.text.unwrap_or_default(),
                children: Vec::new(),
            });
        }
        Ok(Some(Self { nodes }))
    }

    pub fn root(&self) -> SnapshotRef<'_> {
        SnapshotRef {
            snapshot: self,
            index: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SnapshotRef<'a> {
    snapshot: &'a DomSnapshot,
    index: usize,
}

impl<'a> DomNode for SnapshotRef<'a> {
    fn tag_name(&self) -> &str {
        &self.snapshot.nodes[self.index].tag
    }

    fn children(&self) -> Vec<Self> {
        self.snapshot.nodes[self.index]
            .children
            .iter()
            .map(|&index| SnapshotRef {
                snapshot: self.snapshot,
                index,
            })
            .collect()
    }

    fn text_content(&self) -> String {
        self.snapshot.nodes[self.index].text.clone()
    }
}
