//! Owned node tree standing in for the page DOM.
//!
//! Paths are child-index sequences walked from the body element, which is
//! what highlight positions are serialized against.

use std::collections::BTreeMap;

use crate::error::{AppError, Result};
use crate::models::{Article, HighlightColor, NodeSpec};

mod layout;
mod range;

pub use layout::{CellStyle, Layout};
pub use range::{Boundary, SerializedRange, TextRange};

pub type NodePath = Vec<usize>;

pub const HIGHLIGHT_ID_ATTR: &str = "data-highlight-id";
pub const HIGHLIGHT_COLOR_ATTR: &str = "data-color";
const CONTENT_CLASS: &str = "content";

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub class: Option<String>,
    pub attrs: BTreeMap<String, String>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            class: None,
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    fn highlight_id(&self) -> Option<&str> {
        if self.tag != "mark" {
            return None;
        }
        self.attrs.get(HIGHLIGHT_ID_ATTR).map(String::as_str)
    }
}

/// Third argument of [`create_element`]: nothing, a text child, or child nodes.
#[derive(Debug, Clone, Default)]
pub enum Content {
    #[default]
    Empty,
    Text(String),
    Children(Vec<Node>),
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Text(s.to_string())
    }
}

impl From<Vec<Node>> for Content {
    fn from(children: Vec<Node>) -> Self {
        Content::Children(children)
    }
}

/// Element factory used wherever the reader assembles nodes.
pub fn create_element(tag: &str, class: Option<&str>, content: impl Into<Content>) -> Node {
    let mut element = Element::new(tag);
    element.class = class.map(str::to_string);
    element.children = match content.into() {
        Content::Empty => Vec::new(),
        Content::Text(text) => vec![Node::Text(text)],
        Content::Children(children) => children,
    };
    Node::Element(element)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Node,
    content_path: NodePath,
}

impl Document {
    pub fn new(body: Element, content_path: NodePath) -> Self {
        Self {
            root: Node::Element(body),
            content_path,
        }
    }

    /// Builds `<body><header><h1>title</h1></header><article class="content">…</article></body>`.
    pub fn from_article(article: &Article) -> Self {
        let mut body = Element::new("body");
        if let Some(title) = &article.title {
            let heading = create_element("h1", Some("title"), title.as_str());
            body.children
                .push(create_element("header", None, vec![heading]));
        }
        let children = article.body.iter().map(node_from_spec).collect::<Vec<_>>();
        body.children
            .push(create_element("article", Some(CONTENT_CLASS), children));
        let content_path = vec![body.children.len() - 1];
        Self::new(body, content_path)
    }

    pub fn body(&self) -> &Node {
        &self.root
    }

    #[cfg(test)]
    pub fn content_path(&self) -> &[usize] {
        &self.content_path
    }

    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        let mut node = &self.root;
        for &index in path {
            match node {
                Node::Element(el) => node = el.children.get(index)?,
                Node::Text(_) => return None,
            }
        }
        Some(node)
    }

    fn element_at_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut node = &mut self.root;
        for &index in path {
            match node {
                Node::Element(el) => node = el.children.get_mut(index)?,
                Node::Text(_) => return None,
            }
        }
        match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    /// Every text node in document order.
    pub fn text_nodes(&self) -> Vec<(NodePath, &str)> {
        fn walk<'a>(node: &'a Node, path: &mut NodePath, out: &mut Vec<(NodePath, &'a str)>) {
            match node {
                Node::Text(text) => out.push((path.clone(), text.as_str())),
                Node::Element(el) => {
                    for (i, child) in el.children.iter().enumerate() {
                        path.push(i);
                        walk(child, path, out);
                        path.pop();
                    }
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.root, &mut Vec::new(), &mut out);
        out
    }

    #[cfg(test)]
    pub fn plain_text(&self) -> String {
        self.text_nodes().into_iter().map(|(_, t)| t).collect()
    }

    pub fn is_in_content(&self, range: &TextRange) -> bool {
        range.start.path.starts_with(&self.content_path)
            && range.end.path.starts_with(&self.content_path)
    }

    /// Text covered by `range`. `None` unless both ends sit in text nodes in document order.
    pub fn range_text(&self, range: &TextRange) -> Option<String> {
        let (start, end) = (&range.start, &range.end);
        if !range.is_ordered() {
            return None;
        }
        let start_len = self.text_len_at(&start.path)?;
        let end_len = self.text_len_at(&end.path)?;
        if start.offset > start_len || end.offset > end_len {
            return None;
        }

        let mut out = String::new();
        for (path, text) in self.text_nodes() {
            if path < start.path {
                continue;
            }
            if path > end.path {
                break;
            }
            let from = if path == start.path { start.offset } else { 0 };
            let to = if path == end.path {
                end.offset
            } else {
                text.chars().count()
            };
            out.extend(text.chars().skip(from).take(to.saturating_sub(from)));
        }
        Some(out)
    }

    fn text_len_at(&self, path: &[usize]) -> Option<usize> {
        match self.node_at(path)? {
            Node::Text(text) => Some(text.chars().count()),
            Node::Element(_) => None,
        }
    }

    pub fn serialize_range(&self, range: &TextRange) -> Option<SerializedRange> {
        let text = self.range_text(range)?;
        Some(SerializedRange {
            start_path: range.start.path.clone(),
            start_offset: range.start.offset,
            end_path: range.end.path.clone(),
            end_offset: range.end.offset,
            text,
        })
    }

    /// Walks both stored paths from the body. Any index miss or out-of-bounds
    /// offset means the range can no longer be restored.
    pub fn resolve(&self, position: &SerializedRange) -> Option<TextRange> {
        let start = self.resolve_boundary(&position.start_path, position.start_offset)?;
        let end = self.resolve_boundary(&position.end_path, position.end_offset)?;
        Some(TextRange { start, end })
    }

    fn resolve_boundary(&self, path: &[usize], offset: usize) -> Option<Boundary> {
        let limit = match self.node_at(path)? {
            Node::Text(text) => text.chars().count(),
            Node::Element(el) => el.children.len(),
        };
        (offset <= limit).then(|| Boundary::new(path.to_vec(), offset))
    }

    /// Surrounds `range` with a highlight marker.
    ///
    /// Both boundaries must be text nodes under the same parent; anything
    /// else would split an element and is rejected.
    pub fn wrap_range(
        &mut self,
        range: &TextRange,
        highlight_id: &str,
        color: HighlightColor,
    ) -> Result<()> {
        let (start, end) = (&range.start, &range.end);
        let (Some((&s_idx, parent)), Some((&e_idx, end_parent))) =
            (start.path.split_last(), end.path.split_last())
        else {
            return Err(AppError::Document("range boundary is the body".into()));
        };
        if parent != end_parent || !range.is_ordered() {
            return Err(AppError::Document(
                "range partially selects a non-text node".into(),
            ));
        }

        let parent_el = self
            .element_at_mut(parent)
            .ok_or_else(|| AppError::Document("range parent is not an element".into()))?;
        let start_text = text_child(parent_el, s_idx)?;
        let end_text = text_child(parent_el, e_idx)?;
        if start.offset > start_text.chars().count() || end.offset > end_text.chars().count() {
            return Err(AppError::Document("range offset out of bounds".into()));
        }

        let (head, mark_children, tail) = if s_idx == e_idx {
            let (before, rest) = split_at_char(&start_text, start.offset);
            let (inner, after) = split_at_char(&rest, end.offset - start.offset);
            (before, vec![Node::Text(inner)], after)
        } else {
            let (before, start_inner) = split_at_char(&start_text, start.offset);
            let (end_inner, after) = split_at_char(&end_text, end.offset);
            let mut inner = vec![Node::Text(start_inner)];
            inner.extend(parent_el.children[s_idx + 1..e_idx].iter().cloned());
            inner.push(Node::Text(end_inner));
            (before, inner, after)
        };

        let mut mark = Element::new("mark");
        mark.class = Some(format!("highlight highlight-{color}"));
        mark.attrs
            .insert(HIGHLIGHT_ID_ATTR.to_string(), highlight_id.to_string());
        mark.attrs
            .insert(HIGHLIGHT_COLOR_ATTR.to_string(), color.to_string());
        mark.children = mark_children;

        parent_el.children.splice(
            s_idx..=e_idx,
            [Node::Text(head), Node::Element(mark), Node::Text(tail)],
        );
        Ok(())
    }

    pub fn find_highlight(&self, highlight_id: &str) -> Option<NodePath> {
        fn walk(node: &Node, id: &str, path: &mut NodePath) -> bool {
            let Node::Element(el) = node else {
                return false;
            };
            if el.highlight_id() == Some(id) {
                return true;
            }
            for (i, child) in el.children.iter().enumerate() {
                path.push(i);
                if walk(child, id, path) {
                    return true;
                }
                path.pop();
            }
            false
        }

        let mut path = Vec::new();
        walk(&self.root, highlight_id, &mut path).then_some(path)
    }

    pub fn has_highlight(&self, highlight_id: &str) -> bool {
        self.find_highlight(highlight_id).is_some()
    }

    /// Id of the innermost highlight marker containing the node at `path`.
    pub fn highlight_at(&self, path: &[usize]) -> Option<String> {
        (0..=path.len()).rev().find_map(|len| match self.node_at(&path[..len])? {
            Node::Element(el) => el.highlight_id().map(str::to_string),
            Node::Text(_) => None,
        })
    }

    /// Replaces the marker with its children and rejoins the text it was split
    /// from. Other children of the parent keep their indices.
    pub fn unwrap_highlight(&mut self, highlight_id: &str) -> bool {
        let Some(path) = self.find_highlight(highlight_id) else {
            return false;
        };
        let Some((&index, parent)) = path.split_last() else {
            return false;
        };
        let Some(parent_el) = self.element_at_mut(parent) else {
            return false;
        };
        let children = match parent_el.children.get_mut(index) {
            Some(Node::Element(mark)) => std::mem::take(&mut mark.children),
            _ => return false,
        };
        let count = children.len();
        parent_el.children.splice(index..=index, children);
        if count > 0 {
            merge_with_next(&mut parent_el.children, index + count - 1);
        }
        if index > 0 {
            merge_with_next(&mut parent_el.children, index - 1);
        }
        true
    }
}

fn text_child(parent: &Element, index: usize) -> Result<String> {
    match parent.children.get(index) {
        Some(Node::Text(text)) => Ok(text.clone()),
        _ => Err(AppError::Document(
            "range boundary is not a text node".into(),
        )),
    }
}

fn split_at_char(s: &str, n: usize) -> (String, String) {
    let byte = s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len());
    (s[..byte].to_string(), s[byte..].to_string())
}

fn merge_with_next(children: &mut Vec<Node>, index: usize) {
    if !matches!(
        children.get(index..index + 2),
        Some([Node::Text(_), Node::Text(_)])
    ) {
        return;
    }
    if let Node::Text(next) = children.remove(index + 1) {
        if let Some(Node::Text(text)) = children.get_mut(index) {
            text.push_str(&next);
        }
    }
}

fn node_from_spec(spec: &NodeSpec) -> Node {
    match spec {
        NodeSpec::Text(text) => Node::Text(text.clone()),
        NodeSpec::Element {
            tag,
            class,
            children,
        } => create_element(
            tag,
            class.as_deref(),
            children.iter().map(node_from_spec).collect::<Vec<_>>(),
        ),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// body > [header > h1 > "Title", article.content > [p > ["Hello world, this is ", em > "fine", " prose."], p > "Second paragraph."]]
    pub(crate) fn sample_document() -> Document {
        let article: Article = serde_json::from_value(serde_json::json!({
            "id": "my-post",
            "title": "Title",
            "body": [
                { "tag": "p", "children": ["Hello world, this is ", { "tag": "em", "children": ["fine"] }, " prose."] },
                { "tag": "p", "children": ["Second paragraph."] }
            ]
        }))
        .unwrap();
        Document::from_article(&article)
    }

    fn range(start: &[usize], so: usize, end: &[usize], eo: usize) -> TextRange {
        TextRange {
            start: Boundary::new(start.to_vec(), so),
            end: Boundary::new(end.to_vec(), eo),
        }
    }

    #[test]
    fn from_article_mounts_body_under_content_container() {
        let doc = sample_document();
        assert_eq!(doc.content_path(), &[1]);
        assert_eq!(doc.node_at(&[1, 0, 0]), Some(&Node::Text("Hello world, this is ".into())));
        assert_eq!(doc.node_at(&[1, 0, 1, 0]), Some(&Node::Text("fine".into())));
        assert_eq!(doc.node_at(&[1, 7]), None);
        assert_eq!(doc.plain_text(), "TitleHello world, this is fine prose.Second paragraph.");
    }

    #[test]
    fn range_text_spans_nodes_in_document_order() {
        let doc = sample_document();
        let r = range(&[1, 0, 0], 13, &[1, 0, 2], 6);
        assert_eq!(doc.range_text(&r).as_deref(), Some("this is fine prose"));

        let backwards = range(&[1, 0, 2], 0, &[1, 0, 0], 3);
        assert_eq!(doc.range_text(&backwards), None);
    }

    #[test]
    fn resolve_rejects_index_misses_and_offset_overflow() {
        let doc = sample_document();
        let good = doc.serialize_range(&range(&[1, 0, 0], 0, &[1, 0, 0], 11)).unwrap();
        assert_eq!(good.text, "Hello world");
        assert!(doc.resolve(&good).is_some());

        let mut missing = good.clone();
        missing.start_path = vec![1, 9, 0];
        assert!(doc.resolve(&missing).is_none());

        let mut overflow = good.clone();
        overflow.end_offset = 500;
        assert!(doc.resolve(&overflow).is_none());
    }

    #[test]
    fn wrap_within_one_text_node() {
        let mut doc = sample_document();
        doc.wrap_range(&range(&[1, 0, 0], 0, &[1, 0, 0], 11), "hl-1", HighlightColor::Green)
            .unwrap();

        assert_eq!(doc.node_at(&[1, 0, 0]), Some(&Node::Text(String::new())));
        assert_eq!(doc.node_at(&[1, 0, 1, 0]), Some(&Node::Text("Hello world".into())));
        assert_eq!(doc.node_at(&[1, 0, 2]), Some(&Node::Text(", this is ".into())));
        assert_eq!(doc.find_highlight("hl-1"), Some(vec![1, 0, 1]));
        assert_eq!(doc.highlight_at(&[1, 0, 1, 0]).as_deref(), Some("hl-1"));
        assert_eq!(doc.highlight_at(&[1, 0, 2]), None);
        assert_eq!(doc.plain_text(), "TitleHello world, this is fine prose.Second paragraph.");
    }

    #[test]
    fn wrap_across_sibling_nodes_keeps_inner_elements() {
        let mut doc = sample_document();
        doc.wrap_range(&range(&[1, 0, 0], 13, &[1, 0, 2], 6), "hl-2", HighlightColor::Blue)
            .unwrap();

        let Some(Node::Element(mark)) = doc.node_at(&[1, 0, 1]) else {
            panic!("expected marker");
        };
        assert_eq!(mark.tag, "mark");
        assert_eq!(mark.class.as_deref(), Some("highlight highlight-blue"));
        assert_eq!(mark.children.len(), 3);
        assert_eq!(doc.node_at(&[1, 0, 2]), Some(&Node::Text(".".into())));
    }

    #[test]
    fn wrap_rejects_ranges_crossing_parents() {
        let mut doc = sample_document();
        let before = doc.clone();
        let err = doc.wrap_range(&range(&[1, 0, 0], 2, &[1, 1, 0], 3), "hl-3", HighlightColor::Pink);
        assert!(err.is_err());
        assert_eq!(doc, before);
    }

    #[test]
    fn unwrap_restores_merged_text() {
        let mut doc = sample_document();
        doc.wrap_range(&range(&[1, 0, 0], 6, &[1, 0, 0], 11), "hl-1", HighlightColor::Yellow)
            .unwrap();
        assert!(doc.unwrap_highlight("hl-1"));
        assert!(!doc.has_highlight("hl-1"));
        assert_eq!(doc.node_at(&[1, 0, 0]), Some(&Node::Text("Hello world, this is ".into())));
        assert!(!doc.unwrap_highlight("hl-1"));
    }

    #[test]
    fn unwrap_leaves_sibling_splits_in_place() {
        let mut doc = sample_document();
        doc.wrap_range(&range(&[1, 0, 0], 0, &[1, 0, 0], 5), "hl-1", HighlightColor::Yellow)
            .unwrap();
        // p > ["", mark > "Hello", " world, this is ", em > "fine", " prose."]
        doc.wrap_range(&range(&[1, 0, 4], 1, &[1, 0, 4], 6), "hl-2", HighlightColor::Green)
            .unwrap();
        let shape_before_second = {
            let mut d = sample_document();
            d.wrap_range(&range(&[1, 0, 0], 0, &[1, 0, 0], 5), "hl-1", HighlightColor::Yellow)
                .unwrap();
            d
        };

        assert!(doc.unwrap_highlight("hl-2"));
        assert_eq!(doc, shape_before_second);
        assert_eq!(doc.node_at(&[1, 0, 0]), Some(&Node::Text(String::new())));
    }

    #[test]
    fn create_element_accepts_text_or_children() {
        let Node::Element(p) = create_element("p", Some("lead"), "hi") else {
            panic!()
        };
        assert_eq!(p.class.as_deref(), Some("lead"));
        assert_eq!(p.children, vec![Node::Text("hi".into())]);

        let Node::Element(div) = create_element("div", None, Content::Empty) else {
            panic!()
        };
        assert!(div.children.is_empty());
    }
}
