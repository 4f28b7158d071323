use serde::{Deserialize, Serialize};

use super::NodePath;

/// A container path plus an offset inside it: characters for text nodes,
/// child indices for elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary {
    pub path: NodePath,
    pub offset: usize,
}

impl Boundary {
    pub fn new(path: NodePath, offset: usize) -> Self {
        Self { path, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRange {
    pub start: Boundary,
    pub end: Boundary,
}

impl TextRange {
    /// Start does not come after end. Lexicographic path order is pre-order document order.
    pub fn is_ordered(&self) -> bool {
        match self.start.path.cmp(&self.end.path) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Equal => self.start.offset <= self.end.offset,
            std::cmp::Ordering::Greater => false,
        }
    }
}

/// Location-independent description of a highlighted range, stored with each highlight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedRange {
    pub start_path: NodePath,
    pub start_offset: usize,
    pub end_path: NodePath,
    pub end_offset: usize,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_follows_document_order() {
        let r = |a: &[usize], ao, b: &[usize], bo| TextRange {
            start: Boundary::new(a.to_vec(), ao),
            end: Boundary::new(b.to_vec(), bo),
        };
        assert!(r(&[1, 0, 0], 3, &[1, 0, 2], 0).is_ordered());
        assert!(r(&[1, 0, 0], 3, &[1, 0, 0], 3).is_ordered());
        assert!(!r(&[1, 0, 0], 4, &[1, 0, 0], 3).is_ordered());
        assert!(!r(&[1, 1, 0], 0, &[1, 0, 5], 0).is_ordered());
    }

    #[test]
    fn wire_format_uses_camel_case() {
        let json = serde_json::to_value(SerializedRange {
            start_path: vec![1, 0, 0],
            start_offset: 2,
            end_path: vec![1, 0, 0],
            end_offset: 9,
            text: "llo wor".into(),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "startPath": [1, 0, 0],
                "startOffset": 2,
                "endPath": [1, 0, 0],
                "endOffset": 9,
                "text": "llo wor"
            })
        );
    }
}
