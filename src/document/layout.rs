use textwrap::core::display_width;

use super::{Document, Node, NodePath, HIGHLIGHT_COLOR_ATTR};
use crate::models::HighlightColor;

const BLOCK_TAGS: &[&str] = &[
    "article", "blockquote", "body", "div", "figcaption", "figure", "footer", "h1", "h2", "h3",
    "h4", "h5", "h6", "header", "hr", "li", "ol", "p", "pre", "section", "ul",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellStyle {
    pub highlight: Option<HighlightColor>,
    pub emphasis: bool,
    pub strong: bool,
    pub code: bool,
    pub link: bool,
    pub heading: bool,
    pub quote: bool,
}

/// One rendered character and the text-node position it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub node: usize,
    pub offset: usize,
    pub style: CellStyle,
}

impl Cell {
    fn width(&self) -> usize {
        let mut buf = [0u8; 4];
        display_width(self.ch.encode_utf8(&mut buf))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutLine {
    pub prefix: &'static str,
    pub cells: Vec<Cell>,
}

impl LayoutLine {
    pub fn is_blank(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Word-wrapped rows of a document. Row count is the document height used
/// for progress.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub width: usize,
    pub lines: Vec<LayoutLine>,
    nodes: Vec<NodePath>,
}

impl Layout {
    pub fn height(&self) -> usize {
        self.lines.len()
    }

    pub fn cell(&self, line: usize, col: usize) -> Option<&Cell> {
        self.lines.get(line)?.cells.get(col)
    }

    pub fn node_path(&self, cell: &Cell) -> &[usize] {
        &self.nodes[cell.node]
    }

    /// Row and column of the cell rendering `offset` within the text node at `path`.
    pub fn locate(&self, path: &[usize], offset: usize) -> Option<(usize, usize)> {
        let node = self.nodes.iter().position(|p| p == path)?;
        self.lines.iter().enumerate().find_map(|(row, line)| {
            line.cells
                .iter()
                .position(|c| c.node == node && c.offset == offset)
                .map(|col| (row, col))
        })
    }

    /// First non-blank row at or after `row`.
    pub fn first_text_row(&self, row: usize) -> Option<usize> {
        (row..self.lines.len()).find(|&r| !self.lines[r].is_blank())
    }
}

impl Document {
    pub fn layout(&self, width: usize) -> Layout {
        let mut builder = Builder {
            width: width.max(8),
            layout: Layout {
                width,
                ..Layout::default()
            },
            block: Vec::new(),
            list_item: false,
        };
        builder.walk(self.body(), &mut Vec::new(), CellStyle::default());
        builder.flush();
        builder.layout
    }
}

struct Builder {
    width: usize,
    layout: Layout,
    block: Vec<Cell>,
    list_item: bool,
}

impl Builder {
    fn walk(&mut self, node: &Node, path: &mut NodePath, style: CellStyle) {
        match node {
            Node::Text(text) => {
                let node = self.layout.nodes.len();
                self.layout.nodes.push(path.clone());
                for (offset, ch) in text.chars().enumerate() {
                    let ch = if ch.is_whitespace() { ' ' } else { ch };
                    self.block.push(Cell {
                        ch,
                        node,
                        offset,
                        style,
                    });
                }
            }
            Node::Element(el) => {
                let mut style = style;
                match el.tag.as_str() {
                    "em" | "i" => style.emphasis = true,
                    "strong" | "b" => style.strong = true,
                    "code" | "pre" => style.code = true,
                    "a" => style.link = true,
                    "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => style.heading = true,
                    "blockquote" => style.quote = true,
                    "mark" => {
                        style.highlight = el
                            .attrs
                            .get(HIGHLIGHT_COLOR_ATTR)
                            .and_then(|c| HighlightColor::parse(c))
                    }
                    _ => {}
                }

                let is_block = BLOCK_TAGS.contains(&el.tag.as_str());
                if is_block {
                    self.flush();
                    if el.tag == "li" {
                        self.list_item = true;
                    }
                }
                for (i, child) in el.children.iter().enumerate() {
                    path.push(i);
                    self.walk(child, path, style);
                    path.pop();
                }
                if is_block {
                    self.flush();
                }
            }
        }
    }

    fn flush(&mut self) {
        if self.block.iter().all(|c| c.ch == ' ') {
            self.block.clear();
            return;
        }
        let cells = std::mem::take(&mut self.block);
        let (first, rest) = if std::mem::take(&mut self.list_item) {
            ("• ", "  ")
        } else if cells[0].style.quote {
            ("│ ", "│ ")
        } else {
            ("", "")
        };

        if !self.layout.lines.is_empty() {
            self.layout.lines.push(LayoutLine::default());
        }
        let available = self.width.saturating_sub(display_width(first)).max(1);
        for (i, cells) in wrap(&cells, available).into_iter().enumerate() {
            self.layout.lines.push(LayoutLine {
                prefix: if i == 0 { first } else { rest },
                cells,
            });
        }
    }
}

/// Greedy first-fit wrap on spaces; words wider than a row are split.
fn wrap(cells: &[Cell], width: usize) -> Vec<Vec<Cell>> {
    let mut lines = Vec::new();
    let mut line: Vec<Cell> = Vec::new();
    let mut line_width = 0;

    let mut i = 0;
    while i < cells.len() {
        let is_space = cells[i].ch == ' ';
        let mut j = i;
        while j < cells.len() && (cells[j].ch == ' ') == is_space {
            j += 1;
        }
        let token = &cells[i..j];
        let token_width: usize = token.iter().map(Cell::width).sum();

        if is_space {
            if !line.is_empty() {
                line.extend_from_slice(token);
                line_width += token_width;
            }
        } else {
            if line_width + token_width > width && !line.is_empty() {
                push_line(&mut lines, &mut line);
                line_width = 0;
            }
            if token_width > width {
                for cell in token {
                    let w = cell.width();
                    if line_width + w > width && !line.is_empty() {
                        push_line(&mut lines, &mut line);
                        line_width = 0;
                    }
                    line.push(cell.clone());
                    line_width += w;
                }
            } else {
                line.extend_from_slice(token);
                line_width += token_width;
            }
        }
        i = j;
    }
    push_line(&mut lines, &mut line);
    lines
}

fn push_line(lines: &mut Vec<Vec<Cell>>, line: &mut Vec<Cell>) {
    while line.last().is_some_and(|c| c.ch == ' ') {
        line.pop();
    }
    if !line.is_empty() {
        lines.push(std::mem::take(line));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::sample_document;
    use crate::document::{Boundary, TextRange};

    fn row_text(layout: &Layout, row: usize) -> String {
        layout.lines[row].cells.iter().map(|c| c.ch).collect()
    }

    #[test]
    fn wraps_blocks_with_blank_separators() {
        let layout = sample_document().layout(20);
        let rows: Vec<String> = (0..layout.height()).map(|r| row_text(&layout, r)).collect();
        assert_eq!(
            rows,
            vec!["Title", "", "Hello world, this is", "fine prose.", "", "Second paragraph."]
        );
        assert!(layout.lines[0].cells[0].style.heading);
        assert_eq!(layout.first_text_row(1), Some(2));
    }

    #[test]
    fn cells_map_back_to_text_nodes() {
        let layout = sample_document().layout(20);
        let cell = layout.cell(3, 0).unwrap();
        assert_eq!(cell.ch, 'f');
        assert!(cell.style.emphasis);
        assert_eq!(layout.node_path(cell), &[1, 0, 1, 0]);
        assert_eq!(layout.locate(&[1, 0, 1, 0], 0), Some((3, 0)));
        assert_eq!(layout.locate(&[1, 0, 2], 1), Some((3, 5)));
    }

    #[test]
    fn highlighted_cells_carry_their_color() {
        let mut doc = sample_document();
        let range = TextRange {
            start: Boundary::new(vec![1, 0, 0], 6),
            end: Boundary::new(vec![1, 0, 0], 11),
        };
        doc.wrap_range(&range, "hl-1", HighlightColor::Pink).unwrap();
        let layout = doc.layout(40);
        let colored: String = layout
            .lines
            .iter()
            .flat_map(|l| &l.cells)
            .filter(|c| c.style.highlight == Some(HighlightColor::Pink))
            .map(|c| c.ch)
            .collect();
        assert_eq!(colored, "world");
    }

    #[test]
    fn long_words_are_split() {
        let cells: Vec<Cell> = "abcdefghij"
            .chars()
            .enumerate()
            .map(|(offset, ch)| Cell {
                ch,
                node: 0,
                offset,
                style: CellStyle::default(),
            })
            .collect();
        let lines = wrap(&cells, 4);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2].len(), 2);
    }
}
