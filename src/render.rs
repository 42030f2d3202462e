//! Width-aware tree renderer
//!
//! A tree is a list of [`Node`]s: groups carry children, leaves carry an
//! evaluator. Each leaf receives a [`LeafContext`] describing where its value
//! starts on screen, so multi-line values can wrap under their own label.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::FieldError;
use crate::fields::UNKNOWN;
use crate::types::OrderedRecord;

pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";
pub const BRIGHT_YELLOW: &str = "\x1b[93m";
pub const RESET: &str = "\x1b[0m";

const GROUP_BRANCH: &str = "├──┬ ";
const GROUP_CLOSE: &str = "└──┬ ";
const LEAF_BRANCH: &str = "├─── ";
const LEAF_CLOSE: &str = "└─── ";
const GUIDE: &str = "│";
const LABEL_SEPARATOR: &str = ": ";
const TOKEN_SEPARATOR: &str = ", ";

const BANNER: &str = "┌───────────────────────┐\n\
                      │      INFORMATION      │\n\
                      ├───────────────────────┘\n";

pub fn paint(color: &str, text: &str) -> String {
    format!("{}{}{}", color, text, RESET)
}

/// Remove SGR escape sequences
pub fn strip_ansi(text: &str) -> String {
    static SGR: OnceLock<Regex> = OnceLock::new();
    SGR.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").expect("SGR pattern is valid"))
        .replace_all(text, "")
        .into_owned()
}

fn display_width(text: &str) -> usize {
    text.chars().count()
}

/// Leaf value producer
pub type Evaluator = fn(&LeafContext<'_>) -> Result<String, FieldError>;

/// Node of a declarative information tree
pub enum Node {
    Group { label: String, children: Vec<Node> },
    Leaf { label: String, eval: Evaluator },
}

impl Node {
    pub fn group(label: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Group {
            label: label.into(),
            children,
        }
    }

    pub fn leaf(label: impl Into<String>, eval: Evaluator) -> Self {
        Node::Leaf {
            label: label.into(),
            eval,
        }
    }
}

/// Layout context handed to a single leaf evaluation
pub struct LeafContext<'a> {
    pub record: &'a OrderedRecord,
    pub label: &'a str,
    /// Columns left on the first line after `label: `
    pub available_width: usize,
    /// Prefix reproducing the tree guides at the leaf's depth
    pub indent: &'a str,
    /// Width of `label: `
    pub label_width: usize,
}

impl LeafContext<'_> {
    /// Wrapper whose continuation lines line up with the value column
    pub fn wrapper(&self) -> Wrapper {
        let continuation = format!("\n{}{}", self.indent, " ".repeat(self.label_width));
        Wrapper::new(self.available_width, continuation)
    }
}

/// Accumulates `, `-separated tokens, breaking lines when the budget runs out.
///
/// Budgets count visible characters only; the painted form of a token may
/// carry escape sequences.
pub struct Wrapper {
    out: String,
    available: usize,
    remaining: usize,
    continuation: String,
    line_used: bool,
}

impl Wrapper {
    pub fn new(available: usize, continuation: String) -> Self {
        Self {
            out: String::new(),
            available,
            remaining: available,
            continuation,
            line_used: false,
        }
    }

    /// Append free text that is not part of the token list
    pub fn text(&mut self, plain: &str, painted: &str) {
        self.place(display_width(plain));
        self.out.push_str(painted);
    }

    /// Append one token followed by the list separator
    pub fn token(&mut self, plain: &str, painted: &str) {
        self.place(display_width(plain) + TOKEN_SEPARATOR.len());
        self.out.push_str(painted);
        self.out.push_str(TOKEN_SEPARATOR);
    }

    fn place(&mut self, cost: usize) {
        if cost > self.remaining && self.line_used {
            self.out.push_str(&self.continuation);
            self.remaining = self.available;
        }
        self.remaining = self.remaining.saturating_sub(cost);
        self.line_used = true;
    }

    /// Rendered text without the separator after the last token
    pub fn finish(mut self) -> String {
        if self.out.ends_with(TOKEN_SEPARATOR) {
            self.out.truncate(self.out.len() - TOKEN_SEPARATOR.len());
        }
        self.out
    }
}

/// Depth-first renderer for a [`Node`] list
pub struct TreeRenderer {
    width: usize,
}

impl TreeRenderer {
    /// `width` is the terminal width in columns
    pub fn new(width: usize) -> Self {
        Self { width }
    }

    pub fn render(&self, record: &OrderedRecord, nodes: &[Node]) -> String {
        let mut out = String::new();
        self.render_level(record, nodes, "", &mut out);
        out
    }

    fn render_level(&self, record: &OrderedRecord, nodes: &[Node], indent: &str, out: &mut String) {
        for (i, node) in nodes.iter().enumerate() {
            let last = i + 1 == nodes.len();
            match node {
                Node::Group { label, children } => {
                    out.push_str(indent);
                    out.push_str(if last { GROUP_CLOSE } else { GROUP_BRANCH });
                    out.push_str(&paint(BRIGHT_YELLOW, label));
                    out.push('\n');

                    let child_indent = format!("{}{}", indent, if last { "   " } else { "│  " });
                    self.render_level(record, children, &child_indent, out);

                    if !last {
                        out.push_str(indent);
                        out.push_str(GUIDE);
                        out.push('\n');
                    }
                }
                Node::Leaf { label, eval } => {
                    self.render_leaf(record, label, *eval, indent, last, out);
                }
            }
        }
    }

    fn render_leaf(
        &self,
        record: &OrderedRecord,
        label: &str,
        eval: Evaluator,
        indent: &str,
        last: bool,
        out: &mut String,
    ) {
        let value_indent = format!("{}{}", indent, if last { "     " } else { "│    " });
        let label_width = display_width(label) + LABEL_SEPARATOR.len();
        let ctx = LeafContext {
            record,
            label,
            available_width: self
                .width
                .saturating_sub(display_width(&value_indent) + label_width),
            indent: &value_indent,
            label_width,
        };

        let value = eval(&ctx).unwrap_or_else(|e| {
            log::debug!("leaf {:?} rendered as placeholder: {}", label, e);
            UNKNOWN.to_string()
        });

        out.push_str(indent);
        out.push_str(if last { LEAF_CLOSE } else { LEAF_BRANCH });
        out.push_str(label);
        out.push_str(LABEL_SEPARATOR);
        out.push_str(&paint(CYAN, &value));
        out.push('\n');
    }
}

/// Render `nodes` below the information banner
pub fn render_information(record: &OrderedRecord, nodes: &[Node], width: usize) -> String {
    format!("{}{}", BANNER, TreeRenderer::new(width).render(record, nodes))
}
