/// AST node types for the markup dialect
use serde::{Deserialize, Serialize};

/// A parsed document: top-level blocks in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Block {
    Heading {
        level: u8, // 1..=3
        children: Vec<Inline>,
    },
    List {
        kind: ListKind,
        items: Vec<Vec<Inline>>,
    },
    BlockQuote(Vec<Block>),
    CodeBlock {
        kind: CodeKind,
        language: Option<String>,
        literal: String, // raw, escaped at render time
    },
    HorizontalRule,
    LineBreaks(usize),
    Paragraph(Vec<Inline>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListKind {
    Unordered,
    Ordered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeKind {
    Fenced,
    Poetry, // tab-indented
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Inline {
    Text(String),
    Bold(Vec<Inline>),
    Italic(Vec<Inline>),
    Underline(Vec<Inline>),
    Strike(Vec<Inline>),
    Code(String),
    Link { href: String, children: Vec<Inline> },
    Image { src: String, alt: String },
}
