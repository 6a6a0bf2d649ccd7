/// A tiny Markdown-dialect to HTML fragment converter
pub mod ast;
mod inline;
pub mod parser;
pub mod references;
pub mod renderer;

pub use ast::{Block, CodeKind, Document, Inline, ListKind};
pub use parser::Parser;
pub use references::ReferenceTable;
pub use renderer::{HtmlRenderer, escape_html};

/// Convert markdown text to an HTML fragment
pub fn convert(markdown: &str) -> String {
    render(&parse(markdown))
}

/// Parse markdown text into a block tree, resolving reference links
pub fn parse(markdown: &str) -> Document {
    let mut parser = Parser::new();
    parser.parse(markdown)
}

/// Render a block tree to an HTML fragment
pub fn render(document: &Document) -> String {
    let renderer = HtmlRenderer::new();
    renderer.render(document)
}
