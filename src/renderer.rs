/// HTML renderer for the block/inline tree
use crate::ast::{Block, CodeKind, Document, Inline, ListKind};

pub struct HtmlRenderer;

impl HtmlRenderer {
    pub fn new() -> Self {
        HtmlRenderer
    }

    /// Render a document as an HTML fragment. Blocks are concatenated with
    /// no separators of their own.
    pub fn render(&self, document: &Document) -> String {
        document.blocks.iter().map(render_block).collect()
    }
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn render_block(block: &Block) -> String {
    match block {
        Block::Heading { level, children } => {
            format!("<h{}>{}</h{}>", level, render_inlines(children), level)
        }
        Block::List { kind, items } => {
            let tag = match kind {
                ListKind::Unordered => "ul",
                ListKind::Ordered => "ol",
            };
            let content: String = items
                .iter()
                .map(|item| format!("<li>{}</li>", render_inlines(item)))
                .collect();
            format!("<{}>{}</{}>", tag, content, tag)
        }
        Block::BlockQuote(children) => {
            let content: String = children.iter().map(render_block).collect();
            format!("<blockquote>{}</blockquote>", content)
        }
        Block::CodeBlock {
            kind: CodeKind::Poetry,
            literal,
            ..
        } => format!(
            "<pre class=\"code poetry\"><code>{}</code></pre>",
            escape_html(literal)
        ),
        Block::CodeBlock {
            kind: CodeKind::Fenced,
            language,
            literal,
        } => match language {
            Some(language) => format!(
                "<pre class=\"code {}\"><code class=\"language-{}\">{}</code></pre>",
                language,
                language,
                escape_html(literal)
            ),
            None => format!(
                "<pre class=\"code \"><code>{}</code></pre>",
                escape_html(literal)
            ),
        },
        Block::HorizontalRule => "<hr />".to_string(),
        Block::LineBreaks(count) => "<br />".repeat(*count),
        Block::Paragraph(children) => render_inlines(children),
    }
}

fn render_inlines(nodes: &[Inline]) -> String {
    nodes.iter().map(render_inline).collect()
}

fn render_inline(node: &Inline) -> String {
    match node {
        // Plain text is passed through unescaped
        Inline::Text(text) => text.clone(),
        Inline::Bold(children) => format!("<strong>{}</strong>", render_inlines(children)),
        Inline::Italic(children) => format!("<em>{}</em>", render_inlines(children)),
        Inline::Underline(children) => format!("<u>{}</u>", render_inlines(children)),
        Inline::Strike(children) => format!("<s>{}</s>", render_inlines(children)),
        Inline::Code(code) => format!("<code>{}</code>", escape_html(code)),
        Inline::Link { href, children } => {
            format!("<a href=\"{}\">{}</a>", href, render_inlines(children))
        }
        Inline::Image { src, alt } => format!("<img src=\"{}\" alt=\"{}\">", src, alt),
    }
}

/// Escape `&`, `<`, `>` and `"` for code content.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
