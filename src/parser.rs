/// Block segmenter for the markup dialect
use crate::ast::{Block, CodeKind, Document, Inline, ListKind};
use crate::inline::InlineParser;
use crate::references::{self, ReferenceTable};

/// Deepest blockquote / emphasis nesting that is still parsed structurally.
/// Markers past this depth are kept as plain text.
pub(crate) const MAX_NESTING: usize = 32;

pub struct Parser {
    references: ReferenceTable,
}

impl Parser {
    pub fn new() -> Self {
        Parser {
            references: ReferenceTable::new(),
        }
    }

    /// Reference definitions collected by the last call to [`Parser::parse`].
    pub fn references(&self) -> &ReferenceTable {
        &self.references
    }

    pub fn parse(&mut self, input: &str) -> Document {
        // FIRST PASS: pull out reference definitions so every block sees them
        let (text, references) = references::extract(input);
        self.references = references;

        // SECOND PASS: segment the remaining lines into blocks
        let lines: Vec<&str> = text.lines().collect();
        let blocks = self.parse_blocks(&lines, 0);

        tracing::debug!(
            blocks = blocks.len(),
            references = self.references.len(),
            "Parsed document"
        );
        Document { blocks }
    }

    fn inline(&self, text: &str) -> Vec<Inline> {
        InlineParser::new(&self.references).parse(text)
    }

    fn parse_blocks(&self, lines: &[&str], depth: usize) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];

            // Setext heading: the underline claims the line above it
            if !is_blank(line) && followed_by_underline(lines, i) {
                tracing::trace!(line = i, "setext heading");
                blocks.push(Block::Heading {
                    level: 1,
                    children: self.inline(line.trim()),
                });
                i += 2;
            } else if let Some((level, content)) = parse_atx_heading(line) {
                tracing::trace!(line = i, level, "atx heading");
                blocks.push(Block::Heading {
                    level,
                    children: self.inline(content),
                });
                i += 1;
            } else if depth < MAX_NESTING && is_blockquote_start(&lines[i..]) {
                let (quote, consumed) = self.parse_blockquote(&lines[i..], depth);
                blocks.push(quote);
                i += consumed;
            } else if is_horizontal_rule(line) {
                tracing::trace!(line = i, "horizontal rule");
                blocks.push(Block::HorizontalRule);
                i += 1;
            } else if let Some((kind, _)) = parse_list_item(line) {
                let (list, consumed) = self.parse_list(&lines[i..], kind);
                blocks.push(list);
                i += consumed;
            } else if let Some(language) = fence_language(line) {
                let (code, consumed) = parse_fenced_code_block(&lines[i..], language);
                blocks.push(code);
                i += consumed;
            } else if is_blank(line) {
                let run = lines[i..].iter().take_while(|l| is_blank(l)).count();
                let next = i + run;
                // Only a run *between* two content blocks is a break. A run
                // directly above a rule belongs to the rule.
                if !blocks.is_empty() && next < lines.len() && !is_horizontal_rule(lines[next]) {
                    blocks.push(Block::LineBreaks(run));
                }
                i = next;
            } else if line.starts_with('\t') {
                let (code, consumed) = parse_poetry_block(&lines[i..]);
                blocks.push(code);
                i += consumed;
            } else {
                // Text right under a list or quote keeps its line break
                let leading_break = matches!(
                    blocks.last(),
                    Some(Block::List { .. } | Block::BlockQuote(_))
                );
                let (paragraph, consumed) =
                    self.parse_paragraph(&lines[i..], leading_break, depth);
                blocks.push(paragraph);
                i += consumed;
            }
        }

        blocks
    }

    /// Parse a run of `>` lines; the dedented text is segmented recursively
    fn parse_blockquote(&self, lines: &[&str], depth: usize) -> (Block, usize) {
        let mut quote_lines = Vec::new();

        for line in lines {
            let Some(rest) = line.strip_prefix('>') else {
                break;
            };
            quote_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }

        let consumed = quote_lines.len();
        tracing::trace!(lines = consumed, "blockquote");
        let children = self.parse_blocks(&quote_lines, depth + 1);
        (Block::BlockQuote(children), consumed)
    }

    /// Parse consecutive items of one list kind. Item numbers are ignored.
    fn parse_list(&self, lines: &[&str], kind: ListKind) -> (Block, usize) {
        let mut items = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];
            if is_horizontal_rule(line) {
                break;
            }
            // An item sitting on a setext underline becomes the heading
            if i > 0 && followed_by_underline(lines, i) {
                break;
            }
            match parse_list_item(line) {
                Some((item_kind, content)) if item_kind == kind => {
                    items.push(self.inline(content));
                    i += 1;
                }
                _ => break,
            }
        }

        tracing::trace!(?kind, items = items.len(), "list");
        (Block::List { kind, items }, i)
    }

    /// Collect lines up to the next blank line or block start
    fn parse_paragraph(
        &self,
        lines: &[&str],
        leading_break: bool,
        depth: usize,
    ) -> (Block, usize) {
        let mut paragraph_lines = vec![lines[0]];
        let mut i = 1;
        // End of a `>` run already known to hold no quote
        let mut bare_markers_until = 0;

        while i < lines.len() {
            let line = lines[i];
            if is_blank(line) || starts_block(line) {
                break;
            }
            if depth < MAX_NESTING && line.starts_with('>') && i >= bare_markers_until {
                let (run, has_content) = quote_run(&lines[i..]);
                if has_content {
                    break;
                }
                bare_markers_until = i + run;
            }
            if followed_by_underline(lines, i) {
                break;
            }
            paragraph_lines.push(line);
            i += 1;
        }

        let mut text = paragraph_lines.join("\n");
        if leading_break {
            text.insert(0, '\n');
        }
        (Block::Paragraph(self.inline(&text)), i)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Check whether a line would open a block other than a paragraph.
/// Quotes depend on the lines below and are checked by the caller.
fn starts_block(line: &str) -> bool {
    parse_atx_heading(line).is_some()
        || is_horizontal_rule(line)
        || parse_list_item(line).is_some()
        || fence_language(line).is_some()
        || line.starts_with('\t')
}

/// `===` (three or more) under a line of text
fn is_setext_underline(line: &str) -> bool {
    let trimmed = line.trim_end();
    trimmed.len() >= 3 && trimmed.bytes().all(|b| b == b'=')
}

fn followed_by_underline(lines: &[&str], i: usize) -> bool {
    lines.get(i + 1).is_some_and(|next| is_setext_underline(next))
}

/// 1-3 `#` followed by a space. Returns (level, content).
fn parse_atx_heading(line: &str) -> Option<(u8, &str)> {
    let hash_count = line.bytes().take_while(|&b| b == b'#').count();
    if !(1..=3).contains(&hash_count) {
        return None;
    }
    let content = line[hash_count..].strip_prefix(' ')?;
    Some((hash_count as u8, content.trim()))
}

/// A run of `>` lines opens a quote when any line in it has text after
/// the marker; a run of bare markers (a lone `>`) is plain text.
fn is_blockquote_start(lines: &[&str]) -> bool {
    quote_run(lines).1
}

/// Length of the `>` run at the top of `lines`, and whether any of its
/// lines has content
fn quote_run(lines: &[&str]) -> (usize, bool) {
    let mut run = 0;
    let mut has_content = false;
    for rest in lines.iter().map_while(|line| line.strip_prefix('>')) {
        run += 1;
        has_content |= !rest.trim().is_empty();
    }
    (run, has_content)
}

/// `---` (three or more dashes) or `* * *` (three or more single-spaced stars)
fn is_horizontal_rule(line: &str) -> bool {
    let trimmed = line.trim_end();
    if trimmed.len() >= 3 && trimmed.bytes().all(|b| b == b'-') {
        return true;
    }
    let stars = trimmed.split(' ').count();
    stars >= 3 && trimmed.split(' ').all(|part| part == "*")
}

/// `* `, `- `, `+ ` or `<digits>. `. Returns the kind and the item text.
fn parse_list_item(line: &str) -> Option<(ListKind, &str)> {
    if let Some(rest) = line.strip_prefix(['*', '-', '+']) {
        let content = rest.strip_prefix(' ')?;
        return Some((ListKind::Unordered, content.trim()));
    }

    let digit_count = line.bytes().take_while(u8::is_ascii_digit).count();
    if digit_count == 0 {
        return None;
    }
    let content = line[digit_count..].strip_prefix(". ")?;
    Some((ListKind::Ordered, content.trim()))
}

/// Check for an opening fence. Returns the language tag (possibly empty).
pub(crate) fn fence_language(line: &str) -> Option<&str> {
    let tag = line.trim_end().strip_prefix("```")?;
    if tag.contains(|c: char| c.is_whitespace() || c == '`') {
        return None;
    }
    Some(tag)
}

pub(crate) fn is_fence_close(line: &str) -> bool {
    line.trim_end() == "```"
}

/// Parse a fenced code block. An unterminated fence runs to the end of input.
fn parse_fenced_code_block(lines: &[&str], language: &str) -> (Block, usize) {
    let body_end = lines[1..]
        .iter()
        .position(|line| is_fence_close(line))
        .map(|pos| pos + 1);

    let (body, consumed) = match body_end {
        Some(end) => (&lines[1..end], end + 1),
        None => {
            tracing::debug!(
                lines = lines.len(),
                "Unterminated code fence, closing at end of input"
            );
            (&lines[1..], lines.len())
        }
    };

    let code = Block::CodeBlock {
        kind: CodeKind::Fenced,
        language: (!language.is_empty()).then(|| language.to_string()),
        literal: body.join("\n"),
    };
    (code, consumed)
}

/// Parse consecutive tab-indented lines, dropping one leading tab from each
fn parse_poetry_block(lines: &[&str]) -> (Block, usize) {
    let body: Vec<&str> = lines
        .iter()
        .map_while(|line| line.strip_prefix('\t'))
        .collect();

    let consumed = body.len();
    let code = Block::CodeBlock {
        kind: CodeKind::Poetry,
        language: None,
        literal: body.join("\n"),
    };
    (code, consumed)
}
