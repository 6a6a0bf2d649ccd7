//! Inline parser: emphasis, code spans, links and images
//!
//! Every construct is parsed over an explicit span of the block text.
//! Content captured for a link or an emphasis node is parsed recursively
//! on its own, so a marker can never close outside the span that opened
//! it. Emphasis that finds no closer runs to the end of the current span
//! (the block, a list item, or the text of a link); nothing is carried
//! over to the next line or block.
//!
//! Spans are byte ranges into the block text. Bracket pairs and the next
//! position of each closing delimiter are indexed once per block, so a
//! `[` or `(` that never closes costs a lookup instead of a rescan.

use crate::ast::Inline;
use crate::parser::MAX_NESTING;
use crate::references::ReferenceTable;

/// Emphasis markers and the node each produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emphasis {
    Bold,
    Italic,
    Underline,
    Strike,
}

impl Emphasis {
    fn marker(self) -> &'static str {
        match self {
            Emphasis::Bold => "**",
            Emphasis::Italic => "*",
            Emphasis::Underline => "__",
            Emphasis::Strike => "~~",
        }
    }

    fn node(self, children: Vec<Inline>) -> Inline {
        match self {
            Emphasis::Bold => Inline::Bold(children),
            Emphasis::Italic => Inline::Italic(children),
            Emphasis::Underline => Inline::Underline(children),
            Emphasis::Strike => Inline::Strike(children),
        }
    }

    /// The marker opening at `i`, looking no further than `end`
    fn at(bytes: &[u8], i: usize, end: usize) -> Option<Emphasis> {
        let next = if i + 1 < end { Some(bytes[i + 1]) } else { None };
        match (bytes[i], next) {
            (b'*', Some(b'*')) => Some(Emphasis::Bold),
            (b'*', _) => Some(Emphasis::Italic),
            (b'_', Some(b'_')) => Some(Emphasis::Underline),
            (b'~', Some(b'~')) => Some(Emphasis::Strike),
            _ => None,
        }
    }
}

/// What follows the `]` of a bracketed span
#[derive(Debug, Clone, Copy, PartialEq)]
enum LinkTarget<'t> {
    Inline(&'t str),
    Reference(&'t str),
}

/// Byte layout of a `[text](href)` / `[text][label]` / `[text]` span.
/// The link text is `text_start..text_end`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LinkShape<'t> {
    text_start: usize,
    text_end: usize,
    target: LinkTarget<'t>,
    end: usize,
}

/// Block text plus its delimiter index.
///
/// Lookups take the end of the span being parsed: a partner at or past
/// it does not exist for that span. Every span handed to the parser is
/// either a balanced bracket interior or an emphasis interior, and in both
/// cases the bracket pairing of the whole text restricted to the span is
/// the pairing the span would compute on its own.
struct Source<'t> {
    text: &'t str,
    matching_bracket: Vec<Option<usize>>,
    next_close_bracket: Vec<Option<usize>>,
    next_close_paren: Vec<Option<usize>>,
    next_backtick: Vec<Option<usize>>,
}

impl<'t> Source<'t> {
    fn new(text: &'t str) -> Self {
        let bytes = text.as_bytes();
        let mut matching_bracket = vec![None; bytes.len()];
        let mut open = Vec::new();
        for (i, &b) in bytes.iter().enumerate() {
            match b {
                b'[' => open.push(i),
                b']' => {
                    if let Some(start) = open.pop() {
                        matching_bracket[start] = Some(i);
                    }
                }
                _ => {}
            }
        }

        Source {
            text,
            matching_bracket,
            next_close_bracket: next_positions(bytes, b']'),
            next_close_paren: next_positions(bytes, b')'),
            next_backtick: next_positions(bytes, b'`'),
        }
    }

    fn bytes(&self) -> &'t [u8] {
        self.text.as_bytes()
    }

    /// Position of the `]` balancing the `[` at `start`
    fn matching_bracket(&self, start: usize, end: usize) -> Option<usize> {
        self.matching_bracket[start].filter(|&close| close < end)
    }

    /// First `target` in `from..end`
    fn find(&self, target: u8, from: usize, end: usize) -> Option<usize> {
        if from >= end {
            return None;
        }
        let next = match target {
            b']' => &self.next_close_bracket,
            b')' => &self.next_close_paren,
            b'`' => &self.next_backtick,
            _ => {
                let found = self.bytes()[from..end].iter().position(|&b| b == target);
                return found.map(|offset| from + offset);
            }
        };
        next[from].filter(|&found| found < end)
    }
}

/// `next[i]` is the first position at or after `i` holding `target`
fn next_positions(bytes: &[u8], target: u8) -> Vec<Option<usize>> {
    let mut next = vec![None; bytes.len() + 1];
    for i in (0..bytes.len()).rev() {
        next[i] = if bytes[i] == target { Some(i) } else { next[i + 1] };
    }
    next
}

pub(crate) struct InlineParser<'a> {
    references: &'a ReferenceTable,
}

impl<'a> InlineParser<'a> {
    pub(crate) fn new(references: &'a ReferenceTable) -> Self {
        InlineParser { references }
    }

    pub(crate) fn parse(&self, text: &str) -> Vec<Inline> {
        let source = Source::new(text);
        self.parse_span(&source, 0, text.len(), 0)
    }

    fn parse_span(&self, source: &Source, start: usize, end: usize, depth: usize) -> Vec<Inline> {
        let text = source.text;
        let mut nodes = Vec::new();
        let mut text_start = start;
        let mut i = start;

        // All markers are ASCII, so every `i` a construct starts at is a
        // char boundary and the slices below stay valid UTF-8.
        while i < end {
            match self.try_parse_construct(source, i, end, depth) {
                Some((node, next)) => {
                    push_text(&mut nodes, &text[text_start..i]);
                    nodes.push(node);
                    i = next;
                    text_start = next;
                }
                None => i += 1,
            }
        }
        push_text(&mut nodes, &text[text_start..end]);

        nodes
    }

    fn try_parse_construct(
        &self,
        source: &Source,
        i: usize,
        end: usize,
        depth: usize,
    ) -> Option<(Inline, usize)> {
        let bytes = source.bytes();
        match bytes[i] {
            b'!' if i + 1 < end && bytes[i + 1] == b'[' => try_parse_image(source, i, end),
            b'[' => self.try_parse_link(source, i, end, depth),
            b'`' => try_parse_code_span(source, i, end),
            _ if depth >= MAX_NESTING => None,
            _ => {
                let emphasis = Emphasis::at(bytes, i, end)?;
                Some(self.parse_emphasis(source, i, end, emphasis, depth))
            }
        }
    }

    /// Parse an emphasis node whose opener sits at `start`. Without a
    /// closer the node takes the rest of the span.
    fn parse_emphasis(
        &self,
        source: &Source,
        start: usize,
        end: usize,
        emphasis: Emphasis,
        depth: usize,
    ) -> (Inline, usize) {
        let marker = emphasis.marker();
        let content_start = start + marker.len();

        let (content_end, next) = match self.find_closer(source, content_start, end, emphasis) {
            Some(close) => (close, close + marker.len()),
            None => (end, end),
        };

        let children = self.parse_span(source, content_start, content_end, depth + 1);
        (emphasis.node(children), next)
    }

    /// A bracketed span becomes a link when it has an inline target or its
    /// label resolves. Otherwise the `[` is plain text and scanning goes
    /// on inside the brackets.
    fn try_parse_link(
        &self,
        source: &Source,
        start: usize,
        end: usize,
        depth: usize,
    ) -> Option<(Inline, usize)> {
        let shape = scan_link(source, start, end)?;
        let href = match shape.target {
            LinkTarget::Inline(href) => href,
            LinkTarget::Reference(label) => match self.references.get(label) {
                Some(url) => url,
                None => {
                    tracing::debug!(label, "Unresolved reference link left as text");
                    return None;
                }
            },
        };

        let children = if depth >= MAX_NESTING {
            vec![Inline::Text(source.text[shape.text_start..shape.text_end].to_string())]
        } else {
            self.parse_span(source, shape.text_start, shape.text_end, depth + 1)
        };

        Some((
            Inline::Link {
                href: href.to_string(),
                children,
            },
            shape.end,
        ))
    }

    fn resolve<'s>(&'s self, shape: &LinkShape<'s>) -> Option<&'s str> {
        match shape.target {
            LinkTarget::Inline(href) => Some(href),
            LinkTarget::Reference(label) => self.references.get(label),
        }
    }

    /// Find the closing marker for `emphasis`, skipping over complete code
    /// spans, images and links so none of them can be cut in half.
    fn find_closer(
        &self,
        source: &Source,
        from: usize,
        end: usize,
        emphasis: Emphasis,
    ) -> Option<usize> {
        let bytes = source.bytes();
        let mut i = from;

        while i < end {
            match bytes[i] {
                b'`' => {
                    if let Some((_, next)) = try_parse_code_span(source, i, end) {
                        i = next;
                        continue;
                    }
                }
                b'!' if i + 1 < end && bytes[i + 1] == b'[' => {
                    if let Some((_, next)) = try_parse_image(source, i, end) {
                        i = next;
                        continue;
                    }
                }
                b'[' => {
                    if let Some(shape) = scan_link(source, i, end)
                        && self.resolve(&shape).is_some()
                    {
                        i = shape.end;
                        continue;
                    }
                }
                _ => {
                    if let Some(found) = Emphasis::at(bytes, i, end) {
                        if found == emphasis {
                            return Some(i);
                        }
                        // A different marker sharing our character, e.g. `**`
                        // while looking for `*`
                        i += found.marker().len();
                        continue;
                    }
                }
            }
            i += 1;
        }

        None
    }
}

/// Append literal text, merging with a preceding text node
fn push_text(nodes: &mut Vec<Inline>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Inline::Text(last)) = nodes.last_mut() {
        last.push_str(text);
    } else {
        nodes.push(Inline::Text(text.to_string()));
    }
}

/// Match the bracket structure starting at `start` without building nodes.
///
/// `[text](href)` is an inline link; `[text][label]`, `[text][]` and
/// `[text]` are reference links (an empty label means the text itself).
fn scan_link<'t>(source: &Source<'t>, start: usize, end: usize) -> Option<LinkShape<'t>> {
    let text = source.text;
    let bytes = source.bytes();
    let text_end = source.matching_bracket(start, end)?;
    let link_text = &text[start + 1..text_end];
    let after = text_end + 1;
    let shape = |target, next| LinkShape {
        text_start: start + 1,
        text_end,
        target,
        end: next,
    };

    if after < end {
        match bytes[after] {
            b'(' => {
                if let Some(close) = source.find(b')', after + 1, end) {
                    let href = &text[after + 1..close];
                    return Some(shape(LinkTarget::Inline(href), close + 1));
                }
            }
            b'[' => {
                if let Some(close) = source.find(b']', after + 1, end) {
                    let label = match &text[after + 1..close] {
                        "" => link_text,
                        label => label,
                    };
                    return Some(shape(LinkTarget::Reference(label), close + 1));
                }
            }
            _ => {}
        }
    }

    Some(shape(LinkTarget::Reference(link_text), after))
}

/// `![alt](src)`. Alt text is taken verbatim, up to the first `]`.
fn try_parse_image(source: &Source, start: usize, end: usize) -> Option<(Inline, usize)> {
    let text = source.text;
    let alt_start = start + 2;
    let alt_end = source.find(b']', alt_start, end)?;
    let src_start = alt_end + 2;
    if src_start > end || source.bytes()[alt_end + 1] != b'(' {
        return None;
    }
    let src_end = source.find(b')', src_start, end)?;

    Some((
        Inline::Image {
            src: text[src_start..src_end].to_string(),
            alt: text[alt_start..alt_end].to_string(),
        },
        src_end + 1,
    ))
}

/// `` `code` ``. Needs a closing backtick and at least one character;
/// otherwise the backtick is plain text.
fn try_parse_code_span(source: &Source, start: usize, end: usize) -> Option<(Inline, usize)> {
    let content_start = start + 1;
    let close = source.find(b'`', content_start, end)?;
    if close == content_start {
        return None;
    }
    Some((
        Inline::Code(source.text[content_start..close].to_string()),
        close + 1,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> Vec<Inline> {
        let references = ReferenceTable::new();
        InlineParser::new(&references).parse(text)
    }

    fn text(s: &str) -> Inline {
        Inline::Text(s.to_string())
    }

    #[test]
    fn test_plain_text_is_one_node() {
        assert_eq!(parse("just words"), vec![text("just words")]);
        assert_eq!(parse(""), Vec::<Inline>::new());
    }

    #[test]
    fn test_italic_skips_bold_markers() {
        assert_eq!(
            parse("*a **b** c*"),
            vec![Inline::Italic(vec![
                text("a "),
                Inline::Bold(vec![text("b")]),
                text(" c"),
            ])]
        );
    }

    #[test]
    fn test_unclosed_markers_run_to_end_of_span() {
        assert_eq!(parse("*foo"), vec![Inline::Italic(vec![text("foo")])]);
        assert_eq!(parse("foo**"), vec![text("foo"), Inline::Bold(vec![])]);
        assert_eq!(parse("~~gone"), vec![Inline::Strike(vec![text("gone")])]);
    }

    #[test]
    fn test_single_underscore_and_tilde_are_literal() {
        assert_eq!(parse("snake_case ~x"), vec![text("snake_case ~x")]);
    }

    #[test]
    fn test_marker_does_not_close_inside_link_text() {
        assert_eq!(
            parse("**a [b**](#c) d**"),
            vec![Inline::Bold(vec![
                text("a "),
                Inline::Link {
                    href: "#c".to_string(),
                    children: vec![text("b"), Inline::Bold(vec![])],
                },
                text(" d"),
            ])]
        );
    }

    #[test]
    fn test_marker_does_not_close_inside_code_span() {
        assert_eq!(
            parse("*a `*` b*"),
            vec![Inline::Italic(vec![
                text("a "),
                Inline::Code("*".to_string()),
                text(" b"),
            ])]
        );
    }

    #[test]
    fn test_code_span_needs_closer_and_content() {
        assert_eq!(parse("`foo"), vec![text("`foo")]);
        assert_eq!(parse("``"), vec![text("``")]);
        assert_eq!(
            parse("a `b` c"),
            vec![text("a "), Inline::Code("b".to_string()), text(" c")]
        );
    }

    #[test]
    fn test_image_inside_link() {
        assert_eq!(
            parse("[![](toc.png)](#toc)"),
            vec![Inline::Link {
                href: "#toc".to_string(),
                children: vec![Inline::Image {
                    src: "toc.png".to_string(),
                    alt: String::new(),
                }],
            }]
        );
    }

    #[test]
    fn test_unresolved_reference_is_literal() {
        assert_eq!(parse("see [nothing] here"), vec![text("see [nothing] here")]);
        assert_eq!(
            parse("[a **b**][]"),
            vec![text("[a "), Inline::Bold(vec![text("b")]), text("][]")]
        );
    }

    #[test]
    fn test_unresolved_brackets_keep_nested_links() {
        assert_eq!(
            parse("[see [x](y)] z"),
            vec![
                text("[see "),
                Inline::Link {
                    href: "y".to_string(),
                    children: vec![text("x")],
                },
                text("] z"),
            ]
        );
        assert_eq!(
            parse("[`code`]"),
            vec![text("["), Inline::Code("code".to_string()), text("]")]
        );
    }

    #[test]
    fn test_marker_closes_inside_unresolved_brackets() {
        assert_eq!(
            parse("*a [b* c]"),
            vec![Inline::Italic(vec![text("a [b")]), text(" c]")]
        );
    }

    #[test]
    fn test_reference_forms_resolve() {
        let mut references = ReferenceTable::new();
        references.insert("Home", "/home");
        let parser = InlineParser::new(&references);

        let link = |label: &str| Inline::Link {
            href: "/home".to_string(),
            children: vec![text(label)],
        };
        assert_eq!(parser.parse("[HOME]"), vec![link("HOME")]);
        assert_eq!(parser.parse("[home][]"), vec![link("home")]);
        assert_eq!(parser.parse("[go][Home]"), vec![link("go")]);
    }

    #[test]
    fn test_unmatched_bracket_is_literal() {
        assert_eq!(parse("[open"), vec![text("[open")]);
        assert_eq!(parse("!not an image"), vec![text("!not an image")]);
    }

    #[test]
    fn test_unclosed_targets_stay_literal() {
        assert_eq!(parse("[a](b"), vec![text("[a](b")]);
        assert_eq!(parse("![a](b"), vec![text("![a](b")]);
        assert_eq!(parse("![a] (b)"), vec![text("![a] (b)")]);
        assert_eq!(parse("[a][b"), vec![text("[a][b")]);
    }

    #[test]
    fn test_deep_link_nesting_does_not_overflow() {
        let input = "[".repeat(2_000) + "x" + &"](u)".repeat(2_000);
        let nodes = parse(&input);
        assert_eq!(nodes.len(), 1);
    }
}
