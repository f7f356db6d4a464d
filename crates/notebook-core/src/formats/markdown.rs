use super::{Format, HeadingNode, LinkNode, Node, ParseTree};
use pulldown_cmark::{Event, LinkType, Options, Parser, Tag, TagEnd};

/// Markdown pages with `[[href]]` / `[[href|text]]` wiki links.
///
/// Only wiki links and headings become structured nodes; everything else
/// is carried through as source text so that dumping an unchanged tree
/// gives back the original page.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownFormat;

impl Format for MarkdownFormat {
    fn parse(&self, text: &str) -> ParseTree {
        parse_markdown(text)
    }

    fn dump(&self, tree: &ParseTree) -> String {
        let mut out = String::new();
        for node in tree.nodes() {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Link(link) => {
                    out.push_str("[[");
                    out.push_str(&link.href);
                    if !link.text.is_empty() && link.text != link.href {
                        out.push('|');
                        out.push_str(&link.text);
                    }
                    out.push_str("]]");
                }
                Node::Heading(heading) => match &heading.source {
                    Some(source) => out.push_str(source),
                    None => {
                        out.push_str(&"#".repeat(heading.level.max(1) as usize));
                        out.push(' ');
                        out.push_str(&heading.text);
                    }
                },
            }
        }
        out
    }
}

struct Span {
    start: usize,
    end: usize,
    node: Node,
}

pub(crate) fn parse_markdown(text: &str) -> ParseTree {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_WIKILINKS);

    let parser = Parser::new_ext(text, options);

    let mut spans: Vec<Span> = Vec::new();
    // (start, end, level, collected text)
    let mut pending_heading: Option<(usize, usize, u8, String)> = None;

    for (event, range) in parser.into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                pending_heading = Some((range.start, range.end, level as u8, String::new()));
            }
            Event::Text(t) | Event::Code(t) => {
                if let Some((_, _, _, collected)) = pending_heading.as_mut() {
                    collected.push_str(&t);
                }
            }
            Event::End(TagEnd::Heading(..)) => {
                if let Some((start, end, level, collected)) = pending_heading.take() {
                    // Trailing newline stays with the following text
                    let end = start + text[start..end].trim_end().len();
                    spans.push(Span {
                        start,
                        end,
                        node: Node::Heading(HeadingNode {
                            level,
                            text: collected.trim().to_string(),
                            source: Some(text[start..end].to_string()),
                        }),
                    });
                }
            }
            Event::Start(Tag::Link {
                link_type: LinkType::WikiLink { .. },
                ..
            }) if pending_heading.is_none() => {
                if let Some((start, end)) = wikilink_bounds(text, range.start) {
                    let inner = &text[start + 2..end - 2];
                    let link = match inner.split_once('|') {
                        Some((href, label)) => LinkNode::with_text(href.trim(), label.trim()),
                        None => LinkNode::new(inner.trim()),
                    };
                    spans.push(Span {
                        start,
                        end,
                        node: Node::Link(link),
                    });
                }
            }
            _ => {}
        }
    }

    spans.sort_by_key(|span| span.start);

    let mut tree = ParseTree::default();
    let mut cursor = 0;
    for span in spans {
        if span.start < cursor {
            continue;
        }
        tree.push(Node::Text(text[cursor..span.start].to_string()));
        tree.push(span.node);
        cursor = span.end;
    }
    tree.push(Node::Text(text[cursor..].to_string()));
    tree
}

/// Byte range of the `[[...]]` around a wiki link event offset.
///
/// pulldown_cmark might report the range starting on the second `[` or
/// ending before the closing brackets, so look at the source itself.
fn wikilink_bounds(text: &str, offset: usize) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let start = if bytes.get(offset + 1) == Some(&b'[') {
        offset
    } else if offset > 0 && bytes.get(offset - 1) == Some(&b'[') {
        offset - 1
    } else {
        offset
    };

    if !text.get(start..)?.starts_with("[[") {
        return None;
    }
    let close = text[start + 2..].find("]]")?;
    Some((start, start + 2 + close + 2))
}
