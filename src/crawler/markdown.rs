//! HTML to markdown extraction
//!
//! Walks the parsed document and emits markdown blocks:
//! - headings, paragraphs, list items, block quotes and code blocks
//! - inline links as `[text](href)`
//! - excluded tags (scripts, navigation, ...) dropped with their subtree
//!
//! The "fit" document keeps only the blocks that look like body text: enough
//! words, and not dominated by link text.

use scraper::{ElementRef, Html, Node, Selector};

/// Extraction settings
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub excluded_tags: Vec<String>,
    pub pruning_threshold: f64,
    pub min_word_threshold: usize,
}

/// Raw and pruned markdown for one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkdownDocument {
    pub title: Option<String>,
    pub raw: String,
    pub fit: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BlockKind {
    Heading(u8),
    Paragraph,
    ListItem,
    Quote,
    Code,
}

#[derive(Debug, Clone)]
struct Block {
    kind: BlockKind,
    markdown: String,
    words: usize,
    text_chars: usize,
    link_chars: usize,
}

impl Block {
    fn render(&self) -> String {
        match self.kind {
            BlockKind::Heading(level) => {
                format!("{} {}", "#".repeat(level as usize), self.markdown)
            }
            BlockKind::Paragraph => self.markdown.clone(),
            BlockKind::ListItem => format!("- {}", self.markdown),
            BlockKind::Quote => format!("> {}", self.markdown),
            BlockKind::Code => format!("```\n{}\n```", self.markdown),
        }
    }

    /// Share of visible characters that are not link text
    fn text_ratio(&self) -> f64 {
        if self.text_chars == 0 {
            return 0.0;
        }
        1.0 - (self.link_chars as f64 / self.text_chars as f64)
    }
}

/// Inline text being accumulated for the current block
#[derive(Default)]
struct Inline {
    markdown: String,
    plain: String,
    link_chars: usize,
}

struct Walker<'a> {
    excluded: &'a [String],
    blocks: Vec<Block>,
    inline: Inline,
}

impl<'a> Walker<'a> {
    fn new(excluded: &'a [String]) -> Self {
        Self {
            excluded,
            blocks: Vec::new(),
            inline: Inline::default(),
        }
    }

    fn is_excluded(&self, tag: &str) -> bool {
        self.excluded.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    fn flush(&mut self, kind: BlockKind) {
        let inline = std::mem::take(&mut self.inline);
        let markdown = collapse(&inline.markdown);
        if markdown.is_empty() {
            return;
        }
        let plain = collapse(&inline.plain);
        self.blocks.push(Block {
            kind,
            words: plain.split_whitespace().count(),
            text_chars: plain.chars().count(),
            link_chars: inline.link_chars.min(plain.chars().count()),
            markdown,
        });
    }

    fn visit_children(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => {
                    self.inline.markdown.push_str(text);
                    self.inline.plain.push_str(text);
                }
                Node::Element(_) => {
                    if let Some(child_ref) = ElementRef::wrap(child) {
                        self.visit_element(child_ref);
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_element(&mut self, element: ElementRef<'_>) {
        let tag = element.value().name();
        if self.is_excluded(tag) {
            return;
        }

        match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag[1..].parse::<u8>().unwrap_or(1);
                self.flush(BlockKind::Paragraph);
                self.visit_children(element);
                self.flush(BlockKind::Heading(level));
            }
            "li" | "dt" | "dd" => {
                self.flush(BlockKind::Paragraph);
                self.visit_children(element);
                self.flush(BlockKind::ListItem);
            }
            "blockquote" => {
                self.flush(BlockKind::Paragraph);
                self.visit_children(element);
                self.flush(BlockKind::Quote);
            }
            "pre" => {
                self.flush(BlockKind::Paragraph);
                let code: String = element.text().collect();
                let code = code.trim_matches('\n').to_string();
                if !code.trim().is_empty() {
                    let words = code.split_whitespace().count();
                    let chars = code.chars().count();
                    self.blocks.push(Block {
                        kind: BlockKind::Code,
                        markdown: code,
                        words,
                        text_chars: chars,
                        link_chars: 0,
                    });
                }
            }
            "a" => {
                let text = collapse(&element.text().collect::<String>());
                if text.is_empty() {
                    return;
                }
                match element.value().attr("href").map(str::trim) {
                    Some(href)
                        if !href.is_empty()
                            && !href.starts_with('#')
                            && !href.to_ascii_lowercase().starts_with("javascript:") =>
                    {
                        self.inline
                            .markdown
                            .push_str(&format!(" [{}]({}) ", text, href));
                        self.inline.link_chars += text.chars().count();
                    }
                    _ => self.inline.markdown.push_str(&format!(" {} ", text)),
                }
                self.inline.plain.push_str(&format!(" {} ", text));
            }
            "br" => {
                self.inline.markdown.push(' ');
                self.inline.plain.push(' ');
            }
            "img" | "svg" | "video" | "audio" | "canvas" | "picture" => {}
            "p" | "div" | "section" | "article" | "main" | "table" | "tr" | "td" | "th"
            | "ul" | "ol" | "dl" | "figure" | "figcaption" | "hr" | "details" | "summary" => {
                self.flush(BlockKind::Paragraph);
                self.visit_children(element);
                self.flush(BlockKind::Paragraph);
            }
            _ => self.visit_children(element),
        }
    }
}

/// Converts an HTML document to raw and fit markdown
///
/// # Arguments
///
/// * `html` - The HTML content to convert
/// * `options` - Excluded tags and pruning thresholds
///
/// # Example
///
/// ```
/// use deep_research::crawler::{html_to_markdown, ExtractOptions};
///
/// let options = ExtractOptions {
///     excluded_tags: vec!["nav".to_string()],
///     pruning_threshold: 0.48,
///     min_word_threshold: 1,
/// };
/// let doc = html_to_markdown("<h1>Hi</h1><p>Some text</p><nav>menu</nav>", &options);
/// assert_eq!(doc.raw, "# Hi\n\nSome text");
/// ```
pub fn html_to_markdown(html: &str, options: &ExtractOptions) -> MarkdownDocument {
    let document = Html::parse_document(html);
    let title = extract_title(&document);

    let mut walker = Walker::new(&options.excluded_tags);
    let body = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next());
    match body {
        Some(body) => walker.visit_children(body),
        None => walker.visit_children(document.root_element()),
    }
    walker.flush(BlockKind::Paragraph);

    let raw = walker
        .blocks
        .iter()
        .map(Block::render)
        .collect::<Vec<_>>()
        .join("\n\n");
    let fit = prune(&walker.blocks, options)
        .iter()
        .map(|b| b.render())
        .collect::<Vec<_>>()
        .join("\n\n");

    MarkdownDocument { title, raw, fit }
}

/// Keeps body-text blocks and the headings that introduce them
fn prune<'b>(blocks: &'b [Block], options: &ExtractOptions) -> Vec<&'b Block> {
    let mut kept = Vec::new();
    let mut pending_headings: Vec<&Block> = Vec::new();

    for block in blocks {
        if let BlockKind::Heading(level) = block.kind {
            pending_headings.retain(|h| matches!(h.kind, BlockKind::Heading(l) if l < level));
            pending_headings.push(block);
            continue;
        }

        let enough_words = block.words >= options.min_word_threshold;
        let keep = match block.kind {
            BlockKind::Code => enough_words,
            _ => enough_words && block.text_ratio() >= options.pruning_threshold,
        };

        if keep {
            kept.append(&mut pending_headings);
            kept.push(block);
        }
    }

    kept
}

fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|element| collapse(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
