//! Markdown to ratatui text conversion.
//!
//! Answers are split into paragraph blocks first and each block is rendered on
//! its own, so a long streaming answer only re-parses small pieces. Fenced code
//! is highlighted with syntect.

use optimus_core::split_paragraphs;
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

const THEME: &str = "base16-ocean.dark";
const FENCE: &str = "```";

/// Renders markdown answers. Syntax definitions are loaded once.
pub struct MarkdownRenderer {
    syntax_set: SyntaxSet,
    theme: Theme,
}

impl MarkdownRenderer {
    /// Load syntaxes and the highlighting theme.
    pub fn new() -> Self {
        let mut themes = ThemeSet::load_defaults();
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme: themes.themes.remove(THEME).unwrap_or_default(),
        }
    }

    /// Render `text` into lines no wider than `width` where it matters (code).
    pub fn render(&self, text: &str, width: usize) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        for block in markdown_blocks(text) {
            if !lines.is_empty() {
                lines.push(Line::default());
            }
            lines.extend(BlockWriter::new(self, width).write(&block));
        }
        lines
    }

    fn highlight(&self, code: &str, lang: &str) -> Vec<Vec<Span<'static>>> {
        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());
        let mut highlighter = HighlightLines::new(syntax, &self.theme);

        LinesWithEndings::from(code)
            .map(|line| {
                let text = line.trim_end_matches(['\n', '\r']);
                match highlighter.highlight_line(line, &self.syntax_set) {
                    Ok(ranges) => ranges
                        .into_iter()
                        .filter_map(|(style, piece)| {
                            let piece = piece.trim_end_matches(['\n', '\r']);
                            (!piece.is_empty())
                                .then(|| Span::styled(piece.to_string(), convert_style(style)))
                        })
                        .collect(),
                    Err(_) => vec![Span::styled(
                        text.to_string(),
                        Style::default().fg(Color::Yellow),
                    )],
                }
            })
            .collect()
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn convert_style(style: syntect::highlighting::Style) -> Style {
    let fg = style.foreground;
    let mut out = Style::default().fg(Color::Rgb(fg.r, fg.g, fg.b));
    if style.font_style.contains(FontStyle::BOLD) {
        out = out.add_modifier(Modifier::BOLD);
    }
    if style.font_style.contains(FontStyle::ITALIC) {
        out = out.add_modifier(Modifier::ITALIC);
    }
    if style.font_style.contains(FontStyle::UNDERLINE) {
        out = out.add_modifier(Modifier::UNDERLINED);
    }
    out
}

/// Paragraph blocks of `text`. Fenced code is cut out of the source verbatim,
/// so blank lines and indentation inside it survive; the prose around it goes
/// through `split_paragraphs`.
pub fn markdown_blocks(text: &str) -> Vec<String> {
    let mut blocks: Vec<String> = Vec::new();
    let mut prose = String::new();
    let mut fenced: Option<String> = None;

    for line in text.lines() {
        let is_fence = line.trim_start().starts_with(FENCE);
        if let Some(code) = fenced.as_mut() {
            code.push('\n');
            code.push_str(line);
            if is_fence {
                blocks.extend(fenced.take());
            }
        } else if is_fence {
            blocks.extend(split_paragraphs(&prose).into_iter().map(str::to_string));
            prose.clear();
            fenced = Some(line.to_string());
        } else {
            prose.push_str(line);
            prose.push('\n');
        }
    }

    blocks.extend(split_paragraphs(&prose).into_iter().map(str::to_string));
    // A fence still open while the answer streams in.
    blocks.extend(fenced);
    blocks
}

/// Renders one block.
struct BlockWriter<'a> {
    renderer: &'a MarkdownRenderer,
    width: usize,
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    styles: Vec<Style>,
    code: Option<(String, String)>,
    lists: Vec<Option<u64>>,
}

impl<'a> BlockWriter<'a> {
    fn new(renderer: &'a MarkdownRenderer, width: usize) -> Self {
        Self {
            renderer,
            width,
            lines: Vec::new(),
            spans: Vec::new(),
            styles: vec![Style::default()],
            code: None,
            lists: Vec::new(),
        }
    }

    fn write(mut self, block: &str) -> Vec<Line<'static>> {
        let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
        for event in Parser::new_ext(block, options) {
            match event {
                Event::Start(tag) => self.start(tag),
                Event::End(tag) => self.end(tag),
                Event::Text(text) => self.text(&text),
                Event::Code(code) => self.spans.push(Span::styled(
                    format!("`{code}`"),
                    Style::default().fg(Color::Yellow).bg(Color::Rgb(40, 40, 40)),
                )),
                Event::SoftBreak | Event::HardBreak => self.flush(),
                Event::Rule => {
                    self.flush();
                    self.lines.push(Line::styled(
                        "─".repeat(self.width.min(60)),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
                _ => {}
            }
        }
        self.flush();
        while self.lines.last().is_some_and(|l| l.spans.is_empty()) {
            self.lines.pop();
        }
        self.lines
    }

    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, f: impl FnOnce(Style) -> Style) {
        let style = f(self.style());
        self.styles.push(style);
    }

    fn pop_style(&mut self) {
        if self.styles.len() > 1 {
            self.styles.pop();
        }
    }

    fn flush(&mut self) {
        if !self.spans.is_empty() {
            self.lines.push(Line::from(std::mem::take(&mut self.spans)));
        }
    }

    fn text(&mut self, text: &str) {
        if let Some((_, content)) = self.code.as_mut() {
            content.push_str(text);
            return;
        }
        let style = self.style();
        for (i, part) in text.split('\n').enumerate() {
            if i > 0 {
                self.flush();
            }
            if !part.is_empty() {
                self.spans.push(Span::styled(part.to_string(), style));
            }
        }
    }

    fn start(&mut self, tag: Tag) {
        match tag {
            Tag::Heading { level, .. } => {
                let marker = match level {
                    HeadingLevel::H1 => "# ",
                    HeadingLevel::H2 => "## ",
                    _ => "### ",
                };
                let style = Style::default().fg(Color::Magenta);
                self.spans.push(Span::styled(marker, style));
                self.push_style(|_| style.add_modifier(Modifier::BOLD));
            }
            Tag::BlockQuote(_) => {
                self.flush();
                self.spans
                    .push(Span::styled("│ ", Style::default().fg(Color::Blue)));
                self.push_style(|s| s.fg(Color::Blue));
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => {
                        info.split_whitespace().next().unwrap_or_default().to_string()
                    }
                    CodeBlockKind::Indented => String::new(),
                };
                self.code = Some((lang, String::new()));
            }
            Tag::List(first) => {
                self.flush();
                self.lists.push(first);
            }
            Tag::Item => {
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let bullet = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let bullet = format!("{indent}{n}. ");
                        *n += 1;
                        bullet
                    }
                    _ => format!("{indent}• "),
                };
                self.spans
                    .push(Span::styled(bullet, Style::default().fg(Color::Cyan)));
            }
            Tag::Emphasis => self.push_style(|s| s.add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(|s| s.add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => self.push_style(|s| s.add_modifier(Modifier::CROSSED_OUT)),
            Tag::Link { .. } => {
                self.push_style(|s| s.fg(Color::Blue).add_modifier(Modifier::UNDERLINED));
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) | TagEnd::BlockQuote(_) => {
                self.pop_style();
                self.flush();
            }
            TagEnd::Paragraph | TagEnd::Item => self.flush(),
            TagEnd::CodeBlock => {
                if let Some((lang, content)) = self.code.take() {
                    self.code_block(&lang, &content);
                }
            }
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link => {
                self.pop_style();
            }
            _ => {}
        }
    }

    fn code_block(&mut self, lang: &str, content: &str) {
        let gutter = Style::default().fg(Color::DarkGray);
        let rule = "─".repeat(self.width.saturating_sub(lang.len() + 4).min(40));
        self.lines.push(Line::from(vec![
            Span::styled("┌─ ", gutter),
            Span::styled(
                lang.to_string(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!(" {rule}"), gutter),
        ]));

        // Code is truncated, not wrapped, so the gutter stays aligned.
        let max = self.width.saturating_sub(3);
        for spans in self.renderer.highlight(content, lang) {
            let mut line = vec![Span::styled("│ ", gutter)];
            line.extend(truncate_spans(spans, max));
            self.lines.push(Line::from(line));
        }
        self.lines.push(Line::styled(
            format!("└{}", "─".repeat(self.width.saturating_sub(2).min(44))),
            gutter,
        ));
    }
}

/// Cut a highlighted line to at most `max` characters, marking the cut.
fn truncate_spans(spans: Vec<Span<'static>>, max: usize) -> Vec<Span<'static>> {
    let total: usize = spans.iter().map(|s| s.content.chars().count()).sum();
    if total <= max {
        return spans;
    }

    let mut remaining = max.saturating_sub(1);
    let mut out = Vec::new();
    for span in spans {
        if remaining == 0 {
            break;
        }
        let len = span.content.chars().count();
        if len <= remaining {
            remaining -= len;
            out.push(span);
        } else {
            let cut: String = span.content.chars().take(remaining).collect();
            out.push(Span::styled(cut, span.style));
            remaining = 0;
        }
    }
    out.push(Span::styled("…", Style::default().fg(Color::DarkGray)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn paragraphs_are_separated_by_one_blank_line() {
        let renderer = MarkdownRenderer::new();
        let lines = renderer.render("First.\n\n\n\nSecond **bold**.", 80);
        assert_eq!(plain(&lines), vec!["First.", "", "Second bold."]);
    }

    #[test]
    fn fenced_code_with_blank_lines_stays_together() {
        let text = "Run this:\n\n```sh\necho one\n\necho two\n```\n\nDone.";
        let blocks = markdown_blocks(text);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1], "```sh\necho one\n\necho two\n```");
    }

    #[test]
    fn fenced_code_keeps_indentation_after_blank_lines() {
        let text = "```python\ndef f():\n    x = 1\n\n    return x\n```";
        let blocks = markdown_blocks(text);
        assert_eq!(blocks, vec![text.to_string()]);

        let renderer = MarkdownRenderer::new();
        let lines = plain(&renderer.render(text, 80));
        assert!(lines.contains(&"│     return x".to_string()));
    }

    #[test]
    fn unterminated_fence_is_kept_as_last_block() {
        let blocks = markdown_blocks("Intro.\n\n```rust\nlet a = 1;\n\n");
        assert_eq!(blocks, vec!["Intro.".to_string(), "```rust\nlet a = 1;\n".to_string()]);
    }

    #[test]
    fn code_block_is_framed_and_highlighted() {
        let renderer = MarkdownRenderer::new();
        let lines = renderer.render("```rust\nfn main() {}\n```", 80);
        let text = plain(&lines);
        assert!(text[0].starts_with("┌─ rust"));
        assert_eq!(text[1], "│ fn main() {}");
        assert!(text[2].starts_with('└'));
    }

    #[test]
    fn long_code_lines_are_truncated() {
        let renderer = MarkdownRenderer::new();
        let code = format!("```\n{}\n```", "x".repeat(100));
        let lines = renderer.render(&code, 20);
        let body = &plain(&lines)[1];
        assert!(body.ends_with('…'));
        assert_eq!(body.chars().count(), 2 + 17);
    }

    #[test]
    fn lists_get_bullets_and_numbers() {
        let renderer = MarkdownRenderer::new();
        let lines = renderer.render("- a\n- b\n\n1. one\n2. two", 80);
        assert_eq!(plain(&lines), vec!["• a", "• b", "", "1. one", "2. two"]);
    }

    #[test]
    fn heading_keeps_marker() {
        let renderer = MarkdownRenderer::new();
        let lines = renderer.render("## Order status", 80);
        assert_eq!(plain(&lines), vec!["## Order status"]);
    }
}
