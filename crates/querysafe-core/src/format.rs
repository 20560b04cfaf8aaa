//! Message formatting.
//!
//! Text is turned into lines of styled spans that any front end can draw.
//! Markdown is optional: without a formatter, or when formatting fails, the
//! text is kept exactly as written.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use crate::error::FormatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpanStyle {
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
    pub strikethrough: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledSpan {
    pub text: String,
    pub style: SpanStyle,
}

impl StyledSpan {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: SpanStyle::default(),
        }
    }
}

/// One display line. `prefix` holds list markers and their indentation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormattedLine {
    pub prefix: String,
    pub spans: Vec<StyledSpan>,
}

impl FormattedLine {
    pub fn text(&self) -> String {
        let mut out = self.prefix.clone();
        for span in &self.spans {
            out.push_str(&span.text);
        }
        out
    }

    fn is_empty(&self) -> bool {
        self.prefix.is_empty() && self.spans.iter().all(|s| s.text.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormattedText {
    pub lines: Vec<FormattedLine>,
}

impl FormattedText {
    /// The text as-is, one unstyled line per input line.
    pub fn literal(text: &str) -> Self {
        let lines = text
            .lines()
            .map(|line| FormattedLine {
                prefix: String::new(),
                spans: vec![StyledSpan::plain(line)],
            })
            .collect();
        Self { lines }
    }

    /// Flatten back to text, dropping styles.
    pub fn plain_text(&self) -> String {
        self.lines
            .iter()
            .map(FormattedLine::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub trait Formatter: Send + Sync {
    fn format(&self, text: &str) -> Result<FormattedText, FormatError>;
}

/// Format `text` with `formatter`, falling back to literal text.
pub fn render_text(formatter: Option<&dyn Formatter>, text: &str) -> FormattedText {
    let Some(formatter) = formatter else {
        return FormattedText::literal(text);
    };

    match formatter.format(text) {
        Ok(formatted) => formatted,
        Err(e) => {
            tracing::warn!(error = %e, "Markdown parsing failed, falling back to plain text");
            FormattedText::literal(text)
        }
    }
}

/// CommonMark with strikethrough, tables and task lists. Soft line breaks are
/// kept as line breaks.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format(&self, text: &str) -> Result<FormattedText, FormatError> {
        let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
        let mut builder = LineBuilder::default();
        for event in Parser::new_ext(text, options) {
            builder.push(event);
        }
        Ok(builder.finish())
    }
}

#[derive(Default)]
struct LineBuilder {
    lines: Vec<FormattedLine>,
    current: FormattedLine,
    bold: u32,
    italic: u32,
    strike: u32,
    // Next number for ordered lists, None for bullets
    lists: Vec<Option<u64>>,
    in_code_block: bool,
    link_dest: Option<String>,
    need_gap: bool,
}

impl LineBuilder {
    fn push(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if self.in_code_block {
                    self.push_code_block(&text);
                } else {
                    self.push_span(&text, self.style());
                }
            }
            Event::Code(code) => {
                let style = SpanStyle { code: true, ..self.style() };
                self.push_span(&code, style);
            }
            Event::Html(html) | Event::InlineHtml(html) => self.push_span(&html, self.style()),
            Event::InlineMath(math) | Event::DisplayMath(math) => {
                let style = SpanStyle { code: true, ..self.style() };
                self.push_span(&math, style);
            }
            Event::SoftBreak | Event::HardBreak => self.break_line(),
            Event::Rule => {
                self.block_gap();
                self.flush();
                self.current.spans.push(StyledSpan::plain("───"));
                self.flush();
                self.need_gap = true;
            }
            Event::TaskListMarker(checked) => {
                self.push_span(if checked { "[x] " } else { "[ ] " }, SpanStyle::default());
            }
            Event::FootnoteReference(name) => self.push_span(&format!("[{}]", name), self.style()),
            #[allow(unreachable_patterns)]
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph | Tag::BlockQuote(_) | Tag::HtmlBlock | Tag::Table(_) => self.block_gap(),
            Tag::Heading { .. } => {
                self.block_gap();
                self.bold += 1;
            }
            Tag::CodeBlock(_) => {
                self.block_gap();
                self.flush();
                self.in_code_block = true;
            }
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.block_gap();
                }
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}. ", n);
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.current.prefix = format!("{}{}", "  ".repeat(depth), marker);
            }
            Tag::Emphasis => self.italic += 1,
            Tag::Strong => self.bold += 1,
            Tag::Strikethrough => self.strike += 1,
            Tag::Link { dest_url, .. } => self.link_dest = Some(dest_url.to_string()),
            Tag::TableCell => {
                if !self.current.spans.is_empty() {
                    self.push_span(" | ", SpanStyle::default());
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph | TagEnd::BlockQuote(_) | TagEnd::HtmlBlock | TagEnd::Table => {
                self.flush();
                self.need_gap = true;
            }
            TagEnd::Heading(_) => {
                self.bold = self.bold.saturating_sub(1);
                self.flush();
                self.need_gap = true;
            }
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                self.flush();
                self.need_gap = true;
            }
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.need_gap = true;
                }
            }
            TagEnd::Item | TagEnd::TableHead | TagEnd::TableRow => self.flush(),
            TagEnd::Emphasis => self.italic = self.italic.saturating_sub(1),
            TagEnd::Strong => self.bold = self.bold.saturating_sub(1),
            TagEnd::Strikethrough => self.strike = self.strike.saturating_sub(1),
            TagEnd::Link => {
                if let Some(dest) = self.link_dest.take() {
                    let shown: String = self.current.spans.iter().map(|s| s.text.as_str()).collect();
                    if !shown.ends_with(&dest) {
                        self.push_span(&format!(" ({})", dest), SpanStyle::default());
                    }
                }
            }
            _ => {}
        }
    }

    fn style(&self) -> SpanStyle {
        SpanStyle {
            bold: self.bold > 0,
            italic: self.italic > 0,
            code: false,
            strikethrough: self.strike > 0,
        }
    }

    fn push_span(&mut self, text: &str, style: SpanStyle) {
        if text.is_empty() {
            return;
        }
        // Merge with the previous span when nothing changed
        if let Some(last) = self.current.spans.last_mut() {
            if last.style == style {
                last.text.push_str(text);
                return;
            }
        }
        self.current.spans.push(StyledSpan {
            text: text.to_string(),
            style,
        });
    }

    fn push_code_block(&mut self, text: &str) {
        let style = SpanStyle { code: true, ..SpanStyle::default() };
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                self.flush_keep_empty();
            }
            self.push_span(line, style);
        }
    }

    /// Continue on a new line, indented to line up with a list item's text.
    fn break_line(&mut self) {
        let indent = " ".repeat(self.current.prefix.chars().count());
        self.flush_keep_empty();
        self.current.prefix = indent;
    }

    fn block_gap(&mut self) {
        if self.need_gap && self.lists.is_empty() {
            self.flush();
            self.lines.push(FormattedLine::default());
        }
        self.need_gap = false;
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.lines.push(std::mem::take(&mut self.current));
        } else {
            self.current = FormattedLine::default();
        }
    }

    fn flush_keep_empty(&mut self) {
        self.lines.push(std::mem::take(&mut self.current));
    }

    fn finish(mut self) -> FormattedText {
        self.flush();
        while self.lines.last().is_some_and(FormattedLine::is_empty) {
            self.lines.pop();
        }
        FormattedText { lines: self.lines }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenFormatter;

    impl Formatter for BrokenFormatter {
        fn format(&self, _text: &str) -> Result<FormattedText, FormatError> {
            Err(FormatError::Failed("boom".to_string()))
        }
    }

    fn markdown(text: &str) -> FormattedText {
        MarkdownFormatter.format(text).unwrap()
    }

    #[test]
    fn test_literal_keeps_markup() {
        let text = FormattedText::literal("**not bold**\n<b>x</b>");
        assert_eq!(text.lines.len(), 2);
        assert_eq!(text.plain_text(), "**not bold**\n<b>x</b>");
        assert!(text.lines[0].spans.iter().all(|s| s.style == SpanStyle::default()));
    }

    #[test]
    fn test_emphasis_and_strong() {
        let text = markdown("Say **hello** to *you*");
        assert_eq!(text.lines.len(), 1);
        let spans = &text.lines[0].spans;
        assert_eq!(spans[0], StyledSpan::plain("Say "));
        assert_eq!(spans[1].text, "hello");
        assert!(spans[1].style.bold);
        assert_eq!(spans[3].text, "you");
        assert!(spans[3].style.italic);
    }

    #[test]
    fn test_paragraphs_are_separated_by_blank_line() {
        let text = markdown("First\n\nSecond");
        assert_eq!(text.plain_text(), "First\n\nSecond");
    }

    #[test]
    fn test_soft_break_is_kept() {
        let text = markdown("line one\nline two");
        assert_eq!(text.plain_text(), "line one\nline two");
    }

    #[test]
    fn test_lists() {
        let text = markdown("Steps:\n\n1. open\n2. close\n\n- a\n- b");
        assert_eq!(text.plain_text(), "Steps:\n\n1. open\n2. close\n\n• a\n• b");
    }

    #[test]
    fn test_nested_list_is_indented() {
        let text = markdown("- outer\n  - inner");
        assert_eq!(text.plain_text(), "• outer\n  • inner");
    }

    #[test]
    fn test_inline_code() {
        let text = markdown("run `cargo`");
        let code = &text.lines[0].spans[1];
        assert_eq!(code.text, "cargo");
        assert!(code.style.code);
    }

    #[test]
    fn test_render_without_formatter_is_literal() {
        let text = render_text(None, "**x**");
        assert_eq!(text.plain_text(), "**x**");
    }

    #[test]
    fn test_render_falls_back_when_formatter_fails() {
        let text = render_text(Some(&BrokenFormatter), "*still shown*");
        assert_eq!(text, FormattedText::literal("*still shown*"));
    }
}
