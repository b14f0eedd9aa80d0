//! Markdown pipeline: CommonMark events laid out as styled lines.
//!
//! Headings, emphasis, lists, code blocks, tables and rules get distinct
//! styling; links and images keep their text only. Raw HTML is shown
//! verbatim in the monospaced face.

use std::path::Path;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

use crate::code_to_pdf::{
    lines_to_pdf, read_text, sanitize, title_for, Face, PageLayout, StyledLine, StyledSpan,
};
use crate::contract::RenderError;

const BODY_SIZE: f32 = 10.0;
const HEADING_SIZES: [f32; 6] = [20.0, 16.0, 14.0, 12.0, 11.0, 10.0];
const INLINE_CODE_COLOR: [u8; 3] = [150, 30, 30];
const RULE_COLOR: [u8; 3] = [160, 160, 160];

#[derive(Default)]
struct MarkdownLayout {
    lines: Vec<StyledLine>,
    current: Option<StyledLine>,
    heading: Option<usize>,
    strong: usize,
    emphasis: usize,
    in_code_block: bool,
    lists: Vec<Option<u64>>,
}

impl MarkdownLayout {
    fn size(&self) -> f32 {
        match self.heading {
            Some(level) => HEADING_SIZES[(level.clamp(1, 6)) - 1],
            None => BODY_SIZE,
        }
    }

    fn face(&self) -> Face {
        if self.in_code_block {
            return Face::Mono;
        }
        match (self.heading.is_some() || self.strong > 0, self.emphasis > 0) {
            (true, true) => Face::SansBoldItalic,
            (true, false) => Face::SansBold,
            (false, true) => Face::SansItalic,
            (false, false) => Face::Sans,
        }
    }

    fn line(&mut self) -> &mut StyledLine {
        let size = self.size();
        let wrap_words = !self.in_code_block;
        self.current.get_or_insert_with(|| {
            let mut line = StyledLine::new(size);
            line.wrap_words = wrap_words;
            line
        })
    }

    fn push_text(&mut self, text: &str, face: Face, color: [u8; 3]) {
        let text = sanitize(text);
        if !text.is_empty() {
            self.line().push(StyledSpan::new(text, face).with_color(color));
        }
    }

    fn flush(&mut self) {
        if let Some(line) = self.current.take() {
            if !line.is_empty() {
                self.lines.push(line);
            }
        }
    }

    fn block_break(&mut self) {
        self.flush();
        let ends_blank = self.lines.last().map_or(true, StyledLine::is_empty);
        if !ends_blank {
            self.lines.push(StyledLine::blank(BODY_SIZE));
        }
    }

    fn start_item(&mut self) {
        self.flush();
        let depth = self.lists.len().saturating_sub(1);
        let marker = match self.lists.last_mut() {
            Some(Some(n)) => {
                let marker = format!("{n}. ");
                *n += 1;
                marker
            }
            _ => "- ".to_string(),
        };
        let prefix = format!("{}{}", "  ".repeat(depth), marker);
        let hang = prefix.chars().count();
        let line = self.line();
        line.hang = hang;
        line.push(StyledSpan::new(prefix, Face::Sans));
    }

    fn code_text(&mut self, text: &str) {
        for piece in text.split_inclusive('\n') {
            let body = piece.trim_end_matches('\n');
            self.push_text(body, Face::Mono, [0, 0, 0]);
            if piece.ends_with('\n') {
                // Keep empty lines inside code blocks.
                let line = self.current.take().unwrap_or_else(|| StyledLine::new(BODY_SIZE));
                if line.is_empty() {
                    self.lines.push(StyledLine::blank(BODY_SIZE));
                } else {
                    self.lines.push(line);
                }
            }
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                self.block_break();
                self.heading = Some(level as usize);
            }
            Event::End(TagEnd::Heading(_)) => {
                self.flush();
                self.heading = None;
                self.block_break();
            }
            Event::End(TagEnd::Paragraph) => {
                if self.lists.is_empty() {
                    self.block_break();
                } else {
                    self.flush();
                }
            }
            Event::Start(Tag::CodeBlock(_)) => {
                self.block_break();
                self.in_code_block = true;
            }
            Event::End(TagEnd::CodeBlock) => {
                self.flush();
                self.in_code_block = false;
                self.block_break();
            }
            Event::Start(Tag::List(start)) => {
                self.flush();
                self.lists.push(start);
            }
            Event::End(TagEnd::List(_)) => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.block_break();
                }
            }
            Event::Start(Tag::Item) => self.start_item(),
            Event::End(TagEnd::Item) => self.flush(),
            Event::Start(Tag::Emphasis) => self.emphasis += 1,
            Event::End(TagEnd::Emphasis) => self.emphasis = self.emphasis.saturating_sub(1),
            Event::Start(Tag::Strong) => self.strong += 1,
            Event::End(TagEnd::Strong) => self.strong = self.strong.saturating_sub(1),
            Event::End(TagEnd::TableCell) => self.push_text(" | ", Face::Sans, RULE_COLOR),
            Event::End(TagEnd::TableHead) | Event::End(TagEnd::TableRow) => self.flush(),
            Event::Text(text) => {
                if self.in_code_block {
                    self.code_text(&text);
                } else {
                    let face = self.face();
                    self.push_text(&text, face, [0, 0, 0]);
                }
            }
            Event::Code(code) => self.push_text(&code, Face::Mono, INLINE_CODE_COLOR),
            Event::Html(html) => self.code_text(&html),
            Event::InlineHtml(html) => self.push_text(&html, Face::Mono, [0, 0, 0]),
            Event::SoftBreak => {
                let face = self.face();
                self.push_text(" ", face, [0, 0, 0]);
            }
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.block_break();
                self.push_text(&"_".repeat(60), Face::Sans, RULE_COLOR);
                self.block_break();
            }
            Event::TaskListMarker(done) => {
                let marker = if done { "[x] " } else { "[ ] " };
                self.push_text(marker, Face::Mono, [0, 0, 0]);
            }
            _ => {}
        }
    }
}

/// Parse `text` and lay it out as lines ready for [`lines_to_pdf`].
pub fn markdown_to_lines(text: &str) -> Vec<StyledLine> {
    let options =
        Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let mut layout = MarkdownLayout::default();
    for event in Parser::new_ext(text, options) {
        layout.event(event);
    }
    layout.flush();
    while layout.lines.last().is_some_and(StyledLine::is_empty) {
        layout.lines.pop();
    }
    layout.lines
}

/// Markdown pipeline entry point.
pub fn render_markdown(path: &Path, layout: &PageLayout) -> Result<Vec<u8>, RenderError> {
    let text = read_text(path)?;
    Ok(lines_to_pdf(&title_for(path), markdown_to_lines(&text), layout))
}
