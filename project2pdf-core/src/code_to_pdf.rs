//! In-process PDF writer used by the built-in renderer.
//!
//! Text is laid out as a list of [`StyledLine`]s, wrapped to the page width
//! and paginated onto A4 pages with the PDF builtin fonts, so no font files
//! are needed. The builtin fonts only cover plain ASCII reliably; other
//! characters are written as `?`.
//!
//! [`SourceHighlighter`] turns source code into styled lines with `syntect`,
//! resolving the syntax by file name first, then by the first line of
//! content, and falling back to plain text.

use std::path::Path;

use printpdf::{
    BuiltinFont, Color, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, Point, Pt, Rgb, TextItem,
};
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;
use tracing::{debug, warn};

use crate::contract::RenderError;

pub const DEFAULT_THEME: &str = "InspiredGitHub";
const TAB_WIDTH: usize = 4;
const LINE_NUMBER_COLOR: [u8; 3] = [140, 140, 140];
const PAGE_NUMBER_SIZE: f32 = 8.0;

/// Builtin typefaces used by the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    Mono,
    MonoBold,
    MonoItalic,
    Sans,
    SansBold,
    SansItalic,
    SansBoldItalic,
}

impl Face {
    fn builtin(self) -> BuiltinFont {
        match self {
            Face::Mono => BuiltinFont::Courier,
            Face::MonoBold => BuiltinFont::CourierBold,
            Face::MonoItalic => BuiltinFont::CourierOblique,
            Face::Sans => BuiltinFont::Helvetica,
            Face::SansBold => BuiltinFont::HelveticaBold,
            Face::SansItalic => BuiltinFont::HelveticaOblique,
            Face::SansBoldItalic => BuiltinFont::HelveticaBoldOblique,
        }
    }

    /// Approximate advance of one character, as a fraction of the font size.
    /// Exact for Courier, a safe upper bound for average Helvetica text.
    fn char_width(self) -> f32 {
        match self {
            Face::Mono | Face::MonoBold | Face::MonoItalic => 0.6,
            _ => 0.56,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyledSpan {
    pub text: String,
    pub face: Face,
    pub color: [u8; 3],
}

impl StyledSpan {
    pub fn new(text: impl Into<String>, face: Face) -> Self {
        Self {
            text: text.into(),
            face,
            color: [0, 0, 0],
        }
    }

    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = color;
        self
    }
}

/// One visual line before wrapping.
#[derive(Debug, Clone, PartialEq)]
pub struct StyledLine {
    pub spans: Vec<StyledSpan>,
    /// Font size in points.
    pub size: f32,
    /// Spaces inserted at the start of each continuation line.
    pub hang: usize,
    /// Break long lines at spaces rather than anywhere.
    pub wrap_words: bool,
}

impl StyledLine {
    pub fn new(size: f32) -> Self {
        Self {
            spans: Vec::new(),
            size,
            hang: 0,
            wrap_words: false,
        }
    }

    pub fn blank(size: f32) -> Self {
        Self::new(size)
    }

    pub fn push(&mut self, span: StyledSpan) {
        if !span.text.is_empty() {
            self.spans.push(span);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.spans.iter().all(|s| s.text.is_empty())
    }

    fn width(&self) -> f32 {
        self.spans
            .iter()
            .map(|s| s.text.chars().count() as f32 * s.face.char_width() * self.size)
            .sum()
    }

    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Page geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub width: Mm,
    pub height: Mm,
    pub margin: Mm,
    /// Line height as a multiple of the font size.
    pub line_spacing: f32,
    pub code_size: f32,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            width: Mm(210.0),
            height: Mm(297.0),
            margin: Mm(12.0),
            line_spacing: 1.25,
            code_size: 8.0,
        }
    }
}

impl PageLayout {
    fn text_width(&self) -> f32 {
        pt(self.width) - 2.0 * pt(self.margin)
    }
}

fn pt(mm: Mm) -> f32 {
    let converted: Pt = mm.into();
    converted.0
}

/// Replace what the builtin fonts cannot show and expand tabs.
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\t' => {
                let col = out.chars().count();
                let pad = TAB_WIDTH - col % TAB_WIDTH;
                out.extend(std::iter::repeat(' ').take(pad));
            }
            '\r' | '\n' => {}
            c if c == ' ' || c.is_ascii_graphic() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

/// Split `line` so that no piece is wider than `max_width` points.
pub fn wrap_line(line: StyledLine, max_width: f32) -> Vec<StyledLine> {
    if line.width() <= max_width {
        return vec![line];
    }

    let continuation = || {
        let mut next = StyledLine::new(line.size);
        next.hang = line.hang;
        next.wrap_words = line.wrap_words;
        if line.hang > 0 {
            let face = line.spans.first().map(|s| s.face).unwrap_or(Face::Mono);
            next.push(StyledSpan::new(" ".repeat(line.hang), face));
        }
        next
    };

    let mut out = Vec::new();
    let mut current = StyledLine {
        spans: Vec::new(),
        ..line.clone()
    };
    let mut width = 0.0;

    for span in &line.spans {
        let advance = span.face.char_width() * line.size;
        let tokens: Vec<&str> = if line.wrap_words {
            span.text.split_inclusive(' ').collect()
        } else {
            span.text
                .char_indices()
                .map(|(i, c)| &span.text[i..i + c.len_utf8()])
                .collect()
        };
        for token in tokens {
            let token_width = token.chars().count() as f32 * advance;
            if width + token_width > max_width && !current.is_empty() {
                out.push(std::mem::replace(&mut current, continuation()));
                width = current.width();
            }
            if width + token_width > max_width {
                // A single token wider than the line: break it anywhere.
                for c in token.chars() {
                    if width + advance > max_width && !current.is_empty() {
                        out.push(std::mem::replace(&mut current, continuation()));
                        width = current.width();
                    }
                    append(&mut current, span, &c.to_string());
                    width += advance;
                }
            } else {
                append(&mut current, span, token);
                width += token_width;
            }
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn append(line: &mut StyledLine, like: &StyledSpan, text: &str) {
    match line.spans.last_mut() {
        Some(last) if last.face == like.face && last.color == like.color => {
            last.text.push_str(text)
        }
        _ => line.push(StyledSpan {
            text: text.to_string(),
            face: like.face,
            color: like.color,
        }),
    }
}

/// Lay `lines` out on pages and serialize the document.
pub fn lines_to_pdf(title: &str, lines: Vec<StyledLine>, layout: &PageLayout) -> Vec<u8> {
    let left = pt(layout.margin);
    let top = pt(layout.height) - pt(layout.margin);
    let bottom = pt(layout.margin);
    let max_width = layout.text_width();

    let mut pages: Vec<Vec<Op>> = Vec::new();
    let mut ops: Vec<Op> = Vec::new();
    let mut y = top;

    for line in lines.into_iter().flat_map(|l| wrap_line(l, max_width)) {
        let advance = line.size * layout.line_spacing;
        if y - advance < bottom && !ops.is_empty() {
            pages.push(std::mem::take(&mut ops));
            y = top;
        }
        y -= advance;
        if line.is_empty() {
            continue;
        }
        ops.push(Op::StartTextSection);
        ops.push(Op::SetTextCursor {
            pos: Point { x: Pt(left), y: Pt(y) },
        });
        for span in line.spans {
            let font = span.face.builtin();
            ops.push(Op::SetFillColor { col: rgb(span.color) });
            ops.push(Op::SetFontSizeBuiltinFont { size: Pt(line.size), font });
            ops.push(Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(span.text)],
                font,
            });
        }
        ops.push(Op::EndTextSection);
    }
    pages.push(ops);

    let total = pages.len();
    let pages: Vec<PdfPage> = pages
        .into_iter()
        .enumerate()
        .map(|(index, mut ops)| {
            page_number(&mut ops, index + 1, layout);
            PdfPage::new(layout.width, layout.height, ops)
        })
        .collect();
    debug!(title, pages = total, "Laid out PDF document");

    let mut warnings = Vec::new();
    let mut doc = PdfDocument::new(title);
    let bytes = doc
        .with_pages(pages)
        .save(&PdfSaveOptions::default(), &mut warnings);
    if !warnings.is_empty() {
        warn!(title, warnings = warnings.len(), "PDF writer reported warnings");
    }
    bytes
}

fn page_number(ops: &mut Vec<Op>, number: usize, layout: &PageLayout) {
    let text = number.to_string();
    let text_width = text.len() as f32 * Face::Sans.char_width() * PAGE_NUMBER_SIZE;
    let x = pt(layout.width) / 2.0 - text_width / 2.0;
    let y = pt(layout.margin) / 2.0;
    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point { x: Pt(x), y: Pt(y) },
    });
    ops.push(Op::SetFillColor {
        col: rgb(LINE_NUMBER_COLOR),
    });
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(PAGE_NUMBER_SIZE),
        font: BuiltinFont::Helvetica,
    });
    ops.push(Op::WriteTextBuiltinFont {
        items: vec![TextItem::Text(text)],
        font: BuiltinFont::Helvetica,
    });
    ops.push(Op::EndTextSection);
}

fn rgb([r, g, b]: [u8; 3]) -> Color {
    Color::Rgb(Rgb {
        r: f32::from(r) / 255.0,
        g: f32::from(g) / 255.0,
        b: f32::from(b) / 255.0,
        icc_profile: None,
    })
}

/// Read a file that must be UTF-8 text.
pub fn read_text(path: &Path) -> Result<String, RenderError> {
    let bytes = std::fs::read(path).map_err(|source| RenderError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    String::from_utf8(bytes).map_err(|_| RenderError::NotText {
        path: path.to_path_buf(),
    })
}

/// Document title: the file name.
pub fn title_for(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Syntax definitions and theme, loaded once and shared by every render.
pub struct SourceHighlighter {
    syntaxes: SyntaxSet,
    theme: Theme,
}

impl Default for SourceHighlighter {
    fn default() -> Self {
        Self::new(DEFAULT_THEME)
    }
}

impl SourceHighlighter {
    /// Load the bundled syntaxes and the named bundled theme.
    pub fn new(theme_name: &str) -> Self {
        let mut themes = ThemeSet::load_defaults();
        let theme = themes.themes.remove(theme_name).unwrap_or_else(|| {
            warn!(theme = theme_name, "Unknown highlighting theme, using default colors");
            Theme::default()
        });
        Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            theme,
        }
    }

    /// By file name, then by the first line of content, then plain text.
    pub fn resolve_syntax(&self, path: &Path, content: &str) -> &SyntaxReference {
        let by_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.syntaxes.find_syntax_by_extension(ext));
        let by_name = || {
            path.file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| self.syntaxes.find_syntax_by_extension(name))
        };
        let by_content = || {
            content
                .lines()
                .next()
                .and_then(|first| self.syntaxes.find_syntax_by_first_line(first))
        };
        by_extension
            .or_else(by_name)
            .or_else(by_content)
            .unwrap_or_else(|| self.syntaxes.find_syntax_plain_text())
    }

    /// Highlight `content` into numbered, wrap-ready lines.
    pub fn highlight(
        &self,
        path: &Path,
        content: &str,
        size: f32,
    ) -> Result<Vec<StyledLine>, RenderError> {
        let syntax = self.resolve_syntax(path, content);
        debug!(path = %path.display(), syntax = %syntax.name, "Resolved syntax");

        let total = content.lines().count().max(1);
        let digits = total.to_string().len().max(3);
        let mut highlighter = HighlightLines::new(syntax, &self.theme);
        let mut lines = Vec::with_capacity(total);

        for (index, raw) in LinesWithEndings::from(content).enumerate() {
            let ranges = highlighter
                .highlight_line(raw, &self.syntaxes)
                .map_err(|e| RenderError::Highlight(e.to_string()))?;

            let mut line = StyledLine::new(size);
            line.hang = digits + 1;
            line.push(
                StyledSpan::new(format!("{:>digits$} ", index + 1), Face::Mono)
                    .with_color(LINE_NUMBER_COLOR),
            );
            let mut column_text = String::new();
            for (style, text) in ranges {
                // Tabs are expanded against the whole line, not the span.
                let before = sanitize(&column_text).chars().count();
                column_text.push_str(text);
                let expanded: String = sanitize(&column_text).chars().skip(before).collect();
                let face = if style.font_style.contains(FontStyle::BOLD) {
                    Face::MonoBold
                } else if style.font_style.contains(FontStyle::ITALIC) {
                    Face::MonoItalic
                } else {
                    Face::Mono
                };
                let fg = style.foreground;
                line.push(StyledSpan::new(expanded, face).with_color([fg.r, fg.g, fg.b]));
            }
            lines.push(line);
        }
        Ok(lines)
    }
}

/// Generic pipeline: highlighted, line-numbered source.
pub fn render_source(
    path: &Path,
    highlighter: &SourceHighlighter,
    layout: &PageLayout,
) -> Result<Vec<u8>, RenderError> {
    let content = read_text(path)?;
    let lines = highlighter.highlight(path, &content, layout.code_size)?;
    Ok(lines_to_pdf(&title_for(path), lines, layout))
}
