//! Off-screen layout of HTML markup for the HTML to PDF tool.
//!
//! Markup is reduced to wrapped text lines on a fixed-width canvas. The
//! canvas is then drawn and rasterised by the PDFium layer.

/// Canvas width in layout units (PDF points)
pub const CANVAS_WIDTH: f32 = 800.0;

/// Padding on every side of the canvas
pub const CANVAS_PADDING: f32 = 40.0;

/// Body text size
pub const FONT_SIZE: f32 = 14.0;

/// Baseline-to-baseline distance
pub const LINE_HEIGHT: f32 = 20.0;

/// Average Helvetica advance as a fraction of the font size
const AVERAGE_GLYPH_WIDTH: f32 = 0.5;

/// Markup laid out on the canvas
#[derive(Debug, Clone, PartialEq)]
pub struct MarkupLayout {
    /// Text lines top to bottom; blank lines are kept as spacing
    pub lines: Vec<String>,
    /// Canvas width
    pub width: f32,
    /// Canvas height including padding
    pub height: f32,
}

impl MarkupLayout {
    /// Baseline of line `index`, measured from the bottom of the canvas.
    pub fn baseline(&self, index: usize) -> f32 {
        self.height - CANVAS_PADDING - FONT_SIZE - index as f32 * LINE_HEIGHT
    }

    /// Whether the layout has any visible text
    pub fn has_text(&self) -> bool {
        self.lines.iter().any(|line| !line.trim().is_empty())
    }
}

/// Characters that fit between the paddings at the body font size
pub fn columns() -> usize {
    let usable = CANVAS_WIDTH - 2.0 * CANVAS_PADDING;
    (usable / (FONT_SIZE * AVERAGE_GLYPH_WIDTH)).floor() as usize
}

/// Lay out `markup` on the fixed-width canvas.
pub fn layout_markup(markup: &str) -> MarkupLayout {
    let text = html2text::from_read(markup.as_bytes(), columns());

    let mut lines: Vec<String> = text.lines().map(|l| l.trim_end().to_string()).collect();
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    let height = 2.0 * CANVAS_PADDING + lines.len() as f32 * LINE_HEIGHT;

    MarkupLayout {
        lines,
        width: CANVAS_WIDTH,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraphs_become_lines() {
        let layout = layout_markup("<h1>Quarterly report</h1><p>Revenue is up.</p>");
        let joined = layout.lines.join("\n");
        assert!(joined.contains("Quarterly report"));
        assert!(joined.contains("Revenue is up."));
        assert!(layout.has_text());
        assert_eq!(layout.width, CANVAS_WIDTH);
    }

    #[test]
    fn test_height_grows_with_content() {
        let short = layout_markup("<p>one</p>");
        let long = layout_markup(&"<p>line</p>".repeat(40));
        assert!(long.height > short.height);
        assert_eq!(
            short.height,
            2.0 * CANVAS_PADDING + short.lines.len() as f32 * LINE_HEIGHT
        );
    }

    #[test]
    fn test_long_paragraph_wraps_within_columns() {
        let layout = layout_markup(&format!("<p>{}</p>", "word ".repeat(200)));
        assert!(layout.lines.len() > 1);
        assert!(layout
            .lines
            .iter()
            .all(|line| line.chars().count() <= columns()));
    }

    #[test]
    fn test_empty_markup_has_no_text() {
        let layout = layout_markup("<div></div>");
        assert!(!layout.has_text());
    }

    #[test]
    fn test_first_baseline_inside_padding() {
        let layout = layout_markup("<p>a</p><p>b</p>");
        assert!(layout.baseline(0) < layout.height - CANVAS_PADDING);
        assert!(layout.baseline(0) > layout.baseline(1));
    }
}
