//! The HTML subset text overlays store.
//!
//! Understood: `<p>` (a line break between consecutive paragraphs),
//! `<br>`, `<b>`/`<strong>`, `<i>`/`<em>`, text, and the basic entities.
//! Any other tag is dropped but its content kept.  Runs of whitespace in
//! text collapse to one space.

/// A run of text sharing one style.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

#[derive(Default)]
struct Builder {
    spans: Vec<Span>,
    bold: u32,
    italic: u32,
    /// Last emitted char was whitespace (or nothing emitted on the line).
    at_space: bool,
    paragraphs: u32,
}

impl Builder {
    fn new() -> Self {
        Self {
            at_space: true,
            ..Self::default()
        }
    }

    fn push_str(&mut self, text: &str) {
        let (bold, italic) = (self.bold > 0, self.italic > 0);
        match self.spans.last_mut() {
            Some(span) if span.bold == bold && span.italic == italic => span.text.push_str(text),
            _ => self.spans.push(Span {
                text: text.to_string(),
                bold,
                italic,
            }),
        }
    }

    fn text(&mut self, raw: &str) {
        let decoded = decode_entities(raw);
        let mut out = String::with_capacity(decoded.len());
        for c in decoded.chars() {
            if c.is_whitespace() {
                if !self.at_space {
                    out.push(' ');
                    self.at_space = true;
                }
            } else {
                out.push(c);
                self.at_space = false;
            }
        }
        if !out.is_empty() {
            self.push_str(&out);
        }
    }

    fn line_break(&mut self) {
        self.push_str("\n");
        self.at_space = true;
    }

    fn tag(&mut self, tag: &str) {
        let tag = tag.trim().trim_end_matches('/').trim();
        let (closing, name) = match tag.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, tag),
        };
        let name = name
            .split(|c: char| c.is_whitespace())
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        match (name.as_str(), closing) {
            ("p", false) => {
                if self.paragraphs > 0 || !self.spans.is_empty() {
                    self.line_break();
                }
                self.paragraphs += 1;
            }
            ("br", _) => self.line_break(),
            ("b" | "strong", false) => self.bold += 1,
            ("b" | "strong", true) => self.bold = self.bold.saturating_sub(1),
            ("i" | "em", false) => self.italic += 1,
            ("i" | "em", true) => self.italic = self.italic.saturating_sub(1),
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Span> {
        // Trailing whitespace from the last text node.
        if let Some(span) = self.spans.last_mut() {
            let trimmed = span.text.trim_end_matches(' ').len();
            span.text.truncate(trimmed);
        }
        self.spans.retain(|s| !s.text.is_empty());
        self.spans
    }
}

/// Split `html` into styled spans. Line breaks appear as `\n`.
pub fn parse(html: &str) -> Vec<Span> {
    let mut builder = Builder::new();
    let mut rest = html;
    while let Some(open) = rest.find('<') {
        builder.text(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('>') {
            Some(close) => {
                builder.tag(&after[..close]);
                rest = &after[close + 1..];
            }
            None => {
                // Unterminated tag: keep it as text.
                builder.text(&rest[open..]);
                rest = "";
            }
        }
    }
    builder.text(rest);
    builder.finish()
}

/// The text without styling.
pub fn plain_text(spans: &[Span]) -> String {
    spans.iter().map(|s| s.text.as_str()).collect()
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let decoded = after.find(';').and_then(|semi| {
            let c = match &after[..semi] {
                "amp" => '&',
                "lt" => '<',
                "gt" => '>',
                "quot" => '"',
                "apos" | "#39" => '\'',
                "nbsp" => '\u{a0}',
                other => {
                    let code = match other.strip_prefix("#x").or_else(|| other.strip_prefix("#X")) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                        None => other.strip_prefix('#')?.parse().ok()?,
                    };
                    char::from_u32(code)?
                }
            };
            Some((c, semi))
        });
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &after[semi + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

// ===================================================================
// Tests
// ===================================================================
