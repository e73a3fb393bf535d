//! Telegram HTML helpers
//!
//! Post text is stored and sent as Telegram HTML: escaped text plus the small
//! tag set Telegram accepts. Lengths here count visible characters, so an
//! entity such as `&amp;` is one character and tags are none.

use select::document::Document;
use select::node::Node;
use select::predicate::Name;

/// Tags Telegram understands in HTML parse mode
const ALLOWED_TAGS: [&str; 13] = [
    "b", "strong", "i", "em", "u", "ins", "s", "strike", "del", "code", "pre", "blockquote", "tg-spoiler",
];

/// Tags that end a line when they are unwrapped
const BLOCK_TAGS: [&str; 10] = ["p", "div", "li", "tr", "h1", "h2", "h3", "h4", "h5", "h6"];

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Reduces arbitrary HTML to what Telegram accepts.
///
/// Allowed tags and `<a href>` are kept, `<br>` becomes a newline, other tags
/// are unwrapped and all text is escaped again.
pub fn sanitize_html(html: &str) -> String {
    let document = Document::from(html);
    let mut out = String::new();
    if let Some(body) = document.find(Name("body")).next() {
        for child in body.children() {
            write_node(&child, &mut out);
        }
    }
    out.trim().to_string()
}

fn write_node(node: &Node, out: &mut String) {
    if let Some(text) = node.as_text() {
        out.push_str(&escape_html(text));
        return;
    }
    let Some(name) = node.name() else {
        return;
    };
    match name {
        "br" => {
            out.push('\n');
            return;
        }
        "script" | "style" | "head" => return,
        _ => {}
    }

    let tag = match (name, node.attr("href")) {
        ("a", Some(href)) => Some(("a", format!("<a href=\"{}\">", escape_html(href)))),
        (name, _) if ALLOWED_TAGS.contains(&name) => Some((name, format!("<{}>", name))),
        _ => None,
    };

    if let Some((_, open)) = &tag {
        out.push_str(open);
    }
    for child in node.children() {
        write_node(&child, out);
    }
    match tag {
        Some((name, _)) => out.push_str(&format!("</{}>", name)),
        None if BLOCK_TAGS.contains(&name) && !out.ends_with('\n') => out.push('\n'),
        None => {}
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece<'a> {
    /// One visible character or entity
    Unit(&'a str),
    Open { raw: &'a str, name: &'a str },
    Close { name: &'a str },
}

fn tag_name(inner: &str) -> &str {
    inner
        .split(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .next()
        .unwrap_or_default()
}

fn is_entity(candidate: &str) -> bool {
    candidate.len() > 2
        && candidate.len() <= 10
        && candidate[1..candidate.len() - 1]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '#')
}

/// Telegram HTML split into visible units and tags
#[derive(Debug, Clone)]
pub(crate) struct Fragment<'a> {
    pieces: Vec<Piece<'a>>,
}

impl<'a> Fragment<'a> {
    pub(crate) fn parse(html: &'a str) -> Self {
        let mut pieces = Vec::new();
        let mut rest = html;
        while let Some(c) = rest.chars().next() {
            let len = match c {
                '<' => rest.find('>').map(|end| end + 1),
                '&' => rest.find(';').map(|end| end + 1).filter(|&end| is_entity(&rest[..end])),
                _ => None,
            }
            .unwrap_or(c.len_utf8());

            let (raw, tail) = rest.split_at(len);
            let piece = if len > 1 && raw.starts_with("</") {
                Piece::Close {
                    name: tag_name(&raw[2..]),
                }
            } else if len > 1 && raw.starts_with('<') {
                Piece::Open {
                    raw,
                    name: tag_name(&raw[1..]),
                }
            } else {
                Piece::Unit(raw)
            };
            pieces.push(piece);
            rest = tail;
        }
        Self { pieces }
    }

    /// Visible units with the index of their piece
    pub(crate) fn units(&self) -> impl Iterator<Item = (usize, &'a str)> + '_ {
        self.pieces.iter().enumerate().filter_map(|(i, piece)| match piece {
            Piece::Unit(unit) => Some((i, *unit)),
            _ => None,
        })
    }

    pub(crate) fn visible_len(&self) -> usize {
        self.units().count()
    }

    /// Renders the pieces before `end`, appends `trailer` and closes every
    /// tag still open. Trailing whitespace and dangling open tags are dropped.
    pub(crate) fn render(&self, end: usize, trailer: &str) -> String {
        let mut end = end.min(self.pieces.len());
        while end > 0 {
            match self.pieces[end - 1] {
                Piece::Unit(unit) if unit.trim().is_empty() => end -= 1,
                Piece::Open { .. } => end -= 1,
                _ => break,
            }
        }

        let mut out = String::new();
        let mut open = Vec::new();
        for piece in &self.pieces[..end] {
            write_piece(*piece, &mut out, &mut open);
        }
        out.push_str(trailer);
        close_all(&mut out, &open);
        out
    }
}

fn write_piece<'a>(piece: Piece<'a>, out: &mut String, open: &mut Vec<(&'a str, &'a str)>) {
    match piece {
        Piece::Unit(unit) => out.push_str(unit),
        Piece::Open { raw, name } => {
            out.push_str(raw);
            open.push((raw, name));
        }
        Piece::Close { name } => {
            // a stray close tag is dropped
            if let Some(pos) = open.iter().rposition(|(_, n)| n.eq_ignore_ascii_case(name)) {
                close_all(out, &open[pos..]);
                open.truncate(pos);
            }
        }
    }
}

fn close_all(out: &mut String, open: &[(&str, &str)]) {
    for (_, name) in open.iter().rev() {
        out.push_str(&format!("</{}>", name));
    }
}

/// Number of characters Telegram shows for `html`
pub fn visible_len(html: &str) -> usize {
    Fragment::parse(html).visible_len()
}

/// Cuts `html` to at most `limit` visible characters, ending with "..."
/// inside any tags that were open at the cut.
pub fn truncate_html(html: &str, limit: usize) -> String {
    let fragment = Fragment::parse(html);
    if fragment.visible_len() <= limit {
        return html.to_string();
    }
    let keep = limit.saturating_sub(3);
    let end = match keep {
        0 => 0,
        keep => fragment.units().nth(keep - 1).map_or(0, |(i, _)| i + 1),
    };
    fragment.render(end, "...")
}

/// Splits `html` into chunks of at most `limit` visible characters.
///
/// Cuts after the last newline in the second half of a window when there is
/// one. Tags open at a cut are closed at the end of the chunk and opened again
/// at the start of the next one, so every chunk is valid on its own.
pub fn chunk_html(html: &str, limit: usize) -> Vec<String> {
    if limit == 0 || html.is_empty() {
        return Vec::new();
    }

    let pieces = Fragment::parse(html).pieces;
    let mut chunks = Vec::new();
    let mut open: Vec<(&str, &str)> = Vec::new();
    let mut start = 0;
    while start < pieces.len() {
        let mut units = 0;
        let mut end = start;
        let mut newline_cut = None;
        while end < pieces.len() {
            if let Piece::Unit(unit) = pieces[end] {
                if units == limit {
                    break;
                }
                if unit == "\n" && units >= limit / 2 {
                    newline_cut = Some(end + 1);
                }
                units += 1;
            }
            end += 1;
        }

        let mut cut = if end == pieces.len() {
            end
        } else {
            newline_cut.unwrap_or(end)
        };
        while cut > start + 1 && matches!(pieces[cut - 1], Piece::Open { .. }) {
            cut -= 1;
        }
        while matches!(pieces.get(cut), Some(Piece::Close { .. })) {
            cut += 1;
        }

        let mut chunk: String = open.iter().map(|(raw, _)| *raw).collect();
        let has_text = pieces[start..cut].iter().any(|p| matches!(p, Piece::Unit(_)));
        for piece in &pieces[start..cut] {
            write_piece(*piece, &mut chunk, &mut open);
        }
        close_all(&mut chunk, &open);
        if has_text || chunks.is_empty() {
            chunks.push(chunk);
        }
        start = cut;
    }
    chunks
}
