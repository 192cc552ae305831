//! Rich-text stripping for page content.
//!
//! Pages are rendered rich text; recipe blocks and classification markers are
//! read from the stripped plain text.

use once_cell::sync::Lazy;
use regex::Regex;

static LINE_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid line break regex"));
static BLOCK_CLOSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</(?:p|div|li|h[1-6]|pre|tr|ul|ol|blockquote)\s*>")
        .expect("valid block close regex")
});
static LIST_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<li(?:\s[^>]*)?>").expect("valid list item regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"</?[A-Za-z][A-Za-z0-9]*(?:\s[^<>]*)?/?>").expect("valid tag regex")
});

/// Strips markup and decodes basic entities.
///
/// - `<br>` and closing block tags become newlines.
/// - `<li>` becomes a `- ` list marker.
/// - Trailing whitespace is trimmed per line; leading/trailing blank lines
///   are removed.
/// - Text without tags is already plain: it is only trimmed, never decoded,
///   so stripping a previous result is a no-op.
pub fn strip_rich_text(content: &str) -> String {
    if !TAG_RE.is_match(content) {
        return trim_blank_edges(content);
    }
    let with_breaks = LINE_BREAK_RE.replace_all(content, "\n");
    let with_blocks = BLOCK_CLOSE_RE.replace_all(&with_breaks, "\n");
    let with_items = LIST_ITEM_RE.replace_all(&with_blocks, "- ");
    let without_tags = TAG_RE.replace_all(&with_items, "");
    trim_blank_edges(&decode_entities(&without_tags))
}

fn trim_blank_edges(text: &str) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let start = lines
        .iter()
        .position(|line| !line.is_empty())
        .unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|line| !line.is_empty())
        .map_or(start, |index| index + 1);
    lines[start..end].join("\n")
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::strip_rich_text;

    #[test]
    fn paragraphs_and_breaks_become_lines() {
        let html = "<p>name: Ember Salve</p><p>skill: Alchemy<br>heat: 2</p>";
        assert_eq!(
            strip_rich_text(html),
            "name: Ember Salve\nskill: Alchemy\nheat: 2"
        );
    }

    #[test]
    fn list_items_become_markers() {
        let html = "<p>ingredients:</p><ul><li>Salt</li><li>Water &amp; ash</li></ul>";
        assert_eq!(
            strip_rich_text(html),
            "ingredients:\n- Salt\n- Water & ash"
        );
    }

    #[test]
    fn decoded_angle_brackets_survive_a_second_strip() {
        let html = "<p>description: DC &lt;10 fails, &gt;15 crits</p>";
        let plain = strip_rich_text(html);
        assert_eq!(plain, "description: DC <10 fails, >15 crits");
        assert_eq!(strip_rich_text(&plain), plain);
    }

    #[test]
    fn plain_text_keeps_entity_spelling() {
        assert_eq!(strip_rich_text("notes: a &amp;lt; b"), "notes: a &amp;lt; b");
    }

    #[test]
    fn plain_text_passes_through() {
        let text = "name: Tonic\ningredients:\n- Herb";
        assert_eq!(strip_rich_text(text), text);
    }
}
