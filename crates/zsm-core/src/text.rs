//! Terminal-cell text arithmetic.
//!
//! Everything here measures in display cells, not bytes or chars: wide glyphs
//! count as two cells and control characters as zero.

use std::ops::Range;
use unicode_width::UnicodeWidthChar;

pub const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Top border chrome: `╭─` on the left plus `╮` on the right.
const TOP_BORDER_CHROME: usize = 3;
/// Chrome plus at least one fill cell between the titles.
const TOP_BORDER_RESERVED: usize = 4;
/// A right title narrower than this after truncation is dropped.
const MIN_RIGHT_TITLE_WIDTH: usize = 4;

const HELP_LEAD: usize = 1;
const HELP_GAP: usize = 2;
pub const TAB_STOP: usize = 8;

/// Sum of per-char widths, so that measuring and cutting always agree.
pub fn measure_width(s: &str) -> usize {
    s.chars().map(char_width).sum()
}

pub fn char_width(c: char) -> usize {
    UnicodeWidthChar::width(c).unwrap_or(0)
}

/// Longest prefix of `s` that fits in `max` cells. A wide glyph that would
/// straddle the limit is left out.
pub fn cut_to_width(s: &str, max: usize) -> &str {
    let mut used = 0;
    for (idx, c) in s.char_indices() {
        let width = char_width(c);
        if used + width > max {
            return &s[..idx];
        }
        used += width;
    }
    s
}

pub fn truncate(s: &str, max: usize) -> String {
    if measure_width(s) <= max {
        return s.to_string();
    }
    if max <= ELLIPSIS_WIDTH {
        return cut_to_width(s, max).to_string();
    }
    format!("{}{ELLIPSIS}", cut_to_width(s, max - ELLIPSIS_WIDTH))
}

pub fn pad_left(s: &str, width: usize) -> String {
    let current = measure_width(s);
    if current >= width {
        return s.to_string();
    }
    format!("{}{s}", " ".repeat(width - current))
}

pub fn pad_right(s: &str, width: usize) -> String {
    let current = measure_width(s);
    if current >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - current))
}

/// Widest line of a multi-line string, in cells.
pub fn max_line_width(text: &str) -> usize {
    text.lines().map(measure_width).max().unwrap_or(0)
}

/// Skips `offset` cells of `line`, then cuts and pads the rest to exactly
/// `width` cells.
pub fn scroll_line(line: &str, offset: usize, width: usize) -> String {
    let mut skipped = 0;
    let mut start = line.len();
    for (idx, c) in line.char_indices() {
        if skipped >= offset {
            start = idx;
            break;
        }
        skipped += char_width(c);
    }
    pad_right(cut_to_width(&line[start..], width), width)
}

/// Byte range of the first case-insensitive occurrence of `needle`.
pub fn find_ignore_case(haystack: &str, needle: &str) -> Option<Range<usize>> {
    if needle.is_empty() {
        return None;
    }
    haystack.char_indices().find_map(|(start, _)| {
        match_len_at(&haystack[start..], needle).map(|len| start..start + len)
    })
}

pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || find_ignore_case(haystack, needle).is_some()
}

fn match_len_at(haystack: &str, needle: &str) -> Option<usize> {
    let mut hay = haystack.char_indices();
    for wanted in needle.chars() {
        let (_, got) = hay.next()?;
        if !chars_eq_ignore_case(got, wanted) {
            return None;
        }
    }
    Some(hay.next().map(|(idx, _)| idx).unwrap_or(haystack.len()))
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Replaces each tab with spaces up to the next multiple of `stop` cells.
pub fn expand_tabs(line: &str, stop: usize) -> String {
    if !line.contains('\t') {
        return line.to_string();
    }
    let stop = stop.max(1);
    let mut out = String::with_capacity(line.len() + stop);
    let mut column = 0;
    for c in line.chars() {
        if c == '\t' {
            let pad = stop - column % stop;
            out.extend(std::iter::repeat(' ').take(pad));
            column += pad;
        } else {
            out.push(c);
            column += char_width(c);
        }
    }
    out
}

/// Removes terminal escape sequences and control bytes, keeping `\n` and `\t`.
///
/// Handles CSI (`ESC [` .. final byte 0x40-0x7E), OSC (`ESC ]` .. BEL or
/// `ESC \`), charset designation (`ESC (` / `ESC )` + one byte) and any other
/// two-byte escape. A sequence cut off by the end of input is dropped.
pub fn strip_control_sequences(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            0x1b => {
                i += 1;
                let Some(&kind) = bytes.get(i) else {
                    break;
                };
                i += 1;
                match kind {
                    b'[' => {
                        while i < bytes.len() && !(0x40..=0x7e).contains(&bytes[i]) {
                            i += 1;
                        }
                        i += 1;
                    }
                    b']' => {
                        while i < bytes.len() {
                            if bytes[i] == 0x07 {
                                i += 1;
                                break;
                            }
                            if bytes[i] == 0x1b && bytes.get(i + 1) == Some(&b'\\') {
                                i += 2;
                                break;
                            }
                            i += 1;
                        }
                    }
                    b'(' | b')' => i += 1,
                    _ => {}
                }
            }
            b'\n' | b'\t' => {
                out.push(bytes[i]);
                i += 1;
            }
            byte if byte < 0x20 || byte == 0x7f => i += 1,
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Title layout for a rounded top border: `╭─{left}{fill}{right}╮`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopBorder {
    pub left: String,
    pub right: Option<String>,
    pub fill: usize,
}

impl TopBorder {
    /// Fits `left` and `right` titles into a border `outer_width` cells wide.
    /// The right title gives way first; the left one is cut only if it alone
    /// does not fit.
    pub fn compose(left: &str, right: &str, outer_width: usize) -> Self {
        let max_titles = outer_width.saturating_sub(TOP_BORDER_RESERVED).max(1);
        let mut left = left.to_string();
        let mut right = (!right.is_empty()).then(|| right.to_string());
        let mut left_width = measure_width(&left);
        let mut right_width = right.as_deref().map(measure_width).unwrap_or(0);

        if left_width + right_width > max_titles {
            let room = max_titles.saturating_sub(left_width + 1);
            if room < MIN_RIGHT_TITLE_WIDTH {
                right = None;
                right_width = 0;
            } else if let Some(title) = right.as_mut() {
                *title = truncate(title, room);
                right_width = measure_width(title);
            }
        }
        if left_width + right_width > max_titles {
            left = truncate(&left, max_titles.saturating_sub(right_width + 1));
            left_width = measure_width(&left);
        }

        let fill = outer_width.saturating_sub(TOP_BORDER_CHROME + left_width + right_width);
        Self { left, right, fill }
    }

    pub fn to_plain(&self) -> String {
        format!(
            "╭─{}{}{}╮",
            self.left,
            "─".repeat(self.fill),
            self.right.as_deref().unwrap_or_default()
        )
    }
}

/// Fill cells for a bottom border that ends in a right-aligned label:
/// `╰{fill}{label}╯`.
pub fn bottom_border_fill(label: &str, outer_width: usize) -> usize {
    outer_width.saturating_sub(2 + measure_width(label))
}

/// Greedy line packing for help items. Each line starts with one space and
/// items are separated by two; a line always holds at least one item.
/// Returns the item index range of every line.
pub fn pack_help_lines(widths: &[usize], max_width: usize) -> Vec<Range<usize>> {
    if max_width == 0 || widths.is_empty() {
        return vec![0..widths.len()];
    }
    let mut lines = Vec::new();
    let mut start = 0;
    let mut line_width = HELP_LEAD;
    for (idx, width) in widths.iter().enumerate() {
        let gap = if idx == start { 0 } else { HELP_GAP };
        if idx > start && line_width + gap + width > max_width {
            lines.push(start..idx);
            start = idx;
            line_width = HELP_LEAD + width;
        } else {
            line_width += gap + width;
        }
    }
    lines.push(start..widths.len());
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 5), "hello");
        assert_eq!(truncate("", 0), "");
    }

    #[test]
    fn truncate_appends_ellipsis() {
        assert_eq!(truncate("hello world", 8), "hello...");
        assert_eq!(truncate("abcdef", 4), "a...");
    }

    #[test]
    fn truncate_hard_cuts_tiny_limits() {
        assert_eq!(truncate("hello", 3), "hel");
        assert_eq!(truncate("hello", 1), "h");
        assert_eq!(truncate("hello", 0), "");
    }

    #[test]
    fn truncate_counts_wide_glyphs() {
        let out = truncate("日本語テキスト", 7);
        assert!(measure_width(&out) <= 7);
        assert_eq!(out, "日本...");
        // a wide glyph straddling the limit is dropped, not split
        assert_eq!(truncate("日本語", 3), "日");
    }

    #[test]
    fn pad_respects_cell_width() {
        assert_eq!(pad_right("ab", 5), "ab   ");
        assert_eq!(pad_left("ab", 5), "   ab");
        assert_eq!(pad_right("abcdef", 3), "abcdef");
        assert_eq!(pad_right("日本", 6), "日本  ");
        assert_eq!(measure_width(&pad_left("日", 4)), 4);
    }

    #[test]
    fn strip_removes_csi_osc_and_charset() {
        assert_eq!(strip_control_sequences("\x1b[31mred\x1b[0m"), "red");
        assert_eq!(
            strip_control_sequences("\x1b]0;title\x07after\x1b]8;;url\x1b\\link"),
            "afterlink"
        );
        assert_eq!(strip_control_sequences("\x1b(Bplain\x1b)0"), "plain");
        assert_eq!(strip_control_sequences("\x1b=keypad\x1b>"), "keypad");
    }

    #[test]
    fn strip_drops_control_bytes_but_keeps_newline_and_tab() {
        assert_eq!(
            strip_control_sequences("a\r\nb\tc\x07\x08d\x7f"),
            "a\nb\tcd"
        );
    }

    #[test]
    fn strip_consumes_truncated_sequences() {
        assert_eq!(strip_control_sequences("text\x1b"), "text");
        assert_eq!(strip_control_sequences("text\x1b[38;5"), "text");
        assert_eq!(strip_control_sequences("text\x1b]0;unterminated"), "text");
        assert_eq!(strip_control_sequences("text\x1b("), "text");
    }

    #[test]
    fn strip_preserves_multibyte_text() {
        assert_eq!(strip_control_sequences("\x1b[1m日本\x1b[m 📂"), "日本 📂");
    }

    #[test]
    fn tabs_expand_to_the_next_stop() {
        assert_eq!(expand_tabs("a\tb", 8), "a       b");
        assert_eq!(expand_tabs("\tx", 4), "    x");
        assert_eq!(expand_tabs("abcd\te", 4), "abcd    e");
        assert_eq!(expand_tabs("日本\t.", 8), "日本    .");
        assert_eq!(expand_tabs("plain", 8), "plain");

        let expanded = expand_tabs("a\tb", TAB_STOP);
        assert_eq!(measure_width(&expanded), 9);
        assert_eq!(measure_width(&scroll_line(&expanded, 0, 6)), 6);
    }

    #[test]
    fn scroll_line_skips_and_pads() {
        assert_eq!(scroll_line("abcdefgh", 2, 4), "cdef");
        assert_eq!(scroll_line("abc", 0, 6), "abc   ");
        assert_eq!(scroll_line("abc", 10, 3), "   ");
        assert_eq!(scroll_line("", 0, 2), "  ");
    }

    #[test]
    fn scroll_line_drops_straddling_wide_glyph() {
        // offset 1 lands inside the first glyph, which is skipped whole
        assert_eq!(scroll_line("日本語", 1, 4), "本語");
        assert_eq!(scroll_line("日本語", 2, 3), "本 ");
    }

    #[test]
    fn find_ignore_case_returns_byte_range() {
        assert_eq!(find_ignore_case("My-Session", "sess"), Some(3..7));
        assert_eq!(find_ignore_case("abc", "zz"), None);
        assert_eq!(find_ignore_case("abc", ""), None);
        assert_eq!(find_ignore_case("日本Api", "API"), Some(6..9));
        assert!(contains_ignore_case("anything", ""));
    }

    #[test]
    fn top_border_matches_outer_width() {
        let border = TopBorder::compose(" left ", " right ", 30);
        assert_eq!(border.right.as_deref(), Some(" right "));
        assert_eq!(measure_width(&border.to_plain()), 30);
    }

    #[test]
    fn top_border_truncates_right_first() {
        let border = TopBorder::compose(" session ", " 📂 ~/a/very/long/path ", 24);
        assert_eq!(border.left, " session ");
        let right = border.right.as_deref().unwrap_or_default();
        assert!(right.ends_with(ELLIPSIS));
        assert_eq!(measure_width(&border.to_plain()), 24);
    }

    #[test]
    fn top_border_drops_right_then_cuts_left() {
        let border = TopBorder::compose(" a-rather-long-session-name ", " ↑ name ", 20);
        assert_eq!(border.right, None);
        assert!(border.left.ends_with(ELLIPSIS));
        assert_eq!(measure_width(&border.to_plain()), 20);
    }

    #[test]
    fn top_border_without_right_title() {
        let border = TopBorder::compose(" Activity Log ", "", 40);
        assert_eq!(border.right, None);
        assert_eq!(border.fill, 40 - 3 - 14);
    }

    #[test]
    fn bottom_fill_leaves_room_for_label() {
        assert_eq!(bottom_border_fill(" 2 sel ", 20), 11);
        assert_eq!(bottom_border_fill(" 2 sel ", 4), 0);
    }

    #[test]
    fn help_lines_pack_greedily() {
        // " aaaa  bbbb" is 11 cells, adding "  cc" would make 15
        assert_eq!(pack_help_lines(&[4, 4, 2], 12), vec![0..2, 2..3]);
        assert_eq!(pack_help_lines(&[4, 4, 2], 15), vec![0..3]);
    }

    #[test]
    fn help_lines_keep_oversized_items() {
        assert_eq!(pack_help_lines(&[20, 3], 10), vec![0..1, 1..2]);
        assert_eq!(pack_help_lines(&[3, 20], 10), vec![0..1, 1..2]);
        assert_eq!(pack_help_lines(&[5, 5], 0), vec![0..2]);
    }

    proptest! {
        #[test]
        fn truncate_never_exceeds_limit(s in "\\PC{0,40}", n in 0usize..50) {
            let out = truncate(&s, n);
            prop_assert!(measure_width(&out) <= n);
            if measure_width(&s) <= n {
                prop_assert_eq!(&out, &s);
            }
            prop_assert_eq!(truncate(&out, n), out);
        }

        #[test]
        fn padding_reaches_width_without_losing_content(s in "\\PC{0,20}", n in 0usize..40) {
            for padded in [pad_left(&s, n), pad_right(&s, n)] {
                let width = measure_width(&s);
                prop_assert!(measure_width(&padded) >= n);
                prop_assert!(padded.contains(s.as_str()));
                if width < n {
                    prop_assert_eq!(measure_width(&padded), n);
                } else {
                    prop_assert_eq!(&padded, &s);
                }
            }
        }

        #[test]
        fn scroll_line_is_exact_width(s in "\\PC{0,40}", offset in 0usize..20, n in 0usize..30) {
            prop_assert_eq!(measure_width(&scroll_line(&s, offset, n)), n);
        }

        #[test]
        fn top_border_is_exact(left in "[ a-z日]{0,30}", right in "[ a-z📂]{0,30}", w in 4usize..80) {
            let border = TopBorder::compose(&left, &right, w);
            prop_assert_eq!(measure_width(&border.to_plain()), w);
        }
    }
}
