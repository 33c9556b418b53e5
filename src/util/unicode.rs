use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Display width in terminal cells
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Truncate a string to fit within `max_cells` terminal cells, appending `…` if truncated.
pub fn truncate_to_width(s: &str, max_cells: usize) -> String {
    if max_cells == 0 {
        return String::new();
    }
    if display_width(s) <= max_cells {
        return s.to_string();
    }
    if max_cells == 1 {
        return "\u{2026}".to_string();
    }
    let budget = max_cells - 1; // 1 cell for '…'
    let mut width = 0;
    let mut result = String::new();
    for grapheme in s.graphemes(true) {
        let gw = display_width(grapheme);
        if width + gw > budget {
            break;
        }
        width += gw;
        result.push_str(grapheme);
    }
    result.push('\u{2026}');
    result
}

/// One-line preview of a multi-line description
pub fn preview(s: &str, max_cells: usize) -> String {
    let mut lines = s.lines().map(str::trim).filter(|l| !l.is_empty());
    let first = lines.next().unwrap_or("");
    if lines.next().is_some() && display_width(first) < max_cells {
        // more text follows; make that visible
        return truncate_to_width(&format!("{} \u{2026}", first), max_cells);
    }
    truncate_to_width(first, max_cells)
}

/// Right-pad with spaces to `cells` terminal cells
pub fn pad_to_width(s: &str, cells: usize) -> String {
    let w = display_width(s);
    if w >= cells {
        return s.to_string();
    }
    format!("{}{}", s, " ".repeat(cells - w))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_counts_wide_chars() {
        assert_eq!(display_width("cat"), 3);
        assert_eq!(display_width("猫"), 2);
        assert_eq!(display_width("🐈"), 2);
    }

    #[test]
    fn truncate_keeps_whole_graphemes() {
        assert_eq!(truncate_to_width("hello", 10), "hello");
        assert_eq!(truncate_to_width("hello world", 6), "hello…");
        assert_eq!(truncate_to_width("猫猫猫", 4), "猫…");
        assert_eq!(truncate_to_width("abc", 1), "…");
        assert_eq!(truncate_to_width("abc", 0), "");
    }

    #[test]
    fn preview_uses_first_non_blank_line() {
        assert_eq!(preview("\n  Buy litter  \nand food", 40), "Buy litter …");
        assert_eq!(preview("single", 40), "single");
        assert_eq!(preview("", 40), "");
        assert_eq!(preview("a rather long first line", 9), "a rather…");
    }

    #[test]
    fn pad_accounts_for_width() {
        assert_eq!(pad_to_width("猫", 4), "猫  ");
        assert_eq!(pad_to_width("long", 2), "long");
    }
}
