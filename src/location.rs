/// Convert a *character* offset into (line, col), both 1-indexed.
///
/// Offsets past the end of `source` resolve to the position just after the
/// last character.
pub fn char_offset_to_line_col(source: &str, offset: u32) -> (u32, u32) {
    let mut line = 1;
    let mut line_start = 0u32;
    for (i, ch) in source.chars().enumerate() {
        let i = i as u32;
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            line_start = i + 1;
        }
    }
    (line, offset.saturating_sub(line_start) + 1)
}

/// Slice `source` by a character range, clamping to the available text.
pub fn slice_chars(source: &str, start: u32, end: u32) -> &str {
    let byte_at = |target: u32| {
        source
            .char_indices()
            .nth(target as usize)
            .map(|(b, _)| b)
            .unwrap_or(source.len())
    };
    let from = byte_at(start);
    let to = byte_at(end.max(start));
    &source[from..to]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_1_for_start() {
        let src = "import os\n";
        assert_eq!(char_offset_to_line_col(src, 0), (1, 1));
    }

    #[test]
    fn test_second_line() {
        let src = "import os\nimport sys\n";
        assert_eq!(char_offset_to_line_col(src, 10), (2, 1));
    }

    #[test]
    fn test_column_counts_characters() {
        let src = "é = 1\n";
        assert_eq!(char_offset_to_line_col(src, 4), (1, 5));
    }

    #[test]
    fn test_empty_source() {
        assert_eq!(char_offset_to_line_col("", 0), (1, 1));
    }

    #[test]
    fn test_slice_chars_multibyte() {
        let src = "s = 'héllo'";
        assert_eq!(slice_chars(src, 4, 11), "'héllo'");
        assert_eq!(slice_chars(src, 20, 30), "");
    }
}
