/// Escapes characters that are unsafe in file names.
///
/// Replaces path separators, Windows-reserved characters and control
/// characters so a track title can be used directly as a scratch file name.
///
/// # Example
///
/// ```
/// use tunegrab::core::utils::escape_filename;
///
/// let safe = escape_filename("song/name*.mp3");
/// assert_eq!(safe, "song_name_.mp3");
/// ```
pub fn escape_filename(filename: &str) -> String {
    let mut result = String::with_capacity(filename.len());

    for c in filename.chars() {
        match c {
            '/' | '\\' => result.push('_'),
            ':' | '*' | '?' | '<' | '>' | '|' => result.push('_'),
            '"' => result.push('\''),
            c if c.is_control() => result.push('_'),
            _ => result.push(c),
        }
    }

    // Leading/trailing whitespace and dots are problematic on Windows
    let result = result.trim_matches(|c: char| c.is_whitespace() || c == '.');

    if result.is_empty() {
        "unnamed".to_string()
    } else {
        result.to_string()
    }
}

/// Escapes special characters for Telegram MarkdownV2.
///
/// MarkdownV2 requires escaping of:
/// `_`, `*`, `[`, `]`, `(`, `)`, `~`, `` ` ``, `>`, `#`, `+`, `-`, `=`, `|`, `{`, `}`, `.`, `!`
///
/// The backslash is escaped first to avoid double-escaping.
///
/// # Example
///
/// ```
/// use tunegrab::core::utils::escape_markdown_v2;
///
/// assert_eq!(escape_markdown_v2("Hello. World!"), "Hello\\. World\\!");
/// ```
pub fn escape_markdown_v2(text: &str) -> String {
    let mut result = String::with_capacity(text.len() * 2);

    for c in text.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '=' | '|' | '{' | '}' | '.'
            | '!' => {
                result.push('\\');
                result.push(c);
            }
            _ => result.push(c),
        }
    }

    result
}

/// Formats a duration in seconds as `M:SS` or `H:MM:SS`.
///
/// Zero or unknown duration renders as "N/A", matching the search result
/// listing where many flat-extracted entries carry no duration.
pub fn format_duration(seconds: u32) -> String {
    if seconds == 0 {
        return "N/A".to_string();
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Formats a byte count as a human-readable size string.
pub fn format_file_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Formats a view count as a compact string (1.2K, 3.4M).
pub fn format_view_count(count: u64) -> String {
    if count < 1_000 {
        count.to_string()
    } else if count < 1_000_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else if count < 1_000_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else {
        format!("{:.1}B", count as f64 / 1_000_000_000.0)
    }
}

/// Truncates a button label to `max_chars`, appending an ellipsis.
///
/// Operates on char boundaries; Telegram button labels have a hard byte limit
/// and long titles make the keyboard unreadable anyway.
pub fn truncate_label(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_filename_reserved_chars() {
        assert_eq!(escape_filename("a:b*c?d"), "a_b_c_d");
        assert_eq!(escape_filename("quote\"here"), "quote'here");
    }

    #[test]
    fn test_escape_filename_empty_becomes_unnamed() {
        assert_eq!(escape_filename("   "), "unnamed");
        assert_eq!(escape_filename("..."), "unnamed");
    }

    #[test]
    fn test_escape_markdown_v2() {
        assert_eq!(escape_markdown_v2("a_b"), "a\\_b");
        assert_eq!(escape_markdown_v2("(x)"), "\\(x\\)");
        assert_eq!(escape_markdown_v2("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "N/A");
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(75), "1:15");
        assert_eq!(format_duration(3671), "1:01:11");
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(2048), "2.0 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_format_view_count() {
        assert_eq!(format_view_count(999), "999");
        assert_eq!(format_view_count(1_500), "1.5K");
        assert_eq!(format_view_count(2_300_000), "2.3M");
        assert_eq!(format_view_count(1_400_000_000), "1.4B");
    }

    #[test]
    fn test_truncate_label() {
        assert_eq!(truncate_label("short", 10), "short");
        assert_eq!(truncate_label("a very long track title", 10), "a very ...");
    }
}
