//! MaungQL lexer
//!
//! Statements are split on whitespace after the comparison operators have
//! been padded so that `gaji>5` tokenizes like `gaji > 5`. Two-character
//! operators (`>=`, `<=`, `!=`) are kept whole.

/// Trim surrounding whitespace and a trailing `;`
pub fn clean(source: &str) -> &str {
    let trimmed = source.trim();
    trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end()
}

/// Pad comparison operators with spaces
pub fn normalize(query: &str) -> String {
    let mut out = String::with_capacity(query.len() + 16);
    let mut chars = query.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '>' | '<' | '!' if chars.peek() == Some(&'=') => {
                chars.next();
                out.push(' ');
                out.push(ch);
                out.push_str("= ");
            }
            '=' | '>' | '<' => {
                out.push(' ');
                out.push(ch);
                out.push(' ');
            }
            _ => out.push(ch),
        }
    }

    out
}

/// Normalize and split into whitespace-separated tokens
pub fn tokenize(query: &str) -> Vec<String> {
    normalize(query)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// The text remaining after skipping `n` whitespace-separated words
pub fn skip_words(source: &str, n: usize) -> &str {
    let mut rest = source.trim_start();
    for _ in 0..n {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = rest[end..].trim_start();
    }
    rest.trim_end()
}

/// Strip one layer of matching `'` or `"` quotes
pub fn unquote(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
