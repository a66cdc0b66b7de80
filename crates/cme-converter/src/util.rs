//! Shared text helpers for Markdown output.

/// Collapse runs of HTML whitespace into a single space.
///
/// Non-breaking spaces are content, not whitespace, and are kept.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if matches!(c, ' ' | '\t' | '\n' | '\r' | '\u{000c}') {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Escape backslashes and characters that would start emphasis in Markdown text.
pub(crate) fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape a marker at the start of a paragraph line that would open a
/// heading, quote, list item or thematic break.
///
/// Ordered-list markers (`1.`, `2)`) are escaped only when followed by a
/// space or the end of the line.
pub(crate) fn escape_line_start(line: &str) -> String {
    let body = line.trim_start();
    let indent = &line[..line.len() - body.len()];
    if body.starts_with(['#', '>', '-', '+', '=']) {
        return format!("{indent}\\{body}");
    }

    let digits = body.len() - body.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let rest = &body[digits..];
    let ordered = (1..=9).contains(&digits)
        && rest.starts_with(['.', ')'])
        && (rest.len() == 1 || rest[1..].starts_with(' '));
    if ordered {
        format!("{indent}{}\\{rest}", &body[..digits])
    } else {
        line.to_owned()
    }
}

/// Longest run of `c` in `text`.
pub(crate) fn longest_run(text: &str, c: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for ch in text.chars() {
        if ch == c {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// Wrap inline content in a delimiter pair, keeping surrounding whitespace
/// outside the delimiters (`** a **` is not emphasis in Markdown).
pub(crate) fn wrap_inline(content: &str, marker: &str) -> String {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return content.to_owned();
    }
    let leading = if content.starts_with(char::is_whitespace) {
        " "
    } else {
        ""
    };
    let trailing = if content.ends_with(char::is_whitespace) {
        " "
    } else {
        ""
    };
    format!("{leading}{marker}{trimmed}{marker}{trailing}")
}

/// Render text as an inline code span, growing the fence past any backtick
/// run inside the text.
pub(crate) fn code_span(text: &str) -> String {
    let fence = "`".repeat(longest_run(text, '`') + 1);
    if text.starts_with('`') || text.ends_with('`') {
        format!("{fence} {text} {fence}")
    } else {
        format!("{fence}{text}{fence}")
    }
}

/// Prefix every line of `text`; empty lines get the trimmed prefix.
pub(crate) fn prefix_lines(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                prefix.trim_end().to_owned()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
