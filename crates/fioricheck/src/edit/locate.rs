//
// edit/locate.rs
//
// Byte-offset helpers for lines, indentation and delimiters
//

/// Offset of the first byte of the line containing `offset`
pub fn line_start(text: &str, offset: usize) -> usize {
    text[..offset.min(text.len())]
        .rfind('\n')
        .map(|i| i + 1)
        .unwrap_or(0)
}

/// Whitespace prefix of the line containing `offset`
pub fn line_indent(text: &str, offset: usize) -> &str {
    let start = line_start(text, offset);
    let rest = &text[start..];
    let len = rest
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(rest.len());
    &rest[..len]
}

/// Whether only indentation precedes `offset` on its line
pub fn starts_line(text: &str, offset: usize) -> bool {
    let start = line_start(text, offset);
    text[start..offset].chars().all(|c| c == ' ' || c == '\t')
}

/// Offset just past spaces and tabs starting at `offset`
pub fn skip_blanks(text: &str, offset: usize) -> usize {
    let rest = &text[offset..];
    offset
        + rest
            .find(|c: char| c != ' ' && c != '\t')
            .unwrap_or(rest.len())
}

/// Offset just past a line break at `offset` (`\n` or `\r\n`), if any
pub fn skip_newline(text: &str, offset: usize) -> Option<usize> {
    let rest = &text[offset..];
    if rest.starts_with("\r\n") {
        Some(offset + 2)
    } else if rest.starts_with('\n') {
        Some(offset + 1)
    } else {
        None
    }
}

/// Offset where the line break ending the previous line begins, or the
/// start of the line containing `offset` on the first line
pub fn line_break_before(text: &str, offset: usize) -> usize {
    let start = line_start(text, offset);
    if text[..start].ends_with("\r\n") {
        start - 2
    } else if text[..start].ends_with('\n') {
        start - 1
    } else {
        start
    }
}

/// Offset of the first of the spaces and tabs directly before `offset`
pub fn blanks_before(text: &str, offset: usize) -> usize {
    text[..offset].trim_end_matches([' ', '\t']).len()
}

/// Whether `text[start..end]` holds only whitespace
pub fn is_blank(text: &str, start: usize, end: usize) -> bool {
    text[start..end].trim().is_empty()
}

/// Line ending used by the document: `\r\n` when its first line break is
/// one, else `\n`
pub fn line_ending(text: &str) -> &'static str {
    match text.find('\n') {
        Some(i) if text[..i].ends_with('\r') => "\r\n",
        _ => "\n",
    }
}

/// Rewrite the `\n` line breaks of rendered text to `eol`. Rendered JSON
/// has no raw line breaks inside strings.
pub fn with_line_ending(rendered: String, eol: &str) -> String {
    if eol == "\n" {
        rendered
    } else {
        rendered.replace('\n', eol)
    }
}

/// Offset of the first `delimiter` after `offset` that is preceded only by
/// whitespace
pub fn next_delimiter(text: &str, offset: usize, delimiter: char) -> Option<usize> {
    let rest = &text[offset..];
    let found = rest.find(|c: char| !c.is_whitespace())?;
    rest[found..].starts_with(delimiter).then_some(offset + found)
}

/// Whether `text[start..end]` spans a single line
pub fn is_single_line(text: &str, start: usize, end: usize) -> bool {
    !text[start..end].contains('\n')
}

/// Indent unit of a document: a tab when lines are tab-indented, else the
/// smallest positive run of leading spaces, else `default` spaces.
pub fn detect_indent_unit(text: &str, default: usize) -> String {
    let mut smallest: Option<usize> = None;
    for line in text.lines() {
        if line.starts_with('\t') {
            return "\t".to_string();
        }
        let spaces = line.len() - line.trim_start_matches(' ').len();
        if spaces > 0 && spaces < line.len() {
            smallest = Some(smallest.map_or(spaces, |s| s.min(spaces)));
        }
    }
    " ".repeat(smallest.unwrap_or(default))
}
