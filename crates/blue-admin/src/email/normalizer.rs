/// Hebrew vowel points, dagesh and the shin/sin dots.
fn is_nikkud(ch: char) -> bool {
    matches!(ch, '\u{05B0}'..='\u{05BC}' | '\u{05C1}' | '\u{05C2}')
}

/// Geresh, gershayim and plain double quotes.
fn is_hebrew_quote(ch: char) -> bool {
    matches!(ch, '\u{05F3}' | '\u{05F4}' | '"')
}

pub(crate) fn strip_marks(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !is_nikkud(*ch) && !is_hebrew_quote(*ch))
        .collect()
}

/// Replaces every run of `target` with a single occurrence.
pub(crate) fn collapse_runs(value: &str, target: char) -> String {
    let mut out = String::with_capacity(value.len());
    let mut previous = None;
    for ch in value.chars() {
        if ch == target && previous == Some(target) {
            continue;
        }
        out.push(ch);
        previous = Some(ch);
    }
    out
}

fn collapse_whitespace(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_space = false;
    for ch in value.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

/// First-stage cleanup of a raw Hebrew name. Hebrew letters are kept.
pub(crate) fn clean_name(value: &str) -> String {
    let stripped = strip_marks(value);
    let spaced = collapse_whitespace(&stripped);
    collapse_runs(&spaced, '-').trim().to_string()
}

fn is_allowed_latin(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') || ch.is_whitespace()
}

/// Collapses separators and drops everything outside `[a-zA-Z0-9.\-_\s]`.
pub(crate) fn normalize_latin(text: &str) -> String {
    let spaced = collapse_whitespace(text.trim());
    let dashed = collapse_runs(&spaced, '-');
    let dotted = collapse_runs(&dashed, '.');
    let filtered: String = dotted.chars().filter(|ch| is_allowed_latin(*ch)).collect();
    filtered.trim().to_string()
}
