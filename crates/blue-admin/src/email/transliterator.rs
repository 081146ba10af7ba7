use regex::Regex;
use std::sync::LazyLock;

use super::normalizer::strip_marks;

const VAV: char = 'ו';
const YOD: char = 'י';

static SH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)s+h").expect("valid digraph regex"));
static TZ_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)t+z").expect("valid digraph regex"));
static KH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)k+h").expect("valid digraph regex"));

fn is_hebrew_letter(ch: char) -> bool {
    matches!(
        ch,
        'א' | 'ב' | 'ג' | 'ד' | 'ה' | 'ו' | 'ז' | 'ח' | 'ט' | 'י' | 'כ' | 'ך' | 'ל' | 'מ' | 'ם'
            | 'נ' | 'ן' | 'ס' | 'ע' | 'פ' | 'ף' | 'צ' | 'ץ' | 'ק' | 'ר' | 'ש' | 'ת'
    )
}

/// Vav and yod double as vowels, so they never count as consonant neighbours.
fn is_plain_consonant(ch: Option<char>) -> bool {
    matches!(ch, Some(c) if is_hebrew_letter(c) && c != VAV && c != YOD)
}

fn latin_for(ch: char) -> Option<&'static str> {
    let latin = match ch {
        'א' | 'ע' | '\'' => "",
        'ב' => "b",
        'ג' => "g",
        'ד' => "d",
        'ה' => "h",
        'ז' => "z",
        'ח' => "kh",
        'ט' | 'ת' => "t",
        'כ' | 'ך' | 'ק' => "k",
        'ל' => "l",
        'מ' | 'ם' => "m",
        'נ' | 'ן' => "n",
        'ס' => "s",
        'פ' => "p",
        'ף' => "f",
        'צ' | 'ץ' => "tz",
        'ר' => "r",
        'ש' => "sh",
        _ => return None,
    };
    Some(latin)
}

fn vav_sound(prev: Option<char>, next: Option<char>) -> char {
    let prev_consonant = is_plain_consonant(prev);
    let next_consonant = is_plain_consonant(next);

    let between_consonants = prev_consonant && next_consonant;
    let leading = prev.is_none() && next_consonant;
    let trailing = prev_consonant && next.is_none();

    if between_consonants || leading || trailing {
        'o'
    } else {
        'v'
    }
}

/// Transliterates a single word token. Neighbour checks look at the raw
/// Hebrew characters, never at the Latin output built so far.
pub(crate) fn transliterate_word(word: &str) -> String {
    let chars: Vec<char> = strip_marks(word).chars().collect();
    let mut out = String::with_capacity(chars.len() * 2);

    for (index, &ch) in chars.iter().enumerate() {
        let prev = index.checked_sub(1).and_then(|i| chars.get(i)).copied();
        let next = chars.get(index + 1).copied();

        match ch {
            VAV => out.push(vav_sound(prev, next)),
            YOD if index == 0 => out.push('y'),
            YOD => out.push('i'),
            other => match latin_for(other) {
                Some(latin) => out.push_str(latin),
                None => out.push(other),
            },
        }
    }

    out
}

/// Collapses repeated Latin letters (`aa` -> `a`) then restores the
/// `sh`, `tz` and `kh` digraphs.
pub(crate) fn compress_repeats(word: &str) -> String {
    let mut compressed = String::with_capacity(word.len());
    let mut last: Option<char> = None;

    for ch in word.chars() {
        if ch.is_ascii_alphabetic() && last.is_some_and(|prev| prev.eq_ignore_ascii_case(&ch)) {
            continue;
        }
        compressed.push(ch);
        last = Some(ch);
    }

    let restored = SH_RE.replace_all(&compressed, "sh");
    let restored = TZ_RE.replace_all(&restored, "tz");
    KH_RE.replace_all(&restored, "kh").into_owned()
}
