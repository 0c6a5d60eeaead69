//! Accent stripping for sinks whose fonts only cover ASCII.

/// Accented Vietnamese letters and the base letter each collapses to.
pub const DIACRITIC_TABLE: [(&str, char); 14] = [
    ("àáạảãâầấậẩẫăằắặẳẵ", 'a'),
    ("èéẹẻẽêềếệểễ", 'e'),
    ("ìíịỉĩ", 'i'),
    ("òóọỏõôồốộổỗơờớợởỡ", 'o'),
    ("ùúụủũưừứựửữ", 'u'),
    ("ỳýỵỷỹ", 'y'),
    ("đ", 'd'),
    ("ÀÁẠẢÃÂẦẤẬẨẪĂẰẮẶẲẴ", 'A'),
    ("ÈÉẸẺẼÊỀẾỆỂỄ", 'E'),
    ("ÌÍỊỈĨ", 'I'),
    ("ÒÓỌỎÕÔỒỐỘỔỖƠỜỚỢỞỠ", 'O'),
    ("ÙÚỤỦŨƯỪỨỰỬỮ", 'U'),
    ("ỲÝỴỶỸ", 'Y'),
    ("Đ", 'D'),
];

fn base_letter(c: char) -> Option<char> {
    DIACRITIC_TABLE
        .iter()
        .find(|(accented, _)| accented.contains(c))
        .map(|(_, base)| *base)
}

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

/// Replaces every accented letter with its base letter, keeping case.
/// Decomposed input loses its combining marks the same way.
pub fn strip_diacritics(input: &str) -> String {
    input
        .chars()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| base_letter(c).unwrap_or(c))
        .collect()
}
