//! Book title to file name mapping
//!
//! Document names must be stable across runs (the same title always maps to
//! the same path) and safe on every WebDAV server and filesystem, so the
//! result is plain ASCII letters, digits, underscores and a few symbols.

use crate::remote::join_remote_path;

/// Longest file stem produced, in characters
pub const MAX_FILENAME_LEN: usize = 128;

/// Stem used when nothing usable is left of a title
const FALLBACK_NAME: &str = "unknown";

/// Characters that never appear in a file name
const STRIPPED: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', '(', ')', '.'];

/// Map a book title to a file stem
///
/// - reserved characters and non-Latin code points become spaces
/// - accented Latin letters lose their accents
/// - whitespace runs become a single underscore
/// - leading/trailing underscores are dropped
/// - the result is cut to 128 characters
pub fn sanitize_filename(title: &str) -> String {
    let mut mapped = String::with_capacity(title.len());
    for c in title.chars() {
        if STRIPPED.contains(&c) {
            mapped.push(' ');
        } else if c.is_ascii() {
            mapped.push(c);
        } else if let Some(ascii) = fold_latin(c) {
            mapped.push_str(ascii);
        } else {
            mapped.push(' ');
        }
    }

    let joined = mapped.split_whitespace().collect::<Vec<_>>().join("_");
    let trimmed = joined.trim_matches('_');
    if trimmed.is_empty() {
        return FALLBACK_NAME.to_string();
    }

    // Everything left is ASCII, so byte and char positions agree
    let truncated = &trimmed[..trimmed.len().min(MAX_FILENAME_LEN)];
    let truncated = truncated.trim_end_matches('_');
    if truncated.is_empty() {
        return FALLBACK_NAME.to_string();
    }
    truncated.to_string()
}

/// Canonical store path of a book's document
pub fn document_path(base_path: &str, title: &str) -> String {
    join_remote_path(base_path, &format!("{}.md", sanitize_filename(title)))
}

/// Unaccented form of a Latin letter, if it has one
fn fold_latin(c: char) -> Option<&'static str> {
    let folded = match c {
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ā' | 'Ă' | 'Ą' => "A",
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'Æ' => "AE",
        'æ' => "ae",
        'Ç' | 'Ć' | 'Ĉ' | 'Ċ' | 'Č' => "C",
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => "c",
        'Ď' | 'Đ' | 'Ð' => "D",
        'ď' | 'đ' | 'ð' => "d",
        'È' | 'É' | 'Ê' | 'Ë' | 'Ē' | 'Ĕ' | 'Ė' | 'Ę' | 'Ě' => "E",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => "e",
        'Ĝ' | 'Ğ' | 'Ġ' | 'Ģ' => "G",
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => "g",
        'Ĥ' | 'Ħ' => "H",
        'ĥ' | 'ħ' => "h",
        'Ì' | 'Í' | 'Î' | 'Ï' | 'Ĩ' | 'Ī' | 'Ĭ' | 'Į' | 'İ' => "I",
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => "i",
        'Ĵ' => "J",
        'ĵ' => "j",
        'Ķ' => "K",
        'ķ' => "k",
        'Ĺ' | 'Ļ' | 'Ľ' | 'Ŀ' | 'Ł' => "L",
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => "l",
        'Ñ' | 'Ń' | 'Ņ' | 'Ň' => "N",
        'ñ' | 'ń' | 'ņ' | 'ň' => "n",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'Ō' | 'Ŏ' | 'Ő' => "O",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => "o",
        'Œ' => "OE",
        'œ' => "oe",
        'Ŕ' | 'Ŗ' | 'Ř' => "R",
        'ŕ' | 'ŗ' | 'ř' => "r",
        'Ś' | 'Ŝ' | 'Ş' | 'Š' => "S",
        'ś' | 'ŝ' | 'ş' | 'š' => "s",
        'ß' => "ss",
        'Ţ' | 'Ť' | 'Ŧ' => "T",
        'ţ' | 'ť' | 'ŧ' => "t",
        'Þ' => "TH",
        'þ' => "th",
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ũ' | 'Ū' | 'Ŭ' | 'Ů' | 'Ű' | 'Ų' => "U",
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
        'Ŵ' => "W",
        'ŵ' => "w",
        'Ý' | 'Ŷ' | 'Ÿ' => "Y",
        'ý' | 'ÿ' | 'ŷ' => "y",
        'Ź' | 'Ż' | 'Ž' => "Z",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    };
    Some(folded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_title() {
        assert_eq!(sanitize_filename("Book Title"), "Book_Title");
    }

    #[test]
    fn test_problematic_characters() {
        assert_eq!(
            sanitize_filename("Book/Title\\With:Problems?"),
            "Book_Title_With_Problems"
        );
        assert_eq!(
            sanitize_filename("Book/Title\\With:Many*Problems?\"<>|"),
            "Book_Title_With_Many_Problems"
        );
    }

    #[test]
    fn test_parentheses_and_dots() {
        assert_eq!(sanitize_filename("  Book Title  ."), "Book_Title");
        assert_eq!(
            sanitize_filename("Dune (Dune Chronicles, Book 1)"),
            "Dune_Dune_Chronicles,_Book_1"
        );
    }

    #[test]
    fn test_empty_and_punctuation_only() {
        assert_eq!(sanitize_filename(""), "unknown");
        assert_eq!(sanitize_filename("  ...  "), "unknown");
        assert_eq!(sanitize_filename("/\\:*?\"<>|"), "unknown");
        assert_eq!(sanitize_filename("___"), "unknown");
    }

    #[test]
    fn test_accents_folded_and_other_scripts_dropped() {
        assert_eq!(
            sanitize_filename("Book Título with émojis 😀"),
            "Book_Titulo_with_emojis"
        );
        assert_eq!(
            sanitize_filename("Normal Title with Special Chars àáâã"),
            "Normal_Title_with_Special_Chars_aaaa"
        );
        assert_eq!(sanitize_filename("Les Misérables"), "Les_Miserables");
        assert_eq!(sanitize_filename("Война и мир"), "unknown");
    }

    #[test]
    fn test_truncation() {
        assert_eq!(sanitize_filename(&"a".repeat(128)), "a".repeat(128));
        assert_eq!(sanitize_filename(&"a".repeat(150)), "a".repeat(128));

        let long = "Very Long Book Title ".repeat(10);
        assert_eq!(
            sanitize_filename(&long),
            "Very_Long_Book_Title_Very_Long_Book_Title_Very_Long_Book_Title_Very_Long_Book_Title_Very_Long_Book_Title_Very_Long_Book_Title_Ve"
        );
    }

    #[test]
    fn test_trailing_underscores_after_truncation() {
        let title = format!("{}____", "a".repeat(125));
        assert_eq!(sanitize_filename(&title), "a".repeat(125));
    }

    #[test]
    fn test_leading_and_trailing_underscores() {
        assert_eq!(sanitize_filename("_Book Title_"), "Book_Title");
    }

    #[test]
    fn test_output_is_ascii_without_spaces() {
        let titles = ["Ça va? Ünïcödé — test", "日本語のタイトル", "tab\tand\nnewline"];
        for title in titles {
            let name = sanitize_filename(title);
            assert!(name.is_ascii());
            assert!(!name.contains(' '));
            assert!(name.len() <= MAX_FILENAME_LEN);
        }
    }

    #[test]
    fn test_document_path() {
        assert_eq!(
            document_path("/kobo-highlights", "The Great Gatsby"),
            "/kobo-highlights/The_Great_Gatsby.md"
        );
        assert_eq!(document_path("/kobo-highlights", "Война и мир"), "/kobo-highlights/unknown.md");
    }
}
