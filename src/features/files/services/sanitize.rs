//! File name normalization for storage keys and fetch URLs

/// Used when nothing of the original name survives sanitization
const FALLBACK_NAME: &str = "file";

/// ASCII spelling of a non-ASCII letter, if it has one
fn ascii_equivalent(c: char) -> Option<&'static str> {
    let s = match c {
        'ä' => "ae",
        'ö' => "oe",
        'ü' => "ue",
        'Ä' => "Ae",
        'Ö' => "Oe",
        'Ü' => "Ue",
        'ß' => "ss",
        'ẞ' => "SS",
        'æ' => "ae",
        'Æ' => "AE",
        'œ' => "oe",
        'Œ' => "OE",
        'þ' => "th",
        'Þ' => "Th",
        'à' | 'á' | 'â' | 'ã' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'À' | 'Á' | 'Â' | 'Ã' | 'Å' | 'Ā' | 'Ă' | 'Ą' => "A",
        'ç' | 'ć' | 'č' => "c",
        'Ç' | 'Ć' | 'Č' => "C",
        'ď' | 'đ' | 'ð' => "d",
        'Ď' | 'Đ' | 'Ð' => "D",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => "e",
        'È' | 'É' | 'Ê' | 'Ë' | 'Ē' | 'Ė' | 'Ę' | 'Ě' => "E",
        'ğ' => "g",
        'Ğ' => "G",
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' | 'ı' => "i",
        'Ì' | 'Í' | 'Î' | 'Ï' | 'Ī' | 'Į' | 'İ' => "I",
        'ł' => "l",
        'Ł' => "L",
        'ñ' | 'ń' | 'ň' => "n",
        'Ñ' | 'Ń' | 'Ň' => "N",
        'ò' | 'ó' | 'ô' | 'õ' | 'ø' | 'ō' | 'ő' => "o",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ø' | 'Ō' | 'Ő' => "O",
        'ř' => "r",
        'Ř' => "R",
        'ś' | 'š' | 'ş' => "s",
        'Ś' | 'Š' | 'Ş' => "S",
        'ť' | 'ţ' => "t",
        'Ť' | 'Ţ' => "T",
        'ù' | 'ú' | 'û' | 'ů' | 'ū' | 'ű' | 'ų' => "u",
        'Ù' | 'Ú' | 'Û' | 'Ů' | 'Ū' | 'Ű' | 'Ų' => "U",
        'ý' | 'ÿ' => "y",
        'Ý' | 'Ÿ' => "Y",
        'ź' | 'ż' | 'ž' => "z",
        'Ź' | 'Ż' | 'Ž' => "Z",
        _ => return None,
    };
    Some(s)
}

/// Replace supported accented letters with their ASCII spelling.
///
/// Characters without a known spelling are kept as-is.
pub fn transliterate(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match ascii_equivalent(c) {
            Some(ascii) => out.push_str(ascii),
            None => out.push(c),
        }
    }
    out
}

/// Transliterate, then drop whatever is still outside ASCII
pub fn ascii_only(input: &str) -> String {
    transliterate(input).chars().filter(char::is_ascii).collect()
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// Delete every character outside `[0-9A-Za-z._-]`
pub fn strip_special_chars(input: &str) -> String {
    input.chars().filter(|c| is_allowed(*c)).collect()
}

/// Storage-safe form of a display name: transliterated, whitespace turned
/// into `_`, everything outside the allow-set removed.
pub fn sanitize_file_name(display_name: &str) -> String {
    let spaced: String = transliterate(display_name.trim())
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();

    let clean = strip_special_chars(&spaced);
    if clean.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::{Fake, Faker};

    /// `needle` appears in `haystack` in order, gaps allowed
    fn is_subsequence(needle: &str, haystack: &str) -> bool {
        let mut rest = haystack.chars();
        needle.chars().all(|c| rest.any(|h| h == c))
    }

    #[test]
    fn test_sanitize_example_name() {
        assert_eq!(sanitize_file_name("Bérícht ß.pdf"), "Bericht_ss.pdf");
    }

    #[test]
    fn test_umlauts_expand_to_two_letters() {
        assert_eq!(transliterate("Äpfel über Öfen"), "Aepfel ueber Oefen");
    }

    #[test]
    fn test_ascii_only_keeps_spaces_and_punctuation() {
        assert_eq!(ascii_only("Bérícht ß (1).pdf"), "Bericht ss (1).pdf");
        assert_eq!(ascii_only("日本語 notes.txt"), " notes.txt");
    }

    #[test]
    fn test_strip_special_chars() {
        assert_eq!(strip_special_chars("a b/c\\d?e*f.txt"), "abcdef.txt");
        assert_eq!(strip_special_chars("report_v1-final.PDF"), "report_v1-final.PDF");
    }

    #[test]
    fn test_sanitize_falls_back_when_nothing_survives() {
        assert_eq!(sanitize_file_name("日本語"), "file");
        assert_eq!(sanitize_file_name("日本語.pdf"), ".pdf");
    }

    #[test]
    fn test_sanitized_names_only_contain_allowed_chars_in_order() {
        for _ in 0..200 {
            let name: String = Faker.fake();
            let sanitized = sanitize_file_name(&name);

            assert!(sanitized.chars().all(is_allowed), "{:?} -> {:?}", name, sanitized);

            let allowed_in_input: String = name.trim().chars().filter(|c| is_allowed(*c)).collect();
            if !allowed_in_input.is_empty() {
                assert!(
                    is_subsequence(&allowed_in_input, &sanitized),
                    "{:?} -> {:?}",
                    name,
                    sanitized
                );
            }
        }
    }

    #[test]
    fn test_transliteration_is_idempotent() {
        let samples = [
            "Bérícht ß.pdf",
            "Ærøskøbing Œuvre",
            "Łódź Žluťoučký kůň",
            "İstanbul Ğ ş",
            "ÄÖÜ äöü ẞ",
        ];
        for sample in samples {
            let once = transliterate(sample);
            assert_eq!(transliterate(&once), once);
            assert!(once.is_ascii(), "{:?} -> {:?}", sample, once);
        }
    }
}
