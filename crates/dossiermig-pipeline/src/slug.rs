//! ASCII slugs used to keep provenance in fallback filenames.

/// Lower-case ASCII slug; runs of other characters collapse to one `-`.
/// An empty result becomes `n-a`.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for ch in text.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if let Some(folded) = fold(ch) {
            slug.push_str(folded);
        } else if !ch.is_alphanumeric() && !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let trimmed = slug.trim_end_matches('-');
    if trimmed.is_empty() {
        "n-a".to_string()
    } else {
        trimmed.to_string()
    }
}

const fn fold(ch: char) -> Option<&'static str> {
    let folded = match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' => "a",
        'æ' => "ae",
        'ç' | 'č' | 'ć' => "c",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'ī' => "i",
        'ĳ' => "ij",
        'ñ' | 'ń' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' => "o",
        'œ' => "oe",
        'ß' => "ss",
        'š' | 'ś' => "s",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' => "u",
        'ý' | 'ÿ' => "y",
        'ž' | 'ź' | 'ż' => "z",
        _ => return None,
    };
    Some(folded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_collapse_and_trim() {
        assert_eq!(slugify("10 - Acme/Overig/Brieven"), "10-acme-overig-brieven");
        assert_eq!(slugify("//a__b//"), "a-b");
    }

    #[test]
    fn accents_fold_to_ascii() {
        assert_eq!(slugify("Café Müller/Überzicht"), "cafe-muller-uberzicht");
        assert_eq!(slugify("Straße"), "strasse");
    }

    #[test]
    fn empty_input_becomes_placeholder() {
        assert_eq!(slugify(""), "n-a");
        assert_eq!(slugify("///"), "n-a");
        assert_eq!(slugify("日本"), "n-a");
    }
}
