use std::sync::LazyLock;

use regex::Regex;

/// ICD-10 code after normalization: letter, two digits, optional subcategory.
static RE_ICD10: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][0-9]{2}[0-9A-Z]{0,4}$").expect("valid regex"));

/// Fold a lowercase Latin letter with diacritics to its base letters.
/// Covers the Latin-1 Supplement and Latin Extended-A blocks; ligatures
/// expand ("œ" -> "oe"). Characters outside those blocks pass through.
fn fold_char(ch: char) -> Option<&'static str> {
    let folded = match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => "c",
        'ð' | 'ď' | 'đ' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => "e",
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => "g",
        'ĥ' | 'ħ' => "h",
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => "i",
        'ĳ' => "ij",
        'ĵ' => "j",
        'ķ' | 'ĸ' => "k",
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => "l",
        'ñ' | 'ń' | 'ņ' | 'ň' | 'ŉ' | 'ŋ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => "o",
        'œ' => "oe",
        'ŕ' | 'ŗ' | 'ř' => "r",
        'ś' | 'ŝ' | 'ş' | 'š' | 'ſ' => "s",
        'ß' => "ss",
        'ţ' | 'ť' | 'ŧ' => "t",
        'þ' => "th",
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
        'ŵ' => "w",
        'ý' | 'ÿ' | 'ŷ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    };
    Some(folded)
}

/// Normalize free text for matching: lowercase, diacritics folded,
/// punctuation treated as whitespace, whitespace collapsed.
///
/// "Síndrome  Metabólica" and "sindrome-metabolica" both become
/// "sindrome metabolica".
pub fn normalize_text(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for ch in text.to_lowercase().chars() {
        match fold_char(ch) {
            Some(base) => folded.push_str(base),
            None if ch.is_alphanumeric() => folded.push(ch),
            None => folded.push(' '),
        }
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Comparable unit key: case, spacing and micro-sign variants collapsed.
pub fn unit_key(unit: &str) -> String {
    unit.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            'µ' | 'μ' => 'u',
            other => other,
        })
        .collect::<String>()
        .to_lowercase()
}

/// Normalize an ICD-10 code to its compact form ("e11.9" -> "E119").
/// Returns `None` for blank or malformed codes so they never drive a merge.
pub fn normalize_icd10(code: &str) -> Option<String> {
    let compact: String = code
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| !matches!(c, '.' | ' ' | '-'))
        .collect();
    if RE_ICD10.is_match(&compact) {
        Some(compact)
    } else {
        None
    }
}

/// Render a compact ICD-10 code with its conventional dot ("E119" -> "E11.9").
pub fn format_icd10(compact: &str) -> String {
    if compact.len() > 3 {
        format!("{}.{}", &compact[..3], &compact[3..])
    } else {
        compact.to_string()
    }
}

/// Format a lab value for display without trailing zeros.
pub fn format_value(value: f64) -> String {
    format!("{}", value)
}

/// Append `items` to `target`, skipping entries whose normalized text is already present.
pub fn extend_unique(target: &mut Vec<String>, items: &[String]) {
    for item in items {
        let key = normalize_text(item);
        if key.is_empty() {
            continue;
        }
        if !target.iter().any(|existing| normalize_text(existing) == key) {
            target.push(item.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_diacritics_and_case() {
        assert_eq!(normalize_text("Síndrome Metabólica"), "sindrome metabolica");
        assert_eq!(normalize_text("SÍNDROME METABÓLICA"), "sindrome metabolica");
    }

    #[test]
    fn normalize_folds_extended_latin_and_ligatures() {
        assert_eq!(normalize_text("Œdème"), "oedeme");
        assert_eq!(normalize_text("Blødning"), "blodning");
        assert_eq!(normalize_text("Gefäßverschluss"), "gefassverschluss");
        assert_eq!(normalize_text("Vérő"), "vero");
        assert_eq!(normalize_text("Łuszczyca"), "luszczyca");
    }

    #[test]
    fn unit_key_collapses_micro_sign_and_case() {
        assert_eq!(unit_key("µUI/mL"), unit_key("uUI/ml"));
        assert_eq!(unit_key("μmol / L"), "umol/l");
        assert_ne!(unit_key("g/L"), unit_key("g/dL"));
    }

    #[test]
    fn normalize_collapses_punctuation_and_whitespace() {
        assert_eq!(
            normalize_text("  Diabetes   Mellitus, tipo-2 "),
            "diabetes mellitus tipo 2"
        );
    }

    #[test]
    fn normalize_icd10_variants() {
        assert_eq!(normalize_icd10("E11.9").as_deref(), Some("E119"));
        assert_eq!(normalize_icd10(" e11 ").as_deref(), Some("E11"));
        assert_eq!(normalize_icd10("E03.9").as_deref(), Some("E039"));
    }

    #[test]
    fn normalize_icd10_rejects_garbage() {
        assert!(normalize_icd10("").is_none());
        assert!(normalize_icd10("N/A").is_none());
        assert!(normalize_icd10("diabetes").is_none());
    }

    #[test]
    fn format_icd10_reinserts_dot() {
        assert_eq!(format_icd10("E119"), "E11.9");
        assert_eq!(format_icd10("E11"), "E11");
    }

    #[test]
    fn format_value_trims_zeros() {
        assert_eq!(format_value(92.0), "92");
        assert_eq!(format_value(5.1), "5.1");
    }

    #[test]
    fn extend_unique_dedups_normalized() {
        let mut target = vec!["HbA1c".to_string()];
        extend_unique(
            &mut target,
            &["hba1c".to_string(), "Peptídeo C".to_string(), "".to_string()],
        );
        assert_eq!(target, vec!["HbA1c".to_string(), "Peptídeo C".to_string()]);
    }
}
