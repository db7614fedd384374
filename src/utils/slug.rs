// src/utils/slug.rs

use std::sync::LazyLock;

use regex::Regex;

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("static slug pattern"));

/// Lowercase ASCII words joined by `-`. Falls back to `survey`.
pub fn slugify(title: &str) -> String {
    let lower = fold_ascii(title).to_ascii_lowercase();
    let slug = NON_ALNUM.replace_all(&lower, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "survey".to_string()
    } else {
        slug.chars().take(80).collect::<String>().trim_end_matches('-').to_string()
    }
}

/// Public slug of a stored survey: the title slug plus the survey number.
pub fn survey_slug(base: &str, id: i64) -> String {
    format!("{}-{}", base, id)
}

/// Maps common Latin letters with diacritics to ASCII so they survive slugging.
fn fold_ascii(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'ç' | 'Ç' => 'c',
            'ğ' | 'Ğ' => 'g',
            'ı' | 'İ' => 'i',
            'ö' | 'Ö' | 'ø' => 'o',
            'ş' | 'Ş' => 's',
            'ü' | 'Ü' | 'ú' | 'ù' | 'û' => 'u',
            'á' | 'à' | 'â' | 'ä' | 'å' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' => 'o',
            'ñ' => 'n',
            'ß' => 's',
            other => other,
        })
        .collect()
}
