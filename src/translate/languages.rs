//! Language codes accepted by the DeepL translate endpoint.

const TARGET_LANGUAGES: &[&str] = &[
    "AR", "BG", "CS", "DA", "DE", "EL", "EN", "EN-GB", "EN-US", "ES", "ET", "FI", "FR", "HU",
    "ID", "IT", "JA", "KO", "LT", "LV", "NB", "NL", "PL", "PT", "PT-BR", "PT-PT", "RO", "RU",
    "SK", "SL", "SV", "TR", "UK", "ZH", "ZH-HANS", "ZH-HANT",
];

const SOURCE_LANGUAGES: &[&str] = &[
    "AR", "BG", "CS", "DA", "DE", "EL", "EN", "ES", "ET", "FI", "FR", "HU", "ID", "IT", "JA",
    "KO", "LT", "LV", "NB", "NL", "PL", "PT", "RO", "RU", "SK", "SL", "SV", "TR", "UK", "ZH",
];

/// Upper-cases and turns `en_us` style separators into `EN-US`.
pub fn normalize_lang(code: &str) -> String {
    code.trim().replace('_', "-").to_ascii_uppercase()
}

pub fn is_supported_target(code: &str) -> bool {
    TARGET_LANGUAGES.contains(&normalize_lang(code).as_str())
}

pub fn is_supported_source(code: &str) -> bool {
    SOURCE_LANGUAGES.contains(&normalize_lang(code).as_str())
}
