//! Language registry: the closed set of codes the bot accepts.
//!
//! Two static tables (primary languages, regional variants) merged with
//! first-match-wins lookup. Validation and reply formatting both go through
//! `resolve` so the accepted set and the displayed set never drift apart.

use std::fmt;

/// A language code held in canonical case: lowercase primary subtag,
/// uppercase region subtag (`en`, `id`, `zh-CN`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LangCode(String);

impl LangCode {
    /// Builds a code from arbitrary user casing (`ZH-cn` becomes `zh-CN`).
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        let canonical = match trimmed.split_once('-') {
            Some((primary, region)) => {
                format!("{}-{}", primary.to_lowercase(), region.to_uppercase())
            }
            None => trimmed.to_lowercase(),
        };
        Self(canonical)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LangCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Primary languages the bot offers.
const PRIMARY_LANGUAGES: &[(&str, &str)] = &[
    ("id", "Indonesian"),
    ("en", "English"),
    ("zh", "Chinese"),
];

/// Regional variants accepted alongside the primary table. The bare `zh`
/// entry is shadowed by the primary table on lookup.
const REGIONAL_VARIANTS: &[(&str, &str)] = &[
    ("zh", "Chinese (Auto)"),
    ("zh-CN", "Chinese (Simplified)"),
    ("zh-TW", "Chinese (Traditional)"),
    ("zh-HK", "Chinese (Hong Kong)"),
];

/// Display name for a canonical code, or `None` when the code is not in the
/// registry. The primary table wins over the variant table.
pub fn resolve(code: &LangCode) -> Option<&'static str> {
    PRIMARY_LANGUAGES
        .iter()
        .chain(REGIONAL_VARIANTS)
        .find(|(c, _)| *c == code.as_str())
        .map(|(_, name)| *name)
}

pub fn is_supported(code: &LangCode) -> bool {
    resolve(code).is_some()
}

/// Canonical codes in registry order, duplicates collapsed.
pub fn supported_codes() -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for &(code, _) in PRIMARY_LANGUAGES.iter().chain(REGIONAL_VARIANTS) {
        if !out.contains(&code) {
            out.push(code);
        }
    }
    out
}

pub fn primary_languages() -> &'static [(&'static str, &'static str)] {
    PRIMARY_LANGUAGES
}

pub fn regional_variants() -> &'static [(&'static str, &'static str)] {
    REGIONAL_VARIANTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_casing() {
        assert_eq!(LangCode::new("EN").as_str(), "en");
        assert_eq!(LangCode::new("zh-cn").as_str(), "zh-CN");
        assert_eq!(LangCode::new("ZH-tw").as_str(), "zh-TW");
        assert_eq!(LangCode::new("  id ").as_str(), "id");
    }

    #[test]
    fn resolves_primary_before_variants() {
        assert_eq!(resolve(&LangCode::new("zh")), Some("Chinese"));
        assert_eq!(resolve(&LangCode::new("zh-CN")), Some("Chinese (Simplified)"));
        assert_eq!(resolve(&LangCode::new("id")), Some("Indonesian"));
    }

    #[test]
    fn rejects_unknown_codes() {
        assert_eq!(resolve(&LangCode::new("xx")), None);
        assert!(!is_supported(&LangCode::new("fr")));
        assert!(is_supported(&LangCode::new("ZH-HK")));
    }

    #[test]
    fn supported_codes_are_deduplicated_in_registry_order() {
        assert_eq!(
            supported_codes(),
            vec!["id", "en", "zh", "zh-CN", "zh-TW", "zh-HK"]
        );
    }
}
