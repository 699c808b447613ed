use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Language {
    Auto,
    SimplifiedChinese,
    TraditionalChinese,
    ClassicalChinese,
    English,
    Japanese,
    Korean,
    French,
    Spanish,
    Portuguese,
    BrazilianPortuguese,
    Italian,
    German,
    Russian,
    Arabic,
    Swedish,
    Romanian,
    Thai,
    Slovak,
    Dutch,
    Hungarian,
    Greek,
    Danish,
    Finnish,
    Polish,
    Czech,
    Turkish,
    Lithuanian,
    Latvian,
    Ukrainian,
    Bulgarian,
    Indonesian,
    Malay,
    Slovenian,
    Estonian,
    Vietnamese,
    Persian,
    Hindi,
    Telugu,
    Tamil,
    Urdu,
    Filipino,
    Khmer,
    Lao,
    Bengali,
    Burmese,
    Norwegian,
    Serbian,
    Croatian,
    Mongolian,
    Hebrew,
    Georgian,
}

impl Language {
    pub const ALL: [Language; 52] = [
        Language::Auto,
        Language::SimplifiedChinese,
        Language::TraditionalChinese,
        Language::ClassicalChinese,
        Language::English,
        Language::Japanese,
        Language::Korean,
        Language::French,
        Language::Spanish,
        Language::Portuguese,
        Language::BrazilianPortuguese,
        Language::Italian,
        Language::German,
        Language::Russian,
        Language::Arabic,
        Language::Swedish,
        Language::Romanian,
        Language::Thai,
        Language::Slovak,
        Language::Dutch,
        Language::Hungarian,
        Language::Greek,
        Language::Danish,
        Language::Finnish,
        Language::Polish,
        Language::Czech,
        Language::Turkish,
        Language::Lithuanian,
        Language::Latvian,
        Language::Ukrainian,
        Language::Bulgarian,
        Language::Indonesian,
        Language::Malay,
        Language::Slovenian,
        Language::Estonian,
        Language::Vietnamese,
        Language::Persian,
        Language::Hindi,
        Language::Telugu,
        Language::Tamil,
        Language::Urdu,
        Language::Filipino,
        Language::Khmer,
        Language::Lao,
        Language::Bengali,
        Language::Burmese,
        Language::Norwegian,
        Language::Serbian,
        Language::Croatian,
        Language::Mongolian,
        Language::Hebrew,
        Language::Georgian,
    ];

    /// English display name, also accepted by [`Language::from_name`]
    pub fn name(&self) -> &'static str {
        match self {
            Language::Auto => "Auto",
            Language::SimplifiedChinese => "Simplified Chinese",
            Language::TraditionalChinese => "Traditional Chinese",
            Language::ClassicalChinese => "Classical Chinese",
            Language::English => "English",
            Language::Japanese => "Japanese",
            Language::Korean => "Korean",
            Language::French => "French",
            Language::Spanish => "Spanish",
            Language::Portuguese => "Portuguese",
            Language::BrazilianPortuguese => "Brazilian Portuguese",
            Language::Italian => "Italian",
            Language::German => "German",
            Language::Russian => "Russian",
            Language::Arabic => "Arabic",
            Language::Swedish => "Swedish",
            Language::Romanian => "Romanian",
            Language::Thai => "Thai",
            Language::Slovak => "Slovak",
            Language::Dutch => "Dutch",
            Language::Hungarian => "Hungarian",
            Language::Greek => "Greek",
            Language::Danish => "Danish",
            Language::Finnish => "Finnish",
            Language::Polish => "Polish",
            Language::Czech => "Czech",
            Language::Turkish => "Turkish",
            Language::Lithuanian => "Lithuanian",
            Language::Latvian => "Latvian",
            Language::Ukrainian => "Ukrainian",
            Language::Bulgarian => "Bulgarian",
            Language::Indonesian => "Indonesian",
            Language::Malay => "Malay",
            Language::Slovenian => "Slovenian",
            Language::Estonian => "Estonian",
            Language::Vietnamese => "Vietnamese",
            Language::Persian => "Persian",
            Language::Hindi => "Hindi",
            Language::Telugu => "Telugu",
            Language::Tamil => "Tamil",
            Language::Urdu => "Urdu",
            Language::Filipino => "Filipino",
            Language::Khmer => "Khmer",
            Language::Lao => "Lao",
            Language::Bengali => "Bengali",
            Language::Burmese => "Burmese",
            Language::Norwegian => "Norwegian",
            Language::Serbian => "Serbian",
            Language::Croatian => "Croatian",
            Language::Mongolian => "Mongolian",
            Language::Hebrew => "Hebrew",
            Language::Georgian => "Georgian",
        }
    }

    /// Parse a language name case-insensitively, ignoring spaces and underscores.
    /// "Chinese" alone resolves to Simplified Chinese.
    pub fn from_name(name: &str) -> Option<Language> {
        let normalized: String = name
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .flat_map(|c| c.to_lowercase())
            .collect();

        if normalized.is_empty() {
            return None;
        }
        if normalized == "chinese" {
            return Some(Language::SimplifiedChinese);
        }

        Language::ALL.iter().copied().find(|language| {
            language
                .name()
                .chars()
                .filter(|c| !c.is_whitespace())
                .flat_map(|c| c.to_lowercase())
                .eq(normalized.chars())
        })
    }

    pub fn is_chinese(&self) -> bool {
        matches!(
            self,
            Language::SimplifiedChinese | Language::TraditionalChinese | Language::ClassicalChinese
        )
    }

    pub fn is_auto(&self) -> bool {
        *self == Language::Auto
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered `Language <-> wire code` table a provider supplies.
#[derive(Debug, Clone, Default)]
pub struct LanguageTable {
    entries: Vec<(Language, String)>,
}

impl LanguageTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, language: Language, code: &str) -> Self {
        self.entries.push((language, code.to_string()));
        self
    }

    pub fn entries(&self) -> &[(Language, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(Language, &'static str)> for LanguageTable {
    fn from_iter<I: IntoIterator<Item = (Language, &'static str)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(language, code)| (language, code.to_string()))
                .collect(),
        }
    }
}

/// Lookups derived once from a provider's [`LanguageTable`].
///
/// When a table lists a language twice the first entry wins, and when a wire
/// code is shared the first language listed for it wins the reverse lookup.
#[derive(Debug, Clone)]
pub struct LanguageCache {
    languages: Vec<Language>,
    codes: HashMap<Language, String>,
    reverse: HashMap<String, Language>,
    indexes: HashMap<Language, usize>,
}

impl LanguageCache {
    pub fn build(table: &LanguageTable) -> Self {
        let mut languages = Vec::with_capacity(table.len());
        let mut codes = HashMap::new();
        let mut reverse = HashMap::new();
        let mut indexes = HashMap::new();

        for (language, code) in table.entries() {
            if codes.contains_key(language) {
                continue;
            }
            indexes.insert(*language, languages.len());
            languages.push(*language);
            codes.insert(*language, code.clone());
            reverse.entry(code.clone()).or_insert(*language);
        }

        Self {
            languages,
            codes,
            reverse,
            indexes,
        }
    }

    pub fn language_code(&self, language: Language) -> Option<&str> {
        self.codes.get(&language).map(String::as_str)
    }

    /// Unknown codes resolve to `Auto`; callers treat that as unsupported.
    pub fn language_enum(&self, code: &str) -> Language {
        self.reverse.get(code).copied().unwrap_or(Language::Auto)
    }

    pub fn index(&self, language: Language) -> Option<usize> {
        self.indexes.get(&language).copied()
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> LanguageTable {
        [
            (Language::Auto, "auto"),
            (Language::SimplifiedChinese, "zh-CN"),
            (Language::TraditionalChinese, "zh-TW"),
            (Language::English, "en"),
            (Language::BrazilianPortuguese, "pt"),
            (Language::Portuguese, "pt"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_forward_and_reverse_lookup() {
        let cache = LanguageCache::build(&sample_table());
        assert_eq!(cache.language_code(Language::English), Some("en"));
        assert_eq!(cache.language_enum("zh-TW"), Language::TraditionalChinese);
        assert_eq!(cache.index(Language::English), Some(3));
    }

    #[test]
    fn test_missing_language_is_unsupported() {
        let cache = LanguageCache::build(&sample_table());
        assert_eq!(cache.language_code(Language::Georgian), None);
        assert_eq!(cache.language_enum("ka"), Language::Auto);
        assert_eq!(cache.index(Language::Georgian), None);
    }

    #[test]
    fn test_shared_code_reverse_prefers_first() {
        let cache = LanguageCache::build(&sample_table());
        assert_eq!(cache.language_enum("pt"), Language::BrazilianPortuguese);
        assert_eq!(cache.language_code(Language::Portuguese), Some("pt"));
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Language::from_name("English"), Some(Language::English));
        assert_eq!(Language::from_name("simplified chinese"), Some(Language::SimplifiedChinese));
        assert_eq!(Language::from_name("traditional_chinese"), Some(Language::TraditionalChinese));
        assert_eq!(Language::from_name("Chinese"), Some(Language::SimplifiedChinese));
        assert_eq!(Language::from_name("auto"), Some(Language::Auto));
        assert_eq!(Language::from_name("Klingon"), None);
        assert_eq!(Language::from_name(""), None);
    }

    #[test]
    fn test_chinese_family() {
        assert!(Language::ClassicalChinese.is_chinese());
        assert!(!Language::Japanese.is_chinese());
    }
}
