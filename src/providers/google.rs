use crate::error::{BoxError, QueryError};
use crate::language::{Language, LanguageTable};
use crate::model::ServiceType;
use crate::result::{PartOfSpeech, Phonetic, QueryResult, WordResult};
use crate::service::{QueryRequest, QueryService, ServiceHooks};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::{form_urlencoded, Url};

const TRANSLATE_URL: &str = "https://translate.googleapis.com/translate_a/single";
const TTS_URL: &str = "https://translate.google.com/translate_tts";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
// Google TTS rejects longer text
const MAX_TTS_LENGTH: usize = 200;

pub struct GoogleService {
    client: Client,
}

impl GoogleService {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    async fn fetch(
        &self,
        text: &str,
        from: &str,
        to: &str,
        dictionary: bool,
    ) -> Result<Value, BoxError> {
        let encoded_text = form_urlencoded::byte_serialize(text.as_bytes()).collect::<String>();

        // Dictionary lookups request the extra data blocks as well
        let data_types = if dictionary {
            "dt=t&dt=bd&dt=rm&dt=qca"
        } else {
            "dt=t&dt=rm"
        };

        let full_url = format!(
            "{}?client=gtx&sl={}&tl={}&{}&q={}",
            TRANSLATE_URL, from, to, data_types, encoded_text
        );

        let response = self
            .client
            .get(&full_url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Box::new(QueryError::api(format!(
                "HTTP error: {}",
                response.status()
            ))));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn tts_url(text: &str, language_code: &str) -> Result<Url, BoxError> {
        let mut url = Url::parse(TTS_URL)?;
        url.query_pairs_mut()
            .append_pair("ie", "UTF-8")
            .append_pair("client", "tw-ob")
            .append_pair("q", text)
            .append_pair("tl", language_code);
        Ok(url)
    }
}

impl Default for GoogleService {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if text is a single word (no spaces, punctuation at edges allowed)
pub fn is_single_word(text: &str) -> bool {
    let cleaned = text.trim_matches(|c: char| !c.is_alphabetic());
    !cleaned.is_empty()
        && !cleaned.contains(' ')
        && cleaned
            .chars()
            .all(|c| c.is_alphabetic() || c == '-' || c == '\'')
}

/// Translated lines from the sentence blocks at index 0.
fn parse_segments(json: &Value) -> Option<Vec<String>> {
    let sentences = json.get(0)?.as_array()?;
    let joined: String = sentences
        .iter()
        .filter_map(|sentence| sentence.get(0).and_then(|v| v.as_str()))
        .collect();

    if joined.trim().is_empty() {
        return None;
    }
    Some(joined.lines().map(|line| line.to_string()).collect())
}

/// Source transliteration, reported in the last sentence block.
fn parse_transliteration(json: &Value) -> Option<String> {
    json.get(0)?
        .as_array()?
        .last()?
        .get(3)?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn parse_detected_code(json: &Value) -> Option<String> {
    json.get(2)?.as_str().map(|s| s.to_string())
}

/// Parse the dictionary block at index 1 into a WordResult
fn parse_dictionary(json: &Value) -> Option<WordResult> {
    let mut word = WordResult::default();

    if let Some(dict_data) = json.get(1).and_then(|v| v.as_array()) {
        for entry in dict_data {
            let Some(entry_array) = entry.as_array() else {
                continue;
            };
            let Some(pos) = entry_array.first().and_then(|v| v.as_str()) else {
                continue;
            };

            // Detailed entries carry the term first, then its reverse translations
            let means: Vec<String> = entry_array
                .get(2)
                .and_then(|v| v.as_array())
                .map(|detailed| {
                    detailed
                        .iter()
                        .take(5)
                        .filter_map(|d| d.get(0).and_then(|v| v.as_str()))
                        .map(|s| s.to_string())
                        .collect()
                })
                .unwrap_or_default();

            if !means.is_empty() {
                word.parts.push(PartOfSpeech {
                    part: pos.to_string(),
                    means,
                });
            }
        }
    }

    // "Did you mean" block
    if let Some(suggestion) = json
        .get(7)
        .and_then(|v| v.get(1))
        .and_then(|v| v.as_str())
    {
        word.simple_words.push(suggestion.to_string());
    }

    if let Some(transliteration) = parse_transliteration(json) {
        if !word.parts.is_empty() {
            word.phonetics.push(Phonetic {
                name: "us".to_string(),
                value: transliteration,
                speak_url: None,
            });
        }
    }

    if word.is_empty() {
        None
    } else {
        Some(word)
    }
}

#[async_trait]
impl ServiceHooks for GoogleService {
    fn link(&self) -> Option<Url> {
        Url::parse("https://translate.google.com").ok()
    }

    fn auto_convert_traditional_chinese(&self) -> bool {
        true
    }

    async fn detect(&self, text: &str) -> Result<String, BoxError> {
        let json = self.fetch(text, "auto", "en", false).await?;
        parse_detected_code(&json)
            .ok_or_else(|| Box::new(QueryError::api("Missing detected language")) as BoxError)
    }

    async fn text_to_audio(&self, text: &str, language_code: &str) -> Result<Url, BoxError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Box::new(QueryError::parameter("Text is empty")));
        }
        let clipped: String = text.chars().take(MAX_TTS_LENGTH).collect();
        Self::tts_url(&clipped, language_code)
    }
}

#[async_trait]
impl QueryService for GoogleService {
    fn service_type(&self) -> ServiceType {
        ServiceType::Google
    }

    fn name(&self) -> &str {
        "Google Translate"
    }

    fn support_languages(&self) -> LanguageTable {
        google_languages()
    }

    async fn translate(&self, request: &QueryRequest) -> Result<QueryResult, BoxError> {
        let dictionary = is_single_word(&request.text);
        let json = self
            .fetch(&request.text, &request.from_code, &request.to_code, dictionary)
            .await?;

        let mut result = request.new_result(ServiceType::Google);

        let segments = parse_segments(&json).ok_or_else(|| {
            QueryError::api("Failed to extract translation from response")
                .data_message(json.to_string())
        })?;
        result.set_segments(Some(segments));

        if dictionary {
            result.dictionary_entry = parse_dictionary(&json);
            debug!(has_entry = result.dictionary_entry.is_some(), "google dictionary lookup");
        }

        let from_code = parse_detected_code(&json).unwrap_or_else(|| request.from_code.clone());
        result.from_speak_url = Self::tts_url(&request.text, &from_code).ok();
        if let Some(text) = result.translated_text() {
            result.to_speak_url = Self::tts_url(&text, &request.to_code).ok();
        }
        result.raw_payload = Some(json);

        Ok(result)
    }
}

fn google_languages() -> LanguageTable {
    [
        (Language::Auto, "auto"),
        (Language::SimplifiedChinese, "zh-CN"),
        (Language::TraditionalChinese, "zh-TW"),
        (Language::English, "en"),
        (Language::Japanese, "ja"),
        (Language::Korean, "ko"),
        (Language::French, "fr"),
        (Language::Spanish, "es"),
        (Language::Portuguese, "pt-PT"),
        (Language::BrazilianPortuguese, "pt"),
        (Language::Italian, "it"),
        (Language::German, "de"),
        (Language::Russian, "ru"),
        (Language::Arabic, "ar"),
        (Language::Swedish, "sv"),
        (Language::Romanian, "ro"),
        (Language::Thai, "th"),
        (Language::Slovak, "sk"),
        (Language::Dutch, "nl"),
        (Language::Hungarian, "hu"),
        (Language::Greek, "el"),
        (Language::Danish, "da"),
        (Language::Finnish, "fi"),
        (Language::Polish, "pl"),
        (Language::Czech, "cs"),
        (Language::Turkish, "tr"),
        (Language::Lithuanian, "lt"),
        (Language::Latvian, "lv"),
        (Language::Ukrainian, "uk"),
        (Language::Bulgarian, "bg"),
        (Language::Indonesian, "id"),
        (Language::Malay, "ms"),
        (Language::Slovenian, "sl"),
        (Language::Estonian, "et"),
        (Language::Vietnamese, "vi"),
        (Language::Persian, "fa"),
        (Language::Hindi, "hi"),
        (Language::Telugu, "te"),
        (Language::Tamil, "ta"),
        (Language::Urdu, "ur"),
        (Language::Filipino, "tl"),
        (Language::Khmer, "km"),
        (Language::Lao, "lo"),
        (Language::Bengali, "bn"),
        (Language::Burmese, "my"),
        (Language::Norwegian, "no"),
        (Language::Serbian, "sr"),
        (Language::Croatian, "hr"),
        (Language::Mongolian, "mn"),
        (Language::Hebrew, "iw"),
        (Language::Georgian, "ka"),
    ]
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_response() -> Value {
        json!([
            [["好", "good", null, null, 1], [null, null, "Hǎo", "ɡo͝od"]],
            [
                ["adjective", ["好", "良好"], [["好", ["good", "fine"]], ["良好", ["good"]]], "good", 3],
                ["noun", ["利益"], [["利益", ["interest", "good"]]], "good", 1]
            ],
            "en"
        ])
    }

    #[test]
    fn test_parse_segments() {
        let json = json!([
            [["Hello ", "Привет ", null], ["world\nagain", "мир\nснова", null]],
            null,
            "ru"
        ]);
        assert_eq!(
            parse_segments(&json),
            Some(vec!["Hello world".to_string(), "again".to_string()])
        );
        assert_eq!(parse_detected_code(&json).as_deref(), Some("ru"));
    }

    #[test]
    fn test_parse_segments_invalid() {
        assert!(parse_segments(&json!({"error": "bad"})).is_none());
        assert!(parse_segments(&json!([[]])).is_none());
    }

    #[test]
    fn test_parse_dictionary() {
        let word = parse_dictionary(&sample_response()).unwrap();
        assert_eq!(word.parts.len(), 2);
        assert_eq!(word.parts[0].part, "adjective");
        assert_eq!(word.parts[0].means, vec!["好".to_string(), "良好".to_string()]);
        assert_eq!(word.phonetics[0].value, "ɡo͝od");
    }

    #[test]
    fn test_parse_dictionary_absent() {
        let json = json!([[["Hallo Welt", "Hello world", null]], null, "en"]);
        assert!(parse_dictionary(&json).is_none());
    }

    #[test]
    fn test_is_single_word() {
        assert!(is_single_word("hello"));
        assert!(is_single_word("\"well-known\","));
        assert!(!is_single_word("hello world"));
        assert!(!is_single_word("123"));
    }

    #[test]
    fn test_tts_url_encodes_text() {
        let url = GoogleService::tts_url("good morning", "en").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("q".to_string(), "good morning".to_string())));
        assert!(pairs.contains(&("tl".to_string(), "en".to_string())));
    }

    #[test]
    fn test_language_table_has_unique_languages() {
        let table = google_languages();
        let mut seen = std::collections::HashSet::new();
        for (language, _) in table.entries() {
            assert!(seen.insert(*language));
        }
        assert!(!seen.contains(&Language::ClassicalChinese));
    }
}
