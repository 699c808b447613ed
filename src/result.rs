use crate::error::QueryError;
use crate::language::Language;
use crate::model::ServiceType;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use url::Url;

// Structured dictionary data shared by all providers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WordResult {
    pub phonetics: Vec<Phonetic>,
    pub parts: Vec<PartOfSpeech>,
    /// Word-form exchanges, e.g. ("past tense", ["went"])
    pub exchanges: Vec<WordExchange>,
    /// "Did you mean" suggestions
    pub simple_words: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Phonetic {
    pub name: String,
    pub value: String,
    pub speak_url: Option<Url>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartOfSpeech {
    pub part: String,
    pub means: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordExchange {
    pub name: String,
    pub words: Vec<String>,
}

impl WordResult {
    pub fn is_empty(&self) -> bool {
        self.phonetics.is_empty()
            && self.parts.is_empty()
            && self.exchanges.is_empty()
            && self.simple_words.is_empty()
    }
}

/// Everything one provider produced for one query.
///
/// Only `translated_segments` may be written from several execution contexts
/// at once, so it is the only field behind a lock. The remaining fields belong
/// to the dispatch that owns the result.
#[derive(Debug)]
pub struct QueryResult {
    pub service_type: ServiceType,
    pub query_text: String,
    pub from: Language,
    pub to: Language,
    translated_segments: Mutex<Option<Vec<String>>>,
    pub dictionary_entry: Option<WordResult>,
    pub error: Option<QueryError>,
    /// Decoded provider response, kept for diagnostics
    pub raw_payload: Option<serde_json::Value>,
    pub raw_html: Option<String>,
    pub is_loading: bool,
    pub is_stream_finished: bool,
    pub from_speak_url: Option<Url>,
    pub to_speak_url: Option<Url>,
}

impl QueryResult {
    pub fn new(service_type: ServiceType) -> Self {
        Self {
            service_type,
            query_text: String::new(),
            from: Language::Auto,
            to: Language::Auto,
            translated_segments: Mutex::new(None),
            dictionary_entry: None,
            error: None,
            raw_payload: None,
            raw_html: None,
            is_loading: false,
            is_stream_finished: true,
            from_speak_url: None,
            to_speak_url: None,
        }
    }

    pub fn for_query(service_type: ServiceType, text: &str, from: Language, to: Language) -> Self {
        let mut result = Self::new(service_type);
        result.query_text = text.to_string();
        result.from = from;
        result.to = to;
        result
    }

    /// Drop everything produced by a previous dispatch, keeping the service type.
    pub fn reset(&mut self) {
        *self = Self::new(self.service_type);
    }

    fn lock_segments(&self) -> MutexGuard<'_, Option<Vec<String>>> {
        // A writer that panicked mid-push leaves a complete Vec behind
        self.translated_segments
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn segments(&self) -> Option<Vec<String>> {
        self.lock_segments().clone()
    }

    pub fn set_segments(&self, segments: Option<Vec<String>>) {
        *self.lock_segments() = segments;
    }

    pub fn push_segment(&self, segment: impl Into<String>) {
        self.lock_segments()
            .get_or_insert_with(Vec::new)
            .push(segment.into());
    }

    /// Append streamed text to the last segment, starting one if needed.
    pub fn append_to_last_segment(&self, delta: &str) {
        let mut guard = self.lock_segments();
        let segments = guard.get_or_insert_with(Vec::new);
        match segments.last_mut() {
            Some(last) => last.push_str(delta),
            None => segments.push(delta.to_string()),
        }
    }

    pub fn translated_text(&self) -> Option<String> {
        self.lock_segments().as_ref().map(|segments| segments.join("\n"))
    }

    pub fn has_translated_result(&self) -> bool {
        self.dictionary_entry.is_some()
            || self.lock_segments().is_some()
            || self.raw_html.as_deref().is_some_and(|html| !html.is_empty())
    }

    pub fn has_showing_result(&self) -> bool {
        self.has_translated_result() || self.error.is_some()
    }

    pub fn with_error(mut self, error: QueryError) -> Self {
        self.error = Some(error);
        self.is_loading = false;
        self
    }

    /// Mark this result as the final element of its dispatch.
    pub fn finished(mut self) -> Self {
        self.is_loading = false;
        self.is_stream_finished = true;
        self
    }
}

impl Clone for QueryResult {
    fn clone(&self) -> Self {
        Self {
            service_type: self.service_type,
            query_text: self.query_text.clone(),
            from: self.from,
            to: self.to,
            translated_segments: Mutex::new(self.segments()),
            dictionary_entry: self.dictionary_entry.clone(),
            error: self.error.clone(),
            raw_payload: self.raw_payload.clone(),
            raw_html: self.raw_html.clone(),
            is_loading: self.is_loading,
            is_stream_finished: self.is_stream_finished,
            from_speak_url: self.from_speak_url.clone(),
            to_speak_url: self.to_speak_url.clone(),
        }
    }
}

/// Serializable snapshot used by the CLI's JSON output
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
    pub service: String,
    pub query_text: String,
    pub from: Language,
    pub to: Language,
    pub translated_segments: Option<Vec<String>>,
    pub dictionary_entry: Option<WordResult>,
    pub error: Option<String>,
    pub prompt_url: Option<String>,
    pub from_speak_url: Option<String>,
    pub to_speak_url: Option<String>,
}

impl From<&QueryResult> for ResultView {
    fn from(result: &QueryResult) -> Self {
        Self {
            service: result.service_type.to_string(),
            query_text: result.query_text.clone(),
            from: result.from,
            to: result.to,
            translated_segments: result.segments(),
            dictionary_entry: result.dictionary_entry.clone(),
            error: result.error.as_ref().map(|e| e.to_string()),
            prompt_url: result
                .error
                .as_ref()
                .and_then(|e| e.prompt_url.as_ref())
                .map(|u| u.to_string()),
            from_speak_url: result.from_speak_url.as_ref().map(|u| u.to_string()),
            to_speak_url: result.to_speak_url.as_ref().map(|u| u.to_string()),
        }
    }
}
