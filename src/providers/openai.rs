use crate::bridge::ResultSink;
use crate::error::{BoxError, QueryError, QueryErrorKind};
use crate::language::{Language, LanguageTable};
use crate::model::ServiceType;
use crate::result::QueryResult;
use crate::service::{QueryRequest, QueryService, ServiceHooks};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const KEY_PAGE: &str = "https://platform.openai.com/api-keys";

#[derive(Debug, Clone)]
pub struct OpenAISettings {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub free_quota: usize,
}

impl Default for OpenAISettings {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            free_quota: 10_000,
        }
    }
}

/// OpenAI-compatible chat completion provider with incremental results.
pub struct OpenAIService {
    client: Client,
    settings: OpenAISettings,
    // Request currently streaming, torn down by cancel_stream
    active: Mutex<Option<(u64, CancellationToken)>>,
    next_stream: AtomicU64,
}

/// Registration of one streaming request; clears itself from `active` on
/// every exit path unless a newer request already replaced it.
struct ActiveStream<'a> {
    slot: &'a Mutex<Option<(u64, CancellationToken)>>,
    id: u64,
    token: CancellationToken,
}

impl Drop for ActiveStream<'_> {
    fn drop(&mut self) {
        if let Ok(mut active) = self.slot.lock() {
            if active.as_ref().is_some_and(|(id, _)| *id == self.id) {
                active.take();
            }
        }
    }
}

#[derive(Debug, PartialEq)]
enum SseEvent {
    Delta(String),
    Done,
    Ignore,
}

/// Decode one server-sent-events line of a chat completion stream.
fn parse_sse_line(line: &str) -> Result<SseEvent, BoxError> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseEvent::Ignore);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(SseEvent::Done);
    }
    if data.is_empty() {
        return Ok(SseEvent::Ignore);
    }

    let chunk: Value = serde_json::from_str(data)?;
    if let Some(message) = chunk.pointer("/error/message").and_then(|v| v.as_str()) {
        return Err(Box::new(QueryError::api(message.to_string())));
    }

    match chunk
        .pointer("/choices/0/delta/content")
        .and_then(|v| v.as_str())
    {
        Some(delta) if !delta.is_empty() => Ok(SseEvent::Delta(delta.to_string())),
        _ => Ok(SseEvent::Ignore),
    }
}

fn parse_completion(json: &Value) -> Option<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(|line| line.to_string()).collect()
}

impl OpenAIService {
    pub fn new(settings: OpenAISettings) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            settings,
            active: Mutex::new(None),
            next_stream: AtomicU64::new(0),
        }
    }

    fn messages(request: &QueryRequest) -> Value {
        let instruction = if request.from.is_auto() {
            format!(
                "Translate the following text into {}. Reply with the translation only.",
                request.to_code
            )
        } else {
            format!(
                "Translate the following {} text into {}. Reply with the translation only.",
                request.from_code, request.to_code
            )
        };

        json!([
            {"role": "system", "content": "You are a professional translation engine."},
            {"role": "user", "content": format!("{}\n\n{}", instruction, request.text)},
        ])
    }

    async fn send(&self, request: &QueryRequest, stream: bool) -> Result<Response, BoxError> {
        let api_key = self.settings.api_key.as_deref().ok_or_else(|| {
            QueryError::with_message(QueryErrorKind::MissingSecretKey, "OpenAI API key is not set")
                .prompt(self.link())
        })?;

        let body = json!({
            "model": self.settings.model,
            "messages": Self::messages(request),
            "temperature": 0,
            "stream": stream,
        });

        let response = self
            .client
            .post(&self.settings.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| {
                    v.pointer("/error/message")
                        .and_then(|m| m.as_str())
                        .map(|m| m.to_string())
                })
                .unwrap_or_else(|| format!("HTTP error: {}", status));
            return Err(Box::new(QueryError::api(message).data_message(body)));
        }

        Ok(response)
    }

    fn begin_stream(&self) -> ActiveStream<'_> {
        let id = self.next_stream.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        if let Ok(mut active) = self.active.lock() {
            if let Some((_, previous)) = active.replace((id, token.clone())) {
                previous.cancel();
            }
        }
        ActiveStream {
            slot: &self.active,
            id,
            token,
        }
    }

    #[cfg(test)]
    fn has_active_stream(&self) -> bool {
        self.active.lock().map(|active| active.is_some()).unwrap_or(false)
    }
}

#[async_trait]
impl ServiceHooks for OpenAIService {
    fn link(&self) -> Option<Url> {
        Url::parse(KEY_PAGE).ok()
    }

    fn api_key_requirement(&self) -> bool {
        true
    }

    fn total_free_query_character_count(&self) -> usize {
        self.settings.free_quota
    }

    fn is_stream(&self) -> bool {
        true
    }

    fn cancel_stream(&self) {
        if let Ok(mut active) = self.active.lock() {
            if let Some((_, token)) = active.take() {
                debug!("tearing down openai stream");
                token.cancel();
            }
        }
    }
}

#[async_trait]
impl QueryService for OpenAIService {
    fn service_type(&self) -> ServiceType {
        ServiceType::OpenAI
    }

    fn name(&self) -> &str {
        "OpenAI"
    }

    /// Language names double as wire codes since the model reads them in the prompt.
    fn support_languages(&self) -> LanguageTable {
        Language::ALL
            .iter()
            .map(|language| (*language, language.name()))
            .collect()
    }

    async fn translate(&self, request: &QueryRequest) -> Result<QueryResult, BoxError> {
        let response = self.send(request, false).await?;
        let json: Value = response.json().await?;

        let text = parse_completion(&json).ok_or_else(QueryError::no_result)?;
        let mut result = request.new_result(ServiceType::OpenAI);
        result.set_segments(Some(split_lines(&text)));
        result.raw_payload = Some(json);
        Ok(result)
    }

    async fn translate_stream(
        &self,
        request: &QueryRequest,
        sink: ResultSink,
    ) -> Result<(), BoxError> {
        let stream = self.begin_stream();
        let response = self.send(request, true).await?;
        let mut bytes = Box::pin(response.bytes_stream());

        let mut text = String::new();
        let mut pending: Vec<u8> = Vec::new();

        'read: loop {
            let chunk = tokio::select! {
                _ = stream.token.cancelled() => return Ok(()),
                chunk = bytes.next() => chunk,
            };
            let Some(chunk) = chunk else {
                break;
            };
            pending.extend_from_slice(&chunk?);

            // Lines may straddle chunk boundaries, even inside a UTF-8 sequence
            while let Some(newline) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=newline).collect();
                let line = String::from_utf8_lossy(&line);
                match parse_sse_line(line.trim())? {
                    SseEvent::Delta(delta) => {
                        text.push_str(&delta);
                        let mut update = request.new_result(ServiceType::OpenAI);
                        update.set_segments(Some(split_lines(&text)));
                        update.is_loading = true;
                        update.is_stream_finished = false;
                        if !sink.send(update) {
                            break 'read;
                        }
                    }
                    SseEvent::Done => break 'read,
                    SseEvent::Ignore => {}
                }
            }
        }

        drop(stream);

        let text = text.trim();
        if text.is_empty() {
            return Err(Box::new(QueryError::no_result()));
        }

        let result = request.new_result(ServiceType::OpenAI);
        result.set_segments(Some(split_lines(text)));
        sink.send(result.finished());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sse_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"你"},"index":0}]}"#;
        assert_eq!(parse_sse_line(line).unwrap(), SseEvent::Delta("你".to_string()));
    }

    #[test]
    fn test_parse_sse_control_lines() {
        assert_eq!(parse_sse_line("data: [DONE]").unwrap(), SseEvent::Done);
        assert_eq!(parse_sse_line(": keep-alive").unwrap(), SseEvent::Ignore);
        assert_eq!(parse_sse_line("").unwrap(), SseEvent::Ignore);
        let role_only = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_sse_line(role_only).unwrap(), SseEvent::Ignore);
    }

    #[test]
    fn test_parse_sse_error() {
        let line = r#"data: {"error":{"message":"Rate limit reached"}}"#;
        let error = QueryError::normalize(parse_sse_line(line).unwrap_err());
        assert_eq!(error.kind, QueryErrorKind::Api);
        assert_eq!(error.message.as_deref(), Some("Rate limit reached"));
    }

    #[test]
    fn test_parse_completion() {
        let json = json!({
            "choices": [{"message": {"role": "assistant", "content": " 你好 \n"}}]
        });
        assert_eq!(parse_completion(&json).as_deref(), Some("你好"));
        assert!(parse_completion(&json!({"choices": []})).is_none());
    }

    fn request() -> QueryRequest {
        QueryRequest {
            text: "hello".to_string(),
            from: Language::English,
            to: Language::German,
            from_code: "English".to_string(),
            to_code: "German".to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_key_is_reported() {
        let service = OpenAIService::new(OpenAISettings::default());
        let error = QueryError::normalize(service.translate(&request()).await.unwrap_err());
        assert_eq!(error.kind, QueryErrorKind::MissingSecretKey);
        assert_eq!(error.prompt_url, service.link());
    }

    #[test]
    fn test_cancel_stream_tears_down_active_request() {
        let service = OpenAIService::new(OpenAISettings::default());
        let stream = service.begin_stream();
        service.cancel_stream();
        assert!(stream.token.is_cancelled());
        assert!(!service.has_active_stream());
        // No active request left; a second call is a no-op
        service.cancel_stream();
    }

    #[test]
    fn test_finished_stream_keeps_newer_registration() {
        let service = OpenAIService::new(OpenAISettings::default());
        let first = service.begin_stream();
        let second = service.begin_stream();
        assert!(first.token.is_cancelled());

        drop(first);
        assert!(service.has_active_stream());
        drop(second);
        assert!(!service.has_active_stream());
    }

    #[tokio::test]
    async fn test_failed_stream_clears_registration() {
        let service = OpenAIService::new(OpenAISettings::default());
        let (sender, _receiver) = futures::channel::mpsc::unbounded();
        let sink = ResultSink::new(
            sender,
            CancellationToken::new(),
            ServiceType::OpenAI,
            std::sync::Arc::new(Mutex::new(None)),
        );

        // No API key, so the request fails before any byte is read
        let error = service.translate_stream(&request(), sink).await.unwrap_err();
        assert_eq!(QueryError::normalize(error).kind, QueryErrorKind::MissingSecretKey);
        assert!(!service.has_active_stream());
    }

    #[test]
    fn test_language_table_covers_every_language() {
        let service = OpenAIService::new(OpenAISettings::default());
        assert_eq!(service.support_languages().len(), Language::ALL.len());
    }
}
