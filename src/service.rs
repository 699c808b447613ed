use crate::bridge::{LatestSlot, QueryStream, ResultSink};
use crate::chinese;
use crate::error::{BoxError, QueryError, QueryErrorKind};
use crate::language::{Language, LanguageCache, LanguageTable};
use crate::model::{ActionKind, QueryModel, ServiceId, ServiceType, StopHandle};
use crate::quota::QuotaLedger;
use crate::result::QueryResult;
use async_trait::async_trait;
use futures::channel::mpsc;
use std::sync::{Arc, Mutex, OnceLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// A query after prehandling, with both languages resolved to wire codes.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub text: String,
    pub from: Language,
    pub to: Language,
    pub from_code: String,
    pub to_code: String,
}

impl QueryRequest {
    /// Fresh result echoing this request, for providers to fill in.
    pub fn new_result(&self, service_type: ServiceType) -> QueryResult {
        QueryResult::for_query(service_type, &self.text, self.from, self.to)
    }
}

/// Capabilities every provider must implement.
#[async_trait]
pub trait QueryService: ServiceHooks {
    fn service_type(&self) -> ServiceType;

    /// Provider name for display purposes
    fn name(&self) -> &str;

    /// Ordered table of the languages this provider accepts, with wire codes.
    fn support_languages(&self) -> LanguageTable;

    /// Translate once and return the final result.
    async fn translate(&self, request: &QueryRequest) -> Result<QueryResult, BoxError>;

    /// Produce incremental results into `sink`.
    ///
    /// Providers without real streaming keep this default, which runs
    /// `translate` once and yields a single finished result.
    async fn translate_stream(
        &self,
        request: &QueryRequest,
        sink: ResultSink,
    ) -> Result<(), BoxError> {
        let result = self.translate(request).await?;
        sink.send(result.finished());
        Ok(())
    }
}

/// Optional provider behavior. Every method has a default.
#[async_trait]
pub trait ServiceHooks: Send + Sync {
    /// Signup or configuration page for this provider
    fn link(&self) -> Option<Url> {
        None
    }

    /// Convert between Chinese scripts locally instead of calling the provider.
    fn auto_convert_traditional_chinese(&self) -> bool {
        false
    }

    /// Whether the provider needs a user-supplied key once free quota runs out.
    fn api_key_requirement(&self) -> bool {
        false
    }

    fn total_free_query_character_count(&self) -> usize {
        100 * 10_000
    }

    fn is_stream(&self) -> bool {
        false
    }

    /// Release live network handles or timers of the in-flight stream.
    fn cancel_stream(&self) {}

    /// Detect the language of `text`, returning the provider's wire code.
    async fn detect(&self, _text: &str) -> Result<String, BoxError> {
        Err(Box::new(QueryError::unsupported("language detection")))
    }

    async fn ocr(
        &self,
        _image: &[u8],
        _from_code: &str,
        _to_code: &str,
    ) -> Result<QueryResult, BoxError> {
        Err(Box::new(QueryError::unsupported("OCR")))
    }

    /// Pronunciation audio URL for `text` in the language with wire code `language_code`.
    async fn text_to_audio(&self, _text: &str, _language_code: &str) -> Result<Url, BoxError> {
        Err(Box::new(QueryError::unsupported("text to speech")))
    }
}

/// Outcome of the pre-network checks.
#[derive(Debug)]
pub enum Prehandled {
    /// Final result, no provider code runs.
    Handled(QueryResult),
    /// Dispatch proceeds; carries the resolved request and the result it started from.
    Proceed(QueryRequest, QueryResult),
}

/// One configured provider together with its per-instance state.
pub struct ServiceInstance {
    id: ServiceId,
    provider: Arc<dyn QueryService>,
    quota: Arc<dyn QuotaLedger>,
    languages: OnceLock<LanguageCache>,
    latest: LatestSlot,
    /// The service exists in the user's list
    pub enabled: bool,
    /// The user turned it on
    pub enabled_query: bool,
    /// Selection and shortcut queries trigger it automatically
    pub enabled_auto_query: bool,
}

impl ServiceInstance {
    pub fn new(provider: Arc<dyn QueryService>, quota: Arc<dyn QuotaLedger>) -> Self {
        Self {
            id: ServiceId::new(provider.service_type()),
            provider,
            quota,
            languages: OnceLock::new(),
            latest: Arc::new(Mutex::new(None)),
            enabled: true,
            enabled_query: true,
            enabled_auto_query: true,
        }
    }

    pub fn id(&self) -> ServiceId {
        self.id
    }

    pub fn service_type(&self) -> ServiceType {
        self.id.service_type
    }

    pub fn name(&self) -> &str {
        self.provider.name()
    }

    pub fn provider(&self) -> &Arc<dyn QueryService> {
        &self.provider
    }

    fn language_cache(&self) -> &LanguageCache {
        self.languages
            .get_or_init(|| LanguageCache::build(&self.provider.support_languages()))
    }

    pub fn language_code(&self, language: Language) -> Option<&str> {
        self.language_cache().language_code(language)
    }

    pub fn language_enum(&self, code: &str) -> Language {
        self.language_cache().language_enum(code)
    }

    pub fn index(&self, language: Language) -> Option<usize> {
        self.language_cache().index(language)
    }

    pub fn supported_languages(&self) -> &[Language] {
        self.language_cache().languages()
    }

    /// Whether a query triggered by `action` should reach this service.
    pub fn accepts(&self, action: ActionKind) -> bool {
        if !self.enabled || !self.enabled_query {
            return false;
        }
        match action {
            ActionKind::SelectTextQuery | ActionKind::ShortcutQuery => self.enabled_auto_query,
            _ => true,
        }
    }

    /// The most recent result this service delivered.
    pub fn result(&self) -> Option<QueryResult> {
        self.latest.lock().ok().and_then(|latest| latest.clone())
    }

    fn store(&self, result: &QueryResult) {
        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(result.clone());
        }
    }

    /// Run the pre-network checks in order; the first that fires wins.
    pub fn prehandle_query_text(&self, model: &QueryModel) -> Prehandled {
        let service_type = self.service_type();
        let from = model.source_language;
        let to = model.target_language;

        let mut result = QueryResult::for_query(service_type, &model.query_text, from, to);
        result.is_loading = true;
        result.is_stream_finished = false;

        if model.query_text.trim().is_empty() {
            return Prehandled::Handled(
                result
                    .with_error(QueryError::parameter("Query text is empty"))
                    .finished(),
            );
        }

        if self.provider.auto_convert_traditional_chinese() {
            if let Some(converted) = chinese::convert(&model.query_text, from, to) {
                debug!(service = %self.id, "converted Chinese script locally");
                result.set_segments(Some(vec![converted]));
                return Prehandled::Handled(result.finished());
            }
        }

        let from_code = self.language_code(from).map(str::to_string);
        let to_code = self.language_code(to).map(str::to_string);
        let (from_code, to_code) = match (from_code, to_code) {
            (Some(from_code), Some(to_code)) => (from_code, to_code),
            (from_code, _) => {
                let unsupported = if from_code.is_none() { from } else { to };
                info!(service = %self.id, language = %unsupported, "unsupported language");
                let error = QueryError::with_message(
                    QueryErrorKind::UnsupportedLanguage,
                    format!("{} does not support {}", self.name(), unsupported),
                );
                return Prehandled::Handled(result.with_error(error).finished());
            }
        };

        if self.provider.api_key_requirement()
            && !self.quota.has_private_api_key(service_type)
            && !self.quota.has_free_quota_left(service_type)
        {
            info!(service = %self.id, "free quota exhausted");
            let error = QueryError::api(format!(
                "{} free quota is used up, please add your own API key",
                self.name()
            ))
            .prompt(self.provider.link());
            return Prehandled::Handled(result.with_error(error).finished());
        }

        let request = QueryRequest {
            text: model.query_text.clone(),
            from,
            to,
            from_code,
            to_code,
        };
        Prehandled::Proceed(request, result)
    }

    /// Run one query to completion. Provider failures come back as an
    /// error-carrying result.
    pub async fn start_query(&self, model: &QueryModel) -> QueryResult {
        let (request, base) = match self.prehandle_query_text(model) {
            Prehandled::Handled(result) => {
                self.store(&result);
                return result;
            }
            Prehandled::Proceed(request, base) => (request, base),
        };

        debug!(service = %self.id, "dispatching query");
        let result = match self.provider.translate(&request).await {
            Ok(mut result) => {
                result.service_type = self.service_type();
                self.quota
                    .record_usage(self.service_type(), request.text.chars().count());
                result.finished()
            }
            Err(error) => {
                let error = QueryError::normalize(error);
                warn!(service = %self.id, kind = ?error.kind, "query failed: {}", error);
                base.with_error(error).finished()
            }
        };

        self.store(&result);
        result
    }

    /// Dispatch a query and stream its results.
    ///
    /// The dispatch runs on its own tokio task and registers a stop handle in
    /// `model.stop_registry` under this service's id before any work starts.
    /// Must be called from within a tokio runtime.
    pub fn start_query_stream(&self, model: &QueryModel) -> QueryStream {
        let (sender, receiver) = mpsc::unbounded();

        let (request, base) = match self.prehandle_query_text(model) {
            Prehandled::Handled(result) => {
                self.store(&result);
                let _ = sender.unbounded_send(result);
                return QueryStream::new(receiver, None);
            }
            Prehandled::Proceed(request, base) => (request, base),
        };

        let token = CancellationToken::new();
        let hook_provider = Arc::clone(&self.provider);
        model.set_stop(
            self.id,
            StopHandle::new(token.clone()).with_hook(move || hook_provider.cancel_stream()),
        );

        let sink = ResultSink::new(
            sender,
            token.clone(),
            self.service_type(),
            Arc::clone(&self.latest),
        );
        let provider = Arc::clone(&self.provider);
        let quota = Arc::clone(&self.quota);
        let id = self.id;
        let task_token = token.clone();

        tokio::spawn(async move {
            debug!(service = %id, stream = provider.is_stream(), "dispatching query stream");
            let work = provider.translate_stream(&request, sink.clone());

            tokio::select! {
                biased;
                _ = task_token.cancelled() => {
                    debug!(service = %id, "query stream cancelled");
                }
                outcome = work => match outcome {
                    Ok(()) => {
                        if sink.has_yielded() && !sink.has_yielded_error() {
                            quota.record_usage(id.service_type, request.text.chars().count());
                        }
                    }
                    Err(error) => {
                        let error = QueryError::normalize(error);
                        if sink.has_yielded_error() {
                            debug!(service = %id, "error already reported in-band: {error}");
                        } else {
                            warn!(
                                service = %id,
                                kind = ?error.kind,
                                "query stream failed: {}",
                                error
                            );
                            sink.send(base.with_error(error).finished());
                        }
                    }
                }
            }
        });

        QueryStream::new(receiver, Some(token))
    }

    pub async fn detect(&self, text: &str) -> Result<Language, QueryError> {
        if text.trim().is_empty() {
            return Err(QueryError::parameter("Text is empty"));
        }
        let code = self.provider.detect(text).await.map_err(QueryError::normalize)?;
        match self.language_enum(&code) {
            Language::Auto => Err(QueryError::with_message(
                QueryErrorKind::UnsupportedLanguage,
                format!("Detected language code {} is not supported", code),
            )),
            language => Ok(language),
        }
    }

    pub async fn text_to_audio(&self, text: &str, language: Language) -> Result<Url, QueryError> {
        let code = self.language_code(language).ok_or_else(|| {
            QueryError::with_message(
                QueryErrorKind::UnsupportedLanguage,
                format!("{} cannot speak {}", self.name(), language),
            )
        })?;
        self.provider
            .text_to_audio(text, code)
            .await
            .map_err(QueryError::normalize)
    }

    pub async fn ocr(&self, image: &[u8], from: Language, to: Language) -> QueryResult {
        let base = QueryResult::for_query(self.service_type(), "", from, to);
        let codes = (self.language_code(from), self.language_code(to));
        let (Some(from_code), Some(to_code)) = codes else {
            return base.with_error(QueryError::new(QueryErrorKind::UnsupportedLanguage));
        };
        match self.provider.ocr(image, from_code, to_code).await {
            Ok(result) => result.finished(),
            Err(error) => base.with_error(QueryError::normalize(error)).finished(),
        }
    }
}

impl std::fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("enabled", &self.enabled)
            .field("enabled_query", &self.enabled_query)
            .field("enabled_auto_query", &self.enabled_auto_query)
            .finish()
    }
}
