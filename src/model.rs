use crate::language::Language;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceType {
    Google,
    OpenAI,
    Baidu,
    Youdao,
    DeepL,
    Bing,
    Volcano,
    Apple,
    Custom,
}

impl ServiceType {
    pub fn from_name(name: &str) -> Option<ServiceType> {
        match name.trim().to_lowercase().as_str() {
            "google" => Some(ServiceType::Google),
            "openai" => Some(ServiceType::OpenAI),
            "baidu" => Some(ServiceType::Baidu),
            "youdao" => Some(ServiceType::Youdao),
            "deepl" => Some(ServiceType::DeepL),
            "bing" => Some(ServiceType::Bing),
            "volcano" => Some(ServiceType::Volcano),
            "apple" => Some(ServiceType::Apple),
            "custom" => Some(ServiceType::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Identifies one configured provider instance. Duplicated providers share a
/// `service_type` but differ by `uuid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceId {
    pub service_type: ServiceType,
    pub uuid: Uuid,
}

impl ServiceId {
    pub fn new(service_type: ServiceType) -> Self {
        Self {
            service_type,
            uuid: Uuid::new_v4(),
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.service_type, &self.uuid.simple().to_string()[..8])
    }
}

/// How the query was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionKind {
    #[default]
    InvokeQuery,
    InputQuery,
    SelectTextQuery,
    ShortcutQuery,
    OcrQuery,
}

impl ActionKind {
    /// Whether the caller may offer to replace the source text with a result.
    pub fn supports_replace(&self) -> bool {
        matches!(self, ActionKind::SelectTextQuery | ActionKind::ShortcutQuery)
    }
}

/// Cancels exactly one dispatch.
#[derive(Clone)]
pub struct StopHandle {
    token: CancellationToken,
    on_stop: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl StopHandle {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            on_stop: None,
        }
    }

    /// Run `hook` after the token is cancelled, to release resources the task
    /// cancellation alone does not reach.
    pub fn with_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_stop = Some(Arc::new(hook));
        self
    }

    pub fn stop(&self) {
        self.token.cancel();
        if let Some(hook) = &self.on_stop {
            hook();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopHandle")
            .field("stopped", &self.is_stopped())
            .field("has_hook", &self.on_stop.is_some())
            .finish()
    }
}

/// Per-service cancellation handles shared by every dispatch of one query.
///
/// Registering a handle for an id that already has one replaces it.
#[derive(Debug, Clone, Default)]
pub struct StopRegistry {
    handles: Arc<Mutex<HashMap<ServiceId, StopHandle>>>,
}

impl StopRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ServiceId, StopHandle>> {
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, id: ServiceId, handle: StopHandle) {
        if self.lock().insert(id, handle).is_some() {
            debug!(service = %id, "replaced stop handle");
        }
    }

    /// Stop one service's dispatch. Returns false when nothing was registered.
    pub fn stop(&self, id: &ServiceId) -> bool {
        // Release the lock before running the hook
        let handle = self.lock().remove(id);
        match handle {
            Some(handle) => {
                debug!(service = %id, "stopping dispatch");
                handle.stop();
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&self) {
        let handles: Vec<_> = self.lock().drain().collect();
        for (id, handle) in handles {
            debug!(service = %id, "stopping dispatch");
            handle.stop();
        }
    }

    /// Forget a handle without invoking it, once its dispatch has finished.
    pub fn remove(&self, id: &ServiceId) {
        self.lock().remove(id);
    }

    pub fn contains(&self, id: &ServiceId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// One user request, shared by every provider it is dispatched to.
#[derive(Debug, Clone)]
pub struct QueryModel {
    pub query_text: String,
    pub source_language: Language,
    pub target_language: Language,
    pub action_kind: ActionKind,
    pub stop_registry: StopRegistry,
}

impl QueryModel {
    pub fn new(query_text: impl Into<String>, source: Language, target: Language) -> Self {
        Self {
            query_text: query_text.into(),
            source_language: source,
            target_language: target,
            action_kind: ActionKind::default(),
            stop_registry: StopRegistry::new(),
        }
    }

    pub fn with_action(mut self, action_kind: ActionKind) -> Self {
        self.action_kind = action_kind;
        self
    }

    pub fn set_stop(&self, id: ServiceId, handle: StopHandle) {
        self.stop_registry.register(id, handle);
    }

    pub fn stop(&self, id: &ServiceId) -> bool {
        self.stop_registry.stop(id)
    }

    pub fn stop_all(&self) {
        self.stop_registry.stop_all();
    }
}
