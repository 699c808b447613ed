//! Concurrent multi-provider translation queries.
//!
//! A [`QueryModel`] is dispatched to every configured [`ServiceInstance`]; each
//! one runs the shared pre-network checks and then its provider, delivering
//! results as an independent, individually cancellable stream.

pub mod bridge;
pub mod chinese;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod language;
pub mod model;
pub mod providers;
pub mod quota;
pub mod result;
pub mod service;

pub use bridge::{QueryStream, ResultSink};
pub use dispatch::dispatch_all;
pub use error::{BoxError, QueryError, QueryErrorKind};
pub use language::{Language, LanguageTable};
pub use model::{ActionKind, QueryModel, ServiceId, ServiceType, StopHandle, StopRegistry};
pub use quota::{QuotaLedger, UsageLedger};
pub use result::{QueryResult, ResultView, WordResult};
pub use service::{Prehandled, QueryRequest, QueryService, ServiceHooks, ServiceInstance};
