use crate::model::{QueryModel, ServiceId};
use crate::result::QueryResult;
use crate::service::ServiceInstance;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tracing::debug;

/// Dispatch `model` to every service that accepts its action kind.
///
/// Each service runs independently; results are merged in arrival order, so
/// there is no ordering between services.
pub fn dispatch_all(
    services: &[Arc<ServiceInstance>],
    model: &QueryModel,
) -> BoxStream<'static, (ServiceId, QueryResult)> {
    let streams: Vec<_> = services
        .iter()
        .filter(|service| service.accepts(model.action_kind))
        .map(|service| {
            let id = service.id();
            debug!(service = %id, "adding service to dispatch");
            service
                .start_query_stream(model)
                .map(move |result| (id, result))
                .boxed()
        })
        .collect();

    stream::select_all(streams).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::language::{Language, LanguageTable};
    use crate::model::{ActionKind, ServiceType};
    use crate::quota::{QuotaLedger, UsageLedger};
    use crate::service::{QueryRequest, QueryService, ServiceHooks};
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct Fixed {
        service_type: ServiceType,
        reply: &'static str,
        fail: bool,
    }

    impl ServiceHooks for Fixed {}

    #[async_trait]
    impl QueryService for Fixed {
        fn service_type(&self) -> ServiceType {
            self.service_type
        }

        fn name(&self) -> &str {
            "Fixed"
        }

        fn support_languages(&self) -> LanguageTable {
            LanguageTable::new()
                .with(Language::Auto, "auto")
                .with(Language::English, "en")
                .with(Language::German, "de")
        }

        async fn translate(&self, request: &QueryRequest) -> Result<QueryResult, BoxError> {
            if self.fail {
                return Err("HTTP error: 401 Unauthorized".into());
            }
            let result = request.new_result(self.service_type);
            result.push_segment(self.reply);
            Ok(result)
        }
    }

    fn service(service_type: ServiceType, reply: &'static str, fail: bool) -> Arc<ServiceInstance> {
        let quota: Arc<dyn QuotaLedger> = Arc::new(UsageLedger::new());
        Arc::new(ServiceInstance::new(
            Arc::new(Fixed {
                service_type,
                reply,
                fail,
            }),
            quota,
        ))
    }

    #[tokio::test]
    async fn test_failure_does_not_affect_other_services() {
        let services = vec![
            service(ServiceType::Google, "Hallo", false),
            service(ServiceType::Bing, "", true),
            service(ServiceType::DeepL, "Servus", false),
        ];
        let model = QueryModel::new("hello", Language::English, Language::German);

        let results: HashMap<ServiceId, QueryResult> =
            dispatch_all(&services, &model).collect().await;
        assert_eq!(results.len(), 3);
        assert_eq!(
            results[&services[0].id()].translated_text().as_deref(),
            Some("Hallo")
        );
        assert!(results[&services[1].id()].error.is_some());
        assert_eq!(
            results[&services[2].id()].translated_text().as_deref(),
            Some("Servus")
        );
    }

    #[tokio::test]
    async fn test_auto_query_gate() {
        let google = service(ServiceType::Google, "Hallo", false);
        let mut quiet = ServiceInstance::new(
            Arc::new(Fixed {
                service_type: ServiceType::Bing,
                reply: "Hallo",
                fail: false,
            }),
            Arc::new(UsageLedger::new()),
        );
        quiet.enabled_auto_query = false;
        let services = vec![google, Arc::new(quiet)];

        let model = QueryModel::new("hello", Language::English, Language::German)
            .with_action(ActionKind::SelectTextQuery);
        let results: Vec<_> = dispatch_all(&services, &model).collect().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, services[0].id());
    }
}
