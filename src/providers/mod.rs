use crate::config::Config;
use crate::model::ServiceType;
use crate::service::QueryService;
use std::error::Error;
use std::sync::Arc;

pub mod google;
pub mod openai;

/// Create a provider for `service_type` using the current configuration
pub fn create_provider(
    service_type: ServiceType,
    config: &Config,
) -> Result<Arc<dyn QueryService>, Box<dyn Error>> {
    match service_type {
        ServiceType::Google => Ok(Arc::new(google::GoogleService::new())),
        ServiceType::OpenAI => Ok(Arc::new(openai::OpenAIService::new(config.openai.clone()))),
        other => Err(format!("Provider not available in this build: {}", other).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_known_providers() {
        let config = Config::default();
        let google = create_provider(ServiceType::Google, &config).unwrap();
        assert_eq!(google.service_type(), ServiceType::Google);
        let openai = create_provider(ServiceType::OpenAI, &config).unwrap();
        assert!(openai.is_stream());
    }

    #[test]
    fn test_unknown_provider() {
        assert!(create_provider(ServiceType::Baidu, &Config::default()).is_err());
    }
}
