use crate::model::ServiceType;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Free-quota and API-key lookups the prehandler consults.
pub trait QuotaLedger: Send + Sync {
    fn has_free_quota_left(&self, service: ServiceType) -> bool;

    fn has_private_api_key(&self, service: ServiceType) -> bool;

    /// Record characters sent to a provider after a successful dispatch.
    fn record_usage(&self, service: ServiceType, characters: usize);
}

#[derive(Debug, Default)]
struct LedgerState {
    used: HashMap<ServiceType, usize>,
    limits: HashMap<ServiceType, usize>,
    private_keys: HashSet<ServiceType>,
}

/// In-memory character counter per service.
///
/// A service without a configured limit never runs out of free quota.
#[derive(Debug, Default)]
pub struct UsageLedger {
    state: Mutex<LedgerState>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_free_limit(&self, service: ServiceType, characters: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.limits.insert(service, characters);
        }
    }

    pub fn set_private_api_key(&self, service: ServiceType, present: bool) {
        if let Ok(mut state) = self.state.lock() {
            if present {
                state.private_keys.insert(service);
            } else {
                state.private_keys.remove(&service);
            }
        }
    }

    pub fn used(&self, service: ServiceType) -> usize {
        self.state
            .lock()
            .map(|state| state.used.get(&service).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl QuotaLedger for UsageLedger {
    fn has_free_quota_left(&self, service: ServiceType) -> bool {
        match self.state.lock() {
            Ok(state) => match state.limits.get(&service) {
                Some(limit) => state.used.get(&service).copied().unwrap_or(0) < *limit,
                None => true,
            },
            Err(_) => true,
        }
    }

    fn has_private_api_key(&self, service: ServiceType) -> bool {
        self.state
            .lock()
            .map(|state| state.private_keys.contains(&service))
            .unwrap_or(false)
    }

    fn record_usage(&self, service: ServiceType, characters: usize) {
        if let Ok(mut state) = self.state.lock() {
            *state.used.entry(service).or_insert(0) += characters;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_exhaustion() {
        let ledger = UsageLedger::new();
        ledger.set_free_limit(ServiceType::OpenAI, 10);
        assert!(ledger.has_free_quota_left(ServiceType::OpenAI));

        ledger.record_usage(ServiceType::OpenAI, 6);
        assert!(ledger.has_free_quota_left(ServiceType::OpenAI));
        ledger.record_usage(ServiceType::OpenAI, 4);
        assert!(!ledger.has_free_quota_left(ServiceType::OpenAI));
        assert_eq!(ledger.used(ServiceType::OpenAI), 10);
    }

    #[test]
    fn test_unlimited_without_limit() {
        let ledger = UsageLedger::new();
        ledger.record_usage(ServiceType::Google, 1_000_000);
        assert!(ledger.has_free_quota_left(ServiceType::Google));
    }

    #[test]
    fn test_private_key_flag() {
        let ledger = UsageLedger::new();
        assert!(!ledger.has_private_api_key(ServiceType::OpenAI));
        ledger.set_private_api_key(ServiceType::OpenAI, true);
        assert!(ledger.has_private_api_key(ServiceType::OpenAI));
        ledger.set_private_api_key(ServiceType::OpenAI, false);
        assert!(!ledger.has_private_api_key(ServiceType::OpenAI));
    }
}
