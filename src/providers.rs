use std::sync::Arc;

use agent_provider::AgentBackend;
use agent_provider_mock::{MockBackend, MOCK_PROVIDER_ID};

pub const DEFAULT_PROVIDER_ID: &str = MOCK_PROVIDER_ID;

pub fn backend_for_id(provider_id: &str) -> Result<Arc<dyn AgentBackend>, String> {
    match provider_id {
        DEFAULT_PROVIDER_ID => Ok(Arc::new(MockBackend::demo())),
        unknown => Err(format!(
            "Unsupported provider '{unknown}'. Available providers: {DEFAULT_PROVIDER_ID}"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_for_id_supports_mock() {
        let backend = backend_for_id("mock").expect("mock backend should resolve");
        assert_eq!(backend.provider_id(), "mock");
    }

    #[test]
    fn backend_for_id_rejects_unknown_provider() {
        let error = match backend_for_id("custom") {
            Ok(_) => panic!("unknown providers should fail"),
            Err(error) => error,
        };

        assert_eq!(
            error,
            "Unsupported provider 'custom'. Available providers: mock"
        );
    }
}
