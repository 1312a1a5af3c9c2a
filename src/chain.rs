//! Chain registry
//!
//! Builds one SDK chain per configuration entry and keeps them by id.

use crate::error::{Error, Result};
use crate::sdk::{Chain, ErrorHandler, LogLevel, Sdk};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Tag used for messages written to the SDK log
pub const LOG_TAG: &str = "imagefilter";

/// Chains created from the `chains` configuration section
pub struct ChainRegistry {
    chains: HashMap<String, Arc<dyn Chain>>,
}

impl ChainRegistry {
    /// Create every configured chain.
    ///
    /// Each chain reports element failures through a shared handler that
    /// writes the element id and error code to the SDK log.
    pub fn build(sdk: &Arc<dyn Sdk>, chains_config: &[Value]) -> Result<Self> {
        let on_error = element_error_handler(sdk);
        let mut chains: HashMap<String, Arc<dyn Chain>> = HashMap::new();

        for (index, chain_config) in chains_config.iter().enumerate() {
            let id = chain_config
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::Config(format!("chain #{} has no string `id`", index)))?;

            if chains.contains_key(id) {
                return Err(Error::Config(format!("duplicate chain id `{}`", id)));
            }

            let chain = sdk.create_chain(&chain_config.to_string(), on_error.clone())?;
            tracing::debug!("Created chain `{}`", id);
            chains.insert(id.to_string(), chain);
        }

        Ok(Self { chains })
    }

    /// Look up a chain by id
    pub fn get(&self, id: &str) -> Result<Arc<dyn Chain>> {
        self.chains
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownChain(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.chains.contains_key(id)
    }

    /// Chain ids, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.chains.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

/// Error callback shared by all chains
pub fn element_error_handler(sdk: &Arc<dyn Sdk>) -> ErrorHandler {
    let sdk = Arc::downgrade(sdk);
    Arc::new(move |element_id: &str, error_code: i32| {
        let message = format!(
            "Chain element `{}` reported an error: {}",
            element_id, error_code
        );
        match sdk.upgrade() {
            Some(sdk) => sdk.log(LogLevel::Error, LOG_TAG, &message),
            None => tracing::error!("{}", message),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::LoopbackSdk;

    fn sdk() -> Arc<dyn Sdk> {
        let sdk = LoopbackSdk::new();
        sdk.initialize("{}").unwrap();
        Arc::new(sdk)
    }

    fn chains(text: &str) -> Vec<Value> {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_build_registry() {
        let sdk = sdk();
        let registry = ChainRegistry::build(
            &sdk,
            &chains(r#"[{"id": "import"}, {"id": "export", "elements": []}]"#),
        )
        .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids(), vec!["export", "import"]);
        assert_eq!(registry.get("export").unwrap().id(), "export");
        assert!(matches!(registry.get("other"), Err(Error::UnknownChain(_))));
    }

    #[test]
    fn test_missing_id() {
        let sdk = sdk();
        let result = ChainRegistry::build(&sdk, &chains(r#"[{"elements": []}]"#));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_duplicate_id() {
        let sdk = sdk();
        let result = ChainRegistry::build(&sdk, &chains(r#"[{"id": "a"}, {"id": "a"}]"#));
        let err = result.err().unwrap();
        assert!(err.to_string().contains("duplicate chain id `a`"));
    }

    #[derive(Default)]
    struct RecordingSdk {
        logs: parking_lot::Mutex<Vec<(LogLevel, String, String)>>,
    }

    impl Sdk for RecordingSdk {
        fn initialize(&self, _config: &str) -> Result<()> {
            Ok(())
        }

        fn finalize(&self) {}

        fn log(&self, level: LogLevel, tag: &str, message: &str) {
            self.logs
                .lock()
                .push((level, tag.to_string(), message.to_string()));
        }

        fn create_chain(&self, _config: &str, _on_error: ErrorHandler) -> Result<Arc<dyn Chain>> {
            Err(Error::Sdk("no chains".into()))
        }
    }

    #[test]
    fn test_error_handler_logs_through_sdk() {
        let recording = Arc::new(RecordingSdk::default());
        let sdk: Arc<dyn Sdk> = recording.clone();
        let handler = element_error_handler(&sdk);

        handler("importer", -75);

        assert_eq!(
            *recording.logs.lock(),
            vec![(
                LogLevel::Error,
                LOG_TAG.to_string(),
                "Chain element `importer` reported an error: -75".to_string()
            )]
        );
    }

    #[test]
    fn test_error_handler_outlives_sdk() {
        let recording = Arc::new(RecordingSdk::default());
        let handler = {
            let sdk: Arc<dyn Sdk> = recording.clone();
            element_error_handler(&sdk)
        };
        assert_eq!(Arc::strong_count(&recording), 1);

        let weak = Arc::downgrade(&recording);
        drop(recording);
        assert!(weak.upgrade().is_none());

        // falls back to tracing
        handler("importer", -1);
    }
}
