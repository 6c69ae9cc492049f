//! Provider contract.
//!
//! A provider knows how to build the request for one kind of claim, which
//! parts of the response to hide, and how to validate a revealed transcript.
//! Providers are registered by name; request and response parsing live in
//! the provider implementations, not here.

use crate::error::{ProtocolError, ProtocolResult};
use crate::redaction::RedactionRange;
use crate::transcript::Sender;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Parameters a provider pulls out of a valid receipt.
pub type ExtractedParameters = Map<String, Value>;

type Derive<T> = Arc<dyn Fn(&Value) -> ProtocolResult<T> + Send + Sync>;

/// A provider setting that is either fixed or computed from claim parameters.
pub enum ProviderField<T> {
    Static(T),
    Derived(Derive<T>),
}

impl<T: Clone> ProviderField<T> {
    pub fn derived<F>(f: F) -> Self
    where
        F: Fn(&Value) -> ProtocolResult<T> + Send + Sync + 'static,
    {
        Self::Derived(Arc::new(f))
    }

    pub fn resolve(&self, params: &Value) -> ProtocolResult<T> {
        match self {
            Self::Static(value) => Ok(value.clone()),
            Self::Derived(derive) => derive(params),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ProviderField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

/// Request bytes to send through the tunnel and the ranges to hide in them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    pub data: Vec<u8>,
    pub redactions: Vec<RedactionRange>,
}

/// One direction's revealed bytes as the verifier reconstructed them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptMessage {
    pub sender: Sender,
    /// Redacted plaintext; hidden bytes are the sentinel.
    pub data: Vec<u8>,
}

/// Revealed transcript handed to a provider for validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderReceipt {
    pub messages: Vec<ReceiptMessage>,
}

impl ProviderReceipt {
    /// Concatenated bytes sent by `sender`.
    pub fn bytes_from(&self, sender: Sender) -> Vec<u8> {
        self.messages
            .iter()
            .filter(|m| m.sender == sender)
            .flat_map(|m| m.data.iter().copied())
            .collect()
    }
}

/// Capability implemented once per provider kind.
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// `host:port` the tunnel must connect to.
    fn host_port(&self) -> &ProviderField<String>;

    fn geo_location(&self) -> &ProviderField<Option<String>>;

    fn create_request(
        &self,
        params: &Value,
        secret_params: &Value,
    ) -> ProtocolResult<ProviderRequest>;

    /// Ranges of the concatenated response to hide or hash.
    fn response_redactions(
        &self,
        response: &[u8],
        params: &Value,
    ) -> ProtocolResult<Vec<RedactionRange>>;

    /// Check the receipt proves the claim, returning any extracted values.
    fn assert_valid_provider_receipt(
        &self,
        receipt: &ProviderReceipt,
        params: &Value,
    ) -> ProtocolResult<ExtractedParameters>;
}

/// Providers keyed by name.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> ProtocolResult<Arc<dyn Provider>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| ProtocolError::bad_request(format!("unknown provider {:?}", name)))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Parse claim parameters into a JSON value.
pub fn parse_params(parameters: &str) -> ProtocolResult<Value> {
    serde_json::from_str(parameters)
        .map_err(|e| ProtocolError::bad_request(format!("parameters are not JSON: {}", e)))
}
