//! Claim identity.

use super::canonical::{canonicalize_context, canonicalize_parameters};
use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha3::{Digest, Keccak256};

/// What is being claimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimInfo {
    pub provider: String,
    /// JSON object describing the request.
    pub parameters: String,
    /// Free-form JSON supplied by the owner, or empty.
    pub context: String,
}

impl ClaimInfo {
    pub fn new(
        provider: impl Into<String>,
        parameters: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            parameters: parameters.into(),
            context: context.into(),
        }
    }

    /// Same claim with parameters and context in canonical form.
    pub fn canonical(&self) -> ProtocolResult<Self> {
        Ok(Self {
            provider: self.provider.clone(),
            parameters: canonicalize_parameters(&self.parameters)?,
            context: canonicalize_context(&self.context)?,
        })
    }

    /// `0x`-prefixed lowercase Keccak-256 of the canonical claim.
    pub fn identifier(&self) -> ProtocolResult<String> {
        let canonical = self.canonical()?;
        let joined = format!(
            "{}\n{}\n{}",
            canonical.provider, canonical.parameters, canonical.context
        );
        Ok(format!("0x{}", hex::encode(Keccak256::digest(joined.as_bytes()))))
    }

    /// Merge extracted values into the context under `extractedParameters`.
    pub fn with_extracted_parameters(&self, extracted: &Map<String, Value>) -> ProtocolResult<Self> {
        if extracted.is_empty() {
            return Ok(self.clone());
        }

        let mut context = if self.context.is_empty() {
            Map::new()
        } else {
            match serde_json::from_str::<Value>(&self.context) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    return Err(ProtocolError::bad_request(
                        "context must be a JSON object to hold extracted parameters",
                    ))
                }
                Err(e) => {
                    return Err(ProtocolError::bad_request(format!(
                        "context is not JSON: {}",
                        e
                    )))
                }
            }
        };
        context.insert(
            "extractedParameters".to_string(),
            Value::Object(extracted.clone()),
        );

        Ok(Self {
            provider: self.provider.clone(),
            parameters: self.parameters.clone(),
            context: Value::Object(context).to_string(),
        })
    }
}

/// Claim as signed by the witness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteClaimData {
    pub provider: String,
    pub parameters: String,
    pub context: String,
    pub identifier: String,
    /// Owner address, `0x`-prefixed hex.
    pub owner: String,
    pub timestamp_s: u32,
    pub epoch: u32,
}

impl CompleteClaimData {
    pub fn new(info: &ClaimInfo, owner: &str, timestamp_s: u32, epoch: u32) -> ProtocolResult<Self> {
        let canonical = info.canonical()?;
        Ok(Self {
            identifier: canonical.identifier()?,
            provider: canonical.provider,
            parameters: canonical.parameters,
            context: canonical.context,
            owner: owner.to_lowercase(),
            timestamp_s,
            epoch,
        })
    }

    pub fn info(&self) -> ClaimInfo {
        ClaimInfo::new(&self.provider, &self.parameters, &self.context)
    }
}

/// Bytes witnesses sign to attest a claim.
///
/// `identifier \n owner \n timestamp_s \n epoch`, owner lowercased.
pub fn claim_sign_data(claim: &CompleteClaimData) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        claim.identifier.to_lowercase(),
        claim.owner.to_lowercase(),
        claim.timestamp_s,
        claim.epoch
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_identifier_is_canonical_and_prefixed() {
        let a = ClaimInfo::new("http", r#"{"url":"https://a","method":"GET"}"#, "");
        let b = ClaimInfo::new("http", r#"{"method":"GET","url":"https://a"}"#, "");

        let id = a.identifier().unwrap();
        assert_eq!(id, b.identifier().unwrap());
        assert!(id.starts_with("0x"));
        assert_eq!(id.len(), 66);
        assert_eq!(id, id.to_lowercase());

        let c = ClaimInfo::new("http", r#"{"method":"GET","url":"https://a"}"#, r#"{"k":1}"#);
        assert_ne!(id, c.identifier().unwrap());
    }

    #[test]
    fn test_identifier_matches_keccak_of_joined_fields() {
        let info = ClaimInfo::new("http", r#"{"b":2,"a":1}"#, "");
        let expected = Keccak256::digest(b"http\n{\"a\":1,\"b\":2}\n");
        assert_eq!(info.identifier().unwrap(), format!("0x{}", hex::encode(expected)));
    }

    #[test]
    fn test_non_json_context_rejected() {
        let info = ClaimInfo::new("http", "{}", "hello");
        assert_eq!(info.identifier().unwrap_err().code, ErrorCode::BadRequest);
    }

    #[test]
    fn test_extracted_parameters_change_identifier() {
        let info = ClaimInfo::new("http", "{}", r#"{"note":"x"}"#);
        let mut extracted = Map::new();
        extracted.insert("username".to_string(), Value::String("alice".to_string()));

        let merged = info.with_extracted_parameters(&extracted).unwrap();
        let context: Value = serde_json::from_str(&merged.context).unwrap();
        assert_eq!(context["note"], "x");
        assert_eq!(context["extractedParameters"]["username"], "alice");
        assert_ne!(merged.identifier().unwrap(), info.identifier().unwrap());

        assert_eq!(info.with_extracted_parameters(&Map::new()).unwrap(), info);
    }

    #[test]
    fn test_sign_data_layout() {
        let info = ClaimInfo::new("http", "{}", "");
        let claim = CompleteClaimData::new(&info, "0xABCDEF", 1_700_000_000, 3).unwrap();
        let data = claim_sign_data(&claim);
        let lines: Vec<&str> = data.split('\n').collect();
        assert_eq!(lines, vec![claim.identifier.as_str(), "0xabcdef", "1700000000", "3"]);
    }
}
