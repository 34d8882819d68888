//! Admin config gate
//!
//! The reward rate is the one configuration value a client can change, and
//! only with a detached Ed25519 signature from the administrator key held in
//! the running configuration. Checks run in a fixed order so that malformed
//! input is rejected before any key or signature is decoded:
//!
//! 1. every field present and the rate a non-negative number → `InvalidRequest`
//! 2. administrator key configured and decodable → `ServerMisconfigured`
//! 3. candidate key equal to the administrator key → `Unauthorized`
//! 4. signature verifies over the message bytes → `Unauthorized`
//!
//! Persisting the authorized rate is the actor's job.

use crate::{
    config::AdminConfig,
    crypto::{self, PUBLIC_KEY_LENGTH},
    Error, Result,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Rate update as received from a client
///
/// Every field is optional so that absence is reported as `InvalidRequest`
/// by the gate rather than as a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateUpdateRequest {
    /// New reward rate in percent, JSON number or numeric string
    #[serde(rename = "apy", alias = "rate")]
    pub rate: Option<serde_json::Value>,

    /// Candidate administrator key, base58
    pub public_key: Option<String>,

    /// Signed message, verified as UTF-8 bytes
    pub message: Option<String>,

    /// Detached signature, base58
    pub signature: Option<String>,
}

/// Rate update that passed every gate check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedRateUpdate {
    /// Validated rate
    pub rate: Decimal,

    /// Administrator key that signed, base58
    pub admin_key: String,

    /// SHA-256 of the raw signature bytes
    pub signature_digest: [u8; 32],
}

/// Verifies admin rate updates against the configured key
#[derive(Debug, Clone)]
pub struct AdminGate {
    admin_public_key: Option<String>,
}

impl AdminGate {
    /// Gate for the configured administrator key
    pub fn new(config: &AdminConfig) -> Self {
        Self {
            admin_public_key: config
                .public_key
                .as_deref()
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string),
        }
    }

    /// Whether an administrator key is configured at all
    pub fn is_configured(&self) -> bool {
        self.admin_public_key.is_some()
    }

    /// Run the checks in order and return the authorized update
    pub fn authorize(&self, request: &RateUpdateRequest) -> Result<AuthorizedRateUpdate> {
        let (rate, candidate_key, message, signature) = match (
            request.rate.as_ref(),
            non_blank(request.public_key.as_deref()),
            request.message.as_deref().filter(|m| !m.trim().is_empty()),
            non_blank(request.signature.as_deref()),
        ) {
            (Some(rate), Some(key), Some(message), Some(signature)) => {
                (rate, key, message, signature)
            }
            _ => {
                return Err(Error::InvalidRequest(
                    "Missing required fields: apy, publicKey, message, signature".to_string(),
                ))
            }
        };

        let rate = parse_rate(rate)?;

        let admin_key = self.admin_public_key.as_deref().ok_or_else(|| {
            Error::ServerMisconfigured("Admin public key not configured".to_string())
        })?;
        let admin_key_bytes = crypto::decode_public_key(admin_key).map_err(|e| {
            Error::ServerMisconfigured(format!("Configured admin public key is invalid: {}", e))
        })?;

        let candidate_bytes: [u8; PUBLIC_KEY_LENGTH] = crypto::decode_public_key(candidate_key)
            .map_err(|_| Error::Unauthorized("Not an admin wallet".to_string()))?;
        if candidate_bytes != admin_key_bytes {
            return Err(Error::Unauthorized("Not an admin wallet".to_string()));
        }

        let signature_bytes = crypto::decode_signature(signature)
            .map_err(|_| Error::Unauthorized("Invalid signature".to_string()))?;
        if !crypto::verify_signature(message.as_bytes(), &signature_bytes, &admin_key_bytes) {
            return Err(Error::Unauthorized("Invalid signature".to_string()));
        }

        Ok(AuthorizedRateUpdate {
            rate,
            admin_key: admin_key.to_string(),
            signature_digest: crypto::hash_bytes(&signature_bytes),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parse a rate given as a JSON number or numeric string
pub fn parse_rate(value: &serde_json::Value) -> Result<Decimal> {
    let text = match value {
        serde_json::Value::Number(number) => number.to_string(),
        serde_json::Value::String(text) => text.trim().to_string(),
        _ => return Err(Error::InvalidRequest("Invalid APY value".to_string())),
    };

    let rate = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| Error::InvalidRequest("Invalid APY value".to_string()))?;

    if rate.is_sign_negative() && !rate.is_zero() {
        return Err(Error::InvalidRequest("Invalid APY value".to_string()));
    }

    Ok(rate.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use serde_json::json;

    fn admin() -> KeyPair {
        KeyPair::from_seed(&[7u8; 32])
    }

    fn gate_for(key: Option<String>) -> AdminGate {
        AdminGate::new(&AdminConfig {
            public_key: key,
            ..AdminConfig::default()
        })
    }

    fn signed_request(signer: &KeyPair, claimed_key: String, rate: serde_json::Value) -> RateUpdateRequest {
        let message = "Update APY to 12 at 1700000000".to_string();
        RateUpdateRequest {
            rate: Some(rate),
            public_key: Some(claimed_key),
            signature: Some(signer.sign_base58(message.as_bytes())),
            message: Some(message),
        }
    }

    #[test]
    fn test_authorized_update() {
        let admin = admin();
        let gate = gate_for(Some(admin.public_key_base58()));

        let update = gate
            .authorize(&signed_request(&admin, admin.public_key_base58(), json!(12)))
            .unwrap();
        assert_eq!(update.rate, Decimal::from(12));
        assert_eq!(update.admin_key, admin.public_key_base58());
    }

    #[test]
    fn test_numeric_string_rate() {
        let admin = admin();
        let gate = gate_for(Some(admin.public_key_base58()));

        let update = gate
            .authorize(&signed_request(&admin, admin.public_key_base58(), json!("7.25")))
            .unwrap();
        assert_eq!(update.rate, Decimal::new(725, 2));
    }

    #[test]
    fn test_negative_rate_rejected_before_verification() {
        // Misconfigured gate and a garbage signature: the rate check still wins
        let gate = gate_for(None);
        let request = RateUpdateRequest {
            rate: Some(json!(-1)),
            public_key: Some("not-a-key".to_string()),
            message: Some("m".to_string()),
            signature: Some("not-a-signature".to_string()),
        };

        assert!(matches!(gate.authorize(&request), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_missing_fields() {
        let gate = gate_for(Some(admin().public_key_base58()));
        let request = RateUpdateRequest {
            rate: Some(json!(5)),
            ..RateUpdateRequest::default()
        };

        assert!(matches!(gate.authorize(&request), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_blank_message_is_missing() {
        let admin = admin();
        let gate = gate_for(Some(admin.public_key_base58()));

        for blank in ["", "   "] {
            let request = RateUpdateRequest {
                rate: Some(json!(5)),
                public_key: Some(admin.public_key_base58()),
                signature: Some(admin.sign_base58(blank.as_bytes())),
                message: Some(blank.to_string()),
            };
            assert!(matches!(gate.authorize(&request), Err(Error::InvalidRequest(_))));
        }
    }

    #[test]
    fn test_message_verified_untrimmed() {
        let admin = admin();
        let gate = gate_for(Some(admin.public_key_base58()));
        let message = " Update APY to 9 ";
        let request = RateUpdateRequest {
            rate: Some(json!(9)),
            public_key: Some(admin.public_key_base58()),
            signature: Some(admin.sign_base58(message.as_bytes())),
            message: Some(message.to_string()),
        };

        assert_eq!(gate.authorize(&request).unwrap().rate, Decimal::from(9));
    }

    #[test]
    fn test_non_numeric_rate() {
        let admin = admin();
        let gate = gate_for(Some(admin.public_key_base58()));

        for bad in [json!("abc"), json!(true), json!([1])] {
            let request = signed_request(&admin, admin.public_key_base58(), bad);
            assert!(matches!(gate.authorize(&request), Err(Error::InvalidRequest(_))));
        }
    }

    #[test]
    fn test_unconfigured_key_is_server_misconfigured() {
        let admin = admin();
        let request = signed_request(&admin, admin.public_key_base58(), json!(12));

        assert!(matches!(
            gate_for(None).authorize(&request),
            Err(Error::ServerMisconfigured(_))
        ));
        assert!(matches!(
            gate_for(Some("0OIl".to_string())).authorize(&request),
            Err(Error::ServerMisconfigured(_))
        ));
    }

    #[test]
    fn test_non_admin_key_is_unauthorized() {
        let admin = admin();
        let intruder = KeyPair::from_seed(&[8u8; 32]);
        let gate = gate_for(Some(admin.public_key_base58()));

        let request = signed_request(&intruder, intruder.public_key_base58(), json!(12));
        assert!(matches!(gate.authorize(&request), Err(Error::Unauthorized(_))));
    }

    #[test]
    fn test_wrong_signature_with_matching_key_is_unauthorized() {
        let admin = admin();
        let intruder = KeyPair::from_seed(&[8u8; 32]);
        let gate = gate_for(Some(admin.public_key_base58()));

        // Claims the admin key but signs with another
        let request = signed_request(&intruder, admin.public_key_base58(), json!(12));
        assert!(matches!(gate.authorize(&request), Err(Error::Unauthorized(_))));

        // Well-formed signature over a different message
        let mut request = signed_request(&admin, admin.public_key_base58(), json!(12));
        request.message = Some("Update APY to 99".to_string());
        assert!(matches!(gate.authorize(&request), Err(Error::Unauthorized(_))));
    }

    #[test]
    fn test_parse_rate_forms() {
        assert_eq!(parse_rate(&json!(0)).unwrap(), Decimal::ZERO);
        assert_eq!(parse_rate(&json!(12.5)).unwrap(), Decimal::new(125, 1));
        assert_eq!(parse_rate(&json!(" 15 ")).unwrap(), Decimal::from(15));
        assert_eq!(parse_rate(&json!("1e1")).unwrap(), Decimal::from(10));
        assert!(parse_rate(&json!("-0.5")).is_err());
    }
}
