//! Disclosure contracts.
//!
//! A [`DisclosureContract`] decides which identity fields a caller may see.
//! [`DisclosedIdentity`] can only be built through a contract, so a value of
//! that type never carries a field outside its contract's whitelist, no
//! matter what the token or the upstream authority put in front of us.

use crate::auth::claims::IdentityClaims;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// How much an identity can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTrust {
    /// Signature verified locally against a trusted key.
    LocalSignature,
    /// Confirmed by the upstream authority.
    Upstream,
    /// Payload decoded without any verification. Display only.
    UnverifiedDecode,
}

impl SourceTrust {
    pub fn is_verified(&self) -> bool {
        !matches!(self, SourceTrust::UnverifiedDecode)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTrust::LocalSignature => "local_signature",
            SourceTrust::Upstream => "upstream",
            SourceTrust::UnverifiedDecode => "unverified_decode",
        }
    }
}

/// Alternate names accepted for canonical fields, checked in order.
const FIELD_ALIASES: &[(&str, &[&str])] = &[
    ("id", &["sub", "user_id"]),
    ("name", &["display_name", "full_name"]),
    ("photo", &["picture", "avatar", "photo_url"]),
    ("birth_date", &["birthdate", "date_of_birth"]),
    ("phone", &["phone_number"]),
];

/// Wrapper keys upstream authorities nest the identity under.
const CONTAINER_KEYS: &[&str] = &["user", "data", "identity", "profile"];

/// Maximum nesting depth unwrapped by [`unwrap_container`].
const MAX_CONTAINER_DEPTH: usize = 3;

const PUBLIC_FIELDS: &[&str] = &["id", "email", "role", "name", "phone", "birth_date", "photo"];

const INTERNAL_FIELDS: &[&str] = &[
    "id",
    "email",
    "role",
    "name",
    "phone",
    "birth_date",
    "photo",
    "alg",
    "iss",
    "aud",
    "kid",
];

/// Named field whitelist plus the enrichment policy for that caller class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisclosureContract {
    name: &'static str,
    fields: &'static [&'static str],
    enrich_from_upstream: bool,
}

/// End-user profile view. Always enriched by the upstream authority.
pub const PUBLIC: DisclosureContract = DisclosureContract {
    name: "public",
    fields: PUBLIC_FIELDS,
    enrich_from_upstream: true,
};

/// Service-to-service view. Adds token metadata; local verification suffices.
pub const INTERNAL: DisclosureContract = DisclosureContract {
    name: "internal",
    fields: INTERNAL_FIELDS,
    enrich_from_upstream: false,
};

impl DisclosureContract {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &'static [&'static str] {
        self.fields
    }

    /// Whether a locally verified identity should still be confirmed and
    /// enriched by the upstream authority.
    pub fn enriches_from_upstream(&self) -> bool {
        self.enrich_from_upstream
    }

    pub fn allows(&self, field: &str) -> bool {
        self.fields.contains(&field)
    }

    /// Normalize field names, then keep only whitelisted, non-null fields.
    pub fn disclose(&self, raw: &Map<String, Value>, source: SourceTrust) -> DisclosedIdentity {
        let fields = normalize_fields(raw)
            .into_iter()
            .filter(|(key, value)| self.allows(key) && !value.is_null())
            .collect();

        DisclosedIdentity {
            fields,
            source,
            contract: *self,
        }
    }

    pub fn disclose_claims(&self, claims: &IdentityClaims, source: SourceTrust) -> DisclosedIdentity {
        self.disclose(&claims.to_fields(), source)
    }
}

/// Rename aliases to canonical names. A canonical key present in the input
/// always wins over its aliases; among aliases the first listed wins.
fn normalize_fields(raw: &Map<String, Value>) -> Map<String, Value> {
    let mut normalized = Map::new();

    for (key, value) in raw {
        let is_alias = FIELD_ALIASES
            .iter()
            .any(|(_, aliases)| aliases.contains(&key.as_str()));
        if !is_alias {
            normalized.insert(key.clone(), value.clone());
        }
    }

    for (canonical, aliases) in FIELD_ALIASES {
        if normalized.contains_key(*canonical) {
            continue;
        }
        if let Some(value) = aliases
            .iter()
            .find_map(|alias| raw.get(*alias).filter(|v| !v.is_null()))
        {
            normalized.insert((*canonical).to_string(), value.clone());
        }
    }

    normalized
}

/// Find the identity object inside an upstream response body.
///
/// Descends through `user` / `data` / `identity` / `profile` wrappers, up to
/// three levels, stopping at the first object that carries a recognizable
/// identity field. Returns `None` for non-object bodies.
pub fn unwrap_container(body: &Value) -> Option<&Map<String, Value>> {
    let mut current = body.as_object()?;

    for _ in 0..MAX_CONTAINER_DEPTH {
        if has_identity_field(current) {
            break;
        }
        let nested = CONTAINER_KEYS
            .iter()
            .find_map(|key| current.get(*key).and_then(Value::as_object));
        match nested {
            Some(inner) => current = inner,
            None => break,
        }
    }

    Some(current)
}

fn has_identity_field(map: &Map<String, Value>) -> bool {
    map.keys().any(|key| {
        PUBLIC_FIELDS.contains(&key.as_str())
            || FIELD_ALIASES
                .iter()
                .any(|(_, aliases)| aliases.contains(&key.as_str()))
    })
}

/// An identity filtered through a contract.
#[derive(Clone, PartialEq)]
pub struct DisclosedIdentity {
    fields: Map<String, Value>,
    source: SourceTrust,
    contract: DisclosureContract,
}

impl DisclosedIdentity {
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn source(&self) -> SourceTrust {
        self.source
    }

    pub fn is_verified(&self) -> bool {
        self.source.is_verified()
    }

    pub fn contract(&self) -> DisclosureContract {
        self.contract
    }

    /// The canonical `id`, as a string.
    pub fn subject(&self) -> Option<String> {
        match self.fields.get("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Merge `self` over `base`: fields present here win, fields only in
    /// `base` are kept. The result carries this identity's source and stays
    /// within this identity's contract.
    pub fn merged_over(self, base: &DisclosedIdentity) -> DisclosedIdentity {
        let mut fields = self.fields;
        for (key, value) in &base.fields {
            if self.contract.allows(key) && !fields.contains_key(key) {
                fields.insert(key.clone(), value.clone());
            }
        }

        DisclosedIdentity {
            fields,
            source: self.source,
            contract: self.contract,
        }
    }
}

/// Field names only; values may be personal data.
impl fmt::Debug for DisclosedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisclosedIdentity")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("source", &self.source)
            .field("contract", &self.contract.name)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_public_contract_never_discloses_extra_fields() {
        let raw = object(json!({
            "sub": "u1",
            "email": "u1@example.com",
            "ssn": "123-45-6789",
            "password_hash": "$2b$...",
            "iss": "https://auth.example.com",
            "kid": "k1",
        }));

        let identity = PUBLIC.disclose(&raw, SourceTrust::Upstream);

        assert_eq!(identity.get("id"), Some(&json!("u1")));
        assert_eq!(identity.get("email"), Some(&json!("u1@example.com")));
        for key in identity.fields().keys() {
            assert!(PUBLIC.allows(key), "field {} leaked", key);
        }
        assert!(identity.get("ssn").is_none());
        assert!(identity.get("iss").is_none());
        assert!(identity.get("kid").is_none());
    }

    #[test]
    fn test_internal_contract_adds_token_metadata() {
        let raw = object(json!({
            "sub": "u1",
            "alg": "EdDSA",
            "iss": "https://auth.example.com",
            "aud": ["web"],
            "kid": "k1",
            "ssn": "123-45-6789",
        }));

        let identity = INTERNAL.disclose(&raw, SourceTrust::LocalSignature);

        assert_eq!(identity.get("alg"), Some(&json!("EdDSA")));
        assert_eq!(identity.get("aud"), Some(&json!(["web"])));
        assert!(identity.get("ssn").is_none());
    }

    #[test]
    fn test_aliases_are_normalized() {
        let raw = object(json!({
            "user_id": "u2",
            "full_name": "User Two",
            "avatar": "https://cdn/u2.png",
            "date_of_birth": "1990-01-01",
            "phone_number": "+15550100",
        }));

        let identity = PUBLIC.disclose(&raw, SourceTrust::Upstream);

        assert_eq!(identity.get("id"), Some(&json!("u2")));
        assert_eq!(identity.get("name"), Some(&json!("User Two")));
        assert_eq!(identity.get("photo"), Some(&json!("https://cdn/u2.png")));
        assert_eq!(identity.get("birth_date"), Some(&json!("1990-01-01")));
        assert_eq!(identity.get("phone"), Some(&json!("+15550100")));
        assert!(identity.get("user_id").is_none());
    }

    #[test]
    fn test_canonical_name_wins_over_alias() {
        let raw = object(json!({"id": "canonical", "sub": "alias", "picture": "p1", "avatar": "p2"}));

        let identity = PUBLIC.disclose(&raw, SourceTrust::Upstream);

        assert_eq!(identity.get("id"), Some(&json!("canonical")));
        assert_eq!(identity.get("photo"), Some(&json!("p1")));
    }

    #[test]
    fn test_null_fields_are_dropped() {
        let raw = object(json!({"id": "u3", "photo": null, "picture": null}));

        let identity = PUBLIC.disclose(&raw, SourceTrust::Upstream);

        assert!(identity.get("photo").is_none());
    }

    #[test]
    fn test_merge_prefers_upstream_values() {
        let local = PUBLIC.disclose(
            &object(json!({"sub": "u1", "email": "old@example.com", "role": "member"})),
            SourceTrust::LocalSignature,
        );
        let upstream = PUBLIC.disclose(
            &object(json!({"id": "u1", "email": "new@example.com", "name": "New Name"})),
            SourceTrust::Upstream,
        );

        let merged = upstream.merged_over(&local);

        assert_eq!(merged.get("email"), Some(&json!("new@example.com")));
        assert_eq!(merged.get("name"), Some(&json!("New Name")));
        // Kept from local because upstream did not supply it
        assert_eq!(merged.get("role"), Some(&json!("member")));
        assert_eq!(merged.source(), SourceTrust::Upstream);
    }

    #[test]
    fn test_merge_stays_within_contract() {
        let internal_local = INTERNAL.disclose(
            &object(json!({"sub": "u1", "kid": "k1", "iss": "i"})),
            SourceTrust::LocalSignature,
        );
        let upstream = PUBLIC.disclose(&object(json!({"id": "u1"})), SourceTrust::Upstream);

        let merged = upstream.merged_over(&internal_local);

        assert!(merged.get("kid").is_none());
        assert!(merged.get("iss").is_none());
    }

    #[test]
    fn test_unwrap_container_levels() {
        let flat = json!({"id": "u1"});
        let one = json!({"user": {"id": "u1"}});
        let three = json!({"data": {"identity": {"profile": {"email": "e"}}}});
        let four = json!({"data": {"data": {"data": {"data": {"id": "deep"}}}}});

        assert_eq!(unwrap_container(&flat).unwrap().get("id"), Some(&json!("u1")));
        assert_eq!(unwrap_container(&one).unwrap().get("id"), Some(&json!("u1")));
        assert_eq!(
            unwrap_container(&three).unwrap().get("email"),
            Some(&json!("e"))
        );
        // Stops after three levels
        assert!(unwrap_container(&four).unwrap().get("id").is_none());
    }

    #[test]
    fn test_unwrap_container_rejects_non_objects() {
        assert!(unwrap_container(&json!("string")).is_none());
        assert!(unwrap_container(&json!([{"id": "u1"}])).is_none());
        assert!(unwrap_container(&Value::Null).is_none());
    }

    #[test]
    fn test_subject_accepts_numeric_ids() {
        let identity = PUBLIC.disclose(&object(json!({"id": 42})), SourceTrust::Upstream);
        assert_eq!(identity.subject().as_deref(), Some("42"));
    }

    #[test]
    fn test_source_trust_serialization_and_verification() {
        assert_eq!(
            serde_json::to_value(SourceTrust::UnverifiedDecode).unwrap(),
            json!("unverified_decode")
        );
        assert!(SourceTrust::LocalSignature.is_verified());
        assert!(SourceTrust::Upstream.is_verified());
        assert!(!SourceTrust::UnverifiedDecode.is_verified());
    }

    #[test]
    fn test_debug_hides_values() {
        let identity = PUBLIC.disclose(
            &object(json!({"id": "u1", "email": "secret@example.com"})),
            SourceTrust::Upstream,
        );
        let debug_str = format!("{:?}", identity);

        assert!(!debug_str.contains("secret@example.com"));
        assert!(debug_str.contains("email"));
    }
}
