//! Identity claims carried by bearer tokens.
//!
//! The `sub` and `email` fields are redacted in Debug output to prevent
//! exposure in logs.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The `aud` claim, which JWT allows as a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Audience::One(aud) => aud == value,
            Audience::Many(auds) => auds.iter().any(|aud| aud == value),
        }
    }
}

/// Claims extracted from a token, whether verified or merely decoded.
///
/// Registered claims are typed; everything else (`phone`, `birth_date`,
/// custom claims) lands in `extra`. The header-derived `alg` and `kid` are
/// not part of the payload and are filled in by whoever parsed the header.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject identifier - redacted in Debug output.
    #[serde(default, deserialize_with = "lenient_string")]
    pub sub: Option<String>,

    /// Email address - redacted in Debug output.
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub role: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub iat: Option<i64>,

    /// Expiration timestamp (Unix epoch seconds).
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub exp: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    #[serde(skip)]
    pub alg: Option<String>,

    #[serde(skip)]
    pub kid: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for IdentityClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityClaims")
            .field("sub", &self.sub.as_ref().map(|_| "[REDACTED]"))
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("role", &self.role)
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("alg", &self.alg)
            .field("kid", &self.kid)
            .field("extra_keys", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl IdentityClaims {
    /// Record the header fields alongside the payload claims.
    pub fn with_header(mut self, alg: Option<String>, kid: Option<String>) -> Self {
        self.alg = alg;
        self.kid = kid;
        self
    }

    /// Flatten into a single field map for disclosure.
    ///
    /// Timestamps are left out; they describe the token, not the identity.
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = self.extra.clone();

        let typed = [
            ("sub", &self.sub),
            ("email", &self.email),
            ("role", &self.role),
            ("name", &self.name),
            ("iss", &self.iss),
            ("alg", &self.alg),
            ("kid", &self.kid),
        ];
        for (key, value) in typed {
            if let Some(value) = value {
                fields.insert(key.to_string(), Value::String(value.clone()));
            }
        }

        if let Some(aud) = &self.aud {
            let value = match aud {
                Audience::One(one) => Value::String(one.clone()),
                Audience::Many(many) => {
                    Value::Array(many.iter().cloned().map(Value::String).collect())
                }
            };
            fields.insert("aud".to_string(), value);
        }

        fields
    }
}

/// Accept strings and numbers; anything else reads as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accept integer or fractional epoch seconds.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    })
}
