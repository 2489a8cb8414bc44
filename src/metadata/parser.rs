//! Parse synced metadata documents.
//!
//! A document looks like:
//!
//! ```json
//! {
//!   "unique_contact_id": {
//!     "account_type": "CUSTOM_ACCOUNT",
//!     "custom_account_type": "com.example",
//!     "account_name": "alice@example.com",
//!     "contact_id": "1001",
//!     "data_set": "GOOGLE_PLUS"
//!   },
//!   "contact_prefs": { "send_to_voicemail": true, "starred": true, "pinned": 2 }
//! }
//! ```
//!
//! Unknown keys at any level are ignored. Sync clients also send string
//! values without quotes (`"contact_id": backupId1001`); those are read as
//! strings.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::db::{AccountIdentity, ContactPreferences};
use crate::error::ProviderError;

const CUSTOM_ACCOUNT: &str = "CUSTOM_ACCOUNT";
const GOOGLE_ACCOUNT: &str = "GOOGLE_ACCOUNT";
const GOOGLE_ACCOUNT_TYPE: &str = "com.google";
const GOOGLE_PLUS_DATA_SET: &str = "GOOGLE_PLUS";
const PLUS_DATA_SET: &str = "plus";

/// Structured content of a metadata document.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataEntry {
    pub account: AccountIdentity,
    /// The contact's backup id as the document states it.
    pub contact_id: String,
    pub preferences: ContactPreferences,
}

#[derive(Deserialize)]
struct RawUniqueContactId {
    account_type: String,
    #[serde(default)]
    custom_account_type: Option<String>,
    account_name: String,
    contact_id: Value,
    #[serde(default)]
    data_set: Option<String>,
}

fn invalid(message: impl Into<String>) -> ProviderError {
    ProviderError::InvalidDocument(message.into())
}

/// Parse and validate a document. Pure; no I/O.
pub fn parse_metadata_entry(data: &str) -> Result<MetadataEntry, ProviderError> {
    if data.trim().is_empty() {
        return Err(invalid("document is empty"));
    }

    let root: Map<String, Value> = match parse_json(data) {
        Ok(Value::Object(map)) => map,
        Ok(_) => return Err(invalid("document must be a JSON object")),
        Err(e) => return Err(invalid(format!("malformed JSON: {e}"))),
    };

    let unique_id = root
        .get("unique_contact_id")
        .ok_or_else(|| invalid("missing unique_contact_id"))?;
    let unique_id: RawUniqueContactId = serde_json::from_value(unique_id.clone())
        .map_err(|e| invalid(format!("unique_contact_id: {e}")))?;

    let account_type = match unique_id.account_type.as_str() {
        CUSTOM_ACCOUNT => unique_id
            .custom_account_type
            .filter(|t| !t.is_empty())
            .ok_or_else(|| invalid("CUSTOM_ACCOUNT requires custom_account_type"))?,
        GOOGLE_ACCOUNT => GOOGLE_ACCOUNT_TYPE.to_string(),
        other => other.to_string(),
    };

    let data_set = unique_id.data_set.filter(|ds| !ds.is_empty()).map(|ds| {
        if ds == GOOGLE_PLUS_DATA_SET {
            PLUS_DATA_SET.to_string()
        } else {
            ds
        }
    });

    let contact_id = match unique_id.contact_id {
        Value::String(s) if !s.is_empty() => s,
        Value::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
        other => return Err(invalid(format!("contact_id must be a string or integer, got {other}"))),
    };

    let prefs = root
        .get("contact_prefs")
        .and_then(Value::as_object)
        .ok_or_else(|| invalid("missing contact_prefs section"))?;

    let preferences = ContactPreferences {
        send_to_voicemail: required_bool(prefs, "send_to_voicemail")?,
        starred: required_bool(prefs, "starred")?,
        pinned: required_int(prefs, "pinned")?,
    };

    Ok(MetadataEntry {
        account: AccountIdentity {
            account_name: unique_id.account_name,
            account_type,
            data_set,
        },
        contact_id,
        preferences,
    })
}

/// Strict JSON first; on failure, retry with bare words quoted.
fn parse_json(data: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(data)
        .or_else(|strict| serde_json::from_str(&quote_bare_words(data)).map_err(|_| strict))
}

/// Wrap every unquoted token that is not a JSON literal or number in quotes.
fn quote_bare_words(data: &str) -> String {
    let mut out = String::with_capacity(data.len() + 16);
    let mut chars = data.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            out.push(c);
            let mut escaped = false;
            for c in chars.by_ref() {
                out.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    break;
                }
            }
        } else if is_delimiter(c) {
            out.push(c);
        } else {
            let mut word = String::from(c);
            while let Some(&next) = chars.peek() {
                if is_delimiter(next) || next == '"' {
                    break;
                }
                word.push(next);
                chars.next();
            }
            if is_json_scalar(&word) {
                out.push_str(&word);
            } else {
                out.push_str(&Value::String(word).to_string());
            }
        }
    }
    out
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '{' | '}' | '[' | ']' | ',' | ':')
}

fn is_json_scalar(word: &str) -> bool {
    matches!(word, "true" | "false" | "null")
        || serde_json::from_str::<serde_json::Number>(word).is_ok()
}

fn required_bool(section: &Map<String, Value>, key: &str) -> Result<bool, ProviderError> {
    match section.get(key) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(invalid(format!("contact_prefs.{key} must be a boolean, got {other}"))),
        None => Err(invalid(format!("contact_prefs.{key} is missing"))),
    }
}

fn required_int(section: &Map<String, Value>, key: &str) -> Result<i64, ProviderError> {
    match section.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| invalid(format!("contact_prefs.{key} must be an integer, got {n}"))),
        Some(other) => Err(invalid(format!("contact_prefs.{key} must be an integer, got {other}"))),
        None => Err(invalid(format!("contact_prefs.{key} is missing"))),
    }
}
