//! Normalized response returned by every request.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::error::HttpStatusError;

/// A response reduced to status, parsed JSON body and raw text.
///
/// Header names are stored lower-cased.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseResult {
    pub status_code: u16,
    pub body: Value,
    pub raw_text: String,
    pub headers: BTreeMap<String, String>,
}

impl ResponseResult {
    /// Builds a result from raw parts. A body that is not valid JSON is
    /// replaced by `{"statusCode": .., "rawText": ..}`.
    pub fn from_parts(
        status_code: u16,
        raw_text: String,
        headers: BTreeMap<String, String>,
    ) -> Self {
        let body: Value = serde_json::from_str(&raw_text).unwrap_or_else(
            |_| json!({ "statusCode": status_code, "rawText": raw_text.as_str() }),
        );

        Self {
            status_code,
            body,
            raw_text,
            headers,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }

    /// Looks up a response header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns the body, or an [`HttpStatusError`] for any non-200 status.
    pub fn into_json(self) -> Result<Value, HttpStatusError> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(HttpStatusError {
                status: self.status_code,
                body: self.raw_text,
            })
        }
    }

    /// Deserializes the body of a 200 response.
    pub fn parse<T: DeserializeOwned>(self) -> anyhow::Result<T> {
        let body = self.into_json()?;
        Ok(serde_json::from_value(body)?)
    }
}
