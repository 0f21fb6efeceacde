//! Per-provider response shaping applied after JSON decoding.

use std::fmt::Debug;

use serde_json::Value;

/// Maps a decoded provider body to the payload stored in the result.
pub trait ResponseTransform: Debug + Send + Sync {
    fn transform(&self, body: Value) -> Result<Value, String>;
}

/// Keeps the decoded body as is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Passthrough;

impl ResponseTransform for Passthrough {
    fn transform(&self, body: Value) -> Result<Value, String> {
        Ok(body)
    }
}

/// Keeps only the value at a JSON pointer such as `/response/results`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerTransform {
    pointer: String,
}

impl PointerTransform {
    pub fn new(pointer: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
        }
    }

    pub fn pointer(&self) -> &str {
        &self.pointer
    }
}

impl ResponseTransform for PointerTransform {
    fn transform(&self, mut body: Value) -> Result<Value, String> {
        body.pointer_mut(&self.pointer)
            .map(Value::take)
            .ok_or_else(|| format!("response has no value at '{}'", self.pointer))
    }
}
