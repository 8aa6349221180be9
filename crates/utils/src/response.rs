//! Helpers for reading the admin backend's JSON envelopes.

use serde::Deserialize;

/// Shown to the operator when the backend gave no usable message.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageField {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<MessageField>,
}

/// Pull the `message` field out of an error body. Validation failures may carry a list of
/// messages; they are joined with `", "`.
pub fn server_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let message = match parsed.message? {
        MessageField::One(message) => message,
        MessageField::Many(messages) => messages.join(", "),
    };
    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}

/// List payloads come back either bare or wrapped in `{ "data": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Wrapped { data: Vec<T> },
    Bare(Vec<T>),
}

impl<T> Listing<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}
