use std::any::Any;

use thiserror::Error;

use crate::key::KeyId;

/// A subscriber callback panicked while being notified.
///
/// The panic is caught per callback; it never reaches the caller of
/// [`Store::set`](crate::Store::set). The error is handed to the diagnostic
/// error sink and the remaining subscribers still run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Error in '{key}' subscriber: {message}")]
pub struct SubscriberPanic {
    pub key: KeyId,
    pub message: String,
}

impl SubscriberPanic {
    pub(crate) fn from_payload(key: &KeyId, payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };

        Self {
            key: key.clone(),
            message,
        }
    }
}
