//! Opaque pagination cursors.
//!
//! A cursor is the URL-safe base64 of a decimal sequence number. It hides the
//! raw `cursor_id` from clients but is not signed: anyone can mint one.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

use crate::error::AppError;

pub fn encode(seq: i64) -> String {
    URL_SAFE_NO_PAD.encode(seq.to_string())
}

pub fn decode(token: &str) -> Result<i64, AppError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|_| invalid())?;
    let text = std::str::from_utf8(&bytes).map_err(|_| invalid())?;
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    text.parse::<i64>().map_err(|_| invalid())
}

fn invalid() -> AppError {
    AppError::param_error("Invalid cursor")
}
