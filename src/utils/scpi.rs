// src/utils/scpi.rs
use crate::error::{PdwError, Result};

/// Strip the line terminator from a response
pub fn trim_response(line: &[u8]) -> String {
    let text = String::from_utf8_lossy(line);
    text.trim_end_matches(['\n', '\r']).to_string()
}

/// Parse an error-queue response of the form `code,"message"`
pub fn parse_error_response(response: &str) -> Result<(i32, String)> {
    let (code, message) = response
        .split_once(',')
        .ok_or_else(|| PdwError::InvalidParameter(format!("unrecognized error response {:?}", response)))?;

    let code = code
        .trim()
        .parse::<i32>()
        .map_err(|_| PdwError::InvalidParameter(format!("unrecognized error code in {:?}", response)))?;

    let message = message.trim();
    let message = message
        .strip_prefix('"')
        .and_then(|m| m.strip_suffix('"'))
        .unwrap_or(message)
        .replace("\"\"", "\"");

    Ok((code, message))
}
