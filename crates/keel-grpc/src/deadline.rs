//! Caller deadlines carried in the `grpc-timeout` header.

use std::time::Duration;
use tonic::metadata::MetadataMap;

/// Header carrying the caller's remaining time budget.
pub const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// Parses a `grpc-timeout` value: at most eight ASCII digits followed by
/// one of `H`, `M`, `S`, `m`, `u`, `n`.
#[must_use]
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if value.len() < 2 || !value.is_ascii() {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    match unit {
        "H" => Some(Duration::from_secs(amount * 3600)),
        "M" => Some(Duration::from_secs(amount * 60)),
        "S" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_millis(amount)),
        "u" => Some(Duration::from_micros(amount)),
        "n" => Some(Duration::from_nanos(amount)),
        _ => None,
    }
}

/// Reads the caller's timeout from request metadata.
///
/// A missing or malformed header means no caller deadline.
#[must_use]
pub fn grpc_timeout(metadata: &MetadataMap) -> Option<Duration> {
    metadata
        .get(GRPC_TIMEOUT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_grpc_timeout)
}

/// Combines the caller's timeout with the server cap, keeping the shorter.
#[must_use]
pub fn effective_timeout(caller: Option<Duration>, cap: Option<Duration>) -> Option<Duration> {
    match (caller, cap) {
        (Some(caller), Some(cap)) => Some(caller.min(cap)),
        (caller, cap) => caller.or(cap),
    }
}
