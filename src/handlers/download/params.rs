//! Transfer parameter resolution for download requests.

use std::time::Duration;

/// Streaming time used when no valid `duration` is given
pub const DEFAULT_DURATION: Duration = Duration::from_secs(10);

/// Termination policy for one download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferParams {
    /// Stop after exactly this many bytes
    ByteCount(u64),
    /// Stop once this much time has passed
    Duration(Duration),
}

impl TransferParams {
    /// Resolve from raw `size` and `duration` query values
    pub fn resolve(size: Option<&str>, duration: Option<&str>) -> Self {
        if let Some(size) = size.and_then(parse_positive) {
            return TransferParams::ByteCount(size);
        }

        let duration = duration
            .and_then(parse_positive)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_DURATION);

        TransferParams::Duration(duration)
    }

    /// Resolve from a raw query string. The first occurrence of each key
    /// wins; values are form-decoded.
    pub fn from_query(query: Option<&str>) -> Self {
        let mut size = None;
        let mut duration = None;

        for (key, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            match key.as_ref() {
                "size" if size.is_none() => size = Some(value),
                "duration" if duration.is_none() => duration = Some(value),
                _ => {}
            }
        }

        Self::resolve(size.as_deref(), duration.as_deref())
    }
}

/// Base-10 integer that is strictly positive
fn parse_positive(value: &str) -> Option<u64> {
    value
        .parse::<i64>()
        .ok()
        .filter(|&v| v > 0)
        .map(|v| v as u64)
}
