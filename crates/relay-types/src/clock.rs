//! Wall-clock timestamps (Unix epoch milliseconds), used wherever a layer
//! needs to stamp a record itself rather than receive the timestamp as an
//! argument (tests pass literals instead).

use crate::Timestamp;

pub fn now_ms() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as Timestamp
}
