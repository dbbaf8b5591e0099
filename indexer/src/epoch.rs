/// Length of a voting epoch in seconds
pub const EPOCH_DURATION: i64 = 7 * 24 * 60 * 60;

/// Start of the epoch containing `timestamp`, anchored at unix time 0
pub fn epoch_start(timestamp: i64) -> i64 {
    timestamp.div_euclid(EPOCH_DURATION) * EPOCH_DURATION
}

pub fn next_epoch_start(timestamp: i64) -> i64 {
    epoch_start(timestamp) + EPOCH_DURATION
}

pub fn seconds_until_next_epoch(timestamp: i64) -> u64 {
    (next_epoch_start(timestamp) - timestamp).unsigned_abs()
}
