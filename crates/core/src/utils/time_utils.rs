use chrono::Utc;

/// Current wall-clock time as Unix milliseconds.
///
/// This is the single source of timestamps stamped onto shared targets and
/// roster entries, so every instance agrees on the unit.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_millis_is_in_milliseconds() {
        // 2020-01-01T00:00:00Z in ms; anything earlier means seconds slipped in.
        assert!(now_millis() > 1_577_836_800_000);
    }
}
