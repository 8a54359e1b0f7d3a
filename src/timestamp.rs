/// Duration of one ETI frame.
pub const FRAME_DURATION_MS: u64 = 24;

pub fn frames_duration_ms(frames: u64) -> u64 {
    frames * FRAME_DURATION_MS
}

/// Formats milliseconds as `HH:MM:SS.mmm`, widening the hours past 99.
pub fn time_str(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = ms % 3_600_000 / 60_000;
    let seconds = ms % 60_000 / 1000;
    let milliseconds = ms % 1000;

    format!("{hours:02}:{minutes:02}:{seconds:02}.{milliseconds:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_to_clock() {
        assert_eq!(time_str(frames_duration_ms(0)), "00:00:00.000");
        assert_eq!(time_str(frames_duration_ms(2501)), "00:01:00.024");
        assert_eq!(time_str(360_000_000), "100:00:00.000");
    }
}
