//! Elapsed-time rendering shared by column output.
//!
//! Output strings are a compatibility surface: shell prompts and scripts match
//! on them, so the exact shapes below must not change.

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

struct Parts {
    days: i64,
    hours: i64,
    minutes: i64,
    seconds: i64,
    millis: i64,
}

impl Parts {
    fn split(ms: i64) -> Self {
        let ms = ms.max(0);
        Self {
            days: ms / MS_PER_DAY,
            hours: ms % MS_PER_DAY / MS_PER_HOUR,
            minutes: ms % MS_PER_HOUR / MS_PER_MINUTE,
            seconds: ms % MS_PER_MINUTE / MS_PER_SECOND,
            millis: ms % MS_PER_SECOND,
        }
    }

    // Largest non-zero unit down to seconds: "1d4h0m0s", "1h12m0s", "1m12s", "2s".
    fn clock(&self) -> String {
        if self.days > 0 {
            format!("{}d{}h{}m{}s", self.days, self.hours, self.minutes, self.seconds)
        } else if self.hours > 0 {
            format!("{}h{}m{}s", self.hours, self.minutes, self.seconds)
        } else if self.minutes > 0 {
            format!("{}m{}s", self.minutes, self.seconds)
        } else {
            format!("{}s", self.seconds)
        }
    }
}

/// `None` renders as `0s`; milliseconds are truncated.
pub fn format_duration_seconds(duration_ms: Option<i64>) -> String {
    match duration_ms {
        None => "0s".to_string(),
        Some(ms) => Parts::split(ms).clock(),
    }
}

/// `None` renders as `0ms`. Sub-minute values collapse to `2s28ms` or `500ms`.
pub fn format_duration_millis(duration_ms: Option<i64>) -> String {
    let Some(ms) = duration_ms else {
        return "0ms".to_string();
    };
    let parts = Parts::split(ms);
    if parts.days == 0 && parts.hours == 0 && parts.minutes == 0 && parts.seconds == 0 {
        return format!("{}ms", parts.millis);
    }
    format!("{}{}ms", parts.clock(), parts.millis)
}
