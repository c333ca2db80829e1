//! Duration strings as they appear in host configuration.
//!
//! Two forms are accepted: suffix form (`"500ms"`, `"5s"`, `"2m"`, a bare
//! number meaning seconds) and clock form (`"00:00:03"`, optionally with a
//! fractional second as in `"00:00:00.250"`).

use std::time::Duration;

/// Parse a configuration duration string. Returns `None` on malformed input.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s.contains(':') {
        return parse_clock(s);
    }
    if let Some(ms) = s.strip_suffix("ms") {
        return ms.parse::<u64>().ok().map(Duration::from_millis);
    }
    if let Some(secs) = s.strip_suffix('s') {
        return secs.parse::<u64>().ok().map(Duration::from_secs);
    }
    if let Some(mins) = s.strip_suffix('m') {
        return mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60));
    }
    s.parse::<u64>().ok().map(Duration::from_secs)
}

/// Parse `HH:MM:SS` or `HH:MM:SS.fff`.
fn parse_clock(s: &str) -> Option<Duration> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: u64 = parts[0].parse().ok()?;
    let minutes: u64 = parts[1].parse().ok()?;
    if minutes >= 60 {
        return None;
    }

    let (sec_str, frac_millis) = match parts[2].split_once('.') {
        Some((secs, frac)) => {
            // Take at most millisecond precision, right-padded.
            let digits: String = frac.chars().take(3).collect();
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            let padded = format!("{digits:0<3}");
            (secs, padded.parse::<u64>().ok()?)
        }
        None => (parts[2], 0),
    };
    let seconds: u64 = sec_str.parse().ok()?;
    if seconds >= 60 {
        return None;
    }

    let total_secs = hours * 3600 + minutes * 60 + seconds;
    Some(Duration::from_secs(total_secs) + Duration::from_millis(frac_millis))
}
