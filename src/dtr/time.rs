/// Normalize a free-form time-of-day string into canonical `HH:MM`.
///
/// Never fails: input that cannot be confidently normalized comes back
/// unchanged (trimmed) and is rejected later by the validator.
pub fn normalize_time(raw: &str) -> String {
    let value = raw.trim();

    // Already HH:MM
    if is_canonical(value) {
        return value.to_string();
    }

    // Bare hour: "7" -> "07:00", "13" -> "13:00"
    if (1..=2).contains(&value.len()) && value.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(hour) = value.parse::<u32>() {
            if hour <= 23 {
                return format!("{:02}:00", hour);
            }
        }
        return value.to_string();
    }

    // H:M, H:MM, HH:M
    if let Some((h, m)) = value.split_once(':') {
        let digits_ok = (1..=2).contains(&h.len())
            && (1..=2).contains(&m.len())
            && h.bytes().all(|b| b.is_ascii_digit())
            && m.bytes().all(|b| b.is_ascii_digit());

        if digits_ok {
            if let (Ok(hour), Ok(minute)) = (h.parse::<u32>(), m.parse::<u32>()) {
                if hour <= 23 && minute <= 59 {
                    return format!("{:02}:{:02}", hour, minute);
                }
            }
        }
    }

    value.to_string()
}

fn is_canonical(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 5
        && bytes[2] == b':'
        && bytes[..2].iter().all(u8::is_ascii_digit)
        && bytes[3..].iter().all(u8::is_ascii_digit)
}

/// Parse a strict `HH:MM` value into minutes after midnight.
pub fn parse_minutes(value: &str) -> Option<u32> {
    if !is_canonical(value) {
        return None;
    }

    let hour: u32 = value[..2].parse().ok()?;
    let minute: u32 = value[3..].parse().ok()?;

    if hour > 23 || minute > 59 {
        return None;
    }

    Some(hour * 60 + minute)
}

/// Format minutes after midnight as `HH:MM`.
pub fn format_minutes(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Human-readable duration, e.g. `12h 05m`.
pub fn format_duration(minutes: u32) -> String {
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}
