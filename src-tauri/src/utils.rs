use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current time as milliseconds since Unix epoch.
pub fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

/// Shortens text for log fields, counting characters rather than bytes.
pub fn preview_for_log(text: &str, max_chars: usize) -> String {
    let mut preview: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        preview.push('…');
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::preview_for_log;

    #[test]
    fn preview_keeps_short_text() {
        assert_eq!(preview_for_log("hello", 8), "hello");
    }

    #[test]
    fn preview_cuts_on_char_boundary() {
        assert_eq!(preview_for_log("こんにちは世界", 5), "こんにちは…");
    }
}
