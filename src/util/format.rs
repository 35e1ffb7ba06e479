use crate::model::RefTarget;

/// Format a Unix timestamp as `YYYY-MM-DD HH:MM:SS` (UTC)
pub fn format_timestamp(timestamp: i64) -> String {
    use time::OffsetDateTime;
    use time::macros::format_description;

    if timestamp == 0 {
        return "unknown".to_string();
    }

    OffsetDateTime::from_unix_timestamp(timestamp)
        .ok()
        .and_then(|dt| {
            let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
            dt.format(&format).ok()
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Render an optional reference target for tables; `-` when absent
pub fn format_target(target: Option<&RefTarget>) -> String {
    match target {
        Some(RefTarget::Direct(hash)) => hash.short(),
        Some(RefTarget::Symbolic(name)) => format!("-> {}", name),
        None => "-".to_string(),
    }
}

/// Format a duration in milliseconds as seconds with one decimal
pub fn format_duration_ms(ms: i64) -> String {
    if ms < 1000 {
        format!("{} ms", ms)
    } else {
        format!("{:.1} s", ms as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Hash;

    #[test]
    fn test_format_timestamp() {
        let ts = 1700000000; // Nov 14, 2023 22:13:20 UTC
        assert_eq!(format_timestamp(ts), "2023-11-14 22:13:20");
        assert_eq!(format_timestamp(0), "unknown");
    }

    #[test]
    fn test_format_target() {
        let hash = Hash::from_bytes([0xab; 20]);
        assert_eq!(format_target(Some(&RefTarget::Direct(hash))), "abababab");
        assert_eq!(
            format_target(Some(&RefTarget::Symbolic("refs/heads/main".into()))),
            "-> refs/heads/main"
        );
        assert_eq!(format_target(None), "-");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration_ms(250), "250 ms");
        assert_eq!(format_duration_ms(1500), "1.5 s");
    }
}
