pub mod config;
pub mod presets;
pub mod records;
pub mod run;

/// `M:SS` for a marker value in milliseconds.
pub(crate) fn fmt_marker(ms: u64) -> String {
    if ms == 0 {
        return "-".into();
    }
    let secs = ms / 1000;
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_formatting() {
        assert_eq!(fmt_marker(0), "-");
        assert_eq!(fmt_marker(90_000), "1:30");
        assert_eq!(fmt_marker(1_320_000), "22:00");
    }
}
