/// Formats a duration in minutes as days, hours and minutes.
///
/// Hours are shown whenever days are shown, and minutes are shown when
/// non-zero or when nothing else would be printed.
///
/// # Examples
///
/// ```
/// use recipe_finder_core::format_duration;
///
/// assert_eq!(format_duration(45), "45 min.");
/// assert_eq!(format_duration(90), "1 h 30 min.");
/// assert_eq!(format_duration(24 * 60 + 5), "1 d 0 h 5 min.");
/// ```
pub fn format_duration(minutes: u32) -> String {
    let days = minutes / (60 * 24);
    let hours = (minutes % (60 * 24)) / 60;
    let remaining = minutes % 60;

    let mut parts = Vec::with_capacity(3);
    if days > 0 {
        parts.push(format!("{days} d"));
    }
    if hours > 0 || days > 0 {
        parts.push(format!("{hours} h"));
    }
    if remaining > 0 || (days == 0 && hours == 0) {
        parts.push(format!("{remaining} min."));
    }
    parts.join(" ")
}
