use chrono::Duration;

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

/// Human-readable rendering of an elapsed duration, rounded to the minute.
///
/// Anything under half a minute reads as "less than a minute"; negative
/// durations are treated as zero.
pub fn pretty_duration(d: Duration) -> String {
    let minutes = (d.num_seconds().max(0) + 30) / 60;
    if minutes == 0 {
        return "less than a minute".to_owned();
    }

    let days = minutes / (24 * 60);
    let hours = (minutes / 60) % 24;
    let minutes = minutes % 60;

    let parts: Vec<String> = [(days, "day"), (hours, "hour"), (minutes, "minute")]
        .into_iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| plural(n, unit))
        .collect();

    parts.join(" ")
}
