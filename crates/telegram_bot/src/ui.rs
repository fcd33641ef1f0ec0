//! Text rendering shared by the command handlers.

use chrono::Duration;

use crate::CommandSettings;

/// `1234567` -> `1,234,567`.
pub(crate) fn group_digits(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub(crate) fn money(settings: &CommandSettings, amount: i64) -> String {
    format!(
        "{} {} {}",
        settings.currency_symbol,
        group_digits(amount),
        settings.currency_name
    )
}

/// Human readable duration, e.g. `5h 12m` or `42s`. Negative durations
/// render as zero.
pub(crate) fn duration(value: Duration) -> String {
    let total = value.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    match (hours, minutes) {
        (0, 0) => format!("{seconds}s"),
        (0, _) => format!("{minutes}m {seconds}s"),
        _ => format!("{hours}h {minutes}m"),
    }
}

/// Hides most of a user id for public listings: `123456789` -> `1234****`.
pub(crate) fn mask_user(user_id: &str) -> String {
    let visible: String = user_id.chars().take(4).collect();
    format!("{visible}****")
}
