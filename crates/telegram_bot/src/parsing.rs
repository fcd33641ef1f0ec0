/// A command split into its lowercase name and raw arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
}

/// Parses `text` as a command.
///
/// The configured `prefix` and Telegram's `/` are both accepted. A trailing
/// `@botname` on the command name is dropped, so `/ping@aamon_bot` is `ping`.
pub fn parse_command(prefix: &str, text: &str) -> Option<ParsedCommand> {
    let text = text.trim_start();
    let body = match text.strip_prefix(prefix) {
        Some(body) if !prefix.is_empty() => body,
        _ => text.strip_prefix('/')?,
    };

    let mut tokens = body.split_whitespace();
    let raw_name = tokens.next()?;
    let name = raw_name
        .split('@')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    if name.is_empty() {
        return None;
    }

    Some(ParsedCommand {
        name,
        args: tokens.map(str::to_string).collect(),
    })
}

/// Parses a strictly positive integer amount. `1,000` and `1_000` are
/// accepted.
pub fn parse_amount(input: &str) -> Option<i64> {
    let cleaned: String = input.chars().filter(|c| *c != ',' && *c != '_').collect();
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    cleaned.parse::<i64>().ok().filter(|amount| *amount > 0)
}

/// Normalizes a user reference typed as an argument (`@123`, `123`).
///
/// Chat user ids are numeric, optionally negative; anything else is `None`.
pub fn parse_user(input: &str) -> Option<String> {
    let id = input.trim();
    let id = id.strip_prefix('@').unwrap_or(id);
    let digits = id.strip_prefix('-').unwrap_or(id);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(id.to_string())
}
