//! Slash commands. Only a leading `/` makes a command; everything else
//! is free text for the engine.

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatCommand {
    Start,
    Help,
    Unknown { verb: String },
}

/// `None` for free text. The verb is the first whitespace-delimited
/// token, matched case-insensitively.
pub fn parse(text: &str) -> Option<ChatCommand> {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let verb = trimmed.split_whitespace().next().unwrap_or(trimmed).to_ascii_lowercase();
    Some(match verb.as_str() {
        "/start" => ChatCommand::Start,
        "/help" => ChatCommand::Help,
        _ => ChatCommand::Unknown { verb },
    })
}
