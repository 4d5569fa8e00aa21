//! Slash-command parsing for inbound chat messages.

/// What an inbound message asks the bot to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start`: begin onboarding, or greet a returning user.
    Start,
    /// `/reset`: wipe the profile and restart onboarding.
    Reset,
    /// `/plan`: generate a fresh wellness plan.
    Plan,
    /// `/profile`: show the stored profile.
    Profile,
    /// `/help`: list commands.
    Help,
    /// Anything else: an onboarding answer or a free-form question.
    Text(String),
}

impl Command {
    /// Parse message content into a Command.
    ///
    /// Commands are case-insensitive and may carry a `@BotName` suffix, as
    /// Telegram sends them in group chats. Unknown slash commands are text.
    pub fn parse(content: &str) -> Self {
        let trimmed = content.trim();
        let Some(first) = trimmed.split_whitespace().next() else {
            return Self::Text(trimmed.to_string());
        };
        let name = first.split('@').next().unwrap_or(first).to_lowercase();

        match name.as_str() {
            "/start" => Self::Start,
            "/reset" | "/restart" => Self::Reset,
            "/plan" => Self::Plan,
            "/profile" | "/me" => Self::Profile,
            "/help" | "/?" => Self::Help,
            _ => Self::Text(trimmed.to_string()),
        }
    }
}

/// Reply to `/help`.
pub const HELP_TEXT: &str = "\
I'm HealthMate, your wellness assistant. Once your profile is set up, just \
send me a question about diet, sleep, exercise or daily habits.

Commands:
/start - start onboarding or see your last plan
/plan - get a fresh 10-point wellness plan
/profile - show what I know about you
/reset - clear your profile and start over
/help - show this message";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_commands() {
        assert_eq!(Command::parse("/start"), Command::Start);
        assert_eq!(Command::parse("/reset"), Command::Reset);
        assert_eq!(Command::parse("/plan"), Command::Plan);
        assert_eq!(Command::parse("/profile"), Command::Profile);
        assert_eq!(Command::parse("/help"), Command::Help);
    }

    #[test]
    fn parse_is_case_insensitive_and_trims() {
        assert_eq!(Command::parse("  /RESET  "), Command::Reset);
        assert_eq!(Command::parse("/Start"), Command::Start);
    }

    #[test]
    fn parse_strips_bot_mention() {
        assert_eq!(Command::parse("/reset@HealthMateBot"), Command::Reset);
    }

    #[test]
    fn parse_ignores_trailing_arguments() {
        assert_eq!(Command::parse("/plan please"), Command::Plan);
    }

    #[test]
    fn parse_plain_text() {
        assert_eq!(
            Command::parse("  How much water should I drink? "),
            Command::Text("How much water should I drink?".into())
        );
        assert_eq!(Command::parse("Alex"), Command::Text("Alex".into()));
    }

    #[test]
    fn unknown_command_is_text() {
        assert_eq!(Command::parse("/weather"), Command::Text("/weather".into()));
    }

    #[test]
    fn empty_message_is_empty_text() {
        assert_eq!(Command::parse("   "), Command::Text(String::new()));
    }
}
