pub const HELP_TEXT: &str = "Commands: /approve <id>, /reject <id> [reason], /approve-all, \
     /reject-all [reason], /abort, /clear, /history, /settings, /help, /quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Approve(String),
    Reject {
        call_id: String,
        reason: Option<String>,
    },
    ApproveAll,
    RejectAll {
        reason: Option<String>,
    },
    Abort,
    Clear,
    History,
    Settings,
    Help,
    Quit,
    /// A known command missing its argument; carries the usage line.
    Usage(&'static str),
    Unknown(String),
}

impl SlashCommand {
    /// Commands handled even while a turn is still streaming.
    #[must_use]
    pub fn is_immediate(&self) -> bool {
        matches!(self, Self::Abort | Self::Quit | Self::Help)
    }
}

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (command, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (trimmed, ""),
    };
    let rest = (!rest.is_empty()).then(|| rest.to_string());

    let parsed = match command {
        "/approve" => match rest {
            Some(call_id) => SlashCommand::Approve(call_id),
            None => SlashCommand::Usage("/approve <id>"),
        },
        "/reject" => match rest {
            Some(rest) => {
                let (call_id, reason) = match rest.split_once(char::is_whitespace) {
                    Some((call_id, reason)) => {
                        (call_id.to_string(), Some(reason.trim().to_string()))
                    }
                    None => (rest, None),
                };
                SlashCommand::Reject { call_id, reason }
            }
            None => SlashCommand::Usage("/reject <id> [reason]"),
        },
        "/approve-all" => SlashCommand::ApproveAll,
        "/reject-all" => SlashCommand::RejectAll { reason: rest },
        "/abort" => SlashCommand::Abort,
        "/clear" => SlashCommand::Clear,
        "/history" => SlashCommand::History,
        "/settings" => SlashCommand::Settings,
        "/help" => SlashCommand::Help,
        "/quit" => SlashCommand::Quit,
        _ => SlashCommand::Unknown(command.to_string()),
    };

    Some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse_slash_command("list files"), None);
        assert_eq!(parse_slash_command("  "), None);
    }

    #[test]
    fn decisions_carry_their_arguments() {
        assert_eq!(
            parse_slash_command("/approve c1"),
            Some(SlashCommand::Approve("c1".to_string()))
        );
        assert_eq!(
            parse_slash_command("/reject c2   too risky "),
            Some(SlashCommand::Reject {
                call_id: "c2".to_string(),
                reason: Some("too risky".to_string()),
            })
        );
        assert_eq!(
            parse_slash_command("/reject c2"),
            Some(SlashCommand::Reject {
                call_id: "c2".to_string(),
                reason: None,
            })
        );
        assert_eq!(
            parse_slash_command("/reject-all later"),
            Some(SlashCommand::RejectAll {
                reason: Some("later".to_string())
            })
        );
    }

    #[test]
    fn missing_arguments_report_usage() {
        assert_eq!(
            parse_slash_command("/approve"),
            Some(SlashCommand::Usage("/approve <id>"))
        );
        assert_eq!(
            parse_slash_command("/reject "),
            Some(SlashCommand::Usage("/reject <id> [reason]"))
        );
    }

    #[test]
    fn parser_recognizes_known_and_unknown_commands() {
        assert_eq!(parse_slash_command("/approve-all"), Some(SlashCommand::ApproveAll));
        assert_eq!(parse_slash_command("/abort"), Some(SlashCommand::Abort));
        assert_eq!(parse_slash_command("/clear"), Some(SlashCommand::Clear));
        assert_eq!(parse_slash_command("/history"), Some(SlashCommand::History));
        assert_eq!(parse_slash_command("/settings"), Some(SlashCommand::Settings));
        assert_eq!(parse_slash_command("/help"), Some(SlashCommand::Help));
        assert_eq!(parse_slash_command("/quit"), Some(SlashCommand::Quit));
        assert_eq!(
            parse_slash_command("/nope extra args"),
            Some(SlashCommand::Unknown("/nope".to_string()))
        );
    }

    #[test]
    fn only_abort_quit_and_help_bypass_the_queue() {
        assert!(SlashCommand::Abort.is_immediate());
        assert!(SlashCommand::Quit.is_immediate());
        assert!(!SlashCommand::Approve("c1".to_string()).is_immediate());
    }
}
