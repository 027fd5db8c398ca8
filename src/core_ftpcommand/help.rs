use crate::core_error::FtpError;
use crate::core_ftpcommand::ftpcommand::FtpCommand;
use crate::core_ftpcommand::reply::{Reply, ReplyCode};
use crate::session::Session;

/// Handles the HELP FTP command: every verb without an argument, or the
/// usage of the named verb.
pub async fn handle_help_command(
    session: &mut Session,
    arg: Option<String>,
) -> Result<(), FtpError> {
    let reply = match arg {
        None => Reply::multi_line(
            ReplyCode::HelpMessage,
            vec![
                "The following commands are recognized:".to_string(),
                FtpCommand::verbs().collect::<Vec<_>>().join(" "),
                "Type HELP <command-name> to see a description of the command.".to_string(),
            ],
        ),
        Some(name) => match FtpCommand::from_verb(&name) {
            FtpCommand::INVALID => Reply::new(
                ReplyCode::ParameterSyntaxError,
                format!("Unknown command: {}", name),
            ),
            verb => Reply::new(ReplyCode::HelpMessage, verb.usage()),
        },
    };
    session.send_reply(&reply).await
}
