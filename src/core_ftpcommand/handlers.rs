use crate::core_error::FtpError;
use crate::core_ftpcommand::ftpcommand::{Command, FtpCommand};
use crate::core_ftpcommand::reply::{Reply, ReplyCode};
use crate::core_ftpcommand::{cwd, help, list, mkd, pwd, quit, retr, stor};
use crate::session::Session;
use log::warn;

/// Whether the session keeps reading commands after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Routes one parsed command to its handler.
///
/// Handlers answer file and protocol problems with replies themselves; an
/// `Err` here means the control channel is no longer usable.
pub async fn dispatch(session: &mut Session, command: Command) -> Result<Flow, FtpError> {
    let arg = command.argument;
    match command.verb {
        FtpCommand::RETR => retr::handle_retr_command(session, arg).await?,
        FtpCommand::STOR => stor::handle_stor_command(session, arg).await?,
        FtpCommand::MKD => mkd::handle_mkd_command(session, arg).await?,
        FtpCommand::CWD => cwd::handle_cwd_command(session, arg).await?,
        FtpCommand::PWD => pwd::handle_pwd_command(session).await?,
        FtpCommand::LIST => list::handle_list_command(session).await?,
        FtpCommand::HELP => help::handle_help_command(session, arg).await?,
        FtpCommand::QUIT => return quit::handle_quit_command(session).await,
        FtpCommand::INVALID => {
            warn!("Session {}: unrecognized command", session.id);
            session
                .send_reply(&Reply::standard(ReplyCode::SyntaxError))
                .await?;
        }
    }
    Ok(Flow::Continue)
}

/// Replies 501 and returns `None` when a required argument is missing.
pub(crate) async fn require_argument(
    session: &mut Session,
    verb: FtpCommand,
    arg: Option<String>,
) -> Result<Option<String>, FtpError> {
    match arg {
        Some(arg) if !arg.trim().is_empty() => Ok(Some(arg)),
        _ => {
            warn!("{} command received with no arguments", verb.as_str());
            session
                .reply(ReplyCode::ParameterSyntaxError, verb.usage())
                .await?;
            Ok(None)
        }
    }
}
