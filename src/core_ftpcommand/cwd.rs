use crate::core_error::FtpError;
use crate::core_ftpcommand::ftpcommand::FtpCommand;
use crate::core_ftpcommand::handlers::require_argument;
use crate::core_ftpcommand::reply::ReplyCode;
use crate::session::Session;
use log::{debug, warn};

/// Handles the CWD (Change Working Directory) FTP command.
///
/// The working directory belongs to the session; other sessions and the
/// server process keep theirs.
pub async fn handle_cwd_command(
    session: &mut Session,
    arg: Option<String>,
) -> Result<(), FtpError> {
    let Some(arg) = require_argument(session, FtpCommand::CWD, arg).await? else {
        return Ok(());
    };

    match session.workdir.cd(&arg) {
        Ok(()) => {
            let cwd = session.workdir.display_cwd();
            debug!("Session {}: working directory is now {}", session.id, cwd);
            session
                .reply(
                    ReplyCode::CommandOkay,
                    format!("Directory changed to: {}", cwd),
                )
                .await
        }
        Err(e) => {
            warn!("Session {}: CWD {:?} rejected: {}", session.id, arg, e);
            session.reply(ReplyCode::DirectoryError, e.to_string()).await
        }
    }
}
