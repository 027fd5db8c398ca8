use crate::core_error::FtpError;
use crate::core_ftpcommand::ftpcommand::FtpCommand;
use crate::core_ftpcommand::handlers::require_argument;
use crate::core_ftpcommand::reply::ReplyCode;
use crate::session::Session;
use log::{info, warn};
use tokio::fs;

/// Handles the MKD (Make Directory) FTP command.
pub async fn handle_mkd_command(
    session: &mut Session,
    arg: Option<String>,
) -> Result<(), FtpError> {
    let Some(arg) = require_argument(session, FtpCommand::MKD, arg).await? else {
        return Ok(());
    };

    let created = match session.workdir.resolve_new(&arg) {
        Some(path) => match fs::create_dir(&path).await {
            Ok(()) => {
                info!("Session {}: created directory {:?}", session.id, path);
                true
            }
            Err(e) => {
                warn!("Session {}: MKD {:?} failed: {}", session.id, path, e);
                false
            }
        },
        None => {
            warn!("Session {}: MKD outside the root: {:?}", session.id, arg);
            false
        }
    };

    if created {
        session
            .reply(
                ReplyCode::PathnameCreated,
                format!("\"{}\" directory created.", arg),
            )
            .await
    } else {
        session
            .reply(
                ReplyCode::DirectoryError,
                format!("\"{}\". Unable to create directory.", arg),
            )
            .await
    }
}
