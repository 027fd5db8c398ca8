use crate::core_error::FtpError;
use crate::core_ftpcommand::ftpcommand::FtpCommand;
use crate::core_ftpcommand::handlers::require_argument;
use crate::core_ftpcommand::reply::{Reply, ReplyCode};
use crate::session::Session;
use log::{error, info, warn};

/// Handles the STOR (Store) FTP command.
///
/// The upload lands under the session's working directory. A transfer cut
/// short leaves no partial file behind.
pub async fn handle_stor_command(
    session: &mut Session,
    arg: Option<String>,
) -> Result<(), FtpError> {
    let Some(arg) = require_argument(session, FtpCommand::STOR, arg).await? else {
        return Ok(());
    };

    let path = match session.workdir.resolve_new(&arg) {
        Some(path) if !path.is_dir() => path,
        _ => {
            warn!("Session {}: STOR target rejected: {:?}", session.id, arg);
            return session
                .reply(
                    ReplyCode::FileNotFound,
                    format!("Requested action not taken. Invalid file name: {}", arg),
                )
                .await;
        }
    };

    session.send_reply(&Reply::standard(ReplyCode::FileStatusOkay)).await?;

    let mut data = match session.open_data_channel().await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Session {}: data connection failed: {}", session.id, e);
            return session.send_reply(&e.to_ftp_response()).await;
        }
    };

    session.send_reply(&Reply::standard(ReplyCode::ConnectionOpen)).await?;

    let outcome = session.engine.receive_file(&mut data, &path).await;
    drop(data);

    match outcome {
        Ok(descriptor) => {
            info!(
                "Session {}: stored {:?} ({} bytes)",
                session.id, descriptor.path, descriptor.declared_len
            );
            session
                .send_reply(&Reply::standard(ReplyCode::ClosingDataConnection))
                .await
        }
        Err(e) => {
            error!("Session {}: STOR {:?} failed: {}", session.id, arg, e);
            session
                .send_reply(&FtpError::from(e).to_ftp_response())
                .await
        }
    }
}
