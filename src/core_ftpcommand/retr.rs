use crate::core_error::FtpError;
use crate::core_ftpcommand::ftpcommand::FtpCommand;
use crate::core_ftpcommand::handlers::require_argument;
use crate::core_ftpcommand::reply::{Reply, ReplyCode};
use crate::session::Session;
use log::{error, info, warn};
use tokio::io::AsyncWriteExt;

/// Handles the RETR (Retrieve) FTP command.
///
/// The file must exist inside the session root; only then is the data
/// channel opened. The data channel is closed before the completion reply
/// goes out, whatever the outcome of the transfer.
///
/// # Arguments
///
/// * `session` - The session the command arrived on.
/// * `arg` - The name of the file to retrieve.
pub async fn handle_retr_command(
    session: &mut Session,
    arg: Option<String>,
) -> Result<(), FtpError> {
    let Some(arg) = require_argument(session, FtpCommand::RETR, arg).await? else {
        return Ok(());
    };

    let path = match session.workdir.resolve_existing(&arg) {
        Some(path) if path.is_file() => path,
        _ => {
            warn!("Session {}: RETR of missing file {:?}", session.id, arg);
            return session
                .reply(
                    ReplyCode::FileNotFound,
                    format!("Requested action not taken. File not found: {}", arg),
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

    let outcome = session.engine.send_file(&path, &mut data).await;
    if let Err(e) = data.shutdown().await {
        warn!("Session {}: data channel shutdown: {}", session.id, e);
    }
    drop(data);

    match outcome {
        Ok(descriptor) => {
            info!(
                "Session {}: sent {:?} ({} bytes)",
                session.id, descriptor.path, descriptor.declared_len
            );
            session
                .send_reply(&Reply::standard(ReplyCode::ClosingDataConnection))
                .await
        }
        Err(e) => {
            error!("Session {}: RETR {:?} failed: {}", session.id, arg, e);
            session
                .send_reply(&FtpError::from(e).to_ftp_response())
                .await
        }
    }
}
