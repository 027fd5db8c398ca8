use crate::core_error::FtpError;
use crate::core_ftpcommand::handlers::Flow;
use crate::core_ftpcommand::reply::{Reply, ReplyCode};
use crate::session::Session;
use log::info;

pub async fn handle_quit_command(session: &mut Session) -> Result<Flow, FtpError> {
    info!("Session {}: QUIT received, closing connection", session.id);
    session
        .send_reply(&Reply::standard(ReplyCode::ClosingControlConnection))
        .await?;
    session.control.shutdown().await?;
    Ok(Flow::Quit)
}
