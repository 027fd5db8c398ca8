use crate::core_error::FtpError;
use crate::core_ftpcommand::reply::ReplyCode;
use crate::session::Session;

pub async fn handle_pwd_command(session: &mut Session) -> Result<(), FtpError> {
    let cwd = session.workdir.display_cwd();
    session
        .reply(
            ReplyCode::PathnameCreated,
            format!("\"{}\" is the current working directory.", cwd),
        )
        .await
}
