use crate::core_error::FtpError;
use crate::core_ftpcommand::reply::{Reply, ReplyCode};
use crate::session::Session;
use log::error;
use std::io;
use std::path::Path;
use tokio::fs;

/// Bare names of the immediate children of `dir`, sorted.
async fn entry_names(dir: &Path) -> io::Result<Vec<String>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Handles the LIST FTP command.
///
/// The listing travels on the control channel as one multi-line reply.
pub async fn handle_list_command(session: &mut Session) -> Result<(), FtpError> {
    let cwd = session.workdir.display_cwd();
    let names = match entry_names(session.workdir.current()).await {
        Ok(names) => names,
        Err(e) => {
            error!("Session {}: failed to list {}: {}", session.id, cwd, e);
            return session
                .reply(
                    ReplyCode::DirectoryError,
                    format!("Unable to list {}.", cwd),
                )
                .await;
        }
    };

    let mut lines = Vec::with_capacity(names.len() + 2);
    lines.push(format!("Files and/or folders in {}:", cwd));
    lines.extend(names);
    lines.push("End of list.".to_string());

    session
        .send_reply(&Reply::multi_line(ReplyCode::DirectoryStatus, lines))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_entry_names_are_sorted_bare_names() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("zeta.txt"), b"z").unwrap();
        std::fs::write(dir.path().join("alpha.txt"), b"a").unwrap();
        std::fs::create_dir(dir.path().join("mid")).unwrap();
        std::fs::write(dir.path().join("mid/hidden.txt"), b"h").unwrap();

        let names = entry_names(dir.path()).await.unwrap();
        assert_eq!(names, vec!["alpha.txt", "mid", "zeta.txt"]);
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let dir = tempdir().unwrap();
        assert!(entry_names(dir.path()).await.unwrap().is_empty());
    }
}
