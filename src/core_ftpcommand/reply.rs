use crate::core_error::FtpError;
use std::borrow::Cow;
use std::fmt;

/// The reply codes used on the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ReplyCode {
    ConnectionOpen = 125,
    FileStatusOkay = 150,
    CommandOkay = 200,
    DirectoryStatus = 212,
    HelpMessage = 214,
    ServiceReady = 220,
    ClosingControlConnection = 221,
    ClosingDataConnection = 226,
    PathnameCreated = 257,
    CantOpenDataConnection = 425,
    TransferFailed = 450,
    SyntaxError = 500,
    ParameterSyntaxError = 501,
    DirectoryError = 521,
    FileNotFound = 550,
}

const REPLY_TABLE: [(ReplyCode, &str); 15] = [
    (ReplyCode::ConnectionOpen, "Connection open. Starting file transfer."),
    (
        ReplyCode::FileStatusOkay,
        "File status okay; about to open data connection.",
    ),
    (ReplyCode::CommandOkay, "Command okay."),
    (ReplyCode::DirectoryStatus, "Directory status."),
    (ReplyCode::HelpMessage, "Help message."),
    (ReplyCode::ServiceReady, "Service ready for new user."),
    (
        ReplyCode::ClosingControlConnection,
        "Service closing control connection.",
    ),
    (
        ReplyCode::ClosingDataConnection,
        "Requested file action successful. Closing data connection.",
    ),
    (ReplyCode::PathnameCreated, "Pathname created."),
    (ReplyCode::CantOpenDataConnection, "Can't open data connection."),
    (
        ReplyCode::TransferFailed,
        "Requested file action not taken. Transfer failed.",
    ),
    (ReplyCode::SyntaxError, "Syntax error, command unrecognized."),
    (
        ReplyCode::ParameterSyntaxError,
        "Syntax error in parameters or arguments.",
    ),
    (ReplyCode::DirectoryError, "Directory action not taken."),
    (
        ReplyCode::FileNotFound,
        "Requested action not taken. File not found.",
    ),
];

impl ReplyCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(code: u16) -> Option<ReplyCode> {
        REPLY_TABLE
            .iter()
            .find(|(known, _)| known.as_u16() == code)
            .map(|(known, _)| *known)
    }

    pub fn default_text(self) -> &'static str {
        REPLY_TABLE
            .iter()
            .find(|(known, _)| *known == self)
            .map(|(_, text)| *text)
            .unwrap_or("")
    }

    /// 1xx replies announce that another reply will follow.
    pub fn is_preliminary(self) -> bool {
        self.as_u16() < 200
    }
}

fn single_line(text: &str) -> Cow<'_, str> {
    if text.contains(['\r', '\n']) {
        Cow::Owned(text.replace(['\r', '\n'], "?"))
    } else {
        Cow::Borrowed(text)
    }
}

/// One control channel reply: a code and one or more lines of text.
///
/// A single line goes on the wire as `"<code> <text>\r\n"`. Several lines use
/// the RFC 959 multi-line form: `"<code>-<first>"`, continuation lines
/// prefixed with one space, and a closing `"<code> <last>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: ReplyCode,
    pub lines: Vec<String>,
}

/// The parsed first line of a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyHead {
    pub code: ReplyCode,
    pub continues: bool,
    pub text: String,
}

impl Reply {
    pub fn new(code: ReplyCode, text: impl Into<String>) -> Self {
        Self {
            code,
            lines: vec![text.into()],
        }
    }

    pub fn standard(code: ReplyCode) -> Self {
        Self::new(code, code.default_text())
    }

    pub fn multi_line(code: ReplyCode, lines: Vec<String>) -> Self {
        if lines.is_empty() {
            return Self::standard(code);
        }
        Self { code, lines }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Line breaks inside a line are written as `?`, so every line stays
    /// exactly one line on the wire.
    pub fn to_wire(&self) -> String {
        let code = self.code.as_u16();
        match self.lines.as_slice() {
            [] => format!("{} {}\r\n", code, self.code.default_text()),
            [only] => format!("{} {}\r\n", code, single_line(only)),
            [first, middle @ .., last] => {
                let mut wire = format!("{}-{}\r\n", code, single_line(first));
                for line in middle {
                    wire.push(' ');
                    wire.push_str(&single_line(line));
                    wire.push_str("\r\n");
                }
                wire.push_str(&format!("{} {}\r\n", code, single_line(last)));
                wire
            }
        }
    }

    /// Parses the first line of a reply.
    pub fn parse_head(line: &str) -> Result<ReplyHead, FtpError> {
        let digits = line
            .get(..3)
            .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| FtpError::MalformedReply(line.to_string()))?;
        let code = digits
            .parse::<u16>()
            .ok()
            .and_then(ReplyCode::from_u16)
            .ok_or_else(|| FtpError::MalformedReply(line.to_string()))?;

        let (continues, text) = match line.as_bytes().get(3) {
            None => (false, ""),
            Some(b' ') => (false, &line[4..]),
            Some(b'-') => (true, &line[4..]),
            Some(_) => return Err(FtpError::MalformedReply(line.to_string())),
        };

        Ok(ReplyHead {
            code,
            continues,
            text: text.to_string(),
        })
    }

    /// Returns the text of `line` if it closes a multi-line reply with `code`.
    pub fn closing_text(line: &str, code: ReplyCode) -> Option<String> {
        let prefix = format!("{} ", code.as_u16());
        if line == prefix.trim_end() {
            return Some(String::new());
        }
        line.strip_prefix(&prefix).map(str::to_string)
    }

    /// Strips the single leading space written before continuation lines.
    pub fn continuation_text(line: &str) -> String {
        line.strip_prefix(' ').unwrap_or(line).to_string()
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.code.as_u16();
        let mut lines = self.lines.iter();
        match lines.next() {
            Some(first) => write!(f, "{} {}", code, first)?,
            None => write!(f, "{} {}", code, self.code.default_text())?,
        }
        for line in lines {
            write!(f, "\n{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line_wire_format() {
        assert_eq!(
            Reply::standard(ReplyCode::ClosingControlConnection).to_wire(),
            "221 Service closing control connection.\r\n"
        );
    }

    #[test]
    fn test_multi_line_wire_format() {
        let reply = Reply::multi_line(
            ReplyCode::DirectoryStatus,
            vec!["Listing:".into(), "212 tricky".into(), "End.".into()],
        );
        assert_eq!(reply.to_wire(), "212-Listing:\r\n 212 tricky\r\n212 End.\r\n");
    }

    #[test]
    fn test_embedded_line_breaks_stay_on_one_line() {
        let reply = Reply::multi_line(
            ReplyCode::DirectoryStatus,
            vec![
                "Listing:".into(),
                "evil\n212 End.".into(),
                "cr\rname".into(),
                "End.".into(),
            ],
        );
        assert_eq!(
            reply.to_wire(),
            "212-Listing:\r\n evil?212 End.\r\n cr?name\r\n212 End.\r\n"
        );
        assert_eq!(
            Reply::new(ReplyCode::CommandOkay, "a\r\nb").to_wire(),
            "200 a??b\r\n"
        );
    }

    #[test]
    fn test_parse_head() {
        let head = Reply::parse_head("150 File status okay").unwrap();
        assert_eq!(head.code, ReplyCode::FileStatusOkay);
        assert!(!head.continues);
        assert_eq!(head.text, "File status okay");

        let head = Reply::parse_head("214-The following commands").unwrap();
        assert_eq!(head.code, ReplyCode::HelpMessage);
        assert!(head.continues);

        assert!(Reply::parse_head("hello").is_err());
        assert!(Reply::parse_head("999 unknown").is_err());
        assert!(Reply::parse_head("2").is_err());
    }

    #[test]
    fn test_closing_text_only_matches_same_code() {
        assert_eq!(
            Reply::closing_text("212 End.", ReplyCode::DirectoryStatus),
            Some("End.".to_string())
        );
        assert_eq!(Reply::closing_text(" 212 tricky", ReplyCode::DirectoryStatus), None);
        assert_eq!(Reply::closing_text("214 End.", ReplyCode::DirectoryStatus), None);
    }

    #[test]
    fn test_preliminary_codes() {
        assert!(ReplyCode::FileStatusOkay.is_preliminary());
        assert!(ReplyCode::ConnectionOpen.is_preliminary());
        assert!(!ReplyCode::ClosingDataConnection.is_preliminary());
    }
}
