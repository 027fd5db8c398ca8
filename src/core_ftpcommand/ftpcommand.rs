#[derive(Eq, Hash, PartialEq, Debug, Clone, Copy)]
pub enum FtpCommand {
    RETR,
    STOR,
    HELP,
    MKD,
    CWD,
    PWD,
    QUIT,
    LIST,
    INVALID,
}

/// Every recognized verb, in the order HELP lists them.
const VERB_TABLE: [(&str, FtpCommand); 8] = [
    ("RETR", FtpCommand::RETR),
    ("STOR", FtpCommand::STOR),
    ("HELP", FtpCommand::HELP),
    ("LIST", FtpCommand::LIST),
    ("QUIT", FtpCommand::QUIT),
    ("MKD", FtpCommand::MKD),
    ("PWD", FtpCommand::PWD),
    ("CWD", FtpCommand::CWD),
];

impl FtpCommand {
    /// Case-insensitive lookup; anything outside the vocabulary is `INVALID`.
    pub fn from_verb(verb: &str) -> FtpCommand {
        let verb = verb.to_ascii_uppercase();
        VERB_TABLE
            .iter()
            .find(|(name, _)| *name == verb)
            .map(|(_, command)| *command)
            .unwrap_or(FtpCommand::INVALID)
    }

    pub fn verbs() -> impl Iterator<Item = &'static str> {
        VERB_TABLE.iter().map(|(name, _)| *name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FtpCommand::RETR => "RETR",
            FtpCommand::STOR => "STOR",
            FtpCommand::HELP => "HELP",
            FtpCommand::MKD => "MKD",
            FtpCommand::CWD => "CWD",
            FtpCommand::PWD => "PWD",
            FtpCommand::QUIT => "QUIT",
            FtpCommand::LIST => "LIST",
            FtpCommand::INVALID => "INVALID",
        }
    }

    pub fn usage(&self) -> &'static str {
        match self {
            FtpCommand::RETR => "RETR <file-name>: download the specified file from the server.",
            FtpCommand::STOR => "STOR <file-name>: upload the specified file to the server.",
            FtpCommand::HELP => {
                "HELP [<command-name>]: view all commands, or an explanation of the specified command."
            }
            FtpCommand::MKD => "MKD <directory-name>: create a new directory.",
            FtpCommand::CWD => {
                "CWD <folder-name>: change to that directory, or <..> to go back one level."
            }
            FtpCommand::PWD => "PWD: view the current working directory.",
            FtpCommand::QUIT => "QUIT: close the connection and exit.",
            FtpCommand::LIST => {
                "LIST: view the files and folders in the current working directory."
            }
            FtpCommand::INVALID => "Unrecognized command.",
        }
    }
}

/// One parsed control line: the verb and at most one argument token.
///
/// Only the first two whitespace-separated tokens are looked at, so
/// arguments containing whitespace are not supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: FtpCommand,
    pub argument: Option<String>,
}

impl Command {
    pub fn parse(line: &str) -> Command {
        let mut parts = line.split_whitespace();
        let verb = parts
            .next()
            .map(FtpCommand::from_verb)
            .unwrap_or(FtpCommand::INVALID);
        let argument = parts.next().map(str::to_string);
        Command { verb, argument }
    }
}
