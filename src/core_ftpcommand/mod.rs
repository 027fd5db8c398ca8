// The command vocabulary and the reply table
pub mod ftpcommand;
pub mod reply;

pub mod handlers;

// One handler per verb
pub mod cwd;
pub mod help;
pub mod list;
pub mod mkd;
pub mod pwd;
pub mod quit;
pub mod retr;
pub mod stor;
