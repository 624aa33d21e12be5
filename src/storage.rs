use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Command {
    pub id: i64,                       // Store-assigned, never reused
    pub command_text: String,          // Verbatim shell input
    pub working_dir: String,           // Absolute path at invocation time
    pub exit_status: i32,              // Exit code
    pub timestamp: i64,                // Invocation start (unix seconds)
    pub duration: Option<i64>,         // Milliseconds, set once the command finishes
    pub git_branch: Option<String>,
    pub git_repo: Option<String>,
    pub source_app: Option<String>,    // Invoking shell or program
    pub source_pid: Option<i64>,       // Pid of the invoking shell session
    pub source_active: Option<bool>,
}

/// A record as handed to the store by the capture hook, before an id exists.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct NewCommand {
    pub command_text: String,
    pub working_dir: String,
    pub exit_status: i32,
    pub timestamp: i64,
    pub duration: Option<i64>,
    pub git_branch: Option<String>,
    pub git_repo: Option<String>,
    pub source_app: Option<String>,
    pub source_pid: Option<i64>,
    pub source_active: Option<bool>,
}

impl NewCommand {
    pub fn new(command_text: impl Into<String>, working_dir: impl Into<String>, timestamp: i64) -> Self {
        Self {
            command_text: command_text.into(),
            working_dir: working_dir.into(),
            timestamp,
            ..Self::default()
        }
    }
}
