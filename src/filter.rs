use crate::error::{Result, StoreError};
use crate::storage::Command;
use std::str::FromStr;

pub const DEFAULT_SELF_PREFIX: &str = "cmdlog";

/// `app` or `app:pid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFilter {
    pub app: String,
    pub pid: Option<i64>,
}

impl SessionFilter {
    pub fn matches(&self, command: &Command) -> bool {
        if command.source_app.as_deref() != Some(self.app.as_str()) {
            return false;
        }
        match self.pid {
            Some(pid) => command.source_pid == Some(pid),
            None => true,
        }
    }
}

impl FromStr for SessionFilter {
    type Err = StoreError;

    fn from_str(token: &str) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(StoreError::usage("session filter must not be empty"));
        }
        match token.rsplit_once(':') {
            Some((app, pid)) => {
                let pid = pid.parse::<i64>().map_err(|_| {
                    StoreError::usage(format!("invalid session {:?}: expected app or app:pid", token))
                })?;
                if app.is_empty() {
                    return Err(StoreError::usage(format!("invalid session {:?}: missing app", token)));
                }
                Ok(Self { app: app.to_string(), pid: Some(pid) })
            }
            None => Ok(Self { app: token.to_string(), pid: None }),
        }
    }
}

/// Records whose text starts with the tool's own name are hidden unless `include` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfInvocation {
    pub prefix: String,
    pub include: bool,
}

impl Default for SelfInvocation {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_SELF_PREFIX.to_string(),
            include: false,
        }
    }
}

/// AND-combined predicate shared by every read path.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub working_dir: Option<String>,
    pub session: Option<SessionFilter>,
    pub exclude: Option<glob::Pattern>,
    pub self_invocation: SelfInvocation,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn session(mut self, session: SessionFilter) -> Self {
        self.session = Some(session);
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Result<Self> {
        let compiled = glob::Pattern::new(pattern).map_err(|e| {
            StoreError::usage(format!("invalid exclude pattern {:?}: {}", pattern, e))
        })?;
        self.exclude = Some(compiled);
        Ok(self)
    }

    pub fn self_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.self_invocation.prefix = prefix.into();
        self
    }

    pub fn include_self(mut self, include: bool) -> Self {
        self.self_invocation.include = include;
        self
    }

    /// Full predicate: scope (directory, session) plus text rules.
    pub fn matches(&self, command: &Command) -> bool {
        if let Some(dir) = &self.working_dir {
            if &command.working_dir != dir {
                return false;
            }
        }
        if let Some(session) = &self.session {
            if !session.matches(command) {
                return false;
            }
        }
        self.matches_text(&command.command_text)
    }

    /// Exclude glob and self-invocation only. Context prediction is global, so
    /// it ignores directory and session scope.
    pub fn matches_text(&self, text: &str) -> bool {
        if let Some(pattern) = &self.exclude {
            if pattern.matches(text) {
                return false;
            }
        }
        let own = &self.self_invocation;
        if !own.include && !own.prefix.is_empty() && text.starts_with(own.prefix.as_str()) {
            return false;
        }
        true
    }
}
