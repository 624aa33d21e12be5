use crate::duration::{format_duration_millis, format_duration_seconds};
use crate::error::{Result, StoreError};
use crate::storage::Command;
use chrono::{Local, TimeZone};
use std::str::FromStr;
use unicode_width::UnicodeWidthStr;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Timestamp,
    Status,
    Pwd,
    Cmd,
    GitBranch,
    GitRepo,
    DurationSeconds,
    DurationMillis,
}

impl Column {
    pub const ALL: [Column; 8] = [
        Column::Timestamp,
        Column::Status,
        Column::Pwd,
        Column::Cmd,
        Column::GitBranch,
        Column::GitRepo,
        Column::DurationSeconds,
        Column::DurationMillis,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            Column::Timestamp => "timestamp",
            Column::Status => "status",
            Column::Pwd => "pwd",
            Column::Cmd => "cmd",
            Column::GitBranch => "gb",
            Column::GitRepo => "gr",
            Column::DurationSeconds => "durs",
            Column::DurationMillis => "durms",
        }
    }

    pub fn render(self, command: &Command) -> String {
        match self {
            Column::Timestamp => format_timestamp(command.timestamp),
            Column::Status => command.exit_status.to_string(),
            Column::Pwd => command.working_dir.clone(),
            Column::Cmd => command.command_text.clone(),
            Column::GitBranch => command.git_branch.clone().unwrap_or_default(),
            Column::GitRepo => command.git_repo.clone().unwrap_or_default(),
            Column::DurationSeconds => format_duration_seconds(command.duration),
            Column::DurationMillis => format_duration_millis(command.duration),
        }
    }
}

impl FromStr for Column {
    type Err = StoreError;

    fn from_str(tag: &str) -> Result<Self> {
        Column::ALL
            .into_iter()
            .find(|c| c.tag() == tag.trim())
            .ok_or_else(|| {
                StoreError::usage(format!(
                    "unknown column {:?}: expected timestamp,status,pwd,cmd,gb,gr,durs,durms",
                    tag
                ))
            })
    }
}

/// Parse `timestamp,status,cmd` style lists.
pub fn parse_columns(spec: &str) -> Result<Vec<Column>> {
    let columns = spec
        .split(',')
        .filter(|tag| !tag.trim().is_empty())
        .map(Column::from_str)
        .collect::<Result<Vec<_>>>()?;
    if columns.is_empty() {
        return Err(StoreError::usage("column list is empty"));
    }
    Ok(columns)
}

pub fn format_timestamp(unix_seconds: i64) -> String {
    match Local.timestamp_opt(unix_seconds, 0).earliest() {
        Some(dt) => dt.format(TIMESTAMP_FORMAT).to_string(),
        None => unix_seconds.to_string(),
    }
}

/// Tab-separated row, stable for scripts.
pub fn render_row(command: &Command, columns: &[Column]) -> String {
    columns
        .iter()
        .map(|c| c.render(command))
        .collect::<Vec<_>>()
        .join("\t")
}

/// Rows padded to display width for terminals. The last column is not padded.
pub fn render_table(commands: &[Command], columns: &[Column]) -> Vec<String> {
    let cells: Vec<Vec<String>> = commands
        .iter()
        .map(|cmd| columns.iter().map(|c| c.render(cmd)).collect())
        .collect();

    let mut widths = vec![0usize; columns.len()];
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(UnicodeWidthStr::width(cell.as_str()));
        }
    }

    cells
        .into_iter()
        .map(|row| {
            let last = row.len().saturating_sub(1);
            let mut line = String::new();
            for (i, cell) in row.iter().enumerate() {
                line.push_str(cell);
                if i < last {
                    let pad = widths[i] - UnicodeWidthStr::width(cell.as_str());
                    line.push_str(&" ".repeat(pad + 2));
                }
            }
            line
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Command {
        Command {
            id: 3,
            command_text: "echo \"hi there\"".to_string(),
            working_dir: "/home/u".to_string(),
            exit_status: 1,
            timestamp: 1_700_000_000,
            duration: Some(2_028),
            git_branch: Some("main".to_string()),
            git_repo: None,
            source_app: None,
            source_pid: None,
            source_active: None,
        }
    }

    #[test]
    fn parses_every_tag() {
        let cols = parse_columns("timestamp,status,pwd,cmd,gb,gr,durs,durms").unwrap();
        assert_eq!(cols.len(), 8);
        let tags: Vec<&str> = cols.iter().map(|c| c.tag()).collect();
        assert_eq!(tags.join(","), "timestamp,status,pwd,cmd,gb,gr,durs,durms");
        assert!(matches!(parse_columns("cmd,exit"), Err(StoreError::Usage(_))));
        assert!(matches!(parse_columns(""), Err(StoreError::Usage(_))));
    }

    #[test]
    fn row_uses_tabs_and_exact_durations() {
        let cols = parse_columns("status,pwd,cmd,gb,gr,durs,durms").unwrap();
        assert_eq!(render_row(&sample(), &cols), "1\t/home/u\techo \"hi there\"\tmain\t\t2s\t2s28ms");
    }

    #[test]
    fn timestamp_column_is_local_time() {
        let expected = Local
            .timestamp_opt(1_700_000_000, 0)
            .unwrap()
            .format(TIMESTAMP_FORMAT)
            .to_string();
        assert_eq!(render_row(&sample(), &[Column::Timestamp]), expected);
    }

    #[test]
    fn table_pads_by_display_width() {
        let mut wide = sample();
        wide.working_dir = "/数据".to_string();
        let rows = render_table(&[sample(), wide], &[Column::Pwd, Column::Status]);
        assert_eq!(rows[0], "/home/u  1");
        assert_eq!(rows[1], "/数据    1");
    }
}
