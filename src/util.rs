use chrono::{DateTime, Local};

use crate::git::{GitSnapshot, GitStat, GitStatus};
use crate::tree::VisibleRow;

pub fn format_git_badge(stat: &GitStat) -> String {
    match stat.status {
        GitStatus::Untracked => format!("U +{}", stat.added),
        GitStatus::Deleted => format!("D -{}", stat.deleted),
        GitStatus::Modified => match (stat.added, stat.deleted) {
            (0, 0) => "M".to_string(),
            (added, 0) => format!("+{added}"),
            (0, deleted) => format!("-{deleted}"),
            (added, deleted) => format!("+{added} -{deleted}"),
        },
    }
}

pub fn format_notice_time(time: DateTime<Local>) -> String {
    time.format("%H:%M:%S").to_string()
}

/// One sidebar row as text: indentation, folder marker, name, and the git badge if any.
pub fn format_row(row: &VisibleRow, snapshot: &GitSnapshot, expanded: bool) -> String {
    let indent = "  ".repeat(row.depth);
    let marker = match (row.node.is_dir(), expanded) {
        (true, true) => "v ",
        (true, false) => "> ",
        (false, _) => "  ",
    };
    let mut line = format!("{indent}{marker}{}", row.node.name());
    if row.node.is_dir() {
        line.push('/');
    }
    if let Some(stat) = snapshot.get(row.node.path()) {
        line.push_str("  [");
        line.push_str(&format_git_badge(stat));
        line.push(']');
    } else if row.node.entry.is_deleted {
        line.push_str("  [D]");
    }
    line
}
