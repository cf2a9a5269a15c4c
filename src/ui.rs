use std::io::{self, IsTerminal};

use crate::app::ConnectivityReport;
use crate::domain::activity::Activity;
use crate::domain::queue::PendingEntry;
use crate::sync::{IssueSeverity, SyncIssue, SyncReport};

pub fn print_activity_list(activities: &[Activity]) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Activities"));
    if activities.is_empty() {
        println!("{}", palette.dim("no activities yet"));
        return;
    }

    let width = activities
        .iter()
        .map(|activity| activity.name.chars().count())
        .max()
        .unwrap_or(0);
    for activity in activities {
        println!("{}", format_activity_row(activity, width, &palette));
    }
    println!(
        "{}",
        palette.dim(&format!("{} activit{}", activities.len(), plural_y(activities.len())))
    );
}

pub fn print_activity(activity: &Activity) {
    let palette = Palette::auto();
    println!("{}", palette.name(&activity.name));
    println!("priority: {}", palette.priority(activity.priority));
}

pub fn print_status(report: &ConnectivityReport) {
    let palette = Palette::auto();
    println!("status: {}", palette.status(report.online));
    println!("store: {}", report.active_store.as_str());
    println!("local: {}", report.local);
    if let Some(remote) = report.remote.as_deref() {
        println!("remote: {remote}");
    } else {
        println!("remote: {}", palette.dim("not configured"));
    }
    println!("pending operations: {}", report.pending_operations);
    match report.last_synced_at.as_deref() {
        Some(at) => println!("last synced: {at}"),
        None => println!("last synced: {}", palette.dim("never")),
    }
}

pub fn print_queue(entries: &[PendingEntry]) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Pending operations"));
    if entries.is_empty() {
        println!("{}", palette.dim("queue is empty"));
        return;
    }
    for entry in entries {
        println!("{}", format_queue_row(entry, &palette));
    }
}

pub fn print_sync_report(report: &SyncReport) {
    let palette = Palette::auto();
    println!(
        "sync success={} skipped={} failed={} pulled={}",
        report.success, report.skipped, report.failed, report.pulled
    );
    if report.pulled {
        println!(
            "{}",
            palette.dim(&format!(
                "local mirror refreshed with {} activit{}",
                report.pulled_activities,
                plural_y(report.pulled_activities)
            ))
        );
    }
    for issue in &report.issues {
        println!("  {}", format_issue(issue, &palette));
    }
}

fn format_activity_row(activity: &Activity, width: usize, palette: &Palette) -> String {
    let padding = width.saturating_sub(activity.name.chars().count());
    format!(
        "{}{} {}",
        palette.name(&activity.name),
        " ".repeat(padding),
        palette.priority(activity.priority)
    )
}

fn format_queue_row(entry: &PendingEntry, palette: &Palette) -> String {
    let payload = entry
        .payload
        .map(|value| format!(" {value:+.1}"))
        .unwrap_or_default();
    let row = format!(
        "#{} {} {}{} ({})",
        entry.id, entry.operation, entry.activity, payload, entry.queued_at
    );
    match entry.problem.as_deref() {
        Some(problem) => format!("{row} {}", palette.error(&format!("[{problem}]"))),
        None => row,
    }
}

fn format_issue(issue: &SyncIssue, palette: &Palette) -> String {
    let label = match issue.severity {
        IssueSeverity::Warning => palette.warning("warning"),
        IssueSeverity::Error => palette.error("error"),
    };
    format!(
        "{}: #{} {} {}: {}",
        label, issue.entry_id, issue.operation, issue.activity, issue.message
    )
}

pub fn format_priority(value: f64) -> String {
    format!("{value:.1}")
}

fn plural_y(count: usize) -> &'static str {
    if count == 1 {
        "y"
    } else {
        "ies"
    }
}

pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn auto() -> Self {
        let enabled = std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();
        Self { enabled }
    }

    #[cfg(test)]
    pub fn plain() -> Self {
        Self { enabled: false }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    pub fn heading(&self, text: &str) -> String {
        self.paint("1;36", text)
    }

    pub fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }

    pub fn name(&self, text: &str) -> String {
        self.paint("1;94", text)
    }

    pub fn priority(&self, value: f64) -> String {
        self.paint(priority_color_code(value), &format_priority(value))
    }

    pub fn success(&self, text: &str) -> String {
        self.paint("32", text)
    }

    fn warning(&self, text: &str) -> String {
        self.paint("33", text)
    }

    fn error(&self, text: &str) -> String {
        self.paint("31", text)
    }

    fn status(&self, online: bool) -> String {
        if online {
            self.paint("1;32", "online")
        } else {
            self.paint("1;33", "offline")
        }
    }
}

fn priority_color_code(value: f64) -> &'static str {
    if value >= 3.0 {
        "1;35"
    } else if value >= 1.5 {
        "33"
    } else if value > 0.1 {
        "37"
    } else {
        "90"
    }
}
