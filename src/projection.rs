//! Turns an [`AttendanceSnapshot`] into the 75% advisory and the chat report.
//!
//! Everything in here is pure; the fetch time is passed in by the caller.

use chrono::NaiveTime;
use thiserror::Error;

use crate::snapshot::AttendanceSnapshot;

/// Minimum attendance, in percent.
pub const THRESHOLD_PERCENT: u32 = 75;

/// Callback tag of the refresh button. Bumped whenever the button's meaning
/// changes so that buttons on old messages can be told apart.
pub const REFRESH_CALLBACK: &str = "refresh_v2";
pub const REFRESH_LABEL: &str = "🔄 Update";

const PRESENT_MARKER: char = 'P';

/// Outcome of the 75% rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advisory {
    /// Classes to attend in a row (each one held and attended) to reach 75%.
    Need(u64),
    /// Classes that may be held and missed while staying at or above 75%.
    Skip(u64),
}

/// Applies the 75% rule. `None` when nothing was held.
///
/// The need branch solves `(a + x) / (h + x) = 0.75`, giving
/// `ceil((0.75h - a) / 0.25) = 3h - 4a`. The skip branch solves
/// `a / (h + y) = 0.75`, giving `floor((a - 0.75h) / 0.75) = floor((4a - 3h) / 3)`.
/// Both are evaluated on integers so the 75% boundary is exact.
pub fn calculate_needs(attended: u32, held: u32) -> Option<Advisory> {
    if held == 0 {
        return None;
    }
    let quad_attended = 4 * u64::from(attended);
    let triple_held = 3 * u64::from(held);
    if quad_attended < triple_held {
        Some(Advisory::Need(triple_held - quad_attended))
    } else {
        Some(Advisory::Skip((quad_attended - triple_held) / 3))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectionError {
    /// The session worked but no row carried a usable ratio.
    #[error("❌ Could not fetch attendance data. Found {logs} logs.")]
    NoAggregateData { logs: usize },
}

/// The single action offered under a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshAction {
    pub label: String,
    pub callback_data: String,
}

impl RefreshAction {
    pub fn current() -> Self {
        Self {
            label: REFRESH_LABEL.to_string(),
            callback_data: REFRESH_CALLBACK.to_string(),
        }
    }

    /// Whether callback data came from a button of the current version.
    pub fn is_current(callback_data: &str) -> bool {
        callback_data == REFRESH_CALLBACK
    }
}

/// Rendered report, in Telegram legacy Markdown.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayReport {
    pub text: String,
    pub action: RefreshAction,
}

/// Escapes the characters legacy Markdown treats as markup.
pub fn escape_markdown(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if is_markup(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn is_markup(c: char) -> bool {
    matches!(c, '_' | '*' | '`' | '[')
}

/// Bold text in legacy Markdown. Escapes are not allowed inside an entity,
/// so the entity is closed before each markup character and reopened after.
pub fn bold(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    let mut run = String::new();
    for c in s.chars() {
        if is_markup(c) {
            if !run.is_empty() {
                out.push_str(&format!("*{run}*"));
                run.clear();
            }
            out.push('\\');
            out.push(c);
        } else {
            run.push(c);
        }
    }
    if !run.is_empty() {
        out.push_str(&format!("*{run}*"));
    }
    out
}

pub fn status_glyph(status: &str) -> &'static str {
    if status.contains(PRESENT_MARKER) {
        "✅"
    } else {
        "❌"
    }
}

pub fn project(
    snapshot: &AttendanceSnapshot,
    username: &str,
    fetched_at: NaiveTime,
) -> Result<DisplayReport, ProjectionError> {
    let Some(total) = &snapshot.total else {
        return Err(ProjectionError::NoAggregateData {
            logs: snapshot.daily_log.len(),
        });
    };
    let Some(advisory) = calculate_needs(total.attended, total.held) else {
        return Err(ProjectionError::NoAggregateData {
            logs: snapshot.daily_log.len(),
        });
    };

    let mut text = format!("👤 *User:* {}\n", escape_markdown(username));

    match advisory {
        Advisory::Need(classes) => text.push_str(&format!(
            "⚠️ *Status:* You need to attend *{classes}* more classes to reach {THRESHOLD_PERCENT}%.\n"
        )),
        Advisory::Skip(classes) => text.push_str(&format!(
            "✅ *Status:* You can safely skip *{classes}* classes and stay above {THRESHOLD_PERCENT}%.\n"
        )),
    }

    text.push_str(&format!(
        "📊 *Total:* {}/{} ({:.2}%)\n",
        total.attended, total.held, total.percentage
    ));

    if !snapshot.daily_log.is_empty() && snapshot.has_known_date() {
        text.push_str(&format!(
            "\n📅 {}\n",
            bold(&format!("Activity on {}:", snapshot.last_date))
        ));
        for entry in &snapshot.daily_log {
            text.push_str(&format!(
                "{} {} {}\n",
                status_glyph(&entry.status),
                bold(&format!("{}:", entry.subject)),
                escape_markdown(&entry.status)
            ));
        }
    } else {
        text.push_str("\nℹ️ *Activity:* No updates found for the latest date.\n");
    }

    text.push_str(&format!("\n_Last Fetched: {}_", fetched_at.format("%H:%M:%S")));

    Ok(DisplayReport {
        text,
        action: RefreshAction::current(),
    })
}
