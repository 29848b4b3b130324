//! Locates the academic register table in a page and folds its rows into an
//! [`AttendanceSnapshot`].
//!
//! The register has no stable ids or classes, so everything here is
//! positional. Data rows look like
//! `Sl.No | Subject | <one column per date> ... | Status | Attended/Held | %`
//! where the status and ratio sit at fixed offsets from the end of the row.

use log::debug;
use scraper::{ElementRef, Html, Selector};

use crate::snapshot::{AttendanceSnapshot, AttendanceTotal, DailyEntry, UNKNOWN_DATE};
use crate::text_manipulators::{extract_text, own_text};

/// Cell text that identifies the register's header row.
pub const TABLE_MARKER: &str = "Sl.No";
/// First-cell markers of header rows.
pub const HEADER_MARKERS: [&str; 2] = ["Sl.No", "Subject"];
/// Placeholder the portal uses for "no class on that date".
pub const STATUS_PLACEHOLDER: &str = "-";

const MIN_CELLS: usize = 3;

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

/// Cell texts for every row of the register.
///
/// Prefers the first table holding a `Sl.No` cell; falls back to every row of
/// every table when the marker is missing.
pub fn harvest_rows(html: &str) -> Vec<Vec<String>> {
    let document = Html::parse_document(html);
    let table_selector = selector("table");
    let cell_selector = selector("td");
    let row_selector = selector("tr");

    let target = document.select(&table_selector).find(|table| {
        table
            .select(&cell_selector)
            .any(|cell| own_text(cell).contains(TABLE_MARKER))
    });

    let rows: Vec<ElementRef> = match target {
        Some(table) => table.select(&row_selector).collect(),
        None => {
            debug!("no table carries a {TABLE_MARKER} cell, scanning every table row");
            document.select(&selector("table tr")).collect()
        }
    };

    rows.into_iter()
        .map(|row| row.select(&cell_selector).map(extract_text).collect())
        .collect()
}

/// Why a row contributed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    TooFewCells,
    TotalOrBlankSubject,
    MalformedRatio,
}

/// What a single row contributes to the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome<'a> {
    Header { date: &'a str },
    Subject {
        subject: &'a str,
        status: &'a str,
        attended: u32,
        held: u32,
    },
    Skip(SkipReason),
}

/// Parses an `attended/held` cell. Exactly one separator, two integers.
pub fn parse_ratio(text: &str) -> Option<(u32, u32)> {
    let (attended, held) = text.split_once('/')?;
    if held.contains('/') {
        return None;
    }
    Some((attended.trim().parse().ok()?, held.trim().parse().ok()?))
}

pub fn classify_row(cells: &[String]) -> RowOutcome<'_> {
    let len = cells.len();
    if len < MIN_CELLS {
        return RowOutcome::Skip(SkipReason::TooFewCells);
    }

    if HEADER_MARKERS.iter().any(|marker| cells[0].contains(marker)) {
        return RowOutcome::Header {
            date: cells[len - 3].as_str(),
        };
    }

    let subject = cells[1].as_str();
    if subject.is_empty() || subject.to_uppercase().contains("TOTAL") {
        return RowOutcome::Skip(SkipReason::TotalOrBlankSubject);
    }

    match parse_ratio(&cells[len - 2]) {
        Some((attended, held)) => RowOutcome::Subject {
            subject,
            status: cells[len - 3].as_str(),
            attended,
            held,
        },
        None => RowOutcome::Skip(SkipReason::MalformedRatio),
    }
}

/// Folds harvested rows into a snapshot.
pub fn build_snapshot(rows: &[Vec<String>]) -> AttendanceSnapshot {
    let mut daily_log = Vec::new();
    let mut last_date = UNKNOWN_DATE.to_string();
    let mut total_attended: u32 = 0;
    let mut total_held: u32 = 0;

    for (index, cells) in rows.iter().enumerate() {
        match classify_row(cells) {
            RowOutcome::Header { date } => last_date = date.to_string(),
            RowOutcome::Subject {
                subject,
                status,
                attended,
                held,
            } => {
                total_attended = total_attended.saturating_add(attended);
                total_held = total_held.saturating_add(held);
                if !status.is_empty() && status != STATUS_PLACEHOLDER {
                    daily_log.push(DailyEntry {
                        subject: subject.to_string(),
                        status: status.to_string(),
                    });
                }
            }
            RowOutcome::Skip(reason) => {
                debug!("skipping register row {index}: {reason:?}");
            }
        }
    }

    AttendanceSnapshot {
        daily_log,
        last_date,
        total: AttendanceTotal::from_counts(total_attended, total_held),
    }
}

/// Harvest and fold in one step.
pub fn parse_register(html: &str) -> AttendanceSnapshot {
    build_snapshot(&harvest_rows(html))
}
