use serde::Serialize;

/// Placeholder used for `last_date` when no header row yielded a date label.
pub const UNKNOWN_DATE: &str = "Unknown";

/// One subject's status on the most recent recorded date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyEntry {
    pub subject: String,
    pub status: String,
}

/// Attended/held totals across every counted subject row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceTotal {
    pub attended: u32,
    pub held: u32,
    pub percentage: f64,
}

impl AttendanceTotal {
    /// Builds the aggregate, or `None` when no classes were held.
    pub fn from_counts(attended: u32, held: u32) -> Option<Self> {
        if held == 0 {
            return None;
        }
        Some(Self {
            attended,
            held,
            percentage: f64::from(attended) / f64::from(held) * 100.0,
        })
    }
}

/// Result of a single extraction. Built once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceSnapshot {
    pub daily_log: Vec<DailyEntry>,
    pub last_date: String,
    pub total: Option<AttendanceTotal>,
}

impl AttendanceSnapshot {
    pub fn has_known_date(&self) -> bool {
        self.last_date != UNKNOWN_DATE
    }
}

impl Default for AttendanceSnapshot {
    fn default() -> Self {
        Self {
            daily_log: Vec::new(),
            last_date: UNKNOWN_DATE.to_string(),
            total: None,
        }
    }
}
