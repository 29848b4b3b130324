mod text_manipulators;
mod wait;

pub mod attendance_scraper;
pub mod bot;
pub mod chromium;
pub mod config;
pub mod credential_store;
pub mod error;
pub mod projection;
pub mod register_table;
pub mod scraping_context;
pub mod session;
pub mod snapshot;
pub mod telegram;

pub use attendance_scraper::{AttendanceScraper, PortalLayout};
pub use error::{ExtractionError, SessionStage};
pub use projection::{Advisory, DisplayReport, ProjectionError, calculate_needs, project};
pub use scraping_context::ScrapingContext;
pub use snapshot::{AttendanceSnapshot, AttendanceTotal, DailyEntry};
