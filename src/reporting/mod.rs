//! Keypad (USSD) hazard reporting flow
//!
//! Produces `HazardReport` records; promoting reports to hazards is left to an operator
//! (`saferoute hazards add`).

pub mod menu;
pub mod report;
pub mod session;

pub use menu::{hazard_type_for_code, ReportLocation, UssdMenu};
pub use report::{HazardReport, InMemoryReportSink, JsonlReportStore, ReportSink};
pub use session::{MenuState, SessionStore, UssdSession, DEFAULT_SESSION_TTL_SECS};
