//! CLI command handling

pub mod alert;
pub mod hazards;
pub mod output;
pub mod ussd;

pub use alert::*;
pub use hazards::*;
pub use output::*;
pub use ussd::*;
