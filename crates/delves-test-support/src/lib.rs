//! Shared test doubles and fixtures for the Delves instance manager.

mod audit;
mod clock;
mod fixtures;
mod host;
mod transactions;

pub use audit::RecordingAuditSink;
pub use clock::{FixedClock, ManualClock};
pub use fixtures::TemplateFixture;
pub use host::MockWorldHost;
pub use transactions::{RecordingTransactions, TransactionRecord};
