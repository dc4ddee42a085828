//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

pub mod auth;
mod doctor;
pub mod ledger;
pub mod logging;
pub mod migration;
pub mod registry;
mod status;
pub mod validation;

pub use auth::{AuthService, UserHandle};
pub use doctor::{CheckResult, CheckStatus, DoctorResult, DoctorService, DoctorSummary};
pub use ledger::{History, LedgerService};
pub use logging::{EntryPoint, LogEntry, LogEvent, LogStats, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use registry::{AccountRegistry, AccountSummary, Registration, RegistrationRequest};
pub use status::{DateRange, StatusService, StatusSummary};
