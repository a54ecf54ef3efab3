pub mod config;
pub mod domain;
pub mod errors;

pub use chrono;
pub use rust_decimal;

pub use domain::assignment::{AssignmentId, AssignmentStatus, PaymentStatus, ServiceAssignment};
pub use domain::catalog::{Service, ServiceId};
pub use domain::notification::{EmailTemplate, NotificationPayload};
pub use domain::outbox::{OutboxEmail, OutboxEmailId, OutboxState};
pub use domain::profile::{ClientProfile, ExpertProfile, UserAccount, UserId, UserRole};
pub use domain::request::{RequestId, RequestStatus, ServiceRequest};
pub use errors::{ApplicationError, DomainError, InterfaceError};
