//! Activity tracking for the CloudPet agent.

pub mod log;

pub use log::{
    create_shared_log, create_shared_log_with_persistence, ActivityLog, ActivityStats,
    SharedActivityLog,
};
