// Repository contracts implemented by the infrastructure layer

pub mod record_repository;

pub use record_repository::{key_matches, RecordRepository};
