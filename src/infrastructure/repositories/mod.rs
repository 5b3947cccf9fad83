// Repository implementations (data access layer)
// Adapters that implement domain repository interfaces

pub mod in_memory_record_repository;
pub mod json_directory_repository;
pub mod json_log_repository;

pub use in_memory_record_repository::InMemoryRecordRepository;
pub use json_directory_repository::JsonDirectoryRepository;
pub use json_log_repository::JsonLogRepository;
