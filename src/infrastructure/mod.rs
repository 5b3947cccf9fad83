// Infrastructure layer module
// Contains storage adapters for finalized capture documents
// Follows Hexagonal Architecture

pub mod repositories;
