pub mod device_attempt;
pub mod postgres_repository;
