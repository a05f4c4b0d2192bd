//! Use cases - Application operations that are not owned by a single service

pub mod health_check;

pub use health_check::HealthCheckUseCase;
