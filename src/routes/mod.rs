pub mod banned;
pub mod device;
pub mod error;
pub mod health;
pub mod online;
