pub mod device_attempt;
