//! Background Tasks Module
//!
//! Houses the expiry scheduler that evicts expired cache records.

mod expiry;

pub use expiry::ExpiryScheduler;
