//! Event handlers that observe every message before routing.

pub mod antiflood;

pub use antiflood::{FloodGuard, FloodSubject, FloodVerdict};
