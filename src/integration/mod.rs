//! Integration tests that run whole conversions on generated media

pub mod fixtures;

mod e2e;
