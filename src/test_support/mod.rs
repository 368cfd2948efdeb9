//! Shared helpers for unit tests.

#![allow(clippy::expect_used)]

pub mod fake_api;
pub mod socket_guard;
