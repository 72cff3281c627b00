#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod controller;
pub mod domain;
pub mod flow;
pub mod query;
pub mod retry;
pub mod scenario;
pub mod service;
pub mod sim;
