//! Integration tests for deep-research

mod common;
mod fetch_tests;
mod http_tests;
mod server_tests;
