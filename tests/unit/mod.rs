//! Unit tests module

mod config_test;
mod error_test;
mod session_test;
mod target_test;
mod template_test;
