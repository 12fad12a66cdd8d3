//! End-to-end tests for the library.

mod build_tests;
mod common;
