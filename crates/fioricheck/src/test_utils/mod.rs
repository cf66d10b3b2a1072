//! Shared fixtures for unit tests, integration tests and the CLI tests.

pub mod fixture_project;
pub mod fixtures;
