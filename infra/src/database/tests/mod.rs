//! Unit tests for the database module

#[cfg(test)]
mod connection_tests;
