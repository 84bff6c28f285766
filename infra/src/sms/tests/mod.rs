//! Unit tests for SMS module

#[cfg(test)]
mod failover_tests;
