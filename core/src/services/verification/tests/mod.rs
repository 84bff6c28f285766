//! Tests for the code service

#[cfg(test)]
mod mocks;
