//! Unit tests for the cache module

#[cfg(test)]
mod local_code_store_tests;
