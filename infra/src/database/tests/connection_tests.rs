//! Tests for the retry queue's MySQL pool

use otp_shared::DatabaseConfig;

use crate::database::{DatabasePool, PoolStatistics};
use crate::InfrastructureError;

#[tokio::test]
async fn test_non_mysql_url_is_rejected_before_connecting() {
    let result = DatabasePool::new(DatabaseConfig::new("invalid://url")).await;
    assert!(matches!(result, Err(InfrastructureError::Validation(_))));
}

#[tokio::test]
async fn test_malformed_mysql_url_is_a_config_error() {
    let result = DatabasePool::new(DatabaseConfig::new("mysql://user@host:notaport/db")).await;
    assert!(result.is_err());
}

#[test]
fn test_pool_statistics_display() {
    let stats = PoolStatistics {
        connections: 5,
        idle_connections: 3,
        max_connections: 10,
    };

    assert_eq!(stats.to_string(), "5/10 connections open, 3 idle");
}
