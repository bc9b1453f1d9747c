//! REST client against a mock API
//!
//! Run with: cargo test -p integration-tests --test rest_tests

use std::time::Duration;

use chat_common::ClientError;
use chat_core::{Snowflake, User};
use chat_rest::{CommandDefinition, CommandSync, RestClient, RestError};
use integration_tests::*;

async fn client(token: &str) -> (TestRestServer, RestClient) {
    let server = TestRestServer::start().await.expect("Failed to start REST server");
    let client = RestClient::new(server.base_url(), token).unwrap();
    (server, client)
}

#[tokio::test]
async fn test_get_current_user() {
    let (_server, client) = client(TEST_TOKEN).await;

    let user: User = client.get("users/@me").await.unwrap();
    assert_eq!(user.username, "test-bot");
    assert!(user.is_bot());
}

#[tokio::test]
async fn test_bulk_overwrite_global_commands() {
    let (_server, client) = client(TEST_TOKEN).await;
    let definitions = CommandDefinition::from_names(["ping", "Echo"]);

    let registered = CommandSync::new(&client)
        .bulk_overwrite_global_commands(Snowflake::new(400), &definitions)
        .await
        .unwrap();

    assert_eq!(registered.len(), 2);
    assert_eq!(registered[0].id, Snowflake::new(1000));
    assert_eq!(registered[0].name, "ping");
    assert_eq!(registered[1].name, "echo");
    assert_eq!(registered[1].description, "Run the echo command");
    assert_eq!(registered[1].application_id, Some(Snowflake::new(400)));
}

#[tokio::test]
async fn test_wrong_token_is_a_configuration_error() {
    let (_server, client) = client("wrong-token").await;

    let err = CommandSync::new(&client)
        .bulk_overwrite_global_commands(Snowflake::new(400), &CommandDefinition::from_names(["ping"]))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert!(matches!(ClientError::from(err), ClientError::Configuration(_)));
}

#[tokio::test]
async fn test_rate_limit_reports_retry_after() {
    let (_server, client) = client(TEST_TOKEN).await;

    let err = client.get::<serde_json::Value>("limited").await.unwrap_err();
    assert!(matches!(err, RestError::RateLimited { retry_after } if retry_after == Duration::from_millis(1500)));

    let err = ClientError::from(err);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_not_found_status() {
    let (_server, client) = client(TEST_TOKEN).await;

    let err = client.get::<serde_json::Value>("missing").await.unwrap_err();
    assert!(matches!(err, RestError::Status { status: 404, ref body } if body.contains("Not Found")));
}
