//! Tests against a live PowerSchool server.
//!
//! They read `POWERSCHOOL_URL`, `POWERSCHOOL_CLIENT_ID` and
//! `POWERSCHOOL_CLIENT_SECRET` from the environment.

use powerschool::{PowerSchool, QueryOptions, RestError};

fn live_client() -> PowerSchool {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    PowerSchool::from_env().expect("POWERSCHOOL_* environment variables must be set")
}

#[tokio::test]
#[ignore] // Run with: cargo test --test integration_tests -- --ignored
async fn test_metadata() {
    let ps = live_client();

    let metadata = ps.metadata().await.expect("failed to fetch metadata");

    assert!(metadata.is_object(), "expected metadata object, got {}", metadata);
    println!("Metadata test passed: {}", metadata);
}

#[tokio::test]
#[ignore]
async fn test_current_district() {
    let ps = live_client();

    let district = ps
        .current_district(None)
        .await
        .expect("failed to fetch current district");

    assert!(district.get("name").is_some(), "district has no name: {}", district);
    println!("District test passed: {}", district["name"]);
}

#[tokio::test]
#[ignore]
async fn test_schools_match_count() {
    let ps = live_client();

    let count = ps
        .resource_count("ws/v1/district/school", &QueryOptions::new())
        .await
        .expect("failed to count schools");
    let schools = ps
        .schools_in_district(None)
        .await
        .expect("failed to fetch schools");

    assert!(
        schools.len() as u64 >= count,
        "expected at least {} schools, got {}",
        count,
        schools.len()
    );
    println!("Schools test passed: {} schools", schools.len());
}

#[tokio::test]
#[ignore]
async fn test_token_is_cached() {
    let ps = live_client();

    let first = ps.access_token().await.expect("failed to obtain token");
    assert!(!ps.is_token_expired().await);
    let second = ps.access_token().await.expect("failed to reuse token");

    assert_eq!(first, second, "token should be reused within its lifetime");
}

#[tokio::test]
#[ignore]
async fn test_unknown_power_query() {
    let ps = live_client();

    let result = ps
        .power_query("ws/schema/query/com.example.does.not.exist", None)
        .await;

    match result {
        Err(RestError::Api { message, .. }) => println!("Unknown PowerQuery rejected: {}", message),
        Err(RestError::Http { status, .. }) => println!("Unknown PowerQuery rejected: {}", status),
        other => panic!("expected an error for an unknown PowerQuery, got {:?}", other),
    }
}
