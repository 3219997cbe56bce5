//! Running-application snapshot against a mocked ResourceManager

use flink_sd::error::SdError;
use flink_sd::yarn::{fetch_running_snapshot, ApplicationFilter};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::{mount_app_list, mount_yarn_app, yarn_client, FlinkApp};

fn flink_filter() -> ApplicationFilter {
    ApplicationFilter::new(Some("Apache Flink"), None).unwrap()
}

#[tokio::test]
async fn test_null_apps_is_empty_snapshot() {
    let server = MockServer::start().await;
    mount_app_list(&server, vec![]).await;

    let snapshot = fetch_running_snapshot(&yarn_client(&server), &flink_filter())
        .await
        .unwrap();

    assert!(snapshot.is_empty());
}

#[tokio::test]
async fn test_filters_type_state_and_name() {
    let server = MockServer::start().await;
    let wanted = FlinkApp::new("app-1", "h", &["w1"]).with_attempt(3);
    let accepted = FlinkApp::new("app-2", "h", &[]);
    let spark = FlinkApp::new("app-3", "h", &[]);
    let other_name = FlinkApp::new("app-4", "h", &[]);

    let mut accepted_json = accepted.yarn_json(&server);
    accepted_json["state"] = json!("ACCEPTED");
    let mut spark_json = spark.yarn_json(&server);
    spark_json["applicationType"] = json!("SPARK");
    let mut other_json = other_name.yarn_json(&server);
    other_json["name"] = json!("nightly-flink-job");

    mount_app_list(
        &server,
        vec![wanted.yarn_json(&server), accepted_json, spark_json, other_json],
    )
    .await;
    for app in [&wanted, &accepted, &spark, &other_name] {
        mount_yarn_app(&server, app).await;
    }

    let filter = ApplicationFilter::new(Some("Apache Flink"), Some("flink-job")).unwrap();
    let snapshot = fetch_running_snapshot(&yarn_client(&server), &filter)
        .await
        .unwrap();

    let ids: Vec<&String> = snapshot.ids().collect();
    assert_eq!(ids, vec!["app-1"]);
    let app = snapshot.get("app-1").unwrap();
    assert_eq!(app.last_attempt_id, 3);
    assert_eq!(app.running_containers, Some(2));
}

#[tokio::test]
async fn test_attempt_failure_marks_unverified() {
    let server = MockServer::start().await;
    let healthy = FlinkApp::new("app-1", "h", &[]);
    let flaky = FlinkApp::new("app-2", "h", &[]);
    mount_app_list(&server, vec![healthy.yarn_json(&server), flaky.yarn_json(&server)]).await;
    mount_yarn_app(&server, &healthy).await;
    Mock::given(method("GET"))
        .and(path("/ws/v1/cluster/apps/app-2/appattempts"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let snapshot = fetch_running_snapshot(&yarn_client(&server), &flink_filter())
        .await
        .unwrap();

    assert!(snapshot.contains("app-1"));
    assert!(!snapshot.contains("app-2"));
    assert!(snapshot.unverified().contains("app-2"));
}

#[tokio::test]
async fn test_string_attempt_ids() {
    let server = MockServer::start().await;
    let app = FlinkApp::new("app-1", "h", &[]);
    mount_app_list(&server, vec![app.yarn_json(&server)]).await;
    Mock::given(method("GET"))
        .and(path("/ws/v1/cluster/apps/app-1/appattempts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "appAttempts": { "appAttempt": [{ "id": "1" }, { "id": "2" }] }
        })))
        .mount(&server)
        .await;

    let snapshot = fetch_running_snapshot(&yarn_client(&server), &flink_filter())
        .await
        .unwrap();

    assert_eq!(snapshot.get("app-1").unwrap().last_attempt_id, 2);
}

#[tokio::test]
async fn test_list_failure_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ws/v1/cluster/apps"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = fetch_running_snapshot(&yarn_client(&server), &flink_filter())
        .await
        .unwrap_err();

    assert!(matches!(err, SdError::Status { .. }));
}

#[tokio::test]
async fn test_malformed_list_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ws/v1/cluster/apps"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
        .mount(&server)
        .await;

    let err = fetch_running_snapshot(&yarn_client(&server), &flink_filter())
        .await
        .unwrap_err();

    assert!(matches!(err, SdError::Decode { .. }));
}
