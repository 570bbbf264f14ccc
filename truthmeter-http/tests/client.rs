use serde_json::{json, Value};
use std::time::Duration;
use truthmeter_http::{Auth, HttpClient, HttpError, RequestOpts};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn posts_json_with_header_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-test"))
        .and(body_json(json!({"hello": "world"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let got: Value = client
        .post_json(
            "v1/messages",
            &json!({"hello": "world"}),
            RequestOpts {
                auth: Some(Auth::Header {
                    name: "x-api-key",
                    value: "sk-test",
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(got, json!({"ok": true}));
}

#[tokio::test]
async fn query_auth_is_sent_as_parameter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .and(query_param("key", "AIza-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&format!("{}/v1beta", server.uri())).unwrap();
    let got: Value = client
        .get_json(
            "models",
            RequestOpts {
                auth: Some(Auth::Query {
                    name: "key",
                    value: "AIza-test",
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(got, json!([]));
}

#[tokio::test]
async fn non_success_is_not_retried_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({"error": {"message": "upstream exploded"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let err = client
        .post_json::<_, Value>("x", &json!({}), RequestOpts::default())
        .await
        .unwrap_err();
    match err {
        HttpError::Api {
            status, message, ..
        } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(message, "upstream exploded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn retry_budget_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap().with_retries(2);
    let err = client
        .post_json::<_, Value>("x", &json!({}), RequestOpts::default())
        .await
        .unwrap_err();
    assert_eq!(err.status().map(|s| s.as_u16()), Some(503));
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri())
        .unwrap()
        .with_timeout(Duration::from_millis(50));
    let err = client
        .post_json::<_, Value>("x", &json!({}), RequestOpts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn non_json_success_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let err = client
        .post_json::<_, Value>("x", &json!({}), RequestOpts::default())
        .await
        .unwrap_err();
    match err {
        HttpError::Decode(_, snippet) => assert!(snippet.contains("oops")),
        other => panic!("unexpected error: {other:?}"),
    }
}
