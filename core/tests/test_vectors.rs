//! Verify build/parse methods against JSON test vectors stored in `test-vectors/`.
//!
//! `requests.json` pins the exact request each verb builds; `responses.json`
//! pins how each raw response is decoded or classified. Comparing parsed JSON
//! (not raw strings) avoids false negatives from field-ordering differences.

use api_core::{
    parse_response, ApiClient, ClientConfig, HttpMethod, HttpRequest, HttpResponse, Query,
    QueryValue, RequestBody, Transport, TransportError,
};
use async_trait::async_trait;
use serde_json::Value;

/// Build-only tests never reach the network.
struct Unreachable;

#[async_trait]
impl Transport for Unreachable {
    async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
        Err(TransportError::other("build-only transport"))
    }
}

fn string_pairs(value: &Value) -> Vec<(String, String)> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|pair| {
            let pair = pair.as_array().unwrap();
            (pair[0].as_str().unwrap().to_string(), pair[1].as_str().unwrap().to_string())
        })
        .collect()
}

fn query_value(value: &Value) -> QueryValue {
    match value {
        Value::Bool(b) => QueryValue::from(*b),
        Value::Number(n) if n.is_i64() => QueryValue::from(n.as_i64().unwrap()),
        Value::Number(n) => QueryValue::from(n.as_f64().unwrap()),
        Value::String(s) => QueryValue::from(s.as_str()),
        other => panic!("unsupported query value: {other}"),
    }
}

fn build(client: &ApiClient<Unreachable>, case: &Value) -> HttpRequest {
    let path = case["path"].as_str().unwrap();
    let body = (!case["body"].is_null()).then(|| &case["body"]);
    match case["method"].as_str().unwrap() {
        "GET" => {
            let query = case["query"].as_array().map(|pairs| {
                pairs.iter().fold(Query::new(), |query, pair| {
                    query.with(pair[0].as_str().unwrap(), query_value(&pair[1]))
                })
            });
            client.build_get(path, query.as_ref())
        }
        "POST" => client.build_post(path, body).unwrap(),
        "PUT" => client.build_put(path, body).unwrap(),
        "PATCH" => client.build_patch(path, body).unwrap(),
        "DELETE" => client.build_delete(path),
        other => panic!("unknown method: {other}"),
    }
}

#[test]
fn request_test_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let config = ClientConfig::new(vectors["base_url"].as_str().unwrap()).unwrap();
    let client = ApiClient::new(config, Unreachable);

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let expected = &case["expected_request"];
        let request = build(&client, case);

        assert_eq!(request.method.as_str(), case["method"].as_str().unwrap(), "{name}: method");
        assert!(matches!(
            request.method,
            HttpMethod::Get | HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch | HttpMethod::Delete
        ));
        assert_eq!(request.url, expected["url"].as_str().unwrap(), "{name}: url");
        assert_eq!(request.query, string_pairs(&expected["query"]), "{name}: query");
        assert_eq!(request.headers, string_pairs(&expected["headers"]), "{name}: headers");
        assert!(request.on_upload_progress.is_none(), "{name}: progress");

        match (&request.body, &expected["body"]) {
            (None, Value::Null) => {}
            (Some(RequestBody::Json(json)), body) => {
                let sent: Value = serde_json::from_str(json).unwrap();
                assert_eq!(&sent, body, "{name}: body");
            }
            (actual, body) => panic!("{name}: body mismatch, built {actual:?}, expected {body}"),
        }
    }
}

#[test]
fn response_test_vectors() {
    let raw = include_str!("../../test-vectors/responses.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let response = HttpResponse::new(
            case["response"]["status"].as_u64().unwrap() as u16,
            case["response"]["body"].as_str().unwrap().to_string(),
        );
        let result = parse_response::<Value>(response);

        match case.get("expected_error") {
            Some(expected) => {
                let err = result.unwrap_err();
                assert_eq!(err.kind().to_string(), expected["kind"].as_str().unwrap(), "{name}: kind");
                if let Some(status) = expected.get("status") {
                    assert_eq!(err.status().map(u64::from), status.as_u64(), "{name}: status");
                }
                if let Some(body) = expected.get("body") {
                    assert_eq!(err.body().unwrap_or(&Value::Null), body, "{name}: error body");
                }
            }
            None => {
                let value = result.unwrap();
                assert_eq!(value, case["expected_result"], "{name}: parsed result");
            }
        }
    }
}
