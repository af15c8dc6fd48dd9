//! Firestore backend against a mocked REST endpoint.

use ecoearn_core::{
    Activation, ActivationError, Backend, BinId, BinStore, Deactivation, DeactivationPolicy,
    EcoEarnService, LedgerStore, Occupancy, OccupancyLog, StatsSource, Transition, UserId,
};
use ecoearn_store_firestore::{FirestoreConfig, backend};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ROOT: &str = "/v1/projects/ecoearn-test/databases/(default)/documents";
const UPDATED: &str = "2025-05-01T10:00:00.000001Z";

fn backend_for(server: &MockServer) -> Backend {
    let mut config = FirestoreConfig::new("ecoearn-test");
    config.base_url = format!("{}/v1", server.uri());
    backend(reqwest::Client::new(), config)
}

fn bin_document(status: &str, user: Option<&str>) -> serde_json::Value {
    json!({
        "name": "projects/ecoearn-test/databases/(default)/documents/bins/b1",
        "fields": {
            "name": { "stringValue": "Plaza" },
            "status": { "stringValue": status },
            "currentUser": user.map_or_else(|| json!({ "nullValue": null }), |user| json!({ "stringValue": user })),
            "level": { "integerValue": "10" }
        },
        "updateTime": UPDATED
    })
}

async fn mount_bin(server: &MockServer, status: &str, user: Option<&str>) {
    Mock::given(method("GET"))
        .and(path(format!("{ROOT}/bins/b1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(bin_document(status, user)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn get_maps_document_and_missing_is_none() {
    let server = MockServer::start().await;
    mount_bin(&server, "active", Some("u1")).await;
    Mock::given(method("GET"))
        .and(path(format!("{ROOT}/bins/ghost")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": 404, "message": "not found", "status": "NOT_FOUND" }
        })))
        .mount(&server)
        .await;
    let backend = backend_for(&server);

    let bin = backend
        .bins
        .get(&BinId::from("b1"))
        .await
        .expect("request succeeds")
        .expect("bin exists");
    assert_eq!(bin.name, "Plaza", "name");
    assert_eq!(bin.occupancy, Occupancy::held_by(UserId::from("u1")), "occupant");

    let missing = backend.bins.get(&BinId::from("ghost")).await.expect("request succeeds");
    assert!(missing.is_none(), "404 maps to None");
}

#[tokio::test]
async fn activation_writes_with_update_time_precondition() {
    let server = MockServer::start().await;
    mount_bin(&server, "inactive", None).await;
    Mock::given(method("PATCH"))
        .and(path(format!("{ROOT}/bins/b1")))
        .and(query_param("currentDocument.updateTime", UPDATED))
        .and(query_param("updateMask.fieldPaths", "status"))
        .and(body_partial_json(json!({
            "fields": {
                "status": { "stringValue": "active" },
                "currentUser": { "stringValue": "u2" }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(bin_document("active", Some("u2"))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{ROOT}/bin_events")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/ecoearn-test/databases/(default)/documents/bin_events/e1"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let service = EcoEarnService::new(backend_for(&server), DeactivationPolicy::OccupantOnly);

    let outcome = service
        .activate(&BinId::from("b1"), &UserId::from("u2"))
        .await
        .expect("activation succeeds");

    assert_eq!(outcome, Activation::Activated, "bin claimed");
}

#[tokio::test]
async fn release_clears_occupant_with_update_time_precondition() {
    let server = MockServer::start().await;
    mount_bin(&server, "active", Some("u1")).await;
    Mock::given(method("PATCH"))
        .and(path(format!("{ROOT}/bins/b1")))
        .and(query_param("currentDocument.updateTime", UPDATED))
        .and(query_param("updateMask.fieldPaths", "currentUser"))
        .and(body_partial_json(json!({
            "fields": {
                "status": { "stringValue": "inactive" },
                "currentUser": { "nullValue": null }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(bin_document("inactive", None)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{ROOT}/bin_events")))
        .and(body_partial_json(json!({
            "fields": {
                "binId": { "stringValue": "b1" },
                "userId": { "stringValue": "u1" },
                "transition": { "stringValue": "deactivated" }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/ecoearn-test/databases/(default)/documents/bin_events/e2"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let service = EcoEarnService::new(backend_for(&server), DeactivationPolicy::OccupantOnly);

    let outcome = service
        .deactivate(&BinId::from("b1"), &UserId::from("u1"))
        .await
        .expect("release succeeds");

    assert_eq!(outcome, Deactivation::Deactivated, "bin released");
}

#[tokio::test]
async fn history_queries_events_of_one_bin() {
    let server = MockServer::start().await;
    let event = |id: &str, transition: &str, at: &str| {
        json!({
            "document": {
                "name": format!("projects/ecoearn-test/databases/(default)/documents/bin_events/{id}"),
                "fields": {
                    "binId": { "stringValue": "b1" },
                    "userId": { "stringValue": "u1" },
                    "transition": { "stringValue": transition },
                    "timestamp": { "timestampValue": at }
                }
            },
            "readTime": "2025-05-02T00:00:00Z"
        })
    };
    Mock::given(method("POST"))
        .and(path(format!("{ROOT}:runQuery")))
        .and(body_json(json!({
            "structuredQuery": {
                "from": [{ "collectionId": "bin_events" }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": "binId" },
                        "op": "EQUAL",
                        "value": { "stringValue": "b1" }
                    }
                },
                "orderBy": [{ "field": { "fieldPath": "timestamp" }, "direction": "ASCENDING" }]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            event("e1", "activated", "2025-05-01T08:00:00Z"),
            event("e2", "deactivated", "2025-05-01T09:00:00Z"),
            { "readTime": "2025-05-02T00:00:00Z" }
        ])))
        .expect(1)
        .mount(&server)
        .await;
    let backend = backend_for(&server);

    let history = backend
        .occupancy_log
        .history(&BinId::from("b1"))
        .await
        .expect("query succeeds");

    let transitions: Vec<Transition> = history.iter().map(|event| event.transition).collect();
    assert_eq!(
        transitions,
        [Transition::Activated, Transition::Deactivated],
        "events in order, empty results skipped"
    );
}

#[tokio::test]
async fn stale_update_time_surfaces_as_conflict() {
    let server = MockServer::start().await;
    mount_bin(&server, "inactive", None).await;
    Mock::given(method("PATCH"))
        .and(path(format!("{ROOT}/bins/b1")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "the stored version does not match the required base version",
                "status": "FAILED_PRECONDITION"
            }
        })))
        .mount(&server)
        .await;
    let service = EcoEarnService::new(backend_for(&server), DeactivationPolicy::OccupantOnly);

    let outcome = service
        .activate(&BinId::from("b1"), &UserId::from("u2"))
        .await;

    assert!(
        matches!(outcome, Err(ActivationError::Conflict)),
        "lost write reported, got {outcome:?}"
    );
}

#[tokio::test]
async fn list_follows_page_tokens() {
    let server = MockServer::start().await;
    let user = |id: &str, status: &str| {
        json!({
            "name": format!("projects/ecoearn-test/databases/(default)/documents/users/{id}"),
            "fields": { "name": { "stringValue": id }, "status": { "stringValue": status } }
        })
    };
    Mock::given(method("GET"))
        .and(path(format!("{ROOT}/users")))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [user("a", "active"), user("b", "inactive")],
            "nextPageToken": "page-2"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{ROOT}/users")))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [user("c", "active")]
        })))
        .mount(&server)
        .await;
    let backend = backend_for(&server);

    let users = backend.stats.users().await.expect("users");

    let ids: Vec<&str> = users.iter().map(|user| user.id.as_str()).collect();
    assert_eq!(ids, ["a", "b", "c"], "both pages read");
}

#[tokio::test]
async fn ledger_append_returns_stored_entry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{ROOT}/admin_transactions")))
        .and(body_partial_json(json!({
            "fields": { "type": { "stringValue": "add" }, "amount": { "doubleValue": 1500.0 } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/ecoearn-test/databases/(default)/documents/admin_transactions/tx9",
            "fields": {
                "type": { "stringValue": "add" },
                "amount": { "doubleValue": 1500.0 },
                "description": { "stringValue": "Sponsor" },
                "timestamp": { "timestampValue": "2025-05-01T10:00:00Z" }
            }
        })))
        .mount(&server)
        .await;
    let service = EcoEarnService::new(backend_for(&server), DeactivationPolicy::OccupantOnly);

    let entry = service.add_funds("1,500", "Sponsor").await.expect("append");

    assert_eq!(entry.id.as_str(), "tx9", "server-assigned id");
    assert_eq!(entry.amount, rust_decimal::Decimal::from(1500), "amount");
}

#[tokio::test]
async fn ledger_list_rejects_unknown_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{ROOT}/admin_transactions")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [{
                "name": "projects/ecoearn-test/databases/(default)/documents/admin_transactions/t1",
                "fields": {
                    "type": { "stringValue": "refund" },
                    "amount": { "doubleValue": 1.0 },
                    "timestamp": { "timestampValue": "2025-05-01T10:00:00Z" }
                }
            }]
        })))
        .mount(&server)
        .await;
    let backend = backend_for(&server);

    assert!(
        matches!(
            backend.ledger.list().await,
            Err(ecoearn_core::StoreError::Decode { .. })
        ),
        "unknown type is a decode error"
    );
}
