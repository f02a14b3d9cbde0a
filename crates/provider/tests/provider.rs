//! End-to-end provider operations against a mocked VCD endpoint

use serde_json::json;
use vcd_provider::state::{make_state, DynamicValue};
use vcd_provider::{ProviderConfig, Registry, VcdProvider};
use vcd_sdk::client::ACCESS_TOKEN_HEADER;
use vcd_sdk::{ClientConfig, Credentials, VcdClient};
use wiremock::matchers::{basic_auth, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PEM: &str = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";
const CERT_ID: &str = "urn:vcloud:certificateLibraryItem:5e1a";
const ORG_ID: &str = "urn:vcloud:org:7";

fn provider(server: &MockServer) -> VcdProvider {
    let config = ClientConfig::new(
        server.uri(),
        "System",
        Credentials::Token("test-token".to_string()),
    );
    VcdProvider::with_client(Registry::builtin(), VcdClient::new(config).unwrap())
}

fn certificate_body(alias: &str) -> serde_json::Value {
    json!({
        "id": CERT_ID,
        "alias": alias,
        "certificate": PEM
    })
}

fn org_body(enabled: bool) -> serde_json::Value {
    json!({
        "id": ORG_ID,
        "name": "tenant1",
        "displayName": "Tenant One",
        "isEnabled": enabled,
        "canManageOrgs": false,
        "managedBy": { "name": "System", "id": "urn:vcloud:org:1" }
    })
}

fn attr<'a>(state: &'a DynamicValue, key: &str) -> Option<&'a str> {
    state.get(key).and_then(|v| v.as_string())
}

#[tokio::test]
async fn test_configure_logs_in_with_password() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cloudapi/1.0.0/sessions/provider"))
        .and(basic_auth("admin@System", "secret"))
        .respond_with(ResponseTemplate::new(200).insert_header(ACCESS_TOKEN_HEADER, "session"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = VcdProvider::new(Registry::builtin(), ProviderConfig::default());
    let diags = provider
        .configure_provider(&make_state(vec![
            ("url", format!("{}/api", server.uri()).into()),
            ("user", "admin".into()),
            ("password", "secret".into()),
        ]))
        .await;

    assert!(diags.is_empty(), "{:?}", diags);
}

#[tokio::test]
async fn test_configure_reports_login_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cloudapi/1.0.0/sessions"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let provider = VcdProvider::new(Registry::builtin(), ProviderConfig::default());
    let diags = provider
        .configure_provider(&make_state(vec![
            ("url", server.uri().into()),
            ("org", "tenant1".into()),
            ("user", "admin".into()),
            ("password", "wrong".into()),
        ]))
        .await;

    assert_eq!(diags.len(), 1);
    assert!(diags[0].detail.contains("login returned 401"));
}

#[tokio::test]
async fn test_create_certificate_then_reads_back() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cloudapi/1.0.0/ssl/certificateLibrary"))
        .and(body_partial_json(json!({ "alias": "cert1", "certificate": PEM })))
        .respond_with(ResponseTemplate::new(201).set_body_json(certificate_body("cert1")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/cloudapi/1.0.0/ssl/certificateLibrary/{}", CERT_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(certificate_body("cert1")))
        .expect(1)
        .mount(&server)
        .await;

    let planned = make_state(vec![
        ("alias", "cert1".into()),
        ("certificate", PEM.into()),
        ("private_key", DynamicValue::Null),
    ]);
    let response = provider(&server)
        .apply_resource_change("vcd_library_certificate", &DynamicValue::Null, &planned)
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert_eq!(attr(&response.new_state, "id"), Some(CERT_ID));
    assert_eq!(attr(&response.new_state, "alias"), Some("cert1"));
}

#[tokio::test]
async fn test_create_failure_leaves_no_state() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cloudapi/1.0.0/ssl/certificateLibrary"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "minorErrorCode": "BAD_REQUEST",
            "message": "certificate is malformed"
        })))
        .mount(&server)
        .await;

    let planned = make_state(vec![("alias", "cert1".into()), ("certificate", PEM.into())]);
    let response = provider(&server)
        .apply_resource_change("vcd_library_certificate", &DynamicValue::Null, &planned)
        .await;

    assert!(response.new_state.is_null());
    assert_eq!(response.diagnostics.len(), 1);
    assert_eq!(
        response.diagnostics[0].detail,
        "error creating certificate library item: API error 400: certificate is malformed (BAD_REQUEST)"
    );
}

#[tokio::test]
async fn test_read_of_deleted_entity_drops_state() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/cloudapi/1.0.0/orgs/{}", ORG_ID)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let response = provider(&server)
        .read_resource("vcd_tm_org", &make_state(vec![("id", ORG_ID.into())]))
        .await;

    assert!(response.diagnostics.is_empty());
    assert!(response.new_state.is_null());
}

#[tokio::test]
async fn test_update_org_carries_managed_by() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/cloudapi/1.0.0/orgs/{}", ORG_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(org_body(true)))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(format!("/cloudapi/1.0.0/orgs/{}", ORG_ID)))
        .and(body_partial_json(json!({
            "id": ORG_ID,
            "displayName": "Renamed",
            "managedBy": { "id": "urn:vcloud:org:1" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(org_body(true)))
        .expect(1)
        .mount(&server)
        .await;

    let prior = make_state(vec![
        ("id", ORG_ID.into()),
        ("name", "tenant1".into()),
        ("display_name", "Tenant One".into()),
    ]);
    let planned = make_state(vec![
        ("id", ORG_ID.into()),
        ("name", "tenant1".into()),
        ("display_name", "Renamed".into()),
    ]);
    let response = provider(&server)
        .apply_resource_change("vcd_tm_org", &prior, &planned)
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert_eq!(attr(&response.new_state, "managed_by_name"), Some("System"));
}

#[tokio::test]
async fn test_update_without_id_is_rejected() {
    let server = MockServer::start().await;

    let prior = make_state(vec![("id", ORG_ID.into()), ("name", "tenant1".into())]);
    let planned = make_state(vec![("name", "tenant1".into())]);
    let response = provider(&server)
        .apply_resource_change("vcd_tm_org", &prior, &planned)
        .await;

    assert_eq!(response.diagnostics[0].detail, "empty id for updating TM Organization");
    assert_eq!(response.new_state, prior);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_delete_disables_enabled_org_first() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/cloudapi/1.0.0/orgs/{}", ORG_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(org_body(true)))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(format!("/cloudapi/1.0.0/orgs/{}", ORG_ID)))
        .and(body_partial_json(json!({ "isEnabled": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(org_body(false)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(format!("/cloudapi/1.0.0/orgs/{}", ORG_ID)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let prior = make_state(vec![("id", ORG_ID.into()), ("name", "tenant1".into())]);
    let response = provider(&server)
        .apply_resource_change("vcd_tm_org", &prior, &DynamicValue::Null)
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert!(response.new_state.is_null());
}

#[tokio::test]
async fn test_delete_skips_disable_for_disabled_org() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/cloudapi/1.0.0/orgs/{}", ORG_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(org_body(false)))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(format!("/cloudapi/1.0.0/orgs/{}", ORG_ID)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let prior = make_state(vec![("id", ORG_ID.into())]);
    let response = provider(&server)
        .apply_resource_change("vcd_tm_org", &prior, &DynamicValue::Null)
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
}

#[tokio::test]
async fn test_import_reads_entity() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/cloudapi/1.0.0/orgs/{}", ORG_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(org_body(true)))
        .mount(&server)
        .await;

    let response = provider(&server).import_resource_state("vcd_tm_org", ORG_ID).await;

    assert!(response.diagnostics.is_empty());
    assert_eq!(attr(&response.new_state, "display_name"), Some("Tenant One"));
}

#[tokio::test]
async fn test_import_of_missing_entity_fails() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let response = provider(&server).import_resource_state("vcd_tm_org", ORG_ID).await;

    assert!(response.new_state.is_null());
    assert_eq!(response.diagnostics.len(), 1);
}

#[tokio::test]
async fn test_certificate_data_source_looks_up_by_alias() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cloudapi/1.0.0/ssl/certificateLibrary"))
        .and(query_param("filter", "alias==web"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pageCount": 1,
            "values": [certificate_body("web")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = provider(&server)
        .read_data_source("vcd_library_certificate", &make_state(vec![("alias", "web".into())]))
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert_eq!(attr(&response.new_state, "id"), Some(CERT_ID));
}

#[tokio::test]
async fn test_vcenter_data_source_reports_missing_name() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cloudapi/1.0.0/virtualCenters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pageCount": 1,
            "values": []
        })))
        .mount(&server)
        .await;

    let response = provider(&server)
        .read_data_source("vcd_tm_vcenter", &make_state(vec![("name", "vc9".into())]))
        .await;

    assert!(response.new_state.is_null());
    assert!(response.diagnostics[0]
        .detail
        .starts_with("error getting vCenter server by name 'vc9'"));
}

#[tokio::test]
async fn test_resource_list_names_orgs() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cloudapi/1.0.0/orgs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pageCount": 1,
            "values": [
                { "name": "zeta", "displayName": "Z" },
                { "name": "alpha", "displayName": "A" }
            ]
        })))
        .mount(&server)
        .await;

    let response = provider(&server)
        .read_data_source(
            "vcd_resource_list",
            &make_state(vec![
                ("name", "orgs".into()),
                ("resource_type", "vcd_tm_org".into()),
            ]),
        )
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    let list: Vec<&str> = response
        .new_state
        .get("list")
        .and_then(|v| v.as_list())
        .unwrap()
        .iter()
        .filter_map(|v| v.as_string())
        .collect();
    assert_eq!(list, vec!["alpha", "zeta"]);
}

#[tokio::test]
async fn test_read_of_forbidden_vcenter_drops_state() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cloudapi/1.0.0/virtualCenters/urn:vcloud:vimserver:gone"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "minorErrorCode": "ACCESS_TO_RESOURCE_IS_FORBIDDEN",
            "message": "the target entity is invalid"
        })))
        .mount(&server)
        .await;

    let state = make_state(vec![("id", "urn:vcloud:vimserver:gone".into())]);
    let response = provider(&server).read_resource("vcd_tm_vcenter", &state).await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert!(response.new_state.is_null());
}

#[tokio::test]
async fn test_vcenter_create_waits_for_task() {
    let server = MockServer::start().await;
    let vc_id = "urn:vcloud:vimserver:0b1c";
    let vcenter = json!({
        "vcId": vc_id,
        "name": "vc1",
        "username": "administrator@vsphere.local",
        "url": "https://vc1.example.com",
        "isEnabled": true
    });

    Mock::given(method("POST"))
        .and(path("/cloudapi/1.0.0/virtualCenters"))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("Location", format!("{}/api/task/t1", server.uri()).as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/task/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cloudapi/1.0.0/virtualCenters"))
        .and(query_param("filter", "name==vc1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pageCount": 1,
            "values": [vcenter.clone()]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/cloudapi/1.0.0/virtualCenters/{}", vc_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(vcenter))
        .mount(&server)
        .await;

    let planned = make_state(vec![
        ("name", "vc1".into()),
        ("url", "https://vc1.example.com".into()),
        ("username", "administrator@vsphere.local".into()),
        ("password", "secret".into()),
        ("is_enabled", true.into()),
    ]);
    let response = provider(&server)
        .apply_resource_change("vcd_tm_vcenter", &DynamicValue::Null, &planned)
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert_eq!(attr(&response.new_state, "id"), Some(vc_id));
}

#[tokio::test]
async fn test_vcenter_auto_trust_failure_aborts_create() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cloudapi/1.0.0/testConnection"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/cloudapi/1.0.0/virtualCenters"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let planned = make_state(vec![
        ("name", "vc1".into()),
        ("url", "https://vc1.example.com".into()),
        ("username", "administrator@vsphere.local".into()),
        ("password", "secret".into()),
        ("auto_trust_certificate", true.into()),
    ]);
    let response = provider(&server)
        .apply_resource_change("vcd_tm_vcenter", &DynamicValue::Null, &planned)
        .await;

    assert!(response.new_state.is_null());
    assert!(response.diagnostics[0]
        .detail
        .starts_with("error executing pre-create vCenter server hooks"));
}

#[tokio::test]
async fn test_vcenter_refresh_on_read() {
    let server = MockServer::start().await;
    let vc_id = "urn:vcloud:vimserver:0b1c";

    Mock::given(method("GET"))
        .and(path(format!("/cloudapi/1.0.0/virtualCenters/{}", vc_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "vcId": vc_id,
            "name": "vc1",
            "username": "administrator@vsphere.local",
            "url": "https://vc1.example.com",
            "isEnabled": true
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/admin/extension/vimServer/0b1c/action/refresh"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let state = make_state(vec![
        ("id", vc_id.into()),
        ("password", "secret".into()),
        ("refresh_vcenter_on_read", true.into()),
    ]);
    let response = provider(&server).read_resource("vcd_tm_vcenter", &state).await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert_eq!(attr(&response.new_state, "password"), Some("secret"));
}
