use std::sync::{Arc, Once};

use evernote_core::AuthState;
use evernote_engine::{
    AuthorizationFlow, ConsumerCredentials, HttpSettings, MemoryPreferenceStore, OAuthError,
    PortfolioError, PreferenceStore, ReqwestOAuthClient, ServiceEndpoints,
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER: &str = "7";
const CALLBACK: &str = "https://moodle.example/portfolio/add.php?postcontrol=1&type=evernote";
const FORM: &str = "application/x-www-form-urlencoded";

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(portfolio_logging::initialize_for_tests);
}

fn flow_for(
    server: &MockServer,
    consumer: ConsumerCredentials,
) -> (AuthorizationFlow, Arc<MemoryPreferenceStore>) {
    let preferences = Arc::new(MemoryPreferenceStore::new());
    let oauth = ReqwestOAuthClient::new(
        ServiceEndpoints::from_api_root(&server.uri()),
        &HttpSettings::default(),
    )
    .unwrap();
    let flow = AuthorizationFlow::new(USER, consumer, preferences.clone(), Arc::new(oauth));
    (flow, preferences)
}

fn consumer() -> ConsumerCredentials {
    ConsumerCredentials::new("moodle-key", "moodle-secret")
}

fn pref(store: &MemoryPreferenceStore, field: &str) -> Option<String> {
    store.get(USER, &format!("evernote_{field}")).unwrap()
}

async fn mount_request_token(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/oauth"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "oauth_token=req-token&oauth_token_secret=req-secret&oauth_callback_confirmed=true",
            FORM,
        ))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn begin_stores_secret_clears_token_and_redirects() {
    init_logging();
    let server = MockServer::start().await;
    mount_request_token(&server).await;
    let (flow, store) = flow_for(&server, consumer());
    store.set(USER, "evernote_accesstoken", "stale").unwrap();

    let request = flow.begin_authorization(CALLBACK).await.unwrap();

    assert!(request.redirect_required);
    assert_eq!(
        request.authorize_url,
        format!("{}/OAuth.action?oauth_token=req-token", server.uri())
    );
    assert_eq!(request.oauth_token_secret, "req-secret");
    assert_eq!(pref(&store, "tokensecret").as_deref(), Some("req-secret"));
    assert_eq!(pref(&store, "accesstoken"), None);
    assert_eq!(flow.state().unwrap(), AuthState::AwaitingUserApproval);

    let requests = server.received_requests().await.unwrap();
    let header = requests[0]
        .headers
        .get("authorization")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(header.starts_with("OAuth "));
    assert!(header.contains(r#"oauth_consumer_key="moodle-key""#));
    assert!(header.contains(r#"oauth_signature_method="HMAC-SHA1""#));
    assert!(header.contains("oauth_callback="));
}

#[tokio::test]
async fn begin_keeps_a_pending_secret() {
    init_logging();
    let server = MockServer::start().await;
    mount_request_token(&server).await;
    let (flow, store) = flow_for(&server, consumer());
    store.set(USER, "evernote_tokensecret", "earlier").unwrap();

    let request = flow.begin_authorization(CALLBACK).await.unwrap();

    assert!(!request.redirect_required);
    assert_eq!(pref(&store, "tokensecret").as_deref(), Some("earlier"));
}

#[tokio::test]
async fn begin_without_consumer_credentials_never_calls_out() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oauth"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    for consumer in [
        ConsumerCredentials::new("", "secret"),
        ConsumerCredentials::new("key", "  "),
    ] {
        let (flow, store) = flow_for(&server, consumer);
        let err = flow.begin_authorization(CALLBACK).await.unwrap_err();
        assert!(matches!(err, PortfolioError::Configuration));
        assert_eq!(pref(&store, "tokensecret"), None);
    }
}

#[tokio::test]
async fn empty_verifier_denies_without_exchanging() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let (flow, store) = flow_for(&server, consumer());
    store.set(USER, "evernote_tokensecret", "req-secret").unwrap();

    let err = flow
        .complete_authorization("req-token", "")
        .await
        .unwrap_err();

    assert!(matches!(err, PortfolioError::AuthorizationDenied));
    assert_eq!(pref(&store, "tokensecret"), None);
    assert_eq!(flow.state().unwrap(), AuthState::Unauthenticated);
}

#[tokio::test]
async fn verifier_is_exchanged_for_a_stored_credential() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "oauth_token=S%3Ds1%3AU%3D2a&oauth_token_secret=&edam_shard=s1&edam_userId=42\
             &edam_expires=1700000000000&edam_noteStoreUrl=https%3A%2F%2Fsandbox.evernote.com%2Fshard%2Fs1%2Fnotestore",
            FORM,
        ))
        .expect(1)
        .mount(&server)
        .await;
    let (flow, store) = flow_for(&server, consumer());
    store.set(USER, "evernote_tokensecret", "req-secret").unwrap();

    let credential = flow
        .complete_authorization("req-token", "verifier")
        .await
        .unwrap();

    assert_eq!(credential.access_token, "S=s1:U=2a");
    assert_eq!(credential.user_id, "42");
    assert_eq!(credential.token_secret, None);
    assert_eq!(pref(&store, "accesstoken").as_deref(), Some("S=s1:U=2a"));
    assert_eq!(
        pref(&store, "notestoreurl").as_deref(),
        Some("https://sandbox.evernote.com/shard/s1/notestore")
    );
    assert_eq!(pref(&store, "userid").as_deref(), Some("42"));
    assert_eq!(pref(&store, "tokensecret"), None);
    assert_eq!(flow.state().unwrap(), AuthState::Authenticated);
    assert_eq!(flow.current_credential().unwrap(), Some(credential));

    let requests = server.received_requests().await.unwrap();
    let header = requests[0]
        .headers
        .get("authorization")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(header.contains(r#"oauth_token="req-token""#));
    assert!(header.contains(r#"oauth_verifier="verifier""#));
}

#[tokio::test]
async fn malformed_access_response_is_a_denial() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("oauth_token=abc&edam_userId=42", FORM),
        )
        .mount(&server)
        .await;
    let (flow, store) = flow_for(&server, consumer());
    store.set(USER, "evernote_tokensecret", "req-secret").unwrap();

    let err = flow
        .complete_authorization("req-token", "verifier")
        .await
        .unwrap_err();

    assert!(matches!(err, PortfolioError::AuthorizationDenied));
    assert_eq!(pref(&store, "tokensecret"), None);
    assert_eq!(pref(&store, "accesstoken"), None);
    assert_eq!(flow.current_credential().unwrap(), None);
}

#[tokio::test]
async fn http_failure_surfaces_and_clears_the_secret() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let (flow, store) = flow_for(&server, consumer());
    store.set(USER, "evernote_tokensecret", "req-secret").unwrap();

    let err = flow
        .complete_authorization("req-token", "verifier")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PortfolioError::OAuth(OAuthError::HttpStatus(401))
    ));
    assert_eq!(pref(&store, "tokensecret"), None);
}

#[tokio::test]
async fn reset_clears_every_field() {
    init_logging();
    let server = MockServer::start().await;
    let (flow, store) = flow_for(&server, consumer());
    for (field, value) in [
        ("tokensecret", "s"),
        ("accesstoken", "t"),
        ("notestoreurl", "https://sandbox.evernote.com/shard/s1/notestore"),
        ("userid", "42"),
    ] {
        store.set(USER, &format!("evernote_{field}"), value).unwrap();
    }
    assert_eq!(flow.state().unwrap(), AuthState::Authenticated);

    flow.reset_credential().unwrap();

    for field in ["tokensecret", "accesstoken", "notestoreurl", "userid"] {
        assert_eq!(pref(&store, field), None, "{field} survived");
    }
    assert_eq!(flow.state().unwrap(), AuthState::Unauthenticated);
}
