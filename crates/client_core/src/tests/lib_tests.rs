use std::{collections::HashMap, sync::Mutex};

use super::*;
use crate::{
    actions::{ActionError, ActionRequest},
    navigation::Route,
    views::LoanDetailView,
};
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::Role;
use tokio::net::TcpListener;

#[derive(Debug, Clone, PartialEq)]
struct Recorded {
    route: String,
    bearer: Option<String>,
    query: HashMap<String, String>,
    body: Option<Value>,
}

#[derive(Clone, Default)]
struct Backend {
    requests: Arc<Mutex<Vec<Recorded>>>,
    loan_status: Arc<Mutex<String>>,
    refuse_reject: Arc<Mutex<bool>>,
}

impl Backend {
    fn record(
        &self,
        route: impl Into<String>,
        headers: &HeaderMap,
        query: HashMap<String, String>,
        body: Option<Value>,
    ) {
        let bearer = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_string);
        self.requests.lock().expect("lock").push(Recorded {
            route: route.into(),
            bearer,
            query,
            body,
        });
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().expect("lock").clone()
    }

    fn routes(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.route).collect()
    }
}

fn user_json(id: &str, role: &str) -> Value {
    json!({
        "_id": id,
        "firstName": "Temuulen",
        "lastName": "Gan",
        "phone": "99001122",
        "role": role,
        "isActive": true,
        "isVerified": true
    })
}

fn expired_or<T: Serialize>(headers: &HeaderMap, data: T) -> (StatusCode, Json<Value>) {
    let expired = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.ends_with("expired-token"));
    if expired {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"success": false, "message": "Token expired"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"success": true, "data": data})),
    )
}

async fn login(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    backend.record("POST /auth/login", &headers, HashMap::new(), Some(body.clone()));
    let role = if body["phone"] == "88888888" { "user" } else { "admin" };
    Json(json!({
        "success": true,
        "data": {"token": "token-abc", "user": user_json("admin-1", role)}
    }))
}

async fn me(State(backend): State<Backend>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    backend.record("GET /auth/me", &headers, HashMap::new(), None);
    expired_or(&headers, json!({"user": user_json("admin-1", "admin")}))
}

async fn dashboard(
    State(backend): State<Backend>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    backend.record("GET /admin/dashboard", &headers, HashMap::new(), None);
    expired_or(
        &headers,
        json!({
            "users": {"total": 12, "active": 10, "verified": 7},
            "loans": {
                "total": 5, "pending": 2, "active": 1, "disbursed": 1, "paid": 1, "overdue": 0
            },
            "wallets": {"totalBalance": 1250000.0},
            "withdrawals": {"pending": 3}
        }),
    )
}

async fn pending_verification(
    State(backend): State<Backend>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    backend.record(
        "GET /admin/loans/pending-verification",
        &headers,
        HashMap::new(),
        None,
    );
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"success": false, "message": "Verification queue is locked for audit"})),
    )
}

async fn all_withdrawals(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    backend.record("GET /withdrawals/admin/all", &headers, query, None);
    expired_or(
        &headers,
        json!({
            "withdrawals": [{
                "_id": "w-1",
                "user": {
                    "_id": "u-2", "firstName": "Nomin", "lastName": "Bat", "phone": "95950000"
                },
                "amount": 40000,
                "fee": 400,
                "totalAmount": 40400,
                "status": "pending"
            }],
            "pagination": {"page": 2, "pages": 2, "total": 11}
        }),
    )
}

async fn loan_detail(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    backend.record(format!("GET /loans/{id}"), &headers, HashMap::new(), None);
    let status = backend.loan_status.lock().expect("lock").clone();
    expired_or(
        &headers,
        json!({"loan": {
            "_id": id,
            "user": {"_id": "u-5", "firstName": "Bilguun", "lastName": "Od", "phone": "80112233"},
            "requestedAmount": 400000,
            "status": status
        }}),
    )
}

async fn reject_loan(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    backend.record(format!("PUT /loans/{id}/reject"), &headers, HashMap::new(), Some(body));
    if *backend.refuse_reject.lock().expect("lock") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"success": false, "message": "Token expired"})),
        );
    }
    *backend.loan_status.lock().expect("lock") = "cancelled".to_string();
    expired_or(&headers, json!({}))
}

async fn user_wallet(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    backend.record(format!("GET /admin/users/{id}/wallet"), &headers, HashMap::new(), None);
    expired_or(
        &headers,
        json!({"wallet": {"balance": 15000, "totalDeposit": 20000, "totalSpent": 5000}}),
    )
}

async fn not_json(State(backend): State<Backend>, headers: HeaderMap) -> &'static str {
    backend.record("GET /transactions/admin/all", &headers, HashMap::new(), None);
    "<html>gateway timeout</html>"
}

async fn spawn_backend() -> Result<(String, Backend)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let backend = Backend::default();
    *backend.loan_status.lock().expect("lock") = "under_review".to_string();
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/admin/dashboard", get(dashboard))
        .route(
            "/api/admin/loans/pending-verification",
            get(pending_verification),
        )
        .route("/api/withdrawals/admin/all", get(all_withdrawals))
        .route("/api/loans/:id", get(loan_detail))
        .route("/api/loans/:id/reject", put(reject_loan))
        .route("/api/admin/users/:id/wallet", get(user_wallet))
        .route("/api/transactions/admin/all", get(not_json))
        .with_state(backend.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/api"), backend))
}

fn client_for(url: &str, session: Arc<SessionManager>) -> AdminClient {
    let config = ClientConfig::new(url).expect("config");
    AdminClient::new(config, session).expect("client")
}

async fn signed_in(url: &str, token: &str) -> AdminClient {
    let session = SessionManager::in_memory();
    let user: UserSummary =
        serde_json::from_value(user_json("admin-1", "admin")).expect("user fixture");
    session
        .establish(Session {
            token: token.to_string(),
            user,
        })
        .await
        .expect("establish");
    client_for(url, session)
}

#[tokio::test]
async fn login_stores_admin_session() {
    let (url, backend) = spawn_backend().await.expect("spawn backend");
    let client = client_for(&url, SessionManager::in_memory());

    let session = client.login(" 99001122 ", "secret").await.expect("login");

    assert_eq!(session.token, "token-abc");
    assert!(client.session().is_authenticated().await);
    let requests = backend.requests();
    assert_eq!(requests[0].bearer, None);
    assert_eq!(
        requests[0].body,
        Some(json!({"phone": "99001122", "password": "secret"}))
    );
}

#[tokio::test]
async fn login_refuses_non_admin_accounts() {
    let (url, _backend) = spawn_backend().await.expect("spawn backend");
    let client = client_for(&url, SessionManager::in_memory());

    let err = client.login("88888888", "secret").await.expect_err("refused");

    assert!(matches!(err, ClientError::NotAdmin));
    assert!(!client.session().is_authenticated().await);
}

#[tokio::test]
async fn authenticated_calls_carry_bearer_token() {
    let (url, backend) = spawn_backend().await.expect("spawn backend");
    let client = signed_in(&url, "token-xyz").await;

    let stats = client.dashboard().await.expect("dashboard");

    assert_eq!(stats.withdrawals.pending, 3);
    assert_eq!(stats.wallets.total_balance, 1250000.0);
    assert_eq!(backend.requests()[0].bearer.as_deref(), Some("token-xyz"));
}

#[tokio::test]
async fn listing_sends_page_and_filter_and_decodes_named_array() {
    let (url, backend) = spawn_backend().await.expect("spawn backend");
    let client = signed_in(&url, "token-xyz").await;

    let page = client
        .list_withdrawals(2, Some(WithdrawalStatus::Pending))
        .await
        .expect("withdrawals");

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.pagination.total, 11);
    let query = &backend.requests()[0].query;
    assert_eq!(query.get("page").map(String::as_str), Some("2"));
    assert_eq!(query.get("status").map(String::as_str), Some("pending"));
}

#[tokio::test]
async fn backend_rejection_message_is_shown_verbatim() {
    let (url, _backend) = spawn_backend().await.expect("spawn backend");
    let client = signed_in(&url, "token-xyz").await;

    let err = client
        .list_pending_verification_loans(1)
        .await
        .expect_err("rejected");

    assert!(matches!(err, ClientError::Rejected(_)));
    assert_eq!(err.user_message(), "Verification queue is locked for audit");
    assert!(client.session().is_authenticated().await);
}

#[tokio::test]
async fn unreadable_body_is_a_transport_failure() {
    let (url, _backend) = spawn_backend().await.expect("spawn backend");
    let client = signed_in(&url, "token-xyz").await;

    let err = client.list_transactions(1, None).await.expect_err("html");

    assert!(matches!(err, ClientError::Transport(_)));
    assert_eq!(err.user_message(), error::GENERIC_FAILURE_MESSAGE);
}

#[tokio::test]
async fn unauthorized_clears_session_and_redirects_to_login() {
    let (url, _backend) = spawn_backend().await.expect("spawn backend");
    let client = signed_in(&url, "expired-token").await;
    let mut events = client.session().subscribe();

    let err = client.dashboard().await.expect_err("expired");

    assert!(err.is_unauthorized());
    assert!(!client.session().is_authenticated().await);
    assert_eq!(
        events.recv().await.expect("event"),
        SessionEvent::Expired {
            redirect: Route::Login
        }
    );
}

#[tokio::test]
async fn calls_without_session_never_reach_backend() {
    let (url, backend) = spawn_backend().await.expect("spawn backend");
    let client = client_for(&url, SessionManager::in_memory());

    let err = client.dashboard().await.expect_err("not signed in");

    assert!(matches!(err, ClientError::NotSignedIn));
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn restore_session_drops_expired_token() {
    let (url, _backend) = spawn_backend().await.expect("spawn backend");
    let client = signed_in(&url, "expired-token").await;

    let restored = client.restore_session().await.expect("restore");

    assert!(restored.is_none());
    assert!(!client.session().is_authenticated().await);
}

#[tokio::test]
async fn reject_loan_sends_reason_and_refetches_detail() {
    let (url, backend) = spawn_backend().await.expect("spawn backend");
    let client = signed_in(&url, "token-xyz").await;
    let mut view = LoanDetailView::for_loan(LoanId::from("loan-42"), Role::Admin);
    view.load(&client).await.expect("load");

    view.begin(ActionRequest::RejectLoan {
        reason: "document mismatch".to_string(),
    })
    .expect("begin");
    view.confirm(&client).await.expect("confirm");

    let reject = backend
        .requests()
        .into_iter()
        .find(|r| r.route == "PUT /loans/loan-42/reject")
        .expect("reject request");
    assert_eq!(reject.body, Some(json!({"reason": "document mismatch"})));
    assert_eq!(
        backend.routes(),
        vec![
            "GET /loans/loan-42",
            "GET /admin/users/u-5/wallet",
            "PUT /loans/loan-42/reject",
            "GET /loans/loan-42",
            "GET /admin/users/u-5/wallet",
        ]
    );
    assert_eq!(view.snapshot().expect("snapshot").loan.status, "cancelled");
}

#[tokio::test]
async fn token_expiring_mid_action_ends_the_flow_without_a_notice() {
    let (url, backend) = spawn_backend().await.expect("spawn backend");
    let client = signed_in(&url, "token-xyz").await;
    let mut events = client.session().subscribe();
    let mut view = LoanDetailView::for_loan(LoanId::from("loan-42"), Role::Admin);
    view.load(&client).await.expect("load");
    *backend.refuse_reject.lock().expect("lock") = true;

    view.begin(ActionRequest::RejectLoan {
        reason: "document mismatch".to_string(),
    })
    .expect("begin");
    let err = view.confirm(&client).await.expect_err("expired");

    assert!(matches!(err, ActionError::Api(ClientError::Unauthorized)));
    assert!(!client.session().is_authenticated().await);
    assert_eq!(
        events.recv().await.expect("event"),
        SessionEvent::Expired {
            redirect: Route::Login
        }
    );
    assert!(view.pending().is_none());
    assert!(view.notice().is_none());
    assert_eq!(
        backend.routes(),
        vec![
            "GET /loans/loan-42",
            "GET /admin/users/u-5/wallet",
            "PUT /loans/loan-42/reject",
        ]
    );
}
