use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{
        LoanId, LoanStatus, ProfileId, TransactionType, UserId, WithdrawalId, WithdrawalStatus,
    },
    error::ErrorCode,
    protocol::{
        ApproveLoanRequest, ApproveWithdrawalRequest, DashboardStats, Envelope, LoanApplication,
        LoanEnvelope, LoginRequest, LoginResponse, Page, ProfileEnvelope, RejectProfileRequest,
        RejectRequest, Transaction, UserDetail, UserEnvelope, UserSummary, VerificationProfile,
        VerifyProfileRequest, Wallet, WalletEnvelope, WithdrawalRequest,
    },
};
use tracing::{debug, info, warn};
use url::Url;

pub mod actions;
pub mod error;
pub mod format;
pub mod listing;
pub mod navigation;
pub mod resolver;
pub mod session;
pub mod views;

pub use error::ClientError;
pub use session::{Session, SessionEvent, SessionManager};

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub type ApiResult<T> = std::result::Result<T, ClientError>;

/// Every backend operation the dashboard needs. All calls carry the session's bearer token.
#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn me(&self) -> ApiResult<UserSummary>;
    async fn dashboard(&self) -> ApiResult<DashboardStats>;

    async fn list_users(&self, page: u32, search: Option<&str>) -> ApiResult<Page<UserSummary>>;
    async fn user_detail(&self, id: &UserId) -> ApiResult<UserDetail>;
    async fn user_wallet(&self, id: &UserId) -> ApiResult<Wallet>;
    async fn toggle_user_status(&self, id: &UserId) -> ApiResult<()>;

    async fn list_pending_profiles(&self, page: u32) -> ApiResult<Page<VerificationProfile>>;
    async fn profile_detail(&self, id: &ProfileId) -> ApiResult<VerificationProfile>;
    async fn verify_profile(&self, id: &ProfileId, body: &VerifyProfileRequest) -> ApiResult<()>;
    async fn reject_profile(&self, id: &ProfileId, body: &RejectProfileRequest) -> ApiResult<()>;

    async fn list_loans(
        &self,
        page: u32,
        status: Option<LoanStatus>,
    ) -> ApiResult<Page<LoanApplication>>;
    async fn list_pending_verification_loans(&self, page: u32)
        -> ApiResult<Page<LoanApplication>>;
    async fn list_pending_disbursement_loans(&self, page: u32)
        -> ApiResult<Page<LoanApplication>>;
    async fn loan_detail(&self, id: &LoanId) -> ApiResult<LoanApplication>;
    async fn approve_loan(&self, id: &LoanId, body: &ApproveLoanRequest) -> ApiResult<()>;
    async fn reject_loan(&self, id: &LoanId, body: &RejectRequest) -> ApiResult<()>;
    async fn approve_loan_disbursement(&self, id: &LoanId) -> ApiResult<()>;

    async fn list_withdrawals(
        &self,
        page: u32,
        status: Option<WithdrawalStatus>,
    ) -> ApiResult<Page<WithdrawalRequest>>;
    async fn approve_withdrawal(
        &self,
        id: &WithdrawalId,
        body: &ApproveWithdrawalRequest,
    ) -> ApiResult<()>;
    async fn reject_withdrawal(&self, id: &WithdrawalId, body: &RejectRequest) -> ApiResult<()>;

    async fn list_transactions(
        &self,
        page: u32,
        kind: Option<TransactionType>,
    ) -> ApiResult<Page<Transaction>>;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: Url,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_url: &str) -> ApiResult<Self> {
        Ok(Self {
            api_url: Url::parse(api_url)?,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP gateway to the lending backend. A 401 on any authenticated call clears the session.
pub struct AdminClient {
    http: Client,
    base_url: String,
    session: Arc<SessionManager>,
}

struct Call<'a> {
    method: Method,
    path: String,
    query: Vec<(&'a str, String)>,
    body: Option<serde_json::Value>,
    authenticated: bool,
}

impl<'a> Call<'a> {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            authenticated: true,
        }
    }

    fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    fn page(mut self, page: u32) -> Self {
        self.query.push(("page", page.max(1).to_string()));
        self
    }

    fn param(mut self, key: &'a str, value: Option<impl ToString>) -> Self {
        if let Some(value) = value {
            let value = value.to_string();
            if !value.is_empty() {
                self.query.push((key, value));
            }
        }
        self
    }

    fn json(mut self, body: &impl Serialize) -> ApiResult<Self> {
        let value = serde_json::to_value(body)
            .map_err(|err| ClientError::Transport(format!("failed to encode body: {err}")))?;
        self.body = Some(value);
        Ok(self)
    }

    fn anonymous(mut self) -> Self {
        self.authenticated = false;
        self
    }
}

impl AdminClient {
    pub fn new(config: ClientConfig, session: Arc<SessionManager>) -> ApiResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.api_url.as_str().trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Signs in with phone and password. Only administrators are accepted.
    pub async fn login(&self, phone: &str, password: &str) -> ApiResult<Session> {
        let call = Call::new(Method::POST, "/auth/login")
            .anonymous()
            .json(&LoginRequest {
                phone: phone.trim().to_string(),
                password: password.to_string(),
            })?;
        let response: LoginResponse = self.require(call).await?;
        if !response.user.role.is_admin() {
            warn!(user_id = %response.user.id, "auth: non-admin sign-in refused");
            return Err(ClientError::NotAdmin);
        }
        let session = Session {
            token: response.token,
            user: response.user,
        };
        self.session.establish(session.clone()).await?;
        Ok(session)
    }

    /// Loads the stored session and confirms it with the backend; anything invalid is dropped.
    pub async fn restore_session(&self) -> ApiResult<Option<Session>> {
        let Some(stored) = self.session.init().await else {
            return Ok(None);
        };
        match self.me().await {
            Ok(user) if user.role.is_admin() => {
                self.session.replace_user(user).await;
                Ok(self.session.current().await)
            }
            Ok(user) => {
                warn!(user_id = %user.id, "auth: stored session is not an administrator");
                self.session.logout().await;
                Ok(None)
            }
            Err(ClientError::Unauthorized) => Ok(None),
            Err(err) => {
                warn!(user_id = %stored.user.id, error = %err, "auth: session check failed");
                self.session.logout().await;
                Err(err)
            }
        }
    }

    pub async fn logout(&self) {
        self.session.logout().await;
    }

    async fn require<T: DeserializeOwned>(&self, call: Call<'_>) -> ApiResult<T> {
        let path = call.path.clone();
        self.execute(call).await?.ok_or_else(|| {
            ClientError::Transport(format!("response for {path} carried no data"))
        })
    }

    async fn perform(&self, call: Call<'_>) -> ApiResult<()> {
        self.execute::<serde_json::Value>(call).await.map(|_| ())
    }

    async fn execute<T: DeserializeOwned>(&self, call: Call<'_>) -> ApiResult<Option<T>> {
        let url = format!("{}{}", self.base_url, call.path);
        let mut request = self.http.request(call.method.clone(), &url);
        if !call.query.is_empty() {
            request = request.query(&call.query);
        }
        if let Some(body) = &call.body {
            request = request.json(body);
        }
        if call.authenticated {
            let token = self.session.token().await.ok_or(ClientError::NotSignedIn)?;
            request = request.bearer_auth(token);
        }

        debug!(method = %call.method, path = %call.path, "api: request");
        let response = request.send().await.map_err(|err| {
            warn!(method = %call.method, path = %call.path, error = %err, "api: transport failure");
            ClientError::from(err)
        })?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED && call.authenticated {
            self.session.invalidate().await;
            return Err(ClientError::Unauthorized);
        }

        let raw = response.text().await?;
        let envelope = match serde_json::from_str::<Envelope<T>>(&raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(
                    method = %call.method,
                    path = %call.path,
                    status = status.as_u16(),
                    error = %err,
                    "api: unreadable response body"
                );
                return Err(ClientError::Transport(format!(
                    "unexpected response from {} (HTTP {})",
                    call.path,
                    status.as_u16()
                )));
            }
        };

        if !envelope.success || !status.is_success() {
            let code = if status.is_success() {
                ErrorCode::Rejected
            } else {
                ErrorCode::from_http_status(status.as_u16())
            };
            let message = envelope
                .message
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| format!("request rejected (HTTP {})", status.as_u16()));
            info!(
                method = %call.method,
                path = %call.path,
                status = status.as_u16(),
                %message,
                "api: rejected by backend"
            );
            return Err(ClientError::rejected(code, message));
        }

        Ok(envelope.data)
    }
}

#[async_trait]
impl AdminApi for AdminClient {
    async fn me(&self) -> ApiResult<UserSummary> {
        let body: UserEnvelope = self.require(Call::get("/auth/me")).await?;
        Ok(body.user)
    }

    async fn dashboard(&self) -> ApiResult<DashboardStats> {
        self.require(Call::get("/admin/dashboard")).await
    }

    async fn list_users(&self, page: u32, search: Option<&str>) -> ApiResult<Page<UserSummary>> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        self.require(Call::get("/admin/users").page(page).param("search", search))
            .await
    }

    async fn user_detail(&self, id: &UserId) -> ApiResult<UserDetail> {
        self.require(Call::get(format!("/admin/users/{id}"))).await
    }

    async fn user_wallet(&self, id: &UserId) -> ApiResult<Wallet> {
        let body: WalletEnvelope = self
            .require(Call::get(format!("/admin/users/{id}/wallet")))
            .await?;
        Ok(body.wallet)
    }

    async fn toggle_user_status(&self, id: &UserId) -> ApiResult<()> {
        self.perform(Call::put(format!("/admin/users/{id}/toggle-status")))
            .await
    }

    async fn list_pending_profiles(&self, page: u32) -> ApiResult<Page<VerificationProfile>> {
        self.require(Call::get("/admin/profiles/pending").page(page))
            .await
    }

    async fn profile_detail(&self, id: &ProfileId) -> ApiResult<VerificationProfile> {
        let body: ProfileEnvelope = self
            .require(Call::get(format!("/admin/profiles/{id}")))
            .await?;
        Ok(body.profile)
    }

    async fn verify_profile(&self, id: &ProfileId, body: &VerifyProfileRequest) -> ApiResult<()> {
        self.perform(Call::put(format!("/admin/profiles/{id}/verify")).json(body)?)
            .await
    }

    async fn reject_profile(&self, id: &ProfileId, body: &RejectProfileRequest) -> ApiResult<()> {
        self.perform(Call::put(format!("/admin/profiles/{id}/reject")).json(body)?)
            .await
    }

    async fn list_loans(
        &self,
        page: u32,
        status: Option<LoanStatus>,
    ) -> ApiResult<Page<LoanApplication>> {
        self.require(Call::get("/loans/admin/all").page(page).param("status", status))
            .await
    }

    async fn list_pending_verification_loans(
        &self,
        page: u32,
    ) -> ApiResult<Page<LoanApplication>> {
        self.require(Call::get("/admin/loans/pending-verification").page(page))
            .await
    }

    async fn list_pending_disbursement_loans(
        &self,
        page: u32,
    ) -> ApiResult<Page<LoanApplication>> {
        self.require(Call::get("/admin/loans/pending-disbursement").page(page))
            .await
    }

    async fn loan_detail(&self, id: &LoanId) -> ApiResult<LoanApplication> {
        let body: LoanEnvelope = self.require(Call::get(format!("/loans/{id}"))).await?;
        Ok(body.loan)
    }

    async fn approve_loan(&self, id: &LoanId, body: &ApproveLoanRequest) -> ApiResult<()> {
        self.perform(Call::put(format!("/loans/{id}/approve")).json(body)?)
            .await
    }

    async fn reject_loan(&self, id: &LoanId, body: &RejectRequest) -> ApiResult<()> {
        self.perform(Call::put(format!("/loans/{id}/reject")).json(body)?)
            .await
    }

    async fn approve_loan_disbursement(&self, id: &LoanId) -> ApiResult<()> {
        self.perform(Call::put(format!("/loans/{id}/approve-disbursement")))
            .await
    }

    async fn list_withdrawals(
        &self,
        page: u32,
        status: Option<WithdrawalStatus>,
    ) -> ApiResult<Page<WithdrawalRequest>> {
        self.require(
            Call::get("/withdrawals/admin/all")
                .page(page)
                .param("status", status),
        )
        .await
    }

    async fn approve_withdrawal(
        &self,
        id: &WithdrawalId,
        body: &ApproveWithdrawalRequest,
    ) -> ApiResult<()> {
        self.perform(Call::put(format!("/withdrawals/{id}/approve")).json(body)?)
            .await
    }

    async fn reject_withdrawal(&self, id: &WithdrawalId, body: &RejectRequest) -> ApiResult<()> {
        self.perform(Call::put(format!("/withdrawals/{id}/reject")).json(body)?)
            .await
    }

    async fn list_transactions(
        &self,
        page: u32,
        kind: Option<TransactionType>,
    ) -> ApiResult<Page<Transaction>> {
        self.require(
            Call::get("/transactions/admin/all")
                .page(page)
                .param("type", kind),
        )
        .await
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
