use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use shared::{
    domain::{
        LoanId, LoanStatus, ProfileId, TransactionType, UserId, WithdrawalId, WithdrawalStatus,
    },
    error::ErrorCode,
    protocol::{
        ApproveLoanRequest, ApproveWithdrawalRequest, DashboardStats, LoanApplication, Page,
        Pagination, RejectProfileRequest, RejectRequest, Transaction, UserDetail, UserSummary,
        VerificationProfile, VerifyProfileRequest, Wallet, WithdrawalRequest,
    },
};

use crate::{error::ClientError, ApiResult, AdminApi};

#[derive(Debug, Clone)]
pub enum StubFailure {
    Rejected(String),
    Unauthorized,
    Transport,
}

impl StubFailure {
    fn into_error(self) -> ClientError {
        match self {
            StubFailure::Rejected(message) => ClientError::rejected(ErrorCode::Rejected, message),
            StubFailure::Unauthorized => ClientError::Unauthorized,
            StubFailure::Transport => ClientError::Transport("connection reset".to_string()),
        }
    }
}

/// In-process backend double. Records every call as `name:id[:detail]`.
#[derive(Default)]
pub struct StubApi {
    pub calls: Mutex<Vec<String>>,
    pub loan: Mutex<Option<LoanApplication>>,
    pub withdrawals: Mutex<Vec<WithdrawalRequest>>,
    pub fail_next_action: Mutex<Option<StubFailure>>,
    pub fail_wallet: Mutex<Option<StubFailure>>,
    /// Status the stored loan or withdrawal takes after an accepted action.
    pub status_after_action: Mutex<Option<String>>,
}

pub fn loan(id: &str, status: &str) -> LoanApplication {
    serde_json::from_value(json!({
        "_id": id,
        "loanNumber": format!("LN-{id}"),
        "user": {"_id": "u-7", "firstName": "Saraa", "lastName": "Dorj", "phone": "88001122"},
        "requestedAmount": 300000,
        "status": status
    }))
    .expect("loan fixture")
}

pub fn withdrawal(id: &str, status: &str) -> WithdrawalRequest {
    serde_json::from_value(json!({
        "_id": id,
        "user": "u-9",
        "amount": 50000,
        "fee": 500,
        "totalAmount": 50500,
        "status": status
    }))
    .expect("withdrawal fixture")
}

impl StubApi {
    pub fn with_loan(loan: LoanApplication) -> Self {
        let stub = Self::default();
        *stub.loan.lock().expect("lock") = Some(loan);
        stub
    }

    pub fn with_withdrawals(items: Vec<WithdrawalRequest>) -> Self {
        let stub = Self::default();
        *stub.withdrawals.lock().expect("lock") = items;
        stub
    }

    pub fn fail_next_action(&self, failure: StubFailure) {
        *self.fail_next_action.lock().expect("lock") = Some(failure);
    }

    pub fn settle_with(&self, status: &str) {
        *self.status_after_action.lock().expect("lock") = Some(status.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }

    pub fn action_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| !call.starts_with("get_") && !call.starts_with("list_"))
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("lock").push(call);
    }

    fn act(&self, call: String, id: &str) -> ApiResult<()> {
        self.record(call);
        if let Some(failure) = self.fail_next_action.lock().expect("lock").take() {
            return Err(failure.into_error());
        }
        if let Some(status) = self.status_after_action.lock().expect("lock").clone() {
            if let Some(loan) = self.loan.lock().expect("lock").as_mut() {
                if loan.id.as_str() == id {
                    loan.status = status.clone();
                }
            }
            for item in self.withdrawals.lock().expect("lock").iter_mut() {
                if item.id.as_str() == id {
                    item.status = status.clone();
                }
            }
        }
        Ok(())
    }

    fn unstubbed<T>(&self, name: &str) -> ApiResult<T> {
        self.record(name.to_string());
        Err(ClientError::Transport(format!("{name} is not stubbed")))
    }
}

#[async_trait]
impl AdminApi for StubApi {
    async fn me(&self) -> ApiResult<UserSummary> {
        self.unstubbed("get_me")
    }

    async fn dashboard(&self) -> ApiResult<DashboardStats> {
        self.unstubbed("get_dashboard")
    }

    async fn list_users(&self, _page: u32, _search: Option<&str>) -> ApiResult<Page<UserSummary>> {
        self.unstubbed("list_users")
    }

    async fn user_detail(&self, _id: &UserId) -> ApiResult<UserDetail> {
        self.unstubbed("get_user")
    }

    async fn user_wallet(&self, id: &UserId) -> ApiResult<Wallet> {
        self.record(format!("get_wallet:{id}"));
        if let Some(failure) = self.fail_wallet.lock().expect("lock").clone() {
            return Err(failure.into_error());
        }
        Ok(Wallet {
            balance: 120000.0,
            total_deposit: 150000.0,
            total_spent: 30000.0,
        })
    }

    async fn toggle_user_status(&self, id: &UserId) -> ApiResult<()> {
        self.act(format!("toggle_user_status:{id}"), id.as_str())
    }

    async fn list_pending_profiles(&self, _page: u32) -> ApiResult<Page<VerificationProfile>> {
        self.unstubbed("list_pending_profiles")
    }

    async fn profile_detail(&self, _id: &ProfileId) -> ApiResult<VerificationProfile> {
        self.unstubbed("get_profile")
    }

    async fn verify_profile(&self, id: &ProfileId, body: &VerifyProfileRequest) -> ApiResult<()> {
        self.act(format!("verify_profile:{id}:{:?}", body.loan_limit), id.as_str())
    }

    async fn reject_profile(&self, id: &ProfileId, body: &RejectProfileRequest) -> ApiResult<()> {
        let reason = body.reason.clone().unwrap_or_default();
        self.act(format!("reject_profile:{id}:{reason}"), id.as_str())
    }

    async fn list_loans(
        &self,
        _page: u32,
        _status: Option<LoanStatus>,
    ) -> ApiResult<Page<LoanApplication>> {
        self.unstubbed("list_loans")
    }

    async fn list_pending_verification_loans(
        &self,
        _page: u32,
    ) -> ApiResult<Page<LoanApplication>> {
        self.unstubbed("list_pending_verification_loans")
    }

    async fn list_pending_disbursement_loans(
        &self,
        _page: u32,
    ) -> ApiResult<Page<LoanApplication>> {
        self.unstubbed("list_pending_disbursement_loans")
    }

    async fn loan_detail(&self, id: &LoanId) -> ApiResult<LoanApplication> {
        self.record(format!("get_loan:{id}"));
        self.loan
            .lock()
            .expect("lock")
            .clone()
            .filter(|loan| &loan.id == id)
            .ok_or_else(|| ClientError::rejected(ErrorCode::NotFound, "Loan not found"))
    }

    async fn approve_loan(&self, id: &LoanId, body: &ApproveLoanRequest) -> ApiResult<()> {
        self.act(
            format!("approve_loan:{id}:{}", body.approved_amount),
            id.as_str(),
        )
    }

    async fn reject_loan(&self, id: &LoanId, body: &RejectRequest) -> ApiResult<()> {
        self.act(format!("reject_loan:{id}:{}", body.reason), id.as_str())
    }

    async fn approve_loan_disbursement(&self, id: &LoanId) -> ApiResult<()> {
        self.act(format!("approve_disbursement:{id}"), id.as_str())
    }

    async fn list_withdrawals(
        &self,
        page: u32,
        status: Option<WithdrawalStatus>,
    ) -> ApiResult<Page<WithdrawalRequest>> {
        self.record(format!("list_withdrawals:{page}"));
        let items: Vec<WithdrawalRequest> = self
            .withdrawals
            .lock()
            .expect("lock")
            .iter()
            .filter(|item| status.map_or(true, |status| item.status == status.as_str()))
            .cloned()
            .collect();
        Ok(Page {
            pagination: Pagination {
                page,
                pages: 3,
                total: items.len() as u64,
            },
            items,
        })
    }

    async fn approve_withdrawal(
        &self,
        id: &WithdrawalId,
        body: &ApproveWithdrawalRequest,
    ) -> ApiResult<()> {
        self.act(format!("approve_withdrawal:{id}:{:?}", body.notes), id.as_str())
    }

    async fn reject_withdrawal(&self, id: &WithdrawalId, body: &RejectRequest) -> ApiResult<()> {
        self.act(format!("reject_withdrawal:{id}:{}", body.reason), id.as_str())
    }

    async fn list_transactions(
        &self,
        _page: u32,
        _kind: Option<TransactionType>,
    ) -> ApiResult<Page<Transaction>> {
        self.unstubbed("list_transactions")
    }
}
