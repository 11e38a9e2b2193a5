//! Operator actions: validation, explicit confirmation, and a single dispatch per confirmation.
//!
//! A flow moves `Idle -> Confirming -> Submitting -> Idle`. It never applies the new status
//! locally; the owning view re-fetches after it settles.

use std::collections::BTreeSet;

use shared::{
    domain::{EntityKind, LoanId, ProfileId, Role, UserId, WithdrawalId},
    protocol::{
        ApproveLoanRequest, ApproveWithdrawalRequest, RejectProfileRequest, RejectRequest,
        VerifyProfileRequest,
    },
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    error::ClientError,
    format::format_currency,
    resolver::{resolve, ActionKind, StatusSubject},
    AdminApi,
};

pub const MIN_LOAN_AMOUNT: i64 = 10_000;
pub const MAX_LOAN_AMOUNT: i64 = 5_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("loan amount must be a whole number of tugrik, got {0:?}")]
    MalformedAmount(String),
    #[error(
        "loan amount {amount} is outside the allowed range {min}..={max}",
        min = MIN_LOAN_AMOUNT,
        max = MAX_LOAN_AMOUNT
    )]
    AmountOutOfRange { amount: i64 },
    #[error("a reason is required")]
    ReasonRequired,
    #[error("loan limit must be positive, got {0}")]
    InvalidLoanLimit(i64),
}

pub fn validate_loan_amount(amount: i64) -> Result<i64, ValidationError> {
    if (MIN_LOAN_AMOUNT..=MAX_LOAN_AMOUNT).contains(&amount) {
        Ok(amount)
    } else {
        Err(ValidationError::AmountOutOfRange { amount })
    }
}

/// Parses operator input such as `150000` or `150,000`.
pub fn parse_loan_amount(raw: &str) -> Result<i64, ValidationError> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' '))
        .collect();
    let amount = cleaned
        .parse::<i64>()
        .map_err(|_| ValidationError::MalformedAmount(raw.to_string()))?;
    validate_loan_amount(amount)
}

pub fn require_reason(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err(ValidationError::ReasonRequired)
    } else {
        Ok(trimmed.to_string())
    }
}

fn optional_text(raw: Option<String>) -> Option<String> {
    raw.map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRequest {
    ApproveLoan { amount: i64 },
    RejectLoan { reason: String },
    ApproveDisbursement,
    VerifyProfile { loan_limit: Option<i64> },
    RejectProfile { reason: String },
    ApproveWithdrawal { notes: Option<String> },
    RejectWithdrawal { reason: String },
    ToggleUserStatus,
}

impl ActionRequest {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionRequest::ApproveLoan { .. } | ActionRequest::ApproveWithdrawal { .. } => {
                ActionKind::Approve
            }
            ActionRequest::RejectLoan { .. }
            | ActionRequest::RejectProfile { .. }
            | ActionRequest::RejectWithdrawal { .. } => ActionKind::Reject,
            ActionRequest::ApproveDisbursement => ActionKind::ApproveDisbursement,
            ActionRequest::VerifyProfile { .. } => ActionKind::Verify,
            ActionRequest::ToggleUserStatus => ActionKind::ToggleStatus,
        }
    }

    pub fn entity_kind(&self) -> EntityKind {
        match self {
            ActionRequest::ApproveLoan { .. }
            | ActionRequest::RejectLoan { .. }
            | ActionRequest::ApproveDisbursement => EntityKind::LoanApplication,
            ActionRequest::VerifyProfile { .. } | ActionRequest::RejectProfile { .. } => {
                EntityKind::VerificationProfile
            }
            ActionRequest::ApproveWithdrawal { .. } | ActionRequest::RejectWithdrawal { .. } => {
                EntityKind::WithdrawalRequest
            }
            ActionRequest::ToggleUserStatus => EntityKind::UserAccount,
        }
    }

    /// Checks operator input and normalizes free text.
    pub fn validate(self) -> Result<Self, ValidationError> {
        Ok(match self {
            ActionRequest::ApproveLoan { amount } => ActionRequest::ApproveLoan {
                amount: validate_loan_amount(amount)?,
            },
            ActionRequest::RejectLoan { reason } => ActionRequest::RejectLoan {
                reason: require_reason(&reason)?,
            },
            ActionRequest::RejectProfile { reason } => ActionRequest::RejectProfile {
                reason: require_reason(&reason)?,
            },
            ActionRequest::RejectWithdrawal { reason } => ActionRequest::RejectWithdrawal {
                reason: require_reason(&reason)?,
            },
            ActionRequest::VerifyProfile {
                loan_limit: Some(limit),
            } if limit <= 0 => return Err(ValidationError::InvalidLoanLimit(limit)),
            ActionRequest::ApproveWithdrawal { notes } => ActionRequest::ApproveWithdrawal {
                notes: optional_text(notes),
            },
            other => other,
        })
    }

    pub fn confirmation_prompt(&self) -> String {
        match self {
            ActionRequest::ApproveLoan { amount } => {
                format!("Approve this loan for {}?", format_currency(*amount as f64))
            }
            ActionRequest::RejectLoan { .. } => "Reject this loan?".to_string(),
            ActionRequest::ApproveDisbursement => disbursement_prompt(None),
            ActionRequest::VerifyProfile {
                loan_limit: Some(limit),
            } => format!(
                "Verify this profile with a loan limit of {}?",
                format_currency(*limit as f64)
            ),
            ActionRequest::VerifyProfile { loan_limit: None } => {
                "Verify this profile?".to_string()
            }
            ActionRequest::RejectProfile { .. } => "Reject this profile?".to_string(),
            ActionRequest::ApproveWithdrawal { .. } => "Approve this withdrawal?".to_string(),
            ActionRequest::RejectWithdrawal { .. } => "Reject this withdrawal?".to_string(),
            ActionRequest::ToggleUserStatus => "Change this user's activation status?".to_string(),
        }
    }
}

/// Disbursement credits the borrower's wallet and draws down their credit limit by the same amount.
pub fn disbursement_prompt(approved_amount: Option<f64>) -> String {
    match approved_amount {
        Some(amount) => format!(
            "Disburse {} to the borrower's wallet? Their credit limit drops by the same amount.",
            format_currency(amount)
        ),
        None => "Disburse this loan to the borrower's wallet?".to_string(),
    }
}

/// Point-in-time reference to the entity an action is aimed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTarget {
    pub kind: EntityKind,
    pub id: String,
    pub status: String,
}

impl ActionTarget {
    pub fn of<S: StatusSubject>(subject: &S) -> Self {
        Self {
            kind: S::KIND,
            id: subject.entity_id().to_string(),
            status: subject.status_value().into_owned(),
        }
    }

    pub fn permitted(&self, viewer: Role) -> BTreeSet<ActionKind> {
        resolve(self.kind, &self.status, viewer).permitted
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    Confirming(ActionRequest),
    Submitting(ActionKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowNotice {
    Succeeded(ActionKind),
    Failed(String),
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{action} is not permitted for a {kind} in status {status:?}")]
    NotPermitted {
        action: ActionKind,
        kind: EntityKind,
        status: String,
    },
    #[error("a {requested} action cannot target a {target}")]
    WrongEntity {
        requested: EntityKind,
        target: EntityKind,
    },
    #[error("another action is already in progress")]
    Busy,
    #[error("no action is awaiting confirmation")]
    NotConfirming,
    #[error("the entity has not been loaded yet")]
    NotLoaded,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Api(#[from] ClientError),
}

impl ActionError {
    /// Message for the operator. Session expiry yields none; it is handled by the session owner.
    pub fn user_message(&self) -> Option<String> {
        match self {
            ActionError::Api(ClientError::Unauthorized) => None,
            ActionError::Api(err) => Some(err.user_message()),
            other => Some(other.to_string()),
        }
    }
}

/// One operator action against one entity.
#[derive(Debug, Clone)]
pub struct ActionFlow {
    target: ActionTarget,
    viewer: Role,
    state: FlowState,
    notice: Option<FlowNotice>,
}

impl ActionFlow {
    pub fn new(target: ActionTarget, viewer: Role) -> Self {
        Self {
            target,
            viewer,
            state: FlowState::Idle,
            notice: None,
        }
    }

    pub fn target(&self) -> &ActionTarget {
        &self.target
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn notice(&self) -> Option<&FlowNotice> {
        self.notice.as_ref()
    }

    pub fn is_idle(&self) -> bool {
        self.state == FlowState::Idle
    }

    /// True while a request is in flight; trigger controls stay disabled.
    pub fn is_submitting(&self) -> bool {
        matches!(self.state, FlowState::Submitting(_))
    }

    pub fn pending(&self) -> Option<&ActionRequest> {
        match &self.state {
            FlowState::Confirming(request) => Some(request),
            _ => None,
        }
    }

    pub fn permitted(&self) -> BTreeSet<ActionKind> {
        self.target.permitted(self.viewer)
    }

    /// Points the flow at a freshly fetched snapshot. Ignored while an action is open.
    pub fn retarget(&mut self, target: ActionTarget) {
        if self.is_idle() {
            self.target = target;
        }
    }

    fn ensure_permitted(&self, request: &ActionRequest) -> Result<(), ActionError> {
        if request.entity_kind() != self.target.kind {
            return Err(ActionError::WrongEntity {
                requested: request.entity_kind(),
                target: self.target.kind,
            });
        }
        if !self.permitted().contains(&request.kind()) {
            return Err(ActionError::NotPermitted {
                action: request.kind(),
                kind: self.target.kind,
                status: self.target.status.clone(),
            });
        }
        Ok(())
    }

    /// Validates the request and opens the confirmation step.
    pub fn begin(&mut self, request: ActionRequest) -> Result<&ActionRequest, ActionError> {
        if !self.is_idle() {
            return Err(ActionError::Busy);
        }
        self.ensure_permitted(&request)?;
        let request = request.validate()?;
        self.notice = None;
        self.state = FlowState::Confirming(request);
        match &self.state {
            FlowState::Confirming(request) => Ok(request),
            _ => Err(ActionError::NotConfirming),
        }
    }

    pub fn cancel(&mut self) {
        if matches!(self.state, FlowState::Confirming(_)) {
            self.state = FlowState::Idle;
        }
    }

    /// Sends exactly one request for the confirmed action. Failures are never retried.
    pub async fn confirm(&mut self, api: &dyn AdminApi) -> Result<ActionKind, ActionError> {
        let request = match std::mem::replace(&mut self.state, FlowState::Idle) {
            FlowState::Confirming(request) => request,
            FlowState::Submitting(kind) => {
                self.state = FlowState::Submitting(kind);
                return Err(ActionError::Busy);
            }
            FlowState::Idle => return Err(ActionError::NotConfirming),
        };
        self.ensure_permitted(&request)?;

        let kind = request.kind();
        self.state = FlowState::Submitting(kind);
        info!(
            entity = %self.target.kind,
            entity_id = %self.target.id,
            action = %kind,
            "action: submitting"
        );
        let result = dispatch(api, &self.target, &request).await;
        self.state = FlowState::Idle;

        match result {
            Ok(()) => {
                info!(entity_id = %self.target.id, action = %kind, "action: accepted");
                self.notice = Some(FlowNotice::Succeeded(kind));
                Ok(kind)
            }
            Err(err) => {
                warn!(
                    entity_id = %self.target.id,
                    action = %kind,
                    error = %err,
                    "action: failed"
                );
                let err = ActionError::Api(err);
                self.notice = err.user_message().map(FlowNotice::Failed);
                Err(err)
            }
        }
    }
}

/// Maps a validated request onto its backend call.
pub async fn dispatch(
    api: &dyn AdminApi,
    target: &ActionTarget,
    request: &ActionRequest,
) -> Result<(), ClientError> {
    let id = target.id.as_str();
    match request {
        ActionRequest::ApproveLoan { amount } => {
            api.approve_loan(
                &LoanId::from(id),
                &ApproveLoanRequest {
                    approved_amount: *amount,
                },
            )
            .await
        }
        ActionRequest::RejectLoan { reason } => {
            api.reject_loan(
                &LoanId::from(id),
                &RejectRequest {
                    reason: reason.clone(),
                },
            )
            .await
        }
        ActionRequest::ApproveDisbursement => {
            api.approve_loan_disbursement(&LoanId::from(id)).await
        }
        ActionRequest::VerifyProfile { loan_limit } => {
            api.verify_profile(
                &ProfileId::from(id),
                &VerifyProfileRequest {
                    loan_limit: *loan_limit,
                },
            )
            .await
        }
        ActionRequest::RejectProfile { reason } => {
            api.reject_profile(
                &ProfileId::from(id),
                &RejectProfileRequest {
                    reason: Some(reason.clone()),
                },
            )
            .await
        }
        ActionRequest::ApproveWithdrawal { notes } => {
            api.approve_withdrawal(
                &WithdrawalId::from(id),
                &ApproveWithdrawalRequest {
                    notes: notes.clone(),
                },
            )
            .await
        }
        ActionRequest::RejectWithdrawal { reason } => {
            api.reject_withdrawal(
                &WithdrawalId::from(id),
                &RejectRequest {
                    reason: reason.clone(),
                },
            )
            .await
        }
        ActionRequest::ToggleUserStatus => api.toggle_user_status(&UserId::from(id)).await,
    }
}

#[cfg(test)]
#[path = "tests/actions_tests.rs"]
mod tests;
