use super::*;
use crate::test_support::{loan, withdrawal, StubApi, StubFailure};

fn loan_flow(status: &str) -> ActionFlow {
    ActionFlow::new(ActionTarget::of(&loan("l-1", status)), Role::Admin)
}

#[test]
fn loan_amount_bounds_are_inclusive() {
    assert_eq!(
        validate_loan_amount(9_999),
        Err(ValidationError::AmountOutOfRange { amount: 9_999 })
    );
    assert_eq!(validate_loan_amount(10_000), Ok(10_000));
    assert_eq!(validate_loan_amount(5_000_000), Ok(5_000_000));
    assert_eq!(
        validate_loan_amount(5_000_001),
        Err(ValidationError::AmountOutOfRange { amount: 5_000_001 })
    );
}

#[test]
fn parses_grouped_operator_input() {
    assert_eq!(parse_loan_amount(" 150,000 "), Ok(150_000));
    assert_eq!(parse_loan_amount("1_000_000"), Ok(1_000_000));
    assert!(matches!(
        parse_loan_amount("12.5k"),
        Err(ValidationError::MalformedAmount(_))
    ));
}

#[test]
fn rejections_require_a_reason() {
    for request in [
        ActionRequest::RejectLoan {
            reason: "   ".to_string(),
        },
        ActionRequest::RejectProfile {
            reason: String::new(),
        },
        ActionRequest::RejectWithdrawal {
            reason: "\n".to_string(),
        },
    ] {
        assert_eq!(request.validate(), Err(ValidationError::ReasonRequired));
    }
    assert_eq!(
        ActionRequest::RejectLoan {
            reason: "  document mismatch ".to_string()
        }
        .validate(),
        Ok(ActionRequest::RejectLoan {
            reason: "document mismatch".to_string()
        })
    );
}

#[test]
fn begin_refuses_actions_the_status_does_not_permit() {
    let mut flow = loan_flow("paid");
    let err = flow
        .begin(ActionRequest::ApproveLoan { amount: 100_000 })
        .expect_err("paid loans cannot be approved");
    assert!(matches!(
        err,
        ActionError::NotPermitted {
            action: ActionKind::Approve,
            ..
        }
    ));
    assert!(flow.is_idle());
}

#[test]
fn begin_refuses_requests_for_another_entity_kind() {
    let mut flow = loan_flow("under_review");
    let err = flow
        .begin(ActionRequest::ApproveWithdrawal { notes: None })
        .expect_err("withdrawal action on a loan");
    assert!(matches!(err, ActionError::WrongEntity { .. }));
}

#[test]
fn invalid_input_never_reaches_confirmation() {
    let mut flow = loan_flow("under_review");
    let err = flow
        .begin(ActionRequest::ApproveLoan { amount: 9_999 })
        .expect_err("below minimum");
    assert!(matches!(err, ActionError::Validation(_)));
    assert!(flow.pending().is_none());
}

#[test]
fn non_admin_viewer_cannot_begin() {
    let target = ActionTarget::of(&loan("l-1", "under_review"));
    let mut flow = ActionFlow::new(target, Role::User);
    assert!(flow.permitted().is_empty());
    assert!(flow
        .begin(ActionRequest::RejectLoan {
            reason: "x".to_string()
        })
        .is_err());
}

#[tokio::test]
async fn confirm_sends_exactly_one_request() {
    let api = StubApi::with_loan(loan("l-1", "under_review"));
    let mut flow = loan_flow("under_review");
    flow.begin(ActionRequest::ApproveLoan { amount: 250_000 })
        .expect("begin");
    assert_eq!(
        flow.pending(),
        Some(&ActionRequest::ApproveLoan { amount: 250_000 })
    );

    let kind = flow.confirm(&api).await.expect("confirm");

    assert_eq!(kind, ActionKind::Approve);
    assert_eq!(api.action_calls(), vec!["approve_loan:l-1:250000"]);
    assert!(flow.is_idle());
    assert_eq!(flow.notice(), Some(&FlowNotice::Succeeded(ActionKind::Approve)));
}

#[tokio::test]
async fn second_begin_while_confirming_is_busy() {
    let mut flow = loan_flow("under_review");
    flow.begin(ActionRequest::ApproveLoan { amount: 250_000 })
        .expect("begin");
    let err = flow
        .begin(ActionRequest::RejectLoan {
            reason: "changed my mind".to_string(),
        })
        .expect_err("busy");
    assert!(matches!(err, ActionError::Busy));
}

#[tokio::test]
async fn cancel_sends_nothing() {
    let api = StubApi::default();
    let mut flow = loan_flow("under_review");
    flow.begin(ActionRequest::ApproveLoan { amount: 250_000 })
        .expect("begin");
    flow.cancel();

    assert!(flow.is_idle());
    assert!(matches!(
        flow.confirm(&api).await,
        Err(ActionError::NotConfirming)
    ));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn rejected_action_is_not_retried_and_surfaces_backend_message() {
    let api = StubApi::with_withdrawals(vec![withdrawal("w-1", "pending")]);
    api.fail_next_action(StubFailure::Rejected("Insufficient balance".to_string()));
    let mut flow = ActionFlow::new(ActionTarget::of(&withdrawal("w-1", "pending")), Role::Admin);
    flow.begin(ActionRequest::ApproveWithdrawal { notes: None })
        .expect("begin");

    let err = flow.confirm(&api).await.expect_err("rejected");

    assert_eq!(err.user_message().as_deref(), Some("Insufficient balance"));
    assert_eq!(
        flow.notice(),
        Some(&FlowNotice::Failed("Insufficient balance".to_string()))
    );
    assert_eq!(api.action_calls().len(), 1);
    assert!(flow.is_idle());
}

#[tokio::test]
async fn transport_failure_shows_generic_message() {
    let api = StubApi::default();
    api.fail_next_action(StubFailure::Transport);
    let mut flow = loan_flow("pending_disbursement");
    flow.begin(ActionRequest::ApproveDisbursement).expect("begin");

    let err = flow.confirm(&api).await.expect_err("transport");

    assert_eq!(
        err.user_message().as_deref(),
        Some(crate::error::GENERIC_FAILURE_MESSAGE)
    );
}

#[tokio::test]
async fn expired_session_leaves_no_notice() {
    let api = StubApi::default();
    api.fail_next_action(StubFailure::Unauthorized);
    let mut flow = loan_flow("pending_verification");
    flow.begin(ActionRequest::RejectLoan {
        reason: "duplicate".to_string(),
    })
    .expect("begin");

    let err = flow.confirm(&api).await.expect_err("unauthorized");

    assert!(err.user_message().is_none());
    assert!(flow.notice().is_none());
}

#[tokio::test]
async fn dispatch_routes_profile_requests() {
    let api = StubApi::default();
    let target = ActionTarget {
        kind: EntityKind::VerificationProfile,
        id: "p-3".to_string(),
        status: "unverified".to_string(),
    };
    dispatch(
        &api,
        &target,
        &ActionRequest::VerifyProfile {
            loan_limit: Some(800_000),
        },
    )
    .await
    .expect("verify");
    dispatch(
        &api,
        &target,
        &ActionRequest::RejectProfile {
            reason: "expired id".to_string(),
        },
    )
    .await
    .expect("reject");

    assert_eq!(
        api.action_calls(),
        vec![
            "verify_profile:p-3:Some(800000)",
            "reject_profile:p-3:expired id"
        ]
    );
}

#[test]
fn confirmation_prompt_shows_formatted_amount() {
    let prompt = ActionRequest::ApproveLoan { amount: 1_500_000 }.confirmation_prompt();
    assert!(prompt.contains("1,500,000"), "{prompt}");
}
