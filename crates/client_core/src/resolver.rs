//! Status view-model: one table from `(entity kind, status)` to label, badge and permitted actions.
//!
//! Every list and detail view reads status treatment from here. Unknown statuses display their raw
//! value with the default badge and permit nothing.

use std::{borrow::Cow, collections::BTreeSet, fmt};

use shared::{
    domain::{
        AccountStatus, EntityKind, LoanStatus, ProfileStatus, Role, TransactionStatus,
        TransactionType, WithdrawalStatus,
    },
    protocol::{LoanApplication, Transaction, UserSummary, VerificationProfile, WithdrawalRequest},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BadgeVariant {
    #[default]
    Default,
    Success,
    Warning,
    Danger,
    Info,
}

impl BadgeVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            BadgeVariant::Default => "default",
            BadgeVariant::Success => "success",
            BadgeVariant::Warning => "warning",
            BadgeVariant::Danger => "danger",
            BadgeVariant::Info => "info",
        }
    }
}

impl fmt::Display for BadgeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    Approve,
    Reject,
    Verify,
    ApproveDisbursement,
    ToggleStatus,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Approve => "approve",
            ActionKind::Reject => "reject",
            ActionKind::Verify => "verify",
            ActionKind::ApproveDisbursement => "approve_disbursement",
            ActionKind::ToggleStatus => "toggle_status",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusView {
    pub label: String,
    pub badge: BadgeVariant,
    pub permitted: BTreeSet<ActionKind>,
}

impl StatusView {
    fn unknown(status: &str) -> Self {
        Self {
            label: status.to_string(),
            badge: BadgeVariant::Default,
            permitted: BTreeSet::new(),
        }
    }

    pub fn permits(&self, action: ActionKind) -> bool {
        self.permitted.contains(&action)
    }
}

struct StatusEntry {
    label: &'static str,
    badge: BadgeVariant,
    actions: &'static [ActionKind],
}

const fn entry(
    label: &'static str,
    badge: BadgeVariant,
    actions: &'static [ActionKind],
) -> StatusEntry {
    StatusEntry {
        label,
        badge,
        actions,
    }
}

const NONE: &[ActionKind] = &[];

fn loan_entry(status: LoanStatus) -> StatusEntry {
    use ActionKind::*;
    use BadgeVariant::*;
    match status {
        LoanStatus::PendingVerification => entry("Awaiting verification", Warning, &[Reject]),
        LoanStatus::UnderReview => entry("Under review", Warning, &[Approve, Reject]),
        // Approved loans can still be rejected until disbursement is queued.
        LoanStatus::Approved => entry("Approved", Success, &[Reject]),
        LoanStatus::PendingDisbursement => {
            entry("Awaiting disbursement", Info, &[ApproveDisbursement])
        }
        LoanStatus::Disbursed => entry("Disbursed", Success, NONE),
        LoanStatus::Active => entry("Active", Info, NONE),
        LoanStatus::Paid => entry("Paid", Success, NONE),
        LoanStatus::Overdue => entry("Overdue", Danger, NONE),
        LoanStatus::Cancelled => entry("Cancelled", Info, NONE),
    }
}

fn profile_entry(status: ProfileStatus) -> StatusEntry {
    use ActionKind::*;
    use BadgeVariant::*;
    match status {
        ProfileStatus::Unverified => entry("Not verified", Warning, &[Verify, Reject]),
        ProfileStatus::Verified => entry("Verified", Success, NONE),
        ProfileStatus::Rejected => entry("Rejected", Danger, &[Verify, Reject]),
    }
}

fn withdrawal_entry(status: WithdrawalStatus) -> StatusEntry {
    use ActionKind::*;
    use BadgeVariant::*;
    match status {
        WithdrawalStatus::Pending => entry("Pending", Warning, &[Approve, Reject]),
        WithdrawalStatus::Processing => entry("Processing", Info, NONE),
        WithdrawalStatus::Completed => entry("Completed", Success, NONE),
        WithdrawalStatus::Failed => entry("Failed", Danger, NONE),
        WithdrawalStatus::Cancelled => entry("Cancelled", Danger, NONE),
    }
}

fn transaction_entry(status: TransactionStatus) -> StatusEntry {
    use BadgeVariant::*;
    match status {
        TransactionStatus::Pending => entry("Pending", Warning, NONE),
        TransactionStatus::Completed => entry("Completed", Success, NONE),
        TransactionStatus::Failed => entry("Failed", Danger, NONE),
        TransactionStatus::Cancelled => entry("Cancelled", Danger, NONE),
    }
}

fn account_entry(status: AccountStatus) -> StatusEntry {
    use ActionKind::*;
    use BadgeVariant::*;
    match status {
        AccountStatus::Active => entry("Active", Success, &[ToggleStatus]),
        AccountStatus::Inactive => entry("Inactive", Warning, &[ToggleStatus]),
    }
}

fn lookup(kind: EntityKind, status: &str) -> Option<StatusEntry> {
    match kind {
        EntityKind::LoanApplication => status.parse().ok().map(loan_entry),
        EntityKind::VerificationProfile => status.parse().ok().map(profile_entry),
        EntityKind::WithdrawalRequest => status.parse().ok().map(withdrawal_entry),
        EntityKind::Transaction => status.parse().ok().map(transaction_entry),
        EntityKind::UserAccount => status.parse().ok().map(account_entry),
    }
}

/// Resolves display treatment and permitted actions. Non-admin viewers are never offered actions.
pub fn resolve(kind: EntityKind, status: &str, viewer: Role) -> StatusView {
    let Some(entry) = lookup(kind, status) else {
        return StatusView::unknown(status);
    };
    let permitted = if viewer.is_admin() {
        entry.actions.iter().copied().collect()
    } else {
        BTreeSet::new()
    };
    StatusView {
        label: entry.label.to_string(),
        badge: entry.badge,
        permitted,
    }
}

pub fn transaction_type_label(kind: &str) -> Cow<'_, str> {
    match kind.parse::<TransactionType>() {
        Ok(TransactionType::Deposit) => Cow::Borrowed("Deposit"),
        Ok(TransactionType::Withdrawal) => Cow::Borrowed("Withdrawal"),
        Ok(TransactionType::LoanDisbursement) => Cow::Borrowed("Loan disbursement"),
        Ok(TransactionType::LoanPayment) => Cow::Borrowed("Loan payment"),
        Ok(TransactionType::VerificationFee) => Cow::Borrowed("Verification fee"),
        Err(_) => Cow::Borrowed(kind),
    }
}

/// A backend entity whose status drives what the operator may do with it.
pub trait StatusSubject {
    const KIND: EntityKind;

    fn entity_id(&self) -> &str;

    fn status_value(&self) -> Cow<'_, str>;

    fn status_view(&self, viewer: Role) -> StatusView {
        resolve(Self::KIND, &self.status_value(), viewer)
    }
}

impl StatusSubject for LoanApplication {
    const KIND: EntityKind = EntityKind::LoanApplication;

    fn entity_id(&self) -> &str {
        self.id.as_str()
    }

    fn status_value(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.status)
    }
}

impl StatusSubject for VerificationProfile {
    const KIND: EntityKind = EntityKind::VerificationProfile;

    fn entity_id(&self) -> &str {
        self.id.as_str()
    }

    fn status_value(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.status().as_str())
    }
}

impl StatusSubject for WithdrawalRequest {
    const KIND: EntityKind = EntityKind::WithdrawalRequest;

    fn entity_id(&self) -> &str {
        self.id.as_str()
    }

    fn status_value(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.status)
    }
}

impl StatusSubject for Transaction {
    const KIND: EntityKind = EntityKind::Transaction;

    fn entity_id(&self) -> &str {
        self.id.as_str()
    }

    fn status_value(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.status)
    }
}

impl StatusSubject for UserSummary {
    const KIND: EntityKind = EntityKind::UserAccount;

    fn entity_id(&self) -> &str {
        self.id.as_str()
    }

    fn status_value(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.account_status().as_str())
    }
}

#[cfg(test)]
#[path = "tests/resolver_tests.rs"]
mod tests;
