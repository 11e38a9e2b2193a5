use std::fmt;

use shared::domain::{LoanId, ProfileId, UserId};

/// Entry points of the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
    Users,
    UserDetail(UserId),
    PendingProfiles,
    ProfileDetail(ProfileId),
    LoanVerification,
    PendingDisbursement,
    Loans,
    LoanDetail(LoanId),
    Withdrawals,
    Transactions,
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Dashboard => "/".to_string(),
            Route::Users => "/users".to_string(),
            Route::UserDetail(id) => format!("/users/{id}"),
            Route::PendingProfiles => "/profiles/pending".to_string(),
            Route::ProfileDetail(id) => format!("/profiles/{id}"),
            Route::LoanVerification => "/loans/verification".to_string(),
            Route::PendingDisbursement => "/loans/disbursement".to_string(),
            Route::Loans => "/loans".to_string(),
            Route::LoanDetail(id) => format!("/loans/{id}"),
            Route::Withdrawals => "/withdrawals".to_string(),
            Route::Transactions => "/transactions".to_string(),
        }
    }

    /// Unknown paths fall back to the dashboard.
    pub fn from_path(path: &str) -> Route {
        let trimmed = path.trim_end_matches('/');
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] => Route::Dashboard,
            ["login"] => Route::Login,
            ["users"] => Route::Users,
            ["users", id] => Route::UserDetail(UserId::from(*id)),
            ["profiles", "pending"] => Route::PendingProfiles,
            ["profiles", id] => Route::ProfileDetail(ProfileId::from(*id)),
            ["loans", "verification"] => Route::LoanVerification,
            ["loans", "disbursement"] => Route::PendingDisbursement,
            ["loans"] => Route::Loans,
            ["loans", id] => Route::LoanDetail(LoanId::from(*id)),
            ["withdrawals"] => Route::Withdrawals,
            ["transactions"] => Route::Transactions,
            _ => Route::Dashboard,
        }
    }

    pub fn requires_session(&self) -> bool {
        !matches!(self, Route::Login)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
