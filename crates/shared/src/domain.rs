use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::UnknownStatus;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(LoanId);
id_newtype!(ProfileId);
id_newtype!(WithdrawalId);
id_newtype!(TransactionId);

/// Declares a closed status domain with its wire spelling.
macro_rules! status_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownStatus;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($wire => Ok($name::$variant),)+
                    other => Err(UnknownStatus::new(stringify!($name), other)),
                }
            }
        }
    };
}

status_enum!(
    /// Loan application lifecycle as reported by the backend.
    LoanStatus {
        PendingVerification => "pending_verification",
        UnderReview => "under_review",
        Approved => "approved",
        PendingDisbursement => "pending_disbursement",
        Disbursed => "disbursed",
        Active => "active",
        Paid => "paid",
        Overdue => "overdue",
        Cancelled => "cancelled",
    }
);

status_enum!(
    /// Identity verification outcome. Derived from the profile flags, never sent as a field.
    ProfileStatus {
        Unverified => "unverified",
        Verified => "verified",
        Rejected => "rejected",
    }
);

status_enum!(
    WithdrawalStatus {
        Pending => "pending",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
);

status_enum!(
    TransactionStatus {
        Pending => "pending",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
);

status_enum!(
    TransactionType {
        Deposit => "deposit",
        Withdrawal => "withdrawal",
        LoanDisbursement => "loan_disbursement",
        LoanPayment => "loan_payment",
        VerificationFee => "verification_fee",
    }
);

status_enum!(
    /// Activation state of a platform user account, derived from `isActive`.
    AccountStatus {
        Active => "active",
        Inactive => "inactive",
    }
);

impl AccountStatus {
    pub fn from_active(is_active: bool) -> Self {
        if is_active {
            Self::Active
        } else {
            Self::Inactive
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    LoanApplication,
    VerificationProfile,
    WithdrawalRequest,
    Transaction,
    UserAccount,
}

impl EntityKind {
    pub const ALL: &'static [EntityKind] = &[
        EntityKind::LoanApplication,
        EntityKind::VerificationProfile,
        EntityKind::WithdrawalRequest,
        EntityKind::Transaction,
        EntityKind::UserAccount,
    ];

    /// Every status value the backend declares for this kind.
    pub fn declared_statuses(self) -> Vec<&'static str> {
        match self {
            EntityKind::LoanApplication => LoanStatus::ALL.iter().map(|s| s.as_str()).collect(),
            EntityKind::VerificationProfile => {
                ProfileStatus::ALL.iter().map(|s| s.as_str()).collect()
            }
            EntityKind::WithdrawalRequest => {
                WithdrawalStatus::ALL.iter().map(|s| s.as_str()).collect()
            }
            EntityKind::Transaction => TransactionStatus::ALL.iter().map(|s| s.as_str()).collect(),
            EntityKind::UserAccount => AccountStatus::ALL.iter().map(|s| s.as_str()).collect(),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::LoanApplication => "loan",
            EntityKind::VerificationProfile => "profile",
            EntityKind::WithdrawalRequest => "withdrawal",
            EntityKind::Transaction => "transaction",
            EntityKind::UserAccount => "user",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
    #[serde(other)]
    Other,
}

impl Role {
    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}
