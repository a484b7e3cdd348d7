//! Closed vocabularies shared across the workflow, with their stored text forms.

use crate::errors::DomainError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(
    /// Lifecycle states of a submission. Only `Pending` accepts reviewer transitions.
    SubmissionStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        ReturnedToPharmacy => "returned_to_pharmacy",
        Recalled => "recalled",
    }
);

text_enum!(
    /// Reviewer action tags as sent by clients.
    ReviewAction {
        Approve => "approve",
        Reject => "reject",
        ReturnToPharmacy => "return_to_pharmacy",
        Recall => "recall",
    }
);

impl ReviewAction {
    pub fn target_status(&self) -> SubmissionStatus {
        match self {
            ReviewAction::Approve => SubmissionStatus::Approved,
            ReviewAction::Reject => SubmissionStatus::Rejected,
            ReviewAction::ReturnToPharmacy => SubmissionStatus::ReturnedToPharmacy,
            ReviewAction::Recall => SubmissionStatus::Recalled,
        }
    }
}

text_enum!(
    PointsSystem {
        System => "system",
        Pharmacy => "pharmacy",
    }
);

impl Default for PointsSystem {
    fn default() -> Self {
        PointsSystem::System
    }
}

text_enum!(
    /// Per-criterion and aggregate classification outcome.
    Outcome {
        Dat => "DAT",
        KhongDat => "KHONG_DAT",
        XemXet => "XEM_XET",
    }
);

text_enum!(
    VoucherStatus {
        Active => "active",
        Inactive => "inactive",
        Expired => "expired",
    }
);

text_enum!(
    NotificationKind {
        System => "SYSTEM",
        Submission => "SUBMISSION",
        Voucher => "VOUCHER",
        User => "USER",
        Forum => "FORUM",
        ForumComment => "FORUM_COMMENT",
    }
);

impl NotificationKind {
    /// Kinds an admin may send by hand.
    pub fn is_broadcastable(&self) -> bool {
        matches!(
            self,
            NotificationKind::System
                | NotificationKind::User
                | NotificationKind::Submission
                | NotificationKind::Voucher
        )
    }
}

text_enum!(
    MessageKind {
        UserChat => "user_chat",
        Chatbot => "chatbot",
        AdminChat => "admin_chat",
    }
);

/// Parses a `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Result<NaiveDate, DomainError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        DomainError::validation(format!(
            "Ngày không hợp lệ '{value}', định dạng đúng là YYYY-MM-DD"
        ))
    })
}

/// Validates an optional date and returns its canonical text form.
pub fn normalize_date(value: Option<&str>) -> Result<Option<String>, DomainError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => Ok(Some(parse_date(v)?.format("%Y-%m-%d").to_string())),
        None => Ok(None),
    }
}
