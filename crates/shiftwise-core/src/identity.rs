//! # Domain Identity Newtypes
//!
//! Newtype wrappers for every identifier in Shiftwise. These prevent
//! accidental identifier confusion: a `ShiftId` cannot be bound where an
//! `EmployeeId` is expected, which matters most in the swap arbitrator where
//! two employees and two shifts travel together.
//!
//! All identifiers serialize transparently as a bare UUID string.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

uuid_newtype!(
    /// Unique identifier for an employee account.
    EmployeeId,
    "employee"
);

impl EmployeeId {
    /// The acting identity of an administrator token with no employee binding.
    pub const SYSTEM: Self = Self(Uuid::nil());

    /// Whether this is [`EmployeeId::SYSTEM`].
    pub fn is_system(&self) -> bool {
        self.0.is_nil()
    }
}

uuid_newtype!(
    /// Unique identifier for a scheduled shift (an assignment).
    ShiftId,
    "shift"
);

uuid_newtype!(
    /// Unique identifier for a cover-up posting in the claim ledger.
    CoverUpId,
    "cover-up"
);

uuid_newtype!(
    /// Unique identifier for a shift swap proposal.
    SwapId,
    "swap"
);

uuid_newtype!(
    /// Unique identifier for a leave request.
    LeaveId,
    "leave"
);

uuid_newtype!(
    /// Unique identifier for an attendance (clock-in/out) record.
    AttendanceId,
    "attendance"
);

uuid_newtype!(
    /// Unique identifier for a payroll run.
    PayrollRunId,
    "payroll-run"
);

uuid_newtype!(
    /// Unique identifier for a notification.
    NotificationId,
    "notification"
);

uuid_newtype!(
    /// Unique identifier for an announcement.
    AnnouncementId,
    "announcement"
);

uuid_newtype!(
    /// Unique identifier for an employee inquiry.
    InquiryId,
    "inquiry"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ids_are_unique() {
        assert_ne!(EmployeeId::new(), EmployeeId::new());
        assert_ne!(CoverUpId::new(), CoverUpId::new());
    }

    #[test]
    fn test_display_is_namespaced() {
        let uuid = Uuid::nil();
        assert_eq!(
            EmployeeId(uuid).to_string(),
            "employee:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            CoverUpId(uuid).to_string(),
            "cover-up:00000000-0000-0000-0000-000000000000"
        );
        assert!(PayrollRunId(uuid).to_string().starts_with("payroll-run:"));
    }

    #[test]
    fn test_serializes_as_bare_uuid() {
        let id = ShiftId(Uuid::nil());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");

        let parsed: ShiftId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_system_employee_is_nil() {
        assert!(EmployeeId::SYSTEM.is_system());
        assert!(!EmployeeId::new().is_system());
    }

    #[test]
    fn test_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        assert_eq!(SwapId::from(uuid).as_uuid(), &uuid);
    }
}
