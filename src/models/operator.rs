use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A clinician or technician account that registers patients and submits tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operator {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Profile fields an operator may change on their own account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperatorPatch {
    pub display_name: Option<String>,
}

/// Identity of whoever is asking for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub operator_id: Uuid,
    pub is_admin: bool,
}

impl Requester {
    pub fn operator(operator_id: Uuid) -> Self {
        Self {
            operator_id,
            is_admin: false,
        }
    }

    pub fn admin(operator_id: Uuid) -> Self {
        Self {
            operator_id,
            is_admin: true,
        }
    }

    /// Owners and admins may read or modify a record.
    pub fn can_access(&self, owner_id: &Uuid) -> bool {
        self.is_admin || &self.operator_id == owner_id
    }
}

impl From<&Operator> for Requester {
    fn from(op: &Operator) -> Self {
        Self {
            operator_id: op.id,
            is_admin: op.is_admin,
        }
    }
}
