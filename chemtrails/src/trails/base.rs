//! Fields shared by every persisted object

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{HubId, ObjectId};

/// Identity of a persisted object
///
/// `oid` and `created_at` are assigned at construction and never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Base {
    hub_id: HubId,
    oid: ObjectId,
    created_at: DateTime<Utc>,
}

impl Base {
    #[must_use]
    pub fn new(hub_id: HubId) -> Self {
        Self { hub_id, oid: ObjectId::generate(), created_at: Utc::now() }
    }

    #[must_use]
    pub fn hub_id(&self) -> HubId {
        self.hub_id
    }

    #[must_use]
    pub fn oid(&self) -> &ObjectId {
        &self.oid
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
