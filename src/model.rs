//! The benchmark's single entity: a self-referencing tree record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the backing table on every engine.
pub const TABLE: &str = "Department";

/// Column order shared by the seeder, the query shapes and row mapping.
pub const COLUMNS: [&str; 7] = [
    "id",
    "name",
    "externalId",
    "parentId",
    "createdAt",
    "updatedAt",
    "deletedAt",
];

/// Alias used for the self-join child side in the join query shapes.
pub const CHILD_ALIAS: &str = "subDepartments";

/// One tree record ("Department").
///
/// The parent/child graph is acyclic by construction: a record's parent is
/// created and assigned its identifier strictly before the record itself
/// during seeding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEntity {
    /// Opaque unique identifier (client-minted UUID v4 when seeded)
    pub id: String,
    /// Display name
    pub name: String,
    /// Identifier in the upstream system of record
    pub external_id: String,
    /// Nullable self-reference to the parent record
    pub parent_id: Option<String>,
    /// Creation timestamp
    pub created_at: Option<DateTime<Utc>>,
    /// Last-update timestamp
    pub updated_at: Option<DateTime<Utc>>,
    /// Soft-delete marker
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TreeEntity {
    /// True when the record is soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// True for a root of the forest.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
