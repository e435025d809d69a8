use serde::{Deserialize, Serialize};

use crate::ids::{TableGroupId, TableId};

/// The bookable resource behind an order or reservation.
///
/// Exactly one of a single table or a table group; the enum makes the
/// "both set" and "neither set" cases unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ResourceRef {
    Table(TableId),
    TableGroup(TableGroupId),
}

impl ResourceRef {
    pub fn table_id(&self) -> Option<TableId> {
        match self {
            ResourceRef::Table(id) => Some(*id),
            ResourceRef::TableGroup(_) => None,
        }
    }

    pub fn table_group_id(&self) -> Option<TableGroupId> {
        match self {
            ResourceRef::Table(_) => None,
            ResourceRef::TableGroup(id) => Some(*id),
        }
    }

    /// Builds a reference from the two nullable columns used in storage.
    ///
    /// Returns `None` unless exactly one side is present.
    pub fn from_parts(table: Option<TableId>, group: Option<TableGroupId>) -> Option<Self> {
        match (table, group) {
            (Some(t), None) => Some(ResourceRef::Table(t)),
            (None, Some(g)) => Some(ResourceRef::TableGroup(g)),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceRef::Table(id) => write!(f, "table:{id}"),
            ResourceRef::TableGroup(id) => write!(f, "table_group:{id}"),
        }
    }
}

impl From<TableId> for ResourceRef {
    fn from(id: TableId) -> Self {
        ResourceRef::Table(id)
    }
}

impl From<TableGroupId> for ResourceRef {
    fn from(id: TableGroupId) -> Self {
        ResourceRef::TableGroup(id)
    }
}
