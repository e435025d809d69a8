use serde::{Deserialize, Serialize};

use common::{OrderId, ReservationId, ResourceRef, TableGroupId, TableId, UserId};

/// Who receives an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Audience {
    /// Every admin and employee session.
    Staff,
    /// All sessions of one customer account.
    Customer(UserId),
    /// Guests seated at a table without an account.
    TableRoom(TableId),
    TableGroupRoom(TableGroupId),
    /// Anyone watching a specific order.
    OrderRoom(OrderId),
    /// Anyone watching a specific reservation.
    ReservationRoom(ReservationId),
}

impl Audience {
    /// Guest room for the resource.
    pub fn for_resource(resource: ResourceRef) -> Self {
        match resource {
            ResourceRef::Table(id) => Audience::TableRoom(id),
            ResourceRef::TableGroup(id) => Audience::TableGroupRoom(id),
        }
    }

    /// Room name used by socket transports.
    pub fn room(&self) -> String {
        match self {
            Audience::Staff => "staff".to_string(),
            Audience::Customer(id) => format!("customer:{id}"),
            Audience::TableRoom(id) => format!("table:{id}"),
            Audience::TableGroupRoom(id) => format!("table_group:{id}"),
            Audience::OrderRoom(id) => format!("order:{id}"),
            Audience::ReservationRoom(id) => format!("reservation:{id}"),
        }
    }
}

impl std::fmt::Display for Audience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.room())
    }
}
