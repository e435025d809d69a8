//! Strongly typed UUID identifiers.
//!
//! Every entity gets its own newtype so a `TableId` can never be passed
//! where an `OrderId` is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// A single physical table.
    TableId
);
uuid_id!(
    /// A named group of tables booked as one unit.
    TableGroupId
);
uuid_id!(
    /// A reservation of a table or table group.
    ReservationId
);
uuid_id!(
    /// A dining order.
    OrderId
);
uuid_id!(
    /// One line of an order.
    OrderItemId
);
uuid_id!(
    /// A menu dish.
    DishId
);
uuid_id!(
    /// A discount voucher.
    VoucherId
);
uuid_id!(
    /// A payment record.
    PaymentId
);
uuid_id!(
    /// A registered user (customer or staff).
    UserId
);
