//! Shared vocabulary used by every crate in the workspace.
//!
//! Identifiers, money, the table/table-group resource reference and the
//! status enums live here so that the persistence layer and the engines
//! agree on a single set of types.

pub mod ids;
pub mod money;
pub mod resource;
pub mod status;

pub use ids::{
    DishId, OrderId, OrderItemId, PaymentId, ReservationId, TableGroupId, TableId, UserId,
    VoucherId,
};
pub use money::Money;
pub use resource::ResourceRef;
pub use status::{
    DiscountType, ItemStatus, OrderPaymentStatus, OrderStatus, ParseStatusError, PaymentMethod,
    PaymentStatus, Ranking, ReservationStatus, ResourceStatus, UserRole,
};
