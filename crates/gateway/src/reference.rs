//! Merchant transaction references.
//!
//! Order bills use `ORD_<orderId>_<unixMillis>` and reservation deposits use
//! `RES_<reservationId>_<unixMillis>`. Every attempt gets a fresh reference
//! while still pointing at the same target.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use common::{OrderId, ReservationId};

use crate::GatewayError;

const ORDER_PREFIX: &str = "ORD_";
const RESERVATION_PREFIX: &str = "RES_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxnRef {
    Order {
        order_id: OrderId,
        issued_at_ms: i64,
    },
    ReservationDeposit {
        reservation_id: ReservationId,
        issued_at_ms: i64,
    },
}

impl TxnRef {
    pub fn order(order_id: OrderId, issued_at: DateTime<Utc>) -> Self {
        TxnRef::Order {
            order_id,
            issued_at_ms: issued_at.timestamp_millis(),
        }
    }

    pub fn deposit(reservation_id: ReservationId, issued_at: DateTime<Utc>) -> Self {
        TxnRef::ReservationDeposit {
            reservation_id,
            issued_at_ms: issued_at.timestamp_millis(),
        }
    }

    /// Same target, issued at a different instant.
    pub fn reissued_at_ms(self, issued_at_ms: i64) -> Self {
        match self {
            TxnRef::Order { order_id, .. } => TxnRef::Order {
                order_id,
                issued_at_ms,
            },
            TxnRef::ReservationDeposit { reservation_id, .. } => TxnRef::ReservationDeposit {
                reservation_id,
                issued_at_ms,
            },
        }
    }

    pub fn issued_at_ms(&self) -> i64 {
        match self {
            TxnRef::Order { issued_at_ms, .. }
            | TxnRef::ReservationDeposit { issued_at_ms, .. } => *issued_at_ms,
        }
    }
}

impl std::fmt::Display for TxnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxnRef::Order {
                order_id,
                issued_at_ms,
            } => write!(f, "{ORDER_PREFIX}{order_id}_{issued_at_ms}"),
            TxnRef::ReservationDeposit {
                reservation_id,
                issued_at_ms,
            } => write!(f, "{RESERVATION_PREFIX}{reservation_id}_{issued_at_ms}"),
        }
    }
}

impl FromStr for TxnRef {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unrecognized = || GatewayError::UnrecognizedReference(s.to_string());

        if let Some(rest) = s.strip_prefix(ORDER_PREFIX) {
            let (id, millis) = rest.rsplit_once('_').ok_or_else(unrecognized)?;
            let order_id = id.parse::<OrderId>().map_err(|_| unrecognized())?;
            let issued_at_ms = millis.parse::<i64>().map_err(|_| unrecognized())?;
            return Ok(TxnRef::Order {
                order_id,
                issued_at_ms,
            });
        }

        if let Some(rest) = s.strip_prefix(RESERVATION_PREFIX) {
            let (id, millis) = rest.rsplit_once('_').ok_or_else(unrecognized)?;
            let reservation_id = id.parse::<ReservationId>().map_err(|_| unrecognized())?;
            let issued_at_ms = millis.parse::<i64>().map_err(|_| unrecognized())?;
            return Ok(TxnRef::ReservationDeposit {
                reservation_id,
                issued_at_ms,
            });
        }

        Err(unrecognized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_reference_carries_millis() {
        let id = OrderId::new();
        let at = DateTime::from_timestamp_millis(1_717_171_717_171).unwrap();
        let reference = TxnRef::order(id, at);
        assert_eq!(reference.to_string(), format!("ORD_{id}_1717171717171"));
        assert_eq!(reference.to_string().parse::<TxnRef>(), Ok(reference));
    }

    #[test]
    fn reissue_keeps_the_target() {
        let id = OrderId::new();
        let at = DateTime::from_timestamp_millis(1_000).unwrap();
        let next = TxnRef::order(id, at).reissued_at_ms(1_001);
        assert_eq!(
            next,
            TxnRef::Order {
                order_id: id,
                issued_at_ms: 1_001
            }
        );
        assert_eq!(next.issued_at_ms(), 1_001);
    }

    #[test]
    fn deposit_reference_carries_millis() {
        let id = ReservationId::new();
        let at = DateTime::from_timestamp_millis(1_717_171_717_171).unwrap();
        let reference = TxnRef::deposit(id, at);
        assert_eq!(reference.to_string(), format!("RES_{id}_1717171717171"));
        assert_eq!(reference.to_string().parse::<TxnRef>(), Ok(reference));
    }

    #[test]
    fn rejects_unknown_prefix() {
        let err = "INV_123".parse::<TxnRef>().unwrap_err();
        assert_eq!(err, GatewayError::UnrecognizedReference("INV_123".to_string()));
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!("ORD_not-a-uuid_1".parse::<TxnRef>().is_err());
        assert!(format!("ORD_{}", OrderId::new()).parse::<TxnRef>().is_err());
        assert!(format!("RES_{}", ReservationId::new()).parse::<TxnRef>().is_err());
        assert!(format!("RES_{}_soon", ReservationId::new()).parse::<TxnRef>().is_err());
    }
}
