use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use common::{
    DishId, OrderId, OrderItemId, PaymentId, PaymentStatus, ReservationId, ReservationStatus,
    ResourceRef, ResourceStatus, TableGroupId, TableId, UserId, VoucherId,
};

use crate::{
    Dish, Order, OrderItem, Payment, PaymentTarget, Reservation, Result, StoreError, Table,
    TableGroup, User, Voucher, VoucherUsage,
    store::{OffenseCount, Store, UnitOfWork},
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    tables: HashMap<TableId, Table>,
    groups: HashMap<TableGroupId, TableGroup>,
    dishes: HashMap<DishId, Dish>,
    users: HashMap<UserId, User>,
    reservations: HashMap<ReservationId, Reservation>,
    orders: HashMap<OrderId, Order>,
    items: HashMap<OrderItemId, OrderItem>,
    vouchers: HashMap<VoucherId, Voucher>,
    voucher_usages: Vec<VoucherUsage>,
    payments: HashMap<PaymentId, Payment>,
}

/// In-memory store implementation for tests and local runs.
///
/// Units of work are fully serialized: `begin` takes an exclusive lock and
/// works on a copy of the state, which replaces the shared state on commit.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of payment records stored.
    pub async fn payment_count(&self) -> usize {
        self.state.lock().await.payments.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

fn replace<K, V>(map: &mut HashMap<K, V>, key: K, value: &V, entity: &'static str) -> Result<()>
where
    K: std::hash::Hash + Eq + std::fmt::Display,
    V: Clone,
{
    match map.get_mut(&key) {
        Some(slot) => {
            *slot = value.clone();
            Ok(())
        }
        None => Err(StoreError::missing(entity, key)),
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn insert_table(&mut self, table: &Table) -> Result<()> {
        if self
            .working
            .tables
            .values()
            .any(|t| t.table_number == table.table_number)
        {
            return Err(StoreError::Duplicate {
                entity: "table",
                key: table.table_number.clone(),
            });
        }
        self.working.tables.insert(table.id, table.clone());
        Ok(())
    }

    async fn get_table(&mut self, id: TableId) -> Result<Option<Table>> {
        Ok(self.working.tables.get(&id).cloned())
    }

    async fn insert_table_group(&mut self, group: &TableGroup) -> Result<()> {
        self.working.groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn get_table_group(&mut self, id: TableGroupId) -> Result<Option<TableGroup>> {
        Ok(self.working.groups.get(&id).cloned())
    }

    async fn groups_containing(&mut self, table: TableId) -> Result<Vec<TableGroup>> {
        Ok(self
            .working
            .groups
            .values()
            .filter(|g| g.table_ids.contains(&table))
            .cloned()
            .collect())
    }

    async fn set_resource_status(
        &mut self,
        resource: ResourceRef,
        status: ResourceStatus,
    ) -> Result<()> {
        match resource {
            ResourceRef::Table(id) => {
                let table = self
                    .working
                    .tables
                    .get_mut(&id)
                    .ok_or_else(|| StoreError::missing("table", id))?;
                table.status = status;
            }
            ResourceRef::TableGroup(id) => {
                let group = self
                    .working
                    .groups
                    .get_mut(&id)
                    .ok_or_else(|| StoreError::missing("table group", id))?;
                group.status = status;
                for table_id in group.table_ids.clone() {
                    if let Some(table) = self.working.tables.get_mut(&table_id) {
                        table.status = status;
                    }
                }
            }
        }
        Ok(())
    }

    async fn lock_resource(&mut self, resource: ResourceRef) -> Result<()> {
        // The whole unit already holds the store lock.
        let exists = match resource {
            ResourceRef::Table(id) => self.working.tables.contains_key(&id),
            ResourceRef::TableGroup(id) => self.working.groups.contains_key(&id),
        };
        if exists {
            Ok(())
        } else {
            Err(StoreError::missing("resource", resource))
        }
    }

    async fn insert_dish(&mut self, dish: &Dish) -> Result<()> {
        self.working.dishes.insert(dish.id, dish.clone());
        Ok(())
    }

    async fn get_dish(&mut self, id: DishId) -> Result<Option<Dish>> {
        Ok(self.working.dishes.get(&id).cloned())
    }

    async fn insert_user(&mut self, user: &User) -> Result<()> {
        if self
            .working
            .users
            .values()
            .any(|u| u.username == user.username)
        {
            return Err(StoreError::Duplicate {
                entity: "user",
                key: user.username.clone(),
            });
        }
        self.working.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&mut self, id: UserId) -> Result<Option<User>> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn update_user(&mut self, user: &User) -> Result<()> {
        replace(&mut self.working.users, user.id, user, "user")
    }

    async fn insert_reservation(&mut self, reservation: &Reservation) -> Result<()> {
        self.working
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn get_reservation(&mut self, id: ReservationId) -> Result<Option<Reservation>> {
        Ok(self.working.reservations.get(&id).cloned())
    }

    async fn update_reservation(&mut self, reservation: &Reservation) -> Result<()> {
        replace(
            &mut self.working.reservations,
            reservation.id,
            reservation,
            "reservation",
        )
    }

    async fn reservations_for_resource(
        &mut self,
        resource: ResourceRef,
    ) -> Result<Vec<Reservation>> {
        let mut found: Vec<_> = self
            .working
            .reservations
            .values()
            .filter(|r| r.resource == resource)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.reservation_time);
        Ok(found)
    }

    async fn confirmed_reservations_before(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Reservation>> {
        let mut found: Vec<_> = self
            .working
            .reservations
            .values()
            .filter(|r| r.status == ReservationStatus::Confirmed && r.reservation_time < cutoff)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.reservation_time);
        Ok(found)
    }

    async fn offense_counts(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<OffenseCount>> {
        let mut counts: HashMap<UserId, u64> = HashMap::new();
        for reservation in self.working.reservations.values() {
            if let Some(user_id) = reservation.user_id
                && reservation.status.counts_as_offense()
                && reservation.created_at >= from
                && reservation.created_at < to
            {
                *counts.entry(user_id).or_default() += 1;
            }
        }
        let mut result: Vec<_> = counts
            .into_iter()
            .map(|(user_id, count)| OffenseCount { user_id, count })
            .collect();
        result.sort_by_key(|c| c.user_id);
        Ok(result)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        if let Some(reservation_id) = order.reservation_id
            && self
                .working
                .orders
                .values()
                .any(|o| o.reservation_id == Some(reservation_id))
        {
            return Err(StoreError::Duplicate {
                entity: "order for reservation",
                key: reservation_id.to_string(),
            });
        }
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        replace(&mut self.working.orders, order.id, order, "order")
    }

    async fn active_orders_for_resource(&mut self, resource: ResourceRef) -> Result<Vec<Order>> {
        let mut found: Vec<_> = self
            .working
            .orders
            .values()
            .filter(|o| o.resource == resource && o.status.is_active())
            .cloned()
            .collect();
        found.sort_by_key(|o| o.created_at);
        Ok(found)
    }

    async fn order_for_reservation(
        &mut self,
        reservation_id: ReservationId,
    ) -> Result<Option<Order>> {
        Ok(self
            .working
            .orders
            .values()
            .find(|o| o.reservation_id == Some(reservation_id))
            .cloned())
    }

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<()> {
        if !self.working.orders.contains_key(&item.order_id) {
            return Err(StoreError::missing("order", item.order_id));
        }
        self.working.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn get_order_item(&mut self, id: OrderItemId) -> Result<Option<OrderItem>> {
        Ok(self.working.items.get(&id).cloned())
    }

    async fn update_order_item(&mut self, item: &OrderItem) -> Result<()> {
        replace(&mut self.working.items, item.id, item, "order item")
    }

    async fn delete_order_item(&mut self, id: OrderItemId) -> Result<()> {
        self.working
            .items
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::missing("order item", id))
    }

    async fn items_for_order(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let mut found: Vec<_> = self
            .working
            .items
            .values()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect();
        found.sort_by_key(|i| (i.created_at, i.id));
        Ok(found)
    }

    async fn insert_voucher(&mut self, voucher: &Voucher) -> Result<()> {
        if self
            .working
            .vouchers
            .values()
            .any(|v| v.code == voucher.code)
        {
            return Err(StoreError::Duplicate {
                entity: "voucher",
                key: voucher.code.clone(),
            });
        }
        self.working.vouchers.insert(voucher.id, voucher.clone());
        Ok(())
    }

    async fn get_voucher(&mut self, id: VoucherId) -> Result<Option<Voucher>> {
        Ok(self.working.vouchers.get(&id).cloned())
    }

    async fn get_voucher_by_code(&mut self, code: &str) -> Result<Option<Voucher>> {
        Ok(self
            .working
            .vouchers
            .values()
            .find(|v| v.code == code)
            .cloned())
    }

    async fn update_voucher(&mut self, voucher: &Voucher) -> Result<()> {
        replace(&mut self.working.vouchers, voucher.id, voucher, "voucher")
    }

    async fn insert_voucher_usage(&mut self, usage: &VoucherUsage) -> Result<()> {
        self.working.voucher_usages.push(usage.clone());
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        if self
            .working
            .payments
            .values()
            .any(|p| p.transaction_ref == payment.transaction_ref)
        {
            return Err(StoreError::Duplicate {
                entity: "payment",
                key: payment.transaction_ref.clone(),
            });
        }
        self.working.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<()> {
        replace(&mut self.working.payments, payment.id, payment, "payment")
    }

    async fn get_payment_by_ref(&mut self, transaction_ref: &str) -> Result<Option<Payment>> {
        Ok(self
            .working
            .payments
            .values()
            .find(|p| p.transaction_ref == transaction_ref)
            .cloned())
    }

    async fn payments_for(&mut self, target: PaymentTarget) -> Result<Vec<Payment>> {
        let mut found: Vec<_> = self
            .working
            .payments
            .values()
            .filter(|p| p.target == target)
            .cloned()
            .collect();
        found.sort_by_key(|p| p.created_at);
        Ok(found)
    }

    async fn settle_payment(
        &mut self,
        transaction_ref: &str,
        status: PaymentStatus,
        gateway_transaction_no: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(payment) = self
            .working
            .payments
            .values_mut()
            .find(|p| p.transaction_ref == transaction_ref)
        else {
            return Err(StoreError::missing("payment", transaction_ref));
        };
        if payment.status != PaymentStatus::Pending {
            return Ok(false);
        }
        payment.status = status;
        payment.gateway_transaction_no = gateway_transaction_no.map(str::to_string);
        payment.updated_at = at;
        Ok(true)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, PaymentMethod};

    #[tokio::test]
    async fn commit_publishes_writes() {
        let store = InMemoryStore::new();
        let table = Table::new("T1", 4);

        let mut uow = store.begin().await.unwrap();
        uow.insert_table(&table).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        assert_eq!(uow.get_table(table.id).await.unwrap(), Some(table));
    }

    #[tokio::test]
    async fn dropping_a_unit_rolls_back() {
        let store = InMemoryStore::new();
        let table = Table::new("T1", 4);

        {
            let mut uow = store.begin().await.unwrap();
            uow.insert_table(&table).await.unwrap();
        }

        let mut uow = store.begin().await.unwrap();
        assert_eq!(uow.get_table(table.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn group_status_cascades_to_members() {
        let store = InMemoryStore::new();
        let a = Table::new("A", 2);
        let b = Table::new("B", 2);
        let group = TableGroup::new("AB", &[a.clone(), b.clone()]);

        let mut uow = store.begin().await.unwrap();
        uow.insert_table(&a).await.unwrap();
        uow.insert_table(&b).await.unwrap();
        uow.insert_table_group(&group).await.unwrap();
        uow.set_resource_status(ResourceRef::TableGroup(group.id), ResourceStatus::Occupied)
            .await
            .unwrap();

        assert_eq!(
            uow.get_table(a.id).await.unwrap().unwrap().status,
            ResourceStatus::Occupied
        );
        assert_eq!(
            uow.get_table(b.id).await.unwrap().unwrap().status,
            ResourceStatus::Occupied
        );

        let groups = uow.groups_containing(a.id).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id, group.id);
        assert!(uow.groups_containing(TableId::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_transaction_ref_is_rejected() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let target = PaymentTarget::Order(OrderId::new());
        let first = Payment::pending(target, Money::vnd(1), PaymentMethod::Vnpay, "ORD_x", now);
        let second = Payment::pending(target, Money::vnd(1), PaymentMethod::Vnpay, "ORD_x", now);

        let mut uow = store.begin().await.unwrap();
        uow.insert_payment(&first).await.unwrap();
        let err = uow.insert_payment(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { entity: "payment", .. }));
    }

    #[tokio::test]
    async fn settle_payment_only_moves_pending() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let payment = Payment::pending(
            PaymentTarget::Order(OrderId::new()),
            Money::vnd(100_000),
            PaymentMethod::Vnpay,
            "ORD_1",
            now,
        );

        let mut uow = store.begin().await.unwrap();
        uow.insert_payment(&payment).await.unwrap();
        assert!(
            uow.settle_payment("ORD_1", PaymentStatus::Completed, Some("123"), now)
                .await
                .unwrap()
        );
        assert!(
            !uow.settle_payment("ORD_1", PaymentStatus::Failed, None, now)
                .await
                .unwrap()
        );
        let stored = uow.get_payment_by_ref("ORD_1").await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);
        assert_eq!(stored.gateway_transaction_no.as_deref(), Some("123"));
    }

    #[tokio::test]
    async fn lock_resource_requires_existing_resource() {
        let store = InMemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let err = uow
            .lock_resource(ResourceRef::Table(TableId::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Missing { .. }));
    }
}
