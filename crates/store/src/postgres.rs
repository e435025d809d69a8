use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow, types::Json};
use uuid::Uuid;

use common::{
    DishId, Money, OrderId, OrderItemId, PaymentId, PaymentStatus, ReservationId, ResourceRef,
    ResourceStatus, TableGroupId, TableId, UserId, VoucherId,
};

use crate::{
    Dish, Order, OrderItem, Payment, PaymentTarget, PreOrderItem, Reservation, Result, StoreError,
    Table, TableGroup, User, Voucher, VoucherUsage,
    store::{OffenseCount, Store, UnitOfWork},
};

const RESERVATION_COLUMNS: &str = "id, user_id, table_id, table_group_id, reservation_time, \
    duration_minutes, num_people, status, deposit_amount, pre_order_items, event_id, event_fee, \
    notes, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, user_id, table_id, table_group_id, reservation_id, voucher_id, \
    status, payment_status, payment_method, waiting_kitchen_confirmation, total_amount, \
    voucher_discount_amount, event_fee, deposit_amount, final_amount, loyalty_credited, \
    created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, dish_id, quantity, price, status, created_at, updated_at";

const VOUCHER_COLUMNS: &str = "id, code, discount_type, value, min_order_value, max_uses, \
    current_uses, expires_at, active";

const PAYMENT_COLUMNS: &str = "id, order_id, reservation_id, amount, method, status, \
    transaction_ref, gateway_transaction_no, created_at, updated_at";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

fn to_i32(value: u32, column: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::Decode(format!("{column} out of range: {value}")))
}

fn to_u32(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Decode(format!("{column} is negative: {value}")))
}

fn resource_from_row(row: &PgRow) -> Result<ResourceRef> {
    let table = row.try_get::<Option<Uuid>, _>("table_id")?.map(TableId::from_uuid);
    let group = row
        .try_get::<Option<Uuid>, _>("table_group_id")?
        .map(TableGroupId::from_uuid);
    ResourceRef::from_parts(table, group)
        .ok_or_else(|| StoreError::Decode("row must reference exactly one resource".to_string()))
}

fn unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.constraint() == Some(constraint))
}

fn check_affected(rows: u64, entity: &'static str, id: impl ToString) -> Result<()> {
    if rows == 0 {
        Err(StoreError::missing(entity, id))
    } else {
        Ok(())
    }
}

fn row_to_table(row: PgRow) -> Result<Table> {
    Ok(Table {
        id: TableId::from_uuid(row.try_get("id")?),
        table_number: row.try_get("table_number")?,
        capacity: to_u32(row.try_get("capacity")?, "capacity")?,
        deposit: Money::vnd(row.try_get("deposit")?),
        cancel_minutes: row.try_get("cancel_minutes")?,
        status: row.try_get::<String, _>("status")?.parse()?,
    })
}

fn row_to_group(row: PgRow) -> Result<TableGroup> {
    let Json(table_ids): Json<Vec<TableId>> = row.try_get("table_ids")?;
    Ok(TableGroup {
        id: TableGroupId::from_uuid(row.try_get("id")?),
        group_name: row.try_get("group_name")?,
        table_ids,
        total_capacity: to_u32(row.try_get("total_capacity")?, "total_capacity")?,
        deposit: Money::vnd(row.try_get("deposit")?),
        cancel_minutes: row.try_get("cancel_minutes")?,
        status: row.try_get::<String, _>("status")?.parse()?,
    })
}

fn row_to_user(row: PgRow) -> Result<User> {
    Ok(User {
        id: UserId::from_uuid(row.try_get("id")?),
        username: row.try_get("username")?,
        role: row.try_get::<String, _>("role")?.parse()?,
        ranking: row.try_get::<String, _>("ranking")?.parse()?,
        points: row.try_get("points")?,
        deactivated_at: row.try_get("deactivated_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_reservation(row: PgRow) -> Result<Reservation> {
    let Json(pre_order_items): Json<Vec<PreOrderItem>> = row.try_get("pre_order_items")?;
    Ok(Reservation {
        id: ReservationId::from_uuid(row.try_get("id")?),
        user_id: row.try_get::<Option<Uuid>, _>("user_id")?.map(UserId::from_uuid),
        resource: resource_from_row(&row)?,
        reservation_time: row.try_get("reservation_time")?,
        duration_minutes: row.try_get("duration_minutes")?,
        num_people: to_u32(row.try_get("num_people")?, "num_people")?,
        status: row.try_get::<String, _>("status")?.parse()?,
        deposit_amount: Money::vnd(row.try_get("deposit_amount")?),
        pre_order_items,
        event_id: row.try_get("event_id")?,
        event_fee: Money::vnd(row.try_get("event_fee")?),
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order(row: PgRow) -> Result<Order> {
    let payment_method = match row.try_get::<Option<String>, _>("payment_method")? {
        Some(method) => Some(method.parse()?),
        None => None,
    };
    Ok(Order {
        id: OrderId::from_uuid(row.try_get("id")?),
        user_id: row.try_get::<Option<Uuid>, _>("user_id")?.map(UserId::from_uuid),
        resource: resource_from_row(&row)?,
        reservation_id: row
            .try_get::<Option<Uuid>, _>("reservation_id")?
            .map(ReservationId::from_uuid),
        voucher_id: row
            .try_get::<Option<Uuid>, _>("voucher_id")?
            .map(VoucherId::from_uuid),
        status: row.try_get::<String, _>("status")?.parse()?,
        payment_status: row.try_get::<String, _>("payment_status")?.parse()?,
        payment_method,
        waiting_kitchen_confirmation: row.try_get("waiting_kitchen_confirmation")?,
        total_amount: Money::vnd(row.try_get("total_amount")?),
        voucher_discount_amount: Money::vnd(row.try_get("voucher_discount_amount")?),
        event_fee: Money::vnd(row.try_get("event_fee")?),
        deposit_amount: Money::vnd(row.try_get("deposit_amount")?),
        final_amount: Money::vnd(row.try_get("final_amount")?),
        loyalty_credited: row.try_get("loyalty_credited")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_item(row: PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        id: OrderItemId::from_uuid(row.try_get("id")?),
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        dish_id: DishId::from_uuid(row.try_get("dish_id")?),
        quantity: to_u32(row.try_get("quantity")?, "quantity")?,
        price: Money::vnd(row.try_get("price")?),
        status: row.try_get::<String, _>("status")?.parse()?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_voucher(row: PgRow) -> Result<Voucher> {
    let max_uses = match row.try_get::<Option<i32>, _>("max_uses")? {
        Some(v) => Some(to_u32(v, "max_uses")?),
        None => None,
    };
    Ok(Voucher {
        id: VoucherId::from_uuid(row.try_get("id")?),
        code: row.try_get("code")?,
        discount_type: row.try_get::<String, _>("discount_type")?.parse()?,
        value: row.try_get("value")?,
        min_order_value: Money::vnd(row.try_get("min_order_value")?),
        max_uses,
        current_uses: to_u32(row.try_get("current_uses")?, "current_uses")?,
        expires_at: row.try_get("expires_at")?,
        active: row.try_get("active")?,
    })
}

fn row_to_payment(row: PgRow) -> Result<Payment> {
    let order = row.try_get::<Option<Uuid>, _>("order_id")?;
    let reservation = row.try_get::<Option<Uuid>, _>("reservation_id")?;
    let target = match (order, reservation) {
        (Some(id), None) => PaymentTarget::Order(OrderId::from_uuid(id)),
        (None, Some(id)) => PaymentTarget::Reservation(ReservationId::from_uuid(id)),
        _ => {
            return Err(StoreError::Decode(
                "payment must reference exactly one target".to_string(),
            ));
        }
    };
    Ok(Payment {
        id: PaymentId::from_uuid(row.try_get("id")?),
        target,
        amount: Money::vnd(row.try_get("amount")?),
        method: row.try_get::<String, _>("method")?.parse()?,
        status: row.try_get::<String, _>("status")?.parse()?,
        transaction_ref: row.try_get("transaction_ref")?,
        gateway_transaction_no: row.try_get("gateway_transaction_no")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn payment_target_columns(target: PaymentTarget) -> (Option<Uuid>, Option<Uuid>) {
    match target {
        PaymentTarget::Order(id) => (Some(id.as_uuid()), None),
        PaymentTarget::Reservation(id) => (None, Some(id.as_uuid())),
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn insert_table(&mut self, table: &Table) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO restaurant_tables (id, table_number, capacity, deposit, cancel_minutes, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(table.id.as_uuid())
        .bind(&table.table_number)
        .bind(to_i32(table.capacity, "capacity")?)
        .bind(table.deposit.amount())
        .bind(table.cancel_minutes)
        .bind(table.status.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if unique_violation(&e, "restaurant_tables_number_unique") {
                return StoreError::Duplicate {
                    entity: "table",
                    key: table.table_number.clone(),
                };
            }
            StoreError::Database(e)
        })?;
        Ok(())
    }

    async fn get_table(&mut self, id: TableId) -> Result<Option<Table>> {
        let row = sqlx::query(
            "SELECT id, table_number, capacity, deposit, cancel_minutes, status \
             FROM restaurant_tables WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_table).transpose()
    }

    async fn insert_table_group(&mut self, group: &TableGroup) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO table_groups (id, group_name, table_ids, total_capacity, deposit, cancel_minutes, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(group.id.as_uuid())
        .bind(&group.group_name)
        .bind(Json(&group.table_ids))
        .bind(to_i32(group.total_capacity, "total_capacity")?)
        .bind(group.deposit.amount())
        .bind(group.cancel_minutes)
        .bind(group.status.as_str())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_table_group(&mut self, id: TableGroupId) -> Result<Option<TableGroup>> {
        let row = sqlx::query(
            "SELECT id, group_name, table_ids, total_capacity, deposit, cancel_minutes, status \
             FROM table_groups WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_group).transpose()
    }

    async fn groups_containing(&mut self, table: TableId) -> Result<Vec<TableGroup>> {
        let rows = sqlx::query(
            "SELECT id, group_name, table_ids, total_capacity, deposit, cancel_minutes, status \
             FROM table_groups WHERE table_ids @> $1",
        )
        .bind(Json([table]))
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(row_to_group).collect()
    }

    async fn set_resource_status(
        &mut self,
        resource: ResourceRef,
        status: ResourceStatus,
    ) -> Result<()> {
        match resource {
            ResourceRef::Table(id) => {
                let result = sqlx::query("UPDATE restaurant_tables SET status = $1 WHERE id = $2")
                    .bind(status.as_str())
                    .bind(id.as_uuid())
                    .execute(&mut *self.tx)
                    .await?;
                check_affected(result.rows_affected(), "table", id)
            }
            ResourceRef::TableGroup(id) => {
                let group = self
                    .get_table_group(id)
                    .await?
                    .ok_or_else(|| StoreError::missing("table group", id))?;
                sqlx::query("UPDATE table_groups SET status = $1 WHERE id = $2")
                    .bind(status.as_str())
                    .bind(id.as_uuid())
                    .execute(&mut *self.tx)
                    .await?;
                let members: Vec<Uuid> = group.table_ids.iter().map(|t| t.as_uuid()).collect();
                sqlx::query("UPDATE restaurant_tables SET status = $1 WHERE id = ANY($2)")
                    .bind(status.as_str())
                    .bind(members)
                    .execute(&mut *self.tx)
                    .await?;
                Ok(())
            }
        }
    }

    async fn lock_resource(&mut self, resource: ResourceRef) -> Result<()> {
        let (sql, id) = match resource {
            ResourceRef::Table(id) => (
                "SELECT id FROM restaurant_tables WHERE id = $1 FOR UPDATE",
                id.as_uuid(),
            ),
            ResourceRef::TableGroup(id) => (
                "SELECT id FROM table_groups WHERE id = $1 FOR UPDATE",
                id.as_uuid(),
            ),
        };
        let row = sqlx::query(sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        match row {
            Some(_) => Ok(()),
            None => Err(StoreError::missing("resource", resource)),
        }
    }

    async fn insert_dish(&mut self, dish: &Dish) -> Result<()> {
        sqlx::query("INSERT INTO dishes (id, name, price, active) VALUES ($1, $2, $3, $4)")
            .bind(dish.id.as_uuid())
            .bind(&dish.name)
            .bind(dish.price.amount())
            .bind(dish.active)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn get_dish(&mut self, id: DishId) -> Result<Option<Dish>> {
        let row = sqlx::query("SELECT id, name, price, active FROM dishes WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        match row {
            Some(row) => Ok(Some(Dish {
                id: DishId::from_uuid(row.try_get("id")?),
                name: row.try_get("name")?,
                price: Money::vnd(row.try_get("price")?),
                active: row.try_get("active")?,
            })),
            None => Ok(None),
        }
    }

    async fn insert_user(&mut self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, role, ranking, points, deactivated_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.username)
        .bind(user.role.as_str())
        .bind(user.ranking.as_str())
        .bind(user.points)
        .bind(user.deactivated_at)
        .bind(user.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if unique_violation(&e, "users_username_unique") {
                return StoreError::Duplicate {
                    entity: "user",
                    key: user.username.clone(),
                };
            }
            StoreError::Database(e)
        })?;
        Ok(())
    }

    async fn get_user(&mut self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, role, ranking, points, deactivated_at, created_at \
             FROM users WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_user).transpose()
    }

    async fn update_user(&mut self, user: &User) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET role = $1, ranking = $2, points = $3, deactivated_at = $4 WHERE id = $5",
        )
        .bind(user.role.as_str())
        .bind(user.ranking.as_str())
        .bind(user.points)
        .bind(user.deactivated_at)
        .bind(user.id.as_uuid())
        .execute(&mut *self.tx)
        .await?;
        check_affected(result.rows_affected(), "user", user.id)
    }

    async fn insert_reservation(&mut self, r: &Reservation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reservations (id, user_id, table_id, table_group_id, reservation_time,
                duration_minutes, num_people, status, deposit_amount, pre_order_items, event_id,
                event_fee, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(r.id.as_uuid())
        .bind(r.user_id.map(|u| u.as_uuid()))
        .bind(r.resource.table_id().map(|t| t.as_uuid()))
        .bind(r.resource.table_group_id().map(|g| g.as_uuid()))
        .bind(r.reservation_time)
        .bind(r.duration_minutes)
        .bind(to_i32(r.num_people, "num_people")?)
        .bind(r.status.as_str())
        .bind(r.deposit_amount.amount())
        .bind(Json(&r.pre_order_items))
        .bind(r.event_id)
        .bind(r.event_fee.amount())
        .bind(&r.notes)
        .bind(r.created_at)
        .bind(r.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_reservation(&mut self, id: ReservationId) -> Result<Option<Reservation>> {
        let row = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_reservation).transpose()
    }

    async fn update_reservation(&mut self, r: &Reservation) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE reservations SET table_id = $1, table_group_id = $2, reservation_time = $3,
                duration_minutes = $4, num_people = $5, status = $6, deposit_amount = $7,
                pre_order_items = $8, event_id = $9, event_fee = $10, notes = $11, updated_at = $12
            WHERE id = $13
            "#,
        )
        .bind(r.resource.table_id().map(|t| t.as_uuid()))
        .bind(r.resource.table_group_id().map(|g| g.as_uuid()))
        .bind(r.reservation_time)
        .bind(r.duration_minutes)
        .bind(to_i32(r.num_people, "num_people")?)
        .bind(r.status.as_str())
        .bind(r.deposit_amount.amount())
        .bind(Json(&r.pre_order_items))
        .bind(r.event_id)
        .bind(r.event_fee.amount())
        .bind(&r.notes)
        .bind(r.updated_at)
        .bind(r.id.as_uuid())
        .execute(&mut *self.tx)
        .await?;
        check_affected(result.rows_affected(), "reservation", r.id)
    }

    async fn reservations_for_resource(
        &mut self,
        resource: ResourceRef,
    ) -> Result<Vec<Reservation>> {
        let column = match resource {
            ResourceRef::Table(_) => "table_id",
            ResourceRef::TableGroup(_) => "table_group_id",
        };
        let id = match resource {
            ResourceRef::Table(id) => id.as_uuid(),
            ResourceRef::TableGroup(id) => id.as_uuid(),
        };
        let rows = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE {column} = $1 \
             ORDER BY reservation_time ASC"
        ))
        .bind(id)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(row_to_reservation).collect()
    }

    async fn confirmed_reservations_before(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Reservation>> {
        let rows = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE status = 'confirmed' AND reservation_time < $1 \
             ORDER BY reservation_time ASC"
        ))
        .bind(cutoff)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(row_to_reservation).collect()
    }

    async fn offense_counts(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<OffenseCount>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, COUNT(*) AS offenses
            FROM reservations
            WHERE user_id IS NOT NULL
              AND status IN ('cancelled', 'no_show')
              AND created_at >= $1 AND created_at < $2
            GROUP BY user_id
            ORDER BY user_id
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter()
            .map(|row| {
                let count: i64 = row.try_get("offenses")?;
                Ok(OffenseCount {
                    user_id: UserId::from_uuid(row.try_get("user_id")?),
                    count: u64::try_from(count).unwrap_or_default(),
                })
            })
            .collect()
    }

    async fn insert_order(&mut self, o: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, table_id, table_group_id, reservation_id, voucher_id,
                status, payment_status, payment_method, waiting_kitchen_confirmation, total_amount,
                voucher_discount_amount, event_fee, deposit_amount, final_amount, loyalty_credited,
                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(o.id.as_uuid())
        .bind(o.user_id.map(|u| u.as_uuid()))
        .bind(o.resource.table_id().map(|t| t.as_uuid()))
        .bind(o.resource.table_group_id().map(|g| g.as_uuid()))
        .bind(o.reservation_id.map(|r| r.as_uuid()))
        .bind(o.voucher_id.map(|v| v.as_uuid()))
        .bind(o.status.as_str())
        .bind(o.payment_status.as_str())
        .bind(o.payment_method.map(|m| m.as_str()))
        .bind(o.waiting_kitchen_confirmation)
        .bind(o.total_amount.amount())
        .bind(o.voucher_discount_amount.amount())
        .bind(o.event_fee.amount())
        .bind(o.deposit_amount.amount())
        .bind(o.final_amount.amount())
        .bind(o.loyalty_credited)
        .bind(o.created_at)
        .bind(o.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if unique_violation(&e, "orders_reservation_unique") {
                return StoreError::Duplicate {
                    entity: "order for reservation",
                    key: o.reservation_id.map(|r| r.to_string()).unwrap_or_default(),
                };
            }
            StoreError::Database(e)
        })?;
        Ok(())
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_order).transpose()
    }

    async fn update_order(&mut self, o: &Order) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET user_id = $1, table_id = $2, table_group_id = $3, reservation_id = $4,
                voucher_id = $5, status = $6, payment_status = $7, payment_method = $8,
                waiting_kitchen_confirmation = $9, total_amount = $10, voucher_discount_amount = $11,
                event_fee = $12, deposit_amount = $13, final_amount = $14, loyalty_credited = $15,
                updated_at = $16
            WHERE id = $17
            "#,
        )
        .bind(o.user_id.map(|u| u.as_uuid()))
        .bind(o.resource.table_id().map(|t| t.as_uuid()))
        .bind(o.resource.table_group_id().map(|g| g.as_uuid()))
        .bind(o.reservation_id.map(|r| r.as_uuid()))
        .bind(o.voucher_id.map(|v| v.as_uuid()))
        .bind(o.status.as_str())
        .bind(o.payment_status.as_str())
        .bind(o.payment_method.map(|m| m.as_str()))
        .bind(o.waiting_kitchen_confirmation)
        .bind(o.total_amount.amount())
        .bind(o.voucher_discount_amount.amount())
        .bind(o.event_fee.amount())
        .bind(o.deposit_amount.amount())
        .bind(o.final_amount.amount())
        .bind(o.loyalty_credited)
        .bind(o.updated_at)
        .bind(o.id.as_uuid())
        .execute(&mut *self.tx)
        .await?;
        check_affected(result.rows_affected(), "order", o.id)
    }

    async fn active_orders_for_resource(&mut self, resource: ResourceRef) -> Result<Vec<Order>> {
        let (column, id) = match resource {
            ResourceRef::Table(id) => ("table_id", id.as_uuid()),
            ResourceRef::TableGroup(id) => ("table_group_id", id.as_uuid()),
        };
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE {column} = $1 \
             AND status NOT IN ('paid', 'cancelled') ORDER BY created_at ASC"
        ))
        .bind(id)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(row_to_order).collect()
    }

    async fn order_for_reservation(
        &mut self,
        reservation_id: ReservationId,
    ) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE reservation_id = $1"
        ))
        .bind(reservation_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_order).transpose()
    }

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, dish_id, quantity, price, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.order_id.as_uuid())
        .bind(item.dish_id.as_uuid())
        .bind(to_i32(item.quantity, "quantity")?)
        .bind(item.price.amount())
        .bind(item.status.as_str())
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_order_item(&mut self, id: OrderItemId) -> Result<Option<OrderItem>> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_item).transpose()
    }

    async fn update_order_item(&mut self, item: &OrderItem) -> Result<()> {
        let result = sqlx::query(
            "UPDATE order_items SET order_id = $1, quantity = $2, price = $3, status = $4, \
             updated_at = $5 WHERE id = $6",
        )
        .bind(item.order_id.as_uuid())
        .bind(to_i32(item.quantity, "quantity")?)
        .bind(item.price.amount())
        .bind(item.status.as_str())
        .bind(item.updated_at)
        .bind(item.id.as_uuid())
        .execute(&mut *self.tx)
        .await?;
        check_affected(result.rows_affected(), "order item", item.id)
    }

    async fn delete_order_item(&mut self, id: OrderItemId) -> Result<()> {
        let result = sqlx::query("DELETE FROM order_items WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        check_affected(result.rows_affected(), "order item", id)
    }

    async fn items_for_order(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY created_at, id"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(row_to_item).collect()
    }

    async fn insert_voucher(&mut self, v: &Voucher) -> Result<()> {
        let max_uses = match v.max_uses {
            Some(max) => Some(to_i32(max, "max_uses")?),
            None => None,
        };
        sqlx::query(
            r#"
            INSERT INTO vouchers (id, code, discount_type, value, min_order_value, max_uses,
                current_uses, expires_at, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(v.id.as_uuid())
        .bind(&v.code)
        .bind(v.discount_type.as_str())
        .bind(v.value)
        .bind(v.min_order_value.amount())
        .bind(max_uses)
        .bind(to_i32(v.current_uses, "current_uses")?)
        .bind(v.expires_at)
        .bind(v.active)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if unique_violation(&e, "vouchers_code_unique") {
                return StoreError::Duplicate {
                    entity: "voucher",
                    key: v.code.clone(),
                };
            }
            StoreError::Database(e)
        })?;
        Ok(())
    }

    async fn get_voucher(&mut self, id: VoucherId) -> Result<Option<Voucher>> {
        let row = sqlx::query(&format!(
            "SELECT {VOUCHER_COLUMNS} FROM vouchers WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_voucher).transpose()
    }

    async fn get_voucher_by_code(&mut self, code: &str) -> Result<Option<Voucher>> {
        let row = sqlx::query(&format!(
            "SELECT {VOUCHER_COLUMNS} FROM vouchers WHERE code = $1 FOR UPDATE"
        ))
        .bind(code)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_voucher).transpose()
    }

    async fn update_voucher(&mut self, v: &Voucher) -> Result<()> {
        let result = sqlx::query(
            "UPDATE vouchers SET current_uses = $1, active = $2, expires_at = $3 WHERE id = $4",
        )
        .bind(to_i32(v.current_uses, "current_uses")?)
        .bind(v.active)
        .bind(v.expires_at)
        .bind(v.id.as_uuid())
        .execute(&mut *self.tx)
        .await?;
        check_affected(result.rows_affected(), "voucher", v.id)
    }

    async fn insert_voucher_usage(&mut self, usage: &VoucherUsage) -> Result<()> {
        sqlx::query(
            "INSERT INTO voucher_usages (voucher_id, order_id, user_id, used_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(usage.voucher_id.as_uuid())
        .bind(usage.order_id.as_uuid())
        .bind(usage.user_id.map(|u| u.as_uuid()))
        .bind(usage.used_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_payment(&mut self, p: &Payment) -> Result<()> {
        let (order_id, reservation_id) = payment_target_columns(p.target);
        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, reservation_id, amount, method, status,
                transaction_ref, gateway_transaction_no, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(p.id.as_uuid())
        .bind(order_id)
        .bind(reservation_id)
        .bind(p.amount.amount())
        .bind(p.method.as_str())
        .bind(p.status.as_str())
        .bind(&p.transaction_ref)
        .bind(&p.gateway_transaction_no)
        .bind(p.created_at)
        .bind(p.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if unique_violation(&e, "payments_transaction_ref_unique") {
                return StoreError::Duplicate {
                    entity: "payment",
                    key: p.transaction_ref.clone(),
                };
            }
            StoreError::Database(e)
        })?;
        Ok(())
    }

    async fn update_payment(&mut self, p: &Payment) -> Result<()> {
        let result = sqlx::query(
            "UPDATE payments SET amount = $1, method = $2, status = $3, \
             gateway_transaction_no = $4, updated_at = $5 WHERE id = $6",
        )
        .bind(p.amount.amount())
        .bind(p.method.as_str())
        .bind(p.status.as_str())
        .bind(&p.gateway_transaction_no)
        .bind(p.updated_at)
        .bind(p.id.as_uuid())
        .execute(&mut *self.tx)
        .await?;
        check_affected(result.rows_affected(), "payment", p.id)
    }

    async fn get_payment_by_ref(&mut self, transaction_ref: &str) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE transaction_ref = $1"
        ))
        .bind(transaction_ref)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_payment).transpose()
    }

    async fn payments_for(&mut self, target: PaymentTarget) -> Result<Vec<Payment>> {
        let (column, id) = match target {
            PaymentTarget::Order(id) => ("order_id", id.as_uuid()),
            PaymentTarget::Reservation(id) => ("reservation_id", id.as_uuid()),
        };
        let rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE {column} = $1 ORDER BY created_at"
        ))
        .bind(id)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(row_to_payment).collect()
    }

    async fn settle_payment(
        &mut self,
        transaction_ref: &str,
        status: PaymentStatus,
        gateway_transaction_no: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE payments SET status = $1, gateway_transaction_no = $2, updated_at = $3 \
             WHERE transaction_ref = $4 AND status = 'pending'",
        )
        .bind(status.as_str())
        .bind(gateway_transaction_no)
        .bind(at)
        .bind(transaction_ref)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM payments WHERE transaction_ref = $1")
                .bind(transaction_ref)
                .fetch_optional(&mut *self.tx)
                .await?;
        match exists {
            Some(_) => Ok(false),
            None => Err(StoreError::missing("payment", transaction_ref)),
        }
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
