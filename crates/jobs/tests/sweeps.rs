use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{
    Money, OrderStatus, ReservationStatus, ResourceRef, ResourceStatus, UserId, UserRole,
};
use domain::{
    Actor, Clock, CreateReservation, EngineContext, FixedClock, ReservationEngine,
};
use fanout::{EventName, FanOut, RecordingPublisher};
use gateway::{VnpayConfig, VnpayGateway};
use jobs::{AutoCancelScheduler, SweepConfig, auto_cancel_late_reservations, ban_repeat_offenders};
use store::{InMemoryStore, Reservation, Store, Table, User};
use tokio_util::sync::CancellationToken;

struct Fixture {
    store: InMemoryStore,
    clock: FixedClock,
    publisher: RecordingPublisher,
    ctx: EngineContext,
    staff: Actor,
}

impl Fixture {
    fn new() -> Self {
        let store = InMemoryStore::new();
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 12, 10, 0, 0).unwrap());
        let publisher = RecordingPublisher::new();
        let gateway = VnpayGateway::new(VnpayConfig::new(
            "TESTCODE",
            "test-secret",
            "http://localhost:3000/api/payments/vnpay/return",
        ));
        let ctx = EngineContext::new(Arc::new(store.clone()), Arc::new(gateway))
            .with_fanout(FanOut::new(Arc::new(publisher.clone())))
            .with_clock(Arc::new(clock.clone()));
        Self {
            store,
            clock,
            publisher,
            ctx,
            staff: Actor::staff(UserId::new()),
        }
    }

    fn engine(&self) -> ReservationEngine {
        ReservationEngine::new(self.ctx.clone())
    }

    async fn table(&self) -> Table {
        let mut table = Table::new("A", 4);
        table.table_number = format!("A-{}", table.id);
        let mut uow = self.store.begin().await.unwrap();
        uow.insert_table(&table).await.unwrap();
        uow.commit().await.unwrap();
        table
    }

    async fn user(&self, role: UserRole) -> User {
        let mut user = User::with_role("diner", role);
        user.username = format!("diner-{}", user.id);
        let mut uow = self.store.begin().await.unwrap();
        uow.insert_user(&user).await.unwrap();
        uow.commit().await.unwrap();
        user
    }

    async fn reload_user(&self, id: UserId) -> User {
        let mut uow = self.store.begin().await.unwrap();
        uow.get_user(id).await.unwrap().unwrap()
    }

    async fn table_status(&self, table: &Table) -> ResourceStatus {
        let mut uow = self.store.begin().await.unwrap();
        uow.get_table(table.id).await.unwrap().unwrap().status
    }

    /// Books `table` for `minutes` from now, confirmed without a deposit.
    async fn confirmed_booking(&self, table: &Table, minutes: i64) -> Reservation {
        self.engine()
            .create_reservation(
                &self.staff,
                CreateReservation::new(table.id, self.clock.now() + Duration::minutes(minutes), 2),
            )
            .await
            .unwrap()
            .reservation
    }

    /// Stores a reservation in `status` directly, created at `created_at`.
    async fn past_reservation(
        &self,
        user: &User,
        table: &Table,
        status: ReservationStatus,
        created_at: DateTime<Utc>,
    ) {
        let reservation = Reservation {
            id: common::ReservationId::new(),
            user_id: Some(user.id),
            resource: ResourceRef::Table(table.id),
            reservation_time: created_at + Duration::days(1),
            duration_minutes: 90,
            num_people: 2,
            status,
            deposit_amount: Money::zero(),
            pre_order_items: Vec::new(),
            event_id: None,
            event_fee: Money::zero(),
            notes: None,
            created_at,
            updated_at: created_at,
        };
        let mut uow = self.store.begin().await.unwrap();
        uow.insert_reservation(&reservation).await.unwrap();
        uow.commit().await.unwrap();
    }
}

mod auto_cancel {
    use super::*;

    #[tokio::test]
    async fn unseated_reservation_is_cancelled_after_the_grace_period() {
        let f = Fixture::new();
        let table = f.table().await;
        let reservation = f.confirmed_booking(&table, 60).await;
        let config = SweepConfig::default();

        // 29 minutes late: still inside the grace period.
        f.clock.advance(Duration::minutes(89));
        let report = auto_cancel_late_reservations(&f.engine(), &config).await.unwrap();
        assert_eq!(report.affected, 0);

        f.clock.advance(Duration::minutes(2));
        let report = auto_cancel_late_reservations(&f.engine(), &config).await.unwrap();
        assert_eq!(report.examined, 1);
        assert_eq!(report.affected, 1);
        assert_eq!(report.failed, 0);

        let view = f
            .engine()
            .get_reservation(&f.staff, reservation.id)
            .await
            .unwrap();
        assert_eq!(view.reservation.status, ReservationStatus::Cancelled);
        assert_eq!(view.order.map(|o| o.status), Some(OrderStatus::Cancelled));
        assert_eq!(f.table_status(&table).await, ResourceStatus::Available);
        assert!(
            f.publisher
                .names()
                .await
                .contains(&EventName::ReservationStatusChanged)
        );

        // Nothing left to do on the next pass.
        let report = auto_cancel_late_reservations(&f.engine(), &config).await.unwrap();
        assert_eq!(report.examined, 0);
    }

    #[tokio::test]
    async fn checked_in_reservation_is_left_alone() {
        let f = Fixture::new();
        let table = f.table().await;
        let reservation = f.confirmed_booking(&table, 30).await;

        f.clock.advance(Duration::minutes(35));
        f.engine().check_in(&f.staff, reservation.id).await.unwrap();
        f.clock.advance(Duration::minutes(60));

        let report = auto_cancel_late_reservations(&f.engine(), &SweepConfig::default())
            .await
            .unwrap();
        assert_eq!(report.affected, 0);

        let view = f
            .engine()
            .get_reservation(&f.staff, reservation.id)
            .await
            .unwrap();
        assert_eq!(view.reservation.status, ReservationStatus::Confirmed);
        assert_eq!(f.table_status(&table).await, ResourceStatus::Occupied);
    }

    #[tokio::test]
    async fn scheduler_sweeps_at_startup_and_stops_on_shutdown() {
        let f = Fixture::new();
        let table = f.table().await;
        let reservation = f.confirmed_booking(&table, 15).await;
        f.clock.advance(Duration::minutes(60));

        let shutdown = CancellationToken::new();
        let config = SweepConfig::default().with_interval(StdDuration::from_millis(20));
        let handle = tokio::spawn(
            AutoCancelScheduler::new(f.ctx.clone(), config, shutdown.clone()).run(),
        );

        tokio::time::sleep(StdDuration::from_millis(100)).await;
        shutdown.cancel();
        tokio::time::timeout(StdDuration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();

        let view = f
            .engine()
            .get_reservation(&f.staff, reservation.id)
            .await
            .unwrap();
        assert_eq!(view.reservation.status, ReservationStatus::Cancelled);
    }
}

mod bans {
    use super::*;

    #[tokio::test]
    async fn fifth_offense_in_a_month_bans_the_customer() {
        let f = Fixture::new();
        let table = f.table().await;
        let now = f.clock.now();
        let repeat = f.user(UserRole::Customer).await;
        let occasional = f.user(UserRole::Customer).await;

        for i in 0..5 {
            let status = if i % 2 == 0 {
                ReservationStatus::Cancelled
            } else {
                ReservationStatus::NoShow
            };
            f.past_reservation(&repeat, &table, status, now - Duration::days(i))
                .await;
        }
        for i in 0..4 {
            f.past_reservation(
                &occasional,
                &table,
                ReservationStatus::Cancelled,
                now - Duration::days(i),
            )
            .await;
        }

        let report = ban_repeat_offenders(&f.ctx, &SweepConfig::default())
            .await
            .unwrap();
        assert_eq!(report.examined, 1);
        assert_eq!(report.affected, 1);

        assert_eq!(f.reload_user(repeat.id).await.deactivated_at, Some(now));
        assert!(!f.reload_user(occasional.id).await.is_banned());

        // A second run finds the customer already banned.
        let report = ban_repeat_offenders(&f.ctx, &SweepConfig::default())
            .await
            .unwrap();
        assert_eq!(report.affected, 0);
        assert_eq!(f.reload_user(repeat.id).await.deactivated_at, Some(now));
    }

    #[tokio::test]
    async fn offenses_from_last_month_do_not_count() {
        let f = Fixture::new();
        let table = f.table().await;
        let user = f.user(UserRole::Customer).await;
        let last_month = Utc.with_ymd_and_hms(2024, 2, 20, 10, 0, 0).unwrap();

        for i in 0..3 {
            f.past_reservation(
                &user,
                &table,
                ReservationStatus::Cancelled,
                last_month + Duration::days(i),
            )
            .await;
        }
        for i in 0..2 {
            f.past_reservation(
                &user,
                &table,
                ReservationStatus::NoShow,
                f.clock.now() - Duration::days(i),
            )
            .await;
        }

        let report = ban_repeat_offenders(&f.ctx, &SweepConfig::default())
            .await
            .unwrap();
        assert_eq!(report.affected, 0);
        assert!(!f.reload_user(user.id).await.is_banned());
    }

    #[tokio::test]
    async fn staff_accounts_are_never_banned() {
        let f = Fixture::new();
        let table = f.table().await;
        let employee = f.user(UserRole::Employee).await;

        for i in 0..6 {
            f.past_reservation(
                &employee,
                &table,
                ReservationStatus::Cancelled,
                f.clock.now() - Duration::hours(i),
            )
            .await;
        }

        let report = ban_repeat_offenders(&f.ctx, &SweepConfig::default())
            .await
            .unwrap();
        assert_eq!(report.examined, 1);
        assert_eq!(report.affected, 0);
        assert!(!f.reload_user(employee.id).await.is_banned());
    }

    #[tokio::test]
    async fn threshold_is_configurable() {
        let f = Fixture::new();
        let table = f.table().await;
        let user = f.user(UserRole::Customer).await;
        for i in 0..2 {
            f.past_reservation(
                &user,
                &table,
                ReservationStatus::Cancelled,
                f.clock.now() - Duration::hours(i),
            )
            .await;
        }

        let config = SweepConfig::default().with_ban_threshold(2);
        let report = ban_repeat_offenders(&f.ctx, &config).await.unwrap();
        assert_eq!(report.affected, 1);
        assert!(f.reload_user(user.id).await.is_banned());
    }
}
