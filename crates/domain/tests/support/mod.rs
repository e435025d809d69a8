//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{DiscountType, Money, Ranking, ResourceRef};
use domain::{Actor, EngineContext, Engines, FixedClock, RecordingNotifier};
use fanout::{FanOut, RecordingPublisher};
use gateway::{CallbackParams, VnpayConfig, VnpayGateway};
use store::{Dish, InMemoryStore, Store, Table, TableGroup, User, Voucher};

pub const SECRET: &str = "test-secret";

pub struct Harness {
    pub store: InMemoryStore,
    pub clock: FixedClock,
    pub publisher: RecordingPublisher,
    pub notifier: RecordingNotifier,
    pub gateway: VnpayGateway,
    pub engines: Engines,
    pub staff: Actor,
    seq: AtomicU32,
}

/// 10:00 UTC on an ordinary weekday.
pub fn start_of_day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 12, 10, 0, 0).unwrap()
}

impl Harness {
    pub fn new() -> Self {
        let store = InMemoryStore::new();
        let clock = FixedClock::new(start_of_day());
        let publisher = RecordingPublisher::new();
        let notifier = RecordingNotifier::new();
        let gateway = VnpayGateway::new(VnpayConfig::new(
            "TESTCODE",
            SECRET,
            "http://localhost:3000/api/payments/vnpay/return",
        ));

        let ctx = EngineContext::new(Arc::new(store.clone()), Arc::new(gateway.clone()))
            .with_fanout(FanOut::new(Arc::new(publisher.clone())))
            .with_notifier(Arc::new(notifier.clone()))
            .with_clock(Arc::new(clock.clone()));

        Self {
            store,
            clock,
            publisher,
            notifier,
            gateway,
            engines: Engines::new(ctx),
            staff: Actor::staff(common::UserId::new()),
            seq: AtomicU32::new(1),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        use domain::Clock;
        self.clock.now()
    }

    pub fn advance(&self, minutes: i64) {
        self.clock.advance(Duration::minutes(minutes));
    }

    /// Table numbers and usernames are unique per store.
    fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn table(&self, capacity: u32, deposit: i64) -> Table {
        let table = Table::new(format!("T{capacity}-{}", self.next_seq()), capacity)
            .with_deposit(Money::vnd(deposit));
        let mut uow = self.store.begin().await.unwrap();
        uow.insert_table(&table).await.unwrap();
        uow.commit().await.unwrap();
        table
    }

    pub async fn group(&self, tables: &[Table]) -> TableGroup {
        let group = TableGroup::new("Garden", tables);
        let mut uow = self.store.begin().await.unwrap();
        uow.insert_table_group(&group).await.unwrap();
        uow.commit().await.unwrap();
        group
    }

    pub async fn dish(&self, name: &str, price: i64) -> Dish {
        let dish = Dish::new(name, Money::vnd(price));
        let mut uow = self.store.begin().await.unwrap();
        uow.insert_dish(&dish).await.unwrap();
        uow.commit().await.unwrap();
        dish
    }

    pub async fn customer(&self, ranking: Ranking) -> (User, Actor) {
        let mut user = User::customer(format!("guest{}", self.next_seq()));
        user.ranking = ranking;
        let mut uow = self.store.begin().await.unwrap();
        uow.insert_user(&user).await.unwrap();
        uow.commit().await.unwrap();
        let actor = Actor::customer(user.id);
        (user, actor)
    }

    pub async fn voucher(
        &self,
        code: &str,
        kind: DiscountType,
        value: i64,
        max_uses: Option<u32>,
    ) -> Voucher {
        let mut voucher = Voucher::new(code, kind, value);
        voucher.max_uses = max_uses;
        let mut uow = self.store.begin().await.unwrap();
        uow.insert_voucher(&voucher).await.unwrap();
        uow.commit().await.unwrap();
        voucher
    }

    pub async fn user(&self, id: common::UserId) -> User {
        let mut uow = self.store.begin().await.unwrap();
        uow.get_user(id).await.unwrap().unwrap()
    }

    pub async fn resource_status(&self, resource: ResourceRef) -> common::ResourceStatus {
        let mut uow = self.store.begin().await.unwrap();
        match resource {
            ResourceRef::Table(id) => uow.get_table(id).await.unwrap().unwrap().status,
            ResourceRef::TableGroup(id) => uow.get_table_group(id).await.unwrap().unwrap().status,
        }
    }

    /// A callback as the gateway would send it for `reference`.
    pub fn callback(&self, reference: &str, amount: Money, response_code: &str) -> CallbackParams {
        let mut params = CallbackParams::new();
        params.insert("vnp_Amount".into(), (amount.amount() * 100).to_string());
        params.insert("vnp_BankCode".into(), "NCB".into());
        params.insert("vnp_ResponseCode".into(), response_code.into());
        params.insert("vnp_TmnCode".into(), "TESTCODE".into());
        params.insert("vnp_TransactionNo".into(), "14226112".into());
        params.insert("vnp_TxnRef".into(), reference.into());
        self.gateway.sign_params(&mut params).unwrap();
        params
    }
}
