use super::*;
use crate::orders::hooks::HookError;
use crate::orders::stock::InMemoryStockLedger;
use async_trait::async_trait;
use parking_lot::Mutex;

/// Hooks that record every call and can be told to fail
#[derive(Default)]
struct RecordingHooks {
    events: Mutex<Vec<String>>,
    fail: Mutex<bool>,
}

impl RecordingHooks {
    fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn set_failing(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    fn record(&self, event: String) -> Result<(), HookError> {
        self.events.lock().push(event);
        if *self.fail.lock() {
            return Err(HookError::Unavailable("analytics offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderHooks for RecordingHooks {
    async fn on_order_created(&self, order: &Order) -> Result<(), HookError> {
        self.record(format!("created:{}", order.id))
    }

    async fn on_order_updated(
        &self,
        order_id: &str,
        _before: Option<&Order>,
        _after: &Order,
    ) -> Result<(), HookError> {
        self.record(format!("updated:{order_id}"))
    }

    async fn on_order_deleted(&self, order: &Order) -> Result<(), HookError> {
        self.record(format!("deleted:{}", order.id))
    }
}

struct TestEnv {
    service: OrderLifecycleService,
    ledger: Arc<InMemoryStockLedger>,
    hooks: Arc<RecordingHooks>,
}

impl TestEnv {
    fn p1_stock(&self) -> i64 {
        self.ledger.quantity("P1", "S1").unwrap()
    }

    fn p2_stock(&self) -> i64 {
        self.ledger.quantity("P2", "S2").unwrap()
    }
}

/// P1 "Notebook" 10 × 100.00, P2 "Pen" 50 × 20.00
fn create_test_env() -> TestEnv {
    let ledger = Arc::new(
        InMemoryStockLedger::new()
            .with_product("P1", "Notebook", "S1", 10, 100.0)
            .with_product("P2", "Pen", "S2", 50, 20.0),
    );
    let hooks = Arc::new(RecordingHooks::default());
    let storage = OrderStorage::open_in_memory().unwrap();
    let service = OrderLifecycleService::new(storage, ledger.clone(), hooks.clone());
    TestEnv {
        service,
        ledger,
        hooks,
    }
}

fn line(product_id: &str, quantity: i32) -> OrderItemDraft {
    OrderItemDraft::new(product_id, quantity)
}

/// Place an order and return it with its items
async fn place_order(env: &TestEnv, lines: Vec<OrderItemDraft>) -> (Order, Vec<OrderItem>) {
    let order = env
        .service
        .create_order(OrderDraft::default(), lines)
        .await
        .unwrap();
    let items = env.service.list_items(&order.id).unwrap();
    (order, items)
}

mod test_core;
