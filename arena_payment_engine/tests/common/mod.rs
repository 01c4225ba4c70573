use std::time::Duration;

use ap_common::Credits;
use arena_payment_engine::{
    catalog::StaticCatalog,
    db_types::{CompletedOrder, Order, PaymentMethod},
    events::EventProducers,
    gateway::{GatewayAdapter, RetryPolicy},
    test_utils::{
        mocks::{sample_catalog, MockPayVault},
        prepare_env::{prepare_test_env, random_db_path},
    },
    traits::SettlementError,
    OrderFlowApi,
    SqliteDatabase,
};

pub struct TestContext {
    pub api: OrderFlowApi<SqliteDatabase, StaticCatalog, MockPayVault>,
    pub db: SqliteDatabase,
    pub provider: MockPayVault,
}

pub async fn new_context() -> TestContext {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let provider = MockPayVault::new();
    let retry = RetryPolicy { max_attempts: 3, base_delay: Duration::from_millis(5) };
    let gateway = GatewayAdapter::new(provider.clone()).with_retry_policy(retry);
    let api = OrderFlowApi::new(db.clone(), sample_catalog(), gateway, EventProducers::default());
    TestContext { api, db, provider }
}

/// Buys and settles `packs` 500-credit packs through the provider, leaving the user with a
/// balance of 500 credits per pack.
#[allow(dead_code)]
pub async fn seed_balance(ctx: &TestContext, user_id: &str, packs: usize) -> Credits {
    for _ in 0..packs {
        let order = ctx
            .api
            .create_order(user_id, "credits-500", PaymentMethod::Provider, None)
            .await
            .expect("Error creating credits order");
        let (_, intent) =
            ctx.api.register_provider_intent(user_id, &order.order_id).await.expect("Error registering intent");
        ctx.api
            .capture_and_complete(&order.order_id, &intent.intent_id)
            .await
            .expect("Error capturing credits order");
    }
    Credits::from(500 * packs as i64)
}

/// Creates a provider-paid order and walks it through to `AwaitingProviderApproval`.
#[allow(dead_code)]
pub async fn provider_order(ctx: &TestContext, user_id: &str, item_id: &str, nickname: Option<&str>) -> Order {
    let order = ctx
        .api
        .create_order(user_id, item_id, PaymentMethod::Provider, nickname)
        .await
        .expect("Error creating order");
    let (order, _intent) =
        ctx.api.register_provider_intent(user_id, &order.order_id).await.expect("Error registering intent");
    order
}

/// Settles a provider-paid order, quoting back the intent registered on it.
#[allow(dead_code)]
pub async fn settle(ctx: &TestContext, order: &Order) -> Result<CompletedOrder, SettlementError> {
    let intent_id = order.provider_intent_id.clone().expect("order has a registered intent");
    ctx.api.capture_and_complete(&order.order_id, &intent_id).await
}
