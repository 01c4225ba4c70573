use std::time::Duration;

use actix_web::{
    body::MessageBody,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use ap_common::Secret;
use arena_payment_engine::{
    catalog::StaticCatalog,
    db_types::Role,
    events::EventProducers,
    gateway::{GatewayAdapter, RetryPolicy},
    test_utils::{
        mocks::{sample_catalog, MockPayVault},
        prepare_env::{prepare_test_env, random_db_path},
    },
    LedgerApi,
    NicknameApi,
    OrderFlowApi,
    SqliteDatabase,
    SupportApi,
};
use serde::Serialize;

use crate::{
    auth::TokenIssuer,
    config::AuthConfig,
    routes::{
        CancelOrderRoute,
        CaptureOrderRoute,
        CatalogItemsRoute,
        MyAccountRoute,
        MyBalanceRoute,
        MyHistoryRoute,
        MyLedgerRoute,
        NewOrderRoute,
        OrderByIdRoute,
        OrdersSearchRoute,
        PayWithBalanceRoute,
        RegisterIntentRoute,
        ResolveSupportRoute,
        StartReviewRoute,
        SupportByIdRoute,
        SupportSearchRoute,
        VerifyNicknameRoute,
    },
};

// Creates a test `AuthConfig` for issuing tokens. DO NOT re-use this secret anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig { jwt_secret: Secret::new("endpoint-test-signing-secret-00000001".to_string()) }
}

pub fn issue_token(sub: &str, roles: Vec<Role>) -> String {
    TokenIssuer::new(&get_auth_config())
        .issue_token(sub, &roles, chrono::Duration::days(1))
        .expect("Failed to sign token")
}

pub fn user_token(sub: &str) -> String {
    issue_token(sub, vec![Role::User])
}

pub fn admin_token(sub: &str) -> String {
    issue_token(sub, vec![Role::User, Role::Admin])
}

/// A real SQLite backend plus the scriptable provider double, shared by every request in a test.
pub struct TestBackend {
    pub db: SqliteDatabase,
    pub catalog: StaticCatalog,
    pub provider: MockPayVault,
}

pub async fn new_backend() -> TestBackend {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    TestBackend { db, catalog: sample_catalog(), provider: MockPayVault::new() }
}

impl TestBackend {
    pub fn order_api(&self) -> OrderFlowApi<SqliteDatabase, StaticCatalog, MockPayVault> {
        let retry = RetryPolicy { max_attempts: 2, base_delay: Duration::from_millis(5) };
        let gateway = GatewayAdapter::new(self.provider.clone()).with_retry_policy(retry);
        OrderFlowApi::new(self.db.clone(), self.catalog.clone(), gateway, EventProducers::default())
    }

    /// Registers every authenticated route plus the APIs they need, the way the real server does.
    pub fn configure(&self) -> impl FnOnce(&mut ServiceConfig) {
        let orders_api = self.order_api();
        let db = self.db.clone();
        move |cfg: &mut ServiceConfig| {
            cfg.app_data(web::Data::new(orders_api))
                .app_data(web::Data::new(LedgerApi::new(db.clone())))
                .app_data(web::Data::new(NicknameApi::new(db.clone())))
                .app_data(web::Data::new(SupportApi::new(db)))
                .service(CatalogItemsRoute::<SqliteDatabase, StaticCatalog, MockPayVault>::new())
                .service(NewOrderRoute::<SqliteDatabase, StaticCatalog, MockPayVault>::new())
                .service(RegisterIntentRoute::<SqliteDatabase, StaticCatalog, MockPayVault>::new())
                .service(CaptureOrderRoute::<SqliteDatabase, StaticCatalog, MockPayVault>::new())
                .service(PayWithBalanceRoute::<SqliteDatabase, StaticCatalog, MockPayVault>::new())
                .service(CancelOrderRoute::<SqliteDatabase, StaticCatalog, MockPayVault>::new())
                .service(OrderByIdRoute::<SqliteDatabase, StaticCatalog, MockPayVault>::new())
                .service(MyHistoryRoute::<SqliteDatabase, StaticCatalog, MockPayVault>::new())
                .service(OrdersSearchRoute::<SqliteDatabase, StaticCatalog, MockPayVault>::new())
                .service(MyBalanceRoute::<SqliteDatabase>::new())
                .service(MyLedgerRoute::<SqliteDatabase>::new())
                .service(MyAccountRoute::<SqliteDatabase, SqliteDatabase>::new())
                .service(VerifyNicknameRoute::<SqliteDatabase>::new())
                .service(SupportSearchRoute::<SqliteDatabase>::new())
                .service(SupportByIdRoute::<SqliteDatabase>::new())
                .service(StartReviewRoute::<SqliteDatabase>::new())
                .service(ResolveSupportRoute::<SqliteDatabase>::new());
        }
    }
}

pub async fn send_request<F>(
    req: TestRequest,
    token: &str,
    configure: F,
) -> Result<(StatusCode, String), String>
where
    F: FnOnce(&mut ServiceConfig),
{
    let mut req = req;
    if !token.is_empty() {
        req = req.insert_header(("Authorization", format!("Bearer {token}")));
    }
    let req = req.to_request();
    let app = App::new().app_data(web::Data::new(TokenIssuer::new(&get_auth_config()))).configure(configure);
    let service = test::init_service(app).await;
    let (_, res) = test::try_call_service(&service, req).await.map_err(|e| e.to_string())?.into_parts();
    if let Some(e) = res.error() {
        return Err(e.to_string());
    }
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}

pub async fn get_request<F>(token: &str, path: &str, configure: F) -> Result<(StatusCode, String), String>
where F: FnOnce(&mut ServiceConfig) {
    send_request(TestRequest::get().uri(path), token, configure).await
}

pub async fn post_request<F, T>(
    token: &str,
    path: &str,
    body: &T,
    configure: F,
) -> Result<(StatusCode, String), String>
where
    F: FnOnce(&mut ServiceConfig),
    T: Serialize,
{
    send_request(TestRequest::post().uri(path).set_json(body), token, configure).await
}
