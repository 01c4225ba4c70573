use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use arena_payment_engine::{
    catalog::StaticCatalog,
    events::EventProducers,
    gateway::GatewayAdapter,
    LedgerApi,
    NicknameApi,
    OrderFlowApi,
    SqliteDatabase,
    SupportApi,
};

use crate::{
    auth::TokenIssuer,
    config::ServerConfig,
    errors::ServerError,
    integrations::payvault::PayVaultProvider,
    middleware::HmacMiddlewareFactory,
    routes::{
        health,
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
        PayvaultWebhookRoute,
        RegisterIntentRoute,
        ResolveSupportRoute,
        StartReviewRoute,
        SupportByIdRoute,
        SupportSearchRoute,
        VerifyNicknameRoute,
    },
};

pub const PAYVAULT_SIGNATURE_HEADER: &str = "X-PayVault-Signature";

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let catalog = StaticCatalog::load(&config.catalog_file)
        .map_err(|e| ServerError::InitializeError(format!("Could not load catalog: {e}")))?;
    let provider = PayVaultProvider::try_from_config(config.payvault.clone())?;
    let srv = create_server_instance(config, db, catalog, provider)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    catalog: StaticCatalog,
    provider: PayVaultProvider,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let gateway = GatewayAdapter::new(provider.clone());
        let orders_api = OrderFlowApi::new(db.clone(), catalog.clone(), gateway, EventProducers::default());
        let ledger_api = LedgerApi::new(db.clone());
        let nickname_api = NicknameApi::new(db.clone());
        let support_api = SupportApi::new(db.clone());
        let jwt_signer = TokenIssuer::new(&config.auth);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("aps::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(ledger_api))
            .app_data(web::Data::new(nickname_api))
            .app_data(web::Data::new(support_api))
            .app_data(web::Data::new(jwt_signer));
        // Routes that require authentication
        let auth_scope = web::scope("/api")
            .service(CatalogItemsRoute::<SqliteDatabase, StaticCatalog, PayVaultProvider>::new())
            .service(NewOrderRoute::<SqliteDatabase, StaticCatalog, PayVaultProvider>::new())
            .service(RegisterIntentRoute::<SqliteDatabase, StaticCatalog, PayVaultProvider>::new())
            .service(CaptureOrderRoute::<SqliteDatabase, StaticCatalog, PayVaultProvider>::new())
            .service(PayWithBalanceRoute::<SqliteDatabase, StaticCatalog, PayVaultProvider>::new())
            .service(CancelOrderRoute::<SqliteDatabase, StaticCatalog, PayVaultProvider>::new())
            .service(OrderByIdRoute::<SqliteDatabase, StaticCatalog, PayVaultProvider>::new())
            .service(MyHistoryRoute::<SqliteDatabase, StaticCatalog, PayVaultProvider>::new())
            .service(OrdersSearchRoute::<SqliteDatabase, StaticCatalog, PayVaultProvider>::new())
            .service(MyBalanceRoute::<SqliteDatabase>::new())
            .service(MyLedgerRoute::<SqliteDatabase>::new())
            .service(MyAccountRoute::<SqliteDatabase, SqliteDatabase>::new())
            .service(VerifyNicknameRoute::<SqliteDatabase>::new())
            .service(SupportSearchRoute::<SqliteDatabase>::new())
            .service(SupportByIdRoute::<SqliteDatabase>::new())
            .service(StartReviewRoute::<SqliteDatabase>::new())
            .service(ResolveSupportRoute::<SqliteDatabase>::new());
        // PayVault notifications are authenticated by their HMAC signature, not by a user token.
        let webhook_scope = web::scope("/webhook")
            .wrap(HmacMiddlewareFactory::new(
                PAYVAULT_SIGNATURE_HEADER,
                config.payvault.webhook_secret.clone(),
                config.payvault_hmac_checks,
            ))
            .service(PayvaultWebhookRoute::<SqliteDatabase, StaticCatalog, PayVaultProvider>::new());
        app.service(health).service(auth_scope).service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
