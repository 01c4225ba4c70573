//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```

use actix_web::{get, web, HttpResponse, Responder};
use arena_payment_engine::{
    catalog::CatalogProvider,
    db_types::{Order, OrderId, Role},
    order_objects::{OrderQueryFilter, Pagination},
    support_objects::SupportQueryFilter,
    traits::{
        LedgerManagement,
        NicknameManagement,
        PaymentProvider,
        SettlementDatabase,
        SettlementError,
        SupportManagement,
    },
    LedgerApi,
    NicknameApi,
    OrderFlowApi,
    SupportApi,
};
use log::*;

use crate::{
    auth::JwtClaims,
    data_objects::{
        AccountSummary,
        BalanceResult,
        CaptureOrderParams,
        JsonResponse,
        NewOrderParams,
        OrderIdParams,
        PaymentIntentResult,
        PayVaultWebhookEvent,
        ResolveSupportParams,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal requires [$($roles:ty),*]) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
                impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name)
                        .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:ty),*])  => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Catalog  ----------------------------------------------------
route!(catalog_items => Get "/catalog" impl SettlementDatabase, CatalogProvider, PaymentProvider where requires [Role::User]);
pub async fn catalog_items<B, C, P>(
    api: web::Data<OrderFlowApi<B, C, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProvider + 'static,
{
    trace!("💻️ GET catalog");
    Ok(HttpResponse::Ok().json(api.catalog().items()))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(new_order => Post "/order" impl SettlementDatabase, CatalogProvider, PaymentProvider where requires [Role::User]);
/// Creates a new order for the authenticated user.
///
/// Nickname services require the `nickname` field. The order is created in `Created` status;
/// follow up with `/order/provider` or `/order/balance` depending on the payment method.
pub async fn new_order<B, C, P>(
    claims: JwtClaims,
    body: web::Json<NewOrderParams>,
    api: web::Data<OrderFlowApi<B, C, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProvider + 'static,
{
    let params = body.into_inner();
    debug!("💻️ POST new_order for {}: {}", claims.sub, params.item_id);
    let order = api
        .create_order(&claims.sub, &params.item_id, params.payment_method, params.nickname.as_deref())
        .await?;
    Ok(HttpResponse::Created().json(order))
}

route!(register_intent => Post "/order/provider" impl SettlementDatabase, CatalogProvider, PaymentProvider where requires [Role::User]);
/// Registers a payment intent with PayVault for the given order and returns the approval url.
pub async fn register_intent<B, C, P>(
    claims: JwtClaims,
    body: web::Json<OrderIdParams>,
    api: web::Data<OrderFlowApi<B, C, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProvider + 'static,
{
    let order_id = body.into_inner().order_id;
    debug!("💻️ POST register_intent for order [{order_id}]");
    let (order, intent) = api.register_provider_intent(&claims.sub, &order_id).await?;
    let result =
        PaymentIntentResult { order, intent_id: intent.intent_id, approval_url: intent.approval_url };
    Ok(HttpResponse::Ok().json(result))
}

route!(capture_order => Post "/order/provider/capture" impl SettlementDatabase, CatalogProvider, PaymentProvider where requires [Role::User]);
/// Captures the approved payment and settles the order. The intent id from the registration step
/// must be quoted back; a capture quoting a different intent is a 409. Idempotent: repeating the
/// call returns the stored settlement result.
pub async fn capture_order<B, C, P>(
    claims: JwtClaims,
    body: web::Json<CaptureOrderParams>,
    api: web::Data<OrderFlowApi<B, C, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProvider + 'static,
{
    let params = body.into_inner();
    let order_id = params.order_id;
    debug!("💻️ POST capture_order for order [{order_id}]");
    let order = api.fetch_order(&order_id).await?;
    assert_order_access(&order, &claims)?;
    let completed = api.capture_and_complete(&order_id, &params.intent_id).await?;
    Ok(HttpResponse::Ok().json(completed))
}

route!(pay_with_balance => Post "/order/balance" impl SettlementDatabase, CatalogProvider, PaymentProvider where requires [Role::User]);
/// Settles a balance-paid order against the user's credit balance. Idempotent, like capture.
pub async fn pay_with_balance<B, C, P>(
    claims: JwtClaims,
    body: web::Json<OrderIdParams>,
    api: web::Data<OrderFlowApi<B, C, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProvider + 'static,
{
    let order_id = body.into_inner().order_id;
    debug!("💻️ POST pay_with_balance for order [{order_id}]");
    let completed = api.complete_with_balance(&claims.sub, &order_id).await?;
    Ok(HttpResponse::Ok().json(completed))
}

route!(cancel_order => Post "/order/{order_id}/cancel" impl SettlementDatabase, CatalogProvider, PaymentProvider where requires [Role::User]);
pub async fn cancel_order<B, C, P>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B, C, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProvider + 'static,
{
    let order_id = OrderId(path.into_inner());
    debug!("💻️ POST cancel_order for order [{order_id}]");
    let order = api.cancel_order(&claims.sub, &order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(order_by_id => Get "/order/{order_id}" impl SettlementDatabase, CatalogProvider, PaymentProvider where requires [Role::User]);
pub async fn order_by_id<B, C, P>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B, C, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProvider + 'static,
{
    let order_id = OrderId(path.into_inner());
    debug!("💻️ GET order [{order_id}]");
    let order = api.fetch_order(&order_id).await?;
    assert_order_access(&order, &claims)?;
    Ok(HttpResponse::Ok().json(order))
}

route!(my_history => Get "/history" impl SettlementDatabase, CatalogProvider, PaymentProvider where requires [Role::User]);
pub async fn my_history<B, C, P>(
    claims: JwtClaims,
    query: web::Query<Pagination>,
    api: web::Data<OrderFlowApi<B, C, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProvider + 'static,
{
    debug!("💻️ GET my_history for {}", claims.sub);
    let history = api.history_for_user(&claims.sub, query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(history))
}

route!(orders_search => Get "/orders/search" impl SettlementDatabase, CatalogProvider, PaymentProvider where requires [Role::Admin]);
pub async fn orders_search<B, C, P>(
    query: web::Query<OrderQueryFilter>,
    api: web::Data<OrderFlowApi<B, C, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProvider + 'static,
{
    debug!("💻️ GET orders_search: {}", query.0);
    let orders = api.search_orders(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(orders))
}

//----------------------------------------------   Account  ----------------------------------------------------
route!(my_balance => Get "/balance" impl LedgerManagement where requires [Role::User]);
pub async fn my_balance<B: LedgerManagement + 'static>(
    claims: JwtClaims,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_balance for {}", claims.sub);
    let balance = api.balance_for_user(&claims.sub).await?;
    Ok(HttpResponse::Ok().json(BalanceResult { user_id: claims.sub, balance }))
}

route!(my_ledger => Get "/ledger" impl LedgerManagement where requires [Role::User]);
pub async fn my_ledger<B: LedgerManagement + 'static>(
    claims: JwtClaims,
    query: web::Query<Pagination>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_ledger for {}", claims.sub);
    let entries = api.ledger_for_user(&claims.sub, query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(entries))
}

route!(my_account => Get "/account" impl LedgerManagement, NicknameManagement where requires [Role::User]);
pub async fn my_account<TL, TN>(
    claims: JwtClaims,
    ledger: web::Data<LedgerApi<TL>>,
    nicknames: web::Data<NicknameApi<TN>>,
) -> Result<HttpResponse, ServerError>
where
    TL: LedgerManagement + 'static,
    TN: NicknameManagement + 'static,
{
    debug!("💻️ GET my_account for {}", claims.sub);
    let balance = ledger.balance_for_user(&claims.sub).await?;
    let membership = ledger.membership_for_user(&claims.sub).await?;
    let stats = ledger.stats_for_user(&claims.sub).await?;
    let nickname = nicknames.nickname_for_user(&claims.sub).await?;
    let summary = AccountSummary { user_id: claims.sub, balance, nickname, membership, stats };
    Ok(HttpResponse::Ok().json(summary))
}

route!(verify_nickname => Get "/nickname/verify/{nickname}" impl NicknameManagement where requires [Role::User]);
/// Advisory nickname pre-check. The answer can go stale immediately: the authoritative check is
/// the claim made when a rename or reclaim order is fulfilled.
pub async fn verify_nickname<B: NicknameManagement + 'static>(
    path: web::Path<String>,
    api: web::Data<NicknameApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let nickname = path.into_inner();
    trace!("💻️ GET verify_nickname {nickname}");
    let check = api.check_nickname(&nickname).await?;
    Ok(HttpResponse::Ok().json(check))
}

//----------------------------------------------   Support  ----------------------------------------------------
route!(support_search => Get "/support" impl SupportManagement where requires [Role::Admin]);
pub async fn support_search<B: SupportManagement + 'static>(
    query: web::Query<SupportQueryFilter>,
    api: web::Data<SupportApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET support_search");
    let requests = api.search_requests(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(requests))
}

route!(support_by_id => Get "/support/{id}" impl SupportManagement where requires [Role::Admin]);
pub async fn support_by_id<B: SupportManagement + 'static>(
    path: web::Path<i64>,
    api: web::Data<SupportApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = api.fetch_request(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(request))
}

route!(start_review => Post "/support/{id}/review" impl SupportManagement where requires [Role::Admin]);
pub async fn start_review<B: SupportManagement + 'static>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<SupportApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request_id = path.into_inner();
    debug!("💻️ POST start_review #{request_id} by {}", claims.sub);
    let request = api.start_review(request_id, &claims.sub).await?;
    Ok(HttpResponse::Ok().json(request))
}

route!(resolve_support => Post "/support/resolve" impl SupportManagement where requires [Role::Admin]);
/// Resolves a support request. Approving a nickname reclaim claims the handle for the requester;
/// if the handle has been taken in the meantime the call returns 409 and the request stays open.
pub async fn resolve_support<B: SupportManagement + 'static>(
    claims: JwtClaims,
    body: web::Json<ResolveSupportParams>,
    api: web::Data<SupportApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let params = body.into_inner();
    debug!("💻️ POST resolve_support #{} by {}: approve={}", params.request_id, claims.sub, params.approve);
    let resolution = api.resolve_request(params.request_id, &claims.sub, params.approve, &params.notes).await?;
    Ok(HttpResponse::Ok().json(resolution))
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(payvault_webhook => Post "/payvault" impl SettlementDatabase, CatalogProvider, PaymentProvider);
/// Handles signed PayVault notifications. HMAC validation happens in the middleware wrapping the
/// webhook scope, so any request reaching this handler is authentic.
///
/// Settlement is idempotent, so PayVault's at-least-once delivery is safe: a duplicate
/// notification for a settled order is answered from the stored result and logged as an anomaly.
pub async fn payvault_webhook<B, C, P>(
    body: web::Json<PayVaultWebhookEvent>,
    api: web::Data<OrderFlowApi<B, C, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase + 'static,
    C: CatalogProvider + 'static,
    P: PaymentProvider + 'static,
{
    let event = body.into_inner();
    info!("📬️ PayVault webhook: {} for intent {} (order [{}])", event.event, event.intent_id, event.reference);
    let order_id = OrderId(event.reference.clone());
    match event.event.as_str() {
        "intent.approved" => match api.capture_and_complete(&order_id, &event.intent_id).await {
            Ok(completed) if completed.first_settlement => {
                Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Order {order_id} settled"))))
            },
            Ok(_) => {
                warn!("📬️ Duplicate PayVault notification for settled order [{order_id}]. No action taken.");
                Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Order {order_id} was already settled"))))
            },
            // The order is marked failed at this point; a retry from PayVault would not help.
            Err(SettlementError::GatewayFailed(e)) => {
                Ok(HttpResponse::Ok().json(JsonResponse::failure(format!("Order {order_id} failed: {e}"))))
            },
            Err(e) => Err(e.into()),
        },
        "intent.declined" => {
            api.mark_failed(&order_id, &format!("PayVault declined intent {}", event.intent_id)).await?;
            Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Order {order_id} marked as failed"))))
        },
        "intent.cancelled" => {
            // The notification acts on the customer's behalf.
            let order = api.fetch_order(&order_id).await?;
            let order = api.cancel_order(&order.user_id, &order_id).await?;
            Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Order {} cancelled", order.order_id))))
        },
        other => {
            warn!("📬️ Unsupported PayVault event type: {other}");
            Ok(HttpResponse::Ok().json(JsonResponse::failure(format!("Unsupported event type: {other}"))))
        },
    }
}

//----------------------------------------------   Helpers  ----------------------------------------------------
/// Users may only act on their own orders; admins may act on any.
fn assert_order_access(order: &Order, claims: &JwtClaims) -> Result<(), ServerError> {
    if order.is_owned_by(&claims.sub) || claims.has_role(Role::Admin) {
        Ok(())
    } else {
        Err(ServerError::InsufficientPermissions(format!(
            "Order [{}] does not belong to {}",
            order.order_id, claims.sub
        )))
    }
}
