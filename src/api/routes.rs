use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    http::request::Parts,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::app::AppContext;
use crate::catalog::ContentItem;
use crate::content::Viewer;
use crate::error::{CoursegateError, Result};
use crate::http::RouteModule;
use crate::payments::gateway::GatewayCallback;
use crate::payments::ledger::CreateOrderRequest;
use crate::payments::order::OrderStatus;
use crate::tier::AccessTag;

/// Route module for the settlement engine's HTTP surface.
pub struct PaymentsModule;

impl RouteModule for PaymentsModule {
    fn routes(&self) -> Router<AppContext> {
        Router::new()
            .route("/orders", post(create_order))
            .route("/orders/:order_id/redirected", post(mark_redirected))
            .route(
                "/payments/callback/:outcome",
                get(handle_callback).post(handle_callback),
            )
            .route("/entitlements/:user_id/:course_id", get(get_entitlement))
            .route("/courses/:course_id/content", get(visible_content))
    }
}

/// Assemble the service router over an [`AppContext`].
#[must_use]
pub fn router(context: AppContext) -> Router {
    PaymentsModule.register(Router::new()).with_state(context)
}

// Viewer extraction: the identity provider authenticates the request
// upstream and deposits a `Viewer` into the request extensions. The
// privileged flag only ever comes from there, never from the client.
#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = CoursegateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<Viewer>()
            .cloned()
            .ok_or_else(|| CoursegateError::unauthorized("No authenticated viewer"))
    }
}

/// Request body for `POST /orders`.
#[derive(Debug, Deserialize)]
pub struct CreateOrderBody {
    pub user_id: String,
    pub course_id: String,
    pub domain_id: String,
    pub tier_percent: u8,
}

/// Response for `POST /orders`.
#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub amount_due: u64,
    pub gateway_ref: String,
}

async fn create_order(
    State(context): State<AppContext>,
    Json(body): Json<CreateOrderBody>,
) -> Result<(StatusCode, Json<CreateOrderResponse>)> {
    let order = context
        .ledger
        .create_order(CreateOrderRequest {
            user_id: body.user_id,
            course_id: body.course_id,
            domain_id: body.domain_id,
            tier_percent: body.tier_percent,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            order_id: order.id,
            amount_due: order.amount_due,
            gateway_ref: order.gateway_ref,
        }),
    ))
}

/// Response for order status transitions.
#[derive(Debug, Serialize)]
pub struct OrderStatusResponse {
    pub order_id: String,
    pub status: OrderStatus,
}

async fn mark_redirected(
    State(context): State<AppContext>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderStatusResponse>> {
    let order = context.ledger.mark_awaiting_callback(&order_id).await?;
    Ok(Json(OrderStatusResponse {
        order_id: order.id,
        status: order.status,
    }))
}

/// Response for `POST /payments/callback/{outcome}`.
#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub verified: bool,
    pub access_tag: Option<AccessTag>,
}

async fn handle_callback(
    State(context): State<AppContext>,
    Path(outcome): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<CallbackResponse>> {
    let callback = GatewayCallback::from_redirect(&outcome, &params)?;
    let result = context.reconciler.handle_callback(callback).await?;

    Ok(Json(CallbackResponse {
        verified: result.verified,
        access_tag: result.access_tag,
    }))
}

/// Response for `GET /entitlements/{user_id}/{course_id}`.
///
/// An unpaid pair is not an error: `paid` is false and the rest empty,
/// so clients can poll the same endpoint before and after purchase.
#[derive(Debug, Serialize)]
pub struct EntitlementResponse {
    pub paid: bool,
    pub tier: Option<u8>,
    pub total_paid: u64,
    pub access_tag: Option<AccessTag>,
}

async fn get_entitlement(
    State(context): State<AppContext>,
    Path((user_id, course_id)): Path<(String, String)>,
) -> Result<Json<EntitlementResponse>> {
    let entitlement = context.store.get_entitlement(&user_id, &course_id).await?;

    Ok(Json(match entitlement {
        Some(entitlement) => EntitlementResponse {
            paid: true,
            tier: Some(entitlement.highest_tier.as_percent()),
            total_paid: entitlement.total_paid,
            access_tag: Some(entitlement.access_tag),
        },
        None => EntitlementResponse {
            paid: false,
            tier: None,
            total_paid: 0,
            access_tag: None,
        },
    }))
}

/// Response for `GET /courses/{course_id}/content`.
#[derive(Debug, Serialize)]
pub struct ContentResponse {
    pub course_id: String,
    pub items: Vec<ContentItem>,
}

async fn visible_content(
    State(context): State<AppContext>,
    viewer: Viewer,
    Path(course_id): Path<String>,
) -> Result<Json<ContentResponse>> {
    context
        .catalog
        .get_course(&course_id)
        .await?
        .ok_or_else(|| CoursegateError::not_found(format!("Course {}", course_id)))?;

    let entitlement = context
        .store
        .get_entitlement(&viewer.user_id, &course_id)
        .await?;
    let items = context.catalog.list_content(&course_id).await?;
    let items = context
        .gate
        .visible_items(&viewer, entitlement.as_ref(), items);

    Ok(Json(ContentResponse { course_id, items }))
}
