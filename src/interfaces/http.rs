//! JSON-over-HTTP surface. Callers identify themselves with `X-Actor-Id`.

use crate::application::Platform;
use crate::application::identity::NewUser;
use crate::application::settlement::Initiation;
use crate::domain::payment::{AttemptStatus, Gateway, PaymentAttempt};
use crate::domain::user::{Role, User};
use crate::domain::wallet::{Amount, BankDetails, WithdrawalOutcome};
use crate::error::PaymentError;
use actix_web::http::StatusCode;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, ResponseError, web};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use tracing::info;
use uuid::Uuid;

pub const ACTOR_HEADER: &str = "X-Actor-Id";

/// Maps domain errors onto HTTP statuses.
#[derive(Debug)]
pub struct ApiError(pub PaymentError);

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        Self(err)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            PaymentError::NotFound { .. } => StatusCode::NOT_FOUND,
            PaymentError::Unauthorized(_) => StatusCode::FORBIDDEN,
            PaymentError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            PaymentError::InvalidState(_) | PaymentError::Conflict { .. } => StatusCode::CONFLICT,
            PaymentError::ValidationError(_) => StatusCode::BAD_REQUEST,
            PaymentError::GatewayTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            PaymentError::GatewayRejected { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.0.to_string() }))
    }
}

type ApiResult = Result<HttpResponse, ApiError>;

fn actor(req: &HttpRequest) -> Result<String, ApiError> {
    req.headers()
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError(PaymentError::Unauthorized(format!("missing {ACTOR_HEADER} header"))))
}

/// Resolves the caller. An id that matches no user is refused like any other unauthorized caller.
async fn known_actor(platform: &Platform, req: &HttpRequest) -> Result<User, ApiError> {
    let actor_id = actor(req)?;
    platform
        .stores
        .users
        .get(&actor_id)
        .await?
        .ok_or_else(|| ApiError(PaymentError::Unauthorized(format!("unknown actor {actor_id}"))))
}

/// The wire status of an attempt. Settlement is internal, so a settled attempt reads as verified.
fn wire_status(attempt: &PaymentAttempt) -> &'static str {
    match attempt.status {
        AttemptStatus::Verified | AttemptStatus::Settled => "VERIFIED",
        AttemptStatus::Failed => "FAILED",
        AttemptStatus::Initiated | AttemptStatus::AwaitingConfirmation => "AWAITING_CONFIRMATION",
    }
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

async fn register(platform: web::Data<Platform>, body: web::Json<NewUser>) -> ApiResult {
    let new_user = body.into_inner();
    if new_user.role == Role::Admin {
        return Err(PaymentError::ValidationError("admins cannot self-register".to_string()).into());
    }
    let (user, token) = platform.identity.register(new_user).await?;
    Ok(HttpResponse::Created().json(json!({ "user": user, "confirmationToken": token })))
}

async fn confirm_email(platform: web::Data<Platform>, token: web::Path<String>) -> ApiResult {
    let user = platform.identity.confirm_email(&token).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitiateBody {
    student_id: String,
    course_key: String,
    lesson_id: String,
    gateway: Gateway,
}

async fn initiate(platform: web::Data<Platform>, body: web::Json<InitiateBody>) -> ApiResult {
    let result = platform
        .settlement
        .initiate(&body.student_id, &body.course_key, &body.lesson_id, body.gateway)
        .await;
    match result {
        Ok(Initiation::Checkout(attempt)) => Ok(HttpResponse::Ok().json(json!({
            "reference": attempt.reference,
            "redirectUrl": attempt.redirect_url,
        }))),
        Ok(Initiation::Free(_)) => Ok(HttpResponse::Ok().json(json!({ "free": true }))),
        Err(PaymentError::AlreadyOwned { .. }) => {
            Ok(HttpResponse::Ok().json(json!({ "alreadyOwned": true })))
        }
        Err(err) => Err(err.into()),
    }
}

async fn verify(platform: web::Data<Platform>, reference: web::Path<String>) -> ApiResult {
    let attempt = platform.settlement.verify(&reference).await?;
    let mut body = json!({
        "reference": attempt.reference,
        "status": wire_status(&attempt),
    });
    if let Some(failure) = &attempt.failure {
        body["failure"] = json!(failure.to_string());
    }
    Ok(HttpResponse::Ok().json(body))
}

async fn access(platform: web::Data<Platform>, path: web::Path<(String, String, String)>) -> ApiResult {
    let (student, course, lesson) = path.into_inner();
    let allowed = platform.ledger.has_access(&student, &course, &lesson).await?;
    Ok(HttpResponse::Ok().json(json!({ "allowed": allowed })))
}

async fn wallet(platform: web::Data<Platform>, req: HttpRequest, teacher: web::Path<String>) -> ApiResult {
    let actor = known_actor(&platform, &req).await?;
    if actor.id != *teacher && !actor.is_admin() {
        return Err(PaymentError::Unauthorized(format!("user {} may not view this wallet", actor.id)).into());
    }
    let wallet = platform.wallets.wallet(&teacher).await?;
    Ok(HttpResponse::Ok().json(wallet))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WithdrawBody {
    amount: Decimal,
    bank_details: BankDetails,
}

async fn withdraw(
    platform: web::Data<Platform>,
    req: HttpRequest,
    teacher: web::Path<String>,
    body: web::Json<WithdrawBody>,
) -> ApiResult {
    let actor = known_actor(&platform, &req).await?;
    if actor.id != *teacher {
        return Err(PaymentError::Unauthorized("only the wallet owner may withdraw".to_string()).into());
    }
    if actor.role != Role::Teacher {
        return Err(PaymentError::Unauthorized(format!("user {} is not a teacher", actor.id)).into());
    }
    let body = body.into_inner();
    let tx = platform
        .wallets
        .request_withdrawal(&teacher, Amount::new(body.amount)?, body.bank_details)
        .await?;
    Ok(HttpResponse::Created().json(tx))
}

async fn pending_withdrawals(platform: web::Data<Platform>, req: HttpRequest) -> ApiResult {
    let queue = platform.admin.list_pending_withdrawals(&actor(&req)?).await?;
    Ok(HttpResponse::Ok().json(queue))
}

#[derive(Debug, Deserialize)]
struct ResolveBody {
    outcome: WithdrawalOutcome,
}

async fn resolve_withdrawal(
    platform: web::Data<Platform>,
    req: HttpRequest,
    transaction_id: web::Path<Uuid>,
    body: web::Json<ResolveBody>,
) -> ApiResult {
    let tx = platform
        .admin
        .resolve_withdrawal(&actor(&req)?, *transaction_id, body.outcome)
        .await?;
    Ok(HttpResponse::Ok().json(tx))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/users", web::post().to(register))
        .route("/users/confirm/{token}", web::post().to(confirm_email))
        .route("/payments/initiate", web::post().to(initiate))
        .route("/payments/verify/{reference}", web::get().to(verify))
        .route("/access/{student}/{course}/{lesson}", web::get().to(access))
        .route("/wallet/{teacher}", web::get().to(wallet))
        .route("/wallet/{teacher}/withdraw", web::post().to(withdraw))
        .route("/admin/withdrawals", web::get().to(pending_withdrawals))
        .route(
            "/admin/withdrawals/{transaction_id}/resolve",
            web::post().to(resolve_withdrawal),
        );
}

pub async fn serve(platform: Platform, bind: &str) -> std::io::Result<()> {
    let state = web::Data::new(platform);
    info!(addr = bind, "Starting HTTP server");

    HttpServer::new(move || App::new().app_data(state.clone()).configure(configure))
        .bind(bind)?
        .run()
        .await
}
