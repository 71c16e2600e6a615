use std::sync::Arc;

use axum::{
  Json,
  extract::{FromRequest, FromRequestParts, Query, State},
  http::{header, request::Parts},
};
use serde::{Deserialize, Serialize};

use crate::{
  entity::{Metered, capability, subscription, usage_log},
  policy::{self, Denied, DurationUnit, Term},
  prelude::*,
  state::AppState,
  sv::{Action, Granted, Metering, Plan, Principal, Usage},
};

/// The authenticated principal behind `Authorization: Bearer <token>`.
pub struct Caller(pub Principal);

impl FromRequestParts<Arc<AppState>> for Caller {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    app: &Arc<AppState>,
  ) -> Result<Self> {
    let token = parts
      .headers
      .get(header::AUTHORIZATION)
      .and_then(|value| value.to_str().ok())
      .and_then(|value| value.strip_prefix("Bearer "))
      .map(str::trim)
      .filter(|token| !token.is_empty())
      .ok_or(Error::InvalidToken)?;

    Ok(Caller(app.resolve(token).await?))
  }
}

/// `Json` whose rejections answer in the API's error shape.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(Error))]
pub struct Payload<T>(pub T);

/// `Query` counterpart of [`Payload`].
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(Error))]
pub struct Params<T>(pub T);

#[derive(Debug, Serialize)]
pub struct Success<T> {
  success: bool,
  #[serde(flatten)]
  data: T,
}

fn ok<T>(data: T) -> Json<Success<T>> {
  Json(Success { success: true, data })
}

type Reply<T> = Result<Json<Success<T>>>;

pub async fn health() -> &'static str {
  "OK"
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantReq {
  pub grantee_id: String,
  pub capability_id: String,
  pub duration: Option<i64>,
  pub duration_unit: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GrantRes {
  grant: Granted,
}

pub async fn grant(
  State(app): State<Arc<AppState>>,
  Caller(caller): Caller,
  Payload(req): Payload<GrantReq>,
) -> Reply<GrantRes> {
  let unit = req
    .duration_unit
    .as_deref()
    .map(str::parse::<DurationUnit>)
    .transpose()?;
  let term = Term::from_parts(req.duration, unit)?;

  let grant = app
    .sv()
    .grants
    .grant(&caller.id, &req.grantee_id, &req.capability_id, term)
    .await?;

  Ok(ok(GrantRes { grant }))
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeReq {
  pub grantee_id: String,
  pub capability_id: String,
}

pub async fn revoke(
  State(app): State<Arc<AppState>>,
  Caller(caller): Caller,
  Payload(req): Payload<RevokeReq>,
) -> Reply<RevokeReq> {
  app
    .sv()
    .grants
    .revoke(&caller.id, &req.grantee_id, &req.capability_id)
    .await?;

  Ok(ok(req))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckQuery {
  pub principal_id: Option<String>,
  pub capability_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRes {
  principal_id: String,
  capability_id: String,
  effective: bool,
}

pub async fn check(
  State(app): State<Arc<AppState>>,
  Caller(caller): Caller,
  Params(query): Params<CheckQuery>,
) -> Reply<CheckRes> {
  let principal_id = query.principal_id.unwrap_or(caller.id);
  let effective = app
    .sv()
    .grants
    .is_effective(&principal_id, &query.capability_id)
    .await?;

  Ok(ok(CheckRes {
    principal_id,
    capability_id: query.capability_id,
    effective,
  }))
}

#[derive(Debug, Serialize)]
pub struct GrantsRes {
  grants: Vec<Granted>,
}

pub async fn mine(
  State(app): State<Arc<AppState>>,
  Caller(caller): Caller,
) -> Reply<GrantsRes> {
  let grants = app.sv().grants.held_by(&caller.id).await?;
  Ok(ok(GrantsRes { grants }))
}

pub async fn issued(
  State(app): State<Arc<AppState>>,
  Caller(caller): Caller,
) -> Reply<GrantsRes> {
  let grants = app.sv().grants.issued_by(&caller.id).await?;
  Ok(ok(GrantsRes { grants }))
}

#[derive(Debug, Serialize)]
pub struct CapabilitiesRes {
  capabilities: Vec<capability::Model>,
}

pub async fn capabilities(
  State(app): State<Arc<AppState>>,
  Caller(_): Caller,
) -> Reply<CapabilitiesRes> {
  let capabilities = app.sv().catalog.all().await?;
  Ok(ok(CapabilitiesRes { capabilities }))
}

fn admin_only(caller: &Principal) -> Result<()> {
  if !caller.role.is_admin() {
    return Err(Denied::AdminOnly.into());
  }
  Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CapabilityReq {
  pub id: String,
  pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CapabilityRes {
  capability: capability::Model,
}

pub async fn register_capability(
  State(app): State<Arc<AppState>>,
  Caller(caller): Caller,
  Payload(req): Payload<CapabilityReq>,
) -> Reply<CapabilityRes> {
  admin_only(&caller)?;
  let capability = app.sv().catalog.create(&req.id, &req.name).await?;
  Ok(ok(CapabilityRes { capability }))
}

/// Resolves whose quota a request touches; the caller's own by default.
async fn quota_owner(
  app: &AppState,
  caller: Principal,
  owner_id: Option<String>,
) -> Result<Principal> {
  let Some(owner_id) = owner_id.filter(|id| *id != caller.id) else {
    return Ok(caller);
  };

  let owner = app.sv().user.principal(&owner_id).await?;
  if !policy::may_meter(&caller, &owner) {
    return Err(Denied::ForeignQuota.into());
  }
  Ok(owner)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterReq {
  #[serde(rename = "type")]
  pub ty: String,
  pub action: String,
  pub owner_id: Option<String>,
  pub metadata: Option<json::Value>,
}

pub async fn meter(
  State(app): State<Arc<AppState>>,
  Caller(caller): Caller,
  Payload(req): Payload<MeterReq>,
) -> Reply<Metering> {
  let ty: Metered = req.ty.parse()?;
  let action: Action = req.action.parse()?;
  let owner = quota_owner(&app, caller, req.owner_id).await?;

  let metering = app
    .sv()
    .quota
    .meter(&owner.id, ty, action, req.metadata.as_ref())
    .await?;

  Ok(ok(metering))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerQuery {
  pub owner_id: Option<String>,
}

pub async fn usage(
  State(app): State<Arc<AppState>>,
  Caller(caller): Caller,
  Params(query): Params<OwnerQuery>,
) -> Reply<Usage> {
  let owner = quota_owner(&app, caller, query.owner_id).await?;
  let usage = app.sv().quota.usage(&owner.id).await?;
  Ok(ok(usage))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenReq {
  pub owner_id: String,
  pub plan: String,
  #[serde(default)]
  pub limits: HashMap<String, i32>,
  pub days: i64,
}

impl OpenReq {
  /// Limit keys accept the same names as metering, aliases included.
  fn plan(&self) -> Result<Plan> {
    self.limits.iter().try_fold(Plan::new(&self.plan), |plan, (ty, &max)| {
      Ok(plan.limit(ty.parse()?, max))
    })
  }
}

#[derive(Debug, Serialize)]
pub struct OpenRes {
  subscription: subscription::Model,
}

/// Billing hook: starts a new subscription once a payment is approved.
pub async fn open_subscription(
  State(app): State<Arc<AppState>>,
  Caller(caller): Caller,
  Payload(req): Payload<OpenReq>,
) -> Reply<OpenRes> {
  admin_only(&caller)?;
  let plan = req.plan()?;
  let subscription =
    app.sv().quota.open(&req.owner_id, &plan, req.days).await?;
  Ok(ok(OpenRes { subscription }))
}

#[derive(Debug, Serialize)]
pub struct LogsRes {
  logs: Vec<usage_log::Model>,
}

pub async fn logs(
  State(app): State<Arc<AppState>>,
  Caller(caller): Caller,
  Params(query): Params<OwnerQuery>,
) -> Reply<LogsRes> {
  let owner = quota_owner(&app, caller, query.owner_id).await?;
  let sv = app.sv();

  let usage = sv.quota.usage(&owner.id).await?;
  let logs = sv.usage_log.by_subscription(&usage.subscription_id).await?;
  Ok(ok(LogsRes { logs }))
}
