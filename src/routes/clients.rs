/// Client registry routes
///
/// CRUD over accounting clients plus the onboarding workflow: checklist
/// management, status transitions, and AI-assisted procedure generation.
/// All routes sit behind the JWT middleware; mutating routes are role-gated.

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::ai::{AiService, ClientSummary};
use crate::audit::AuditLog;
use crate::auth::{Claims, Role};
use crate::domain::{
    default_checklist, ChecklistStatus, CompanyType, ContactInfo, DataConsent,
    LegalRepresentative, Onboarding, OnboardingStatus, OperatingProcedure,
};
use crate::error::{AppError, AuthError, DatabaseError, ErrorContext, ValidationError};
use crate::validators::{is_valid_fiscal_code, is_valid_name, is_valid_vat_number};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

fn require_role(claims: &Claims, allowed: &[Role]) -> Result<(), AppError> {
    if claims.has_role(allowed) {
        Ok(())
    } else {
        Err(AppError::Auth(AuthError::InsufficientRole))
    }
}

/// A client row as stored: indexable identity columns plus JSONB documents
/// for the nested structures.
#[derive(sqlx::FromRow)]
struct ClientRecord {
    id: Uuid,
    name: String,
    fiscal_code: Option<String>,
    vat_number: Option<String>,
    company_type: String,
    contact_info: Json<ContactInfo>,
    legal_representative: Option<Json<LegalRepresentative>>,
    onboarding: Json<Onboarding>,
    services: Json<Vec<String>>,
    operating_procedure: Option<Json<OperatingProcedure>>,
    notes: Option<String>,
    tags: Json<Vec<String>>,
    data_consent: Json<DataConsent>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const CLIENT_COLUMNS: &str = "id, name, fiscal_code, vat_number, company_type, contact_info, \
    legal_representative, onboarding, services, operating_procedure, notes, tags, data_consent, \
    created_at, updated_at";

/// Client payload returned to the front end.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientResponse {
    pub id: String,
    pub name: String,
    pub fiscal_code: Option<String>,
    pub vat_number: Option<String>,
    pub company_type: String,
    pub contact_info: ContactInfo,
    pub legal_representative: Option<LegalRepresentative>,
    pub onboarding: Onboarding,
    pub services: Vec<String>,
    pub operating_procedure: Option<OperatingProcedure>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub data_consent: DataConsent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ClientRecord> for ClientResponse {
    fn from(record: ClientRecord) -> Self {
        Self {
            id: record.id.to_string(),
            name: record.name,
            fiscal_code: record.fiscal_code,
            vat_number: record.vat_number,
            company_type: record.company_type,
            contact_info: record.contact_info.0,
            legal_representative: record.legal_representative.map(|json| json.0),
            onboarding: record.onboarding.0,
            services: record.services.0,
            operating_procedure: record.operating_procedure.map(|json| json.0),
            notes: record.notes,
            tags: record.tags.0,
            data_consent: record.data_consent.0,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

async fn fetch_client(pool: &PgPool, id: Uuid) -> Result<ClientRecord, AppError> {
    sqlx::query_as::<_, ClientRecord>(&format!(
        "SELECT {} FROM clients WHERE id = $1",
        CLIENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::Database(DatabaseError::NotFound(format!("Client {}", id))))
}

// --- List ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub company_type: Option<String>,
    pub search: Option<String>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Serialize)]
pub struct PageRef {
    pub page: i64,
    pub limit: i64,
}

#[derive(Serialize, Default)]
pub struct Pagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<PageRef>,
}

/// GET /api/clients
///
/// Lists clients with optional filters (onboarding status, company type,
/// assignee, free-text search over name/fiscal code/VAT/email) and
/// page/limit pagination, newest first.
pub async fn list_clients(
    query: web::Query<ClientListQuery>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1) * limit;

    if let Some(status) = &query.status {
        if OnboardingStatus::parse(status).is_none() {
            return Err(AppError::Validation(ValidationError::InvalidFormat(
                format!("Unknown onboarding status: {}", status),
            )));
        }
    }

    let filter_sql = r#"
        ($1::text IS NULL OR onboarding->>'status' = $1)
        AND ($2::text IS NULL OR company_type = $2)
        AND ($3::uuid IS NULL OR (onboarding->>'assignedTo')::uuid = $3)
        AND ($4::text IS NULL
            OR name ILIKE '%' || $4 || '%'
            OR fiscal_code ILIKE '%' || $4 || '%'
            OR vat_number ILIKE '%' || $4 || '%'
            OR contact_info->>'email' ILIKE '%' || $4 || '%')
    "#;

    let total = sqlx::query_scalar::<_, i64>(&format!(
        "SELECT COUNT(*) FROM clients WHERE {}",
        filter_sql
    ))
    .bind(&query.status)
    .bind(&query.company_type)
    .bind(query.assigned_to)
    .bind(&query.search)
    .fetch_one(pool.get_ref())
    .await?;

    let records = sqlx::query_as::<_, ClientRecord>(&format!(
        "SELECT {} FROM clients WHERE {} ORDER BY created_at DESC LIMIT $5 OFFSET $6",
        CLIENT_COLUMNS, filter_sql
    ))
    .bind(&query.status)
    .bind(&query.company_type)
    .bind(query.assigned_to)
    .bind(&query.search)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool.get_ref())
    .await?;

    let mut pagination = Pagination::default();
    if offset + limit < total {
        pagination.next = Some(PageRef {
            page: page + 1,
            limit,
        });
    }
    if offset > 0 {
        pagination.prev = Some(PageRef {
            page: page - 1,
            limit,
        });
    }

    let clients: Vec<ClientResponse> = records.into_iter().map(ClientResponse::from).collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "count": clients.len(),
        "pagination": pagination,
        "data": clients,
        "total": total
    })))
}

// --- Create ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClientRequest {
    pub name: Option<String>,
    pub company_type: Option<CompanyType>,
    pub contact_info: Option<ContactInfo>,
    pub fiscal_code: Option<String>,
    pub vat_number: Option<String>,
    pub legal_representative: Option<LegalRepresentative>,
    #[serde(default)]
    pub services: Vec<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub data_consent: Option<DataConsent>,
}

/// POST /api/clients
///
/// Creates a client, generates the default checklist for its company type,
/// and assigns onboarding to the creating user. Requires admin or manager.
///
/// # Errors
/// - 400: Missing required fields, invalid fiscal code/VAT, missing legal
///   representative for a company
/// - 403: Insufficient role
pub async fn create_client(
    form: web::Json<CreateClientRequest>,
    pool: web::Data<PgPool>,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("client_create");
    require_role(&claims, &[Role::Admin, Role::Manager])?;

    let form = form.into_inner();
    let (name, company_type, contact_info) =
        match (form.name, form.company_type, form.contact_info) {
            (Some(name), Some(company_type), Some(contact_info)) => {
                (name, company_type, contact_info)
            }
            _ => {
                return Err(AppError::Validation(ValidationError::MissingFields(
                    "name, companyType, contactInfo".to_string(),
                )))
            }
        };

    let name = is_valid_name(&name)?;
    let fiscal_code = form
        .fiscal_code
        .as_deref()
        .map(is_valid_fiscal_code)
        .transpose()?;
    let vat_number = form
        .vat_number
        .as_deref()
        .map(is_valid_vat_number)
        .transpose()?;

    // At least one tax identity is required
    if fiscal_code.is_none() && vat_number.is_none() {
        return Err(AppError::Validation(ValidationError::MissingFields(
            "fiscalCode or vatNumber".to_string(),
        )));
    }

    // Companies must name who represents them; individuals represent themselves
    if company_type != CompanyType::Individual && form.legal_representative.is_none() {
        return Err(AppError::Validation(ValidationError::MissingFields(
            "legalRepresentative".to_string(),
        )));
    }

    let assigned_to = claims.user_id().ok();
    let onboarding = Onboarding::new(assigned_to, default_checklist(company_type));

    let client_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO clients (id, name, fiscal_code, vat_number, company_type, contact_info,
            legal_representative, onboarding, services, operating_procedure, notes, tags,
            data_consent, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NULL, $10, $11, $12, now(), now())
        "#,
    )
    .bind(client_id)
    .bind(&name)
    .bind(&fiscal_code)
    .bind(&vat_number)
    .bind(company_type.as_str())
    .bind(Json(&contact_info))
    .bind(form.legal_representative.as_ref().map(Json))
    .bind(Json(&onboarding))
    .bind(Json(&form.services))
    .bind(&form.notes)
    .bind(Json(&form.tags))
    .bind(Json(form.data_consent.clone().unwrap_or_default()))
    .execute(pool.get_ref())
    .await?;

    tracing::info!(
        request_id = %context.request_id,
        client_id = %client_id,
        "Client created"
    );
    AuditLog::new("CREATE", "client", "SUCCESS", "Client created")
        .with_resource_id(client_id.to_string())
        .with_user_id(claims.sub.clone())
        .record();

    let record = fetch_client(pool.get_ref(), client_id).await?;
    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "data": ClientResponse::from(record)
    })))
}

// --- Read ---

/// GET /api/clients/{id}
pub async fn get_client(
    path: web::Path<Uuid>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let record = fetch_client(pool.get_ref(), path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": ClientResponse::from(record)
    })))
}

// --- Update ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClientRequest {
    pub name: Option<String>,
    pub fiscal_code: Option<String>,
    pub vat_number: Option<String>,
    pub contact_info: Option<ContactInfo>,
    pub legal_representative: Option<LegalRepresentative>,
    pub services: Option<Vec<String>>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
    pub data_consent: Option<DataConsent>,
}

/// PUT /api/clients/{id}
///
/// Partial update of client registry data. Company type and onboarding are
/// managed through their dedicated endpoints. Requires admin or manager.
pub async fn update_client(
    path: web::Path<Uuid>,
    form: web::Json<UpdateClientRequest>,
    pool: web::Data<PgPool>,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    require_role(&claims, &[Role::Admin, Role::Manager])?;

    let client_id = path.into_inner();
    let mut record = fetch_client(pool.get_ref(), client_id).await?;
    let form = form.into_inner();

    if let Some(name) = form.name {
        record.name = is_valid_name(&name)?;
    }
    if let Some(fiscal_code) = form.fiscal_code.as_deref() {
        record.fiscal_code = Some(is_valid_fiscal_code(fiscal_code)?);
    }
    if let Some(vat_number) = form.vat_number.as_deref() {
        record.vat_number = Some(is_valid_vat_number(vat_number)?);
    }
    if let Some(contact_info) = form.contact_info {
        record.contact_info = Json(contact_info);
    }
    if let Some(representative) = form.legal_representative {
        record.legal_representative = Some(Json(representative));
    }
    if let Some(services) = form.services {
        record.services = Json(services);
    }
    if let Some(notes) = form.notes {
        record.notes = Some(notes);
    }
    if let Some(tags) = form.tags {
        record.tags = Json(tags);
    }
    if let Some(data_consent) = form.data_consent {
        record.data_consent = Json(data_consent);
    }

    sqlx::query(
        r#"
        UPDATE clients SET name = $2, fiscal_code = $3, vat_number = $4, contact_info = $5,
            legal_representative = $6, services = $7, notes = $8, tags = $9, data_consent = $10,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(client_id)
    .bind(&record.name)
    .bind(&record.fiscal_code)
    .bind(&record.vat_number)
    .bind(&record.contact_info)
    .bind(&record.legal_representative)
    .bind(&record.services)
    .bind(&record.notes)
    .bind(&record.tags)
    .bind(&record.data_consent)
    .execute(pool.get_ref())
    .await?;

    AuditLog::new("UPDATE", "client", "SUCCESS", "Client updated")
        .with_resource_id(client_id.to_string())
        .with_user_id(claims.sub.clone())
        .record();

    let record = fetch_client(pool.get_ref(), client_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": ClientResponse::from(record)
    })))
}

// --- Delete ---

/// DELETE /api/clients/{id}
///
/// Removes a client. Admin only.
pub async fn delete_client(
    path: web::Path<Uuid>,
    pool: web::Data<PgPool>,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    require_role(&claims, &[Role::Admin])?;

    let client_id = path.into_inner();
    // Existence check first so a missing client reports 404, not a silent no-op
    fetch_client(pool.get_ref(), client_id).await?;

    sqlx::query("DELETE FROM clients WHERE id = $1")
        .bind(client_id)
        .execute(pool.get_ref())
        .await?;

    AuditLog::new("DELETE", "client", "SUCCESS", "Client deleted")
        .with_resource_id(client_id.to_string())
        .with_user_id(claims.sub.clone())
        .record();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": {}
    })))
}

// --- Onboarding status ---

#[derive(Deserialize)]
pub struct OnboardingStatusRequest {
    pub status: Option<String>,
}

/// PUT /api/clients/{id}/onboarding/status
///
/// Moves onboarding to a new status; stamps the completion date when the
/// status becomes `completed`.
pub async fn update_onboarding_status(
    path: web::Path<Uuid>,
    form: web::Json<OnboardingStatusRequest>,
    pool: web::Data<PgPool>,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    let status = form
        .status
        .as_deref()
        .and_then(OnboardingStatus::parse)
        .ok_or_else(|| {
            AppError::Validation(ValidationError::InvalidFormat(
                "Provide a valid status (new, in_progress, completed)".to_string(),
            ))
        })?;

    let client_id = path.into_inner();
    let mut record = fetch_client(pool.get_ref(), client_id).await?;

    record.onboarding.0.status = status;
    if status == OnboardingStatus::Completed {
        record.onboarding.0.completed_at = Some(Utc::now());
    }

    sqlx::query("UPDATE clients SET onboarding = $2, updated_at = now() WHERE id = $1")
        .bind(client_id)
        .bind(&record.onboarding)
        .execute(pool.get_ref())
        .await?;

    AuditLog::new("UPDATE", "client", "SUCCESS", "Onboarding status changed")
        .with_resource_id(client_id.to_string())
        .with_user_id(claims.sub.clone())
        .record();

    let record = fetch_client(pool.get_ref(), client_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": ClientResponse::from(record)
    })))
}

// --- Checklist ---

/// GET /api/clients/{id}/checklist
pub async fn get_checklist(
    path: web::Path<Uuid>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let record = fetch_client(pool.get_ref(), path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": record.onboarding.0.checklist
    })))
}

#[derive(Deserialize)]
pub struct ChecklistItemRequest {
    pub status: Option<String>,
}

/// PUT /api/clients/{id}/checklist/{item_id}
///
/// Updates a checklist item's verification status, stamping the upload and
/// verification timestamps. When every required document reaches `verified`,
/// onboarding auto-completes.
pub async fn update_checklist_item(
    path: web::Path<(Uuid, Uuid)>,
    form: web::Json<ChecklistItemRequest>,
    pool: web::Data<PgPool>,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    let status = form
        .status
        .as_deref()
        .and_then(ChecklistStatus::parse)
        .ok_or_else(|| {
            AppError::Validation(ValidationError::InvalidFormat(
                "Provide a valid status (pending, uploaded, verified, rejected)".to_string(),
            ))
        })?;

    let (client_id, item_id) = path.into_inner();
    let mut record = fetch_client(pool.get_ref(), client_id).await?;

    let onboarding = &mut record.onboarding.0;
    let item = onboarding
        .checklist
        .iter_mut()
        .find(|item| item.id == item_id)
        .ok_or_else(|| {
            AppError::Database(DatabaseError::NotFound(format!("Checklist item {}", item_id)))
        })?;

    item.status = status;
    match status {
        ChecklistStatus::Uploaded => item.uploaded_at = Some(Utc::now()),
        ChecklistStatus::Verified => item.verified_at = Some(Utc::now()),
        _ => {}
    }

    if onboarding.is_complete() && onboarding.status != OnboardingStatus::Completed {
        onboarding.status = OnboardingStatus::Completed;
        onboarding.completed_at = Some(Utc::now());
    }

    sqlx::query("UPDATE clients SET onboarding = $2, updated_at = now() WHERE id = $1")
        .bind(client_id)
        .bind(&record.onboarding)
        .execute(pool.get_ref())
        .await?;

    AuditLog::new("UPDATE", "checklist", "SUCCESS", "Checklist item updated")
        .with_resource_id(item_id.to_string())
        .with_user_id(claims.sub.clone())
        .record();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": record.onboarding.0.checklist
    })))
}

// --- Procedure generation ---

/// POST /api/clients/{id}/procedure
///
/// Generates an operating procedure for the client through the configured
/// text-generation capability and stores it on the record. Requires admin
/// or manager.
pub async fn generate_client_procedure(
    path: web::Path<Uuid>,
    pool: web::Data<PgPool>,
    ai: web::Data<AiService>,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("procedure_generation");
    require_role(&claims, &[Role::Admin, Role::Manager])?;

    let client_id = path.into_inner();
    let record = fetch_client(pool.get_ref(), client_id).await?;

    let company_type = match record.company_type.as_str() {
        "Individual" => CompanyType::Individual,
        "Partnership" => CompanyType::Partnership,
        "Corporation" => CompanyType::Corporation,
        "LLC" => CompanyType::Llc,
        other => {
            return Err(AppError::Internal(format!(
                "Unknown company type stored for client: {}",
                other
            )))
        }
    };

    let summary = ClientSummary {
        name: record.name.clone(),
        company_type,
        fiscal_code: record.fiscal_code.clone(),
        vat_number: record.vat_number.clone(),
        services: record.services.0.clone(),
    };

    let procedure = ai.generate_procedure(&summary).await?;

    sqlx::query("UPDATE clients SET operating_procedure = $2, updated_at = now() WHERE id = $1")
        .bind(client_id)
        .bind(Json(&procedure))
        .execute(pool.get_ref())
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        client_id = %client_id,
        "Operating procedure generated"
    );
    AuditLog::new("GENERATE", "procedure", "SUCCESS", "Procedure generated")
        .with_resource_id(client_id.to_string())
        .with_user_id(claims.sub.clone())
        .record();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": {
            "clientId": client_id.to_string(),
            "procedure": procedure
        }
    })))
}
