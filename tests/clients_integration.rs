use clientdesk::configuration::{get_configuration, DatabaseSettings};
use clientdesk::startup::run;
use serde_json::{json, Value};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use std::net::TcpListener;

pub struct TestApp {
    pub address: String,
    pub db_pool: PgPool,
}

async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = uuid::Uuid::new_v4().to_string();
    let connection_pool = configure_database(&configuration.database).await;

    let server =
        run(listener, connection_pool.clone(), configuration).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        db_pool: connection_pool,
    }
}

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

/// Registers a staff member with the given role and returns (token, user_id).
async fn login_as(app: &TestApp, email: &str, role: &str) -> (String, String) {
    let body = json!({
        "email": email,
        "password": "SecurePass123",
        "firstName": "Mario",
        "lastName": "Rossi",
        "role": role
    });

    let response = reqwest::Client::new()
        .post(&format!("{}/auth/register", &app.address))
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(201, response.status().as_u16());

    let body: Value = response.json().await.expect("Failed to parse response");
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

fn corporation_payload(name: &str) -> Value {
    json!({
        "name": name,
        "companyType": "Corporation",
        "vatNumber": "12345678901",
        "contactInfo": {
            "email": "amministrazione@acme.it",
            "phone": "+39 02 1234567",
            "address": {
                "street": "Via Roma 1",
                "city": "Milano",
                "province": "MI",
                "postalCode": "20121"
            }
        },
        "legalRepresentative": {
            "firstName": "Anna",
            "lastName": "Bianchi",
            "fiscalCode": "BNCNNA80A41F205X",
            "role": "CEO"
        },
        "services": ["Bookkeeping", "Tax filing"]
    })
}

fn individual_payload(name: &str) -> Value {
    json!({
        "name": name,
        "companyType": "Individual",
        "fiscalCode": "RSSMRA85T10A562S",
        "contactInfo": {
            "email": "mario@example.com",
            "phone": "+39 333 1234567",
            "address": {
                "street": "Via Garibaldi 2",
                "city": "Torino",
                "province": "TO",
                "postalCode": "10122"
            }
        }
    })
}

async fn create_client(app: &TestApp, token: &str, payload: &Value) -> Value {
    let response = reqwest::Client::new()
        .post(&format!("{}/api/clients", &app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(payload)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(201, response.status().as_u16());

    response.json().await.expect("Failed to parse response")
}

// --- Creation ---

#[tokio::test]
async fn create_client_generates_checklist_for_company_type() {
    let app = spawn_app().await;
    let (token, user_id) = login_as(&app, "manager@example.com", "manager").await;

    let body = create_client(&app, &token, &corporation_payload("Acme Srl")).await;

    assert_eq!(body["success"], true);
    let onboarding = &body["data"]["onboarding"];
    assert_eq!(onboarding["status"], "new");
    assert_eq!(onboarding["assignedTo"], user_id.as_str());
    // 3 base documents + 4 corporation-specific ones
    assert_eq!(onboarding["checklist"].as_array().unwrap().len(), 7);
    assert!(onboarding["checklist"]
        .as_array()
        .unwrap()
        .iter()
        .all(|item| item["status"] == "pending"));
}

#[tokio::test]
async fn create_client_requires_core_fields() {
    let app = spawn_app().await;
    let (token, _) = login_as(&app, "manager@example.com", "manager").await;

    let response = reqwest::Client::new()
        .post(&format!("{}/api/clients", &app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({"name": "No Type"}))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "MISSING_FIELDS");
}

#[tokio::test]
async fn create_client_requires_a_tax_identity() {
    let app = spawn_app().await;
    let (token, _) = login_as(&app, "manager@example.com", "manager").await;

    let mut payload = individual_payload("Mario Rossi");
    payload.as_object_mut().unwrap().remove("fiscalCode");

    let response = reqwest::Client::new()
        .post(&format!("{}/api/clients", &app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&payload)
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
async fn create_client_validates_italian_identifiers() {
    let app = spawn_app().await;
    let (token, _) = login_as(&app, "manager@example.com", "manager").await;
    let client = reqwest::Client::new();

    let mut bad_fiscal = individual_payload("Mario Rossi");
    bad_fiscal["fiscalCode"] = json!("NOT-A-FISCAL-CODE");
    let response = client
        .post(&format!("{}/api/clients", &app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&bad_fiscal)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(400, response.status().as_u16());

    let mut bad_vat = corporation_payload("Acme Srl");
    bad_vat["vatNumber"] = json!("12AB");
    let response = client
        .post(&format!("{}/api/clients", &app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&bad_vat)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
async fn create_client_requires_legal_representative_for_companies() {
    let app = spawn_app().await;
    let (token, _) = login_as(&app, "manager@example.com", "manager").await;

    let mut payload = corporation_payload("Acme Srl");
    payload.as_object_mut().unwrap().remove("legalRepresentative");

    let response = reqwest::Client::new()
        .post(&format!("{}/api/clients", &app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&payload)
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
async fn operator_cannot_create_clients() {
    let app = spawn_app().await;
    let (token, _) = login_as(&app, "operator@example.com", "operator").await;

    let response = reqwest::Client::new()
        .post(&format!("{}/api/clients", &app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&corporation_payload("Acme Srl"))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(403, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn client_routes_require_authentication() {
    let app = spawn_app().await;

    let response = reqwest::Client::new()
        .get(&format!("{}/api/clients", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
}

// --- Listing ---

#[tokio::test]
async fn list_clients_filters_and_paginates() {
    let app = spawn_app().await;
    let (token, _) = login_as(&app, "manager@example.com", "manager").await;
    let client = reqwest::Client::new();

    create_client(&app, &token, &corporation_payload("Acme Srl")).await;
    create_client(&app, &token, &corporation_payload("Beta SpA")).await;
    create_client(&app, &token, &individual_payload("Mario Rossi")).await;

    // Filter by company type
    let response = client
        .get(&format!(
            "{}/api/clients?companyType=Corporation",
            &app.address
        ))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request.");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total"], 2);

    // Paginate one per page
    let response = client
        .get(&format!("{}/api/clients?page=1&limit=1", &app.address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request.");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["total"], 3);
    assert_eq!(body["pagination"]["next"]["page"], 2);
    assert!(body["pagination"].get("prev").is_none());

    // Free-text search, urlencoded
    let response = client
        .get(&format!(
            "{}/api/clients?search={}",
            &app.address,
            urlencoding::encode("Mario Rossi")
        ))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request.");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["name"], "Mario Rossi");

    // Unknown status filter is rejected
    let response = client
        .get(&format!("{}/api/clients?status=archived", &app.address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(400, response.status().as_u16());
}

// --- Update / delete ---

#[tokio::test]
async fn update_and_delete_flow() {
    let app = spawn_app().await;
    let (admin_token, _) = login_as(&app, "admin@example.com", "admin").await;
    let (operator_token, _) = login_as(&app, "operator@example.com", "operator").await;
    let client = reqwest::Client::new();

    let created = create_client(&app, &admin_token, &corporation_payload("Acme Srl")).await;
    let client_id = created["data"]["id"].as_str().unwrap().to_string();

    // Update the name
    let response = client
        .put(&format!("{}/api/clients/{}", &app.address, client_id))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&json!({"name": "Acme Group Srl", "notes": "Renamed after merger"}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["name"], "Acme Group Srl");
    assert_eq!(body["data"]["notes"], "Renamed after merger");

    // Deleting is admin-only
    let response = client
        .delete(&format!("{}/api/clients/{}", &app.address, client_id))
        .header("Authorization", format!("Bearer {}", operator_token))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(403, response.status().as_u16());

    let response = client
        .delete(&format!("{}/api/clients/{}", &app.address, client_id))
        .header("Authorization", format!("Bearer {}", admin_token))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    // The record is gone
    let response = client
        .get(&format!("{}/api/clients/{}", &app.address, client_id))
        .header("Authorization", format!("Bearer {}", admin_token))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(404, response.status().as_u16());

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clients")
        .fetch_one(&app.db_pool)
        .await
        .expect("Failed to count clients");
    assert_eq!(remaining, 0);
}

// --- Onboarding ---

#[tokio::test]
async fn onboarding_status_transitions() {
    let app = spawn_app().await;
    let (token, _) = login_as(&app, "manager@example.com", "manager").await;
    let client = reqwest::Client::new();

    let created = create_client(&app, &token, &corporation_payload("Acme Srl")).await;
    let client_id = created["data"]["id"].as_str().unwrap().to_string();

    let response = client
        .put(&format!(
            "{}/api/clients/{}/onboarding/status",
            &app.address, client_id
        ))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({"status": "in_progress"}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["onboarding"]["status"], "in_progress");
    assert!(body["data"]["onboarding"]["completedAt"].is_null());

    // Completing stamps the completion date
    let response = client
        .put(&format!(
            "{}/api/clients/{}/onboarding/status",
            &app.address, client_id
        ))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({"status": "completed"}))
        .send()
        .await
        .expect("Failed to execute request.");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["onboarding"]["status"], "completed");
    assert!(!body["data"]["onboarding"]["completedAt"].is_null());

    // Bogus status
    let response = client
        .put(&format!(
            "{}/api/clients/{}/onboarding/status",
            &app.address, client_id
        ))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({"status": "archived"}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
async fn verifying_every_required_document_completes_onboarding() {
    let app = spawn_app().await;
    let (token, _) = login_as(&app, "manager@example.com", "manager").await;
    let client = reqwest::Client::new();

    let created = create_client(&app, &token, &individual_payload("Mario Rossi")).await;
    let client_id = created["data"]["id"].as_str().unwrap().to_string();

    let checklist: Vec<String> = created["data"]["onboarding"]["checklist"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap().to_string())
        .collect();

    let mut last_body = Value::Null;
    for item_id in &checklist {
        let response = client
            .put(&format!(
                "{}/api/clients/{}/checklist/{}",
                &app.address, client_id, item_id
            ))
            .header("Authorization", format!("Bearer {}", token))
            .json(&json!({"status": "verified"}))
            .send()
            .await
            .expect("Failed to execute request.");
        assert_eq!(200, response.status().as_u16());
        last_body = response.json().await.unwrap();
    }

    assert!(last_body["data"]
        .as_array()
        .unwrap()
        .iter()
        .all(|item| item["status"] == "verified" && !item["verifiedAt"].is_null()));

    // Onboarding auto-completed once the last required document verified
    let response = client
        .get(&format!("{}/api/clients/{}", &app.address, client_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request.");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["onboarding"]["status"], "completed");
    assert!(!body["data"]["onboarding"]["completedAt"].is_null());
}

#[tokio::test]
async fn checklist_update_rejects_unknown_items_and_statuses() {
    let app = spawn_app().await;
    let (token, _) = login_as(&app, "manager@example.com", "manager").await;
    let client = reqwest::Client::new();

    let created = create_client(&app, &token, &individual_payload("Mario Rossi")).await;
    let client_id = created["data"]["id"].as_str().unwrap().to_string();
    let item_id = created["data"]["onboarding"]["checklist"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = client
        .put(&format!(
            "{}/api/clients/{}/checklist/{}",
            &app.address,
            client_id,
            uuid::Uuid::new_v4()
        ))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({"status": "verified"}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(404, response.status().as_u16());

    let response = client
        .put(&format!(
            "{}/api/clients/{}/checklist/{}",
            &app.address, client_id, item_id
        ))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({"status": "lost"}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(400, response.status().as_u16());
}

// --- Procedure generation ---

#[tokio::test]
async fn procedure_generation_stores_the_result() {
    let app = spawn_app().await;
    let (token, _) = login_as(&app, "manager@example.com", "manager").await;
    let client = reqwest::Client::new();

    let created = create_client(&app, &token, &corporation_payload("Acme Srl")).await;
    let client_id = created["data"]["id"].as_str().unwrap().to_string();

    // No API key is configured in tests, so the deterministic generator runs
    let response = client
        .post(&format!(
            "{}/api/clients/{}/procedure",
            &app.address, client_id
        ))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["clientId"], client_id.as_str());
    let procedure = &body["data"]["procedure"];
    assert!(procedure["name"]
        .as_str()
        .unwrap()
        .starts_with("Onboarding Procedure"));
    assert!(!procedure["tasks"].as_array().unwrap().is_empty());

    // The procedure was persisted on the client record
    let response = client
        .get(&format!("{}/api/clients/{}", &app.address, client_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request.");
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["data"]["operatingProcedure"]["name"],
        procedure["name"]
    );
}

#[tokio::test]
async fn operator_cannot_generate_procedures() {
    let app = spawn_app().await;
    let (manager_token, _) = login_as(&app, "manager@example.com", "manager").await;
    let (operator_token, _) = login_as(&app, "operator@example.com", "operator").await;

    let created = create_client(&app, &manager_token, &corporation_payload("Acme Srl")).await;
    let client_id = created["data"]["id"].as_str().unwrap().to_string();

    let response = reqwest::Client::new()
        .post(&format!(
            "{}/api/clients/{}/procedure",
            &app.address, client_id
        ))
        .header("Authorization", format!("Bearer {}", operator_token))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(403, response.status().as_u16());
}
