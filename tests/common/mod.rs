#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::{Multipart, Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use bader_client::admin::AdminConsole;
use bader_client::config::ClientConfig;
use bader_client::http::ReqwestClient;
use bader_client::member::MemberClient;
use bader_client::prompt::UserPrompt;
use bader_client::storage::{MemoryStorage, StorageProvider};
use chrono::{Duration, NaiveDate};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

pub const YEAR: i32 = 2025;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub tenant: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Default)]
pub struct FakeState {
    pub requests: Vec<Recorded>,
    /// Answer every authenticated request with 401.
    pub reject_tokens: bool,
    /// Paths answered with 500.
    pub failing: HashSet<String>,
    pub next_id: i64,
    pub members: Vec<Value>,
    pub inactive: Vec<Value>,
    pub incomes: Vec<Value>,
    pub expenses: Vec<Value>,
    pub customers: Vec<Value>,
    pub versions: Vec<Value>,
    pub uploads: Vec<(String, Option<String>)>,
    pub dues: Vec<Value>,
    pub payments: Vec<Value>,
    pub meetings: Vec<Value>,
    pub village_incomes: Vec<Value>,
    pub village_expenses: Vec<Value>,
}

impl FakeState {
    fn assign_id(&mut self, mut record: Value) -> Value {
        self.next_id += 1;
        record["id"] = json!(self.next_id);
        record
    }
}

type Shared = Arc<Mutex<FakeState>>;

/// In-process backend on an ephemeral port.
pub struct Backend {
    pub url: String,
    pub state: Shared,
}

impl Backend {
    pub async fn start() -> Self {
        Self::start_with(FakeState::default()).await
    }

    pub async fn start_with(initial: FakeState) -> Self {
        let state: Shared = Arc::new(Mutex::new(initial));
        let app = router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            url: format!("http://{addr}"),
            state,
        }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(&self.url, "unused", YEAR)
    }

    pub fn member(&self, prompt: Arc<dyn UserPrompt>) -> MemberClient {
        self.member_with(Arc::new(MemoryStorage::new()), prompt)
    }

    pub fn member_with(&self, storage: Arc<dyn StorageProvider>, prompt: Arc<dyn UserPrompt>) -> MemberClient {
        MemberClient::new(&self.config(), Arc::new(ReqwestClient::new()), storage, prompt)
    }

    pub fn admin(&self, prompt: Arc<dyn UserPrompt>) -> AdminConsole {
        AdminConsole::new(
            &self.config(),
            Arc::new(ReqwestClient::new()),
            Arc::new(MemoryStorage::new()),
            prompt,
        )
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.method == method && request.path == path)
            .count()
    }

    pub fn clear_requests(&self) {
        self.state.lock().unwrap().requests.clear();
    }

    pub fn reject_tokens(&self, reject: bool) {
        self.state.lock().unwrap().reject_tokens = reject;
    }

    pub fn fail(&self, path: &str) {
        self.state.lock().unwrap().failing.insert(path.to_string());
    }

    pub fn recover(&self, path: &str) {
        self.state.lock().unwrap().failing.remove(path);
    }
}

/// Answers confirmations and prompts from queues; an empty queue cancels.
#[derive(Default)]
pub struct ScriptedPrompt {
    confirms: Mutex<VecDeque<bool>>,
    answers: Mutex<VecDeque<Option<String>>>,
    pub asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn confirming(answers: &[bool]) -> Arc<Self> {
        let prompt = Self::default();
        prompt.confirms.lock().unwrap().extend(answers.iter().copied());
        Arc::new(prompt)
    }

    pub fn answering(answers: &[Option<&str>]) -> Arc<Self> {
        let prompt = Self::default();
        prompt
            .answers
            .lock()
            .unwrap()
            .extend(answers.iter().map(|answer| answer.map(str::to_string)));
        Arc::new(prompt)
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl UserPrompt for ScriptedPrompt {
    async fn confirm(&self, message: &str) -> bool {
        self.asked.lock().unwrap().push(message.to_string());
        self.confirms.lock().unwrap().pop_front().unwrap_or(false)
    }

    async fn prompt(&self, message: &str, _default: &str) -> Option<String> {
        self.asked.lock().unwrap().push(message.to_string());
        self.answers.lock().unwrap().pop_front().flatten()
    }
}

fn router(state: Shared) -> Router {
    let member = Router::new()
        .route("/auth/login", post(member_login))
        .route("/web/members", get(list_members).post(create_member))
        .route("/web/members/inactive", get(list_inactive))
        .route("/web/members/:id", delete(deactivate_member))
        .route("/web/members/:id/activate", post(activate_member))
        .route("/web/members/:id/detail", get(member_detail))
        .route("/web/incomes", get(list_incomes).post(create_income))
        .route("/web/expenses", get(list_expenses).post(create_expense))
        .route("/web/cash-accounts", get(cash_accounts))
        .route("/web/dues", get(list_dues))
        .route("/web/dues/payment", post(pay_due))
        .route("/web/devir/calculate", get(carry_over))
        .route("/web/export/:kind", get(export))
        .route("/web/meetings", get(list_meetings).post(create_meeting))
        .route("/web/ocr/scan", post(scan_receipt))
        .route("/web/village/incomes", get(list_village_incomes))
        .route("/web/village/expenses", get(list_village_expenses))
        .route("/web/village/cash-accounts", get(village_cash_accounts))
        .route("/web/village/transfers", get(village_transfers))
        .route("/web/documents/upload", post(upload_document))
        .route("/web/documents", get(list_documents));

    let admin = Router::new()
        .route("/auth/login", post(admin_login))
        .route("/dashboard", get(admin_dashboard))
        .route("/customers", get(list_customers))
        .route("/licenses/:id/extend", put(extend_license))
        .route("/licenses/:id/suspend", put(suspend_license))
        .route("/licenses/:id/activate", put(activate_license))
        .route("/licenses/generate", post(generate_license))
        .route("/versions", get(list_versions).post(create_version))
        .route("/versions/:id", delete(delete_version));

    Router::new()
        .nest("/api/admin/api", admin)
        .nest("/api", member)
        .layer(middleware::from_fn_with_state(state.clone(), record))
        .with_state(state)
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn record(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let headers = request.headers();
    let recorded = Recorded {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        query: request.uri().query().map(str::to_string),
        authorization: header(headers, "authorization"),
        tenant: header(headers, "x-customer-id"),
        content_type: header(headers, "content-type"),
    };
    let login = recorded.path.ends_with("/auth/login");
    let (reject, fail) = {
        let mut state = state.lock().unwrap();
        let fail = state.failing.contains(&recorded.path);
        state.requests.push(recorded);
        (state.reject_tokens && !login, fail)
    };
    if reject {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "token expired" }))).into_response();
    }
    if fail {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "detail": "backend unavailable" }))).into_response();
    }
    next.run(request).await
}

async fn member_login(Json(body): Json<Value>) -> Json<Value> {
    if body["password"] == "x" {
        Json(json!({
            "success": true,
            "token": format!("tok-{}", body["customer_id"].as_str().unwrap_or("")),
            "user": { "username": body["username"], "role": "admin" }
        }))
    } else {
        Json(json!({ "success": false, "detail": "Invalid credentials" }))
    }
}

async fn list_members(State(state): State<Shared>) -> Json<Value> {
    Json(json!({ "members": state.lock().unwrap().members }))
}

async fn list_inactive(State(state): State<Shared>) -> Json<Value> {
    Json(json!({ "members": state.lock().unwrap().inactive }))
}

async fn create_member(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let mut state = state.lock().unwrap();
    let member = state.assign_id(body);
    state.members.push(member.clone());
    Json(json!({ "success": true, "member": member }))
}

fn take_by_id(records: &mut Vec<Value>, id: i64) -> Option<Value> {
    let index = records.iter().position(|record| record["id"] == json!(id))?;
    Some(records.remove(index))
}

async fn deactivate_member(State(state): State<Shared>, Path(id): Path<i64>) -> Response {
    let mut state = state.lock().unwrap();
    match take_by_id(&mut state.members, id) {
        Some(mut member) => {
            member["status"] = json!("Pasif");
            state.inactive.push(member);
            Json(json!({ "success": true })).into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(json!({ "detail": "Member not found" }))).into_response(),
    }
}

async fn activate_member(State(state): State<Shared>, Path(id): Path<i64>) -> Response {
    let mut state = state.lock().unwrap();
    match take_by_id(&mut state.inactive, id) {
        Some(mut member) => {
            member["status"] = json!("Aktif");
            state.members.push(member);
            Json(json!({ "success": true })).into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(json!({ "detail": "Member not found" }))).into_response(),
    }
}

async fn member_detail(State(state): State<Shared>, Path(id): Path<i64>) -> Response {
    let state = state.lock().unwrap();
    match state.members.iter().find(|member| member["id"] == id) {
        Some(member) => {
            let dues: Vec<&Value> = state.incomes.iter().filter(|income| income["member_id"] == id).collect();
            Json(json!({ "member": member, "dues": dues })).into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(json!({ "detail": "Member not found" }))).into_response(),
    }
}

fn in_year(records: &[Value], year: Option<&String>) -> Vec<Value> {
    records
        .iter()
        .filter(|record| match year {
            Some(year) => record["date"].as_str().is_some_and(|date| date.starts_with(year.as_str())),
            None => true,
        })
        .cloned()
        .collect()
}

/// Year and optional category filter of the ledger list endpoints.
fn matching(records: &[Value], query: &HashMap<String, String>) -> Vec<Value> {
    in_year(records, query.get("year"))
        .into_iter()
        .filter(|record| match query.get("category") {
            Some(category) => record["category"] == json!(category),
            None => true,
        })
        .collect()
}

async fn list_incomes(State(state): State<Shared>, Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    let state = state.lock().unwrap();
    Json(json!({ "incomes": matching(&state.incomes, &query) }))
}

async fn create_income(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let mut state = state.lock().unwrap();
    let income = state.assign_id(body);
    state.incomes.push(income);
    Json(json!({ "success": true }))
}

async fn list_expenses(State(state): State<Shared>, Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    let state = state.lock().unwrap();
    Json(json!({ "expenses": matching(&state.expenses, &query) }))
}

async fn create_expense(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let mut state = state.lock().unwrap();
    let expense = state.assign_id(body);
    state.expenses.push(expense);
    Json(json!({ "success": true }))
}

async fn cash_accounts() -> Json<Value> {
    Json(json!({ "accounts": [{ "name": "Ana Kasa", "balance": 0 }] }))
}

fn total(records: &[Value], field: &str) -> f64 {
    records.iter().filter_map(|record| record[field].as_f64()).sum()
}

async fn list_dues(State(state): State<Shared>) -> Json<Value> {
    let state = state.lock().unwrap();
    Json(json!({
        "dues": state.dues,
        "stats": {
            "expected": total(&state.dues, "amount"),
            "collected": total(&state.dues, "paid"),
            "remaining": total(&state.dues, "remaining"),
        }
    }))
}

async fn pay_due(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut state = state.lock().unwrap();
    let amount = body["amount"].as_f64().unwrap_or_default();
    let Some(due) = state.dues.iter_mut().find(|due| due["id"] == body["due_id"]) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "detail": "Due not found" }))).into_response();
    };
    let paid = due["paid"].as_f64().unwrap_or_default() + amount;
    let remaining = due["remaining"].as_f64().unwrap_or_default() - amount;
    due["paid"] = json!(paid);
    due["remaining"] = json!(remaining);
    state.payments.push(body);
    Json(json!({ "success": true })).into_response()
}

async fn carry_over(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    let year: i32 = query.get("year").and_then(|year| year.parse().ok()).unwrap_or_default();
    Json(json!({ "previous_balance": 1250.5, "current_year": year + 1 }))
}

/// Income exports name a file with directory parts; other kinds name none.
async fn export(Path(kind): Path<String>) -> Json<Value> {
    if kind == "incomes" {
        Json(json!({
            "filename": "../../reports/incomes_2025.csv",
            "data": [
                { "date": "2025-02-01", "amount": 250, "category": "AİDAT" },
                { "date": "2025-03-01", "amount": "75.5", "category": "BAĞIŞ" }
            ]
        }))
    } else {
        Json(json!({ "data": [{ "full_name": "Ayşe Yılmaz", "phone": null }] }))
    }
}

async fn list_meetings(State(state): State<Shared>) -> Json<Value> {
    Json(json!({ "meetings": state.lock().unwrap().meetings }))
}

async fn create_meeting(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let mut state = state.lock().unwrap();
    let meeting = state.assign_id(body);
    state.meetings.push(meeting);
    Json(json!({ "success": true }))
}

/// Recognition takes a moment, long enough to observe the busy flag.
async fn scan_receipt() -> Json<Value> {
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    Json(json!({
        "success": true,
        "date": "2025-03-04",
        "amount": 250.5,
        "vendor": "Migros",
        "description": "Market"
    }))
}

async fn list_village_incomes(State(state): State<Shared>, Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    let state = state.lock().unwrap();
    Json(json!({ "incomes": matching(&state.village_incomes, &query) }))
}

async fn list_village_expenses(State(state): State<Shared>, Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    let state = state.lock().unwrap();
    Json(json!({ "expenses": matching(&state.village_expenses, &query) }))
}

async fn village_cash_accounts() -> Json<Value> {
    Json(json!({ "accounts": [{ "name": "Köy Kasası", "balance": 0 }] }))
}

async fn village_transfers() -> Json<Value> {
    Json(json!({ "transfers": [] }))
}

async fn upload_document(State(state): State<Shared>, mut multipart: Multipart) -> Json<Value> {
    let mut file_name = String::new();
    let mut category = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => file_name = field.file_name().unwrap_or_default().to_string(),
            Some("category") => category = field.text().await.ok(),
            _ => {}
        }
    }
    state.lock().unwrap().uploads.push((file_name, category));
    Json(json!({ "success": true }))
}

async fn list_documents(State(state): State<Shared>) -> Json<Value> {
    let documents: Vec<Value> = state
        .lock()
        .unwrap()
        .uploads
        .iter()
        .map(|(name, category)| json!({ "file_name": name, "category": category }))
        .collect();
    Json(json!({ "documents": documents }))
}

async fn admin_login(Json(body): Json<Value>) -> Response {
    if body["password"] == "secret" {
        Json(json!({ "token": "admin-token", "admin": { "username": body["username"] } })).into_response()
    } else {
        (StatusCode::BAD_REQUEST, Json(json!({ "detail": "Invalid credentials" }))).into_response()
    }
}

async fn admin_dashboard(State(state): State<Shared>) -> Json<Value> {
    let total = state.lock().unwrap().customers.len();
    Json(json!({ "stats": { "total_customers": total }, "recent_activity": [] }))
}

async fn list_customers(State(state): State<Shared>) -> Json<Value> {
    Json(json!({ "customers": state.lock().unwrap().customers }))
}

async fn extend_license(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let Some(days) = query.get("days").and_then(|days| days.parse::<i64>().ok()) else {
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "detail": "days required" }))).into_response();
    };
    let mut state = state.lock().unwrap();
    let Some(customer) = state
        .customers
        .iter_mut()
        .find(|customer| customer["customer_id"] == json!(id))
    else {
        return (StatusCode::NOT_FOUND, Json(json!({ "detail": "Customer not found" }))).into_response();
    };
    let expiry = customer["expires_at"]
        .as_str()
        .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
        .unwrap_or_default();
    let extended = expiry + Duration::days(days);
    customer["expires_at"] = json!(extended.format("%Y-%m-%d").to_string());
    Json(json!({ "success": true, "expires_at": customer["expires_at"] })).into_response()
}

fn set_license_status(state: &Shared, id: &str, status: &str) -> Response {
    let mut state = state.lock().unwrap();
    match state.customers.iter_mut().find(|customer| customer["customer_id"] == json!(id)) {
        Some(customer) => {
            customer["license_status"] = json!(status);
            Json(json!({ "success": true })).into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(json!({ "detail": "Customer not found" }))).into_response(),
    }
}

async fn suspend_license(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    set_license_status(&state, &id, "suspended")
}

async fn activate_license(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    set_license_status(&state, &id, "active")
}

async fn generate_license(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let mut state = state.lock().unwrap();
    let customer_id = format!("BADER-{:04}", state.customers.len() + 1);
    state.customers.push(json!({
        "customer_id": customer_id,
        "organization_name": body["organization_name"],
        "license_type": body["license_type"],
        "max_members": body["max_members"],
        "license_status": "active"
    }));
    Json(json!({
        "success": true,
        "license": { "customer_id": customer_id, "license_key": format!("KEY-{customer_id}") }
    }))
}

async fn list_versions(State(state): State<Shared>) -> Json<Value> {
    Json(json!({ "versions": state.lock().unwrap().versions }))
}

async fn create_version(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let mut state = state.lock().unwrap();
    let version = state.assign_id(body);
    state.versions.push(version);
    Json(json!({ "success": true }))
}

async fn delete_version(State(state): State<Shared>, Path(id): Path<i64>) -> Response {
    let mut state = state.lock().unwrap();
    match take_by_id(&mut state.versions, id) {
        Some(_) => Json(json!({ "success": true })).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "detail": "Version not found" }))).into_response(),
    }
}
