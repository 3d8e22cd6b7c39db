//! Super-admin console: customers, licenses, release versions, revenue and
//! usage statistics, audit logs.

use crate::config::ClientConfig;
use crate::console::{Console, Crud, LoadMode, record_id};
use crate::errors::{ClientError, Result};
use crate::gateway::{ApiGateway, Endpoint};
use crate::http::{HttpClient, Method};
use crate::models::{EntityRecord, Outcome, Session};
use crate::prompt::UserPrompt;
use crate::state::{Action, Collection, CustomerFilter, Detail, Form, ViewState};
use crate::storage::{SessionStore, StorageProvider};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

pub const EXPIRING_WINDOW_DAYS: u32 = 30;
pub const DEFAULT_EXTENSION_DAYS: &str = "365";

const CUSTOMERS: Crud = Crud {
    form: Form::Customer,
    collection: Collection::Customers,
    path: "/customers",
    id_field: "customer_id",
    noun: "Customer",
};

const VERSIONS: Crud = Crud {
    form: Form::Version,
    collection: Collection::Versions,
    path: "/versions",
    id_field: "id",
    noun: "Version",
};

pub fn customer_defaults() -> EntityRecord {
    EntityRecord::new()
        .with("organization_name", "")
        .with("contact_name", "")
        .with("contact_email", "")
        .with("contact_phone", "")
        .with("license_type", "DEMO")
        .with("license_days", 365)
        .with("monthly_fee", 0)
        .with("notes", "")
}

pub fn license_defaults() -> EntityRecord {
    EntityRecord::new()
        .with("license_type", "LOCAL")
        .with("organization_name", "")
        .with("contact_name", "")
        .with("contact_email", "")
        .with("contact_phone", "")
        .with("license_days", 365)
        .with("max_users", 5)
        .with("max_members", 500)
}

pub fn version_defaults() -> EntityRecord {
    EntityRecord::new()
        .with("version", "")
        .with("platform", "all")
        .with("download_url", "")
        .with("release_notes", "")
        .with("is_mandatory", false)
}

pub struct AdminConsole {
    console: Console,
}

impl AdminConsole {
    pub fn new(
        config: &ClientConfig,
        http: Arc<dyn HttpClient>,
        storage: Arc<dyn StorageProvider>,
        prompt: Arc<dyn UserPrompt>,
    ) -> Self {
        let gateway = ApiGateway::new(config.admin_base(), http, SessionStore::admin(storage));
        Self {
            console: Console::new(gateway, prompt, config.year),
        }
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn state(&self) -> ViewState {
        self.console.snapshot()
    }

    /// Restores a persisted session and, if there is one, loads the dashboard.
    pub async fn init(&self) {
        if self.console.restore_session().await {
            self.load_dashboard().await;
        }
        self.console.dispatch(Action::Initialized);
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        self.console.dispatch(Action::LoginStarted);
        let body = json!({ "username": username, "password": password });

        let response = match self
            .console
            .call_anonymous(Method::Post, Endpoint::new("/auth/login"), Some(&body))
            .await
        {
            Ok(response) => response,
            Err(err) => {
                self.console.dispatch(Action::LoginFailed(err.to_string()));
                return Err(err);
            }
        };

        let Some(token) = response.get("token").and_then(Value::as_str) else {
            let err = ClientError::invalid("login response carried no token");
            self.console.dispatch(Action::LoginFailed(err.to_string()));
            return Err(err);
        };
        let admin = response.get("admin").cloned().unwrap_or(Value::Null);
        self.console.start_session(Session::new(token, admin, None)).await?;
        info!("admin {username} signed in");

        self.load_dashboard().await;
        Ok(())
    }

    pub async fn logout(&self) {
        self.console.end_session().await;
    }

    pub async fn load_dashboard(&self) {
        self.console
            .refresh_detail(Detail::AdminDashboard, Endpoint::new("/dashboard"))
            .await;
    }

    // Customers

    pub fn set_customer_filter(&self, filter: CustomerFilter) {
        self.console.dispatch(Action::CustomerFilterSet(filter));
    }

    pub async fn load_customers(&self) -> Result<()> {
        let filter = self.console.store().read(|state| state.filters.customer.clone());
        let endpoint = Endpoint::new(CUSTOMERS.path)
            .query_opt("license_type", filter.license_type.as_deref())
            .query_opt("license_status", filter.license_status.as_deref())
            .query_opt("search", filter.search.as_deref());
        self.console
            .load_list(CUSTOMERS.collection, endpoint, LoadMode::Interactive)
            .await
    }

    pub fn open_customer_modal(&self, selected: Option<&EntityRecord>) {
        self.console
            .open_form(CUSTOMERS.form, customer_defaults(), selected, CUSTOMERS.id_field);
    }

    pub async fn save_customer(&self) -> Result<()> {
        self.console.save_form(&CUSTOMERS, EntityRecord::into_value).await?;
        self.load_customers().await?;
        self.load_dashboard().await;
        Ok(())
    }

    pub async fn view_customer(&self, customer: &EntityRecord) -> Result<Value> {
        let id = record_id(customer, CUSTOMERS.id_field)?;
        let payload = self
            .console
            .load_detail(Detail::Customer, Endpoint::new(CUSTOMERS.item_path(&id)), LoadMode::Interactive)
            .await?;
        Ok(payload.get("customer").cloned().unwrap_or(payload))
    }

    // Licenses

    pub async fn extend_license(&self, customer: &EntityRecord) -> Result<Outcome> {
        let id = record_id(customer, CUSTOMERS.id_field)?;
        if self.extend(&id).await? == Outcome::Cancelled {
            return Ok(Outcome::Cancelled);
        }
        self.load_customers().await?;
        Ok(Outcome::Completed)
    }

    /// Extension from the expiring-licenses view; reloads that view instead.
    pub async fn extend_expiring_license(&self, customer_id: &str) -> Result<Outcome> {
        if self.extend(customer_id).await? == Outcome::Cancelled {
            return Ok(Outcome::Cancelled);
        }
        self.load_expiring_licenses().await;
        Ok(Outcome::Completed)
    }

    async fn extend(&self, customer_id: &str) -> Result<Outcome> {
        let answer = self
            .console
            .prompt()
            .prompt("Extend the license by how many days?", DEFAULT_EXTENSION_DAYS)
            .await;
        let Some(answer) = answer.map(|days| days.trim().to_string()).filter(|days| !days.is_empty()) else {
            return Ok(Outcome::Cancelled);
        };
        let days = match answer.parse::<u32>() {
            Ok(days) if days > 0 => days,
            _ => {
                let err = ClientError::invalid(format!("'{answer}' is not a number of days"));
                self.console.report(&err, LoadMode::Interactive, "extending license");
                return Err(err);
            }
        };

        let endpoint = Endpoint::new(format!("/licenses/{customer_id}/extend")).query("days", days);
        self.console
            .run_action(None, Method::Put, endpoint, None, "License extended")
            .await
    }

    pub async fn suspend_license(&self, customer: &EntityRecord) -> Result<Outcome> {
        let id = record_id(customer, CUSTOMERS.id_field)?;
        let name = customer.text("organization_name").unwrap_or_else(|| id.clone());
        let outcome = self
            .console
            .run_action(
                Some(&format!("Suspend the license of {name}?")),
                Method::Put,
                Endpoint::new(format!("/licenses/{id}/suspend")),
                None,
                "License suspended",
            )
            .await?;
        if outcome == Outcome::Completed {
            self.load_customers().await?;
        }
        Ok(outcome)
    }

    pub async fn activate_license(&self, customer: &EntityRecord) -> Result<()> {
        let id = record_id(customer, CUSTOMERS.id_field)?;
        self.console
            .run_action(
                None,
                Method::Put,
                Endpoint::new(format!("/licenses/{id}/activate")),
                None,
                "License activated",
            )
            .await?;
        self.load_customers().await
    }

    pub fn open_license_form(&self) {
        self.console.open_form(Form::License, license_defaults(), None, "customer_id");
    }

    pub async fn generate_license(&self) -> Result<Value> {
        let body = self.console.form_or(Form::License, license_defaults).into_value();
        let response = match self
            .console
            .call(Method::Post, Endpoint::new("/licenses/generate"), Some(&body))
            .await
        {
            Ok(response) => response,
            Err(err) => {
                self.console.report(&err, LoadMode::Interactive, "generating license");
                return Err(err);
            }
        };

        let license = response.get("license").cloned().unwrap_or(Value::Null);
        self.console.dispatch(Action::DetailLoaded {
            detail: Detail::GeneratedLicense,
            value: license.clone(),
        });
        self.console.toaster().success("License generated");
        self.load_dashboard().await;
        Ok(license)
    }

    /// Code of the most recently generated license.
    pub fn license_code(&self) -> Option<String> {
        self.console.store().read(|state| {
            state
                .detail(Detail::GeneratedLicense)
                .and_then(|license| license.get("customer_id"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
    }

    pub async fn load_expiring_licenses(&self) {
        let endpoint = Endpoint::new("/licenses/expiring").query("days", EXPIRING_WINDOW_DAYS);
        self.console.refresh_list(Collection::ExpiringLicenses, endpoint).await;
    }

    // Versions

    pub async fn load_versions(&self) -> Result<()> {
        self.console
            .load_list(VERSIONS.collection, Endpoint::new(VERSIONS.path), LoadMode::Interactive)
            .await
    }

    pub fn open_version_modal(&self) {
        self.console
            .open_form(VERSIONS.form, version_defaults(), None, VERSIONS.id_field);
    }

    pub async fn save_version(&self) -> Result<()> {
        self.console.save_form(&VERSIONS, EntityRecord::into_value).await?;
        self.load_versions().await
    }

    pub async fn delete_version(&self, version: &EntityRecord) -> Result<Outcome> {
        let outcome = self
            .console
            .delete_record(&VERSIONS, version, "Delete this version?")
            .await?;
        if outcome == Outcome::Completed {
            self.load_versions().await?;
        }
        Ok(outcome)
    }

    // Statistics and logs

    pub async fn load_stats(&self) {
        let revenue = Endpoint::new("/stats/revenue");
        if self.console.refresh_detail(Detail::RevenueStats, revenue).await {
            let usage = Endpoint::new("/stats/usage").query("days", EXPIRING_WINDOW_DAYS);
            self.console.refresh_detail(Detail::UsageStats, usage).await;
        }
    }

    pub async fn load_logs(&self) -> Result<()> {
        self.console
            .load_list(Collection::Logs, Endpoint::new("/logs").query("limit", 100), LoadMode::Interactive)
            .await
    }
}
