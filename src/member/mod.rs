//! Association management client: members, bookkeeping, dues, events,
//! meetings, documents and the village ledger of one tenant.

mod files;
mod finance;
mod members;
mod records;
mod reports;
mod village;

pub use records::{lines_to_list, list_to_lines};
pub use reports::render_csv;

use crate::config::{ClientConfig, today_string};
use crate::console::{Console, Crud, LoadMode};
use crate::errors::{ClientError, Result};
use crate::gateway::{ApiGateway, Endpoint};
use crate::http::{HttpClient, Method};
use crate::models::{EntityRecord, Session};
use crate::prompt::UserPrompt;
use crate::state::{Action, Collection, Form, ViewState};
use crate::storage::{SessionStore, StorageProvider};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

pub const MAIN_CASH_ACCOUNT: &str = "Ana Kasa";
pub const VILLAGE_CASH_ACCOUNT: &str = "Köy Kasası";
pub const RECENT_COUNT: usize = 5;

pub(crate) const MEMBERS: Crud = Crud {
    form: Form::Member,
    collection: Collection::Members,
    path: "/web/members",
    id_field: "id",
    noun: "Member",
};

pub(crate) const INCOMES: Crud = Crud {
    form: Form::Income,
    collection: Collection::Incomes,
    path: "/web/incomes",
    id_field: "id",
    noun: "Income",
};

pub(crate) const EXPENSES: Crud = Crud {
    form: Form::Expense,
    collection: Collection::Expenses,
    path: "/web/expenses",
    id_field: "id",
    noun: "Expense",
};

pub(crate) const TRANSFERS: Crud = Crud {
    form: Form::Transfer,
    collection: Collection::Transfers,
    path: "/web/transfers",
    id_field: "id",
    noun: "Transfer",
};

pub struct MemberClient {
    console: Console,
}

impl MemberClient {
    pub fn new(
        config: &ClientConfig,
        http: Arc<dyn HttpClient>,
        storage: Arc<dyn StorageProvider>,
        prompt: Arc<dyn UserPrompt>,
    ) -> Self {
        let gateway = ApiGateway::new(config.member_base(), http, SessionStore::member(storage));
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

    pub fn set_year(&self, year: i32) {
        self.console.dispatch(Action::YearSelected(year));
    }

    pub async fn init(&self) {
        if self.console.restore_session().await {
            self.load_dashboard().await;
        }
        self.console.dispatch(Action::Initialized);
    }

    pub async fn login(&self, customer_id: &str, username: &str, password: &str) -> Result<()> {
        self.console.dispatch(Action::LoginStarted);
        let body = json!({ "customer_id": customer_id, "username": username, "password": password });

        let result = self
            .console
            .call_anonymous(Method::Post, Endpoint::new("/auth/login"), Some(&body))
            .await
            .and_then(|response| session_from_login(&response, customer_id));
        let session = match result {
            Ok(session) => session,
            Err(err) => {
                self.console.dispatch(Action::LoginFailed(err.to_string()));
                return Err(err);
            }
        };

        self.console.start_session(session).await?;
        info!("{username} signed in to {customer_id}");
        self.load_dashboard().await;
        self.console.toaster().success("Signed in");
        Ok(())
    }

    pub async fn logout(&self) {
        self.console.end_session().await;
    }

    /// Members, incomes and expenses of the selected year are fetched together,
    /// without category filters; one failure discards all three. Cash accounts
    /// follow separately.
    pub async fn load_dashboard(&self) {
        let year = self.console.year();
        let joined = tokio::try_join!(
            self.console
                .fetch_list(Collection::Members, Endpoint::new(MEMBERS.path)),
            self.console.fetch_list(
                Collection::Incomes,
                Endpoint::new(INCOMES.path).query("year", year)
            ),
            self.console.fetch_list(
                Collection::Expenses,
                Endpoint::new(EXPENSES.path).query("year", year)
            ),
        );

        match joined {
            Ok((members, incomes, expenses)) => {
                self.console.dispatch(Action::DashboardLoaded {
                    members,
                    incomes,
                    expenses,
                });
            }
            Err(err) => {
                self.console.report(&err, LoadMode::Passive, "loading dashboard");
                return;
            }
        }

        let accounts = Endpoint::new("/web/cash-accounts");
        if !self.console.refresh_list(Collection::CashAccounts, accounts).await {
            self.console.replace_list(Collection::CashAccounts, Vec::new());
        }
    }

    /// Newest incomes and expenses shown on the dashboard, in server order.
    pub fn recent_activity(&self) -> (Vec<EntityRecord>, Vec<EntityRecord>) {
        self.console.store().read(|state| {
            (
                state.recent(INCOMES.collection, RECENT_COUNT).to_vec(),
                state.recent(EXPENSES.collection, RECENT_COUNT).to_vec(),
            )
        })
    }
}

fn session_from_login(response: &Value, customer_id: &str) -> Result<Session> {
    if response.get("success").and_then(Value::as_bool) != Some(true) {
        let message = response
            .get("detail")
            .and_then(Value::as_str)
            .unwrap_or("Login failed");
        return Err(ClientError::invalid(message));
    }
    let token = response
        .get("token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ClientError::invalid("login response carried no token"))?;
    let user = response.get("user").cloned().unwrap_or(Value::Null);
    Ok(Session::new(token, user, Some(customer_id.to_string())))
}

pub fn member_defaults() -> EntityRecord {
    EntityRecord::new()
        .with("full_name", "")
        .with("phone", "")
        .with("tc_no", "")
        .with("email", "")
        .with("address", "")
        .with("status", crate::aggregates::ACTIVE_STATUS)
}

pub fn income_defaults() -> EntityRecord {
    EntityRecord::new()
        .with("date", today_string())
        .with("category", "AİDAT")
        .with("amount", "")
        .with("description", "")
        .with("cash_account", MAIN_CASH_ACCOUNT)
}

pub fn expense_defaults() -> EntityRecord {
    EntityRecord::new()
        .with("date", today_string())
        .with("category", "DİĞER")
        .with("amount", "")
        .with("description", "")
        .with("vendor", "")
        .with("cash_account", MAIN_CASH_ACCOUNT)
}

pub fn transfer_defaults() -> EntityRecord {
    EntityRecord::new()
        .with("from_account", MAIN_CASH_ACCOUNT)
        .with("to_account", "Banka")
        .with("amount", "")
        .with("date", today_string())
        .with("description", "")
}
