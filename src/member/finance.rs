use super::{
    EXPENSES, INCOMES, MemberClient, TRANSFERS, expense_defaults, income_defaults, transfer_defaults,
};
use crate::console::{LoadMode, record_id};
use crate::errors::{ClientError, Result};
use crate::gateway::Endpoint;
use crate::http::Method;
use crate::models::{EntityRecord, Outcome};
use crate::state::{Action, Collection, Detail};
use serde_json::{Value, json};

const DUES_PATH: &str = "/web/dues";

impl MemberClient {
    // Incomes

    pub fn set_income_category(&self, category: Option<String>) {
        self.console.dispatch(Action::IncomeCategorySet(category));
    }

    pub async fn load_incomes(&self) {
        let (year, category) = self
            .console
            .store()
            .read(|state| (state.filters.year, state.filters.income_category.clone()));
        let endpoint = Endpoint::new(INCOMES.path)
            .query("year", year)
            .query_opt("category", category.as_deref());
        self.console.refresh_list(INCOMES.collection, endpoint).await;
    }

    pub fn open_income_modal(&self, selected: Option<&EntityRecord>) {
        self.console
            .open_form(INCOMES.form, income_defaults(), selected, INCOMES.id_field);
    }

    pub async fn save_income(&self) -> Result<()> {
        self.console.save_form(&INCOMES, EntityRecord::into_value).await?;
        self.load_incomes().await;
        self.load_dashboard().await;
        Ok(())
    }

    pub async fn delete_income(&self, income: &EntityRecord) -> Result<Outcome> {
        let outcome = self
            .console
            .delete_record(&INCOMES, income, "Delete this income record?")
            .await?;
        if outcome == Outcome::Completed {
            self.load_incomes().await;
            self.load_dashboard().await;
        }
        Ok(outcome)
    }

    // Expenses

    pub fn set_expense_category(&self, category: Option<String>) {
        self.console.dispatch(Action::ExpenseCategorySet(category));
    }

    pub async fn load_expenses(&self) {
        let (year, category) = self
            .console
            .store()
            .read(|state| (state.filters.year, state.filters.expense_category.clone()));
        let endpoint = Endpoint::new(EXPENSES.path)
            .query("year", year)
            .query_opt("category", category.as_deref());
        self.console.refresh_list(EXPENSES.collection, endpoint).await;
    }

    pub fn open_expense_modal(&self, selected: Option<&EntityRecord>) {
        self.console
            .open_form(EXPENSES.form, expense_defaults(), selected, EXPENSES.id_field);
    }

    pub async fn save_expense(&self) -> Result<()> {
        self.console.save_form(&EXPENSES, EntityRecord::into_value).await?;
        self.load_expenses().await;
        self.load_dashboard().await;
        Ok(())
    }

    pub async fn delete_expense(&self, expense: &EntityRecord) -> Result<Outcome> {
        let outcome = self
            .console
            .delete_record(&EXPENSES, expense, "Delete this expense record?")
            .await?;
        if outcome == Outcome::Completed {
            self.load_expenses().await;
            self.load_dashboard().await;
        }
        Ok(outcome)
    }

    // Transfers between cash accounts

    pub async fn load_transfers(&self) {
        let endpoint = Endpoint::new(TRANSFERS.path).query("year", self.console.year());
        self.console.refresh_list(TRANSFERS.collection, endpoint).await;
    }

    pub fn open_transfer_modal(&self) {
        self.console
            .open_form(TRANSFERS.form, transfer_defaults(), None, TRANSFERS.id_field);
    }

    pub async fn save_transfer(&self) -> Result<()> {
        self.console.save_form(&TRANSFERS, EntityRecord::into_value).await?;
        self.load_transfers().await;
        self.load_dashboard().await;
        Ok(())
    }

    pub async fn delete_transfer(&self, transfer: &EntityRecord) -> Result<Outcome> {
        let outcome = self
            .console
            .delete_record(&TRANSFERS, transfer, "Delete this transfer?")
            .await?;
        if outcome == Outcome::Completed {
            self.load_transfers().await;
            self.load_dashboard().await;
        }
        Ok(outcome)
    }

    // Dues

    /// Dues of the selected year with their expected/collected/remaining
    /// summary. A failed load leaves both empty.
    pub async fn load_dues(&self) {
        let endpoint = Endpoint::new(DUES_PATH).query("year", self.console.year());
        match self.console.call(Method::Get, endpoint, None).await {
            Ok(payload) => {
                let dues = crate::console::records_under(&payload, Collection::Dues.list_key());
                let stats = payload.get("stats").cloned().unwrap_or_else(empty_dues_stats);
                self.console.replace_list(Collection::Dues, dues);
                self.console.dispatch(Action::DetailLoaded {
                    detail: Detail::DuesStats,
                    value: stats,
                });
            }
            Err(err) => {
                self.console.report(&err, LoadMode::Passive, "loading dues");
                self.console.replace_list(Collection::Dues, Vec::new());
                self.console.dispatch(Action::DetailLoaded {
                    detail: Detail::DuesStats,
                    value: empty_dues_stats(),
                });
            }
        }
    }

    pub async fn pay_due(&self, due: &EntityRecord) -> Result<Outcome> {
        let id = record_id(due, "id")?;
        let member = due.text("member_name").unwrap_or_default();
        let remaining = due.text("remaining").unwrap_or_default();
        let answer = self
            .console
            .prompt()
            .prompt(&format!("Payment amount for {member} (remaining {remaining}):"), &remaining)
            .await;
        let Some(answer) = answer.map(|amount| amount.trim().to_string()).filter(|amount| !amount.is_empty()) else {
            return Ok(Outcome::Cancelled);
        };
        let amount = match answer.replace(',', ".").parse::<f64>() {
            Ok(amount) if amount.is_finite() && amount > 0.0 => amount,
            _ => {
                let err = ClientError::invalid(format!("'{answer}' is not a valid amount"));
                self.console.report(&err, LoadMode::Interactive, "recording payment");
                return Err(err);
            }
        };

        let due_id: Value = id.parse::<i64>().map(Value::from).unwrap_or(Value::String(id));
        let body = json!({ "due_id": due_id, "amount": amount });
        self.console
            .run_action(
                None,
                Method::Post,
                Endpoint::new(format!("{DUES_PATH}/payment")),
                Some(&body),
                "Payment recorded",
            )
            .await?;
        self.load_dues().await;
        Ok(Outcome::Completed)
    }
}

fn empty_dues_stats() -> Value {
    json!({ "expected": 0, "collected": 0, "remaining": 0 })
}
