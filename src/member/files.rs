use super::{EXPENSES, MAIN_CASH_ACCOUNT, MemberClient};
use crate::config::today_string;
use crate::console::{Crud, LoadMode};
use crate::errors::{ClientError, Result};
use crate::gateway::Endpoint;
use crate::models::{EntityRecord, Outcome, Upload};
use crate::state::{Action, Collection, Detail, Form};
use serde_json::Value;

const DOCUMENTS: Crud = Crud {
    form: Form::Document,
    collection: Collection::Documents,
    path: "/web/documents",
    id_field: "id",
    noun: "Document",
};

pub const DEFAULT_DOCUMENT_CATEGORY: &str = "Genel";

/// Upload endpoints answer `{success: bool, ...}` even on 2xx.
fn check_upload(response: Value) -> Result<Value> {
    if response.get("success").and_then(Value::as_bool) == Some(false) {
        let message = response
            .get("detail")
            .or_else(|| response.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("upload rejected");
        return Err(ClientError::invalid(message));
    }
    Ok(response)
}

/// Expense draft from a scanned receipt; missing fields take expense defaults.
fn expense_from_ocr(ocr: &Value) -> EntityRecord {
    let text = |field: &str, default: &str| {
        ocr.get(field)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .unwrap_or(default)
            .to_string()
    };
    let amount = ocr.get("amount").filter(|amount| !amount.is_null()).cloned().unwrap_or(Value::from(0));
    EntityRecord::new()
        .with("date", text("date", &today_string()))
        .with("category", text("category", "DİĞER"))
        .with("amount", amount)
        .with("description", text("description", ""))
        .with("vendor", text("vendor", ""))
        .with("cash_account", MAIN_CASH_ACCOUNT)
}

impl MemberClient {
    // Documents

    /// A failed load shows no documents.
    pub async fn load_documents(&self) {
        let endpoint = Endpoint::new(DOCUMENTS.path);
        if !self.console.refresh_list(DOCUMENTS.collection, endpoint).await {
            self.console.replace_list(DOCUMENTS.collection, Vec::new());
        }
    }

    pub fn set_document_category(&self, category: &str) {
        self.console.edit_form(DOCUMENTS.form, "category", category);
    }

    pub async fn upload_document(&self, file: Upload) -> Result<Value> {
        let category = self
            .console
            .form(DOCUMENTS.form)
            .and_then(|buffer| buffer.fields.text("category"))
            .filter(|category| !category.is_empty())
            .unwrap_or_else(|| DEFAULT_DOCUMENT_CATEGORY.to_string());
        let endpoint = Endpoint::new(format!("{}/upload", DOCUMENTS.path));

        let result = self
            .console
            .upload(endpoint, file, Some(&category))
            .await
            .and_then(check_upload);
        match result {
            Ok(response) => {
                self.console.toaster().success("Document uploaded");
                self.load_documents().await;
                Ok(response)
            }
            Err(err) => {
                self.console.report(&err, LoadMode::Interactive, "uploading document");
                Err(err)
            }
        }
    }

    pub async fn delete_document(&self, document: &EntityRecord) -> Result<Outcome> {
        let outcome = self
            .console
            .delete_record(&DOCUMENTS, document, "Delete this document?")
            .await?;
        if outcome == Outcome::Completed {
            self.load_documents().await;
        }
        Ok(outcome)
    }

    // Receipt scanning

    /// Sends a receipt image for recognition. The busy flag is only a
    /// display hint; a second scan is not blocked.
    pub async fn process_ocr(&self, file: Upload) -> Result<Value> {
        self.console.dispatch(Action::OcrStarted);
        let result = self
            .console
            .upload(Endpoint::new("/web/ocr/scan"), file, None)
            .await
            .and_then(check_upload);
        self.console.dispatch(Action::OcrFinished);

        match result {
            Ok(scan) => {
                self.console.dispatch(Action::DetailLoaded {
                    detail: Detail::OcrResult,
                    value: scan.clone(),
                });
                self.console.toaster().success("Receipt scanned");
                Ok(scan)
            }
            Err(err) => {
                self.console.report(&err, LoadMode::Interactive, "scanning receipt");
                Err(err)
            }
        }
    }

    /// Saves the last scan as a new expense. Without a scan nothing happens.
    pub async fn save_ocr_as_expense(&self) -> Result<Outcome> {
        let Some(scan) = self
            .console
            .store()
            .read(|state| state.detail(Detail::OcrResult).cloned())
        else {
            return Ok(Outcome::Cancelled);
        };

        self.console
            .open_form(EXPENSES.form, expense_from_ocr(&scan), None, EXPENSES.id_field);
        self.console.save_form(&EXPENSES, EntityRecord::into_value).await?;
        self.console.dispatch(Action::DetailCleared(Detail::OcrResult));
        self.load_expenses().await;
        self.load_dashboard().await;
        Ok(Outcome::Completed)
    }
}
