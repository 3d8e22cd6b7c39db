//! Plumbing shared by the admin console and the member client: session
//! lifecycle, authenticated calls, list loading, form buffers and the
//! confirm → call → toast pattern every feature follows.

use crate::errors::{ClientError, Result};
use crate::gateway::{ApiGateway, Endpoint};
use crate::http::Method;
use crate::models::{EntityRecord, Outcome, Session, Upload};
use crate::prompt::UserPrompt;
use crate::state::{Action, Collection, Detail, Form, FormBuffer, Page, Store, ViewState};
use crate::toast::Toaster;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// How a failed load is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Background refresh: logged only.
    Passive,
    /// Triggered by the user: logged and toasted.
    Interactive,
}

/// A CRUD resource: list cache, form buffer and REST path.
#[derive(Debug, Clone, Copy)]
pub struct Crud {
    pub form: Form,
    pub collection: Collection,
    pub path: &'static str,
    pub id_field: &'static str,
    pub noun: &'static str,
}

impl Crud {
    pub fn item_path(&self, id: &str) -> String {
        format!("{}/{id}", self.path)
    }
}

pub struct Console {
    gateway: ApiGateway,
    store: Arc<Store<ViewState>>,
    toaster: Toaster,
    prompt: Arc<dyn UserPrompt>,
}

impl Console {
    pub fn new(gateway: ApiGateway, prompt: Arc<dyn UserPrompt>, year: i32) -> Self {
        let store = Arc::new(Store::new(ViewState::new(year)));
        let toaster = Toaster::new(Arc::clone(&store));
        Self {
            gateway,
            store,
            toaster,
            prompt,
        }
    }

    pub fn store(&self) -> &Arc<Store<ViewState>> {
        &self.store
    }

    pub fn snapshot(&self) -> ViewState {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.store.subscribe()
    }

    pub fn dispatch(&self, action: Action) {
        self.store.dispatch(action);
    }

    pub fn navigate(&self, page: Page) {
        self.dispatch(Action::Navigated(page));
    }

    pub fn toaster(&self) -> &Toaster {
        &self.toaster
    }

    pub fn prompt(&self) -> &dyn UserPrompt {
        self.prompt.as_ref()
    }

    pub fn year(&self) -> i32 {
        self.store.read(|state| state.filters.year)
    }

    /// Loads the persisted session into the state. Returns whether one was found.
    pub async fn restore_session(&self) -> bool {
        match self.gateway.sessions().restore().await {
            Some(session) => {
                self.dispatch(Action::SessionStarted(session));
                true
            }
            None => false,
        }
    }

    pub async fn start_session(&self, session: Session) -> Result<()> {
        self.gateway.sessions().persist(session.clone()).await?;
        info!("signed in");
        self.dispatch(Action::SessionStarted(session));
        Ok(())
    }

    pub async fn end_session(&self) {
        self.gateway.sessions().clear().await;
        self.dispatch(Action::SessionEnded);
    }

    pub async fn is_signed_in(&self) -> bool {
        self.gateway.sessions().current().await.is_some()
    }

    /// Authenticated call. Fails locally without a session.
    pub async fn call(&self, method: Method, endpoint: Endpoint, body: Option<&Value>) -> Result<Value> {
        if !self.is_signed_in().await {
            return Err(ClientError::NotAuthenticated);
        }
        let result = self.gateway.call(&endpoint, method, body).await;
        self.observe(result)
    }

    /// Call made before a session exists, such as login.
    pub async fn call_anonymous(&self, method: Method, endpoint: Endpoint, body: Option<&Value>) -> Result<Value> {
        self.gateway.call(&endpoint, method, body).await
    }

    pub async fn upload(&self, endpoint: Endpoint, file: Upload, category: Option<&str>) -> Result<Value> {
        if !self.is_signed_in().await {
            return Err(ClientError::NotAuthenticated);
        }
        let result = self.gateway.upload(&endpoint, file, category).await;
        self.observe(result)
    }

    fn observe(&self, result: Result<Value>) -> Result<Value> {
        if let Err(ClientError::SessionExpired) = &result {
            self.dispatch(Action::SessionEnded);
        }
        result
    }

    pub fn report(&self, err: &ClientError, mode: LoadMode, context: &str) {
        match mode {
            LoadMode::Passive => warn!("{context} failed: {err}"),
            LoadMode::Interactive => {
                error!("{context} failed: {err}");
                self.toaster.error(format!("Error: {err}"));
            }
        }
    }

    pub async fn fetch_list(&self, collection: Collection, endpoint: Endpoint) -> Result<Vec<EntityRecord>> {
        let payload = self.call(Method::Get, endpoint, None).await?;
        Ok(records_under(&payload, collection.list_key()))
    }

    pub fn replace_list(&self, collection: Collection, records: Vec<EntityRecord>) {
        self.dispatch(Action::ListLoaded { collection, records });
    }

    /// Fetches a list and replaces its cache. Errors are reported per `mode`
    /// and leave the cache unchanged.
    pub async fn load_list(&self, collection: Collection, endpoint: Endpoint, mode: LoadMode) -> Result<()> {
        match self.fetch_list(collection, endpoint).await {
            Ok(records) => {
                self.replace_list(collection, records);
                Ok(())
            }
            Err(err) => {
                self.report(&err, mode, &format!("loading {}", collection.list_key()));
                Err(err)
            }
        }
    }

    /// Passive reload. Failures are logged and the cache is left as it was.
    pub async fn refresh_list(&self, collection: Collection, endpoint: Endpoint) -> bool {
        self.load_list(collection, endpoint, LoadMode::Passive).await.is_ok()
    }

    pub async fn refresh_detail(&self, detail: Detail, endpoint: Endpoint) -> bool {
        self.load_detail(detail, endpoint, LoadMode::Passive).await.is_ok()
    }

    /// Resets the buffer to `defaults`, or to a copy of `selected` for editing.
    pub fn open_form(&self, form: Form, defaults: EntityRecord, selected: Option<&EntityRecord>, id_field: &str) {
        let buffer = match selected {
            Some(record) => FormBuffer {
                fields: record.clone(),
                editing: record.text(id_field),
            },
            None => FormBuffer {
                fields: defaults,
                editing: None,
            },
        };
        self.dispatch(Action::FormOpened { form, buffer });
    }

    pub fn edit_form(&self, form: Form, field: &str, value: impl Into<Value>) {
        self.dispatch(Action::FieldEdited {
            form,
            field: field.to_string(),
            value: value.into(),
        });
    }

    pub fn close_form(&self, form: Form) {
        self.dispatch(Action::FormClosed(form));
    }

    pub fn form(&self, form: Form) -> Option<FormBuffer> {
        self.store.read(|state| state.form(form).cloned())
    }

    /// Fields of an inline form, falling back to `defaults` when it was never opened.
    pub fn form_or(&self, form: Form, defaults: impl FnOnce() -> EntityRecord) -> EntityRecord {
        self.form(form).map(|buffer| buffer.fields).unwrap_or_else(defaults)
    }

    /// Sends the open buffer: PUT when editing, POST otherwise. Closes the
    /// modal on success. The caller reloads whatever the change affects.
    pub async fn save_form(&self, crud: &Crud, payload: impl FnOnce(EntityRecord) -> Value) -> Result<()> {
        let result = self.submit_form(crud, payload).await;
        if let Err(err) = &result {
            self.report(err, LoadMode::Interactive, &format!("saving {}", crud.noun));
        }
        result
    }

    async fn submit_form(&self, crud: &Crud, payload: impl FnOnce(EntityRecord) -> Value) -> Result<()> {
        let buffer = self
            .form(crud.form)
            .ok_or_else(|| ClientError::invalid(format!("{} form is not open", crud.noun)))?;
        let body = payload(buffer.fields);

        match buffer.editing {
            Some(id) => {
                self.call(Method::Put, Endpoint::new(crud.item_path(&id)), Some(&body)).await?;
                self.toaster.success(format!("{} updated", crud.noun));
            }
            None => {
                self.call(Method::Post, Endpoint::new(crud.path), Some(&body)).await?;
                self.toaster.success(format!("{} created", crud.noun));
            }
        }
        self.close_form(crud.form);
        Ok(())
    }

    /// Optional confirmation, then the call, then a success toast.
    pub async fn run_action(
        &self,
        confirm: Option<&str>,
        method: Method,
        endpoint: Endpoint,
        body: Option<&Value>,
        done: &str,
    ) -> Result<Outcome> {
        if let Some(message) = confirm {
            if !self.prompt.confirm(message).await {
                return Ok(Outcome::Cancelled);
            }
        }

        let context = format!("{method} {}", endpoint.path());
        match self.call(method, endpoint, body).await {
            Ok(_) => {
                self.toaster.success(done);
                Ok(Outcome::Completed)
            }
            Err(err) => {
                self.report(&err, LoadMode::Interactive, &context);
                Err(err)
            }
        }
    }

    pub async fn delete_record(&self, crud: &Crud, record: &EntityRecord, confirm: &str) -> Result<Outcome> {
        let id = record_id(record, crud.id_field)?;
        self.run_action(
            Some(confirm),
            Method::Delete,
            Endpoint::new(crud.item_path(&id)),
            None,
            &format!("{} deleted", crud.noun),
        )
        .await
    }

    /// Fetches one payload into a detail slot.
    pub async fn load_detail(&self, detail: Detail, endpoint: Endpoint, mode: LoadMode) -> Result<Value> {
        let context = format!("loading {}", endpoint.path());
        match self.call(Method::Get, endpoint, None).await {
            Ok(value) => {
                self.dispatch(Action::DetailLoaded {
                    detail,
                    value: value.clone(),
                });
                Ok(value)
            }
            Err(err) => {
                self.report(&err, mode, &context);
                Err(err)
            }
        }
    }
}

pub fn record_id(record: &EntityRecord, id_field: &str) -> Result<String> {
    record
        .text(id_field)
        .ok_or_else(|| ClientError::invalid(format!("record has no {id_field}")))
}

/// Objects under `key`; a missing key or non-array value is an empty list.
pub fn records_under(payload: &Value, key: &str) -> Vec<EntityRecord> {
    payload
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().cloned().filter_map(EntityRecord::from_value).collect())
        .unwrap_or_default()
}
