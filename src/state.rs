use crate::aggregates::Totals;
use crate::models::{EntityRecord, Session, Toast, ToastKind};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::watch;

/// State that changes only through actions.
pub trait Reducer {
    type Action;

    fn reduce(&mut self, action: Self::Action);
}

/// Owns the application state and notifies subscribers after every action.
pub struct Store<S> {
    tx: watch::Sender<S>,
}

impl<S: Reducer> Store<S> {
    pub fn new(initial: S) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn dispatch(&self, action: S::Action) {
        self.tx.send_modify(|state| state.reduce(action));
    }

    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.tx.subscribe()
    }

    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.tx.borrow())
    }
}

impl<S: Reducer + Clone> Store<S> {
    pub fn snapshot(&self) -> S {
        self.tx.borrow().clone()
    }
}

/// Ordered record lists, each fully replaced on reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Customers,
    ExpiringLicenses,
    Versions,
    Logs,
    Members,
    InactiveMembers,
    Incomes,
    Expenses,
    Transfers,
    CashAccounts,
    Dues,
    Events,
    Meetings,
    Users,
    Budget,
    Documents,
    MonthlyReport,
    CategoryReport,
    VillageIncomes,
    VillageExpenses,
    VillageCashAccounts,
    VillageTransfers,
}

impl Collection {
    /// Key holding the array in the list endpoint's response.
    pub fn list_key(self) -> &'static str {
        match self {
            Collection::Customers | Collection::ExpiringLicenses => "customers",
            Collection::Versions => "versions",
            Collection::Logs => "logs",
            Collection::Members | Collection::InactiveMembers => "members",
            Collection::Incomes | Collection::VillageIncomes => "incomes",
            Collection::Expenses | Collection::VillageExpenses => "expenses",
            Collection::Transfers | Collection::VillageTransfers => "transfers",
            Collection::CashAccounts | Collection::VillageCashAccounts => "accounts",
            Collection::Dues => "dues",
            Collection::Events => "events",
            Collection::Meetings => "meetings",
            Collection::Users => "users",
            Collection::Budget => "items",
            Collection::Documents => "documents",
            Collection::MonthlyReport => "months",
            Collection::CategoryReport => "categories",
        }
    }
}

/// Draft buffers, present in the state while their modal is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Form {
    Customer,
    License,
    Version,
    Member,
    Income,
    Expense,
    Transfer,
    Event,
    Meeting,
    User,
    Budget,
    Document,
    Settings,
    VillageIncome,
    VillageExpense,
    VillageTransfer,
}

/// Single-value payloads shown outside of lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Detail {
    AdminDashboard,
    Customer,
    GeneratedLicense,
    RevenueStats,
    UsageStats,
    MemberDetail,
    DuesStats,
    AccrualReport,
    CarryOver,
    OcrResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    #[default]
    Dashboard,
    Customers,
    Licenses,
    Versions,
    Stats,
    Logs,
    Members,
    InactiveMembers,
    Incomes,
    Expenses,
    Transfers,
    Dues,
    Events,
    Meetings,
    Users,
    Budget,
    Documents,
    Ocr,
    Reports,
    Settings,
    CarryOver,
    Village,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct FormBuffer {
    pub fields: EntityRecord,
    /// Id of the record under edit; `None` for a new record.
    pub editing: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct CustomerFilter {
    pub license_type: Option<String>,
    pub license_status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filters {
    pub year: i32,
    pub income_category: Option<String>,
    pub expense_category: Option<String>,
    pub member_search: String,
    pub customer: CustomerFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewState {
    pub initialized: bool,
    pub session: Option<Session>,
    pub page: Page,
    pub login_pending: bool,
    pub login_error: Option<String>,
    pub lists: BTreeMap<Collection, Vec<EntityRecord>>,
    pub forms: BTreeMap<Form, FormBuffer>,
    pub details: BTreeMap<Detail, Value>,
    pub filters: Filters,
    pub dashboard: Totals,
    pub village: Totals,
    pub ocr_processing: bool,
    pub toast: Toast,
}

#[derive(Debug, Clone)]
pub enum Action {
    Initialized,
    LoginStarted,
    LoginFailed(String),
    SessionStarted(Session),
    SessionEnded,
    Navigated(Page),
    ListLoaded { collection: Collection, records: Vec<EntityRecord> },
    /// The unfiltered dashboard join; the only source of `dashboard` totals.
    DashboardLoaded {
        members: Vec<EntityRecord>,
        incomes: Vec<EntityRecord>,
        expenses: Vec<EntityRecord>,
    },
    DetailLoaded { detail: Detail, value: Value },
    DetailCleared(Detail),
    FormOpened { form: Form, buffer: FormBuffer },
    FieldEdited { form: Form, field: String, value: Value },
    FormClosed(Form),
    YearSelected(i32),
    IncomeCategorySet(Option<String>),
    ExpenseCategorySet(Option<String>),
    MemberSearchSet(String),
    CustomerFilterSet(CustomerFilter),
    OcrStarted,
    OcrFinished,
    ToastShown { message: String, kind: ToastKind, generation: u64 },
    ToastExpired { generation: u64 },
}

impl ViewState {
    pub fn new(year: i32) -> Self {
        Self {
            initialized: false,
            session: None,
            page: Page::Dashboard,
            login_pending: false,
            login_error: None,
            lists: BTreeMap::new(),
            forms: BTreeMap::new(),
            details: BTreeMap::new(),
            filters: Filters {
                year,
                income_category: None,
                expense_category: None,
                member_search: String::new(),
                customer: CustomerFilter::default(),
            },
            dashboard: Totals::default(),
            village: Totals::default(),
            ocr_processing: false,
            toast: Toast::default(),
        }
    }

    pub fn list(&self, collection: Collection) -> &[EntityRecord] {
        self.lists.get(&collection).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn form(&self, form: Form) -> Option<&FormBuffer> {
        self.forms.get(&form)
    }

    pub fn is_open(&self, form: Form) -> bool {
        self.forms.contains_key(&form)
    }

    pub fn detail(&self, detail: Detail) -> Option<&Value> {
        self.details.get(&detail)
    }

    /// First `count` records of a list, in server order.
    pub fn recent(&self, collection: Collection, count: usize) -> &[EntityRecord] {
        let list = self.list(collection);
        &list[..list.len().min(count)]
    }

    /// Members matching the search box by name, phone or member number.
    pub fn filtered_members(&self) -> Vec<&EntityRecord> {
        let search = self.filters.member_search.trim().to_lowercase();
        self.list(Collection::Members)
            .iter()
            .filter(|member| {
                search.is_empty()
                    || member
                        .text("full_name")
                        .is_some_and(|name| name.to_lowercase().contains(&search))
                    || member.text("phone").is_some_and(|phone| phone.contains(&search))
                    || member.text("member_no").is_some_and(|no| no.contains(&search))
            })
            .collect()
    }

    fn recompute_village(&mut self) {
        self.village = Totals::compute(
            &[],
            self.list(Collection::VillageIncomes),
            self.list(Collection::VillageExpenses),
        );
    }
}

impl Reducer for ViewState {
    type Action = Action;

    fn reduce(&mut self, action: Action) {
        match action {
            Action::Initialized => self.initialized = true,
            Action::LoginStarted => {
                self.login_pending = true;
                self.login_error = None;
            }
            Action::LoginFailed(message) => {
                self.login_pending = false;
                self.login_error = Some(message);
            }
            Action::SessionStarted(session) => {
                self.login_pending = false;
                self.login_error = None;
                self.session = Some(session);
            }
            Action::SessionEnded => {
                let mut fresh = ViewState::new(self.filters.year);
                fresh.initialized = self.initialized;
                fresh.toast = std::mem::take(&mut self.toast);
                *self = fresh;
            }
            Action::Navigated(page) => self.page = page,
            Action::ListLoaded { collection, records } => {
                self.lists.insert(collection, records);
                if matches!(collection, Collection::VillageIncomes | Collection::VillageExpenses) {
                    self.recompute_village();
                }
            }
            Action::DashboardLoaded {
                members,
                incomes,
                expenses,
            } => {
                self.dashboard = Totals::compute(&members, &incomes, &expenses);
                self.lists.insert(Collection::Members, members);
                self.lists.insert(Collection::Incomes, incomes);
                self.lists.insert(Collection::Expenses, expenses);
            }
            Action::DetailLoaded { detail, value } => {
                self.details.insert(detail, value);
            }
            Action::DetailCleared(detail) => {
                self.details.remove(&detail);
            }
            Action::FormOpened { form, buffer } => {
                self.forms.insert(form, buffer);
            }
            Action::FieldEdited { form, field, value } => {
                self.forms.entry(form).or_default().fields.set(&field, value);
            }
            Action::FormClosed(form) => {
                self.forms.remove(&form);
            }
            Action::YearSelected(year) => self.filters.year = year,
            Action::IncomeCategorySet(category) => self.filters.income_category = category,
            Action::ExpenseCategorySet(category) => self.filters.expense_category = category,
            Action::MemberSearchSet(search) => self.filters.member_search = search,
            Action::CustomerFilterSet(filter) => self.filters.customer = filter,
            Action::OcrStarted => self.ocr_processing = true,
            Action::OcrFinished => self.ocr_processing = false,
            Action::ToastShown {
                message,
                kind,
                generation,
            } => {
                self.toast = Toast {
                    visible: true,
                    message,
                    kind,
                    generation,
                };
            }
            Action::ToastExpired { generation } => {
                if self.toast.generation == generation {
                    self.toast.visible = false;
                }
            }
        }
    }
}
