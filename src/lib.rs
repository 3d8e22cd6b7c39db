pub mod admin;
pub mod aggregates;
pub mod config;
pub mod console;
pub mod errors;
pub mod gateway;
pub mod http;
pub mod member;
pub mod models;
pub mod prompt;
pub mod state;
pub mod storage;
pub mod toast;

pub use admin::AdminConsole;
pub use config::ClientConfig;
pub use errors::{ClientError, Result};
pub use member::MemberClient;
pub use models::{EntityRecord, Outcome, Session, Upload};
pub use state::{Action, Collection, Detail, Form, Page, Store, ViewState};
