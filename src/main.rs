use bader_client::admin::AdminConsole;
use bader_client::config::ClientConfig;
use bader_client::http::ReqwestClient;
use bader_client::member::MemberClient;
use bader_client::prompt::{AssumeYes, StdinPrompt, UserPrompt};
use bader_client::state::{CustomerFilter, Form};
use bader_client::storage::FileStorage;
use bader_client::{Collection, EntityRecord, Upload, ViewState};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

/// Command-line client for the association management backend.
#[derive(Parser, Debug)]
#[command(name = "bader", version, about, long_about = None)]
struct Cli {
    /// Server origin, overrides BADER_API_URL
    #[arg(long)]
    api_url: Option<String>,

    /// Directory holding persisted sessions, overrides BADER_SESSION_DIR
    #[arg(long)]
    session_dir: Option<PathBuf>,

    /// Fiscal year for filters, overrides BADER_YEAR
    #[arg(long)]
    year: Option<i32>,

    /// Accept every confirmation and default answer
    #[arg(short, long)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Super-admin console
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Association member client
    Member {
        #[command(subcommand)]
        action: MemberAction,
    },
}

#[derive(Subcommand, Debug)]
enum AdminAction {
    Login { username: String, password: String },
    Logout,
    Dashboard,
    Customers {
        #[arg(long)]
        license_type: Option<String>,
        #[arg(long)]
        license_status: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Create a customer from key=value fields
    AddCustomer {
        #[arg(value_parser = parse_field)]
        fields: Vec<(String, Value)>,
    },
    Extend { customer_id: String },
    Suspend { customer_id: String },
    Activate { customer_id: String },
    /// Generate a license from key=value fields
    Generate {
        #[arg(value_parser = parse_field)]
        fields: Vec<(String, Value)>,
    },
    Expiring,
    Versions,
    AddVersion {
        #[arg(value_parser = parse_field)]
        fields: Vec<(String, Value)>,
    },
    DeleteVersion { id: String },
    Stats,
    Logs,
}

#[derive(Subcommand, Debug)]
enum MemberAction {
    Login {
        customer_id: String,
        username: String,
        password: String,
    },
    Logout,
    Dashboard,
    Members {
        #[arg(long)]
        search: Option<String>,
    },
    AddMember {
        #[arg(value_parser = parse_field)]
        fields: Vec<(String, Value)>,
    },
    RemoveMember { id: String },
    Inactive,
    Reactivate { id: String },
    Incomes {
        #[arg(long)]
        category: Option<String>,
    },
    AddIncome {
        #[arg(value_parser = parse_field)]
        fields: Vec<(String, Value)>,
    },
    Expenses {
        #[arg(long)]
        category: Option<String>,
    },
    AddExpense {
        #[arg(value_parser = parse_field)]
        fields: Vec<(String, Value)>,
    },
    Dues,
    Pay { due_id: String },
    Reports,
    Accrual,
    /// Write an export as CSV into a directory
    Export {
        kind: String,
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    Upload {
        file: PathBuf,
        #[arg(long)]
        category: Option<String>,
    },
    /// Scan a receipt, optionally saving it as an expense
    Scan {
        file: PathBuf,
        #[arg(long)]
        save: bool,
    },
    CarryOver {
        #[arg(long)]
        create: bool,
    },
    Village,
}

fn parse_field(pair: &str) -> Result<(String, Value), String> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{pair}'"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn by_id(field: &str, id: &str) -> EntityRecord {
    EntityRecord::new().with(field, id)
}

fn print_state(state: &ViewState) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(state)?);
    Ok(())
}

async fn read_upload(path: &Path) -> Result<Upload, Box<dyn std::error::Error>> {
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(Upload::new(name, bytes))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env();
    if let Some(api_url) = cli.api_url {
        config = ClientConfig::new(api_url, config.session_dir, config.year);
    }
    if let Some(dir) = cli.session_dir {
        config.session_dir = dir;
    }
    if let Some(year) = cli.year {
        config.year = year;
    }
    info!("using {} for {}", config.api_url, config.year);

    let storage = Arc::new(FileStorage::new(config.session_dir.clone()));
    let http = Arc::new(ReqwestClient::new());
    let prompt: Arc<dyn UserPrompt> = if cli.yes {
        Arc::new(AssumeYes)
    } else {
        Arc::new(StdinPrompt::stdio())
    };

    match cli.command {
        Command::Admin { action } => {
            let admin = AdminConsole::new(&config, http, storage, prompt);
            admin.init().await;
            run_admin(&admin, action).await?;
            print_state(&admin.state())
        }
        Command::Member { action } => {
            let member = MemberClient::new(&config, http, storage, prompt);
            member.init().await;
            run_member(&member, action).await?;
            print_state(&member.state())
        }
    }
}

async fn run_admin(admin: &AdminConsole, action: AdminAction) -> Result<(), Box<dyn std::error::Error>> {
    let console = admin.console();
    match action {
        AdminAction::Login { username, password } => admin.login(&username, &password).await?,
        AdminAction::Logout => admin.logout().await,
        AdminAction::Dashboard => admin.load_dashboard().await,
        AdminAction::Customers {
            license_type,
            license_status,
            search,
        } => {
            admin.set_customer_filter(CustomerFilter {
                license_type,
                license_status,
                search,
            });
            admin.load_customers().await?;
        }
        AdminAction::AddCustomer { fields } => {
            admin.open_customer_modal(None);
            for (key, value) in fields {
                console.edit_form(Form::Customer, &key, value);
            }
            admin.save_customer().await?;
        }
        AdminAction::Extend { customer_id } => {
            admin.extend_license(&by_id("customer_id", &customer_id)).await?;
        }
        AdminAction::Suspend { customer_id } => {
            admin.suspend_license(&by_id("customer_id", &customer_id)).await?;
        }
        AdminAction::Activate { customer_id } => {
            admin.activate_license(&by_id("customer_id", &customer_id)).await?;
        }
        AdminAction::Generate { fields } => {
            admin.open_license_form();
            for (key, value) in fields {
                console.edit_form(Form::License, &key, value);
            }
            admin.generate_license().await?;
            if let Some(code) = admin.license_code() {
                println!("license code: {code}");
            }
        }
        AdminAction::Expiring => admin.load_expiring_licenses().await,
        AdminAction::Versions => admin.load_versions().await?,
        AdminAction::AddVersion { fields } => {
            admin.open_version_modal();
            for (key, value) in fields {
                console.edit_form(Form::Version, &key, value);
            }
            admin.save_version().await?;
        }
        AdminAction::DeleteVersion { id } => {
            admin.delete_version(&by_id("id", &id)).await?;
        }
        AdminAction::Stats => admin.load_stats().await,
        AdminAction::Logs => admin.load_logs().await?,
    }
    Ok(())
}

async fn run_member(member: &MemberClient, action: MemberAction) -> Result<(), Box<dyn std::error::Error>> {
    let console = member.console();
    match action {
        MemberAction::Login {
            customer_id,
            username,
            password,
        } => member.login(&customer_id, &username, &password).await?,
        MemberAction::Logout => member.logout().await,
        MemberAction::Dashboard => member.load_dashboard().await,
        MemberAction::Members { search } => {
            member.set_member_search(search.unwrap_or_default());
            let names: Vec<String> = member
                .state()
                .filtered_members()
                .iter()
                .filter_map(|record| record.text("full_name"))
                .collect();
            for name in names {
                println!("{name}");
            }
        }
        MemberAction::AddMember { fields } => {
            member.open_member_modal(None);
            for (key, value) in fields {
                console.edit_form(Form::Member, &key, value);
            }
            member.save_member().await?;
        }
        MemberAction::RemoveMember { id } => {
            member.delete_member(&by_id("id", &id)).await?;
        }
        MemberAction::Inactive => member.load_inactive_members().await,
        MemberAction::Reactivate { id } => {
            member.reactivate_member(&by_id("id", &id)).await?;
        }
        MemberAction::Incomes { category } => {
            member.set_income_category(category);
            member.load_incomes().await;
        }
        MemberAction::AddIncome { fields } => {
            member.open_income_modal(None);
            for (key, value) in fields {
                console.edit_form(Form::Income, &key, value);
            }
            member.save_income().await?;
        }
        MemberAction::Expenses { category } => {
            member.set_expense_category(category);
            member.load_expenses().await;
        }
        MemberAction::AddExpense { fields } => {
            member.open_expense_modal(None);
            for (key, value) in fields {
                console.edit_form(Form::Expense, &key, value);
            }
            member.save_expense().await?;
        }
        MemberAction::Dues => member.load_dues().await,
        MemberAction::Pay { due_id } => {
            member.load_dues().await;
            let due = member
                .state()
                .list(Collection::Dues)
                .iter()
                .find(|due| due.text("id").as_deref() == Some(due_id.as_str()))
                .cloned()
                .unwrap_or_else(|| by_id("id", &due_id));
            member.pay_due(&due).await?;
        }
        MemberAction::Reports => member.load_reports().await,
        MemberAction::Accrual => member.load_accrual_report().await,
        MemberAction::Export { kind, dir } => {
            let path = member.export_data(&kind, &dir).await?;
            println!("wrote {}", path.display());
        }
        MemberAction::Upload { file, category } => {
            if let Some(category) = category {
                member.set_document_category(&category);
            }
            member.upload_document(read_upload(&file).await?).await?;
        }
        MemberAction::Scan { file, save } => {
            member.process_ocr(read_upload(&file).await?).await?;
            if save {
                member.save_ocr_as_expense().await?;
            }
        }
        MemberAction::CarryOver { create } => {
            member.load_carry_over().await;
            if create {
                member.create_carry_over().await?;
            }
        }
        MemberAction::Village => member.load_village().await,
    }
    Ok(())
}
