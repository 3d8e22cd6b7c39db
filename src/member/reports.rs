use super::MemberClient;
use crate::console::LoadMode;
use crate::errors::{ClientError, Result};
use crate::gateway::Endpoint;
use crate::http::Method;
use crate::models::Outcome;
use crate::state::{Action, Collection, Detail};
use csv::{QuoteStyle, WriterBuilder};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tracing::info;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// CSV bytes for export rows: UTF-8 BOM, header from the first row's keys,
/// every field quoted, missing or null values empty.
pub fn render_csv(rows: &[Value]) -> Result<Vec<u8>> {
    let Some(first) = rows.first().and_then(Value::as_object) else {
        return Err(ClientError::invalid("no data to export"));
    };
    let headers: Vec<&str> = first.keys().map(String::as_str).collect();

    let mut out = UTF8_BOM.to_vec();
    {
        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .from_writer(&mut out);
        writer.write_record(&headers)?;
        for row in rows {
            writer.write_record(headers.iter().map(|header| cell(row.get(*header))))?;
        }
        writer.flush()?;
    }
    Ok(out)
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

impl MemberClient {
    pub async fn load_reports(&self) {
        let year = self.console.year();
        let joined = tokio::try_join!(
            self.console.fetch_list(
                Collection::MonthlyReport,
                Endpoint::new("/web/reports/monthly").query("year", year)
            ),
            self.console.fetch_list(
                Collection::CategoryReport,
                Endpoint::new("/web/reports/category")
                    .query("year", year)
                    .query("type", "expense")
            ),
        );
        match joined {
            Ok((monthly, categories)) => {
                self.console.replace_list(Collection::MonthlyReport, monthly);
                self.console.replace_list(Collection::CategoryReport, categories);
            }
            Err(err) => self.console.report(&err, LoadMode::Passive, "loading reports"),
        }
    }

    pub async fn load_accrual_report(&self) {
        let endpoint = Endpoint::new("/web/reports/dues").query("year", self.console.year());
        self.console
            .refresh_detail(Detail::AccrualReport, endpoint)
            .await;
    }

    /// Downloads an export and writes it as CSV into `dir`. Returns the file written.
    pub async fn export_data(&self, kind: &str, dir: &Path) -> Result<PathBuf> {
        let result = self.write_export(kind, dir).await;
        match &result {
            Ok(path) => {
                info!("exported {kind} to {}", path.display());
                self.console.toaster().success("Export complete");
            }
            Err(err) => self.console.report(err, LoadMode::Interactive, "export"),
        }
        result
    }

    async fn write_export(&self, kind: &str, dir: &Path) -> Result<PathBuf> {
        let year = self.console.year();
        let endpoint = Endpoint::new(format!("/web/export/{kind}")).query("year", year);
        let payload = self.console.call(Method::Get, endpoint, None).await?;

        let rows = payload
            .get("data")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let bytes = render_csv(rows)?;

        // Only the final component of the server's file name is trusted.
        let file_name = payload
            .get("filename")
            .and_then(Value::as_str)
            .and_then(|name| Path::new(name).file_name())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("{kind}_{year}.csv")));
        let path = dir.join(file_name);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Balance carried over from the previous year. Falls back to zero.
    pub async fn load_carry_over(&self) {
        let year = self.console.year();
        let endpoint = Endpoint::new("/web/devir/calculate").query("year", year - 1);
        if !self.console.refresh_detail(Detail::CarryOver, endpoint).await {
            self.console.dispatch(Action::DetailLoaded {
                detail: Detail::CarryOver,
                value: json!({ "previous_balance": 0, "current_year": year }),
            });
        }
    }

    pub async fn create_carry_over(&self) -> Result<Outcome> {
        let previous = self.console.year() - 1;
        let amount = self.console.store().read(|state| {
            state
                .detail(Detail::CarryOver)
                .and_then(|carry| carry.get("previous_balance"))
                .cloned()
                .unwrap_or(json!(0))
        });
        let body = json!({ "year": previous, "amount": amount });
        let outcome = self
            .console
            .run_action(
                Some(&format!("Create the carry-over from {previous}?")),
                Method::Post,
                Endpoint::new("/web/devir"),
                Some(&body),
                "Carry-over created",
            )
            .await?;
        if outcome == Outcome::Completed {
            self.load_carry_over().await;
        }
        Ok(outcome)
    }
}
