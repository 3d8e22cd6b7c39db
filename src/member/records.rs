use super::MemberClient;
use crate::console::{Crud, LoadMode};
use crate::errors::Result;
use crate::gateway::Endpoint;
use crate::http::Method;
use crate::models::{EntityRecord, Outcome};
use crate::state::{Collection, Form};
use serde_json::Value;

const EVENTS: Crud = Crud {
    form: Form::Event,
    collection: Collection::Events,
    path: "/web/events",
    id_field: "id",
    noun: "Event",
};

const MEETINGS: Crud = Crud {
    form: Form::Meeting,
    collection: Collection::Meetings,
    path: "/web/meetings",
    id_field: "id",
    noun: "Meeting",
};

const USERS: Crud = Crud {
    form: Form::User,
    collection: Collection::Users,
    path: "/web/users",
    id_field: "id",
    noun: "User",
};

const BUDGET: Crud = Crud {
    form: Form::Budget,
    collection: Collection::Budget,
    path: "/web/budget",
    id_field: "id",
    noun: "Budget item",
};

const MEETING_LIST_FIELDS: [&str; 3] = ["agenda", "attendees", "decisions"];

/// Splits multi-line text into its non-blank lines.
pub fn lines_to_list(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Joins an array field back into editable text. Plain strings pass through.
pub fn list_to_lines(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(line) => line.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Value::String(text) => text.clone(),
        _ => String::new(),
    }
}

pub fn event_defaults() -> EntityRecord {
    EntityRecord::new()
        .with("title", "")
        .with("event_type", "Genel")
        .with("description", "")
        .with("start_date", "")
        .with("end_date", "")
        .with("location", "")
        .with("budget", 0)
        .with("status", "Planlanan")
}

pub fn meeting_defaults() -> EntityRecord {
    EntityRecord::new()
        .with("title", "")
        .with("meeting_date", "")
        .with("location", "")
        .with("agenda", "")
        .with("attendees", "")
        .with("decisions", "")
        .with("minutes", "")
        .with("status", "Planlanan")
}

pub fn user_defaults() -> EntityRecord {
    EntityRecord::new()
        .with("username", "")
        .with("password", "")
        .with("full_name", "")
        .with("email", "")
        .with("phone", "")
        .with("role", "member")
}

pub fn budget_defaults(year: i32) -> EntityRecord {
    EntityRecord::new()
        .with("year", year)
        .with("category", "")
        .with("type", "expense")
        .with("planned_amount", 0)
        .with("notes", "")
}

pub fn settings_defaults() -> EntityRecord {
    EntityRecord::new()
        .with("organization_name", "")
        .with("yearly_dues", 100)
}

fn meeting_payload(mut fields: EntityRecord) -> Value {
    for field in MEETING_LIST_FIELDS {
        let text = fields.text(field).unwrap_or_default();
        fields.set(field, lines_to_list(&text));
    }
    fields.into_value()
}

impl MemberClient {
    // Events

    pub async fn load_events(&self) {
        self.console
            .refresh_list(EVENTS.collection, Endpoint::new(EVENTS.path))
            .await;
    }

    pub fn open_event_modal(&self, selected: Option<&EntityRecord>) {
        self.console
            .open_form(EVENTS.form, event_defaults(), selected, EVENTS.id_field);
    }

    pub async fn save_event(&self) -> Result<()> {
        self.console.save_form(&EVENTS, EntityRecord::into_value).await?;
        self.load_events().await;
        Ok(())
    }

    pub async fn delete_event(&self, event: &EntityRecord) -> Result<Outcome> {
        let outcome = self
            .console
            .delete_record(&EVENTS, event, "Delete this event?")
            .await?;
        if outcome == Outcome::Completed {
            self.load_events().await;
        }
        Ok(outcome)
    }

    // Meetings

    pub async fn load_meetings(&self) {
        self.console
            .refresh_list(MEETINGS.collection, Endpoint::new(MEETINGS.path))
            .await;
    }

    /// Array fields of the selected meeting are opened as newline-separated text.
    pub fn open_meeting_modal(&self, selected: Option<&EntityRecord>) {
        let editable = selected.map(|meeting| {
            let mut copy = meeting.clone();
            for field in MEETING_LIST_FIELDS {
                let text = meeting.get(field).map(list_to_lines).unwrap_or_default();
                copy.set(field, text);
            }
            copy
        });
        self.console.open_form(
            MEETINGS.form,
            meeting_defaults(),
            editable.as_ref(),
            MEETINGS.id_field,
        );
    }

    pub async fn save_meeting(&self) -> Result<()> {
        self.console.save_form(&MEETINGS, meeting_payload).await?;
        self.load_meetings().await;
        Ok(())
    }

    pub async fn delete_meeting(&self, meeting: &EntityRecord) -> Result<Outcome> {
        let outcome = self
            .console
            .delete_record(&MEETINGS, meeting, "Delete this meeting?")
            .await?;
        if outcome == Outcome::Completed {
            self.load_meetings().await;
        }
        Ok(outcome)
    }

    // Users

    pub async fn load_users(&self) {
        self.console
            .refresh_list(USERS.collection, Endpoint::new(USERS.path))
            .await;
    }

    /// Editing never shows the stored password.
    pub fn open_user_modal(&self, selected: Option<&EntityRecord>) {
        let editable = selected.map(|user| user.clone().with("password", ""));
        self.console
            .open_form(USERS.form, user_defaults(), editable.as_ref(), USERS.id_field);
    }

    pub async fn save_user(&self) -> Result<()> {
        self.console.save_form(&USERS, EntityRecord::into_value).await?;
        self.load_users().await;
        Ok(())
    }

    pub async fn delete_user(&self, user: &EntityRecord) -> Result<Outcome> {
        let name = user.text("full_name").unwrap_or_default();
        let outcome = self
            .console
            .delete_record(&USERS, user, &format!("Delete user {name}?"))
            .await?;
        if outcome == Outcome::Completed {
            self.load_users().await;
        }
        Ok(outcome)
    }

    // Budget

    /// A failed load shows an empty budget.
    pub async fn load_budget(&self) {
        let endpoint = Endpoint::new(BUDGET.path).query("year", self.console.year());
        if !self.console.refresh_list(BUDGET.collection, endpoint).await {
            self.console.replace_list(BUDGET.collection, Vec::new());
        }
    }

    pub fn open_budget_modal(&self, selected: Option<&EntityRecord>) {
        let defaults = budget_defaults(self.console.year());
        self.console
            .open_form(BUDGET.form, defaults, selected, BUDGET.id_field);
    }

    pub async fn save_budget(&self) -> Result<()> {
        self.console.save_form(&BUDGET, EntityRecord::into_value).await?;
        self.load_budget().await;
        Ok(())
    }

    // Settings

    /// Opens the settings form on `current`, or on defaults when none is known.
    pub fn open_settings(&self, current: Option<&EntityRecord>) {
        self.console
            .open_form(Form::Settings, settings_defaults(), current, "id");
    }

    pub async fn save_settings(&self) -> Result<()> {
        let body = self
            .console
            .form_or(Form::Settings, settings_defaults)
            .into_value();
        match self
            .console
            .call(Method::Put, Endpoint::new("/web/settings"), Some(&body))
            .await
        {
            Ok(_) => {
                self.console.toaster().success("Settings saved");
                Ok(())
            }
            Err(err) => {
                self.console
                    .report(&err, LoadMode::Interactive, "saving settings");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_lines_are_dropped() {
        assert_eq!(
            lines_to_list("Opening\n\n  \nBudget review\n"),
            vec!["Opening".to_string(), "Budget review".to_string()]
        );
        assert!(lines_to_list("").is_empty());
    }

    #[test]
    fn arrays_become_editable_text() {
        assert_eq!(list_to_lines(&json!(["a", "b"])), "a\nb");
        assert_eq!(list_to_lines(&json!("already text")), "already text");
        assert_eq!(list_to_lines(&Value::Null), "");
    }

    #[test]
    fn meeting_payload_sends_arrays() {
        let form = meeting_defaults()
            .with("title", "General assembly")
            .with("agenda", "Welcome\nElections");
        let payload = meeting_payload(form);
        assert_eq!(payload["agenda"], json!(["Welcome", "Elections"]));
        assert_eq!(payload["attendees"], json!([]));
        assert_eq!(payload["title"], "General assembly");
    }
}
