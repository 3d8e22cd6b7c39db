use super::{MEMBERS, MemberClient, member_defaults};
use crate::console::{LoadMode, record_id};
use crate::errors::Result;
use crate::gateway::Endpoint;
use crate::http::Method;
use crate::models::{EntityRecord, Outcome};
use crate::state::{Action, Collection, Detail};
use serde_json::Value;

impl MemberClient {
    pub fn set_member_search(&self, search: impl Into<String>) {
        self.console.dispatch(Action::MemberSearchSet(search.into()));
    }

    pub fn open_member_modal(&self, selected: Option<&EntityRecord>) {
        self.console
            .open_form(MEMBERS.form, member_defaults(), selected, MEMBERS.id_field);
    }

    pub async fn save_member(&self) -> Result<()> {
        self.console.save_form(&MEMBERS, EntityRecord::into_value).await?;
        self.load_dashboard().await;
        Ok(())
    }

    /// The server keeps the member and moves it to the inactive list.
    pub async fn delete_member(&self, member: &EntityRecord) -> Result<Outcome> {
        let id = record_id(member, MEMBERS.id_field)?;
        let name = member.text("full_name").unwrap_or_else(|| id.clone());
        let outcome = self
            .console
            .run_action(
                Some(&format!("Remove {name}?")),
                Method::Delete,
                Endpoint::new(MEMBERS.item_path(&id)),
                None,
                "Member moved to the inactive list",
            )
            .await?;
        if outcome == Outcome::Completed {
            self.load_dashboard().await;
            self.load_inactive_members().await;
        }
        Ok(outcome)
    }

    pub async fn open_member_detail(&self, member: &EntityRecord) -> Result<Value> {
        let id = record_id(member, MEMBERS.id_field)?;
        self.console
            .load_detail(
                Detail::MemberDetail,
                Endpoint::new(format!("{}/detail", MEMBERS.item_path(&id))),
                LoadMode::Interactive,
            )
            .await
    }

    pub fn close_member_detail(&self) {
        self.console.dispatch(Action::DetailCleared(Detail::MemberDetail));
    }

    pub async fn load_inactive_members(&self) {
        let endpoint = Endpoint::new(format!("{}/inactive", MEMBERS.path));
        self.console
            .refresh_list(Collection::InactiveMembers, endpoint)
            .await;
    }

    pub async fn reactivate_member(&self, member: &EntityRecord) -> Result<Outcome> {
        let id = record_id(member, MEMBERS.id_field)?;
        let name = member.text("full_name").unwrap_or_else(|| id.clone());
        let outcome = self
            .console
            .run_action(
                Some(&format!("Reactivate {name}?")),
                Method::Post,
                Endpoint::new(format!("{}/activate", MEMBERS.item_path(&id))),
                None,
                "Member reactivated",
            )
            .await?;
        if outcome == Outcome::Completed {
            self.load_inactive_members().await;
            self.load_dashboard().await;
        }
        Ok(outcome)
    }
}
