use super::{MAIN_CASH_ACCOUNT, MemberClient, VILLAGE_CASH_ACCOUNT};
use crate::config::today_string;
use crate::console::{Crud, LoadMode};
use crate::errors::Result;
use crate::gateway::Endpoint;
use crate::models::EntityRecord;
use crate::state::{Collection, Form};

const VILLAGE_INCOMES: Crud = Crud {
    form: Form::VillageIncome,
    collection: Collection::VillageIncomes,
    path: "/web/village/incomes",
    id_field: "id",
    noun: "Village income",
};

const VILLAGE_EXPENSES: Crud = Crud {
    form: Form::VillageExpense,
    collection: Collection::VillageExpenses,
    path: "/web/village/expenses",
    id_field: "id",
    noun: "Village expense",
};

const VILLAGE_TRANSFERS: Crud = Crud {
    form: Form::VillageTransfer,
    collection: Collection::VillageTransfers,
    path: "/web/village/transfers",
    id_field: "id",
    noun: "Village transfer",
};

fn village_entry_defaults() -> EntityRecord {
    EntityRecord::new()
        .with("date", today_string())
        .with("category", "")
        .with("amount", "")
        .with("description", "")
        .with("cash_account", VILLAGE_CASH_ACCOUNT)
}

fn village_transfer_defaults() -> EntityRecord {
    EntityRecord::new()
        .with("from_account", MAIN_CASH_ACCOUNT)
        .with("to_account", VILLAGE_CASH_ACCOUNT)
        .with("amount", "")
        .with("date", today_string())
        .with("description", "")
}

impl MemberClient {
    /// The village ledger is loaded as one unit; a single failure keeps the
    /// previous lists.
    pub async fn load_village(&self) {
        let year = self.console.year();
        let joined = tokio::try_join!(
            self.console.fetch_list(
                Collection::VillageIncomes,
                Endpoint::new(VILLAGE_INCOMES.path).query("year", year)
            ),
            self.console.fetch_list(
                Collection::VillageExpenses,
                Endpoint::new(VILLAGE_EXPENSES.path).query("year", year)
            ),
            self.console.fetch_list(
                Collection::VillageCashAccounts,
                Endpoint::new("/web/village/cash-accounts")
            ),
            self.console.fetch_list(
                Collection::VillageTransfers,
                Endpoint::new(VILLAGE_TRANSFERS.path).query("year", year)
            ),
        );

        match joined {
            Ok((incomes, expenses, accounts, transfers)) => {
                self.console.replace_list(Collection::VillageIncomes, incomes);
                self.console.replace_list(Collection::VillageExpenses, expenses);
                self.console.replace_list(Collection::VillageCashAccounts, accounts);
                self.console.replace_list(Collection::VillageTransfers, transfers);
            }
            Err(err) => self.console.report(&err, LoadMode::Passive, "loading village ledger"),
        }
    }

    pub fn open_village_income_modal(&self) {
        self.console.open_form(
            VILLAGE_INCOMES.form,
            village_entry_defaults(),
            None,
            VILLAGE_INCOMES.id_field,
        );
    }

    pub async fn save_village_income(&self) -> Result<()> {
        self.save_village(&VILLAGE_INCOMES).await
    }

    pub fn open_village_expense_modal(&self) {
        self.console.open_form(
            VILLAGE_EXPENSES.form,
            village_entry_defaults(),
            None,
            VILLAGE_EXPENSES.id_field,
        );
    }

    pub async fn save_village_expense(&self) -> Result<()> {
        self.save_village(&VILLAGE_EXPENSES).await
    }

    pub fn open_village_transfer_modal(&self) {
        self.console.open_form(
            VILLAGE_TRANSFERS.form,
            village_transfer_defaults(),
            None,
            VILLAGE_TRANSFERS.id_field,
        );
    }

    pub async fn save_village_transfer(&self) -> Result<()> {
        self.save_village(&VILLAGE_TRANSFERS).await
    }

    async fn save_village(&self, crud: &Crud) -> Result<()> {
        self.console.save_form(crud, EntityRecord::into_value).await?;
        self.load_village().await;
        Ok(())
    }
}
