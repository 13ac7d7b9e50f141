use purse_domain::{
    Budget, Category, Identifiable, LocalTransaction, RecurringTemplate, Settings, Transaction,
    TransactionDetails,
};

use crate::{
    error::Result,
    store::{LocalStore, LocalStoreExt},
};

/// In-memory mirror of the local store, rebuilt by [`AppState::load`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub transactions: Vec<LocalTransaction>,
    pub categories: Vec<Category>,
    pub budgets: Vec<Budget>,
    pub settings: Settings,
}

impl AppState {
    /// Reads every collection concurrently. Missing settings are created with
    /// defaults and persisted.
    pub async fn load(store: &dyn LocalStore) -> Result<Self> {
        let (transactions, categories, budgets, settings) = futures::try_join!(
            store.all_records::<LocalTransaction>(),
            store.all_records::<Category>(),
            store.all_records::<Budget>(),
            store.get_record::<Settings>(Settings::KEY),
        )?;
        let settings = match settings {
            Some(settings) => settings,
            None => {
                let settings = Settings::default();
                store.put_record(&settings).await?;
                settings
            }
        };
        Ok(Self {
            transactions,
            categories,
            budgets,
            settings,
        })
    }

    pub fn transaction(&self, id: &str) -> Option<&LocalTransaction> {
        self.transactions.iter().find(|record| record.id() == id)
    }

    pub fn upsert_transaction(&mut self, record: LocalTransaction) {
        match self
            .transactions
            .iter_mut()
            .find(|existing| existing.id() == record.id())
        {
            Some(existing) => *existing = record,
            None => self.transactions.push(record),
        }
    }

    pub fn remove_transaction(&mut self, id: &str) {
        self.transactions.retain(|record| record.id() != id);
    }

    /// Concrete entries only; templates are definitions, not spending.
    pub fn ledger(&self) -> impl Iterator<Item = &TransactionDetails> {
        self.transactions
            .iter()
            .filter_map(|record| match &record.transaction {
                Transaction::Concrete(details) => Some(details),
                Transaction::Recurring(_) => None,
            })
    }

    pub fn templates(&self) -> impl Iterator<Item = &RecurringTemplate> {
        self.transactions
            .iter()
            .filter_map(|record| record.transaction.template())
    }

    pub fn pending_sync_count(&self) -> usize {
        self.transactions
            .iter()
            .filter(|record| record.needs_sync)
            .count()
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|category| category.id == id)
    }

    pub fn upsert_category(&mut self, category: Category) {
        match self.categories.iter_mut().find(|c| c.id == category.id) {
            Some(existing) => *existing = category,
            None => self.categories.push(category),
        }
    }

    pub fn upsert_budget(&mut self, budget: Budget) {
        match self.budgets.iter_mut().find(|b| b.id == budget.id) {
            Some(existing) => *existing = budget,
            None => self.budgets.push(budget),
        }
    }
}
