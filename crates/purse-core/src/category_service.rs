use std::sync::Arc;

use futures::future::try_join_all;
use purse_domain::{default_categories, Budget, Category, LocalTransaction};
use tracing::info;

use crate::{
    error::{CoreError, Result},
    store::{Collection, LocalStore, LocalStoreExt},
};

pub struct CategoryService {
    local: Arc<dyn LocalStore>,
}

impl CategoryService {
    pub fn new(local: Arc<dyn LocalStore>) -> Self {
        Self { local }
    }

    /// Seeds the default categories when the collection is empty. Returns how
    /// many were written.
    pub async fn ensure_defaults(&self) -> Result<usize> {
        if !self.local.get_all(Collection::Categories).await?.is_empty() {
            return Ok(0);
        }
        let defaults = default_categories();
        try_join_all(defaults.iter().map(|category| self.local.put_record(category))).await?;
        info!(count = defaults.len(), "default categories created");
        Ok(defaults.len())
    }

    pub async fn save(&self, category: &Category) -> Result<()> {
        self.local.put_record(category).await
    }

    /// Deletes a category and the budgets pointing at it. Refused while any
    /// transaction still references the category.
    pub async fn delete(&self, category_id: &str) -> Result<Vec<String>> {
        if self.local.get(Collection::Categories, category_id).await?.is_none() {
            return Err(CoreError::CategoryNotFound(category_id.to_string()));
        }
        let transactions = self.local.all_records::<LocalTransaction>().await?;
        if transactions
            .iter()
            .any(|record| record.transaction.category() == category_id)
        {
            return Err(CoreError::CategoryInUse(category_id.to_string()));
        }

        let orphaned: Vec<String> = self
            .local
            .all_records::<Budget>()
            .await?
            .into_iter()
            .filter(|budget| budget.category_id == category_id)
            .map(|budget| budget.id)
            .collect();
        self.local.delete(Collection::Categories, category_id).await?;
        try_join_all(
            orphaned
                .iter()
                .map(|id| self.local.delete(Collection::Budgets, id)),
        )
        .await?;
        info!(category = category_id, budgets = orphaned.len(), "category deleted");
        Ok(orphaned)
    }

    pub async fn save_budget(&self, budget: &Budget) -> Result<()> {
        self.local.put_record(budget).await
    }

    pub async fn delete_budget(&self, budget_id: &str) -> Result<()> {
        self.local.delete(Collection::Budgets, budget_id).await
    }
}
