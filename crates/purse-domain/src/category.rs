//! Categories used to classify transactions and scope budgets.

use serde::{Deserialize, Serialize};

use crate::common::{Identifiable, TransactionKind};

/// Icon shown for a category. Images arrive as `data:image/...` URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CategoryIcon {
    Emoji(String),
    Image(String),
}

impl CategoryIcon {
    pub const DEFAULT_EMOJI: &'static str = "📝";

    pub fn is_image(&self) -> bool {
        matches!(self, CategoryIcon::Image(_))
    }
}

impl Default for CategoryIcon {
    fn default() -> Self {
        CategoryIcon::Emoji(Self::DEFAULT_EMOJI.into())
    }
}

impl From<String> for CategoryIcon {
    fn from(value: String) -> Self {
        if value.starts_with("data:image") {
            CategoryIcon::Image(value)
        } else if value.trim().is_empty() {
            CategoryIcon::default()
        } else {
            CategoryIcon::Emoji(value)
        }
    }
}

impl From<CategoryIcon> for String {
    fn from(icon: CategoryIcon) -> Self {
        match icon {
            CategoryIcon::Emoji(value) | CategoryIcon::Image(value) => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: CategoryIcon,
    #[serde(default)]
    pub color: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
}

impl Category {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        icon: &str,
        color: impl Into<String>,
        kind: TransactionKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: CategoryIcon::from(icon.to_string()),
            color: color.into(),
            kind,
        }
    }
}

impl Identifiable for Category {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Categories seeded on first run when the store holds none.
pub fn default_categories() -> Vec<Category> {
    use TransactionKind::{Expense, Income};
    vec![
        Category::new("food", "Food", "🍕", "#FF6B6B", Expense),
        Category::new("transport", "Transport", "🚗", "#4ECDC4", Expense),
        Category::new("shopping", "Shopping", "🛒", "#45B7D1", Expense),
        Category::new("entertainment", "Entertainment", "🎬", "#96CEB4", Expense),
        Category::new("bills", "Bills", "📄", "#FFEAA7", Expense),
        Category::new("salary", "Salary", "💰", "#6C5CE7", Income),
        Category::new("freelance", "Freelance", "💼", "#A29BFE", Income),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icon_detects_embedded_images() {
        let icon = CategoryIcon::from("data:image/png;base64,AAAA".to_string());
        assert!(icon.is_image());
        let icon = CategoryIcon::from("🍕".to_string());
        assert_eq!(icon, CategoryIcon::Emoji("🍕".into()));
    }

    #[test]
    fn defaults_cover_both_kinds() {
        let defaults = default_categories();
        assert_eq!(defaults.len(), 7);
        assert!(defaults.iter().any(|c| c.kind == TransactionKind::Income));
        assert!(defaults.iter().any(|c| c.id == "food"));
    }
}
