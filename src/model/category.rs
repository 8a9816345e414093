use crate::model::{CategoryId, FieldErrors, Kind, Transactions};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Icon used when a category is created without one.
pub const DEFAULT_ICON: &str = "fas fa-question";

/// Color used when a category is created without one.
pub const DEFAULT_COLOR: &str = "#4CAF50";

/// The category registry: two groups, one for income and one for expenses.
///
/// Ids are unique across both groups. Within a group, categories keep the order in which they were
/// added.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Categories {
    income: Vec<Category>,
    expense: Vec<Category>,
}

impl Default for Categories {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Categories {
    /// Creates a registry from explicit groups. Ids are not checked for uniqueness here; records
    /// read from disk or from a remote are accepted as they are.
    pub fn new(income: Vec<Category>, expense: Vec<Category>) -> Self {
        Self { income, expense }
    }

    /// A registry with no categories at all.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// The built-in set used when nothing has been saved yet: four income categories with ids
    /// 1 to 4 and eight expense categories with ids 5 to 12.
    pub fn defaults() -> Self {
        let c = |id, name: &str, icon: &str, color: &str| {
            Category::new(CategoryId::new(id), name, icon, color)
        };
        Self {
            income: vec![
                c(1, "Salary", "fas fa-briefcase", "#10b981"),
                c(2, "Freelance", "fas fa-laptop", "#3b82f6"),
                c(3, "Investments", "fas fa-chart-line", "#8b5cf6"),
                c(4, "Other", "fas fa-plus-circle", "#6b7280"),
            ],
            expense: vec![
                c(5, "Food", "fas fa-utensils", "#ef4444"),
                c(6, "Transport", "fas fa-car", "#f59e0b"),
                c(7, "Housing", "fas fa-home", "#06b6d4"),
                c(8, "Health", "fas fa-heartbeat", "#ec4899"),
                c(9, "Education", "fas fa-graduation-cap", "#8b5cf6"),
                c(10, "Leisure", "fas fa-gamepad", "#10b981"),
                c(11, "Shopping", "fas fa-shopping-cart", "#f97316"),
                c(12, "Bills", "fas fa-file-invoice", "#64748b"),
            ],
        }
    }

    /// Returns the categories of `group` in insertion order.
    pub fn list_group(&self, group: Kind) -> &[Category] {
        match group {
            Kind::Income => &self.income,
            Kind::Expense => &self.expense,
        }
    }

    fn group_mut(&mut self, group: Kind) -> &mut Vec<Category> {
        match group {
            Kind::Income => &mut self.income,
            Kind::Expense => &mut self.expense,
        }
    }

    /// Iterates over every category along with the group it belongs to, income first.
    pub fn iter(&self) -> impl Iterator<Item = (Kind, &Category)> {
        self.income
            .iter()
            .map(|c| (Kind::Income, c))
            .chain(self.expense.iter().map(|c| (Kind::Expense, c)))
    }

    pub fn len(&self) -> usize {
        self.income.len() + self.expense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up a category in either group. Returns `None` rather than an error because
    /// transactions may hold ids that no longer resolve.
    pub fn find(&self, id: CategoryId) -> Option<&Category> {
        self.iter().map(|(_, c)| c).find(|c| c.id == id)
    }

    /// Returns the group that holds `id`, if any.
    pub fn group_of(&self, id: CategoryId) -> Option<Kind> {
        self.iter().find(|(_, c)| c.id == id).map(|(kind, _)| kind)
    }

    /// Finds a category in `group` by name, ignoring case and surrounding whitespace.
    pub fn find_by_name(&self, group: Kind, name: &str) -> Option<&Category> {
        let wanted = name.trim().to_lowercase();
        self.list_group(group)
            .iter()
            .find(|c| c.name.to_lowercase() == wanted)
    }

    /// The largest id in either group, or zero.
    pub fn max_id(&self) -> i64 {
        self.iter().map(|(_, c)| c.id.value()).max().unwrap_or(0)
    }

    /// Validates `draft` and appends a new category with `id` to `group`.
    ///
    /// # Errors
    /// - `Validation` if the name is empty.
    /// - `Conflict` if `id` is already taken in either group.
    pub fn add(&mut self, group: Kind, draft: CategoryDraft, id: CategoryId) -> Result<Category> {
        let mut errors = FieldErrors::new("category");
        errors.check(!draft.name.trim().is_empty(), "name is required");
        errors.finish()?;

        if self.find(id).is_some() {
            return Err(Error::conflict(format!("Category id {id} already exists")));
        }

        let category = Category::new(
            id,
            draft.name.trim(),
            non_empty_or(draft.icon, DEFAULT_ICON),
            non_empty_or(draft.color, DEFAULT_COLOR),
        );
        self.group_mut(group).push(category.clone());
        Ok(category)
    }

    /// Deletes category `id` from `group` unless a transaction still references it.
    ///
    /// # Errors
    /// - `Conflict` if any transaction references the category. Nothing is removed.
    /// - `NotFound` if `group` has no category with this id.
    pub fn remove(
        &mut self,
        group: Kind,
        id: CategoryId,
        transactions: &Transactions,
    ) -> Result<Category> {
        let Some(ix) = self.list_group(group).iter().position(|c| c.id == id) else {
            return Err(Error::not_found(format!(
                "Category {id} not found in the {group} group"
            )));
        };
        if transactions.references(id) {
            return Err(Error::conflict(format!(
                "Category '{}' is in use by at least one transaction and cannot be deleted",
                self.list_group(group)[ix].name
            )));
        }
        Ok(self.group_mut(group).remove(ix))
    }

    /// Appends every category from `other` whose id is not already present in either group.
    /// Existing categories always win. Returns the number of categories added.
    pub fn merge(&mut self, other: Categories) -> usize {
        let mut added = 0;
        for group in Kind::ALL {
            let incoming = match group {
                Kind::Income => &other.income,
                Kind::Expense => &other.expense,
            };
            for category in incoming {
                if self.find(category.id).is_none() {
                    self.group_mut(group).push(category.clone());
                    added += 1;
                }
            }
        }
        added
    }
}

fn non_empty_or(value: String, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// A single category. The icon and color are presentation hints that the core never interprets.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Category {
    id: CategoryId,
    name: String,
    #[serde(default)]
    icon: String,
    #[serde(default)]
    color: String,
}

impl Category {
    pub fn new(
        id: CategoryId,
        name: impl Into<String>,
        icon: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            icon: icon.into(),
            color: color.into(),
        }
    }

    pub fn id(&self) -> CategoryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }

    pub fn color(&self) -> &str {
        &self.color
    }
}

/// The caller-supplied fields for a new category. Empty `icon` and `color` get defaults.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct CategoryDraft {
    pub name: String,
    pub icon: String,
    pub color: String,
}

impl CategoryDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }
}
