//! Dashboard registry

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::site::dashboard::Dashboard;
use crate::slug::Slug;

/// Dashboards in registration order plus the site default
#[derive(Debug, Default)]
pub(crate) struct DashboardTable {
    order: Vec<Slug>,
    entries: HashMap<Slug, Dashboard>,
    pub(crate) default_dashboard: Option<Slug>,
}

impl DashboardTable {
    pub(crate) fn get(&self, slug: &str) -> Option<&Dashboard> {
        self.entries.get(slug)
    }

    pub(crate) fn get_mut(&mut self, slug: &str) -> Option<&mut Dashboard> {
        self.entries.get_mut(slug)
    }

    pub(crate) fn contains(&self, slug: &str) -> bool {
        self.entries.contains_key(slug)
    }

    pub(crate) fn insert(&mut self, dashboard: Dashboard) {
        let slug = dashboard.slug().clone();
        if self.entries.insert(slug.clone(), dashboard).is_none() {
            self.order.push(slug);
        }
    }

    pub(crate) fn remove(&mut self, slug: &str) -> Option<Dashboard> {
        let removed = self.entries.remove(slug)?;
        self.order.retain(|s| s != slug);
        Some(removed)
    }

    /// Dashboards in registration order
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Dashboard> {
        self.order.iter().filter_map(|slug| self.entries.get(slug))
    }

    pub(crate) fn slugs(&self) -> &[Slug] {
        &self.order
    }
}

/// Registered dashboards, readable concurrently with registration
#[derive(Debug, Default)]
pub struct DashboardRegistry {
    pub(crate) table: RwLock<DashboardTable>,
}

impl DashboardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slug: &str) -> Option<Dashboard> {
        self.table.read().get(slug).cloned()
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.table.read().contains(slug)
    }

    /// Dashboard slugs in registration order
    pub fn enumerate(&self) -> Vec<Slug> {
        self.table.read().slugs().to_vec()
    }

    /// Dashboard the site root redirects to
    pub fn default_dashboard(&self) -> Option<Slug> {
        self.table.read().default_dashboard.clone()
    }

    pub fn len(&self) -> usize {
        self.table.read().slugs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::dashboard::DashboardDescriptor;

    fn dashboard(slug: &str) -> Dashboard {
        Dashboard::new(DashboardDescriptor::new(Slug::new(slug).unwrap(), slug))
    }

    #[test]
    fn test_registration_order() {
        let mut table = DashboardTable::default();
        table.insert(dashboard("project"));
        table.insert(dashboard("admin"));
        table.insert(dashboard("identity"));
        table.remove("admin");
        table.insert(dashboard("admin"));

        let order: Vec<&str> = table.iter().map(|d| d.slug().as_str()).collect();
        assert_eq!(order, vec!["project", "identity", "admin"]);
    }
}
