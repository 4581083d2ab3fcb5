//! Panel registry
//!
//! Panels are keyed by `(dashboard, slug)` and kept per dashboard in
//! registration order. Mutation goes through [`crate::site::Site`], which
//! holds the dashboard lock alongside this one.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::site::panel::Panel;
use crate::slug::Slug;

/// Panels of every dashboard, each list in registration order
#[derive(Debug, Default)]
pub(crate) struct PanelTable {
    by_dashboard: HashMap<Slug, Vec<Arc<Panel>>>,
}

impl PanelTable {
    pub(crate) fn get(&self, dashboard: &str, slug: &str) -> Option<&Arc<Panel>> {
        self.by_dashboard
            .get(dashboard)?
            .iter()
            .find(|p| p.slug() == slug)
    }

    /// Panels of `dashboard` in registration order
    pub(crate) fn panels_of(&self, dashboard: &str) -> &[Arc<Panel>] {
        self.by_dashboard
            .get(dashboard)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(crate) fn insert(&mut self, panel: Arc<Panel>) {
        self.by_dashboard
            .entry(panel.dashboard().clone())
            .or_default()
            .push(panel);
    }

    /// Replace a registered panel in place, keeping its registration position
    pub(crate) fn replace(&mut self, panel: Arc<Panel>) -> bool {
        let Some(panels) = self.by_dashboard.get_mut(panel.dashboard().as_str()) else {
            return false;
        };
        match panels.iter_mut().find(|p| p.slug() == panel.slug()) {
            Some(slot) => {
                *slot = panel;
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove(&mut self, dashboard: &str, slug: &str) -> Option<Arc<Panel>> {
        let panels = self.by_dashboard.get_mut(dashboard)?;
        let index = panels.iter().position(|p| p.slug() == slug)?;
        let removed = panels.remove(index);
        if panels.is_empty() {
            self.by_dashboard.remove(dashboard);
        }
        Some(removed)
    }

    pub(crate) fn remove_dashboard(&mut self, dashboard: &str) -> Vec<Arc<Panel>> {
        self.by_dashboard.remove(dashboard).unwrap_or_default()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_dashboard.values().map(Vec::len).sum()
    }
}

/// Registered panels, readable concurrently with registration
#[derive(Debug, Default)]
pub struct PanelRegistry {
    pub(crate) table: RwLock<PanelTable>,
}

impl PanelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a panel
    pub fn get(&self, dashboard: &str, slug: &str) -> Option<Arc<Panel>> {
        self.table.read().get(dashboard, slug).cloned()
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
