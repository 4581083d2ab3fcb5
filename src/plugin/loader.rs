//! Descriptor application
//!
//! Descriptors are applied in file order. Panel and group descriptors that
//! target a dashboard not yet registered are held back and applied right
//! after that dashboard registers; anything still held back at the end of
//! the load is a dangling reference. `DEFAULT_PANEL` actions in panel
//! descriptors run last, once every panel is in place.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::DashboardPolicy;
use crate::error::{RegistryError, RegistryWarning};
use crate::plugin::descriptor::{Descriptor, DescriptorKind, HostContributions, PanelSpec};
use crate::plugin::discovery::DescriptorDiscovery;
use crate::plugin::factory::PanelFactories;
use crate::site::dashboard::{PanelGroup, DEFAULT_GROUP};
use crate::site::panel::PanelDescriptor;
use crate::site::{PanelChange, Site};
use crate::slug::Slug;

/// Outcome of a successful load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Descriptors applied, in application order
    pub applied: Vec<PathBuf>,
    /// Descriptors not applied
    pub skipped: Vec<PathBuf>,
    pub warnings: Vec<RegistryWarning>,
    /// Aggregated host contributions of applied descriptors
    pub contributions: HostContributions,
    /// Dashboards not registered because of `DISABLED` or the deny/allow lists
    pub disabled_dashboards: Vec<Slug>,
    /// Dashboard marked `DEFAULT`, if any
    pub default_dashboard: Option<Slug>,
}

impl LoadReport {
    fn skip(&mut self, path: &Path, reason: impl Into<String>) {
        let warning = RegistryWarning::SkippedDescriptor {
            file: path.to_path_buf(),
            reason: reason.into(),
        };
        info!("{}", warning);
        self.skipped.push(path.to_path_buf());
        self.warnings.push(warning);
    }
}

/// Default panel action run after every other descriptor
struct DeferredDefault {
    path: PathBuf,
    optional: bool,
    dashboard: Slug,
    panel: Slug,
}

#[derive(Default)]
struct LoadState {
    report: LoadReport,
    pending: Vec<Descriptor>,
    disabled: HashSet<Slug>,
    deferred: Vec<DeferredDefault>,
}

/// Applies descriptors to a [`Site`]
pub struct DescriptorLoader<'a> {
    site: &'a Site,
    factories: &'a PanelFactories,
    policy: DashboardPolicy,
}

impl<'a> DescriptorLoader<'a> {
    pub fn new(site: &'a Site, factories: &'a PanelFactories) -> Self {
        Self {
            site,
            factories,
            policy: DashboardPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: DashboardPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Discover, parse and apply every descriptor in `dir`
    pub fn load_dir(&self, dir: &Path) -> Result<LoadReport, RegistryError> {
        let files = DescriptorDiscovery::new(dir).discover()?;
        let mut descriptors = Vec::with_capacity(files.len());
        let mut unparsed = Vec::new();

        for file in files {
            let bytes = std::fs::read(&file.path).map_err(|source| RegistryError::Io {
                path: file.path.clone(),
                source,
            })?;
            let path = file.path.clone();
            match Descriptor::from_bytes(file, &bytes) {
                Ok(descriptor) => descriptors.push(descriptor),
                Err(e) if Descriptor::declares_optional(&String::from_utf8_lossy(&bytes)) => {
                    warn!("Skipping optional descriptor {:?}: {}", path, e);
                    unparsed.push((path, e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }

        let mut report = self.apply(descriptors)?;
        for (path, reason) in unparsed {
            report.skip(&path, reason);
        }
        Ok(report)
    }

    /// Apply parsed descriptors
    ///
    /// Order: the four-digit prefix, then dashboards before panels and
    /// groups, then file name.
    pub fn apply(&self, mut descriptors: Vec<Descriptor>) -> Result<LoadReport, RegistryError> {
        descriptors.sort_by(|a, b| {
            a.file
                .order
                .cmp(&b.file.order)
                .then_with(|| b.kind.is_dashboard().cmp(&a.kind.is_dashboard()))
                .then_with(|| a.file.file_name().cmp(b.file.file_name()))
        });

        let mut state = LoadState::default();
        for descriptor in descriptors {
            for key in &descriptor.unknown_keys {
                state.report.warnings.push(RegistryWarning::UnknownField {
                    file: descriptor.path().to_path_buf(),
                    key: key.clone(),
                });
            }
            self.dispatch(descriptor, &mut state)?;
        }

        for deferred in std::mem::take(&mut state.deferred) {
            let result = self
                .site
                .set_default_panel(deferred.dashboard.as_str(), deferred.panel.as_str())
                .map_err(|e| e.with_file(&deferred.path));
            match result {
                Ok(()) => debug!(
                    "Default panel of {} set to {} by {:?}",
                    deferred.dashboard, deferred.panel, deferred.path
                ),
                Err(e) if deferred.optional => state.report.skip(&deferred.path, e.to_string()),
                Err(e) => return Err(e),
            }
        }

        for descriptor in std::mem::take(&mut state.pending) {
            let error = RegistryError::DanglingPanel {
                dashboard: descriptor.kind.dashboard().to_string(),
                panel: dangling_name(&descriptor.kind),
                file: Some(descriptor.path().to_path_buf()),
            };
            if descriptor.optional {
                state.report.skip(descriptor.path(), error.to_string());
            } else {
                return Err(error);
            }
        }

        let report = state.report;
        info!(
            "Applied {} descriptors ({} skipped, {} warnings)",
            report.applied.len(),
            report.skipped.len(),
            report.warnings.len()
        );
        Ok(report)
    }

    /// Apply now, hold back, or skip one descriptor
    fn dispatch(&self, descriptor: Descriptor, state: &mut LoadState) -> Result<(), RegistryError> {
        let target = descriptor.kind.dashboard().clone();

        if let DescriptorKind::Dashboard(spec) = &descriptor.kind {
            if !self.policy.is_enabled(spec.slug.as_str(), descriptor.disabled) {
                info!("Dashboard {} is disabled", spec.slug);
                state.disabled.insert(target.clone());
                state.report.disabled_dashboards.push(target.clone());
                state
                    .report
                    .skip(descriptor.path(), format!("dashboard {} is disabled", target));
                self.drop_pending(&target, state);
                return Ok(());
            }
            self.apply_guarded(descriptor, state)?;
            if !self.site.dashboards().contains(target.as_str()) {
                // Optional dashboard skipped; its held panels stay dangling
                return Ok(());
            }
            let ready: Vec<Descriptor> = {
                let (ready, waiting) = std::mem::take(&mut state.pending)
                    .into_iter()
                    .partition(|d| d.kind.dashboard() == &target);
                state.pending = waiting;
                ready
            };
            for held in ready {
                debug!("Applying held-back descriptor {:?}", held.path());
                self.apply_guarded(held, state)?;
            }
            return Ok(());
        }

        if state.disabled.contains(&target) {
            state
                .report
                .skip(descriptor.path(), format!("dashboard {} is disabled", target));
        } else if self.site.dashboards().contains(target.as_str()) {
            self.apply_guarded(descriptor, state)?;
        } else {
            debug!(
                "Holding {:?} until dashboard {} registers",
                descriptor.path(),
                target
            );
            state.pending.push(descriptor);
        }
        Ok(())
    }

    fn drop_pending(&self, dashboard: &Slug, state: &mut LoadState) {
        let (dropped, waiting): (Vec<Descriptor>, Vec<Descriptor>) =
            std::mem::take(&mut state.pending)
                .into_iter()
                .partition(|d| d.kind.dashboard() == dashboard);
        state.pending = waiting;
        for descriptor in dropped {
            state
                .report
                .skip(descriptor.path(), format!("dashboard {} is disabled", dashboard));
        }
    }

    /// Apply, turning failures of optional descriptors into skips
    fn apply_guarded(&self, descriptor: Descriptor, state: &mut LoadState) -> Result<(), RegistryError> {
        match self.apply_one(&descriptor, state) {
            Ok(()) => {
                state.report.contributions.merge(&descriptor.contributions);
                state.report.applied.push(descriptor.path().to_path_buf());
                Ok(())
            }
            Err(e) => {
                let e = e.with_file(descriptor.path());
                if descriptor.optional {
                    state.report.skip(descriptor.path(), e.to_string());
                    Ok(())
                } else {
                    Err(e)
                }
            }
        }
    }

    fn apply_one(&self, descriptor: &Descriptor, state: &mut LoadState) -> Result<(), RegistryError> {
        match &descriptor.kind {
            DescriptorKind::Dashboard(spec) => {
                self.site
                    .register_dashboard(spec.to_descriptor(descriptor.path()))?;
                if spec.is_default {
                    state.report.default_dashboard = Some(spec.slug.clone());
                }
                Ok(())
            }
            DescriptorKind::Panel(spec) => self.apply_panel(descriptor, spec, state),
            DescriptorKind::PanelGroup(spec) => {
                self.site
                    .add_panel_group(spec.dashboard.as_str(), spec.to_group())
            }
        }
    }

    fn apply_panel(
        &self,
        descriptor: &Descriptor,
        spec: &PanelSpec,
        state: &mut LoadState,
    ) -> Result<(), RegistryError> {
        let mut change = PanelChange::new(spec.dashboard.clone());
        if spec.remove {
            change = change.remove(spec.slug.clone());
        }

        if let Some(class_ref) = &spec.add {
            let group = spec
                .group
                .clone()
                .unwrap_or_else(|| PanelGroup::default_group().slug);
            let mut panel_descriptor =
                PanelDescriptor::new(spec.slug.clone(), spec.dashboard.clone(), class_ref.as_str())
                    .in_group(group.clone())
                    .with_permissions(spec.permissions.clone())
                    .with_source(descriptor.path());
            panel_descriptor.enabled = !descriptor.disabled;
            panel_descriptor.url_prefix = spec.url_prefix.clone();
            let panel = self.factories.build(panel_descriptor, spec.name.clone())?;

            let new_group = if group == DEFAULT_GROUP {
                PanelGroup::default_group()
            } else {
                let name = group.display_name();
                PanelGroup::new(group, name)
            };
            change = change.in_group(new_group).add(panel);
        }

        if change.remove.is_some() || change.add.is_some() {
            self.site.apply_panel_change(change)?;
        }

        if let Some(default) = &spec.default_panel {
            state.deferred.push(DeferredDefault {
                path: descriptor.path().to_path_buf(),
                optional: descriptor.optional,
                dashboard: spec.dashboard.clone(),
                panel: default.clone(),
            });
        }
        Ok(())
    }
}

fn dangling_name(kind: &DescriptorKind) -> String {
    match kind {
        DescriptorKind::Panel(spec) => spec.slug.to_string(),
        DescriptorKind::PanelGroup(spec) => format!("panel group {}", spec.slug),
        DescriptorKind::Dashboard(spec) => spec.slug.to_string(),
    }
}
