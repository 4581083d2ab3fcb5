//! Site loading, dashboard policy and route installation

mod common;

use common::*;
use dashboard_registry::{
    index_only, load_site, PanelFactories, RegistryError, RouteNode, Site, SiteConfig, SiteRouter,
};
use std::sync::Arc;
use std::thread;

fn write_console(dir: &DescriptorDir) {
    dir.write("_1000_project.toml", "DASHBOARD = \"project\"\n");
    dir.write("_1010_admin.toml", "DASHBOARD = \"admin\"\nDISABLED = true\n");
    dir.write("_1020_identity.toml", "DASHBOARD = \"identity\"\n");
    dir.write(
        "_1100_overview.toml",
        "PANEL = \"overview\"\nPANEL_DASHBOARD = \"project\"\nADD_PANEL = \"project.overview\"\n",
    );
    dir.write(
        "_2000_info.toml",
        "PANEL = \"info\"\nPANEL_DASHBOARD = \"admin\"\nADD_PANEL = \"admin.info\"\n",
    );
    dir.write(
        "_3000_users.toml",
        "PANEL = \"users\"\nPANEL_DASHBOARD = \"identity\"\nADD_PANEL = \"identity.users\"\n",
    );
}

#[test]
fn test_load_site_from_config_file() {
    let dir = DescriptorDir::new();
    let descriptors = dir.path().join("enabled");
    std::fs::create_dir(&descriptors).unwrap();
    let config_path = dir.write(
        "site.toml",
        "default_dashboard = \"identity\"\n[logging]\nfilter = \"warn\"\n",
    );
    for (name, contents) in [
        ("_1000_identity.toml", "DASHBOARD = \"identity\"\n"),
        (
            "_1100_users.toml",
            "PANEL = \"users\"\nPANEL_DASHBOARD = \"identity\"\nADD_PANEL = \"identity.users\"\n",
        ),
    ] {
        std::fs::write(descriptors.join(name), contents).unwrap();
    }

    let config = SiteConfig::from_file(&config_path).unwrap();
    let factories = PanelFactories::new().with_fallback(index_only());
    let (site, report) = load_site(&config, dir.path(), &factories).unwrap();
    assert_eq!(report.applied.len(), 2);
    assert_eq!(site.dashboards().default_dashboard().unwrap().as_str(), "identity");
    assert_eq!(
        site.route_table().resolve("/").unwrap().redirect_location(),
        Some("/identity/")
    );
}

#[test]
fn test_load_site_missing_directory() {
    let dir = DescriptorDir::new();
    let config = SiteConfig {
        descriptors_dir: "nowhere".into(),
        ..Default::default()
    };
    let err = load_site(&config, dir.path(), &PanelFactories::new()).unwrap_err();
    assert!(err.to_string().contains("Failed to load descriptors"));
}

#[test]
fn test_disabled_dashboard_and_policy() {
    let dir = DescriptorDir::new();
    write_console(&dir);

    // DISABLED alone
    let config = SiteConfig {
        descriptors_dir: dir.path().to_string_lossy().into_owned(),
        ..Default::default()
    };
    let (site, report) = load_site(&config, dir.path(), &test_factories()).unwrap();
    assert_eq!(slugs(&site.enumerate_dashboards()), vec!["project", "identity"]);
    assert_eq!(slugs(&report.disabled_dashboards), vec!["admin"]);
    assert!(site.route_table().resolve("/admin/info/").is_none());

    // The allow list re-enables admin and turns off everything else
    let config = SiteConfig {
        descriptors_dir: dir.path().to_string_lossy().into_owned(),
        allowed_dashboards: vec!["admin".into()],
        ..Default::default()
    };
    let (site, _) = load_site(&config, dir.path(), &test_factories()).unwrap();
    assert_eq!(slugs(&site.enumerate_dashboards()), vec!["admin"]);
    assert!(site.route_table().resolve("/admin/info/").is_some());

    // The deny list always wins
    let config = SiteConfig {
        descriptors_dir: dir.path().to_string_lossy().into_owned(),
        denied_dashboards: vec!["identity".into()],
        ..Default::default()
    };
    let (site, report) = load_site(&config, dir.path(), &test_factories()).unwrap();
    assert_eq!(slugs(&site.enumerate_dashboards()), vec!["project"]);
    assert!(report
        .skipped
        .iter()
        .any(|path| path.ends_with("_3000_users.toml")));
}

#[test]
fn test_unregister_dashboard_cascades() {
    let dir = DescriptorDir::new();
    write_console(&dir);
    let (site, _) = dir.load().unwrap();

    assert!(site.unregister_dashboard("identity"));
    assert!(site.get_panel("identity", "users").is_none());
    assert!(site.route_table().resolve("/identity/users/").is_none());
    assert!(!site.unregister_dashboard("identity"));

    // The slug is free again
    site.register_dashboard(dashboard("identity")).unwrap();
    assert!(site.enumerate_panels("identity").is_empty());
}

#[test]
fn test_router_install_and_reverse() {
    let dir = DescriptorDir::new();
    write_console(&dir);
    let (site, _) = dir.load().unwrap();
    let router = SiteRouter::new(Arc::clone(&site));

    let mut mounted = Vec::new();
    let version = router.install(&mut |root: &RouteNode| {
        mounted = root
            .children
            .iter()
            .filter_map(|node| node.namespace.clone())
            .collect();
    });
    assert_eq!(version, site.version());
    assert_eq!(mounted, vec!["project", "identity"]);

    assert_eq!(
        router.reverse("identity:users:index", &Default::default()).as_deref(),
        Some("/identity/users/")
    );
    assert_eq!(
        router.reverse("identity:index", &Default::default()).as_deref(),
        Some("/identity/")
    );
    assert!(router.reverse("identity:missing", &Default::default()).is_none());
    assert!(router.resolve("/nowhere/").is_none());
}

#[test]
fn test_route_table_tracks_mutations() {
    let site = Site::new();
    site.register_dashboard(dashboard("project")).unwrap();
    let first = site.route_table();
    assert!(Arc::ptr_eq(&first, &site.route_table()));

    site.register_panel(panel("project", "overview")).unwrap();
    let second = site.route_table();
    assert!(second.version > first.version);
    assert!(second.resolve("/project/overview/").is_some());

    site.set_panel_enabled("project", "overview", false).unwrap();
    assert!(site.route_table().resolve("/project/overview/").is_none());
    assert!(matches!(
        site.set_panel_enabled("project", "missing", true),
        Err(RegistryError::NotFound(_))
    ));
}

#[test]
fn test_concurrent_readers_and_writers() {
    let site = Arc::new(Site::new());
    site.register_dashboard(dashboard("project")).unwrap();

    let writers: Vec<_> = (0..4)
        .map(|i| {
            let site = Arc::clone(&site);
            thread::spawn(move || {
                for j in 0..10 {
                    site.register_panel(panel("project", &format!("p{}_{}", i, j)))
                        .unwrap();
                }
            })
        })
        .collect();
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let site = Arc::clone(&site);
            thread::spawn(move || {
                for _ in 0..50 {
                    let table = site.route_table();
                    // Every published tree is internally consistent
                    for entry in table.routes() {
                        assert!(table.resolve(&entry.path).is_some() || entry.path.contains('('));
                    }
                }
            })
        })
        .collect();
    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }

    assert_eq!(site.enumerate_panels("project").len(), 40);
    assert_eq!(site.route_table().version, site.version());
}
