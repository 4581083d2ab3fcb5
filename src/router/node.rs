//! Composed route tree
//!
//! The tree mirrors the URL hierarchy: the root node holds one child per
//! dashboard, each dashboard node one child per routed panel. Nodes carry a
//! fully qualified namespace (`project`, `project:overview`) and the union
//! of permissions required to reach them.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::RegistryWarning;
use crate::permissions::PermissionSet;
use crate::router::pattern::Pattern;
use crate::site::panel::HandlerRef;

/// What a matched route does
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteTarget {
    /// Dispatch to a host handler
    Handler { handler: HandlerRef },
    /// Redirect to an absolute path
    Redirect { location: String },
}

/// A leaf route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub pattern: Pattern,
    pub name: Option<String>,
    pub target: RouteTarget,
}

/// A prefix in the route tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteNode {
    pub pattern: Pattern,
    pub namespace: Option<String>,
    pub permissions: PermissionSet,
    /// Tried before `routes`
    pub children: Vec<RouteNode>,
    pub routes: Vec<Route>,
}

/// Outcome of resolving a request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub target: RouteTarget,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub kwargs: BTreeMap<String, String>,
    /// Permissions the host must check before dispatching
    pub permissions: PermissionSet,
}

impl ResolvedRoute {
    pub fn handler(&self) -> Option<&HandlerRef> {
        match &self.target {
            RouteTarget::Handler { handler } => Some(handler),
            RouteTarget::Redirect { .. } => None,
        }
    }

    pub fn redirect_location(&self) -> Option<&str> {
        match &self.target {
            RouteTarget::Redirect { location } => Some(location),
            RouteTarget::Handler { .. } => None,
        }
    }

    /// `namespace:name`, or the bare name at the root
    pub fn qualified_name(&self) -> Option<String> {
        let name = self.name.as_deref()?;
        Some(match &self.namespace {
            Some(ns) => format!("{}:{}", ns, name),
            None => name.to_string(),
        })
    }
}

/// One flattened route, as listed by `dashreg routes`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    /// Concatenated pattern sources with anchors stripped
    pub path: String,
    pub name: Option<String>,
    pub target: RouteTarget,
    pub permissions: PermissionSet,
}

impl RouteNode {
    pub fn new(pattern: Pattern, namespace: Option<String>, permissions: PermissionSet) -> Self {
        Self {
            pattern,
            namespace,
            permissions,
            children: Vec::new(),
            routes: Vec::new(),
        }
    }

    /// Resolve an absolute request path (`/project/overview/`)
    pub fn resolve(&self, path: &str) -> Option<ResolvedRoute> {
        let remainder = path.strip_prefix('/').unwrap_or(path);
        self.resolve_remainder(remainder, BTreeMap::new())
    }

    fn resolve_remainder(
        &self,
        remainder: &str,
        mut kwargs: BTreeMap<String, String>,
    ) -> Option<ResolvedRoute> {
        let matched = self.pattern.match_prefix(remainder)?;
        kwargs.extend(matched.kwargs);
        let rest = &remainder[matched.consumed..];

        for child in &self.children {
            if let Some(resolved) = child.resolve_remainder(rest, kwargs.clone()) {
                return Some(resolved);
            }
        }
        for route in &self.routes {
            if let Some(m) = route.pattern.match_prefix(rest) {
                let mut kwargs = kwargs;
                kwargs.extend(m.kwargs);
                return Some(ResolvedRoute {
                    target: route.target.clone(),
                    namespace: self.namespace.clone(),
                    name: route.name.clone(),
                    kwargs,
                    permissions: self.permissions.clone(),
                });
            }
        }
        None
    }

    /// Build the absolute path of a named route
    ///
    /// `name` is qualified the way [`ResolvedRoute::qualified_name`] prints
    /// it: `project:overview:index`, `project:index`, or a bare root route
    /// name.
    pub fn reverse(&self, name: &str, kwargs: &BTreeMap<String, String>) -> Option<String> {
        let (namespace, route_name) = match name.rsplit_once(':') {
            Some((ns, route)) => (Some(ns), route),
            None => (None, name),
        };
        self.reverse_in(namespace, route_name, kwargs)
            .map(|path| format!("/{}", path))
    }

    fn reverse_in(
        &self,
        namespace: Option<&str>,
        route_name: &str,
        kwargs: &BTreeMap<String, String>,
    ) -> Option<String> {
        let prefix = self.pattern.reverse(kwargs)?;
        if self.namespace.as_deref() == namespace {
            let route = self
                .routes
                .iter()
                .filter(|r| r.name.as_deref() == Some(route_name))
                .find_map(|r| r.pattern.reverse(kwargs));
            if let Some(route) = route {
                return Some(prefix + &route);
            }
        }
        self.children
            .iter()
            .filter(|child| match (&child.namespace, namespace) {
                (Some(child_ns), Some(ns)) => {
                    ns == child_ns || ns.starts_with(&format!("{}:", child_ns))
                }
                _ => false,
            })
            .find_map(|child| child.reverse_in(namespace, route_name, kwargs))
            .map(|rest| prefix + &rest)
    }

    /// Flatten into one entry per leaf route, in resolution order
    pub fn flatten(&self) -> Vec<RouteEntry> {
        let mut entries = Vec::new();
        self.flatten_into("", &mut entries);
        entries
    }

    fn flatten_into(&self, prefix: &str, entries: &mut Vec<RouteEntry>) {
        let prefix = format!("{}{}", prefix, strip_anchors(self.pattern.as_str()));
        for child in &self.children {
            child.flatten_into(&prefix, entries);
        }
        for route in &self.routes {
            entries.push(RouteEntry {
                path: format!("/{}{}", prefix, strip_anchors(route.pattern.as_str())),
                name: route.name.as_ref().map(|name| match &self.namespace {
                    Some(ns) => format!("{}:{}", ns, name),
                    None => name.clone(),
                }),
                target: route.target.clone(),
                permissions: self.permissions.clone(),
            });
        }
    }
}

fn strip_anchors(source: &str) -> &str {
    let source = source.strip_prefix('^').unwrap_or(source);
    source.strip_suffix('$').unwrap_or(source)
}

/// A published route tree together with the registry version it reflects
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposedSite {
    pub version: u64,
    pub root: RouteNode,
    #[serde(skip)]
    pub warnings: Vec<RegistryWarning>,
}

impl ComposedSite {
    pub fn resolve(&self, path: &str) -> Option<ResolvedRoute> {
        self.root.resolve(path)
    }

    pub fn reverse(&self, name: &str, kwargs: &BTreeMap<String, String>) -> Option<String> {
        self.root.reverse(name, kwargs)
    }

    pub fn routes(&self) -> Vec<RouteEntry> {
        self.root.flatten()
    }

    /// Stable JSON rendering of the route tree
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler_route(pattern: &str, handler: &str, name: Option<&str>) -> Route {
        Route {
            pattern: Pattern::new(pattern).unwrap(),
            name: name.map(str::to_string),
            target: RouteTarget::Handler {
                handler: HandlerRef::new(handler),
            },
        }
    }

    fn tree() -> RouteNode {
        let mut panel = RouteNode::new(
            Pattern::segment("routers"),
            Some("project:routers".to_string()),
            PermissionSet::parse(["openstack.services.network"]).unwrap(),
        );
        panel.routes.push(handler_route("^$", "routers.index", Some("index")));
        panel
            .routes
            .push(handler_route(r"^(?P<router_id>[^/]+)/$", "routers.detail", Some("detail")));

        let mut dashboard = RouteNode::new(
            Pattern::segment("project"),
            Some("project".to_string()),
            PermissionSet::new(),
        );
        dashboard.children.push(panel);
        dashboard.routes.push(Route {
            pattern: Pattern::empty(),
            name: Some("index".to_string()),
            target: RouteTarget::Redirect {
                location: "/project/routers/".to_string(),
            },
        });

        let mut root = RouteNode::new(Pattern::root(), None, PermissionSet::new());
        root.children.push(dashboard);
        root.routes.push(handler_route("^home/$", "user_home", Some("user_home")));
        root
    }

    #[test]
    fn test_resolve_handler_with_kwargs() {
        let resolved = tree().resolve("/project/routers/r1/").unwrap();
        assert_eq!(resolved.handler().unwrap().as_str(), "routers.detail");
        assert_eq!(resolved.kwargs.get("router_id").map(String::as_str), Some("r1"));
        assert_eq!(resolved.qualified_name().as_deref(), Some("project:routers:detail"));
        assert!(resolved
            .permissions
            .iter()
            .any(|p| p.as_str() == "openstack.services.network"));
    }

    #[test]
    fn test_resolve_redirect_and_miss() {
        let root = tree();
        let index = root.resolve("/project/").unwrap();
        assert_eq!(index.redirect_location(), Some("/project/routers/"));
        assert!(root.resolve("/project/nothing/").is_none());
        assert!(root.resolve("/elsewhere/").is_none());
        assert_eq!(root.resolve("/home/").unwrap().handler().unwrap().as_str(), "user_home");
    }

    #[test]
    fn test_reverse() {
        let root = tree();
        let mut kwargs = BTreeMap::new();
        assert_eq!(root.reverse("project:index", &kwargs).as_deref(), Some("/project/"));
        assert_eq!(
            root.reverse("project:routers:index", &kwargs).as_deref(),
            Some("/project/routers/")
        );
        assert_eq!(root.reverse("user_home", &kwargs).as_deref(), Some("/home/"));
        assert_eq!(root.reverse("project:routers:detail", &kwargs), None);
        kwargs.insert("router_id".to_string(), "r1".to_string());
        assert_eq!(
            root.reverse("project:routers:detail", &kwargs).as_deref(),
            Some("/project/routers/r1/")
        );
        assert_eq!(root.reverse("admin:index", &kwargs), None);
    }

    #[test]
    fn test_flatten() {
        let paths: Vec<String> = tree().flatten().into_iter().map(|e| e.path).collect();
        assert_eq!(
            paths,
            vec![
                "/project/routers/",
                "/project/routers/(?P<router_id>[^/]+)/",
                "/project/",
                "/home/",
            ]
        );
    }
}
