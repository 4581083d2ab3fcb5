//! Route patterns, composition and resolution

pub mod composer;
pub mod node;
pub mod pattern;
pub mod site_router;

pub use composer::{UrlComposer, INDEX_ROUTE};
pub use node::{ComposedSite, ResolvedRoute, Route, RouteEntry, RouteNode, RouteTarget};
pub use pattern::{Pattern, PatternMatch};
pub use site_router::{RouteRegistrar, SiteRouter};
