//! HTTP plumbing shared by route modules.

mod routes;

pub use routes::RouteModule;
