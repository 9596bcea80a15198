pub mod resource_routes;
pub mod server;
