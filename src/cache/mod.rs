pub mod resource_cache;
pub mod subscriber;
