pub mod field;
pub mod headers;
pub mod json;
pub mod query;

// Re-export the collection types at the crate root for convenience
pub use headers::HeaderMap;
pub use headers::ParamMap;
pub use json::JsonObject;
