//! Server-side support for frontends that update page fragments instead
//! of full documents.
//!
//! The frontend announces what it is about to do with `X-Up-*` request
//! headers. [`Change`] parses those headers, answers questions like
//! [`Change::is_target`], and collects the response metadata that the
//! host framework applies via [`Change::finalize`].
//!
//! ```
//! use unpoly_core::Change;
//! use unpoly_core::Request;
//!
//! let request = Request::new("GET", "/tasks")
//!     .with_header("X-Up-Version", "3.0.0")
//!     .with_header("X-Up-Target", ".content");
//! let up = Change::new(request);
//!
//! assert!(up.is_unpoly());
//! assert!(up.is_target(".content"));
//! assert!(!up.is_target(".sidebar"));
//!
//! let update = up.finalize();
//! assert_eq!(update.header("X-Up-Method"), Some("GET"));
//! ```

pub mod cache;
pub mod change;
pub mod context;
pub mod error;
pub mod layer;
pub mod request;
pub mod response;
mod target;

pub use cache::Cache;
pub use change::Change;
pub use context::ContextView;
pub use error::Error;
pub use error::Result;
pub use layer::Layer;
pub use request::Config;
pub use request::Request;
pub use response::METHOD_COOKIE_NAME;
pub use response::MethodCookie;
pub use response::ResponseUpdate;
