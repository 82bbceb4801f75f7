//! abapcli - a command-line client for SAP ABAP Development Tools (ADT).
//!
//! Drives the ADT HTTP interface to perform development-lifecycle
//! operations without a GUI IDE: object creation, source upload,
//! activation, ABAP Unit test runs, ATC static checks and abapGit
//! repository sync.
//!
//! # Architecture
//!
//! The client is layered leaf to root:
//!
//! 1. **Session Layer** (`session`) - HTTP transport, cookie-backed
//!    login, CSRF token cache with single-retry recovery
//! 2. **Resource Model** (`resource`) - pure mapping from object
//!    references to ADT paths and content types
//! 3. **Codec** (`codec`) - XML encoders for request bodies, defensive
//!    decoders for result feeds
//! 4. **Polling Engine** (`poll`) - generic poll-until-terminal driver
//!    shared by AUnit, ATC and abapGit flows
//! 5. **Operations** (`ops`) - one thin orchestration module per
//!    capability
//! 6. **Reporting** (`report`) - human, JSON and checkstyle rendering

pub mod codec;
pub mod config;
pub mod error;
pub mod ops;
pub mod poll;
pub mod report;
pub mod resource;
pub mod session;
pub mod types;

pub use error::{Error, Result};

/// Client version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
