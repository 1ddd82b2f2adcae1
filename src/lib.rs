//! box_catalog - Catalog, download and mirror files stored on Box.
//!
//! This library provides functionality to:
//! - Run the OAuth2 authorization-code flow and obtain an access token
//! - Walk a folder tree and filter its files by extension
//! - Create open shared links for the files found
//! - Mirror the file metadata into a SQLite database kept on Box
//!
//! # Example
//!
//! ```no_run
//! use box_catalog::{
//!     filter_by_extension, AuthorizedFetcher, CatalogOptions, Credentials, Endpoints,
//!     ExtensionSet, ResourceCatalog, TokenExchanger,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let credentials = Credentials::from_file("box-credentials.json")?;
//!     let endpoints = Endpoints::default();
//!
//!     let exchanger = TokenExchanger::new(credentials, &endpoints);
//!     println!("Visit {}", exchanger.authorize_url(None)?);
//!     let token = exchanger.exchange("code-from-redirect").await?;
//!
//!     let fetcher = AuthorizedFetcher::new(token, &endpoints);
//!     let catalog = ResourceCatalog::new(&fetcher, CatalogOptions::default())
//!         .build("0")
//!         .await?;
//!     for entry in filter_by_extension(&catalog, &ExtensionSet::images()) {
//!         println!("{}", entry);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod models;
pub mod redirect;
pub mod store;
pub mod sync;

// Re-exports for convenience
pub use auth::{AccessToken, TokenExchanger};
pub use catalog::{
    annotate_shared_links, filter_by_extension, CatalogOptions, ExtensionSet, ResourceCatalog,
    SHARED_LINK_FAILED,
};
pub use config::{Credentials, Endpoints};
pub use error::{AuthError, ConfigError, Error, FetchError, Result, SyncError};
pub use fetcher::AuthorizedFetcher;
pub use models::{EntryKind, FileEntry};
pub use redirect::extract_code;
pub use store::CatalogStore;
pub use sync::{SyncMode, SyncOptions, SyncOrchestrator, SyncReport};
