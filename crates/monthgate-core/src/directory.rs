//! The external directory service the reconciler drives.
//!
//! Methods return boxed futures so implementations can sit behind
//! `Arc<dyn Directory>`.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
}

/// Visibility for one principal on one channel. Setting it replaces any
/// earlier overwrite for that principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overwrite {
    pub principal: String,
    pub view: bool,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("{0}")]
    Injected(String),
}

pub trait Directory: Send + Sync {
    /// The identity every member holds (`@everyone` on Discord).
    fn everyone_principal(&self) -> String;

    /// Look up a category. `Ok(None)` means it does not exist.
    fn fetch_category<'a>(
        &'a self,
        category_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Category>, DirectoryError>>;

    /// Direct children of a category.
    fn list_children<'a>(
        &'a self,
        category_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Channel>, DirectoryError>>;

    /// Create a text channel under `category_id` with no overwrites of its own.
    fn create_channel<'a>(
        &'a self,
        category_id: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Channel, DirectoryError>>;

    fn set_overwrite<'a>(
        &'a self,
        channel_id: &'a str,
        overwrite: Overwrite,
    ) -> BoxFuture<'a, Result<(), DirectoryError>>;
}
