//! `monthgate-discord`: [`Directory`](monthgate_core::Directory) over the
//! Discord REST API (v10).
//!
//! | operation        | request                                        |
//! |------------------|------------------------------------------------|
//! | `fetch_category` | `GET /channels/{id}`                           |
//! | `list_children`  | `GET /guilds/{guild}/channels`, by `parent_id` |
//! | `create_channel` | `POST /guilds/{guild}/channels`                |
//! | `set_overwrite`  | `PUT /channels/{id}/permissions/{role}`        |
//!
//! A granted tier gets `VIEW_CHANNEL | READ_MESSAGE_HISTORY`; a denied one
//! gets `VIEW_CHANNEL` in its deny set.

pub mod client;
pub mod error;

pub use client::{DiscordConfig, DiscordDirectory, DEFAULT_API_BASE};
pub use error::DiscordError;
