use crate::directory::{Category, Channel, Directory, DirectoryError, Overwrite};
use futures::future::{self, BoxFuture, FutureExt};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// A call made against [`MemoryDirectory`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchCategory(String),
    ListChildren(String),
    CreateChannel { category_id: String, name: String },
    SetOverwrite { channel_id: String, principal: String, view: bool },
}

#[derive(Default)]
struct Inner {
    categories: Vec<Category>,
    channels: Vec<Channel>,
    overwrites: HashMap<(String, String), bool>,
    calls: Vec<Call>,
    next_id: u64,
    failing_writes: HashSet<(String, String)>,
    fail_next_create: bool,
    fail_listing: bool,
}

/// In-process directory. Holds channels and overwrites in memory, logs
/// every call, and can be told to fail specific operations.
pub struct MemoryDirectory {
    everyone: String,
    inner: Mutex<Inner>,
}

impl MemoryDirectory {
    pub fn new(everyone: impl Into<String>) -> Self {
        Self {
            everyone: everyone.into(),
            inner: Mutex::new(Inner {
                next_id: 1000,
                ..Inner::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_category(&self, id: &str, name: &str) {
        self.lock().categories.push(Category {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    pub fn remove_category(&self, id: &str) {
        self.lock().categories.retain(|c| c.id != id);
    }

    /// Add a channel and return its id.
    pub fn add_channel(&self, parent_id: Option<&str>, name: &str) -> String {
        let mut inner = self.lock();
        let id = inner.allocate_id();
        inner.channels.push(Channel {
            id: id.clone(),
            name: name.to_string(),
            parent_id: parent_id.map(str::to_string),
        });
        id
    }

    pub fn channels_named(&self, name: &str) -> Vec<Channel> {
        self.lock()
            .channels
            .iter()
            .filter(|c| c.name == name)
            .cloned()
            .collect()
    }

    /// Current overwrite for `principal` on the first channel named
    /// `channel_name`.
    pub fn view_of(&self, channel_name: &str, principal: &str) -> Option<bool> {
        let inner = self.lock();
        let channel = inner.channels.iter().find(|c| c.name == channel_name)?;
        inner
            .overwrites
            .get(&(channel.id.clone(), principal.to_string()))
            .copied()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Fail the next overwrite of `principal` on the channel named
    /// `channel_name`. Later writes succeed.
    pub fn fail_overwrite_once(&self, channel_name: &str, principal: &str) {
        self.lock()
            .failing_writes
            .insert((channel_name.to_string(), principal.to_string()));
    }

    pub fn fail_next_create(&self) {
        self.lock().fail_next_create = true;
    }

    pub fn fail_listing(&self, fail: bool) {
        self.lock().fail_listing = fail;
    }
}

impl Inner {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }
}

impl Directory for MemoryDirectory {
    fn everyone_principal(&self) -> String {
        self.everyone.clone()
    }

    fn fetch_category<'a>(
        &'a self,
        category_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Category>, DirectoryError>> {
        let mut inner = self.lock();
        inner.calls.push(Call::FetchCategory(category_id.to_string()));
        let found = inner
            .categories
            .iter()
            .find(|c| c.id == category_id)
            .cloned();
        future::ready(Ok(found)).boxed()
    }

    fn list_children<'a>(
        &'a self,
        category_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Channel>, DirectoryError>> {
        let mut inner = self.lock();
        inner.calls.push(Call::ListChildren(category_id.to_string()));
        if inner.fail_listing {
            return future::ready(Err(DirectoryError::Injected("listing failed".into()))).boxed();
        }
        let children = inner
            .channels
            .iter()
            .filter(|c| c.parent_id.as_deref() == Some(category_id))
            .cloned()
            .collect();
        future::ready(Ok(children)).boxed()
    }

    fn create_channel<'a>(
        &'a self,
        category_id: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Channel, DirectoryError>> {
        let mut inner = self.lock();
        inner.calls.push(Call::CreateChannel {
            category_id: category_id.to_string(),
            name: name.to_string(),
        });
        if std::mem::take(&mut inner.fail_next_create) {
            return future::ready(Err(DirectoryError::Injected("create failed".into()))).boxed();
        }
        let channel = Channel {
            id: inner.allocate_id(),
            name: name.to_string(),
            parent_id: Some(category_id.to_string()),
        };
        inner.channels.push(channel.clone());
        future::ready(Ok(channel)).boxed()
    }

    fn set_overwrite<'a>(
        &'a self,
        channel_id: &'a str,
        overwrite: Overwrite,
    ) -> BoxFuture<'a, Result<(), DirectoryError>> {
        let mut inner = self.lock();
        inner.calls.push(Call::SetOverwrite {
            channel_id: channel_id.to_string(),
            principal: overwrite.principal.clone(),
            view: overwrite.view,
        });

        let name = inner
            .channels
            .iter()
            .find(|c| c.id == channel_id)
            .map(|c| c.name.clone());
        let Some(name) = name else {
            return future::ready(Err(DirectoryError::Status {
                status: 404,
                body: format!("unknown channel {channel_id}"),
            }))
            .boxed();
        };

        if inner
            .failing_writes
            .remove(&(name.clone(), overwrite.principal.clone()))
        {
            return future::ready(Err(DirectoryError::Injected(format!(
                "write to {name} for {} failed",
                overwrite.principal
            ))))
            .boxed();
        }

        inner
            .overwrites
            .insert((channel_id.to_string(), overwrite.principal), overwrite.view);
        future::ready(Ok(())).boxed()
    }
}
