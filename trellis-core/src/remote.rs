//! Remote state contract and an in-memory implementation.
//!
//! [`RemoteState`] is the seam between the sync engine and the content
//! service. `trellis-client` implements it over HTTP; [`MemoryRemote`] keeps
//! the same semantics in process and records every mutating call, which is
//! what the engine's tests assert against.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::RemoteError;
use crate::types::{
    BlockPatch, LocalBlock, LocalPartial, PartialPatch, RemoteBlock, RemotePartial, Site, SiteId,
    ThemeConfig,
};

/// Operations the content service exposes for one site.
///
/// Theme updates merge top-level keys: keys absent from the payload are left
/// untouched on the server and a key sent as `null` is removed.
pub trait RemoteState {
    fn get_site(&self, site: &SiteId) -> Result<Site, RemoteError>;
    fn get_blocks(&self, site: &SiteId) -> Result<Vec<RemoteBlock>, RemoteError>;
    fn get_partials(&self, site: &SiteId) -> Result<Vec<RemotePartial>, RemoteError>;

    fn create_block(&self, site: &SiteId, block: &LocalBlock) -> Result<RemoteBlock, RemoteError>;
    fn update_block(&self, site: &SiteId, id: &str, patch: &BlockPatch)
        -> Result<(), RemoteError>;
    fn delete_block(&self, site: &SiteId, id: &str) -> Result<(), RemoteError>;

    fn create_partial(
        &self,
        site: &SiteId,
        partial: &LocalPartial,
    ) -> Result<RemotePartial, RemoteError>;
    fn update_partial(
        &self,
        site: &SiteId,
        id: &str,
        patch: &PartialPatch,
    ) -> Result<(), RemoteError>;
    fn delete_partial(&self, site: &SiteId, id: &str) -> Result<(), RemoteError>;

    fn update_site_theme(&self, site: &SiteId, theme: &ThemeConfig) -> Result<(), RemoteError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// A mutating call received by [`MemoryRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    CreateBlock { name: String },
    UpdateBlock { id: String, properties: Vec<String> },
    DeleteBlock { id: String },
    CreatePartial { name: String },
    UpdatePartial { id: String },
    DeletePartial { id: String },
    UpdateTheme { keys: Vec<String> },
}

/// Backing state of a [`MemoryRemote`].
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub site: Option<Site>,
    pub blocks: Vec<RemoteBlock>,
    pub partials: Vec<RemotePartial>,
    /// Mutating calls in the order received, including ones that failed.
    pub calls: Vec<RemoteCall>,
    /// Fail the n-th mutating call (0-based) with HTTP 500.
    pub fail_at_call: Option<usize>,
    next_id: u64,
}

/// In-process remote for one or more sites sharing a single state.
///
/// Cloning shares the state, so a test can keep a handle while the engine
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryRemote {
    pub fn new(site: Site) -> Self {
        let remote = Self::default();
        remote.state.borrow_mut().site = Some(site);
        remote
    }

    pub fn with_blocks(self, blocks: Vec<RemoteBlock>) -> Self {
        self.state.borrow_mut().blocks = blocks;
        self
    }

    pub fn with_partials(self, partials: Vec<RemotePartial>) -> Self {
        self.state.borrow_mut().partials = partials;
        self
    }

    /// Mutable access to the backing state, e.g. to simulate another editor.
    pub fn state(&self) -> std::cell::RefMut<'_, MemoryState> {
        self.state.borrow_mut()
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state.borrow().calls.clone()
    }

    pub fn block_names(&self) -> Vec<String> {
        self.state.borrow().blocks.iter().map(|b| b.name.clone()).collect()
    }

    pub fn partial_names(&self) -> Vec<String> {
        self.state
            .borrow()
            .partials
            .iter()
            .map(|p| p.name.clone())
            .collect()
    }

    fn record(&self, call: RemoteCall) -> Result<(), RemoteError> {
        let mut state = self.state.borrow_mut();
        let index = state.calls.len();
        state.calls.push(call);
        if state.fail_at_call == Some(index) {
            return Err(RemoteError::Api {
                status: 500,
                message: "injected failure".into(),
                code: Some("INJECTED".into()),
            });
        }
        Ok(())
    }

    fn check_site(&self, site: &SiteId) -> Result<(), RemoteError> {
        match &self.state.borrow().site {
            Some(s) if s.id == site.0 => Ok(()),
            _ => Err(not_found("site", &site.0)),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        format!("{prefix}-{}", state.next_id)
    }
}

fn not_found(kind: &str, id: &str) -> RemoteError {
    RemoteError::Api {
        status: 404,
        message: format!("{kind} '{id}' not found"),
        code: Some("NOT_FOUND".into()),
    }
}

impl RemoteState for MemoryRemote {
    fn get_site(&self, site: &SiteId) -> Result<Site, RemoteError> {
        self.check_site(site)?;
        self.state
            .borrow()
            .site
            .clone()
            .ok_or_else(|| not_found("site", &site.0))
    }

    fn get_blocks(&self, site: &SiteId) -> Result<Vec<RemoteBlock>, RemoteError> {
        self.check_site(site)?;
        Ok(self.state.borrow().blocks.clone())
    }

    fn get_partials(&self, site: &SiteId) -> Result<Vec<RemotePartial>, RemoteError> {
        self.check_site(site)?;
        Ok(self.state.borrow().partials.clone())
    }

    fn create_block(&self, site: &SiteId, block: &LocalBlock) -> Result<RemoteBlock, RemoteError> {
        self.check_site(site)?;
        self.record(RemoteCall::CreateBlock {
            name: block.name.clone(),
        })?;
        if self.state.borrow().blocks.iter().any(|b| b.name == block.name) {
            return Err(RemoteError::Api {
                status: 409,
                message: format!("block '{}' already exists", block.name),
                code: Some("DUPLICATE_NAME".into()),
            });
        }
        let created = RemoteBlock {
            id: self.next_id("blk"),
            name: block.name.clone(),
            template: block.template.clone(),
            fields: block.fields.clone(),
            description: block.description.clone(),
            thumbnail_type: block.thumbnail_type.clone(),
        };
        self.state.borrow_mut().blocks.push(created.clone());
        Ok(created)
    }

    fn update_block(
        &self,
        site: &SiteId,
        id: &str,
        patch: &BlockPatch,
    ) -> Result<(), RemoteError> {
        self.check_site(site)?;
        self.record(RemoteCall::UpdateBlock {
            id: id.to_owned(),
            properties: patch.property_names().iter().map(|s| s.to_string()).collect(),
        })?;
        let mut state = self.state.borrow_mut();
        let block = state
            .blocks
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| not_found("block", id))?;
        if let Some(template) = &patch.template {
            block.template = template.clone();
        }
        if let Some(fields) = &patch.fields {
            block.fields = fields.clone();
        }
        if let Some(description) = &patch.description {
            block.description = description.clone();
        }
        if let Some(thumbnail_type) = &patch.thumbnail_type {
            block.thumbnail_type = thumbnail_type.clone();
        }
        Ok(())
    }

    fn delete_block(&self, site: &SiteId, id: &str) -> Result<(), RemoteError> {
        self.check_site(site)?;
        self.record(RemoteCall::DeleteBlock { id: id.to_owned() })?;
        let mut state = self.state.borrow_mut();
        let before = state.blocks.len();
        state.blocks.retain(|b| b.id != id);
        if state.blocks.len() == before {
            return Err(not_found("block", id));
        }
        Ok(())
    }

    fn create_partial(
        &self,
        site: &SiteId,
        partial: &LocalPartial,
    ) -> Result<RemotePartial, RemoteError> {
        self.check_site(site)?;
        self.record(RemoteCall::CreatePartial {
            name: partial.name.clone(),
        })?;
        if self.state.borrow().partials.iter().any(|p| p.name == partial.name) {
            return Err(RemoteError::Api {
                status: 409,
                message: format!("partial '{}' already exists", partial.name),
                code: Some("DUPLICATE_NAME".into()),
            });
        }
        let created = RemotePartial {
            id: self.next_id("prt"),
            name: partial.name.clone(),
            template: partial.template.clone(),
        };
        self.state.borrow_mut().partials.push(created.clone());
        Ok(created)
    }

    fn update_partial(
        &self,
        site: &SiteId,
        id: &str,
        patch: &PartialPatch,
    ) -> Result<(), RemoteError> {
        self.check_site(site)?;
        self.record(RemoteCall::UpdatePartial { id: id.to_owned() })?;
        let mut state = self.state.borrow_mut();
        let partial = state
            .partials
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| not_found("partial", id))?;
        if let Some(template) = &patch.template {
            partial.template = template.clone();
        }
        Ok(())
    }

    fn delete_partial(&self, site: &SiteId, id: &str) -> Result<(), RemoteError> {
        self.check_site(site)?;
        self.record(RemoteCall::DeletePartial { id: id.to_owned() })?;
        let mut state = self.state.borrow_mut();
        let before = state.partials.len();
        state.partials.retain(|p| p.id != id);
        if state.partials.len() == before {
            return Err(not_found("partial", id));
        }
        Ok(())
    }

    fn update_site_theme(&self, site: &SiteId, theme: &ThemeConfig) -> Result<(), RemoteError> {
        self.check_site(site)?;
        self.record(RemoteCall::UpdateTheme {
            keys: theme.keys().cloned().collect(),
        })?;
        let mut state = self.state.borrow_mut();
        if let Some(current) = state.site.as_mut() {
            for (key, value) in theme {
                if value.is_null() {
                    current.theme.remove(key);
                } else {
                    current.theme.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(())
    }
}
