//! Per-entity link to a remote viewer

use crate::errors::SyncError;
use crate::viewer::Viewer;
use std::fmt;
use std::rc::{Rc, Weak};

/// Synchronization state of one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Purely local, no viewer attached
    Detached,
    /// Attached; push and pull reach the viewer
    Linked,
    /// Attached but inside a bulk-update scope; push and pull are no-ops
    Locked,
}

/// Weak handle to the viewer plus a reentrant lock.
///
/// The link never keeps the viewer alive. Locking nests: each `lock`
/// must be matched by an `unlock` before sync resumes.
#[derive(Default)]
pub struct RemoteLink {
    viewer: Option<Weak<dyn Viewer>>,
    lock_depth: u32,
}

impl RemoteLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LinkState {
        match (&self.viewer, self.lock_depth) {
            (None, _) => LinkState::Detached,
            (Some(_), 0) => LinkState::Linked,
            (Some(_), _) => LinkState::Locked,
        }
    }

    pub fn is_linked(&self) -> bool {
        self.viewer.is_some()
    }

    pub fn is_locked(&self) -> bool {
        self.lock_depth > 0
    }

    /// Store `viewer`; fails if a viewer is already attached
    pub fn attach(&mut self, viewer: &Rc<dyn Viewer>) -> Result<(), SyncError> {
        if self.viewer.is_some() {
            return Err(SyncError::AlreadyLinked);
        }
        self.viewer = Some(Rc::downgrade(viewer));
        Ok(())
    }

    /// Forget the viewer, returning it if it is still alive
    pub fn detach(&mut self) -> Option<Rc<dyn Viewer>> {
        self.viewer.take().and_then(|viewer| viewer.upgrade())
    }

    pub fn lock(&mut self) {
        self.lock_depth += 1;
    }

    /// Number of `lock` calls not yet matched by `unlock`
    pub fn lock_depth(&self) -> u32 {
        self.lock_depth
    }

    pub fn unlock(&mut self) {
        self.lock_depth = self.lock_depth.saturating_sub(1);
    }

    /// Live viewer handle
    pub fn viewer(&self) -> Result<Rc<dyn Viewer>, SyncError> {
        self.viewer
            .as_ref()
            .ok_or(SyncError::Detached)?
            .upgrade()
            .ok_or(SyncError::ViewerDropped)
    }
}

impl fmt::Debug for RemoteLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteLink")
            .field("state", &self.state())
            .field("lock_depth", &self.lock_depth)
            .finish()
    }
}
