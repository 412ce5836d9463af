//! Scoped suspension of remote sync

use crate::errors::SceneError;
use crate::scene::Scene;
use std::ops::{Deref, DerefMut};
use tracing::{debug, error};

/// Guard returned by [`Scene::begin_bulk_update`].
///
/// Entering pulls the freshest remote state and locks the scene and all
/// of its layers, so edits made through the guard are not pushed one by
/// one. Leaving (via [`BulkUpdate::finish`] or drop) unlocks and pushes
/// the accumulated state once. Scopes nest; only the outermost one
/// pushes.
pub struct BulkUpdate<'a> {
    scene: &'a mut Scene,
    finished: bool,
}

impl<'a> BulkUpdate<'a> {
    pub(crate) fn enter(scene: &'a mut Scene) -> Result<Self, SceneError> {
        scene.pull_for_bulk()?;
        scene.lock_all();
        debug!(layers = scene.len(), "Entered bulk update");

        Ok(Self {
            scene,
            finished: false,
        })
    }

    /// Leave the scope and report whether the final push succeeded
    pub fn finish(mut self) -> Result<(), SceneError> {
        self.finished = true;
        self.release()
    }

    fn release(&mut self) -> Result<(), SceneError> {
        self.scene.unlock_all();
        let flushed = self.scene.flush();
        debug!(ok = flushed.is_ok(), "Left bulk update");
        flushed
    }
}

impl Deref for BulkUpdate<'_> {
    type Target = Scene;

    fn deref(&self) -> &Scene {
        self.scene
    }
}

impl DerefMut for BulkUpdate<'_> {
    fn deref_mut(&mut self) -> &mut Scene {
        self.scene
    }
}

impl Drop for BulkUpdate<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self.release() {
            error!(error = %err, "Bulk update flush failed");
        }
    }
}
