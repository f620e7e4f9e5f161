use url::Url;

use crate::error::{GlFetchError, Result};

use super::types::Project;

/// Stable reference to a [`Project`] inside a [`ProjectStore`].
///
/// Handles carry the store generation they were issued under, so a handle kept
/// across [`ProjectStore::reset`] never resolves to a different project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    pub fn index(self) -> usize {
        self.index as usize
    }
}

/// Arena of projects addressed by [`Handle`].
#[derive(Debug, Default)]
pub struct ProjectStore {
    generation: u32,
    projects: Vec<Project>,
}

impl ProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a project with empty derived fields.
    ///
    /// # Errors
    ///
    /// Returns [`GlFetchError::Config`] once the store holds `u32::MAX + 1`
    /// projects, the most a [`Handle`] can address.
    pub fn create(&mut self, id: i64, metadata_url: Url, pipelines_url: Url) -> Result<Handle> {
        let index = next_index(self.projects.len())?;
        self.projects
            .push(Project::new(id, metadata_url, pipelines_url));

        Ok(Handle {
            index,
            generation: self.generation,
        })
    }

    pub fn get(&self, handle: Handle) -> Option<&Project> {
        if handle.generation != self.generation {
            return None;
        }
        self.projects.get(handle.index())
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut Project> {
        if handle.generation != self.generation {
            return None;
        }
        self.projects.get_mut(handle.index())
    }

    /// Handles of all projects in creation order.
    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        let generation = self.generation;
        (0..self.projects.len()).map_while(move |index| {
            Some(Handle {
                index: u32::try_from(index).ok()?,
                generation,
            })
        })
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Drops every project and invalidates all outstanding handles.
    pub fn reset(&mut self) {
        self.projects.clear();
        self.generation = self.generation.wrapping_add(1);
    }
}

fn next_index(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        GlFetchError::Config(format!("a batch holds at most {} projects", 1u64 << 32))
    })
}
