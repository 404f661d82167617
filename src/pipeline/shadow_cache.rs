//! Shadow volume cache
//!
//! Volumes are keyed by (sub-mesh renderer, light). A pair is rebuilt every frame when
//! either side is dynamic and built once otherwise. The cache owns the backend geometry
//! buffers it creates; call [`ShadowVolumeCache::clear`] before dropping it.

use glam::Vec3;
use rustc_hash::FxHashMap;

use crate::backend::{BackendError, BufferHandle, RenderBackend};
use crate::scene::ObjectId;

/// Cache key: one volume per caster sub-mesh and light
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShadowVolumeKey {
    pub renderer: ObjectId,
    pub light: ObjectId,
}

impl ShadowVolumeKey {
    pub fn new(renderer: ObjectId, light: ObjectId) -> Self {
        Self { renderer, light }
    }
}

/// Extruded volume uploaded to the backend
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowVolume {
    pub buffer: BufferHandle,
    /// Triangle list, three positions per triangle, in the caster's local space
    pub positions: Vec<Vec3>,
    /// Bumped every time the volume is rebuilt
    pub generation: u64,
}

impl ShadowVolume {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// Outcome of [`ShadowVolumeCache::refresh`]
#[derive(Debug, Clone, PartialEq)]
pub enum CacheRefresh {
    /// Static pair already cached, nothing built
    Reused,
    /// Volume rebuilt. `reused_buffer` is set when the old buffer had the right size.
    Rebuilt { reused_buffer: bool },
    /// The mesh casts no volume from this light; any cached one was dropped
    Empty,
    /// The backend could not allocate a buffer; the pair has no volume this frame
    Failed(BackendError),
}

#[derive(Debug, Default)]
pub struct ShadowVolumeCache {
    volumes: FxHashMap<ShadowVolumeKey, ShadowVolume>,
    next_generation: u64,
}

impl ShadowVolumeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ShadowVolumeKey) -> Option<&ShadowVolume> {
        self.volumes.get(key)
    }

    /// Positions of a cached volume
    pub fn positions(&self, key: &ShadowVolumeKey) -> Option<&[Vec3]> {
        self.volumes.get(key).map(|v| v.positions.as_slice())
    }

    pub fn contains(&self, key: &ShadowVolumeKey) -> bool {
        self.volumes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Make sure the volume for `key` is current.
    ///
    /// Static pairs (`dynamic == false`) are only built when missing. Dynamic pairs are
    /// rebuilt on every call. `build` runs only when a rebuild happens.
    pub fn refresh<B, F>(
        &mut self,
        backend: &mut B,
        key: ShadowVolumeKey,
        dynamic: bool,
        build: F,
    ) -> CacheRefresh
    where
        B: RenderBackend + ?Sized,
        F: FnOnce() -> Vec<Vec3>,
    {
        if !dynamic && self.volumes.contains_key(&key) {
            return CacheRefresh::Reused;
        }

        let positions = build();
        if positions.is_empty() {
            self.remove(backend, &key);
            return CacheRefresh::Empty;
        }

        self.next_generation += 1;
        let generation = self.next_generation;

        if let Some(volume) = self.volumes.get_mut(&key) {
            if volume.positions.len() == positions.len() {
                backend.write_geometry_buffer(volume.buffer, &positions);
                volume.positions = positions;
                volume.generation = generation;
                return CacheRefresh::Rebuilt {
                    reused_buffer: true,
                };
            }
        }

        let buffer = match backend.create_geometry_buffer(positions.len()) {
            Ok(buffer) => buffer,
            Err(err) => {
                log::error!("Failed to allocate shadow volume for {:?}: {}", key, err);
                self.remove(backend, &key);
                return CacheRefresh::Failed(err);
            }
        };
        backend.write_geometry_buffer(buffer, &positions);

        let volume = ShadowVolume {
            buffer,
            positions,
            generation,
        };
        if let Some(old) = self.volumes.insert(key, volume) {
            backend.destroy_geometry_buffer(old.buffer);
        }
        CacheRefresh::Rebuilt {
            reused_buffer: false,
        }
    }

    /// Drop one volume and free its buffer
    pub fn remove<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, key: &ShadowVolumeKey) {
        if let Some(volume) = self.volumes.remove(key) {
            backend.destroy_geometry_buffer(volume.buffer);
        }
    }

    /// Drop every volume and free all buffers
    pub fn clear<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        for (_, volume) in self.volumes.drain() {
            backend.destroy_geometry_buffer(volume.buffer);
        }
    }
}
