use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::lazy::Lazy;
use crate::loader::{DecodedImage, MediaPool};
use crate::ui::render::{SharedTextures, TextureId};

/// One image at one requested pixel size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub image: usize,
    pub width: u32,
    pub height: u32,
}

impl CacheKey {
    pub fn new(image: usize, (width, height): (u32, u32)) -> Self {
        Self { image, width, height }
    }
}

struct Entry {
    texture: Lazy<DecodedImage, TextureId>,
    used: bool,
}

/// Textures of the images on screen (and the preloaded neighbours), evicted
/// by a mark and sweep once per frame.
pub struct MediaCache {
    entries: HashMap<CacheKey, Entry>,
    textures: SharedTextures,
    placeholder: TextureId,
}

impl MediaCache {
    pub fn new(textures: SharedTextures) -> Self {
        let placeholder = textures.lock().unwrap().create(1, 1, vec![255, 255, 255, 255]);
        Self {
            entries: HashMap::new(),
            textures,
            placeholder,
        }
    }

    pub fn placeholder(&self) -> TextureId {
        self.placeholder
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entry for `key`, submitting a decode the first time it is asked for.
    /// The decoded pixels are uploaded when the entry is first read.
    pub fn get_or_fetch(
        &mut self,
        pool: &MediaPool,
        key: CacheKey,
        path: &Path,
    ) -> &mut Lazy<DecodedImage, TextureId> {
        let textures = &self.textures;
        let entry = self.entries.entry(key).or_insert_with(|| {
            let textures = Arc::clone(textures);
            // size and type also arrive through the library's own probe
            let (texture, _, _) =
                pool.submit_decode(path, (key.width, key.height), move |decoded| {
                    log::debug!(
                        "Uploading {}x{} texture ({} KB)",
                        decoded.width,
                        decoded.height,
                        decoded.mem_size() / 1024
                    );
                    textures
                        .lock()
                        .unwrap()
                        .create(decoded.width, decoded.height, decoded.rgba_bytes)
                });
            Entry { texture, used: false }
        });
        entry.used = true;
        &mut entry.texture
    }

    /// Texture to draw for `key` this frame. While it is not ready, a ready
    /// texture of the same image at another size stands in, else the
    /// placeholder.
    pub fn get(&mut self, pool: &MediaPool, key: CacheKey, path: &Path) -> TextureId {
        let texture = self.get_or_fetch(pool, key, path);
        if texture.ready() {
            if let Ok(&id) = texture.get() {
                return id;
            }
        }

        for (other, entry) in self.entries.iter_mut() {
            if other.image != key.image || *other == key || !entry.texture.ready() {
                continue;
            }
            if let Ok(&id) = entry.texture.get() {
                entry.used = true;
                return id;
            }
        }
        self.placeholder
    }

    /// Evicts every entry not requested since the previous sweep and resets
    /// the marks. Returns how many entries were evicted.
    pub fn sweep(&mut self) -> usize {
        let mut store = self.textures.lock().unwrap();
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            if entry.used {
                entry.used = false;
                return true;
            }
            if let Some(id) = entry.texture.take() {
                store.destroy(id);
            }
            false
        });
        let evicted = before - self.entries.len();
        if evicted > 0 {
            log::debug!("Evicted {} textures, {} cached", evicted, self.entries.len());
        }
        evicted
    }

    /// Releases every cached texture. The placeholder stays.
    pub fn clear(&mut self) {
        let mut store = self.textures.lock().unwrap();
        for (_, mut entry) in self.entries.drain() {
            if let Some(id) = entry.texture.take() {
                store.destroy(id);
            }
        }
    }
}

impl Drop for MediaCache {
    fn drop(&mut self) {
        self.clear();
        self.textures.lock().unwrap().destroy(self.placeholder);
    }
}
