//! GPU texture cache for reference imagery.
//!
//! Owns a bounded set of textures decoded from the pack's artifact images
//! plus the pack's color palette. Eviction is whole-cache clear only: packs
//! are swapped as a unit.

use std::path::Path;

use crate::pack::{ColorPalette, PackManifest};

/// One resident reference texture, keyed by source-media identity.
pub struct GpuTexture {
    pub key: String,
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

pub struct TextureCache {
    textures: Vec<GpuTexture>,
    palette: ColorPalette,
    limit: usize,
}

impl TextureCache {
    pub fn new(limit: usize) -> Self {
        Self {
            textures: Vec::new(),
            palette: ColorPalette::default(),
            limit,
        }
    }

    /// Number of resident textures.
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn palette(&self) -> ColorPalette {
        self.palette
    }

    /// Release all textures and the palette atomically.
    pub fn clear(&mut self) {
        self.textures.clear();
        self.palette = ColorPalette::default();
    }

    /// Load a pack directory: palette from the manifest, then up to the cache
    /// bound of artifact images. Per-item failures are skipped; a pack that
    /// yields zero textures still leaves the cache in a renderable state.
    pub fn load_pack(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pack_dir: &Path,
    ) {
        self.clear();

        let manifest = PackManifest::load(pack_dir);
        self.palette = manifest.palette();

        for path in manifest.texture_paths(pack_dir) {
            if self.textures.len() >= self.limit {
                break;
            }
            let key = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match load_image_texture(device, queue, &path, &key) {
                Ok(tex) => self.textures.push(tex),
                Err(e) => eprintln!("[pack] skipping {}: {e}", path.display()),
            }
        }

        println!(
            "[pack] loaded {} texture(s), palette of {} color(s)",
            self.textures.len(),
            self.palette.count
        );
    }

    /// Deterministically select up to `count` texture views using the seeded
    /// LCG. Same seed, same order, every time.
    pub fn select(&self, seed: u32, count: usize) -> Vec<&wgpu::TextureView> {
        select_indices(seed, count, self.textures.len())
            .into_iter()
            .map(|i| &self.textures[i].view)
            .collect()
    }
}

/// Seeded linear congruential selection: `state = state*1103515245 + 12345`,
/// `index = (state >> 16) mod item_count`. Reproducible across runs so a
/// performer can return to a known visual state by reusing a seed.
pub fn select_indices(seed: u32, count: usize, item_count: usize) -> Vec<usize> {
    if item_count == 0 {
        return Vec::new();
    }
    let mut state = seed;
    (0..count)
        .map(|_| {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            ((state >> 16) as usize) % item_count
        })
        .collect()
}

fn load_image_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    path: &Path,
    key: &str,
) -> Result<GpuTexture, String> {
    let img = image::open(path)
        .map_err(|e| e.to_string())?
        .to_rgba8();
    let (width, height) = img.dimensions();

    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(key),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &img,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok(GpuTexture {
        key: key.to_string(),
        texture,
        view,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_is_deterministic() {
        let a = select_indices(42, 4, 16);
        let b = select_indices(42, 4, 16);
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
        assert!(a.iter().all(|&i| i < 16));
    }

    #[test]
    fn test_selection_differs_across_seeds() {
        // Not guaranteed in general, but these two seeds diverge immediately
        let a = select_indices(1, 8, 16);
        let b = select_indices(2, 8, 16);
        assert_ne!(a, b);
    }

    #[test]
    fn test_selection_known_sequence() {
        // First step from seed 42: state = 42*1103515245 + 12345
        let state = 42u32.wrapping_mul(1103515245).wrapping_add(12345);
        let expected = ((state >> 16) as usize) % 10;
        assert_eq!(select_indices(42, 1, 10), vec![expected]);
    }

    #[test]
    fn test_selection_handles_empty_and_small_sets() {
        assert!(select_indices(7, 4, 0).is_empty());
        // Small sets repeat items rather than shortening the sequence
        let picks = select_indices(7, 10, 3);
        assert_eq!(picks.len(), 10);
        assert!(picks.iter().all(|&i| i < 3));
    }
}
