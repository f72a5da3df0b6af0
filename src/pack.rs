//! Pack artifact consumption.
//!
//! A pack directory holds the performer's reference media plus an
//! `artifacts.json` sidecar written by the offline preprocessing pipeline:
//! extracted color palettes (hex strings), generated textures with a type
//! tag, ghosted images, motion patterns and video-clip metadata. The
//! renderer only consumes the palette and texture images; the remaining
//! categories are accepted but unused.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Maximum colors carried in a palette (fixed by the shader-side block)
pub const PALETTE_SIZE: usize = 6;

/// Sidecar manifest filename inside a pack directory
pub const MANIFEST_FILE: &str = "artifacts.json";

/// Image extensions accepted when scanning a pack directory directly
const MEDIA_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp"];

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PackManifest {
    #[serde(default)]
    pub pack_id: String,
    #[serde(default)]
    pub artifacts: Artifacts,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Artifacts {
    #[serde(default)]
    pub color_palettes: Vec<PaletteEntry>,
    #[serde(default)]
    pub textures: Vec<TextureEntry>,
    #[serde(default)]
    pub ghosted_images: Vec<GhostedEntry>,
    #[serde(default)]
    pub motion_patterns: Vec<MotionEntry>,
    #[serde(default)]
    pub video_clips: Vec<ClipEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaletteEntry {
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextureEntry {
    pub filename: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhostedEntry {
    pub filename: String,
    #[serde(default)]
    pub opacity: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MotionEntry {
    pub filename: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClipEntry {
    pub filename: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub stretched: bool,
}

impl PackManifest {
    /// Load the sidecar manifest from a pack directory. A missing or
    /// unparsable manifest yields an empty manifest, not an error: the pack's
    /// raw media can still be used.
    pub fn load(pack_dir: &Path) -> Self {
        let path = pack_dir.join(MANIFEST_FILE);
        let data = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(_) => {
                println!("[pack] no manifest at {}", path.display());
                return Self::default();
            }
        };
        match serde_json::from_str(&data) {
            Ok(m) => m,
            Err(e) => {
                eprintln!("[pack] failed to parse {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Paths of every loadable texture image the manifest references,
    /// in manifest order: typed textures first, then ghosted images.
    /// A manifest with no texture entries falls back to scanning the pack
    /// directory itself, so a plain folder of images is a usable pack.
    pub fn texture_paths(&self, pack_dir: &Path) -> Vec<PathBuf> {
        let textures_dir = pack_dir.join("textures");
        let listed: Vec<PathBuf> = self
            .artifacts
            .textures
            .iter()
            .map(|t| textures_dir.join(&t.filename))
            .chain(
                self.artifacts
                    .ghosted_images
                    .iter()
                    .map(|g| textures_dir.join(&g.filename)),
            )
            .collect();
        if !listed.is_empty() {
            return listed;
        }
        scan_media_files(pack_dir)
    }

    /// First palette in the manifest, converted to normalized RGBA.
    pub fn palette(&self) -> ColorPalette {
        self.artifacts
            .color_palettes
            .first()
            .map(|p| ColorPalette::from_hex(&p.colors))
            .unwrap_or_default()
    }
}

/// Image files directly inside `dir`, sorted by name so selection seeds map
/// to the same files run after run.
fn scan_media_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| MEDIA_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    paths
}

/// Up to 6 RGBA colors plus a count; read-only for the lifetime of a pack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorPalette {
    pub colors: [[f32; 4]; PALETTE_SIZE],
    pub count: u32,
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self {
            colors: [[0.0; 4]; PALETTE_SIZE],
            count: 0,
        }
    }
}

impl ColorPalette {
    /// Build from hex color strings (first 6, padded to exactly 6 entries).
    /// Malformed entries are skipped.
    pub fn from_hex(hex_colors: &[String]) -> Self {
        let mut palette = Self::default();
        for hex in hex_colors {
            if palette.count as usize >= PALETTE_SIZE {
                break;
            }
            if let Some(rgba) = parse_hex_color(hex) {
                palette.colors[palette.count as usize] = rgba;
                palette.count += 1;
            }
        }
        palette
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Parse `#rrggbb` (leading `#` optional) into normalized RGBA.
fn parse_hex_color(hex: &str) -> Option<[f32; 4]> {
    let hex = hex.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        1.0,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#ff0000"), Some([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(parse_hex_color("00ff00"), Some([0.0, 1.0, 0.0, 1.0]));
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("#zzzzzz"), None);
    }

    #[test]
    fn test_palette_pads_to_six() {
        let hex = vec!["#102030".to_string(), "#405060".to_string()];
        let palette = ColorPalette::from_hex(&hex);

        assert_eq!(palette.count, 2);
        assert!((palette.colors[0][0] - 16.0 / 255.0).abs() < 1e-6);
        // Padded entries stay zeroed
        assert_eq!(palette.colors[2], [0.0; 4]);
        assert_eq!(palette.colors[5], [0.0; 4]);
    }

    #[test]
    fn test_palette_truncates_and_skips_malformed() {
        let hex: Vec<String> = vec![
            "#010101", "bad", "#020202", "#030303", "#040404", "#050505", "#060606", "#070707",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let palette = ColorPalette::from_hex(&hex);
        assert_eq!(palette.count, PALETTE_SIZE as u32);
        // "bad" was skipped, so the sixth kept color is #060606
        assert!((palette.colors[5][0] - 6.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_manifest_parses_preprocessing_output() {
        let json = r##"{
            "pack_id": "abc",
            "artifacts": {
                "color_palettes": [{"id": "p", "colors": ["#aabbcc"], "source": "a.jpg"}],
                "textures": [
                    {"id": "t", "filename": "texture_000_edges.png", "source": "a.jpg", "type": "edge_map"}
                ],
                "ghosted_images": [{"id": "g", "filename": "ghost_001_desat.png", "opacity": 0.3}],
                "video_clips": [{"id": "c", "filename": "b.mp4", "duration": 4.2, "stretched": false}]
            }
        }"##;

        let manifest: PackManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.artifacts.textures.len(), 1);
        assert_eq!(manifest.artifacts.textures[0].kind, "edge_map");
        assert_eq!(manifest.palette().count, 1);

        let paths = manifest.texture_paths(Path::new("/pack"));
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("textures/texture_000_edges.png"));
    }

    #[test]
    fn test_empty_manifest_is_usable() {
        let manifest = PackManifest::default();
        assert!(manifest.palette().is_empty());
        // Nonexistent directory: nothing listed, nothing scanned
        assert!(manifest
            .texture_paths(Path::new("/nonexistent-pack"))
            .is_empty());
    }

    #[test]
    fn test_manifest_less_pack_scans_directory() {
        let dir = std::env::temp_dir().join("motionweave_pack_scan_test");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a.png"), b"x").unwrap();
        std::fs::write(dir.join("b.JPG"), b"x").unwrap();
        std::fs::write(dir.join("notes.txt"), b"x").unwrap();

        // No artifacts.json: the pack's own media files become the sources
        let manifest = PackManifest::load(&dir);
        let paths = manifest.texture_paths(&dir);
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("a.png"));
        assert!(paths[1].ends_with("b.JPG"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
