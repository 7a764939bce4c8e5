use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::schema::{validate_number, Color, Region, Vec2};

pub const DEFAULT_PLACEHOLDER: &str = "/assets/logo/nys1.png";
pub const DEFAULT_FONT_FAMILY: &str = "Arial";
pub const DEFAULT_FABRIC: &str = "polyster";
pub const PLAIN_FABRIC: &str = "default";
pub const DEFAULT_MESH_PATH: &str = "/models/polo-shirt.glb";

const DEFAULT_PATTERNS: [&str; 12] = [
    "/textures/design/texture1.jpg",
    "/textures/design/texture2.png",
    "/textures/design/texture3.jpg",
    "/textures/design/texture4.png",
    "/textures/design/texture5.jpg",
    "/textures/design/texture6.png",
    "/textures/design/texture7.jpg",
    "/textures/design/texture8.png",
    "/textures/design/texture9.png",
    "/textures/design/texture10.png",
    "/textures/design/texture11.png",
    "/textures/design/texture12.png",
];

const DEFAULT_FONT_FAMILIES: [&str; 16] = [
    "Oswald",
    "Oswald-Bold",
    "KellySlab",
    "Monoton",
    "ChakraPetch",
    "RubikMoonrocks",
    "DancingScript",
    "OleoScript",
    "Pacifico",
    "Montserrat",
    "Jaro",
    "Roboto",
    "Poppins",
    "Danfo",
    "OpenSans",
    "PoetsenOne",
];

const DEFAULT_PALETTE: [(&str, Color); 16] = [
    ("White", Color::WHITE),
    ("Black", Color::BLACK),
    ("Red", Color::rgb(0xD0, 0x10, 0x2C)),
    ("Maroon", Color::rgb(0x6E, 0x0F, 0x1E)),
    ("Orange", Color::rgb(0xF3, 0x6C, 0x21)),
    ("Gold", Color::rgb(0xF2, 0xA9, 0x00)),
    ("Yellow", Color::rgb(0xFF, 0xD1, 0x00)),
    ("Green", Color::rgb(0x00, 0x84, 0x3D)),
    ("Forest", Color::rgb(0x1F, 0x4D, 0x2B)),
    ("Sky", Color::rgb(0x6C, 0xAC, 0xE4)),
    ("Royal", Color::rgb(0x1D, 0x42, 0x8A)),
    ("Navy", Color::rgb(0x0C, 0x23, 0x40)),
    ("Purple", Color::rgb(0x4B, 0x2E, 0x83)),
    ("Pink", Color::rgb(0xE8, 0x7A, 0xA4)),
    ("Grey", Color::rgb(0x8A, 0x8D, 0x8F)),
    ("Silver", Color::rgb(0xC0, 0xC0, 0xC0)),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaletteEntry {
    pub name: String,
    pub color: Color,
}

/// Ordered named colors offered by every color control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Palette(Vec<PaletteEntry>);

impl Palette {
    pub fn new(entries: Vec<PaletteEntry>) -> Self {
        Self(entries)
    }

    pub fn get(&self, name: &str) -> Option<Color> {
        self.0
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.color)
    }

    /// Palette "White", or pure white when a custom palette omits it.
    pub fn white(&self) -> Color {
        self.get("White").unwrap_or(Color::WHITE)
    }

    pub fn black(&self) -> Color {
        self.get("Black").unwrap_or(Color::BLACK)
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self(
            DEFAULT_PALETTE
                .iter()
                .map(|(name, color)| PaletteEntry {
                    name: (*name).to_owned(),
                    color: *color,
                })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FontConfig {
    pub families: Vec<String>,
    pub default_family: String,
    pub faces: BTreeMap<String, PathBuf>,
    pub fallback: Option<String>,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            families: DEFAULT_FONT_FAMILIES
                .iter()
                .map(|family| (*family).to_owned())
                .collect(),
            default_family: DEFAULT_FONT_FAMILY.to_owned(),
            faces: BTreeMap::new(),
            fallback: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FabricSpec {
    pub name: String,
    #[serde(default)]
    pub normal_map: Option<String>,
    #[serde(default)]
    pub roughness_map: Option<String>,
    #[serde(default)]
    pub ao_map: Option<String>,
    #[serde(default = "default_fabric_repeat")]
    pub repeat: Vec2,
    #[serde(default = "default_normal_scale")]
    pub normal_scale: Vec2,
    #[serde(default)]
    pub metalness: Option<f32>,
    #[serde(default)]
    pub roughness: Option<f32>,
}

impl FabricSpec {
    pub fn has_maps(&self) -> bool {
        self.normal_map.is_some() || self.roughness_map.is_some() || self.ao_map.is_some()
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("fabric name cannot be empty");
        }
        let label = |field: &str| format!("fabric '{}' {field}", self.name);
        validate_number(&label("repeat.x"), self.repeat.x)?;
        validate_number(&label("repeat.y"), self.repeat.y)?;
        validate_number(&label("normal_scale.x"), self.normal_scale.x)?;
        validate_number(&label("normal_scale.y"), self.normal_scale.y)?;
        if let Some(metalness) = self.metalness {
            validate_number(&label("metalness"), metalness)?;
        }
        if let Some(roughness) = self.roughness {
            validate_number(&label("roughness"), roughness)?;
        }
        Ok(())
    }
}

fn default_fabric_repeat() -> Vec2 {
    Vec2::splat(3.0)
}

fn default_normal_scale() -> Vec2 {
    Vec2::splat(0.5)
}

fn default_fabrics() -> Vec<FabricSpec> {
    vec![
        FabricSpec {
            name: DEFAULT_FABRIC.to_owned(),
            normal_map: Some("/textures/polyster/Fabric_polyester_001_normal.jpg".to_owned()),
            roughness_map: Some(
                "/textures/polyster/Fabric_polyester_001_roughness.jpg".to_owned(),
            ),
            ao_map: Some(
                "/textures/polyster/Fabric_polyester_001_ambientOcclusion.jpg".to_owned(),
            ),
            repeat: default_fabric_repeat(),
            normal_scale: default_normal_scale(),
            metalness: Some(0.1),
            roughness: Some(0.6),
        },
        FabricSpec {
            name: PLAIN_FABRIC.to_owned(),
            normal_map: None,
            roughness_map: None,
            ao_map: None,
            repeat: default_fabric_repeat(),
            normal_scale: default_normal_scale(),
            metalness: None,
            roughness: None,
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeshConfig {
    pub path: String,
    pub base_material: String,
    pub button_material: String,
    pub nodes: BTreeMap<Region, String>,
}

impl Default for MeshConfig {
    fn default() -> Self {
        let nodes = [
            (Region::Front, "front"),
            (Region::Back, "back"),
            (Region::Shell, "default004"),
            (Region::Collar, "collar"),
            (Region::CollarBack, "collar_back"),
            (Region::CollarThread, "collar_button_thread"),
            (Region::LeftSleeve, "left_sleeve"),
            (Region::LeftSleeveStripe, "left_sleeve_stripe"),
            (Region::RightSleeve, "right_sleeve"),
            (Region::RightSleeveStripe, "right_sleeve_stripe"),
            (Region::Button, "default004_1"),
        ]
        .into_iter()
        .map(|(region, node)| (region, node.to_owned()))
        .collect();

        Self {
            path: DEFAULT_MESH_PATH.to_owned(),
            base_material: "Polo Shirt".to_owned(),
            button_material: "Button".to_owned(),
            nodes,
        }
    }
}

/// Immutable configuration injected into the schema builder, the resolver and
/// the composer at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Catalog {
    pub palette: Palette,
    pub patterns: Vec<String>,
    pub fonts: FontConfig,
    pub placeholder: String,
    pub fabrics: Vec<FabricSpec>,
    pub mesh: MeshConfig,
    pub asset_root: PathBuf,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            palette: Palette::default(),
            patterns: DEFAULT_PATTERNS
                .iter()
                .map(|path| (*path).to_owned())
                .collect(),
            fonts: FontConfig::default(),
            placeholder: DEFAULT_PLACEHOLDER.to_owned(),
            fabrics: default_fabrics(),
            mesh: MeshConfig::default(),
            asset_root: PathBuf::from("."),
        }
    }
}

impl Catalog {
    pub fn fabric(&self, name: &str) -> Option<&FabricSpec> {
        self.fabrics.iter().find(|fabric| fabric.name == name)
    }

    pub fn fabric_names(&self) -> Vec<String> {
        self.fabrics.iter().map(|fabric| fabric.name.clone()).collect()
    }

    /// Paths beginning with '/' are rooted at `asset_root`, mirroring how the
    /// web build served them from its public directory.
    pub fn resolve_asset_path(&self, raw: &str) -> PathBuf {
        let trimmed = raw.trim();
        match trimmed.strip_prefix('/') {
            Some(relative) => self.asset_root.join(relative),
            None => {
                let path = Path::new(trimmed);
                if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    self.asset_root.join(path)
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.palette.is_empty() {
            bail!("palette must define at least one color");
        }
        let mut seen = HashSet::with_capacity(self.palette.len());
        for entry in self.palette.entries() {
            if entry.name.trim().is_empty() {
                bail!("palette entry names cannot be empty");
            }
            if !seen.insert(entry.name.as_str()) {
                bail!("duplicate palette color '{}'", entry.name);
            }
        }

        for pattern in &self.patterns {
            if pattern.trim().is_empty() {
                bail!("pattern gallery paths cannot be empty");
            }
        }

        if self.placeholder.trim().is_empty() {
            bail!("placeholder image path cannot be empty");
        }

        if self.fonts.default_family.trim().is_empty() {
            bail!("fonts.default_family cannot be empty");
        }
        if let Some(fallback) = &self.fonts.fallback {
            if !self.fonts.faces.contains_key(fallback) {
                bail!(
                    "fonts.fallback '{}' has no entry in fonts.faces (known: {})",
                    fallback,
                    self.fonts
                        .faces
                        .keys()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
        }

        let mut seen_fabrics = HashSet::with_capacity(self.fabrics.len());
        for fabric in &self.fabrics {
            fabric.validate()?;
            if !seen_fabrics.insert(fabric.name.as_str()) {
                bail!("duplicate fabric '{}'", fabric.name);
            }
        }
        if self.fabric(DEFAULT_FABRIC).is_none() {
            bail!("fabrics must include '{DEFAULT_FABRIC}'");
        }

        if self.mesh.base_material.trim().is_empty() {
            bail!("mesh.base_material cannot be empty");
        }

        Ok(())
    }
}

pub fn load_and_validate_config(path: &Path) -> Result<Catalog> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let mut catalog: Catalog = serde_yaml::from_str(&contents).map_err(|error| {
        let location = error
            .location()
            .map(|location| format!("line {}, column {}", location.line(), location.column()))
            .unwrap_or_else(|| "unknown location".to_owned());
        anyhow!(
            "failed to parse yaml in {} at {}: {}",
            path.display(),
            location,
            error
        )
    })?;

    let config_dir = path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    if catalog.asset_root.is_relative() {
        catalog.asset_root = config_dir.join(&catalog.asset_root);
    }
    for face in catalog.fonts.faces.values_mut() {
        if face.is_relative() {
            *face = config_dir.join(&*face);
        }
    }

    catalog
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(catalog)
}
