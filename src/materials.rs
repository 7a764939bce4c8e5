use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{Catalog, FabricSpec, PLAIN_FABRIC};
use crate::resources::{AssetSource, ImageLoader, ResourceHandle, Texture, TextureBinding};
use crate::schema::{Color, Vec2, Zone};

static NEXT_MATERIAL_ID: AtomicU64 = AtomicU64::new(1);

fn next_material_id() -> u64 {
    NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed)
}

/// Standard PBR surface. Cloning keeps the identity; [`Material::duplicate`]
/// creates a new one.
#[derive(Debug, Clone)]
pub struct Material {
    pub id: u64,
    pub name: String,
    pub color: Color,
    pub map: Option<TextureBinding>,
    pub normal_map: Option<ResourceHandle>,
    pub roughness_map: Option<ResourceHandle>,
    pub ao_map: Option<ResourceHandle>,
    pub normal_scale: Vec2,
    pub metalness: f32,
    pub roughness: f32,
    pub generation: u64,
    version: u64,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: next_material_id(),
            name: name.into(),
            color: Color::WHITE,
            map: None,
            normal_map: None,
            roughness_map: None,
            ao_map: None,
            normal_scale: Vec2::splat(1.0),
            metalness: 0.0,
            roughness: 1.0,
            generation: 0,
            version: 0,
        }
    }

    pub fn duplicate(&self) -> Self {
        Self {
            id: next_material_id(),
            version: 0,
            ..self.clone()
        }
    }

    pub fn mark_needs_update(&mut self) {
        self.version += 1;
    }

    /// Bumped every time the material must be re-uploaded.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn has_detail_maps(&self) -> bool {
        self.normal_map.is_some() || self.roughness_map.is_some() || self.ao_map.is_some()
    }
}

/// A fabric preset with its detail maps already loaded. Shared read-only.
#[derive(Debug, Clone)]
pub struct FabricProfile {
    pub name: String,
    pub normal_map: Option<ResourceHandle>,
    pub roughness_map: Option<ResourceHandle>,
    pub ao_map: Option<ResourceHandle>,
    pub normal_scale: Vec2,
    pub metalness: Option<f32>,
    pub roughness: Option<f32>,
}

impl FabricProfile {
    pub fn plain() -> Self {
        Self {
            name: PLAIN_FABRIC.to_owned(),
            normal_map: None,
            roughness_map: None,
            ao_map: None,
            normal_scale: Vec2::splat(1.0),
            metalness: None,
            roughness: None,
        }
    }

    /// The plain fabric strips every map instead of assigning them.
    pub fn is_plain(&self) -> bool {
        self.name == PLAIN_FABRIC
    }
}

pub struct FabricLibrary {
    profiles: BTreeMap<String, Arc<FabricProfile>>,
}

impl FabricLibrary {
    /// Loads every fabric's maps once, tiled with the fabric's repeat. A map
    /// that fails to load is logged and left absent.
    pub async fn load(catalog: &Catalog, loader: &dyn ImageLoader) -> Self {
        let mut profiles = BTreeMap::new();
        for spec in &catalog.fabrics {
            let profile = FabricProfile {
                name: spec.name.clone(),
                normal_map: load_map(loader, spec, spec.normal_map.as_deref()).await,
                roughness_map: load_map(loader, spec, spec.roughness_map.as_deref()).await,
                ao_map: load_map(loader, spec, spec.ao_map.as_deref()).await,
                normal_scale: spec.normal_scale,
                metalness: spec.metalness,
                roughness: spec.roughness,
            };
            profiles.insert(spec.name.clone(), Arc::new(profile));
        }
        info!(fabrics = profiles.len(), "fabric library loaded");
        Self { profiles }
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = FabricProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|profile| (profile.name.clone(), Arc::new(profile)))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<FabricProfile>> {
        self.profiles.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

async fn load_map(
    loader: &dyn ImageLoader,
    spec: &FabricSpec,
    path: Option<&str>,
) -> Option<ResourceHandle> {
    let path = path?;
    let source = AssetSource::parse(path)?;
    match loader.load(&source).await {
        Ok(bitmap) => Some(Arc::new(Texture::new(path, bitmap).tiled(spec.repeat))),
        Err(error) => {
            warn!(fabric = %spec.name, "{error}");
            None
        }
    }
}

/// Overwrites the detail maps and scalars of `material` with the fabric's, or
/// clears every map for the plain fabric. The color resets to white.
pub fn apply_fabric_to_material(material: &mut Material, fabric: &FabricProfile) {
    if fabric.is_plain() {
        material.map = None;
        material.normal_map = None;
        material.roughness_map = None;
        material.ao_map = None;
    } else {
        material.normal_map = fabric.normal_map.clone();
        material.roughness_map = fabric.roughness_map.clone();
        material.ao_map = fabric.ao_map.clone();
        material.normal_scale = fabric.normal_scale;
        if let Some(metalness) = fabric.metalness {
            material.metalness = metalness;
        }
        if let Some(roughness) = fabric.roughness {
            material.roughness = roughness;
        }
    }
    material.color = Color::WHITE;
    material.mark_needs_update();
}

pub fn clone_base_material(base: &Material, count: usize) -> Vec<Material> {
    (0..count).map(|_| base.duplicate()).collect()
}

/// One exclusively owned clone per zone, all from the same fabric generation.
#[derive(Debug, Clone)]
pub struct MaterialSet {
    generation: u64,
    zones: BTreeMap<Zone, Material>,
}

impl MaterialSet {
    pub fn from_base(base: &Material, generation: u64) -> Self {
        let zones = Zone::ALL
            .into_iter()
            .zip(clone_base_material(base, Zone::ALL.len()))
            .map(|(zone, mut material)| {
                material.generation = generation;
                (zone, material)
            })
            .collect();
        debug!(generation, "cloned zone materials");
        Self { generation, zones }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn zone(&self, zone: Zone) -> Option<&Material> {
        self.zones.get(&zone)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Zone, &Material)> {
        self.zones.iter().map(|(zone, material)| (*zone, material))
    }

    /// Sets the zone's color and color map. Returns whether anything changed.
    pub fn shade(&mut self, zone: Zone, color: Color, map: Option<TextureBinding>) -> bool {
        let Some(material) = self.zones.get_mut(&zone) else {
            return false;
        };
        if material.color == color && material.map == map {
            return false;
        }
        material.color = color;
        material.map = map;
        material.mark_needs_update();
        true
    }
}
