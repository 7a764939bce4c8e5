//! Per-region render state: the zone material plus an ordered decal stack.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::branding::{BrandingGroup, BrandingSlot, BrandingSlotKind};
use crate::config::Catalog;
use crate::layers::{LayerKind, LayerStore, LayerStores};
use crate::materials::{Material, MaterialSet};
use crate::mesh::GeometryHandle;
use crate::resources::{apply_tiling, TextureBinding};
use crate::schema::{Color, ColorTarget, Region, RegionGroup, Vec2, Vec3};
use crate::text::{TextRasterizer, TextStyle, TextTextureCache};

/// Everything a region's render state can depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Input {
    BaseColor(ColorTarget),
    Fabric,
    Layer(LayerKind),
    Branding(RegionGroup),
}

/// Declared inputs of a region. The button keeps the mesh's own material and
/// depends on nothing.
pub fn region_inputs(region: Region) -> Vec<Input> {
    let Some(zone) = region.zone() else {
        return Vec::new();
    };
    let mut inputs = vec![
        Input::BaseColor(zone.color_target()),
        Input::Fabric,
        Input::Layer(LayerKind::Gradient),
        Input::Layer(LayerKind::Pattern),
        Input::Layer(LayerKind::Object),
    ];
    if let Some(group) = region.branding_group() {
        inputs.push(Input::Branding(group));
    }
    inputs
}

/// Regions whose declared inputs include `input`.
pub fn regions_depending_on(input: Input) -> impl Iterator<Item = Region> {
    Region::ALL
        .into_iter()
        .filter(move |region| region_inputs(*region).contains(&input))
}

/// Decal evaluation order, first to last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecalLayer {
    Pattern,
    Object,
    Sponsor,
    Logo,
    Name,
    Number,
}

impl From<BrandingSlotKind> for DecalLayer {
    fn from(kind: BrandingSlotKind) -> Self {
        match kind {
            BrandingSlotKind::Logo => Self::Logo,
            BrandingSlotKind::Sponsor => Self::Sponsor,
            BrandingSlotKind::Name => Self::Name,
            BrandingSlotKind::Number => Self::Number,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decal {
    pub layer: DecalLayer,
    pub texture: TextureBinding,
    pub position: Vec3,
    /// Radians.
    pub rotation: Vec3,
    pub scale: Vec3,
    pub tint: Option<Color>,
    pub order: u32,
}

impl Decal {
    fn placed(
        layer: DecalLayer,
        texture: TextureBinding,
        position: Vec2,
        rotation_degrees: Vec3,
        scale: f32,
        tint: Option<Color>,
    ) -> Self {
        Self {
            layer,
            texture,
            position: Vec3::new(position.x, position.y, 0.0),
            rotation: rotation_degrees.to_radians(),
            scale: Vec3::new(scale, scale, 1.0),
            tint,
            order: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegionRenderState {
    pub region: Region,
    pub geometry: GeometryHandle,
    pub material: Material,
    pub decals: Vec<Decal>,
}

impl RegionRenderState {
    pub fn decal(&self, layer: DecalLayer) -> Option<&Decal> {
        self.decals.iter().find(|decal| decal.layer == layer)
    }

    pub fn summary(&self) -> RegionSummary {
        RegionSummary {
            region: self.region,
            geometry: self.geometry,
            material_id: self.material.id,
            material_name: self.material.name.clone(),
            generation: self.material.generation,
            color: self.material.color,
            map: self.material.map.as_ref().map(|binding| binding.texture.source.clone()),
            detail_maps: self.material.has_detail_maps(),
            decals: self
                .decals
                .iter()
                .map(|decal| DecalSummary {
                    layer: decal.layer,
                    source: decal.texture.texture.source.clone(),
                    digest: decal.texture.texture.bitmap.digest(),
                    position: decal.position,
                    rotation: decal.rotation,
                    scale: decal.scale,
                    tint: decal.tint,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionSummary {
    pub region: Region,
    pub geometry: GeometryHandle,
    pub material_id: u64,
    pub material_name: String,
    pub generation: u64,
    pub color: Color,
    pub map: Option<String>,
    pub detail_maps: bool,
    pub decals: Vec<DecalSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecalSummary {
    pub layer: DecalLayer,
    pub source: String,
    pub digest: String,
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
    pub tint: Option<Color>,
}

/// Borrowed view of the session state the composer reads.
pub struct ComposeInputs<'a> {
    pub layers: &'a LayerStores,
    pub branding: &'a BTreeMap<RegionGroup, BrandingGroup>,
    pub materials: &'a MaterialSet,
    pub button_material: Option<&'a Material>,
    pub geometry: &'a BTreeMap<Region, GeometryHandle>,
}

pub struct Composer {
    catalog: Arc<Catalog>,
    rasterizer: TextRasterizer,
    text_cache: TextTextureCache<(RegionGroup, BrandingSlotKind)>,
    scene: BTreeMap<Region, RegionRenderState>,
}

impl Composer {
    pub fn new(catalog: Arc<Catalog>, rasterizer: TextRasterizer) -> Self {
        Self {
            catalog,
            rasterizer,
            text_cache: TextTextureCache::new(),
            scene: BTreeMap::new(),
        }
    }

    pub fn scene(&self) -> &BTreeMap<Region, RegionRenderState> {
        &self.scene
    }

    pub fn text_rasterizations(&self) -> u64 {
        self.text_cache.rasterizations()
    }

    /// Rebuilds the render state of `regions` only. Returns how many were
    /// rebuilt.
    pub fn recompose(&mut self, regions: &BTreeSet<Region>, inputs: &ComposeInputs<'_>) -> usize {
        let mut rebuilt = 0;
        for region in regions {
            let Some(geometry) = inputs.geometry.get(region).copied() else {
                continue;
            };
            let material = match region.zone() {
                Some(zone) => inputs.materials.zone(zone).cloned(),
                None => inputs.button_material.cloned(),
            };
            let Some(material) = material else {
                self.scene.remove(region);
                continue;
            };
            let decals = self.decals_for(*region, inputs);
            self.scene.insert(
                *region,
                RegionRenderState {
                    region: *region,
                    geometry,
                    material,
                    decals,
                },
            );
            rebuilt += 1;
        }
        debug!(rebuilt, "recomposed regions");
        rebuilt
    }

    fn decals_for(&mut self, region: Region, inputs: &ComposeInputs<'_>) -> Vec<Decal> {
        let mut decals = Vec::new();
        if region.zone().is_none() {
            return decals;
        }

        let pattern = inputs.layers.get(LayerKind::Pattern);
        if let Some(decal) = layer_decal(pattern, region, DecalLayer::Pattern) {
            decals.push(decal);
        }
        let object = inputs.layers.get(LayerKind::Object);
        if let Some(decal) = layer_decal(object, region, DecalLayer::Object) {
            decals.push(decal);
        }

        if let Some(group) = region
            .branding_group()
            .and_then(|group| inputs.branding.get(&group))
        {
            for kind in [
                BrandingSlotKind::Sponsor,
                BrandingSlotKind::Logo,
                BrandingSlotKind::Name,
                BrandingSlotKind::Number,
            ] {
                let Some(slot) = group.slot(kind) else {
                    continue;
                };
                if let Some(decal) = self.branding_decal(group.group(), slot) {
                    decals.push(decal);
                }
            }
        }

        for (order, decal) in decals.iter_mut().enumerate() {
            decal.order = order as u32;
        }
        decals
    }

    fn branding_decal(&mut self, group: RegionGroup, slot: &BrandingSlot) -> Option<Decal> {
        if !slot.visible {
            return None;
        }
        let placement = slot.placement;
        let (texture, tint) = match &slot.text {
            Some(text) => {
                let style = TextStyle {
                    text: text.text.clone(),
                    color: slot.color,
                    font_size: text.font_size,
                    font_family: text.font_family.clone(),
                    stroke_color: text.stroke_color,
                    stroke_width: if text.stroke_visible {
                        text.stroke_width
                    } else {
                        0
                    },
                };
                match self
                    .text_cache
                    .get_or_rasterize((group, slot.kind), &style, &self.rasterizer)
                {
                    Ok(handle) => (TextureBinding::plain(handle), None),
                    Err(error) => {
                        warn!(?group, slot = %slot.kind, "text texture unavailable: {error:#}");
                        return None;
                    }
                }
            }
            None => {
                let handle = slot.resource.as_ref()?;
                if handle.source != slot.image_path(&self.catalog.placeholder) {
                    debug!(?group, slot = %slot.kind, "showing previous image until the new one loads");
                }
                (TextureBinding::plain(Arc::clone(handle)), Some(slot.color))
            }
        };
        Some(Decal::placed(
            slot.kind.into(),
            texture,
            placement.position,
            placement.rotation,
            placement.scale,
            tint,
        ))
    }
}

fn layer_decal(store: &LayerStore, region: Region, layer: DecalLayer) -> Option<Decal> {
    let state = store.read();
    // The object decal only exists on the front; its Back toggle is inert.
    if layer == DecalLayer::Object && region != Region::Front {
        return None;
    }
    if !state.regions.covers(region) {
        return None;
    }
    let handle = state.bound_resource()?;
    let texture = match layer {
        DecalLayer::Pattern => apply_tiling(handle, state.offset, state.repeat),
        _ => TextureBinding::plain(Arc::clone(handle)),
    };
    Some(Decal::placed(
        layer,
        texture,
        Vec2::new(state.position.x, state.position.y),
        state.rotation_degrees,
        state.scale,
        Some(state.color),
    ))
}
