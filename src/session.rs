//! One customization session: panel state, layer stores, branding slots, zone
//! materials and the composed scene, all updated from a single logical thread.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::branding::{BrandingField, BrandingGroup, BrandingSlotKind, SlotChange};
use crate::compose::{regions_depending_on, ComposeInputs, Composer, Input, RegionRenderState};
use crate::config::{Catalog, DEFAULT_FABRIC};
use crate::controls::{Binding, ControlGroup, ControlValue};
use crate::layers::{Dispatch, LayerField, LayerKind, LayerState, LayerStores};
use crate::materials::{
    apply_fabric_to_material, FabricLibrary, FabricProfile, Material, MaterialSet,
};
use crate::mesh::{bind_regions, GeometryHandle, MeshAsset};
use crate::panels::{build_panel, Panel};
use crate::resources::{
    apply_tiling, Completion, ImageLoader, LoadRequest, RequestKind, ResolveTarget, Resolver,
    TextureBinding,
};
use crate::schema::{Color, ColorTarget, Region, RegionGroup, Zone};
use crate::text::{GlyphSource, TextRasterizer};

/// How a layer treats a resolution that completes after a newer `Load`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvePolicy {
    /// Every successful completion is installed, so a slow stale load can
    /// replace a newer result.
    #[default]
    LastCompletionWins,
    /// Only the completion of the most recent `Load` is installed.
    LatestDispatchWins,
}

/// Work done by one [`Configurator::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameUpdate {
    pub completions: usize,
    pub fabric_rebuilt: bool,
    pub reshaded: usize,
    pub recomposed: usize,
}

#[derive(Debug, Default)]
struct Dirty {
    fabric: bool,
    zones: BTreeSet<Zone>,
    regions: BTreeSet<Region>,
}

pub struct Configurator {
    catalog: Arc<Catalog>,
    panels: BTreeMap<Panel, ControlGroup>,
    layers: LayerStores,
    branding: BTreeMap<RegionGroup, BrandingGroup>,
    base_colors: BTreeMap<ColorTarget, Color>,
    fabric: String,
    fabrics: FabricLibrary,
    base_material: Material,
    button_material: Option<Material>,
    geometry: BTreeMap<Region, GeometryHandle>,
    materials: MaterialSet,
    generation: u64,
    resolver: Resolver,
    composer: Composer,
    policy: ResolvePolicy,
    dirty: Dirty,
}

impl Configurator {
    /// Builds a session and mounts every panel. Must be called inside a tokio
    /// runtime; branding images start loading immediately.
    pub fn new(
        catalog: Arc<Catalog>,
        mesh: &MeshAsset,
        fabrics: FabricLibrary,
        loader: Arc<dyn ImageLoader>,
        glyphs: Box<dyn GlyphSource>,
    ) -> Result<Self> {
        let bindings = bind_regions(mesh, &catalog.mesh)?;
        let resolver = Resolver::new(loader)?;
        let composer = Composer::new(Arc::clone(&catalog), TextRasterizer::new(glyphs));

        let panels: BTreeMap<Panel, ControlGroup> = Panel::ALL
            .into_iter()
            .map(|panel| (panel, build_panel(panel, &catalog)))
            .collect();
        let branding = RegionGroup::ALL
            .into_iter()
            .filter_map(|group| {
                let panel = branding_panel(group);
                panels
                    .get(&panel)
                    .map(|controls| (group, BrandingGroup::from_controls(group, controls)))
            })
            .collect();
        let base_colors = ColorTarget::ALL
            .into_iter()
            .map(|target| (target, catalog.palette.white()))
            .collect();
        let materials = MaterialSet::from_base(&bindings.base_material, 0);

        let mut session = Self {
            catalog,
            panels,
            layers: LayerStores::new(),
            branding,
            base_colors,
            fabric: DEFAULT_FABRIC.to_owned(),
            fabrics,
            base_material: bindings.base_material,
            button_material: bindings.button_material,
            geometry: bindings.geometry,
            materials,
            generation: 0,
            resolver,
            composer,
            policy: ResolvePolicy::default(),
            dirty: Dirty {
                fabric: true,
                ..Dirty::default()
            },
        };
        session.mount();
        Ok(session)
    }

    pub fn with_policy(mut self, policy: ResolvePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replays every control's initial value through its binding, then
    /// requests each image slot's texture.
    fn mount(&mut self) {
        let mut initial = Vec::new();
        for controls in self.panels.values() {
            for (_, control) in controls.iter() {
                match control.binding {
                    Binding::Layer { .. } | Binding::BaseColor { .. } | Binding::Fabric => {
                        initial.push((control.binding, control.value.clone()));
                    }
                    _ => {}
                }
            }
        }
        for (binding, value) in initial {
            self.route(binding, value);
        }

        let mut requests = Vec::new();
        for (group, branding) in &self.branding {
            for slot in branding.slots() {
                if slot.text.is_none() {
                    requests.push((*group, slot.kind));
                }
            }
        }
        for (group, kind) in requests {
            self.request_branding_image(group, kind);
        }
        self.dirty.regions.extend(self.geometry.keys().copied());
        info!(regions = self.geometry.len(), "configurator mounted");
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn panel(&self, panel: Panel) -> Option<&ControlGroup> {
        self.panels.get(&panel)
    }

    /// Applies a panel edit. Unknown keys and values of the wrong type are
    /// ignored; returns whether the edit was accepted.
    pub fn apply_control(&mut self, panel: Panel, key: &str, value: ControlValue) -> bool {
        let Some(control) = self.panels.get_mut(&panel).and_then(|group| group.get_mut(key))
        else {
            debug!(%panel, key, "ignoring unknown control");
            return false;
        };
        let Some(value) = control.accept(value) else {
            warn!(%panel, key, "control rejected value");
            return false;
        };
        if !matches!(value, ControlValue::Button) {
            control.value = value.clone();
        }
        let binding = control.binding;
        self.route(binding, value);
        true
    }

    fn route(&mut self, binding: Binding, value: ControlValue) {
        match (binding, value) {
            (Binding::None, _) => {}
            (Binding::Fabric, ControlValue::Choice(name)) => {
                self.set_fabric(&name);
            }
            (Binding::BaseColor { color: target }, ControlValue::Color(color)) => {
                self.set_base_color(target, color);
            }
            (Binding::Layer { kind, field }, value) => {
                self.dispatch_layer(kind, field, value);
            }
            (Binding::Branding { group, slot, field }, value) => {
                self.set_branding(group, slot, field, value);
            }
            (Binding::Reset { panel }, _) => self.reset(panel),
            (binding, value) => {
                warn!(?binding, value = value.kind_name(), "binding cannot take value");
            }
        }
    }

    pub fn dispatch_layer(
        &mut self,
        kind: LayerKind,
        field: LayerField,
        value: ControlValue,
    ) -> Dispatch {
        let outcome = self.layers.get_mut(kind).dispatch(field, value);
        self.after_layer_dispatch(kind, &outcome);
        outcome
    }

    /// String-keyed dispatch, for dynamically wired callers. Unknown field
    /// names are a no-op.
    pub fn dispatch_layer_named(
        &mut self,
        kind: LayerKind,
        field: &str,
        value: ControlValue,
    ) -> Dispatch {
        let outcome = self.layers.get_mut(kind).dispatch_named(field, value);
        self.after_layer_dispatch(kind, &outcome);
        outcome
    }

    fn after_layer_dispatch(&mut self, kind: LayerKind, outcome: &Dispatch) {
        match outcome {
            Dispatch::Ignored => {}
            Dispatch::LoadRequested(path) => {
                let request = LoadRequest {
                    kind: RequestKind::TextureAsset,
                    path: path.clone(),
                };
                let ticket = self.resolver.resolve(ResolveTarget::Layer(kind), &request);
                self.layers.get_mut(kind).load_started(ticket);
            }
            Dispatch::Updated | Dispatch::Cleared => self.touch(Input::Layer(kind)),
        }
    }

    pub fn set_base_color(&mut self, target: ColorTarget, color: Color) -> bool {
        if self.base_colors.get(&target) == Some(&color) {
            return false;
        }
        self.base_colors.insert(target, color);
        debug!(?target, %color, "base color changed");
        self.touch(Input::BaseColor(target));
        true
    }

    pub fn set_fabric(&mut self, name: &str) -> bool {
        if self.fabric == name {
            return false;
        }
        if self.fabrics.get(name).is_none() {
            warn!(fabric = name, "unknown fabric");
            return false;
        }
        info!(from = %self.fabric, to = name, "fabric changed");
        self.fabric = name.to_owned();
        self.dirty.fabric = true;
        true
    }

    pub fn set_branding(
        &mut self,
        group: RegionGroup,
        slot: BrandingSlotKind,
        field: BrandingField,
        value: ControlValue,
    ) -> SlotChange {
        let Some(branding) = self.branding.get_mut(&group) else {
            return SlotChange::Ignored;
        };
        let change = branding.apply(slot, field, value);
        if change == SlotChange::ImageChanged {
            self.request_branding_image(group, slot);
        }
        if change.changed() {
            self.touch(Input::Branding(group));
        }
        change
    }

    fn request_branding_image(&mut self, group: RegionGroup, kind: BrandingSlotKind) {
        let placeholder = self.catalog.placeholder.clone();
        let Some(slot) = self
            .branding
            .get_mut(&group)
            .and_then(|branding| branding.slot_mut(kind))
        else {
            return;
        };
        let request = LoadRequest {
            kind: RequestKind::Image,
            path: slot.image_path(&placeholder).to_owned(),
        };
        let ticket = self
            .resolver
            .resolve(ResolveTarget::Branding(group, kind), &request);
        slot.load_started(ticket);
    }

    pub fn reset(&mut self, panel: Panel) {
        info!(%panel, "panel reset");
        match panel {
            Panel::Colors => {
                let white = self.catalog.palette.white();
                for key in ["BaseColor", "CollarColor", "SleeveColor", "StripeColor"] {
                    self.apply_control(Panel::Colors, key, ControlValue::Color(white));
                }
                self.apply_control(
                    Panel::Fabric,
                    "Fabric",
                    ControlValue::Choice(DEFAULT_FABRIC.to_owned()),
                );
            }
            Panel::FrontBranding | Panel::BackBranding => {
                self.apply_control(panel, "Logo", ControlValue::Image(String::new()));
            }
            Panel::LeftSleeve | Panel::RightSleeve => {
                self.apply_control(panel, "Logo", ControlValue::Image(String::new()));
                self.apply_control(panel, "NameText", ControlValue::Text(String::new()));
                self.apply_control(panel, "NumberText", ControlValue::Text(String::new()));
            }
            Panel::Fabric | Panel::TextureBranding => {}
        }
    }

    fn touch(&mut self, input: Input) {
        match input {
            Input::BaseColor(target) => self.dirty.zones.extend(target.zones().iter().copied()),
            Input::Layer(LayerKind::Gradient) => self.dirty.zones.extend(Zone::ALL),
            Input::Fabric => self.dirty.fabric = true,
            Input::Layer(_) | Input::Branding(_) => {}
        }
        self.dirty.regions.extend(regions_depending_on(input));
    }

    /// Applies every resolution that has already completed.
    pub fn pump(&mut self) -> usize {
        let completions = self.resolver.drain_ready();
        let count = completions.len();
        for completion in completions {
            self.apply_completion(completion);
        }
        count
    }

    /// Waits until no resolution is in flight, applying completions in the
    /// order they arrive.
    pub async fn settle(&mut self) -> usize {
        let mut count = 0;
        while let Some(completion) = self.resolver.next_completion().await {
            self.apply_completion(completion);
            count += 1;
        }
        count
    }

    pub fn in_flight(&self) -> usize {
        self.resolver.in_flight()
    }

    fn apply_completion(&mut self, completion: Completion) {
        let Completion {
            ticket,
            target,
            path,
            result,
        } = completion;
        match target {
            ResolveTarget::Layer(kind) => {
                let store = self.layers.get_mut(kind);
                store.load_finished();
                if self.policy == ResolvePolicy::LatestDispatchWins && !store.is_latest(ticket) {
                    debug!(layer = %kind, path = %path, "discarding superseded load");
                    return;
                }
                if let Ok(handle) = result {
                    store.install(handle);
                    self.touch(Input::Layer(kind));
                }
            }
            ResolveTarget::Branding(group, kind) => {
                let Some(slot) = self
                    .branding
                    .get_mut(&group)
                    .and_then(|branding| branding.slot_mut(kind))
                else {
                    return;
                };
                if !slot.is_latest(ticket) {
                    debug!(?group, slot = %kind, path = %path, "discarding superseded image");
                    return;
                }
                if let Ok(handle) = result {
                    slot.install(handle);
                    self.touch(Input::Branding(group));
                }
            }
        }
    }

    /// One update step: applies finished loads, rebuilds zone materials after
    /// a fabric change, reshades dirty zones and recomposes dirty regions.
    pub fn tick(&mut self) -> FrameUpdate {
        let mut update = FrameUpdate {
            completions: self.pump(),
            ..FrameUpdate::default()
        };

        if std::mem::take(&mut self.dirty.fabric) {
            self.rebuild_materials();
            update.fabric_rebuilt = true;
        }

        let zones = std::mem::take(&mut self.dirty.zones);
        for zone in zones {
            let (color, map) = self.zone_shading(zone);
            if self.materials.shade(zone, color, map) {
                update.reshaded += 1;
            }
        }

        let regions = std::mem::take(&mut self.dirty.regions);
        if !regions.is_empty() {
            let inputs = ComposeInputs {
                layers: &self.layers,
                branding: &self.branding,
                materials: &self.materials,
                button_material: self.button_material.as_ref(),
                geometry: &self.geometry,
            };
            update.recomposed = self.composer.recompose(&regions, &inputs);
        }
        if update != FrameUpdate::default() {
            debug!(?update, "tick");
        }
        update
    }

    fn rebuild_materials(&mut self) {
        let profile = self.fabrics.get(&self.fabric).unwrap_or_else(|| {
            warn!(fabric = %self.fabric, "fabric profile missing; using plain");
            Arc::new(FabricProfile::plain())
        });
        apply_fabric_to_material(&mut self.base_material, &profile);
        self.generation += 1;
        self.materials = MaterialSet::from_base(&self.base_material, self.generation);
        info!(fabric = %self.fabric, generation = self.generation, "zone materials rebuilt");
        self.dirty.zones.extend(Zone::ALL);
        self.dirty.regions.extend(regions_depending_on(Input::Fabric));
    }

    /// Gradient fill applies only while a load path is set and the zone's
    /// toggle is on; otherwise the zone shows its base color.
    fn zone_shading(&self, zone: Zone) -> (Color, Option<TextureBinding>) {
        let base = self
            .base_colors
            .get(&zone.color_target())
            .copied()
            .unwrap_or(Color::WHITE);
        let gradient = self.layers.get(LayerKind::Gradient).read();
        if gradient.pending_load.is_none() || !gradient_covers(gradient, zone) {
            return (base, None);
        }
        match gradient.bound_resource() {
            Some(handle) => (
                gradient.color,
                Some(apply_tiling(handle, gradient.offset, gradient.repeat)),
            ),
            None => (base, None),
        }
    }

    pub fn layer(&self, kind: LayerKind) -> &LayerState {
        self.layers.get(kind).read()
    }

    pub fn branding(&self, group: RegionGroup) -> Option<&BrandingGroup> {
        self.branding.get(&group)
    }

    pub fn base_color(&self, target: ColorTarget) -> Color {
        self.base_colors
            .get(&target)
            .copied()
            .unwrap_or(Color::WHITE)
    }

    pub fn fabric(&self) -> &str {
        &self.fabric
    }

    pub fn policy(&self) -> ResolvePolicy {
        self.policy
    }

    pub fn materials(&self) -> &MaterialSet {
        &self.materials
    }

    pub fn scene(&self) -> &BTreeMap<Region, RegionRenderState> {
        self.composer.scene()
    }

    pub fn region(&self, region: Region) -> Option<&RegionRenderState> {
        self.composer.scene().get(&region)
    }

    pub fn text_rasterizations(&self) -> u64 {
        self.composer.text_rasterizations()
    }
}

fn gradient_covers(state: &LayerState, zone: Zone) -> bool {
    match zone {
        Zone::ShirtFront => state.regions.front,
        Zone::ShirtBack => state.regions.back,
        Zone::Sleeve | Zone::SleeveStripe => state.regions.sleeve,
        Zone::Collar => state.regions.collar,
    }
}

fn branding_panel(group: RegionGroup) -> Panel {
    match group {
        RegionGroup::Front => Panel::FrontBranding,
        RegionGroup::Back => Panel::BackBranding,
        RegionGroup::LeftSleeve => Panel::LeftSleeve,
        RegionGroup::RightSleeve => Panel::RightSleeve,
    }
}
