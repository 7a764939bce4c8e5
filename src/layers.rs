use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::controls::ControlValue;
use crate::resources::{ResourceHandle, Ticket};
use crate::schema::{Color, Region, Vec2, Vec3};

/// Full-surface overlay layers. Each kind owns one independent [`LayerStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Gradient,
    Pattern,
    Object,
}

impl LayerKind {
    pub const ALL: [Self; 3] = [Self::Gradient, Self::Pattern, Self::Object];

    /// Panel prefix used by the Texture-Branding folders.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Gradient => "Gradient",
            Self::Pattern => "Texture",
            Self::Object => "Object",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Closed set of dispatchable layer fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LayerField {
    Show,
    Color,
    Add,
    Load,
    Front,
    Back,
    Sleeve,
    Collar,
    Position,
    PositionX,
    PositionY,
    RotationX,
    RotationY,
    RotationZ,
    Scale,
    OffsetX,
    OffsetY,
    RepeatX,
    RepeatY,
}

impl LayerField {
    pub const ALL: [Self; 19] = [
        Self::Show,
        Self::Color,
        Self::Add,
        Self::Load,
        Self::Front,
        Self::Back,
        Self::Sleeve,
        Self::Collar,
        Self::Position,
        Self::PositionX,
        Self::PositionY,
        Self::RotationX,
        Self::RotationY,
        Self::RotationZ,
        Self::Scale,
        Self::OffsetX,
        Self::OffsetY,
        Self::RepeatX,
        Self::RepeatY,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Show => "Show",
            Self::Color => "Color",
            Self::Add => "Add",
            Self::Load => "Load",
            Self::Front => "Front",
            Self::Back => "Back",
            Self::Sleeve => "Sleeve",
            Self::Collar => "Collar",
            Self::Position => "Position",
            Self::PositionX => "PositionX",
            Self::PositionY => "PositionY",
            Self::RotationX => "RotationX",
            Self::RotationY => "RotationY",
            Self::RotationZ => "RotationZ",
            Self::Scale => "Scale",
            Self::OffsetX => "OffsetX",
            Self::OffsetY => "OffsetY",
            Self::RepeatX => "RepeatX",
            Self::RepeatY => "RepeatY",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegionToggles {
    pub front: bool,
    pub back: bool,
    pub sleeve: bool,
    pub collar: bool,
}

impl RegionToggles {
    /// Whether a layer decal lands on `region`. The shell shares the front
    /// material but never carries decals.
    pub fn covers(&self, region: Region) -> bool {
        match region {
            Region::Front => self.front,
            Region::Back => self.back,
            Region::LeftSleeve
            | Region::RightSleeve
            | Region::LeftSleeveStripe
            | Region::RightSleeveStripe => self.sleeve,
            Region::Collar | Region::CollarBack | Region::CollarThread => self.collar,
            Region::Shell | Region::Button => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerPhase {
    Idle,
    Loading,
    Ready,
}

#[derive(Debug, Clone)]
pub struct LayerState {
    pub visible: bool,
    pub color: Color,
    pub active: Option<ResourceHandle>,
    pub pending_load: Option<String>,
    pub regions: RegionToggles,
    pub position: Vec3,
    pub rotation_degrees: Vec3,
    pub scale: f32,
    pub offset: Vec2,
    pub repeat: Vec2,
    outstanding: u32,
    latest_ticket: Option<Ticket>,
}

impl LayerState {
    fn initial() -> Self {
        Self {
            visible: false,
            color: Color::WHITE,
            active: None,
            pending_load: None,
            regions: RegionToggles {
                front: true,
                back: true,
                sleeve: false,
                collar: false,
            },
            position: Vec3::default(),
            rotation_degrees: Vec3::default(),
            scale: 0.2,
            offset: Vec2::splat(0.1),
            repeat: Vec2::splat(1.0),
            outstanding: 0,
            latest_ticket: None,
        }
    }

    pub fn phase(&self) -> LayerPhase {
        if self.outstanding > 0 {
            LayerPhase::Loading
        } else if self.active.is_some() {
            LayerPhase::Ready
        } else {
            LayerPhase::Idle
        }
    }

    /// Resource to bind, honoring visibility. `None` renders as absent.
    pub fn bound_resource(&self) -> Option<&ResourceHandle> {
        if self.visible {
            self.active.as_ref()
        } else {
            None
        }
    }
}

/// Result of a dispatch that the caller may need to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Ignored,
    Updated,
    LoadRequested(String),
    Cleared,
}

impl Dispatch {
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

pub struct LayerStore {
    kind: LayerKind,
    state: LayerState,
}

impl LayerStore {
    pub fn new(kind: LayerKind) -> Self {
        Self {
            kind,
            state: LayerState::initial(),
        }
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn read(&self) -> &LayerState {
        &self.state
    }

    /// Looks a field up by its panel name. Unknown names are a no-op.
    pub fn dispatch_named(&mut self, field: &str, value: ControlValue) -> Dispatch {
        match LayerField::parse(field) {
            Some(field) => self.dispatch(field, value),
            None => {
                debug!(layer = %self.kind, field, "ignoring unknown layer field");
                Dispatch::Ignored
            }
        }
    }

    pub fn dispatch(&mut self, field: LayerField, value: ControlValue) -> Dispatch {
        let state = &mut self.state;
        let outcome = match (field, value) {
            (LayerField::Add, _) => {
                warn!(layer = %self.kind, "Add is set by resource resolution only");
                Dispatch::Ignored
            }
            (LayerField::Show, ControlValue::Bool(value)) => {
                set(&mut state.visible, value)
            }
            (LayerField::Color, ControlValue::Color(value)) => set(&mut state.color, value),
            (LayerField::Load, ControlValue::Image(path) | ControlValue::Choice(path) | ControlValue::Text(path)) => {
                let path = path.trim().to_owned();
                if path.is_empty() {
                    state.pending_load = None;
                    state.latest_ticket = None;
                    if state.active.take().is_some() {
                        Dispatch::Cleared
                    } else {
                        Dispatch::Ignored
                    }
                } else {
                    state.pending_load = Some(path.clone());
                    Dispatch::LoadRequested(path)
                }
            }
            (LayerField::Front, ControlValue::Bool(value)) => set(&mut state.regions.front, value),
            (LayerField::Back, ControlValue::Bool(value)) => set(&mut state.regions.back, value),
            (LayerField::Sleeve, ControlValue::Bool(value)) => {
                set(&mut state.regions.sleeve, value)
            }
            (LayerField::Collar, ControlValue::Bool(value)) => {
                set(&mut state.regions.collar, value)
            }
            (LayerField::Position, ControlValue::Vector(value)) => {
                set(&mut state.position, value)
            }
            (LayerField::PositionX, ControlValue::Number(value)) => {
                set(&mut state.position.x, value)
            }
            (LayerField::PositionY, ControlValue::Number(value)) => {
                set(&mut state.position.y, value)
            }
            (LayerField::RotationX, ControlValue::Number(value)) => {
                set(&mut state.rotation_degrees.x, value)
            }
            (LayerField::RotationY, ControlValue::Number(value)) => {
                set(&mut state.rotation_degrees.y, value)
            }
            (LayerField::RotationZ, ControlValue::Number(value)) => {
                set(&mut state.rotation_degrees.z, value)
            }
            (LayerField::Scale, ControlValue::Number(value)) => set(&mut state.scale, value),
            (LayerField::OffsetX, ControlValue::Number(value)) => {
                set(&mut state.offset.x, value)
            }
            (LayerField::OffsetY, ControlValue::Number(value)) => {
                set(&mut state.offset.y, value)
            }
            (LayerField::RepeatX, ControlValue::Number(value)) => {
                set(&mut state.repeat.x, value)
            }
            (LayerField::RepeatY, ControlValue::Number(value)) => {
                set(&mut state.repeat.y, value)
            }
            (field, value) => {
                warn!(
                    layer = %self.kind,
                    field = field.as_str(),
                    value = ?value,
                    "value type does not match layer field"
                );
                Dispatch::Ignored
            }
        };
        if outcome.changed() {
            debug!(layer = %self.kind, field = field.as_str(), ?outcome, "layer dispatch");
        }
        outcome
    }

    pub(crate) fn load_started(&mut self, ticket: Ticket) {
        self.state.outstanding += 1;
        self.state.latest_ticket = Some(ticket);
    }

    pub(crate) fn is_latest(&self, ticket: Ticket) -> bool {
        self.state.latest_ticket == Some(ticket)
    }

    pub(crate) fn load_finished(&mut self) {
        self.state.outstanding = self.state.outstanding.saturating_sub(1);
    }

    /// Success path of the resolution pipeline; the only writer of `Add`.
    pub(crate) fn install(&mut self, handle: ResourceHandle) {
        debug!(layer = %self.kind, source = %handle.source, "layer resource ready");
        self.state.active = Some(handle);
    }
}

fn set<T: PartialEq>(slot: &mut T, value: T) -> Dispatch {
    if *slot == value {
        Dispatch::Ignored
    } else {
        *slot = value;
        Dispatch::Updated
    }
}

/// The three per-kind stores of one session.
pub struct LayerStores {
    gradient: LayerStore,
    pattern: LayerStore,
    object: LayerStore,
}

impl LayerStores {
    pub fn new() -> Self {
        Self {
            gradient: LayerStore::new(LayerKind::Gradient),
            pattern: LayerStore::new(LayerKind::Pattern),
            object: LayerStore::new(LayerKind::Object),
        }
    }

    pub fn get(&self, kind: LayerKind) -> &LayerStore {
        match kind {
            LayerKind::Gradient => &self.gradient,
            LayerKind::Pattern => &self.pattern,
            LayerKind::Object => &self.object,
        }
    }

    pub fn get_mut(&mut self, kind: LayerKind) -> &mut LayerStore {
        match kind {
            LayerKind::Gradient => &mut self.gradient,
            LayerKind::Pattern => &mut self.pattern,
            LayerKind::Object => &mut self.object,
        }
    }
}

impl Default for LayerStores {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{Dispatch, LayerField, LayerKind, LayerPhase, LayerStore};
    use crate::controls::ControlValue;
    use crate::resources::{Bitmap, Texture};
    use crate::schema::{Color, Region};
    use std::sync::Arc;

    #[test]
    fn unknown_field_names_are_ignored() {
        let mut store = LayerStore::new(LayerKind::Pattern);
        let before = format!("{:?}", store.read());
        assert_eq!(
            store.dispatch_named("Opacity", ControlValue::Number(0.5)),
            Dispatch::Ignored
        );
        assert_eq!(format!("{:?}", store.read()), before);
    }

    #[test]
    fn mismatched_values_are_ignored() {
        let mut store = LayerStore::new(LayerKind::Object);
        assert_eq!(
            store.dispatch(LayerField::Show, ControlValue::Number(1.0)),
            Dispatch::Ignored
        );
        assert!(!store.read().visible);
    }

    #[test]
    fn add_cannot_be_dispatched() {
        let mut store = LayerStore::new(LayerKind::Gradient);
        let outcome = store.dispatch(
            LayerField::Add,
            ControlValue::Image("/textures/design/texture1.jpg".to_owned()),
        );
        assert_eq!(outcome, Dispatch::Ignored);
        assert!(store.read().active.is_none());
        assert_eq!(store.read().phase(), LayerPhase::Idle);
    }

    #[test]
    fn load_does_not_set_add_and_empty_load_clears() {
        let mut store = LayerStore::new(LayerKind::Pattern);
        let outcome = store.dispatch_named(
            "Load",
            ControlValue::Image("/textures/design/texture3.jpg".to_owned()),
        );
        assert_eq!(
            outcome,
            Dispatch::LoadRequested("/textures/design/texture3.jpg".to_owned())
        );
        assert!(store.read().active.is_none());

        store.install(Arc::new(Texture::new("t", Bitmap::transparent(1, 1))));
        assert_eq!(store.read().phase(), LayerPhase::Ready);

        let cleared = store.dispatch(LayerField::Load, ControlValue::Image(String::new()));
        assert_eq!(cleared, Dispatch::Cleared);
        assert_eq!(store.read().phase(), LayerPhase::Idle);
    }

    #[test]
    fn toggles_map_regions() {
        let mut store = LayerStore::new(LayerKind::Gradient);
        store.dispatch(LayerField::Sleeve, ControlValue::Bool(true));
        store.dispatch(LayerField::Color, ControlValue::Color(Color::BLACK));
        let regions = store.read().regions;
        assert!(regions.covers(Region::LeftSleeveStripe));
        assert!(regions.covers(Region::Front));
        assert!(!regions.covers(Region::Shell));
        assert!(!regions.covers(Region::CollarBack));
        assert_eq!(store.read().color, Color::BLACK);
    }
}
