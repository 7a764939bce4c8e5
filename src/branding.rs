use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::controls::{Binding, ControlGroup, ControlValue};
use crate::resources::{ResourceHandle, Ticket};
use crate::schema::{Color, RegionGroup, Vec2, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrandingSlotKind {
    Logo,
    Sponsor,
    Name,
    Number,
}

impl BrandingSlotKind {
    pub const ALL: [Self; 4] = [Self::Logo, Self::Sponsor, Self::Name, Self::Number];

    pub fn is_text(self) -> bool {
        matches!(self, Self::Name | Self::Number)
    }

    pub fn prefix(self) -> &'static str {
        match self {
            Self::Logo => "Logo",
            Self::Sponsor => "Sponsor",
            Self::Name => "Name",
            Self::Number => "Number",
        }
    }
}

impl fmt::Display for BrandingSlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BrandingField {
    Show,
    Image,
    Color,
    Text,
    FontSize,
    FontFamily,
    StrokeShow,
    StrokeColor,
    StrokeWidth,
    PositionX,
    PositionY,
    Scale,
    RotationX,
    RotationY,
    RotationZ,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub position: Vec2,
    /// Degrees, as edited in the panel.
    pub rotation: Vec3,
    pub scale: f32,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            position: Vec2::new(0.0, 0.44),
            rotation: Vec3::default(),
            scale: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextSpec {
    pub text: String,
    pub font_size: u32,
    pub font_family: String,
    pub stroke_visible: bool,
    pub stroke_color: Color,
    pub stroke_width: u32,
}

impl Default for TextSpec {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_size: 64,
            font_family: crate::config::DEFAULT_FONT_FAMILY.to_owned(),
            stroke_visible: true,
            stroke_color: Color::WHITE,
            stroke_width: 5,
        }
    }
}

/// One decal slot of a region group.
#[derive(Debug, Clone)]
pub struct BrandingSlot {
    pub kind: BrandingSlotKind,
    pub visible: bool,
    pub image: String,
    pub color: Color,
    pub text: Option<TextSpec>,
    pub placement: Placement,
    pub resource: Option<ResourceHandle>,
    latest_ticket: Option<Ticket>,
}

/// Outcome of a slot edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotChange {
    Ignored,
    Updated,
    ImageChanged,
}

impl SlotChange {
    pub fn changed(self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

impl BrandingSlot {
    pub fn new(kind: BrandingSlotKind) -> Self {
        Self {
            kind,
            visible: true,
            image: String::new(),
            color: if kind.is_text() {
                Color::BLACK
            } else {
                Color::WHITE
            },
            text: kind.is_text().then(TextSpec::default),
            placement: Placement::default(),
            resource: None,
            latest_ticket: None,
        }
    }

    /// Image to render. An empty image falls back to `placeholder`, so image
    /// slots always point at something loadable.
    pub fn image_path<'a>(&'a self, placeholder: &'a str) -> &'a str {
        let trimmed = self.image.trim();
        if trimmed.is_empty() {
            placeholder
        } else {
            trimmed
        }
    }

    pub fn apply(&mut self, field: BrandingField, value: ControlValue) -> SlotChange {
        let kind = self.kind;
        let outcome = match (field, value) {
            (BrandingField::Show, ControlValue::Bool(value)) => set(&mut self.visible, value),
            (BrandingField::Image, ControlValue::Image(path) | ControlValue::Text(path))
                if !kind.is_text() =>
            {
                match set(&mut self.image, path.trim().to_owned()) {
                    SlotChange::Updated => SlotChange::ImageChanged,
                    other => other,
                }
            }
            (BrandingField::Color, ControlValue::Color(value)) => set(&mut self.color, value),
            (BrandingField::PositionX, ControlValue::Number(value)) => {
                set(&mut self.placement.position.x, value)
            }
            (BrandingField::PositionY, ControlValue::Number(value)) => {
                set(&mut self.placement.position.y, value)
            }
            (BrandingField::Scale, ControlValue::Number(value)) => {
                set(&mut self.placement.scale, value)
            }
            (BrandingField::RotationX, ControlValue::Number(value)) => {
                set(&mut self.placement.rotation.x, value)
            }
            (BrandingField::RotationY, ControlValue::Number(value)) => {
                set(&mut self.placement.rotation.y, value)
            }
            (BrandingField::RotationZ, ControlValue::Number(value)) => {
                set(&mut self.placement.rotation.z, value)
            }
            (field, value) => match self.text.as_mut() {
                Some(text) => apply_text(text, field, value),
                None => {
                    warn!(slot = %kind, ?field, "field does not apply to an image slot");
                    SlotChange::Ignored
                }
            },
        };
        if outcome.changed() {
            debug!(slot = %kind, ?field, ?outcome, "branding edit");
        }
        outcome
    }

    pub(crate) fn load_started(&mut self, ticket: Ticket) {
        self.latest_ticket = Some(ticket);
    }

    pub(crate) fn is_latest(&self, ticket: Ticket) -> bool {
        self.latest_ticket == Some(ticket)
    }

    pub(crate) fn install(&mut self, handle: ResourceHandle) {
        self.resource = Some(handle);
    }
}

fn apply_text(text: &mut TextSpec, field: BrandingField, value: ControlValue) -> SlotChange {
    match (field, value) {
        (BrandingField::Text, ControlValue::Text(value)) => set(&mut text.text, value),
        (BrandingField::FontSize, ControlValue::Number(value)) => {
            set(&mut text.font_size, to_pixels(value))
        }
        (BrandingField::FontFamily, ControlValue::Choice(value) | ControlValue::Text(value)) => {
            set(&mut text.font_family, value)
        }
        (BrandingField::StrokeShow, ControlValue::Bool(value)) => {
            set(&mut text.stroke_visible, value)
        }
        (BrandingField::StrokeColor, ControlValue::Color(value)) => {
            set(&mut text.stroke_color, value)
        }
        (BrandingField::StrokeWidth, ControlValue::Number(value)) => {
            set(&mut text.stroke_width, to_pixels(value))
        }
        (field, value) => {
            warn!(?field, value = ?value, "value type does not match branding field");
            SlotChange::Ignored
        }
    }
}

fn to_pixels(value: f32) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round() as u32
    } else {
        0
    }
}

fn set<T: PartialEq>(slot: &mut T, value: T) -> SlotChange {
    if *slot == value {
        SlotChange::Ignored
    } else {
        *slot = value;
        SlotChange::Updated
    }
}

/// Independently configured slots attached to one region group.
#[derive(Debug, Clone)]
pub struct BrandingGroup {
    group: RegionGroup,
    slots: BTreeMap<BrandingSlotKind, BrandingSlot>,
}

impl BrandingGroup {
    /// Seeds slot state from the default values of a panel's controls, the way
    /// the widget reports initial values on mount.
    pub fn from_controls(group: RegionGroup, controls: &ControlGroup) -> Self {
        let mut slots = BTreeMap::new();
        for (_, control) in controls.iter() {
            if let Binding::Branding {
                group: bound,
                slot,
                field,
            } = control.binding
            {
                if bound != group {
                    continue;
                }
                slots
                    .entry(slot)
                    .or_insert_with(|| BrandingSlot::new(slot))
                    .apply(field, control.value.clone());
            }
        }
        Self { group, slots }
    }

    pub fn group(&self) -> RegionGroup {
        self.group
    }

    pub fn slot(&self, kind: BrandingSlotKind) -> Option<&BrandingSlot> {
        self.slots.get(&kind)
    }

    pub fn slot_mut(&mut self, kind: BrandingSlotKind) -> Option<&mut BrandingSlot> {
        self.slots.get_mut(&kind)
    }

    pub fn slots(&self) -> impl Iterator<Item = &BrandingSlot> {
        self.slots.values()
    }

    pub fn apply(
        &mut self,
        kind: BrandingSlotKind,
        field: BrandingField,
        value: ControlValue,
    ) -> SlotChange {
        match self.slots.get_mut(&kind) {
            Some(slot) => slot.apply(field, value),
            None => {
                debug!(group = ?self.group, slot = %kind, "group has no such slot");
                SlotChange::Ignored
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BrandingField, BrandingSlot, BrandingSlotKind, SlotChange};
    use crate::controls::ControlValue;
    use crate::config::DEFAULT_PLACEHOLDER;

    #[test]
    fn empty_image_uses_placeholder() {
        let mut slot = BrandingSlot::new(BrandingSlotKind::Logo);
        assert_eq!(slot.image_path(DEFAULT_PLACEHOLDER), DEFAULT_PLACEHOLDER);

        let change = slot.apply(
            BrandingField::Image,
            ControlValue::Image("/assets/logo/club.png".to_owned()),
        );
        assert_eq!(change, SlotChange::ImageChanged);
        assert_eq!(slot.image_path(DEFAULT_PLACEHOLDER), "/assets/logo/club.png");

        slot.apply(BrandingField::Image, ControlValue::Image("  ".to_owned()));
        assert_eq!(slot.image_path(DEFAULT_PLACEHOLDER), DEFAULT_PLACEHOLDER);
    }

    #[test]
    fn text_fields_only_apply_to_text_slots() {
        let mut logo = BrandingSlot::new(BrandingSlotKind::Logo);
        assert_eq!(
            logo.apply(BrandingField::Text, ControlValue::Text("X".to_owned())),
            SlotChange::Ignored
        );

        let mut name = BrandingSlot::new(BrandingSlotKind::Name);
        assert_eq!(
            name.apply(BrandingField::FontSize, ControlValue::Number(70.4)),
            SlotChange::Updated
        );
        assert_eq!(name.text.as_ref().unwrap().font_size, 70);
        assert_eq!(
            name.apply(BrandingField::Image, ControlValue::Image("/x.png".to_owned())),
            SlotChange::Ignored
        );
    }
}
