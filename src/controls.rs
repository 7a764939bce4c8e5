//! Declarative control-group descriptors consumed by a panel widget.
//!
//! Builders here are pure: the same prefix and defaults always yield the same
//! group. Each control carries a typed [`Binding`] naming what an edit updates,
//! so the session can route edits without closures.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Result};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::branding::{BrandingField, BrandingSlotKind};
use crate::config::{Catalog, Palette, DEFAULT_FONT_FAMILY};
use crate::layers::{LayerField, LayerKind};
use crate::panels::Panel;
use crate::schema::{Color, ColorTarget, Facing, RegionGroup, Vec3};

pub const DEFAULT_FONT_SIZE: f32 = 64.0;
pub const DEFAULT_STROKE_WIDTH: f32 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ControlValue {
    Bool(bool),
    Number(f32),
    Text(String),
    Color(Color),
    Image(String),
    Choice(String),
    Vector(Vec3),
    Button,
}

impl ControlValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Color(_) => "color",
            Self::Image(_) => "image",
            Self::Choice(_) => "choice",
            Self::Vector(_) => "vector",
            Self::Button => "button",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) | Self::Image(value) | Self::Choice(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl Bounds {
    pub const fn new(min: f32, max: f32, step: f32) -> Self {
        Self { min, max, step }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "entries", rename_all = "snake_case")]
pub enum ControlOptions {
    Palette(Palette),
    Choices(Vec<String>),
}

/// What an edit of a control updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum Binding {
    None,
    Fabric,
    BaseColor {
        color: ColorTarget,
    },
    Layer {
        kind: LayerKind,
        field: LayerField,
    },
    Branding {
        group: RegionGroup,
        slot: BrandingSlotKind,
        field: BrandingField,
    },
    Reset {
        panel: Panel,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Control {
    pub value: ControlValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<ControlOptions>,
    pub binding: Binding,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
}

impl Control {
    pub fn new(value: ControlValue, binding: Binding) -> Self {
        Self {
            value,
            bounds: None,
            options: None,
            binding,
            folder: None,
        }
    }

    pub fn bounded(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_options(mut self, options: ControlOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Checks an incoming edit against this control's type and bounds. Numbers
    /// are clamped; anything of the wrong type is rejected.
    pub fn accept(&self, value: ControlValue) -> Option<ControlValue> {
        match (&self.value, value) {
            (ControlValue::Bool(_), value @ ControlValue::Bool(_)) => Some(value),
            (ControlValue::Number(_), ControlValue::Number(value)) => {
                if !value.is_finite() {
                    return None;
                }
                let value = self.bounds.map_or(value, |bounds| bounds.clamp(value));
                Some(ControlValue::Number(value))
            }
            (ControlValue::Text(_), ControlValue::Text(value)) => Some(ControlValue::Text(value)),
            (ControlValue::Color(_), value @ ControlValue::Color(_)) => Some(value),
            (ControlValue::Image(_), ControlValue::Image(path) | ControlValue::Text(path)) => {
                Some(ControlValue::Image(path))
            }
            (ControlValue::Choice(_), ControlValue::Choice(choice) | ControlValue::Text(choice)) => {
                match &self.options {
                    Some(ControlOptions::Choices(choices))
                        if !choice.is_empty() && !choices.contains(&choice) =>
                    {
                        None
                    }
                    _ => Some(ControlValue::Choice(choice)),
                }
            }
            (ControlValue::Vector(_), value @ ControlValue::Vector(_)) => Some(value),
            (ControlValue::Button, ControlValue::Button) => Some(ControlValue::Button),
            _ => None,
        }
    }

    /// Interprets a loosely typed value (from a JSON or YAML edit list) using
    /// the type of this control's current value.
    pub fn parse_value(&self, raw: &serde_json::Value) -> Result<ControlValue> {
        let expect_str = || {
            raw.as_str()
                .map(str::to_owned)
                .ok_or_else(|| anyhow!("expected a string, got {raw}"))
        };
        let value = match &self.value {
            ControlValue::Bool(_) => ControlValue::Bool(
                raw.as_bool()
                    .ok_or_else(|| anyhow!("expected a boolean, got {raw}"))?,
            ),
            ControlValue::Number(_) => ControlValue::Number(
                raw.as_f64()
                    .ok_or_else(|| anyhow!("expected a number, got {raw}"))? as f32,
            ),
            ControlValue::Text(_) => ControlValue::Text(expect_str()?),
            ControlValue::Image(_) => ControlValue::Image(expect_str()?),
            ControlValue::Choice(_) => ControlValue::Choice(expect_str()?),
            ControlValue::Color(_) => {
                let raw = expect_str()?;
                let named = match &self.options {
                    Some(ControlOptions::Palette(palette)) => palette.get(&raw),
                    _ => None,
                };
                match named {
                    Some(color) => ControlValue::Color(color),
                    None => ControlValue::Color(Color::parse_hex(&raw)?),
                }
            }
            ControlValue::Vector(_) => ControlValue::Vector(serde_json::from_value(raw.clone())?),
            ControlValue::Button => ControlValue::Button,
        };
        if self.accept(value.clone()).is_none() {
            bail!("value {raw} is not accepted by this control");
        }
        Ok(value)
    }
}

/// Ordered control mapping. Inserting an existing key replaces its control in
/// place, so combining groups behaves as a key union where later groups win.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlGroup {
    entries: Vec<(String, Control)>,
}

impl ControlGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, control: Control) {
        let key = key.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = control,
            None => self.entries.push((key, control)),
        }
    }

    pub fn merge(&mut self, other: ControlGroup) {
        for (key, control) in other.entries {
            self.insert(key, control);
        }
    }

    /// Tags every control with a folder label, like nesting in the widget.
    pub fn in_folder(mut self, folder: &str) -> Self {
        for (_, control) in &mut self.entries {
            control.folder = Some(folder.to_owned());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Control> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, control)| control)
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut Control> {
        self.entries
            .iter_mut()
            .find(|(existing, _)| existing == key)
            .map(|(_, control)| control)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Control)> {
        self.entries
            .iter()
            .map(|(key, control)| (key.as_str(), control))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ControlGroup {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, control) in &self.entries {
            map.serialize_entry(key, control)?;
        }
        map.end()
    }
}

/// Per-key overrides for builder defaults, keyed by full control key plus an
/// optional `Min`/`Max`/`Step`/`Value` suffix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Defaults {
    values: BTreeMap<String, ControlValue>,
}

impl Defaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn number(mut self, key: impl Into<String>, value: f32) -> Self {
        self.values.insert(key.into(), ControlValue::Number(value));
        self
    }

    pub fn text(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), ControlValue::Text(value.into()));
        self
    }

    pub fn color(mut self, key: impl Into<String>, value: Color) -> Self {
        self.values.insert(key.into(), ControlValue::Color(value));
        self
    }

    fn number_or(&self, key: &str, fallback: f32) -> f32 {
        match self.values.get(key) {
            Some(ControlValue::Number(value)) => *value,
            _ => fallback,
        }
    }

    fn text_or(&self, key: &str, fallback: &str) -> String {
        match self.values.get(key) {
            Some(ControlValue::Text(value) | ControlValue::Image(value)) => value.clone(),
            _ => fallback.to_owned(),
        }
    }

    fn color_or(&self, key: &str, fallback: Color) -> Color {
        match self.values.get(key) {
            Some(ControlValue::Color(value)) => *value,
            _ => fallback,
        }
    }

    fn bool_or(&self, key: &str, fallback: bool) -> bool {
        match self.values.get(key) {
            Some(ControlValue::Bool(value)) => *value,
            _ => fallback,
        }
    }
}

/// Semantic role of a control inside a builder's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
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
    OffsetX,
    OffsetY,
    RepeatX,
    RepeatY,
    Front,
    Back,
    Sleeve,
    Collar,
}

/// Where the controls of one builder call are wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Layer(LayerKind),
    Branding(RegionGroup, BrandingSlotKind),
    Detached,
}

impl Target {
    pub fn bind(self, role: Role) -> Binding {
        match self {
            Self::Layer(kind) => match LayerField::from_role(role) {
                Some(field) => Binding::Layer { kind, field },
                None => Binding::None,
            },
            Self::Branding(group, slot) => match BrandingField::from_role(role) {
                Some(field) => Binding::Branding { group, slot, field },
                None => Binding::None,
            },
            Self::Detached => Binding::None,
        }
    }
}

impl LayerField {
    fn from_role(role: Role) -> Option<Self> {
        Some(match role {
            Role::Show => Self::Show,
            Role::Image => Self::Load,
            Role::Color => Self::Color,
            Role::PositionX => Self::PositionX,
            Role::PositionY => Self::PositionY,
            Role::Scale => Self::Scale,
            Role::RotationX => Self::RotationX,
            Role::RotationY => Self::RotationY,
            Role::RotationZ => Self::RotationZ,
            Role::OffsetX => Self::OffsetX,
            Role::OffsetY => Self::OffsetY,
            Role::RepeatX => Self::RepeatX,
            Role::RepeatY => Self::RepeatY,
            Role::Front => Self::Front,
            Role::Back => Self::Back,
            Role::Sleeve => Self::Sleeve,
            Role::Collar => Self::Collar,
            Role::Text
            | Role::FontSize
            | Role::FontFamily
            | Role::StrokeShow
            | Role::StrokeColor
            | Role::StrokeWidth => return None,
        })
    }
}

impl BrandingField {
    fn from_role(role: Role) -> Option<Self> {
        Some(match role {
            Role::Show => Self::Show,
            Role::Image => Self::Image,
            Role::Color => Self::Color,
            Role::Text => Self::Text,
            Role::FontSize => Self::FontSize,
            Role::FontFamily => Self::FontFamily,
            Role::StrokeShow => Self::StrokeShow,
            Role::StrokeColor => Self::StrokeColor,
            Role::StrokeWidth => Self::StrokeWidth,
            Role::PositionX => Self::PositionX,
            Role::PositionY => Self::PositionY,
            Role::Scale => Self::Scale,
            Role::RotationX => Self::RotationX,
            Role::RotationY => Self::RotationY,
            Role::RotationZ => Self::RotationZ,
            Role::OffsetX
            | Role::OffsetY
            | Role::RepeatX
            | Role::RepeatY
            | Role::Front
            | Role::Back
            | Role::Sleeve
            | Role::Collar => return None,
        })
    }
}

fn palette_color(value: Color, palette: &Palette, binding: Binding) -> Control {
    Control::new(ControlValue::Color(value), binding)
        .with_options(ControlOptions::Palette(palette.clone()))
}

fn ranged(
    key: &str,
    defaults: &Defaults,
    fallback: (f32, f32, f32, f32),
    binding: Binding,
) -> Control {
    let (value, min, max, step) = fallback;
    Control::new(
        ControlValue::Number(defaults.number_or(key, value)),
        binding,
    )
    .bounded(Bounds::new(
        defaults.number_or(&format!("{key}Min"), min),
        defaults.number_or(&format!("{key}Max"), max),
        defaults.number_or(&format!("{key}Step"), step),
    ))
}

/// `Show<P>`, `<P>` (image picker) and `<P>Color`.
pub fn image_properties(
    prefix: &str,
    defaults: &Defaults,
    palette: &Palette,
    target: Target,
) -> ControlGroup {
    let mut group = ControlGroup::new();
    group.insert(
        format!("Show{prefix}"),
        Control::new(
            ControlValue::Bool(defaults.bool_or(&format!("Show{prefix}"), true)),
            target.bind(Role::Show),
        ),
    );
    group.insert(
        prefix,
        Control::new(
            ControlValue::Image(defaults.text_or(prefix, "")),
            target.bind(Role::Image),
        ),
    );
    let color_key = format!("{prefix}Color");
    group.insert(
        color_key.clone(),
        palette_color(
            defaults.color_or(&color_key, palette.white()),
            palette,
            target.bind(Role::Color),
        ),
    );
    group
}

/// Position, scale and rotation controls. Back-facing groups default their Y
/// rotation to 180 degrees.
pub fn placement(prefix: &str, defaults: &Defaults, facing: Facing, target: Target) -> ControlGroup {
    let rotation_y = match facing {
        Facing::Front => 0.0,
        Facing::Back => 180.0,
    };
    let mut group = ControlGroup::new();
    let numeric = [
        ("PositionX", (0.0, -0.15, 0.15, 0.01), Role::PositionX),
        ("PositionY", (0.44, 0.0, 0.65, 0.01), Role::PositionY),
        ("Scale", (0.2, 0.1, 1.0, 0.01), Role::Scale),
        ("RotationX", (0.0, -180.0, 180.0, 1.0), Role::RotationX),
        ("RotationY", (rotation_y, -180.0, 180.0, 1.0), Role::RotationY),
        ("RotationZ", (0.0, -180.0, 180.0, 1.0), Role::RotationZ),
    ];
    for (suffix, fallback, role) in numeric {
        let key = format!("{prefix}{suffix}");
        let control = ranged(&key, defaults, fallback, target.bind(role));
        group.insert(key, control);
    }
    group
}

/// `Show<P>` and `<P>Text`, seeded from `<P>Value`.
pub fn text_control(prefix: &str, defaults: &Defaults, target: Target) -> ControlGroup {
    let mut group = ControlGroup::new();
    group.insert(
        format!("Show{prefix}"),
        Control::new(ControlValue::Bool(true), target.bind(Role::Show)),
    );
    group.insert(
        format!("{prefix}Text"),
        Control::new(
            ControlValue::Text(defaults.text_or(&format!("{prefix}Value"), "")),
            target.bind(Role::Text),
        ),
    );
    group
}

pub fn text_color(prefix: &str, palette: &Palette, target: Target) -> ControlGroup {
    let mut group = ControlGroup::new();
    group.insert(
        format!("{prefix}Color"),
        palette_color(palette.black(), palette, target.bind(Role::Color)),
    );
    group
}

pub fn font_size(prefix: &str, defaults: &Defaults, target: Target) -> ControlGroup {
    let mut group = ControlGroup::new();
    let value = defaults.number_or(&format!("{prefix}FontSizeValue"), DEFAULT_FONT_SIZE);
    group.insert(
        format!("{prefix}FontSize"),
        Control::new(ControlValue::Number(value), target.bind(Role::FontSize))
            .bounded(Bounds::new(16.0, 400.0, 8.0)),
    );
    group
}

/// Outline toggle, color and width for a text slot. `prefix` already carries
/// the `Stroke` suffix, e.g. `NameStroke`.
pub fn text_stroke(
    prefix: &str,
    defaults: &Defaults,
    palette: &Palette,
    target: Target,
) -> ControlGroup {
    let mut group = ControlGroup::new();
    group.insert(
        format!("{prefix}Show"),
        Control::new(ControlValue::Bool(true), target.bind(Role::StrokeShow)),
    );
    let color_key = format!("{prefix}Color");
    group.insert(
        color_key.clone(),
        palette_color(
            defaults.color_or(&color_key, palette.white()),
            palette,
            target.bind(Role::StrokeColor),
        ),
    );
    let width_key = format!("{prefix}Width");
    group.insert(
        width_key.clone(),
        Control::new(
            ControlValue::Number(defaults.number_or(&width_key, DEFAULT_STROKE_WIDTH)),
            target.bind(Role::StrokeWidth),
        )
        .bounded(Bounds::new(0.0, 20.0, 1.0)),
    );
    group
}

pub fn font_family(prefix: &str, catalog: &Catalog, target: Target) -> ControlGroup {
    let mut group = ControlGroup::new();
    let default = if catalog.fonts.default_family.is_empty() {
        DEFAULT_FONT_FAMILY.to_owned()
    } else {
        catalog.fonts.default_family.clone()
    };
    let mut choices = vec![default.clone()];
    for family in &catalog.fonts.families {
        if !choices.contains(family) {
            choices.push(family.clone());
        }
    }
    group.insert(
        format!("{prefix}FontFamily"),
        Control::new(ControlValue::Choice(default), target.bind(Role::FontFamily))
            .with_options(ControlOptions::Choices(choices)),
    );
    group
}

pub fn texture_offset(prefix: &str, defaults: &Defaults, target: Target) -> ControlGroup {
    let mut group = ControlGroup::new();
    for (axis, role) in [("X", Role::OffsetX), ("Y", Role::OffsetY)] {
        let key = format!("{prefix}{axis}");
        let control = ranged(&key, defaults, (0.1, -5.0, 5.0, 0.01), target.bind(role));
        group.insert(key, control);
    }
    group
}

pub fn texture_repeat(prefix: &str, defaults: &Defaults, target: Target) -> ControlGroup {
    let mut group = ControlGroup::new();
    for (axis, role) in [("X", Role::RepeatX), ("Y", Role::RepeatY)] {
        let key = format!("{prefix}{axis}");
        let control = ranged(&key, defaults, (1.0, 1.0, 10.0, 0.1), target.bind(role));
        group.insert(key, control);
    }
    group
}

/// Single region toggle such as `FrontTexture`.
pub fn texture_toggle(key: &str, defaults: &Defaults, role: Role, target: Target) -> ControlGroup {
    let mut group = ControlGroup::new();
    group.insert(
        key,
        Control::new(
            ControlValue::Bool(defaults.bool_or(key, true)),
            target.bind(role),
        ),
    );
    group
}

pub fn image_gallery(prefix: &str, catalog: &Catalog, target: Target) -> ControlGroup {
    let mut group = ControlGroup::new();
    group.insert(
        format!("{prefix}imageGallery"),
        Control::new(ControlValue::Choice(String::new()), target.bind(Role::Image))
            .with_options(ControlOptions::Choices(catalog.patterns.clone())),
    );
    group
}

pub fn reset_button(panel: Panel) -> ControlGroup {
    let mut group = ControlGroup::new();
    group.insert(
        "Reset",
        Control::new(ControlValue::Button, Binding::Reset { panel }),
    );
    group
}

#[cfg(test)]
mod tests {
    use super::{
        font_size, placement, texture_offset, Binding, Bounds, Control, ControlGroup,
        ControlValue, Defaults, Target,
    };
    use crate::layers::{LayerField, LayerKind};
    use crate::schema::Facing;

    #[test]
    fn later_keys_override_earlier_ones_in_place() {
        let mut group = texture_offset("Offset", &Defaults::new(), Target::Layer(LayerKind::Gradient));
        let other = texture_offset(
            "Offset",
            &Defaults::new().number("OffsetX", 2.0),
            Target::Layer(LayerKind::Pattern),
        );
        group.merge(other);

        assert_eq!(group.keys().collect::<Vec<_>>(), vec!["OffsetX", "OffsetY"]);
        let offset_x = group.get("OffsetX").unwrap();
        assert_eq!(offset_x.value, ControlValue::Number(2.0));
        assert_eq!(
            offset_x.binding,
            Binding::Layer {
                kind: LayerKind::Pattern,
                field: LayerField::OffsetX
            }
        );
    }

    #[test]
    fn placement_defaults_and_overrides() {
        let front = placement("Logo", &Defaults::new(), Facing::Front, Target::Detached);
        let back = placement(
            "Logo",
            &Defaults::new().number("LogoScaleMax", 0.3),
            Facing::Back,
            Target::Detached,
        );
        assert_eq!(front.get("LogoPositionY").unwrap().value, ControlValue::Number(0.44));
        assert_eq!(front.get("LogoRotationY").unwrap().value, ControlValue::Number(0.0));
        assert_eq!(back.get("LogoRotationY").unwrap().value, ControlValue::Number(180.0));
        assert_eq!(
            back.get("LogoScale").unwrap().bounds,
            Some(Bounds::new(0.1, 0.3, 0.01))
        );
        assert_eq!(
            front.get("LogoRotationZ").unwrap().bounds,
            Some(Bounds::new(-180.0, 180.0, 1.0))
        );
        assert_eq!(front, placement("Logo", &Defaults::new(), Facing::Front, Target::Detached));
    }

    #[test]
    fn accept_clamps_and_rejects_mismatches() {
        let group = font_size("Name", &Defaults::new(), Target::Detached);
        let control = group.get("NameFontSize").unwrap();
        assert_eq!(
            control.accept(ControlValue::Number(1000.0)),
            Some(ControlValue::Number(400.0))
        );
        assert_eq!(control.accept(ControlValue::Bool(true)), None);
        assert_eq!(control.accept(ControlValue::Number(f32::NAN)), None);
    }

    #[test]
    fn parse_value_uses_current_type() {
        let control = Control::new(ControlValue::Number(0.0), Binding::None);
        assert_eq!(
            control.parse_value(&serde_json::json!(0.5)).unwrap(),
            ControlValue::Number(0.5)
        );
        assert!(control.parse_value(&serde_json::json!("x")).is_err());
    }

    #[test]
    fn empty_group_serializes_as_empty_map() {
        let group = ControlGroup::new();
        assert_eq!(serde_json::to_string(&group).unwrap(), "{}");
    }
}
