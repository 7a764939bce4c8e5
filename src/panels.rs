use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::branding::BrandingSlotKind;
use crate::config::{Catalog, DEFAULT_FABRIC};
use crate::controls::{
    font_family, font_size, image_gallery, image_properties, placement, reset_button, text_color,
    text_control, text_stroke, texture_offset, texture_repeat, texture_toggle, Binding, Control,
    ControlGroup, ControlOptions, ControlValue, Defaults, Role, Target,
};
use crate::layers::LayerKind;
use crate::schema::{ColorTarget, Facing, RegionGroup, Side};

/// Mirrored sleeve rotation around Y, in degrees, for the left side.
pub const SLEEVE_ROTATION_Y: f32 = 82.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    Fabric,
    Colors,
    TextureBranding,
    FrontBranding,
    BackBranding,
    LeftSleeve,
    RightSleeve,
}

impl Panel {
    pub const ALL: [Self; 7] = [
        Self::Fabric,
        Self::Colors,
        Self::TextureBranding,
        Self::FrontBranding,
        Self::BackBranding,
        Self::LeftSleeve,
        Self::RightSleeve,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fabric => "fabric",
            Self::Colors => "colors",
            Self::TextureBranding => "texture_branding",
            Self::FrontBranding => "front_branding",
            Self::BackBranding => "back_branding",
            Self::LeftSleeve => "left_sleeve",
            Self::RightSleeve => "right_sleeve",
        }
    }

    /// Region group whose branding slots this panel edits.
    pub fn branding_group(self) -> Option<RegionGroup> {
        match self {
            Self::FrontBranding => Some(RegionGroup::Front),
            Self::BackBranding => Some(RegionGroup::Back),
            Self::LeftSleeve => Some(RegionGroup::LeftSleeve),
            Self::RightSleeve => Some(RegionGroup::RightSleeve),
            Self::Fabric | Self::Colors | Self::TextureBranding => None,
        }
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Panel {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|panel| panel.as_str() == normalized)
            .ok_or_else(|| {
                anyhow!(
                    "unknown panel '{raw}' (expected one of: {})",
                    Self::ALL.map(Panel::as_str).join(", ")
                )
            })
    }
}

pub fn build_panel(panel: Panel, catalog: &Catalog) -> ControlGroup {
    match panel {
        Panel::Fabric => fabric_panel(catalog),
        Panel::Colors => colors_panel(catalog),
        Panel::TextureBranding => texture_branding_panel(catalog),
        Panel::FrontBranding => chest_panel(RegionGroup::Front, Facing::Front, catalog),
        Panel::BackBranding => chest_panel(RegionGroup::Back, Facing::Back, catalog),
        Panel::LeftSleeve => sleeve_panel(Side::Left, catalog),
        Panel::RightSleeve => sleeve_panel(Side::Right, catalog),
    }
}

fn fabric_panel(catalog: &Catalog) -> ControlGroup {
    let mut group = ControlGroup::new();
    group.insert(
        "Fabric",
        Control::new(ControlValue::Choice(DEFAULT_FABRIC.to_owned()), Binding::Fabric)
            .with_options(ControlOptions::Choices(catalog.fabric_names())),
    );
    group
}

fn colors_panel(catalog: &Catalog) -> ControlGroup {
    let palette = &catalog.palette;
    let mut colors = ControlGroup::new();
    for (key, color) in [
        ("BaseColor", ColorTarget::Shirt),
        ("CollarColor", ColorTarget::Collar),
        ("SleeveColor", ColorTarget::Sleeve),
        ("StripeColor", ColorTarget::SleeveStripe),
    ] {
        colors.insert(
            key,
            Control::new(
                ControlValue::Color(palette.white()),
                Binding::BaseColor { color },
            )
            .with_options(ControlOptions::Palette(palette.clone())),
        );
    }
    let mut group = colors.in_folder("Color");
    group.merge(reset_button(Panel::Colors));
    group
}

fn texture_branding_panel(catalog: &Catalog) -> ControlGroup {
    let palette = &catalog.palette;
    let none = Defaults::new();
    let mut group = ControlGroup::new();

    let gradient = Target::Layer(LayerKind::Gradient);
    let mut folder = ControlGroup::new();
    for (region, role) in [
        ("Front", Role::Front),
        ("Back", Role::Back),
        ("Sleeve", Role::Sleeve),
        ("Collar", Role::Collar),
    ] {
        folder.merge(texture_toggle(&format!("{region}Gradient"), &none, role, gradient));
    }
    folder.merge(image_properties("Gradient", &none, palette, gradient));
    folder.merge(texture_offset("Offset", &none, gradient));
    folder.merge(texture_repeat("Repeat", &none, gradient));
    group.merge(folder.in_folder("Gradient"));

    for kind in [LayerKind::Pattern, LayerKind::Object] {
        let prefix = kind.prefix();
        let target = Target::Layer(kind);
        let mut folder = ControlGroup::new();
        folder.merge(texture_toggle(&format!("Front{prefix}"), &none, Role::Front, target));
        folder.merge(texture_toggle(&format!("Back{prefix}"), &none, Role::Back, target));
        folder.merge(image_properties(prefix, &none, palette, target));
        folder.merge(image_gallery(prefix, catalog, target));
        if kind == LayerKind::Pattern {
            folder.merge(texture_offset(&format!("{prefix}Offset"), &none, target));
            folder.merge(texture_repeat(&format!("{prefix}Repeat"), &none, target));
        }
        folder.merge(placement(prefix, &none, Facing::Front, target));
        group.merge(folder.in_folder(prefix));
    }
    group
}

fn chest_panel(region_group: RegionGroup, facing: Facing, catalog: &Catalog) -> ControlGroup {
    let palette = &catalog.palette;
    let slot = |kind| Target::Branding(region_group, kind);
    let mut group = ControlGroup::new();

    let logo = slot(BrandingSlotKind::Logo);
    group.merge(image_properties("Logo", &Defaults::new(), palette, logo));
    group.merge(placement(
        "Logo",
        &Defaults::new()
            .number("LogoPositionX", -0.08)
            .number("LogoPositionY", 0.55)
            .number("LogoScale", 0.11),
        facing,
        logo,
    ));

    let sponsor = slot(BrandingSlotKind::Sponsor);
    group.merge(image_properties("Sponsor", &Defaults::new(), palette, sponsor));
    group.merge(placement(
        "Sponsor",
        &Defaults::new()
            .number("SponsorPositionX", 0.01)
            .number("SponsorPositionY", 0.21)
            .number("SponsorScale", 0.15),
        facing,
        sponsor,
    ));

    for (kind, value, size, position) in [
        (BrandingSlotKind::Name, "TEAM NAME", 70.0, Defaults::new().number("NameScale", 1.0)),
        (
            BrandingSlotKind::Number,
            "23",
            166.0,
            Defaults::new()
                .number("NumberScale", 1.0)
                .number("NumberPositionY", 0.38),
        ),
    ] {
        let prefix = kind.prefix();
        let target = slot(kind);
        let text_defaults = Defaults::new()
            .text(format!("{prefix}Value"), value)
            .number(format!("{prefix}FontSizeValue"), size);
        group.merge(text_control(prefix, &text_defaults, target));
        group.merge(text_color(prefix, palette, target));
        group.merge(font_size(prefix, &text_defaults, target));
        group.merge(text_stroke(&format!("{prefix}Stroke"), &Defaults::new(), palette, target));
        group.merge(font_family(prefix, catalog, target));
        group.merge(placement(prefix, &position, facing, target));
    }

    let panel = match region_group {
        RegionGroup::Back => Panel::BackBranding,
        _ => Panel::FrontBranding,
    };
    group.merge(reset_button(panel));
    group
}

fn sleeve_panel(side: Side, catalog: &Catalog) -> ControlGroup {
    let palette = &catalog.palette;
    let (region_group, panel) = match side {
        Side::Left => (RegionGroup::LeftSleeve, Panel::LeftSleeve),
        Side::Right => (RegionGroup::RightSleeve, Panel::RightSleeve),
    };
    let rotation_y = SLEEVE_ROTATION_Y * side.rotation_sign();
    let slot = |kind| Target::Branding(region_group, kind);
    let mut group = ControlGroup::new();

    let logo = slot(BrandingSlotKind::Logo);
    group.merge(image_properties("Logo", &Defaults::new(), palette, logo));
    group.merge(placement(
        "Logo",
        &Defaults::new()
            .number("LogoPositionXMin", -0.5)
            .number("LogoPositionXMax", 0.25)
            .number("LogoPositionY", 0.58)
            .number("LogoPositionYMin", 0.47)
            .number("LogoPositionYMax", 0.65)
            .number("LogoScale", 0.05)
            .number("LogoScaleMin", 0.02)
            .number("LogoScaleMax", 0.3)
            .number("LogoRotationX", 180.0)
            .number("LogoRotationY", rotation_y)
            .number("LogoRotationZ", 180.0),
        Facing::Front,
        logo,
    ));

    for (kind, value, position_y) in [
        (BrandingSlotKind::Name, "TEAM NAME", 0.54),
        (BrandingSlotKind::Number, "23", 0.52),
    ] {
        let prefix = kind.prefix();
        let target = slot(kind);
        let key = |suffix: &str| format!("{prefix}{suffix}");
        group.merge(text_control(
            prefix,
            &Defaults::new().text(key("Value"), value),
            target,
        ));
        group.merge(placement(
            prefix,
            &Defaults::new()
                .number(key("PositionX"), 0.03)
                .number(key("PositionXMin"), -0.25)
                .number(key("PositionXMax"), 0.5)
                .number(key("PositionY"), position_y)
                .number(key("PositionYMin"), 0.47)
                .number(key("PositionYMax"), 0.65)
                .number(key("Scale"), 0.5)
                .number(key("ScaleMin"), 0.02)
                .number(key("ScaleMax"), 0.9)
                .number(key("RotationX"), 180.0)
                .number(key("RotationY"), rotation_y)
                .number(key("RotationZ"), -180.0),
            Facing::Front,
            target,
        ));
        group.merge(text_color(prefix, palette, target));
        group.merge(font_size(prefix, &Defaults::new(), target));
        group.merge(text_stroke(&key("Stroke"), &Defaults::new(), palette, target));
        group.merge(font_family(prefix, catalog, target));
    }

    group.merge(reset_button(panel));
    group
}

#[cfg(test)]
mod tests {
    use super::{build_panel, Panel};
    use crate::config::Catalog;
    use crate::controls::{Binding, ControlValue};

    #[test]
    fn panel_names_parse_loosely() {
        assert_eq!("Texture-Branding".parse::<Panel>().unwrap(), Panel::TextureBranding);
        assert_eq!("left_sleeve".parse::<Panel>().unwrap(), Panel::LeftSleeve);
        assert!("sleeves".parse::<Panel>().is_err());
    }

    #[test]
    fn every_panel_is_deterministic() {
        let catalog = Catalog::default();
        for panel in Panel::ALL {
            assert_eq!(build_panel(panel, &catalog), build_panel(panel, &catalog));
        }
    }

    #[test]
    fn back_branding_faces_away() {
        let catalog = Catalog::default();
        let back = build_panel(Panel::BackBranding, &catalog);
        let front = build_panel(Panel::FrontBranding, &catalog);
        assert_eq!(back.get("LogoRotationY").unwrap().value, ControlValue::Number(180.0));
        assert_eq!(front.get("LogoRotationY").unwrap().value, ControlValue::Number(0.0));
        assert_eq!(
            front.get("Reset").unwrap().binding,
            Binding::Reset {
                panel: Panel::FrontBranding
            }
        );
    }

    #[test]
    fn sleeves_carry_no_sponsor() {
        let catalog = Catalog::default();
        let sleeve = build_panel(Panel::LeftSleeve, &catalog);
        assert!(sleeve.get("Sponsor").is_none());
        assert!(sleeve.get("ShowLogo").is_some());
        assert_eq!(sleeve.get("NameFontSize").unwrap().value, ControlValue::Number(64.0));
    }
}
