use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};

/// sRGB color as exposed by every color control and palette entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Self = Self::rgb(0xFF, 0xFF, 0xFF);
    pub const BLACK: Self = Self::rgb(0x00, 0x00, 0x00);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn parse_hex(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let Some(hex) = trimmed.strip_prefix('#') else {
            bail!("color '{trimmed}' must start with '#'");
        };
        let expanded = match hex.len() {
            3 => hex.chars().flat_map(|ch| [ch, ch]).collect::<String>(),
            6 => hex.to_owned(),
            _ => bail!("color '{trimmed}' must be #RGB or #RRGGBB"),
        };
        let value = u32::from_str_radix(&expanded, 16)
            .map_err(|error| anyhow!("color '{trimmed}' is not valid hex: {error}"))?;
        Ok(Self::rgb(
            ((value >> 16) & 0xFF) as u8,
            ((value >> 8) & 0xFF) as u8,
            (value & 0xFF) as u8,
        ))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    pub fn as_rgba(self, alpha: u8) -> [u8; 4] {
        [self.r, self.g, self.b, alpha]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        Self::parse_hex(raw)
    }
}

impl Serialize for Color {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse_hex(&raw).map_err(D::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub const fn splat(value: f32) -> Self {
        Self { x: value, y: value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_radians(self) -> Self {
        Self::new(self.x.to_radians(), self.y.to_radians(), self.z.to_radians())
    }
}

/// Addressable surface of the garment mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Front,
    Back,
    Shell,
    Collar,
    CollarBack,
    CollarThread,
    LeftSleeve,
    LeftSleeveStripe,
    RightSleeve,
    RightSleeveStripe,
    Button,
}

impl Region {
    pub const ALL: [Self; 11] = [
        Self::Front,
        Self::Back,
        Self::Shell,
        Self::Collar,
        Self::CollarBack,
        Self::CollarThread,
        Self::LeftSleeve,
        Self::LeftSleeveStripe,
        Self::RightSleeve,
        Self::RightSleeveStripe,
        Self::Button,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Back => "back",
            Self::Shell => "shell",
            Self::Collar => "collar",
            Self::CollarBack => "collar_back",
            Self::CollarThread => "collar_thread",
            Self::LeftSleeve => "left_sleeve",
            Self::LeftSleeveStripe => "left_sleeve_stripe",
            Self::RightSleeve => "right_sleeve",
            Self::RightSleeveStripe => "right_sleeve_stripe",
            Self::Button => "button",
        }
    }

    /// Material zone whose clone this region renders with. `None` means the
    /// mesh's own material is used untouched.
    pub fn zone(self) -> Option<Zone> {
        match self {
            Self::Front | Self::Shell => Some(Zone::ShirtFront),
            Self::Back => Some(Zone::ShirtBack),
            Self::Collar | Self::CollarBack | Self::CollarThread => Some(Zone::Collar),
            Self::LeftSleeve | Self::RightSleeve => Some(Zone::Sleeve),
            Self::LeftSleeveStripe | Self::RightSleeveStripe => Some(Zone::SleeveStripe),
            Self::Button => None,
        }
    }

    /// Branding group whose decals project onto this region.
    pub fn branding_group(self) -> Option<RegionGroup> {
        match self {
            Self::Front => Some(RegionGroup::Front),
            Self::Back => Some(RegionGroup::Back),
            Self::LeftSleeve => Some(RegionGroup::LeftSleeve),
            Self::RightSleeve => Some(RegionGroup::RightSleeve),
            _ => None,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|region| region.as_str() == raw)
            .ok_or_else(|| anyhow!("unknown region '{raw}'"))
    }
}

/// One cloned material per zone; regions sharing a zone share its clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    ShirtFront,
    ShirtBack,
    Collar,
    Sleeve,
    SleeveStripe,
}

impl Zone {
    pub const ALL: [Self; 5] = [
        Self::ShirtFront,
        Self::ShirtBack,
        Self::Collar,
        Self::Sleeve,
        Self::SleeveStripe,
    ];

    pub fn color_target(self) -> ColorTarget {
        match self {
            Self::ShirtFront | Self::ShirtBack => ColorTarget::Shirt,
            Self::Collar => ColorTarget::Collar,
            Self::Sleeve => ColorTarget::Sleeve,
            Self::SleeveStripe => ColorTarget::SleeveStripe,
        }
    }
}

/// Base color controls of the Colors panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorTarget {
    Shirt,
    Collar,
    Sleeve,
    SleeveStripe,
}

impl ColorTarget {
    pub const ALL: [Self; 4] = [Self::Shirt, Self::Collar, Self::Sleeve, Self::SleeveStripe];

    pub fn zones(self) -> &'static [Zone] {
        match self {
            Self::Shirt => &[Zone::ShirtFront, Zone::ShirtBack],
            Self::Collar => &[Zone::Collar],
            Self::Sleeve => &[Zone::Sleeve],
            Self::SleeveStripe => &[Zone::SleeveStripe],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionGroup {
    Front,
    Back,
    LeftSleeve,
    RightSleeve,
}

impl RegionGroup {
    pub const ALL: [Self; 4] = [Self::Front, Self::Back, Self::LeftSleeve, Self::RightSleeve];

    pub fn region(self) -> Region {
        match self {
            Self::Front => Region::Front,
            Self::Back => Region::Back,
            Self::LeftSleeve => Region::LeftSleeve,
            Self::RightSleeve => Region::RightSleeve,
        }
    }

    pub fn is_sleeve(self) -> bool {
        matches!(self, Self::LeftSleeve | Self::RightSleeve)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Sign applied to the Y rotation of every sleeve decal.
    pub fn rotation_sign(self) -> f32 {
        match self {
            Self::Left => 1.0,
            Self::Right => -1.0,
        }
    }
}

pub(crate) fn validate_number(label: &str, value: f32) -> Result<()> {
    if !value.is_finite() {
        bail!("{label} must be finite");
    }
    Ok(())
}
