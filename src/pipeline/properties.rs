//! Render properties of a node and the typed updates that change them.

use crate::common::{Color, Vector2f, Vector4f};
use crate::transaction::{Marshal, MarshalError, Parcel};

/// Properties the compositor reads while traversing a node.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderProperties {
    /// `(x, y, width, height)` relative to the parent.
    pub bounds: Vector4f,
    /// Content frame inside the bounds.
    pub frame: Vector4f,
    /// Sibling draw order; larger draws later.
    pub position_z: f32,
    pub pivot: Vector2f,
    /// Degrees.
    pub rotation: f32,
    pub scale: Vector2f,
    pub translate: Vector2f,
    pub alpha: f32,
    pub visible: bool,
    pub background_color: Color,
    pub clip_to_bounds: bool,
}

impl Default for RenderProperties {
    fn default() -> Self {
        Self {
            bounds: Vector4f::default(),
            frame: Vector4f::default(),
            position_z: 0.0,
            pivot: Vector2f::new(0.5, 0.5),
            rotation: 0.0,
            scale: Vector2f::ONE,
            translate: Vector2f::ZERO,
            alpha: 1.0,
            visible: true,
            background_color: Color::TRANSPARENT,
            clip_to_bounds: false,
        }
    }
}

/// Identifies a single property, independent of its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PropertyKind {
    Bounds = 0,
    Frame = 1,
    PositionZ = 2,
    Pivot = 3,
    Rotation = 4,
    Scale = 5,
    Translate = 6,
    Alpha = 7,
    Visible = 8,
    BackgroundColor = 9,
    ClipToBounds = 10,
}

/// A new value for one property.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyUpdate {
    Bounds(Vector4f),
    Frame(Vector4f),
    PositionZ(f32),
    Pivot(Vector2f),
    Rotation(f32),
    Scale(Vector2f),
    Translate(Vector2f),
    Alpha(f32),
    Visible(bool),
    BackgroundColor(Color),
    ClipToBounds(bool),
}

impl PropertyUpdate {
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyUpdate::Bounds(_) => PropertyKind::Bounds,
            PropertyUpdate::Frame(_) => PropertyKind::Frame,
            PropertyUpdate::PositionZ(_) => PropertyKind::PositionZ,
            PropertyUpdate::Pivot(_) => PropertyKind::Pivot,
            PropertyUpdate::Rotation(_) => PropertyKind::Rotation,
            PropertyUpdate::Scale(_) => PropertyKind::Scale,
            PropertyUpdate::Translate(_) => PropertyKind::Translate,
            PropertyUpdate::Alpha(_) => PropertyKind::Alpha,
            PropertyUpdate::Visible(_) => PropertyKind::Visible,
            PropertyUpdate::BackgroundColor(_) => PropertyKind::BackgroundColor,
            PropertyUpdate::ClipToBounds(_) => PropertyKind::ClipToBounds,
        }
    }

    /// Value between `self` (t = 0) and `to` (t = 1).
    ///
    /// Boolean properties step to `to` only at the end. Returns `None` when
    /// the two updates address different properties.
    pub fn interpolate(&self, to: &PropertyUpdate, t: f32) -> Option<PropertyUpdate> {
        use PropertyUpdate::*;
        let lerp = |a: f32, b: f32| a + (b - a) * t;
        let value = match (*self, *to) {
            (Bounds(a), Bounds(b)) => Bounds(a.lerp(b, t)),
            (Frame(a), Frame(b)) => Frame(a.lerp(b, t)),
            (PositionZ(a), PositionZ(b)) => PositionZ(lerp(a, b)),
            (Pivot(a), Pivot(b)) => Pivot(a.lerp(b, t)),
            (Rotation(a), Rotation(b)) => Rotation(lerp(a, b)),
            (Scale(a), Scale(b)) => Scale(a.lerp(b, t)),
            (Translate(a), Translate(b)) => Translate(a.lerp(b, t)),
            (Alpha(a), Alpha(b)) => Alpha(lerp(a, b)),
            (BackgroundColor(a), BackgroundColor(b)) => BackgroundColor(a.lerp(b, t)),
            (Visible(a), Visible(b)) => Visible(if t >= 1.0 { b } else { a }),
            (ClipToBounds(a), ClipToBounds(b)) => ClipToBounds(if t >= 1.0 { b } else { a }),
            _ => return None,
        };
        Some(value)
    }
}

impl RenderProperties {
    /// Apply an update, returning whether anything changed.
    pub fn apply(&mut self, update: &PropertyUpdate) -> bool {
        macro_rules! set {
            ($field:expr, $value:expr) => {{
                let changed = $field != $value;
                $field = $value;
                changed
            }};
        }
        match *update {
            PropertyUpdate::Bounds(v) => set!(self.bounds, v),
            PropertyUpdate::Frame(v) => set!(self.frame, v),
            PropertyUpdate::PositionZ(v) => set!(self.position_z, v),
            PropertyUpdate::Pivot(v) => set!(self.pivot, v),
            PropertyUpdate::Rotation(v) => set!(self.rotation, v),
            PropertyUpdate::Scale(v) => set!(self.scale, v),
            PropertyUpdate::Translate(v) => set!(self.translate, v),
            PropertyUpdate::Alpha(v) => set!(self.alpha, v),
            PropertyUpdate::Visible(v) => set!(self.visible, v),
            PropertyUpdate::BackgroundColor(v) => set!(self.background_color, v),
            PropertyUpdate::ClipToBounds(v) => set!(self.clip_to_bounds, v),
        }
    }

    /// Current value of a property, as an update that would restore it.
    pub fn get(&self, kind: PropertyKind) -> PropertyUpdate {
        match kind {
            PropertyKind::Bounds => PropertyUpdate::Bounds(self.bounds),
            PropertyKind::Frame => PropertyUpdate::Frame(self.frame),
            PropertyKind::PositionZ => PropertyUpdate::PositionZ(self.position_z),
            PropertyKind::Pivot => PropertyUpdate::Pivot(self.pivot),
            PropertyKind::Rotation => PropertyUpdate::Rotation(self.rotation),
            PropertyKind::Scale => PropertyUpdate::Scale(self.scale),
            PropertyKind::Translate => PropertyUpdate::Translate(self.translate),
            PropertyKind::Alpha => PropertyUpdate::Alpha(self.alpha),
            PropertyKind::Visible => PropertyUpdate::Visible(self.visible),
            PropertyKind::BackgroundColor => PropertyUpdate::BackgroundColor(self.background_color),
            PropertyKind::ClipToBounds => PropertyUpdate::ClipToBounds(self.clip_to_bounds),
        }
    }

    /// Whether the node contributes pixels at all.
    pub fn is_drawable(&self) -> bool {
        self.visible && self.alpha > 0.0
    }
}

impl Marshal for PropertyUpdate {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), MarshalError> {
        (self.kind() as u8).marshal(parcel)?;
        match self {
            PropertyUpdate::Bounds(v) | PropertyUpdate::Frame(v) => v.marshal(parcel),
            PropertyUpdate::Pivot(v) | PropertyUpdate::Scale(v) | PropertyUpdate::Translate(v) => {
                v.marshal(parcel)
            }
            PropertyUpdate::PositionZ(v) | PropertyUpdate::Rotation(v) | PropertyUpdate::Alpha(v) => {
                v.marshal(parcel)
            }
            PropertyUpdate::Visible(v) | PropertyUpdate::ClipToBounds(v) => v.marshal(parcel),
            PropertyUpdate::BackgroundColor(v) => v.marshal(parcel),
        }
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, MarshalError> {
        let tag = u8::unmarshal(parcel)?;
        let update = match tag {
            0 => PropertyUpdate::Bounds(Marshal::unmarshal(parcel)?),
            1 => PropertyUpdate::Frame(Marshal::unmarshal(parcel)?),
            2 => PropertyUpdate::PositionZ(Marshal::unmarshal(parcel)?),
            3 => PropertyUpdate::Pivot(Marshal::unmarshal(parcel)?),
            4 => PropertyUpdate::Rotation(Marshal::unmarshal(parcel)?),
            5 => PropertyUpdate::Scale(Marshal::unmarshal(parcel)?),
            6 => PropertyUpdate::Translate(Marshal::unmarshal(parcel)?),
            7 => PropertyUpdate::Alpha(Marshal::unmarshal(parcel)?),
            8 => PropertyUpdate::Visible(Marshal::unmarshal(parcel)?),
            9 => PropertyUpdate::BackgroundColor(Marshal::unmarshal(parcel)?),
            10 => PropertyUpdate::ClipToBounds(Marshal::unmarshal(parcel)?),
            other => {
                return Err(MarshalError::InvalidValue {
                    what: "property kind",
                    value: other as u64,
                })
            }
        };
        Ok(update)
    }
}
