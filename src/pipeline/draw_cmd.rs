//! Recorded draw operations attached to canvas nodes.
//!
//! The compositor never interprets these; it hands them to the drawing
//! backend together with the node's geometry.

use crate::common::{Color, Vector2f, Vector4f};
use crate::transaction::{Marshal, MarshalError, Parcel};

/// A single draw operation in node-local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// Filled rectangle `(x, y, width, height)`.
    Rect { rect: Vector4f, color: Color },

    /// Filled rectangle with rounded corners.
    RoundRect {
        rect: Vector4f,
        /// Corner radius in pixels
        radius: f32,
        color: Color,
    },

    /// Filled circle.
    Circle {
        center: Vector2f,
        radius: f32,
        color: Color,
    },

    /// A run of text at a baseline origin.
    Text {
        origin: Vector2f,
        text: String,
        font_size: f32,
        color: Color,
    },

    /// An image resource referenced by id, scaled into `rect`.
    Image { rect: Vector4f, image_id: u64 },
}

/// Which of a node's recording slots a draw list fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DrawSlot {
    Background = 0,
    Content = 1,
    Foreground = 2,
    Overlay = 3,
}

impl DrawSlot {
    pub const COUNT: usize = 4;

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Recorded draw operations with the canvas size they were recorded at.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DrawCmdList {
    pub width: i32,
    pub height: i32,
    pub ops: Vec<DrawOp>,
}

impl DrawCmdList {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    pub fn push(&mut self, op: DrawOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl Marshal for DrawSlot {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), MarshalError> {
        (*self as u8).marshal(parcel)
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, MarshalError> {
        match u8::unmarshal(parcel)? {
            0 => Ok(DrawSlot::Background),
            1 => Ok(DrawSlot::Content),
            2 => Ok(DrawSlot::Foreground),
            3 => Ok(DrawSlot::Overlay),
            other => Err(MarshalError::InvalidValue {
                what: "draw slot",
                value: other as u64,
            }),
        }
    }
}

impl Marshal for DrawOp {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), MarshalError> {
        match self {
            DrawOp::Rect { rect, color } => {
                0u8.marshal(parcel)?;
                rect.marshal(parcel)?;
                color.marshal(parcel)
            }
            DrawOp::RoundRect {
                rect,
                radius,
                color,
            } => {
                1u8.marshal(parcel)?;
                rect.marshal(parcel)?;
                radius.marshal(parcel)?;
                color.marshal(parcel)
            }
            DrawOp::Circle {
                center,
                radius,
                color,
            } => {
                2u8.marshal(parcel)?;
                center.marshal(parcel)?;
                radius.marshal(parcel)?;
                color.marshal(parcel)
            }
            DrawOp::Text {
                origin,
                text,
                font_size,
                color,
            } => {
                3u8.marshal(parcel)?;
                origin.marshal(parcel)?;
                text.marshal(parcel)?;
                font_size.marshal(parcel)?;
                color.marshal(parcel)
            }
            DrawOp::Image { rect, image_id } => {
                4u8.marshal(parcel)?;
                rect.marshal(parcel)?;
                image_id.marshal(parcel)
            }
        }
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, MarshalError> {
        let op = match u8::unmarshal(parcel)? {
            0 => DrawOp::Rect {
                rect: Marshal::unmarshal(parcel)?,
                color: Marshal::unmarshal(parcel)?,
            },
            1 => DrawOp::RoundRect {
                rect: Marshal::unmarshal(parcel)?,
                radius: Marshal::unmarshal(parcel)?,
                color: Marshal::unmarshal(parcel)?,
            },
            2 => DrawOp::Circle {
                center: Marshal::unmarshal(parcel)?,
                radius: Marshal::unmarshal(parcel)?,
                color: Marshal::unmarshal(parcel)?,
            },
            3 => DrawOp::Text {
                origin: Marshal::unmarshal(parcel)?,
                text: Marshal::unmarshal(parcel)?,
                font_size: Marshal::unmarshal(parcel)?,
                color: Marshal::unmarshal(parcel)?,
            },
            4 => DrawOp::Image {
                rect: Marshal::unmarshal(parcel)?,
                image_id: Marshal::unmarshal(parcel)?,
            },
            other => {
                return Err(MarshalError::InvalidValue {
                    what: "draw op",
                    value: other as u64,
                })
            }
        };
        Ok(op)
    }
}

impl Marshal for DrawCmdList {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), MarshalError> {
        self.width.marshal(parcel)?;
        self.height.marshal(parcel)?;
        self.ops.marshal(parcel)
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, MarshalError> {
        Ok(Self {
            width: Marshal::unmarshal(parcel)?,
            height: Marshal::unmarshal(parcel)?,
            ops: Marshal::unmarshal(parcel)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_list_round_trip() {
        let mut list = DrawCmdList::new(100, 40);
        list.push(DrawOp::Rect {
            rect: Vector4f::new(0.0, 0.0, 100.0, 40.0),
            color: Color::WHITE,
        })
        .push(DrawOp::Text {
            origin: Vector2f::new(4.0, 30.0),
            text: "clock".into(),
            font_size: 14.0,
            color: Color::BLACK,
        });

        let mut parcel = Parcel::new();
        list.marshal(&mut parcel).unwrap();
        let mut reader = Parcel::from_bytes(parcel.into_bytes());
        assert_eq!(DrawCmdList::unmarshal(&mut reader).unwrap(), list);
    }

    #[test]
    fn test_truncated_draw_list_fails_whole() {
        let mut list = DrawCmdList::new(1, 1);
        list.push(DrawOp::Image {
            rect: Vector4f::default(),
            image_id: 9,
        });
        let mut parcel = Parcel::new();
        list.marshal(&mut parcel).unwrap();
        let mut bytes = parcel.into_bytes();
        bytes.pop();
        assert!(DrawCmdList::unmarshal(&mut Parcel::from_bytes(bytes)).is_err());
    }
}
