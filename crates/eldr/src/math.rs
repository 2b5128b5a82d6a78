//! Value types with dedicated textual forms.
//!
//! [`Color`] and [`Rect`] are neither containers nor streamable composites,
//! so they serialize as the compact strings `"(r, g, b, a)"` and
//! `"(x, y, w, h)"`.

use serde_json::Value;

use crate::schema::SchemaValue;
use crate::schema::convert::parse_parenthesized;

/// An 8-bit RGBA color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl SchemaValue for Color {
    fn to_value(&self) -> Value {
        Value::String(format!("({}, {}, {}, {})", self.r, self.g, self.b, self.a))
    }

    fn from_value(&mut self, value: &Value) -> bool {
        let Value::String(text) = value else {
            return false;
        };
        match parse_parenthesized::<4>(text) {
            Some([r, g, b, a]) => {
                self.r = r as u8;
                self.g = g as u8;
                self.b = b as u8;
                self.a = a as u8;
                true
            }
            None => {
                log::warn!("Cannot parse '{text}' as Color.");
                false
            }
        }
    }
}

/// An axis-aligned rectangle: position plus extent.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && py >= self.y && px < self.x + self.w && py < self.y + self.h
    }
}

impl SchemaValue for Rect {
    fn to_value(&self) -> Value {
        Value::String(format!("({}, {}, {}, {})", self.x, self.y, self.w, self.h))
    }

    fn from_value(&mut self, value: &Value) -> bool {
        let Value::String(text) = value else {
            return false;
        };
        match parse_parenthesized::<4>(text) {
            Some([x, y, w, h]) => {
                self.x = x;
                self.y = y;
                self.w = w;
                self.h = h;
                true
            }
            None => {
                log::warn!("Cannot parse '{text}' as Rect.");
                false
            }
        }
    }
}
