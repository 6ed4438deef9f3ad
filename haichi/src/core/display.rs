use bitflags::bitflags;

use crate::macos::{Bounds, DisplayId, DisplayInfo};

/// A display as currently reported by the OS. Recomputed on every probe.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveDisplay {
    pub id: DisplayId,
    pub name: String,
    pub bounds: Rect,
    pub is_main: bool,
    pub is_builtin: bool,
    pub vendor: u32,
    pub model: u32,
}

impl LiveDisplay {
    pub fn from_display_info(info: &DisplayInfo) -> Self {
        Self {
            id: info.id,
            name: info.name.clone(),
            bounds: Rect::from_bounds(&info.frame),
            is_main: info.is_main,
            is_builtin: info.is_builtin,
            vendor: info.vendor,
            model: info.model,
        }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.bounds.x, self.bounds.y)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_bounds(bounds: &Bounds) -> Self {
        Self::new(
            bounds.x.round() as i32,
            bounds.y.round() as i32,
            bounds.width.round() as i32,
            bounds.height.round() as i32,
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

bitflags! {
    /// CGDisplayChangeSummaryFlags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ReconfigFlags: u32 {
        const BEGIN_CONFIGURATION = 1 << 0;
        const MOVED = 1 << 1;
        const SET_MAIN = 1 << 2;
        const SET_MODE = 1 << 3;
        const ADD = 1 << 4;
        const REMOVE = 1 << 5;
        const ENABLED = 1 << 8;
        const DISABLED = 1 << 9;
        const MIRROR = 1 << 10;
        const UNMIRROR = 1 << 11;
        const DESKTOP_SHAPE_CHANGED = 1 << 12;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Pre-change notification; the real one follows.
    BeginConfiguration,
    Topology,
    ShapeOnly,
    Other,
}

impl ReconfigFlags {
    const TOPOLOGY: Self = Self::ADD
        .union(Self::REMOVE)
        .union(Self::MIRROR)
        .union(Self::UNMIRROR);

    pub fn classify(self) -> ChangeKind {
        if self.contains(Self::BEGIN_CONFIGURATION) {
            ChangeKind::BeginConfiguration
        } else if self.intersects(Self::TOPOLOGY) {
            ChangeKind::Topology
        } else if self.contains(Self::DESKTOP_SHAPE_CHANGED) {
            ChangeKind::ShapeOnly
        } else {
            ChangeKind::Other
        }
    }
}
