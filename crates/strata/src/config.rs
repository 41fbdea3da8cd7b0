//! Layout options.

use crate::error::{Error, Result};
use crate::geom::Vec2;
use serde::{Deserialize, Serialize};

/// Which of the four compaction directions is used for the vertical placement.
///
/// The names describe where the nodes of a column gravitate to: `BottomRight` aligns blocks to
/// their right-hand neighbours and packs them downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    BottomLeft,
    BottomRight,
    TopLeft,
    TopRight,
    #[default]
    Balanced,
}

impl Direction {
    /// Index of the matching candidate layout, or `None` for [`Direction::Balanced`].
    pub fn candidate_index(self) -> Option<usize> {
        match self {
            Self::BottomRight => Some(0),
            Self::TopRight => Some(1),
            Self::BottomLeft => Some(2),
            Self::TopLeft => Some(3),
            Self::Balanced => None,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "bottom-left" => Self::BottomLeft,
            "bottom-right" => Self::BottomRight,
            "top-left" => Self::TopLeft,
            "top-right" => Self::TopRight,
            "balanced" => Self::Balanced,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SocketAlignment {
    /// Only align the tops of nodes.
    None,
    /// Align sockets or node tops depending on the heights of the nodes.
    #[default]
    Moderate,
    /// Always align sockets with sockets.
    Full,
}

impl SocketAlignment {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "none" => Self::None,
            "moderate" => Self::Moderate,
            "full" => Self::Full,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    #[default]
    Center,
    ActiveOutput,
    ActiveNode,
}

impl Origin {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "center" => Self::Center,
            "active-output" => Self::ActiveOutput,
            "active-node" => Self::ActiveNode,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Number of randomized crossing-minimization restarts.
    pub iterations: usize,
    pub margin: Vec2,
    pub direction: Direction,
    pub socket_alignment: SocketAlignment,
    /// Keep routing nodes as reroute elements instead of dissolving them into plain links.
    pub add_reroutes: bool,
    /// Always attach new reroutes to the lowest common frame of the nodes they connect.
    pub keep_reroutes_outside_frames: bool,
    /// Stack collapsed, stackable nodes on top of one another.
    pub stack_collapsed: bool,
    pub stack_margin_y_factor: f64,
    /// Origin used by the recenter operation.
    pub origin: Origin,
    pub frame_padding: f64,
    pub reroute_size: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            iterations: 25,
            margin: Vec2::new(50.0, 50.0),
            direction: Direction::Balanced,
            socket_alignment: SocketAlignment::Moderate,
            add_reroutes: true,
            keep_reroutes_outside_frames: false,
            stack_collapsed: false,
            stack_margin_y_factor: 0.5,
            origin: Origin::Center,
            frame_padding: 29.0,
            reroute_size: 8.0,
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(Error::InvalidConfig { message });
        if self.iterations == 0 {
            return invalid("iterations must be at least 1".to_string());
        }
        if !(self.margin.x >= 0.0 && self.margin.y >= 0.0) {
            return invalid(format!(
                "margin must be non-negative, got ({}, {})",
                self.margin.x, self.margin.y
            ));
        }
        if !(0.0..=1.0).contains(&self.stack_margin_y_factor) {
            return invalid(format!(
                "stack_margin_y_factor must be within [0, 1], got {}",
                self.stack_margin_y_factor
            ));
        }
        if !(self.frame_padding >= 0.0 && self.reroute_size >= 0.0) {
            return invalid("frame_padding and reroute_size must be non-negative".to_string());
        }
        Ok(())
    }
}
