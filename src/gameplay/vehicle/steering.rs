use crate::config::SteeringConfig;
use bevy::prelude::*;

/// Position target for both steering-axle motors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringTarget {
    pub angle: f32,
    pub stiffness: f32,
    pub damping: f32,
}

impl Default for SteeringTarget {
    fn default() -> Self {
        SteeringPolicy::default().target(false, false)
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct SteeringPolicy {
    pub max_angle: f32,
    pub stiffness: f32,
    pub damping: f32,
}

impl SteeringPolicy {
    pub fn from_config(config: &SteeringConfig) -> Self {
        Self {
            max_angle: config.max_angle_rad,
            stiffness: config.stiffness,
            damping: config.damping,
        }
    }

    pub fn target(&self, left: bool, right: bool) -> SteeringTarget {
        let right_angle = if right { self.max_angle } else { 0.0 };
        let left_angle = if left { self.max_angle } else { 0.0 };
        SteeringTarget {
            angle: right_angle - left_angle,
            stiffness: self.stiffness,
            damping: self.damping,
        }
    }
}

impl Default for SteeringPolicy {
    fn default() -> Self {
        Self {
            max_angle: 0.6,
            stiffness: 100.0,
            damping: 10.0,
        }
    }
}
