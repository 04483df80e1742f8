//! Controller configuration components.
//!
//! This module defines the tuning for first-person characters: stance speeds,
//! capsule profiles, floating parameters, look sensitivity and the
//! interaction probe. Configs are validated once when a character is built
//! (see [`FirstPersonCharacter`](crate::character::FirstPersonCharacter)),
//! never at step time.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collision::LayerMask;
use crate::state::Stance;

/// Errors produced while validating or parsing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value that must be strictly positive was zero, negative or not finite.
    #[error("`{field}` must be positive and finite, got {value}")]
    NotPositive { field: &'static str, value: f32 },

    /// A value that may be zero was negative or not finite.
    #[error("`{field}` must be zero or positive and finite, got {value}")]
    Negative { field: &'static str, value: f32 },

    /// Pitch limits are in the wrong order.
    #[error("pitch limits are inverted: min {min} > max {max}")]
    InvertedPitchLimits { min: f32, max: f32 },

    /// A direction vector had zero length.
    #[error("`{field}` must be a non-zero direction")]
    ZeroDirection { field: &'static str },

    /// The RON source could not be parsed.
    #[error("invalid configuration: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

/// Height and center offset of the collision capsule for one posture.
///
/// `center` is the local Y offset of the capsule center from the body origin.
/// It doubles as the float height target: the ground probe starts at the
/// capsule center, so hovering at `center` above the ground keeps the body
/// origin at ground level.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapsuleProfile {
    /// Total capsule height, caps included.
    pub height: f32,
    /// Local Y offset of the capsule center.
    pub center: f32,
}

impl CapsuleProfile {
    /// Create a new profile.
    pub const fn new(height: f32, center: f32) -> Self {
        Self { height, center }
    }

    /// Default standing profile.
    pub const STANDING: Self = Self::new(1.25, 1.175);

    /// Default crouched profile.
    pub const CROUCHED: Self = Self::new(0.875, 0.8225);

    /// Linear interpolation between two profiles.
    pub fn lerp(self, target: Self, t: f32) -> Self {
        Self {
            height: self.height + (target.height - self.height) * t,
            center: self.center + (target.center - self.center) * t,
        }
    }

    /// Local Y of the top of the capsule.
    #[inline]
    pub fn top(&self) -> f32 {
        self.center + self.height / 2.0
    }

    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        positive(name, self.height)?;
        non_negative(name, self.center)
    }
}

/// Configuration parameters for locomotion and stance control.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[reflect(Component)]
#[serde(default)]
pub struct ControllerConfig {
    // === Speeds ===
    /// Planar speed while walking (units/second).
    pub walk_speed: f32,
    /// Planar speed while crouched (units/second).
    pub crouch_speed: f32,
    /// Planar speed while sprinting (units/second).
    pub sprint_speed: f32,

    // === Capsule ===
    /// Capsule profile while standing.
    pub standing: CapsuleProfile,
    /// Capsule profile while crouched.
    pub crouched: CapsuleProfile,
    /// Capsule radius, shared by both profiles.
    pub capsule_radius: f32,
    /// Seconds a full crouch/stand transition takes. Zero snaps instantly.
    pub crouch_time: f32,

    // === Floating ===
    /// Maximum length of the downward ground probe, measured from the capsule center.
    pub ground_probe_length: f32,
    /// Gain applied to the height error when computing the float correction.
    pub float_gain: f32,
    /// Layers the ground probe may hit.
    pub ground_layers: LayerMask,

    // === Input modes ===
    /// Crouch only while the button is held (otherwise press toggles).
    pub hold_to_crouch: bool,
    /// Sprint only while the button is held (otherwise press toggles).
    pub hold_to_sprint: bool,

    // === Head ===
    /// Height of the reference character model.
    pub model_height: f32,
    /// Local eye height of the reference model.
    pub head_height: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            walk_speed: 5.0,
            crouch_speed: 2.5,
            sprint_speed: 8.0,

            standing: CapsuleProfile::STANDING,
            crouched: CapsuleProfile::CROUCHED,
            capsule_radius: 0.3,
            crouch_time: 1.0,

            ground_probe_length: 1.5,
            float_gain: 25.0,
            ground_layers: LayerMask::ALL,

            hold_to_crouch: false,
            hold_to_sprint: true,

            model_height: 1.8,
            head_height: 1.6,
        }
    }
}

impl ControllerConfig {
    /// Parse a config from RON and validate it.
    ///
    /// Missing fields fall back to [`ControllerConfig::default`].
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value for configuration faults.
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("walk_speed", self.walk_speed)?;
        non_negative("crouch_speed", self.crouch_speed)?;
        non_negative("sprint_speed", self.sprint_speed)?;
        self.standing.validate("standing")?;
        self.crouched.validate("crouched")?;
        positive("capsule_radius", self.capsule_radius)?;
        non_negative("crouch_time", self.crouch_time)?;
        positive("ground_probe_length", self.ground_probe_length)?;
        positive("float_gain", self.float_gain)?;
        positive("model_height", self.model_height)?;
        non_negative("head_height", self.head_height)?;
        Ok(())
    }

    /// Planar speed associated with a stance.
    pub fn speed_for(&self, stance: Stance) -> f32 {
        match stance {
            Stance::Walk => self.walk_speed,
            Stance::Crouch => self.crouch_speed,
            Stance::Sprint => self.sprint_speed,
        }
    }

    /// Ratio between eye height and model height, fixed per character.
    pub fn head_to_height_ratio(&self) -> f32 {
        if self.model_height > 0.0 {
            self.head_height / self.model_height
        } else {
            0.0
        }
    }

    /// Profile for the given posture.
    pub fn profile(&self, crouched: bool) -> CapsuleProfile {
        if crouched {
            self.crouched
        } else {
            self.standing
        }
    }

    /// Builder: set the three stance speeds.
    pub fn with_speeds(mut self, walk: f32, crouch: f32, sprint: f32) -> Self {
        self.walk_speed = walk;
        self.crouch_speed = crouch;
        self.sprint_speed = sprint;
        self
    }

    /// Builder: set the standing and crouched capsule profiles.
    pub fn with_profiles(mut self, standing: CapsuleProfile, crouched: CapsuleProfile) -> Self {
        self.standing = standing;
        self.crouched = crouched;
        self
    }

    /// Builder: set the crouch/stand transition time.
    pub fn with_crouch_time(mut self, seconds: f32) -> Self {
        self.crouch_time = seconds;
        self
    }

    /// Builder: set floating parameters.
    pub fn with_float(mut self, gain: f32, probe_length: f32) -> Self {
        self.float_gain = gain;
        self.ground_probe_length = probe_length;
        self
    }

    /// Builder: set the ground layers.
    pub fn with_ground_layers(mut self, layers: LayerMask) -> Self {
        self.ground_layers = layers;
        self
    }

    /// Builder: hold-to-crouch instead of toggle.
    pub fn with_hold_to_crouch(mut self, hold: bool) -> Self {
        self.hold_to_crouch = hold;
        self
    }

    /// Builder: hold-to-sprint instead of toggle.
    pub fn with_hold_to_sprint(mut self, hold: bool) -> Self {
        self.hold_to_sprint = hold;
        self
    }

    /// Builder: set the reference model proportions used for eye height.
    pub fn with_head(mut self, model_height: f32, head_height: f32) -> Self {
        self.model_height = model_height;
        self.head_height = head_height;
        self
    }
}

/// Mouse look configuration. Angles are in degrees.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[reflect(Component)]
#[serde(default)]
pub struct LookConfig {
    /// Degrees of yaw per unit of horizontal look input.
    pub sensitivity_x: f32,
    /// Degrees of pitch per unit of vertical look input.
    pub sensitivity_y: f32,
    /// Invert horizontal look.
    pub invert_x: bool,
    /// Invert vertical look.
    pub invert_y: bool,
    /// Lowest pitch (looking up).
    pub min_pitch: f32,
    /// Highest pitch (looking down).
    pub max_pitch: f32,
}

impl Default for LookConfig {
    fn default() -> Self {
        Self {
            sensitivity_x: 2.0,
            sensitivity_y: 2.0,
            invert_x: false,
            invert_y: true,
            min_pitch: -90.0,
            max_pitch: 90.0,
        }
    }
}

impl LookConfig {
    /// Check every value for configuration faults.
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("sensitivity_x", self.sensitivity_x)?;
        non_negative("sensitivity_y", self.sensitivity_y)?;
        if !self.min_pitch.is_finite() || !self.max_pitch.is_finite() || self.min_pitch > self.max_pitch {
            return Err(ConfigError::InvertedPitchLimits {
                min: self.min_pitch,
                max: self.max_pitch,
            });
        }
        Ok(())
    }

    /// Builder: set both sensitivities.
    pub fn with_sensitivity(mut self, x: f32, y: f32) -> Self {
        self.sensitivity_x = x;
        self.sensitivity_y = y;
        self
    }

    /// Builder: set axis inversion.
    pub fn with_invert(mut self, x: bool, y: bool) -> Self {
        self.invert_x = x;
        self.invert_y = y;
        self
    }

    /// Builder: set pitch limits.
    pub fn with_pitch_limits(mut self, min: f32, max: f32) -> Self {
        self.min_pitch = min;
        self.max_pitch = max;
        self
    }
}

/// Interaction probe configuration.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[reflect(Component)]
#[serde(default)]
pub struct InteractionConfig {
    /// Maximum reach of the probe.
    pub range: f32,
    /// Probe direction in head-local space.
    pub direction: Vec3,
    /// Layers the probe may hit.
    pub layers: LayerMask,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            range: 2.0,
            direction: Vec3::NEG_Z,
            layers: LayerMask::ALL,
        }
    }
}

impl InteractionConfig {
    /// Check every value for configuration faults.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("range", self.range)?;
        if self.direction.length_squared() <= f32::EPSILON || !self.direction.is_finite() {
            return Err(ConfigError::ZeroDirection { field: "direction" });
        }
        Ok(())
    }

    /// Builder: set range.
    pub fn with_range(mut self, range: f32) -> Self {
        self.range = range;
        self
    }

    /// Builder: set the head-local probe direction.
    pub fn with_direction(mut self, direction: Vec3) -> Self {
        self.direction = direction;
        self
    }

    /// Builder: set the interactable layers.
    pub fn with_layers(mut self, layers: LayerMask) -> Self {
        self.layers = layers;
        self
    }
}
