//! Weather to art binding
//!
//! The weather provider pushes [`WeatherSnapshot`]s from its own thread via
//! [`WeatherStateBinder::set_snapshot`]. Readers get [`VisualParameters`]
//! computed from a static preset table. A snapshot and its parameters are
//! replaced together as one `Arc`, so a reader never sees a half-updated
//! pair.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::assets::AssetId;
use crate::foundation::math::{utils, Vec3};

/// Wind speed (m/s) at which particle density doubles
const WIND_DENSITY_SCALE: f32 = 15.0;

/// Reported weather condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherCondition {
    /// Clear sky
    Clear,
    /// Rain
    Rain,
    /// Snow
    Snow,
    /// Thunderstorm
    Storm,
    /// Fog or mist
    Fog,
    /// Anything the provider reports that we have no preset for
    #[serde(other)]
    Unknown,
}

/// One observation from the weather provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Condition
    pub condition: WeatherCondition,
    /// Air temperature in °C
    pub temperature_c: f32,
    /// Wind speed in m/s
    pub wind_speed: f32,
    /// Observation time, seconds since the Unix epoch
    pub observed_at_secs: u64,
}

impl WeatherSnapshot {
    /// Snapshot with mild defaults for everything but the condition
    pub fn new(condition: WeatherCondition) -> Self {
        Self {
            condition,
            temperature_c: 15.0,
            wind_speed: 0.0,
            observed_at_secs: 0,
        }
    }

    /// Set wind speed
    pub fn with_wind(mut self, wind_speed: f32) -> Self {
        self.wind_speed = wind_speed;
        self
    }
}

impl Default for WeatherSnapshot {
    fn default() -> Self {
        Self::new(WeatherCondition::Clear)
    }
}

/// Color grading applied to the placed art
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tint {
    /// Sunlit
    Warm,
    /// Rain and snow
    Cool,
    /// No grading
    Neutral,
    /// Grey, low contrast
    Overcast,
    /// High contrast, dark
    Dramatic,
}

impl Tint {
    /// Linear RGB multiplier
    pub fn rgb(self) -> Vec3 {
        match self {
            Self::Warm => Vec3::new(1.0, 0.9, 0.75),
            Self::Cool => Vec3::new(0.75, 0.85, 1.0),
            Self::Neutral => Vec3::new(1.0, 1.0, 1.0),
            Self::Overcast => Vec3::new(0.8, 0.8, 0.82),
            Self::Dramatic => Vec3::new(0.55, 0.5, 0.7),
        }
    }
}

/// What the scene should show for the current weather
#[derive(Debug, Clone, PartialEq)]
pub struct VisualParameters {
    /// Art model to place
    pub asset_id: AssetId,
    /// Color grading
    pub tint: Tint,
    /// Animation playback rate
    pub animation_speed: f32,
    /// Particle density in [0, 1]
    pub particle_density: f32,
}

struct Preset {
    asset: &'static str,
    tint: Tint,
    animation_speed: f32,
    particle_density: f32,
}

/// Condition to art table; the first row also covers `Unknown`
static PRESETS: [(WeatherCondition, Preset); 5] = [
    (
        WeatherCondition::Clear,
        Preset {
            asset: "sunny_tree",
            tint: Tint::Warm,
            animation_speed: 1.0,
            particle_density: 0.0,
        },
    ),
    (
        WeatherCondition::Rain,
        Preset {
            asset: "rain_art",
            tint: Tint::Cool,
            animation_speed: 1.5,
            particle_density: 0.6,
        },
    ),
    (
        WeatherCondition::Snow,
        Preset {
            asset: "snow_art",
            tint: Tint::Cool,
            animation_speed: 0.6,
            particle_density: 0.8,
        },
    ),
    (
        WeatherCondition::Storm,
        Preset {
            asset: "storm_art",
            tint: Tint::Dramatic,
            animation_speed: 2.0,
            particle_density: 1.0,
        },
    ),
    (
        WeatherCondition::Fog,
        Preset {
            asset: "fog_art",
            tint: Tint::Overcast,
            animation_speed: 0.5,
            particle_density: 0.3,
        },
    ),
];

fn preset(condition: WeatherCondition) -> &'static Preset {
    PRESETS
        .iter()
        .find(|(entry, _)| *entry == condition)
        .map_or(&PRESETS[0].1, |(_, preset)| preset)
}

impl VisualParameters {
    /// Map a snapshot through the preset table
    pub fn from_snapshot(snapshot: &WeatherSnapshot) -> Self {
        let preset = preset(snapshot.condition);
        let wind = snapshot.wind_speed.max(0.0);
        Self {
            asset_id: AssetId::new(preset.asset),
            tint: preset.tint,
            animation_speed: preset.animation_speed,
            particle_density: utils::clamp(preset.particle_density * (1.0 + wind / WIND_DENSITY_SCALE), 0.0, 1.0),
        }
    }
}

struct Bound {
    snapshot: WeatherSnapshot,
    parameters: VisualParameters,
    generation: u64,
}

/// Shared, swappable weather state
///
/// Clones share the same state.
#[derive(Clone)]
pub struct WeatherStateBinder {
    current: Arc<RwLock<Arc<Bound>>>,
}

impl WeatherStateBinder {
    /// Binder starting from `initial`, generation 0
    pub fn new(initial: WeatherSnapshot) -> Self {
        let parameters = VisualParameters::from_snapshot(&initial);
        Self {
            current: Arc::new(RwLock::new(Arc::new(Bound {
                snapshot: initial,
                parameters,
                generation: 0,
            }))),
        }
    }

    /// Replace the snapshot wholesale
    pub fn set_snapshot(&self, snapshot: WeatherSnapshot) {
        let parameters = VisualParameters::from_snapshot(&snapshot);
        let mut current = self.current.write();
        log::info!(
            "Weather {:?} -> {:?} ({})",
            current.snapshot.condition,
            snapshot.condition,
            parameters.asset_id
        );
        let generation = current.generation + 1;
        *current = Arc::new(Bound {
            snapshot,
            parameters,
            generation,
        });
    }

    /// Parameters for the current snapshot
    pub fn current_parameters(&self) -> VisualParameters {
        self.current.read().parameters.clone()
    }

    /// Current snapshot
    pub fn snapshot(&self) -> WeatherSnapshot {
        self.current.read().snapshot.clone()
    }

    /// Bumped on every `set_snapshot`
    pub fn generation(&self) -> u64 {
        self.current.read().generation
    }

    /// Parameters and generation read together
    pub fn parameters_with_generation(&self) -> (VisualParameters, u64) {
        let bound = Arc::clone(&self.current.read());
        (bound.parameters.clone(), bound.generation)
    }
}

impl Default for WeatherStateBinder {
    fn default() -> Self {
        Self::new(WeatherSnapshot::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_clear_and_rain_presets() {
        let clear = VisualParameters::from_snapshot(&WeatherSnapshot::new(WeatherCondition::Clear));
        assert_eq!(clear.asset_id.as_str(), "sunny_tree");
        assert_eq!(clear.tint, Tint::Warm);
        assert_relative_eq!(clear.animation_speed, 1.0);
        assert_relative_eq!(clear.particle_density, 0.0);

        let rain = VisualParameters::from_snapshot(&WeatherSnapshot::new(WeatherCondition::Rain));
        assert_eq!(rain.asset_id.as_str(), "rain_art");
        assert_eq!(rain.tint, Tint::Cool);
        assert_relative_eq!(rain.animation_speed, 1.5);
        assert!(rain.particle_density > 0.0);
    }

    #[test]
    fn test_unknown_falls_back_to_clear() {
        let unknown = VisualParameters::from_snapshot(&WeatherSnapshot::new(WeatherCondition::Unknown));
        let clear = VisualParameters::from_snapshot(&WeatherSnapshot::new(WeatherCondition::Clear));
        assert_eq!(unknown, clear);
    }

    #[test]
    fn test_every_known_condition_has_its_own_art() {
        let conditions = [
            WeatherCondition::Clear,
            WeatherCondition::Rain,
            WeatherCondition::Snow,
            WeatherCondition::Storm,
            WeatherCondition::Fog,
        ];
        let mut assets: Vec<String> = conditions
            .iter()
            .map(|condition| VisualParameters::from_snapshot(&WeatherSnapshot::new(*condition)).asset_id.to_string())
            .collect();
        assets.sort();
        assets.dedup();
        assert_eq!(assets.len(), conditions.len());
        assert_eq!(
            VisualParameters::from_snapshot(&WeatherSnapshot::new(WeatherCondition::Fog)).tint,
            Tint::Overcast
        );
    }

    #[test]
    fn test_wind_scales_density_up_to_one() {
        let calm = VisualParameters::from_snapshot(&WeatherSnapshot::new(WeatherCondition::Rain));
        let windy = VisualParameters::from_snapshot(&WeatherSnapshot::new(WeatherCondition::Rain).with_wind(7.5));
        let gale = VisualParameters::from_snapshot(&WeatherSnapshot::new(WeatherCondition::Rain).with_wind(60.0));

        assert_relative_eq!(windy.particle_density, calm.particle_density * 1.5, epsilon = 1e-6);
        assert_relative_eq!(gale.particle_density, 1.0);
        assert_relative_eq!(windy.animation_speed, calm.animation_speed);
    }

    #[test]
    fn test_replayed_snapshot_is_deterministic() {
        let binder = WeatherStateBinder::default();
        let snapshot = WeatherSnapshot::new(WeatherCondition::Snow).with_wind(4.0);

        binder.set_snapshot(snapshot.clone());
        let first = binder.current_parameters();
        binder.set_snapshot(WeatherSnapshot::new(WeatherCondition::Fog));
        binder.set_snapshot(snapshot);

        assert_eq!(binder.current_parameters(), first);
        assert_eq!(binder.current_parameters(), binder.current_parameters());
        assert_eq!(binder.generation(), 3);
    }

    #[test]
    fn test_clones_share_state() {
        let binder = WeatherStateBinder::default();
        let provider = binder.clone();
        std::thread::spawn(move || provider.set_snapshot(WeatherSnapshot::new(WeatherCondition::Storm)))
            .join()
            .unwrap();

        let (params, generation) = binder.parameters_with_generation();
        assert_eq!(params.asset_id.as_str(), "storm_art");
        assert_eq!(generation, 1);
    }

    #[test]
    fn test_unrecognized_condition_deserializes_as_unknown() {
        let snapshot: WeatherSnapshot =
            toml::from_str("condition = \"hail\"\ntemperature_c = 2.0\nwind_speed = 3.0\nobserved_at_secs = 10").unwrap();
        assert_eq!(snapshot.condition, WeatherCondition::Unknown);
    }
}
