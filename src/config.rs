// Copyright  (C) 2020, Kisio Digital and/or its affiliates. All rights reserved.
//
// This file is part of Navitia,
// the software to build cool stuff with public transport.
//
// Hope you'll enjoy and contribute to this project,
// powered by Kisio Digital (www.kisio.com).
// Help us simplify mobility and open public transport:
// a non ending quest to the responsive locomotion way of traveling!
//
// This contribution is a part of the research and development work of the
// IVA Project which aims to enhance traveler information and is carried out
// under the leadership of the Technological Research Institute SystemX,
// with the partnership and support of the transport organization authority
// Ile-De-France Mobilités (IDFM), SNCF, and public funds
// under the scope of the French Program "Investissements d’Avenir".
//
// LICENCE: This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <http://www.gnu.org/licenses/>.
//
// Stay tuned using
// twitter @navitia
// channel `#navitia` on riot https://riot.im/app/#/room/#navitia:matrix.org
// https://groups.google.com/d/forum/navitia
// www.navitia.io

use std::path::PathBuf;

use serde::Deserialize;

/// Process-wide pathfinder parameters, set once before any request is
/// served and shared read-only by every search.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathfinderConfig {
    /// Half-width, in minutes, of the window within which candidate
    /// departures/arrivals at a stop are considered comparable.
    #[serde(default = "default_time_window")]
    pub time_window: f64,

    /// Padding, in minutes, applied ahead of a bump-wait time when the
    /// deterministic search reroutes around a capacity failure.
    #[serde(default = "default_bump_buffer")]
    pub bump_buffer: f64,

    /// Number of path generation attempts per stochastic request.
    #[serde(default = "default_stoch_pathset_size")]
    pub stoch_pathset_size: u32,

    /// Dispersion `theta` of the logit cost-to-probability transform.
    /// Higher values concentrate choice on the cheapest alternatives.
    #[serde(default = "default_stoch_dispersion")]
    pub stoch_dispersion: f64,

    /// Maximum number of times a single stop may be pulled from the label
    /// queue during a stochastic search. Zero disables the cap.
    #[serde(default = "default_stoch_max_stop_process_count")]
    pub stoch_max_stop_process_count: u32,

    /// Directory receiving the per-request trace artifacts.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

pub const DEFAULT_TIME_WINDOW: f64 = 30.0;
pub const DEFAULT_BUMP_BUFFER: f64 = 5.0;
pub const DEFAULT_STOCH_PATHSET_SIZE: u32 = 1000;
pub const DEFAULT_STOCH_DISPERSION: f64 = 1.0;
pub const DEFAULT_STOCH_MAX_STOP_PROCESS_COUNT: u32 = 20;

pub fn default_time_window() -> f64 {
    DEFAULT_TIME_WINDOW
}

pub fn default_bump_buffer() -> f64 {
    DEFAULT_BUMP_BUFFER
}

pub fn default_stoch_pathset_size() -> u32 {
    DEFAULT_STOCH_PATHSET_SIZE
}

pub fn default_stoch_dispersion() -> f64 {
    DEFAULT_STOCH_DISPERSION
}

pub fn default_stoch_max_stop_process_count() -> u32 {
    DEFAULT_STOCH_MAX_STOP_PROCESS_COUNT
}

pub fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for PathfinderConfig {
    fn default() -> Self {
        Self {
            time_window: default_time_window(),
            bump_buffer: default_bump_buffer(),
            stoch_pathset_size: default_stoch_pathset_size(),
            stoch_dispersion: default_stoch_dispersion(),
            stoch_max_stop_process_count: default_stoch_max_stop_process_count(),
            output_dir: default_output_dir(),
        }
    }
}

impl PathfinderConfig {
    /// A dispersion that is not strictly positive would make the logit
    /// transform meaningless, so refuse it up front.
    pub fn check(&self) -> Result<(), BadConfig> {
        if self.stoch_dispersion <= 0.0 {
            return Err(BadConfig {
                field: "stoch_dispersion",
                value: self.stoch_dispersion,
            });
        }
        if self.time_window <= 0.0 {
            return Err(BadConfig {
                field: "time_window",
                value: self.time_window,
            });
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct BadConfig {
    pub field: &'static str,
    pub value: f64,
}

impl std::fmt::Display for BadConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Bad pathfinder configuration : `{}` cannot be {}",
            self.field, self.value
        )
    }
}

impl std::error::Error for BadConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PathfinderConfig::default();
        assert!(config.check().is_ok());
        assert_eq!(config.time_window, 30.0);
        assert_eq!(config.stoch_pathset_size, 1000);
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: PathfinderConfig =
            serde_json::from_str(r#"{"time_window": 15.0, "stoch_dispersion": 0.5}"#).unwrap();
        assert_eq!(config.time_window, 15.0);
        assert_eq!(config.stoch_dispersion, 0.5);
        assert_eq!(config.bump_buffer, DEFAULT_BUMP_BUFFER);
        assert_eq!(config.stoch_pathset_size, DEFAULT_STOCH_PATHSET_SIZE);
    }

    #[test]
    fn rejects_unknown_fields() {
        let parsed = serde_json::from_str::<PathfinderConfig>(r#"{"time_windows": 15.0}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn rejects_non_positive_dispersion() {
        let config = PathfinderConfig {
            stoch_dispersion: 0.0,
            ..PathfinderConfig::default()
        };
        let err = config.check().unwrap_err();
        assert_eq!(err.field, "stoch_dispersion");
    }
}
