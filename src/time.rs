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

//! All clock values handled by the pathfinder are floating point minutes
//! after midnight; durations are floating point minutes. These helpers
//! render both for trace output.

pub const MINUTES_PER_DAY: f64 = 24.0 * 60.0;

/// Render a clock value (minutes after midnight) as `HH:MM:SS`.
pub fn format_clock(minutes: f64) -> String {
    let hours = (minutes / 60.0) as i64;
    let whole_minutes = minutes.floor();
    let seconds = (minutes - whole_minutes) * 60.0;
    format!(
        "{:02}:{:02}:{:02}",
        hours,
        (whole_minutes as i64) - hours * 60,
        seconds as i64
    )
}

/// Render a duration (minutes) as `H:MM:SS.s`.
pub fn format_duration(minutes: f64) -> String {
    let hours = (minutes / 60.0) as i64;
    let rest = minutes - 60.0 * (hours as f64);
    let whole_minutes = rest.floor();
    let seconds = (rest - whole_minutes) * 60.0;
    format!("{:>2}:{:02}:{:04.1}", hours, whole_minutes as i64, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_rendering() {
        assert_eq!(format_clock(0.0), "00:00:00");
        assert_eq!(format_clock(480.0), "08:00:00");
        assert_eq!(format_clock(510.5), "08:30:30");
        assert_eq!(format_clock(1439.0), "23:59:00");
    }

    #[test]
    fn duration_rendering() {
        assert_eq!(format_duration(0.0), " 0:00:00.0");
        assert_eq!(format_duration(5.25), " 0:05:15.0");
        assert_eq!(format_duration(75.0), " 1:15:00.0");
    }
}
