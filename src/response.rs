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

use crate::engine::stop_states::StopState;
use crate::network::{Mode, Network, StopId};

/// An itinerary: `(stop, link record)` pairs ordered the way the search
/// built them. Outbound paths are already chronological; inbound paths
/// run from destination back to origin, so chronological reading
/// iterates them in reverse.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    pub links: Vec<(StopId, StopState)>,
}

impl Path {
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Links in chronological order regardless of search direction.
    pub fn chronological<'a>(
        &'a self,
        outbound: bool,
    ) -> Box<dyn Iterator<Item = &'a (StopId, StopState)> + 'a> {
        if outbound {
            Box::new(self.links.iter())
        } else {
            Box::new(self.links.iter().rev())
        }
    }

    /// Compact `boardstops trips alightstops` rendering used by the
    /// pathset dump.
    pub fn compat_string(&self, network: &Network, outbound: bool) -> String {
        if self.links.is_empty() {
            return "no_path".to_string();
        }
        let mut board_stops = String::new();
        let mut trips = String::new();
        let mut alight_stops = String::new();
        for (stop_id, state) in self.chronological(outbound) {
            if state.deparr_mode != Mode::Transit {
                continue;
            }
            if !board_stops.is_empty() {
                board_stops.push(',');
                trips.push(',');
                alight_stops.push(',');
            }
            let (board, alight) = if outbound {
                (*stop_id, state.stop_succpred)
            } else {
                (state.stop_succpred, *stop_id)
            };
            board_stops.push_str(network.stop_name(board));
            trips.push_str(crate::trace::trip_label(network, state).as_str());
            alight_stops.push_str(network.stop_name(alight));
        }
        format!(" {} {} {}", board_stops, trips, alight_stops)
    }
}

/// Pathset bookkeeping for one itinerary.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathInfo {
    /// How many sampling attempts produced this exact path.
    pub count: u32,
    pub cost: f64,
    /// Reserved for the capacity simulator.
    pub capacity_problem: bool,
    pub probability: f64,
    /// Cumulative integerized probability used for the final draw.
    pub prob_i: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceInfo {
    pub label_iterations: u32,
    pub max_process_count: u32,
    pub milliseconds_labeling: u128,
    pub milliseconds_enumerating: u128,
}

/// Everything `find_path` hands back. An empty path means no itinerary
/// was found (seeding or sampling failed); its cost is zero.
#[derive(Debug, Clone, Default)]
pub struct PathResponse {
    pub path: Path,
    pub path_info: PathInfo,
    pub performance: PerformanceInfo,
}
