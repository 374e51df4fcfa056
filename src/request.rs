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

use crate::network::{Mode, StopId};

/// One path request. Self-contained: everything request-scoped hangs off
/// this value plus the shared [`crate::Network`].
#[derive(Debug, Clone)]
pub struct PathSpecification {
    /// Assignment iteration; governs whether trace files are truncated
    /// or appended.
    pub iteration: u32,
    pub passenger_id: String,
    /// Uniquely identifies a passenger+path; also seeds the sampler RNG.
    pub path_id: u64,
    /// True: anchored at the destination arrival time, labeling backwards
    /// from the destination. False: anchored at the origin departure time,
    /// labeling forwards.
    pub outbound: bool,
    /// True: build a hyperpath and sample a pathset. False: single
    /// minimum-cost itinerary.
    pub hyperpath: bool,
    pub user_class: String,
    pub access_mode: String,
    pub transit_mode: String,
    pub egress_mode: String,
    pub origin_taz: StopId,
    pub destination_taz: StopId,
    /// Desired arrival (outbound) or departure (inbound) clock, in
    /// minutes after midnight.
    pub preferred_time: f64,
    pub trace: bool,
}

impl PathSpecification {
    /// +1 outbound, -1 inbound; times evolve as `anchor - duration * dir_factor`.
    pub fn dir_factor(&self) -> f64 {
        if self.outbound {
            1.0
        } else {
            -1.0
        }
    }

    /// TAZ the labeling starts from: the search runs *away* from the
    /// anchored end of the journey.
    pub fn start_taz(&self) -> StopId {
        if self.outbound {
            self.destination_taz
        } else {
            self.origin_taz
        }
    }

    /// TAZ reached by the final seeding pass.
    pub fn end_taz(&self) -> StopId {
        if self.outbound {
            self.origin_taz
        } else {
            self.destination_taz
        }
    }

    /// Link mode of the seed states (at the anchored end of the journey).
    pub fn start_mode(&self) -> Mode {
        if self.outbound {
            Mode::Egress
        } else {
            Mode::Access
        }
    }

    /// Link mode that terminates an itinerary during enumeration.
    pub fn end_mode(&self) -> Mode {
        if self.outbound {
            Mode::Access
        } else {
            Mode::Egress
        }
    }

    /// Demand mode name matching `start_mode`.
    pub fn start_demand_mode(&self) -> &str {
        if self.outbound {
            &self.egress_mode
        } else {
            &self.access_mode
        }
    }

    /// Demand mode name matching `end_mode`.
    pub fn end_demand_mode(&self) -> &str {
        if self.outbound {
            &self.access_mode
        } else {
            &self.egress_mode
        }
    }
}
