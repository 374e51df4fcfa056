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

use std::collections::BTreeMap;

/// Stops and TAZs share one integer namespace; a TAZ is a degenerate stop.
pub type StopId = u32;
pub type TripId = u32;
pub type RouteId = u32;
pub type SupplyModeId = u32;

/// Link attributes and weights are sparse name -> value tables. Ordered
/// maps keep tallies and trace output deterministic.
pub type Attributes = BTreeMap<String, f64>;
pub type NamedWeights = BTreeMap<String, f64>;

/// The four kinds of links an itinerary is made of. This is also the
/// demand mode type axis of the weight table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Mode {
    Access,
    Egress,
    Transfer,
    Transit,
}

impl Mode {
    pub fn is_trip(self) -> bool {
        matches!(self, Mode::Transit)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Access => write!(f, "access"),
            Mode::Egress => write!(f, "egress"),
            Mode::Transfer => write!(f, "transfer"),
            Mode::Transit => write!(f, "transit"),
        }
    }
}

/// One scheduled stop event of a trip. `seq` is 1-based and dense per trip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripStopTime {
    pub trip: TripId,
    pub seq: u32,
    pub stop: StopId,
    pub arrive_time: f64,
    pub depart_time: f64,
}

/// Static per-trip data. `mode_num` and `route_id_num` rows of the trip
/// info table are hoisted here; every other row lands in `attributes`.
#[derive(Debug, Clone, Default)]
pub struct TripInfo {
    pub supply_mode: SupplyModeId,
    pub route: RouteId,
    pub attributes: Attributes,
}

/// Key of the bump-wait table fed back by the capacity simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TripStop {
    pub trip: TripId,
    pub seq: u32,
    pub stop: StopId,
}

/// Key of the weight table: which traveler, doing what, under which
/// demand mode name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct UserClassMode {
    pub user_class: String,
    pub demand_mode_type: Mode,
    pub demand_mode: String,
}

/// Immutable lookup tables for one transit network. Safe to share across
/// concurrent requests; only [`Network::load_bump_waits`] mutates it, and
/// that runs strictly between requests.
#[derive(Debug, Default)]
pub struct Network {
    pub(crate) stop_names: BTreeMap<StopId, String>,
    pub(crate) trip_names: BTreeMap<TripId, String>,
    pub(crate) route_names: BTreeMap<RouteId, String>,
    pub(crate) mode_names: BTreeMap<SupplyModeId, String>,

    /// Numeric id of the supply mode named "transfer", when present.
    pub(crate) transfer_supply_mode: Option<SupplyModeId>,

    /// taz -> supply mode -> stop -> attributes. `time_min` is mandatory.
    pub(crate) access_links: BTreeMap<StopId, BTreeMap<SupplyModeId, BTreeMap<StopId, Attributes>>>,

    /// Transfer links, stored in both directions.
    pub(crate) transfers_from: BTreeMap<StopId, BTreeMap<StopId, Attributes>>,
    pub(crate) transfers_to: BTreeMap<StopId, BTreeMap<StopId, Attributes>>,

    pub(crate) trip_infos: BTreeMap<TripId, TripInfo>,

    pub(crate) weights: BTreeMap<UserClassMode, BTreeMap<SupplyModeId, NamedWeights>>,

    /// Schedule, indexed by trip (ordered by sequence) and by stop.
    pub(crate) trip_stop_times: BTreeMap<TripId, Vec<TripStopTime>>,
    pub(crate) stop_trip_times: BTreeMap<StopId, Vec<TripStopTime>>,

    pub(crate) bump_waits: BTreeMap<TripStop, f64>,
}

impl Network {
    pub fn nb_of_stops(&self) -> usize {
        self.stop_names.len()
    }

    pub fn nb_of_trips(&self) -> usize {
        self.trip_names.len()
    }

    pub fn stop_name(&self, stop: StopId) -> &str {
        self.stop_names.get(&stop).map_or("?", String::as_str)
    }

    pub fn trip_name(&self, trip: TripId) -> &str {
        self.trip_names.get(&trip).map_or("?", String::as_str)
    }

    pub fn route_name(&self, route: RouteId) -> &str {
        self.route_names.get(&route).map_or("?", String::as_str)
    }

    pub fn supply_mode_name(&self, mode: SupplyModeId) -> &str {
        self.mode_names.get(&mode).map_or("?", String::as_str)
    }

    pub fn transfer_supply_mode(&self) -> Option<SupplyModeId> {
        self.transfer_supply_mode
    }
}
