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

//! In-memory construction of a [`Network`], mostly for tests and
//! demonstration fixtures.
//!
//! ```
//! use skadi::network::NetworkBuilder;
//! use skadi::Mode;
//!
//! let network = NetworkBuilder::new()
//!     .supply_mode(1, "transfer")
//!     .supply_mode(2, "walk")
//!     .supply_mode(12, "local_bus")
//!     .access_link(1, 2, 10, 5.0)
//!     .trip(100, |trip| {
//!         trip.supply_mode(12)
//!             .st(10, 499.0, 500.0)
//!             .st(11, 510.0, 511.0)
//!     })
//!     .weight("all", Mode::Access, "walk", 2, "time_min", 1.0)
//!     .build();
//! assert_eq!(network.nb_of_trips(), 1);
//! ```

use super::data::{
    Attributes, Mode, Network, RouteId, StopId, SupplyModeId, TripId, TripInfo, TripStop,
    TripStopTime, UserClassMode,
};
use super::init::TRANSFER_SUPPLY_MODE_NAME;

#[derive(Default)]
pub struct NetworkBuilder {
    network: Network,
}

pub struct TripBuilder {
    supply_mode: SupplyModeId,
    route: RouteId,
    attributes: Attributes,
    stop_times: Vec<(StopId, f64, f64)>,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(mut self, stop: StopId, name: &str) -> Self {
        self.network.stop_names.insert(stop, name.to_string());
        self
    }

    pub fn route(mut self, route: RouteId, name: &str) -> Self {
        self.network.route_names.insert(route, name.to_string());
        self
    }

    pub fn supply_mode(mut self, supply_mode: SupplyModeId, name: &str) -> Self {
        if name == TRANSFER_SUPPLY_MODE_NAME {
            self.network.transfer_supply_mode = Some(supply_mode);
        }
        self.network
            .mode_names
            .insert(supply_mode, name.to_string());
        self
    }

    pub fn access_link(
        self,
        taz: StopId,
        supply_mode: SupplyModeId,
        stop: StopId,
        time_min: f64,
    ) -> Self {
        self.access_attribute(taz, supply_mode, stop, "time_min", time_min)
    }

    pub fn access_attribute(
        mut self,
        taz: StopId,
        supply_mode: SupplyModeId,
        stop: StopId,
        name: &str,
        value: f64,
    ) -> Self {
        self = self.name_stop_if_unknown(taz);
        self = self.name_stop_if_unknown(stop);
        self.network
            .access_links
            .entry(taz)
            .or_default()
            .entry(supply_mode)
            .or_default()
            .entry(stop)
            .or_default()
            .insert(name.to_string(), value);
        self
    }

    pub fn transfer(self, from_stop: StopId, to_stop: StopId, time_min: f64) -> Self {
        self.transfer_attribute(from_stop, to_stop, "time_min", time_min)
    }

    pub fn transfer_attribute(
        mut self,
        from_stop: StopId,
        to_stop: StopId,
        name: &str,
        value: f64,
    ) -> Self {
        self = self.name_stop_if_unknown(from_stop);
        self = self.name_stop_if_unknown(to_stop);
        self.network
            .transfers_from
            .entry(from_stop)
            .or_default()
            .entry(to_stop)
            .or_default()
            .insert(name.to_string(), value);
        self.network
            .transfers_to
            .entry(to_stop)
            .or_default()
            .entry(from_stop)
            .or_default()
            .insert(name.to_string(), value);
        self
    }

    pub fn trip<Configure>(mut self, trip: TripId, configure: Configure) -> Self
    where
        Configure: FnOnce(TripBuilder) -> TripBuilder,
    {
        let trip_builder = configure(TripBuilder {
            supply_mode: 0,
            route: 0,
            attributes: Attributes::new(),
            stop_times: Vec::new(),
        });

        if !self.network.trip_names.contains_key(&trip) {
            self.network
                .trip_names
                .insert(trip, format!("trip_{}", trip));
        }
        self.network.trip_infos.insert(
            trip,
            TripInfo {
                supply_mode: trip_builder.supply_mode,
                route: trip_builder.route,
                attributes: trip_builder.attributes,
            },
        );
        for (index, (stop, arrive_time, depart_time)) in
            trip_builder.stop_times.into_iter().enumerate()
        {
            self = self.name_stop_if_unknown(stop);
            let stop_time = TripStopTime {
                trip,
                seq: index as u32 + 1,
                stop,
                arrive_time,
                depart_time,
            };
            self.network
                .trip_stop_times
                .entry(trip)
                .or_default()
                .push(stop_time);
            self.network
                .stop_trip_times
                .entry(stop)
                .or_default()
                .push(stop_time);
        }
        self
    }

    pub fn weight(
        mut self,
        user_class: &str,
        demand_mode_type: Mode,
        demand_mode: &str,
        supply_mode: SupplyModeId,
        name: &str,
        value: f64,
    ) -> Self {
        let ucm = UserClassMode {
            user_class: user_class.to_string(),
            demand_mode_type,
            demand_mode: demand_mode.to_string(),
        };
        self.network
            .weights
            .entry(ucm)
            .or_default()
            .entry(supply_mode)
            .or_default()
            .insert(name.to_string(), value);
        self
    }

    pub fn bump_wait(mut self, trip: TripId, seq: u32, stop: StopId, time: f64) -> Self {
        self.network
            .bump_waits
            .insert(TripStop { trip, seq, stop }, time);
        self
    }

    pub fn build(self) -> Network {
        self.network
    }

    fn name_stop_if_unknown(mut self, stop: StopId) -> Self {
        if !self.network.stop_names.contains_key(&stop) {
            self.network.stop_names.insert(stop, format!("stop_{}", stop));
        }
        self
    }
}

impl TripBuilder {
    pub fn supply_mode(mut self, supply_mode: SupplyModeId) -> Self {
        self.supply_mode = supply_mode;
        self
    }

    pub fn route(mut self, route: RouteId) -> Self {
        self.route = route;
        self
    }

    pub fn attribute(mut self, name: &str, value: f64) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    /// Append a stop event; sequences are assigned densely from 1 in
    /// calling order.
    pub fn st(mut self, stop: StopId, arrive_time: f64, depart_time: f64) -> Self {
        self.stop_times.push((stop, arrive_time, depart_time));
        self
    }
}
