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

use super::data::{
    Attributes, Mode, NamedWeights, Network, StopId, SupplyModeId, TripId, TripInfo, TripStop,
    TripStopTime, UserClassMode,
};
use super::init::TRANSFER_SUPPLY_MODE_NAME;

impl Network {
    /// Trips that can serve the labeling step at `stop` around `timepoint`.
    ///
    /// Outbound searches backwards in time, so this returns trips arriving
    /// at `stop` within `(timepoint - time_window, timepoint]`. Inbound
    /// searches forwards and gets trips departing from `stop` within
    /// `[timepoint, timepoint + time_window)`.
    pub fn trips_within_time(
        &self,
        stop: StopId,
        outbound: bool,
        timepoint: f64,
        time_window: f64,
    ) -> Vec<TripStopTime> {
        let mut relevant = Vec::new();
        let stop_times = match self.stop_trip_times.get(&stop) {
            Some(stop_times) => stop_times,
            None => return relevant,
        };
        for stop_time in stop_times {
            if outbound {
                if stop_time.arrive_time <= timepoint
                    && stop_time.arrive_time > timepoint - time_window
                {
                    relevant.push(*stop_time);
                }
            } else if stop_time.depart_time >= timepoint
                && stop_time.depart_time < timepoint + time_window
            {
                relevant.push(*stop_time);
            }
        }
        relevant
    }

    /// Scheduled departure of `trip` from `stop`. When `seq` is `None` the
    /// first matching stop event wins.
    pub fn scheduled_departure(
        &self,
        trip: TripId,
        stop: StopId,
        seq: Option<u32>,
    ) -> Option<f64> {
        let stop_times = self.trip_stop_times.get(&trip)?;
        stop_times
            .iter()
            .find(|stop_time| {
                stop_time.stop == stop && seq.map_or(true, |seq| seq == stop_time.seq)
            })
            .map(|stop_time| stop_time.depart_time)
    }

    pub fn trip_stop_times(&self, trip: TripId) -> Option<&[TripStopTime]> {
        self.trip_stop_times.get(&trip).map(Vec::as_slice)
    }

    pub fn trip_info(&self, trip: TripId) -> Option<&TripInfo> {
        self.trip_infos.get(&trip)
    }

    /// Access/egress links of a TAZ, by supply mode then stop.
    pub fn access_links(
        &self,
        taz: StopId,
    ) -> Option<&BTreeMap<SupplyModeId, BTreeMap<StopId, Attributes>>> {
        self.access_links.get(&taz)
    }

    pub fn access_link_attributes(
        &self,
        taz: StopId,
        supply_mode: SupplyModeId,
        stop: StopId,
    ) -> Option<&Attributes> {
        self.access_links.get(&taz)?.get(&supply_mode)?.get(&stop)
    }

    /// Walking neighbors of `stop`. Outbound labeling propagates backwards,
    /// so it wants transfers arriving *at* `stop`; inbound wants transfers
    /// leaving *from* it.
    pub fn transfers(&self, stop: StopId, outbound: bool) -> Option<&BTreeMap<StopId, Attributes>> {
        if outbound {
            self.transfers_to.get(&stop)
        } else {
            self.transfers_from.get(&stop)
        }
    }

    pub fn transfer_attributes(&self, from_stop: StopId, to_stop: StopId) -> Option<&Attributes> {
        self.transfers_from.get(&from_stop)?.get(&to_stop)
    }

    pub fn bump_wait(&self, trip_stop: &TripStop) -> Option<f64> {
        self.bump_waits.get(trip_stop).copied()
    }

    /// Supply-mode weight tables configured for a `(user class, demand
    /// mode type, demand mode)` triple.
    pub fn weights(
        &self,
        user_class: &str,
        demand_mode_type: Mode,
        demand_mode: &str,
    ) -> Option<&BTreeMap<SupplyModeId, NamedWeights>> {
        let ucm = UserClassMode {
            user_class: user_class.to_string(),
            demand_mode_type,
            demand_mode: demand_mode.to_string(),
        };
        self.weights.get(&ucm)
    }

    pub fn supply_mode_weights(
        &self,
        user_class: &str,
        demand_mode_type: Mode,
        demand_mode: &str,
        supply_mode: SupplyModeId,
    ) -> Option<&NamedWeights> {
        self.weights(user_class, demand_mode_type, demand_mode)?
            .get(&supply_mode)
    }

    /// Weights of the dedicated transfer supply mode, under the fixed
    /// "transfer" demand mode.
    pub fn transfer_weights(&self, user_class: &str) -> Option<&NamedWeights> {
        let transfer_supply_mode = self.transfer_supply_mode?;
        self.supply_mode_weights(
            user_class,
            Mode::Transfer,
            TRANSFER_SUPPLY_MODE_NAME,
            transfer_supply_mode,
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::network::NetworkBuilder;

    #[test]
    fn trips_within_time_uses_half_open_windows() {
        let network = NetworkBuilder::new()
            .trip(1, |trip| trip.st(10, 470.0, 471.0).st(11, 480.0, 481.0))
            .trip(2, |trip| trip.st(10, 449.0, 450.0).st(11, 510.0, 511.0))
            .build();

        // outbound: arrivals in (timepoint - window, timepoint], so the
        // arrival sitting exactly at timepoint - window is excluded
        let trips = network.trips_within_time(11, true, 510.0, 30.0);
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].trip, 2);
        let trips = network.trips_within_time(11, true, 509.0, 30.0);
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].trip, 1);
        // an arrival exactly at the timepoint is included
        let trips = network.trips_within_time(11, true, 480.0, 30.0);
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].trip, 1);

        // inbound: departures in [timepoint, timepoint + window), so the
        // departure exactly at the timepoint is included and the one at
        // timepoint + window is not
        let trips = network.trips_within_time(10, false, 450.0, 30.0);
        assert_eq!(trips.len(), 2);
        let trips = network.trips_within_time(10, false, 441.0, 30.0);
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].trip, 2);
    }

    #[test]
    fn scheduled_departure_matches_sequence() {
        let network = NetworkBuilder::new()
            .trip(7, |trip| trip.st(10, 470.0, 471.0).st(11, 480.0, 482.0))
            .build();
        assert_eq!(network.scheduled_departure(7, 11, Some(2)), Some(482.0));
        assert_eq!(network.scheduled_departure(7, 11, None), Some(482.0));
        assert_eq!(network.scheduled_departure(7, 11, Some(1)), None);
        assert_eq!(network.scheduled_departure(8, 11, None), None);
    }
}
