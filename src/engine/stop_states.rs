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

use crate::network::{Mode, StopId, SupplyModeId, TripId};
use crate::MAX_COST;

/// What a link rides on. Transit links reference a scheduled trip,
/// access/egress links reference the walking supply mode they use, and
/// transfers are plain walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRef {
    Trip(TripId),
    SupplyMode(SupplyModeId),
    Walk,
}

impl LinkRef {
    pub fn trip_id(self) -> Option<TripId> {
        match self {
            LinkRef::Trip(trip) => Some(trip),
            _ => None,
        }
    }
}

/// One candidate link out of (outbound) or into (inbound) a stop.
///
/// Outbound search labels backwards from the destination, so
/// `deparr_time` is a departure clock, `stop_succpred` the successor
/// stop towards the destination, and `arrdep_time` the arrival clock at
/// that successor. Inbound flips every one of those readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopState {
    pub deparr_time: f64,
    pub deparr_mode: Mode,
    pub trip: LinkRef,
    pub stop_succpred: StopId,
    pub seq: Option<u32>,
    pub seq_succpred: Option<u32>,
    pub link_time: f64,
    pub link_cost: f64,
    pub cost: f64,
    pub iteration: u32,
    pub arrdep_time: f64,
}

impl StopState {
    /// Substitution key: a new state replaces an old one in place when
    /// they describe the same link.
    pub fn same_link(&self, other: &StopState) -> bool {
        self.deparr_mode == other.deparr_mode
            && self.trip == other.trip
            && self.stop_succpred == other.stop_succpred
            && self.seq_succpred == other.seq_succpred
    }
}

/// Per-stop summary kept only in hyperpath mode.
#[derive(Debug, Clone, Copy)]
pub struct HyperpathState {
    /// Window anchor: latest departure seen (outbound) or earliest
    /// arrival seen (inbound) across the stop's candidate links.
    pub latest_dep_earliest_arr: f64,
    /// Link that set the anchor; excluded when relaxing trips so the
    /// anchor trip does not trivially feed itself.
    pub lder_trip: LinkRef,
    /// Log-sum aggregate over the stop's candidate link costs.
    pub hyperpath_cost: f64,
    pub process_count: u32,
}

/// Log-sum aggregate restricted to transit links. [`MAX_COST`] when the
/// stop has none, meaning it is only reachable by walking.
pub fn nonwalk_label(states: &[StopState], dispersion: f64) -> f64 {
    let sum: f64 = states
        .iter()
        .filter(|state| state.deparr_mode.is_trip())
        .map(|state| (-dispersion * state.cost).exp())
        .sum();
    if sum == 0.0 {
        MAX_COST
    } else {
        (-1.0 / dispersion) * sum.ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transit_state(cost: f64) -> StopState {
        StopState {
            deparr_time: 480.0,
            deparr_mode: Mode::Transit,
            trip: LinkRef::Trip(1),
            stop_succpred: 10,
            seq: Some(1),
            seq_succpred: Some(2),
            link_time: 5.0,
            link_cost: cost,
            cost,
            iteration: 1,
            arrdep_time: 485.0,
        }
    }

    #[test]
    fn nonwalk_label_ignores_walk_states() {
        let dispersion = 0.5;
        let mut states = vec![transit_state(10.0)];
        let only_transit = nonwalk_label(&states, dispersion);

        states.push(StopState {
            deparr_mode: Mode::Transfer,
            trip: LinkRef::Walk,
            cost: 1.0,
            ..transit_state(1.0)
        });
        assert_eq!(nonwalk_label(&states, dispersion), only_transit);
    }

    #[test]
    fn nonwalk_label_is_max_cost_without_transit() {
        let state = StopState {
            deparr_mode: Mode::Access,
            trip: LinkRef::SupplyMode(2),
            ..transit_state(3.0)
        };
        assert_eq!(nonwalk_label(&[state], 0.5), MAX_COST);
    }

    #[test]
    fn adding_an_alternative_never_raises_the_aggregate() {
        let dispersion = 0.2;
        let mut states = vec![transit_state(12.0)];
        let mut previous = nonwalk_label(&states, dispersion);
        for cost in [20.0, 15.0, 40.0] {
            let mut state = transit_state(cost);
            state.trip = LinkRef::Trip(100 + cost as TripId);
            states.push(state);
            let aggregate = nonwalk_label(&states, dispersion);
            assert!(aggregate <= previous + 1e-12);
            previous = aggregate;
        }
    }

    #[test]
    fn substitution_key_ignores_times_and_costs() {
        let state = transit_state(10.0);
        let mut updated = transit_state(25.0);
        updated.deparr_time = 470.0;
        assert!(state.same_link(&updated));

        let mut other_trip = transit_state(10.0);
        other_trip.trip = LinkRef::Trip(2);
        assert!(!state.same_link(&other_trip));
    }
}
