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

//! Path enumeration over the labeled stop-state graph.
//!
//! Deterministic requests walk the single chain of best predecessors.
//! Stochastic requests sample a pathset by probabilistic link-by-link
//! descent and draw one itinerary from a logit choice model over the
//! recomputed path costs. Both rewrite link clocks on the way so the
//! final itinerary is consistent with the actual schedule.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use super::cost::tally_link_cost;
use super::stop_states::{LinkRef, StopState};
use super::Search;
use crate::network::{Attributes, Mode, StopId};
use crate::response::{Path, PathInfo};
use crate::trace::{append_pathset_row, stop_state_header, stop_state_row};

/// Fixed probability integerization scale; keeps draws identical across
/// platforms, unlike a RAND_MAX-derived scale.
pub(crate) const PROB_SCALE: u64 = 1_000_000_000;

/// Cumulative probabilities below this integer weight are dropped.
const PROB_CUTOFF: u64 = 1;

struct ProbabilityStop {
    /// Holds the raw cost until the denominator is known, then the
    /// probability.
    probability: f64,
    /// Cumulative integerized probability.
    prob_i: u64,
    /// Index of the candidate in its stop-state vector.
    index: usize,
}

impl<'a> Search<'a> {
    /// Extract the final itinerary from the labeled graph. `None` means
    /// no path exists; the caller reports an empty path.
    pub(crate) fn get_found_path(&mut self) -> Option<(Path, PathInfo)> {
        let end_taz = self.spec.end_taz();
        match self.stop_states.get(&end_taz) {
            Some(states) if !states.is_empty() => {}
            _ => return None,
        }
        let found = if self.spec.hyperpath {
            self.choose_path_from_hyperpath()
        } else {
            self.reconstruct_deterministic_path()
        };
        if self.trace.is_some() {
            if let Some((path, _)) = &found {
                let rows: Vec<String> = path
                    .links
                    .iter()
                    .map(|(stop, state)| stop_state_row(self.network, self.spec, *stop, state))
                    .collect();
                if let Some(trace) = self.trace.as_mut() {
                    trace.note("Final path");
                    trace.note(stop_state_header(self.spec));
                    for row in rows {
                        trace.note(row);
                    }
                }
            }
        }
        found
    }

    /// Deterministic regime: the opposite TAZ holds exactly one state;
    /// follow the chain of successors/predecessors until the seed walk,
    /// rewriting clocks to the schedule along the way.
    fn reconstruct_deterministic_path(&mut self) -> Option<(Path, PathInfo)> {
        let spec = self.spec;
        let end_taz = spec.end_taz();
        // the chain terminates on the seed mode of the anchor TAZ
        let final_mode = spec.start_mode();

        let mut state = *self.stop_states.get(&end_taz)?.first()?;
        let mut links: Vec<(StopId, StopState)> = vec![(end_taz, state)];

        while state.deparr_mode != final_mode {
            // a chain longer than the labeled graph means a cycle in the
            // predecessor links
            if links.len() > self.stop_states.len() + 2 {
                warn!("Predecessor chain does not terminate, giving up");
                return None;
            }
            let stop = state.stop_succpred;
            state = match self.stop_states.get(&stop).and_then(|states| states.first()) {
                Some(state) => *state,
                None => {
                    warn!("Predecessor chain broken at stop {}", stop);
                    return None;
                }
            };
            links.push((stop, state));

            let curr = links.len() - 1;
            let prev = curr - 1;
            if spec.outbound {
                if links[prev].1.deparr_mode == Mode::Access {
                    // leave the origin as late as possible: the access walk
                    // ends exactly at the boarding departure
                    links[prev].1.arrdep_time = state.deparr_time;
                    links[prev].1.deparr_time = links[prev].1.arrdep_time - links[prev].1.link_time;
                    // no wait time for the trip
                    links[curr].1.link_time =
                        links[curr].1.arrdep_time - links[curr].1.deparr_time;
                } else if links[curr].1.deparr_mode.is_trip() {
                    // elapsed clock from the previous link's arrival
                    links[curr].1.link_time =
                        links[curr].1.arrdep_time - links[prev].1.arrdep_time;
                } else if links[curr].1.deparr_mode == Mode::Transfer {
                    // start transferring immediately
                    links[curr].1.deparr_time = links[prev].1.arrdep_time;
                    links[curr].1.arrdep_time =
                        links[curr].1.deparr_time + links[curr].1.link_time;
                } else if links[curr].1.deparr_mode == Mode::Egress {
                    links[curr].1.deparr_time = links[prev].1.arrdep_time;
                    links[curr].1.arrdep_time =
                        links[curr].1.deparr_time + links[curr].1.link_time;
                }
            } else {
                // inbound chains are walked in reverse chronological order
                if links[curr].1.deparr_mode == Mode::Access {
                    links[curr].1.deparr_time = links[prev].1.arrdep_time;
                    links[curr].1.arrdep_time =
                        links[curr].1.deparr_time - links[curr].1.link_time;
                    // no wait time for the trip
                    links[prev].1.link_time =
                        links[prev].1.deparr_time - links[prev].1.arrdep_time;
                } else if links[curr].1.deparr_mode.is_trip() {
                    if links[prev].1.deparr_mode == Mode::Transfer {
                        // transfer right after alighting; its wait belongs
                        // to the next trip in time
                        links[prev].1.arrdep_time = links[curr].1.deparr_time;
                        links[prev].1.deparr_time =
                            links[curr].1.deparr_time + links[prev].1.link_time;
                        links[prev - 1].1.link_time =
                            links[prev - 1].1.deparr_time - links[prev].1.deparr_time;
                    } else if links[prev].1.deparr_mode.is_trip() {
                        // zero-walk transfer: the next trip absorbs the wait
                        links[prev].1.link_time =
                            links[prev].1.deparr_time - links[curr].1.deparr_time;
                    }
                }
                if links[prev].1.deparr_mode == Mode::Egress {
                    links[prev].1.arrdep_time = state.deparr_time;
                    links[prev].1.deparr_time =
                        links[prev].1.arrdep_time + links[prev].1.link_time;
                }
            }
        }

        let mut path = Path { links };
        let mut path_info = PathInfo {
            count: 1,
            ..PathInfo::default()
        };
        self.calculate_path_cost(&mut path, &mut path_info);
        Some((path, path_info))
    }

    /// Stochastic regime: sample `stoch_pathset_size` concrete paths,
    /// deduplicate, recompute costs against the resolved schedule and
    /// draw one path with logit probabilities.
    fn choose_path_from_hyperpath(&mut self) -> Option<(Path, PathInfo)> {
        let spec = self.spec;
        let dispersion = self.config.stoch_dispersion;
        let mut rng = StdRng::seed_from_u64(spec.path_id);

        let mut pathset: Vec<(Path, PathInfo)> = Vec::new();
        for attempt in 1..=self.config.stoch_pathset_size {
            match self.generate_hyperpath_path(&mut rng) {
                Some(new_path) => {
                    if let Some(trace) = self.trace.as_mut() {
                        trace.note(format!("----> Found path {}", attempt));
                    }
                    match pathset.iter_mut().find(|(path, _)| *path == new_path) {
                        Some((_, info)) => info.count += 1,
                        None => pathset.push((
                            new_path,
                            PathInfo {
                                count: 1,
                                ..PathInfo::default()
                            },
                        )),
                    }
                }
                None => {
                    if let Some(trace) = self.trace.as_mut() {
                        trace.note("----> No path found");
                    }
                }
            }
        }

        // the sampled costs were hyperpath aggregates; settle each path
        // against the schedule before choosing
        let mut logsum = 0.0;
        for (path, info) in &mut pathset {
            self.calculate_path_cost(path, info);
            if info.cost > 0.0 {
                logsum += (-dispersion * info.cost).exp();
            }
        }
        if logsum == 0.0 {
            return None;
        }

        let mut cum_prob: u64 = 0;
        for (path, info) in &mut pathset {
            info.probability = (-dispersion * info.cost).exp() / logsum;
            let prob_i = (PROB_SCALE as f64 * info.probability) as u64;
            // too small to consider
            if prob_i < PROB_CUTOFF {
                continue;
            }
            cum_prob += prob_i;
            info.prob_i = cum_prob;

            let compat = path.compat_string(self.network, spec.outbound);
            if let Some(trace) = self.trace.as_mut() {
                trace.note(format!(
                    "-> probability {:>8.6}; prob_i {:>8}; count {:>4}; cost {:>8.2}  {}",
                    info.probability, info.prob_i, info.count, info.cost, compat
                ));
            }
            if spec.trace {
                if let Err(err) = append_pathset_row(
                    &self.config.output_dir,
                    spec,
                    info.cost,
                    info.probability,
                    &compat,
                ) {
                    warn!("Could not append to the pathset dump : {}", err);
                }
            }
        }
        if cum_prob == 0 {
            return None;
        }

        let random_num = rng.gen_range(0..cum_prob);
        if let Some(trace) = self.trace.as_mut() {
            trace.note(format!("random_num {} of {}", random_num, cum_prob));
        }
        pathset
            .into_iter()
            .find(|(_, info)| info.prob_i != 0 && random_num <= info.prob_i)
    }

    /// One probabilistic descent through the stop-state graph. `None`
    /// when the descent dead-ends.
    fn generate_hyperpath_path(&mut self, rng: &mut StdRng) -> Option<Path> {
        let network = self.network;
        let spec = self.spec;
        let dispersion = self.config.stoch_dispersion;
        let dir_factor = spec.dir_factor();
        let start_taz = spec.end_taz();

        let taz_states = self.stop_states.get(&start_taz)?.clone();
        let taz_label = self.hyperpath_states.get(&start_taz)?.hyperpath_cost;

        // access/egress alternatives, weighted against the TAZ aggregate
        let mut access_cum_prob: Vec<ProbabilityStop> = Vec::new();
        for (index, state) in taz_states.iter().enumerate() {
            let probability =
                (-dispersion * state.cost).exp() / (-dispersion * taz_label).exp();
            let prob_i = (PROB_SCALE as f64 * probability) as u64;
            if prob_i < PROB_CUTOFF {
                continue;
            }
            let cumulative = access_cum_prob.last().map_or(0, |prob| prob.prob_i) + prob_i;
            access_cum_prob.push(ProbabilityStop {
                probability,
                prob_i: cumulative,
                index,
            });
            if let Some(trace) = self.trace.as_mut() {
                trace.note(format!(
                    "{} : prob {:>10.6} cum_prob {:>6}",
                    stop_state_row(network, spec, start_taz, state),
                    probability,
                    cumulative
                ));
            }
        }

        let chosen_index = self.choose_state(rng, &access_cum_prob)?;
        let state = taz_states[chosen_index];
        let mut links: Vec<(StopId, StopState)> = vec![(start_taz, state)];
        if let Some(trace) = self.trace.as_mut() {
            trace.note(format!(
                " -> Chose access/egress {}",
                stop_state_row(network, spec, start_taz, &state)
            ));
        }

        let mut current_stop = state.stop_succpred;
        // outbound: arrival clock at the next stop; inbound: departure
        let mut arrdep_time = state.deparr_time + state.link_time * dir_factor;
        let mut prev_mode = state.deparr_mode;
        let mut prev_trip = state.trip;

        loop {
            if links.len() > 2 * self.stop_states.len() + 5 {
                warn!("Hyperpath descent does not terminate, giving up");
                return None;
            }
            if let Some(trace) = self.trace.as_mut() {
                trace.note(format!(
                    "current_stop={}; {}={}; prev_mode={}",
                    network.stop_name(current_stop),
                    if spec.outbound {
                        "arrival_time"
                    } else {
                        "departure_time"
                    },
                    crate::time::format_clock(arrdep_time),
                    prev_mode
                ));
            }

            let stop_states = match self.stop_states.get(&current_stop) {
                Some(states) => states.clone(),
                None => return None,
            };

            let mut stop_cum_prob: Vec<ProbabilityStop> = Vec::new();
            let mut sum_exp = 0.0;
            for (index, candidate) in stop_states.iter().enumerate() {
                // access (outbound) and egress (inbound) can only ever be
                // the terminal step
                if spec.outbound && candidate.deparr_mode == Mode::Access {
                    continue;
                }
                if !spec.outbound && candidate.deparr_mode == Mode::Egress {
                    continue;
                }
                // no double walk
                if spec.outbound
                    && matches!(candidate.deparr_mode, Mode::Egress | Mode::Transfer)
                    && matches!(prev_mode, Mode::Access | Mode::Transfer)
                {
                    continue;
                }
                if !spec.outbound
                    && matches!(candidate.deparr_mode, Mode::Access | Mode::Transfer)
                    && matches!(prev_mode, Mode::Egress | Mode::Transfer)
                {
                    continue;
                }
                // same trip twice in a row is just a longer ride on the
                // first link
                if candidate.deparr_mode == Mode::Transit && candidate.trip == prev_trip {
                    continue;
                }
                // outbound: we cannot depart before we arrive
                if spec.outbound && candidate.deparr_time < arrdep_time {
                    continue;
                }
                // inbound: we cannot arrive after we depart
                if !spec.outbound && candidate.deparr_time > arrdep_time {
                    continue;
                }

                sum_exp += (-dispersion * candidate.cost).exp();
                stop_cum_prob.push(ProbabilityStop {
                    probability: candidate.cost,
                    prob_i: 0,
                    index,
                });
            }

            // dead end
            if stop_cum_prob.is_empty() || sum_exp == 0.0 {
                return None;
            }

            let mut cumulative: u64 = 0;
            for prob_stop in &mut stop_cum_prob {
                let probability = (-dispersion * prob_stop.probability).exp() / sum_exp;
                let prob_i = (PROB_SCALE as f64 * probability) as u64;
                prob_stop.probability = probability;
                cumulative += prob_i;
                prob_stop.prob_i = cumulative;
                if let Some(trace) = self.trace.as_mut() {
                    trace.note(format!(
                        "{} : prob {:>10.6} cum_prob {:>6}",
                        stop_state_row(
                            network,
                            spec,
                            current_stop,
                            &stop_states[prob_stop.index]
                        ),
                        probability,
                        cumulative
                    ));
                }
            }

            let chosen_index = self.choose_state(rng, &stop_cum_prob)?;
            let mut next_state = stop_states[chosen_index];
            if let Some(trace) = self.trace.as_mut() {
                trace.note(format!(
                    " -> Chose stop link {}",
                    stop_state_row(network, spec, current_stop, &next_state)
                ));
            }

            // The hyperpath keeps times loose; settle them now that the
            // link is concrete.
            let last = links.len() - 1;
            if spec.outbound {
                if prev_mode == Mode::Access {
                    // board exactly at the scheduled departure, so the
                    // access walk ends with no wait
                    let trip = next_state.trip.trip_id()?;
                    let dep_time =
                        network.scheduled_departure(trip, current_stop, next_state.seq)?;
                    links[last].1.arrdep_time = dep_time;
                    links[last].1.deparr_time = dep_time - links[last].1.link_time;
                    next_state.link_time = next_state.arrdep_time - next_state.deparr_time;
                } else if next_state.deparr_mode.is_trip() {
                    // elapsed clock from the previous link's arrival
                    next_state.link_time = next_state.arrdep_time - arrdep_time;
                } else if next_state.deparr_mode == Mode::Transfer {
                    // start transferring immediately
                    next_state.deparr_time = links[last].1.arrdep_time;
                    next_state.arrdep_time = next_state.deparr_time + next_state.link_time;
                } else if next_state.deparr_mode == Mode::Egress {
                    next_state.deparr_time = links[last].1.arrdep_time;
                    next_state.arrdep_time = next_state.deparr_time + next_state.link_time;
                }
            } else {
                if next_state.deparr_mode == Mode::Access {
                    // the previous link in the descent is the boarding trip
                    let trip = links[last].1.trip.trip_id()?;
                    let dep_time = network.scheduled_departure(
                        trip,
                        current_stop,
                        links[last].1.seq_succpred,
                    )?;
                    next_state.deparr_time = dep_time;
                    next_state.arrdep_time = next_state.deparr_time - next_state.link_time;
                    // no wait time for the trip
                    links[last].1.link_time =
                        links[last].1.deparr_time - links[last].1.arrdep_time;
                } else if next_state.deparr_mode.is_trip() {
                    // pretend the wait is zero for now so the next
                    // (earlier) choice sees the true departure clock
                    next_state.link_time = next_state.deparr_time - next_state.arrdep_time;
                    if prev_mode == Mode::Transfer {
                        // transfer right after alighting; the wait moves to
                        // the later trip
                        links[last].1.arrdep_time = next_state.deparr_time;
                        links[last].1.deparr_time =
                            next_state.deparr_time + links[last].1.link_time;
                        links[last - 1].1.link_time =
                            links[last - 1].1.deparr_time - links[last].1.deparr_time;
                    } else if prev_mode.is_trip() {
                        // zero-walk transfer: the later trip absorbs the wait
                        links[last].1.link_time =
                            links[last].1.deparr_time - next_state.deparr_time;
                    }
                } else if next_state.deparr_mode == Mode::Transfer {
                    // transfer as late as possible to keep earlier trips open
                    next_state.deparr_time = links[last].1.arrdep_time;
                    next_state.arrdep_time = next_state.deparr_time - next_state.link_time;
                }
                if prev_mode == Mode::Egress {
                    // do not wait at the destination; walk right away
                    links[last].1.arrdep_time = next_state.deparr_time;
                    links[last].1.deparr_time =
                        links[last].1.arrdep_time + links[last].1.link_time;
                }
            }

            links.push((current_stop, next_state));

            current_stop = next_state.stop_succpred;
            prev_mode = next_state.deparr_mode;
            prev_trip = next_state.trip;
            arrdep_time = next_state.arrdep_time;

            if let (Some(trace), Some((stop, state))) = (self.trace.as_mut(), links.last()) {
                trace.note(format!(
                    " ->    Updated link {}",
                    stop_state_row(network, spec, *stop, state)
                ));
            }

            // are we done?
            if (spec.outbound && next_state.deparr_mode == Mode::Egress)
                || (!spec.outbound && next_state.deparr_mode == Mode::Access)
            {
                break;
            }
        }
        Some(Path { links })
    }

    /// Draw one candidate from a cumulative integer distribution.
    fn choose_state(
        &mut self,
        rng: &mut StdRng,
        prob_stops: &[ProbabilityStop],
    ) -> Option<usize> {
        let total = prob_stops.last()?.prob_i;
        if total == 0 {
            return None;
        }
        let random_num = rng.gen_range(0..total);
        if let Some(trace) = self.trace.as_mut() {
            trace.note(format!("random_num {} of {}", random_num, total));
        }
        for prob_stop in prob_stops {
            if prob_stop.prob_i == 0 {
                continue;
            }
            if random_num <= prob_stop.prob_i {
                return Some(prob_stop.index);
            }
        }
        None
    }

    /// Settle the cost of every link now that the whole itinerary and its
    /// clocks are known; may insert zero-walk transfer links between
    /// consecutive trips. Updates each link's `cost` and the aggregate.
    pub(crate) fn calculate_path_cost(&mut self, path: &mut Path, path_info: &mut PathInfo) {
        if path.links.is_empty() {
            return;
        }
        let network = self.network;
        let spec = self.spec;
        let dir_factor = spec.dir_factor();

        if self.trace.is_some() {
            let rows: Vec<String> = path
                .links
                .iter()
                .map(|(stop, state)| stop_state_row(network, spec, *stop, state))
                .collect();
            if let Some(trace) = self.trace.as_mut() {
                trace.note("calculatePathCost:");
                trace.note(stop_state_header(spec));
                for row in rows {
                    trace.note(row);
                }
            }
        }

        let mut first_trip = true;
        // iterate the links in chronological order
        let mut index: i64 = if spec.outbound {
            0
        } else {
            path.links.len() as i64 - 1
        };
        let mut end_index: i64 = if spec.outbound {
            path.links.len() as i64
        } else {
            -1
        };
        let increment: i64 = if spec.outbound { 1 } else { -1 };

        path_info.cost = 0.0;
        while index != end_index {
            let stop_id = path.links[index as usize].0;
            let state = path.links[index as usize].1;
            let mut link_cost = 0.0;

            match state.deparr_mode {
                Mode::Access => {
                    let orig_departure_time = if spec.outbound {
                        state.deparr_time
                    } else {
                        state.deparr_time - state.link_time
                    };
                    let preference_delay = if spec.outbound {
                        0.0
                    } else {
                        orig_departure_time - spec.preferred_time
                    };
                    let transit_stop = if spec.outbound {
                        state.stop_succpred
                    } else {
                        stop_id
                    };
                    if let LinkRef::SupplyMode(supply_mode) = state.trip {
                        let has_weights = network.supply_mode_weights(
                            &spec.user_class,
                            Mode::Access,
                            &spec.access_mode,
                            supply_mode,
                        );
                        let has_attrs = network.access_link_attributes(
                            spec.origin_taz,
                            supply_mode,
                            transit_stop,
                        );
                        match (has_weights, has_attrs) {
                            (Some(weights), Some(attrs)) => {
                                let mut attributes = attrs.clone();
                                attributes
                                    .insert("preferred_delay_min".to_string(), preference_delay);
                                link_cost = tally_link_cost(
                                    supply_mode,
                                    network,
                                    weights,
                                    &attributes,
                                    self.trace.as_mut(),
                                );
                            }
                            _ => warn!(
                                "No weights or attributes for access link at stop {}",
                                transit_stop
                            ),
                        }
                    }
                }
                Mode::Egress => {
                    let dest_arrival_time = if spec.outbound {
                        state.deparr_time + state.link_time
                    } else {
                        state.deparr_time
                    };
                    let preference_delay = if spec.outbound {
                        spec.preferred_time - dest_arrival_time
                    } else {
                        0.0
                    };
                    let transit_stop = if spec.outbound {
                        stop_id
                    } else {
                        state.stop_succpred
                    };
                    if let LinkRef::SupplyMode(supply_mode) = state.trip {
                        let has_weights = network.supply_mode_weights(
                            &spec.user_class,
                            Mode::Egress,
                            &spec.egress_mode,
                            supply_mode,
                        );
                        let has_attrs = network.access_link_attributes(
                            spec.destination_taz,
                            supply_mode,
                            transit_stop,
                        );
                        match (has_weights, has_attrs) {
                            (Some(weights), Some(attrs)) => {
                                let mut attributes = attrs.clone();
                                attributes
                                    .insert("preferred_delay_min".to_string(), preference_delay);
                                link_cost = tally_link_cost(
                                    supply_mode,
                                    network,
                                    weights,
                                    &attributes,
                                    self.trace.as_mut(),
                                );
                            }
                            _ => warn!(
                                "No weights or attributes for egress link at stop {}",
                                transit_stop
                            ),
                        }
                    }
                }
                Mode::Transfer => {
                    let orig_stop = if spec.outbound {
                        stop_id
                    } else {
                        state.stop_succpred
                    };
                    let dest_stop = if spec.outbound {
                        state.stop_succpred
                    } else {
                        stop_id
                    };
                    let mut attributes = if orig_stop != dest_stop {
                        match network.transfer_attributes(orig_stop, dest_stop) {
                            Some(attrs) => attrs.clone(),
                            None => {
                                warn!(
                                    "No transfer attributes between stops {} and {}",
                                    orig_stop, dest_stop
                                );
                                Attributes::new()
                            }
                        }
                    } else {
                        // self transfer between two trips at the same stop
                        let mut attrs = Attributes::new();
                        attrs.insert("walk_time_min".to_string(), 0.0);
                        attrs
                    };
                    attributes.insert("transfer_penalty".to_string(), 1.0);
                    if let (Some(supply_mode), Some(weights)) = (
                        network.transfer_supply_mode(),
                        network.transfer_weights(&spec.user_class),
                    ) {
                        link_cost = tally_link_cost(
                            supply_mode,
                            network,
                            weights,
                            &attributes,
                            self.trace.as_mut(),
                        );
                    }
                }
                Mode::Transit => {
                    let trip_ivt_min = (state.arrdep_time - state.deparr_time) * dir_factor;
                    let wait_min = state.link_time - trip_ivt_min;

                    if let Some(trip) = state.trip.trip_id() {
                        if let Some(trip_info) = network.trip_info(trip) {
                            let has_weights = network.supply_mode_weights(
                                &spec.user_class,
                                Mode::Transit,
                                &spec.transit_mode,
                                trip_info.supply_mode,
                            );
                            if let Some(weights) = has_weights {
                                let mut attributes = trip_info.attributes.clone();
                                attributes.insert("in_vehicle_time_min".to_string(), trip_ivt_min);
                                attributes.insert("wait_time_min".to_string(), wait_min);
                                attributes.insert(
                                    "transfer_penalty".to_string(),
                                    if first_trip { 0.0 } else { 1.0 },
                                );
                                link_cost = tally_link_cost(
                                    trip_info.supply_mode,
                                    network,
                                    weights,
                                    &attributes,
                                    self.trace.as_mut(),
                                );
                            } else {
                                warn!("No transit weights for trip {}", trip);
                            }
                        }
                    }
                    first_trip = false;

                    // consecutive trips hide a zero-walk transfer; make it
                    // a real link so it gets priced on the next step
                    let next_index = index + increment;
                    if next_index != end_index
                        && path.links[next_index as usize].1.deparr_mode.is_trip()
                    {
                        let xfer_stop_id = if spec.outbound {
                            state.stop_succpred
                        } else {
                            stop_id
                        };
                        let xfer_clock = if spec.outbound {
                            state.arrdep_time
                        } else {
                            state.deparr_time
                        };
                        let xfer_state = StopState {
                            deparr_time: xfer_clock,
                            deparr_mode: Mode::Transfer,
                            trip: LinkRef::Walk,
                            stop_succpred: xfer_stop_id,
                            seq: None,
                            seq_succpred: None,
                            link_time: 0.0,
                            link_cost: 0.0,
                            cost: link_cost,
                            iteration: 0,
                            arrdep_time: xfer_clock,
                        };
                        if spec.outbound {
                            path.links
                                .insert(index as usize + 1, (xfer_stop_id, xfer_state));
                            end_index += 1;
                        } else {
                            path.links.insert(index as usize, (stop_id, xfer_state));
                            index += 1;
                        }
                    }
                }
            }

            path.links[index as usize].1.cost = link_cost;
            path_info.cost += link_cost;
            index += increment;
        }

        if let Some(trace) = self.trace.as_mut() {
            trace.note(format!(
                " ==================================================> cost: {}",
                path_info.cost
            ));
        }
    }
}
