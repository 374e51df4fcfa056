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

//! The labeling engine: seed the anchor TAZ, relax stops through
//! transfers and scheduled trips until the label queue drains, then seed
//! the opposite TAZ.
//!
//! Outbound requests are anchored at the destination arrival time and
//! label *backwards* in time towards the origin; inbound requests are
//! anchored at the origin departure time and label forwards. Everything
//! direction-dependent flows through `dir_factor` and the
//! departure/arrival double readings of [`StopState`].

use tracing::{debug, warn};

use super::cost::tally_link_cost;
use super::label_queue::{LabelQueueError, LabelStop};
use super::stop_states::{nonwalk_label, HyperpathState, LinkRef, StopState};
use super::Search;
use crate::network::{Mode, StopId, TripStop};
use crate::time::{format_clock, MINUTES_PER_DAY};
use crate::trace::{stop_state_header, stop_state_row};
use crate::MAX_COST;

impl<'a> Search<'a> {
    /// Seed the search with the access/egress links of the anchor TAZ.
    /// Returns false when nothing could be seeded: the anchor has no
    /// links, or no weights exist for the requested user class and mode.
    pub(crate) fn initialize_stop_states(&mut self) -> bool {
        let network = self.network;
        let spec = self.spec;
        let start_taz = spec.start_taz();
        let dir_factor = spec.dir_factor();

        let taz_links = match network.access_links(start_taz) {
            Some(links) => links,
            None => return false,
        };
        let weights = match network.weights(
            &spec.user_class,
            spec.start_mode(),
            spec.start_demand_mode(),
        ) {
            Some(weights) => weights,
            None => {
                warn!(
                    "No weights configured for user class [{}], {} mode [{}]",
                    spec.user_class,
                    spec.start_mode(),
                    spec.start_demand_mode()
                );
                return false;
            }
        };

        if let Some(trace) = self.trace.as_mut() {
            trace.stop_visited(network.stop_name(start_taz), 0);
        }

        for (supply_mode, mode_weights) in weights {
            if let Some(trace) = self.trace.as_mut() {
                trace.note(format!(
                    "Weights exist for supply mode {} => {}",
                    supply_mode,
                    network.supply_mode_name(*supply_mode)
                ));
            }
            let links = match taz_links.get(supply_mode) {
                Some(links) => links,
                None => {
                    if let Some(trace) = self.trace.as_mut() {
                        trace.note("No links for this supply mode");
                    }
                    continue;
                }
            };
            for (stop, attrs) in links {
                let attr_time = match attrs.get("time_min") {
                    Some(time) => *time,
                    None => {
                        warn!("Access link to stop {} has no time_min", stop);
                        continue;
                    }
                };

                // outbound: departure time = destination - egress walk
                //  inbound: arrival time   = origin + access walk
                let deparr_time = spec.preferred_time - attr_time * dir_factor;

                // the seed leaves exactly at the preferred time
                let mut link_attr = attrs.clone();
                link_attr.insert("preferred_delay_min".to_string(), 0.0);

                let cost = if spec.hyperpath {
                    tally_link_cost(
                        *supply_mode,
                        network,
                        mode_weights,
                        &link_attr,
                        self.trace.as_mut(),
                    )
                } else {
                    attr_time
                };

                let state = StopState {
                    deparr_time,
                    deparr_mode: spec.start_mode(),
                    trip: LinkRef::SupplyMode(*supply_mode),
                    stop_succpred: start_taz,
                    seq: None,
                    seq_succpred: None,
                    link_time: attr_time,
                    link_cost: cost,
                    cost,
                    iteration: 0,
                    arrdep_time: spec.preferred_time,
                };
                self.add_stop_state(*stop, state);
            }
        }

        !self.queue.is_empty()
    }

    /// Offer a candidate link record to `stop`.
    ///
    /// Deterministic: keep only the cheapest record. Hyperpath: maintain
    /// the stop's candidate set, its time window anchor, and the log-sum
    /// aggregate cost; re-push the stop whenever either moved.
    pub(crate) fn add_stop_state(&mut self, stop: StopId, state: StopState) {
        let spec = self.spec;
        let outbound = spec.outbound;
        let time_window = self.config.time_window;
        let dispersion = self.config.stoch_dispersion;

        let mut rejected = false;
        let mut trace_suffix = String::new();

        if !spec.hyperpath {
            let states = self.stop_states.entry(stop).or_default();
            if states.is_empty() {
                states.push(state);
                self.queue.push(LabelStop {
                    label: state.cost,
                    stop,
                });
                trace_suffix.push_str(" (new)");
            } else if state.cost < states[0].cost {
                states[0] = state;
                self.queue.push(LabelStop {
                    label: state.cost,
                    stop,
                });
                trace_suffix.push_str(" (update)");
            } else {
                rejected = true;
                trace_suffix.push_str(" (rejected)");
            }
        } else if !self.hyperpath_states.contains_key(&stop) {
            self.hyperpath_states.insert(
                stop,
                HyperpathState {
                    latest_dep_earliest_arr: state.deparr_time,
                    lder_trip: state.trip,
                    hyperpath_cost: state.cost,
                    process_count: 0,
                },
            );
            self.stop_states.entry(stop).or_default().push(state);
            self.queue.push(LabelStop {
                label: state.cost,
                stop,
            });
            trace_suffix.push_str(" (new)");
        } else {
            // unwrap is safe because the branch above handled the
            // missing-state case
            let hyperpath_state = self.hyperpath_states.get_mut(&stop).unwrap();
            let mut label = state.cost;
            let mut update_state = false;

            // too early (outbound) or too late (inbound) for this stop's window?
            let anchor = hyperpath_state.latest_dep_earliest_arr;
            if (outbound && state.deparr_time < anchor - time_window)
                || (!outbound && state.deparr_time > anchor + time_window)
            {
                rejected = true;
                trace_suffix.push_str(" (rejected)");
            }

            // a later departure (outbound) or earlier arrival (inbound)
            // moves the window anchor
            if (outbound && state.deparr_time > anchor)
                || (!outbound && state.deparr_time < anchor)
            {
                hyperpath_state.latest_dep_earliest_arr = state.deparr_time;
                hyperpath_state.lder_trip = state.trip;
                update_state = true;
                label = hyperpath_state.hyperpath_cost;
                trace_suffix.push_str(" (window)");
            }

            if !rejected {
                let anchor = hyperpath_state.latest_dep_earliest_arr;
                let states = self.stop_states.entry(stop).or_default();
                let mut substituted = false;
                let mut logit_sum = 0.0;
                let mut kept = Vec::with_capacity(states.len() + 1);
                let mut pruned = Vec::new();
                for mut existing in states.drain(..) {
                    if existing.same_link(&state) {
                        existing = state;
                        substituted = true;
                        trace_suffix.push_str(" (sub)");
                    }
                    // the anchor may just have moved; drop records that
                    // fell out of the window
                    let out_of_window = if outbound {
                        existing.deparr_time < anchor - time_window
                    } else {
                        existing.deparr_time > anchor + time_window
                    };
                    if out_of_window {
                        pruned.push(existing);
                    } else {
                        logit_sum += (-dispersion * existing.cost).exp();
                        kept.push(existing);
                    }
                }
                *states = kept;
                if !substituted {
                    states.push(state);
                    logit_sum += (-dispersion * state.cost).exp();
                }

                let hyperpath_cost = (-1.0 / dispersion) * logit_sum.ln();
                if (hyperpath_cost - hyperpath_state.hyperpath_cost).abs() > 1e-4 {
                    trace_suffix.push_str(&format!(
                        " (hp cost {:.4}->{:.4})",
                        hyperpath_state.hyperpath_cost, hyperpath_cost
                    ));
                    update_state = true;
                    hyperpath_state.hyperpath_cost = hyperpath_cost;
                    label = hyperpath_cost;
                }

                if update_state {
                    self.queue.push(LabelStop { label, stop });
                }

                if let Some(trace) = self.trace.as_mut() {
                    for dropped in &pruned {
                        trace.note(format!(
                            "  + del {} (prune-window)",
                            stop_state_row(self.network, spec, stop, dropped)
                        ));
                    }
                }
            }
        }

        if let Some(trace) = self.trace.as_mut() {
            trace.note(format!(
                "  + new {}{}",
                stop_state_row(self.network, spec, stop, &state),
                trace_suffix
            ));
            if !rejected {
                trace.label_link(self.network, spec, stop, &state);
            }
        }
    }

    /// Process the label queue to exhaustion. Returns the number of label
    /// iterations and the largest per-stop process count seen.
    pub(crate) fn label_stops(&mut self) -> Result<(u32, u32), LabelQueueError> {
        let spec = self.spec;
        let max_count_cap = self.config.stoch_max_stop_process_count;
        let mut label_iterations: u32 = 1;
        let mut max_process_count: u32 = 0;
        let mut has_last_stop: Option<StopId> = None;

        while !self.queue.is_empty() {
            // outbound: we can depart from *stop* at *deparr_time* towards
            // *stop_succpred*, and the label is the cost to the destination.
            // inbound: we arrive at *stop* from *stop_succpred*, and the
            // label is the cost from the origin.
            let current = self.queue.pop_top()?;

            // a stop popped twice in a row would be a no-op
            if has_last_stop == Some(current.stop) {
                continue;
            }

            if spec.hyperpath {
                let hyperpath_state = match self.hyperpath_states.get_mut(&current.stop) {
                    Some(hyperpath_state) => hyperpath_state,
                    None => {
                        warn!("Popped stop {} has no hyperpath state", current.stop);
                        continue;
                    }
                };
                if max_count_cap > 0 && hyperpath_state.process_count == max_count_cap {
                    if let Some(trace) = self.trace.as_mut() {
                        trace.note(format!(
                            "Stop {} has been processed the limit {} times, skipping",
                            self.network.stop_name(current.stop),
                            max_count_cap
                        ));
                    }
                    continue;
                }
                hyperpath_state.process_count += 1;
                max_process_count = max_process_count.max(hyperpath_state.process_count);
            }

            if self.trace.is_some() {
                self.trace_pulled_stop(label_iterations, &current);
            }

            self.update_stop_states_for_transfers(label_iterations, current);
            self.update_stop_states_for_trips(label_iterations, current);

            label_iterations += 1;
            has_last_stop = Some(current.stop);
        }

        debug!(
            "Labeling done in {} iterations, max process count {}",
            label_iterations, max_process_count
        );
        Ok((label_iterations, max_process_count))
    }

    fn trace_pulled_stop(&mut self, label_iteration: u32, current: &LabelStop) {
        let network = self.network;
        let spec = self.spec;
        let states = self.stop_states.get(&current.stop).cloned().unwrap_or_default();
        let header = stop_state_header(spec);
        if let Some(trace) = self.trace.as_mut() {
            let mut pulled = format!(
                "Pulling from label_stop_queue (iteration {:>6}, stop {}",
                label_iteration,
                network.stop_name(current.stop)
            );
            if let Some(hyperpath_state) = self.hyperpath_states.get(&current.stop) {
                pulled.push_str(&format!(
                    ", count {}, label {:.6}, cost {:.6}, len {}, {} {}",
                    hyperpath_state.process_count,
                    current.label,
                    hyperpath_state.hyperpath_cost,
                    states.len(),
                    if spec.outbound {
                        "latest_dep"
                    } else {
                        "earliest_arr"
                    },
                    format_clock(hyperpath_state.latest_dep_earliest_arr)
                ));
            } else if let Some(front) = states.first() {
                pulled.push_str(&format!(", cost {:.6}, len {}", front.cost, states.len()));
            }
            pulled.push_str(") :======");
            trace.note(pulled);
            trace.note(format!("        {}", header));
            for state in &states {
                trace.note(format!(
                    "        {}",
                    stop_state_row(network, spec, current.stop, state)
                ));
            }
            trace.note("==============================");
            trace.stop_visited(network.stop_name(current.stop), label_iteration);
        }
    }

    /// Relax the popped stop through walking transfers. Outbound labeling
    /// walks backwards, so it follows transfers arriving at the stop;
    /// inbound follows transfers leaving it.
    fn update_stop_states_for_transfers(&mut self, label_iteration: u32, current: LabelStop) {
        let network = self.network;
        let spec = self.spec;
        let dir_factor = spec.dir_factor();

        let current_states = match self.stop_states.get(&current.stop) {
            Some(states) if !states.is_empty() => states.clone(),
            _ => return,
        };
        let current_mode = current_states[0].deparr_mode;
        let current_trip = current_states[0].trip;
        let mut latest_dep_earliest_arr = current_states[0].deparr_time;

        // no transfer to/from access or egress
        if current_mode == Mode::Egress || current_mode == Mode::Access {
            return;
        }
        // deterministic: no back-to-back walks
        if !spec.hyperpath && current_mode == Mode::Transfer {
            return;
        }

        let mut current_nonwalk_label = 0.0;
        if spec.hyperpath {
            if let Some(hyperpath_state) = self.hyperpath_states.get(&current.stop) {
                latest_dep_earliest_arr = hyperpath_state.latest_dep_earliest_arr;
            }
            current_nonwalk_label = nonwalk_label(&current_states, self.config.stoch_dispersion);
            if let Some(trace) = self.trace.as_mut() {
                trace.note(format!("  nonwalk label:    {}", current_nonwalk_label));
            }
            // reachable only by walking: a transfer here would chain walks
            if current_nonwalk_label == MAX_COST {
                return;
            }
        }

        let transfers = match network.transfers(current.stop, spec.outbound) {
            Some(transfers) => transfers,
            None => return,
        };
        let transfer_supply_mode = match network.transfer_supply_mode() {
            Some(supply_mode) => supply_mode,
            None => return,
        };
        let transfer_weights = match network.transfer_weights(&spec.user_class) {
            Some(weights) => weights,
            None => return,
        };

        for (xfer_stop, xfer_attrs) in transfers {
            let transfer_time = match xfer_attrs.get("time_min") {
                Some(time) => *time,
                None => {
                    warn!("Transfer link at stop {} has no time_min", xfer_stop);
                    continue;
                }
            };
            // outbound: departure time = latest departure - transfer
            //  inbound: arrival time   = earliest arrival + transfer
            let mut deparr_time = latest_dep_earliest_arr - transfer_time * dir_factor;
            let link_cost;
            let mut cost;

            if spec.hyperpath {
                let mut link_attr = xfer_attrs.clone();
                link_attr.insert("transfer_penalty".to_string(), 1.0);
                link_cost = tally_link_cost(
                    transfer_supply_mode,
                    network,
                    transfer_weights,
                    &link_attr,
                    self.trace.as_mut(),
                );
                cost = current_nonwalk_label + link_cost;
            } else {
                link_cost = transfer_time;
                cost = current.label + link_cost;

                // someone was bumped off the current trip here; make sure
                // this transfer still gets in line early enough
                if spec.outbound {
                    if let (LinkRef::Trip(trip), Some(seq)) = (current_trip, current_states[0].seq)
                    {
                        let trip_stop = TripStop {
                            trip,
                            seq,
                            stop: current.stop,
                        };
                        if let Some(latest_time) = network.bump_wait(&trip_stop) {
                            if deparr_time - self.config.time_window > latest_time {
                                continue;
                            }
                            cost +=
                                (current_states[0].deparr_time - latest_time) + self.config.bump_buffer;
                            deparr_time = latest_time - transfer_time - self.config.bump_buffer;
                        }
                    }
                }
            }

            let state = StopState {
                deparr_time,
                deparr_mode: Mode::Transfer,
                trip: LinkRef::Walk,
                stop_succpred: current.stop,
                seq: None,
                seq_succpred: None,
                link_time: transfer_time,
                link_cost,
                cost,
                iteration: label_iteration,
                arrdep_time: latest_dep_earliest_arr,
            };
            self.add_stop_state(*xfer_stop, state);
        }
    }

    /// Relax the popped stop through scheduled trips serving it within the
    /// time window, offering a transit link for every feasible board
    /// (outbound) or alight (inbound) stop of each trip.
    fn update_stop_states_for_trips(&mut self, label_iteration: u32, current: LabelStop) {
        let network = self.network;
        let spec = self.spec;
        let dir_factor = spec.dir_factor();

        let transit_weights =
            match network.weights(&spec.user_class, Mode::Transit, &spec.transit_mode) {
                Some(weights) => weights,
                None => return,
            };

        let current_states = match self.stop_states.get(&current.stop) {
            Some(states) if !states.is_empty() => states.clone(),
            _ => return,
        };
        let current_mode = current_states[0].deparr_mode;
        let current_trip = current_states[0].trip;
        let mut latest_dep_earliest_arr = current_states[0].deparr_time;
        let mut has_lder_trip = None;
        let mut current_hyperpath_cost = 0.0;
        if spec.hyperpath {
            if let Some(hyperpath_state) = self.hyperpath_states.get(&current.stop) {
                latest_dep_earliest_arr = hyperpath_state.latest_dep_earliest_arr;
                has_lder_trip = Some(hyperpath_state.lder_trip);
                current_hyperpath_cost = hyperpath_state.hyperpath_cost;
            }
        }

        let relevant_trips = network.trips_within_time(
            current.stop,
            spec.outbound,
            latest_dep_earliest_arr,
            self.config.time_window,
        );
        for stop_time in &relevant_trips {
            // the trip that set the window anchor would only re-offer
            // itself; two links in a row on the same trip is not a path
            if spec.hyperpath && has_lder_trip == Some(LinkRef::Trip(stop_time.trip)) {
                continue;
            }

            let trip_info = match network.trip_info(stop_time.trip) {
                Some(trip_info) => trip_info,
                None => {
                    warn!("No trip info for trip {}", stop_time.trip);
                    continue;
                }
            };
            // this supply mode is not allowed for the user class/demand mode
            let named_weights = match transit_weights.get(&trip_info.supply_mode) {
                Some(weights) => weights,
                None => continue,
            };

            if let Some(trace) = self.trace.as_mut() {
                trace.note(format!(
                    "valid trips: {} {} {}",
                    network.trip_name(stop_time.trip),
                    stop_time.seq,
                    format_clock(if spec.outbound {
                        stop_time.arrive_time
                    } else {
                        stop_time.depart_time
                    })
                ));
            }

            // trip arrival time (outbound) / trip departure time (inbound)
            let arrdep_time = if spec.outbound {
                stop_time.arrive_time
            } else {
                stop_time.depart_time
            };
            let wait_time = (latest_dep_earliest_arr - arrdep_time) * dir_factor;
            if wait_time < 0.0 {
                warn!("wait_time < 0 -- this should not happen");
                if let Some(trace) = self.trace.as_mut() {
                    trace.note("wait_time < 0 -- this should not happen!");
                }
            }

            if !spec.hyperpath && self.bumped_off_candidate(&current_states, stop_time, arrdep_time, current)
            {
                continue;
            }

            let possible_stops = match network.trip_stop_times(stop_time.trip) {
                Some(stop_times) => stop_times,
                None => continue,
            };

            // board stops precede the current alight stop (outbound);
            // alight stops follow the current board stop (inbound)
            let start_seq = if spec.outbound { 1 } else { stop_time.seq + 1 };
            let end_seq = if spec.outbound {
                stop_time.seq.saturating_sub(1)
            } else {
                possible_stops.len() as u32
            };
            for seq_num in start_seq..=end_seq {
                let board_alight = &possible_stops[(seq_num - 1) as usize];
                let board_alight_stop = board_alight.stop;

                // hyperpath: a successor/predecessor seeded by access or
                // egress stays terminal
                if spec.hyperpath {
                    let has_front = self
                        .stop_states
                        .get(&board_alight_stop)
                        .and_then(|states| states.first());
                    if let Some(front) = has_front {
                        if front.deparr_mode == Mode::Access || front.deparr_mode == Mode::Egress {
                            continue;
                        }
                    }
                }

                let mut deparr_time = if spec.outbound {
                    board_alight.depart_time
                } else {
                    board_alight.arrive_time
                };
                // the schedule crossed midnight
                if spec.outbound && arrdep_time < deparr_time {
                    deparr_time -= MINUTES_PER_DAY;
                    if let Some(trace) = self.trace.as_mut() {
                        trace.note("trip crossed midnight; adjusting deparr_time");
                    }
                } else if !spec.outbound && deparr_time < arrdep_time {
                    deparr_time += MINUTES_PER_DAY;
                    if let Some(trace) = self.trace.as_mut() {
                        trace.note("trip crossed midnight; adjusting deparr_time");
                    }
                }
                let in_vehicle_time = (arrdep_time - deparr_time) * dir_factor;
                if in_vehicle_time < 0.0 {
                    warn!("in_vehicle_time < 0 -- this should not happen");
                    if let Some(trace) = self.trace.as_mut() {
                        trace.note("in_vehicle_time < 0 -- this should not happen!");
                    }
                }

                let link_cost;
                let cost;
                if spec.hyperpath {
                    let mut link_attr = trip_info.attributes.clone();
                    link_attr.insert("in_vehicle_time_min".to_string(), in_vehicle_time);
                    link_attr.insert("wait_time_min".to_string(), wait_time);

                    let mut addon_cost = 0.0;
                    // When the current link is the seed walk, the label is
                    // as late (outbound) or early (inbound) as possible and
                    // the wait is really a schedule-preference delay,
                    // charged against the walk's own supply mode.
                    if (spec.outbound && current_mode == Mode::Egress)
                        || (!spec.outbound && current_mode == Mode::Access)
                    {
                        link_attr.insert("wait_time_min".to_string(), 0.0);
                        if let LinkRef::SupplyMode(walk_supply_mode) = current_trip {
                            if let Some(delay_weights) = network.supply_mode_weights(
                                &spec.user_class,
                                spec.start_mode(),
                                spec.start_demand_mode(),
                                walk_supply_mode,
                            ) {
                                let mut delay_attr = crate::network::Attributes::new();
                                delay_attr.insert("time_min".to_string(), 0.0);
                                delay_attr.insert("preferred_delay_min".to_string(), wait_time);
                                addon_cost = tally_link_cost(
                                    walk_supply_mode,
                                    network,
                                    delay_weights,
                                    &delay_attr,
                                    self.trace.as_mut(),
                                );
                            }
                        }
                    }
                    // a trip chained right after a trip is a zero-walk
                    // transfer and still pays the transfer penalty
                    else if current_mode.is_trip() {
                        if let (Some(transfer_supply_mode), Some(transfer_weights)) = (
                            network.transfer_supply_mode(),
                            network.transfer_weights(&spec.user_class),
                        ) {
                            let mut xfer_attr = crate::network::Attributes::new();
                            xfer_attr.insert("transfer_penalty".to_string(), 1.0);
                            xfer_attr.insert("walk_time_min".to_string(), 0.0);
                            addon_cost = tally_link_cost(
                                transfer_supply_mode,
                                network,
                                transfer_weights,
                                &xfer_attr,
                                self.trace.as_mut(),
                            );
                        }
                    }

                    let transfer_penalty =
                        if current_mode == Mode::Access || current_mode == Mode::Egress {
                            0.0
                        } else {
                            1.0
                        };
                    link_attr.insert("transfer_penalty".to_string(), transfer_penalty);

                    link_cost = addon_cost
                        + tally_link_cost(
                            trip_info.supply_mode,
                            network,
                            named_weights,
                            &link_attr,
                            self.trace.as_mut(),
                        );
                    cost = current_hyperpath_cost + link_cost;
                } else {
                    link_cost = in_vehicle_time + wait_time;
                    cost = current_states[0].cost + link_cost;
                }

                let state = StopState {
                    deparr_time,
                    deparr_mode: Mode::Transit,
                    trip: LinkRef::Trip(stop_time.trip),
                    stop_succpred: current.stop,
                    seq: Some(board_alight.seq),
                    seq_succpred: Some(stop_time.seq),
                    link_time: in_vehicle_time + wait_time,
                    link_cost,
                    cost,
                    iteration: label_iteration,
                    arrdep_time,
                };
                self.add_stop_state(board_alight_stop, state);
            }
        }
    }

    /// Deterministic capacity check. Outbound keys the bump-wait table on
    /// the current state (can we still make the trip we leave on?);
    /// inbound keys it on the candidate trip (can we board it at all?).
    fn bumped_off_candidate(
        &mut self,
        current_states: &[StopState],
        stop_time: &crate::network::TripStopTime,
        arrdep_time: f64,
        current: LabelStop,
    ) -> bool {
        let (has_trip_stop, arrive_time) = if self.spec.outbound {
            let trip_stop = match (current_states[0].trip, current_states[0].seq) {
                (LinkRef::Trip(trip), Some(seq)) => Some(TripStop {
                    trip,
                    seq,
                    stop: current.stop,
                }),
                _ => None,
            };
            // arrive from the loop trip
            (trip_stop, arrdep_time)
        } else {
            (
                Some(TripStop {
                    trip: stop_time.trip,
                    seq: stop_time.seq,
                    stop: current.stop,
                }),
                current_states[0].deparr_time,
            )
        };
        let trip_stop = match has_trip_stop {
            Some(trip_stop) => trip_stop,
            None => return false,
        };
        let latest_time = match self.network.bump_wait(&trip_stop) {
            Some(latest_time) => latest_time,
            None => return false,
        };
        if let Some(trace) = self.trace.as_mut() {
            trace.note(format!(
                "checking latest_time {} vs arrive_time {} for potential trip {}",
                format_clock(latest_time),
                format_clock(arrive_time),
                self.network.trip_name(stop_time.trip)
            ));
        }
        arrive_time + 0.01 >= latest_time && current_states[0].trip != LinkRef::Trip(stop_time.trip)
    }

    /// Mirror of the seeding step, run from the opposite TAZ once the
    /// queue has drained: attach its access/egress links to every labeled
    /// stop and offer the resulting states to the opposite TAZ.
    pub(crate) fn finalize_taz_state(&mut self, label_iteration: u32) {
        let network = self.network;
        let spec = self.spec;
        let end_taz = spec.end_taz();
        let dir_factor = spec.dir_factor();

        let taz_links = match network.access_links(end_taz) {
            Some(links) => links,
            None => return,
        };
        let weights = match network.weights(
            &spec.user_class,
            spec.end_mode(),
            spec.end_demand_mode(),
        ) {
            Some(weights) => weights,
            None => {
                warn!(
                    "No weights configured for user class [{}], {} mode [{}]",
                    spec.user_class,
                    spec.end_mode(),
                    spec.end_demand_mode()
                );
                return;
            }
        };

        if let Some(trace) = self.trace.as_mut() {
            trace.stop_visited(network.stop_name(end_taz), label_iteration);
        }

        for (supply_mode, mode_weights) in weights {
            if let Some(trace) = self.trace.as_mut() {
                trace.note(format!(
                    "Weights exist for supply mode {} => {}",
                    supply_mode,
                    network.supply_mode_name(*supply_mode)
                ));
            }
            let links = match taz_links.get(supply_mode) {
                Some(links) => links,
                None => {
                    if let Some(trace) = self.trace.as_mut() {
                        trace.note("No links for this supply mode");
                    }
                    continue;
                }
            };
            for (stop, attrs) in links {
                let access_time = match attrs.get("time_min") {
                    Some(time) => *time,
                    None => {
                        warn!("Access link to stop {} has no time_min", stop);
                        continue;
                    }
                };
                let current_states = match self.stop_states.get(stop) {
                    Some(states) if !states.is_empty() => states.clone(),
                    _ => continue,
                };

                let mut link_attr = attrs.clone();
                link_attr.insert("preferred_delay_min".to_string(), 0.0);

                let mut earliest_dep_latest_arr = current_states[0].deparr_time;
                let mut deparr_time;
                let link_cost;
                let mut cost;

                if spec.hyperpath {
                    for state in &current_states {
                        earliest_dep_latest_arr = if spec.outbound {
                            earliest_dep_latest_arr.min(state.deparr_time)
                        } else {
                            earliest_dep_latest_arr.max(state.deparr_time)
                        };
                    }
                    let stop_nonwalk_label =
                        nonwalk_label(&current_states, self.config.stoch_dispersion);
                    // reachable only by walking, and this link is another walk
                    if stop_nonwalk_label == MAX_COST {
                        continue;
                    }
                    deparr_time = earliest_dep_latest_arr - access_time * dir_factor;
                    link_cost = tally_link_cost(
                        *supply_mode,
                        network,
                        mode_weights,
                        &link_attr,
                        self.trace.as_mut(),
                    );
                    cost = stop_nonwalk_label + link_cost;
                } else {
                    deparr_time = earliest_dep_latest_arr - access_time * dir_factor;
                    // first leg has to be a trip
                    if !current_states[0].deparr_mode.is_trip() {
                        continue;
                    }
                    link_cost = access_time;
                    cost = current_states[0].cost + link_cost;

                    if spec.outbound {
                        if let (LinkRef::Trip(trip), Some(seq)) =
                            (current_states[0].trip, current_states[0].seq)
                        {
                            let trip_stop = TripStop {
                                trip,
                                seq,
                                stop: *stop,
                            };
                            if let Some(latest_time) = network.bump_wait(&trip_stop) {
                                // we cannot get in line in time
                                if deparr_time - self.config.time_window > latest_time {
                                    continue;
                                }
                                cost += (current_states[0].deparr_time - latest_time)
                                    + self.config.bump_buffer;
                                deparr_time =
                                    latest_time - access_time - self.config.bump_buffer;
                            }
                        }
                    }
                }

                let state = StopState {
                    deparr_time,
                    deparr_mode: spec.end_mode(),
                    trip: LinkRef::SupplyMode(*supply_mode),
                    stop_succpred: *stop,
                    seq: None,
                    seq_succpred: None,
                    link_time: access_time,
                    link_cost,
                    cost,
                    iteration: label_iteration,
                    arrdep_time: earliest_dep_latest_arr,
                };
                self.add_stop_state(end_taz, state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathfinderConfig;
    use crate::network::{Network, NetworkBuilder};
    use crate::request::PathSpecification;

    fn spec(hyperpath: bool) -> PathSpecification {
        PathSpecification {
            iteration: 1,
            passenger_id: "p".to_string(),
            path_id: 1,
            outbound: true,
            hyperpath,
            user_class: "all".to_string(),
            access_mode: "walk".to_string(),
            transit_mode: "transit".to_string(),
            egress_mode: "walk".to_string(),
            origin_taz: 1,
            destination_taz: 2,
            preferred_time: 520.0,
            trace: false,
        }
    }

    fn empty_network() -> Network {
        NetworkBuilder::new().build()
    }

    fn transit_state(trip: u32, deparr_time: f64, cost: f64) -> StopState {
        StopState {
            deparr_time,
            deparr_mode: Mode::Transit,
            trip: LinkRef::Trip(trip),
            stop_succpred: 99,
            seq: Some(1),
            seq_succpred: Some(2),
            link_time: 5.0,
            link_cost: cost,
            cost,
            iteration: 1,
            arrdep_time: deparr_time + 5.0,
        }
    }

    #[test]
    fn deterministic_store_keeps_the_single_cheapest_state() {
        let network = empty_network();
        let config = PathfinderConfig::default();
        let spec = spec(false);
        let mut search = Search::new(&network, &config, &spec, None);

        search.add_stop_state(7, transit_state(1, 500.0, 20.0));
        search.add_stop_state(7, transit_state(2, 505.0, 30.0));
        assert_eq!(search.stop_states[&7].len(), 1);
        assert_eq!(search.stop_states[&7][0].trip, LinkRef::Trip(1));

        search.add_stop_state(7, transit_state(3, 490.0, 10.0));
        assert_eq!(search.stop_states[&7].len(), 1);
        assert_eq!(search.stop_states[&7][0].trip, LinkRef::Trip(3));
        assert_eq!(search.stop_states[&7][0].cost, 10.0);
    }

    #[test]
    fn hyperpath_anchor_follows_the_latest_departure() {
        let network = empty_network();
        let config = PathfinderConfig::default();
        let spec = spec(true);
        let mut search = Search::new(&network, &config, &spec, None);

        search.add_stop_state(7, transit_state(1, 500.0, 20.0));
        assert_eq!(
            search.hyperpath_states[&7].latest_dep_earliest_arr,
            500.0
        );
        assert_eq!(search.hyperpath_states[&7].lder_trip, LinkRef::Trip(1));

        search.add_stop_state(7, transit_state(2, 510.0, 25.0));
        assert_eq!(
            search.hyperpath_states[&7].latest_dep_earliest_arr,
            510.0
        );
        assert_eq!(search.hyperpath_states[&7].lder_trip, LinkRef::Trip(2));
        assert_eq!(search.stop_states[&7].len(), 2);
    }

    #[test]
    fn hyperpath_window_rejects_and_prunes() {
        let network = empty_network();
        let config = PathfinderConfig::default();
        let spec = spec(true);
        let mut search = Search::new(&network, &config, &spec, None);

        search.add_stop_state(7, transit_state(1, 500.0, 20.0));
        // outbound: a departure before anchor - time_window is rejected
        search.add_stop_state(7, transit_state(2, 460.0, 5.0));
        assert_eq!(search.stop_states[&7].len(), 1);

        // a departure extending the anchor prunes states that fell out
        search.add_stop_state(7, transit_state(3, 531.0, 25.0));
        assert_eq!(
            search.hyperpath_states[&7].latest_dep_earliest_arr,
            531.0
        );
        let surviving: Vec<LinkRef> = search.stop_states[&7]
            .iter()
            .map(|state| state.trip)
            .collect();
        assert_eq!(surviving, vec![LinkRef::Trip(3)]);
    }

    #[test]
    fn hyperpath_aggregate_never_increases_with_alternatives() {
        let network = empty_network();
        let config = PathfinderConfig::default();
        let spec = spec(true);
        let mut search = Search::new(&network, &config, &spec, None);

        search.add_stop_state(7, transit_state(1, 500.0, 20.0));
        let mut previous = search.hyperpath_states[&7].hyperpath_cost;
        for (trip, cost) in [(2, 30.0), (3, 25.0), (4, 50.0)] {
            search.add_stop_state(7, transit_state(trip, 500.0, cost));
            let aggregate = search.hyperpath_states[&7].hyperpath_cost;
            assert!(aggregate <= previous + 1e-12);
            previous = aggregate;
        }
    }

    #[test]
    fn hyperpath_substitutes_matching_links_in_place() {
        let network = empty_network();
        let config = PathfinderConfig::default();
        let spec = spec(true);
        let mut search = Search::new(&network, &config, &spec, None);

        search.add_stop_state(7, transit_state(1, 500.0, 20.0));
        search.add_stop_state(7, transit_state(1, 505.0, 12.0));
        assert_eq!(search.stop_states[&7].len(), 1);
        assert_eq!(search.stop_states[&7][0].cost, 12.0);
    }
}
