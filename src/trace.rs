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

//! Per-request trace artifacts: a human-readable log of the whole
//! search, a CSV of labeled links, a CSV of visited stops, and the
//! append-only pathset dump.
//!
//! Tracing is debug tooling; a failed write must never sink the request,
//! so every writer here swallows IO errors after the file is open.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::engine::stop_states::{LinkRef, StopState};
use crate::network::{Mode, Network, StopId};
use crate::request::PathSpecification;
use crate::time::{format_clock, format_duration};

pub const TRACE_LOG_PREFIX: &str = "skadi_trace_";
pub const LABELS_PREFIX: &str = "skadi_labels_";
pub const LABELS_IDS_PREFIX: &str = "skadi_labels_ids_";
pub const PATHSET_FILE: &str = "skadi_pathset.txt";

pub(crate) struct Trace {
    log: BufWriter<File>,
    labels: csv::Writer<File>,
    stop_ids: csv::Writer<File>,
    link_num: u32,
}

fn open_file(path: &Path, truncate: bool) -> std::io::Result<File> {
    if truncate {
        File::create(path)
    } else {
        OpenOptions::new().create(true).append(true).open(path)
    }
}

impl Trace {
    /// Open the three per-path artifacts. Files are truncated on the
    /// first assignment iteration and appended to afterwards.
    pub fn open(dir: &Path, spec: &PathSpecification) -> std::io::Result<Self> {
        let truncate = spec.iteration == 1;
        let log_file = open_file(
            &dir.join(format!("{}{}.log", TRACE_LOG_PREFIX, spec.path_id)),
            truncate,
        )?;
        let labels_file = open_file(
            &dir.join(format!("{}{}.csv", LABELS_PREFIX, spec.path_id)),
            truncate,
        )?;
        let stop_ids_file = open_file(
            &dir.join(format!("{}{}.csv", LABELS_IDS_PREFIX, spec.path_id)),
            truncate,
        )?;

        let mut trace = Self {
            log: BufWriter::new(log_file),
            labels: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(labels_file),
            stop_ids: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(stop_ids_file),
            link_num: 1,
        };

        let _ = trace.labels.write_record([
            "label_iteration",
            "link",
            "node",
            "time",
            "mode",
            "trip_id",
            "link_time",
            "link_cost",
            "cost",
            "AB",
        ]);
        let _ = trace.stop_ids.write_record(["stop_id", "stop_id_label_iter"]);

        trace.note(format!(
            "Tracing assignment of passenger {} with path id {}",
            spec.passenger_id, spec.path_id
        ));
        trace.note(format!("iteration       = {}", spec.iteration));
        trace.note(format!("outbound        = {}", spec.outbound));
        trace.note(format!("hyperpath       = {}", spec.hyperpath));
        trace.note(format!(
            "preferred_time  = {} ({})",
            format_clock(spec.preferred_time),
            spec.preferred_time
        ));
        trace.note(format!("user_class      = {}", spec.user_class));
        trace.note(format!("access_mode     = {}", spec.access_mode));
        trace.note(format!("transit_mode    = {}", spec.transit_mode));
        trace.note(format!("egress_mode     = {}", spec.egress_mode));
        trace.note(format!("orig_taz_id     = {}", spec.origin_taz));
        trace.note(format!("dest_taz_id     = {}", spec.destination_taz));
        Ok(trace)
    }

    pub fn note(&mut self, line: impl AsRef<str>) {
        let _ = writeln!(self.log, "{}", line.as_ref());
    }

    /// One row of the visited-stops CSV.
    pub fn stop_visited(&mut self, stop_name: &str, label_iteration: u32) {
        let _ = self
            .stop_ids
            .write_record([stop_name.to_string(), label_iteration.to_string()]);
    }

    /// Two rows of the labels CSV, one per link end. The `A` end is the
    /// one closest to the anchor TAZ of the labeling direction.
    pub fn label_link(
        &mut self,
        network: &Network,
        spec: &PathSpecification,
        stop: StopId,
        state: &StopState,
    ) {
        for far_end in [false, true] {
            let node = if far_end {
                network.stop_name(state.stop_succpred)
            } else {
                network.stop_name(stop)
            };
            let time = if far_end {
                state.arrdep_time
            } else {
                state.deparr_time
            };
            let anchor_side = far_end != spec.outbound;
            let _ = self.labels.write_record([
                state.iteration.to_string(),
                self.link_num.to_string(),
                node.to_string(),
                time.to_string(),
                mode_label(network, state),
                trip_label(network, state),
                state.link_time.to_string(),
                state.link_cost.to_string(),
                format!("{:.6}", state.cost),
                if anchor_side { "B" } else { "A" }.to_string(),
            ]);
        }
        self.link_num += 1;
    }

    pub fn close(mut self) {
        let _ = self.log.flush();
        let _ = self.labels.flush();
        let _ = self.stop_ids.flush();
    }
}

/// Append one row to the pathset dump shared by all requests.
pub(crate) fn append_pathset_row(
    dir: &Path,
    spec: &PathSpecification,
    cost: f64,
    probability: f64,
    compat: &str,
) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(PATHSET_FILE))?;
    writeln!(
        file,
        "{} {} {} {:8.2} {:8.6}{}",
        spec.iteration, spec.passenger_id, spec.path_id, cost, probability, compat
    )
}

/// Mode column of trace outputs: transit links show their supply mode.
pub(crate) fn mode_label(network: &Network, state: &StopState) -> String {
    match state.deparr_mode {
        Mode::Access => "Access".to_string(),
        Mode::Egress => "Egress".to_string(),
        Mode::Transfer => "Transfer".to_string(),
        Mode::Transit => match state.trip {
            LinkRef::Trip(trip) => network
                .trip_info(trip)
                .map(|info| network.supply_mode_name(info.supply_mode).to_string())
                .unwrap_or_else(|| "?".to_string()),
            _ => "?".to_string(),
        },
    }
}

/// Trip column of trace outputs.
pub(crate) fn trip_label(network: &Network, state: &StopState) -> String {
    match state.trip {
        LinkRef::Trip(trip) => network.trip_name(trip).to_string(),
        LinkRef::SupplyMode(supply_mode) => network.supply_mode_name(supply_mode).to_string(),
        LinkRef::Walk => "walk".to_string(),
    }
}

pub(crate) fn stop_state_header(spec: &PathSpecification) -> String {
    format!(
        "{:>8}: {:>10}{:>12}{:>22}{:>12}{:>5}{:>5}{:>12}{:>14}{:>13}{:>9}{:>10}",
        "stop",
        if spec.outbound { "dep_time" } else { "arr_time" },
        if spec.outbound { "dep_mode" } else { "arr_mode" },
        "trip_id",
        if spec.outbound { "successor" } else { "predecessor" },
        "seq",
        if spec.outbound { "suc" } else { "pred" },
        "linktime",
        "linkcost",
        "cost",
        "iter",
        if spec.outbound { "arr_time" } else { "dep_time" },
    )
}

pub(crate) fn stop_state_row(
    network: &Network,
    spec: &PathSpecification,
    stop: StopId,
    state: &StopState,
) -> String {
    let seq = state.seq.map_or_else(|| "--".to_string(), |seq| seq.to_string());
    let seq_succpred = state
        .seq_succpred
        .map_or_else(|| "--".to_string(), |seq| seq.to_string());
    let costs = if spec.hyperpath {
        format!("{:>14.4}{:>13.4}", state.link_cost, state.cost)
    } else {
        format!(
            "{:>14}{:>13}",
            format_duration(state.link_cost),
            format_duration(state.cost)
        )
    };
    format!(
        "{:>8}:   {}  {:>10}  {:>20}  {:>10}  {:>3}  {:>3}  {}  {}  {:>7}  {}",
        network.stop_name(stop),
        format_clock(state.deparr_time),
        mode_label(network, state),
        trip_label(network, state),
        network.stop_name(state.stop_succpred),
        seq,
        seq_succpred,
        format_duration(state.link_time),
        costs,
        state.iteration,
        format_clock(state.arrdep_time),
    )
}
