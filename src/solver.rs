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

use std::time::SystemTime;

use tracing::{debug, warn};

use crate::config::PathfinderConfig;
use crate::engine::label_queue::LabelQueueError;
use crate::engine::Search;
use crate::network::Network;
use crate::request::PathSpecification;
use crate::response::PathResponse;
use crate::trace::Trace;

#[derive(Debug)]
pub enum SearchError {
    Queue(LabelQueueError),
}

impl std::fmt::Display for SearchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchError::Queue(err) => write!(f, "Label queue failure : {}", err),
        }
    }
}

impl std::error::Error for SearchError {}

impl From<LabelQueueError> for SearchError {
    fn from(err: LabelQueueError) -> Self {
        SearchError::Queue(err)
    }
}

/// Entry point of the pathfinder. Holds nothing request-scoped: one
/// `PathFinder` may serve any number of requests, and several may share
/// the same network concurrently.
pub struct PathFinder<'a> {
    network: &'a Network,
    config: &'a PathfinderConfig,
}

impl<'a> PathFinder<'a> {
    pub fn new(network: &'a Network, config: &'a PathfinderConfig) -> Self {
        Self { network, config }
    }

    /// Compute one itinerary. An empty path in the response means no
    /// path was found; a `SearchError` means the search data structures
    /// broke an invariant and the request cannot be trusted.
    pub fn find_path(&self, spec: &PathSpecification) -> Result<PathResponse, SearchError> {
        let trace = if spec.trace {
            match Trace::open(&self.config.output_dir, spec) {
                Ok(trace) => Some(trace),
                Err(err) => {
                    warn!(
                        "Could not open trace artifacts in {:?} : {}. Tracing disabled \
                         for path {}",
                        self.config.output_dir, err, spec.path_id
                    );
                    None
                }
            }
        } else {
            None
        };

        let mut search = Search::new(self.network, self.config, spec, trace);
        let mut response = PathResponse::default();

        let labeling_timer = SystemTime::now();

        if !search.initialize_stop_states() {
            debug!(
                "No seed for path {} : origin/destination TAZ has no usable links",
                spec.path_id
            );
            if let Some(trace) = search.trace.take() {
                trace.close();
            }
            return Ok(response);
        }

        let (label_iterations, max_process_count) = search.label_stops()?;
        response.performance.label_iterations = label_iterations;
        response.performance.max_process_count = max_process_count;

        search.finalize_taz_state(label_iterations);

        response.performance.milliseconds_labeling = elapsed_ms(labeling_timer);

        let enumeration_timer = SystemTime::now();
        if let Some((path, path_info)) = search.get_found_path() {
            response.path = path;
            response.path_info = path_info;
        }
        response.performance.milliseconds_enumerating = elapsed_ms(enumeration_timer);

        if let Some(mut trace) = search.trace.take() {
            trace.note(format!(
                "        label iterations: {}",
                response.performance.label_iterations
            ));
            trace.note(format!(
                "       max process count: {}",
                response.performance.max_process_count
            ));
            trace.note(format!(
                "   milliseconds labeling: {}",
                response.performance.milliseconds_labeling
            ));
            trace.note(format!(
                "milliseconds enumerating: {}",
                response.performance.milliseconds_enumerating
            ));
            trace.close();
        }

        Ok(response)
    }
}

fn elapsed_ms(timer: SystemTime) -> u128 {
    match timer.elapsed() {
        Ok(duration) => duration.as_millis(),
        Err(err) => {
            warn!("Timer error : {}", err);
            0
        }
    }
}
