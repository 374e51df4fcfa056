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

pub mod cost;
pub mod enumeration;
pub mod label_queue;
pub mod labeling;
pub mod stop_states;

use std::collections::BTreeMap;

use crate::config::PathfinderConfig;
use crate::network::{Network, StopId};
use crate::request::PathSpecification;
use crate::trace::Trace;

use self::label_queue::LabelStopQueue;
use self::stop_states::{HyperpathState, StopState};

/// Everything scoped to one `find_path` call. Borrows the network and
/// configuration read-only; owns the stop states, the label queue, and
/// the trace artifacts, all of which die with the request.
pub(crate) struct Search<'a> {
    pub(crate) network: &'a Network,
    pub(crate) config: &'a PathfinderConfig,
    pub(crate) spec: &'a PathSpecification,
    pub(crate) stop_states: BTreeMap<StopId, Vec<StopState>>,
    pub(crate) hyperpath_states: BTreeMap<StopId, HyperpathState>,
    pub(crate) queue: LabelStopQueue,
    pub(crate) trace: Option<Trace>,
}

impl<'a> Search<'a> {
    pub(crate) fn new(
        network: &'a Network,
        config: &'a PathfinderConfig,
        spec: &'a PathSpecification,
        trace: Option<Trace>,
    ) -> Self {
        Self {
            network,
            config,
            spec,
            stop_states: BTreeMap::new(),
            hyperpath_states: BTreeMap::new(),
            queue: LabelStopQueue::new(),
            trace,
        }
    }
}
