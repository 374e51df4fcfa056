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

use skadi::tracing::dispatcher::DefaultGuard;
use skadi::{Mode, NetworkBuilder, PathSpecification};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const TAZ_ORIGIN: u32 = 1;
pub const TAZ_DESTINATION: u32 = 2;
pub const WALK_MODE: u32 = 2;
pub const TRANSFER_MODE: u32 = 1;
pub const BUS_MODE: u32 = 12;

#[must_use]
pub fn init_test_logger() -> DefaultGuard {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| "debug".to_string());
    let env_filter_subscriber =
        EnvFilter::try_new(rust_log).unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .with(env_filter_subscriber)
        .set_default()
}

/// A builder pre-loaded with the supply modes and the unit weights every
/// scenario shares: walking time for access/egress/transfer, in-vehicle
/// and wait time for transit.
pub fn base_builder() -> NetworkBuilder {
    NetworkBuilder::new()
        .supply_mode(TRANSFER_MODE, "transfer")
        .supply_mode(WALK_MODE, "walk")
        .supply_mode(BUS_MODE, "local_bus")
        .weight("all", Mode::Access, "walk", WALK_MODE, "time_min", 1.0)
        .weight("all", Mode::Egress, "walk", WALK_MODE, "time_min", 1.0)
        .weight("all", Mode::Transfer, "transfer", TRANSFER_MODE, "time_min", 1.0)
        .weight(
            "all",
            Mode::Transit,
            "transit",
            BUS_MODE,
            "in_vehicle_time_min",
            1.0,
        )
        .weight("all", Mode::Transit, "transit", BUS_MODE, "wait_time_min", 1.0)
}

pub fn spec(outbound: bool, hyperpath: bool, preferred_time: f64) -> PathSpecification {
    PathSpecification {
        iteration: 1,
        passenger_id: "passenger_1".to_string(),
        path_id: 11,
        outbound,
        hyperpath,
        user_class: "all".to_string(),
        access_mode: "walk".to_string(),
        transit_mode: "transit".to_string(),
        egress_mode: "walk".to_string(),
        origin_taz: TAZ_ORIGIN,
        destination_taz: TAZ_DESTINATION,
        preferred_time,
        trace: false,
    }
}
