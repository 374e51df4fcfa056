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

mod utils;

use anyhow::Error;
use skadi::{LinkRef, Mode, Network, PathFinder, PathfinderConfig};
use utils::{
    base_builder, init_test_logger, spec, BUS_MODE, TAZ_DESTINATION, TAZ_ORIGIN, WALK_MODE,
};

const S1: u32 = 10;
const S2: u32 = 11;
const S3: u32 = 12;
const S4: u32 = 13;

/// One trip between two stops, walk access on one side and walk egress
/// on the other.
fn single_trip_network() -> Network {
    base_builder()
        .access_link(TAZ_ORIGIN, WALK_MODE, S1, 5.0)
        .access_link(TAZ_DESTINATION, WALK_MODE, S2, 5.0)
        .trip(100, |trip| {
            trip.supply_mode(BUS_MODE)
                .st(S1, 500.0, 500.0)
                .st(S2, 510.0, 510.0)
        })
        .build()
}

#[test]
fn walk_only_network_yields_no_path() -> Result<(), Error> {
    let _guard = init_test_logger();
    // a single TAZ with an access walk and no transit at all
    let network = base_builder()
        .access_link(TAZ_ORIGIN, WALK_MODE, S1, 10.0)
        .build();
    let config = PathfinderConfig::default();
    let mut request = spec(true, false, 480.0);
    request.destination_taz = TAZ_ORIGIN;

    let response = PathFinder::new(&network, &config).find_path(&request)?;
    assert!(response.path.is_empty());
    assert_eq!(response.path_info.cost, 0.0);
    Ok(())
}

#[test]
fn deterministic_outbound_single_trip() -> Result<(), Error> {
    let _guard = init_test_logger();
    let network = single_trip_network();
    let config = PathfinderConfig::default();
    let request = spec(true, false, 520.0);

    let response = PathFinder::new(&network, &config).find_path(&request)?;
    let links = &response.path.links;
    assert_eq!(links.len(), 3);

    // access: leave the origin as late as possible, board with no wait
    assert_eq!(links[0].0, TAZ_ORIGIN);
    assert_eq!(links[0].1.deparr_mode, Mode::Access);
    assert_eq!(links[0].1.trip, LinkRef::SupplyMode(WALK_MODE));
    assert_eq!(links[0].1.deparr_time, 495.0);
    assert_eq!(links[0].1.arrdep_time, 500.0);

    assert_eq!(links[1].0, S1);
    assert_eq!(links[1].1.deparr_mode, Mode::Transit);
    assert_eq!(links[1].1.trip, LinkRef::Trip(100));
    assert_eq!(links[1].1.deparr_time, 500.0);
    assert_eq!(links[1].1.arrdep_time, 510.0);
    assert_eq!(links[1].1.link_time, 10.0);

    // egress: walk off immediately on arrival
    assert_eq!(links[2].0, S2);
    assert_eq!(links[2].1.deparr_mode, Mode::Egress);
    assert_eq!(links[2].1.deparr_time, 510.0);
    assert_eq!(links[2].1.arrdep_time, 515.0);

    // 5 min access + 10 min in vehicle + 5 min egress
    assert_eq!(response.path_info.cost, 20.0);
    assert_eq!(response.performance.label_iterations, 3);
    Ok(())
}

#[test]
fn deterministic_search_is_reproducible() -> Result<(), Error> {
    let _guard = init_test_logger();
    let network = single_trip_network();
    let config = PathfinderConfig::default();
    let request = spec(true, false, 520.0);
    let pathfinder = PathFinder::new(&network, &config);

    let first = pathfinder.find_path(&request)?;
    let second = pathfinder.find_path(&request)?;
    assert_eq!(first.path, second.path);
    assert_eq!(first.path_info.cost, second.path_info.cost);
    Ok(())
}

#[test]
fn inbound_mirror_of_single_trip() -> Result<(), Error> {
    let _guard = init_test_logger();
    let network = single_trip_network();
    let config = PathfinderConfig::default();
    let request = spec(false, false, 480.0);

    let response = PathFinder::new(&network, &config).find_path(&request)?;
    let links = &response.path.links;
    assert_eq!(links.len(), 3);

    // inbound paths are stored from destination back to origin
    let chronological: Vec<_> = response.path.chronological(false).collect();
    assert_eq!(chronological[0].1.deparr_mode, Mode::Access);
    assert_eq!(chronological[1].1.deparr_mode, Mode::Transit);
    assert_eq!(chronological[2].1.deparr_mode, Mode::Egress);

    // same vehicle and clocks as the outbound run, with the
    // departure/arrival readings flipped
    let transit = chronological[1].1;
    assert_eq!(transit.trip, LinkRef::Trip(100));
    assert_eq!(transit.deparr_time, 510.0);
    assert_eq!(transit.arrdep_time, 500.0);
    assert_eq!(transit.link_time, 10.0);

    let access = chronological[0].1;
    assert_eq!(access.deparr_time, 500.0);
    assert_eq!(access.arrdep_time, 495.0);

    let egress = chronological[2].1;
    assert_eq!(egress.deparr_time, 515.0);
    assert_eq!(egress.arrdep_time, 510.0);

    assert_eq!(response.path_info.cost, 20.0);
    Ok(())
}

/// Two trips joined by a walking transfer; the direct egress is made
/// expensive so the transfer chain wins.
fn transfer_network() -> skadi::NetworkBuilder {
    base_builder()
        .access_link(TAZ_ORIGIN, WALK_MODE, S1, 5.0)
        .access_link(TAZ_DESTINATION, WALK_MODE, S2, 60.0)
        .access_link(TAZ_DESTINATION, WALK_MODE, S4, 2.0)
        .transfer(S2, S3, 3.0)
        .trip(100, |trip| {
            trip.supply_mode(BUS_MODE)
                .st(S1, 500.0, 500.0)
                .st(S2, 510.0, 510.0)
        })
        .trip(101, |trip| {
            trip.supply_mode(BUS_MODE)
                .st(S3, 516.0, 516.0)
                .st(S4, 525.0, 525.0)
        })
}

#[test]
fn deterministic_transfer_chain_wins_over_long_egress() -> Result<(), Error> {
    let _guard = init_test_logger();
    let network = transfer_network().build();
    let config = PathfinderConfig::default();
    let request = spec(true, false, 530.0);

    let response = PathFinder::new(&network, &config).find_path(&request)?;
    let links = &response.path.links;
    assert_eq!(links.len(), 5);

    let modes: Vec<Mode> = links.iter().map(|(_, state)| state.deparr_mode).collect();
    assert_eq!(
        modes,
        vec![
            Mode::Access,
            Mode::Transit,
            Mode::Transfer,
            Mode::Transit,
            Mode::Egress
        ]
    );

    // the transfer departs on arrival of the first trip
    assert_eq!(links[2].0, S2);
    assert_eq!(links[2].1.stop_succpred, S3);
    assert_eq!(links[2].1.deparr_time, 510.0);
    assert_eq!(links[2].1.arrdep_time, 513.0);

    // second trip waits 3 min at the boarding stop
    assert_eq!(links[3].1.trip, LinkRef::Trip(101));
    assert_eq!(links[3].1.link_time, 12.0);

    // 5 access + 10 ivt + 3 transfer + (9 ivt + 3 wait) + 2 egress
    assert_eq!(response.path_info.cost, 32.0);
    Ok(())
}

#[test]
fn bump_wait_on_boarding_stop_blocks_or_keeps_the_path() -> Result<(), Error> {
    let _guard = init_test_logger();
    let config = PathfinderConfig::default();
    let request = spec(true, false, 530.0);

    // a bumped passenger started waiting long before we could get in
    // line: the access link is skipped and no path remains
    let network = transfer_network().bump_wait(100, 1, S1, 400.0).build();
    let response = PathFinder::new(&network, &config).find_path(&request)?;
    assert!(response.path.is_empty());

    // exactly on the window boundary the strict comparison keeps the link
    let network = transfer_network().bump_wait(100, 1, S1, 465.0).build();
    let response = PathFinder::new(&network, &config).find_path(&request)?;
    assert_eq!(response.path.links.len(), 5);
    assert_eq!(response.path_info.cost, 32.0);
    Ok(())
}

#[test]
fn midnight_crossing_trip_has_non_negative_in_vehicle_time() -> Result<(), Error> {
    let _guard = init_test_logger();
    // departs 23:55, arrives 00:05
    let network = base_builder()
        .access_link(TAZ_ORIGIN, WALK_MODE, S1, 3.0)
        .access_link(TAZ_DESTINATION, WALK_MODE, S2, 5.0)
        .trip(100, |trip| {
            trip.supply_mode(BUS_MODE)
                .st(S1, 1435.0, 1435.0)
                .st(S2, 5.0, 5.0)
        })
        .build();
    let config = PathfinderConfig::default();
    let request = spec(true, false, 20.0);

    let response = PathFinder::new(&network, &config).find_path(&request)?;
    let links = &response.path.links;
    assert_eq!(links.len(), 3);

    let transit = links[1].1;
    // the departure is rolled back one day so the ride lasts 10 minutes
    assert_eq!(transit.deparr_time, -5.0);
    assert_eq!(transit.arrdep_time, 5.0);
    assert_eq!(response.path_info.cost, 3.0 + 10.0 + 5.0);
    Ok(())
}

/// Two interleaved trips between the same stops; both itineraries cost
/// the same, so the hyperpath keeps both.
fn interleaved_trips_network() -> Network {
    base_builder()
        .access_link(TAZ_ORIGIN, WALK_MODE, S1, 5.0)
        .access_link(TAZ_DESTINATION, WALK_MODE, S2, 5.0)
        .trip(100, |trip| {
            trip.supply_mode(BUS_MODE)
                .st(S1, 500.0, 500.0)
                .st(S2, 510.0, 510.0)
        })
        .trip(101, |trip| {
            trip.supply_mode(BUS_MODE)
                .st(S1, 505.0, 505.0)
                .st(S2, 515.0, 515.0)
        })
        .build()
}

#[test]
fn hyperpath_single_attempt_picks_one_of_two_trips() -> Result<(), Error> {
    let _guard = init_test_logger();
    let network = interleaved_trips_network();
    let config = PathfinderConfig {
        stoch_pathset_size: 1,
        stoch_dispersion: 0.2,
        ..PathfinderConfig::default()
    };
    let request = spec(true, true, 520.0);
    let pathfinder = PathFinder::new(&network, &config);

    let response = pathfinder.find_path(&request)?;
    let links = &response.path.links;
    assert_eq!(links.len(), 3);
    assert_eq!(links[1].1.deparr_mode, Mode::Transit);
    let chosen_trip = links[1].1.trip;
    assert!(chosen_trip == LinkRef::Trip(100) || chosen_trip == LinkRef::Trip(101));

    // both alternatives resolve to the same walk + ride + walk cost
    assert_eq!(response.path_info.cost, 20.0);
    assert!((response.path_info.probability - 1.0).abs() < 1e-9);

    // the RNG is seeded with the path id, so the draw is reproducible
    let again = pathfinder.find_path(&request)?;
    assert_eq!(again.path.links[1].1.trip, chosen_trip);
    assert_eq!(again.path, response.path);
    Ok(())
}

#[test]
fn hyperpath_pathset_deduplicates_and_probabilities_sum_to_one() -> Result<(), Error> {
    let _guard = init_test_logger();
    let dir = tempfile::tempdir()?;
    let network = interleaved_trips_network();
    let config = PathfinderConfig {
        stoch_pathset_size: 100,
        stoch_dispersion: 0.2,
        output_dir: dir.path().to_path_buf(),
        ..PathfinderConfig::default()
    };
    let mut request = spec(true, true, 520.0);
    request.trace = true;

    let response = PathFinder::new(&network, &config).find_path(&request)?;
    assert_eq!(response.path.links.len(), 3);
    assert!(response.performance.max_process_count <= config.stoch_max_stop_process_count);

    // only two distinct itineraries exist; 100 attempts all land on them
    assert!(response.path_info.count >= 10);
    assert!(response.path_info.count <= 90);

    let pathset = std::fs::read_to_string(dir.path().join("skadi_pathset.txt"))?;
    let rows: Vec<&str> = pathset.lines().collect();
    assert!(rows.len() <= 2);
    assert!(!rows.is_empty());
    let mut total_probability = 0.0;
    for row in &rows {
        let fields: Vec<&str> = row.split_whitespace().collect();
        assert_eq!(fields[0], "1");
        assert_eq!(fields[1], "passenger_1");
        let probability: f64 = fields[4].parse()?;
        total_probability += probability;
    }
    assert!((total_probability - 1.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn hyperpath_inbound_finds_a_path() -> Result<(), Error> {
    let _guard = init_test_logger();
    let network = interleaved_trips_network();
    let config = PathfinderConfig {
        stoch_pathset_size: 10,
        stoch_dispersion: 0.2,
        ..PathfinderConfig::default()
    };
    let request = spec(false, true, 480.0);

    let response = PathFinder::new(&network, &config).find_path(&request)?;
    let links = &response.path.links;
    assert_eq!(links.len(), 3);
    let chronological: Vec<_> = response.path.chronological(false).collect();
    assert_eq!(chronological[0].1.deparr_mode, Mode::Access);
    assert_eq!(chronological[1].1.deparr_mode, Mode::Transit);
    assert_eq!(chronological[2].1.deparr_mode, Mode::Egress);
    assert_eq!(response.path_info.cost, 20.0);
    Ok(())
}

#[test]
fn trace_artifacts_are_written() -> Result<(), Error> {
    let _guard = init_test_logger();
    let dir = tempfile::tempdir()?;
    let network = single_trip_network();
    let config = PathfinderConfig {
        output_dir: dir.path().to_path_buf(),
        ..PathfinderConfig::default()
    };
    let mut request = spec(true, false, 520.0);
    request.trace = true;

    let response = PathFinder::new(&network, &config).find_path(&request)?;
    assert_eq!(response.path.links.len(), 3);

    let log = std::fs::read_to_string(dir.path().join("skadi_trace_11.log"))?;
    assert!(log.contains("Tracing assignment of passenger passenger_1"));
    assert!(log.contains("Final path"));

    let labels = std::fs::read_to_string(dir.path().join("skadi_labels_11.csv"))?;
    assert!(labels.starts_with(
        "label_iteration,link,node,time,mode,trip_id,link_time,link_cost,cost,AB"
    ));

    let stop_ids = std::fs::read_to_string(dir.path().join("skadi_labels_ids_11.csv"))?;
    // the anchor TAZ is recorded at iteration 0
    assert!(stop_ids.lines().nth(1).unwrap().ends_with(",0"));
    Ok(())
}
