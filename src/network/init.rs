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

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::info;

use super::data::{
    Mode, Network, StopId, SupplyModeId, TripId, TripStop, TripStopTime, UserClassMode,
};

pub const TRIP_ID_FILE: &str = "ft_intermediate_trip_id.txt";
pub const STOP_ID_FILE: &str = "ft_intermediate_stop_id.txt";
pub const ROUTE_ID_FILE: &str = "ft_intermediate_route_id.txt";
pub const SUPPLY_MODE_ID_FILE: &str = "ft_intermediate_supply_mode_id.txt";
pub const ACCESS_EGRESS_FILE: &str = "ft_intermediate_access_egress.txt";
pub const TRANSFERS_FILE: &str = "ft_intermediate_transfers.txt";
pub const TRIP_INFO_FILE: &str = "ft_intermediate_trip_info.txt";
pub const WEIGHTS_FILE: &str = "ft_intermediate_weights.txt";

/// The supply mode designating walking transfers in the mode id table.
pub const TRANSFER_SUPPLY_MODE_NAME: &str = "transfer";

#[derive(Debug)]
pub enum NetworkError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        line: usize,
    },
    UnknownDemandModeType {
        path: PathBuf,
        line: usize,
        value: String,
    },
    MissingTimeMin {
        path: PathBuf,
        context: String,
    },
    BadStopTimeSequence {
        trip: TripId,
        expected: u32,
        found: u32,
    },
    BadSupplyShape {
        index_rows: usize,
        data_rows: usize,
    },
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::Io { path, source } => {
                write!(f, "Could not read {} : {}", path.display(), source)
            }
            NetworkError::Parse { path, line } => {
                write!(f, "Could not parse {} at line {}", path.display(), line)
            }
            NetworkError::UnknownDemandModeType { path, line, value } => write!(
                f,
                "Do not understand demand_mode_type [{}] in {} at line {}",
                value,
                path.display(),
                line
            ),
            NetworkError::MissingTimeMin { path, context } => write!(
                f,
                "No time_min attribute for {} in {}",
                context,
                path.display()
            ),
            NetworkError::BadStopTimeSequence {
                trip,
                expected,
                found,
            } => write!(
                f,
                "Stop time sequences of trip {} are not dense : expected {}, found {}",
                trip, expected, found
            ),
            NetworkError::BadSupplyShape {
                index_rows,
                data_rows,
            } => write!(
                f,
                "Supply index has {} rows but data has {} rows",
                index_rows, data_rows
            ),
        }
    }
}

impl std::error::Error for NetworkError {}

impl Network {
    /// Build a network from the intermediate tables found in `dir`.
    /// The schedule and bump-wait supplies are loaded separately with
    /// [`Network::load_schedule`] and [`Network::load_bump_waits`].
    pub fn from_dir(dir: &Path) -> Result<Self, NetworkError> {
        let mut network = Network::default();
        network.read_trip_ids(dir)?;
        network.read_stop_ids(dir)?;
        network.read_route_ids(dir)?;
        network.read_supply_mode_ids(dir)?;
        network.read_access_links(dir)?;
        network.read_transfer_links(dir)?;
        network.read_trip_info(dir)?;
        network.read_weights(dir)?;
        Ok(network)
    }

    fn read_trip_ids(&mut self, dir: &Path) -> Result<(), NetworkError> {
        let path = dir.join(TRIP_ID_FILE);
        for row in rows(&path)? {
            let (line, fields) = row?;
            let [num, name] = two_fields(&path, line, &fields)?;
            self.trip_names.insert(parse(&path, line, num)?, name.to_string());
        }
        info!("Read {} trips from {}", self.trip_names.len(), path.display());
        Ok(())
    }

    fn read_stop_ids(&mut self, dir: &Path) -> Result<(), NetworkError> {
        let path = dir.join(STOP_ID_FILE);
        for row in rows(&path)? {
            let (line, fields) = row?;
            let [num, name] = two_fields(&path, line, &fields)?;
            self.stop_names.insert(parse(&path, line, num)?, name.to_string());
        }
        info!("Read {} stops from {}", self.stop_names.len(), path.display());
        Ok(())
    }

    fn read_route_ids(&mut self, dir: &Path) -> Result<(), NetworkError> {
        let path = dir.join(ROUTE_ID_FILE);
        for row in rows(&path)? {
            let (line, fields) = row?;
            let [num, name] = two_fields(&path, line, &fields)?;
            self.route_names.insert(parse(&path, line, num)?, name.to_string());
        }
        info!("Read {} routes from {}", self.route_names.len(), path.display());
        Ok(())
    }

    fn read_supply_mode_ids(&mut self, dir: &Path) -> Result<(), NetworkError> {
        let path = dir.join(SUPPLY_MODE_ID_FILE);
        for row in rows(&path)? {
            let (line, fields) = row?;
            let [num, name] = two_fields(&path, line, &fields)?;
            let mode_num: SupplyModeId = parse(&path, line, num)?;
            if name == TRANSFER_SUPPLY_MODE_NAME {
                self.transfer_supply_mode = Some(mode_num);
            }
            self.mode_names.insert(mode_num, name.to_string());
        }
        info!(
            "Read {} supply modes from {}",
            self.mode_names.len(),
            path.display()
        );
        Ok(())
    }

    fn read_access_links(&mut self, dir: &Path) -> Result<(), NetworkError> {
        let path = dir.join(ACCESS_EGRESS_FILE);
        let mut nb_of_rows = 0usize;
        for row in rows(&path)? {
            let (line, fields) = row?;
            if fields.len() != 5 {
                return Err(NetworkError::Parse { path, line });
            }
            let taz: StopId = parse(&path, line, &fields[0])?;
            let supply_mode: SupplyModeId = parse(&path, line, &fields[1])?;
            let stop: StopId = parse(&path, line, &fields[2])?;
            let attr_value: f64 = parse(&path, line, &fields[4])?;
            self.access_links
                .entry(taz)
                .or_default()
                .entry(supply_mode)
                .or_default()
                .entry(stop)
                .or_default()
                .insert(fields[3].to_string(), attr_value);
            nb_of_rows += 1;
        }
        for (taz, by_mode) in &self.access_links {
            for (supply_mode, by_stop) in by_mode {
                for (stop, attrs) in by_stop {
                    if !attrs.contains_key("time_min") {
                        return Err(NetworkError::MissingTimeMin {
                            path,
                            context: format!("taz {} mode {} stop {}", taz, supply_mode, stop),
                        });
                    }
                }
            }
        }
        info!("Read {} rows from {}", nb_of_rows, path.display());
        Ok(())
    }

    fn read_transfer_links(&mut self, dir: &Path) -> Result<(), NetworkError> {
        let path = dir.join(TRANSFERS_FILE);
        let mut nb_of_rows = 0usize;
        for row in rows(&path)? {
            let (line, fields) = row?;
            if fields.len() != 4 {
                return Err(NetworkError::Parse { path, line });
            }
            let from_stop: StopId = parse(&path, line, &fields[0])?;
            let to_stop: StopId = parse(&path, line, &fields[1])?;
            let attr_value: f64 = parse(&path, line, &fields[3])?;
            self.transfers_from
                .entry(from_stop)
                .or_default()
                .entry(to_stop)
                .or_default()
                .insert(fields[2].to_string(), attr_value);
            self.transfers_to
                .entry(to_stop)
                .or_default()
                .entry(from_stop)
                .or_default()
                .insert(fields[2].to_string(), attr_value);
            nb_of_rows += 1;
        }
        for (from_stop, by_stop) in &self.transfers_from {
            for (to_stop, attrs) in by_stop {
                if !attrs.contains_key("time_min") {
                    return Err(NetworkError::MissingTimeMin {
                        path,
                        context: format!("transfer {} -> {}", from_stop, to_stop),
                    });
                }
            }
        }
        info!("Read {} rows from {}", nb_of_rows, path.display());
        Ok(())
    }

    fn read_trip_info(&mut self, dir: &Path) -> Result<(), NetworkError> {
        let path = dir.join(TRIP_INFO_FILE);
        let mut nb_of_rows = 0usize;
        for row in rows(&path)? {
            let (line, fields) = row?;
            if fields.len() != 3 {
                return Err(NetworkError::Parse { path, line });
            }
            let trip: TripId = parse(&path, line, &fields[0])?;
            let attr_value: f64 = parse(&path, line, &fields[2])?;
            let trip_info = self.trip_infos.entry(trip).or_default();
            // mode_num and route_id_num get dedicated fields
            match fields[1].as_str() {
                "mode_num" => trip_info.supply_mode = attr_value as SupplyModeId,
                "route_id_num" => trip_info.route = attr_value as u32,
                attr_name => {
                    trip_info.attributes.insert(attr_name.to_string(), attr_value);
                }
            }
            nb_of_rows += 1;
        }
        info!("Read {} rows from {}", nb_of_rows, path.display());
        Ok(())
    }

    fn read_weights(&mut self, dir: &Path) -> Result<(), NetworkError> {
        let path = dir.join(WEIGHTS_FILE);
        let mut nb_of_rows = 0usize;
        for row in rows(&path)? {
            let (line, fields) = row?;
            if fields.len() != 6 {
                return Err(NetworkError::Parse { path, line });
            }
            let demand_mode_type = match fields[1].as_str() {
                "access" => Mode::Access,
                "egress" => Mode::Egress,
                "transit" => Mode::Transit,
                "transfer" => Mode::Transfer,
                other => {
                    return Err(NetworkError::UnknownDemandModeType {
                        path,
                        line,
                        value: other.to_string(),
                    })
                }
            };
            let ucm = UserClassMode {
                user_class: fields[0].clone(),
                demand_mode_type,
                demand_mode: fields[2].clone(),
            };
            let supply_mode: SupplyModeId = parse(&path, line, &fields[3])?;
            let weight_value: f64 = parse(&path, line, &fields[5])?;
            self.weights
                .entry(ucm)
                .or_default()
                .entry(supply_mode)
                .or_default()
                .insert(fields[4].clone(), weight_value);
            nb_of_rows += 1;
        }
        info!("Read {} rows from {}", nb_of_rows, path.display());
        Ok(())
    }

    /// Ingest the schedule supply: one `(trip, sequence, stop)` index row
    /// per `(arrive_time, depart_time)` data row. Sequences must be dense
    /// and 1-based per trip.
    pub fn load_schedule(
        &mut self,
        index: &[[i32; 3]],
        times: &[[f64; 2]],
    ) -> Result<(), NetworkError> {
        if index.len() != times.len() {
            return Err(NetworkError::BadSupplyShape {
                index_rows: index.len(),
                data_rows: times.len(),
            });
        }
        for (row, time) in index.iter().zip(times) {
            debug_assert!(row.iter().all(|value| *value >= 0));
            let stop_time = TripStopTime {
                trip: row[0] as TripId,
                seq: row[1] as u32,
                stop: row[2] as StopId,
                arrive_time: time[0],
                depart_time: time[1],
            };
            let trip_times = self.trip_stop_times.entry(stop_time.trip).or_default();
            let expected = trip_times.len() as u32 + 1;
            if stop_time.seq != expected {
                return Err(NetworkError::BadStopTimeSequence {
                    trip: stop_time.trip,
                    expected,
                    found: stop_time.seq,
                });
            }
            trip_times.push(stop_time);
            self.stop_trip_times
                .entry(stop_time.stop)
                .or_default()
                .push(stop_time);
        }
        info!("Loaded {} scheduled stop times", index.len());
        Ok(())
    }

    /// Ingest the bump-wait supply from the capacity simulator. Called
    /// between requests only; replaces the previous table.
    pub fn load_bump_waits(
        &mut self,
        index: &[[i32; 3]],
        times: &[f64],
    ) -> Result<(), NetworkError> {
        if index.len() != times.len() {
            return Err(NetworkError::BadSupplyShape {
                index_rows: index.len(),
                data_rows: times.len(),
            });
        }
        self.bump_waits.clear();
        for (row, time) in index.iter().zip(times) {
            debug_assert!(row.iter().all(|value| *value >= 0));
            let trip_stop = TripStop {
                trip: row[0] as TripId,
                seq: row[1] as u32,
                stop: row[2] as StopId,
            };
            self.bump_waits.insert(trip_stop, *time);
        }
        info!("Loaded {} bump waits", index.len());
        Ok(())
    }
}

/// Iterate over the whitespace-delimited data rows of `path`, skipping
/// the header row. Yields `(line_number, fields)`.
fn rows(
    path: &Path,
) -> Result<impl Iterator<Item = Result<(usize, Vec<String>), NetworkError>>, NetworkError> {
    let content = std::fs::read_to_string(path).map_err(|source| NetworkError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut lines: Vec<(usize, Vec<String>)> = Vec::new();
    for (index, line) in content.lines().enumerate().skip(1) {
        let fields: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        if fields.is_empty() {
            continue;
        }
        lines.push((index + 1, fields));
    }
    Ok(lines.into_iter().map(Ok))
}

fn two_fields<'a>(
    path: &Path,
    line: usize,
    fields: &'a [String],
) -> Result<[&'a str; 2], NetworkError> {
    if fields.len() != 2 {
        return Err(NetworkError::Parse {
            path: path.to_path_buf(),
            line,
        });
    }
    Ok([&fields[0], &fields[1]])
}

fn parse<T: FromStr>(path: &Path, line: usize, field: &str) -> Result<T, NetworkError> {
    field.parse().map_err(|_| NetworkError::Parse {
        path: path.to_path_buf(),
        line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_tables(dir: &Path) {
        let files = [
            (TRIP_ID_FILE, "trip_num trip_str\n1 t_blue\n2 t_red\n"),
            (STOP_ID_FILE, "stop_num stop_str\n1 taz_a\n10 main_st\n"),
            (ROUTE_ID_FILE, "route_num route_str\n5 blue_line\n"),
            (
                SUPPLY_MODE_ID_FILE,
                "mode_num mode_str\n1 transfer\n2 walk\n12 local_bus\n",
            ),
            (
                ACCESS_EGRESS_FILE,
                "taz mode stop attr_name attr_value\n1 2 10 time_min 4.5\n1 2 10 dist 0.3\n",
            ),
            (TRANSFERS_FILE, "from to attr_name attr_value\n10 11 time_min 2.0\n"),
            (
                TRIP_INFO_FILE,
                "trip attr_name attr_value\n1 mode_num 12\n1 route_id_num 5\n1 fare 2.5\n",
            ),
            (
                WEIGHTS_FILE,
                "user_class type mode supply weight value\nall access walk 2 time_min 3.7\n",
            ),
        ];
        for (name, content) in files {
            std::fs::write(dir.join(name), content).unwrap();
        }
    }

    #[test]
    fn reads_intermediate_tables() {
        let dir = tempfile::tempdir().unwrap();
        write_tables(dir.path());

        let network = Network::from_dir(dir.path()).unwrap();
        assert_eq!(network.trip_name(1), "t_blue");
        assert_eq!(network.stop_name(10), "main_st");
        assert_eq!(network.transfer_supply_mode(), Some(1));
        assert_eq!(network.trip_infos[&1].supply_mode, 12);
        assert_eq!(network.trip_infos[&1].route, 5);
        assert_eq!(network.trip_infos[&1].attributes["fare"], 2.5);
        assert_eq!(network.transfers_from[&10][&11]["time_min"], 2.0);
        assert_eq!(network.transfers_to[&11][&10]["time_min"], 2.0);
        assert_eq!(network.access_links[&1][&2][&10]["time_min"], 4.5);

        let ucm = UserClassMode {
            user_class: "all".to_string(),
            demand_mode_type: Mode::Access,
            demand_mode: "walk".to_string(),
        };
        assert_eq!(network.weights[&ucm][&2]["time_min"], 3.7);
    }

    #[test]
    fn rejects_unknown_demand_mode_type() {
        let dir = tempfile::tempdir().unwrap();
        write_tables(dir.path());
        std::fs::write(
            dir.path().join(WEIGHTS_FILE),
            "user_class type mode supply weight value\nall drive walk 2 time_min 3.7\n",
        )
        .unwrap();

        let err = Network::from_dir(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            NetworkError::UnknownDemandModeType { value, .. } if value == "drive"
        ));
    }

    #[test]
    fn rejects_non_dense_sequences() {
        let mut network = Network::default();
        let index = [[1, 1, 10], [1, 3, 11]];
        let times = [[480.0, 481.0], [490.0, 491.0]];
        let err = network.load_schedule(&index, &times).unwrap_err();
        assert!(matches!(
            err,
            NetworkError::BadStopTimeSequence {
                trip: 1,
                expected: 2,
                found: 3
            }
        ));
    }

    #[test]
    fn schedule_is_indexed_by_trip_and_stop() {
        let mut network = Network::default();
        let index = [[1, 1, 10], [1, 2, 11], [2, 1, 11]];
        let times = [[480.0, 481.0], [490.0, 491.0], [495.0, 496.0]];
        network.load_schedule(&index, &times).unwrap();
        assert_eq!(network.trip_stop_times[&1].len(), 2);
        assert_eq!(network.stop_trip_times[&11].len(), 2);
    }
}
