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

use tracing::warn;

use crate::network::{Attributes, NamedWeights, Network, SupplyModeId};
use crate::trace::Trace;

/// Linear combination `sum(weight * attribute)` over every configured
/// weight. A weight whose attribute is absent is reported and skipped;
/// bad weight tables should not sink the whole request.
pub(crate) fn tally_link_cost(
    supply_mode: SupplyModeId,
    network: &Network,
    weights: &NamedWeights,
    attributes: &Attributes,
    mut trace: Option<&mut Trace>,
) -> f64 {
    if let Some(trace) = trace.as_deref_mut() {
        trace.note(format!(
            "Link cost for {:<15} {:>15} x attribute",
            network.supply_mode_name(supply_mode),
            "weight"
        ));
    }
    let mut cost = 0.0;
    for (weight_name, weight_value) in weights {
        match attributes.get(weight_name) {
            None => {
                warn!(
                    "No attribute named {} to apply a weight on for supply mode {}",
                    weight_name,
                    network.supply_mode_name(supply_mode)
                );
                if let Some(trace) = trace.as_deref_mut() {
                    trace.note(format!(" => no attribute named {}", weight_name));
                }
            }
            Some(attr_value) => {
                cost += weight_value * attr_value;
                if let Some(trace) = trace.as_deref_mut() {
                    trace.note(format!(
                        "{:>26}:  + {:>13.4} x {}",
                        weight_name, weight_value, attr_value
                    ));
                }
            }
        }
    }
    if let Some(trace) = trace.as_deref_mut() {
        trace.note(format!("{:>26}:  = {:>13.4}", "final cost", cost));
    }
    cost
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkBuilder;

    fn table(entries: &[(&str, f64)]) -> Attributes {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect()
    }

    #[test]
    fn tallies_weight_times_attribute() {
        let network = NetworkBuilder::new().build();
        let weights = table(&[("time_min", 2.0), ("transfer_penalty", 10.0)]);
        let attributes = table(&[("time_min", 5.0), ("transfer_penalty", 1.0), ("unused", 9.0)]);
        let cost = tally_link_cost(0, &network, &weights, &attributes, None);
        assert_eq!(cost, 20.0);
    }

    #[test]
    fn missing_attribute_is_skipped() {
        let network = NetworkBuilder::new().build();
        let weights = table(&[("time_min", 2.0), ("fare", 1.0)]);
        let attributes = table(&[("time_min", 5.0)]);
        let cost = tally_link_cost(0, &network, &weights, &attributes, None);
        assert_eq!(cost, 10.0);
    }
}
