//! Built-in example networks.
//!
//! Small, self-contained cases used for demonstrations and tests:
//!
//! ```text
//! three_bus:      ext_grid - 0 ---- 1 (gen) ---- 2 (load)                 20 kV
//!
//! radial_feeder:  ext_grid - 0 =trafo= 1 -- 2 -- 3 -- 4                 110/20 kV
//!                                           |
//!                                           5 -- 6
//!
//! meshed_ring:    ext_grid - 0 -- 1 -- 2 -- 3 (gen) -- 4 -- 0            20 kV
//!                                      |
//!                                      5 (coupled to 2 by a bus switch)
//! ```

use std::fmt;
use std::str::FromStr;

use gridmate_core::{BusType, GridError, GridResult, PowerNet, SwitchTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseName {
    ThreeBus,
    RadialFeeder,
    MeshedRing,
}

impl CaseName {
    pub const ALL: &'static [CaseName] = &[
        CaseName::ThreeBus,
        CaseName::RadialFeeder,
        CaseName::MeshedRing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CaseName::ThreeBus => "three_bus",
            CaseName::RadialFeeder => "radial_feeder",
            CaseName::MeshedRing => "meshed_ring",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CaseName::ThreeBus => "3 buses at 20 kV, 2 cable lines, one generator, one load",
            CaseName::RadialFeeder => {
                "110/20 kV substation feeding a 6-bus radial cable feeder with a lateral"
            }
            CaseName::MeshedRing => "20 kV ring of 5 buses with a generator and a coupled busbar",
        }
    }

    pub fn build(&self) -> GridResult<PowerNet> {
        match self {
            CaseName::ThreeBus => three_bus(),
            CaseName::RadialFeeder => radial_feeder(),
            CaseName::MeshedRing => meshed_ring(),
        }
    }
}

impl fmt::Display for CaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseName {
    type Err = GridError;

    fn from_str(s: &str) -> GridResult<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|c| c.as_str()).collect();
                GridError::validation(format!(
                    "unknown example case '{s}', expected one of: {}",
                    known.join(", ")
                ))
            })
    }
}

const MV_CABLE: &str = "NA2XS2Y 1x95 RM/25 12/20 kV";
const MV_CABLE_HEAVY: &str = "NA2XS2Y 1x185 RM/25 12/20 kV";

pub fn three_bus() -> GridResult<PowerNet> {
    let mut net = PowerNet::new("three_bus", 50.0, 1.0);
    let b0 = net.create_bus("Bus 0", 20.0, BusType::Busbar, None)?;
    let b1 = net.create_bus("Bus 1", 20.0, BusType::Busbar, None)?;
    let b2 = net.create_bus("Bus 2", 20.0, BusType::Busbar, None)?;
    net.create_ext_grid(b0, 1.02, 0.0, Some("Grid Connection".into()))?;
    net.create_line(b0, b1, 2.0, MV_CABLE, Some("Line 0-1".into()))?;
    net.create_line(b1, b2, 1.5, MV_CABLE, Some("Line 1-2".into()))?;
    net.create_gen(b1, 0.8, 1.01, Some(-2.0), Some(2.0), Some("Gen 1".into()))?;
    net.create_load(b2, 1.5, 0.5, Some("Load 2".into()))?;
    Ok(net)
}

pub fn radial_feeder() -> GridResult<PowerNet> {
    let mut net = PowerNet::new("radial_feeder", 50.0, 1.0);
    let hv = net.create_bus("HV Substation", 110.0, BusType::Busbar, Some("substation".into()))?;
    net.create_ext_grid(hv, 1.0, 0.0, Some("Transmission Grid".into()))?;
    let mv = net.create_bus("MV Busbar", 20.0, BusType::Busbar, Some("substation".into()))?;
    net.create_transformer(hv, mv, "25 MVA 110/20 kV", Some("Substation Trafo".into()))?;

    let mut previous = mv;
    let mut feeder = Vec::new();
    for (i, length_km) in [1.2, 0.9, 1.5].into_iter().enumerate() {
        let bus = net.create_bus(format!("Feeder {}", i + 1), 20.0, BusType::Node, Some("feeder".into()))?;
        net.create_line(previous, bus, length_km, MV_CABLE_HEAVY, None)?;
        feeder.push(bus);
        previous = bus;
    }
    let lat1 = net.create_bus("Lateral 1", 20.0, BusType::Node, Some("lateral".into()))?;
    let lat2 = net.create_bus("Lateral 2", 20.0, BusType::Node, Some("lateral".into()))?;
    net.create_line(feeder[0], lat1, 0.8, MV_CABLE, None)?;
    net.create_line(lat1, lat2, 0.6, MV_CABLE, None)?;

    for (&bus, (p, q)) in feeder
        .iter()
        .chain([lat1, lat2].iter())
        .zip([(1.2, 0.4), (0.8, 0.25), (1.5, 0.5), (0.6, 0.2), (0.4, 0.1)])
    {
        net.create_load(bus, p, q, None)?;
    }
    net.create_shunt(feeder[2], 0.0, -0.3, Some("Capacitor Bank".into()))?;
    Ok(net)
}

pub fn meshed_ring() -> GridResult<PowerNet> {
    let mut net = PowerNet::new("meshed_ring", 50.0, 1.0);
    let ring: Vec<usize> = (0..5)
        .map(|i| net.create_bus(format!("Ring {i}"), 20.0, BusType::Busbar, None))
        .collect::<GridResult<_>>()?;
    net.create_ext_grid(ring[0], 1.0, 0.0, Some("Grid Connection".into()))?;
    for i in 0..ring.len() {
        let from = ring[i];
        let to = ring[(i + 1) % ring.len()];
        net.create_line(from, to, 1.0 + 0.5 * i as f64, MV_CABLE, Some(format!("Ring {i}-{}", (i + 1) % ring.len())))?;
    }
    net.create_gen(ring[3], 1.0, 1.0, Some(-1.5), Some(1.5), Some("CHP Plant".into()))?;
    net.create_load(ring[1], 1.0, 0.3, None)?;
    net.create_load(ring[2], 0.8, 0.2, None)?;
    net.create_load(ring[4], 1.2, 0.4, None)?;

    let coupled = net.create_bus("Ring 2b", 20.0, BusType::Busbar, None)?;
    net.create_switch(ring[2], SwitchTarget::Bus(coupled), true, Some("Coupler".into()))?;
    net.create_load(coupled, 0.3, 0.1, None)?;
    Ok(net)
}
