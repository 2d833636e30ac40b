//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collections::{AreaId, Interfaces, Lsdb};
use crate::packet::Options;

// OSPF area.
#[derive(Debug)]
pub struct Area {
    // ID.
    pub id: AreaId,
    // Area ID.
    pub area_id: Ipv4Addr,
    // Area configuration data.
    pub config: AreaCfg,
    // Area state data.
    pub state: AreaState,
    // Area interfaces.
    pub interfaces: Interfaces,
}

// OSPF area configuration.
#[derive(Debug, Default)]
pub struct AreaCfg {
    pub area_type: AreaType,
}

// OSPF area state.
#[derive(Debug)]
pub struct AreaState {
    // LSDB of area-scope LSAs.
    pub lsdb: Lsdb,
    // Statistics.
    pub discontinuity_time: DateTime<Utc>,
}

// OSPF area type.
//
// Controls the area's external routing capability: AS-external LSAs are
// neither originated into nor flooded through stub and NSSA areas.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum AreaType {
    #[default]
    Normal,
    Stub,
    Nssa,
}

// ===== impl Area =====

impl Area {
    pub(crate) fn new(id: AreaId, area_id: Ipv4Addr) -> Self {
        Area {
            id,
            area_id,
            config: Default::default(),
            state: AreaState {
                lsdb: Default::default(),
                discontinuity_time: Utc::now(),
            },
            interfaces: Default::default(),
        }
    }

    // Returns the options advertised in packets sent into this area.
    pub(crate) fn options(&self) -> Options {
        let mut options = Options::O;
        match self.config.area_type {
            AreaType::Normal => options.insert(Options::E),
            AreaType::Stub => (),
            AreaType::Nssa => options.insert(Options::NP),
        }
        options
    }
}

// ===== impl AreaType =====

impl std::fmt::Display for AreaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AreaType::Normal => write!(f, "normal"),
            AreaType::Stub => write!(f, "stub"),
            AreaType::Nssa => write!(f, "nssa"),
        }
    }
}
