//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use nsm::{Event, State};
use serde::{Deserialize, Serialize};

use crate::area::Area;
use crate::collections::{Arena, NeighborId};
use crate::debug::Debug;
use crate::error::Error;
use crate::instance::{InstanceUpView, Signal};
use crate::interface::Interface;
use crate::lsdb::LsaEntry;
use crate::network::NetTxPacketMsg;
use crate::output;
use crate::packet::lsa::{Lsa, LsaHdr, LsaKey};
use crate::packet::{DbDesc, DbDescFlags, Options};
use crate::tasks::{self, TimerKind};

#[derive(Debug)]
pub struct Neighbor {
    pub id: NeighborId,
    pub router_id: Ipv4Addr,
    pub src: Ipv4Addr,
    pub priority: u8,
    pub state: State,

    pub options: Option<Options>,
    pub dd_flags: DbDescFlags,
    pub dd_seq_no: u32,
    pub last_rcvd_dbdesc: Option<LastDbDesc>,
    pub last_sent_dbdesc: Option<NetTxPacketMsg>,

    pub event_count: u32,
    pub discontinuity_time: DateTime<Utc>,

    pub lists: NeighborLsaLists,
    pub tasks: NeighborTasks,
}

// IPv4 address identifying a neighbor on a multi-access network.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct NeighborNetId(Ipv4Addr);

#[derive(Debug)]
pub struct LastDbDesc {
    pub options: Options,
    pub dd_flags: DbDescFlags,
    pub dd_seq_no: u32,
}

#[derive(Debug, Default)]
pub struct NeighborLsaLists {
    // LSAs enqueued for transmission in LS Update packets.
    pub ls_update: BTreeMap<LsaKey, Arc<Lsa>>,
    // LSAs waiting to be acknowledged.
    pub ls_rxmt: BTreeMap<LsaKey, Arc<Lsa>>,
    // LSA headers enqueued for transmission in Database Description packets.
    pub db_summary: BTreeMap<LsaKey, Arc<Lsa>>,
    // LSAs that need to be received from this neighbor.
    pub ls_request: BTreeMap<LsaKey, LsaHdr>,
    // LSAs that were requested but not received yet.
    pub ls_request_pending: BTreeMap<LsaKey, LsaHdr>,
}

#[derive(Debug, Default)]
pub struct NeighborTasks {
    pub rxmt_dbdesc: Option<tasks::TimerToken>,
    pub rxmt_lsreq: Option<tasks::TimerToken>,
    pub rxmt_lsupd: Option<tasks::TimerToken>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum RxmtPacketType {
    DbDesc,
    LsRequest,
    LsUpdate,
}

// Neighbor state machine.
//
// Everything below ExStart (hellos, bidirectional detection, DR election)
// belongs to the external NSM; the events handled here are the ones the
// database exchange and flooding procedures generate internally.
pub mod nsm {
    use serde::{Deserialize, Serialize};

    use crate::debug::SeqNoMismatchReason;

    #[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
    #[derive(Deserialize, Serialize)]
    pub enum State {
        #[default]
        Down,
        Attempt,
        Init,
        TwoWay,
        ExStart,
        Exchange,
        Loading,
        Full,
    }

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    pub enum Event {
        NegotiationDone,
        ExchangeDone,
        LoadingDone,
        BadLsReq,
        SeqNoMismatch(SeqNoMismatchReason),
        Kill,
    }
}

// ===== impl Neighbor =====

impl Neighbor {
    pub(crate) fn new(
        id: NeighborId,
        router_id: Ipv4Addr,
        src: Ipv4Addr,
    ) -> Neighbor {
        Debug::NeighborCreate(router_id).log();

        // Initialize the DD Sequence Number.
        let dd_seq_no = {
            #[cfg(not(feature = "deterministic"))]
            {
                // Random value.
                use rand::RngCore;
                rand::rng().next_u32()
            }
            #[cfg(feature = "deterministic")]
            {
                // Fixed value for deterministic test results.
                router_id.into()
            }
        };

        Neighbor {
            id,
            router_id,
            src,
            priority: 0,
            state: State::Down,
            options: None,
            dd_flags: DbDescFlags::empty(),
            dd_seq_no,
            last_rcvd_dbdesc: None,
            last_sent_dbdesc: None,
            event_count: 0,
            discontinuity_time: Utc::now(),
            lists: Default::default(),
            tasks: Default::default(),
        }
    }

    pub(crate) fn fsm(
        &mut self,
        iface: &mut Interface,
        area: &Area,
        instance: &mut InstanceUpView<'_>,
        lsa_entries: &Arena<LsaEntry>,
        event: Event,
    ) {
        Debug::NsmEvent(self.router_id, &self.state, &event).log();

        let new_state = match (self.state, &event) {
            // NSM (state, event) -> (Action, new state)
            (State::ExStart, Event::NegotiationDone) => {
                // List the contents of the entire LSDB in the summary list.
                let options = self.options;
                let lsas = iface
                    .state
                    .lsdb
                    .iter(lsa_entries)
                    .chain(area.state.lsdb.iter(lsa_entries))
                    .chain(instance.state.lsdb.iter(lsa_entries))
                    .map(|(_, lse)| lse.data.clone())
                    // Filter out unneeded LSAs.
                    .filter(|lsa| {
                        crate::lsdb::lsa_type_is_valid(
                            Some(area.config.area_type),
                            options,
                            lsa.hdr.lsa_type,
                        )
                    })
                    .collect::<Vec<_>>();
                for lsa in lsas {
                    let lsa_key = lsa.hdr.key();
                    if lsa.hdr.is_maxage() {
                        self.lists.ls_rxmt.insert(lsa_key, lsa);
                    } else {
                        self.lists.db_summary.insert(lsa_key, lsa);
                    }
                }
                self.rxmt_lsupd_start_check(iface, area, instance);

                self.dd_flags.remove(DbDescFlags::I);
                Some(State::Exchange)
            }
            // NSM (state, event) -> (Action, new state)
            (State::Exchange, Event::ExchangeDone) => {
                if self.lists.ls_request_pending.is_empty()
                    && self.lists.ls_request.is_empty()
                {
                    Some(State::Full)
                } else {
                    // Wait for outstanding LS Requests to be responded.
                    Some(State::Loading)
                }
            }
            // NSM (state, event) -> (Action, new state)
            (State::Loading, Event::LoadingDone) => {
                // No action required.
                Some(State::Full)
            }
            // NSM (state, event) -> (Action, new state)
            (
                State::Exchange | State::Loading | State::Full,
                Event::SeqNoMismatch(_) | Event::BadLsReq,
            ) => {
                self.reset_adjacency();
                self.dd_seq_no += 1;
                self.dd_flags
                    .insert(DbDescFlags::I | DbDescFlags::M | DbDescFlags::MS);
                output::send_dbdesc(self, iface, area, instance);
                Some(State::ExStart)
            }
            // NSM (state, event) -> (Action, new state)
            (_, Event::Kill) => {
                self.reset_adjacency();
                Some(State::Down)
            }
            // Catch-all wildcard.
            _ => {
                Error::NsmUnexpectedEvent(self.router_id, self.state, event)
                    .log();
                return;
            }
        };

        // Check for FSM state change.
        if let Some(new_state) = new_state
            && new_state != self.state
        {
            self.fsm_state_change(iface, area, instance, event, new_state);
        }
    }

    fn fsm_state_change(
        &mut self,
        iface: &Interface,
        area: &Area,
        instance: &mut InstanceUpView<'_>,
        event: Event,
        new_state: State,
    ) {
        Debug::NsmTransition(self.router_id, &self.state, &new_state).log();
        self.state = new_state;

        // Notify the external neighbor state machine.
        instance.tx.signals.push_back(Signal::NsmTransition {
            area_id: area.id,
            iface_id: iface.id,
            nbr_id: self.id,
            router_id: self.router_id,
            event,
            state: new_state,
        });

        // Update statistics.
        self.event_count += 1;
        self.discontinuity_time = Utc::now();
    }

    pub(crate) fn loading_done_check(
        &mut self,
        iface: &Interface,
        area: &Area,
        instance: &mut InstanceUpView<'_>,
    ) {
        // Check if all pending LSA requests were received.
        if self.lists.ls_request_pending.is_empty() {
            // Stop the LS Request rxmt task.
            self.rxmt_lsreq_stop();

            // Check if there are new LSAs to request.
            if !self.lists.ls_request.is_empty() {
                output::send_lsreq(self, iface, area, instance);
            } else if self.state == State::Loading {
                // Database loading has completed. Defer the FSM event since
                // this can be reached while the arenas are being iterated.
                instance.tx.events.push_back(tasks::InternalEvent::NsmEvent {
                    area_id: area.id,
                    iface_id: iface.id,
                    nbr_id: self.id,
                    event: Event::LoadingDone,
                });
            }
        }
    }

    // Clears all adjacency state. Pending retransmissions die with the
    // lists; in-flight timers are invalidated by the token mismatch.
    pub(crate) fn reset_adjacency(&mut self) {
        self.options = None;
        self.last_rcvd_dbdesc = None;
        self.last_sent_dbdesc = None;
        self.lists = Default::default();
        self.tasks = Default::default();
    }

    pub(crate) fn dbdesc_is_dup(&self, dbdesc: &DbDesc) -> bool {
        if let Some(last_rcvd_dbdesc) = &self.last_rcvd_dbdesc
            && last_rcvd_dbdesc.options == dbdesc.options
            && last_rcvd_dbdesc.dd_flags == dbdesc.dd_flags
            && last_rcvd_dbdesc.dd_seq_no == dbdesc.dd_seq_no
        {
            return true;
        }

        false
    }

    pub(crate) fn network_id(&self) -> NeighborNetId {
        NeighborNetId(self.src)
    }

    fn rxmt_start(
        &self,
        iface: &Interface,
        area: &Area,
        instance: &mut InstanceUpView<'_>,
        packet_type: RxmtPacketType,
    ) -> tasks::TimerToken {
        instance.tx.timers.schedule(
            std::time::Duration::from_secs(
                iface.config.retransmit_interval.into(),
            ),
            TimerKind::RxmtInterval {
                area_id: area.id,
                iface_id: iface.id,
                nbr_id: self.id,
                packet_type,
            },
        )
    }

    pub(crate) fn rxmt_dbdesc_start(
        &mut self,
        iface: &Interface,
        area: &Area,
        instance: &mut InstanceUpView<'_>,
    ) {
        let token =
            self.rxmt_start(iface, area, instance, RxmtPacketType::DbDesc);
        self.tasks.rxmt_dbdesc = Some(token);
    }

    pub(crate) fn rxmt_dbdesc_stop(&mut self) {
        self.tasks.rxmt_dbdesc = None;
    }

    pub(crate) fn rxmt_lsreq_start(
        &mut self,
        iface: &Interface,
        area: &Area,
        instance: &mut InstanceUpView<'_>,
    ) {
        let token =
            self.rxmt_start(iface, area, instance, RxmtPacketType::LsRequest);
        self.tasks.rxmt_lsreq = Some(token);
    }

    pub(crate) fn rxmt_lsreq_stop(&mut self) {
        self.tasks.rxmt_lsreq = None;
    }

    pub(crate) fn rxmt_lsupd_start_check(
        &mut self,
        iface: &Interface,
        area: &Area,
        instance: &mut InstanceUpView<'_>,
    ) {
        if !self.lists.ls_rxmt.is_empty() && self.tasks.rxmt_lsupd.is_none() {
            let token = self.rxmt_start(
                iface,
                area,
                instance,
                RxmtPacketType::LsUpdate,
            );
            self.tasks.rxmt_lsupd = Some(token);
        }
    }

    pub(crate) fn rxmt_lsupd_stop_check(&mut self) {
        if self.lists.ls_rxmt.is_empty() && self.tasks.rxmt_lsupd.is_some() {
            self.tasks.rxmt_lsupd = None;
        }
    }
}

impl Drop for Neighbor {
    fn drop(&mut self) {
        Debug::NeighborDelete(self.router_id).log();
    }
}

// ===== impl NeighborNetId =====

impl NeighborNetId {
    pub(crate) fn get(&self) -> Ipv4Addr {
        self.0
    }
}

impl std::fmt::Display for NeighborNetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Ipv4Addr> for NeighborNetId {
    fn from(addr: Ipv4Addr) -> NeighborNetId {
        NeighborNetId(addr)
    }
}
