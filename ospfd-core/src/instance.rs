//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeSet, VecDeque};
use std::net::Ipv4Addr;
use std::time::Instant;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::area::AreaType;
use crate::collections::{
    Areas, Arena, AreaId, InterfaceId, LsaEntryId, LsdbId, NeighborId, Lsdb,
    lsdb_get_mut,
};
use crate::debug::Debug;
use crate::error::Error;
use crate::events;
use crate::interface::Interface;
use crate::lsdb::{LsaEntry, LsaLogEntry, LsaLogId, LsaRefresher, lsa_rxmt_count};
use crate::neighbor::{Neighbor, nsm};
use crate::network::NetTxPacketMsg;
use crate::output;
use crate::packet::lsa::{Lsa, LsaBody, LsaKey, LsaType};
use crate::packet::{DbDescFlags, Options};
use crate::tasks::{
    InternalEvent, MAXAGE_SWEEP_INTERVAL, TimerKind, TimerQueue,
};

// The routing instance: the single owner of every LSDB table, neighbor
// list, and timer. All operations take it by reference; there are no
// process-wide statics.
#[derive(Debug)]
pub struct Instance {
    pub state: InstanceState,
    pub arenas: InstanceArenas,
    pub tx: InstanceTx,
}

#[derive(Debug)]
pub struct InstanceState {
    // Router ID.
    pub router_id: Ipv4Addr,
    // LSDB of AS-scope LSAs.
    pub lsdb: Lsdb,
    // MaxAge LSAs pending removal, once unreferenced by any retransmission
    // list and no neighbor is mid database-exchange.
    pub maxage_registry: BTreeSet<(LsdbId, LsaEntryId)>,
    // Refresh queue for self-originated LSAs.
    pub refresher: LsaRefresher,
    // Log of LSA installations.
    pub lsa_log: VecDeque<LsaLogEntry>,
    pub lsa_log_next_id: u32,
    // Statistics.
    pub orig_lsa_count: u32,
    pub rx_lsa_count: u32,
    pub discontinuity_time: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct InstanceArenas {
    pub areas: Areas,
    pub interfaces: Arena<Interface>,
    pub neighbors: Arena<Neighbor>,
    pub lsa_entries: Arena<LsaEntry>,
}

// Output side of the instance: packets for the socket layer, signals for
// the external collaborators, and the internal timer/event queues.
#[derive(Debug)]
pub struct InstanceTx {
    pub net: VecDeque<NetTxPacketMsg>,
    pub signals: VecDeque<Signal>,
    pub(crate) events: VecDeque<InternalEvent>,
    pub(crate) timers: TimerQueue,
}

// View struct borrowing the instance state and output queues, leaving the
// arenas free to be borrowed independently.
#[derive(Debug)]
pub struct InstanceUpView<'a> {
    pub state: &'a mut InstanceState,
    pub tx: &'a mut InstanceTx,
}

// Notifications to the external collaborators (neighbor state machine, SPF
// computation, LSA origination logic).
#[derive(Debug)]
pub enum Signal {
    NsmTransition {
        area_id: AreaId,
        iface_id: InterfaceId,
        nbr_id: NeighborId,
        router_id: Ipv4Addr,
        event: nsm::Event,
        state: nsm::State,
    },
    SelfOriginatedLsaRcvd {
        lsdb_id: LsdbId,
        lse_id: LsaEntryId,
    },
    RouteRecalcNeeded {
        lsa: LsaLogId,
    },
}

// ===== impl Instance =====

impl Instance {
    pub fn new(router_id: Ipv4Addr, now: Instant) -> Instance {
        Debug::InstanceCreate.log();

        let mut timers = TimerQueue::new(now);

        // Start the periodic LSDB maintenance timers.
        timers.schedule(
            std::time::Duration::from_secs(
                crate::lsdb::LSA_REFRESH_GRANULARITY.into(),
            ),
            TimerKind::LsaRefreshTick,
        );
        timers.schedule(MAXAGE_SWEEP_INTERVAL, TimerKind::MaxAgeSweep);

        Instance {
            state: InstanceState {
                router_id,
                lsdb: Default::default(),
                maxage_registry: Default::default(),
                refresher: LsaRefresher::new(now),
                lsa_log: Default::default(),
                lsa_log_next_id: 0,
                orig_lsa_count: 0,
                rx_lsa_count: 0,
                discontinuity_time: Utc::now(),
            },
            arenas: Default::default(),
            tx: InstanceTx {
                net: Default::default(),
                signals: Default::default(),
                events: Default::default(),
                timers,
            },
        }
    }

    fn up(&mut self) -> (InstanceUpView<'_>, &mut InstanceArenas) {
        (
            InstanceUpView {
                state: &mut self.state,
                tx: &mut self.tx,
            },
            &mut self.arenas,
        )
    }

    // ===== configuration entry points =====

    pub fn area_add(&mut self, area_id: Ipv4Addr, area_type: AreaType) -> AreaId {
        let (_, area) = self.arenas.areas.insert(area_id);
        area.config.area_type = area_type;
        area.id
    }

    pub fn interface_add(
        &mut self,
        area_id: AreaId,
        ifname: &str,
    ) -> Result<InterfaceId, Error> {
        let (_, area) = self.arenas.areas.get_mut_by_id(area_id)?;
        let (_, iface) =
            area.interfaces.insert(&mut self.arenas.interfaces, ifname);
        Ok(iface.id)
    }

    pub fn interface_mut(
        &mut self,
        area_id: AreaId,
        iface_id: InterfaceId,
    ) -> Result<&mut Interface, Error> {
        let (_, area) = self.arenas.areas.get_by_id(area_id)?;
        let (_, iface) = area
            .interfaces
            .get_mut_by_id(&mut self.arenas.interfaces, iface_id)?;
        Ok(iface)
    }

    pub fn neighbor_add(
        &mut self,
        area_id: AreaId,
        iface_id: InterfaceId,
        router_id: Ipv4Addr,
        src: Ipv4Addr,
    ) -> Result<NeighborId, Error> {
        let (_, area) = self.arenas.areas.get_by_id(area_id)?;
        let (iface_idx, _) =
            area.interfaces.get_by_id(&self.arenas.interfaces, iface_id)?;
        let iface = &mut self.arenas.interfaces[iface_idx];
        let (_, nbr) = iface.state.neighbors.insert(
            &mut self.arenas.neighbors,
            router_id,
            src,
        );
        Ok(nbr.id)
    }

    pub fn neighbor(
        &self,
        area_id: AreaId,
        iface_id: InterfaceId,
        nbr_id: NeighborId,
    ) -> Result<&Neighbor, Error> {
        let (_, area) = self.arenas.areas.get_by_id(area_id)?;
        let (_, iface) =
            area.interfaces.get_by_id(&self.arenas.interfaces, iface_id)?;
        let (_, nbr) = iface
            .state
            .neighbors
            .get_by_id(&self.arenas.neighbors, nbr_id)?;
        Ok(nbr)
    }

    pub fn neighbor_mut(
        &mut self,
        area_id: AreaId,
        iface_id: InterfaceId,
        nbr_id: NeighborId,
    ) -> Result<&mut Neighbor, Error> {
        let (_, area) = self.arenas.areas.get_by_id(area_id)?;
        let (_, iface) =
            area.interfaces.get_by_id(&self.arenas.interfaces, iface_id)?;
        let (_, nbr) = iface
            .state
            .neighbors
            .get_mut_by_id(&mut self.arenas.neighbors, nbr_id)?;
        Ok(nbr)
    }

    // ===== collaborator interface (adjacency/area registry queries) =====

    // Returns the state the external NSM last drove this neighbor to,
    // updated internally by the database-exchange procedures.
    pub fn get_neighbor_state(
        &self,
        area_id: AreaId,
        iface_id: InterfaceId,
        nbr_id: NeighborId,
    ) -> Result<nsm::State, Error> {
        self.neighbor(area_id, iface_id, nbr_id).map(|nbr| nbr.state)
    }

    // Returns whether this router is the DR on the given interface.
    pub fn is_designated_router(
        &self,
        area_id: AreaId,
        iface_id: InterfaceId,
    ) -> Result<bool, Error> {
        let (_, area) = self.arenas.areas.get_by_id(area_id)?;
        let (_, iface) =
            area.interfaces.get_by_id(&self.arenas.interfaces, iface_id)?;
        Ok(iface.is_dr())
    }

    // Returns the area's external routing capability.
    pub fn area_external_routing(
        &self,
        area_id: AreaId,
    ) -> Result<AreaType, Error> {
        let (_, area) = self.arenas.areas.get_by_id(area_id)?;
        Ok(area.config.area_type)
    }

    // ===== neighbor state entry points (driven by the external NSM) =====

    // Raw neighbor state update for transitions owned by the external NSM
    // (everything below ExStart).
    pub fn neighbor_set_state(
        &mut self,
        area_id: AreaId,
        iface_id: InterfaceId,
        nbr_id: NeighborId,
        state: nsm::State,
    ) -> Result<(), Error> {
        let (_, area) = self.arenas.areas.get_by_id(area_id)?;
        let (_, iface) =
            area.interfaces.get_by_id(&self.arenas.interfaces, iface_id)?;
        let (nbr_idx, _) = iface
            .state
            .neighbors
            .get_by_id(&self.arenas.neighbors, nbr_id)?;
        let nbr = &mut self.arenas.neighbors[nbr_idx];

        Debug::NsmTransition(nbr.router_id, &nbr.state, &state).log();
        nbr.state = state;
        nbr.event_count += 1;
        nbr.discontinuity_time = Utc::now();
        Ok(())
    }

    // Kicks off the database exchange once the external NSM decided an
    // adjacency should be formed.
    pub fn neighbor_exchange_start(
        &mut self,
        area_id: AreaId,
        iface_id: InterfaceId,
        nbr_id: NeighborId,
    ) -> Result<(), Error> {
        let (mut view, arenas) = self.up();
        let (_, area) = arenas.areas.get_by_id(area_id)?;
        let (iface_idx, _) =
            area.interfaces.get_by_id(&arenas.interfaces, iface_id)?;
        let iface = &arenas.interfaces[iface_idx];
        let (_, nbr) = iface
            .state
            .neighbors
            .get_mut_by_id(&mut arenas.neighbors, nbr_id)?;

        nbr.state = nsm::State::ExStart;
        nbr.dd_seq_no = nbr.dd_seq_no.wrapping_add(1);
        nbr.dd_flags
            .insert(DbDescFlags::I | DbDescFlags::M | DbDescFlags::MS);
        output::send_dbdesc(nbr, iface, area, &mut view);
        Ok(())
    }

    // Tears an adjacency down: all pending retransmissions and exchange
    // state die with the neighbor, with no further flooding.
    pub fn neighbor_delete(
        &mut self,
        area_id: AreaId,
        iface_id: InterfaceId,
        nbr_id: NeighborId,
    ) -> Result<(), Error> {
        {
            let (mut view, arenas) = self.up();
            let (_, area) = arenas.areas.get_by_id(area_id)?;
            let (iface_idx, _) =
                area.interfaces.get_by_id(&arenas.interfaces, iface_id)?;
            let (nbr_idx, _) = {
                let iface = &arenas.interfaces[iface_idx];
                iface
                    .state
                    .neighbors
                    .get_by_id(&arenas.neighbors, nbr_id)?
            };
            let iface = &mut arenas.interfaces[iface_idx];
            let nbr = &mut arenas.neighbors[nbr_idx];
            nbr.fsm(
                iface,
                area,
                &mut view,
                &arenas.lsa_entries,
                nsm::Event::Kill,
            );
            iface.state.neighbors.delete(&mut arenas.neighbors, nbr_idx);
        }
        self.drain_events();
        Ok(())
    }

    // ===== LSA origination entry points =====

    // Originates (or re-originates) a self-originated LSA, subject to the
    // MinLSInterval and same-contents checks.
    pub fn lsa_originate(
        &mut self,
        lsdb_id: LsdbId,
        options: Options,
        lsa_id: Ipv4Addr,
        body: LsaBody,
    ) -> Result<(), Error> {
        {
            let (mut view, arenas) = self.up();
            let (lsdb_idx, _) = lsdb_get_mut(
                &mut view.state.lsdb,
                &mut arenas.areas,
                &mut arenas.interfaces,
                &lsdb_id,
            )?;
            crate::lsdb::originate_check(
                &mut view, arenas, lsdb_idx, options, lsa_id, body,
            );
        }
        self.drain_events();
        Ok(())
    }

    // Administratively flushes an LSA from the routing domain.
    pub fn lsa_flush(
        &mut self,
        lsdb_id: LsdbId,
        lsa_key: &LsaKey,
    ) -> Result<(), Error> {
        {
            let (mut view, arenas) = self.up();
            let (lsdb_idx, lsdb) = lsdb_get_mut(
                &mut view.state.lsdb,
                &mut arenas.areas,
                &mut arenas.interfaces,
                &lsdb_id,
            )?;
            let Some((lse_idx, _)) = lsdb.get(&arenas.lsa_entries, lsa_key)
            else {
                return Ok(());
            };
            crate::lsdb::flush(
                &mut view,
                arenas,
                lsdb_idx,
                lse_idx,
                crate::debug::LsaFlushReason::PrematureAging,
            );
        }
        self.drain_events();
        Ok(())
    }

    // Flushes every self-originated LSA (e.g. on instance shutdown).
    pub fn lsa_flush_all_self_originated(&mut self) {
        {
            let (mut view, arenas) = self.up();
            crate::lsdb::flush_all_self_originated(&mut view, arenas);
        }
        self.drain_events();
    }

    // Allocates a Link State ID for the given prefix. The all-ones sentinel
    // means the ID space is exhausted and the origination must be aborted.
    pub fn lsa_unique_id(
        &self,
        lsdb_id: LsdbId,
        lsa_type: LsaType,
        prefix: ipnetwork::Ipv4Network,
    ) -> Result<Ipv4Addr, Error> {
        let lsdb = self.lsdb(lsdb_id)?;
        Ok(crate::lsdb::lsa_unique_id(
            &self.arenas.lsa_entries,
            lsdb,
            lsa_type,
            self.state.router_id,
            prefix,
        ))
    }

    // ===== LSDB queries =====

    pub fn lsa_get(
        &self,
        lsdb_id: LsdbId,
        lsa_key: &LsaKey,
    ) -> Result<Option<std::sync::Arc<Lsa>>, Error> {
        let lsdb = self.lsdb(lsdb_id)?;
        Ok(lsdb
            .get(&self.arenas.lsa_entries, lsa_key)
            .map(|(_, lse)| lse.data.clone()))
    }

    // Returns how many neighbors still hold the LSA pending acknowledgment.
    pub fn lsa_retransmit_count(
        &self,
        lsdb_id: LsdbId,
        lsa_key: &LsaKey,
    ) -> Result<u32, Error> {
        let lsdb = self.lsdb(lsdb_id)?;
        Ok(lsdb
            .get(&self.arenas.lsa_entries, lsa_key)
            .map(|(_, lse)| lsa_rxmt_count(&self.arenas.neighbors, &lse.data))
            .unwrap_or(0))
    }

    fn lsdb(&self, lsdb_id: LsdbId) -> Result<&Lsdb, Error> {
        match lsdb_id {
            LsdbId::Link(area_id, iface_id) => {
                let (_, area) = self.arenas.areas.get_by_id(area_id)?;
                let (_, iface) = area
                    .interfaces
                    .get_by_id(&self.arenas.interfaces, iface_id)?;
                Ok(&iface.state.lsdb)
            }
            LsdbId::Area(area_id) => {
                let (_, area) = self.arenas.areas.get_by_id(area_id)?;
                Ok(&area.state.lsdb)
            }
            LsdbId::As => Ok(&self.state.lsdb),
        }
    }

    // ===== event loop entry points =====

    // Feeds a received packet into the instance. Decode, validation,
    // install and flood decisions complete synchronously; outgoing packets
    // and collaborator signals are left in the output queues.
    pub fn process_packet(
        &mut self,
        area_id: AreaId,
        iface_id: InterfaceId,
        src: Ipv4Addr,
        data: Bytes,
    ) -> Result<(), Error> {
        let result = {
            let (mut view, arenas) = self.up();
            events::process_packet(
                &mut view, arenas, area_id, iface_id, src, data,
            )
        };
        if let Err(error) = &result {
            error.log();
        }
        self.drain_events();
        result
    }

    // Dispatches every timer whose deadline has passed, strictly
    // sequentially.
    pub fn process_timers(&mut self, now: Instant) {
        while let Some((token, kind)) = self.tx.timers.pop_due(now) {
            let result = {
                let (mut view, arenas) = self.up();
                match kind {
                    TimerKind::LsaExpiry { lsdb_id, lse_id } => {
                        events::process_lsa_expiry(
                            &mut view, arenas, lsdb_id, lse_id,
                        )
                    }
                    TimerKind::LsaOrigDelayed { lsdb_id, lsa_key } => {
                        events::process_lsa_orig_delayed_timer(
                            &mut view, arenas, lsdb_id, lsa_key,
                        )
                    }
                    TimerKind::LsaRefreshTick => {
                        events::process_lsa_refresh_tick(&mut view, arenas)
                    }
                    TimerKind::MaxAgeSweep => {
                        events::process_maxage_sweep(&mut view, arenas)
                    }
                    TimerKind::RxmtInterval {
                        area_id,
                        iface_id,
                        nbr_id,
                        packet_type,
                    } => events::process_rxmt_interval(
                        &mut view,
                        arenas,
                        area_id,
                        iface_id,
                        nbr_id,
                        packet_type,
                        token,
                    ),
                    TimerKind::DelayedAck { area_id, iface_id } => {
                        events::process_delayed_ack_timeout(
                            &mut view, arenas, area_id, iface_id, token,
                        )
                    }
                    TimerKind::LsUpdateSend { area_id, iface_id } => {
                        events::process_send_lsupd(
                            &mut view,
                            arenas,
                            area_id,
                            iface_id,
                            None,
                            Some(token),
                        )
                    }
                }
            };
            if let Err(error) = result {
                error.log();
            }
            self.drain_events();
        }
    }

    // Returns the deadline of the earliest pending timer, for the event
    // loop to sleep on.
    pub fn next_timer_deadline(&self) -> Option<Instant> {
        self.tx.timers.next_deadline()
    }

    // ===== output queues =====

    pub fn pop_tx_packet(&mut self) -> Option<NetTxPacketMsg> {
        self.tx.net.pop_front()
    }

    pub fn pop_signal(&mut self) -> Option<Signal> {
        self.tx.signals.pop_front()
    }

    // Processes events deferred by the packet and timer handlers. Mutations
    // scheduled while iterating the arenas land here, at the end of the
    // dispatch turn.
    fn drain_events(&mut self) {
        while let Some(event) = self.tx.events.pop_front() {
            let (mut view, arenas) = self.up();
            let result = match event {
                InternalEvent::NsmEvent {
                    area_id,
                    iface_id,
                    nbr_id,
                    event,
                } => process_nsm_event(
                    &mut view, arenas, area_id, iface_id, nbr_id, event,
                ),
                InternalEvent::SendLsUpdate {
                    area_id,
                    iface_id,
                    nbr_id,
                } => events::process_send_lsupd(
                    &mut view, arenas, area_id, iface_id, nbr_id, None,
                ),
            };
            if let Err(error) = result {
                error.log();
            }
        }
    }
}

// ===== helper functions =====

fn process_nsm_event(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    area_id: AreaId,
    iface_id: InterfaceId,
    nbr_id: NeighborId,
    event: nsm::Event,
) -> Result<(), Error> {
    let (_, area) = arenas.areas.get_by_id(area_id)?;
    let (iface_idx, _) =
        area.interfaces.get_by_id(&arenas.interfaces, iface_id)?;
    let (nbr_idx, _) = {
        let iface = &arenas.interfaces[iface_idx];
        iface.state.neighbors.get_by_id(&arenas.neighbors, nbr_id)?
    };

    let iface = &mut arenas.interfaces[iface_idx];
    let nbr = &mut arenas.neighbors[nbr_idx];
    nbr.fsm(iface, area, instance, &arenas.lsa_entries, event);

    Ok(())
}
