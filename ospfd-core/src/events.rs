//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cmp::Ordering;
use std::collections::btree_map;
use std::net::Ipv4Addr;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;

use crate::collections::{
    AreaId, AreaIndex, InterfaceId, InterfaceIndex, LsaEntryId, LsdbId,
    NeighborId, NeighborIndex, lsdb_get_mut, lsdb_index,
};
use crate::debug::{Debug, LsaFlushReason, SeqNoMismatchReason};
use crate::error::Error;
use crate::flood::flood;
use crate::instance::{InstanceArenas, InstanceUpView, Signal};
use crate::interface::ism;
use crate::lsdb::{self, LsaEntryFlags, lsa_compare};
use crate::neighbor::{Neighbor, RxmtPacketType, nsm};
use crate::output;
use crate::packet::error::DecodeError;
use crate::packet::lsa::{Lsa, LsaKey, LsaScope};
use crate::packet::{DbDesc, DbDescFlags, LsAck, LsRequest, LsUpdate, Packet};
use crate::tasks::{self, TimerKind, TimerToken};

// ===== Network packet receipt =====

pub(crate) fn process_packet(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    area_id: AreaId,
    iface_id: InterfaceId,
    src: Ipv4Addr,
    mut data: Bytes,
) -> Result<(), Error> {
    // Lookup area and interface.
    let (area_idx, area) = arenas.areas.get_by_id(area_id)?;
    let (iface_idx, iface) = area
        .interfaces
        .get_by_id(&arenas.interfaces, iface_id)?;

    // Ignore packets received on inactive interfaces.
    if iface.state.ism_state == ism::State::Down {
        return Err(Error::InterfaceDown(iface.name.clone()));
    }

    // Decode and validate the packet. Malformed packets are rejected with
    // no state change; authentication failures likewise have no
    // neighbor-state side effects.
    let packet = Packet::decode(&mut data, iface.state.auth.as_ref())
        .map_err(|error| match error {
            DecodeError::AuthError
            | DecodeError::AuthTypeMismatch
            | DecodeError::UnsupportedAuthType(..) => {
                Error::PacketAuthError(src, error)
            }
            error => Error::PacketDecodeError(error),
        })?;

    Debug::PacketRx(&iface.name, &src, &packet).log();

    // Hello packets belong to the external adjacency machinery.
    if let Packet::Hello(..) = packet {
        return Ok(());
    }

    // All other packet types are only accepted from known neighbors.
    let router_id = packet.hdr().router_id;
    let (nbr_idx, _) = iface
        .state
        .neighbors
        .get_by_router_id(&arenas.neighbors, router_id)
        .ok_or(Error::UnknownNeighbor(src, router_id))?;

    // Update statistics.
    let iface = &mut arenas.interfaces[iface_idx];
    iface.state.event_count += 1;

    match packet {
        Packet::Hello(..) => unreachable!(),
        Packet::DbDesc(dbdesc) => process_packet_dbdesc(
            nbr_idx, iface_idx, area_idx, instance, arenas, src, dbdesc,
        ),
        Packet::LsRequest(ls_req) => process_packet_lsreq(
            nbr_idx, iface_idx, area_idx, instance, arenas, ls_req,
        ),
        Packet::LsUpdate(ls_upd) => process_packet_lsupd(
            nbr_idx, iface_idx, area_idx, instance, arenas, ls_upd,
        ),
        Packet::LsAck(ls_ack) => {
            process_packet_lsack(&mut arenas.neighbors[nbr_idx], ls_ack)
        }
    }
}

fn process_packet_dbdesc(
    nbr_idx: NeighborIndex,
    iface_idx: InterfaceIndex,
    area_idx: AreaIndex,
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    src: Ipv4Addr,
    dbdesc: DbDesc,
) -> Result<(), Error> {
    let nbr = &mut arenas.neighbors[nbr_idx];
    let iface = &mut arenas.interfaces[iface_idx];
    let area = &arenas.areas[area_idx];
    let lsa_entries = &arenas.lsa_entries;

    // MTU mismatch check.
    if !iface.config.mtu_ignore && dbdesc.mtu > iface.system.mtu.unwrap() {
        return Err(Error::MtuMismatch(src, dbdesc.mtu));
    }

    // Further processing depends on the neighbor's state.
    match nbr.state {
        nsm::State::Down
        | nsm::State::Attempt
        | nsm::State::Init
        | nsm::State::TwoWay => {
            return Err(Error::DbDescReject(nbr.router_id, nbr.state));
        }
        nsm::State::ExStart => {
            if dbdesc
                .dd_flags
                .contains(DbDescFlags::I | DbDescFlags::M | DbDescFlags::MS)
                && dbdesc.lsa_hdrs.is_empty()
                && dbdesc.hdr.router_id > instance.state.router_id
            {
                // Set the master/slave bit to slave, and set the neighbor
                // data structure's DD sequence number to that specified by
                // the master.
                nbr.dd_flags.remove(DbDescFlags::MS);
                nbr.dd_seq_no = dbdesc.dd_seq_no;
            } else if !dbdesc
                .dd_flags
                .contains(DbDescFlags::I | DbDescFlags::MS)
                && dbdesc.dd_seq_no == nbr.dd_seq_no
                && dbdesc.hdr.router_id < instance.state.router_id
            {
                // In this case the router is Master.
            } else {
                // Ignore the packet.
                return Ok(());
            }

            nbr.options = Some(dbdesc.options);
            let event = nsm::Event::NegotiationDone;
            nbr.fsm(iface, area, instance, lsa_entries, event);
        }
        nsm::State::Exchange => {
            // Check for duplicate packet.
            if nbr.dbdesc_is_dup(&dbdesc) {
                // The slave needs to retransmit the last Database
                // Description packet that it had sent.
                if !nbr.dd_flags.contains(DbDescFlags::MS) {
                    output::rxmt_dbdesc(nbr, iface, instance);
                }

                return Ok(());
            }

            // Sanity checks.
            let last_rcvd_dbdesc = nbr.last_rcvd_dbdesc.as_ref().unwrap();
            if dbdesc.dd_flags.contains(DbDescFlags::I)
                || dbdesc.dd_flags.contains(DbDescFlags::MS)
                    != last_rcvd_dbdesc.dd_flags.contains(DbDescFlags::MS)
            {
                let reason = SeqNoMismatchReason::InconsistentFlags;
                let event = nsm::Event::SeqNoMismatch(reason);
                nbr.fsm(iface, area, instance, lsa_entries, event);
                return Ok(());
            }
            if dbdesc.options != last_rcvd_dbdesc.options {
                let reason = SeqNoMismatchReason::InconsistentOptions;
                let event = nsm::Event::SeqNoMismatch(reason);
                nbr.fsm(iface, area, instance, lsa_entries, event);
                return Ok(());
            }
            if (nbr.dd_flags.contains(DbDescFlags::MS)
                && dbdesc.dd_seq_no != nbr.dd_seq_no)
                || (!nbr.dd_flags.contains(DbDescFlags::MS)
                    && dbdesc.dd_seq_no != nbr.dd_seq_no + 1)
            {
                let reason = SeqNoMismatchReason::InconsistentSeqNo;
                let event = nsm::Event::SeqNoMismatch(reason);
                nbr.fsm(iface, area, instance, lsa_entries, event);
                return Ok(());
            }
        }
        nsm::State::Loading | nsm::State::Full => {
            // Check for duplicate packet.
            if nbr.dbdesc_is_dup(&dbdesc) {
                // The slave must respond to duplicates by repeating the
                // last Database Description packet that it had sent.
                if !nbr.dd_flags.contains(DbDescFlags::MS) {
                    output::rxmt_dbdesc(nbr, iface, instance);
                }

                return Ok(());
            }

            let reason = SeqNoMismatchReason::UnexpectedDbDesc;
            let event = nsm::Event::SeqNoMismatch(reason);
            nbr.fsm(iface, area, instance, lsa_entries, event);
            return Ok(());
        }
    }

    // If we got this far it means the packet was accepted. Stop the
    // retransmission interval in case it's active.
    nbr.rxmt_dbdesc_stop();

    // Now iterate over all LSA headers.
    for lsa_hdr in &dbdesc.lsa_hdrs {
        // Check if the LSA is valid for this area and neighbor.
        if !lsdb::lsa_type_is_valid(
            Some(area.config.area_type),
            nbr.options,
            lsa_hdr.lsa_type,
        ) {
            let reason = SeqNoMismatchReason::InvalidLsaType;
            let event = nsm::Event::SeqNoMismatch(reason);
            nbr.fsm(iface, area, instance, lsa_entries, event);
            return Ok(());
        }

        // RFC 5243 says:
        // "If the Database summary list contains an instance of the LSA
        // that is the same as or less recent than the listed LSA, the LSA
        // is removed from the Database summary list".
        let lsa_key = lsa_hdr.key();
        if let btree_map::Entry::Occupied(o) =
            nbr.lists.db_summary.entry(lsa_key)
        {
            let db_summ_lsa = o.get();
            if lsa_compare(&db_summ_lsa.hdr, lsa_hdr) != Ordering::Greater {
                o.remove();
            }
        }

        // Put the LSA on the Link state request list if it's not present
        // on the LSDB, or if the local copy is less recent than the
        // received one.
        let lsdb = match lsa_hdr.lsa_type.scope() {
            LsaScope::Link => &iface.state.lsdb,
            LsaScope::Area => &area.state.lsdb,
            LsaScope::As => &instance.state.lsdb,
            LsaScope::Unknown => unreachable!(),
        };
        if let Some((_, lse)) = lsdb.get(lsa_entries, &lsa_key)
            && lsa_compare(&lse.data.hdr, lsa_hdr) != Ordering::Less
        {
            continue;
        }
        nbr.lists.ls_request.insert(lsa_key, *lsa_hdr);
    }

    // Start sending Link State Request packets.
    if !nbr.lists.ls_request.is_empty()
        && nbr.lists.ls_request_pending.is_empty()
    {
        output::send_lsreq(nbr, iface, area, instance);
    }

    // Further processing depends on whether the router is master or slave.
    let mut exchange_done = false;
    if nbr.dd_flags.contains(DbDescFlags::MS) {
        nbr.dd_seq_no += 1;

        if !nbr.dd_flags.contains(DbDescFlags::M)
            && !dbdesc.dd_flags.contains(DbDescFlags::M)
        {
            exchange_done = true;
        } else {
            output::send_dbdesc(nbr, iface, area, instance);
        }
    } else {
        nbr.dd_seq_no = dbdesc.dd_seq_no;

        output::send_dbdesc(nbr, iface, area, instance);

        if !nbr.dd_flags.contains(DbDescFlags::M)
            && !dbdesc.dd_flags.contains(DbDescFlags::M)
        {
            exchange_done = true;
        }
    }
    if exchange_done {
        nbr.fsm(iface, area, instance, lsa_entries, nsm::Event::ExchangeDone);
    }

    // Save last received Database Description packet.
    nbr.last_rcvd_dbdesc = Some(crate::neighbor::LastDbDesc {
        options: dbdesc.options,
        dd_flags: dbdesc.dd_flags,
        dd_seq_no: dbdesc.dd_seq_no,
    });

    Ok(())
}

fn process_packet_lsreq(
    nbr_idx: NeighborIndex,
    iface_idx: InterfaceIndex,
    area_idx: AreaIndex,
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    ls_req: LsRequest,
) -> Result<(), Error> {
    let nbr = &mut arenas.neighbors[nbr_idx];
    let iface = &mut arenas.interfaces[iface_idx];
    let area = &arenas.areas[area_idx];
    let lsa_entries = &arenas.lsa_entries;

    if nbr.state < nsm::State::Exchange {
        Debug::PacketRxIgnore(nbr.router_id, &nbr.state).log();
        return Ok(());
    }

    // Iterate over all request entries.
    for lsa_key in &ls_req.entries {
        // Locate LSA in the LSDB.
        let lsdb = match lsa_key.lsa_type.scope() {
            LsaScope::Link => &iface.state.lsdb,
            LsaScope::Area => &area.state.lsdb,
            LsaScope::As => &instance.state.lsdb,
            LsaScope::Unknown => {
                // Ignore requests for LSAs of unknown scope.
                continue;
            }
        };

        if let Some((_, lse)) = lsdb.get(lsa_entries, lsa_key) {
            // Copy LSA for transmission to the neighbor.
            let lsa = lse.data.clone();
            nbr.lists.ls_update.insert(*lsa_key, lsa);
        } else {
            // Something has gone wrong with the Database Exchange process.
            nbr.fsm(iface, area, instance, lsa_entries, nsm::Event::BadLsReq);
            return Ok(());
        }
    }

    // Schedule transmission of new LS Update.
    if !nbr.lists.ls_update.is_empty() {
        instance.tx.events.push_back(tasks::InternalEvent::SendLsUpdate {
            area_id: area.id,
            iface_id: iface.id,
            nbr_id: Some(nbr.id),
        });
    }

    Ok(())
}

fn process_packet_lsupd(
    nbr_idx: NeighborIndex,
    iface_idx: InterfaceIndex,
    area_idx: AreaIndex,
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    ls_upd: LsUpdate,
) -> Result<(), Error> {
    let nbr = &arenas.neighbors[nbr_idx];
    if nbr.state < nsm::State::Exchange {
        Debug::PacketRxIgnore(nbr.router_id, &nbr.state).log();
        return Ok(());
    }

    // Process all LSAs contained in the packet.
    for lsa in ls_upd.lsas {
        let stop = process_packet_lsupd_lsa(
            nbr_idx, iface_idx, area_idx, instance, arenas, lsa,
        );
        if stop {
            break;
        }
    }

    Ok(())
}

// RFC 2328, section 13: the flooding procedure's per-LSA decision.
//
// Returns whether the processing of the containing Link State Update packet
// must stop (database exchange error).
fn process_packet_lsupd_lsa(
    nbr_idx: NeighborIndex,
    iface_idx: InterfaceIndex,
    area_idx: AreaIndex,
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    #[allow(unused_mut)] mut lsa: Lsa,
) -> bool {
    let nbr = &arenas.neighbors[nbr_idx];
    let iface = &mut arenas.interfaces[iface_idx];
    let area = &arenas.areas[area_idx];

    // Generate raw data that might be missing for LSAs received in testing
    // mode.
    #[cfg(feature = "testing")]
    if lsa.raw.is_empty() {
        lsa.encode();
    }

    // (1) Validate the LSA (not only the checksum as specified by the RFC).
    if let Err(error) = lsa.validate() {
        // Log why the LSA is being discarded.
        Debug::LsaDiscard(nbr.router_id, &lsa.hdr, &error).log();

        // Examine the next LSA.
        return false;
    }

    // (2-3) Check if the LSA type is valid for this area and neighbor.
    if !lsdb::lsa_type_is_valid(
        Some(area.config.area_type),
        nbr.options,
        lsa.hdr.lsa_type,
    ) {
        // Examine the next LSA.
        return false;
    }

    // (5) Find the instance of this LSA that is currently contained in the
    // router's link state database.
    let lsdb_idx = match lsa.hdr.lsa_type.scope() {
        LsaScope::Link => crate::collections::LsdbIndex::Link(
            area_idx, iface_idx,
        ),
        LsaScope::Area => crate::collections::LsdbIndex::Area(area_idx),
        LsaScope::As => crate::collections::LsdbIndex::As,
        LsaScope::Unknown => {
            Error::LsaUnknownType(lsa.hdr.lsa_type).log();
            return false;
        }
    };
    let lsdb = match lsdb_idx {
        crate::collections::LsdbIndex::Link(..) => &iface.state.lsdb,
        crate::collections::LsdbIndex::Area(..) => &area.state.lsdb,
        crate::collections::LsdbIndex::As => &instance.state.lsdb,
    };
    let lsa_key = lsa.hdr.key();
    let lse = lsdb.get(&arenas.lsa_entries, &lsa_key).map(|(_, lse)| lse);

    // (4) If the LSA's LS age is equal to MaxAge, and there is currently no
    // instance of the LSA in the router's link state database, and none of
    // router's neighbors are in states Exchange or Loading: acknowledge and
    // discard, never installing a ghost MaxAge entry.
    if lsa.hdr.is_maxage()
        && lse.is_none()
        && !arenas.neighbors.iter().any(|(_, nbr)| {
            matches!(nbr.state, nsm::State::Exchange | nsm::State::Loading)
        })
    {
        // Acknowledge the receipt of the LSA.
        let nbr = &arenas.neighbors[nbr_idx];
        output::send_lsack_direct(nbr, iface, area, instance, &lsa.hdr);

        // Examine the next LSA.
        return false;
    }

    // (5 cont.) There is no database copy, or the received LSA is more
    // recent than the database copy.
    let lsa_cmp = lse.map(|lse| lsa_compare(&lse.data.hdr, &lsa.hdr));
    if matches!(lsa_cmp, None | Some(Ordering::Less)) {
        // (5.a) MinLSArrival check.
        if let Some(lse) = lse
            && lsdb::lsa_min_arrival_check(lse)
        {
            // Log why the LSA is being discarded.
            Debug::LsaMinArrivalDiscard(nbr.router_id, &lsa.hdr).log();

            // Examine the next LSA.
            return false;
        }

        // Move LSA into a reference-counting pointer.
        let lsa = Arc::new(lsa);

        // (5.b) Immediately flood the new LSA out some subset of the
        // router's interfaces.
        let src = Some((iface_idx, nbr_idx));
        let flooded_back = flood(
            instance,
            &arenas.areas,
            &mut arenas.interfaces,
            &mut arenas.neighbors,
            lsdb_idx,
            &lsa,
            src,
        );

        // (5.c) This step can be skipped since the LSA installation process
        // already takes care of removing the old copy from all Link state
        // retransmission lists.

        // (5.d) Install the new LSA in the link state database (replacing
        // the current database copy).
        let (lse_idx, _) = lsdb::install(instance, arenas, lsdb_idx, lsa);
        let lse = &mut arenas.lsa_entries[lse_idx];
        lse.flags.insert(LsaEntryFlags::RECEIVED);

        // Update statistics.
        instance.state.rx_lsa_count += 1;
        instance.state.discontinuity_time = Utc::now();

        // (5.e) Possibly acknowledge the receipt of the LSA by sending a
        // Link State Acknowledgment packet.
        let nbr = &arenas.neighbors[nbr_idx];
        let iface = &mut arenas.interfaces[iface_idx];
        let area = &arenas.areas[area_idx];
        let nbr_net_id = nbr.network_id();
        let nbr_router_id = nbr.router_id;
        if !flooded_back
            && (iface.state.ism_state != ism::State::Backup
                || iface.state.dr == Some(nbr_net_id))
        {
            // Enqueue delayed ack.
            let lsa_hdr = lse.data.hdr;
            iface.enqueue_delayed_ack(area, instance, &lsa_hdr);
        }

        // (5.f) Check if this is a self-originated LSA.
        if lse.flags.contains(LsaEntryFlags::SELF_ORIGINATED) {
            Debug::LsaSelfOriginated(nbr_router_id, &lse.data.hdr).log();

            // Let the external origination logic decide whether to update
            // or flush the received instance.
            let (lsdb_id, _) = lsdb_index(
                &instance.state.lsdb,
                &arenas.areas,
                &arenas.interfaces,
                lsdb_idx,
            );
            instance.tx.signals.push_back(Signal::SelfOriginatedLsaRcvd {
                lsdb_id,
                lse_id: lse.id,
            });
        }

        // Examine the next LSA.
        return false;
    }

    // (6) Check if the received LSA is the same instance as the database
    // copy (i.e., neither one is more recent).
    let nbr = &mut arenas.neighbors[nbr_idx];
    let lse = lsdb
        .get(&arenas.lsa_entries, &lsa_key)
        .map(|(_, lse)| lse)
        .unwrap();
    if lsa_cmp == Some(Ordering::Equal) {
        // Check if this LSA can be handled as an implied acknowledgment.
        if let btree_map::Entry::Occupied(o) = nbr.lists.ls_rxmt.entry(lsa_key)
        {
            o.remove();
            nbr.rxmt_lsupd_stop_check();

            let nbr_net_id = nbr.network_id();
            if iface.state.ism_state == ism::State::Backup
                && iface.state.dr == Some(nbr_net_id)
            {
                // Enqueue delayed ack.
                iface.enqueue_delayed_ack(area, instance, &lsa.hdr);
            }
        } else {
            // Send direct ack.
            output::send_lsack_direct(nbr, iface, area, instance, &lsa.hdr);
        }

        // Examine the next LSA.
        return false;
    }

    // (7) If there is an instance of the LSA on the sending neighbor's Link
    // state request list, an error has occurred in the Database Exchange
    // process.
    if nbr.lists.ls_request.contains_key(&lsa_key)
        || nbr.lists.ls_request_pending.contains_key(&lsa_key)
    {
        // Restart the Database Exchange process.
        nbr.fsm(
            iface,
            area,
            instance,
            &arenas.lsa_entries,
            nsm::Event::BadLsReq,
        );

        // Stop processing the Link State Update packet.
        return true;
    }

    // (8) The database copy is more recent.
    //
    // If the database copy has LS age equal to MaxAge and LS sequence
    // number equal to MaxSequenceNumber, simply discard the received LSA
    // without acknowledging it.
    if lse.data.hdr.is_maxage() && lse.data.hdr.seq_no == lsdb::LSA_MAX_SEQ_NO
    {
        // Examine the next LSA.
        return false;
    }
    if !lsdb::lsa_min_arrival_check(lse) {
        // Send the database copy back to the sending neighbor, encapsulated
        // within a Link State Update Packet.
        nbr.lists.ls_update.insert(lsa_key, lse.data.clone());
        instance.tx.events.push_back(tasks::InternalEvent::SendLsUpdate {
            area_id: area.id,
            iface_id: iface.id,
            nbr_id: Some(nbr.id),
        });
    } else {
        // Log why the LSA is being discarded.
        Debug::LsaMinArrivalDiscard(nbr.router_id, &lsa.hdr).log();
    }

    // Examine the next LSA.
    false
}

fn process_packet_lsack(
    nbr: &mut Neighbor,
    ls_ack: LsAck,
) -> Result<(), Error> {
    if nbr.state < nsm::State::Exchange {
        Debug::PacketRxIgnore(nbr.router_id, &nbr.state).log();
        return Ok(());
    }

    // Iterate over all LSA headers.
    for lsa_hdr in &ls_ack.lsa_hdrs {
        let lsa_key = lsa_hdr.key();
        if let btree_map::Entry::Occupied(o) = nbr.lists.ls_rxmt.entry(lsa_key)
        {
            let lsa = o.get();
            if lsa_compare(&lsa.hdr, lsa_hdr) == Ordering::Equal {
                o.remove();
                nbr.rxmt_lsupd_stop_check();
            } else {
                Debug::QuestionableAck(nbr.router_id, lsa_hdr).log();
            }
        }
    }

    Ok(())
}

// ===== Packet retransmission interval =====

pub(crate) fn process_rxmt_interval(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    area_id: AreaId,
    iface_id: InterfaceId,
    nbr_id: NeighborId,
    packet_type: RxmtPacketType,
    token: TimerToken,
) -> Result<(), Error> {
    // Lookup area, interface and neighbor.
    let (_, area) = arenas.areas.get_by_id(area_id)?;
    let (iface_idx, iface) =
        area.interfaces.get_by_id(&arenas.interfaces, iface_id)?;
    let (_, nbr) = iface
        .state
        .neighbors
        .get_mut_by_id(&mut arenas.neighbors, nbr_id)?;
    let iface = &arenas.interfaces[iface_idx];

    match packet_type {
        RxmtPacketType::DbDesc => {
            // Ignore stale timers.
            if nbr.tasks.rxmt_dbdesc != Some(token) {
                return Ok(());
            }

            output::rxmt_dbdesc(nbr, iface, instance);
            nbr.rxmt_dbdesc_start(iface, area, instance);
        }
        RxmtPacketType::LsRequest => {
            if nbr.tasks.rxmt_lsreq != Some(token) {
                return Ok(());
            }

            if nbr.lists.ls_request_pending.is_empty() {
                nbr.rxmt_lsreq_stop();
                return Ok(());
            }
            output::rxmt_lsreq(nbr, iface, area, instance);
            nbr.rxmt_lsreq_start(iface, area, instance);
        }
        RxmtPacketType::LsUpdate => {
            if nbr.tasks.rxmt_lsupd != Some(token) {
                return Ok(());
            }

            if nbr.lists.ls_rxmt.is_empty() {
                nbr.tasks.rxmt_lsupd = None;
                return Ok(());
            }

            // Resend all unacknowledged LSAs, batched into LS Update
            // packets bounded by the interface MTU.
            output::rxmt_lsupd(nbr, iface, area, instance);
            nbr.tasks.rxmt_lsupd = None;
            nbr.rxmt_lsupd_start_check(iface, area, instance);
        }
    }

    Ok(())
}

// ===== Delayed ack timeout =====

pub(crate) fn process_delayed_ack_timeout(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    area_id: AreaId,
    iface_id: InterfaceId,
    token: TimerToken,
) -> Result<(), Error> {
    // Lookup area and interface.
    let (_, area) = arenas.areas.get_by_id(area_id)?;
    let (_, iface) = area
        .interfaces
        .get_mut_by_id(&mut arenas.interfaces, iface_id)?;

    // Ignore stale timers.
    if iface.state.tasks.ls_delayed_ack != Some(token) {
        return Ok(());
    }
    iface.state.tasks.ls_delayed_ack = None;

    // Send delayed acks.
    output::send_lsack_delayed(iface, area, instance, &arenas.neighbors);

    Ok(())
}

// ===== LS Update transmission =====

pub(crate) fn process_send_lsupd(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    area_id: AreaId,
    iface_id: InterfaceId,
    nbr_id: Option<NeighborId>,
    token: Option<TimerToken>,
) -> Result<(), Error> {
    // Lookup area and interface.
    let (_, area) = arenas.areas.get_by_id(area_id)?;
    let (_, iface) = area
        .interfaces
        .get_mut_by_id(&mut arenas.interfaces, iface_id)?;

    let nbr_idx = match nbr_id {
        Some(nbr_id) => Some(
            iface
                .state
                .neighbors
                .get_by_id(&arenas.neighbors, nbr_id)?
                .0,
        ),
        None => {
            // Ignore stale timers.
            if let Some(token) = token {
                if iface.state.tasks.ls_update_timer != Some(token) {
                    return Ok(());
                }
                iface.state.tasks.ls_update_timer = None;
            }
            None
        }
    };

    // Send LS Update(s).
    output::send_lsupd(nbr_idx, iface, area, instance, &mut arenas.neighbors);

    Ok(())
}

// ===== LSA expiry =====

pub(crate) fn process_lsa_expiry(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    lsdb_id: LsdbId,
    lse_id: LsaEntryId,
) -> Result<(), Error> {
    // Lookup LSA entry and its corresponding LSDB. A replaced or removed
    // entry invalidates the timer.
    let (lsdb_idx, lsdb) = lsdb_get_mut(
        &mut instance.state.lsdb,
        &mut arenas.areas,
        &mut arenas.interfaces,
        &lsdb_id,
    )?;
    let Ok((lse_idx, _)) = lsdb.get_by_id(&arenas.lsa_entries, lse_id) else {
        return Ok(());
    };

    // The LSA aged out: flush it from the routing domain.
    lsdb::flush(instance, arenas, lsdb_idx, lse_idx, LsaFlushReason::Expiry);

    Ok(())
}

// ===== MinLSInterval delayed origination =====

pub(crate) fn process_lsa_orig_delayed_timer(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    lsdb_id: LsdbId,
    lsa_key: LsaKey,
) -> Result<(), Error> {
    // Lookup LSDB.
    let (lsdb_idx, lsdb) = lsdb_get_mut(
        &mut instance.state.lsdb,
        &mut arenas.areas,
        &mut arenas.interfaces,
        &lsdb_id,
    )?;

    // Originate the postponed LSA, if it's still wanted.
    if let Some(delayed) = lsdb.delayed_orig.remove(&lsa_key) {
        lsdb::originate(instance, arenas, lsdb_idx, delayed.data);
    }

    Ok(())
}

// ===== LSA refresh tick =====

pub(crate) fn process_lsa_refresh_tick(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
) -> Result<(), Error> {
    lsdb::refresh_tick(instance, arenas);

    // Reschedule the granularity tick.
    instance.tx.timers.schedule(
        std::time::Duration::from_secs(
            lsdb::LSA_REFRESH_GRANULARITY.into(),
        ),
        TimerKind::LsaRefreshTick,
    );

    Ok(())
}

// ===== MaxAge sweep =====

pub(crate) fn process_maxage_sweep(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
) -> Result<(), Error> {
    lsdb::maxage_sweep(instance, arenas);

    // Reschedule the sweep.
    instance
        .tx
        .timers
        .schedule(tasks::MAXAGE_SWEEP_INTERVAL, TimerKind::MaxAgeSweep);

    Ok(())
}
