//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cmp::Ordering;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bitflags::bitflags;
use chrono::Utc;
use derive_new::new;
use ipnetwork::Ipv4Network;
use tracing::warn;

use crate::area::AreaType;
use crate::collections::{
    Arena, Areas, LsaEntryId, LsaEntryIndex, LsdbId, LsdbIndex, lsdb_get_mut,
    lsdb_index, lsdb_index_mut,
};
use crate::debug::{Debug, LsaFlushReason};
use crate::flood::flood;
use crate::instance::{InstanceArenas, InstanceUpView, Signal};
use crate::interface::Interface;
use crate::neighbor::{Neighbor, nsm};
use crate::packet::Options;
use crate::packet::lsa::{
    Lsa, LsaBody, LsaHdr, LsaKey, LsaType, LsaTypeCode,
};
use crate::tasks::{TimerKind, TimerToken};

// Architectural Constants.
pub const LSA_REFRESH_TIME: u16 = 1800;
pub const LSA_MAX_AGE: u16 = 3600;
pub const LSA_MAX_AGE_DIFF: u16 = 900;
pub const LSA_INFINITY: u32 = 0x00ffffff;
pub const LSA_INIT_SEQ_NO: u32 = 0x80000001;
pub const LSA_MAX_SEQ_NO: u32 = 0x7fffffff;
pub const LSA_RESERVED_SEQ_NO: u32 = 0x80000000;
pub const LSA_MIN_INTERVAL: u64 = 5;
pub const LSA_MIN_ARRIVAL: u64 = 1;

// Granularity of the refresh queue, in seconds.
pub const LSA_REFRESH_GRANULARITY: u16 = 10;
const LSA_REFRESH_SLOTS: usize =
    (LSA_REFRESH_TIME / LSA_REFRESH_GRANULARITY) as usize + 1;

// Maximum size of the LSA log record.
const LSA_LOG_MAX_SIZE: usize = 64;

#[derive(Debug)]
pub struct LsaEntry {
    // LSA ID.
    pub id: LsaEntryId,
    // LSA data.
    pub data: Arc<Lsa>,
    // Refresh-queue slot holding this entry (self-originated LSAs only).
    pub refresh_slot: Option<u16>,
    // LSA entry flags.
    pub flags: LsaEntryFlags,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct LsaEntryFlags: u8 {
        const RECEIVED = 0x01;
        const SELF_ORIGINATED = 0x02;
    }
}

#[derive(Debug)]
pub struct LsaDelayedOrig {
    pub data: Lsa,
    pub token: TimerToken,
}

#[derive(Debug, new)]
pub struct LsaLogEntry {
    pub id: u32,
    pub lsa: LsaLogId,
    pub rcvd_time: Option<Instant>,
    pub reason: LsaLogReason,
}

#[derive(Clone, Debug)]
pub struct LsaLogId {
    pub area_id: Option<Ipv4Addr>,
    pub lsa_type: LsaType,
    pub lsa_id: Ipv4Addr,
    pub adv_rtr: Ipv4Addr,
    pub seq_no: u32,
}

#[derive(Debug)]
pub enum LsaLogReason {
    Refresh,
    ContentChange,
    Purge,
}

// Time-bucketed queue of self-originated LSAs due for periodic refresh.
//
// One slot per LSA_REFRESH_GRANULARITY seconds, wrapping. Each tick
// advances the cursor by the elapsed time divided by the granularity;
// entries in slots passed over are re-originated with an incremented
// sequence number.
#[derive(Debug)]
pub struct LsaRefresher {
    slots: Vec<Vec<(LsdbId, LsaEntryId)>>,
    cursor: usize,
    last_run: Instant,
}

// ===== impl LsaEntry =====

impl LsaEntry {
    pub(crate) fn new(id: LsaEntryId, data: Arc<Lsa>) -> LsaEntry {
        LsaEntry {
            id,
            data,
            refresh_slot: None,
            flags: Default::default(),
        }
    }
}

// ===== impl LsaLogId =====

impl LsaLogId {
    pub(crate) fn new(areas: &Areas, lsdb_idx: LsdbIndex, lsa: &Lsa) -> Self {
        // Get area ID from the LSA's LSDB.
        let area_id = match lsdb_idx {
            LsdbIndex::Link(area_idx, _) | LsdbIndex::Area(area_idx) => {
                let area = &areas[area_idx];
                Some(area.area_id)
            }
            LsdbIndex::As => None,
        };

        // Return new LSA log ID.
        LsaLogId {
            area_id,
            lsa_type: lsa.hdr.lsa_type,
            lsa_id: lsa.hdr.lsa_id,
            adv_rtr: lsa.hdr.adv_rtr,
            seq_no: lsa.hdr.seq_no,
        }
    }
}

// ===== impl LsaRefresher =====

impl LsaRefresher {
    pub(crate) fn new(now: Instant) -> LsaRefresher {
        LsaRefresher {
            slots: std::iter::repeat_with(Vec::new)
                .take(LSA_REFRESH_SLOTS)
                .collect(),
            cursor: 0,
            last_run: now,
        }
    }

    // Registers a self-originated LSA, returning the assigned slot. The
    // refresh delay is derived from the LSA's current age and jittered by
    // up to one granule.
    pub(crate) fn register(
        &mut self,
        age: u16,
        lsdb_id: LsdbId,
        lse_id: LsaEntryId,
    ) -> u16 {
        let delay = LSA_REFRESH_TIME.saturating_sub(age);
        let jitter = {
            #[cfg(not(feature = "deterministic"))]
            {
                use rand::Rng;
                rand::rng().random_range(0..LSA_REFRESH_GRANULARITY)
            }
            #[cfg(feature = "deterministic")]
            {
                0
            }
        };
        let granules = ((delay + jitter) / LSA_REFRESH_GRANULARITY) as usize;
        let granules = granules.clamp(1, self.slots.len() - 1);
        let slot = (self.cursor + granules) % self.slots.len();

        self.slots[slot].push((lsdb_id, lse_id));
        slot as u16
    }

    pub(crate) fn unregister(&mut self, slot: u16, entry: (LsdbId, LsaEntryId)) {
        self.slots[slot as usize].retain(|e| *e != entry);
    }

    // Advances the cursor by the elapsed granules and drains every slot
    // passed over.
    pub(crate) fn tick(&mut self, now: Instant) -> Vec<(LsdbId, LsaEntryId)> {
        let granularity =
            Duration::from_secs(LSA_REFRESH_GRANULARITY.into());
        let mut due = vec![];
        while now.saturating_duration_since(self.last_run) >= granularity {
            self.last_run += granularity;
            self.cursor = (self.cursor + 1) % self.slots.len();
            due.append(&mut self.slots[self.cursor]);
        }
        due
    }
}

// ===== global functions =====

// Compares which LSA is more recent according to the rules specified in
// Section 13.1 of RFC 2328.
//
// Returns:
// - Ordering::Greater when `a` is more recent
// - Ordering::Less when `b` is more recent
// - Ordering::Equal when the two LSAs are considered to be identical
pub fn lsa_compare(a: &LsaHdr, b: &LsaHdr) -> Ordering {
    // Sequence numbers wrap around through the signed space.
    let a_seq_no = a.seq_no as i32;
    let b_seq_no = b.seq_no as i32;
    let cmp = a_seq_no.cmp(&b_seq_no);
    if cmp != Ordering::Equal {
        return cmp;
    }

    let cmp = a.cksum.cmp(&b.cksum);
    if cmp != Ordering::Equal {
        return cmp;
    }

    if a.is_maxage() && !b.is_maxage() {
        return Ordering::Greater;
    } else if !a.is_maxage() && b.is_maxage() {
        return Ordering::Less;
    }

    if a.age.abs_diff(b.age) > LSA_MAX_AGE_DIFF {
        return b.age.cmp(&a.age);
    }

    Ordering::Equal
}

// Compares two LSAs according to the rules specified in Section 13.2 of RFC
// 2328. Its purpose is to determine if the contents of the LSAs are
// identical: the sequence number and checksum alone do not count as a
// difference.
pub fn lsa_same_contents(a: &Lsa, b: &Lsa) -> bool {
    if a.hdr.options != b.hdr.options {
        return false;
    }

    if a.hdr.is_maxage() ^ b.hdr.is_maxage() {
        return false;
    }

    if a.hdr.length != b.hdr.length {
        return false;
    }

    let hdr_length = LsaHdr::LENGTH as usize;
    a.raw[hdr_length..] == b.raw[hdr_length..]
}

// Checks if the given LSA was received via flooding less than MinLSArrival
// seconds ago.
pub(crate) fn lsa_min_arrival_check(lse: &LsaEntry) -> bool {
    if !lse.flags.contains(LsaEntryFlags::RECEIVED) {
        return false;
    }

    #[cfg(feature = "deterministic")]
    {
        false
    }
    #[cfg(not(feature = "deterministic"))]
    {
        match lse.data.base_time {
            Some(lsa_base_time) => {
                lsa_base_time.elapsed().as_secs() < LSA_MIN_ARRIVAL
            }
            None => false,
        }
    }
}

// Checks if the given LSA was originated less than MinLSInterval seconds
// ago.
fn lsa_min_orig_interval_check(lse: &LsaEntry) -> bool {
    if lse.flags.contains(LsaEntryFlags::RECEIVED) {
        return false;
    }

    #[cfg(feature = "deterministic")]
    {
        false
    }
    #[cfg(not(feature = "deterministic"))]
    {
        match lse.data.base_time {
            Some(lsa_base_time) => {
                lsa_base_time.elapsed().as_secs() < LSA_MIN_INTERVAL
            }
            None => false,
        }
    }
}

// Checks if the provided area and/or neighbor can accept the given LSA
// type.
pub(crate) fn lsa_type_is_valid(
    area_type: Option<AreaType>,
    nbr_options: Option<Options>,
    lsa_type: LsaType,
) -> bool {
    // Reject LSAs of unknown type.
    let Some(type_code) = lsa_type.type_code() else {
        return false;
    };

    // Opaque LSAs are only flooded to opaque-capable neighbors.
    if let Some(nbr_options) = nbr_options
        && lsa_type.is_opaque()
        && !nbr_options.contains(Options::O)
    {
        return false;
    }

    if let Some(area_type) = area_type {
        // Reject AS-external and type-4 summary LSAs (as per errata 3746 of
        // RFC 2328) on stub/NSSA areas.
        if area_type != AreaType::Normal
            && matches!(
                type_code,
                LsaTypeCode::SummaryRouter
                    | LsaTypeCode::AsExternal
                    | LsaTypeCode::OpaqueAs
            )
        {
            return false;
        }

        // NSSA LSAs are confined to NSSA areas.
        if area_type != AreaType::Nssa
            && type_code == LsaTypeCode::NssaExternal
        {
            return false;
        }
    }

    true
}

// Checks whether the LSA is self-originated.
pub(crate) fn lsa_is_self_originated(
    lsa: &Lsa,
    router_id: Ipv4Addr,
    interfaces: &Arena<Interface>,
) -> bool {
    // 1) The LSA's Advertising Router is equal to the router's own Router
    // ID.
    if lsa.hdr.adv_rtr == router_id {
        return true;
    }

    // 2) The LSA is a network-LSA and its Link State ID is equal to one of
    // the router's own IP interface addresses.
    if lsa.hdr.lsa_type.type_code() == Some(LsaTypeCode::Network)
        && interfaces
            .iter()
            .filter_map(|(_, iface)| iface.system.primary_addr)
            .any(|iface_primary_addr| {
                lsa.hdr.lsa_id == iface_primary_addr.ip()
            })
    {
        return true;
    }

    false
}

// Returns how many neighbors still hold the given LSA on their Link state
// retransmission lists. This is the lock-count equivalent guarding MaxAge
// removal.
pub(crate) fn lsa_rxmt_count(
    neighbors: &Arena<Neighbor>,
    lsa: &Arc<Lsa>,
) -> u32 {
    neighbors
        .iter()
        .filter(|(_, nbr)| {
            nbr.lists
                .ls_rxmt
                .get(&lsa.hdr.key())
                .filter(|rxmt_lsa| Arc::ptr_eq(lsa, rxmt_lsa))
                .is_some()
        })
        .count() as u32
}

// Installs the provided LSA to the specified LSDB.
//
// Returns the index of the new LSA entry and whether the routing table
// needs to be recalculated (true unless the new and old instances have the
// same contents).
pub(crate) fn install(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    lsdb_idx: LsdbIndex,
    lsa: Arc<Lsa>,
) -> (LsaEntryIndex, bool) {
    Debug::LsaInstall(&lsa.hdr).log();

    let lsa_key = lsa.hdr.key();

    // Remove old instance (if any) from all neighbors' Link state
    // retransmission lists.
    rxmt_lists_remove(arenas, lsdb_idx, &lsa);

    // Remove old instance of the LSA.
    let mut old_lsa = None;
    let mut old_entry = None;
    {
        let (lsdb_id, lsdb) = lsdb_index_mut(
            &mut instance.state.lsdb,
            &mut arenas.areas,
            &mut arenas.interfaces,
            lsdb_idx,
        );
        if let Some((old_lse_idx, old_lse)) =
            lsdb.get(&arenas.lsa_entries, &lsa_key)
        {
            old_lsa = Some(old_lse.data.clone());
            old_entry = Some((lsdb_id, old_lse.id, old_lse.refresh_slot));
            lsdb.delete(&mut arenas.lsa_entries, old_lse_idx);
        }
    }
    if let Some((lsdb_id, old_id, old_slot)) = old_entry {
        if let Some(slot) = old_slot {
            instance.state.refresher.unregister(slot, (lsdb_id, old_id));
        }
        instance.state.maxage_registry.remove(&(lsdb_id, old_id));
    }

    // Add LSA entry to LSDB.
    let (lsdb_id, lsdb) = lsdb_index_mut(
        &mut instance.state.lsdb,
        &mut arenas.areas,
        &mut arenas.interfaces,
        lsdb_idx,
    );
    let (lse_idx, lse) = lsdb.insert(
        &mut arenas.lsa_entries,
        lsdb_id,
        lsa.clone(),
        &mut instance.tx.timers,
    );

    // Check if the LSA is self-originated and mark it as such.
    if lsa_is_self_originated(
        &lse.data,
        instance.state.router_id,
        &arenas.interfaces,
    ) {
        lse.flags.insert(LsaEntryFlags::SELF_ORIGINATED);
    }

    // A MaxAge LSA is pending removal: park it in the MaxAge registry until
    // no retransmission list references it.
    if lse.data.hdr.is_maxage() {
        instance.state.maxage_registry.insert((lsdb_id, lse.id));
    }

    // RFC 2328 - Section 13.2:
    // "The contents of the new LSA should be compared to the old instance,
    // if present. If there is no difference, there is no need to
    // recalculate the routing table".
    //
    // Additionally, do not recalculate the routing table in the following
    // cases:
    // * The type of the new LSA is unknown
    // * The new LSA is a self-originated summary
    let mut content_change = true;
    if let Some(old_lsa) = &old_lsa
        && lsa_same_contents(old_lsa, &lsa)
    {
        content_change = false;
    }
    let lsa_type = lsa.hdr.lsa_type;
    let self_orig_summary = lse.flags.contains(LsaEntryFlags::SELF_ORIGINATED)
        && matches!(
            lsa_type.type_code(),
            Some(LsaTypeCode::SummaryNetwork | LsaTypeCode::SummaryRouter)
        );
    let route_recalc =
        content_change && !lsa.body.is_unknown() && !self_orig_summary;

    // Add entry to LSA log.
    let lsa_log_id = LsaLogId::new(&arenas.areas, lsdb_idx, &lsa);
    let reason = if lsa.hdr.is_maxage() {
        LsaLogReason::Purge
    } else if content_change {
        LsaLogReason::ContentChange
    } else {
        LsaLogReason::Refresh
    };
    log_lsa(instance, lsa_log_id.clone(), lsa.base_time, reason);

    // Signal the external route computation if necessary.
    if route_recalc {
        instance.tx.signals.push_back(Signal::RouteRecalcNeeded {
            lsa: lsa_log_id,
        });
    }

    (lse_idx, route_recalc)
}

// Originates the provided LSA.
pub(crate) fn originate(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    lsdb_idx: LsdbIndex,
    lsa: Lsa,
) {
    let lsa_key = lsa.hdr.key();

    // When an attempt is made to increment the sequence number past the
    // maximum value of MaxSequenceNumber, the current instance of the LSA
    // must first be flushed from the routing domain. This is done by
    // prematurely aging the LSA and reflooding it. As soon as this flood
    // has been acknowledged by all adjacent neighbors, a new instance can
    // be originated with sequence number of InitialSequenceNumber.
    let (_, lsdb) = lsdb_index_mut(
        &mut instance.state.lsdb,
        &mut arenas.areas,
        &mut arenas.interfaces,
        lsdb_idx,
    );
    if let Some((old_lse_idx, _)) = lsdb.get(&arenas.lsa_entries, &lsa_key)
        && lsa.hdr.seq_no == LSA_MAX_SEQ_NO.wrapping_add(1)
    {
        // Record LSA that will be originated later and then flush the
        // existing instance.
        lsdb.seqno_wrapping.insert(lsa_key, lsa);
        let reason = LsaFlushReason::PrematureAging;
        flush(instance, arenas, lsdb_idx, old_lse_idx, reason);
        return;
    }

    Debug::LsaOriginate(&lsa.hdr).log();

    let (lse_idx, _) = install(instance, arenas, lsdb_idx, Arc::new(lsa));

    // Flood the new instance.
    let lse = &arenas.lsa_entries[lse_idx];
    let lsa = lse.data.clone();
    flood(
        instance,
        &arenas.areas,
        &mut arenas.interfaces,
        &mut arenas.neighbors,
        lsdb_idx,
        &lsa,
        None,
    );

    // Update statistics.
    instance.state.orig_lsa_count += 1;
    instance.state.discontinuity_time = Utc::now();

    // Schedule LSA refreshing.
    let (lsdb_id, _) = lsdb_index(
        &instance.state.lsdb,
        &arenas.areas,
        &arenas.interfaces,
        lsdb_idx,
    );
    let lse = &mut arenas.lsa_entries[lse_idx];
    let slot =
        instance
            .state
            .refresher
            .register(lse.data.hdr.age, lsdb_id, lse.id);
    lse.refresh_slot = Some(slot);
}

// Attempts to originate the provided LSA, but only if it passes a few
// checks.
pub(crate) fn originate_check(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    lsdb_idx: LsdbIndex,
    options: Options,
    lsa_id: Ipv4Addr,
    lsa_body: LsaBody,
) {
    let adv_rtr = instance.state.router_id;
    let lsa_key = LsaKey::new(lsa_body.lsa_type(), adv_rtr, lsa_id);

    // Get next sequence number.
    let (lsdb_id, lsdb) = lsdb_index_mut(
        &mut instance.state.lsdb,
        &mut arenas.areas,
        &mut arenas.interfaces,
        lsdb_idx,
    );
    let seq_no = lsdb
        .get(&arenas.lsa_entries, &lsa_key)
        .map(|(_, old_lse)| old_lse.data.hdr.seq_no.wrapping_add(1))
        .unwrap_or(LSA_INIT_SEQ_NO);

    // Make new LSA.
    let lsa = Lsa::new(0, options, lsa_id, adv_rtr, seq_no, lsa_body);

    // Check if an instance of this LSA already exists in the LSDB.
    if let Some((_, old_lse)) = lsdb.get(&arenas.lsa_entries, &lsa_key) {
        // If an LSA with identical contents already exists in the LSDB,
        // skip originating a new one (as per section 12.4 of RFC 2328).
        //
        // However, if the database copy was received through flooding,
        // proceed to originate a new instance with an updated sequence
        // number.
        if lsa_same_contents(&old_lse.data, &lsa)
            && !old_lse.flags.contains(LsaEntryFlags::RECEIVED)
        {
            return;
        }

        // Perform the MinLSInterval check.
        if lsdb.delayed_orig.contains_key(&lsa_key)
            || lsa_min_orig_interval_check(old_lse)
        {
            Debug::LsaOriginateMinInterval(&lsa.hdr).log();

            match lsdb.delayed_orig.entry(lsa_key) {
                std::collections::hash_map::Entry::Occupied(mut o) => {
                    // Update the LSA that will be originated, but keep the
                    // current timeout.
                    let ldo = o.get_mut();
                    ldo.data = lsa;
                }
                std::collections::hash_map::Entry::Vacant(v) => {
                    // Start timer to postpone originating the LSA.
                    let token = instance.tx.timers.schedule(
                        Duration::from_secs(LSA_MIN_INTERVAL),
                        TimerKind::LsaOrigDelayed { lsdb_id, lsa_key },
                    );
                    v.insert(LsaDelayedOrig { data: lsa, token });
                }
            }
            return;
        }
    }

    // Effectively originate the LSA.
    originate(instance, arenas, lsdb_idx, lsa);
}

// Flushes LSA from the LSDB.
pub(crate) fn flush(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    lsdb_idx: LsdbIndex,
    lse_idx: LsaEntryIndex,
    reason: LsaFlushReason,
) {
    // Do not flush the same LSA more than once.
    let lse = &mut arenas.lsa_entries[lse_idx];
    if lse.data.hdr.is_maxage() {
        return;
    }

    if reason == LsaFlushReason::PrematureAging {
        assert!(lse.flags.contains(LsaEntryFlags::SELF_ORIGINATED));
    }

    Debug::LsaFlush(&lse.data.hdr, reason).log();

    let lsa_key = lse.data.hdr.key();

    // Unregister from the refresh queue.
    let (lsdb_id, _) = lsdb_index(
        &instance.state.lsdb,
        &arenas.areas,
        &arenas.interfaces,
        lsdb_idx,
    );
    let lse_id = lse.id;
    if let Some(slot) = lse.refresh_slot.take() {
        instance.state.refresher.unregister(slot, (lsdb_id, lse_id));
    }

    // Set the LSA age to MaxAge.
    let mut lsa = (*lse.data).clone();
    lsa.set_maxage();
    let lsa = Arc::new(lsa);

    // Install updated LSA to clear rxmt lists and rerun route calculations.
    let (lse_idx, _) = install(instance, arenas, lsdb_idx, lsa);

    // Reflood updated LSA.
    let lse = &arenas.lsa_entries[lse_idx];
    let lsa = lse.data.clone();
    flood(
        instance,
        &arenas.areas,
        &mut arenas.interfaces,
        &mut arenas.neighbors,
        lsdb_idx,
        &lsa,
        None,
    );

    // Remove pending LSA origination, if any.
    let (_, lsdb) = lsdb_index_mut(
        &mut instance.state.lsdb,
        &mut arenas.areas,
        &mut arenas.interfaces,
        lsdb_idx,
    );
    lsdb.delayed_orig.remove(&lsa_key);
}

// Flushes all self-originated LSAs from the LSDB.
pub(crate) fn flush_all_self_originated(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
) {
    let reason = LsaFlushReason::PrematureAging;
    let mut idxs = vec![];

    // AS-scope LSAs.
    let lsdb_idx = LsdbIndex::As;
    idxs.extend(
        instance
            .state
            .lsdb
            .iter(&arenas.lsa_entries)
            .filter(|(_, lse)| {
                lse.flags.contains(LsaEntryFlags::SELF_ORIGINATED)
            })
            .map(|(lse_idx, _)| (lsdb_idx, lse_idx)),
    );

    // Area-scope LSAs.
    for area_idx in arenas.areas.indexes() {
        let area = &arenas.areas[area_idx];
        let lsdb_idx = LsdbIndex::Area(area_idx);
        idxs.extend(
            area.state
                .lsdb
                .iter(&arenas.lsa_entries)
                .filter(|(_, lse)| {
                    lse.flags.contains(LsaEntryFlags::SELF_ORIGINATED)
                })
                .map(|(lse_idx, _)| (lsdb_idx, lse_idx)),
        );

        // Link-scope LSAs.
        for iface_idx in area.interfaces.indexes() {
            let iface = &arenas.interfaces[iface_idx];
            let lsdb_idx = LsdbIndex::Link(area_idx, iface_idx);
            idxs.extend(
                iface
                    .state
                    .lsdb
                    .iter(&arenas.lsa_entries)
                    .filter(|(_, lse)| {
                        lse.flags.contains(LsaEntryFlags::SELF_ORIGINATED)
                    })
                    .map(|(lse_idx, _)| (lsdb_idx, lse_idx)),
            );
        }
    }

    // Flush LSAs.
    for (lsdb_idx, lse_idx) in idxs {
        flush(instance, arenas, lsdb_idx, lse_idx, reason);
    }
}

// Periodic sweep of the MaxAge registry.
//
// A MaxAge LSA is removed from its LSDB only once no neighbor
// retransmission list references it and no neighbor anywhere is in states
// Exchange or Loading; removing earlier could desynchronize a database
// exchange in progress (RFC 2328, section 14).
pub(crate) fn maxage_sweep(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
) {
    // Skip discarding MaxAge LSAs if any of the router's neighbors are in
    // states Exchange or Loading.
    if arenas.neighbors.iter().any(|(_, nbr)| {
        matches!(nbr.state, nsm::State::Exchange | nsm::State::Loading)
    }) {
        return;
    }

    enum Action {
        Drop,
        Keep,
        Remove(LsdbIndex, LsaEntryIndex, Option<Lsa>),
    }

    let entries: Vec<_> =
        instance.state.maxage_registry.iter().copied().collect();
    for (lsdb_id, lse_id) in entries {
        // Resolve the registry entry; stale entries are dropped.
        let action = {
            match lsdb_get_mut(
                &mut instance.state.lsdb,
                &mut arenas.areas,
                &mut arenas.interfaces,
                &lsdb_id,
            ) {
                Ok((lsdb_idx, lsdb)) => {
                    match lsdb.get_by_id(&arenas.lsa_entries, lse_id) {
                        Ok((lse_idx, lse)) => {
                            if lsa_rxmt_count(&arenas.neighbors, &lse.data)
                                > 0
                            {
                                // Still pending acknowledgment; the next
                                // sweep will retry.
                                Action::Keep
                            } else {
                                let wrapped = lsdb
                                    .seqno_wrapping
                                    .remove(&lse.data.hdr.key());
                                Action::Remove(lsdb_idx, lse_idx, wrapped)
                            }
                        }
                        Err(_) => Action::Drop,
                    }
                }
                Err(_) => Action::Drop,
            }
        };

        match action {
            Action::Keep => (),
            Action::Drop => {
                instance.state.maxage_registry.remove(&(lsdb_id, lse_id));
            }
            Action::Remove(lsdb_idx, lse_idx, wrapped) => {
                instance.state.maxage_registry.remove(&(lsdb_id, lse_id));

                match wrapped {
                    // The LSA was flushed to wrap its sequence number:
                    // originate the recorded instance anew, now that the
                    // old one may be removed.
                    Some(lsa) => {
                        let lsa = Lsa::new(
                            0,
                            lsa.hdr.options,
                            lsa.hdr.lsa_id,
                            lsa.hdr.adv_rtr,
                            LSA_INIT_SEQ_NO,
                            lsa.body.clone(),
                        );
                        originate(instance, arenas, lsdb_idx, lsa);
                    }
                    None => {
                        let lse = &arenas.lsa_entries[lse_idx];
                        Debug::LsaMaxAgeRemove(&lse.data.hdr).log();

                        let (_, lsdb) = lsdb_index_mut(
                            &mut instance.state.lsdb,
                            &mut arenas.areas,
                            &mut arenas.interfaces,
                            lsdb_idx,
                        );
                        lsdb.delete(&mut arenas.lsa_entries, lse_idx);
                    }
                }
            }
        }
    }
}

// Refresh-queue granularity tick: re-originates every self-originated LSA
// whose slot was passed over.
pub(crate) fn refresh_tick(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
) {
    let now = instance.tx.timers.now();
    for (lsdb_id, lse_id) in instance.state.refresher.tick(now) {
        // Re-check the entry immediately before acting: the LSA might have
        // been flushed or superseded since it was enqueued.
        let refresh = {
            match lsdb_get_mut(
                &mut instance.state.lsdb,
                &mut arenas.areas,
                &mut arenas.interfaces,
                &lsdb_id,
            ) {
                Ok((lsdb_idx, lsdb)) => lsdb
                    .get_by_id(&arenas.lsa_entries, lse_id)
                    .ok()
                    .filter(|(_, lse)| {
                        lse.flags.contains(LsaEntryFlags::SELF_ORIGINATED)
                            && !lse.data.hdr.is_maxage()
                    })
                    .map(|(_, lse)| (lsdb_idx, lse.data.clone())),
                Err(_) => None,
            }
        };

        if let Some((lsdb_idx, data)) = refresh {
            Debug::LsaRefresh(&data.hdr).log();

            // Originate new instance of the LSA.
            let lsa = Lsa::new(
                0,
                data.hdr.options,
                data.hdr.lsa_id,
                data.hdr.adv_rtr,
                data.hdr.seq_no.wrapping_add(1),
                data.body.clone(),
            );
            originate(instance, arenas, lsdb_idx, lsa);
        }
    }
}

// Allocates a Link State ID for the given prefix, disambiguating colliding
// prefixes with the host-bits-set form of the address.
//
// Returns the all-ones sentinel when the ID space for this prefix is
// exhausted; callers must treat the sentinel as a hard failure to
// originate.
pub(crate) fn lsa_unique_id(
    lsa_entries: &Arena<LsaEntry>,
    lsdb: &crate::collections::Lsdb,
    lsa_type: LsaType,
    adv_rtr: Ipv4Addr,
    prefix: Ipv4Network,
) -> Ipv4Addr {
    let id = prefix.network();
    let lsa_key = LsaKey::new(lsa_type, adv_rtr, id);

    let Some((_, lse)) = lsdb.get(lsa_entries, &lsa_key) else {
        return id;
    };

    // An instance for the base address already exists. If it describes the
    // same network, the ID is simply being reused for a re-origination.
    let existing_mask = match &lse.data.body {
        LsaBody::AsExternal(body) | LsaBody::NssaExternal(body) => body.mask,
        _ => return Ipv4Addr::BROADCAST,
    };
    if existing_mask == prefix.mask() {
        return id;
    }

    // Different mask: fall back to the host-bits-set form of the address.
    let wildcard = Ipv4Addr::from(u32::from(id) | !u32::from(prefix.mask()));
    let lsa_key = LsaKey::new(lsa_type, adv_rtr, wildcard);
    if lsdb.get(lsa_entries, &lsa_key).is_some() {
        warn!(%prefix, "link state ID not available");
        return Ipv4Addr::BROADCAST;
    }

    wildcard
}

// Removes old instance of the given LSA from all neighbors' Link state
// retransmission lists.
fn rxmt_lists_remove(
    arenas: &mut InstanceArenas,
    lsdb_idx: LsdbIndex,
    lsa: &Arc<Lsa>,
) {
    for area_idx in arenas.areas.indexes().collect::<Vec<_>>() {
        let area = &arenas.areas[area_idx];

        // Filter by LSA area.
        match lsdb_idx {
            LsdbIndex::Link(lsdb_area_idx, _)
            | LsdbIndex::Area(lsdb_area_idx) => {
                if area_idx != lsdb_area_idx {
                    continue;
                }
            }
            _ => (),
        }

        for iface_idx in area.interfaces.indexes() {
            // Filter by LSA interface.
            if let LsdbIndex::Link(_, lsdb_iface_idx) = lsdb_idx
                && iface_idx != lsdb_iface_idx
            {
                continue;
            }

            let iface = &arenas.interfaces[iface_idx];

            // Iterate over all neighbors from this interface.
            for nbr_idx in iface.state.neighbors.indexes() {
                let nbr = &mut arenas.neighbors[nbr_idx];

                // Remove LSA from rxmt list as long as it's an older
                // version.
                if let std::collections::btree_map::Entry::Occupied(o) =
                    nbr.lists.ls_rxmt.entry(lsa.hdr.key())
                {
                    let old_lsa = o.get();
                    if lsa_compare(&old_lsa.hdr, &lsa.hdr) == Ordering::Less {
                        o.remove();
                        nbr.rxmt_lsupd_stop_check();
                    }
                }
            }
        }
    }
}

// Adds log entry for the newly installed LSA.
fn log_lsa(
    instance: &mut InstanceUpView<'_>,
    lsa: LsaLogId,
    rcvd_time: Option<Instant>,
    reason: LsaLogReason,
) {
    // Get next log ID.
    let log_id = &mut instance.state.lsa_log_next_id;
    *log_id += 1;

    // Add new log entry.
    let log_entry = LsaLogEntry::new(*log_id, lsa, rcvd_time, reason);
    instance.state.lsa_log.push_front(log_entry);

    // Remove old entries if necessary.
    instance.state.lsa_log.truncate(LSA_LOG_MAX_SIZE);
}
