//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use enum_as_inner::EnumAsInner;
use generational_arena::Index;
use serde::{Deserialize, Serialize};

use crate::area::Area;
use crate::error::Error;
use crate::interface::Interface;
use crate::lsdb::{LSA_MAX_AGE, LsaDelayedOrig, LsaEntry};
use crate::neighbor::{Neighbor, NeighborNetId};
use crate::packet::lsa::{Lsa, LsaKey, LsaType};
use crate::tasks::{TimerKind, TimerQueue};

pub type ObjectId = u32;

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub enum ObjectKey<T> {
    Id(ObjectId),
    Value(T),
}

pub type AreaId = ObjectId;
pub type AreaIndex = Index;
pub type AreaKey = ObjectKey<Ipv4Addr>;
pub type InterfaceId = ObjectId;
pub type InterfaceIndex = Index;
pub type InterfaceKey = ObjectKey<String>;
pub type NeighborId = ObjectId;
pub type NeighborIndex = Index;
pub type NeighborKey = ObjectKey<Ipv4Addr>;
pub type LsaEntryId = ObjectId;
pub type LsaEntryIndex = Index;
pub type LsaEntryKey = ObjectKey<LsaKey>;

#[derive(Debug)]
pub struct Arena<T>(generational_arena::Arena<T>);

#[derive(Debug, Default)]
pub struct Areas {
    arena: Arena<Area>,
    id_tree: HashMap<AreaId, AreaIndex>,
    area_id_tree: BTreeMap<Ipv4Addr, AreaIndex>,
    next_id: AreaId,
}

#[derive(Debug, Default)]
pub struct Interfaces {
    id_tree: HashMap<InterfaceId, InterfaceIndex>,
    name_tree: BTreeMap<String, InterfaceIndex>,
    next_id: InterfaceId,
}

#[derive(Debug, Default)]
pub struct Neighbors {
    id_tree: HashMap<NeighborId, NeighborIndex>,
    router_id_tree: BTreeMap<Ipv4Addr, NeighborIndex>,
    net_id_tree: BTreeMap<NeighborNetId, NeighborIndex>,
    next_id: NeighborId,
}

#[derive(Debug, Default)]
pub struct Lsdb {
    id_tree: HashMap<LsaEntryId, LsaEntryIndex>,
    tree: BTreeMap<LsaType, LsdbSingleType>,
    // List of LSAs whose origination was delayed due to the MinLSInterval
    // check.
    pub delayed_orig: HashMap<LsaKey, LsaDelayedOrig>,
    // List of LSAs whose sequence number is wrapping.
    pub seqno_wrapping: HashMap<LsaKey, Lsa>,
    next_id: LsaEntryId,
    lsa_count: u32,
    cksum_sum: u32,
}

#[derive(Debug)]
pub struct LsdbSingleType {
    lsa_type: LsaType,
    tree: BTreeMap<LsaKey, LsaEntryIndex>,
    lsa_count: u32,
    cksum_sum: u32,
}

// LSDB ID.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum LsdbId {
    Link(AreaId, InterfaceId),
    Area(AreaId),
    As,
}

// LSDB Index.
#[derive(Clone, Copy, Debug, EnumAsInner, Eq, PartialEq)]
pub enum LsdbIndex {
    Link(AreaIndex, InterfaceIndex),
    Area(AreaIndex),
    As,
}

// ===== impl ObjectKey =====

impl<T> From<ObjectId> for ObjectKey<T> {
    fn from(id: ObjectId) -> ObjectKey<T> {
        ObjectKey::Id(id)
    }
}

// ===== impl Arena =====

impl<T> Arena<T> {
    pub fn get(&self, index: Index) -> Option<&T> {
        self.0.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Index, &T)> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Index, &mut T)> {
        self.0.iter_mut()
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Arena<T> {
        Arena(Default::default())
    }
}

impl<T> std::ops::Index<Index> for Arena<T> {
    type Output = T;

    fn index(&self, index: Index) -> &Self::Output {
        &self.0[index]
    }
}

impl<T> std::ops::IndexMut<Index> for Arena<T> {
    fn index_mut(&mut self, index: Index) -> &mut Self::Output {
        &mut self.0[index]
    }
}

// ===== impl Areas =====

impl Areas {
    pub(crate) fn insert(&mut self, area_id: Ipv4Addr) -> (AreaIndex, &mut Area) {
        // Create and insert area into the arena.
        self.next_id += 1;
        let area = Area::new(self.next_id, area_id);
        let area_idx = self.arena.0.insert(area);

        // Link area to different collections.
        let area = &mut self.arena[area_idx];
        self.id_tree.insert(area.id, area_idx);
        if self.area_id_tree.insert(area.area_id, area_idx).is_some() {
            panic!("area area-id={} already exists", area.area_id);
        }

        (area_idx, area)
    }

    // Returns a reference to the area corresponding to the given ID.
    pub fn get_by_id(
        &self,
        id: AreaId,
    ) -> Result<(AreaIndex, &Area), Error> {
        self.id_tree
            .get(&id)
            .copied()
            .map(|area_idx| (area_idx, &self.arena[area_idx]))
            .ok_or(Error::AreaIdNotFound(id))
    }

    // Returns a mutable reference to the area corresponding to the given ID.
    pub fn get_mut_by_id(
        &mut self,
        id: AreaId,
    ) -> Result<(AreaIndex, &mut Area), Error> {
        self.id_tree
            .get(&id)
            .copied()
            .map(move |area_idx| (area_idx, &mut self.arena[area_idx]))
            .ok_or(Error::AreaIdNotFound(id))
    }

    // Returns a reference to the area corresponding to the given area ID.
    pub fn get_by_area_id(
        &self,
        area_id: Ipv4Addr,
    ) -> Option<(AreaIndex, &Area)> {
        self.area_id_tree
            .get(&area_id)
            .copied()
            .map(|area_idx| (area_idx, &self.arena[area_idx]))
    }

    // Returns an iterator visiting all areas.
    //
    // Areas are ordered by their area IDs.
    pub fn iter(&self) -> impl Iterator<Item = &Area> {
        self.area_id_tree
            .values()
            .map(|area_idx| &self.arena[*area_idx])
    }

    // Returns an iterator over all area indexes.
    //
    // Areas are ordered by their area IDs.
    pub fn indexes(&self) -> impl Iterator<Item = AreaIndex> + '_ {
        self.area_id_tree.values().copied()
    }
}

impl std::ops::Index<AreaIndex> for Areas {
    type Output = Area;

    fn index(&self, index: AreaIndex) -> &Self::Output {
        &self.arena[index]
    }
}

impl std::ops::IndexMut<AreaIndex> for Areas {
    fn index_mut(&mut self, index: AreaIndex) -> &mut Self::Output {
        &mut self.arena[index]
    }
}

// ===== impl Interfaces =====

impl Interfaces {
    pub(crate) fn insert<'a>(
        &mut self,
        arena: &'a mut Arena<Interface>,
        ifname: &str,
    ) -> (InterfaceIndex, &'a mut Interface) {
        // Create and insert interface into the arena.
        self.next_id += 1;
        let iface = Interface::new(self.next_id, ifname.to_owned());
        let iface_idx = arena.0.insert(iface);

        // Link interface to different collections.
        let iface = &mut arena[iface_idx];
        self.id_tree.insert(iface.id, iface_idx);
        if self.name_tree.insert(iface.name.clone(), iface_idx).is_some() {
            panic!("interface name={} already exists", iface.name);
        }

        (iface_idx, iface)
    }

    // Returns a reference to the interface corresponding to the given ID.
    pub fn get_by_id<'a>(
        &self,
        arena: &'a Arena<Interface>,
        id: InterfaceId,
    ) -> Result<(InterfaceIndex, &'a Interface), Error> {
        self.id_tree
            .get(&id)
            .copied()
            .map(|iface_idx| (iface_idx, &arena[iface_idx]))
            .ok_or(Error::InterfaceIdNotFound(id))
    }

    // Returns a mutable reference to the interface corresponding to the
    // given ID.
    pub fn get_mut_by_id<'a>(
        &mut self,
        arena: &'a mut Arena<Interface>,
        id: InterfaceId,
    ) -> Result<(InterfaceIndex, &'a mut Interface), Error> {
        self.id_tree
            .get(&id)
            .copied()
            .map(move |iface_idx| (iface_idx, &mut arena[iface_idx]))
            .ok_or(Error::InterfaceIdNotFound(id))
    }

    // Returns a reference to the interface corresponding to the given name.
    pub fn get_by_name<'a>(
        &self,
        arena: &'a Arena<Interface>,
        ifname: &str,
    ) -> Option<(InterfaceIndex, &'a Interface)> {
        self.name_tree
            .get(ifname)
            .copied()
            .map(|iface_idx| (iface_idx, &arena[iface_idx]))
    }

    // Returns an iterator over all interface indexes.
    //
    // Interfaces are ordered by their names.
    pub fn indexes(&self) -> impl Iterator<Item = InterfaceIndex> + '_ {
        self.name_tree.values().copied()
    }
}

// ===== impl Neighbors =====

impl Neighbors {
    pub(crate) fn insert<'a>(
        &mut self,
        arena: &'a mut Arena<Neighbor>,
        router_id: Ipv4Addr,
        src: Ipv4Addr,
    ) -> (NeighborIndex, &'a mut Neighbor) {
        // Create and insert neighbor into the arena.
        self.next_id += 1;
        let nbr = Neighbor::new(self.next_id, router_id, src);
        let nbr_idx = arena.0.insert(nbr);

        // Link neighbor to different collections.
        let nbr = &mut arena[nbr_idx];
        self.id_tree.insert(nbr.id, nbr_idx);
        self.router_id_tree.insert(nbr.router_id, nbr_idx);
        self.net_id_tree.insert(nbr.network_id(), nbr_idx);

        (nbr_idx, nbr)
    }

    pub(crate) fn delete(
        &mut self,
        arena: &mut Arena<Neighbor>,
        nbr_idx: NeighborIndex,
    ) {
        let nbr = &mut arena[nbr_idx];

        // Unlink neighbor from different collections.
        self.id_tree.remove(&nbr.id);
        self.router_id_tree.remove(&nbr.router_id);
        self.net_id_tree.remove(&nbr.network_id());

        // Remove neighbor from the arena.
        arena.0.remove(nbr_idx);
    }

    // Returns a reference to the neighbor corresponding to the given ID.
    pub fn get_by_id<'a>(
        &self,
        arena: &'a Arena<Neighbor>,
        id: NeighborId,
    ) -> Result<(NeighborIndex, &'a Neighbor), Error> {
        self.id_tree
            .get(&id)
            .copied()
            .map(|nbr_idx| (nbr_idx, &arena[nbr_idx]))
            .ok_or(Error::NeighborIdNotFound(id))
    }

    // Returns a mutable reference to the neighbor corresponding to the given
    // ID.
    pub fn get_mut_by_id<'a>(
        &mut self,
        arena: &'a mut Arena<Neighbor>,
        id: NeighborId,
    ) -> Result<(NeighborIndex, &'a mut Neighbor), Error> {
        self.id_tree
            .get(&id)
            .copied()
            .map(move |nbr_idx| (nbr_idx, &mut arena[nbr_idx]))
            .ok_or(Error::NeighborIdNotFound(id))
    }

    // Returns a reference to the neighbor corresponding to the given Router
    // ID.
    pub fn get_by_router_id<'a>(
        &self,
        arena: &'a Arena<Neighbor>,
        router_id: Ipv4Addr,
    ) -> Option<(NeighborIndex, &'a Neighbor)> {
        self.router_id_tree
            .get(&router_id)
            .copied()
            .map(|nbr_idx| (nbr_idx, &arena[nbr_idx]))
    }

    // Returns an iterator visiting all neighbors.
    //
    // Neighbors are ordered by their Router IDs.
    pub(crate) fn iter<'a>(
        &'a self,
        arena: &'a Arena<Neighbor>,
    ) -> impl Iterator<Item = &'a Neighbor> + 'a {
        self.router_id_tree
            .values()
            .map(move |nbr_idx| &arena[*nbr_idx])
    }

    // Returns an iterator over all neighbor indexes.
    //
    // Neighbors are ordered by their Router IDs.
    pub fn indexes(&self) -> impl Iterator<Item = NeighborIndex> + '_ {
        self.router_id_tree.values().copied()
    }
}

// ===== impl Lsdb =====

impl Lsdb {
    pub(crate) fn insert<'a>(
        &mut self,
        arena: &'a mut Arena<LsaEntry>,
        lsdb_id: LsdbId,
        data: Arc<Lsa>,
        timers: &mut TimerQueue,
    ) -> (LsaEntryIndex, &'a mut LsaEntry) {
        let lsa_type = data.hdr.lsa_type;
        let lsa_key = data.hdr.key();
        let cksum = data.hdr.cksum;

        // Create and insert LSA entry into the arena.
        self.next_id += 1;
        let lse = LsaEntry::new(self.next_id, data);
        let lse_idx = arena.0.insert(lse);

        // Schedule the entry's expiry, unless it's already at MaxAge.
        let lse = &mut arena[lse_idx];
        if !lse.data.hdr.is_maxage() {
            let timeout =
                Duration::from_secs((LSA_MAX_AGE - lse.data.age()).into());
            timers.schedule(
                timeout,
                TimerKind::LsaExpiry {
                    lsdb_id,
                    lse_id: lse.id,
                },
            );
        }

        // Link LSA entry to different collections.
        self.id_tree.insert(lse.id, lse_idx);
        let single_type = self
            .tree
            .entry(lsa_type)
            .or_insert_with(|| LsdbSingleType::new(lsa_type));
        single_type.tree.insert(lsa_key, lse_idx);

        // Update statistics.
        single_type.lsa_count += 1;
        single_type.cksum_sum = single_type.cksum_sum.wrapping_add(cksum as u32);
        self.lsa_count += 1;
        self.cksum_sum = self.cksum_sum.wrapping_add(cksum as u32);

        (lse_idx, lse)
    }

    pub(crate) fn delete(
        &mut self,
        arena: &mut Arena<LsaEntry>,
        lse_idx: LsaEntryIndex,
    ) {
        let lse = &arena[lse_idx];
        let lsa_type = lse.data.hdr.lsa_type;
        let lsa_key = lse.data.hdr.key();
        let cksum = lse.data.hdr.cksum;

        // Unlink LSA entry from different collections.
        self.id_tree.remove(&lse.id);
        if let Some(single_type) = self.tree.get_mut(&lsa_type) {
            single_type.tree.remove(&lsa_key);
            single_type.lsa_count -= 1;
            single_type.cksum_sum =
                single_type.cksum_sum.wrapping_sub(cksum as u32);
        }

        // Update statistics.
        self.lsa_count -= 1;
        self.cksum_sum = self.cksum_sum.wrapping_sub(cksum as u32);

        // Remove pending state associated to the LSA.
        self.delayed_orig.remove(&lsa_key);

        // Remove LSA entry from the arena.
        arena.0.remove(lse_idx);
    }

    // Returns a reference to the LSA entry corresponding to the given LSA
    // key.
    pub(crate) fn get<'a>(
        &self,
        arena: &'a Arena<LsaEntry>,
        lsa_key: &LsaKey,
    ) -> Option<(LsaEntryIndex, &'a LsaEntry)> {
        self.tree
            .get(&lsa_key.lsa_type)
            .and_then(|single_type| single_type.tree.get(lsa_key))
            .copied()
            .map(|lse_idx| (lse_idx, &arena[lse_idx]))
    }

    // Returns a mutable reference to the LSA entry corresponding to the
    // given LSA key.
    pub fn get_mut<'a>(
        &mut self,
        arena: &'a mut Arena<LsaEntry>,
        lsa_key: &LsaKey,
    ) -> Option<(LsaEntryIndex, &'a mut LsaEntry)> {
        self.tree
            .get(&lsa_key.lsa_type)
            .and_then(|single_type| single_type.tree.get(lsa_key))
            .copied()
            .map(move |lse_idx| (lse_idx, &mut arena[lse_idx]))
    }

    // Returns a reference to the LSA entry corresponding to the given ID.
    pub fn get_by_id<'a>(
        &self,
        arena: &'a Arena<LsaEntry>,
        id: LsaEntryId,
    ) -> Result<(LsaEntryIndex, &'a LsaEntry), Error> {
        self.id_tree
            .get(&id)
            .copied()
            .map(|lse_idx| (lse_idx, &arena[lse_idx]))
            .ok_or(Error::LsaEntryIdNotFound(id))
    }

    // Returns an iterator visiting all LSA entries.
    //
    // Entries are ordered by their LSA types and keys.
    pub(crate) fn iter<'a>(
        &'a self,
        arena: &'a Arena<LsaEntry>,
    ) -> impl Iterator<Item = (LsaEntryIndex, &'a LsaEntry)> + 'a {
        self.tree.values().flat_map(move |single_type| {
            single_type
                .tree
                .values()
                .map(move |lse_idx| (*lse_idx, &arena[*lse_idx]))
        })
    }

    // Returns an iterator visiting all LSA entries of the given type.
    pub fn iter_by_type<'a>(
        &'a self,
        arena: &'a Arena<LsaEntry>,
        lsa_type: LsaType,
    ) -> impl Iterator<Item = (LsaEntryIndex, &'a LsaEntry)> + 'a {
        self.tree.get(&lsa_type).into_iter().flat_map(
            move |single_type| {
                single_type
                    .tree
                    .values()
                    .map(move |lse_idx| (*lse_idx, &arena[*lse_idx]))
            },
        )
    }

    pub fn lsa_count(&self) -> u32 {
        self.lsa_count
    }

    pub fn cksum_sum(&self) -> u32 {
        self.cksum_sum
    }
}

// ===== impl LsdbSingleType =====

impl LsdbSingleType {
    fn new(lsa_type: LsaType) -> Self {
        LsdbSingleType {
            lsa_type,
            tree: Default::default(),
            lsa_count: 0,
            cksum_sum: 0,
        }
    }

    pub fn lsa_type(&self) -> LsaType {
        self.lsa_type
    }
}

// ===== global functions =====

// Resolves an LSDB index to the corresponding LSDB ID and a mutable
// reference to the LSDB itself.
pub(crate) fn lsdb_index_mut<'a>(
    as_lsdb: &'a mut Lsdb,
    areas: &'a mut Areas,
    interfaces: &'a mut Arena<Interface>,
    lsdb_idx: LsdbIndex,
) -> (LsdbId, &'a mut Lsdb) {
    match lsdb_idx {
        LsdbIndex::Link(area_idx, iface_idx) => {
            let area = &areas[area_idx];
            let iface = &mut interfaces[iface_idx];
            (LsdbId::Link(area.id, iface.id), &mut iface.state.lsdb)
        }
        LsdbIndex::Area(area_idx) => {
            let area = &mut areas[area_idx];
            (LsdbId::Area(area.id), &mut area.state.lsdb)
        }
        LsdbIndex::As => (LsdbId::As, as_lsdb),
    }
}

// Resolves an LSDB index to the corresponding LSDB ID and a shared
// reference to the LSDB itself.
pub(crate) fn lsdb_index<'a>(
    as_lsdb: &'a Lsdb,
    areas: &'a Areas,
    interfaces: &'a Arena<Interface>,
    lsdb_idx: LsdbIndex,
) -> (LsdbId, &'a Lsdb) {
    match lsdb_idx {
        LsdbIndex::Link(area_idx, iface_idx) => {
            let area = &areas[area_idx];
            let iface = &interfaces[iface_idx];
            (LsdbId::Link(area.id, iface.id), &iface.state.lsdb)
        }
        LsdbIndex::Area(area_idx) => {
            let area = &areas[area_idx];
            (LsdbId::Area(area.id), &area.state.lsdb)
        }
        LsdbIndex::As => (LsdbId::As, as_lsdb),
    }
}

// Resolves an LSDB ID to the corresponding LSDB index and a mutable
// reference to the LSDB itself.
pub(crate) fn lsdb_get_mut<'a>(
    as_lsdb: &'a mut Lsdb,
    areas: &'a mut Areas,
    interfaces: &'a mut Arena<Interface>,
    lsdb_id: &LsdbId,
) -> Result<(LsdbIndex, &'a mut Lsdb), Error> {
    match lsdb_id {
        LsdbId::Link(area_id, iface_id) => {
            let (area_idx, area) = areas.get_by_id(*area_id)?;
            let (iface_idx, iface) =
                area.interfaces.get_mut_by_id(interfaces, *iface_id)?;
            Ok((
                LsdbIndex::Link(area_idx, iface_idx),
                &mut iface.state.lsdb,
            ))
        }
        LsdbId::Area(area_id) => {
            let (area_idx, area) = areas.get_mut_by_id(*area_id)?;
            Ok((LsdbIndex::Area(area_idx), &mut area.state.lsdb))
        }
        LsdbId::As => Ok((LsdbIndex::As, as_lsdb)),
    }
}
