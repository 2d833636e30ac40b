//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cmp::Ordering;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use ospfd_core::area::AreaType;
use ospfd_core::collections::{AreaId, InterfaceId, LsdbId, NeighborId};
use ospfd_core::instance::{Instance, Signal};
use ospfd_core::interface::{InterfaceType, ism};
use ospfd_core::lsdb::{
    LSA_INIT_SEQ_NO, LSA_MAX_AGE, LSA_MAX_SEQ_NO, lsa_compare,
    lsa_same_contents,
};
use ospfd_core::neighbor::nsm;
use ospfd_core::packet::lsa::*;
use ospfd_core::packet::*;

const RTR_SELF: &str = "1.1.1.1";
const RTR_PEER: &str = "2.2.2.2";
const AREA1: &str = "0.0.0.1";

fn addr(s: &str) -> Ipv4Addr {
    Ipv4Addr::from_str(s).unwrap()
}

//
// Test fixture: one normal area, one broadcast interface, one fully
// adjacent neighbor.
//

struct Fixture {
    instance: Instance,
    now: Instant,
    area_id: AreaId,
    iface_id: InterfaceId,
    nbr_id: NeighborId,
}

impl Fixture {
    fn new() -> Fixture {
        let now = Instant::now();
        let mut instance = Instance::new(addr(RTR_SELF), now);

        let area_id = instance.area_add(addr(AREA1), AreaType::Normal);
        let iface_id = instance.interface_add(area_id, "eth-rt2").unwrap();
        let iface = instance.interface_mut(area_id, iface_id).unwrap();
        iface.config.if_type = InterfaceType::Broadcast;
        iface.system.ifindex = Some(1);
        iface.system.mtu = Some(1500);
        iface.state.ism_state = ism::State::DrOther;
        iface.state.src_addr = Some(addr("10.0.1.1"));

        let nbr_id = instance
            .neighbor_add(area_id, iface_id, addr(RTR_PEER), addr("10.0.1.2"))
            .unwrap();
        instance
            .neighbor_set_state(area_id, iface_id, nbr_id, nsm::State::Full)
            .unwrap();

        Fixture {
            instance,
            now,
            area_id,
            iface_id,
            nbr_id,
        }
    }

    fn advance(&mut self, duration: Duration) {
        self.now += duration;
        self.instance.process_timers(self.now);
    }

    fn deliver(&mut self, data: Bytes) {
        self.instance
            .process_packet(self.area_id, self.iface_id, addr("10.0.1.2"), data)
            .unwrap();
    }

    fn drain_packets(&mut self) -> Vec<Packet> {
        std::iter::from_fn(|| self.instance.pop_tx_packet())
            .map(|msg| msg.packet)
            .collect()
    }

    fn drain_signals(&mut self) -> Vec<Signal> {
        std::iter::from_fn(|| self.instance.pop_signal()).collect()
    }

    fn area_lsdb(&self) -> LsdbId {
        LsdbId::Area(self.area_id)
    }

    fn lsa_get(&self, lsa_key: &LsaKey) -> Option<std::sync::Arc<Lsa>> {
        self.instance.lsa_get(self.area_lsdb(), lsa_key).unwrap()
    }
}

fn router_lsa_body(metric: u16) -> LsaBody {
    LsaBody::Router(LsaRouter {
        flags: LsaRouterFlags::empty(),
        links: vec![LsaRouterLink {
            link_type: LsaRouterLinkType::StubNetwork,
            link_id: addr("10.0.1.0"),
            link_data: addr("255.255.255.0"),
            metric,
        }],
    })
}

fn router_lsa(adv_rtr: &str, seq_no: u32, metric: u16) -> Lsa {
    Lsa::new(
        1,
        Options::E,
        addr(adv_rtr),
        addr(adv_rtr),
        seq_no,
        router_lsa_body(metric),
    )
}

fn lsupd(lsas: Vec<Lsa>) -> Bytes {
    let hdr = PacketHdr {
        pkt_type: PacketType::LsUpdate,
        router_id: addr(RTR_PEER),
        area_id: addr(AREA1),
        auth_seqno: None,
    };
    Packet::LsUpdate(LsUpdate { hdr, lsas }).encode(None)
}

fn lsack(lsa_hdrs: Vec<LsaHdr>) -> Bytes {
    let hdr = PacketHdr {
        pkt_type: PacketType::LsAck,
        router_id: addr(RTR_PEER),
        area_id: addr(AREA1),
        auth_seqno: None,
    };
    Packet::LsAck(LsAck { hdr, lsa_hdrs }).encode(None)
}

fn dbdesc(dd_flags: DbDescFlags, dd_seq_no: u32) -> Bytes {
    let hdr = PacketHdr {
        pkt_type: PacketType::DbDesc,
        router_id: addr(RTR_PEER),
        area_id: addr(AREA1),
        auth_seqno: None,
    };
    Packet::DbDesc(DbDesc {
        hdr,
        mtu: 1500,
        options: Options::E | Options::O,
        dd_flags,
        dd_seq_no,
        lsa_hdrs: vec![],
    })
    .encode(None)
}

//
// Recency comparison (RFC 2328, section 13.1).
//

#[test]
fn test_lsa_compare_ordering() {
    let hdr = |seq_no: u32, cksum: u16, age: u16| LsaHdr {
        age,
        options: Options::E,
        lsa_type: LsaTypeCode::Router.into(),
        lsa_id: addr(RTR_PEER),
        adv_rtr: addr(RTR_PEER),
        seq_no,
        cksum,
        length: 36,
    };

    // Transitivity across the comparison stages.
    let a = hdr(0x80000003, 0x1000, 1);
    let b = hdr(0x80000002, 0x2000, 1);
    let c = hdr(0x80000002, 0x1000, 1);
    assert_eq!(lsa_compare(&a, &b), Ordering::Greater);
    assert_eq!(lsa_compare(&b, &c), Ordering::Greater);
    assert_eq!(lsa_compare(&a, &c), Ordering::Greater);

    // Sequence numbers compare through the signed space: InitialSequenceNumber
    // is more recent than MaxSequenceNumber plus one (the reserved value).
    let init = hdr(LSA_INIT_SEQ_NO, 0x1000, 1);
    let max = hdr(LSA_MAX_SEQ_NO, 0x1000, 1);
    assert_eq!(lsa_compare(&max, &init), Ordering::Greater);

    // A MaxAge instance is more recent than an otherwise identical one.
    let maxage = hdr(0x80000002, 0x1000, LSA_MAX_AGE);
    assert_eq!(lsa_compare(&maxage, &c), Ordering::Greater);
    assert_eq!(lsa_compare(&c, &maxage), Ordering::Less);

    // Ages differing by more than MaxAgeDiff: the younger copy wins.
    let young = hdr(0x80000002, 0x1000, 1);
    let old = hdr(0x80000002, 0x1000, 1000);
    assert_eq!(lsa_compare(&young, &old), Ordering::Greater);

    // Ages within the tolerance window are identical instances.
    let close = hdr(0x80000002, 0x1000, 300);
    assert_eq!(lsa_compare(&old, &close), Ordering::Equal);
}

#[test]
fn test_lsa_same_contents() {
    let lsa = router_lsa(RTR_PEER, 0x80000002, 10);
    assert!(lsa_same_contents(&lsa, &lsa));

    // A new sequence number alone does not count as a difference.
    let refreshed = router_lsa(RTR_PEER, 0x80000003, 10);
    assert!(lsa_same_contents(&lsa, &refreshed));

    // A body change does.
    let changed = router_lsa(RTR_PEER, 0x80000003, 20);
    assert!(!lsa_same_contents(&lsa, &changed));
}

//
// Flooding procedure (RFC 2328, section 13).
//

#[test]
fn test_install_and_delayed_ack() {
    let mut fx = Fixture::new();

    let lsa = router_lsa(RTR_PEER, 0x80000002, 10);
    let lsa_key = lsa.hdr.key();
    fx.deliver(lsupd(vec![lsa]));

    // The LSA was installed.
    let installed = fx.lsa_get(&lsa_key).unwrap();
    assert_eq!(installed.hdr.seq_no, 0x80000002);
    assert_eq!(fx.instance.state.rx_lsa_count, 1);

    // The acknowledgment is delayed, not sent inline.
    assert!(fx.drain_packets().is_empty());
    fx.advance(Duration::from_secs(2));
    let packets = fx.drain_packets();
    assert!(packets.iter().any(|packet| matches!(
        packet,
        Packet::LsAck(ack) if ack.lsa_hdrs.iter().any(|hdr| hdr.key() == lsa_key)
    )));
}

#[test]
fn test_flood_idempotence() {
    let mut fx = Fixture::new();

    let lsa = router_lsa(RTR_PEER, 0x80000002, 10);
    let lsa_key = lsa.hdr.key();
    fx.deliver(lsupd(vec![lsa.clone()]));
    assert_eq!(fx.instance.state.rx_lsa_count, 1);
    fx.advance(Duration::from_secs(2));
    fx.drain_packets();

    // Re-delivering the identical instance results only in a direct ack:
    // no second install, no flood.
    fx.deliver(lsupd(vec![lsa]));
    assert_eq!(fx.instance.state.rx_lsa_count, 1);
    let packets = fx.drain_packets();
    assert_eq!(packets.len(), 1);
    assert!(matches!(
        &packets[0],
        Packet::LsAck(ack) if ack.lsa_hdrs.len() == 1
            && ack.lsa_hdrs[0].key() == lsa_key
    ));
}

#[test]
fn test_stale_copy_sent_back() {
    let mut fx = Fixture::new();

    fx.deliver(lsupd(vec![router_lsa(RTR_PEER, 0x80000002, 10)]));
    fx.advance(Duration::from_secs(2));
    fx.drain_packets();

    // An older instance arriving from the neighbor is answered with our
    // newer database copy, sent directly (not flooded).
    fx.deliver(lsupd(vec![router_lsa(RTR_PEER, 0x80000001, 10)]));
    let packets = fx.drain_packets();
    assert_eq!(packets.len(), 1);
    assert!(matches!(
        &packets[0],
        Packet::LsUpdate(lsupd) if lsupd.lsas.len() == 1
            && lsupd.lsas[0].hdr.seq_no == 0x80000002
    ));
}

#[test]
fn test_maxage_ghost_ack_and_discard() {
    let mut fx = Fixture::new();

    // A MaxAge LSA with no database copy, while no neighbor is in Exchange
    // or Loading, is acknowledged and discarded without being installed.
    let lsa = Lsa::new(
        LSA_MAX_AGE,
        Options::E,
        addr(RTR_PEER),
        addr(RTR_PEER),
        0x80000002,
        router_lsa_body(10),
    );
    let lsa_key = lsa.hdr.key();
    fx.deliver(lsupd(vec![lsa]));

    assert!(fx.lsa_get(&lsa_key).is_none());
    let packets = fx.drain_packets();
    assert_eq!(packets.len(), 1);
    assert!(matches!(
        &packets[0],
        Packet::LsAck(ack) if ack.lsa_hdrs[0].key() == lsa_key
    ));
}

#[test]
fn test_bad_ls_request_resets_exchange() {
    let mut fx = Fixture::new();

    // Install a recent copy.
    fx.deliver(lsupd(vec![router_lsa(RTR_PEER, 0x80000002, 10)]));
    fx.advance(Duration::from_secs(2));
    fx.drain_packets();
    fx.drain_signals();

    // Pretend the neighbor is mid-loading with this LSA on its request
    // list.
    let lsa_key = router_lsa(RTR_PEER, 0x80000002, 10).hdr.key();
    let request_hdr = fx.lsa_get(&lsa_key).unwrap().hdr;
    {
        let nbr = fx
            .instance
            .neighbor_mut(fx.area_id, fx.iface_id, fx.nbr_id)
            .unwrap();
        nbr.state = nsm::State::Loading;
        nbr.lists.ls_request.insert(lsa_key, request_hdr);
    }

    // An LSA on the request list arriving older than the database copy is
    // a database exchange error: the adjacency restarts at ExStart.
    fx.deliver(lsupd(vec![router_lsa(RTR_PEER, 0x80000001, 10)]));
    assert_eq!(
        fx.instance
            .get_neighbor_state(fx.area_id, fx.iface_id, fx.nbr_id)
            .unwrap(),
        nsm::State::ExStart
    );
    assert!(fx.drain_signals().iter().any(|signal| matches!(
        signal,
        Signal::NsmTransition {
            event: nsm::Event::BadLsReq,
            state: nsm::State::ExStart,
            ..
        }
    )));
}

//
// Origination, retransmission, and MaxAge lifecycle.
//

#[test]
fn test_originate_flood_and_retransmit() {
    let mut fx = Fixture::new();

    fx.instance
        .lsa_originate(
            fx.area_lsdb(),
            Options::E,
            addr(RTR_SELF),
            router_lsa_body(10),
        )
        .unwrap();

    let lsa_key = LsaKey::new(
        LsaTypeCode::Router.into(),
        addr(RTR_SELF),
        addr(RTR_SELF),
    );
    let installed = fx.lsa_get(&lsa_key).unwrap();
    assert_eq!(installed.hdr.seq_no, LSA_INIT_SEQ_NO);

    // The LSA sits on the neighbor's retransmission list until
    // acknowledged.
    assert_eq!(
        fx.instance
            .lsa_retransmit_count(fx.area_lsdb(), &lsa_key)
            .unwrap(),
        1
    );

    // Initial transmission.
    fx.advance(Duration::from_secs(1));
    let count_lsupd = |packets: &[Packet]| {
        packets
            .iter()
            .filter(|packet| matches!(packet, Packet::LsUpdate(..)))
            .count()
    };
    assert_eq!(count_lsupd(&fx.drain_packets()), 1);

    // Unacknowledged LSAs are retransmitted every RxmtInterval.
    fx.advance(Duration::from_secs(5));
    assert_eq!(count_lsupd(&fx.drain_packets()), 1);

    // An explicit ack clears the retransmission list.
    fx.deliver(lsack(vec![installed.hdr]));
    assert_eq!(
        fx.instance
            .lsa_retransmit_count(fx.area_lsdb(), &lsa_key)
            .unwrap(),
        0
    );
    fx.advance(Duration::from_secs(10));
    assert_eq!(count_lsupd(&fx.drain_packets()), 0);
}

#[test]
fn test_maxage_sweep_safety() {
    let mut fx = Fixture::new();

    fx.instance
        .lsa_originate(
            fx.area_lsdb(),
            Options::E,
            addr(RTR_SELF),
            router_lsa_body(10),
        )
        .unwrap();
    let lsa_key = LsaKey::new(
        LsaTypeCode::Router.into(),
        addr(RTR_SELF),
        addr(RTR_SELF),
    );

    // Flush the LSA: it's prematurely aged, reflooded, and parked pending
    // acknowledgment.
    fx.instance.lsa_flush(fx.area_lsdb(), &lsa_key).unwrap();
    let flushed = fx.lsa_get(&lsa_key).unwrap();
    assert_eq!(flushed.hdr.age, LSA_MAX_AGE);
    assert_eq!(
        fx.instance
            .lsa_retransmit_count(fx.area_lsdb(), &lsa_key)
            .unwrap(),
        1
    );

    // The sweep must not remove the LSA while a retransmission is pending.
    fx.advance(Duration::from_secs(6));
    assert!(fx.lsa_get(&lsa_key).is_some());

    // Acknowledge, but hold a neighbor in Exchange: still not removable.
    fx.deliver(lsack(vec![flushed.hdr]));
    fx.instance
        .neighbor_set_state(fx.area_id, fx.iface_id, fx.nbr_id, nsm::State::Exchange)
        .unwrap();
    fx.advance(Duration::from_secs(5));
    assert!(fx.lsa_get(&lsa_key).is_some());

    // Once the neighbor is Full again the next sweep removes it.
    fx.instance
        .neighbor_set_state(fx.area_id, fx.iface_id, fx.nbr_id, nsm::State::Full)
        .unwrap();
    fx.advance(Duration::from_secs(5));
    assert!(fx.lsa_get(&lsa_key).is_none());
}

#[test]
fn test_seqno_wraparound() {
    let mut fx = Fixture::new();

    // Receive our own router-LSA at MaxSequenceNumber, as if it survived in
    // the network from a previous incarnation.
    fx.deliver(lsupd(vec![router_lsa(RTR_SELF, LSA_MAX_SEQ_NO, 10)]));
    assert!(fx.drain_signals().iter().any(|signal| matches!(
        signal,
        Signal::SelfOriginatedLsaRcvd { .. }
    )));

    let lsa_key = LsaKey::new(
        LsaTypeCode::Router.into(),
        addr(RTR_SELF),
        addr(RTR_SELF),
    );

    // Re-originating must not install a fresh InitialSequenceNumber
    // instance directly: the current instance is prematurely aged first.
    fx.instance
        .lsa_originate(
            fx.area_lsdb(),
            Options::E,
            addr(RTR_SELF),
            router_lsa_body(10),
        )
        .unwrap();
    let aged = fx.lsa_get(&lsa_key).unwrap();
    assert_eq!(aged.hdr.age, LSA_MAX_AGE);
    assert_eq!(aged.hdr.seq_no, LSA_MAX_SEQ_NO);

    // The flush is flooded.
    assert_eq!(
        fx.instance
            .lsa_retransmit_count(fx.area_lsdb(), &lsa_key)
            .unwrap(),
        1
    );
    fx.advance(Duration::from_secs(1));
    assert!(fx.drain_packets().iter().any(|packet| matches!(
        packet,
        Packet::LsUpdate(lsupd) if lsupd.lsas[0].hdr.age == LSA_MAX_AGE
    )));

    // Only after the flush is acknowledged and the MaxAge instance removed
    // may the new instance be originated, at InitialSequenceNumber.
    fx.deliver(lsack(vec![aged.hdr]));
    fx.advance(Duration::from_secs(10));
    let reborn = fx.lsa_get(&lsa_key).unwrap();
    assert_eq!(reborn.hdr.seq_no, LSA_INIT_SEQ_NO);
    assert_ne!(reborn.hdr.age, LSA_MAX_AGE);
}

//
// Database exchange sequencing.
//

#[test]
fn test_dbdesc_negotiation_slave() {
    let mut fx = Fixture::new();

    // The external NSM decided to form an adjacency.
    fx.instance
        .neighbor_set_state(fx.area_id, fx.iface_id, fx.nbr_id, nsm::State::Down)
        .unwrap();
    fx.instance
        .neighbor_exchange_start(fx.area_id, fx.iface_id, fx.nbr_id)
        .unwrap();
    let packets = fx.drain_packets();
    assert!(matches!(
        &packets[0],
        Packet::DbDesc(dd) if dd.dd_flags
            == DbDescFlags::I | DbDescFlags::M | DbDescFlags::MS
    ));

    // The peer has the higher Router ID: we become slave and echo its DD
    // sequence number.
    fx.deliver(dbdesc(
        DbDescFlags::I | DbDescFlags::M | DbDescFlags::MS,
        999,
    ));
    assert_eq!(
        fx.instance
            .get_neighbor_state(fx.area_id, fx.iface_id, fx.nbr_id)
            .unwrap(),
        nsm::State::Exchange
    );
    let packets = fx.drain_packets();
    assert!(matches!(
        &packets[0],
        Packet::DbDesc(dd) if !dd.dd_flags.contains(DbDescFlags::MS)
            && dd.dd_seq_no == 999
    ));

    // Master's final packet (M clear) completes the exchange; with nothing
    // to request, the adjacency goes Full.
    fx.deliver(dbdesc(DbDescFlags::MS, 1000));
    assert_eq!(
        fx.instance
            .get_neighbor_state(fx.area_id, fx.iface_id, fx.nbr_id)
            .unwrap(),
        nsm::State::Full
    );
}

//
// Link State ID allocation.
//

#[test]
fn test_lsa_unique_id_sentinel() {
    let mut fx = Fixture::new();
    let lsa_type: LsaType = LsaTypeCode::AsExternal.into();
    let external = |mask: &str| {
        LsaBody::AsExternal(LsaExternal {
            mask: addr(mask),
            flags: LsaExternalFlags::E,
            metric: 10,
            fwd_addr: None,
            tag: 0,
        })
    };

    // First prefix takes the base address.
    let prefix24 = ipnetwork::Ipv4Network::from_str("10.0.0.0/24").unwrap();
    let id = fx
        .instance
        .lsa_unique_id(LsdbId::As, lsa_type, prefix24)
        .unwrap();
    assert_eq!(id, addr("10.0.0.0"));
    fx.instance
        .lsa_originate(LsdbId::As, Options::E, id, external("255.255.255.0"))
        .unwrap();

    // A colliding, less specific prefix falls back to the host-bits-set
    // form.
    let prefix16 = ipnetwork::Ipv4Network::from_str("10.0.0.0/16").unwrap();
    let id = fx
        .instance
        .lsa_unique_id(LsdbId::As, lsa_type, prefix16)
        .unwrap();
    assert_eq!(id, addr("10.0.255.255"));
    fx.instance
        .lsa_originate(LsdbId::As, Options::E, id, external("255.255.0.0"))
        .unwrap();

    // With both forms taken, the ID space for this prefix is exhausted: the
    // all-ones sentinel tells the caller to abort the origination.
    let id = fx
        .instance
        .lsa_unique_id(LsdbId::As, lsa_type, prefix16)
        .unwrap();
    assert_eq!(id, Ipv4Addr::BROADCAST);
}
