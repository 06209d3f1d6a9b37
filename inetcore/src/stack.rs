//! The state of one IPv4 stack.
//!
//! A [`Stack`] owns every table of the layers: interfaces, routes, resolution records and
//! reassembly queues. It is driven by a single task, which makes locking unnecessary. Received
//! datagrams and frames are fed in through [`ip_input`] and [`arp_input`], the [`netisr`] module
//! provides the queues to do so from other threads. Time is passed in by the caller, timers fire
//! from [`poll_timers`].
//!
//! [`Stack`]: struct.Stack.html
//! [`ip_input`]: struct.Stack.html#method.ip_input
//! [`arp_input`]: struct.Stack.html#method.arp_input
//! [`netisr`]: ../netisr/index.html
//! [`poll_timers`]: struct.Stack.html#method.poll_timers
use std::collections::{BTreeMap, VecDeque};

use slab::Slab;

use crate::config::Config;
use crate::layer::{arp, ip, Error, Hooks, NoHooks, Result};
use crate::layer::ip::{Lookup, Reassembly, Route, RouteCache, RouteFlags, RouteId, Routes};
use crate::nic::{Flags as IfFlags, Frame, IfAddr, IfIndex, Interface};
use crate::stats::{DropReason, Stats};
use crate::storage::Buffer;
use crate::time::{Duration, Instant};
use crate::wire::{EthernetAddress, EthernetProtocol, IpProtocol, Ipv4Address, Ipv4Subnet};

/// Period of the slow timer that ages reassembly queues.
const SLOW_TICK: Duration = Duration::from_secs(1);

/// The IPv4 and ARP state of a host or router.
pub struct Stack<H = NoHooks> {
    pub(crate) config: Config,
    pub(crate) stats: Stats,
    pub(crate) interfaces: Slab<Interface>,
    pub(crate) routes: Routes,
    pub(crate) arp: arp::Cache,
    pub(crate) reass: Reassembly,
    pub(crate) protocols: BTreeMap<u8, Box<dyn ip::Recv>>,
    pub(crate) hooks: H,
    pub(crate) ip_id: u16,
    pub(crate) forward_route: RouteCache,
    pub(crate) loopback: VecDeque<Buffer>,
    pub(crate) now: Instant,
    next_slow_tick: Option<Instant>,
    next_arp_prune: Option<Instant>,
}

impl Stack<NoHooks> {
    /// Create a stack without external collaborators.
    pub fn new(config: Config) -> Self {
        Stack::with_hooks(config, NoHooks)
    }
}

impl<H: Hooks> Stack<H> {
    /// Create a stack calling into `hooks` for ICMP, multicast routing and filtering.
    pub fn with_hooks(config: Config, hooks: H) -> Self {
        Stack {
            config,
            stats: Stats::default(),
            interfaces: Slab::new(),
            routes: Routes::new(),
            arp: arp::Cache::new(),
            reass: Reassembly::new(),
            protocols: BTreeMap::new(),
            hooks,
            ip_id: 1,
            forward_route: RouteCache::new(),
            loopback: VecDeque::new(),
            now: Instant::from_millis(0),
            next_slow_tick: None,
            next_arp_prune: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Change the configuration, effective with the next datagram.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    /// The resolution records.
    pub fn arp_cache(&self) -> &arp::Cache {
        &self.arp
    }

    /// The reassembly queues.
    pub fn reassembly(&self) -> &Reassembly {
        &self.reass
    }

    pub fn interface(&self, idx: IfIndex) -> Option<&Interface> {
        self.interfaces.get(idx.0)
    }

    /// Change an interface, for example its flags or MTU.
    ///
    /// Use `add_address` to assign addresses, which also installs their routes.
    pub fn interface_mut(&mut self, idx: IfIndex) -> Option<&mut Interface> {
        self.interfaces.get_mut(idx.0)
    }

    pub fn interfaces(&self) -> impl Iterator<Item=(IfIndex, &Interface)> {
        self.interfaces.iter().map(|(key, iface)| (IfIndex(key), iface))
    }

    /// Register the handler of an IP protocol, returning the previous one.
    pub fn register<R>(&mut self, protocol: IpProtocol, handler: R) -> Option<Box<dyn ip::Recv>>
        where R: ip::Recv + 'static,
    {
        self.protocols.insert(protocol.into(), Box::new(handler))
    }

    pub fn unregister(&mut self, protocol: IpProtocol) -> Option<Box<dyn ip::Recv>> {
        self.protocols.remove(&u8::from(protocol))
    }

    /// Attach an interface and install the routes to its networks.
    pub fn attach(&mut self, iface: Interface) -> IfIndex {
        let addrs = iface.addrs().to_vec();
        let idx = IfIndex(self.interfaces.insert(iface));
        for addr in addrs {
            self.install_routes(idx, addr);
        }
        net_debug!("attached interface {}", idx);
        idx
    }

    /// Assign an address to an attached interface.
    ///
    /// Installs the route to the attached network and announces the address on the link.
    pub fn add_address(&mut self, idx: IfIndex, addr: IfAddr) -> Result<()> {
        let iface = self.interfaces.get_mut(idx.0).ok_or(Error::Invalid)?;
        if iface.has_addr(addr.address()) {
            return Err(Error::AddrInUse);
        }
        iface.addrs_mut().push(addr);
        self.install_routes(idx, addr);
        if self.uses_arp(idx) {
            self.arp_whohas(idx, addr.address());
        }
        Ok(())
    }

    /// Remove an interface.
    ///
    /// All routes over the interface are deleted, which releases their resolution records and
    /// held datagrams.
    pub fn detach(&mut self, idx: IfIndex) -> Option<Interface> {
        if !self.interfaces.contains(idx.0) {
            return None;
        }
        for id in self.routes.on_interface(idx) {
            self.route_delete(id);
        }
        self.loopback.retain(|buffer| buffer.meta().interface != Some(idx));
        net_debug!("detached interface {}", idx);
        Some(self.interfaces.remove(idx.0))
    }

    /// Add a static route to `dest` through `gateway`.
    ///
    /// The gateway must be reachable on an attached network.
    pub fn add_route(&mut self, dest: Ipv4Subnet, gateway: Ipv4Address) -> Result<RouteId> {
        let (idx, ifaddr) = self.iface_with_peer(gateway)
            .or_else(|| self.iface_with_net(gateway))
            .ok_or(Error::Unreachable)?;
        let route = Route::gateway(dest, gateway, idx, ifaddr)
            .with_flags(RouteFlags::STATIC);
        self.routes.add(route)
    }

    /// Delete the route to exactly `dest`, and the host routes cloned from it.
    pub fn delete_route(&mut self, dest: Ipv4Subnet) -> Result<()> {
        let id = self.routes.find(dest).ok_or(Error::Unreachable)?;
        self.route_delete(id);
        Ok(())
    }

    /// Give back the route held by a cache.
    pub fn release_route(&mut self, cache: &mut RouteCache) {
        if let Some(id) = cache.route.take() {
            self.routes.release(id);
        }
        cache.dst = None;
    }

    /// Run the timers that are due at `now`.
    ///
    /// Reassembly queues age once per second, the resolution records once per
    /// `arp_prune_interval`.
    pub fn poll_timers(&mut self, now: Instant) {
        self.set_time(now);

        let mut tick = *self.next_slow_tick.get_or_insert(now + SLOW_TICK);
        while tick <= self.now {
            self.reass_timer();
            tick += SLOW_TICK;
        }
        self.next_slow_tick = Some(tick);

        let prune = *self.next_arp_prune.get_or_insert(now + self.config.arp_prune_interval);
        if prune <= self.now {
            self.arp_timer();
            self.next_arp_prune = Some(self.now + self.config.arp_prune_interval);
        }
    }

    /// Process datagrams that were looped back to this host.
    ///
    /// Returns the number of datagrams processed. Datagrams looped back while processing are left
    /// for the next call.
    pub fn process_loopback(&mut self, now: Instant) -> usize {
        let pending = self.loopback.len();
        for _ in 0..pending {
            let buffer = match self.loopback.pop_front() {
                Some(buffer) => buffer,
                None => break,
            };
            match buffer.meta().interface {
                Some(idx) => self.ip_input(buffer, idx, now),
                None => self.stats.drops.record(DropReason::NoInterface),
            }
        }
        pending
    }

    /// Datagrams waiting in the loopback queue.
    pub fn loopback_len(&self) -> usize {
        self.loopback.len()
    }

    pub(crate) fn set_time(&mut self, now: Instant) {
        if now > self.now {
            self.now = now;
        }
    }

    pub(crate) fn next_ip_id(&mut self) -> u16 {
        let id = self.ip_id;
        self.ip_id = self.ip_id.wrapping_add(1);
        id
    }

    /// Whether address resolution is used on the interface.
    pub(crate) fn uses_arp(&self, idx: IfIndex) -> bool {
        self.interfaces.get(idx.0).map_or(false, |iface| {
            let flags = iface.flags();
            flags.contains(IfFlags::BROADCAST)
                && !flags.intersects(IfFlags::LOOPBACK | IfFlags::NOARP)
        })
    }

    /// Look up a route, attaching a resolution record to a freshly cloned host route.
    pub(crate) fn route_lookup(&mut self, addr: Ipv4Address, clone: bool) -> Option<RouteId> {
        let lookup = self.routes.lookup(addr, clone)?;
        if let Lookup::Cloned(id) = lookup {
            let interface = self.routes.get(id)?.interface;
            if self.uses_arp(interface) {
                self.arp_attach(id);
            }
        }
        Some(lookup.id())
    }

    /// Delete a route and its clones, disposing of their resolution records.
    pub(crate) fn route_delete(&mut self, id: RouteId) {
        for (id, route) in self.routes.delete(id) {
            net_trace!("deleted route {} to {}", id, route.dest);
            if let Some(record) = route.link_info().and_then(|key| self.arp.remove(key)) {
                if record.is_holding() {
                    self.stats.arp.held_dropped += 1;
                }
            }
        }
    }

    /// The interface and local address of `addr`.
    ///
    /// Also matches the broadcast address of broadcast capable interfaces.
    pub(crate) fn iface_with_addr(&self, addr: Ipv4Address) -> Option<(IfIndex, Ipv4Address)> {
        self.interfaces().find_map(|(idx, iface)| {
            iface.addrs().iter()
                .find(|ifa| ifa.address() == addr
                    || (iface.flags().contains(IfFlags::BROADCAST) && ifa.broadcast() == Some(addr)))
                .map(|ifa| (idx, ifa.address()))
        })
    }

    /// The point-to-point interface whose peer is `addr`.
    pub(crate) fn iface_with_peer(&self, addr: Ipv4Address) -> Option<(IfIndex, Ipv4Address)> {
        self.interfaces()
            .filter(|(_, iface)| iface.flags().contains(IfFlags::POINTOPOINT))
            .find_map(|(idx, iface)| iface.addrs().iter()
                .find(|ifa| ifa.peer == Some(addr))
                .map(|ifa| (idx, ifa.address())))
    }

    /// The interface attached to the network of `addr`.
    pub(crate) fn iface_with_net(&self, addr: Ipv4Address) -> Option<(IfIndex, Ipv4Address)> {
        self.interfaces()
            .filter(|(_, iface)| !iface.flags().contains(IfFlags::POINTOPOINT))
            .find_map(|(idx, iface)| iface.addr_for_subnet(addr)
                .map(|ifa| (idx, ifa.address())))
    }

    /// The address of an interface best suited to talk to `addr`.
    pub(crate) fn interface_addr_for(&self, addr: Ipv4Address, idx: IfIndex) -> Option<Ipv4Address> {
        let iface = self.interfaces.get(idx.0)?;
        iface.addr_for_subnet(addr)
            .or_else(|| iface.addrs().iter().find(|ifa| ifa.peer == Some(addr)))
            .map(IfAddr::address)
            .or_else(|| iface.primary_addr())
    }

    /// Whether `addr` is assigned to any interface.
    pub(crate) fn is_local(&self, addr: Ipv4Address) -> bool {
        self.interfaces.iter().any(|(_, iface)| iface.has_addr(addr))
    }

    /// Queue a datagram for input, as if received on `idx`.
    pub(crate) fn loop_input(&mut self, mut buffer: Buffer, idx: IfIndex) {
        if self.loopback.len() >= self.config.ip_queue_len {
            net_trace!("loopback queue full, dropping datagram");
            self.stats.ip.queue_dropped += 1;
            self.stats.drops.record(DropReason::QueueFull);
            return;
        }
        buffer.meta_mut().interface = Some(idx);
        self.loopback.push_back(buffer);
    }

    /// Hand a datagram to an interface, resolving the link address of `dst`.
    ///
    /// `route` is the route the datagram is sent on. A route to a gateway is replaced by the
    /// host route to the gateway, whose resolution state decides.
    pub(crate) fn if_output(
        &mut self,
        idx: IfIndex,
        buffer: Buffer,
        dst: Ipv4Address,
        route: Option<RouteId>,
    ) -> Result<()> {
        let (flags, local) = match self.interfaces.get(idx.0) {
            Some(iface) => (iface.flags(), iface.has_addr(dst)),
            None => return Err(Error::NetDown),
        };
        if !flags.contains(IfFlags::UP) {
            return Err(Error::NetDown);
        }
        if flags.contains(IfFlags::LOOPBACK) || local {
            self.loop_input(buffer, idx);
            return Ok(());
        }

        let route = match route {
            Some(id) => Some(self.link_route(id, dst)?),
            None => None,
        };

        if !flags.contains(IfFlags::BROADCAST) {
            return self.send_frame(idx, EthernetAddress::UNSPECIFIED, EthernetProtocol::Ipv4, buffer);
        }

        match self.arp_resolve(idx, route, dst, buffer)? {
            arp::Resolution::Resolved(hw, buffer) => {
                self.send_frame(idx, hw, EthernetProtocol::Ipv4, buffer)
            },
            arp::Resolution::Queued => Ok(()),
        }
    }

    /// The route whose resolution state applies to a datagram sent on `id`.
    fn link_route(&mut self, id: RouteId, dst: Ipv4Address) -> Result<RouteId> {
        let mut rt0 = id;
        if !self.routes.is_up(rt0) {
            rt0 = self.route_lookup(dst, true).ok_or(Error::HostUnreachable)?;
        }

        let mut rt = rt0;
        let (gateway, gwroute) = match self.routes.get(rt0) {
            Some(route) if route.flags.contains(RouteFlags::GATEWAY) => (route.gateway, route.gwroute),
            _ => (None, None),
        };
        if let Some(gateway) = gateway {
            rt = match gwroute.filter(|&gw| self.routes.is_up(gw)) {
                Some(gw) => gw,
                None => {
                    if let Some(stale) = gwroute {
                        self.routes.release(stale);
                    }
                    let gw = self.route_lookup(gateway, true);
                    if let Some(gw) = gw {
                        self.routes.hold(gw);
                    }
                    if let Some(route) = self.routes.get_mut(rt0) {
                        route.gwroute = gw;
                    }
                    gw.ok_or(Error::HostUnreachable)?
                },
            };
        }

        let now = self.now;
        if let Some(route) = self.routes.get(rt) {
            if route.flags.contains(RouteFlags::REJECT) && !route.expire.is_reached(now) {
                return Err(if rt == rt0 { Error::HostDown } else { Error::HostUnreachable });
            }
        }
        Ok(rt)
    }

    pub(crate) fn send_frame(
        &mut self,
        idx: IfIndex,
        dst_hw: EthernetAddress,
        ethertype: EthernetProtocol,
        payload: Buffer,
    ) -> Result<()> {
        let iface = self.interfaces.get_mut(idx.0).ok_or(Error::NetDown)?;
        let result = iface.transmit(Frame { dst_hw, ethertype, payload });
        if result.is_err() {
            self.stats.ip.out_dropped += 1;
        }
        result
    }

    fn install_routes(&mut self, idx: IfIndex, addr: IfAddr) {
        let flags = match self.interfaces.get(idx.0) {
            Some(iface) => iface.flags(),
            None => return,
        };
        let route = match addr.peer {
            Some(peer) if flags.contains(IfFlags::POINTOPOINT) => {
                Route::interface(Ipv4Subnet::host(peer), idx, addr.address())
                    .with_flags(RouteFlags::HOST)
            },
            _ => {
                let subnet = addr.cidr.subnet();
                let route = Route::interface(subnet, idx, addr.address());
                if subnet.prefix_len() == 32 {
                    route.with_flags(RouteFlags::HOST)
                } else if self.uses_arp(idx) {
                    route.with_flags(RouteFlags::CLONING)
                } else {
                    route
                }
            },
        };
        let dest = route.dest;
        if let Err(err) = self.routes.add(route) {
            net_debug!("route to {} over {} not installed: {}", dest, idx, err);
        }
    }
}
