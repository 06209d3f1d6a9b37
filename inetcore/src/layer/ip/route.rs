//! The routing table.
//!
//! CIDR, relevant rfc1519, rfc4632. Routes live in an arena and are referred to by [`RouteId`].
//! Holders of a handle take a reference with [`Routes::hold`] and give it back with
//! [`Routes::release`]. A deleted route loses its `UP` flag and stays in the arena until the last
//! reference is gone, so a cached handle is valid exactly while its route is up.
//!
//! [`RouteId`]: struct.RouteId.html
//! [`Routes::hold`]: struct.Routes.html#method.hold
//! [`Routes::release`]: struct.Routes.html#method.release
use core::fmt;

use bitflags::bitflags;
use slab::Slab;

use crate::layer::{Error, Result};
use crate::nic::IfIndex;
use crate::time::Expiration;
use crate::wire::{Ipv4Address, Ipv4Subnet};

bitflags! {
    /// Properties of a route.
    pub struct Flags: u16 {
        /// Usable for lookups.
        const UP       = 0x0001;
        /// The destination is reached through a gateway.
        const GATEWAY  = 0x0002;
        /// The destination is a single host.
        const HOST     = 0x0004;
        /// Sending to the destination fails fast.
        const REJECT   = 0x0008;
        /// Created by a redirect.
        const DYNAMIC  = 0x0010;
        /// Changed by a redirect.
        const MODIFIED = 0x0020;
        /// Added manually, not by the protocol.
        const STATIC   = 0x0040;
        /// Lookups clone a host route from this one.
        const CLONING  = 0x0080;
        /// Carries an address resolution record.
        const LLINFO   = 0x0100;
    }
}

/// Handle of a route in a `Routes` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouteId(pub(crate) usize);

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "rt{}", self.0)
    }
}

/// A prefix of addresses and how to reach them.
#[derive(Debug, Clone)]
pub struct Route {
    /// The network routed through this route.
    pub dest: Ipv4Subnet,

    /// Next hop for this network, if it is not directly attached.
    pub gateway: Option<Ipv4Address>,

    /// The outgoing interface.
    pub interface: IfIndex,

    /// The local address used on the outgoing interface.
    pub ifaddr: Ipv4Address,

    pub flags: Flags,

    /// For host routes with resolution records, until when the mapping is valid.
    ///
    /// A route that never expires also holds a permanent mapping.
    pub expire: Expiration,

    /// Path MTU towards the destination, `0` if unknown.
    pub mtu: usize,

    /// Transmissions over this route.
    pub use_count: u64,

    pub(crate) refcnt: usize,
    pub(crate) parent: Option<RouteId>,
    pub(crate) gwroute: Option<RouteId>,
    pub(crate) link_info: Option<usize>,
}

impl Route {
    /// A route to a directly attached network.
    pub fn interface(dest: Ipv4Subnet, interface: IfIndex, ifaddr: Ipv4Address) -> Self {
        Route {
            dest,
            gateway: None,
            interface,
            ifaddr,
            flags: Flags::empty(),
            expire: Expiration::Never,
            mtu: 0,
            use_count: 0,
            refcnt: 0,
            parent: None,
            gwroute: None,
            link_info: None,
        }
    }

    /// A route to a network behind `gateway`.
    pub fn gateway(dest: Ipv4Subnet, gateway: Ipv4Address, interface: IfIndex, ifaddr: Ipv4Address)
        -> Self
    {
        Route {
            gateway: Some(gateway),
            flags: Flags::GATEWAY,
            ..Route::interface(dest, interface, ifaddr)
        }
    }

    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn is_up(&self) -> bool {
        self.flags.contains(Flags::UP)
    }

    /// Query whether this is the default route, `0.0.0.0/0`.
    pub fn is_default(&self) -> bool {
        self.dest.prefix_len() == 0
    }

    /// The record of address resolution attached to this route.
    pub fn link_info(&self) -> Option<usize> {
        self.link_info
    }

    /// The route this one was cloned from.
    pub fn parent(&self) -> Option<RouteId> {
        self.parent
    }
}

/// Result of a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// An existing route matched.
    Found(RouteId),
    /// A host route was cloned from a matching cloning route.
    Cloned(RouteId),
}

impl Lookup {
    pub fn id(self) -> RouteId {
        match self {
            Lookup::Found(id) | Lookup::Cloned(id) => id,
        }
    }
}

/// A routing table.
#[derive(Debug, Default)]
pub struct Routes {
    table: Slab<Route>,
}

impl Routes {
    /// Creates an empty routing table.
    pub fn new() -> Self {
        Routes::default()
    }

    /// Insert a route.
    ///
    /// Fails with `AddrInUse` if a route to the same prefix is already up.
    pub fn add(&mut self, mut route: Route) -> Result<RouteId> {
        if self.find(route.dest).is_some() {
            return Err(Error::AddrInUse);
        }
        route.flags |= Flags::UP;
        route.refcnt = 0;
        Ok(RouteId(self.table.insert(route)))
    }

    /// The route with this handle, up or not.
    pub fn get(&self, id: RouteId) -> Option<&Route> {
        self.table.get(id.0)
    }

    pub fn get_mut(&mut self, id: RouteId) -> Option<&mut Route> {
        self.table.get_mut(id.0)
    }

    /// Query whether the handle refers to a route that is still up.
    pub fn is_up(&self, id: RouteId) -> bool {
        self.get(id).map_or(false, Route::is_up)
    }

    /// The route to exactly this prefix.
    pub fn find(&self, dest: Ipv4Subnet) -> Option<RouteId> {
        self.table.iter()
            .find(|(_, route)| route.is_up() && route.dest == dest)
            .map(|(key, _)| RouteId(key))
    }

    /// Iterate over all routes that are up.
    pub fn iter(&self) -> impl Iterator<Item=(RouteId, &Route)> {
        self.table.iter()
            .filter(|(_, route)| route.is_up())
            .map(|(key, route)| (RouteId(key), route))
    }

    /// Find the route with the longest matching prefix.
    ///
    /// With `clone` set, a match on a cloning route to a network creates and returns a host route
    /// for `addr` that inherits the interface and flags of its parent.
    pub fn lookup(&mut self, addr: Ipv4Address, clone: bool) -> Option<Lookup> {
        // The rules say to find the subnet with longest prefix.
        let mut best_match: Option<(usize, &Route)> = None;
        for (key, route) in self.table.iter() {
            if !route.is_up() || !route.dest.contains(addr) {
                continue;
            }

            let best = best_match.get_or_insert((key, route));
            if best.1.dest.prefix_len() < route.dest.prefix_len() {
                *best = (key, route);
            }
        }

        let (key, route) = best_match?;
        if !clone || !route.flags.contains(Flags::CLONING) || route.flags.contains(Flags::HOST) {
            return Some(Lookup::Found(RouteId(key)));
        }

        let cloned = Route {
            dest: Ipv4Subnet::host(addr),
            gateway: route.gateway,
            interface: route.interface,
            ifaddr: route.ifaddr,
            flags: (route.flags - Flags::CLONING - Flags::STATIC) | Flags::HOST | Flags::UP,
            expire: route.expire,
            mtu: route.mtu,
            use_count: 0,
            refcnt: 0,
            parent: Some(RouteId(key)),
            gwroute: None,
            link_info: None,
        };
        Some(Lookup::Cloned(RouteId(self.table.insert(cloned))))
    }

    /// Take a reference to a route.
    pub fn hold(&mut self, id: RouteId) {
        if let Some(route) = self.table.get_mut(id.0) {
            route.refcnt += 1;
        }
    }

    /// Give back a reference, freeing a deleted route with the last one.
    pub fn release(&mut self, id: RouteId) {
        let free = match self.table.get_mut(id.0) {
            Some(route) => {
                route.refcnt = route.refcnt.saturating_sub(1);
                route.refcnt == 0 && !route.is_up()
            },
            None => false,
        };
        if free {
            self.free(id);
        }
    }

    /// Delete a route and every route cloned from it.
    ///
    /// Returns the deleted routes. Their resolution records have been detached and are returned
    /// with them for the caller to dispose of.
    pub fn delete(&mut self, id: RouteId) -> Vec<(RouteId, Route)> {
        let mut deleted = Vec::new();
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            if !self.is_up(id) {
                continue;
            }
            pending.extend(self.table.iter()
                .filter(|(_, route)| route.is_up() && route.parent == Some(id))
                .map(|(key, _)| RouteId(key)));

            let route = match self.table.get_mut(id.0) {
                Some(route) => route,
                None => continue,
            };
            route.flags.remove(Flags::UP | Flags::LLINFO);
            let snapshot = route.clone();
            route.link_info = None;
            let gwroute = route.gwroute.take();
            let free = route.refcnt == 0;

            if let Some(gw) = gwroute {
                self.release(gw);
            }
            if free {
                self.free(id);
            }
            deleted.push((id, snapshot));
        }
        deleted
    }

    /// Handles of all routes over an interface.
    pub fn on_interface(&self, interface: IfIndex) -> Vec<RouteId> {
        self.iter()
            .filter(|(_, route)| route.interface == interface)
            .map(|(id, _)| id)
            .collect()
    }

    fn free(&mut self, id: RouteId) {
        if self.table.contains(id.0) {
            let route = self.table.remove(id.0);
            if let Some(gw) = route.gwroute {
                self.release(gw);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::wire::Ipv4Cidr;

    const IF0: IfIndex = IfIndex(0);
    const LOCAL: Ipv4Address = Ipv4Address::new(10, 0, 0, 1);

    fn net(a: u8, b: u8, c: u8, d: u8, prefix: u8) -> Ipv4Subnet {
        Ipv4Cidr::new(Ipv4Address::new(a, b, c, d), prefix).subnet()
    }

    #[test]
    fn longest_prefix() {
        let mut routes = Routes::new();
        let default = routes.add(Route::gateway(Ipv4Subnet::ANY, Ipv4Address::new(10, 0, 0, 254), IF0, LOCAL))
            .expect("Can add default route");
        let local = routes.add(Route::interface(net(10, 0, 0, 0, 24), IF0, LOCAL))
            .expect("Can add interface route");

        assert_eq!(routes.lookup(Ipv4Address::new(10, 0, 0, 7), false), Some(Lookup::Found(local)));
        assert_eq!(routes.lookup(Ipv4Address::new(8, 8, 8, 8), false), Some(Lookup::Found(default)));
        assert!(routes.get(default).unwrap().is_default());
        assert_eq!(routes.add(Route::interface(net(10, 0, 0, 0, 24), IF0, LOCAL)).err(),
            Some(Error::AddrInUse));
    }

    #[test]
    fn cloning() {
        let mut routes = Routes::new();
        let parent = routes.add(Route::interface(net(10, 0, 0, 0, 24), IF0, LOCAL)
            .with_flags(Flags::CLONING)).unwrap();
        let target = Ipv4Address::new(10, 0, 0, 2);

        assert_eq!(routes.lookup(target, false), Some(Lookup::Found(parent)));
        let clone = match routes.lookup(target, true) {
            Some(Lookup::Cloned(id)) => id,
            other => panic!("Expected a clone, got {:?}", other),
        };
        let route = routes.get(clone).unwrap();
        assert!(route.flags.contains(Flags::HOST | Flags::UP));
        assert!(!route.flags.contains(Flags::CLONING));
        assert_eq!(route.parent(), Some(parent));
        // The host route is now the best match.
        assert_eq!(routes.lookup(target, true), Some(Lookup::Found(clone)));
    }

    #[test]
    fn delete_cascades_and_respects_references() {
        let mut routes = Routes::new();
        let parent = routes.add(Route::interface(net(10, 0, 0, 0, 24), IF0, LOCAL)
            .with_flags(Flags::CLONING)).unwrap();
        let a = routes.lookup(Ipv4Address::new(10, 0, 0, 2), true).unwrap().id();
        let b = routes.lookup(Ipv4Address::new(10, 0, 0, 3), true).unwrap().id();
        routes.hold(b);

        let deleted = routes.delete(parent);
        assert_eq!(deleted.len(), 3);
        assert!(routes.get(parent).is_none());
        assert!(routes.get(a).is_none());
        // Still referenced, but no longer up.
        assert!(routes.get(b).is_some());
        assert!(!routes.is_up(b));
        assert_eq!(routes.lookup(Ipv4Address::new(10, 0, 0, 3), true), None);

        routes.release(b);
        assert!(routes.get(b).is_none());
        assert_eq!(routes.iter().count(), 0);
    }
}
