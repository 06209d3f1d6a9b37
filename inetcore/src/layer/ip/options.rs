//! Processing of the options of received datagrams.
//!
//! Relevant rfc791, rfc1812 section 4.2.2. Strict and loose source routes are followed by
//! rewriting the destination and recording our outgoing address, record route and timestamp
//! options are filled in. A malformed option is answered with a parameter problem pointing at
//! the offending octet.
use byteorder::{ByteOrder, NetworkEndian};

use crate::layer::{Hooks, IcmpError};
use crate::nic::IfIndex;
use crate::stack::Stack;
use crate::stats::DropReason;
use crate::storage::Buffer;
use crate::wire::ipv4_option::{self as option, EOL, LSRR, MINOFF, NOP, OFFSET, OLEN, OPTVAL, RR, SSRR, TS};
use crate::wire::{ipv4_packet, Ipv4Address, IPV4_HEADER_LEN};

const ADDR_LEN: usize = 4;
const TIME_LEN: usize = 4;
const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

impl<H: Hooks> Stack<H> {
    /// Process the options of a datagram whose header of `header_len` octets is contiguous.
    ///
    /// Returns the datagram when processing continues. A source routed datagram that is to be
    /// sent on is forwarded from here and not returned.
    pub(crate) fn handle_options(&mut self, mut datagram: Buffer, header_len: usize, interface: IfIndex)
        -> Result<Option<Buffer>, DropReason>
    {
        match self.process_options(&mut datagram, header_len, interface) {
            Ok(false) => Ok(Some(datagram)),
            Ok(true) if !self.config.forwarding => {
                net_trace!("source routed datagram while not forwarding");
                self.stats.ip.cant_forward += 1;
                Err(DropReason::CantForward)
            },
            Ok(true) => {
                self.ip_forward(datagram, interface, true);
                Ok(None)
            },
            Err(error) => {
                net_trace!("bad option: {:?}", error);
                self.stats.ip.bad_options += 1;
                self.hooks.icmp_error(datagram, error);
                Err(DropReason::BadOptions)
            },
        }
    }

    /// Walk the options, returning whether the datagram is to be forwarded along a source route.
    fn process_options(&mut self, datagram: &mut Buffer, header_len: usize, interface: IfIndex)
        -> Result<bool, IcmpError>
    {
        let now = self.now;
        let header = &mut datagram.head_mut()[..header_len];
        let dst = ipv4_packet::new_unchecked(&*header).dst_addr();
        let mut forward = false;

        let mut cp = IPV4_HEADER_LEN;
        while cp < header_len {
            let cnt = header_len - cp;
            let opt = header[cp + OPTVAL];
            if opt == EOL {
                break;
            }
            let optlen = if opt == NOP {
                1
            } else {
                if cnt <= OLEN {
                    return Err(param_problem(cp));
                }
                let optlen = usize::from(header[cp + OLEN]);
                if optlen == 0 || optlen > cnt {
                    return Err(param_problem(cp + OLEN));
                }
                optlen
            };

            match opt {
                LSRR | SSRR => {
                    if optlen <= OFFSET {
                        return Err(param_problem(cp + OLEN));
                    }
                    let off = usize::from(header[cp + OFFSET]);
                    if off < MINOFF {
                        return Err(param_problem(cp + OFFSET));
                    }
                    let ip_dst = ipv4_packet::new_unchecked(&*header).dst_addr();
                    if self.iface_with_addr(ip_dst).is_none() {
                        if opt == SSRR {
                            return Err(IcmpError::SourceRouteFailed);
                        }
                        // Loose routing, and not at the next hop yet.
                        cp += optlen;
                        continue;
                    }
                    let off = off - 1;
                    if off + ADDR_LEN > optlen {
                        // End of the source route, the datagram is for us.
                        cp += optlen;
                        continue;
                    }

                    let next = Ipv4Address::from_bytes(&header[cp + off..cp + off + ADDR_LEN]);
                    let ifaddr = if opt == SSRR {
                        self.iface_with_peer(next)
                            .or_else(|| self.iface_with_net(next))
                            .map(|(_, addr)| addr)
                    } else {
                        self.source_route_addr(next)
                    };
                    let ifaddr = ifaddr.ok_or(IcmpError::SourceRouteFailed)?;

                    ipv4_packet::new_unchecked_mut(&mut *header).set_dst_addr(next);
                    header[cp + off..cp + off + ADDR_LEN].copy_from_slice(ifaddr.as_bytes());
                    header[cp + OFFSET] += ADDR_LEN as u8;
                    forward = !next.is_multicast();
                },
                RR => {
                    if optlen <= OFFSET {
                        return Err(param_problem(cp + OLEN));
                    }
                    let off = usize::from(header[cp + OFFSET]);
                    if off < MINOFF {
                        return Err(param_problem(cp + OFFSET));
                    }
                    let off = off - 1;
                    if off + ADDR_LEN > optlen {
                        // No space remains.
                        cp += optlen;
                        continue;
                    }
                    let ip_dst = ipv4_packet::new_unchecked(&*header).dst_addr();
                    let ifaddr = self.iface_with_addr(ip_dst)
                        .map(|(_, addr)| addr)
                        .or_else(|| self.source_route_addr(ip_dst))
                        .ok_or(IcmpError::HostUnreachable)?;
                    header[cp + off..cp + off + ADDR_LEN].copy_from_slice(ifaddr.as_bytes());
                    header[cp + OFFSET] += ADDR_LEN as u8;
                },
                TS => {
                    let code = param_problem(cp);
                    if optlen < 5 {
                        return Err(code);
                    }
                    let mut ptr = usize::from(header[cp + OFFSET]);
                    if ptr < MINOFF + 1 {
                        return Err(param_problem(cp + OFFSET));
                    }
                    let oflw_flg = header[cp + OFFSET + 1];
                    let slot = match oflw_flg & 0x0f {
                        option::TS_TSONLY => TIME_LEN,
                        option::TS_TSANDADDR | option::TS_PRESPEC => ADDR_LEN + TIME_LEN,
                        _ => return Err(code),
                    };
                    if ptr - 1 + slot > optlen {
                        // Full, count the overflow.
                        let oflw = ((oflw_flg >> 4) + 1) & 0x0f;
                        header[cp + OFFSET + 1] = (oflw << 4) | (oflw_flg & 0x0f);
                        if oflw == 0 {
                            return Err(code);
                        }
                        cp += optlen;
                        continue;
                    }

                    let sin = cp + ptr - 1;
                    match oflw_flg & 0x0f {
                        option::TS_TSANDADDR => {
                            match self.interface_addr_for(dst, interface) {
                                Some(addr) => header[sin..sin + ADDR_LEN].copy_from_slice(addr.as_bytes()),
                                None => {
                                    cp += optlen;
                                    continue;
                                },
                            }
                            ptr += ADDR_LEN;
                        },
                        option::TS_PRESPEC => {
                            let addr = Ipv4Address::from_bytes(&header[sin..sin + ADDR_LEN]);
                            if self.iface_with_addr(addr).is_none() {
                                cp += optlen;
                                continue;
                            }
                            ptr += ADDR_LEN;
                        },
                        _ => (),
                    }

                    let time = now.total_millis().rem_euclid(MILLIS_PER_DAY) as u32;
                    NetworkEndian::write_u32(&mut header[cp + ptr - 1..cp + ptr - 1 + TIME_LEN], time);
                    header[cp + OFFSET] = (ptr + TIME_LEN) as u8;
                },
                _ => (),
            }
            cp += optlen;
        }

        Ok(forward)
    }
}

fn param_problem(pointer: usize) -> IcmpError {
    IcmpError::ParameterProblem { pointer: pointer as u8 }
}
