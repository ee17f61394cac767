//! Linux raw ICMPv6 socket for router discovery

use super::{Icmpv6Socket, Icmpv6SocketFactory, ReceivedDatagram};
use crate::protocol::icmpv6::Icmpv6Type;
use crate::protocol::ND_HOP_LIMIT;
use crate::{Error, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::mem;
use std::net::Ipv6Addr;
use std::os::unix::io::{AsRawFd, RawFd};
use std::ptr;

/// `ICMPV6_FILTER` socket option at level `IPPROTO_ICMPV6` (linux/icmpv6.h)
const ICMPV6_FILTER: libc::c_int = 1;

/// Control buffer large enough for IPV6_PKTINFO + IPV6_HOPLIMIT
const CONTROL_LEN: usize = 128;

/// `struct icmp6_filter`: a set bit blocks the message type
#[repr(C)]
struct Icmp6Filter {
    data: [u32; 8],
}

impl Icmp6Filter {
    fn block_all() -> Self {
        Self { data: [u32::MAX; 8] }
    }

    fn pass(&mut self, msg_type: u8) {
        self.data[(msg_type >> 5) as usize] &= !(1u32 << (msg_type & 31));
    }
}

/// Raw ICMPv6 socket that only receives Router Advertisements
pub struct RawIcmpv6Socket {
    socket: Socket,
}

impl RawIcmpv6Socket {
    pub fn open() -> Result<Self> {
        let socket = Socket::new(Domain::IPV6, Type::RAW, Some(Protocol::ICMPV6))?;
        socket.set_multicast_hops_v6(u32::from(ND_HOP_LIMIT))?;
        socket.set_unicast_hops_v6(u32::from(ND_HOP_LIMIT))?;
        socket.set_multicast_loop_v6(false)?;
        socket.set_nonblocking(true)?;

        let fd = socket.as_raw_fd();

        let mut filter = Icmp6Filter::block_all();
        filter.pass(Icmpv6Type::RouterAdvertisement as u8);
        setsockopt(fd, libc::IPPROTO_ICMPV6, ICMPV6_FILTER, &filter)?;

        let on: libc::c_int = 1;
        setsockopt(fd, libc::IPPROTO_IPV6, libc::IPV6_RECVPKTINFO, &on)?;
        setsockopt(fd, libc::IPPROTO_IPV6, libc::IPV6_RECVHOPLIMIT, &on)?;

        Ok(Self { socket })
    }
}

fn setsockopt<T>(fd: RawFd, level: libc::c_int, name: libc::c_int, value: &T) -> Result<()> {
    let ret = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            value as *const T as *const libc::c_void,
            mem::size_of::<T>() as libc::socklen_t,
        )
    };

    if ret < 0 {
        return Err(Error::Io(std::io::Error::last_os_error()));
    }

    Ok(())
}

impl Icmpv6Socket for RawIcmpv6Socket {
    fn send_to(
        &self,
        packet: &[u8],
        dest: Ipv6Addr,
        if_index: u32,
        source: Option<Ipv6Addr>,
    ) -> Result<usize> {
        let fd = self.socket.as_raw_fd();

        let mut addr: libc::sockaddr_in6 = unsafe { mem::zeroed() };
        addr.sin6_family = libc::AF_INET6 as libc::sa_family_t;
        addr.sin6_addr.s6_addr = dest.octets();
        addr.sin6_scope_id = if_index;

        let mut iov = libc::iovec {
            iov_base: packet.as_ptr() as *mut libc::c_void,
            iov_len: packet.len(),
        };

        // Outgoing interface and source address travel in IPV6_PKTINFO
        let mut pktinfo: libc::in6_pktinfo = unsafe { mem::zeroed() };
        pktinfo.ipi6_ifindex = if_index as _;
        pktinfo.ipi6_addr.s6_addr = source.unwrap_or(Ipv6Addr::UNSPECIFIED).octets();

        let mut control = [0u64; CONTROL_LEN / 8];
        let mut msg: libc::msghdr = unsafe { mem::zeroed() };
        msg.msg_name = &mut addr as *mut _ as *mut libc::c_void;
        msg.msg_namelen = mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t;
        msg.msg_iov = &mut iov;
        msg.msg_iovlen = 1;
        msg.msg_control = control.as_mut_ptr() as *mut libc::c_void;

        unsafe {
            let space = libc::CMSG_SPACE(mem::size_of::<libc::in6_pktinfo>() as u32);
            msg.msg_controllen = space as _;
            let cmsg = libc::CMSG_FIRSTHDR(&msg);
            (*cmsg).cmsg_level = libc::IPPROTO_IPV6;
            (*cmsg).cmsg_type = libc::IPV6_PKTINFO;
            (*cmsg).cmsg_len = libc::CMSG_LEN(mem::size_of::<libc::in6_pktinfo>() as u32) as _;
            ptr::write_unaligned(libc::CMSG_DATA(cmsg) as *mut libc::in6_pktinfo, pktinfo);
        }

        let n = unsafe { libc::sendmsg(fd, &msg, 0) };
        if n < 0 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }

        Ok(n as usize)
    }

    fn recv(&self, buf: &mut [u8]) -> Result<ReceivedDatagram> {
        let fd = self.socket.as_raw_fd();

        let mut from: libc::sockaddr_in6 = unsafe { mem::zeroed() };
        let mut iov = libc::iovec {
            iov_base: buf.as_mut_ptr() as *mut libc::c_void,
            iov_len: buf.len(),
        };
        let mut control = [0u64; CONTROL_LEN / 8];
        let mut msg: libc::msghdr = unsafe { mem::zeroed() };
        msg.msg_name = &mut from as *mut _ as *mut libc::c_void;
        msg.msg_namelen = mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t;
        msg.msg_iov = &mut iov;
        msg.msg_iovlen = 1;
        msg.msg_control = control.as_mut_ptr() as *mut libc::c_void;
        msg.msg_controllen = CONTROL_LEN as _;

        let n = unsafe { libc::recvmsg(fd, &mut msg, 0) };
        if n < 0 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }

        let mut if_index = None;
        let mut hop_limit = None;
        unsafe {
            let mut cmsg = libc::CMSG_FIRSTHDR(&msg);
            while !cmsg.is_null() {
                if (*cmsg).cmsg_level == libc::IPPROTO_IPV6 {
                    let data = libc::CMSG_DATA(cmsg);
                    match (*cmsg).cmsg_type {
                        libc::IPV6_PKTINFO => {
                            let info = ptr::read_unaligned(data as *const libc::in6_pktinfo);
                            if_index = Some(info.ipi6_ifindex as u32);
                        }
                        libc::IPV6_HOPLIMIT => {
                            let hl = ptr::read_unaligned(data as *const libc::c_int);
                            hop_limit = u8::try_from(hl).ok();
                        }
                        _ => {}
                    }
                }
                cmsg = libc::CMSG_NXTHDR(&msg, cmsg);
            }
        }

        Ok(ReceivedDatagram {
            len: n as usize,
            source: Ipv6Addr::from(from.sin6_addr.s6_addr),
            if_index,
            hop_limit,
        })
    }

    fn raw_fd(&self) -> Option<RawFd> {
        Some(self.socket.as_raw_fd())
    }
}

impl AsRawFd for RawIcmpv6Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

/// Factory handing out [`RawIcmpv6Socket`]s to the multiplexer
#[derive(Debug, Default, Clone, Copy)]
pub struct RawIcmpv6SocketFactory;

impl Icmpv6SocketFactory for RawIcmpv6SocketFactory {
    fn open(&self) -> Result<Box<dyn Icmpv6Socket>> {
        Ok(Box::new(RawIcmpv6Socket::open()?))
    }
}
