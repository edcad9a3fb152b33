//! IPv4 address lookup for named network devices.

use std::net::Ipv4Addr;

use crate::error::{InterfaceError, Result};

/// IPv4 address and derived broadcast address of a network device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceAddresses {
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub broadcast: Ipv4Addr,
}

/// Broadcast address for `address` under `netmask`.
pub fn broadcast_for(address: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(address) | !u32::from(netmask))
}

/// Look up the first IPv4 address bound to `device`.
#[cfg(unix)]
pub fn device_addresses(device: &str) -> Result<DeviceAddresses> {
    use std::ffi::CStr;

    let mut head: *mut libc::ifaddrs = std::ptr::null_mut();

    // SAFETY: `head` is a valid out-pointer; on success the list is released
    // with freeifaddrs below.
    let rc = unsafe { libc::getifaddrs(&mut head) };
    if rc != 0 {
        return Err(InterfaceError::Device {
            device: device.to_string(),
            reason: std::io::Error::last_os_error().to_string(),
        });
    }

    let mut found = None;
    let mut cursor = head;
    while !cursor.is_null() {
        // SAFETY: cursor is a non-null node of the list returned by getifaddrs.
        let entry = unsafe { &*cursor };
        cursor = entry.ifa_next;

        if entry.ifa_name.is_null() || entry.ifa_addr.is_null() {
            continue;
        }
        // SAFETY: ifa_name is a NUL-terminated string owned by the list.
        let name = unsafe { CStr::from_ptr(entry.ifa_name) };
        if name.to_bytes() != device.as_bytes() {
            continue;
        }
        // SAFETY: ifa_addr is non-null and points to a sockaddr.
        let family = unsafe { (*entry.ifa_addr).sa_family };
        if i32::from(family) != libc::AF_INET {
            continue;
        }

        // SAFETY: family is AF_INET, so the storage is a sockaddr_in.
        let address = unsafe { sockaddr_in_to_ipv4(entry.ifa_addr) };
        let netmask = if entry.ifa_netmask.is_null() {
            Ipv4Addr::BROADCAST
        } else {
            // SAFETY: the netmask of an AF_INET entry is a sockaddr_in.
            unsafe { sockaddr_in_to_ipv4(entry.ifa_netmask) }
        };
        found = Some(DeviceAddresses {
            address,
            netmask,
            broadcast: broadcast_for(address, netmask),
        });
        break;
    }

    // SAFETY: head came from a successful getifaddrs call and is freed once.
    unsafe { libc::freeifaddrs(head) };

    found.ok_or_else(|| InterfaceError::Device {
        device: device.to_string(),
        reason: "no IPv4 address found".to_string(),
    })
}

#[cfg(not(unix))]
pub fn device_addresses(device: &str) -> Result<DeviceAddresses> {
    Err(InterfaceError::Device {
        device: device.to_string(),
        reason: "device lookup is not supported on this platform".to_string(),
    })
}

/// # Safety
/// `addr` must point to a valid `sockaddr_in`.
#[cfg(unix)]
unsafe fn sockaddr_in_to_ipv4(addr: *const libc::sockaddr) -> Ipv4Addr {
    let sin = &*(addr as *const libc::sockaddr_in);
    Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr))
}
