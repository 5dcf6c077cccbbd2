//! EDNS Client-Subnet (RFC 7871) policy.
//!
//! Holds the two per-family subnet descriptors computed at startup and knows
//! how to put one on an outgoing query or take it off an answer.

use dotrelay_domain::config::ecs::{MAX_MASK_BITS_V4, MAX_MASK_BITS_V6};
use hickory_proto::op::{Edns, Message};
use hickory_proto::rr::rdata::opt::{ClientSubnet, EdnsCode, EdnsOption};
use hickory_proto::rr::RecordType;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::debug;

pub const DEFAULT_MASK_BITS_V4: u8 = 24;
pub const DEFAULT_MASK_BITS_V6: u8 = 56;

/// UDP payload size advertised on an OPT record the proxy adds itself.
pub const ECS_UDP_PAYLOAD: u16 = 4096;

/// One ECS option value: a network address and its source prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubnetDescriptor {
    network: IpAddr,
    source_prefix: u8,
}

impl SubnetDescriptor {
    /// `mask_bits == 0` selects the family default; larger than the family
    /// maximum is clamped. Host bits are zeroed.
    pub fn from_ip(ip: IpAddr, mask_bits: u8) -> Self {
        match ip {
            IpAddr::V4(v4) => {
                let prefix = effective_prefix(mask_bits, DEFAULT_MASK_BITS_V4, MAX_MASK_BITS_V4);
                Self {
                    network: IpAddr::V4(mask_v4(v4, prefix)),
                    source_prefix: prefix,
                }
            }
            IpAddr::V6(v6) => {
                // An IPv4-mapped address describes an IPv4 client.
                if let Some(v4) = v6.to_ipv4_mapped() {
                    return Self::from_ip(IpAddr::V4(v4), mask_bits);
                }
                let prefix = effective_prefix(mask_bits, DEFAULT_MASK_BITS_V6, MAX_MASK_BITS_V6);
                Self {
                    network: IpAddr::V6(mask_v6(v6, prefix)),
                    source_prefix: prefix,
                }
            }
        }
    }

    pub fn network(&self) -> IpAddr {
        self.network
    }

    pub fn source_prefix(&self) -> u8 {
        self.source_prefix
    }

    /// RFC 7871 family number: 1 for IPv4, 2 for IPv6.
    pub fn family(&self) -> u16 {
        match self.network {
            IpAddr::V4(_) => 1,
            IpAddr::V6(_) => 2,
        }
    }

    pub fn to_option(&self) -> EdnsOption {
        EdnsOption::Subnet(ClientSubnet::new(self.network, self.source_prefix, 0))
    }
}

fn effective_prefix(requested: u8, default: u8, max: u8) -> u8 {
    match requested {
        0 => default,
        bits => bits.min(max),
    }
}

fn mask_v4(ip: Ipv4Addr, prefix: u8) -> Ipv4Addr {
    let bits = u32::from(ip);
    let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
    Ipv4Addr::from(bits & mask)
}

fn mask_v6(ip: Ipv6Addr, prefix: u8) -> Ipv6Addr {
    let bits = u128::from(ip);
    let mask = u128::MAX.checked_shl(128 - u32::from(prefix)).unwrap_or(0);
    Ipv6Addr::from(bits & mask)
}

/// Immutable after startup; shared by every resolution task.
#[derive(Debug, Clone, Default)]
pub struct SubnetPolicy {
    v4: Option<SubnetDescriptor>,
    v6: Option<SubnetDescriptor>,
}

impl SubnetPolicy {
    pub fn new(v4: Option<SubnetDescriptor>, v6: Option<SubnetDescriptor>) -> Self {
        Self { v4, v6 }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.v4.is_some() || self.v6.is_some()
    }

    pub fn v4(&self) -> Option<&SubnetDescriptor> {
        self.v4.as_ref()
    }

    pub fn v6(&self) -> Option<&SubnetDescriptor> {
        self.v6.as_ref()
    }

    /// A queries use the IPv4 descriptor and AAAA the IPv6 one. Any other
    /// type follows the client's family; without a client (internal
    /// queries) IPv4 is preferred, falling back to IPv6.
    pub fn select(
        &self,
        record_type: RecordType,
        client: Option<IpAddr>,
    ) -> Option<&SubnetDescriptor> {
        match record_type {
            RecordType::A => self.v4.as_ref(),
            RecordType::AAAA => self.v6.as_ref(),
            _ => match client.map(client_is_v4) {
                Some(true) => self.v4.as_ref(),
                Some(false) => self.v6.as_ref(),
                None => self.v4.as_ref().or(self.v6.as_ref()),
            },
        }
    }

    /// Adds the selected ECS option to `message` unless it already carries
    /// one. An OPT record is created when the message has none.
    pub fn attach(&self, message: &mut Message, client: Option<IpAddr>) {
        if Self::has_subnet(message) {
            return;
        }
        let Some(record_type) = message.queries.first().map(|q| q.query_type()) else {
            return;
        };
        let Some(descriptor) = self.select(record_type, client) else {
            return;
        };

        let edns = message.edns.get_or_insert_with(|| {
            let mut edns = Edns::new();
            edns.set_max_payload(ECS_UDP_PAYLOAD);
            edns
        });
        edns.options_mut().insert(descriptor.to_option());

        debug!(
            network = %descriptor.network(),
            prefix = descriptor.source_prefix(),
            "ECS option attached"
        );
    }

    pub fn has_subnet(message: &Message) -> bool {
        message
            .edns
            .as_ref()
            .and_then(|edns| edns.option(EdnsCode::Subnet))
            .is_some()
    }

    /// Removes any ECS option, leaving the rest of the OPT record intact.
    pub fn strip(message: &mut Message) {
        if let Some(edns) = message.edns.as_mut() {
            edns.options_mut().remove(EdnsCode::Subnet);
        }
    }
}

fn client_is_v4(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(_) => true,
        IpAddr::V6(v6) => v6.to_ipv4_mapped().is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::forwarding::MessageBuilder;

    fn policy() -> SubnetPolicy {
        SubnetPolicy::new(
            Some(SubnetDescriptor::from_ip("203.0.113.77".parse().unwrap(), 0)),
            Some(SubnetDescriptor::from_ip("2001:db8:1234:5678::1".parse().unwrap(), 0)),
        )
    }

    fn subnet_of(message: &Message) -> Option<ClientSubnet> {
        match message.edns.as_ref()?.option(EdnsCode::Subnet)? {
            EdnsOption::Subnet(subnet) => Some(*subnet),
            _ => None,
        }
    }

    #[test]
    fn test_default_masks_and_host_bits() {
        let v4 = SubnetDescriptor::from_ip("203.0.113.77".parse().unwrap(), 0);
        assert_eq!(v4.source_prefix(), 24);
        assert_eq!(v4.network(), "203.0.113.0".parse::<IpAddr>().unwrap());
        assert_eq!(v4.family(), 1);

        let v6 = SubnetDescriptor::from_ip("2001:db8:1234:5678::1".parse().unwrap(), 0);
        assert_eq!(v6.source_prefix(), 56);
        assert_eq!(v6.network(), "2001:db8:1234:5600::".parse::<IpAddr>().unwrap());
        assert_eq!(v6.family(), 2);
    }

    #[test]
    fn test_mask_is_clamped() {
        let v4 = SubnetDescriptor::from_ip("198.51.100.9".parse().unwrap(), 40);
        assert_eq!(v4.source_prefix(), 32);
        assert_eq!(v4.network(), "198.51.100.9".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_mapped_address_is_v4() {
        let d = SubnetDescriptor::from_ip("::ffff:192.0.2.10".parse().unwrap(), 16);
        assert_eq!(d.family(), 1);
        assert_eq!(d.network(), "192.0.0.0".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_select_by_query_type() {
        let p = policy();
        assert_eq!(p.select(RecordType::A, None).unwrap().family(), 1);
        assert_eq!(p.select(RecordType::AAAA, None).unwrap().family(), 2);
    }

    #[test]
    fn test_select_by_client_family() {
        let p = policy();
        let v6_client: IpAddr = "2001:db8::5".parse().unwrap();
        let mapped: IpAddr = "::ffff:10.0.0.5".parse().unwrap();
        assert_eq!(p.select(RecordType::MX, Some(v6_client)).unwrap().family(), 2);
        assert_eq!(p.select(RecordType::MX, Some(mapped)).unwrap().family(), 1);
        assert_eq!(p.select(RecordType::TXT, None).unwrap().family(), 1);
    }

    #[test]
    fn test_internal_query_falls_back_to_v6() {
        let p = SubnetPolicy::new(
            None,
            Some(SubnetDescriptor::from_ip("2001:db8::1".parse().unwrap(), 0)),
        );
        assert_eq!(p.select(RecordType::TXT, None).unwrap().family(), 2);
        assert!(p.select(RecordType::A, None).is_none());
    }

    #[test]
    fn test_attach_creates_opt_record() {
        let mut query = MessageBuilder::refresh_query("example.com.", RecordType::A).unwrap();
        policy().attach(&mut query, None);

        let edns = query.edns.as_ref().unwrap();
        assert_eq!(edns.max_payload(), ECS_UDP_PAYLOAD);
        let subnet = subnet_of(&query).unwrap();
        assert_eq!(subnet.addr(), "203.0.113.0".parse::<IpAddr>().unwrap());
        assert_eq!(subnet.source_prefix(), 24);
    }

    #[test]
    fn test_attach_keeps_client_subnet() {
        let mut query = MessageBuilder::refresh_query("example.com.", RecordType::A).unwrap();
        let mut edns = Edns::new();
        edns.options_mut().insert(EdnsOption::Subnet(ClientSubnet::new(
            "192.0.2.0".parse().unwrap(),
            24,
            0,
        )));
        query.edns = Some(edns);

        policy().attach(&mut query, None);

        let subnet = subnet_of(&query).unwrap();
        assert_eq!(subnet.addr(), "192.0.2.0".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_disabled_policy_attaches_nothing() {
        let mut query = MessageBuilder::refresh_query("example.com.", RecordType::A).unwrap();
        SubnetPolicy::disabled().attach(&mut query, None);
        assert!(query.edns.is_none());
    }

    #[test]
    fn test_strip_removes_only_subnet() {
        let mut query = MessageBuilder::refresh_query("example.com.", RecordType::A).unwrap();
        policy().attach(&mut query, None);
        assert!(SubnetPolicy::has_subnet(&query));

        SubnetPolicy::strip(&mut query);
        assert!(!SubnetPolicy::has_subnet(&query));
        assert!(query.edns.is_some());
    }
}
