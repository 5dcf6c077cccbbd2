use hickory_proto::op::{Edns, Message, MessageType, OpCode, Query};
use hickory_proto::rr::rdata::opt::{ClientSubnet, EdnsCode, EdnsOption};
use hickory_proto::rr::rdata::{A, AAAA, TXT};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use std::net::IpAddr;
use std::str::FromStr;

pub fn query(name: &str, record_type: RecordType, id: u16) -> Message {
    let mut message = Message::new(id, MessageType::Query, OpCode::Query);
    message.metadata.recursion_desired = true;
    message.add_query(Query::query(Name::from_str(name).unwrap(), record_type));
    message
}

pub fn query_with_subnet(
    name: &str,
    record_type: RecordType,
    id: u16,
    network: &str,
    prefix: u8,
) -> Message {
    let mut message = query(name, record_type, id);
    let mut edns = Edns::new();
    edns.options_mut().insert(EdnsOption::Subnet(ClientSubnet::new(
        network.parse().unwrap(),
        prefix,
        0,
    )));
    message.edns = Some(edns);
    message
}

pub fn address_record(name: &str, ip: IpAddr, ttl: u32) -> Record {
    let rdata = match ip {
        IpAddr::V4(v4) => RData::A(A(v4)),
        IpAddr::V6(v6) => RData::AAAA(AAAA(v6)),
    };
    Record::from_rdata(Name::from_str(name).unwrap(), ttl, rdata)
}

pub fn txt_record(name: &str, text: &str) -> Record {
    Record::from_rdata(
        Name::from_str(name).unwrap(),
        60,
        RData::TXT(TXT::new(vec![text.to_string()])),
    )
}

pub fn subnet_of(message: &Message) -> Option<ClientSubnet> {
    match message.edns.as_ref()?.option(EdnsCode::Subnet)? {
        EdnsOption::Subnet(subnet) => Some(*subnet),
        _ => None,
    }
}

pub fn answer_ips(message: &Message) -> Vec<IpAddr> {
    message
        .answers
        .iter()
        .filter_map(|record| match &record.data {
            RData::A(a) => Some(IpAddr::V4(a.0)),
            RData::AAAA(aaaa) => Some(IpAddr::V6(aaaa.0)),
            _ => None,
        })
        .collect()
}

pub fn ip(raw: &str) -> IpAddr {
    raw.parse().unwrap()
}
