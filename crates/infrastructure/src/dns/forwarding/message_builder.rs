//! DNS Message Builder
//!
//! Builds the messages the proxy originates itself: replies synthesized from
//! cached or latency-selected records, NXDOMAIN fallbacks and the queries the
//! cache refresh sweep sends upstream.

use dotrelay_domain::DomainError;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{DNSClass, Name, Record, RecordType};
use std::str::FromStr;

pub struct MessageBuilder;

impl MessageBuilder {
    /// Reply to `request` carrying `answers`.
    ///
    /// Mirrors the request's id, opcode, RD/CD bits and question section;
    /// RA is set, AD is cleared.
    pub fn reply(request: &Message, answers: Vec<Record>) -> Message {
        let mut reply = Message::response(request.metadata.id, request.metadata.op_code);
        reply.metadata.recursion_desired = request.metadata.recursion_desired;
        reply.metadata.checking_disabled = request.metadata.checking_disabled;
        reply.metadata.recursion_available = true;
        reply.metadata.authentic_data = false;
        reply.metadata.response_code = ResponseCode::NoError;
        reply.queries = request.queries.clone();
        reply.answers = answers;
        reply
    }

    pub fn nxdomain(request: &Message) -> Message {
        let mut reply = Self::reply(request, Vec::new());
        reply.metadata.response_code = ResponseCode::NXDomain;
        reply
    }

    /// Recursive query for one cached key, with a random transaction id.
    pub fn refresh_query(domain: &str, record_type: RecordType) -> Result<Message, DomainError> {
        let name = Name::from_str(domain).map_err(|e| {
            DomainError::InvalidDomainName(format!("Invalid domain '{}': {}", domain, e))
        })?;

        let mut query = Query::query(name, record_type);
        query.set_query_class(DNSClass::IN);

        let mut message = Message::new(fastrand::u16(..), MessageType::Query, OpCode::Query);
        message.metadata.recursion_desired = true;
        message.add_query(query);
        Ok(message)
    }

    /// Serialize a Message to wire format bytes
    pub fn serialize(message: &Message) -> Result<Vec<u8>, DomainError> {
        message.to_vec().map_err(|e| {
            DomainError::InvalidDnsResponse(format!("Failed to serialize DNS message: {}", e))
        })
    }
}
