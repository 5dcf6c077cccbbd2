use dotrelay_domain::DomainError;
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::{RData, Record, RecordType};
use std::net::IpAddr;
use tracing::debug;

pub struct ResponseParser;

impl ResponseParser {
    pub fn parse(response_bytes: &[u8]) -> Result<Message, DomainError> {
        Message::from_vec(response_bytes).map_err(|e| {
            DomainError::InvalidDnsResponse(format!("Failed to parse DNS response: {}", e))
        })
    }

    /// Decodes an upstream answer and checks it belongs to the request we sent.
    pub fn parse_matching(
        response_bytes: &[u8],
        expected_id: u16,
        server: &str,
    ) -> Result<Message, DomainError> {
        let message = Self::parse(response_bytes)?;
        if message.metadata.id != expected_id {
            return Err(DomainError::TransactionIdMismatch {
                server: server.to_string(),
                sent: expected_id,
                received: message.metadata.id,
            });
        }

        debug!(
            server = %server,
            rcode = ?message.metadata.response_code,
            answers = message.answers.len(),
            "DNS response parsed"
        );

        Ok(message)
    }

    pub fn is_success(message: &Message) -> bool {
        message.metadata.response_code == ResponseCode::NoError
    }

    pub fn is_address_type(record_type: RecordType) -> bool {
        matches!(record_type, RecordType::A | RecordType::AAAA)
    }

    /// Type of the first question, if any.
    pub fn question_type(message: &Message) -> Option<RecordType> {
        message.queries.first().map(|q| q.query_type())
    }

    pub fn address_of(record: &Record) -> Option<IpAddr> {
        match &record.data {
            RData::A(a) => Some(IpAddr::V4(a.0)),
            RData::AAAA(aaaa) => Some(IpAddr::V6(aaaa.0)),
            _ => None,
        }
    }

    pub fn rcode_to_status(rcode: ResponseCode) -> &'static str {
        match rcode {
            ResponseCode::NoError => "NOERROR",
            ResponseCode::NXDomain => "NXDOMAIN",
            ResponseCode::ServFail => "SERVFAIL",
            ResponseCode::Refused => "REFUSED",
            ResponseCode::FormErr => "FORMERR",
            ResponseCode::NotImp => "NOTIMP",
            _ => "OTHER",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::forwarding::MessageBuilder;
    use hickory_proto::rr::rdata::{A, AAAA, CNAME};
    use hickory_proto::rr::Name;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use std::str::FromStr;

    #[test]
    fn test_parse_matching_rejects_foreign_id() {
        let mut query = MessageBuilder::refresh_query("example.com.", RecordType::A).unwrap();
        query.metadata.id = 10;
        let bytes = MessageBuilder::serialize(&query).unwrap();

        let result = ResponseParser::parse_matching(&bytes, 11, "tls://test:853");
        assert!(matches!(
            result,
            Err(DomainError::TransactionIdMismatch {
                sent: 11,
                received: 10,
                ..
            })
        ));
        assert!(ResponseParser::parse_matching(&bytes, 10, "tls://test:853").is_ok());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(ResponseParser::parse(&[0x00, 0x01, 0x02]).is_err());
    }

    #[test]
    fn test_address_of() {
        let name = Name::from_str("example.com.").unwrap();
        let v4 = Record::from_rdata(name.clone(), 60, RData::A(A(Ipv4Addr::LOCALHOST)));
        let v6 = Record::from_rdata(name.clone(), 60, RData::AAAA(AAAA(Ipv6Addr::LOCALHOST)));
        let alias = Record::from_rdata(
            name.clone(),
            60,
            RData::CNAME(CNAME(Name::from_str("alias.example.com.").unwrap())),
        );

        assert_eq!(
            ResponseParser::address_of(&v4),
            Some(IpAddr::V4(Ipv4Addr::LOCALHOST))
        );
        assert_eq!(
            ResponseParser::address_of(&v6),
            Some(IpAddr::V6(Ipv6Addr::LOCALHOST))
        );
        assert_eq!(ResponseParser::address_of(&alias), None);
    }

    #[test]
    fn test_rcode_status() {
        assert_eq!(ResponseParser::rcode_to_status(ResponseCode::NoError), "NOERROR");
        assert_eq!(ResponseParser::rcode_to_status(ResponseCode::ServFail), "SERVFAIL");
    }
}
