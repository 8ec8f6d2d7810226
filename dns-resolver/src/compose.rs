//! Turns a `ResolveResult` into a complete response `Message`,
//! including the authority section and 512 octet UDP truncation.

use dns_types::protocol::types::{
    Header, Message, Opcode, QueryClass, QueryType, Rcode, RecordClass, RecordType,
    RecordTypeWithData, ResourceRecord,
};
use dns_types::zones::types::ZoneStore;

use crate::resolve::{resolve, ResolveResult};

/// The largest response we will send without truncating, per RFC 1035
/// section 4.2.1: a UDP datagram with no EDNS0 opt-out extension.
const MAX_UDP_RESPONSE_OCTETS: usize = 512;

/// Build the response to `query` by resolving its (sole) question
/// against `store`, or short-circuit with the appropriate error
/// response if the query itself is malformed.
pub fn compose_response(query: &Message, store: &ZoneStore) -> Message {
    if query.questions.len() != 1 {
        return query.make_response_shell(Rcode::FormatError);
    }
    if query.header.opcode != Opcode::Standard {
        return query.make_response_shell(Rcode::NotImplemented);
    }

    let question = &query.questions[0];
    if !matches!(question.qclass, QueryClass::Record(RecordClass::IN)) {
        return query.make_response_shell(Rcode::Refused);
    }

    let QueryType::Record(qtype) = question.qtype else {
        return query.make_response_shell(Rcode::NotImplemented);
    };

    let result = resolve(&question.name, qtype, store);
    let mut response = build_response(query, &result, store);
    response.truncate_to(MAX_UDP_RESPONSE_OCTETS);
    response
}

fn build_response(query: &Message, result: &ResolveResult, store: &ZoneStore) -> Message {
    let mut response = query.make_response_shell(result.rcode);

    for (owner, ttl, target) in &result.cnames {
        response.answers.push(ResourceRecord {
            name: owner.clone(),
            rtype_with_data: RecordTypeWithData::CNAME {
                cname: target.clone(),
            },
            rclass: RecordClass::IN,
            ttl: *ttl,
        });
    }
    for (owner, ttl, value) in &result.answers {
        response.answers.push(ResourceRecord {
            name: owner.clone(),
            rtype_with_data: value.clone(),
            rclass: RecordClass::IN,
            ttl: *ttl,
        });
    }

    let Some(apex) = &result.apex else {
        return response;
    };

    match result.rcode {
        Rcode::NameError => {
            if let Some((ttl, soa)) = store.soa(apex) {
                response.authority.push(soa_record(apex, *ttl, soa));
            }
        }
        Rcode::NoError if result.nodata => {
            if let Some((ttl, soa)) = store.soa(apex) {
                response.authority.push(soa_record(apex, *ttl, soa));
            }
        }
        Rcode::NoError => {
            if let Some(ns) = store.ns(apex) {
                for (ttl, value) in ns.iter() {
                    response.authority.push(ResourceRecord {
                        name: apex.clone(),
                        rtype_with_data: value.clone(),
                        rclass: RecordClass::IN,
                        ttl,
                    });
                }
            }
        }
        _ => {}
    }

    response
}

fn soa_record(
    apex: &dns_types::protocol::types::DomainName,
    ttl: u32,
    soa: &dns_types::zones::types::SOA,
) -> ResourceRecord {
    ResourceRecord {
        name: apex.clone(),
        rtype_with_data: soa.to_rdata(),
        rclass: RecordClass::IN,
        ttl,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dns_types::protocol::types::test_util::domain;
    use dns_types::protocol::types::{Question, RecordType};
    use dns_types::zones::types::SOA;
    use std::net::Ipv4Addr;

    fn fixture() -> ZoneStore {
        let mut store = ZoneStore::new();
        let apex = domain("example.test.");
        store.insert_soa(
            apex.clone(),
            300,
            SOA {
                mname: domain("ns1.example.test."),
                rname: domain("hostmaster.example.test."),
                serial: 1,
                refresh: 3600,
                retry: 600,
                expire: 86400,
                minimum: 300,
            },
        );
        store.insert(
            apex.clone(),
            300,
            RecordTypeWithData::NS {
                nsdname: domain("ns1.example.test."),
            },
        );
        store.insert(
            domain("www.example.test."),
            300,
            RecordTypeWithData::A {
                address: Ipv4Addr::new(192, 0, 2, 1),
            },
        );
        store.finish_apex(&apex);
        store
    }

    fn query(name: &str, qtype: QueryType) -> Message {
        Message {
            header: Header {
                id: 42,
                is_response: false,
                opcode: Opcode::Standard,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: true,
                recursion_available: false,
                rcode: Rcode::NoError,
            },
            questions: vec![Question {
                name: domain(name),
                qtype,
                qclass: QueryClass::Record(RecordClass::IN),
            }],
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    #[test]
    fn answer_includes_ns_authority() {
        let store = fixture();
        let q = query("www.example.test.", QueryType::Record(RecordType::A));
        let response = compose_response(&q, &store);
        assert_eq!(Rcode::NoError, response.header.rcode);
        assert_eq!(1, response.answers.len());
        assert_eq!(1, response.authority.len());
        assert!(response.header.is_authoritative);
        assert_eq!(42, response.header.id);
    }

    #[test]
    fn nxdomain_includes_soa_authority() {
        let store = fixture();
        let q = query("nope.example.test.", QueryType::Record(RecordType::A));
        let response = compose_response(&q, &store);
        assert_eq!(Rcode::NameError, response.header.rcode);
        assert_eq!(1, response.authority.len());
    }

    #[test]
    fn nodata_includes_soa_authority() {
        let store = fixture();
        let q = query("www.example.test.", QueryType::Record(RecordType::AAAA));
        let response = compose_response(&q, &store);
        assert_eq!(Rcode::NoError, response.header.rcode);
        assert!(response.answers.is_empty());
        assert_eq!(1, response.authority.len());
    }

    #[test]
    fn out_of_authority_is_refused() {
        let store = fixture();
        let q = query("example.org.", QueryType::Record(RecordType::A));
        let response = compose_response(&q, &store);
        assert_eq!(Rcode::Refused, response.header.rcode);
        assert!(response.authority.is_empty());
    }

    #[test]
    fn non_standard_opcode_is_not_implemented() {
        let store = fixture();
        let mut q = query("www.example.test.", QueryType::Record(RecordType::A));
        q.header.opcode = Opcode::Status;
        let response = compose_response(&q, &store);
        assert_eq!(Rcode::NotImplemented, response.header.rcode);
    }

    #[test]
    fn wrong_qdcount_is_format_error() {
        let store = fixture();
        let mut q = query("www.example.test.", QueryType::Record(RecordType::A));
        q.questions.push(q.questions[0].clone());
        let response = compose_response(&q, &store);
        assert_eq!(Rcode::FormatError, response.header.rcode);
    }
}
