//! The resolution state machine: given a query name and type and an
//! immutable `ZoneStore`, decide what to answer.
//!
//! This is a pure function with no I/O: every blocking operation
//! (socket reads, zone file loading) happens elsewhere, so a query
//! here can never stall the caller.

use dns_types::protocol::types::{DomainName, Rcode, RecordType, RecordTypeWithData};
use dns_types::zones::types::{RRSet, ZoneStore};

/// Chase at most this many `CNAME` redirections before giving up.
const MAX_CNAME_CHASE: usize = 8;

/// The result of resolving one (qname, qtype) pair against a zone
/// store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveResult {
    pub rcode: Rcode,
    /// The terminal rrset, if any, as `(owner, ttl, value)` triples.
    pub answers: Vec<(DomainName, u32, RecordTypeWithData)>,
    /// `CNAME`s followed on the way to the terminal answer, in chase
    /// order, as `(owner, ttl, target)` triples.
    pub cnames: Vec<(DomainName, u32, DomainName)>,
    /// The zone apex that was found authoritative for the query, if
    /// any.  `None` only when `rcode` is `Refused`.
    pub apex: Option<DomainName>,
    /// The owner name exists, but has no data of the queried type.
    pub nodata: bool,
}

impl ResolveResult {
    fn refused() -> Self {
        ResolveResult {
            rcode: Rcode::Refused,
            answers: Vec::new(),
            cnames: Vec::new(),
            apex: None,
            nodata: false,
        }
    }

    fn name_error(apex: DomainName, cnames: Vec<(DomainName, u32, DomainName)>) -> Self {
        ResolveResult {
            rcode: Rcode::NameError,
            answers: Vec::new(),
            cnames,
            apex: Some(apex),
            nodata: false,
        }
    }

    fn nodata(apex: DomainName, cnames: Vec<(DomainName, u32, DomainName)>) -> Self {
        ResolveResult {
            rcode: Rcode::NoError,
            answers: Vec::new(),
            cnames,
            apex: Some(apex),
            nodata: true,
        }
    }

    fn answer(
        apex: DomainName,
        cnames: Vec<(DomainName, u32, DomainName)>,
        owner: &DomainName,
        rrset: &RRSet,
    ) -> Self {
        let answers = rrset
            .iter()
            .map(|(ttl, value)| (owner.clone(), ttl, value.clone()))
            .collect();
        ResolveResult {
            rcode: Rcode::NoError,
            answers,
            cnames,
            apex: Some(apex),
            nodata: false,
        }
    }
}

/// Resolve `qname`/`qtype` against `store`.
///
/// `qname` must already be in canonical form (see
/// `dns_types::protocol::types::normalise`); this function does not
/// normalise it itself, since the transport adapter normalises every
/// incoming query name once, up front.
pub fn resolve(qname: &DomainName, qtype: RecordType, store: &ZoneStore) -> ResolveResult {
    let Some(apex) = store.find_apex_for(qname) else {
        return ResolveResult::refused();
    };

    if qtype == RecordType::CNAME {
        return resolve_cname_query(qname, &apex, store);
    }

    chase(qname, qtype, &apex, store)
}

fn resolve_cname_query(qname: &DomainName, apex: &DomainName, store: &ZoneStore) -> ResolveResult {
    if let Some((owner, rrset)) = exact_or_wildcard(qname, RecordType::CNAME, store) {
        return ResolveResult::answer(apex.clone(), Vec::new(), &owner, rrset);
    }
    if store.has_any(qname) {
        return ResolveResult::nodata(apex.clone(), Vec::new());
    }
    ResolveResult::name_error(apex.clone(), Vec::new())
}

fn chase(qname: &DomainName, qtype: RecordType, apex: &DomainName, store: &ZoneStore) -> ResolveResult {
    let mut cnames = Vec::new();
    let mut visited = Vec::new();
    let mut current = qname.clone();

    for _ in 0..MAX_CNAME_CHASE {
        if visited.contains(&current) {
            return ResolveResult::nodata(apex.clone(), cnames);
        }
        visited.push(current.clone());

        if let Some((owner, rrset)) = exact_or_wildcard(&current, qtype, store) {
            return ResolveResult::answer(apex.clone(), cnames, &owner, rrset);
        }

        if let Some((_, cname_rrset)) = exact_or_wildcard(&current, RecordType::CNAME, store) {
            // Multiple CNAMEs at one owner are invalid at load time;
            // only the first is ever present here.
            if let Some((ttl, RecordTypeWithData::CNAME { cname: target })) = cname_rrset.iter().next() {
                cnames.push((current.clone(), ttl, target.clone()));
                current = target.clone();
                continue;
            }
        }

        if current == *qname {
            let wildcard_owner_exists = current
                .wildcard_parent()
                .is_some_and(|wname| store.has_any(&wname));
            if store.has_any(&current) || wildcard_owner_exists {
                return ResolveResult::nodata(apex.clone(), cnames);
            }
        }
        return ResolveResult::name_error(apex.clone(), cnames);
    }

    // Chase bound exceeded without terminating: treat as NODATA with
    // whatever CNAMEs were accumulated, rather than failing the query.
    ResolveResult::nodata(apex.clone(), cnames)
}

/// Look up `rtype` at `name`, falling back to the wildcard one label
/// above it.  Returns the owner name to report in the answer: `name`
/// itself in both cases, since a wildcard match is reported under the
/// queried name, never the literal `*.` owner.
fn exact_or_wildcard<'a>(
    name: &DomainName,
    rtype: RecordType,
    store: &'a ZoneStore,
) -> Option<(DomainName, &'a RRSet)> {
    if let Some(rrset) = store.get(name, rtype) {
        if !rrset.is_empty() {
            return Some((name.clone(), rrset));
        }
    }
    let wildcard = name.wildcard_parent()?;
    let rrset = store.get(&wildcard, rtype)?;
    if rrset.is_empty() {
        return None;
    }
    Some((name.clone(), rrset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dns_types::protocol::types::test_util::domain;
    use dns_types::zones::types::SOA;
    use std::net::Ipv4Addr;

    fn fixture() -> ZoneStore {
        let mut store = ZoneStore::new();
        let apex = domain("example.test.");
        let soa = SOA {
            mname: domain("ns1.example.test."),
            rname: domain("hostmaster.example.test."),
            serial: 1,
            refresh: 3600,
            retry: 600,
            expire: 86400,
            minimum: 300,
        };
        store.insert_soa(apex.clone(), 300, soa);
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
        store.insert(
            domain("alias.example.test."),
            300,
            RecordTypeWithData::CNAME {
                cname: domain("www.example.test."),
            },
        );
        store.insert(
            domain("hop1.example.test."),
            300,
            RecordTypeWithData::CNAME {
                cname: domain("alias.example.test."),
            },
        );
        store.insert(
            domain("*.wild.example.test."),
            300,
            RecordTypeWithData::A {
                address: Ipv4Addr::new(192, 0, 2, 9),
            },
        );
        store.finish_apex(&apex);
        store
    }

    #[test]
    fn exact_match_returns_answer() {
        let store = fixture();
        let result = resolve(&domain("www.example.test."), RecordType::A, &store);
        assert_eq!(Rcode::NoError, result.rcode);
        assert_eq!(1, result.answers.len());
        assert!(result.cnames.is_empty());
    }

    #[test]
    fn single_cname_hop_is_followed() {
        let store = fixture();
        let result = resolve(&domain("alias.example.test."), RecordType::A, &store);
        assert_eq!(Rcode::NoError, result.rcode);
        assert_eq!(1, result.cnames.len());
        assert_eq!(1, result.answers.len());
    }

    #[test]
    fn double_cname_hop_is_followed() {
        let store = fixture();
        let result = resolve(&domain("hop1.example.test."), RecordType::A, &store);
        assert_eq!(Rcode::NoError, result.rcode);
        assert_eq!(2, result.cnames.len());
        assert_eq!(1, result.answers.len());
    }

    #[test]
    fn nodata_when_name_exists_but_type_does_not() {
        let store = fixture();
        let result = resolve(&domain("www.example.test."), RecordType::AAAA, &store);
        assert_eq!(Rcode::NoError, result.rcode);
        assert!(result.nodata);
        assert!(result.answers.is_empty());
    }

    #[test]
    fn nxdomain_for_unknown_name() {
        let store = fixture();
        let result = resolve(&domain("nope.example.test."), RecordType::A, &store);
        assert_eq!(Rcode::NameError, result.rcode);
    }

    #[test]
    fn refused_when_out_of_authority() {
        let store = fixture();
        let result = resolve(&domain("example.org."), RecordType::A, &store);
        assert_eq!(Rcode::Refused, result.rcode);
        assert!(result.apex.is_none());
    }

    #[test]
    fn wildcard_synthesises_answer_with_owner_set_to_qname() {
        let store = fixture();
        let qname = domain("anything.wild.example.test.");
        let result = resolve(&qname, RecordType::A, &store);
        assert_eq!(Rcode::NoError, result.rcode);
        assert_eq!(qname, result.answers[0].0);
    }

    #[test]
    fn cname_qtype_returns_cname_record_directly() {
        let store = fixture();
        let result = resolve(&domain("alias.example.test."), RecordType::CNAME, &store);
        assert_eq!(Rcode::NoError, result.rcode);
        assert_eq!(1, result.answers.len());
        assert!(matches!(result.answers[0].2, RecordTypeWithData::CNAME { .. }));
    }
}
