use std::collections::HashMap;

use crate::protocol::types::*;

/// An ordered set of `(ttl, value)` pairs sharing one owner name and
/// record type.  Order is insertion order: no shuffling, no sorting.
/// When two values for the same owner/type are loaded with different
/// TTLs, RFC 2181 section 5.2 recommends using the lowest - this is
/// enforced once, at load time, rather than per-lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RRSet {
    ttl: u32,
    values: Vec<RecordTypeWithData>,
}

impl RRSet {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn values(&self) -> &[RecordTypeWithData] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &RecordTypeWithData)> {
        self.values.iter().map(move |v| (self.ttl, v))
    }

    /// Add a value to this rrset.  If the rrset is non-empty, `ttl`
    /// is collapsed to the minimum of the existing TTL and the new
    /// one.  Duplicate `(ttl, value)` pairs are not de-duplicated
    /// here: the loader is responsible for rejecting or merging
    /// duplicate source lines, as appropriate.
    pub(crate) fn push(&mut self, ttl: u32, value: RecordTypeWithData) {
        self.ttl = if self.values.is_empty() {
            ttl
        } else {
            std::cmp::min(self.ttl, ttl)
        };
        self.values.push(value);
    }
}

/// A collection of statically loaded zones, indexed by every name
/// that appears in any of them.
///
/// Built once by the loader and never mutated afterwards: a reload
/// builds an entirely new `ZoneStore` and swaps it in, rather than
/// mutating this one in place.
#[derive(Debug, Clone, Default)]
pub struct ZoneStore {
    records: HashMap<DomainName, HashMap<RecordType, RRSet>>,
    soas: HashMap<DomainName, (u32, SOA)>,
    nss: HashMap<DomainName, RRSet>,
}

impl ZoneStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an exact rrset.  Returns `None` if there is nothing of
    /// that type at that name (including if the name is not present
    /// at all).
    pub fn get(&self, name: &DomainName, rtype: RecordType) -> Option<&RRSet> {
        self.records.get(name)?.get(&rtype)
    }

    /// Does this name have any records of any type?
    pub fn has_any(&self, name: &DomainName) -> bool {
        self.records
            .get(name)
            .is_some_and(|by_type| !by_type.is_empty())
    }

    /// Find the apex which is authoritative for `name`: the longest
    /// suffix of `name` which is a registered zone origin.
    pub fn find_apex_for(&self, name: &DomainName) -> Option<DomainName> {
        for i in 0..name.labels.len() {
            let candidate = DomainName::from_labels(name.labels[i..].to_vec())?;
            if self.soas.contains_key(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    pub fn soa(&self, apex: &DomainName) -> Option<&(u32, SOA)> {
        self.soas.get(apex)
    }

    pub fn ns(&self, apex: &DomainName) -> Option<&RRSet> {
        self.nss.get(apex)
    }

    pub fn apexes(&self) -> impl Iterator<Item = &DomainName> {
        self.soas.keys()
    }

    /// Iterate over every owner name and its records, for loader-time
    /// validation (apex membership, CNAME exclusivity).
    pub fn iter_names(&self) -> impl Iterator<Item = (&DomainName, &HashMap<RecordType, RRSet>)> {
        self.records.iter()
    }

    /// Record a non-SOA, non-NS-at-apex value under `name`.
    pub(crate) fn insert(&mut self, name: DomainName, ttl: u32, value: RecordTypeWithData) {
        let rtype = value.rtype();
        let rrset = self.records.entry(name).or_default().entry(rtype).or_default();
        if !rrset.values.contains(&value) {
            rrset.push(ttl, value);
        }
    }

    /// Register `name` as a zone apex with the given SOA.  Returns
    /// the previously registered SOA, if `name` was already an apex
    /// (a conflict the loader must treat as fatal).
    pub(crate) fn insert_soa(&mut self, name: DomainName, ttl: u32, soa: SOA) -> Option<(u32, SOA)> {
        self.soas.insert(name, (ttl, soa))
    }

    /// Once a zone has been fully ingested, copy its apex's NS rrset
    /// into the `nss` map.  TTLs are left exactly as loaded: the SOA
    /// minimum governs negative-caching TTLs (RFC 2308), not a floor
    /// on positive records' own TTLs.
    pub(crate) fn finish_apex(&mut self, apex: &DomainName) {
        if !self.soas.contains_key(apex) {
            return;
        }

        if let Some(ns) = self.records.get(apex).and_then(|m| m.get(&RecordType::NS)) {
            self.nss.insert(apex.clone(), ns.clone());
        }
    }

    /// Merge `other` into `self`.  Used when a directory of zone
    /// files is loaded: every regular file in the directory
    /// contributes to the union of records, but two files defining
    /// conflicting SOAs for the same apex is a fatal error.
    pub(crate) fn merge(&mut self, other: ZoneStore) -> Result<(), DomainName> {
        for (apex, (ttl, soa)) in other.soas {
            if let Some((existing_ttl, existing_soa)) = self.soas.get(&apex) {
                if *existing_soa != soa || *existing_ttl != ttl {
                    return Err(apex);
                }
            } else {
                self.soas.insert(apex, (ttl, soa));
            }
        }

        for (name, by_type) in other.records {
            let entry = self.records.entry(name).or_default();
            for (rtype, rrset) in by_type {
                let mine = entry.entry(rtype).or_default();
                for (ttl, value) in rrset.iter() {
                    if !mine.values.contains(value) {
                        mine.push(ttl, value.clone());
                    }
                }
            }
        }

        for (apex, rrset) in other.nss {
            let mine = self.nss.entry(apex).or_default();
            for (ttl, value) in rrset.iter() {
                if !mine.values.contains(value) {
                    mine.push(ttl, value.clone());
                }
            }
        }

        Ok(())
    }
}

/// Start of a zone of authority (RFC 1035 section 3.3.13).
///
/// `refresh`/`retry`/`expire` are carried as signed values, matching
/// common zone-file conventions; see the wire type for the encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SOA {
    pub mname: DomainName,
    pub rname: DomainName,
    pub serial: u32,
    pub refresh: i32,
    pub retry: i32,
    pub expire: i32,
    pub minimum: u32,
}

impl SOA {
    pub fn to_rdata(&self) -> RecordTypeWithData {
        RecordTypeWithData::SOA {
            mname: self.mname.clone(),
            rname: self.rname.clone(),
            serial: self.serial,
            refresh: self.refresh,
            retry: self.retry,
            expire: self.expire,
            minimum: self.minimum,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::test_util::*;
    use std::net::Ipv4Addr;

    fn soa(minimum: u32) -> SOA {
        SOA {
            mname: domain("ns1.example.com."),
            rname: domain("hostmaster.example.com."),
            serial: 1,
            refresh: 3600,
            retry: 600,
            expire: 86400,
            minimum,
        }
    }

    #[test]
    fn find_apex_for_longest_suffix() {
        let mut store = ZoneStore::new();
        store.insert_soa(domain("example.com."), 300, soa(300));
        store.insert_soa(domain("sub.example.com."), 300, soa(300));

        assert_eq!(
            Some(domain("sub.example.com.")),
            store.find_apex_for(&domain("www.sub.example.com."))
        );
        assert_eq!(
            Some(domain("example.com.")),
            store.find_apex_for(&domain("other.example.com."))
        );
        assert_eq!(None, store.find_apex_for(&domain("example.net.")));
    }

    #[test]
    fn rrset_ttl_collapses_to_minimum() {
        let mut store = ZoneStore::new();
        let name = domain("www.example.com.");
        store.insert(
            name.clone(),
            600,
            RecordTypeWithData::A {
                address: Ipv4Addr::new(192, 0, 2, 1),
            },
        );
        store.insert(
            name.clone(),
            60,
            RecordTypeWithData::A {
                address: Ipv4Addr::new(192, 0, 2, 2),
            },
        );

        let rrset = store.get(&name, RecordType::A).unwrap();
        assert_eq!(60, rrset.ttl());
        assert_eq!(2, rrset.len());
    }

    #[test]
    fn finish_apex_leaves_record_ttls_untouched() {
        let mut store = ZoneStore::new();
        let apex = domain("example.com.");
        store.insert_soa(apex.clone(), 60, soa(300));
        store.insert(
            domain("www.example.com."),
            60,
            RecordTypeWithData::A {
                address: Ipv4Addr::new(192, 0, 2, 1),
            },
        );
        store.finish_apex(&apex);

        let rrset = store.get(&domain("www.example.com."), RecordType::A).unwrap();
        assert_eq!(60, rrset.ttl());
    }

    #[test]
    fn finish_apex_copies_ns_rrset() {
        let mut store = ZoneStore::new();
        let apex = domain("example.com.");
        store.insert_soa(apex.clone(), 300, soa(300));
        store.insert(
            apex.clone(),
            300,
            RecordTypeWithData::NS {
                nsdname: domain("ns1.example.com."),
            },
        );
        store.finish_apex(&apex);

        assert!(store.ns(&apex).is_some());
    }

    #[test]
    fn merge_rejects_conflicting_soa() {
        let mut a = ZoneStore::new();
        a.insert_soa(domain("example.com."), 300, soa(300));

        let mut b = ZoneStore::new();
        b.insert_soa(domain("example.com."), 300, soa(600));

        assert_eq!(Err(domain("example.com.")), a.merge(b));
    }

    #[test]
    fn merge_unions_records() {
        let mut a = ZoneStore::new();
        a.insert_soa(domain("example.com."), 300, soa(300));
        a.insert(
            domain("www.example.com."),
            300,
            RecordTypeWithData::A {
                address: Ipv4Addr::new(192, 0, 2, 1),
            },
        );

        let mut b = ZoneStore::new();
        b.insert_soa(domain("example.com."), 300, soa(300));
        b.insert(
            domain("api.example.com."),
            300,
            RecordTypeWithData::A {
                address: Ipv4Addr::new(192, 0, 2, 2),
            },
        );

        a.merge(b).unwrap();

        assert!(a.get(&domain("www.example.com."), RecordType::A).is_some());
        assert!(a.get(&domain("api.example.com."), RecordType::A).is_some());
    }

    #[test]
    fn insert_deduplicates_identical_values() {
        let mut store = ZoneStore::new();
        let name = domain("www.example.com.");
        let value = RecordTypeWithData::A {
            address: Ipv4Addr::new(192, 0, 2, 1),
        };
        store.insert(name.clone(), 300, value.clone());
        store.insert(name.clone(), 300, value);

        assert_eq!(1, store.get(&name, RecordType::A).unwrap().len());
    }
}
