use std::fs;
use std::iter::Peekable;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::protocol::types::*;
use crate::zones::types::*;

/// `$INCLUDE` nests no deeper than this before being treated as a
/// parse error, to bound recursive or cyclic includes.
const MAX_INCLUDE_DEPTH: usize = 16;

/// Parse a zone file or a directory of zone files into a single
/// `ZoneStore`.
///
/// If `path` is a directory, every regular file in it is treated as
/// a zone file and merged by union of records: conflicting SOA
/// records for the same apex across files is a fatal error.  Files
/// are read in sorted order, though the resulting store does not
/// depend on that order.
///
/// # Errors
///
/// If any file cannot be read or parsed, or if validation fails.
pub fn load_path<P: AsRef<Path>>(path: P) -> Result<ZoneStore, Error> {
    let path = path.as_ref();

    let mut combined = ZoneStore::new();
    let mut apexes = Vec::new();

    if path.is_dir() {
        let mut paths: Vec<PathBuf> = fs::read_dir(path)
            .map_err(|error| Error::Io {
                path: path.to_path_buf(),
                message: error.to_string(),
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        for file in paths {
            let (store, mut file_apexes) = parse_raw_file(&file)?;
            combined
                .merge(store)
                .map_err(|apex| Error::ConflictingSoa { apex })?;
            apexes.append(&mut file_apexes);
        }
    } else {
        let (store, mut file_apexes) = parse_raw_file(path)?;
        combined = store;
        apexes.append(&mut file_apexes);
    }

    finish_and_validate(&mut combined, &apexes)?;
    Ok(combined)
}

/// Parse a single zone file (no `$INCLUDE` resolution across
/// directory boundaries beyond what the file itself requests) into a
/// standalone, validated `ZoneStore`.
///
/// # Errors
///
/// If the file cannot be read or parsed, or if validation fails.
pub fn parse_zone_file<P: AsRef<Path>>(path: P) -> Result<ZoneStore, Error> {
    let (mut store, apexes) = parse_raw_file(path.as_ref())?;
    finish_and_validate(&mut store, &apexes)?;
    Ok(store)
}

fn parse_raw_file(path: &Path) -> Result<(ZoneStore, Vec<DomainName>), Error> {
    let data = fs::read_to_string(path).map_err(|error| Error::Io {
        path: path.to_path_buf(),
        message: error.to_string(),
    })?;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut store = ZoneStore::new();
    let mut apexes = Vec::new();
    let mut ctx = ParseContext::default();
    parse_entries(&data, &base_dir, 0, &mut ctx, &mut store, &mut apexes)?;
    Ok((store, apexes))
}

fn finish_and_validate(store: &mut ZoneStore, apexes: &[DomainName]) -> Result<(), Error> {
    for apex in apexes {
        store.finish_apex(apex);
    }

    for (name, by_type) in store.iter_names() {
        if by_type.contains_key(&RecordType::CNAME) && by_type.len() > 1 {
            return Err(Error::CnameConflict { name: name.clone() });
        }
        if store.find_apex_for(name).is_none() {
            return Err(Error::NotSubdomainOfApex { name: name.clone() });
        }
    }

    for apex in apexes {
        if apex.labels.first().is_some_and(|l| l.is_wildcard()) {
            return Err(Error::WildcardSOA);
        }
        let has_ns = store.ns(apex).is_some_and(|rrset| !rrset.is_empty());
        if !has_ns {
            return Err(Error::ApexMissingNs { apex: apex.clone() });
        }
        if store
            .get(apex, RecordType::CNAME)
            .is_some_and(|rrset| !rrset.is_empty())
        {
            return Err(Error::CnameAtApex { apex: apex.clone() });
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Default)]
struct ParseContext {
    origin: Option<DomainName>,
    default_ttl: Option<u32>,
    previous_domain: Option<MaybeWildcard>,
    previous_ttl: Option<u32>,
}

fn parse_entries(
    data: &str,
    base_dir: &Path,
    depth: usize,
    ctx: &mut ParseContext,
    store: &mut ZoneStore,
    apexes: &mut Vec<DomainName>,
) -> Result<(), Error> {
    let mut stream = data.chars().peekable();
    while let Some(entry) = parse_entry(ctx, &mut stream)? {
        match entry {
            Entry::Origin { name } => ctx.origin = Some(name),
            Entry::Ttl { ttl } => ctx.default_ttl = Some(ttl),
            Entry::Include { path, origin } => {
                if depth + 1 >= MAX_INCLUDE_DEPTH {
                    return Err(Error::IncludeTooDeep);
                }
                let include_path = base_dir.join(&path);
                let include_data = fs::read_to_string(&include_path).map_err(|error| Error::Io {
                    path: include_path.clone(),
                    message: error.to_string(),
                })?;
                let include_base = include_path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| base_dir.to_path_buf());

                let mut inner_ctx = ParseContext {
                    origin: origin.or_else(|| ctx.origin.clone()),
                    default_ttl: ctx.default_ttl,
                    previous_domain: None,
                    previous_ttl: None,
                };
                parse_entries(
                    &include_data,
                    &include_base,
                    depth + 1,
                    &mut inner_ctx,
                    store,
                    apexes,
                )?;
            }
            Entry::RR { rr } => {
                ctx.previous_domain = Some(MaybeWildcard::Normal {
                    name: rr.name.clone(),
                });
                ctx.previous_ttl = Some(rr.ttl);
                insert_rr(store, apexes, rr)?;
            }
            Entry::WildcardRR { rr } => {
                ctx.previous_domain = Some(MaybeWildcard::Wildcard {
                    name: rr.name.clone(),
                });
                ctx.previous_ttl = Some(rr.ttl);
                if rr.rtype_with_data.rtype() == RecordType::SOA {
                    return Err(Error::WildcardSOA);
                }
                store.insert(rr.name, rr.ttl, rr.rtype_with_data);
            }
        }
    }
    Ok(())
}

fn insert_rr(store: &mut ZoneStore, apexes: &mut Vec<DomainName>, rr: ResourceRecord) -> Result<(), Error> {
    if let RecordTypeWithData::SOA {
        mname,
        rname,
        serial,
        refresh,
        retry,
        expire,
        minimum,
    } = rr.rtype_with_data
    {
        let soa = SOA {
            mname,
            rname,
            serial,
            refresh,
            retry,
            expire,
            minimum,
        };
        if store.insert_soa(rr.name.clone(), rr.ttl, soa).is_some() {
            return Err(Error::MultipleSOA { apex: rr.name });
        }
        apexes.push(rr.name);
    } else {
        store.insert(rr.name, rr.ttl, rr.rtype_with_data);
    }
    Ok(())
}

/// Parse a single entry, skipping comments and whitespace.  Entries
/// are of the form:
///
/// ```text
/// $ORIGIN <domain-name>
/// $TTL <ttl>
/// $INCLUDE <file-name> [<domain-name>]
/// <rr>
/// ```
///
/// Where `<rr>` is one of these forms:
///
/// ```text
/// <domain-name> <ttl>   <class> <type> <rdata>
/// <domain-name> <class> <ttl>   <type> <rdata>
/// <domain-name> <ttl>           <type> <rdata>
/// <domain-name>         <class> <type> <rdata>
/// <domain-name>                 <type> <rdata>
///               <ttl>   <class> <type> <rdata>
///               <class> <ttl>   <type> <rdata>
///               <ttl>           <type> <rdata>
///                       <class> <type> <rdata>
///                               <type> <rdata>
/// ```
///
/// If the `<domain-name>`, `<ttl>`, or `<class>` are missing, the
/// previous is used (so it is an error to omit it in the first RR).
/// Only `IN`-class records are supported.  If the TTL is missing
/// entirely - no previous TTL, no active `$TTL` directive - a SOA
/// record falls back to its own `minimum` field, per RFC 1035.
///
/// Returns `None` if the stream is empty.
fn parse_entry<I: Iterator<Item = char>>(
    ctx: &ParseContext,
    stream: &mut Peekable<I>,
) -> Result<Option<Entry>, Error> {
    loop {
        let tokens = tokenise_entry(stream)?;
        if tokens.is_empty() {
            if stream.peek().is_none() {
                return Ok(None);
            }
        } else if tokens[0].0 == "$ORIGIN" {
            return Ok(Some(parse_origin(&ctx.origin, tokens)?));
        } else if tokens[0].0 == "$TTL" {
            return Ok(Some(parse_ttl_directive(tokens)?));
        } else if tokens[0].0 == "$INCLUDE" {
            return Ok(Some(parse_include(&ctx.origin, tokens)?));
        } else {
            return Ok(Some(parse_rr(ctx, tokens)?));
        }
    }
}

fn parse_origin(origin: &Option<DomainName>, tokens: Vec<(String, Vec<u8>)>) -> Result<Entry, Error> {
    if tokens.len() != 2 {
        return Err(Error::WrongLen { tokens });
    }
    let name = parse_domain(origin, &tokens[1].0)?;
    Ok(Entry::Origin { name })
}

fn parse_ttl_directive(tokens: Vec<(String, Vec<u8>)>) -> Result<Entry, Error> {
    if tokens.len() != 2 {
        return Err(Error::WrongLen { tokens });
    }
    let ttl = parse_u32(&tokens[1].0)?;
    Ok(Entry::Ttl { ttl })
}

fn parse_include(origin: &Option<DomainName>, tokens: Vec<(String, Vec<u8>)>) -> Result<Entry, Error> {
    if tokens.len() != 2 && tokens.len() != 3 {
        return Err(Error::WrongLen { tokens });
    }
    let path = tokens[1].0.clone();
    let name = if tokens.len() == 3 {
        Some(parse_domain(origin, &tokens[2].0)?)
    } else {
        None
    };
    Ok(Entry::Include { path, origin: name })
}

fn parse_rr(ctx: &ParseContext, tokens: Vec<(String, Vec<u8>)>) -> Result<Entry, Error> {
    let origin = &ctx.origin;
    let previous_domain = &ctx.previous_domain;
    let previous_ttl = ctx.previous_ttl.or(ctx.default_ttl);

    if tokens.is_empty() {
        return Err(Error::WrongLen { tokens });
    }

    if tokens.len() >= 4 {
        if let Some(rtype_with_data) = try_parse_rtype_with_data(origin, &tokens[3..]) {
            let wname = parse_domain_or_wildcard(origin, &tokens[0].0)?;
            let ttl = if tokens[2].0 == "IN" {
                parse_u32(&tokens[1].0)?
            } else if tokens[1].0 == "IN" {
                parse_u32(&tokens[2].0)?
            } else {
                return Err(Error::Unexpected {
                    expected: "IN".to_string(),
                    tokens,
                });
            };
            return to_rr(wname, rtype_with_data, ttl);
        }
    }

    if tokens.len() >= 3 {
        if let Some(rtype_with_data) = try_parse_rtype_with_data(origin, &tokens[2..]) {
            return if tokens[1].0 == "IN" {
                if tokens[0].0.chars().all(|c| c.is_ascii_digit()) {
                    let ttl = parse_u32(&tokens[0].0)?;
                    if let Some(wname) = previous_domain {
                        to_rr(wname.clone(), rtype_with_data, ttl)
                    } else {
                        Err(Error::MissingDomainName { tokens })
                    }
                } else {
                    let wname = parse_domain_or_wildcard(origin, &tokens[0].0)?;
                    finish_with_ttl(wname, rtype_with_data, previous_ttl, tokens)
                }
            } else if tokens[0].0 == "IN" {
                let ttl = parse_u32(&tokens[1].0)?;
                if let Some(wname) = previous_domain {
                    to_rr(wname.clone(), rtype_with_data, ttl)
                } else {
                    Err(Error::MissingDomainName { tokens })
                }
            } else {
                let wname = parse_domain_or_wildcard(origin, &tokens[0].0)?;
                let ttl = parse_u32(&tokens[1].0)?;
                to_rr(wname, rtype_with_data, ttl)
            };
        }
    }

    if tokens.len() >= 2 {
        if let Some(rtype_with_data) = try_parse_rtype_with_data(origin, &tokens[1..]) {
            return if tokens[0].0 == "IN" {
                if let Some(wname) = previous_domain {
                    finish_with_ttl(wname.clone(), rtype_with_data, previous_ttl, tokens)
                } else {
                    Err(Error::MissingDomainName { tokens })
                }
            } else if tokens[0].0.chars().all(|c| c.is_ascii_digit()) {
                let ttl = parse_u32(&tokens[0].0)?;
                if let Some(wname) = previous_domain {
                    to_rr(wname.clone(), rtype_with_data, ttl)
                } else {
                    Err(Error::MissingDomainName { tokens })
                }
            } else {
                let wname = parse_domain_or_wildcard(origin, &tokens[0].0)?;
                finish_with_ttl(wname, rtype_with_data, previous_ttl, tokens)
            };
        }
    }

    if let Some(rtype_with_data) = try_parse_rtype_with_data(origin, &tokens[0..]) {
        return if let Some(wname) = previous_domain {
            finish_with_ttl(wname.clone(), rtype_with_data, previous_ttl, tokens)
        } else {
            Err(Error::MissingDomainName { tokens })
        };
    }

    Err(Error::MissingType { tokens })
}

fn finish_with_ttl(
    wname: MaybeWildcard,
    rtype_with_data: RecordTypeWithData,
    previous_ttl: Option<u32>,
    tokens: Vec<(String, Vec<u8>)>,
) -> Result<Entry, Error> {
    if let Some(ttl) = previous_ttl {
        to_rr(wname, rtype_with_data, ttl)
    } else if let RecordTypeWithData::SOA { minimum, .. } = rtype_with_data {
        to_rr(wname, rtype_with_data, minimum)
    } else {
        Err(Error::MissingTTL { tokens })
    }
}

/// Try to parse a record type with data.  Returns `None` if there is
/// no parse, since this does not necessarily indicate a fatal error.
fn try_parse_rtype_with_data(
    origin: &Option<DomainName>,
    tokens: &[(String, Vec<u8>)],
) -> Option<RecordTypeWithData> {
    if tokens.is_empty() {
        return None;
    }

    match RecordType::from_str(tokens[0].0.as_str()) {
        Ok(RecordType::A) if tokens.len() == 2 => match Ipv4Addr::from_str(&tokens[1].0) {
            Ok(address) => Some(RecordTypeWithData::A { address }),
            _ => None,
        },
        Ok(RecordType::NS) if tokens.len() == 2 => match parse_domain(origin, &tokens[1].0) {
            Ok(nsdname) => Some(RecordTypeWithData::NS { nsdname }),
            _ => None,
        },
        Ok(RecordType::MD) if tokens.len() == 2 => match parse_domain(origin, &tokens[1].0) {
            Ok(madname) => Some(RecordTypeWithData::MD { madname }),
            _ => None,
        },
        Ok(RecordType::MF) if tokens.len() == 2 => match parse_domain(origin, &tokens[1].0) {
            Ok(madname) => Some(RecordTypeWithData::MF { madname }),
            _ => None,
        },
        Ok(RecordType::CNAME) if tokens.len() == 2 => match parse_domain(origin, &tokens[1].0) {
            Ok(cname) => Some(RecordTypeWithData::CNAME { cname }),
            _ => None,
        },
        Ok(RecordType::SOA) if tokens.len() == 8 => match (
            parse_domain(origin, &tokens[1].0),
            parse_domain(origin, &tokens[2].0),
            u32::from_str(&tokens[3].0),
            i32::from_str(&tokens[4].0),
            i32::from_str(&tokens[5].0),
            i32::from_str(&tokens[6].0),
            u32::from_str(&tokens[7].0),
        ) {
            (Ok(mname), Ok(rname), Ok(serial), Ok(refresh), Ok(retry), Ok(expire), Ok(minimum)) => {
                Some(RecordTypeWithData::SOA {
                    mname,
                    rname,
                    serial,
                    refresh,
                    retry,
                    expire,
                    minimum,
                })
            }
            _ => None,
        },
        Ok(RecordType::MB) if tokens.len() == 2 => match parse_domain(origin, &tokens[1].0) {
            Ok(madname) => Some(RecordTypeWithData::MB { madname }),
            _ => None,
        },
        Ok(RecordType::MG) if tokens.len() == 2 => match parse_domain(origin, &tokens[1].0) {
            Ok(mdmname) => Some(RecordTypeWithData::MG { mdmname }),
            _ => None,
        },
        Ok(RecordType::MR) if tokens.len() == 2 => match parse_domain(origin, &tokens[1].0) {
            Ok(newname) => Some(RecordTypeWithData::MR { newname }),
            _ => None,
        },
        Ok(RecordType::NULL) if tokens.len() == 2 => Some(RecordTypeWithData::NULL {
            octets: tokens[1].1.clone(),
        }),
        Ok(RecordType::WKS) if tokens.len() == 2 => Some(RecordTypeWithData::WKS {
            octets: tokens[1].1.clone(),
        }),
        Ok(RecordType::PTR) if tokens.len() == 2 => match parse_domain(origin, &tokens[1].0) {
            Ok(ptrdname) => Some(RecordTypeWithData::PTR { ptrdname }),
            _ => None,
        },
        Ok(RecordType::HINFO) if tokens.len() == 2 => Some(RecordTypeWithData::HINFO {
            octets: tokens[1].1.clone(),
        }),
        Ok(RecordType::MINFO) if tokens.len() == 3 => match (
            parse_domain(origin, &tokens[1].0),
            parse_domain(origin, &tokens[2].0),
        ) {
            (Ok(rmailbx), Ok(emailbx)) => Some(RecordTypeWithData::MINFO { rmailbx, emailbx }),
            _ => None,
        },
        Ok(RecordType::MX) if tokens.len() == 3 => match (
            u16::from_str(&tokens[1].0),
            parse_domain(origin, &tokens[2].0),
        ) {
            (Ok(preference), Ok(exchange)) => Some(RecordTypeWithData::MX {
                preference,
                exchange,
            }),
            _ => None,
        },
        // an ordered list of character-strings, not a single blob
        Ok(RecordType::TXT) if tokens.len() >= 2 => Some(RecordTypeWithData::TXT {
            strings: tokens[1..].iter().map(|(_, octets)| octets.clone().into()).collect(),
        }),
        Ok(RecordType::AAAA) if tokens.len() == 2 => match Ipv6Addr::from_str(&tokens[1].0) {
            Ok(address) => Some(RecordTypeWithData::AAAA { address }),
            _ => None,
        },
        Ok(RecordType::SRV) if tokens.len() == 5 => match (
            u16::from_str(&tokens[1].0),
            u16::from_str(&tokens[2].0),
            u16::from_str(&tokens[3].0),
            parse_domain(origin, &tokens[4].0),
        ) {
            (Ok(priority), Ok(weight), Ok(port), Ok(target)) => Some(RecordTypeWithData::SRV {
                priority,
                weight,
                port,
                target,
            }),
            _ => None,
        },
        Ok(RecordType::CAA) if tokens.len() == 4 => match u8::from_str(&tokens[1].0) {
            Ok(flags) => Some(RecordTypeWithData::CAA {
                flags,
                tag: tokens[2].0.clone(),
                value: tokens[3].0.clone(),
            }),
            _ => None,
        },
        _ => None,
    }
}

/// Parse a regular or wildcard domain name.
fn parse_domain_or_wildcard(
    origin: &Option<DomainName>,
    dotted_string: &str,
) -> Result<MaybeWildcard, Error> {
    let dotted_string_vec = dotted_string.chars().collect::<Vec<char>>();

    if dotted_string_vec.is_empty() {
        return Err(Error::ExpectedDomainName {
            dotted_string: dotted_string.to_string(),
        });
    }

    if dotted_string == "*" {
        if let Some(name) = origin {
            Ok(MaybeWildcard::Wildcard { name: name.clone() })
        } else {
            Err(Error::ExpectedOrigin)
        }
    } else if dotted_string_vec.len() >= 2 && dotted_string_vec[0] == '*' && dotted_string_vec[1] == '.' {
        let name = if dotted_string_vec.len() == 2 {
            DomainName::root_domain()
        } else {
            parse_domain(origin, &dotted_string_vec[2..].iter().collect::<String>())?
        };
        Ok(MaybeWildcard::Wildcard { name })
    } else {
        let name = parse_domain(origin, dotted_string)?;
        Ok(MaybeWildcard::Normal { name })
    }
}

/// Parse a domain name, appending the origin if it's not absolute.
fn parse_domain(origin: &Option<DomainName>, dotted_string: &str) -> Result<DomainName, Error> {
    let dotted_string_vec = dotted_string.chars().collect::<Vec<char>>();

    if dotted_string_vec.is_empty() {
        return Err(Error::ExpectedDomainName {
            dotted_string: dotted_string.to_string(),
        });
    }

    if !dotted_string_vec.iter().all(char::is_ascii) {
        return Err(Error::ExpectedDomainName {
            dotted_string: dotted_string.to_string(),
        });
    }

    if dotted_string == "@" {
        if let Some(name) = origin {
            Ok(name.clone())
        } else {
            Err(Error::ExpectedOrigin)
        }
    } else if dotted_string_vec[dotted_string_vec.len() - 1] == '.' {
        DomainName::from_dotted_string(dotted_string).ok_or_else(|| Error::ExpectedDomainName {
            dotted_string: dotted_string.to_string(),
        })
    } else if let Some(name) = origin {
        DomainName::from_relative_dotted_string(name, dotted_string).ok_or_else(|| {
            Error::ExpectedDomainName {
                dotted_string: dotted_string.to_string(),
            }
        })
    } else {
        Err(Error::ExpectedOrigin)
    }
}

fn parse_u32(digits: &str) -> Result<u32, Error> {
    u32::from_str(digits).map_err(|_| Error::ExpectedU32 {
        digits: digits.to_string(),
    })
}

/// Helper for `parse_rr`
fn to_rr(wname: MaybeWildcard, rtype_with_data: RecordTypeWithData, ttl: u32) -> Result<Entry, Error> {
    match wname {
        MaybeWildcard::Normal { name } => Ok(Entry::RR {
            rr: ResourceRecord {
                name,
                rtype_with_data,
                rclass: RecordClass::IN,
                ttl,
            },
        }),
        MaybeWildcard::Wildcard { name } => {
            let owner = name.wildcard_owner().ok_or_else(|| Error::ExpectedDomainName {
                dotted_string: name.to_dotted_string(),
            })?;
            Ok(Entry::WildcardRR {
                rr: ResourceRecord {
                    name: owner,
                    rtype_with_data,
                    rclass: RecordClass::IN,
                    ttl,
                },
            })
        }
    }
}

/// Split an entry into tokens: split on whitespace, taking quoting
/// into account, and if there are parentheses or quotes continue to
/// the matched delimiter.
fn tokenise_entry<I: Iterator<Item = char>>(
    stream: &mut Peekable<I>,
) -> Result<Vec<(String, Vec<u8>)>, Error> {
    let mut tokens = Vec::new();
    let mut token_string = String::new();
    let mut token_octets = Vec::new();
    let mut state = State::Initial;
    let mut line_continuation = false;

    while let Some(c) = stream.next() {
        state = match (state, c) {
            (State::Initial, '\n') => {
                if line_continuation {
                    State::Initial
                } else {
                    break;
                }
            }
            (State::Initial, ';') => State::SkipToEndOfComment,
            (State::Initial, '(') => {
                if line_continuation {
                    return Err(Error::TokeniserUnexpected { unexpected: '(' });
                }
                line_continuation = true;
                State::Initial
            }
            (State::Initial, ')') => {
                if line_continuation {
                    line_continuation = false;
                    State::Initial
                } else {
                    return Err(Error::TokeniserUnexpected { unexpected: ')' });
                }
            }
            (State::Initial, '"') => State::QuotedString,
            (State::Initial, '\\') => {
                let octet = tokenise_escape(stream)?;
                token_string.push(octet as char);
                token_octets.push(octet);
                State::UnquotedString
            }
            (State::Initial, c) => {
                if c.is_whitespace() {
                    State::Initial
                } else if c.is_ascii() {
                    token_string.push(c);
                    token_octets.push(c as u8);
                    State::UnquotedString
                } else {
                    return Err(Error::TokeniserUnexpected { unexpected: c });
                }
            }

            (State::UnquotedString, '\n') => {
                if !token_string.is_empty() {
                    tokens.push((token_string, token_octets));
                    token_string = String::new();
                    token_octets = Vec::new();
                }
                if line_continuation {
                    State::Initial
                } else {
                    break;
                }
            }
            (State::UnquotedString, ';') => {
                if !token_string.is_empty() {
                    tokens.push((token_string, token_octets));
                    token_string = String::new();
                    token_octets = Vec::new();
                }
                State::SkipToEndOfComment
            }
            (State::UnquotedString, '\\') => {
                let octet = tokenise_escape(stream)?;
                token_string.push(octet as char);
                token_octets.push(octet);
                State::UnquotedString
            }
            (State::UnquotedString, c) => {
                if c.is_whitespace() {
                    if !token_string.is_empty() {
                        tokens.push((token_string, token_octets));
                        token_string = String::new();
                        token_octets = Vec::new();
                    }
                    State::Initial
                } else if c.is_ascii() {
                    token_string.push(c);
                    token_octets.push(c as u8);
                    State::UnquotedString
                } else {
                    return Err(Error::TokeniserUnexpected { unexpected: c });
                }
            }

            (State::SkipToEndOfComment, '\n') => {
                if line_continuation {
                    State::Initial
                } else {
                    break;
                }
            }
            (State::SkipToEndOfComment, _) => State::SkipToEndOfComment,

            (State::QuotedString, '"') => {
                tokens.push((token_string, token_octets));
                token_string = String::new();
                token_octets = Vec::new();
                State::Initial
            }
            (State::QuotedString, '\\') => {
                let octet = tokenise_escape(stream)?;
                token_string.push(octet as char);
                token_octets.push(octet);
                State::QuotedString
            }
            (State::QuotedString, c) => {
                if c.is_ascii() {
                    token_string.push(c);
                    token_octets.push(c as u8);
                } else {
                    return Err(Error::TokeniserUnexpected { unexpected: c });
                }
                State::QuotedString
            }
        }
    }

    if !token_string.is_empty() {
        tokens.push((token_string, token_octets));
    }

    Ok(tokens)
}

fn tokenise_escape<I: Iterator<Item = char>>(stream: &mut I) -> Result<u8, Error> {
    let Some(c1) = stream.next() else {
        return Err(Error::TokeniserUnexpectedEscape {
            unexpected: Vec::new(),
        });
    };
    let Some(d1) = c1.to_digit(10) else {
        return if c1.is_ascii() {
            Ok(c1 as u8)
        } else {
            Err(Error::TokeniserUnexpected { unexpected: c1 })
        };
    };
    let Some(c2) = stream.next() else {
        return Err(Error::TokeniserUnexpectedEscape {
            unexpected: vec![c1],
        });
    };
    let Some(d2) = c2.to_digit(10) else {
        return Err(Error::TokeniserUnexpectedEscape {
            unexpected: vec![c1, c2],
        });
    };
    let Some(c3) = stream.next() else {
        return Err(Error::TokeniserUnexpectedEscape {
            unexpected: vec![c1, c2],
        });
    };
    let Some(d3) = c3.to_digit(10) else {
        return Err(Error::TokeniserUnexpectedEscape {
            unexpected: vec![c1, c2, c3],
        });
    };
    u8::try_from(d1 * 100 + d2 * 10 + d3).map_err(|_| Error::TokeniserUnexpectedEscape {
        unexpected: vec![c1, c2, c3],
    })
}

/// States the tokeniser can be in
enum State {
    Initial,
    SkipToEndOfComment,
    UnquotedString,
    QuotedString,
}

/// A regular or wildcard domain
#[derive(Debug, Clone, PartialEq, Eq)]
enum MaybeWildcard {
    Normal { name: DomainName },
    Wildcard { name: DomainName },
}

/// An entry.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Origin { name: DomainName },
    Ttl { ttl: u32 },
    Include { path: String, origin: Option<DomainName> },
    RR { rr: ResourceRecord },
    WildcardRR { rr: ResourceRecord },
}

/// An error that can occur reading a zone file or directory of zone
/// files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Io {
        path: PathBuf,
        message: String,
    },
    IncludeTooDeep,
    TokeniserUnexpected {
        unexpected: char,
    },
    TokeniserUnexpectedEscape {
        unexpected: Vec<char>,
    },
    MultipleSOA {
        apex: DomainName,
    },
    WildcardSOA,
    ConflictingSoa {
        apex: DomainName,
    },
    NotSubdomainOfApex {
        name: DomainName,
    },
    CnameConflict {
        name: DomainName,
    },
    CnameAtApex {
        apex: DomainName,
    },
    ApexMissingNs {
        apex: DomainName,
    },
    Unexpected {
        expected: String,
        tokens: Vec<(String, Vec<u8>)>,
    },
    ExpectedU32 {
        digits: String,
    },
    ExpectedOrigin,
    ExpectedDomainName {
        dotted_string: String,
    },
    WrongLen {
        tokens: Vec<(String, Vec<u8>)>,
    },
    MissingType {
        tokens: Vec<(String, Vec<u8>)>,
    },
    MissingTTL {
        tokens: Vec<(String, Vec<u8>)>,
    },
    MissingDomainName {
        tokens: Vec<(String, Vec<u8>)>,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Io { path, message } => write!(f, "could not read '{}': {message}", path.display()),
            Error::IncludeTooDeep => write!(f, "$INCLUDE nesting too deep"),
            Error::TokeniserUnexpected { unexpected } => write!(f, "unexpected '{unexpected:?}'"),
            Error::TokeniserUnexpectedEscape { unexpected } => {
                write!(f, "unexpected escape '{unexpected:?}'")
            }
            Error::MultipleSOA { apex } => write!(f, "multiple SOA records for apex '{apex}'"),
            Error::WildcardSOA => write!(f, "wildcard SOA record not allowed"),
            Error::ConflictingSoa { apex } => {
                write!(f, "conflicting SOA records for apex '{apex}' across zone files")
            }
            Error::NotSubdomainOfApex { name } => {
                write!(f, "domain name '{name}' is not a subdomain of any known apex")
            }
            Error::CnameConflict { name } => {
                write!(f, "'{name}' has a CNAME record coexisting with other data")
            }
            Error::CnameAtApex { apex } => write!(f, "CNAME record not allowed at zone apex '{apex}'"),
            Error::ApexMissingNs { apex } => write!(f, "apex '{apex}' has no NS records"),
            Error::Unexpected { expected, .. } => write!(f, "expected '{expected:?}'"),
            Error::ExpectedU32 { digits } => write!(f, "expected u32, got '{digits:?}'"),
            Error::ExpectedOrigin => write!(f, "relative domain name used without origin"),
            Error::ExpectedDomainName { dotted_string } => {
                write!(f, "could not parse domain name '{dotted_string}'")
            }
            Error::WrongLen { .. } => write!(f, "zone file incomplete"),
            Error::MissingType { .. } => write!(f, "missing type in record definition"),
            Error::MissingTTL { .. } => write!(f, "missing TTL in record definition"),
            Error::MissingDomainName { .. } => write!(f, "missing domain name in record definition"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::test_util::*;
    use std::io::Write as _;

    fn write_tmp(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dns-types-zone-test-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn parse_basic_zone() {
        let path = write_tmp(
            "basic.zone",
            "$ORIGIN example.test.\n\
             $TTL 300\n\
             @    IN SOA ns1.example.test. hostmaster.example.test. 1 3600 600 86400 300\n\
             @    IN NS  ns1.example.test.\n\
             www  IN A   192.0.2.1\n",
        );

        let store = parse_zone_file(&path).unwrap();
        let apex = domain("example.test.");

        assert!(store.soa(&apex).is_some());
        assert!(store.ns(&apex).is_some());
        assert_eq!(
            1,
            store.get(&domain("www.example.test."), RecordType::A).unwrap().len()
        );
    }

    #[test]
    fn missing_ns_at_apex_is_rejected() {
        let path = write_tmp(
            "no-ns.zone",
            "$ORIGIN example.test.\n\
             @ 300 IN SOA ns1.example.test. hostmaster.example.test. 1 3600 600 86400 300\n",
        );

        assert!(matches!(
            parse_zone_file(&path),
            Err(Error::ApexMissingNs { .. })
        ));
    }

    #[test]
    fn cname_with_other_data_is_rejected() {
        let path = write_tmp(
            "cname-conflict.zone",
            "$ORIGIN example.test.\n\
             @     300 IN SOA ns1.example.test. hostmaster.example.test. 1 3600 600 86400 300\n\
             @     300 IN NS  ns1.example.test.\n\
             alias 300 IN CNAME www.example.test.\n\
             alias 300 IN A     192.0.2.1\n",
        );

        assert!(matches!(
            parse_zone_file(&path),
            Err(Error::CnameConflict { .. })
        ));
    }

    #[test]
    fn include_directive_splices_in_another_file() {
        let dir = std::env::temp_dir().join(format!("dns-types-zone-test-include-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let included = dir.join("records.zone");
        fs::write(&included, "www 300 IN A 192.0.2.1\n").unwrap();

        let main = dir.join("main.zone");
        fs::write(
            &main,
            "$ORIGIN example.test.\n\
             @ 300 IN SOA ns1.example.test. hostmaster.example.test. 1 3600 600 86400 300\n\
             @ 300 IN NS  ns1.example.test.\n\
             $INCLUDE records.zone\n",
        )
        .unwrap();

        let store = parse_zone_file(&main).unwrap();
        assert!(store.get(&domain("www.example.test."), RecordType::A).is_some());
    }

    #[test]
    fn directory_merge_rejects_conflicting_soa() {
        let dir = std::env::temp_dir().join(format!("dns-types-zone-test-dirmerge-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        fs::write(
            dir.join("a.zone"),
            "$ORIGIN example.test.\n\
             @ 300 IN SOA ns1.example.test. hostmaster.example.test. 1 3600 600 86400 300\n\
             @ 300 IN NS  ns1.example.test.\n",
        )
        .unwrap();
        fs::write(
            dir.join("b.zone"),
            "$ORIGIN example.test.\n\
             @ 300 IN SOA ns1.example.test. hostmaster.example.test. 2 3600 600 86400 300\n\
             @ 300 IN NS  ns1.example.test.\n",
        )
        .unwrap();

        assert!(matches!(
            load_path(&dir),
            Err(Error::ConflictingSoa { .. })
        ));
    }

    #[test]
    fn txt_record_is_parsed_as_string_list() {
        let path = write_tmp(
            "txt.zone",
            "$ORIGIN example.test.\n\
             @   300 IN SOA ns1.example.test. hostmaster.example.test. 1 3600 600 86400 300\n\
             @   300 IN NS  ns1.example.test.\n\
             txt 300 IN TXT \"hello\" \"world\"\n",
        );

        let store = parse_zone_file(&path).unwrap();
        let rrset = store.get(&domain("txt.example.test."), RecordType::TXT).unwrap();
        match &rrset.values()[0] {
            RecordTypeWithData::TXT { strings } => assert_eq!(2, strings.len()),
            other => panic!("expected TXT, got {other:?}"),
        }
    }
}
