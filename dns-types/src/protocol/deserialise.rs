use super::types::*;
use bytes::Bytes;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

impl Message {
    pub fn from_octets(octets: &[u8]) -> Result<Self, Error> {
        let mut buffer = ConsumableBuffer {
            octets,
            position: 0,
        };
        Self::deserialise(&mut buffer)
    }

    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let wire_header = WireHeader::deserialise(buffer)?;

        let mut questions = Vec::with_capacity(wire_header.qdcount as usize);
        for _ in 0..wire_header.qdcount {
            questions.push(Question::deserialise(wire_header.header.id, buffer)?);
        }

        let mut answers = Vec::with_capacity(wire_header.ancount as usize);
        for _ in 0..wire_header.ancount {
            answers.push(ResourceRecord::deserialise(wire_header.header.id, buffer)?);
        }

        let mut authority = Vec::with_capacity(wire_header.nscount as usize);
        for _ in 0..wire_header.nscount {
            authority.push(ResourceRecord::deserialise(wire_header.header.id, buffer)?);
        }

        let mut additional = Vec::with_capacity(wire_header.arcount as usize);
        for _ in 0..wire_header.arcount {
            additional.push(ResourceRecord::deserialise(wire_header.header.id, buffer)?);
        }

        Ok(Self {
            header: wire_header.header,
            questions,
            answers,
            authority,
            additional,
        })
    }
}

struct WireHeader {
    header: Header,
    qdcount: u16,
    ancount: u16,
    nscount: u16,
    arcount: u16,
}

impl WireHeader {
    fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let id = buffer.next_u16().ok_or(Error::CompletelyBusted)?;
        let flags1 = buffer.next_u8().ok_or(Error::HeaderTooShort(id))?;
        let flags2 = buffer.next_u8().ok_or(Error::HeaderTooShort(id))?;
        let qdcount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;
        let ancount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;
        let nscount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;
        let arcount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;

        let header = Header {
            id,
            is_response: flags1 & HEADER_MASK_QR != 0,
            opcode: Opcode::from((flags1 & HEADER_MASK_OPCODE) >> HEADER_OFFSET_OPCODE),
            is_authoritative: flags1 & HEADER_MASK_AA != 0,
            is_truncated: flags1 & HEADER_MASK_TC != 0,
            recursion_desired: flags1 & HEADER_MASK_RD != 0,
            recursion_available: flags2 & HEADER_MASK_RA != 0,
            rcode: Rcode::from((flags2 & HEADER_MASK_RCODE) >> HEADER_OFFSET_RCODE),
        };

        Ok(Self {
            header,
            qdcount,
            ancount,
            nscount,
            arcount,
        })
    }
}

impl Question {
    fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let name = DomainName::deserialise(id, buffer)?;
        let qtype = QueryType::deserialise(id, buffer)?;
        let qclass = QueryClass::deserialise(id, buffer)?;

        Ok(Self { name, qtype, qclass })
    }
}

impl ResourceRecord {
    fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let name = DomainName::deserialise(id, buffer)?;
        let rtype = RecordType::deserialise(id, buffer)?;
        let rclass = RecordClass::deserialise(id, buffer)?;
        let ttl = buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?;
        let rdlength = buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?;

        let rdata_start = buffer.position;

        let mut raw_rdata = || -> Result<Bytes, Error> {
            buffer
                .take(rdlength as usize)
                .map(Bytes::copy_from_slice)
                .ok_or(Error::ResourceRecordTooShort(id))
        };

        let rtype_with_data = match rtype {
            RecordType::A => {
                let mut octets = [0u8; 4];
                for o in &mut octets {
                    *o = buffer.next_u8().ok_or(Error::ResourceRecordTooShort(id))?;
                }
                RecordTypeWithData::A {
                    address: Ipv4Addr::from(octets),
                }
            }
            RecordType::NS => RecordTypeWithData::NS {
                nsdname: DomainName::deserialise(id, buffer)?,
            },
            RecordType::MD => RecordTypeWithData::MD {
                madname: DomainName::deserialise(id, buffer)?,
            },
            RecordType::MF => RecordTypeWithData::MF {
                madname: DomainName::deserialise(id, buffer)?,
            },
            RecordType::CNAME => RecordTypeWithData::CNAME {
                cname: DomainName::deserialise(id, buffer)?,
            },
            RecordType::SOA => {
                let mname = DomainName::deserialise(id, buffer)?;
                let rname = DomainName::deserialise(id, buffer)?;
                let serial = buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?;
                let refresh = buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))? as i32;
                let retry = buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))? as i32;
                let expire = buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))? as i32;
                let minimum = buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?;
                RecordTypeWithData::SOA {
                    mname,
                    rname,
                    serial,
                    refresh,
                    retry,
                    expire,
                    minimum,
                }
            }
            RecordType::MB => RecordTypeWithData::MB {
                madname: DomainName::deserialise(id, buffer)?,
            },
            RecordType::MG => RecordTypeWithData::MG {
                mdmname: DomainName::deserialise(id, buffer)?,
            },
            RecordType::MR => RecordTypeWithData::MR {
                newname: DomainName::deserialise(id, buffer)?,
            },
            RecordType::NULL => RecordTypeWithData::NULL {
                octets: raw_rdata()?,
            },
            RecordType::WKS => RecordTypeWithData::WKS {
                octets: raw_rdata()?,
            },
            RecordType::PTR => RecordTypeWithData::PTR {
                ptrdname: DomainName::deserialise(id, buffer)?,
            },
            RecordType::HINFO => RecordTypeWithData::HINFO {
                octets: raw_rdata()?,
            },
            RecordType::MINFO => RecordTypeWithData::MINFO {
                rmailbx: DomainName::deserialise(id, buffer)?,
                emailbx: DomainName::deserialise(id, buffer)?,
            },
            RecordType::MX => {
                let preference = buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?;
                let exchange = DomainName::deserialise(id, buffer)?;
                RecordTypeWithData::MX {
                    preference,
                    exchange,
                }
            }
            RecordType::TXT => {
                let stop = rdata_start + rdlength as usize;
                let mut strings = Vec::new();
                while buffer.position < stop {
                    let len = buffer.next_u8().ok_or(Error::ResourceRecordTooShort(id))?;
                    let s = buffer
                        .take(len as usize)
                        .map(Bytes::copy_from_slice)
                        .ok_or(Error::ResourceRecordTooShort(id))?;
                    strings.push(s);
                }
                RecordTypeWithData::TXT { strings }
            }
            RecordType::AAAA => {
                let mut octets = [0u8; 16];
                for o in &mut octets {
                    *o = buffer.next_u8().ok_or(Error::ResourceRecordTooShort(id))?;
                }
                RecordTypeWithData::AAAA {
                    address: Ipv6Addr::from(octets),
                }
            }
            RecordType::SRV => {
                let priority = buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?;
                let weight = buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?;
                let port = buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?;
                let target = DomainName::deserialise(id, buffer)?;
                RecordTypeWithData::SRV {
                    priority,
                    weight,
                    port,
                    target,
                }
            }
            RecordType::CAA => {
                let flags = buffer.next_u8().ok_or(Error::ResourceRecordTooShort(id))?;
                let tag_len = buffer.next_u8().ok_or(Error::ResourceRecordTooShort(id))?;
                let tag_bytes = buffer
                    .take(tag_len as usize)
                    .ok_or(Error::ResourceRecordTooShort(id))?;
                let tag = String::from_utf8_lossy(tag_bytes).into_owned();
                let value_len = (rdata_start + rdlength as usize).saturating_sub(buffer.position);
                let value_bytes = buffer
                    .take(value_len)
                    .ok_or(Error::ResourceRecordTooShort(id))?;
                let value = String::from_utf8_lossy(value_bytes).into_owned();
                RecordTypeWithData::CAA { flags, tag, value }
            }
            RecordType::Unknown(tag) => RecordTypeWithData::Unknown {
                tag,
                octets: raw_rdata()?,
            },
        };

        let rdata_stop = buffer.position;
        if rdata_stop != rdata_start + rdlength as usize {
            return Err(Error::ResourceRecordInvalid(id));
        }

        Ok(Self {
            name,
            rtype_with_data,
            rclass,
            ttl,
        })
    }
}

impl DomainName {
    fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let start = buffer.position;
        let mut labels = Vec::new();
        let mut len = 0usize;

        loop {
            let label_len = buffer.next_u8().ok_or(Error::DomainTooShort(id))?;

            if label_len == 0 {
                labels.push(Label::new());
                len += 1;
                break;
            } else if label_len <= LABEL_MAX_LEN as u8 {
                let octets = buffer
                    .take(label_len as usize)
                    .ok_or(Error::DomainTooShort(id))?;
                let label = Label::try_from(octets).map_err(|_| Error::DomainLabelInvalid(id))?;
                len += 1 + label.len() as usize;
                labels.push(label);
            } else if label_len >= 192 {
                let lo = buffer.next_u8().ok_or(Error::DomainTooShort(id))?;
                let ptr = (((label_len & 0b0011_1111) as usize) << 8) | lo as usize;

                if ptr >= start {
                    return Err(Error::DomainPointerInvalid(id));
                }

                let mut pointed = buffer.at_offset(ptr);
                let rest = DomainName::deserialise(id, &mut pointed)?;
                for label in rest.labels {
                    len += 1 + label.len() as usize;
                    labels.push(label);
                }
                break;
            } else {
                return Err(Error::DomainLabelInvalid(id));
            }

            if len > DOMAINNAME_MAX_LEN {
                return Err(Error::DomainTooLong(id));
            }
        }

        if len > DOMAINNAME_MAX_LEN {
            return Err(Error::DomainTooLong(id));
        }

        DomainName::from_labels(labels).ok_or(Error::DomainLabelInvalid(id))
    }
}

impl QueryType {
    fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let value = buffer.next_u16().ok_or(Error::QuestionTooShort(id))?;
        Ok(QueryType::from(value))
    }
}

impl QueryClass {
    fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let value = buffer.next_u16().ok_or(Error::QuestionTooShort(id))?;
        Ok(QueryClass::from(value))
    }
}

impl RecordType {
    fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let value = buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?;
        Ok(RecordType::from(value))
    }
}

impl RecordClass {
    fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let value = buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?;
        Ok(RecordClass::from(value))
    }
}

/// Errors that can occur during deserialisation.  Every variant
/// except `CompletelyBusted` carries the message id, so a caller that
/// wants to reply with FORMERR can echo it back - a datagram that
/// fails before the id itself has been read cannot be replied to at
/// all and must be dropped silently.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Error {
    CompletelyBusted,
    HeaderTooShort(u16),
    QuestionTooShort(u16),
    ResourceRecordTooShort(u16),
    ResourceRecordInvalid(u16),
    DomainTooShort(u16),
    DomainTooLong(u16),
    DomainPointerInvalid(u16),
    DomainLabelInvalid(u16),
}

impl Error {
    pub fn id(&self) -> Option<u16> {
        match self {
            Error::CompletelyBusted => None,
            Error::HeaderTooShort(id)
            | Error::QuestionTooShort(id)
            | Error::ResourceRecordTooShort(id)
            | Error::ResourceRecordInvalid(id)
            | Error::DomainTooShort(id)
            | Error::DomainTooLong(id)
            | Error::DomainPointerInvalid(id)
            | Error::DomainLabelInvalid(id) => Some(*id),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::CompletelyBusted => write!(f, "could not parse message header"),
            Error::HeaderTooShort(_) => write!(f, "header too short"),
            Error::QuestionTooShort(_) => write!(f, "question too short"),
            Error::ResourceRecordTooShort(_) => write!(f, "resource record too short"),
            Error::ResourceRecordInvalid(_) => write!(f, "resource record rdlength mismatch"),
            Error::DomainTooShort(_) => write!(f, "domain name too short"),
            Error::DomainTooLong(_) => write!(f, "domain name too long"),
            Error::DomainPointerInvalid(_) => write!(f, "domain name compression pointer invalid"),
            Error::DomainLabelInvalid(_) => write!(f, "domain name label invalid"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// A cursor over a byte slice, used when parsing a `Message` from the
/// wire.  `at_offset` is used to follow domain name compression
/// pointers without disturbing the main cursor.
#[derive(Debug, Clone, Copy)]
pub struct ConsumableBuffer<'a> {
    pub octets: &'a [u8],
    pub position: usize,
}

impl<'a> ConsumableBuffer<'a> {
    pub fn next_u8(&mut self) -> Option<u8> {
        let octet = *self.octets.get(self.position)?;
        self.position += 1;
        Some(octet)
    }

    pub fn next_u16(&mut self) -> Option<u16> {
        let hi = self.next_u8()?;
        let lo = self.next_u8()?;
        Some(((hi as u16) << 8) | lo as u16)
    }

    pub fn next_u32(&mut self) -> Option<u32> {
        let a = self.next_u8()?;
        let b = self.next_u8()?;
        let c = self.next_u8()?;
        let d = self.next_u8()?;
        Some(((a as u32) << 24) | ((b as u32) << 16) | ((c as u32) << 8) | d as u32)
    }

    pub fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let octets = self.octets.get(self.position..self.position + len)?;
        self.position += len;
        Some(octets)
    }

    pub fn at_offset(&self, offset: usize) -> ConsumableBuffer<'a> {
        ConsumableBuffer {
            octets: self.octets,
            position: offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::*;
    use super::super::serialise::WritableBuffer;

    #[test]
    fn roundtrip_a_record() {
        let rr = a_record("example.test.", Ipv4Addr::new(192, 0, 2, 1));

        let mut buffer = WritableBuffer::default();
        rr.serialise(&mut buffer).unwrap();

        let mut cbuf = ConsumableBuffer {
            octets: &buffer.octets,
            position: 0,
        };
        let parsed = ResourceRecord::deserialise(1, &mut cbuf).unwrap();

        assert_eq!(rr, parsed);
    }

    #[test]
    fn compression_pointer_must_point_backwards() {
        // a pointer that targets itself or a later offset must be rejected
        let octets = vec![0xC0, 0x00];
        let mut cbuf = ConsumableBuffer {
            octets: &octets,
            position: 0,
        };
        assert_eq!(
            DomainName::deserialise(1, &mut cbuf),
            Err(Error::DomainPointerInvalid(1))
        );
    }

    #[test]
    fn malformed_header_has_no_id() {
        let octets = vec![0x00];
        let err = Message::from_octets(&octets).unwrap_err();
        assert_eq!(err.id(), None);
    }
}
