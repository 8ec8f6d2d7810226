use super::types::*;
use std::fmt;

impl Message {
    pub fn serialise(&self) -> Result<Vec<u8>, Error> {
        let mut buffer = WritableBuffer::default();

        self.header.serialise(
            usize_to_u16(self.questions.len())?,
            usize_to_u16(self.answers.len())?,
            usize_to_u16(self.authority.len())?,
            usize_to_u16(self.additional.len())?,
            &mut buffer,
        );

        for question in &self.questions {
            question.serialise(&mut buffer);
        }
        for rr in &self.answers {
            rr.serialise(&mut buffer)?;
        }
        for rr in &self.authority {
            rr.serialise(&mut buffer)?;
        }
        for rr in &self.additional {
            rr.serialise(&mut buffer)?;
        }

        Ok(buffer.octets)
    }

    /// Drop sections, in the order additional, authority, answer,
    /// until the serialised message fits within `max_octets` (or
    /// there is nothing left to drop).  Sets the truncated flag if
    /// anything was dropped.  Never drops the header or question.
    pub fn truncate_to(&mut self, max_octets: usize) {
        loop {
            match self.serialise() {
                Ok(octets) if octets.len() <= max_octets => return,
                Err(_) => {
                    // counts overflowed u16, drop sections until they fit
                }
                _ => {}
            }

            if !self.additional.is_empty() {
                self.additional.pop();
            } else if !self.authority.is_empty() {
                self.authority.pop();
            } else if !self.answers.is_empty() {
                self.answers.pop();
            } else {
                self.header.is_truncated = true;
                return;
            }
            self.header.is_truncated = true;
        }
    }
}

impl Header {
    pub fn serialise(
        &self,
        qdcount: u16,
        ancount: u16,
        nscount: u16,
        arcount: u16,
        buffer: &mut WritableBuffer,
    ) {
        buffer.write_u16(self.id);

        let mut flags1 = 0b0000_0000;
        if self.is_response {
            flags1 |= HEADER_MASK_QR;
        }
        flags1 |= u8::from(self.opcode) << HEADER_OFFSET_OPCODE;
        if self.is_authoritative {
            flags1 |= HEADER_MASK_AA;
        }
        if self.is_truncated {
            flags1 |= HEADER_MASK_TC;
        }
        if self.recursion_desired {
            flags1 |= HEADER_MASK_RD;
        }
        buffer.write_u8(flags1);

        let mut flags2 = 0b0000_0000;
        if self.recursion_available {
            flags2 |= HEADER_MASK_RA;
        }
        flags2 |= u8::from(self.rcode) << HEADER_OFFSET_RCODE;
        buffer.write_u8(flags2);

        buffer.write_u16(qdcount);
        buffer.write_u16(ancount);
        buffer.write_u16(nscount);
        buffer.write_u16(arcount);
    }
}

impl Question {
    pub fn serialise(&self, buffer: &mut WritableBuffer) {
        self.name.serialise(buffer);
        self.qtype.serialise(buffer);
        self.qclass.serialise(buffer);
    }
}

impl ResourceRecord {
    pub fn serialise(&self, buffer: &mut WritableBuffer) -> Result<(), Error> {
        self.name.serialise(buffer);
        self.rtype_with_data.rtype().serialise(buffer);
        self.rclass.serialise(buffer);
        buffer.write_u32(self.ttl);

        // reserve space for the rdlength, to be backpatched once the
        // rdata has been written
        let rdlength_index = buffer.index;
        buffer.write_u16(0);

        let rdata_start = buffer.index;
        match &self.rtype_with_data {
            RecordTypeWithData::A { address } => {
                buffer.write_octets(&address.octets());
            }
            RecordTypeWithData::NS { nsdname } => {
                nsdname.serialise(buffer);
            }
            RecordTypeWithData::MD { madname } => {
                madname.serialise(buffer);
            }
            RecordTypeWithData::MF { madname } => {
                madname.serialise(buffer);
            }
            RecordTypeWithData::CNAME { cname } => {
                cname.serialise(buffer);
            }
            RecordTypeWithData::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                mname.serialise(buffer);
                rname.serialise(buffer);
                buffer.write_u32(*serial);
                buffer.write_u32(*refresh as u32);
                buffer.write_u32(*retry as u32);
                buffer.write_u32(*expire as u32);
                buffer.write_u32(*minimum);
            }
            RecordTypeWithData::MB { madname } => {
                madname.serialise(buffer);
            }
            RecordTypeWithData::MG { mdmname } => {
                mdmname.serialise(buffer);
            }
            RecordTypeWithData::MR { newname } => {
                newname.serialise(buffer);
            }
            RecordTypeWithData::NULL { octets } => {
                buffer.write_octets(octets);
            }
            RecordTypeWithData::WKS { octets } => {
                buffer.write_octets(octets);
            }
            RecordTypeWithData::PTR { ptrdname } => {
                ptrdname.serialise(buffer);
            }
            RecordTypeWithData::HINFO { octets } => {
                buffer.write_octets(octets);
            }
            RecordTypeWithData::MINFO { rmailbx, emailbx } => {
                rmailbx.serialise(buffer);
                emailbx.serialise(buffer);
            }
            RecordTypeWithData::MX {
                preference,
                exchange,
            } => {
                buffer.write_u16(*preference);
                exchange.serialise(buffer);
            }
            RecordTypeWithData::TXT { strings } => {
                for s in strings {
                    let len = usize_to_u16(s.len())?;
                    if len > 255 {
                        return Err(Error::CharacterStringTooLong(len));
                    }
                    buffer.write_u8(len as u8);
                    buffer.write_octets(s);
                }
            }
            RecordTypeWithData::AAAA { address } => {
                buffer.write_octets(&address.octets());
            }
            RecordTypeWithData::SRV {
                priority,
                weight,
                port,
                target,
            } => {
                buffer.write_u16(*priority);
                buffer.write_u16(*weight);
                buffer.write_u16(*port);
                target.serialise(buffer);
            }
            RecordTypeWithData::CAA { flags, tag, value } => {
                buffer.write_u8(*flags);
                let tag_bytes = tag.as_bytes();
                buffer.write_u8(usize_to_u16(tag_bytes.len())? as u8);
                buffer.write_octets(tag_bytes);
                buffer.write_octets(value.as_bytes());
            }
            RecordTypeWithData::Unknown { octets, .. } => {
                buffer.write_octets(octets);
            }
        }
        let rdata_stop = buffer.index;

        let rdlength = usize_to_u16(rdata_stop - rdata_start)?;
        buffer.octets[rdlength_index] = (rdlength >> 8) as u8;
        buffer.octets[rdlength_index + 1] = (rdlength & 0xFF) as u8;

        Ok(())
    }
}

impl DomainName {
    // TODO: implement compression - this'll need some extra state in
    // the WritableBuffer to keep track of previously-written domains
    // and labels.
    pub fn serialise(&self, buffer: &mut WritableBuffer) {
        for label in &self.labels {
            buffer.write_u8(label.len());
            buffer.write_octets(label.octets());
        }
    }
}

impl QueryType {
    pub fn serialise(&self, buffer: &mut WritableBuffer) {
        buffer.write_u16((*self).into());
    }
}

impl QueryClass {
    pub fn serialise(&self, buffer: &mut WritableBuffer) {
        buffer.write_u16((*self).into());
    }
}

impl RecordType {
    pub fn serialise(&self, buffer: &mut WritableBuffer) {
        buffer.write_u16((*self).into());
    }
}

impl RecordClass {
    pub fn serialise(&self, buffer: &mut WritableBuffer) {
        buffer.write_u16((*self).into());
    }
}

/// Errors that can occur during serialisation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Error {
    /// A counter (number of questions/answers/etc, or an rdlength)
    /// does not fit into the bits available for it on the wire.
    CounterTooLarge { counter: usize, bits: u32 },

    /// A TXT character-string is longer than 255 octets.
    CharacterStringTooLong(u16),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::CounterTooLarge { counter, bits } => {
                write!(f, "cannot fit counter {counter} into {bits} bits")
            }
            Error::CharacterStringTooLong(len) => {
                write!(f, "character-string of length {len} exceeds 255 octets")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

fn usize_to_u16(value: usize) -> Result<u16, Error> {
    value.try_into().map_err(|_| Error::CounterTooLarge {
        counter: value,
        bits: 16,
    })
}

/// A simple append-only output buffer used when writing a `Message`
/// to the wire.
#[derive(Debug, Default, Clone, Eq, PartialEq, Hash)]
pub struct WritableBuffer {
    pub octets: Vec<u8>,
    pub index: usize,
}

impl WritableBuffer {
    pub fn write_u8(&mut self, octet: u8) {
        self.octets.push(octet);
        self.index += 1;
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_u8((value >> 8) as u8);
        self.write_u8((value & 0xFF) as u8);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_u8((value >> 24) as u8);
        self.write_u8((value >> 16 & 0xFF) as u8);
        self.write_u8((value >> 8 & 0xFF) as u8);
        self.write_u8((value & 0xFF) as u8);
    }

    pub fn write_octets(&mut self, octets: &[u8]) {
        self.octets.extend_from_slice(octets);
        self.index += octets.len();
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_sets_rdlength() {
        let rr = ResourceRecord {
            name: domain("example.test."),
            rtype_with_data: RecordTypeWithData::MX {
                preference: 10,
                exchange: domain("mail.example.test."),
            },
            rclass: RecordClass::IN,
            ttl: 300,
        };

        let mut buffer = WritableBuffer::default();
        rr.serialise(&mut buffer).unwrap();

        // name (15) + type (2) + class (2) + ttl (4) + rdlength (2) = 25
        let rdlength_index = 25;
        let rdlength = ((buffer.octets[rdlength_index] as usize) << 8)
            | buffer.octets[rdlength_index + 1] as usize;

        // preference (2) + "mail.example.test." encoded = 2 + 20
        assert_eq!(rdlength, 22);
    }

    #[test]
    fn test_txt_multistring_roundtrip_length() {
        let rr = ResourceRecord {
            name: domain("example.test."),
            rtype_with_data: RecordTypeWithData::TXT {
                strings: vec![Bytes::from_static(b"hello"), Bytes::from_static(b"world")],
            },
            rclass: RecordClass::IN,
            ttl: 300,
        };

        let mut buffer = WritableBuffer::default();
        rr.serialise(&mut buffer).unwrap();

        // two length-prefixed strings: 1+5 + 1+5 = 12 octets of rdata
        let rdlength_index = buffer.octets.len() - 12 - 2;
        let rdlength = ((buffer.octets[rdlength_index] as usize) << 8)
            | buffer.octets[rdlength_index + 1] as usize;
        assert_eq!(rdlength, 12);
    }
}
