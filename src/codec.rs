//! Host-string codecs over 6- and 8-bit code units.
//!
//! Keys are stored reversed so that common suffixes ("com", "co.uk")
//! collapse near the root. Two symbols are reserved in both codecs: the
//! tag delimiter, which separates the reversed host from the reversed
//! decimal digits of its blocklist ordinal in a build entry, and the
//! label separator (the period). The delimiter encodes below every host
//! symbol, so lexicographic order over encoded entries equals order over
//! (host, tag) pairs.

use crate::errors::{Error, Result};

/// The 64-symbol alphabet of the 6-bit codec, in code order.
const ALPHABET6: &[u8; 64] =
    b"#.-0123456789_abcdefghijklmnopqrstuvwxyz~ABCDEFGHIJKLMNOPQRSTUVW";

static INVERSE6: [i8; 256] = build_inverse();

const fn build_inverse() -> [i8; 256] {
    let mut table = [-1i8; 256];
    let mut i = 0;
    while i < 64 {
        table[ALPHABET6[i] as usize] = i as i8;
        i += 1;
    }
    table
}

/// A fixed-width code unit alphabet: 6 bits over a 64-symbol table, or
/// 8 bits raw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Codec {
    /// 6 bits per unit over a 64-symbol table.
    C6,
    /// 8 bits per unit, raw bytes.
    C8,
}

impl Codec {
    /// Bits per code unit.
    #[inline]
    pub fn width(self) -> u32 {
        match self {
            Codec::C6 => 6,
            Codec::C8 => 8,
        }
    }

    /// The encoded tag delimiter, `#`.
    #[inline]
    pub fn delim(self) -> u8 {
        match self {
            Codec::C6 => 0,
            Codec::C8 => b'#',
        }
    }

    /// The encoded label separator, `.`.
    #[inline]
    pub fn period(self) -> u8 {
        match self {
            Codec::C6 => 1,
            Codec::C8 => b'.',
        }
    }

    /// Encodes a string as code units, one unit per input byte.
    pub fn encode(self, text: &str) -> Result<Vec<u8>> {
        match self {
            Codec::C8 => Ok(text.bytes().collect()),
            Codec::C6 => text
                .bytes()
                .map(|b| match INVERSE6[b as usize] {
                    -1 => Err(Error::Domain(format!(
                        "symbol {:?} is outside the 6-bit alphabet",
                        b as char
                    ))),
                    v => Ok(v as u8),
                })
                .collect(),
        }
    }

    /// Decodes code units back to the original string.
    pub fn decode(self, units: &[u8]) -> Result<String> {
        match self {
            Codec::C8 => String::from_utf8(units.to_vec())
                .map_err(|e| Error::Domain(format!("invalid utf-8 in decoded key: {}", e))),
            Codec::C6 => units
                .iter()
                .map(|&u| {
                    if u < 64 {
                        Ok(ALPHABET6[u as usize] as char)
                    } else {
                        Err(Error::Domain(format!(
                            "unit {:#04x} is outside the 6-bit alphabet",
                            u
                        )))
                    }
                })
                .collect(),
        }
    }

    /// Encodes one build entry: the reversed host, the delimiter, and the
    /// reversed decimal digits of the blocklist ordinal.
    pub fn encode_entry(self, host: &str, ordinal: u16) -> Result<Vec<u8>> {
        if ordinal > 255 {
            return Err(Error::Domain(format!(
                "blocklist ordinal {} does not fit the tag space",
                ordinal
            )));
        }
        let reversed: String = host.chars().rev().collect();
        let digits: String = ordinal.to_string().chars().rev().collect();
        let mut units = self.encode(&reversed)?;
        units.push(self.delim());
        units.extend(self.encode(&digits)?);
        Ok(units)
    }

    /// Encodes an already-reversed host for lookup.
    pub fn encode_reversed(self, host: &str) -> Result<Vec<u8>> {
        let reversed: String = host.chars().rev().collect();
        self.encode(&reversed)
    }
}
