//! Two-level tag bitmaps and their code-unit packing.
//!
//! A set of blocklist ordinals in `[0, 256)` is encoded as a 16-bit
//! header word followed by one 16-bit word per populated 16-slot group:
//! header bit `15 - g` marks group `g = k / 16` populated, and group-word
//! bit `15 - p` marks ordinal `16·g + p` present. The header's popcount
//! always equals the number of group words that follow.

use crate::errors::{Error, Result};
use crate::popcount::count_ones_u16;

/// Encodes a set of blocklist ordinals as header plus group words.
pub fn tags_to_flags(tags: &[u16]) -> Vec<u16> {
    let mut words = vec![0u16];
    for &tag in tags {
        words = upsert(&words, tag);
    }
    words
}

/// ORs one ordinal into an existing bitmap, splicing in a new group word
/// when its group was empty.
pub fn upsert(words: &[u16], tag: u16) -> Vec<u16> {
    debug_assert!(tag < 256);
    debug_assert!(!words.is_empty());

    let group = (tag >> 4) as usize;
    let slot = tag & 15;
    let group_mask = 0x8000u16 >> group;
    let slot_mask = 0x8000u16 >> slot;

    // groups strictly above this one occupy the header's high `group` bits
    let higher = if group == 0 { 0 } else { words[0] & !(0xFFFFu16 >> group) };
    let offset = 1 + count_ones_u16(higher) as usize;

    let mut out = words.to_vec();
    if words[0] & group_mask != 0 {
        out[offset] |= slot_mask;
    } else {
        out[0] |= group_mask;
        out.insert(offset, slot_mask);
    }
    out
}

/// Decodes header plus group words back into the ordinal set, ascending.
pub fn flags_to_tags(words: &[u16]) -> Result<Vec<u16>> {
    let header = match words.first() {
        Some(&h) => h,
        None => return Err(Error::Domain("empty tag bitmap".to_string())),
    };
    if count_ones_u16(header) as usize != words.len() - 1 {
        return Err(Error::Domain(format!(
            "tag bitmap header {:#06x} claims {} groups but {} words follow",
            header,
            count_ones_u16(header),
            words.len() - 1
        )));
    }

    let mut tags = Vec::new();
    let mut next = 1;
    for group in 0..16u16 {
        if header & (0x8000 >> group) == 0 {
            continue;
        }
        let word = words[next];
        next += 1;
        for slot in 0..16u16 {
            if word & (0x8000 >> slot) != 0 {
                tags.push(group << 4 | slot);
            }
        }
    }
    Ok(tags)
}

/// Splits bitmap words into width-bit code units for storage as the
/// letters of a node's flag children.
///
/// Under the 8-bit codec each word becomes two big-endian bytes. Under
/// the 6-bit codec the concatenated word bit-stream is chunked into
/// 6-bit units MSB-first; the tail unit is zero-padded.
pub fn words_to_units(words: &[u16], width: u32) -> Vec<u8> {
    match width {
        8 => words
            .iter()
            .flat_map(|&w| vec![(w >> 8) as u8, (w & 0xFF) as u8])
            .collect(),
        6 => {
            let mut units = Vec::with_capacity((words.len() * 16 + 5) / 6);
            let mut acc = 0u32;
            let mut nbits = 0u32;
            for &w in words {
                acc = acc << 16 | w as u32;
                nbits += 16;
                while nbits >= 6 {
                    units.push((acc >> (nbits - 6) & 0x3F) as u8);
                    nbits -= 6;
                }
            }
            if nbits > 0 {
                units.push((acc << (6 - nbits) & 0x3F) as u8);
            }
            units
        }
        _ => unreachable!("letter width is 6 or 8"),
    }
}

/// Reassembles bitmap words from width-bit flag letters. Trailing pad
/// bits (fewer than 16) are dropped.
pub fn units_to_words(units: &[u8], width: u32) -> Result<Vec<u16>> {
    match width {
        8 => {
            if units.len() % 2 != 0 {
                return Err(Error::Domain(format!(
                    "odd number of 8-bit flag units: {}",
                    units.len()
                )));
            }
            Ok(units
                .chunks(2)
                .map(|pair| (pair[0] as u16) << 8 | pair[1] as u16)
                .collect())
        }
        6 => {
            let mut words = Vec::with_capacity(units.len() * 6 / 16);
            let mut acc = 0u32;
            let mut nbits = 0u32;
            for &u in units {
                acc = acc << 6 | (u & 0x3F) as u32;
                nbits += 6;
                if nbits >= 16 {
                    words.push((acc >> (nbits - 16) & 0xFFFF) as u16);
                    nbits -= 16;
                }
            }
            Ok(words)
        }
        _ => unreachable!("letter width is 6 or 8"),
    }
}

/// Largest tag count the inline (optflags) form can hold.
///
/// Below this count the builder stores raw ordinals instead of a bitmap,
/// one per flag child, and the reader tells the two forms apart by the
/// flag-child count alone: a bitmap is never shorter than 4 units under
/// the 8-bit codec or 6 units under the 6-bit codec.
#[inline]
pub fn optflags_limit(width: u32) -> usize {
    if width == 6 {
        4
    } else {
        3
    }
}
