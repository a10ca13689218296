//! One-shot construction of the trie and rank-directory blobs.
//!
//! The builder consumes encoded entries in lexicographic order, each one
//! the reversed host, the tag delimiter, and the reversed decimal digits
//! of a blocklist ordinal. Shared prefixes collapse into letter runs as
//! the entries arrive; a path cache over the previous entry makes each
//! insert a single descent. Emission walks the finished tree in level
//! order, writing one unary child-count run per emitted entry followed by
//! the fixed-width letter stream, and finally summarizes the child-count
//! region with a rank directory.

use std::mem;

use log::debug;

use crate::codec::Codec;
use crate::config::Config;
use crate::directory::RankDirectory;
use crate::errors::{Error, Result};
use crate::flags;
use crate::stream::BitWriter;

// Header kinds of an emitted letter-stream entry.
const HDR_PLAIN: u8 = 0b00;
const HDR_FINAL: u8 = 0b01;
const HDR_COMPRESSED: u8 = 0b10;
const HDR_FLAG: u8 = 0b11;

/// The three artifacts of a build.
#[derive(Clone, Debug)]
pub struct BuildOutput {
    /// Trie blob: the unary child-count stream followed by the letter
    /// stream, as little-endian 16-bit units.
    pub td: Vec<u8>,
    /// Rank-directory blob over the child-count region.
    pub rd: Vec<u8>,
    /// Number of letter-stream entries. Required to open the trie.
    pub node_count: usize,
}

/// Builds the blobs from an iterator of lex-sorted encoded entries.
pub fn build<I>(inputs: I, config: &Config) -> Result<BuildOutput>
where
    I: IntoIterator<Item = Vec<u8>>,
{
    let mut builder = TrieBuilder::new(config.clone())?;
    for entry in inputs {
        builder.insert(&entry)?;
    }
    builder.emit()
}

// A node of the mutable build tree: a run of letters, the final marker,
// children ascending by first letter, and the terminal's tag bitmap.
#[derive(Debug, Default)]
struct BuildNode {
    letters: Vec<u8>,
    is_final: bool,
    children: Vec<usize>,
    flags: Vec<u16>,
}

/// Mutable trie under construction. Insert in lexicographic order, then
/// call [`TrieBuilder::emit`] once.
#[derive(Debug)]
pub struct TrieBuilder {
    config: Config,
    codec: Codec,
    nodes: Vec<BuildNode>,
    /// Nodes on the previous key's path, each with the key depth at the
    /// end of its letter run. The root `(0, 0)` is always present.
    path: Vec<(usize, usize)>,
    previous_key: Vec<u8>,
    entries_inserted: u64,
}

impl TrieBuilder {
    /// Creates an empty builder.
    pub fn new(config: Config) -> Result<TrieBuilder> {
        config.validate()?;
        let codec = config.codec();
        Ok(TrieBuilder {
            config,
            codec,
            nodes: vec![BuildNode::default()],
            path: vec![(0, 0)],
            previous_key: Vec::new(),
            entries_inserted: 0,
        })
    }

    /// Inserts one encoded entry. Entries must arrive in lexicographic
    /// order of their host part; the same host may repeat with further
    /// ordinals.
    pub fn insert(&mut self, entry: &[u8]) -> Result<()> {
        let delim = self.codec.delim();
        let at = entry
            .iter()
            .position(|&u| u == delim)
            .ok_or_else(|| Error::Domain("entry has no tag delimiter".to_string()))?;
        let (key, tag_units) = (&entry[..at], &entry[at + 1..]);
        if key.is_empty() {
            return Err(Error::Domain("entry has an empty host".to_string()));
        }
        let ordinal = self.parse_ordinal(tag_units)?;

        if key == &self.previous_key[..] {
            // same host, one more ordinal
            let (node, _) = *self.path.last().expect("path always holds the root");
            self.upsert_tag(node, ordinal);
            self.entries_inserted += 1;
            return Ok(());
        }
        if key < &self.previous_key[..] {
            return Err(Error::Domain(format!(
                "entries out of order: {:?} after {:?}",
                key, self.previous_key
            )));
        }

        let shared = key
            .iter()
            .zip(self.previous_key.iter())
            .take_while(|(a, b)| a == b)
            .count();

        // rewind the path to the node boundary at `shared`, splitting the
        // node that straddles it
        loop {
            let (node, end) = *self.path.last().expect("path always holds the root");
            if end <= shared {
                break;
            }
            let start = end - self.nodes[node].letters.len();
            if start < shared {
                self.split(node, shared - start);
                self.path.pop();
                self.path.push((node, shared));
                break;
            }
            self.path.pop();
        }

        let (parent, depth) = *self.path.last().expect("path always holds the root");
        debug_assert_eq!(depth, shared);

        // lex order guarantees the new suffix opens a fresh, rightmost child
        let terminal = self.nodes.len();
        self.nodes.push(BuildNode {
            letters: key[shared..].to_vec(),
            is_final: true,
            ..BuildNode::default()
        });
        self.nodes[parent].children.push(terminal);
        self.path.push((terminal, key.len()));
        self.upsert_tag(terminal, ordinal);

        self.previous_key.clear();
        self.previous_key.extend_from_slice(key);
        self.entries_inserted += 1;
        Ok(())
    }

    // Splits `node` after `keep` letters; the successor inherits the rest
    // of the run, the final marker, the children, and the tag bitmap.
    fn split(&mut self, node: usize, keep: usize) {
        let rest = self.nodes[node].letters.split_off(keep);
        debug_assert!(!rest.is_empty());
        let successor = BuildNode {
            letters: rest,
            is_final: self.nodes[node].is_final,
            children: mem::take(&mut self.nodes[node].children),
            flags: mem::take(&mut self.nodes[node].flags),
        };
        let id = self.nodes.len();
        self.nodes.push(successor);
        self.nodes[node].is_final = false;
        self.nodes[node].children.push(id);
    }

    fn upsert_tag(&mut self, node: usize, ordinal: u16) {
        let flags = &mut self.nodes[node].flags;
        if flags.is_empty() {
            *flags = flags::tags_to_flags(&[ordinal]);
        } else {
            *flags = flags::upsert(flags, ordinal);
        }
    }

    // The tag part of an entry: reversed decimal digits of the ordinal.
    fn parse_ordinal(&self, units: &[u8]) -> Result<u16> {
        if units.is_empty() {
            return Err(Error::Domain("entry has an empty tag".to_string()));
        }
        let digits: String = self.codec.decode(units)?.chars().rev().collect();
        let ordinal: u32 = digits
            .parse()
            .map_err(|_| Error::Domain(format!("bad tag ordinal {:?}", digits)))?;
        if ordinal > 255 {
            return Err(Error::Domain(format!(
                "blocklist ordinal {} does not fit the tag space",
                ordinal
            )));
        }
        Ok(ordinal as u16)
    }

    /// Emits the frozen artifacts and consumes the builder.
    pub fn emit(self) -> Result<BuildOutput> {
        let width = self.config.width();
        let mut writer = BitWriter::new();

        // the synthetic super-root owns one child: the root
        writer.write(0b10, 2);

        // level-order entry list; each slot is one letter-stream entry
        struct Emitted {
            header: u8,
            letter: u8,
            // the build node whose children this entry owns
            source: Option<usize>,
        }
        let mut emitted = vec![Emitted {
            header: HDR_PLAIN,
            letter: 0,
            source: Some(0),
        }];

        let mut at = 0;
        while at < emitted.len() {
            let source = emitted[at].source;
            at += 1;
            let node = match source {
                Some(id) => &self.nodes[id],
                None => {
                    writer.write(0, 1);
                    continue;
                }
            };

            let flag_units = self.flag_units(node)?;
            let letter_count: usize = node
                .children
                .iter()
                .map(|&c| self.nodes[c].letters.len())
                .sum();
            writer.write_ones((flag_units.len() + letter_count) as u64);
            writer.write(0, 1);

            for unit in flag_units {
                emitted.push(Emitted {
                    header: HDR_FLAG,
                    letter: unit,
                    source: None,
                });
            }
            for &child in &node.children {
                let run = &self.nodes[child];
                let last = run.letters.len() - 1;
                for (i, &letter) in run.letters.iter().enumerate() {
                    if i < last {
                        emitted.push(Emitted {
                            header: HDR_COMPRESSED,
                            letter,
                            source: None,
                        });
                    } else {
                        let owns = !run.children.is_empty() || !run.flags.is_empty();
                        emitted.push(Emitted {
                            header: if run.is_final { HDR_FINAL } else { HDR_PLAIN },
                            letter,
                            source: if owns { Some(child) } else { None },
                        });
                    }
                }
            }
        }

        let node_count = emitted.len();
        let num_bits = 2 * node_count as u64 + 1;
        debug_assert_eq!(num_bits, writer.pos(), "child-count stream length");

        for entry in &emitted {
            writer.write((entry.header as u32) << width | entry.letter as u32, width + 2);
        }

        let data = writer.into_buffer();
        let mut config = self.config;
        config.node_count = node_count;
        let directory = RankDirectory::build(&data, num_bits, &config)?;

        if config.debug {
            debug!(
                "emitted {} nodes from {} entries: td {} units, rd {} units",
                node_count,
                self.entries_inserted,
                data.unit_len(),
                directory.byte_len() / 2
            );
        }

        Ok(BuildOutput {
            td: data.to_bytes(),
            rd: directory.to_bytes(),
            node_count,
        })
    }

    // A terminal's flag children as code units: raw ordinals when the
    // inline form applies, bitmap words split into units otherwise.
    fn flag_units(&self, node: &BuildNode) -> Result<Vec<u8>> {
        if node.flags.is_empty() {
            return Ok(Vec::new());
        }
        let width = self.config.width();
        let tags = flags::flags_to_tags(&node.flags)?;
        if self.config.opt_flags
            && tags.len() <= flags::optflags_limit(width)
            && tags.iter().all(|&t| (t as u32) < 1 << width)
        {
            return Ok(tags.iter().map(|&t| t as u8).collect());
        }
        Ok(flags::words_to_units(&node.flags, width))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn entries(codec: Codec, hosts: &[(&str, u16)]) -> Vec<Vec<u8>> {
        let mut encoded: Vec<Vec<u8>> = hosts
            .iter()
            .map(|&(h, t)| codec.encode_entry(h, t).unwrap())
            .collect();
        encoded.sort();
        encoded
    }

    #[test]
    fn empty_build_is_a_lone_root() {
        let out = TrieBuilder::new(Config::default()).unwrap().emit().unwrap();
        assert_eq!(1, out.node_count);
        // child-count stream "10" + "0", then one all-zero 8-bit entry;
        // the single unit 0x8000 serializes low byte first
        assert_eq!(vec![0x00, 0x80], out.td);
    }

    #[test]
    fn single_host_shape() {
        let config = Config::default();
        let input = entries(config.codec(), &[("com", 5)]);
        let out = build(input, &config).unwrap();
        // root + run "moc" (3 entries) + one inline flag unit
        assert_eq!(5, out.node_count);
    }

    #[test]
    fn shared_suffixes_collapse() {
        let config = Config::default();
        let solo = build(entries(config.codec(), &[("bbc.co.uk", 3)]), &config).unwrap();
        let pair = build(
            entries(config.codec(), &[("bbc.co.uk", 3), ("gov.co.uk", 7)]),
            &config,
        )
        .unwrap();
        // the shared "ku.oc." run is stored once; the second host adds
        // its own three letters and flag unit
        assert_eq!(solo.node_count + 4, pair.node_count);
    }

    #[test]
    fn rejects_out_of_order_inserts() {
        let config = Config::default();
        let codec = config.codec();
        let mut builder = TrieBuilder::new(config).unwrap();
        builder
            .insert(&codec.encode_entry("example.com", 1).unwrap())
            .unwrap();
        let err = builder.insert(&codec.encode_entry("com", 1).unwrap());
        assert!(matches!(err, Err(Error::Domain(_))));
    }

    #[test]
    fn rejects_missing_delimiter() {
        let config = Config::default();
        let codec = config.codec();
        let mut builder = TrieBuilder::new(config).unwrap();
        let word = codec.encode("moc").unwrap();
        assert!(matches!(builder.insert(&word), Err(Error::Domain(_))));
    }

    #[test]
    fn rejects_bad_ordinals() {
        let config = Config::default();
        let codec = config.codec();
        let mut builder = TrieBuilder::new(config).unwrap();

        let mut no_digits = codec.encode("moc").unwrap();
        no_digits.push(codec.delim());
        assert!(builder.insert(&no_digits).is_err());

        let mut wide = codec.encode("moc").unwrap();
        wide.push(codec.delim());
        wide.extend(codec.encode("003").unwrap()); // reversed "300"
        assert!(builder.insert(&wide).is_err());
    }

    #[test]
    fn duplicate_hosts_merge_ordinals() {
        let config = Config::default();
        let codec = config.codec();
        let merged = build(
            entries(codec, &[("com", 1), ("com", 2), ("com", 3)]),
            &config,
        )
        .unwrap();
        // root + "moc" + three inline ordinals
        assert_eq!(7, merged.node_count);
    }

    #[test]
    fn optflags_upgrade_changes_layout() {
        let config = Config {
            use_codec6: true,
            ..Config::default()
        };
        let codec = config.codec();
        let four = build(
            entries(codec, &[("com", 1), ("com", 2), ("com", 3), ("com", 4)]),
            &config,
        )
        .unwrap();
        let five = build(
            entries(
                codec,
                &[("com", 1), ("com", 2), ("com", 3), ("com", 4), ("com", 5)],
            ),
            &config,
        )
        .unwrap();
        // four ordinals stay inline (4 flag units); the fifth forces the
        // bitmap form: header + one group word = 32 bits = 6 units
        assert_eq!(4 + 4, four.node_count);
        assert_eq!(4 + 6, five.node_count);
    }

    #[test]
    fn wide_ordinal_forces_bitmap_under_codec6() {
        let config = Config {
            use_codec6: true,
            ..Config::default()
        };
        let codec = config.codec();
        let out = build(entries(codec, &[("com", 200)]), &config).unwrap();
        // 200 does not fit a 6-bit unit: header + group word = 6 units
        assert_eq!(4 + 6, out.node_count);
    }

    #[test]
    fn blob_lengths_match_node_count() {
        let config = Config::default();
        let out = build(
            entries(
                config.codec(),
                &[("com", 1), ("example.com", 1), ("www.example.com", 1)],
            ),
            &config,
        )
        .unwrap();
        let bits = 2 * out.node_count as u64 + 1 + out.node_count as u64 * 8;
        assert_eq!(((bits + 15) / 16 * 2) as usize, out.td.len());
    }
}
