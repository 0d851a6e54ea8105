//! Locating and removing the CBOR metadata trailers solc appends to bytecode.
//!
//! A trailer is a CBOR map followed by its big-endian 2-byte length. Besides
//! the trailer at the very end, bytecode of contracts created via
//! `CREATE`/`CREATE2` embeds the child's code together with its own trailer,
//! so every occurrence is searched for, not only the last one.

use solidity_cbor_metadata::{Metadata, MAX_METADATA_ENTRIES};
use std::ops::Range;

/// Length of the big-endian suffix holding the size of the CBOR map.
const LENGTH_SUFFIX_SIZE: usize = 2;

/// Leading bytes of every CBOR map the decoder accepts.
const MAP_HEADERS: std::ops::RangeInclusive<u8> = 0xa1..=(0xa0 + MAX_METADATA_ENTRIES as u8);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataTrailer {
    /// Bytes of the trailer, including the length suffix.
    pub range: Range<usize>,
    pub metadata: Metadata,
}

/// Finds all non-overlapping metadata trailers in a single left-to-right scan.
pub fn find_trailers(code: &[u8]) -> Vec<MetadataTrailer> {
    let mut trailers = Vec::new();

    let mut i = 0;
    while i < code.len() {
        if !MAP_HEADERS.contains(&code[i]) {
            i += 1;
            continue;
        }
        match trailer_at(code, i) {
            Some(trailer) => {
                i = trailer.range.end;
                trailers.push(trailer);
            }
            None => i += 1,
        }
    }

    trailers
}

fn trailer_at(code: &[u8], start: usize) -> Option<MetadataTrailer> {
    let (metadata, size) = Metadata::from_cbor(&code[start..]).ok()?;

    let suffix_start = start + size;
    let end = suffix_start + LENGTH_SUFFIX_SIZE;
    if end > code.len() {
        return None;
    }
    let encoded_size = u16::from_be_bytes([code[suffix_start], code[suffix_start + 1]]) as usize;
    if encoded_size != size {
        return None;
    }

    Some(MetadataTrailer {
        range: start..end,
        metadata,
    })
}

/// Removes every metadata trailer, repeating the scan until none remain.
///
/// Returns the stripped code and the decoded records in the order they were removed.
pub fn split_metadata(code: &[u8]) -> (Vec<u8>, Vec<Metadata>) {
    let mut stripped = code.to_vec();
    let mut records = Vec::new();

    loop {
        let trailers = find_trailers(&stripped);
        if trailers.is_empty() {
            break;
        }

        let mut remaining = Vec::with_capacity(stripped.len());
        let mut position = 0;
        for trailer in trailers {
            remaining.extend_from_slice(&stripped[position..trailer.range.start]);
            position = trailer.range.end;
            records.push(trailer.metadata);
        }
        remaining.extend_from_slice(&stripped[position..]);
        stripped = remaining;
    }

    (stripped, records)
}

pub fn strip_metadata(code: &[u8]) -> Vec<u8> {
    split_metadata(code).0
}

/// Decodes all metadata records of the code. Absent or malformed CBOR
/// results in an empty list.
pub fn extract_metadata(code: &[u8]) -> Vec<Metadata> {
    split_metadata(code).1
}
