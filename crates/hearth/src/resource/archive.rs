//! The resource-archive wire format: a concatenation of
//! `{path_hash: u32 LE, data_size: u64 LE, data: [u8; data_size]}` records.

use std::io::{self, Read, Write};

/// Jenkins one-at-a-time hash, the well-known public-domain algorithm. All
/// arithmetic wraps deliberately — this mirrors fixed-width integer hashing
/// rather than a checked computation.
pub fn jenkins_one_at_a_time(bytes: &[u8]) -> u32 {
	let mut hash: u32 = 0;
	for &byte in bytes {
		hash = hash.wrapping_add(byte as u32);
		hash = hash.wrapping_add(hash << 10);
		hash ^= hash >> 6;
	}
	hash = hash.wrapping_add(hash << 3);
	hash ^= hash >> 11;
	hash = hash.wrapping_add(hash << 15);
	hash
}

#[derive(Debug, Clone)]
pub struct ArchiveRecord {
	pub path_hash: u32,
	pub data: Vec<u8>,
}

/// Appends one record to an open archive file (development-mode `declare`).
pub fn append_record(writer: &mut impl Write, path_hash: u32, data: &[u8]) -> io::Result<()> {
	writer.write_all(&path_hash.to_le_bytes())?;
	writer.write_all(&(data.len() as u64).to_le_bytes())?;
	writer.write_all(data)?;
	Ok(())
}

/// Reads every record in an archive sequentially until EOF. A short
/// trailing read (a truncated final record) is silently dropped.
pub fn read_all_records(reader: &mut impl Read) -> io::Result<Vec<ArchiveRecord>> {
	let mut records = Vec::new();
	let mut header = [0u8; 12];

	loop {
		let mut filled = 0;
		while filled < header.len() {
			match reader.read(&mut header[filled..])? {
				0 => break,
				n => filled += n,
			}
		}
		if filled == 0 {
			break;
		}
		if filled < header.len() {
			break;
		}

		let path_hash = u32::from_le_bytes(header[0..4].try_into().unwrap());
		let data_size = u64::from_le_bytes(header[4..12].try_into().unwrap()) as usize;

		let mut data = vec![0u8; data_size];
		reader.read_exact(&mut data)?;

		records.push(ArchiveRecord { path_hash, data });
	}

	Ok(records)
}
