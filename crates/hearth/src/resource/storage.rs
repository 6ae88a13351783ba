//! A single archive file's loaded items plus the set of entities keeping it
//! resident. Unload always routes through one path (`unload`) so supplicant
//! accounting and the loaded flag can never drift apart.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;

use hashbrown::HashSet;

use crate::entity::EntityHandle;
use crate::error::HearthError;
use crate::resource::archive::{append_record, jenkins_one_at_a_time, read_all_records, ArchiveRecord};

/// Whether resource declarations may write new archive data. Defaults to
/// the `release_mode` Cargo feature, but is threaded through as a value
/// rather than hard-coded `cfg!` so a single test binary can exercise both
/// branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
	Development,
	Release,
}

impl Default for BuildMode {
	fn default() -> Self {
		if cfg!(feature = "release_mode") {
			BuildMode::Release
		} else {
			BuildMode::Development
		}
	}
}

pub struct ResourceStorage {
	archive_path: PathBuf,
	loaded: bool,
	items: Vec<ArchiveRecord>,
	supplicants: HashSet<EntityHandle>,
}

impl ResourceStorage {
	pub fn new(archive_path: PathBuf) -> Self {
		Self {
			archive_path,
			loaded: false,
			items: Vec::new(),
			supplicants: HashSet::default(),
		}
	}

	pub fn is_loaded(&self) -> bool {
		self.loaded
	}

	pub fn supplicant_count(&self) -> usize {
		self.supplicants.len()
	}

	/// Development mode: appends `source_bytes` to the archive under a
	/// header keyed by the hash of `resource_path`, then verifies the write
	/// landed. Release mode: verifies presence without writing.
	pub fn declare(&self, resource_path: &str, source_bytes: &[u8], mode: BuildMode) -> Result<bool, HearthError> {
		let hash = jenkins_one_at_a_time(resource_path.as_bytes());

		if mode == BuildMode::Development {
			if let Some(parent) = self.archive_path.parent() {
				fs::create_dir_all(parent).map_err(|source| self.io_err(source))?;
			}
			let file = OpenOptions::new()
				.create(true)
				.append(true)
				.open(&self.archive_path)
				.map_err(|source| self.io_err(source))?;
			let mut writer = BufWriter::new(file);
			append_record(&mut writer, hash, source_bytes).map_err(|source| self.io_err(source))?;
		}

		let file = match File::open(&self.archive_path) {
			Ok(file) => file,
			Err(source) => return Err(self.io_err(source)),
		};
		let mut reader = BufReader::new(file);
		let records = read_all_records(&mut reader).map_err(|source| self.io_err(source))?;

		Ok(records.iter().any(|record| record.path_hash == hash))
	}

	/// Registers `entity` as a supplicant, triggering a load if it is the
	/// first. Idempotent.
	pub fn add_supplicant(&mut self, entity: EntityHandle) -> Result<(), HearthError> {
		if self.supplicants.is_empty() {
			self.load()?;
		}
		self.supplicants.insert(entity);
		Ok(())
	}

	/// Withdraws `entity`'s supplicant-ship, unloading the storage if it was
	/// the last one holding it resident.
	pub fn remove_supplicant(&mut self, entity: EntityHandle) {
		self.supplicants.remove(&entity);
		if self.supplicants.is_empty() {
			self.unload();
		}
	}

	/// First match wins on duplicate hashes.
	pub fn get(&self, resource_path: &str) -> Option<&[u8]> {
		let hash = jenkins_one_at_a_time(resource_path.as_bytes());
		self.items
			.iter()
			.find(|record| record.path_hash == hash)
			.map(|record| record.data.as_slice())
	}

	fn load(&mut self) -> Result<(), HearthError> {
		let file = match File::open(&self.archive_path) {
			Ok(file) => file,
			Err(source) => return Err(self.io_err(source)),
		};
		let mut reader = BufReader::new(file);
		self.items = read_all_records(&mut reader).map_err(|source| self.io_err(source))?;
		self.loaded = true;
		log::debug!("loaded resource storage {:?} ({} items)", self.archive_path, self.items.len());
		Ok(())
	}

	fn unload(&mut self) {
		self.items.clear();
		self.loaded = false;
		log::debug!("unloaded resource storage {:?}", self.archive_path);
	}

	fn io_err(&self, source: io::Error) -> HearthError {
		HearthError::IoFailure {
			path: self.archive_path.display().to_string(),
			source,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	fn handle(index: u32) -> EntityHandle {
		EntityHandle { index, generation: 0 }
	}

	fn temp_archive(name: &str) -> PathBuf {
		let mut path = std::env::temp_dir();
		path.push(format!("hearth-test-{}-{}.data", std::process::id(), name));
		let _ = fs::remove_file(&path);
		path
	}

	#[test]
	fn declare_in_development_mode_writes_and_verifies() {
		let archive_path = temp_archive("declare-dev");
		let storage = ResourceStorage::new(archive_path.clone());

		let ok = storage.declare("greeting.txt", b"hello", BuildMode::Development).unwrap();
		assert!(ok);

		let _ = fs::remove_file(&archive_path);
	}

	#[test]
	fn declare_in_release_mode_never_writes() {
		let archive_path = temp_archive("declare-release");
		let storage = ResourceStorage::new(archive_path.clone());

		// No file exists yet, and release mode must not create one.
		let result = storage.declare("greeting.txt", b"hello", BuildMode::Release);
		assert!(result.is_err());
		assert!(!archive_path.exists());
	}

	#[test]
	fn lifecycle_loads_on_first_supplicant_and_unloads_on_last() {
		let archive_path = temp_archive("lifecycle");
		{
			let mut file = File::create(&archive_path).unwrap();
			let hash = jenkins_one_at_a_time(b"path/to/r.bin");
			append_record(&mut file, hash, &[1, 2, 3]).unwrap();
			file.flush().unwrap();
		}

		let mut storage = ResourceStorage::new(archive_path.clone());
		assert!(!storage.is_loaded());

		storage.add_supplicant(handle(1)).unwrap();
		assert!(storage.is_loaded());
		assert_eq!(storage.get("path/to/r.bin"), Some([1u8, 2, 3].as_slice()));

		storage.add_supplicant(handle(1)).unwrap(); // idempotent
		assert_eq!(storage.supplicant_count(), 1);

		storage.remove_supplicant(handle(1));
		assert!(!storage.is_loaded());
		assert_eq!(storage.get("path/to/r.bin"), None);

		let _ = fs::remove_file(&archive_path);
	}
}
