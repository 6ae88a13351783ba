//! Maps archive paths to their storage.

use std::path::PathBuf;

use hearth_util::mem::hash::FxHashMap;

use crate::entity::EntityHandle;
use crate::error::HearthError;
use crate::resource::storage::{BuildMode, ResourceStorage};

/// Default root directory archive paths resolve under:
/// `program_data/<name>.data`.
pub const DEFAULT_RESOURCE_ROOT: &str = "program_data";

pub struct ResourceManager {
	root: PathBuf,
	mode: BuildMode,
	storages: FxHashMap<String, ResourceStorage>,
}

impl ResourceManager {
	pub fn new(root: impl Into<PathBuf>, mode: BuildMode) -> Self {
		Self {
			root: root.into(),
			mode,
			storages: FxHashMap::default(),
		}
	}

	pub fn with_default_root(mode: BuildMode) -> Self {
		Self::new(DEFAULT_RESOURCE_ROOT, mode)
	}

	fn archive_file_path(&self, archive_name: &str) -> PathBuf {
		self.root.join(format!("{archive_name}.data"))
	}

	fn storage_mut(&mut self, archive_name: &str) -> &mut ResourceStorage {
		let path = self.archive_file_path(archive_name);
		self.storages
			.entry(archive_name.to_string())
			.or_insert_with(|| ResourceStorage::new(path))
	}

	/// Appends (development mode) or verifies (release mode) a single
	/// resource record in the named archive.
	pub fn declare(&mut self, archive_name: &str, resource_path: &str, source_bytes: &[u8]) -> Result<bool, HearthError> {
		let mode = self.mode;
		self.storage_mut(archive_name).declare(resource_path, source_bytes, mode)
	}

	/// Registers `entity` as a supplicant of `archive_name` and returns the
	/// bytes for `resource_path`, or `None` on any failure. I/O failures are
	/// logged; a simple not-found is not.
	pub fn fetch(&mut self, entity: EntityHandle, archive_name: &str, resource_path: &str) -> Option<(Vec<u8>, usize)> {
		let storage = self.storage_mut(archive_name);
		if let Err(err) = storage.add_supplicant(entity) {
			log::error!("{}", err);
			return None;
		}
		storage.get(resource_path).map(|bytes| (bytes.to_vec(), bytes.len()))
	}

	/// Withdraws `entity`'s supplicant-ship from every storage it may be
	/// registered with. Invoked while annihilating an entity.
	pub fn withdraw_supplicant_everywhere(&mut self, entity: EntityHandle) {
		for storage in self.storages.values_mut() {
			storage.remove_supplicant(entity);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn handle(index: u32) -> EntityHandle {
		EntityHandle { index, generation: 0 }
	}

	#[test]
	fn declare_then_fetch_lifecycle() {
		let dir = std::env::temp_dir().join(format!("hearth-manager-test-{}", std::process::id()));
		let _ = std::fs::remove_dir_all(&dir);

		let mut manager = ResourceManager::new(&dir, BuildMode::Development);
		let ok = manager.declare("bundle", "greeting.txt", b"hello").unwrap();
		assert!(ok);

		let (bytes, size) = manager.fetch(handle(1), "bundle", "greeting.txt").unwrap();
		assert_eq!(bytes, b"hello");
		assert_eq!(size, 5);

		manager.withdraw_supplicant_everywhere(handle(1));
		assert!(manager.fetch(handle(2), "bundle", "greeting.txt").is_some());

		let _ = std::fs::remove_dir_all(&dir);
	}

	#[test]
	fn fetch_of_missing_resource_returns_none() {
		let dir = std::env::temp_dir().join(format!("hearth-manager-test-missing-{}", std::process::id()));
		let _ = std::fs::remove_dir_all(&dir);

		let mut manager = ResourceManager::new(&dir, BuildMode::Development);
		manager.declare("bundle", "a.txt", b"a").unwrap();
		assert!(manager.fetch(handle(1), "bundle", "does-not-exist.txt").is_none());

		let _ = std::fs::remove_dir_all(&dir);
	}
}
