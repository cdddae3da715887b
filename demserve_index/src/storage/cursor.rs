//! Blocking `Read + Seek` over ranged object reads.
//!
//! The sync TIFF decoder walks headers and chunk data with small seeks
//! and reads. `PagedCursor` maps those onto ranged `GET`s of fixed-size
//! pages and caches fetched pages, so a header probe or a single-pixel
//! read transfers a handful of pages instead of the object.
//!
//! The page map is shared: every cursor opened for the same object by
//! [`TileStore`](crate::storage::TileStore) reuses the pages earlier
//! cursors fetched, so a bulk request sampling many points from one
//! tile transfers each page exactly once.
//!
//! The cursor must only be used from a blocking thread (it re-enters the
//! runtime via `Handle::block_on`); `TileStore` always drives it through
//! `spawn_blocking`.

use object_store::{ObjectStore, ObjectStoreExt};
use object_store::path::Path as ObjectPath;
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;

/// Fetch granularity. Raster headers and single strips almost always fit
/// in one or two pages.
const PAGE_SIZE: u64 = 64 * 1024;

/// Fetched pages of one object, shared between cursors.
pub type PageMap = Arc<Mutex<HashMap<u64, bytes::Bytes>>>;

pub struct PagedCursor {
	handle: Handle,
	store: Arc<dyn ObjectStore>,
	path: ObjectPath,
	size: u64,
	pos: u64,
	pages: PageMap,
	fetches: Arc<AtomicU64>,
}

impl PagedCursor {
	/// Cursor with a private page map.
	#[must_use]
	pub fn new(handle: Handle, store: Arc<dyn ObjectStore>, path: ObjectPath, size: u64) -> PagedCursor {
		Self::with_pages(handle, store, path, size, PageMap::default())
	}

	/// Cursor over a shared page map; reads hit pages fetched by any
	/// other cursor using the same map.
	#[must_use]
	pub fn with_pages(
		handle: Handle,
		store: Arc<dyn ObjectStore>,
		path: ObjectPath,
		size: u64,
		pages: PageMap,
	) -> PagedCursor {
		PagedCursor {
			handle,
			store,
			path,
			size,
			pos: 0,
			pages,
			fetches: Arc::new(AtomicU64::new(0)),
		}
	}

	/// Number of ranged fetches this cursor performed. Tests use this to
	/// prove that header probes stay header-sized and that shared maps
	/// suppress refetches.
	#[must_use]
	pub fn fetch_counter(&self) -> Arc<AtomicU64> {
		Arc::clone(&self.fetches)
	}

	fn page(&mut self, index: u64) -> std::io::Result<bytes::Bytes> {
		// The lock is held across the fetch so concurrent cursors on the
		// same object wait for one transfer instead of racing their own.
		let mut pages = self.pages.lock().expect("page map poisoned");
		if let Some(bytes) = pages.get(&index) {
			return Ok(bytes.clone());
		}
		let start = index * PAGE_SIZE;
		let end = (start + PAGE_SIZE).min(self.size);
		let bytes = self
			.handle
			.block_on(self.store.get_range(&self.path, start..end))
			.map_err(|e| std::io::Error::other(format!("range read {start}..{end} of '{}': {e}", self.path)))?;
		self.fetches.fetch_add(1, Ordering::Relaxed);
		pages.insert(index, bytes.clone());
		Ok(bytes)
	}
}

impl Read for PagedCursor {
	fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
		if self.pos >= self.size || buf.is_empty() {
			return Ok(0);
		}
		let page_index = self.pos / PAGE_SIZE;
		let offset = (self.pos % PAGE_SIZE) as usize;
		let remaining_in_object = (self.size - self.pos) as usize;
		let page = self.page(page_index)?;
		let available = page.len().saturating_sub(offset).min(remaining_in_object);
		let n = available.min(buf.len());
		buf[..n].copy_from_slice(&page[offset..offset + n]);
		self.pos += n as u64;
		Ok(n)
	}
}

impl Seek for PagedCursor {
	fn seek(&mut self, from: SeekFrom) -> std::io::Result<u64> {
		let target = match from {
			SeekFrom::Start(offset) => offset as i64,
			SeekFrom::End(offset) => self.size as i64 + offset,
			SeekFrom::Current(offset) => self.pos as i64 + offset,
		};
		if target < 0 {
			return Err(std::io::Error::new(
				std::io::ErrorKind::InvalidInput,
				"seek before start of object",
			));
		}
		// Seeking past the end is allowed; subsequent reads return 0.
		self.pos = target as u64;
		Ok(self.pos)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use object_store::PutPayload;
	use object_store::memory::InMemory;

	async fn store_with(data: Vec<u8>) -> (Arc<dyn ObjectStore>, ObjectPath, u64) {
		let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
		let path = ObjectPath::from("blob.bin");
		let size = data.len() as u64;
		store.put(&path, PutPayload::from(data)).await.unwrap();
		(store, path, size)
	}

	async fn cursor_over(data: Vec<u8>) -> PagedCursor {
		let (store, path, size) = store_with(data).await;
		PagedCursor::new(Handle::current(), store, path, size)
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn reads_across_page_boundaries() {
		let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
		let expected = data.clone();
		let mut cursor = cursor_over(data).await;

		let result = tokio::task::spawn_blocking(move || {
			let mut out = Vec::new();
			cursor.read_to_end(&mut out).unwrap();
			out
		})
		.await
		.unwrap();
		assert_eq!(result, expected);
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn seek_and_sparse_reads_fetch_few_pages() {
		let data = vec![7u8; 512 * 1024];
		let mut cursor = cursor_over(data).await;
		let fetches = cursor.fetch_counter();

		tokio::task::spawn_blocking(move || {
			let mut buf = [0u8; 16];
			cursor.seek(SeekFrom::Start(0)).unwrap();
			cursor.read_exact(&mut buf).unwrap();
			cursor.seek(SeekFrom::End(-16)).unwrap();
			cursor.read_exact(&mut buf).unwrap();
			// Re-reading a cached page must not refetch.
			cursor.seek(SeekFrom::Start(4)).unwrap();
			cursor.read_exact(&mut buf).unwrap();
			assert_eq!(buf, [7u8; 16]);
		})
		.await
		.unwrap();

		assert_eq!(fetches.load(Ordering::Relaxed), 2);
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn shared_page_map_suppresses_refetches() {
		let (store, path, size) = store_with(vec![9u8; 64 * 1024]).await;
		let pages = PageMap::default();
		let mut first =
			PagedCursor::with_pages(Handle::current(), Arc::clone(&store), path.clone(), size, Arc::clone(&pages));
		let mut second = PagedCursor::with_pages(Handle::current(), store, path, size, pages);
		let first_fetches = first.fetch_counter();
		let second_fetches = second.fetch_counter();

		tokio::task::spawn_blocking(move || {
			let mut buf = [0u8; 32];
			first.read_exact(&mut buf).unwrap();
			// The second cursor reads the same region from the shared map.
			second.seek(SeekFrom::Start(100)).unwrap();
			second.read_exact(&mut buf).unwrap();
			assert_eq!(buf, [9u8; 32]);
		})
		.await
		.unwrap();

		assert_eq!(first_fetches.load(Ordering::Relaxed), 1);
		assert_eq!(second_fetches.load(Ordering::Relaxed), 0);
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn read_past_end_returns_zero() {
		let mut cursor = cursor_over(vec![1, 2, 3]).await;
		tokio::task::spawn_blocking(move || {
			cursor.seek(SeekFrom::Start(10)).unwrap();
			let mut buf = [0u8; 4];
			assert_eq!(cursor.read(&mut buf).unwrap(), 0);
		})
		.await
		.unwrap();
	}
}
