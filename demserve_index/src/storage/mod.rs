//! Object-storage capability for the tile corpus.
//!
//! A [`TileStore`] wraps an [`object_store::ObjectStore`] backend (S3,
//! local filesystem, or in-memory for tests) and exposes exactly the
//! three operations the rest of the system needs: enumerate raster keys,
//! read a raster header, and read a single pixel. No code path ever
//! transfers full raster payloads.
//!
//! Fetched pages are cached per object (LRU over recently touched
//! objects), so repeated reads of one tile, e.g. a bulk request sampling
//! many points from the same campaign, transfer each page once.

mod cursor;

pub use cursor::{PageMap, PagedCursor};

use crate::geotiff::{RasterHeader, read_pixel_at};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lru::LruCache;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;

/// How many objects keep their fetched pages cached at once.
const PAGE_CACHE_OBJECTS: usize = 256;

/// A raster object as enumerated from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
	pub key: String,
	pub size: u64,
	pub last_modified: DateTime<Utc>,
}

/// Handle to one bucket of raster tiles. Cloning shares the backend
/// connection and the page cache.
#[derive(Clone)]
pub struct TileStore {
	store: Arc<dyn ObjectStore>,
	bucket: String,
	pages: Arc<Mutex<LruCache<String, PageMap>>>,
}

impl TileStore {
	fn wrap(store: Arc<dyn ObjectStore>, bucket: String) -> TileStore {
		TileStore {
			store,
			bucket,
			pages: Arc::new(Mutex::new(LruCache::new(
				NonZeroUsize::new(PAGE_CACHE_OBJECTS).expect("non-zero page cache capacity"),
			))),
		}
	}

	/// S3 bucket, credentials and region from the usual `AWS_*`
	/// environment variables.
	pub fn s3_from_env(bucket: &str) -> Result<TileStore> {
		let store = AmazonS3Builder::from_env()
			.with_bucket_name(bucket)
			.build()
			.with_context(|| format!("building S3 client for bucket '{bucket}'"))?;
		Ok(Self::wrap(Arc::new(store), bucket.to_string()))
	}

	/// Local directory standing in for a bucket.
	pub fn local(root: &std::path::Path) -> Result<TileStore> {
		let store = LocalFileSystem::new_with_prefix(root)
			.with_context(|| format!("opening local tile store at {}", root.display()))?;
		Ok(Self::wrap(Arc::new(store), root.display().to_string()))
	}

	/// Fresh in-memory store for tests.
	#[must_use]
	pub fn memory() -> TileStore {
		Self::wrap(Arc::new(InMemory::new()), "memory".to_string())
	}

	#[must_use]
	pub fn bucket(&self) -> &str {
		&self.bucket
	}

	/// Uploads an object. Only used by tests and fixtures; the serving
	/// path never writes.
	pub async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
		self
			.store
			.put(&ObjectPath::from(key), PutPayload::from(bytes))
			.await
			.with_context(|| format!("writing object '{key}'"))?;
		Ok(())
	}

	/// Enumerates every GeoTIFF object under `prefix`, paginated by the
	/// backend. Non-raster keys are skipped.
	pub async fn list_rasters(&self, prefix: Option<&str>) -> Result<Vec<ObjectRef>> {
		let prefix_path = prefix.map(ObjectPath::from);
		let mut objects: Vec<ObjectRef> = self
			.store
			.list(prefix_path.as_ref())
			.try_filter_map(|meta| async move {
				let key = meta.location.to_string();
				let lower = key.to_ascii_lowercase();
				if lower.ends_with(".tif") || lower.ends_with(".tiff") {
					Ok(Some(ObjectRef {
						key,
						size: meta.size,
						last_modified: meta.last_modified,
					}))
				} else {
					Ok(None)
				}
			})
			.try_collect()
			.await
			.with_context(|| format!("listing rasters in '{}'", self.bucket))?;
		objects.sort_by(|a, b| a.key.cmp(&b.key));
		Ok(objects)
	}

	/// Reads the raster header of one object without transferring pixel
	/// data. The underlying cursor fetches only the byte pages the TIFF
	/// decoder actually touches.
	pub async fn open_header(&self, object: &ObjectRef) -> Result<RasterHeader> {
		let cursor = self.cursor(object);
		let key = object.key.clone();
		tokio::task::spawn_blocking(move || RasterHeader::read_from(cursor).with_context(|| format!("reading raster header of '{key}'")))
			.await
			.context("header task aborted")?
	}

	/// Reads the raw value of the single pixel `(col, row)`. Returns the
	/// stored sample without nodata interpretation.
	pub async fn read_pixel(&self, object: &ObjectRef, col: u32, row: u32) -> Result<f64> {
		let cursor = self.cursor(object);
		let key = object.key.clone();
		tokio::task::spawn_blocking(move || {
			read_pixel_at(cursor, col, row).with_context(|| format!("reading pixel ({col}, {row}) of '{key}'"))
		})
		.await
		.context("pixel task aborted")?
	}

	/// Metadata for a single key, for targeted re-reads.
	pub async fn head(&self, key: &str) -> Result<ObjectRef> {
		let meta = self
			.store
			.head(&ObjectPath::from(key))
			.await
			.with_context(|| format!("fetching metadata of '{key}'"))?;
		Ok(ObjectRef {
			key: meta.location.to_string(),
			size: meta.size,
			last_modified: meta.last_modified,
		})
	}

	fn cursor(&self, object: &ObjectRef) -> PagedCursor {
		// The cache key carries the modification stamp so a replaced
		// object never serves pages of its previous version.
		let cache_key = format!("{}@{}", object.key, object.last_modified.timestamp_micros());
		let pages = Arc::clone(
			self
				.pages
				.lock()
				.expect("page cache poisoned")
				.get_or_insert(cache_key, PageMap::default),
		);
		PagedCursor::with_pages(
			Handle::current(),
			Arc::clone(&self.store),
			ObjectPath::from(object.key.as_str()),
			object.size,
			pages,
		)
	}

	/// Number of objects currently holding cached pages.
	#[must_use]
	pub fn cached_page_objects(&self) -> usize {
		self.pages.lock().expect("page cache poisoned").len()
	}
}

impl std::fmt::Debug for TileStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TileStore").field("bucket", &self.bucket).finish()
	}
}
