//! End-to-end pipeline test: seed two in-memory buckets with synthetic
//! GeoTIFFs, build the AU index, merge the NZ corpus incrementally, then
//! drive a point query down to a single-pixel read.

use demserve_core::{Crs, ExtractMethod};
use demserve_index::builder::{BuildConfig, CountryScheme, IndexBuilder};
use demserve_index::geotiff::RasterHeader;
use demserve_index::index::{IndexedCorpus, validate};
use demserve_index::testing::{SynthTile, gradient_data};
use demserve_index::{SpatialIndex, TileStore};
use demserve_core::geo::point_from_wgs84;

const BRISBANE: (f64, f64) = (-27.4698, 153.0251);
const WELLINGTON: (f64, f64) = (-41.2865, 174.7762);

fn au_tile(origin_e: f64, origin_n: f64) -> Vec<u8> {
	SynthTile {
		width: 100,
		height: 100,
		origin: (origin_e, origin_n),
		pixel_scale: (10.0, 10.0),
		epsg: 28356,
		nodata: Some(-9999.0),
		data: gradient_data(100, 100, 20.0),
		..SynthTile::default()
	}
	.encode()
}

fn nz_tile(origin_e: f64, origin_n: f64) -> Vec<u8> {
	SynthTile {
		width: 100,
		height: 100,
		origin: (origin_e, origin_n),
		pixel_scale: (10.0, 10.0),
		epsg: 2193,
		nodata: Some(-9999.0),
		data: gradient_data(100, 100, 120.0),
		..SynthTile::default()
	}
	.encode()
}

async fn seed_au(store: &TileStore) {
	// Three 1 km tiles around the Brisbane CBD, one of them covering it.
	for (i, easting) in [501_000.0, 502_000.0, 503_000.0].into_iter().enumerate() {
		store
			.put(&format!("au/z56/brisbane2019/tile_{i}.tif"), au_tile(easting, 6_962_000.0))
			.await
			.unwrap();
	}
	// A corrupt object whose filename still decodes on the 1 km grid.
	store
		.put(
			"au/z56/brisbane2019/Brisbane_2019_Prj_SW_504000_6961000_1k_DEM_1m.tif",
			vec![0xba, 0xad],
		)
		.await
		.unwrap();
	// A second campaign far away so campaign scoping matters.
	for (i, easting) in [330_000.0, 331_000.0].into_iter().enumerate() {
		store
			.put(&format!("au/z56/sydney2020/tile_{i}.tif"), au_tile(easting, 6_250_000.0))
			.await
			.unwrap();
	}
}

async fn seed_nz(store: &TileStore) {
	// Wellington in NZTM2000; the CBD point lands in the middle tile.
	for (i, easting) in [1_747_000.0, 1_748_000.0, 1_749_000.0].into_iter().enumerate() {
		store
			.put(
				&format!("wellington/wellington_2019/dem_1m/tile_{i}.tif"),
				nz_tile(easting, 5_428_000.0),
			)
			.await
			.unwrap();
	}
}

fn config(scheme: CountryScheme) -> BuildConfig {
	let mut config = BuildConfig::new(scheme);
	config.workers = 4;
	config
}

#[tokio::test(flavor = "multi_thread")]
async fn build_merge_query_sample() {
	let dir = tempfile::tempdir().unwrap();
	let index_path = dir.path().join("index.json");

	// Build the AU collection.
	let au_store = TileStore::memory();
	seed_au(&au_store).await;
	let au_report = IndexBuilder::new(au_store.clone(), config(CountryScheme::Au))
		.build_full(&index_path, None)
		.await
		.unwrap();
	assert_eq!(au_report.extracted, 6);
	assert_eq!(au_report.by_method.get("filename-grid"), Some(&1));

	// Merge the NZ collection into the same document.
	let nz_store = TileStore::memory();
	seed_nz(&nz_store).await;
	let full = IndexBuilder::new(nz_store.clone(), config(CountryScheme::Nz))
		.update_incremental(au_report.index, &index_path, None)
		.await
		.unwrap()
		.index;
	assert_eq!(full.total_tile_count, 9);
	assert_eq!(full.collections.len(), 2);
	assert!(validate(&full).is_ok());

	// The persisted document reloads through the validating loader and
	// re-serializes identically.
	let loaded = SpatialIndex::load_validated(&index_path).unwrap();
	assert_eq!(
		serde_json::to_string(&loaded).unwrap(),
		serde_json::to_string(&full).unwrap()
	);

	let corpus = IndexedCorpus::new(full);

	// Brisbane query: hierarchical narrowing reaches exactly one tile
	// and never scans the sydney campaign.
	let (hits, scanned) = corpus.find_tiles(BRISBANE.0, BRISBANE.1);
	assert_eq!(hits.len(), 1);
	assert_eq!(hits[0].campaign_id, "brisbane2019_z56");
	assert_eq!(hits[0].tile.method, ExtractMethod::RasterHeader);
	assert!(scanned <= 4, "scanned {scanned} tile records");

	// Sample the pixel under the CBD point.
	let tile = hits[0].tile;
	let object = au_store.head(&tile.key).await.unwrap();
	let header = au_store.open_header(&object).await.unwrap();
	assert_eq!(header.crs, Crs::UtmSouth { zone: 56 });
	let (x, y) = point_from_wgs84(BRISBANE.0, BRISBANE.1, &header.crs).unwrap();
	let (col, row) = header.pixel_for(x, y).expect("point must fall inside the chosen tile");
	let value = au_store.read_pixel(&object, col, row).await.unwrap();
	assert_eq!(value, 20.0 + f64::from(row * 100 + col));

	// Wellington query resolves through the NZ collection.
	let (nz_hits, _) = corpus.find_tiles(WELLINGTON.0, WELLINGTON.1);
	assert_eq!(nz_hits.len(), 1);
	assert_eq!(nz_hits[0].campaign_id, "wellington_2019_dem_1m");
	let object = nz_store.head(&nz_hits[0].tile.key).await.unwrap();
	let header = nz_store.open_header(&object).await.unwrap();
	assert_eq!(header.crs, Crs::Nztm2000);
	let (x, y) = point_from_wgs84(WELLINGTON.0, WELLINGTON.1, &header.crs).unwrap();
	assert!(header.pixel_for(x, y).is_some());

	// Outback query touches nothing.
	let (none, scanned) = corpus.find_tiles(-26.0, 134.0);
	assert!(none.is_empty());
	assert_eq!(scanned, 0);
}
