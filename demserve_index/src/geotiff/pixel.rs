use anyhow::{Context, Result, ensure};
use std::io::{Read, Seek};
use tiff::decoder::{Decoder, DecodingResult};

/// Reads the raw sample at `(col, row)` by decoding only the strip or
/// tile that contains it.
///
/// The returned value is the stored sample; nodata interpretation is the
/// caller's concern since it needs the header's nodata tag.
pub fn read_pixel_at<R: Read + Seek>(reader: R, col: u32, row: u32) -> Result<f64> {
	let mut decoder = Decoder::new(reader).context("not a readable TIFF")?;
	let (width, height) = decoder.dimensions().context("missing image dimensions")?;
	ensure!(
		col < width && row < height,
		"pixel ({col}, {row}) outside raster {width}x{height}"
	);

	let (chunk_w, chunk_h) = decoder.chunk_dimensions();
	ensure!(chunk_w > 0 && chunk_h > 0, "degenerate chunk layout {chunk_w}x{chunk_h}");
	let chunks_across = width.div_ceil(chunk_w);
	let chunk_index = (row / chunk_h) * chunks_across + col / chunk_w;

	let chunk = decoder
		.read_chunk(chunk_index)
		.with_context(|| format!("decoding chunk {chunk_index}"))?;

	// Within a chunk, rows are chunk_w samples wide (strips span the full
	// image width; edge tiles are padded to the tile width).
	let local = ((row % chunk_h) * chunk_w + col % chunk_w) as usize;
	sample_as_f64(&chunk, local).with_context(|| format!("chunk {chunk_index} has no sample at offset {local}"))
}

fn sample_as_f64(result: &DecodingResult, index: usize) -> Result<f64> {
	use DecodingResult::*;
	let value = match result {
		F32(data) => data.get(index).map(|v| f64::from(*v)),
		F64(data) => data.get(index).copied(),
		I16(data) => data.get(index).map(|v| f64::from(*v)),
		I32(data) => data.get(index).map(|v| f64::from(*v)),
		I64(data) => data.get(index).map(|v| *v as f64),
		U16(data) => data.get(index).map(|v| f64::from(*v)),
		U32(data) => data.get(index).map(|v| f64::from(*v)),
		U64(data) => data.get(index).map(|v| *v as f64),
		U8(data) => data.get(index).map(|v| f64::from(*v)),
		I8(data) => data.get(index).map(|v| f64::from(*v)),
	};
	value.ok_or_else(|| anyhow::anyhow!("sample index out of range"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{SynthTile, gradient_data};
	use std::io::Cursor;

	fn tile_bytes(width: u32, height: u32, rows_per_strip: u32) -> Vec<u8> {
		SynthTile {
			width,
			height,
			origin: (500_000.0, 6_000_000.0),
			pixel_scale: (1.0, 1.0),
			epsg: 28355,
			nodata: Some(-9999.0),
			data: gradient_data(width, height, 100.0),
			rows_per_strip,
		}
		.encode()
	}

	#[test]
	fn reads_expected_values_across_strips() {
		// gradient_data(col, row) = base + row * width + col
		let bytes = tile_bytes(32, 32, 8);
		for (col, row) in [(0u32, 0u32), (31, 0), (0, 31), (31, 31), (7, 8), (15, 17)] {
			let value = read_pixel_at(Cursor::new(bytes.clone()), col, row).unwrap();
			let expected = 100.0 + f64::from(row * 32 + col);
			assert_eq!(value, expected, "pixel ({col}, {row})");
		}
	}

	#[test]
	fn single_strip_layout() {
		let bytes = tile_bytes(16, 4, 4);
		assert_eq!(read_pixel_at(Cursor::new(bytes), 3, 2).unwrap(), 100.0 + 35.0);
	}

	#[test]
	fn out_of_range_pixel_is_an_error() {
		let bytes = tile_bytes(8, 8, 8);
		assert!(read_pixel_at(Cursor::new(bytes), 8, 0).is_err());
	}
}
