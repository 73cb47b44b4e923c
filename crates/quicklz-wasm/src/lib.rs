//! WebAssembly bindings for QuickLZ
//!
//! The framed functions are self-describing. The raw functions produce the
//! bare token stream, so the caller has to keep the original length.

use quicklz_core::{
    compress as core_compress, compress_frame, decompress as core_decompress, decompress_frame,
    worst_case as core_worst_case, Compressor, Level, Options,
};
use std::cell::RefCell;
use std::collections::HashMap;
use wasm_bindgen::prelude::*;

fn to_js(e: quicklz_core::Error) -> JsValue {
    js_sys::Error::new(&e.to_string()).into()
}

// ============================================================================
// Framed compression
// ============================================================================

/// Compress into a frame with default options (1 MiB blocks, CRC32C)
#[wasm_bindgen]
pub fn compress(data: &[u8]) -> Result<Vec<u8>, JsValue> {
    compress_frame(data, &Options::default()).map_err(to_js)
}

/// Compress into a frame
///
/// `level` 0 stores blocks uncompressed, anything else compresses.
#[wasm_bindgen]
pub fn compress_with_options(
    data: &[u8],
    checksum: bool,
    block_size: usize,
    level: u8,
) -> Result<Vec<u8>, JsValue> {
    let opts = Options {
        level: match level {
            0 => Level::Stored,
            _ => Level::Fast,
        },
        checksum,
        block_size,
    };
    compress_frame(data, &opts).map_err(to_js)
}

/// Decompress a frame
#[wasm_bindgen]
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, JsValue> {
    decompress_frame(data).map_err(to_js)
}

// ============================================================================
// Raw token stream
// ============================================================================

/// Compress to a raw stream with no header
#[wasm_bindgen]
pub fn compress_raw(data: &[u8]) -> Result<Vec<u8>, JsValue> {
    core_compress(data).map_err(to_js)
}

/// Decompress a raw stream whose decoded size is `original_len`
#[wasm_bindgen]
pub fn decompress_raw(data: &[u8], original_len: usize) -> Result<Vec<u8>, JsValue> {
    core_decompress(data, original_len).map_err(to_js)
}

// ============================================================================
// Reusable compressors (hash table allocation reused, contents reset per call)
// ============================================================================

thread_local! {
    static COMPRESSORS: RefCell<HashMap<u32, Compressor>> = RefCell::new(HashMap::new());
    static NEXT_COMPRESSOR_ID: RefCell<u32> = RefCell::new(1);
}

/// Allocate a compressor, returns its handle
#[wasm_bindgen]
pub fn compressor_create() -> u32 {
    let id = NEXT_COMPRESSOR_ID.with(|next_id| {
        let id = *next_id.borrow();
        *next_id.borrow_mut() = id.wrapping_add(1);
        id
    });
    COMPRESSORS.with(|compressors| {
        compressors.borrow_mut().insert(id, Compressor::new());
    });
    id
}

/// Raw-compress with a previously created compressor
#[wasm_bindgen]
pub fn compressor_compress_raw(handle: u32, data: &[u8]) -> Result<Vec<u8>, JsValue> {
    COMPRESSORS.with(|compressors| {
        let mut compressors = compressors.borrow_mut();
        let compressor = compressors
            .get_mut(&handle)
            .ok_or_else(|| JsValue::from(js_sys::Error::new("Invalid compressor handle")))?;

        let mut out = vec![0u8; core_worst_case(data.len())];
        let n = compressor.compress_to(data, &mut out).map_err(to_js)?;
        out.truncate(n);
        Ok(out)
    })
}

/// Counts of literals, matches and runs from the compressor's last call, as JSON
#[wasm_bindgen]
pub fn compressor_stats(handle: u32) -> Result<String, JsValue> {
    COMPRESSORS.with(|compressors| {
        let compressors = compressors.borrow();
        let compressor = compressors
            .get(&handle)
            .ok_or_else(|| JsValue::from(js_sys::Error::new("Invalid compressor handle")))?;

        let stats = compressor.stats();
        Ok(format!(
            r#"{{"literals":{},"matches":{},"runs":{}}}"#,
            stats.literals, stats.matches, stats.runs
        ))
    })
}

/// Free a compressor
#[wasm_bindgen]
pub fn compressor_destroy(handle: u32) -> bool {
    COMPRESSORS.with(|compressors| compressors.borrow_mut().remove(&handle).is_some())
}

// ============================================================================
// Utilities
// ============================================================================

/// Largest raw stream `compress_raw` can produce for `len` input bytes
#[wasm_bindgen]
pub fn worst_case(len: usize) -> usize {
    core_worst_case(len)
}

/// Get library version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Error paths build js_sys values and only run under wasm-bindgen-test.

    #[test]
    fn test_frame_roundtrip() {
        let data = b"wasm wasm wasm wasm wasm wasm";
        let framed = compress(data).unwrap();
        assert_eq!(decompress(&framed).unwrap(), data);

        let stored = compress_with_options(data, false, 8, 0).unwrap();
        assert_eq!(decompress(&stored).unwrap(), data);
    }

    #[test]
    fn test_raw_roundtrip() {
        let data = vec![7u8; 500];
        let raw = compress_raw(&data).unwrap();
        assert!(raw.len() <= worst_case(data.len()));
        assert_eq!(decompress_raw(&raw, data.len()).unwrap(), data);
    }

    #[test]
    fn test_compressor_handle() {
        let handle = compressor_create();
        let data = b"abcabcabcabcabcabc";
        let first = compressor_compress_raw(handle, data).unwrap();
        let second = compressor_compress_raw(handle, data).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, compress_raw(data).unwrap());
        assert!(compressor_stats(handle).unwrap().starts_with(r#"{"literals":"#));
        assert!(compressor_destroy(handle));
        assert!(!compressor_destroy(handle));
    }

    #[test]
    fn test_version() {
        assert_eq!(version(), env!("CARGO_PKG_VERSION"));
    }
}
