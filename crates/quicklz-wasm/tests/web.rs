#![cfg(target_arch = "wasm32")]

use quicklz_wasm::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;

#[wasm_bindgen_test]
fn frame_roundtrip() {
    let data = b"the same words, the same words, the same words";
    let framed = compress(data).unwrap();
    assert_eq!(decompress(&framed).unwrap(), data);
}

#[wasm_bindgen_test]
fn raw_roundtrip() {
    let data: Vec<u8> = (0..3000u32).map(|i| (i % 61) as u8).collect();
    let raw = compress_raw(&data).unwrap();
    assert_eq!(decompress_raw(&raw, data.len()).unwrap(), data);
}

#[wasm_bindgen_test]
fn corrupt_frame_is_js_error() {
    let err = decompress(b"nope, not a frame").unwrap_err();
    let err: js_sys::Error = err.dyn_into().unwrap();
    assert!(String::from(err.message()).contains("magic"));
}

#[wasm_bindgen_test]
fn bad_options_are_js_errors() {
    assert!(compress_with_options(b"x", true, 0, 1).is_err());
    assert!(compressor_compress_raw(u32::MAX, b"x").is_err());
}
