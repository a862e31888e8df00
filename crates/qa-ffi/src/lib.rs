//! C FFI bindings for qa-core
//!
//! This crate provides a C-compatible API so a form host (Qt, a webview shell
//! or any C/C++ application) can import uploads and evaluate records. Records
//! cross the boundary as JSON strings.

use qa_core::{ImportOutcome, IngestConfig, TestKind, TestRecord};
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::path::PathBuf;
use std::ptr;

/// Opaque handle to the records of one import
pub struct FfiImport {
    inner: ImportOutcome,
}

fn into_c_string(s: String) -> *mut c_char {
    CString::new(s).map(|s| s.into_raw()).unwrap_or(ptr::null_mut())
}

/// Import a CSV or Excel file from disk
///
/// # Safety
/// - `path` must be a valid C string
/// - Returns null on error (unsupported type, unreadable or empty file)
#[no_mangle]
pub unsafe extern "C" fn qa_import_file(path: *const c_char) -> *mut FfiImport {
    if path.is_null() {
        return ptr::null_mut();
    }

    let path = match CStr::from_ptr(path).to_str() {
        Ok(s) => PathBuf::from(s),
        Err(_) => return ptr::null_mut(),
    };

    match qa_core::import_path(&path, &IngestConfig::default()) {
        Ok(outcome) => Box::into_raw(Box::new(FfiImport { inner: outcome })),
        Err(_) => ptr::null_mut(),
    }
}

/// Import an upload from memory; `name` selects the format by extension
///
/// # Safety
/// - `name` must be a valid C string
/// - `data` must point to `len` readable bytes
/// - Returns null on error
#[no_mangle]
pub unsafe extern "C" fn qa_import_bytes(name: *const c_char, data: *const u8, len: usize) -> *mut FfiImport {
    if name.is_null() || data.is_null() {
        return ptr::null_mut();
    }

    let name = match CStr::from_ptr(name).to_str() {
        Ok(s) => s,
        Err(_) => return ptr::null_mut(),
    };
    let bytes = std::slice::from_raw_parts(data, len);

    match qa_core::import_bytes(name, bytes, &IngestConfig::default()) {
        Ok(outcome) => Box::into_raw(Box::new(FfiImport { inner: outcome })),
        Err(_) => ptr::null_mut(),
    }
}

/// Free an import handle
///
/// # Safety
/// - `import` must be a valid pointer returned by `qa_import_file`/`qa_import_bytes` or null
#[no_mangle]
pub unsafe extern "C" fn qa_free_import(import: *mut FfiImport) {
    if !import.is_null() {
        drop(Box::from_raw(import));
    }
}

/// Get the number of records an import produced
///
/// # Safety
/// - `import` must be a valid pointer returned by an import function
#[no_mangle]
pub unsafe extern "C" fn qa_import_record_count(import: *const FfiImport) -> usize {
    if import.is_null() {
        return 0;
    }
    (*import).inner.records.len()
}

/// Get an imported record in the editor's JSON shape
///
/// # Safety
/// - `import` must be a valid pointer returned by an import function
/// - `test` must be a valid C string holding a test slug (see `qa_test_name`)
/// - Returns null if the import has no record for the test
/// - Caller must free the returned string with `qa_free_string`
#[no_mangle]
pub unsafe extern "C" fn qa_import_record_json(import: *const FfiImport, test: *const c_char) -> *mut c_char {
    if import.is_null() || test.is_null() {
        return ptr::null_mut();
    }

    let test = match CStr::from_ptr(test).to_str().ok().and_then(TestKind::from_slug) {
        Some(t) => t,
        None => return ptr::null_mut(),
    };

    (*import)
        .inner
        .records
        .get(test)
        .map(|record| into_c_string(record.to_editor_json().to_string()))
        .unwrap_or(ptr::null_mut())
}

/// Get the import statistics as JSON
///
/// # Safety
/// - `import` must be a valid pointer returned by an import function
/// - Caller must free the returned string with `qa_free_string`
#[no_mangle]
pub unsafe extern "C" fn qa_import_stats_json(import: *const FfiImport) -> *mut c_char {
    if import.is_null() {
        return ptr::null_mut();
    }

    serde_json::to_string(&(*import).inner.stats)
        .map(into_c_string)
        .unwrap_or(ptr::null_mut())
}

/// Re-evaluate a stored record
///
/// Takes a record as stored (not the editor shape) and returns it with
/// derived cells and remarks recomputed.
///
/// # Safety
/// - `record_json` must be a valid C string
/// - Returns null if the JSON is not a valid record
/// - Caller must free the returned string with `qa_free_string`
#[no_mangle]
pub unsafe extern "C" fn qa_evaluate_json(record_json: *const c_char) -> *mut c_char {
    if record_json.is_null() {
        return ptr::null_mut();
    }

    let json = match CStr::from_ptr(record_json).to_str() {
        Ok(s) => s,
        Err(_) => return ptr::null_mut(),
    };

    let mut record: TestRecord = match serde_json::from_str(json) {
        Ok(r) => r,
        Err(_) => return ptr::null_mut(),
    };
    qa_core::evaluate_record(&mut record);

    serde_json::to_string(&record)
        .map(into_c_string)
        .unwrap_or(ptr::null_mut())
}

/// Get the number of known tests
#[no_mangle]
pub extern "C" fn qa_test_count() -> usize {
    TestKind::ALL.len()
}

/// Get a test slug by index, null if out of bounds
///
/// Caller must free the returned string with `qa_free_string`.
#[no_mangle]
pub extern "C" fn qa_test_name(index: usize) -> *mut c_char {
    TestKind::ALL
        .get(index)
        .map(|t| into_c_string(t.slug().to_string()))
        .unwrap_or(ptr::null_mut())
}

/// Free a string returned by other FFI functions
///
/// # Safety
/// - `s` must be a valid pointer returned by a qa_* function or null
#[no_mangle]
pub unsafe extern "C" fn qa_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}
