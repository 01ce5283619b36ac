//! C ABI.
//!
//! Opaque-handle surface for embedding the engine from other languages.
//! A successful parse returns a heap handle owning the document and its
//! arena; `longan_free` releases everything in one step. Failures return
//! null and store a message in a thread-local buffer readable through
//! `longan_errmsg` — the only process-wide state in the crate, and it is
//! per-thread.
//!
//! Pointers returned by accessors stay valid until the handle is freed
//! (`longan_generate` output until `longan_free_string`). Handles must not
//! be freed twice; reads may happen from any number of threads.

use crate::document::OwnedDocument;
use crate::types::UNSET_INDEX;
use once_cell::sync::OnceCell;
use std::cell::RefCell;
use std::ffi::{CString, c_char, c_void};
use std::io;

/// Opaque parsed-document handle.
pub struct LonganDocument {
    owned: OwnedDocument,
    text: OnceCell<CString>,
    runs: OnceCell<Vec<LonganRun>>,
}

// SAFETY: every pointer in the cached views targets storage owned by this
// handle (the arena or the cached CString), which is immutable after
// construction; OnceCell initialization is the only write and external
// synchronization of handle destruction is the caller's contract.
unsafe impl Send for LonganDocument {}
unsafe impl Sync for LonganDocument {}

/// One text run as seen through the C API.
///
/// `text` points into the document arena and is not NUL-terminated; use
/// `length`. `color` is the resolved foreground as `0xRRGGBB`, or 0 when
/// unset or unresolvable.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LonganRun {
    pub text: *const c_char,
    pub length: usize,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    /// Font size in half-points, 0 when unset
    pub font_size: u16,
    pub color: u32,
}

/// Byte-source callback for `longan_parse_stream`.
///
/// Fills `buffer` with up to `length` bytes and returns the count read.
/// Zero means end-of-input; a negative value reports an I/O error.
pub type LonganReadFn =
    unsafe extern "C" fn(user_data: *mut c_void, buffer: *mut u8, length: usize) -> isize;

thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::default());
}

fn set_last_error(message: &str) {
    let sanitized = message.replace('\0', " ");
    LAST_ERROR.with(|slot| {
        *slot.borrow_mut() = CString::new(sanitized).unwrap_or_default();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|slot| {
        *slot.borrow_mut() = CString::default();
    });
}

fn into_handle(result: crate::error::RtfResult<OwnedDocument>) -> *mut LonganDocument {
    match result {
        Ok(owned) => {
            clear_last_error();
            Box::into_raw(Box::new(LonganDocument {
                owned,
                text: OnceCell::new(),
                runs: OnceCell::new(),
            }))
        }
        Err(error) => {
            set_last_error(&error.to_string());
            std::ptr::null_mut()
        }
    }
}

/// Parse an RTF document from a byte buffer.
///
/// Returns null on failure and sets the thread-local error message.
/// Partial documents are never returned.
///
/// # Safety
///
/// `bytes` must be valid for reads of `length` bytes, or null with a zero
/// `length`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn longan_parse(bytes: *const u8, length: usize) -> *mut LonganDocument {
    let input: &[u8] = if bytes.is_null() {
        if length != 0 {
            set_last_error("parse called with a null buffer and a nonzero length");
            return std::ptr::null_mut();
        }
        &[]
    } else {
        // SAFETY: caller guarantees the buffer covers `length` bytes
        unsafe { std::slice::from_raw_parts(bytes, length) }
    };
    into_handle(OwnedDocument::from_bytes(input))
}

struct CallbackReader {
    read_fn: LonganReadFn,
    user_data: *mut c_void,
}

impl io::Read for CallbackReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // SAFETY: the buffer pointer and length describe `buf` exactly
        let count = unsafe { (self.read_fn)(self.user_data, buf.as_mut_ptr(), buf.len()) };
        if count < 0 {
            return Err(io::Error::other("reader callback reported an error"));
        }
        Ok((count as usize).min(buf.len()))
    }
}

/// Parse an RTF document by pulling bytes from a callback.
///
/// # Safety
///
/// `read_fn` must be callable with `user_data` for the duration of this
/// call and must honor the [`LonganReadFn`] contract.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn longan_parse_stream(
    read_fn: Option<LonganReadFn>,
    user_data: *mut c_void,
) -> *mut LonganDocument {
    let Some(read_fn) = read_fn else {
        set_last_error("parse_stream called with a null reader callback");
        return std::ptr::null_mut();
    };
    let mut reader = CallbackReader { read_fn, user_data };
    into_handle(OwnedDocument::from_reader(&mut reader))
}

/// Release a document handle and its entire arena. Null is a no-op.
///
/// # Safety
///
/// `document` must be null or a pointer returned by a parse function that
/// has not been freed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn longan_free(document: *mut LonganDocument) {
    if !document.is_null() {
        // SAFETY: caller passes a live handle exactly once
        drop(unsafe { Box::from_raw(document) });
    }
}

fn handle<'h>(document: *const LonganDocument) -> Option<&'h LonganDocument> {
    // SAFETY: non-null handles come from Box::into_raw and outlive the call
    unsafe { document.as_ref() }
}

fn cached_text(doc: &LonganDocument) -> &CString {
    doc.text.get_or_init(|| {
        let text = doc.owned.plain_text().replace('\0', " ");
        CString::new(text).unwrap_or_default()
    })
}

/// NUL-terminated plain text; lifetime tied to the document handle.
///
/// # Safety
///
/// `document` must be null or a live handle from a parse function.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn longan_get_text(document: *const LonganDocument) -> *const c_char {
    match handle(document) {
        Some(doc) => cached_text(doc).as_ptr(),
        None => std::ptr::null(),
    }
}

/// Length in bytes of [`longan_get_text`]'s result, excluding the NUL.
///
/// # Safety
///
/// `document` must be null or a live handle from a parse function.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn longan_get_text_length(document: *const LonganDocument) -> usize {
    match handle(document) {
        Some(doc) => cached_text(doc).as_bytes().len(),
        None => 0,
    }
}

/// Number of text runs in the document.
///
/// # Safety
///
/// `document` must be null or a live handle from a parse function.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn longan_get_run_count(document: *const LonganDocument) -> usize {
    match handle(document) {
        Some(doc) => doc.owned.document().run_count(),
        None => 0,
    }
}

fn cached_runs(doc: &LonganDocument) -> &[LonganRun] {
    doc.runs.get_or_init(|| {
        let document = doc.owned.document();
        document
            .runs()
            .map(|run| {
                let color = if run.format.foreground_color == UNSET_INDEX {
                    0
                } else {
                    document
                        .colors()
                        .get(run.format.foreground_color)
                        .map(|c| c.to_rgb())
                        .unwrap_or(0)
                };
                LonganRun {
                    text: run.text.as_ptr().cast::<c_char>(),
                    length: run.text.len(),
                    bold: run.format.bold,
                    italic: run.format.italic,
                    underline: run.format.underline,
                    font_size: run.format.font_size,
                    color,
                }
            })
            .collect()
    })
}

/// The `index`-th run, or null when out of range. O(1) per call once the
/// run view is built.
///
/// # Safety
///
/// `document` must be null or a live handle from a parse function.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn longan_get_run(
    document: *const LonganDocument,
    index: usize,
) -> *const LonganRun {
    match handle(document) {
        Some(doc) => match cached_runs(doc).get(index) {
            Some(run) => run as *const LonganRun,
            None => std::ptr::null(),
        },
        None => std::ptr::null(),
    }
}

/// Regenerate RTF for the document. The returned NUL-terminated buffer is
/// owned by the caller and must be released with [`longan_free_string`].
///
/// # Safety
///
/// `document` must be null or a live handle from a parse function.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn longan_generate(document: *const LonganDocument) -> *mut c_char {
    let Some(doc) = handle(document) else {
        set_last_error("generate called with a null document");
        return std::ptr::null_mut();
    };
    let rtf = doc.owned.to_rtf();
    // Generator output is 7-bit clean and never contains NUL
    match CString::new(rtf) {
        Ok(text) => {
            clear_last_error();
            text.into_raw()
        }
        Err(_) => {
            set_last_error("generated RTF contained an interior NUL byte");
            std::ptr::null_mut()
        }
    }
}

/// Release a string returned by [`longan_generate`]. Null is a no-op.
///
/// # Safety
///
/// `text` must be null or a pointer returned by `longan_generate` that has
/// not been freed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn longan_free_string(text: *mut c_char) {
    if !text.is_null() {
        // SAFETY: caller passes a pointer from CString::into_raw exactly once
        drop(unsafe { CString::from_raw(text) });
    }
}

/// The calling thread's last error message; empty after a success.
/// The pointer is valid until the next parse or generate call on this
/// thread.
#[unsafe(no_mangle)]
pub extern "C" fn longan_errmsg() -> *const c_char {
    LAST_ERROR.with(|slot| slot.borrow().as_ptr())
}

/// Reset the calling thread's error message to empty.
#[unsafe(no_mangle)]
pub extern "C" fn longan_clear_error() {
    clear_last_error();
}
