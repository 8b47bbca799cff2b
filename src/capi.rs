//! The C interface of `libgamemode.so`.
//!
//! Built with the `capi` feature, the cdylib exports the symbols
//! [`Binding`](crate::Binding) looks for, so this crate can itself serve as
//! the shared implementation. Every call goes through one process-wide
//! [`GameMode`] using the transport selected for the process.

use std::{
    cell::RefCell,
    ffi::{c_char, c_int, CString},
};

use once_cell::sync::Lazy;

use crate::{GameMode, Method, Request, TRANSPORT_FAILURE};

static CLIENT: Lazy<GameMode> = Lazy::new(GameMode::new);

thread_local! {
    static ERROR_STRING: RefCell<CString> = RefCell::new(CString::default());
}

fn request(method: Method, pid: libc::pid_t) -> c_int {
    match CLIENT.call(&Request::new(method, pid)) {
        Ok(code) => code,
        Err(e) => {
            // Interior NULs would truncate the message anyway.
            let message = e.to_string().replace('\0', " ");
            ERROR_STRING.with(|error| {
                if let Ok(message) = CString::new(message) {
                    *error.borrow_mut() = message;
                }
            });
            TRANSPORT_FAILURE
        }
    }
}

/// The last error of the calling thread.
///
/// The pointer stays valid until the next failing request on the same
/// thread.
#[no_mangle]
pub extern "C" fn real_gamemode_error_string() -> *const c_char {
    ERROR_STRING.with(|error| error.borrow().as_ptr())
}

#[no_mangle]
pub extern "C" fn real_gamemode_request_start() -> c_int {
    request(Method::RegisterGame, 0)
}

#[no_mangle]
pub extern "C" fn real_gamemode_request_end() -> c_int {
    request(Method::UnregisterGame, 0)
}

#[no_mangle]
pub extern "C" fn real_gamemode_query_status() -> c_int {
    request(Method::QueryStatus, 0)
}

#[no_mangle]
pub extern "C" fn real_gamemode_request_start_for(pid: libc::pid_t) -> c_int {
    request(Method::RegisterGameByPID, pid)
}

#[no_mangle]
pub extern "C" fn real_gamemode_request_end_for(pid: libc::pid_t) -> c_int {
    request(Method::UnregisterGameByPID, pid)
}

#[no_mangle]
pub extern "C" fn real_gamemode_query_status_for(pid: libc::pid_t) -> c_int {
    request(Method::QueryStatusByPID, pid)
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use super::*;

    #[test]
    fn error_string_starts_empty() {
        let ptr = real_gamemode_error_string();
        assert!(!ptr.is_null());
        assert_eq!(unsafe { CStr::from_ptr(ptr) }.to_bytes(), b"");
    }
}
