//! Binding to an optional shared implementation of the client.
//!
//! A GameMode installation may ship `libgamemode.so`, exporting the client
//! operations as `real_gamemode_<nick>` C functions. When it's present the
//! requests are forwarded to it, otherwise
//! [`GameMode::dynamic`](crate::GameMode::dynamic) degrades to a client for
//! which every request fails without touching the bus.
//!
//! Symbols are resolved once, in a fixed order, into a capability table.
//! A missing *required* symbol invalidates the whole binding, a missing
//! *optional* one is replaced by a stub answering `-1`. The error string
//! accessor is resolved last: with a complete binding it replaces the
//! binder's own diagnostics.

use std::{
    collections::HashMap,
    ffi::{c_char, c_int, c_void, CStr},
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use libloading::Library;
use once_cell::sync::OnceCell;

use crate::{backend::Backend, Error, Method, Request};

/// The unversioned library name.
pub const LIBRARY_NAME: &str = "libgamemode.so";
/// The versioned library name, tried first.
pub const LIBRARY_SONAME: &str = "libgamemode.so.0";
/// Prefix of every exported symbol.
pub const SYMBOL_PREFIX: &str = "real_gamemode_";

const ERROR_STRING: &str = "error_string";
/// Result code of operations replaced by a stub.
const STUB_CODE: c_int = -1;

static BINDING: OnceCell<Option<Arc<Binding>>> = OnceCell::new();

type SimpleFn = unsafe extern "C" fn() -> c_int;
type ForPidFn = unsafe extern "C" fn(libc::pid_t) -> c_int;
type ErrorStringFn = unsafe extern "C" fn() -> *const c_char;

/// Where the symbols of a [`Binding`] come from.
///
/// # Safety
///
/// Every address returned for a `real_gamemode_*` name must be a function
/// with the matching C signature, and must stay valid as long as the source
/// is alive.
pub unsafe trait SymbolSource: Send + Sync + 'static {
    /// The address of `name`, or a description of why it isn't available.
    fn lookup(&self, name: &str) -> Result<*const c_void, String>;
}

unsafe impl SymbolSource for Library {
    fn lookup(&self, name: &str) -> Result<*const c_void, String> {
        unsafe { self.get::<*const c_void>(name.as_bytes()) }
            .map(|symbol| *symbol)
            .map_err(|e| e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Whether the binding can live without a symbol.
pub enum Need {
    /// The binding fails if the symbol is missing.
    Required,
    /// A stub is used instead.
    Optional,
}

struct Declaration {
    nick: &'static str,
    method: Method,
    need: Need,
}

const DECLARATIONS: [Declaration; 6] = [
    Declaration {
        nick: "request_start",
        method: Method::RegisterGame,
        need: Need::Required,
    },
    Declaration {
        nick: "request_end",
        method: Method::UnregisterGame,
        need: Need::Required,
    },
    Declaration {
        nick: "query_status",
        method: Method::QueryStatus,
        need: Need::Required,
    },
    Declaration {
        nick: "request_start_for",
        method: Method::RegisterGameByPID,
        need: Need::Optional,
    },
    Declaration {
        nick: "request_end_for",
        method: Method::UnregisterGameByPID,
        need: Need::Optional,
    },
    Declaration {
        nick: "query_status_for",
        method: Method::QueryStatusByPID,
        need: Need::Optional,
    },
];

/// The symbol name exported for `nick`.
pub fn symbol_name(nick: &str) -> String {
    format!("{SYMBOL_PREFIX}{nick}")
}

#[derive(Clone, Copy)]
enum Capability {
    Simple(SimpleFn),
    ForPid(ForPidFn),
    Stub(&'static str),
}

/// The resolved operations of a loaded implementation.
pub struct Binding {
    table: HashMap<Method, Capability>,
    error_string: Option<ErrorStringFn>,
    diagnostic: Mutex<String>,
    // Set while the last request ran into a stub.
    stubbed: AtomicBool,
    // Declared last so the functions above never outlive their library.
    _source: Box<dyn SymbolSource>,
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stubs = Method::ALL
            .iter()
            .filter(|m| matches!(self.table.get(m), Some(Capability::Stub(_)) | None))
            .collect::<Vec<_>>();
        f.debug_struct("Binding")
            .field("stubs", &stubs)
            .field("error_string", &self.error_string.is_some())
            .finish()
    }
}

impl Binding {
    /// Open [`LIBRARY_SONAME`], falling back to [`LIBRARY_NAME`].
    pub fn open() -> Result<Self, Error> {
        Self::open_any(&[LIBRARY_SONAME, LIBRARY_NAME])
    }

    /// Open the first library of `names` that can be loaded and bind it.
    ///
    /// A library that loads but lacks a required symbol is not skipped in
    /// favor of the next name.
    pub fn open_any(names: &[&str]) -> Result<Self, Error> {
        let mut errors = Vec::with_capacity(names.len());
        for name in names {
            // Loading runs the library's initializers.
            match unsafe { Library::new(name) } {
                Ok(library) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Loaded {}", name);
                    return Self::load(library);
                }
                Err(e) => errors.push(e.to_string()),
            }
        }
        Err(Error::LibraryNotFound(errors.join("; ")))
    }

    /// Resolve every declared symbol from `source`.
    pub fn load(source: impl SymbolSource) -> Result<Self, Error> {
        let mut diagnostic = String::new();
        let mut table = HashMap::with_capacity(DECLARATIONS.len());

        for declaration in &DECLARATIONS {
            let name = symbol_name(declaration.nick);
            let capability = match resolve(&source, &name) {
                Ok(address) => unsafe { bind(declaration.method, address) },
                Err(e) => {
                    let message = format!("failed to load symbol '{}': {}", declaration.nick, e);
                    #[cfg(feature = "tracing")]
                    tracing::debug!("{}", message);
                    if declaration.need == Need::Required {
                        return Err(Error::MissingSymbol(declaration.nick.to_owned(), e));
                    }
                    diagnostic = message;
                    Capability::Stub(declaration.nick)
                }
            };
            table.insert(declaration.method, capability);
        }

        let error_string = match resolve(&source, &symbol_name(ERROR_STRING)) {
            Ok(address) => Some(unsafe { std::mem::transmute::<*const c_void, ErrorStringFn>(address) }),
            Err(e) => {
                diagnostic = format!("failed to load symbol '{ERROR_STRING}': {e}");
                None
            }
        };

        Ok(Self {
            table,
            error_string,
            diagnostic: Mutex::new(diagnostic),
            stubbed: AtomicBool::new(false),
            _source: Box::new(source),
        })
    }

    /// Whether `method` is backed by the library rather than a stub.
    pub fn provides(&self, method: Method) -> bool {
        !matches!(self.table.get(&method), Some(Capability::Stub(_)) | None)
    }

    /// Run `request` through the library.
    ///
    /// The requester is always the current process, only the target pid of
    /// the `*ByPID` methods is forwarded.
    pub fn request(&self, request: &Request) -> i32 {
        let method = request.method();
        let capability = self.table.get(&method).copied();
        self.stubbed.store(
            matches!(capability, Some(Capability::Stub(_)) | None),
            Ordering::SeqCst,
        );
        match capability {
            Some(Capability::Simple(f)) => unsafe { f() },
            Some(Capability::ForPid(f)) => unsafe { f(request.target_pid().unwrap_or(0)) },
            Some(Capability::Stub(nick)) => {
                self.set_diagnostic(format!("'{nick}' is not provided by the GameMode library"));
                STUB_CODE
            }
            None => {
                self.set_diagnostic(format!("'{method}' is not bound"));
                STUB_CODE
            }
        }
    }

    /// The library's error string, or the binder's own diagnostic if the
    /// library doesn't export one or the last request hit a stub.
    pub fn error_string(&self) -> String {
        match self.error_string {
            Some(f) if !self.stubbed.load(Ordering::SeqCst) => {
                let ptr = unsafe { f() };
                if ptr.is_null() {
                    String::new()
                } else {
                    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
                }
            }
            _ => self
                .diagnostic
                .lock()
                .map(|d| d.clone())
                .unwrap_or_default(),
        }
    }

    fn set_diagnostic(&self, message: String) {
        if let Ok(mut diagnostic) = self.diagnostic.lock() {
            *diagnostic = message;
        }
    }
}

fn resolve(source: &impl SymbolSource, name: &str) -> Result<*const c_void, String> {
    match source.lookup(name)? {
        address if address.is_null() => Err(format!("{name} resolves to NULL")),
        address => Ok(address),
    }
}

/// # Safety
///
/// `address` must be a function with the signature of `method`'s symbol.
unsafe fn bind(method: Method, address: *const c_void) -> Capability {
    if method.is_by_pid() {
        Capability::ForPid(std::mem::transmute::<*const c_void, ForPidFn>(address))
    } else {
        Capability::Simple(std::mem::transmute::<*const c_void, SimpleFn>(address))
    }
}

impl Backend for Binding {
    fn name(&self) -> &'static str {
        "library"
    }

    fn call(&self, request: &Request) -> Result<i32, Error> {
        Ok(self.request(request))
    }

    fn last_error(&self) -> Option<String> {
        Some(self.error_string()).filter(|e| !e.is_empty())
    }
}

/// The process-wide binding, loaded on first use.
///
/// Returns `None` when no usable library is installed. Both outcomes are
/// cached: the library is looked for once per process.
pub fn ensure_binding() -> Option<Arc<Binding>> {
    BINDING
        .get_or_init(|| match Binding::open() {
            Ok(binding) => Some(Arc::new(binding)),
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::info!("GameMode library unavailable: {}", _e);
                None
            }
        })
        .clone()
}
