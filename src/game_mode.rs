//! # Examples
//!
//! ```rust,no_run
//! use gamemode_client::GameMode;
//!
//! let gamemode = GameMode::new();
//!
//! if gamemode.start() < 0 {
//!     eprintln!("could not start GameMode: {}", gamemode.last_error());
//! }
//! println!("{}", gamemode.query_status());
//! gamemode.end();
//! ```

use std::{fmt, sync::Arc, sync::Mutex};

use crate::{
    backend::{Backend, Unavailable},
    binding::{ensure_binding, Binding},
    native::NativeClient,
    portal::PortalClient,
    sandbox::{select_transport, TransportMode},
    Error, Method, Request, Status,
};

/// Result code used for every failure that isn't a reply from GameMode.
pub const TRANSPORT_FAILURE: i32 = -1;

/// Requests GameMode for the current process or on behalf of others.
///
/// GameMode will monitor registered clients. A client that terminates
/// without un-registering is un-registered automatically, possibly with a
/// (small) delay.
///
/// The integer operations return the daemon's result code:
///
/// * `0` the request was accepted (for queries: GameMode is inactive),
/// * `1`, `2` for queries: GameMode is active, respectively active with the
///   process registered,
/// * `-1` the request was accepted but could not be satisfied, or it never
///   reached GameMode; see [`GameMode::last_error`],
/// * `-2` the request was rejected.
///
/// Requests block until GameMode replies. There is no timeout: callers that
/// need one should issue the request on a worker thread.
pub struct GameMode {
    backend: Box<dyn Backend>,
    last_error: Mutex<Option<String>>,
}

impl fmt::Debug for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameMode")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Default for GameMode {
    fn default() -> Self {
        Self::new()
    }
}

impl GameMode {
    /// Create a new instance of [`GameMode`] using the transport selected
    /// for this process, see [`select_transport`].
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Configure a [`GameMode`] explicitly.
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Talk to GameMode with `mode`, regardless of the sandbox status.
    pub fn with_transport(mode: TransportMode) -> Self {
        Self::builder().transport(mode).build()
    }

    /// Send every request to `backend`.
    pub fn with_backend(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            last_error: Mutex::new(None),
        }
    }

    /// Forward requests to `binding`, or fail them all if there is none.
    pub fn from_binding(binding: Option<Arc<Binding>>) -> Self {
        match binding {
            Some(binding) => Self::with_backend(binding),
            None => Self::with_backend(Unavailable),
        }
    }

    /// Forward requests to the installed GameMode library, see
    /// [`ensure_binding`].
    pub fn dynamic() -> Self {
        Self::from_binding(ensure_binding())
    }

    /// Short name of the backend in use: `native`, `portal`, `library` or
    /// `unavailable`.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Send `request`, reporting failures as errors.
    pub fn call(&self, request: &Request) -> Result<i32, Error> {
        let method = request.method();
        #[cfg(feature = "tracing")]
        tracing::info!(
            "[{}] request '{}' received ({}) via {}",
            request.requester_pid(),
            method,
            request.target_pid().unwrap_or(0),
            self.backend.name()
        );
        let result = self.backend.call(request);
        match &result {
            Ok(_code) => {
                #[cfg(feature = "tracing")]
                match Status::from_code(*_code) {
                    Some(Status::NotApplicable | Status::Rejected) => {
                        tracing::info!("Request '{}' was not granted: {}", method, _code)
                    }
                    _ => tracing::info!("Request '{}' done: {}", method, _code),
                }
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Request '{}' failed: {}", method, e);
                self.set_last_error(e.to_string());
            }
        }
        result
    }

    /// Send `method`, with `target_pid` if it isn't `0`.
    ///
    /// Returns [`TRANSPORT_FAILURE`] if GameMode couldn't be reached.
    pub fn request(&self, method: Method, target_pid: i32) -> i32 {
        self.call(&Request::new(method, target_pid))
            .unwrap_or(TRANSPORT_FAILURE)
    }

    /// Like [`GameMode::request`], with the code mapped to a [`Status`].
    ///
    /// Codes without a known meaning are reported as
    /// [`Error::UnknownCode`].
    pub fn try_request(&self, method: Method, target_pid: i32) -> Result<Status, Error> {
        let code = self.call(&Request::new(method, target_pid))?;
        Status::from_code(code).ok_or_else(|| {
            let err = Error::UnknownCode(code);
            self.set_last_error(err.to_string());
            err
        })
    }

    #[doc(alias = "RegisterGame")]
    #[doc(alias = "gamemode_request_start")]
    /// Register the current process and request GameMode to be activated.
    pub fn start(&self) -> i32 {
        self.request(Method::RegisterGame, 0)
    }

    #[doc(alias = "UnregisterGame")]
    #[doc(alias = "gamemode_request_end")]
    /// Un-register the current process. If there are no other clients,
    /// GameMode is deactivated.
    pub fn end(&self) -> i32 {
        self.request(Method::UnregisterGame, 0)
    }

    #[doc(alias = "QueryStatus")]
    #[doc(alias = "gamemode_query_status")]
    /// Query the GameMode status of the current process.
    pub fn query_status(&self) -> i32 {
        self.request(Method::QueryStatus, 0)
    }

    #[doc(alias = "RegisterGameByPID")]
    #[doc(alias = "gamemode_request_start_for")]
    /// Register `pid` on behalf of the current process.
    pub fn start_for(&self, pid: i32) -> i32 {
        self.request(Method::RegisterGameByPID, pid)
    }

    #[doc(alias = "UnregisterGameByPID")]
    #[doc(alias = "gamemode_request_end_for")]
    /// Un-register `pid` on behalf of the current process.
    pub fn end_for(&self, pid: i32) -> i32 {
        self.request(Method::UnregisterGameByPID, pid)
    }

    #[doc(alias = "QueryStatusByPID")]
    #[doc(alias = "gamemode_query_status_for")]
    /// Query the GameMode status of `pid`.
    pub fn query_status_for(&self, pid: i32) -> i32 {
        self.request(Method::QueryStatusByPID, pid)
    }

    #[doc(alias = "gamemode_error_string")]
    /// A description of the last failure of this handle.
    ///
    /// Only meaningful after a request failed; the text is meant for humans
    /// and has no stable format. Empty if nothing failed yet.
    pub fn last_error(&self) -> String {
        self.backend
            .last_error()
            .or_else(|| self.last_error.lock().ok().and_then(|e| e.clone()))
            .unwrap_or_default()
    }

    fn set_last_error(&self, message: String) {
        if let Ok(mut last_error) = self.last_error.lock() {
            *last_error = Some(message);
        }
    }
}

/// A [`GameMode`] builder.
#[derive(Debug, Default)]
pub struct Builder {
    transport: Option<TransportMode>,
    connection: Option<zbus::Connection>,
}

impl Builder {
    /// Use `mode` instead of detecting the sandbox.
    pub fn transport(mut self, mode: TransportMode) -> Self {
        self.transport = Some(mode);
        self
    }

    /// Use `connection` instead of the shared session connection.
    pub fn connection(mut self, connection: zbus::Connection) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn build(self) -> GameMode {
        let mode = self.transport.unwrap_or_else(select_transport);
        match (mode, self.connection) {
            (TransportMode::Native, None) => GameMode::with_backend(NativeClient::new()),
            (TransportMode::Native, Some(cnx)) => {
                GameMode::with_backend(NativeClient::with_connection(cnx))
            }
            (TransportMode::Portal, None) => GameMode::with_backend(PortalClient::new()),
            (TransportMode::Portal, Some(cnx)) => {
                GameMode::with_backend(PortalClient::new().with_connection(cnx))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        os::unix::net::UnixStream,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::binding::tests::FakeLibrary;

    type Reply = fn(&Request) -> Result<i32, Error>;

    /// Records the requests it receives and answers with `reply`.
    struct Recorder {
        calls: AtomicUsize,
        requests: Mutex<Vec<Request>>,
        reply: Reply,
    }

    impl Recorder {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
                reply,
            })
        }
    }

    impl Backend for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn call(&self, request: &Request) -> Result<i32, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(*request);
            (self.reply)(request)
        }
    }

    fn error_reply(request: &Request) -> Result<i32, Error> {
        Err(Error::MethodReply {
            method: request.method(),
            interface: "com.feralinteractive.GameMode",
            name: "org.freedesktop.DBus.Error.ServiceUnknown".to_owned(),
            message: Some("The name is not activatable".to_owned()),
        })
    }

    #[test]
    fn accepted_request() {
        let recorder = Recorder::new(|_| Ok(0));
        let gamemode = GameMode::with_backend(recorder.clone());

        assert_eq!(gamemode.start(), 0);
        assert_eq!(gamemode.last_error(), "");
        assert_eq!(
            gamemode.try_request(Method::RegisterGame, 0).unwrap(),
            Status::Accepted
        );
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn error_reply_sets_last_error() {
        let gamemode = GameMode::with_backend(Recorder::new(error_reply));

        assert!(gamemode.start() < 0);
        let last_error = gamemode.last_error();
        assert!(last_error.contains("RegisterGame"), "{last_error}");

        assert!(gamemode.query_status_for(12) < 0);
        assert!(gamemode.last_error().contains("QueryStatusByPID"));
    }

    #[test]
    fn rejection_is_not_a_failure() {
        let gamemode = GameMode::with_backend(Recorder::new(|_| Ok(-2)));

        assert_eq!(gamemode.start(), -2);
        assert_eq!(gamemode.last_error(), "");
        assert_eq!(
            gamemode.try_request(Method::RegisterGame, 0).unwrap(),
            Status::Rejected
        );
        assert_eq!(gamemode.last_error(), "");
    }

    #[test]
    fn unknown_codes() {
        let gamemode = GameMode::with_backend(Recorder::new(|_| Ok(-7)));

        assert_eq!(gamemode.query_status(), -7);
        let err = gamemode.try_request(Method::QueryStatus, 0).unwrap_err();
        assert!(matches!(err, Error::UnknownCode(-7)));
        assert!(gamemode.last_error().contains("-7"));
    }

    #[test]
    fn operations_map_to_methods() {
        let recorder = Recorder::new(|_| Ok(0));
        let gamemode = GameMode::with_backend(recorder.clone());

        gamemode.start();
        gamemode.end();
        gamemode.query_status();
        gamemode.start_for(10);
        gamemode.end_for(11);
        gamemode.query_status_for(12);

        let requests = recorder.requests.lock().unwrap();
        let methods = requests.iter().map(Request::method).collect::<Vec<_>>();
        assert_eq!(methods, Method::ALL);
        let targets = requests.iter().map(Request::target_pid).collect::<Vec<_>>();
        assert_eq!(targets, [None, None, None, Some(10), Some(11), Some(12)]);
        for request in requests.iter() {
            assert_eq!(request.requester_pid(), std::process::id() as i32);
        }
    }

    #[test]
    fn unavailable_binding_fails_everything() {
        let library = FakeLibrary::complete().without("query_status");
        assert!(Binding::load(library).is_err());

        let gamemode = GameMode::from_binding(None);
        assert_eq!(gamemode.backend_name(), "unavailable");
        for code in [
            gamemode.start(),
            gamemode.end(),
            gamemode.query_status(),
            gamemode.start_for(1),
            gamemode.end_for(1),
            gamemode.query_status_for(1),
        ] {
            assert!(code < 0);
        }
        assert!(!gamemode.last_error().is_empty());
    }

    #[test]
    fn partial_binding_stubs_one_operation() {
        let binding = Binding::load(FakeLibrary::complete().without("request_end_for")).unwrap();
        let gamemode = GameMode::from_binding(Some(Arc::new(binding)));

        assert_eq!(gamemode.backend_name(), "library");
        assert_eq!(gamemode.start(), 0);
        assert_eq!(gamemode.end_for(77), -1);
        assert!(gamemode.last_error().contains("request_end_for"));
        assert_eq!(gamemode.start_for(77), 0);
        // Back to the library's own error string.
        assert_eq!(gamemode.last_error(), "reported by the library");
    }

    #[test]
    fn stub_failure_is_explained() {
        let library = FakeLibrary::complete().without("request_end_for").silent();
        let gamemode = GameMode::from_binding(Some(Arc::new(Binding::load(library).unwrap())));

        assert_eq!(gamemode.end_for(77), -1);
        let last_error = gamemode.last_error();
        assert!(!last_error.is_empty());
        assert!(last_error.contains("request_end_for"), "{last_error}");
    }

    #[test]
    fn portal_without_descriptors() {
        fn exhausted() -> io::Result<(UnixStream, UnixStream)> {
            Err(io::Error::from_raw_os_error(libc::ENFILE))
        }

        let gamemode = GameMode::with_backend(PortalClient::new().with_socket_pair(exhausted));
        assert_eq!(gamemode.start(), TRANSPORT_FAILURE);
        assert!(!gamemode.last_error().is_empty());
    }

    #[test]
    fn explicit_transport() {
        let gamemode = GameMode::with_transport(TransportMode::Portal);
        assert_eq!(gamemode.backend_name(), "portal");

        let gamemode = GameMode::with_transport(TransportMode::Native);
        assert_eq!(gamemode.backend_name(), "native");
    }
}
