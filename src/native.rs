use crate::{backend::Backend, body::PidArguments, proxy::Proxy, Error, Method, Request};

/// Talks to `com.feralinteractive.GameMode` directly on the session bus.
///
/// The caller's pid is always sent first; the target pid follows only when
/// the request has one.
///
/// ```rust,no_run
/// use gamemode_client::{Method, NativeClient, Request};
///
/// async fn run() -> gamemode_client::Result<()> {
///     let client = NativeClient::new();
///     let code = client.request(&Request::new(Method::QueryStatus, 0)).await?;
///     println!("{code}");
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct NativeClient {
    connection: Option<zbus::Connection>,
}

impl NativeClient {
    /// Create a new instance of [`NativeClient`] using the shared session
    /// connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `connection` instead of the shared session connection.
    pub fn with_connection(connection: zbus::Connection) -> Self {
        Self {
            connection: Some(connection),
        }
    }

    /// Send `request` to the daemon and wait for its result code.
    pub async fn request(&self, request: &Request) -> Result<i32, Error> {
        let connection = match &self.connection {
            Some(cnx) => cnx.clone(),
            None => Proxy::connection().await?,
        };
        let method = request.method();
        Proxy::gamemode()
            .call(
                &connection,
                method,
                method.as_str(),
                &PidArguments::from(request),
            )
            .await
    }
}

impl Backend for NativeClient {
    fn name(&self) -> &'static str {
        "native"
    }

    fn call(&self, request: &Request) -> Result<i32, Error> {
        futures::executor::block_on(self.request(request))
    }
}

/// Send `method` to the daemon directly, on behalf of `requester_pid`.
pub async fn request_native(method: Method, requester_pid: i32, target_pid: i32) -> Result<i32, Error> {
    NativeClient::new()
        .request(&Request::with_requester(method, requester_pid, target_pid))
        .await
}
