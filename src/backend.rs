use crate::{Error, Request};

/// Something able to carry a [`Request`] to GameMode.
///
/// Implemented by the bus clients ([`NativeClient`](crate::NativeClient),
/// [`PortalClient`](crate::PortalClient)), by a dynamically loaded
/// implementation ([`Binding`](crate::Binding)) and by [`Unavailable`].
pub trait Backend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Send the request and block until the result code is known.
    fn call(&self, request: &Request) -> Result<i32, Error>;

    /// A diagnostic owned by the backend itself.
    ///
    /// Backends that report every failure through [`Backend::call`] don't
    /// need to override this.
    fn last_error(&self) -> Option<String> {
        None
    }
}

/// The backend used when no implementation could be found.
///
/// Every request fails with [`Error::Unavailable`] without touching the bus.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unavailable;

impl Backend for Unavailable {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn call(&self, _request: &Request) -> Result<i32, Error> {
        Err(Error::Unavailable)
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn call(&self, request: &Request) -> Result<i32, Error> {
        (**self).call(request)
    }

    fn last_error(&self) -> Option<String> {
        (**self).last_error()
    }
}

impl<B: Backend + ?Sized> Backend for std::sync::Arc<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn call(&self, request: &Request) -> Result<i32, Error> {
        (**self).call(request)
    }

    fn last_error(&self) -> Option<String> {
        (**self).last_error()
    }
}
