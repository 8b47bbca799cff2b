//! Portal calls must not leak any of their socket descriptors.
//!
//! Everything runs from a single test so that no other test of this binary
//! opens descriptors while they are being counted.

use std::{
    io,
    os::unix::net::UnixStream,
    sync::atomic::{AtomicUsize, Ordering},
};

use gamemode_client::{Error, GameMode, Method, PortalClient, PortalExchange, Request};

static PAIRS: AtomicUsize = AtomicUsize::new(0);

fn open_descriptors() -> usize {
    std::fs::read_dir("/proc/self/fd").unwrap().count()
}

fn exhausted() -> io::Result<(UnixStream, UnixStream)> {
    Err(io::Error::from_raw_os_error(libc::EMFILE))
}

/// Hands out one pair, then runs out.
fn one_pair_only() -> io::Result<(UnixStream, UnixStream)> {
    if PAIRS.fetch_add(1, Ordering::SeqCst) == 0 {
        UnixStream::pair()
    } else {
        exhausted()
    }
}

#[test]
fn portal_descriptors_are_closed() {
    let before = open_descriptors();

    // A complete exchange.
    for method in Method::ALL {
        let exchange = PortalExchange::open().unwrap();
        assert_eq!(open_descriptors(), before + 4);
        exchange.send_method(method).unwrap();
        exchange.close().unwrap();
        assert_eq!(open_descriptors(), before, "{method}");
    }

    // No descriptors at all.
    let client = PortalClient::new().with_socket_pair(exhausted);
    let err = futures::executor::block_on(client.request(&Request::new(Method::QueryStatus, 0)))
        .unwrap_err();
    assert!(matches!(err, Error::IO(_)));
    assert_eq!(open_descriptors(), before);

    // The wire pair is created, the data pair isn't.
    let err = PortalExchange::open_with(one_pair_only).unwrap_err();
    assert!(matches!(err, Error::IO(_)));
    assert_eq!(open_descriptors(), before);

    // Through the façade.
    PAIRS.store(0, Ordering::SeqCst);
    let gamemode = GameMode::with_backend(PortalClient::new().with_socket_pair(one_pair_only));
    assert!(gamemode.start_for(4242) < 0);
    assert_eq!(open_descriptors(), before);
}
