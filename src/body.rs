//! Method call bodies whose signature depends on whether a target pid is
//! present.
//!
//! zvariant derives a static signature from a Rust type, but the daemon's
//! calls take one *or* two arguments, so these types provide their signature
//! at runtime through [`DynamicType`].

use std::os::fd::{AsRawFd, BorrowedFd};

use serde::{ser::SerializeTuple, Serialize, Serializer};
use zbus::zvariant::{DynamicType, Signature, Type};

use crate::Request;

/// `i` or `ii`: the requester pid, then the target pid if there is one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PidArguments {
    Requester(i32),
    RequesterAndTarget(i32, i32),
}

impl From<&Request> for PidArguments {
    fn from(request: &Request) -> Self {
        match request.target_pid() {
            None => Self::Requester(request.requester_pid()),
            Some(target) => Self::RequesterAndTarget(request.requester_pid(), target),
        }
    }
}

impl Serialize for PidArguments {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match *self {
            Self::Requester(pid) => serializer.serialize_i32(pid),
            Self::RequesterAndTarget(requester, target) => (requester, target).serialize(serializer),
        }
    }
}

impl DynamicType for PidArguments {
    fn dynamic_signature(&self) -> Signature<'_> {
        match self {
            Self::Requester(_) => i32::signature(),
            Self::RequesterAndTarget(..) => <(i32, i32)>::signature(),
        }
    }
}

/// `h` or `hi`: the descriptor the portal reads the method name from, then
/// the target pid if there is one.
///
/// The descriptor is only borrowed, the peer receives a duplicate when the
/// message is sent and the caller still closes its own copy.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ActionArguments<'f> {
    wire: BorrowedFd<'f>,
    target: Option<i32>,
}

impl<'f> ActionArguments<'f> {
    pub(crate) fn new(wire: BorrowedFd<'f>, target: Option<i32>) -> Self {
        Self { wire, target }
    }
}

impl<'f> Serialize for ActionArguments<'f> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // An `i32` in a `h` position is appended to the message's fd list.
        let fd = self.wire.as_raw_fd();
        match self.target {
            None => serializer.serialize_i32(fd),
            Some(target) => {
                let mut tuple = serializer.serialize_tuple(2)?;
                tuple.serialize_element(&fd)?;
                tuple.serialize_element(&target)?;
                tuple.end()
            }
        }
    }
}

impl<'f> DynamicType for ActionArguments<'f> {
    fn dynamic_signature(&self) -> Signature<'_> {
        match self.target {
            None => Signature::from_static_str_unchecked("h"),
            Some(_) => Signature::from_static_str_unchecked("(hi)"),
        }
    }
}
