use std::fmt::{self, Display};

/// The methods understood by the GameMode daemon.
///
/// The portal transport carries the same names over its side channel, so
/// this is the single list of operations for every transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Register the calling process and request GameMode to be activated.
    RegisterGame,
    /// Un-register the calling process.
    UnregisterGame,
    /// Query the GameMode status of the calling process.
    QueryStatus,
    /// Register another process on behalf of the caller.
    RegisterGameByPID,
    /// Un-register another process on behalf of the caller.
    UnregisterGameByPID,
    /// Query the GameMode status of another process.
    QueryStatusByPID,
}

impl Method {
    /// Every method, in declaration order.
    pub const ALL: [Method; 6] = [
        Self::RegisterGame,
        Self::UnregisterGame,
        Self::QueryStatus,
        Self::RegisterGameByPID,
        Self::UnregisterGameByPID,
        Self::QueryStatusByPID,
    ];

    /// The D-Bus member name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RegisterGame => "RegisterGame",
            Self::UnregisterGame => "UnregisterGame",
            Self::QueryStatus => "QueryStatus",
            Self::RegisterGameByPID => "RegisterGameByPID",
            Self::UnregisterGameByPID => "UnregisterGameByPID",
            Self::QueryStatusByPID => "QueryStatusByPID",
        }
    }

    /// Whether the method acts on a target process other than the caller.
    pub fn is_by_pid(self) -> bool {
        matches!(
            self,
            Self::RegisterGameByPID | Self::UnregisterGameByPID | Self::QueryStatusByPID
        )
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request to the daemon.
///
/// `target_pid` of `0` means the request is about the caller itself and is
/// not sent over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    method: Method,
    requester_pid: i32,
    target_pid: i32,
}

impl Request {
    /// A request issued by the current process.
    pub fn new(method: Method, target_pid: i32) -> Self {
        Self::with_requester(method, std::process::id() as i32, target_pid)
    }

    /// A request with an explicit requester, mostly useful for tests and for
    /// callers that already know their pid in the daemon's namespace.
    pub fn with_requester(method: Method, requester_pid: i32, target_pid: i32) -> Self {
        Self {
            method,
            requester_pid,
            target_pid,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn requester_pid(&self) -> i32 {
        self.requester_pid
    }

    /// The target process, `None` when the request is about the caller.
    pub fn target_pid(&self) -> Option<i32> {
        (self.target_pid != 0).then_some(self.target_pid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The meaning of a result code returned by the daemon.
pub enum Status {
    /// `0`: the request was accepted. For queries: GameMode is inactive.
    Accepted,
    /// `1`: GameMode is active. Only returned by queries.
    Active,
    /// `2`: GameMode is active and the process is registered. Only returned
    /// by queries.
    Registered,
    /// `-1`: the request was accepted but could not be satisfied, e.g. the
    /// process was not registered.
    NotApplicable,
    /// `-2`: the request was rejected by the daemon's policy.
    Rejected,
}

impl Status {
    /// Map a raw result code, `None` for codes without a known meaning.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Accepted),
            1 => Some(Self::Active),
            2 => Some(Self::Registered),
            -1 => Some(Self::NotApplicable),
            -2 => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Accepted => 0,
            Self::Active => 1,
            Self::Registered => 2,
            Self::NotApplicable => -1,
            Self::Rejected => -2,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn method_names() {
        let names: Vec<_> = Method::ALL.iter().map(|m| m.to_string()).collect();
        assert_eq!(
            names,
            [
                "RegisterGame",
                "UnregisterGame",
                "QueryStatus",
                "RegisterGameByPID",
                "UnregisterGameByPID",
                "QueryStatusByPID"
            ]
        );
        assert_eq!(Method::ALL.iter().filter(|m| m.is_by_pid()).count(), 3);
    }

    #[test]
    fn target_pid_zero_is_self() {
        let request = Request::with_requester(Method::QueryStatus, 42, 0);
        assert_eq!(request.target_pid(), None);
        assert_eq!(request.requester_pid(), 42);

        let request = Request::with_requester(Method::QueryStatusByPID, 42, 7);
        assert_eq!(request.target_pid(), Some(7));

        assert_eq!(
            Request::new(Method::RegisterGame, 0).requester_pid(),
            std::process::id() as i32
        );
    }

    #[test]
    fn status_codes() {
        for code in -2..=2 {
            assert_eq!(Status::from_code(code).map(Status::code), Some(code));
        }
        assert_eq!(Status::from_code(-3), None);
        assert_eq!(Status::from_code(i32::MIN), None);
        assert_eq!(Status::from_code(3), None);
    }
}
