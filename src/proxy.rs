use std::{fmt::Debug, sync::Arc};

use once_cell::sync::OnceCell;
use serde::Serialize;
use zbus::{zvariant::DynamicType, Message};

use crate::{Error, Method};

pub(crate) const GAMEMODE_DESTINATION: &str = "com.feralinteractive.GameMode";
pub(crate) const GAMEMODE_PATH: &str = "/com/feralinteractive/GameMode";
pub(crate) const GAMEMODE_INTERFACE: &str = "com.feralinteractive.GameMode";

pub(crate) const PORTAL_DESTINATION: &str = "org.freedesktop.portal.Desktop";
pub(crate) const PORTAL_PATH: &str = "/org/freedesktop/portal/desktop";
pub(crate) const PORTAL_INTERFACE: &str = "org.freedesktop.portal.GameMode";
pub(crate) const PORTAL_ACTION: &str = "Action";

static SESSION: OnceCell<zbus::Connection> = OnceCell::new();

/// A well-known name, object path and interface triple to send method calls
/// to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Proxy {
    destination: &'static str,
    path: &'static str,
    interface: &'static str,
}

impl Proxy {
    pub(crate) async fn connection() -> zbus::Result<zbus::Connection> {
        if let Some(cnx) = SESSION.get() {
            return Ok(cnx.clone());
        }
        let cnx = zbus::Connection::session().await?;
        // Another thread might have won the race, keep whichever came first.
        Ok(SESSION.get_or_init(|| cnx).clone())
    }

    /// The GameMode daemon itself.
    pub(crate) const fn gamemode() -> Self {
        Self {
            destination: GAMEMODE_DESTINATION,
            path: GAMEMODE_PATH,
            interface: GAMEMODE_INTERFACE,
        }
    }

    /// The GameMode portal, reachable from inside a sandbox.
    pub(crate) const fn portal() -> Self {
        Self {
            destination: PORTAL_DESTINATION,
            path: PORTAL_PATH,
            interface: PORTAL_INTERFACE,
        }
    }

    /// Build the method call without sending it.
    #[cfg(test)]
    pub(crate) fn method_call<B>(&self, member: &str, body: &B) -> zbus::Result<Message>
    where
        B: Serialize + DynamicType,
    {
        Message::method(
            None::<&str>,
            Some(self.destination),
            self.path,
            Some(self.interface),
            member,
            body,
        )
    }

    /// Call `member` and decode the single `i` of the reply.
    ///
    /// `method` is the GameMode operation the call stands for, it differs
    /// from `member` on the portal where every operation goes through the
    /// same action.
    pub(crate) async fn call<B>(
        &self,
        connection: &zbus::Connection,
        method: Method,
        member: &str,
        body: &B,
    ) -> Result<i32, Error>
    where
        B: Serialize + DynamicType + Debug,
    {
        #[cfg(feature = "tracing")]
        {
            tracing::info!("Calling method {}:{}", self.interface, member);
            tracing::debug!("With body {:#?}", body);
        }
        let reply = connection
            .call_method(
                Some(self.destination),
                self.path,
                Some(self.interface),
                member,
                body,
            )
            .await;
        decode_reply(method, self.interface, reply)
    }
}

/// Turn the outcome of a method call into a result code.
///
/// Error replies and replies that don't carry exactly one `i` become errors,
/// the code itself is passed through untouched.
pub(crate) fn decode_reply(
    method: Method,
    interface: &'static str,
    reply: zbus::Result<Arc<Message>>,
) -> Result<i32, Error> {
    match reply {
        Ok(msg) => {
            let code = msg
                .body::<i32>()
                .map_err(|e| Error::MalformedReply(method, e))?;
            #[cfg(feature = "tracing")]
            tracing::debug!("Received reply {} for '{}'", code, method);
            Ok(code)
        }
        Err(zbus::Error::MethodError(name, message, _)) => Err(Error::MethodReply {
            method,
            interface,
            name: name.to_string(),
            message,
        }),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use zbus::names::{ErrorName, OwnedErrorName};

    use super::*;

    fn reply_with<B: Serialize + DynamicType>(body: &B) -> Arc<Message> {
        Arc::new(Proxy::gamemode().method_call("Reply", body).unwrap())
    }

    #[test]
    fn decode_integer() {
        let code = decode_reply(Method::RegisterGame, GAMEMODE_INTERFACE, Ok(reply_with(&0i32)));
        assert_eq!(code.unwrap(), 0);

        let code = decode_reply(Method::QueryStatus, GAMEMODE_INTERFACE, Ok(reply_with(&-2i32)));
        assert_eq!(code.unwrap(), -2);
    }

    #[test]
    fn decode_wrong_type() {
        let err = decode_reply(
            Method::QueryStatus,
            GAMEMODE_INTERFACE,
            Ok(reply_with(&"active")),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedReply(Method::QueryStatus, _)));

        let err = decode_reply(
            Method::QueryStatus,
            GAMEMODE_INTERFACE,
            Ok(reply_with(&(1i32, 2i32))),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedReply(..)));

        let err = decode_reply(Method::QueryStatus, GAMEMODE_INTERFACE, Ok(reply_with(&())))
            .unwrap_err();
        assert!(matches!(err, Error::MalformedReply(..)));
    }

    #[test]
    fn decode_error_reply() {
        let name: OwnedErrorName = ErrorName::try_from("org.freedesktop.DBus.Error.AccessDenied")
            .unwrap()
            .into();
        let reply = Err(zbus::Error::MethodError(
            name,
            Some("not allowed".to_owned()),
            reply_with(&()),
        ));
        let err = decode_reply(Method::UnregisterGame, GAMEMODE_INTERFACE, reply).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("UnregisterGame"), "{text}");
        assert!(text.contains(GAMEMODE_INTERFACE), "{text}");
        assert!(text.contains("AccessDenied"), "{text}");
        assert!(text.contains("not allowed"), "{text}");
    }

    #[test]
    fn decode_transport_error() {
        let err = decode_reply(
            Method::RegisterGame,
            GAMEMODE_INTERFACE,
            Err(zbus::Error::InvalidReply),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Zbus(zbus::Error::InvalidReply)));
    }

    #[test]
    fn addresses() {
        let msg = Proxy::portal().method_call(PORTAL_ACTION, &()).unwrap();
        assert_eq!(msg.interface().unwrap().as_str(), PORTAL_INTERFACE);
        assert_eq!(msg.member().unwrap().as_str(), PORTAL_ACTION);
        assert_eq!(msg.path().unwrap().as_str(), PORTAL_PATH);

        let msg = Proxy::gamemode().method_call("QueryStatus", &1i32).unwrap();
        assert_eq!(msg.interface().unwrap().as_str(), GAMEMODE_INTERFACE);
        assert_eq!(msg.path().unwrap().as_str(), GAMEMODE_PATH);
    }
}
