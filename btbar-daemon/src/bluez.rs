/*!
 * BlueZ Object Manager Access
 * Single system bus connection, managed object queries and signal subscriptions
 */

use dbus::message::MatchRule;
use dbus::nonblock::stdintf::org_freedesktop_dbus::ObjectManager;
use dbus::nonblock::{MsgMatch, Proxy, SyncConnection};
use dbus::strings::BusName;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::DaemonConfig;
use crate::error::WatchError;
use crate::status::Snapshot;
use crate::watcher::ObjectSource;

pub const OBJECT_MANAGER_INTERFACE: &str = "org.freedesktop.DBus.ObjectManager";
const INTROSPECTABLE_INTERFACE: &str = "org.freedesktop.DBus.Introspectable";

/// Used when no call timeout is configured; a stalled service stalls the watcher.
const UNBOUNDED_CALL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Object Manager signals that trigger a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectEvent {
    InterfacesAdded,
    InterfacesRemoved,
}

impl ObjectEvent {
    pub fn member(self) -> &'static str {
        match self {
            ObjectEvent::InterfacesAdded => "InterfacesAdded",
            ObjectEvent::InterfacesRemoved => "InterfacesRemoved",
        }
    }
}

pub struct BluezBus {
    conn: Arc<SyncConnection>,
    proxy: Proxy<'static, Arc<SyncConnection>>,
    matches: Vec<MsgMatch>,
}

/// Resolves once the connection's I/O driver stops.
pub struct BusClosed(JoinHandle<dbus_tokio::connection::IOResourceError>);

impl BusClosed {
    pub async fn wait(self) -> WatchError {
        match self.0.await {
            Ok(err) => WatchError::ConnectionLost(err.to_string()),
            Err(err) => WatchError::ConnectionLost(err.to_string()),
        }
    }
}

impl BluezBus {
    /// Connect to the system bus and verify the service exports an Object Manager.
    pub async fn connect(config: &DaemonConfig) -> Result<(Self, BusClosed), WatchError> {
        let service = BusName::new(config.service.clone()).map_err(WatchError::InvalidAddress)?;
        let path = dbus::Path::new(config.path.clone()).map_err(WatchError::InvalidAddress)?;

        let (resource, conn) =
            dbus_tokio::connection::new_system_sync().map_err(WatchError::Connect)?;
        let io = tokio::spawn(async move { resource.await });
        debug!("Connected to system bus");

        let timeout = config.call_timeout().unwrap_or(UNBOUNDED_CALL);
        let proxy = Proxy::new(service, path, timeout, conn.clone());

        let (xml,): (String,) = proxy
            .method_call(INTROSPECTABLE_INTERFACE, "Introspect", ())
            .await
            .map_err(|source| WatchError::Introspect {
                service: config.service.clone(),
                path: config.path.clone(),
                source,
            })?;

        if !declares_interface(&xml, OBJECT_MANAGER_INTERFACE) {
            return Err(WatchError::MissingObjectManager {
                service: config.service.clone(),
                path: config.path.clone(),
            });
        }

        let bus = Self {
            conn,
            proxy,
            matches: Vec::new(),
        };
        Ok((bus, BusClosed(io)))
    }

    /// Subscribe to one Object Manager signal. Each signal yields `event`;
    /// the payload is discarded.
    pub async fn subscribe(
        &mut self,
        event: ObjectEvent,
    ) -> Result<BoxStream<'static, ObjectEvent>, WatchError> {
        let rule = object_manager_rule(&self.proxy.destination, &self.proxy.path, event);

        let (msg_match, messages) = self
            .conn
            .add_match(rule)
            .await
            .map_err(|source| WatchError::Subscribe {
                signal: event.member(),
                source,
            })?
            .msg_stream();
        self.matches.push(msg_match);

        debug!("Subscribed to {}", event.member());
        Ok(messages.map(move |_| event).boxed())
    }

    /// Drop all signal subscriptions.
    pub async fn close(mut self) {
        for msg_match in self.matches.drain(..) {
            if let Err(e) = self.conn.remove_match(msg_match.token()).await {
                warn!("Failed to remove signal match: {}", e);
            }
        }
    }
}

impl ObjectSource for BluezBus {
    async fn managed_objects(&self) -> Result<Snapshot, WatchError> {
        self.proxy
            .get_managed_objects()
            .await
            .map_err(WatchError::ManagedObjects)
    }
}

/// Match one Object Manager signal emitted by `service` on `path`.
fn object_manager_rule(
    service: &BusName<'static>,
    path: &dbus::Path<'static>,
    event: ObjectEvent,
) -> MatchRule<'static> {
    MatchRule::new_signal(OBJECT_MANAGER_INTERFACE, event.member())
        .with_sender(service.clone())
        .with_path(path.clone())
}

fn declares_interface(xml: &str, interface: &str) -> bool {
    xml.contains(&format!("<interface name=\"{}\"", interface))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLUEZ_ROOT: &str = r#"<node>
  <interface name="org.freedesktop.DBus.Introspectable">
    <method name="Introspect">
      <arg name="xml" type="s" direction="out"/>
    </method>
  </interface>
  <interface name="org.freedesktop.DBus.ObjectManager">
    <method name="GetManagedObjects">
      <arg name="objects" type="a{oa{sa{sv}}}" direction="out"/>
    </method>
    <signal name="InterfacesAdded">
      <arg name="object" type="o"/>
      <arg name="interfaces" type="a{sa{sv}}"/>
    </signal>
    <signal name="InterfacesRemoved">
      <arg name="object" type="o"/>
      <arg name="interfaces" type="as"/>
    </signal>
  </interface>
  <node name="org"/>
</node>"#;

    #[test]
    fn test_root_declares_object_manager() {
        assert!(declares_interface(BLUEZ_ROOT, OBJECT_MANAGER_INTERFACE));
    }

    #[test]
    fn test_interface_prefix_is_not_a_match() {
        let xml = r#"<node><interface name="org.freedesktop.DBus.ObjectManagerExt"/></node>"#;
        assert!(!declares_interface(xml, OBJECT_MANAGER_INTERFACE));
        assert!(!declares_interface("<node/>", OBJECT_MANAGER_INTERFACE));
    }

    #[test]
    fn test_event_members() {
        assert_eq!(ObjectEvent::InterfacesAdded.member(), "InterfacesAdded");
        assert_eq!(ObjectEvent::InterfacesRemoved.member(), "InterfacesRemoved");
    }

    #[test]
    fn test_signal_rule_is_scoped_to_service_and_path() {
        let service = BusName::new("org.bluez").unwrap();
        let path = dbus::Path::new("/").unwrap();

        for event in [ObjectEvent::InterfacesAdded, ObjectEvent::InterfacesRemoved] {
            let rule = object_manager_rule(&service, &path, event).match_str();
            assert!(rule.contains("type='signal'"), "{}", rule);
            assert!(rule.contains("sender='org.bluez'"), "{}", rule);
            assert!(rule.contains("path='/'"), "{}", rule);
            assert!(
                rule.contains("interface='org.freedesktop.DBus.ObjectManager'"),
                "{}",
                rule
            );
            assert!(rule.contains(&format!("member='{}'", event.member())), "{}", rule);
        }
    }
}
