use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("invalid bus address: {0}")]
    InvalidAddress(String),

    #[error("failed to connect to the system bus: {0}")]
    Connect(#[source] dbus::Error),

    #[error("failed to introspect {service} at {path}: {source}")]
    Introspect {
        service: String,
        path: String,
        #[source]
        source: dbus::Error,
    },

    #[error("{service} at {path} does not implement org.freedesktop.DBus.ObjectManager")]
    MissingObjectManager { service: String, path: String },

    #[error("failed to fetch managed objects: {0}")]
    ManagedObjects(#[source] dbus::Error),

    #[error("failed to subscribe to {signal}: {source}")]
    Subscribe {
        signal: &'static str,
        #[source]
        source: dbus::Error,
    },

    #[error("lost connection to the system bus: {0}")]
    ConnectionLost(String),

    #[error("failed to write status line: {0}")]
    Output(#[from] std::io::Error),
}
