/*!
 * Bluetooth Status Classification
 * Snapshot of BlueZ managed objects in, one status marker out
 */

use dbus::arg::{prop_cast, PropMap};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

pub const ADAPTER_INTERFACE: &str = "org.bluez.Adapter1";
pub const DEVICE_INTERFACE: &str = "org.bluez.Device1";

/// Reply of `org.freedesktop.DBus.ObjectManager.GetManagedObjects`:
/// object path -> interface name -> property name -> value.
pub type Snapshot = HashMap<dbus::Path<'static>, HashMap<String, PropMap>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    /// Nothing has been classified yet.
    #[default]
    Undefined,
    Disabled,
    Enabled,
    Connected,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Undefined => "undefined",
            Status::Disabled => "disabled",
            Status::Enabled => "enabled",
            Status::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Foreground colors used for the status marker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Palette {
    pub disabled: String,
    pub enabled: String,
    pub connected: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            disabled: "#707880".to_string(),
            enabled: "#C5C8C6".to_string(),
            connected: "#2193ff".to_string(),
        }
    }
}

/// Derive the status from a full snapshot.
///
/// A connected device wins over a powered adapter. Objects missing the
/// interface or property, or carrying a non-boolean value, are skipped.
pub fn classify(objects: &Snapshot) -> Status {
    let connected_devices = objects
        .values()
        .filter(|interfaces| has_flag(interfaces, DEVICE_INTERFACE, "Connected"))
        .count();
    let powered_adapters = objects
        .values()
        .filter(|interfaces| has_flag(interfaces, ADAPTER_INTERFACE, "Powered"))
        .count();

    if connected_devices > 0 {
        Status::Connected
    } else if powered_adapters > 0 {
        Status::Enabled
    } else {
        Status::Disabled
    }
}

fn has_flag(interfaces: &HashMap<String, PropMap>, interface: &str, property: &str) -> bool {
    interfaces
        .get(interface)
        .and_then(|props| prop_cast::<bool>(props, property))
        .copied()
        .unwrap_or(false)
}

/// Render the status as polybar foreground markup.
pub fn format_status(status: Status, palette: &Palette) -> String {
    match status {
        Status::Disabled => format!("%{{F{}}}", palette.disabled),
        Status::Enabled => format!("%{{F{}}}", palette.enabled),
        Status::Connected => format!("%{{F{}}}", palette.connected),
        Status::Undefined => format!("%{{F{}}}?", palette.disabled),
    }
}
