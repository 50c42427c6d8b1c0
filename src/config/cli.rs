//! Command-line argument parsing

use clap::{ArgAction, Parser};
use uuid::Uuid;

use crate::core::types::{DEFAULT_CHARACTERISTIC_UUID, DEFAULT_TARGET_NAME};

#[derive(Parser, Debug, Clone)]
#[clap(name = "ble-notify-bridge", version, author)]
#[clap(about = "Forwards BLE characteristic notifications to a display log and a document store")]
pub struct CliArgs {
    /// Advertised name of the peripheral to connect to (exact match)
    #[clap(long, default_value = DEFAULT_TARGET_NAME)]
    pub target_name: String,

    /// Characteristic to subscribe to
    #[clap(long, default_value_t = DEFAULT_CHARACTERISTIC_UUID)]
    pub characteristic_uuid: Uuid,

    /// Bluetooth adapter name (e.g. hci0), default adapter when omitted
    #[clap(long)]
    pub adapter: Option<String>,

    /// Start scanning as soon as the adapter is powered on
    #[clap(long, default_value_t = true, action = ArgAction::Set)]
    pub auto_scan: bool,

    /// Directory holding the document store
    #[clap(long, default_value = "/var/lib/ble-notify-bridge")]
    pub store_dir: String,

    /// Collection received values are appended to
    #[clap(long, default_value = "neurodata")]
    pub collection: String,

    /// Enable Unix socket transport
    #[clap(long)]
    pub enable_unix_socket: bool,

    /// Path for Unix socket
    #[clap(long, default_value = "/run/ble-notify-bridge.sock")]
    pub socket_path: String,

    /// Socket file permissions (octal, e.g., 660)
    #[clap(long, default_value = "660")]
    pub socket_mode: String,

    /// Print the display log to stdout
    #[clap(long, default_value_t = true, action = ArgAction::Set)]
    pub console: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::parse_from(["ble-notify-bridge"]);

        assert_eq!(args.target_name, "iPhone (2)");
        assert_eq!(
            args.characteristic_uuid,
            Uuid::parse_str("2EA5E5C0-47D9-4EA9-8E58-2C2E09ACF6F0").unwrap()
        );
        assert_eq!(args.adapter, None);
        assert!(args.auto_scan);
        assert!(args.console);
        assert!(!args.enable_unix_socket);
        assert_eq!(args.collection, "neurodata");
    }

    #[test]
    fn test_overrides() {
        let args = CliArgs::parse_from([
            "ble-notify-bridge",
            "--target-name",
            "Sensor",
            "--adapter",
            "hci1",
            "--auto-scan",
            "false",
            "--console",
            "false",
            "--enable-unix-socket",
        ]);

        assert_eq!(args.target_name, "Sensor");
        assert_eq!(args.adapter.as_deref(), Some("hci1"));
        assert!(!args.auto_scan);
        assert!(!args.console);
        assert!(args.enable_unix_socket);
    }

    #[test]
    fn test_invalid_uuid_rejected() {
        let result =
            CliArgs::try_parse_from(["ble-notify-bridge", "--characteristic-uuid", "not-a-uuid"]);
        assert!(result.is_err());
    }
}
