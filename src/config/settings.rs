//! Runtime settings

use std::path::PathBuf;
use tracing::warn;
use uuid::Uuid;

use crate::{config::CliArgs, core::session::SessionConfig};

const DEFAULT_SOCKET_MODE: u32 = 0o660;

/// Runtime configuration settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub target_name: String,
    pub characteristic_uuid: Uuid,
    pub adapter: Option<String>,
    pub auto_scan: bool,
    pub store_dir: PathBuf,
    pub collection: String,
    pub enable_unix_socket: bool,
    pub socket_path: String,
    pub socket_mode: u32,
    pub console: bool,
}

impl Settings {
    /// Matching rules for the session state machine
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            target_name: self.target_name.clone(),
            characteristic_uuid: self.characteristic_uuid,
        }
    }
}

impl From<CliArgs> for Settings {
    fn from(args: CliArgs) -> Self {
        // Parse octal socket mode
        let socket_mode = u32::from_str_radix(&args.socket_mode, 8).unwrap_or_else(|_| {
            warn!(
                "Invalid socket mode {:?}, using {:o}",
                args.socket_mode, DEFAULT_SOCKET_MODE
            );
            DEFAULT_SOCKET_MODE
        });

        Settings {
            target_name: args.target_name,
            characteristic_uuid: args.characteristic_uuid,
            adapter: args.adapter,
            auto_scan: args.auto_scan,
            store_dir: PathBuf::from(args.store_dir),
            collection: args.collection,
            enable_unix_socket: args.enable_unix_socket,
            socket_path: args.socket_path,
            socket_mode,
            console: args.console,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_socket_mode_is_octal() {
        let args = CliArgs::parse_from(["ble-notify-bridge", "--socket-mode", "600"]);
        let settings = Settings::from(args);
        assert_eq!(settings.socket_mode, 0o600);
    }

    #[test]
    fn test_invalid_socket_mode_falls_back() {
        let args = CliArgs::parse_from(["ble-notify-bridge", "--socket-mode", "rw"]);
        let settings = Settings::from(args);
        assert_eq!(settings.socket_mode, 0o660);
    }

    #[test]
    fn test_session_config() {
        let args = CliArgs::parse_from(["ble-notify-bridge", "--target-name", "Watch"]);
        let config = Settings::from(args).session_config();

        assert_eq!(config.target_name, "Watch");
        assert_eq!(
            config.characteristic_uuid.to_string(),
            "2ea5e5c0-47d9-4ea9-8e58-2c2e09acf6f0"
        );
    }
}
