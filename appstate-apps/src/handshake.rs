//! One-shot device pairing app.

use std::path::PathBuf;
use std::time::Duration;

use appstate_adb::{AdbKey, ConnectTimeouts, DeviceConnection};
use appstate_config::AppSpec;
use appstate_kernel::{App, AppContext, AppError, AppFactory, AppResult, Schedule};
use appstate_primitives::AppId;
use async_trait::async_trait;
use tracing::info;

use crate::{append_extension, device_error};

const DEFAULT_OUT_DIR: &str = "/config/apps";
const DEFAULT_OUT_FILE: &str = "firetvappstate.key";

/// First-time pairing waits on the on-TV authorization dialog.
const TIMEOUTS: ConnectTimeouts =
    ConnectTimeouts::new(Duration::from_secs(10), Duration::from_secs(15));

/// Ensures an ADB keypair exists, connects once so the user can authorize the
/// key on the TV, and probes the link with `getprop ro.product.model`.
#[derive(Debug)]
pub struct HandshakeApp {
    host: String,
    port: u16,
    private_key_path: PathBuf,
    public_key_path: PathBuf,
}

impl HandshakeApp {
    /// Builds the app from its configuration entry.
    ///
    /// # Errors
    ///
    /// Currently infallible; kept fallible for parity with other classes.
    pub fn from_spec(spec: &AppSpec) -> AppResult<Self> {
        let out_dir = spec
            .option_path("out_dir")
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR));
        let out_file = spec
            .option_str("out_file")
            .unwrap_or_else(|| DEFAULT_OUT_FILE.to_owned());
        let private_key_path = out_dir.join(out_file);
        let public_key_path = append_extension(&private_key_path, "pub");

        Ok(Self {
            host: spec.host().to_owned(),
            port: spec.port(),
            private_key_path,
            public_key_path,
        })
    }

    /// Returns the private key path the app provisions.
    #[must_use]
    pub fn private_key_path(&self) -> &PathBuf {
        &self.private_key_path
    }

    /// Returns the matching public key path.
    #[must_use]
    pub fn public_key_path(&self) -> &PathBuf {
        &self.public_key_path
    }
}

#[async_trait]
impl App for HandshakeApp {
    fn schedule(&self) -> Schedule {
        Schedule::Once
    }

    async fn tick(&mut self, _ctx: &AppContext) -> AppResult<()> {
        let private_key_path = self.private_key_path.clone();
        let public_key_path = self.public_key_path.clone();
        // Key generation is CPU-heavy; keep it off the runtime workers.
        let key = tokio::task::spawn_blocking(move || {
            AdbKey::ensure(&private_key_path, &public_key_path)
        })
        .await
        .map_err(|err| AppError::failed(err.to_string()))?
        .map_err(device_error)?;

        info!(
            host = %self.host,
            port = self.port,
            key = %self.private_key_path.display(),
            fingerprint = %key.fingerprint(),
            "connecting"
        );
        let mut device = DeviceConnection::connect(&self.host, self.port, &key, TIMEOUTS)
            .await
            .map_err(device_error)?;

        let model = device
            .shell("getprop ro.product.model")
            .await
            .map_err(device_error)?;
        info!(model = %model.trim(), "device reachable");

        device.close().await;
        Ok(())
    }
}

/// Factory for the `Handshake` class.
#[derive(Debug)]
pub struct HandshakeFactory;

impl AppFactory for HandshakeFactory {
    fn module(&self) -> &str {
        crate::MODULE
    }

    fn class(&self) -> &str {
        "Handshake"
    }

    fn build(&self, _app_id: &AppId, spec: &AppSpec) -> AppResult<Box<dyn App>> {
        Ok(Box::new(HandshakeApp::from_spec(spec)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_key_location() {
        let spec = AppSpec::new(crate::MODULE, "Handshake", "192.168.1.50", 5555);
        let app = HandshakeApp::from_spec(&spec).unwrap();
        assert_eq!(
            app.private_key_path(),
            &PathBuf::from("/config/apps/firetvappstate.key")
        );
        assert_eq!(
            app.public_key_path(),
            &PathBuf::from("/config/apps/firetvappstate.key.pub")
        );
    }

    #[test]
    fn honors_out_dir_and_out_file() {
        let spec = AppSpec::new(crate::MODULE, "Handshake", "192.168.1.50", 5555)
            .with_option("out_dir", "/data/keys")
            .with_option("out_file", "tv.key");
        let app = HandshakeApp::from_spec(&spec).unwrap();
        assert_eq!(app.private_key_path(), &PathBuf::from("/data/keys/tv.key"));
        assert_eq!(
            app.public_key_path(),
            &PathBuf::from("/data/keys/tv.key.pub")
        );
    }

    #[test]
    fn is_a_one_shot_app() {
        let spec = AppSpec::new(crate::MODULE, "Handshake", "h", 5555);
        let app = HandshakeApp::from_spec(&spec).unwrap();
        assert_eq!(app.schedule(), Schedule::Once);
    }
}
