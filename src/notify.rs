//! Desktop notifications.
//!
//! Delivery is best effort: a missing notification command or a failed popup
//! is logged and otherwise ignored.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::NotifyConfig;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, message: &str);
}

/// Pick the notifier for this config: a desktop popup, or logs only when disabled.
pub fn create_notifier(config: &NotifyConfig) -> Arc<dyn Notifier> {
    if config.enabled {
        Arc::new(DesktopNotifier::new(config))
    } else {
        Arc::new(LogNotifier)
    }
}

/// Raises an OS notification through the platform's notification command.
pub struct DesktopNotifier {
    app_name: String,
    timeout_secs: u32,
}

impl DesktopNotifier {
    pub fn new(config: &NotifyConfig) -> Self {
        Self {
            app_name: config.app_name.clone(),
            timeout_secs: config.timeout_secs,
        }
    }

    #[cfg(target_os = "macos")]
    fn command(&self, title: &str, message: &str) -> tokio::process::Command {
        let script = format!(
            "display notification {} with title {} subtitle {}",
            applescript_string(message),
            applescript_string(&self.app_name),
            applescript_string(title),
        );
        let mut cmd = tokio::process::Command::new("osascript");
        cmd.args(["-e", &script]);
        cmd
    }

    #[cfg(not(target_os = "macos"))]
    fn command(&self, title: &str, message: &str) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new("notify-send");
        cmd.arg("--app-name")
            .arg(&self.app_name)
            .arg("--expire-time")
            .arg(self.timeout_secs.saturating_mul(1000).to_string())
            .arg(title)
            .arg(message);
        cmd
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify(&self, title: &str, message: &str) {
        tracing::info!(title, message, "sending desktop notification");
        match self.command(title, message).output().await {
            Ok(output) if output.status.success() => {}
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                tracing::warn!(status = %output.status, stderr = %stderr.trim(), "notification command failed");
            }
            Err(e) => tracing::warn!(error = %e, "notification command unavailable"),
        }
    }
}

/// Headless notifier: the notification only goes to the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, title: &str, message: &str) {
        tracing::info!(title, message, "notification");
    }
}

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn applescript_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applescript_strings_are_escaped() {
        assert_eq!(applescript_string(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(applescript_string(r"a\b"), r#""a\\b""#);
    }

    #[tokio::test]
    async fn disabled_config_logs_only() {
        let config = NotifyConfig {
            enabled: false,
            ..NotifyConfig::default()
        };
        // completes without touching the desktop
        create_notifier(&config).notify("reminder", "hello").await;
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn notify_send_arguments() {
        let notifier = DesktopNotifier::new(&NotifyConfig::default());
        let cmd = notifier.command("reminder", "practice time");
        let args: Vec<_> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec!["--app-name", "Alter", "--expire-time", "10000", "reminder", "practice time"]
        );
    }
}
