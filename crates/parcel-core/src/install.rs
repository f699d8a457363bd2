//! OS install primitive.
//!
//! Registration of an installer with the operating system is an external
//! collaborator behind [`InstallPrimitive`]. [`CommandPrimitive`] drives it
//! through configurable command lines; tests substitute their own.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

/// Outcome of a registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub registered: bool,
    /// Diagnostic text when `registered` is false.
    pub error_text: Option<String>,
}

impl Registration {
    /// A registration that succeeded.
    pub fn success() -> Self {
        Self {
            registered: true,
            error_text: None,
        }
    }

    /// A registration the OS refused.
    pub fn rejected(error_text: impl Into<String>) -> Self {
        Self {
            registered: false,
            error_text: Some(error_text.into()),
        }
    }
}

/// An installed application that can be launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppEntry {
    pub family: String,
    pub app_id: String,
}

/// Progress sink handed to [`InstallPrimitive::register`]; receives a
/// fraction in `0.0..=1.0`.
pub type InstallProgress<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// Platform operations that act on installed packages.
#[async_trait]
pub trait InstallPrimitive: Send + Sync {
    /// Register the installer at `path`. Progress reports are optional.
    async fn register(&self, path: &Path, progress: InstallProgress<'_>) -> Result<Registration>;

    /// First launchable application of an installed package family.
    async fn find_app(&self, family: &str) -> Result<Option<AppEntry>>;

    async fn launch(&self, app: &AppEntry) -> Result<bool>;
}

/// Command lines run by [`CommandPrimitive`]. Each entry is one argv;
/// `{path}`, `{family}` and `{app}` are substituted per argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandTemplates {
    pub install: Vec<String>,
    pub query: Vec<String>,
    pub launch: Vec<String>,
}

impl Default for CommandTemplates {
    fn default() -> Self {
        let powershell = |script: &str| {
            ["powershell", "-NoProfile", "-NonInteractive", "-Command", script]
                .map(String::from)
                .to_vec()
        };
        Self {
            install: powershell("Add-AppxPackage -Path '{path}' -ForceApplicationShutdown"),
            query: powershell(
                "(Get-AppxPackage | Where-Object PackageFamilyName -eq '{family}' | \
                 Get-AppxPackageManifest).Package.Applications.Application.Id",
            ),
            launch: vec![
                "explorer.exe".to_string(),
                "shell:AppsFolder\\{family}!{app}".to_string(),
            ],
        }
    }
}

/// [`InstallPrimitive`] backed by external commands.
#[derive(Debug, Clone, Default)]
pub struct CommandPrimitive {
    templates: CommandTemplates,
}

impl CommandPrimitive {
    /// Run the commands described by `templates`.
    pub fn new(templates: CommandTemplates) -> Self {
        Self { templates }
    }

    fn command(template: &[String], vars: &[(&str, &str)]) -> Result<Command> {
        let mut argv = template.iter().map(|arg| {
            vars.iter()
                .fold(arg.clone(), |acc, (key, value)| acc.replace(key, value))
        });
        let program = argv
            .next()
            .ok_or_else(|| Error::Config("empty command template".to_string()))?;
        let mut cmd = Command::new(program);
        cmd.args(argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(cmd)
    }
}

#[async_trait]
impl InstallPrimitive for CommandPrimitive {
    async fn register(&self, path: &Path, progress: InstallProgress<'_>) -> Result<Registration> {
        let path = path.to_string_lossy();
        let mut cmd = Self::command(&self.templates.install, &[("{path}", path.as_ref())])?;
        debug!(?cmd, "Running install command");

        let output = cmd.output().await?;
        if output.status.success() {
            progress(1.0);
            return Ok(Registration::success());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let text = if stderr.is_empty() {
            format!("install command exited with {}", output.status)
        } else {
            stderr
        };
        Ok(Registration::rejected(text))
    }

    async fn find_app(&self, family: &str) -> Result<Option<AppEntry>> {
        let mut cmd = Self::command(&self.templates.query, &[("{family}", family)])?;
        let output = cmd.output().await?;
        if !output.status.success() {
            return Ok(None);
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(|app_id| AppEntry {
                family: family.to_string(),
                app_id: app_id.to_string(),
            }))
    }

    async fn launch(&self, app: &AppEntry) -> Result<bool> {
        let mut cmd = Self::command(
            &self.templates.launch,
            &[("{family}", app.family.as_str()), ("{app}", app.app_id.as_str())],
        )?;
        Ok(cmd.status().await?.success())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_register_success_reports_completion() {
        let primitive = CommandPrimitive::new(CommandTemplates {
            install: sh("test -n '{path}'"),
            ..CommandTemplates::default()
        });
        let calls = AtomicUsize::new(0);
        let progress = |_: f64| {
            calls.fetch_add(1, Ordering::SeqCst);
        };
        let result = primitive
            .register(Path::new("/tmp/app.msix"), &progress)
            .await
            .unwrap();
        assert!(result.registered);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_register_failure_carries_stderr() {
        let primitive = CommandPrimitive::new(CommandTemplates {
            install: sh("echo 'deployment failed: {path}' >&2; exit 3"),
            ..CommandTemplates::default()
        });
        let result = primitive
            .register(Path::new("app.msix"), &|_| {})
            .await
            .unwrap();
        assert!(!result.registered);
        assert_eq!(
            result.error_text.as_deref(),
            Some("deployment failed: app.msix")
        );
    }

    #[tokio::test]
    async fn test_find_app_and_launch() {
        let primitive = CommandPrimitive::new(CommandTemplates {
            install: sh("true"),
            query: sh("test '{family}' = 'Sample_8wekyb3d8bbwe' && echo App"),
            launch: sh("test '{app}' = 'App'"),
        });
        let app = primitive
            .find_app("Sample_8wekyb3d8bbwe")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(app.app_id, "App");
        assert!(primitive.launch(&app).await.unwrap());

        assert!(primitive.find_app("Other").await.unwrap().is_none());
    }

    #[test]
    fn test_empty_template_is_config_error() {
        let err = CommandPrimitive::command(&[], &[]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
