//! Project metadata consumed by the preview controller.

use serde::{Deserialize, Serialize};

use crate::{ProjectId, SandboxId};

/// Where the project's code executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// In-process sandboxed runtime reached over the embedded-document channel.
    Embedded,
    /// Remote container reached over the persistent socket channel.
    Remote,
}

/// Metadata for the currently loaded project.
///
/// The execution mode is decided from the template: container templates run
/// remotely, everything else runs in the embedded runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Host-side identity; a change of id resets navigation and connection state.
    pub id: ProjectId,
    /// Sandbox identity sent in the remote handshake and injected into actions.
    pub sandbox_id: SandboxId,
    /// Template name deciding the execution mode and compile behavior.
    pub template: String,
    /// Entry path for compilation.
    pub entry: String,
    /// External resources (stylesheet/script URLs) included in compile requests.
    pub external_resources: Vec<String>,
    /// Whether the preview shows a single module instead of the full app.
    pub is_module_view: bool,
    /// Whether the project declares host-visible actions.
    pub has_actions: bool,
}

/// Templates that execute in a remote container rather than the embedded runtime.
const CONTAINER_TEMPLATES: &[&str] = &["node", "docker", "next", "nuxt", "apollo", "gatsby"];

impl Project {
    /// Decide the execution mode from the template.
    pub fn execution_mode(&self) -> ExecutionMode {
        if CONTAINER_TEMPLATES.contains(&self.template.as_str()) {
            ExecutionMode::Remote
        } else {
            ExecutionMode::Embedded
        }
    }

    /// Synthetic manifest content for projects without one.
    pub fn generated_manifest(&self) -> String {
        format!(
            "{{\"name\":\"{}\",\"main\":\"{}\"}}",
            self.sandbox_id, self.entry
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(template: &str) -> Project {
        Project {
            id: ProjectId::random(),
            sandbox_id: SandboxId::new("sbx1"),
            template: template.into(),
            entry: "/index.js".into(),
            external_resources: vec![],
            is_module_view: false,
            has_actions: false,
        }
    }

    #[test]
    fn container_templates_run_remotely() {
        assert_eq!(project("node").execution_mode(), ExecutionMode::Remote);
        assert_eq!(project("next").execution_mode(), ExecutionMode::Remote);
    }

    #[test]
    fn browser_templates_run_embedded() {
        assert_eq!(
            project("create-react-app").execution_mode(),
            ExecutionMode::Embedded
        );
        assert_eq!(project("vue-cli").execution_mode(), ExecutionMode::Embedded);
    }

    #[test]
    fn generated_manifest_names_entry() {
        let manifest = project("static").generated_manifest();
        assert!(manifest.contains("\"main\":\"/index.js\""));
        assert!(manifest.contains("sbx1"));
    }
}
