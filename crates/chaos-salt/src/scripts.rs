use std::path::PathBuf;

use indexmap::IndexMap;

use chaos_core::error::{ChaosError, ChaosResult};

use crate::os::ScriptKind;

/// Operation parameters in insertion order. The order is significant: each
/// entry becomes a variable assignment at the top of the rendered script.
pub type Parameters = IndexMap<String, String>;

/// Source of script templates, keyed by operation name and script kind.
pub trait ScriptStore: Send + Sync {
    fn load(&self, name: &str, kind: ScriptKind) -> ChaosResult<String>;
}

fn file_name(name: &str, kind: ScriptKind) -> String {
    format!("{name}.{}", kind.extension())
}

/// Prepend one `key='value'` line per parameter to `template`.
pub fn render_payload(params: &Parameters, template: &str) -> String {
    let mut payload = String::new();
    for (key, value) in params {
        payload.push_str(key);
        payload.push_str("='");
        payload.push_str(value);
        payload.push_str("'\n");
    }
    payload.push_str(template);
    payload
}

const BUILTIN: &[(&str, ScriptKind, &str)] = &[
    ("cpu_stress_test", ScriptKind::Shell, include_str!("../scripts/cpu_stress_test.sh")),
    ("cpu_stress_test", ScriptKind::PowerShell, include_str!("../scripts/cpu_stress_test.ps1")),
    ("fill_disk", ScriptKind::Shell, include_str!("../scripts/fill_disk.sh")),
    ("fill_disk", ScriptKind::PowerShell, include_str!("../scripts/fill_disk.ps1")),
    ("burn_io", ScriptKind::Shell, include_str!("../scripts/burn_io.sh")),
    ("burn_io", ScriptKind::PowerShell, include_str!("../scripts/burn_io.ps1")),
    ("network_advanced", ScriptKind::Shell, include_str!("../scripts/network_advanced.sh")),
    ("killall_processes", ScriptKind::Shell, include_str!("../scripts/killall_processes.sh")),
    ("kill_process", ScriptKind::Shell, include_str!("../scripts/kill_process.sh")),
    ("kill_process", ScriptKind::PowerShell, include_str!("../scripts/kill_process.ps1")),
    ("grep_process_exist", ScriptKind::Shell, include_str!("../scripts/grep_process_exist.sh")),
];

/// Templates compiled into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinScripts;

impl ScriptStore for BuiltinScripts {
    fn load(&self, name: &str, kind: ScriptKind) -> ChaosResult<String> {
        BUILTIN
            .iter()
            .find(|(n, k, _)| *n == name && *k == kind)
            .map(|(_, _, body)| body.to_string())
            .ok_or_else(|| ChaosError::MissingScript {
                file: file_name(name, kind),
            })
    }
}

/// Templates read from `<root>/<name>.<ext>` on every load.
#[derive(Debug, Clone)]
pub struct DirScripts {
    root: PathBuf,
}

impl DirScripts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ScriptStore for DirScripts {
    fn load(&self, name: &str, kind: ScriptKind) -> ChaosResult<String> {
        let path = self.root.join(file_name(name, kind));
        std::fs::read_to_string(&path).map_err(|e| {
            tracing::debug!(path = %path.display(), error = %e, "Script template not readable");
            ChaosError::MissingScript {
                file: path.display().to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_param_lines_then_template() {
        let mut params = Parameters::new();
        params.insert("duration".into(), "60".into());
        params.insert("param".into(), "loss 5%".into());
        params.insert("instance_id".into(), "CLIENT1".into());

        assert_eq!(
            render_payload(&params, "script"),
            "duration='60'\nparam='loss 5%'\ninstance_id='CLIENT1'\nscript"
        );
    }

    #[test]
    fn reassigning_a_key_keeps_its_position() {
        let mut params = Parameters::new();
        params.insert("instance_id".into(), "A".into());
        params.insert("duration".into(), "1".into());
        params.insert("instance_id".into(), "B".into());

        assert_eq!(render_payload(&params, ""), "instance_id='B'\nduration='1'\n");
    }

    #[test]
    fn builtin_store_covers_every_linux_template() {
        for name in [
            "cpu_stress_test",
            "fill_disk",
            "burn_io",
            "network_advanced",
            "killall_processes",
            "kill_process",
            "grep_process_exist",
        ] {
            assert!(BuiltinScripts.load(name, ScriptKind::Shell).is_ok(), "{name}");
        }
    }

    #[test]
    fn builtin_store_reports_missing_template() {
        let err = BuiltinScripts
            .load("network_advanced", ScriptKind::PowerShell)
            .unwrap_err();
        assert_eq!(err.to_string(), "No script template network_advanced.ps1");
    }

    #[test]
    fn dir_store_reads_by_name_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("burn_io.ps1"), "Write-Output io").unwrap();

        let store = DirScripts::new(dir.path());
        assert_eq!(
            store.load("burn_io", ScriptKind::PowerShell).unwrap(),
            "Write-Output io"
        );
        assert!(matches!(
            store.load("burn_io", ScriptKind::Shell),
            Err(ChaosError::MissingScript { .. })
        ));
    }
}
