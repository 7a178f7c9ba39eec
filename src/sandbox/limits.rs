use crate::config::LimitsConfig;
use std::process::Command;

const MIB: u64 = 1024 * 1024;

/// Install address-space and file-size caps on `cmd`, applied in the child
/// between fork and exec. Each cap is bounded by the current hard limit, and
/// a value of 0 leaves that resource alone.
#[cfg(target_os = "linux")]
pub fn apply(cmd: &mut Command, limits: LimitsConfig) {
    use nix::sys::resource::Resource;
    use std::os::unix::process::CommandExt;

    let memory = limits.max_memory_mb.saturating_mul(MIB);
    let file_size = limits.max_file_size_mb.saturating_mul(MIB);
    if memory == 0 && file_size == 0 {
        return;
    }

    // SAFETY: the hook only calls getrlimit/setrlimit, both async-signal-safe.
    unsafe {
        cmd.pre_exec(move || {
            if memory > 0 {
                lower_soft_limit(Resource::RLIMIT_AS, memory)?;
            }
            if file_size > 0 {
                lower_soft_limit(Resource::RLIMIT_FSIZE, file_size)?;
            }
            Ok(())
        });
    }
}

#[cfg(not(target_os = "linux"))]
pub fn apply(_cmd: &mut Command, _limits: LimitsConfig) {}

#[cfg(target_os = "linux")]
fn lower_soft_limit(resource: nix::sys::resource::Resource, limit: u64) -> std::io::Result<()> {
    use nix::sys::resource::{getrlimit, setrlimit};

    let (_, hard) = getrlimit(resource)?;
    setrlimit(resource, limit.min(hard), hard)?;
    Ok(())
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    fn limits_of(limits: LimitsConfig) -> String {
        let mut cmd = Command::new("cat");
        cmd.arg("/proc/self/limits");
        apply(&mut cmd, limits);
        let out = cmd.output().unwrap();
        assert!(out.status.success());
        String::from_utf8_lossy(&out.stdout).to_string()
    }

    fn soft_limit(table: &str, name: &str) -> String {
        let line = table
            .lines()
            .find(|l| l.starts_with(name))
            .unwrap_or_else(|| panic!("no '{}' row in /proc/self/limits", name));
        line[name.len()..]
            .split_whitespace()
            .next()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_memory_limit_applied() {
        let table = limits_of(LimitsConfig {
            max_memory_mb: 512,
            max_file_size_mb: 0,
        });
        assert_eq!(soft_limit(&table, "Max address space"), (512 * MIB).to_string());
    }

    #[test]
    fn test_file_size_limit_applied() {
        let table = limits_of(LimitsConfig {
            max_memory_mb: 0,
            max_file_size_mb: 3,
        });
        assert_eq!(soft_limit(&table, "Max file size"), (3 * MIB).to_string());
    }

    #[test]
    fn test_zero_leaves_limits_untouched() {
        let parent = std::fs::read_to_string("/proc/self/limits").unwrap();
        let child = limits_of(LimitsConfig {
            max_memory_mb: 0,
            max_file_size_mb: 0,
        });
        assert_eq!(
            soft_limit(&child, "Max address space"),
            soft_limit(&parent, "Max address space")
        );
    }
}
