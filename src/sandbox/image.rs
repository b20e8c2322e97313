//! SSH-enabled sandbox image recipe and mount path mapping.

use super::ImageSpec;
use std::path::Path;

/// Packages layered on top of the slim Debian base.
const APT_PACKAGES: &[&str] = &["git", "openssh-server", "rsync"];

/// Home directory of the sandbox's root user; mounts land underneath it.
pub const REMOTE_HOME: &str = "/root";

/// Build the image recipe for an SSH-reachable sandbox that trusts `public_key`.
pub fn ssh_image(python_version: &str, public_key: &str) -> ImageSpec {
    let public_key = public_key.trim();
    ImageSpec {
        python_version: python_version.to_string(),
        apt_packages: APT_PACKAGES.iter().map(|p| (*p).to_string()).collect(),
        commands: vec![
            "mkdir -p /var/run/sshd".to_string(),
            "echo 'PermitRootLogin yes' >> /etc/ssh/sshd_config".to_string(),
            "service ssh start".to_string(),
            "mkdir -p /root/.ssh && chmod 700 /root/.ssh".to_string(),
            format!("echo '{public_key}' >> /root/.ssh/authorized_keys"),
            "chmod 600 /root/.ssh/authorized_keys".to_string(),
        ],
    }
}

/// Entrypoint that keeps sshd in the foreground on `ssh_port`.
pub fn sshd_entrypoint(ssh_port: u16) -> Vec<String> {
    vec![
        "/usr/sbin/sshd".to_string(),
        "-D".to_string(),
        "-e".to_string(),
        "-p".to_string(),
        ssh_port.to_string(),
    ]
}

/// Remote path a local directory is mounted at: `/root/<last component>`.
///
/// The last component is whatever follows the final `/`, so `"/"` and any
/// path with a trailing slash map to `/root/` itself, and `"."` maps to
/// `/root/.`.
pub fn remote_mount_path(local_dir: &Path) -> String {
    let raw = local_dir.to_string_lossy();
    let last = raw.rsplit('/').next().unwrap_or_default();
    format!("{REMOTE_HOME}/{last}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_path_uses_last_component() {
        assert_eq!(remote_mount_path(Path::new("/home/me/project")), "/root/project");
        assert_eq!(remote_mount_path(Path::new("project")), "/root/project");
    }

    #[test]
    fn mount_path_for_filesystem_root_is_remote_home() {
        assert_eq!(remote_mount_path(Path::new("/")), "/root/");
    }

    #[test]
    fn mount_path_with_trailing_slash_is_remote_home() {
        assert_eq!(remote_mount_path(Path::new("/home/me/project/")), "/root/");
    }

    #[test]
    fn mount_path_for_current_dir_keeps_dot() {
        assert_eq!(remote_mount_path(Path::new(".")), "/root/.");
    }

    #[test]
    fn ssh_image_injects_trimmed_key() {
        let image = ssh_image("3.11", "ssh-ed25519 AAAA me@host\n");
        assert_eq!(image.python_version, "3.11");
        assert_eq!(image.apt_packages, vec!["git", "openssh-server", "rsync"]);
        assert!(image
            .commands
            .contains(&"echo 'ssh-ed25519 AAAA me@host' >> /root/.ssh/authorized_keys".to_string()));
    }

    #[test]
    fn entrypoint_runs_sshd_in_foreground() {
        assert_eq!(
            sshd_entrypoint(22),
            vec!["/usr/sbin/sshd", "-D", "-e", "-p", "22"]
        );
    }
}
