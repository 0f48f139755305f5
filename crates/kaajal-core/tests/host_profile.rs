use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use kaajal_core::*;
use kaajal_exec::{CommandResult, ExecError, ExecOptions, RemoteExecutor};
use kaajal_pkg::{PackageManagerType, ProxySettings};

const UBUNTU: &str = "ID=ubuntu\nNAME=\"Ubuntu\"\nPRETTY_NAME=\"Ubuntu 22.04\"\n";
const FEDORA: &str = "NAME=\"Fedora Linux\"\nID=fedora\nPRETTY_NAME=\"Fedora Linux 40 (Workstation Edition)\"\n";

// Scripted executor: first rule whose pattern is contained in the command wins
struct ScriptedExecutor {
    rules: Vec<(String, CommandResult)>,
    calls: Mutex<Vec<(String, Option<String>)>>,
    connected: AtomicBool,
    home: Option<String>,
}

impl ScriptedExecutor {
    fn new() -> Self {
        Self {
            rules: Vec::new(),
            calls: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            home: Some("/home/alice".to_string()),
        }
    }

    fn host(os_release: &str, uid: &str, sudo_ok: bool) -> Self {
        Self::new()
            .respond("cat /etc/os-release", 0, os_release, "")
            .respond("id -u", 0, &format!("{uid}\n"), "")
            .respond(
                "sudo -n true",
                if sudo_ok { 0 } else { 1 },
                "",
                "sudo: a password is required",
            )
    }

    fn respond(mut self, pattern: &str, status: i32, stdout: &str, stderr: &str) -> Self {
        self.rules.push((pattern.to_string(), result(status, stdout, stderr)));
        self
    }

    fn disconnected(self) -> Self {
        self.connected.store(false, Ordering::SeqCst);
        self
    }

    fn without_home(mut self) -> Self {
        self.home = None;
        self
    }

    fn commands(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(cmd, _)| cmd.clone())
            .collect()
    }

    fn stdin_of(&self, pattern: &str) -> Option<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(cmd, _)| cmd.contains(pattern))
            .and_then(|(_, stdin)| stdin.clone())
    }

    fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

fn result(status: i32, stdout: &str, stderr: &str) -> CommandResult {
    CommandResult {
        status,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        duration: Duration::from_millis(1),
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn exec(&self, cmd: &str, options: &ExecOptions) -> Result<CommandResult, ExecError> {
        if !self.is_connected() {
            return Err(ExecError::NotConnected);
        }

        self.calls
            .lock()
            .unwrap()
            .push((cmd.to_string(), options.stdin.clone()));

        Ok(self
            .rules
            .iter()
            .find(|(pattern, _)| cmd.contains(pattern.as_str()))
            .map_or_else(|| result(0, "", ""), |(_, r)| r.clone()))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn home_dir(&self) -> Option<String> {
        self.home.clone()
    }

    fn executor_type(&self) -> &'static str {
        "scripted"
    }
}

fn profile(executor: &Arc<ScriptedExecutor>) -> HostProfile {
    HostProfile::new(executor.clone()).with_proxy(ProxySettings::default())
}

/// Identify, then forget the identification commands
async fn identified(executor: &Arc<ScriptedExecutor>) -> HostProfile {
    let mut host = profile(executor);
    let _ = host.identify().await.unwrap();
    executor.clear();
    host
}

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn test_identify_requires_connection() {
    let executor = Arc::new(ScriptedExecutor::host(UBUNTU, "1000", true).disconnected());
    let mut host = profile(&executor);

    let err = host.identify().await.unwrap_err();

    assert!(matches!(err, ProvisionError::Precondition(_)));
    assert!(!err.to_string().is_empty());
    assert_eq!(host.package_manager(), None);
    assert_eq!(host.remote_uid(), "");
    assert_eq!(host.privilege(), Privilege::Unprivileged);
    assert!(executor.commands().is_empty());
}

#[tokio::test]
async fn test_identify_ubuntu_without_sudo() {
    let executor = Arc::new(ScriptedExecutor::host(UBUNTU, "1000", false));
    let mut host = profile(&executor);

    let report = host.identify().await.unwrap();

    assert_eq!(report.message(), NO_PASSWORDLESS_SUDO);
    assert_eq!(report.message(), "User can NOT run sudo without password");
    assert_eq!(host.id(), "ubuntu");
    assert_eq!(host.name(), "Ubuntu");
    assert_eq!(host.pretty_name(), "Ubuntu 22.04");
    assert_eq!(host.package_manager(), Some(PackageManagerType::AptGet));
    assert_eq!(host.remote_uid(), "1000");
    assert_eq!(host.privilege(), Privilege::Unprivileged);
    assert_eq!(
        executor.commands(),
        vec!["cat /etc/os-release", "id -u", "sudo -n true"]
    );
}

#[tokio::test]
async fn test_identify_root_skips_sudo_check() {
    let executor = Arc::new(ScriptedExecutor::host(FEDORA, "0", false));
    let mut host = profile(&executor);

    let report = host.identify().await.unwrap();

    assert_eq!(report, Report::ok());
    assert_eq!(host.package_manager(), Some(PackageManagerType::Dnf));
    assert!(host.facts().is_root());
    assert!(host.facts().is_privileged());
    assert_eq!(executor.commands(), vec!["cat /etc/os-release", "id -u"]);
}

#[tokio::test]
async fn test_identify_passwordless_sudo() {
    let executor = Arc::new(ScriptedExecutor::host(UBUNTU, "1000", true));
    let mut host = profile(&executor);

    let report = host.identify().await.unwrap();

    assert_eq!(report.warning, None);
    assert_eq!(host.privilege(), Privilege::PasswordlessSudo);
    assert!(host.facts().is_privileged());
}

#[tokio::test]
async fn test_identify_unreadable_os_release() {
    let executor = Arc::new(ScriptedExecutor::new().respond(
        "cat /etc/os-release",
        1,
        "",
        "cat: /etc/os-release: No such file or directory",
    ));
    let mut host = profile(&executor);

    let err = host.identify().await.unwrap_err();

    assert_eq!(
        err,
        ProvisionError::RemoteCommand("cat: /etc/os-release: No such file or directory".to_string())
    );
    assert_eq!(host.package_manager(), None);
}

#[tokio::test]
async fn test_identify_unsupported_distribution() {
    let executor = Arc::new(ScriptedExecutor::host("ID=arch\nNAME=\"Arch Linux\"\n", "0", true));
    let host = identified(&executor).await;

    assert_eq!(host.package_manager(), None);

    let err = host.update().await.unwrap_err();
    assert!(matches!(err, ProvisionError::Precondition(_)));
    assert!(executor.commands().is_empty());
}

#[tokio::test]
async fn test_install_without_packages() {
    let executor = Arc::new(ScriptedExecutor::host(UBUNTU, "0", true));
    let host = identified(&executor).await;

    let result = host.install("", None).await;

    assert_eq!(outcome_message(&result), "No packages provided to install");
    assert!(executor.commands().is_empty());
}

#[tokio::test]
async fn test_install_from_list_file() {
    let dir = tempfile::tempdir().unwrap();
    let list = write_file(dir.path(), "packages.txt", "# comment\n\ngit\ntmux\n");
    let executor = Arc::new(ScriptedExecutor::host(UBUNTU, "1000", true));
    let host = identified(&executor).await;

    let report = host.install("", Some(&list)).await.unwrap();

    assert_eq!(report, Report::ok());
    assert_eq!(
        executor.commands(),
        vec!["sudo DEBIAN_FRONTEND=noninteractive apt-get -y install git tmux "]
    );
}

#[tokio::test]
async fn test_install_missing_list_file() {
    let dir = tempfile::tempdir().unwrap();
    let executor = Arc::new(ScriptedExecutor::host(FEDORA, "0", true));
    let host = identified(&executor).await;

    let err = host
        .install("git", Some(&dir.path().join("absent.txt")))
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::LocalFileNotFound(_)));
    assert!(executor.commands().is_empty());
}

#[tokio::test]
async fn test_install_failure_is_warning() {
    let executor = Arc::new(
        ScriptedExecutor::host(FEDORA, "0", true).respond(
            "install",
            1,
            "",
            "Error: Unable to find a match: nosuchpkg",
        ),
    );
    let host = identified(&executor).await;

    let report = host.install("nosuchpkg", None).await.unwrap();

    assert_eq!(report.message(), "Error: Unable to find a match: nosuchpkg");
    assert_eq!(executor.commands(), vec!["dnf -y install nosuchpkg "]);
}

#[tokio::test]
async fn test_unprivileged_operations_issue_no_commands() {
    let dir = tempfile::tempdir().unwrap();
    let key = write_file(dir.path(), "id.pub", "ssh-ed25519 AAAA bob@laptop\n");
    let executor = Arc::new(ScriptedExecutor::host(UBUNTU, "1000", false));
    let host = identified(&executor).await;

    for result in [
        host.update().await,
        host.install("git", None).await,
        host.create_new_user("bob", Some("hunter2"), None, None).await,
        host.copy_ssh_key(&key, "bob").await,
        host.copy_github_token(&key, "bob").await,
    ] {
        assert!(matches!(result, Err(ProvisionError::Precondition(_))));
    }

    assert!(executor.commands().is_empty());
}

#[tokio::test]
async fn test_update_applies_proxy_first() {
    let executor = Arc::new(ScriptedExecutor::host(FEDORA, "0", true).respond("grep", 1, "", ""));
    let mut host = HostProfile::new(executor.clone())
        .with_proxy(ProxySettings::default().with_http("http://proxy.example:911"));
    let _ = host.identify().await.unwrap();
    executor.clear();

    let report = host.update().await.unwrap();

    assert_eq!(report, Report::ok());
    assert_eq!(
        executor.commands(),
        vec![
            "grep -qs '^proxy=' /etc/dnf/dnf.conf",
            "tee -a /etc/dnf/dnf.conf > /dev/null",
            "dnf -y update",
        ]
    );
    assert_eq!(
        executor.stdin_of("tee").as_deref(),
        Some("\nproxy=http://proxy.example:911\n")
    );
}

#[tokio::test]
async fn test_update_apt_continues_and_warns() {
    let executor = Arc::new(
        ScriptedExecutor::host(UBUNTU, "1000", true).respond(
            "apt-get update",
            100,
            "",
            "E: Could not get lock /var/lib/apt/lists/lock",
        ),
    );
    let host = identified(&executor).await;

    let result = host.update().await;

    assert_eq!(
        outcome_message(&result),
        "E: Could not get lock /var/lib/apt/lists/lock"
    );
    assert_eq!(
        executor.commands(),
        vec![
            "sudo DEBIAN_FRONTEND=noninteractive apt-get update",
            "sudo DEBIAN_FRONTEND=noninteractive apt-get -y upgrade",
        ]
    );
}

#[tokio::test]
async fn test_create_user_requires_credentials() {
    let executor = Arc::new(ScriptedExecutor::host(UBUNTU, "0", true));
    let host = identified(&executor).await;

    let err = host
        .create_new_user("bob", Some(""), Some(Path::new("")), Some(Path::new("")))
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::Configuration(_)));

    let err = host
        .create_new_user("", Some("hunter2"), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::Configuration(_)));

    let err = host
        .create_new_user("bob; rm -rf /", Some("hunter2"), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::Configuration(_)));

    assert!(executor.commands().is_empty());
}

#[tokio::test]
async fn test_create_user_missing_token_file() {
    let dir = tempfile::tempdir().unwrap();
    let executor = Arc::new(ScriptedExecutor::host(UBUNTU, "0", true));
    let host = identified(&executor).await;

    let err = host
        .create_new_user("bob", Some("hunter2"), None, Some(&dir.path().join("token")))
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::LocalFileNotFound(_)));
    assert!(executor.commands().is_empty());
}

#[tokio::test]
async fn test_create_user_already_exists() {
    let executor = Arc::new(
        ScriptedExecutor::host(UBUNTU, "0", true).respond(
            "id bob",
            0,
            "uid=1001(bob) gid=1001(bob) groups=1001(bob)\n",
            "",
        ),
    );
    let host = identified(&executor).await;

    let result = host.create_new_user("bob", Some("hunter2"), None, None).await;

    assert_eq!(outcome_message(&result), "bob already exists");
    assert_eq!(executor.commands(), vec!["id bob"]);
}

#[tokio::test]
async fn test_create_user_full_flow() {
    let dir = tempfile::tempdir().unwrap();
    let key = write_file(dir.path(), "id.pub", "ssh-ed25519 AAAA bob@laptop");
    let executor = Arc::new(
        ScriptedExecutor::host(UBUNTU, "1000", true)
            .respond("id bob", 1, "", "id: 'bob': no such user")
            .respond("getent passwd bob", 0, "/home/bob\n", ""),
    );
    let host = identified(&executor).await;

    let report = host
        .create_new_user("bob", Some("hunter2"), Some(&key), None)
        .await
        .unwrap();

    assert_eq!(report, Report::ok());
    assert_eq!(
        executor.commands(),
        vec![
            "id bob",
            "sudo useradd -m -d /home/bob -s /bin/bash -c \"Created by kaajal\" bob",
            "sudo chpasswd",
            "getent passwd bob | cut -d: -f6",
            "sudo mkdir -p /home/bob/.ssh && sudo chmod 700 /home/bob/.ssh",
            "sudo tee -a /home/bob/.ssh/authorized_keys > /dev/null && sudo chmod 600 /home/bob/.ssh/authorized_keys",
            "sudo chown -R bob: /home/bob/.ssh",
        ]
    );
    assert_eq!(executor.stdin_of("chpasswd").as_deref(), Some("bob:hunter2\n"));
    assert_eq!(
        executor.stdin_of("authorized_keys").as_deref(),
        Some("ssh-ed25519 AAAA bob@laptop\n")
    );
}

#[tokio::test]
async fn test_create_user_stops_at_failed_useradd() {
    let executor = Arc::new(
        ScriptedExecutor::host(FEDORA, "0", true)
            .respond("id bob", 1, "", "")
            .respond("useradd", 9, "", "useradd: user 'bob' already exists"),
    );
    let host = identified(&executor).await;

    let result = host.create_new_user("bob", Some("hunter2"), None, None).await;

    assert_eq!(outcome_message(&result), "useradd: user 'bob' already exists");
    assert!(!executor.commands().iter().any(|c| c.contains("chpasswd")));
}

#[tokio::test]
async fn test_create_user_stops_at_failed_chpasswd() {
    let dir = tempfile::tempdir().unwrap();
    let key = write_file(dir.path(), "id.pub", "ssh-ed25519 AAAA bob@laptop\n");
    let executor = Arc::new(
        ScriptedExecutor::host(FEDORA, "0", true)
            .respond("id bob", 1, "", "")
            .respond("chpasswd", 1, "", "chpasswd: (user bob) pam_chauthtok() failed"),
    );
    let host = identified(&executor).await;

    let err = host
        .create_new_user("bob", Some("hunter2"), Some(&key), None)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ProvisionError::RemoteCommand("chpasswd: (user bob) pam_chauthtok() failed".to_string())
    );
    assert!(!executor.commands().iter().any(|c| c.contains("getent")));
}

#[tokio::test]
async fn test_copy_ssh_key_current_user_uses_session_home() {
    let dir = tempfile::tempdir().unwrap();
    let key = write_file(dir.path(), "id.pub", "ssh-ed25519 AAAA alice@laptop\n");
    let executor = Arc::new(ScriptedExecutor::host(UBUNTU, "1000", false));
    let host = identified(&executor).await;

    let report = host.copy_ssh_key(&key, CURRENT_USER).await.unwrap();

    assert_eq!(report, Report::ok());
    assert_eq!(
        executor.commands(),
        vec![
            "mkdir -p /home/alice/.ssh && chmod 700 /home/alice/.ssh",
            "tee -a /home/alice/.ssh/authorized_keys > /dev/null && chmod 600 /home/alice/.ssh/authorized_keys",
        ]
    );
}

#[tokio::test]
async fn test_copy_ssh_key_current_user_without_home() {
    let dir = tempfile::tempdir().unwrap();
    let key = write_file(dir.path(), "id.pub", "ssh-ed25519 AAAA alice@laptop\n");
    let executor = Arc::new(ScriptedExecutor::host(UBUNTU, "1000", false).without_home());
    let host = identified(&executor).await;

    let err = host.copy_ssh_key(&key, CURRENT_USER).await.unwrap_err();

    assert!(matches!(err, ProvisionError::Precondition(_)));
    assert!(executor.commands().is_empty());
}

#[tokio::test]
async fn test_copy_ssh_key_named_user_lookup_fails() {
    let dir = tempfile::tempdir().unwrap();
    let key = write_file(dir.path(), "id.pub", "ssh-ed25519 AAAA bob@laptop\n");
    let executor = Arc::new(
        ScriptedExecutor::host(UBUNTU, "0", true).respond("getent passwd bob", 0, "\n", ""),
    );
    let host = identified(&executor).await;

    let err = host.copy_ssh_key(&key, "bob").await.unwrap_err();

    assert!(matches!(err, ProvisionError::RemoteCommand(_)));
    assert_eq!(executor.commands(), vec!["getent passwd bob | cut -d: -f6"]);
}

#[tokio::test]
async fn test_copy_ssh_key_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let executor = Arc::new(ScriptedExecutor::host(UBUNTU, "0", true));
    let host = identified(&executor).await;

    let result = host
        .copy_ssh_key(&dir.path().join("id.pub"), CURRENT_USER)
        .await;

    assert!(outcome_message(&result).ends_with(": file not found"));
    assert!(executor.commands().is_empty());
}

#[tokio::test]
async fn test_copy_ssh_key_mkdir_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let key = write_file(dir.path(), "id.pub", "ssh-ed25519 AAAA alice@laptop\n");
    let executor = Arc::new(
        ScriptedExecutor::host(UBUNTU, "1000", false).respond(
            "mkdir",
            1,
            "",
            "mkdir: cannot create directory: Permission denied",
        ),
    );
    let host = identified(&executor).await;

    let result = host.copy_ssh_key(&key, CURRENT_USER).await;

    assert_eq!(
        outcome_message(&result),
        "mkdir: cannot create directory: Permission denied"
    );
    assert!(!executor.commands().iter().any(|c| c.contains("tee")));
}

#[tokio::test]
async fn test_copy_github_token_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let token = write_file(dir.path(), "token", "ghp_example");
    let executor = Arc::new(
        ScriptedExecutor::host(UBUNTU, "1000", true).respond("getent passwd bob", 0, "/home/bob\n", ""),
    );
    let host = identified(&executor).await;

    let report = host.copy_github_token(&token, "bob").await.unwrap();

    assert_eq!(report, Report::ok());
    assert_eq!(
        executor.commands(),
        vec![
            "getent passwd bob | cut -d: -f6",
            "sudo mkdir -p /home/bob/.config/github && sudo chmod 700 /home/bob/.config/github",
            "sudo tee /home/bob/.config/github/token > /dev/null && sudo chmod 600 /home/bob/.config/github/token",
            "sudo chown bob: /home/bob/.config && sudo chown -R bob: /home/bob/.config/github",
        ]
    );
    assert_eq!(executor.stdin_of("token").as_deref(), Some("ghp_example\n"));
}

#[tokio::test]
async fn test_copy_github_token_chown_failure_is_warning() {
    let dir = tempfile::tempdir().unwrap();
    let token = write_file(dir.path(), "token", "ghp_example\n");
    let executor = Arc::new(
        ScriptedExecutor::host(FEDORA, "0", true)
            .respond("getent passwd bob", 0, "/home/bob\n", "")
            .respond("chown", 1, "", "chown: invalid user: 'bob:'"),
    );
    let host = identified(&executor).await;

    let report = host.copy_github_token(&token, "bob").await.unwrap();

    assert_eq!(report.message(), "chown: invalid user: 'bob:'");
}

#[tokio::test]
async fn test_operations_after_disconnect() {
    let executor = Arc::new(ScriptedExecutor::host(UBUNTU, "0", true));
    let host = identified(&executor).await;
    executor.connected.store(false, Ordering::SeqCst);

    let result = host.install("git", None).await;

    assert!(matches!(result, Err(ProvisionError::Precondition(_))));
    assert!(executor.commands().is_empty());
}

#[tokio::test]
async fn test_create_user_named_current_gets_own_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let key = write_file(dir.path(), "id.pub", "ssh-ed25519 AAAA current@laptop\n");
    let token = write_file(dir.path(), "token", "ghp_example\n");
    let executor = Arc::new(
        ScriptedExecutor::host(UBUNTU, "1000", true)
            .respond("id current", 1, "", "id: 'current': no such user")
            .respond("getent passwd current", 0, "/home/current\n", ""),
    );
    let host = identified(&executor).await;

    let report = host
        .create_new_user("current", Some("hunter2"), Some(&key), Some(&token))
        .await
        .unwrap();

    assert_eq!(report, Report::ok());
    let commands = executor.commands();
    assert_eq!(
        commands
            .iter()
            .filter(|c| c.starts_with("getent passwd current"))
            .count(),
        2
    );
    assert!(commands.iter().all(|c| !c.contains("/home/alice")));
    assert!(commands.contains(
        &"sudo tee -a /home/current/.ssh/authorized_keys > /dev/null && sudo chmod 600 /home/current/.ssh/authorized_keys"
            .to_string()
    ));
    assert!(commands.contains(
        &"sudo tee /home/current/.config/github/token > /dev/null && sudo chmod 600 /home/current/.config/github/token"
            .to_string()
    ));
}

#[tokio::test]
async fn test_create_user_rejects_multiline_password() {
    let executor = Arc::new(ScriptedExecutor::host(UBUNTU, "0", true));
    let host = identified(&executor).await;

    for password in ["x\nroot:pwned", "x\rroot:pwned", "x\r\n"] {
        let err = host
            .create_new_user("bob", Some(password), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Configuration(_)));
    }

    assert!(executor.commands().is_empty());
}
