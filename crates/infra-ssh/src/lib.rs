// Havoc Infrastructure - SSH Adapter
// Implements: RemoteShell over libssh2

mod ssh_shell;

pub use ssh_shell::Ssh2Shell;
