//! Writing and removing the PID file, when `write_pid` is enabled.

use std::fs;
use std::io;
use std::path::Path;

/// Atomically write the current process's PID to `path`: write to a
/// sibling temp file, then rename over the target, so a reader never
/// observes a partially written file.
pub fn write(path: &Path) -> io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, format!("{}\n", std::process::id()))?;
    fs::rename(&tmp_path, path)
}

pub fn remove(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Remove the PID file only if the PID it records is this process's
/// own, so a stale or replaced file left by another instance is never
/// unlinked out from under it.
pub fn remove_if_owned(path: &Path) -> io::Result<()> {
    match read(path) {
        Ok(pid) if pid == std::process::id() as i32 => remove(path),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Read the PID recorded in `path`, for the `reload` subcommand to
/// signal a running instance.
pub fn read(path: &Path) -> io::Result<i32> {
    let contents = fs::read_to_string(path)?;
    contents
        .trim()
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "pid file does not contain a valid PID"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let path = std::env::temp_dir().join(format!("adnsd-test-{}.pid", std::process::id()));
        write(&path).unwrap();
        assert_eq!(std::process::id() as i32, read(&path).unwrap());
        remove(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn remove_of_missing_file_is_not_an_error() {
        let path = std::env::temp_dir().join("adnsd-test-does-not-exist.pid");
        assert!(remove(&path).is_ok());
    }

    #[test]
    fn remove_if_owned_unlinks_when_pid_matches() {
        let path = std::env::temp_dir().join(format!("adnsd-test-owned-{}.pid", std::process::id()));
        write(&path).unwrap();
        remove_if_owned(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn remove_if_owned_leaves_file_when_pid_does_not_match() {
        let path = std::env::temp_dir().join(format!("adnsd-test-foreign-{}.pid", std::process::id()));
        fs::write(&path, "1\n").unwrap();
        remove_if_owned(&path).unwrap();
        assert!(path.exists());
        fs::remove_file(&path).unwrap();
    }
}
