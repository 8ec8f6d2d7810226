//! The reload controller: owns the single `ZoneStore` the resolver
//! reads from, and atomically swaps it for a freshly loaded one.
//!
//! In-flight resolutions hold a read guard only long enough to clone
//! the `Arc` they resolve against (see `server.rs`), so a reload never
//! blocks on, or is blocked by, a query in progress.

use std::path::PathBuf;
use std::sync::Arc;

use dns_types::zones::deserialise;
use dns_types::zones::types::ZoneStore;
use tokio::sync::RwLock;

pub struct ReloadController {
    source: PathBuf,
    store: Arc<RwLock<Arc<ZoneStore>>>,
}

impl ReloadController {
    /// Perform the initial load.  Unlike `reload`, failure here is
    /// fatal: there is no previous store to fall back on.
    pub fn load(source: PathBuf) -> Result<Self, deserialise::Error> {
        let store = deserialise::load_path(&source)?;
        Ok(ReloadController {
            source,
            store: Arc::new(RwLock::new(Arc::new(store))),
        })
    }

    pub fn current(&self) -> Arc<RwLock<Arc<ZoneStore>>> {
        Arc::clone(&self.store)
    }

    /// Rebuild the zone store from the same source and swap it in.
    /// On failure the previous store remains in force.
    pub async fn reload(&self) -> Result<(), deserialise::Error> {
        let new_store = deserialise::load_path(&self.source)?;
        let mut guard = self.store.write().await;
        *guard = Arc::new(new_store);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_zone(dir: &std::path::Path, contents: &str) {
        let mut f = std::fs::File::create(dir.join("example.zone")).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    const ZONE: &str = "\
$ORIGIN example.test.
@ 300 IN SOA ns1.example.test. hostmaster.example.test. 1 3600 600 86400 300
@ 300 IN NS ns1.example.test.
www 300 IN A 192.0.2.1
";

    #[tokio::test]
    async fn reload_picks_up_changes_on_disk() {
        let dir = std::env::temp_dir().join(format!("adnsd-reload-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        write_zone(&dir, ZONE);

        let controller = ReloadController::load(dir.clone()).unwrap();
        let store = controller.current();
        let apex = dns_types::protocol::types::test_util::domain("example.test.");
        assert!(store.read().await.has_any(&apex));

        write_zone(
            &dir,
            "\
$ORIGIN example.test.
@ 300 IN SOA ns1.example.test. hostmaster.example.test. 2 3600 600 86400 300
@ 300 IN NS ns1.example.test.
www 300 IN A 192.0.2.1
api 300 IN A 192.0.2.2
",
        );
        controller.reload().await.unwrap();

        let store = controller.current();
        let guard = store.read().await;
        assert!(guard.has_any(&dns_types::protocol::types::test_util::domain("api.example.test.")));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_store() {
        let dir = std::env::temp_dir().join(format!("adnsd-reload-fail-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        write_zone(&dir, ZONE);

        let controller = ReloadController::load(dir.clone()).unwrap();
        write_zone(&dir, "this is not a valid zone file at all {{{\n");

        assert!(controller.reload().await.is_err());

        let store = controller.current();
        let guard = store.read().await;
        assert!(guard.has_any(&dns_types::protocol::types::test_util::domain("www.example.test.")));

        std::fs::remove_dir_all(&dir).ok();
    }
}
