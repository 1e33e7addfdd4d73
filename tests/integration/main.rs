//! Integration tests for bcart

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// 2000-01-01T00:00:00Z in .NET ticks
    const Y2K_TICKS: &str = "630822816000000000";

    /// bcart isolated from the user's config and cache
    fn bcart(home: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("bcart");
        cmd.env("BCART_CONFIG", home.path().join("config.toml"))
            .env("BCART_CACHE", home.path().join("cache"))
            .env_remove("RUST_LOG");
        cmd
    }

    fn install(home: &TempDir, rel: &str, stamp: Option<&str>) -> std::path::PathBuf {
        let dir = home.path().join("cache").join(rel);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("manifest.json"), "{}").unwrap();
        if let Some(ticks) = stamp {
            fs::write(dir.join("lastused"), format!("{ticks}\n")).unwrap();
        }
        dir
    }

    #[test]
    fn help_displays() {
        let home = TempDir::new().unwrap();
        bcart(&home)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("BC artifact downloader"));
    }

    #[test]
    fn version_displays() {
        let home = TempDir::new().unwrap();
        bcart(&home)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("bcart"));
    }

    #[test]
    fn config_path() {
        let home = TempDir::new().unwrap();
        bcart(&home)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show_resolves_cache_root() {
        let home = TempDir::new().unwrap();
        let cache = home.path().join("cache");
        bcart(&home)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"))
            .stdout(predicate::str::contains(cache.to_string_lossy().as_ref()));
    }

    #[test]
    fn invalid_config_is_reported() {
        let home = TempDir::new().unwrap();
        fs::write(home.path().join("config.toml"), "[cache\n").unwrap();
        bcart(&home)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn list_local_cache() {
        let home = TempDir::new().unwrap();
        install(&home, "onprem/24.0.1.1/w1", None);
        install(&home, "onprem/24.0.1.1/w1_dl-1-abcd", None);
        install(&home, "sandbox/25.0.1.1/us", None);

        bcart(&home)
            .args(["list", "--local", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("24.0.1.1"))
            .stdout(predicate::str::contains("w1_dl").not())
            .stdout(predicate::str::contains("25.0.1.1").not());
    }

    #[test]
    fn list_local_json() {
        let home = TempDir::new().unwrap();
        install(&home, "sandbox/25.0.1.1/us", None);

        bcart(&home)
            .args(["list", "--local", "--kind", "sandbox", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"version\": \"25.0.1.1\""))
            .stdout(predicate::str::contains("\"country\": \"us\""));
    }

    #[test]
    fn latest_local_first_without_network() {
        let home = TempDir::new().unwrap();
        install(&home, "onprem/24.0.1.1/de", None);
        install(&home, "onprem/24.0.2.7/de", None);

        bcart(&home)
            .args(["latest", "--version", "24.", "--country", "de", "--local-first", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains(Path::new("onprem/24.0.2.7/de").to_string_lossy().as_ref()));
    }

    #[test]
    fn cleanup_dry_run_keeps_entries() {
        let home = TempDir::new().unwrap();
        let stale = install(&home, "onprem/23.0.1.1/w1", Some(Y2K_TICKS));

        bcart(&home)
            .args(["cleanup", "--days", "30", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Would remove"));
        assert!(stale.exists());
    }

    #[test]
    fn cleanup_removes_stale_and_keeps_unstamped() {
        let home = TempDir::new().unwrap();
        let stale = install(&home, "onprem/23.0.1.1/w1", Some(Y2K_TICKS));
        let unstamped = install(&home, "onprem/23.0.1.1/de", None);

        bcart(&home)
            .args(["cleanup", "--days", "30"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Removed"));
        assert!(!stale.exists());
        assert!(unstamped.exists());
    }

    #[test]
    fn download_invalid_uri_fails_with_hint() {
        let home = TempDir::new().unwrap();
        bcart(&home)
            .args(["download", "https://example.com/onprem/24.0.1.1/w1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not a valid artifact identity"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn download_insider_onprem_is_unsupported() {
        let home = TempDir::new().unwrap();
        bcart(&home)
            .args(["download", "--kind", "onprem", "--version", "24.0.1.1", "--account", "bcinsider"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unsupported operation"));
    }

    #[test]
    fn download_requires_a_target() {
        let home = TempDir::new().unwrap();
        bcart(&home).arg("download").assert().failure();
    }
}
