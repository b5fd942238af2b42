//! One-shot startup convergence pass.
//!
//! Lists every config object the engine currently knows, filters by the
//! relevance label, and writes the files that are missing. Existing files
//! are assumed current and never overwritten here, consistent with
//! `keep_existing` semantics and idempotent restarts. Change propagation is
//! the event strategy's job.

use promdir_core::Naming;
use promdir_source::ConfigSource;

use crate::error::SyncError;
use crate::store::OutputStore;

/// Outcome of a bootstrap pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapSummary {
    /// Files created for relevant objects that had none.
    pub written: usize,
    /// Relevant objects whose file already existed.
    pub skipped: usize,
}

/// Run the bootstrap pass.
///
/// A failed listing is fatal (startup error); a failed individual write is
/// logged and skipped — the object is still relevant and a later pass will
/// re-derive it.
pub async fn run(
    source: &dyn ConfigSource,
    store: &OutputStore,
    naming: &Naming,
) -> Result<BootstrapSummary, SyncError> {
    let configs = source.list_configs().await?;
    let mut summary = BootstrapSummary::default();

    for config in configs {
        if !naming.is_relevant(&config.labels) {
            continue;
        }
        let name = naming.file_name(&config);
        if store.exists(&name) {
            summary.skipped += 1;
            continue;
        }
        match store.write(&name, &config.data) {
            Ok(_) => {
                tracing::info!(
                    id = %config.id,
                    name = %config.name,
                    file = %store.path_for(&name).display(),
                    "bootstrap created config",
                );
                summary.written += 1;
            }
            Err(err) => {
                tracing::warn!(id = %config.id, error = %err, "bootstrap write failed");
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use tempfile::TempDir;

    use promdir_core::NamingScheme;

    use crate::testing::{labeled_config, MockSource};

    fn harness(tmp: &TempDir) -> (OutputStore, Naming) {
        let store = OutputStore::new(tmp.path().join("out"), "yaml");
        store.bootstrap(false).expect("store bootstrap");
        (store, Naming::new("scrape", NamingScheme::Name))
    }

    #[tokio::test]
    async fn writes_only_relevant_objects() {
        let tmp = TempDir::new().unwrap();
        let (store, naming) = harness(&tmp);
        let (source, _stream) = MockSource::new();
        source.put_config(labeled_config("c1", "jobA", b"a", &[("scrape", "true")]));
        source.put_config(labeled_config("c2", "jobB", b"b", &[]));

        let summary = run(source.as_ref(), &store, &naming).await.expect("run");

        assert_eq!(summary.written, 1);
        assert!(store.exists(&"jobA".into()));
        assert!(!store.exists(&"jobB".into()), "unlabeled object must not produce a file");
    }

    #[tokio::test]
    async fn second_pass_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let (store, naming) = harness(&tmp);
        let (source, _stream) = MockSource::new();
        source.put_config(labeled_config("c1", "jobA", b"a", &[("scrape", "true")]));

        let first = run(source.as_ref(), &store, &naming).await.expect("first");
        assert_eq!((first.written, first.skipped), (1, 0));

        let second = run(source.as_ref(), &store, &naming).await.expect("second");
        assert_eq!((second.written, second.skipped), (0, 1));
    }

    #[tokio::test]
    async fn never_overwrites_an_existing_file() {
        let tmp = TempDir::new().unwrap();
        let (store, naming) = harness(&tmp);
        let (source, _stream) = MockSource::new();
        source.put_config(labeled_config("c1", "jobA", b"fresh", &[("scrape", "true")]));

        fs::write(store.path_for(&"jobA".into()), "operator-edited").unwrap();
        run(source.as_ref(), &store, &naming).await.expect("run");

        assert_eq!(
            fs::read_to_string(store.path_for(&"jobA".into())).unwrap(),
            "operator-edited"
        );
    }

    #[tokio::test]
    async fn honors_name_override_label() {
        let tmp = TempDir::new().unwrap();
        let (store, naming) = harness(&tmp);
        let (source, _stream) = MockSource::new();
        source.put_config(labeled_config(
            "c1",
            "jobA",
            b"a",
            &[("scrape", "true"), ("scrape.name", "custom")],
        ));

        run(source.as_ref(), &store, &naming).await.expect("run");

        assert!(store.exists(&"custom".into()));
        assert!(!store.exists(&"jobA".into()));
    }

    #[tokio::test]
    async fn colliding_overrides_leave_one_file_with_last_content() {
        let tmp = TempDir::new().unwrap();
        let (store, naming) = harness(&tmp);
        let (source, _stream) = MockSource::new();
        source.put_config(labeled_config(
            "c1",
            "jobA",
            b"first",
            &[("scrape", "true"), ("scrape.name", "shared")],
        ));
        source.put_config(labeled_config(
            "c2",
            "jobB",
            b"second",
            &[("scrape", "true"), ("scrape.name", "shared")],
        ));

        run(source.as_ref(), &store, &naming).await.expect("run");

        // Listing is id-ordered; c1 wins the write, c2 sees the file present.
        let files: Vec<_> = fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(files.len(), 1);
        assert_eq!(
            fs::read_to_string(store.path_for(&"shared".into())).unwrap(),
            "first"
        );
    }
}
