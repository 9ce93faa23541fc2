//! Manifest Builder
//!
//! Turns a filtered selection into a reproducible bundle fingerprint:
//! sort by entry name (ordinal), hash each file, emit one canonical record
//! per file, hash the concatenated records.
//!
//! Bundles are flat. An item's entry name is its `file_name()`, the same
//! name it is uploaded under, so the server can recompute the fingerprint
//! from what it receives.

use std::collections::HashMap;
use std::sync::Arc;

use crate::hash::HashEngine;

use super::source::ItemSource;
use super::types::{canonical_manifest, Bundle, InputItem, ManifestError, PreparedBundle};

/// Progress is logged every this many files
const PROGRESS_EVERY: usize = 5;

/// Builds bundle fingerprints with a shared hash engine
#[derive(Clone)]
pub struct ManifestBuilder {
    engine: Arc<dyn HashEngine>,
}

impl ManifestBuilder {
    pub fn new(engine: Arc<dyn HashEngine>) -> Self {
        Self { engine }
    }

    /// Hash a selection into a bundle.
    ///
    /// Files are read and hashed one at a time, yielding to the scheduler
    /// between files. Any read failure aborts the whole build.
    pub async fn build(
        &self,
        mut sources: Vec<Arc<dyn ItemSource>>,
    ) -> Result<PreparedBundle, ManifestError> {
        if sources.is_empty() {
            return Err(ManifestError::NoEligibleFiles);
        }

        // Ordinal byte comparison of UTF-8 is code point order
        sources.sort_by(|a, b| a.file_name().cmp(b.file_name()));

        {
            let mut seen: HashMap<&str, &str> = HashMap::with_capacity(sources.len());
            for source in &sources {
                if let Some(first) = seen.insert(source.file_name(), source.relative_path()) {
                    return Err(ManifestError::DuplicatePath {
                        name: source.file_name().to_string(),
                        first: first.to_string(),
                        second: source.relative_path().to_string(),
                    });
                }
            }
        }

        let total = sources.len();
        let mut items = Vec::with_capacity(total);

        for (index, source) in sources.iter().enumerate() {
            let content = source.read_all().await.map_err(|e| ManifestError::Hashing {
                path: source.relative_path().to_string(),
                source: e,
            })?;

            let content_digest = self.engine.digest(&content);
            drop(content);

            items.push(InputItem {
                relative_path: source.file_name().to_string(),
                size_bytes: source.size_bytes(),
                content_digest,
            });

            let processed = index + 1;
            if processed % PROGRESS_EVERY == 0 {
                tracing::info!(processed, total, "Hashing files");
            }

            tokio::task::yield_now().await;
        }

        let manifest = canonical_manifest(&items);
        let fingerprint = self.engine.digest(manifest.as_bytes());

        tracing::info!(
            fingerprint = %fingerprint,
            files = total,
            engine = ?self.engine.kind(),
            "Bundle fingerprint computed"
        );

        Ok(PreparedBundle {
            bundle: Bundle { items, fingerprint },
            sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{PortableEngine, Sha1Digest};
    use crate::manifest::source::MemoryItem;
    use async_trait::async_trait;

    fn builder() -> ManifestBuilder {
        ManifestBuilder::new(Arc::new(PortableEngine))
    }

    fn item(path: &str, bytes: &[u8]) -> Arc<dyn ItemSource> {
        Arc::new(MemoryItem::new(path, bytes.to_vec()))
    }

    struct FailingItem;

    #[async_trait]
    impl ItemSource for FailingItem {
        fn relative_path(&self) -> &str {
            "broken.idat"
        }

        fn size_bytes(&self) -> u64 {
            4
        }

        async fn read_all(&self) -> std::io::Result<Vec<u8>> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"))
        }
    }

    #[tokio::test]
    async fn test_order_independent() {
        let a = item("a.csv", b"0123456789");
        let b = item("b.idat", b"01234567890123456789");

        let forward = builder().build(vec![a.clone(), b.clone()]).await.unwrap();
        let reverse = builder().build(vec![b, a]).await.unwrap();

        assert_eq!(forward.bundle.fingerprint, reverse.bundle.fingerprint);
        assert_eq!(reverse.bundle.items[0].relative_path, "a.csv");
        assert_eq!(reverse.sources[0].relative_path(), "a.csv");
    }

    #[tokio::test]
    async fn test_fingerprint_is_digest_of_manifest() {
        let prepared = builder()
            .build(vec![item("a.csv", b"abc")])
            .await
            .unwrap();

        let expected_manifest = "a.csv\n3\na9993e364706816aba3e25717850c26c9cd0d89d\n";
        assert_eq!(prepared.bundle.canonical_manifest(), expected_manifest);
        assert_eq!(
            prepared.bundle.fingerprint,
            PortableEngine.digest(expected_manifest.as_bytes())
        );
    }

    #[tokio::test]
    async fn test_ordinal_not_locale_order() {
        let prepared = builder()
            .build(vec![item("b.csv", b"1"), item("B.csv", b"2"), item("a.csv", b"3")])
            .await
            .unwrap();

        let paths: Vec<&str> = prepared
            .bundle
            .items
            .iter()
            .map(|i| i.relative_path.as_str())
            .collect();
        assert_eq!(paths, vec!["B.csv", "a.csv", "b.csv"]);
    }

    #[tokio::test]
    async fn test_recorded_size_changes_fingerprint() {
        let plain = builder().build(vec![item("a.csv", b"abc")]).await.unwrap();
        let resized_item: Arc<dyn ItemSource> =
            Arc::new(MemoryItem::new("a.csv", b"abc".to_vec()).with_size(4));
        let resized = builder().build(vec![resized_item]).await.unwrap();

        assert_eq!(
            plain.bundle.items[0].content_digest,
            resized.bundle.items[0].content_digest
        );
        assert_ne!(plain.bundle.fingerprint, resized.bundle.fingerprint);
    }

    #[tokio::test]
    async fn test_empty_selection() {
        let result = builder().build(Vec::new()).await;
        assert!(matches!(result, Err(ManifestError::NoEligibleFiles)));
    }

    #[tokio::test]
    async fn test_duplicate_path() {
        let result = builder()
            .build(vec![item("a.csv", b"1"), item("a.csv", b"2")])
            .await;
        assert!(matches!(result, Err(ManifestError::DuplicatePath { name, .. }) if name == "a.csv"));
    }

    #[tokio::test]
    async fn test_same_name_in_two_subdirectories_is_duplicate() {
        let result = builder()
            .build(vec![
                item("plate1/R01C01_Grn.idat", b"1"),
                item("plate2/R01C01_Grn.idat", b"2"),
            ])
            .await;

        match result {
            Err(ManifestError::DuplicatePath { name, first, second }) => {
                assert_eq!(name, "R01C01_Grn.idat");
                let mut paths = vec![first, second];
                paths.sort();
                assert_eq!(paths, vec!["plate1/R01C01_Grn.idat", "plate2/R01C01_Grn.idat"]);
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected a duplicate name"),
        }
    }

    #[tokio::test]
    async fn test_manifest_uses_uploaded_names() {
        let prepared = builder()
            .build(vec![
                item("plate/R01C01_Grn.idat", b"abc"),
                item("samples.csv", b""),
            ])
            .await
            .unwrap();

        // Rebuild the manifest from the names the upload sends, the way the
        // server verifies a bundle id
        let mut records = String::new();
        for source in &prepared.sources {
            let bytes = source.read_all().await.unwrap();
            records.push_str(&format!(
                "{}\n{}\n{}\n",
                source.file_name(),
                bytes.len(),
                PortableEngine.digest(&bytes)
            ));
        }

        assert_eq!(prepared.bundle.canonical_manifest(), records);
        assert_eq!(
            prepared.bundle.fingerprint,
            PortableEngine.digest(records.as_bytes())
        );
        assert_eq!(prepared.bundle.items[0].relative_path, "R01C01_Grn.idat");
    }

    #[tokio::test]
    async fn test_hashing_failure_names_item() {
        let failing: Arc<dyn ItemSource> = Arc::new(FailingItem);
        let result = builder().build(vec![item("a.csv", b"1"), failing]).await;

        match result {
            Err(ManifestError::Hashing { path, .. }) => assert_eq!(path, "broken.idat"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected hashing failure"),
        }
    }

    #[tokio::test]
    async fn test_known_single_file_fingerprint() {
        let prepared = builder().build(vec![item("x.csv", b"")]).await.unwrap();
        let manifest = "x.csv\n0\nda39a3ee5e6b4b0d3255bfef95601890afd80709\n";
        let expected: Sha1Digest = PortableEngine.digest(manifest.as_bytes());
        assert_eq!(prepared.bundle.fingerprint, expected);
        assert_eq!(prepared.bundle.fingerprint.to_hex().len(), 40);
    }
}
