use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bls_ingest::{
    FoodCode, IngestError, IngestLimits, IngestMode, IngestPipeline, MemoryStore, NutrientCode,
    NutritionRecord, NutrientStore, DatasetProfile, StoreError,
};
use bytes::Bytes;

fn fixture() -> (Arc<MemoryStore>, IngestPipeline) {
    let store = Arc::new(MemoryStore::new());
    let pipeline = IngestPipeline::new(store.clone());
    (store, pipeline)
}

async fn ingest(pipeline: &IngestPipeline, text: &str, mode: IngestMode) -> bls_ingest::IngestReport {
    pipeline
        .ingest(Bytes::from(text.to_string()), "bls_data.txt", mode)
        .await
        .expect("structural failure")
}

fn code(raw: &str) -> FoodCode {
    FoodCode::parse(raw, &('B'..='Y')).unwrap()
}

#[tokio::test]
async fn happy_path_single_row() {
    let (store, pipeline) = fixture();
    let report = ingest(&pipeline, "SBLS\tST\tGCAL\nB123456\tApfel\t52\n", IngestMode::Incremental).await;

    assert_eq!(report.added, 1);
    assert_eq!(report.updated, 0);
    assert_eq!(report.failed, 0);
    assert!(report.errors.is_empty());

    let stored = store.get(&code("B123456")).await.unwrap().unwrap();
    assert_eq!(stored.name_local, "Apfel");
    assert_eq!(stored.nutrients[&NutrientCode::GCAL], 52.0);
}

#[tokio::test]
async fn german_decimal_cells_parse() {
    let (store, pipeline) = fixture();
    ingest(&pipeline, "SBLS\tST\tZF\nB123456\tButter\t12,3\n", IngestMode::Incremental).await;

    let stored = store.get(&code("B123456")).await.unwrap().unwrap();
    assert_eq!(stored.nutrients[&NutrientCode::ZF], 12.3);
}

#[tokio::test]
async fn thousands_separators_normalize() {
    let (store, pipeline) = fixture();
    ingest(&pipeline, "SBLS\tST\tGJ\nB123456\tSchmalz\t1.234,56\n", IngestMode::Incremental).await;

    let stored = store.get(&code("B123456")).await.unwrap().unwrap();
    assert_eq!(stored.nutrients[&NutrientCode::GJ], 1234.56);
}

#[tokio::test]
async fn negative_values_are_absent_not_fatal() {
    let (store, pipeline) = fixture();
    let report = ingest(
        &pipeline,
        "SBLS\tST\tGCAL\tZE\nB123456\tQuark\t-5\t11\n",
        IngestMode::Incremental,
    )
    .await;

    assert_eq!(report.added, 1);
    assert_eq!(report.failed, 0);
    let stored = store.get(&code("B123456")).await.unwrap().unwrap();
    assert!(!stored.nutrients.contains_key(&NutrientCode::GCAL));
    assert_eq!(stored.nutrients[&NutrientCode::ZE], 11.0);
}

#[tokio::test]
async fn invalid_identifier_fails_the_row() {
    let (store, pipeline) = fixture();
    let report = ingest(
        &pipeline,
        "SBLS\tST\tGCAL\nA123456\tFalsch\t52\nB12345\tKurz\t52\n",
        IngestMode::Incremental,
    )
    .await;

    assert_eq!(report.added, 0);
    assert_eq!(report.failed, 2);
    assert_eq!(report.errors[0], "Row 2: Missing or invalid identifier 'A123456'");
    assert_eq!(report.errors[1], "Row 3: Missing or invalid identifier 'B12345'");
    assert_eq!(store.len(), 0);
}

#[tokio::test]
async fn missing_name_fails_the_row() {
    let (_, pipeline) = fixture();
    let report = ingest(&pipeline, "SBLS\tST\tGCAL\nB123456\t\t52\n", IngestMode::Incremental).await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.errors[0], "Row 2: Missing name");
}

#[tokio::test]
async fn bare_records_are_accepted() {
    let (store, pipeline) = fixture();
    let report = ingest(&pipeline, "SBLS\tST\nB123456\tApfel\n", IngestMode::Incremental).await;

    assert_eq!(report.added, 1);
    assert_eq!(report.failed, 0);
    let stored = store.get(&code("B123456")).await.unwrap().unwrap();
    assert!(stored.nutrients.is_empty());
}

#[tokio::test]
async fn semicolon_delimited_files_fail_every_row() {
    let (store, pipeline) = fixture();
    let report = ingest(
        &pipeline,
        "SBLS;ST;GCAL\nB123456;Apfel;52\nB222222;Birne;38\n",
        IngestMode::Incremental,
    )
    .await;

    assert_eq!(report.added, 0);
    assert_eq!(report.failed, 2);
    assert_eq!(store.len(), 0);
}

#[tokio::test]
async fn reingesting_the_same_file_only_updates() {
    let (store, pipeline) = fixture();
    let text = "SBLS\tST\tGCAL\nB111111\tApfel\t52\nB222222\tBirne\t38\n";

    let first = ingest(&pipeline, text, IngestMode::Incremental).await;
    assert_eq!((first.added, first.updated, first.failed), (2, 0, 0));

    let second = ingest(&pipeline, text, IngestMode::Incremental).await;
    assert_eq!((second.added, second.updated, second.failed), (0, 2, 0));
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn incremental_updates_preserve_unsupplied_nutrients() {
    let (store, pipeline) = fixture();
    ingest(&pipeline, "SBLS\tST\tGCAL\tZE\nB123456\tApfel\t52\t0,3\n", IngestMode::Incremental).await;
    ingest(&pipeline, "SBLS\tST\tGCAL\nB123456\tApfel\t54\n", IngestMode::Incremental).await;

    let stored = store.get(&code("B123456")).await.unwrap().unwrap();
    assert_eq!(stored.nutrients[&NutrientCode::GCAL], 54.0);
    assert_eq!(stored.nutrients[&NutrientCode::ZE], 0.3);
}

#[tokio::test]
async fn replace_mode_swaps_the_dataset() {
    let (store, pipeline) = fixture();
    ingest(
        &pipeline,
        "SBLS\tST\tGCAL\nB111111\tApfel\t52\nB222222\tBirne\t38\n",
        IngestMode::Replace,
    )
    .await;
    let report = ingest(&pipeline, "SBLS\tST\tGCAL\nB333333\tKirsche\t50\n", IngestMode::Replace).await;

    assert_eq!((report.added, report.updated, report.failed), (1, 0, 0));
    assert_eq!(store.len(), 1);
    assert!(store.get(&code("B111111")).await.unwrap().is_none());
    assert!(store.get(&code("B333333")).await.unwrap().is_some());
}

#[tokio::test]
async fn duplicate_codes_keep_the_last_row() {
    let (store, pipeline) = fixture();
    let report = ingest(
        &pipeline,
        "SBLS\tST\tGCAL\nB111111\tApfel\t52\nB111111\tApfel neu\t60\n",
        IngestMode::Incremental,
    )
    .await;

    assert_eq!((report.added, report.updated, report.failed), (1, 0, 0));
    let stored = store.get(&code("B111111")).await.unwrap().unwrap();
    assert_eq!(stored.name_local, "Apfel neu");
    assert_eq!(stored.nutrients[&NutrientCode::GCAL], 60.0);
}

#[tokio::test]
async fn error_list_is_truncated_but_failed_counts_all() {
    let (_, pipeline) = fixture();
    let mut text = String::from("SBLS\tST\n");
    for i in 0..15 {
        text.push_str(&format!("X{i:07}\tkaputt\n")); // 8 chars: wrong length
    }
    let report = ingest(&pipeline, &text, IngestMode::Incremental).await;

    assert_eq!(report.failed, 15);
    assert_eq!(report.errors.len(), 10);
    assert!(report.errors[0].starts_with("Row 2:"));
}

#[tokio::test]
async fn empty_and_oversize_payloads_are_structural() {
    let (_, pipeline) = fixture();
    let err = pipeline
        .ingest(Bytes::new(), "bls_data.txt", IngestMode::Incremental)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::EmptyFile));

    let store = Arc::new(MemoryStore::new());
    let limits = IngestLimits {
        max_file_bytes: 16,
        ..Default::default()
    };
    let small = IngestPipeline::with_config(store, DatasetProfile::default(), limits);
    let err = small
        .ingest(
            Bytes::from_static(b"SBLS\tST\nB123456\tApfel\n"),
            "bls_data.txt",
            IngestMode::Incremental,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::FileTooLarge { .. }));
}

#[tokio::test]
async fn row_limit_is_structural() {
    let store = Arc::new(MemoryStore::new());
    let limits = IngestLimits {
        max_rows: 2,
        ..Default::default()
    };
    let pipeline = IngestPipeline::with_config(store, DatasetProfile::default(), limits);
    let err = pipeline
        .ingest(
            Bytes::from_static(b"SBLS\tST\nB111111\ta\nB222222\tb\nB333333\tc\n"),
            "bls_data.txt",
            IngestMode::Incremental,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::TooManyRows { limit: 2 }));
}

#[tokio::test]
async fn gzip_payloads_are_inflated() -> anyhow::Result<()> {
    use tokio::io::AsyncReadExt;

    let text = b"SBLS\tST\tGCAL\nB123456\tApfel\t52\n";
    let mut encoder = async_compression::tokio::bufread::GzipEncoder::new(&text[..]);
    let mut gz = Vec::new();
    encoder.read_to_end(&mut gz).await?;

    let (store, pipeline) = fixture();
    let report = pipeline
        .ingest(Bytes::from(gz), "bls_data.txt.gz", IngestMode::Incremental)
        .await?;
    assert_eq!(report.added, 1);
    assert_eq!(store.len(), 1);
    Ok(())
}

#[tokio::test]
async fn corrupt_gzip_payloads_are_structural() {
    let (store, pipeline) = fixture();
    // Valid gzip magic, garbage body.
    let err = pipeline
        .ingest(
            Bytes::from_static(&[0x1f, 0x8b, 0xde, 0xad, 0xbe, 0xef]),
            "bls_data.txt.gz",
            IngestMode::Incremental,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Io(_)));
    assert_eq!(store.len(), 0);
}

#[tokio::test]
async fn windows1252_files_decode() {
    let (store, pipeline) = fixture();
    // "B123456\tMüsli\t380" with 0xFC for ü.
    let mut bytes = b"SBLS\tST\tGCAL\nB123456\tM".to_vec();
    bytes.push(0xFC);
    bytes.extend_from_slice(b"sli\t380\n");

    let report = pipeline
        .ingest(Bytes::from(bytes), "bls_data.txt", IngestMode::Incremental)
        .await
        .unwrap();
    assert_eq!(report.added, 1);
    let stored = store.get(&code("B123456")).await.unwrap().unwrap();
    assert_eq!(stored.name_local, "Müsli");
}

#[tokio::test]
async fn utf16_files_decode() {
    let (store, pipeline) = fixture();
    let text = "SBLS\tST\tGCAL\nB123456\tGrünkohl\t37\n";
    let mut bytes = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }

    let report = pipeline
        .ingest(Bytes::from(bytes), "bls_data.txt", IngestMode::Incremental)
        .await
        .unwrap();
    assert_eq!(report.added, 1);
    let stored = store.get(&code("B123456")).await.unwrap().unwrap();
    assert_eq!(stored.name_local, "Grünkohl");
}

#[tokio::test]
async fn ingests_from_a_file_on_disk() -> anyhow::Result<()> {
    use std::io::Write;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bls.txt");
    let mut file = std::fs::File::create(&path)?;
    writeln!(file, "SBLS\tST\tGCAL")?;
    for i in 0..100 {
        writeln!(file, "B{i:06}\tLebensmittel {i}\t{i}")?;
    }

    let (store, pipeline) = fixture();
    let payload = Bytes::from(tokio::fs::read(&path).await?);
    let report = pipeline.ingest(payload, "bls.txt", IngestMode::Incremental).await?;

    assert_eq!(report.added, 100);
    assert_eq!(report.failed, 0);
    assert_eq!(store.len(), 100);
    Ok(())
}

/// Counts insert batches to observe the chunking behavior.
struct CountingStore {
    inner: MemoryStore,
    insert_calls: AtomicUsize,
}

#[async_trait]
impl NutrientStore for CountingStore {
    async fn insert_missing(
        &self,
        batch: &[NutritionRecord],
    ) -> Result<Vec<FoodCode>, StoreError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_missing(batch).await
    }

    async fn upsert(&self, batch: &[NutritionRecord]) -> Result<u64, StoreError> {
        self.inner.upsert(batch).await
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        self.inner.clear().await
    }

    async fn get(&self, code: &FoodCode) -> Result<Option<NutritionRecord>, StoreError> {
        self.inner.get(code).await
    }

    async fn search_name(
        &self,
        needle: &str,
        limit: usize,
    ) -> Result<Vec<NutritionRecord>, StoreError> {
        self.inner.search_name(needle, limit).await
    }
}

#[tokio::test]
async fn two_thousand_rows_apply_in_two_batches() {
    let store = Arc::new(CountingStore {
        inner: MemoryStore::new(),
        insert_calls: AtomicUsize::new(0),
    });
    let pipeline = IngestPipeline::new(store.clone());

    let mut text = String::from("SBLS\tST\tGCAL\n");
    for i in 0..2000 {
        text.push_str(&format!("B{i:06}\tLebensmittel {i}\t{i}\n"));
    }
    let report = pipeline
        .ingest(Bytes::from(text), "bls_data.txt", IngestMode::Incremental)
        .await
        .unwrap();

    assert_eq!((report.added, report.updated, report.failed), (2000, 0, 0));
    assert_eq!(store.insert_calls.load(Ordering::SeqCst), 2);
    assert_eq!(store.inner.len(), 2000);
}
