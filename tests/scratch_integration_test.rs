use std::fs;
use tempfile::TempDir;
use wqp_seeder::error::AppError;
use wqp_seeder::program::{duplicate_ids, StationSource};
use wqp_seeder::scratch::{ScratchDb, SCRATCH_PREFIX};

const RESULTS: &str = "ActivityIdentifier,MonitoringLocationIdentifier,CharacteristicName\n\
b,ORG-1,Calcium\n\
a,ORG_WQX-2,Calcium\n\
b,ORG-1,Sodium\n\
,ORG-3,Sodium\n";

#[tokio::test]
async fn test_scratch_filters_loaded_csv() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("results.csv");
    fs::write(&file, RESULTS).unwrap();

    let scratch = ScratchDb::open_in(dir.path())
        .await
        .expect("open scratch");
    let table = scratch.load_csv(&file).await.expect("load csv");
    assert_eq!(table.name, "results");
    assert_eq!(table.header.len(), 3);

    let ids = scratch.distinct(&table, "ActivityIdentifier").await.unwrap();
    assert_eq!(ids, vec!["b", "a", ""]);

    scratch
        .create_index(&table, "ActivityIdentifier")
        .await
        .unwrap();
    let rows = scratch
        .select_where(&table, "ActivityIdentifier", "b")
        .await
        .unwrap();
    assert_eq!(
        rows,
        vec![
            vec!["b".to_string(), "ORG-1".to_string(), "Calcium".to_string()],
            vec!["b".to_string(), "ORG-1".to_string(), "Sodium".to_string()],
        ]
    );

    let tagged = scratch
        .select_like(&table, "MonitoringLocationIdentifier", r"%\_WQX-%")
        .await
        .unwrap();
    assert_eq!(tagged, vec!["ORG_WQX-2"]);

    let scratch_dir = scratch.path().parent().unwrap().to_path_buf();
    assert!(scratch_dir.exists());
    assert!(scratch_dir
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with(SCRATCH_PREFIX));
    scratch.close().await;
    assert!(!scratch_dir.exists());
}

#[tokio::test]
async fn test_scratch_rejects_duplicate_headers() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("dup.csv");
    fs::write(&file, "a,b,a\n1,2,3\n").unwrap();

    let scratch = ScratchDb::open_in(dir.path()).await.unwrap();
    let result = scratch.load_csv(&file).await;
    scratch.close().await;

    assert!(matches!(result, Err(AppError::InvalidData(_))));
}

#[tokio::test]
async fn test_duplicate_ids_from_station_file() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("stations.csv");
    fs::write(
        &file,
        "MonitoringLocationIdentifier,MonitoringLocationName\n\
         ORG-1,bare\n\
         ORG_WQX-1,tagged\n\
         ORGXWQX-5,underscore is literal\n\
         ORG_WQX-2,tagged only\n",
    )
    .unwrap();

    let duplicates = duplicate_ids(StationSource::File(&file), dir.path())
        .await
        .unwrap();

    assert_eq!(duplicates.len(), 2);
    assert!(duplicates.contains("ORG-1"));
    assert!(duplicates.contains("ORG-2"));
}
