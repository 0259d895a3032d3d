use crate::error::{Error, ExtractionError};
use crate::extraction::*;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_password_error_detection() {
    assert!(RarExtractor::is_password_error_pub("ERAR_BAD_PASSWORD"));
    assert!(RarExtractor::is_password_error_pub(
        "Archive is encrypted and requires a Password"
    ));
    assert!(!RarExtractor::is_password_error_pub("ERAR_BAD_ARCHIVE"));
    assert!(!RarExtractor::is_password_error_pub("unexpected end of archive"));
}

#[tokio::test]
async fn corrupt_rar_is_reported_as_extraction_failure() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("broken.rar");
    std::fs::write(&archive, b"this is definitely not a RAR archive").unwrap();

    let result = RarExtractor::new().extract(&archive, dir.path()).await;

    match result {
        Err(Error::Extraction(ExtractionError::ExtractionFailed { archive: a, .. })) => {
            assert_eq!(a, archive);
        }
        other => panic!("expected ExtractionFailed, got {other:?}"),
    }

    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1, "a corrupt archive must not produce output");
}

#[tokio::test]
async fn missing_rar_is_an_error_not_a_panic() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("gone.rar");

    let result = RarExtractor::new().extract(&archive, dir.path()).await;
    assert!(matches!(result, Err(Error::Extraction(_))));
}

#[tokio::test]
async fn non_rar_file_is_rejected_without_opening() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("movie.zip");
    std::fs::write(&file, b"PK").unwrap();

    let result = RarExtractor::new().extract(&file, dir.path()).await;
    assert!(matches!(
        result,
        Err(Error::Extraction(ExtractionError::UnsupportedArchive { .. }))
    ));
}

#[test]
fn blocking_extraction_creates_missing_destination_before_opening() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("broken.rar");
    std::fs::write(&archive, b"garbage").unwrap();
    let dest = dir.path().join("out").join("nested");

    let result = RarExtractor::extract_blocking(&archive, &dest);
    assert!(result.is_err());
    assert!(dest.is_dir(), "destination is prepared before the archive is read");
}

#[test]
fn extractor_reports_its_name() {
    assert_eq!(RarExtractor::new().name(), "unrar");
}

#[test]
fn volume_helpers_are_reexported() {
    assert!(RarVolume::parse("a.part01.rar").unwrap().is_first());
    assert!(is_rar_file(Path::new("a.r05")));
}

/// RAR4 archive holding a `Season 1` directory entry, `Season 1\episode.mkv`,
/// `notes.txt` and an entry named `..\..\escape.txt`
const NESTED_RAR: &[u8] = include_bytes!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/fixtures/nested.rar"
));

fn write_nested_rar(dir: &Path) -> std::path::PathBuf {
    let archive = dir.join("show.rar");
    std::fs::write(&archive, NESTED_RAR).unwrap();
    archive
}

#[tokio::test]
async fn real_archive_is_extracted_with_nested_paths() {
    let dir = TempDir::new().unwrap();
    let archive = write_nested_rar(dir.path());

    let written = RarExtractor::new().extract(&archive, dir.path()).await.unwrap();

    assert_eq!(
        written,
        vec![
            dir.path().join("Season 1").join("episode.mkv"),
            dir.path().join("notes.txt"),
            dir.path().join("escape.txt"),
        ]
    );
    assert_eq!(
        std::fs::read(dir.path().join("Season 1").join("episode.mkv")).unwrap(),
        b"nested episode"
    );
    assert_eq!(
        std::fs::read(dir.path().join("notes.txt")).unwrap(),
        b"top level notes"
    );
}

#[tokio::test]
async fn traversal_components_are_stripped_from_entry_names() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("downloads").join("show");
    std::fs::create_dir_all(&dest).unwrap();
    let archive = write_nested_rar(&dest);

    RarExtractor::new().extract(&archive, &dest).await.unwrap();

    assert_eq!(std::fs::read(dest.join("escape.txt")).unwrap(), b"kept inside");
    assert!(!dir.path().join("escape.txt").exists());
    assert!(!dir.path().join("downloads").join("escape.txt").exists());
}

#[tokio::test]
async fn existing_files_are_overwritten() {
    let dir = TempDir::new().unwrap();
    let archive = write_nested_rar(dir.path());
    std::fs::write(dir.path().join("notes.txt"), b"stale partial output").unwrap();

    RarExtractor::new().extract(&archive, dir.path()).await.unwrap();
    assert_eq!(
        std::fs::read(dir.path().join("notes.txt")).unwrap(),
        b"top level notes"
    );

    // A second run over complete output replaces it again
    let again = RarExtractor::new().extract(&archive, dir.path()).await.unwrap();
    assert_eq!(again.len(), 3);
}

#[test]
fn directory_entries_only_create_their_files_parents() {
    let dir = TempDir::new().unwrap();
    let archive = write_nested_rar(dir.path());
    let dest = dir.path().join("out");

    let written = RarExtractor::extract_blocking(&archive, &dest).unwrap();

    assert!(dest.join("Season 1").is_dir());
    assert!(
        written.iter().all(|path| path.is_file()),
        "directory entries are not reported as written files"
    );
}
