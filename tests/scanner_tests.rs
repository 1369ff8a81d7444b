mod common;

use std::fs;
use std::io::Cursor;

use common::{docx, mixed_dump, naive_offsets, DumpBuilder, MAX_CANDIDATE};
use dump_carver::recovery::recover_documents;
use dump_carver::scanner::{collect_offsets, scan_and_extract, SignatureScanner};
use dump_carver::types::DOCX_SIGNATURE;
use dump_carver::{CancelToken, CarveConfig, OutputDir};
use proptest::prelude::*;

fn scan_config(window: u64, workers: usize) -> CarveConfig {
    CarveConfig {
        read_block_size: 1024,
        fragment_window: window,
        max_candidate_size: MAX_CANDIDATE,
        workers: Some(workers),
        ..CarveConfig::default()
    }
}

#[test]
fn test_scan_finds_every_local_header() {
    let dir = tempfile::tempdir().unwrap();
    let (dump, _) = mixed_dump();
    let path = dir.path().join("memory.dmp");
    fs::write(&path, &dump).unwrap();
    let output = OutputDir::create(dir.path().join("fragments")).unwrap();

    let run = scan_and_extract(&path, &scan_config(256, 3), &output, None, None)
        .unwrap()
        .completed()
        .unwrap();

    let expected = naive_offsets(&dump, DOCX_SIGNATURE);
    let found: Vec<u64> = run.scan.offsets.iter().map(|o| o.as_u64()).collect();
    assert_eq!(found, expected);
    assert_eq!(run.scan.bytes_scanned, dump.len() as u64);
    assert!(run.is_complete());
    assert_eq!(run.report.total_offsets(), expected.len());

    // each offset contributes a full 256-byte window, nothing is near the dump end
    let written: u64 = run.report.fragments.iter().map(|f| f.bytes_written).sum();
    assert_eq!(written, 256 * expected.len() as u64);
    for fragment in &run.report.fragments {
        assert_eq!(fs::metadata(&fragment.path).unwrap().len(), fragment.bytes_written);
    }
}

#[test]
fn test_scan_without_markers_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blank.dmp");
    fs::write(&path, vec![0x11u8; 10_000]).unwrap();
    let output = OutputDir::create(dir.path().join("fragments")).unwrap();

    let run = scan_and_extract(&path, &scan_config(256, 2), &output, None, None)
        .unwrap()
        .completed()
        .unwrap();

    assert_eq!(run.scan.signature_count(), 0);
    assert!(run.report.fragments.is_empty());
    assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
}

#[test]
fn test_cancelled_scan_is_abandoned() {
    let dir = tempfile::tempdir().unwrap();
    let (dump, _) = mixed_dump();
    let path = dir.path().join("memory.dmp");
    fs::write(&path, &dump).unwrap();
    let output = OutputDir::create(dir.path().join("fragments")).unwrap();

    let token = CancelToken::new();
    token.cancel();
    let outcome = scan_and_extract(&path, &scan_config(256, 2), &output, Some(token), None).unwrap();
    assert!(outcome.is_abandoned());
}

#[test]
fn test_documents_recovered_from_fragment_file() {
    let dir = tempfile::tempdir().unwrap();
    let (dump, _) = DumpBuilder::new()
        .plant(&docx(&["alpha"]))
        .plant(&docx(&["beta"]))
        .build();
    let path = dir.path().join("memory.dmp");
    fs::write(&path, &dump).unwrap();
    let fragments = OutputDir::create(dir.path().join("fragments")).unwrap();

    let config = scan_config(MAX_CANDIDATE as u64, 1);
    let run = scan_and_extract(&path, &config, &fragments, None, None)
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(run.report.fragments.len(), 1);

    let docs = OutputDir::create(dir.path().join("docs")).unwrap();
    let summary = recover_documents(&run.report.fragments[0].path, &config, &docs, None, None)
        .unwrap()
        .completed()
        .unwrap();

    let texts: Vec<&str> = summary.documents.iter().map(|d| d.fingerprint.as_str()).collect();
    assert_eq!(texts, vec!["alpha", "beta"]);
}

fn haystack_with_markers() -> impl Strategy<Value = Vec<u8>> {
    (
        prop::collection::vec(any::<u8>(), 0..2048),
        prop::collection::vec(any::<prop::sample::Index>(), 0..12),
    )
        .prop_map(|(mut bytes, positions)| {
            if bytes.len() >= DOCX_SIGNATURE.len() {
                let slots = bytes.len() - DOCX_SIGNATURE.len() + 1;
                for position in positions {
                    let at = position.index(slots);
                    bytes[at..at + DOCX_SIGNATURE.len()].copy_from_slice(DOCX_SIGNATURE);
                }
            }
            bytes
        })
}

proptest! {
    #[test]
    fn prop_scanner_matches_naive_search(haystack in haystack_with_markers(), block_size in 4usize..97) {
        let scanner = SignatureScanner::new(Cursor::new(haystack.clone()), DOCX_SIGNATURE, block_size).unwrap();
        let summary = collect_offsets(scanner).unwrap().completed().unwrap();
        let found: Vec<u64> = summary.offsets.iter().map(|o| o.as_u64()).collect();

        prop_assert_eq!(found, naive_offsets(&haystack, DOCX_SIGNATURE));
        prop_assert_eq!(summary.bytes_scanned, haystack.len() as u64);
    }

    #[test]
    fn prop_overlapping_marker_is_leftmost_non_overlapping(len in 0usize..300, block_size in 2usize..40) {
        let haystack = vec![b'a'; len];
        let scanner = SignatureScanner::new(Cursor::new(haystack.clone()), b"aa", block_size).unwrap();
        let summary = collect_offsets(scanner).unwrap().completed().unwrap();
        let found: Vec<u64> = summary.offsets.iter().map(|o| o.as_u64()).collect();

        prop_assert_eq!(found, naive_offsets(&haystack, b"aa"));
    }
}
