use rangestitch::{ByteRange, DirSegmentSource, MergeConfig, MergeError, Merger};
use std::path::Path;
use tempfile::tempdir;

fn pattern(range: ByteRange, seed: u8) -> Vec<u8> {
    (0..range.len()).map(|i| seed.wrapping_add(i as u8)).collect()
}

async fn put_segment(dir: &Path, range: ByteRange, seed: u8) -> Vec<u8> {
    let data = pattern(range, seed);
    tokio::fs::write(dir.join(range.segment_name()), &data).await.unwrap();
    data
}

fn three_ranges() -> [ByteRange; 3] {
    [ByteRange::new(0, 99), ByteRange::new(100, 199), ByteRange::new(200, 299)]
}

#[tokio::test]
async fn merges_segments_at_their_offsets() {
    let work = tempdir().unwrap();
    let out = tempdir().unwrap();
    let target = out.path().join("file.bin");
    let ranges = three_ranges();

    let mut expected = Vec::new();
    for (i, r) in ranges.iter().enumerate() {
        expected.extend(put_segment(work.path(), *r, i as u8 * 50).await);
    }

    let outcome = Merger::default().merge_dir(&ranges, work.path(), &target).await.unwrap();
    assert!(outcome.is_complete());
    assert_eq!(outcome.merged, ranges.to_vec());

    let data = tokio::fs::read(&target).await.unwrap();
    assert_eq!(data.len(), 300);
    assert_eq!(data, expected);
    for r in ranges {
        assert!(!work.path().join(r.segment_name()).exists());
    }
}

#[tokio::test]
async fn missing_segment_stays_pending_and_others_land() {
    let work = tempdir().unwrap();
    let out = tempdir().unwrap();
    let target = out.path().join("file.bin");
    let [a, b, c] = three_ranges();

    let da = put_segment(work.path(), a, 1).await;
    let dc = put_segment(work.path(), c, 7).await;

    let outcome = Merger::default().merge_dir(&[a, b, c], work.path(), &target).await.unwrap();
    assert_eq!(outcome.pending, vec![b]);

    let data = tokio::fs::read(&target).await.unwrap();
    assert_eq!(&data[0..100], &da[..]);
    assert_eq!(&data[200..300], &dc[..]);
}

#[tokio::test]
async fn retrying_pending_matches_single_pass() {
    let ranges = three_ranges();

    let once_work = tempdir().unwrap();
    let once_out = tempdir().unwrap();
    for (i, r) in ranges.iter().enumerate() {
        put_segment(once_work.path(), *r, i as u8).await;
    }
    let once_target = once_out.path().join("once.bin");
    Merger::default().merge_dir(&ranges, once_work.path(), &once_target).await.unwrap();

    let work = tempdir().unwrap();
    let out = tempdir().unwrap();
    let target = out.path().join("twice.bin");
    put_segment(work.path(), ranges[0], 0).await;
    put_segment(work.path(), ranges[2], 2).await;

    let merger = Merger::default();
    let first = merger.merge_dir(&ranges, work.path(), &target).await.unwrap();
    assert_eq!(first.pending, vec![ranges[1]]);

    put_segment(work.path(), ranges[1], 1).await;
    let second = merger.merge_dir(&first.pending, work.path(), &target).await.unwrap();
    assert!(second.pending.is_empty());
    assert_eq!(second.merged, vec![ranges[1]]);

    assert_eq!(
        tokio::fs::read(&target).await.unwrap(),
        tokio::fs::read(&once_target).await.unwrap()
    );
}

#[tokio::test]
async fn keep_segments_leaves_files() {
    let work = tempdir().unwrap();
    let target = work.path().join("out").join("file.bin");
    let r = ByteRange::new(0, 9);
    put_segment(work.path(), r, 3).await;

    let merger = Merger::new(MergeConfig { remove_merged: false, ..MergeConfig::default() });
    let outcome = merger.merge_dir(&[r], work.path(), &target).await.unwrap();
    assert!(outcome.is_complete());
    assert!(work.path().join("0-9").exists());
}

#[tokio::test]
async fn empty_file_sentinel_merges_to_empty_target() {
    let work = tempdir().unwrap();
    let out = tempdir().unwrap();
    let target = out.path().join("empty.bin");
    tokio::fs::write(work.path().join("0-0"), b"").await.unwrap();

    let outcome = Merger::default()
        .merge_dir(&[ByteRange::EMPTY], work.path(), &target)
        .await
        .unwrap();
    assert!(outcome.is_complete());
    assert_eq!(tokio::fs::metadata(&target).await.unwrap().len(), 0);
}

#[tokio::test]
async fn unopenable_target_fails_the_pass() {
    let work = tempdir().unwrap();
    let r = ByteRange::new(0, 9);
    put_segment(work.path(), r, 0).await;

    // a directory cannot be opened as the target file
    let target = work.path().join("as_dir");
    tokio::fs::create_dir(&target).await.unwrap();

    let err = Merger::default().merge_dir(&[r], work.path(), &target).await.unwrap_err();
    assert!(matches!(err, MergeError::TargetUnavailable { .. }));
    assert!(work.path().join("0-9").exists());
}

#[tokio::test]
async fn listed_segments_feed_a_merge() {
    use rangestitch::SegmentSource;

    let work = tempdir().unwrap();
    let out = tempdir().unwrap();
    let target = out.path().join("file.bin");
    for (i, r) in three_ranges().iter().rev().enumerate() {
        put_segment(work.path(), *r, i as u8).await;
    }

    let source = DirSegmentSource::new(work.path());
    let pending = source.list().await.unwrap();
    assert_eq!(pending, three_ranges().to_vec());

    let outcome = Merger::default().merge(&pending, &source, &target).await.unwrap();
    assert!(outcome.is_complete());
    assert!(source.list().await.unwrap().is_empty());
}
