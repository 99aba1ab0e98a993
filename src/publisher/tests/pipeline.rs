use tokio::sync::{mpsc, watch};

use crate::error::PlaytimeError;
use crate::publisher::{CaptureFrame, PublisherPipeline, TimingAssigner};
use crate::types::{GroupId, ObjectId, TimingPolicy};

const MS: i64 = 1_000_000;

fn pipeline(policy: TimingPolicy) -> PublisherPipeline {
    PublisherPipeline::new("audio", TimingAssigner::new(policy, 150 * MS).unwrap())
}

#[test]
fn test_ids_allocated_per_group() {
    let mut p = pipeline(TimingPolicy::PerObject);

    let a = p.next_object(CaptureFrame::new(vec![1], 0)).unwrap();
    let b = p.next_object(CaptureFrame::new(vec![2], 20 * MS)).unwrap();
    let c = p.next_object(CaptureFrame::group_start(vec![3], 40 * MS)).unwrap();

    assert_eq!((a.group_id, a.object_id), (GroupId(0), ObjectId(0)));
    assert_eq!((b.group_id, b.object_id), (GroupId(0), ObjectId(1)));
    assert_eq!((c.group_id, c.object_id), (GroupId(1), ObjectId(0)));
    assert_eq!(c.target_playtime(), Ok(Some(190 * MS)));

    let report = p.report();
    assert_eq!(report.objects, 3);
    assert_eq!(report.groups, 2);
}

#[tokio::test]
async fn test_run_until_capture_ends() {
    let policy = TimingPolicy::GroupAnchor {
        frame_duration_ns: 20 * MS,
    };
    let (frame_tx, frame_rx) = mpsc::channel(16);
    let (object_tx, mut object_rx) = mpsc::channel(16);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(pipeline(policy).run(frame_rx, object_tx, shutdown_rx));

    for i in 0..5 {
        let capture = i * 20 * MS;
        let frame = if i % 3 == 0 {
            CaptureFrame::group_start(vec![0u8; 4], capture)
        } else {
            CaptureFrame::new(vec![0u8; 4], capture)
        };
        frame_tx.send(frame).await.unwrap();
    }
    drop(frame_tx);

    let mut stamped = Vec::new();
    while let Some(object) = object_rx.recv().await {
        stamped.push((object.group_id.0, object.object_id.0, object.target_playtime().unwrap()));
    }
    assert_eq!(
        stamped,
        vec![
            (0, 0, Some(150 * MS)),
            (0, 1, None),
            (0, 2, None),
            (1, 0, Some(210 * MS)),
            (1, 1, None),
        ]
    );

    let report = task.await.unwrap().unwrap();
    assert_eq!(report.objects, 5);
    assert_eq!(report.timing.stamped, 2);
}

#[tokio::test]
async fn test_shutdown_stops_pipeline() {
    let (_frame_tx, frame_rx) = mpsc::channel::<CaptureFrame>(1);
    let (object_tx, _object_rx) = mpsc::channel(1);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(pipeline(TimingPolicy::PerObject).run(frame_rx, object_tx, shutdown_rx));
    shutdown_tx.send(true).unwrap();

    let report = task.await.unwrap().unwrap();
    assert_eq!(report.objects, 0);
}

#[tokio::test]
async fn test_transport_closed_is_error() {
    let (frame_tx, frame_rx) = mpsc::channel(1);
    let (object_tx, object_rx) = mpsc::channel(1);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    drop(object_rx);

    let task = tokio::spawn(pipeline(TimingPolicy::PerObject).run(frame_rx, object_tx, shutdown_rx));
    frame_tx.send(CaptureFrame::new(vec![1], 0)).await.unwrap();

    assert!(matches!(
        task.await.unwrap(),
        Err(PlaytimeError::Transport { .. })
    ));
}
