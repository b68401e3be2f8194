//! The tokio worker, run on paused time so every delay elapses instantly.

use std::fs;
use std::time::Duration;

use anyhow::Result;
use fair_draw::config::DrawConfig;
use fair_draw::runtime::spawn_engine;
use fair_draw::{codec, DrawError, DrawEvent, Entry, Phase, Roster};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

fn roster(entries: &[(&str, u32)]) -> Roster {
    entries
        .iter()
        .map(|&(name, counter)| Entry::new(name, counter))
        .collect()
}

/// Collects events up to and including the end of the current batch.
async fn until_batch_end(events: &mut UnboundedReceiver<DrawEvent>) -> Result<Vec<DrawEvent>> {
    let mut seen = Vec::new();
    loop {
        let event = timeout(Duration::from_secs(60), events.recv())
            .await?
            .expect("worker should keep the event channel open");
        let done = matches!(
            event,
            DrawEvent::BatchComplete { .. } | DrawEvent::BatchCancelled { .. }
        );
        seen.push(event);
        if done {
            return Ok(seen);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn batch_runs_to_completion() -> Result<()> {
    let (handle, mut events, worker) = spawn_engine(StdRng::seed_from_u64(1));
    handle
        .load_roster(roster(&[("Alice", 0), ("Bob", 0), ("Charlie", 1)]), None)
        .await?;

    handle.start_batch(2).await?;
    let seen = until_batch_end(&mut events).await?;

    let Some(DrawEvent::BatchComplete { winners }) = seen.last() else {
        panic!("expected completion, got {:?}", seen.last());
    };
    assert_eq!(winners.len(), 2);
    assert!(!winners.contains(&"Charlie".to_string()));

    let status = handle.status().await?;
    assert_eq!(status.phase, Phase::Idle);
    assert_eq!(status.roster.counters(), vec![0, 0, 0]);

    handle.shutdown()?;
    worker.await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn second_start_is_rejected_while_busy() -> Result<()> {
    let (handle, mut events, _worker) = spawn_engine(StdRng::seed_from_u64(2));
    handle
        .load_roster(roster(&[("Alice", 0), ("Bob", 0)]), None)
        .await?;

    handle.start_batch(1).await?;
    let err = handle.start_batch(1).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<DrawError>(), Some(DrawError::Busy)));

    let err = handle.reload().await.unwrap_err();
    assert!(matches!(err.downcast_ref::<DrawError>(), Some(DrawError::Busy)));

    let err = handle.set_config(DrawConfig::default()).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<DrawError>(), Some(DrawError::Busy)));

    until_batch_end(&mut events).await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_ticks_and_keeps_counters() -> Result<()> {
    let (handle, mut events, _worker) = spawn_engine(StdRng::seed_from_u64(3));
    handle
        .load_roster(roster(&[("Alice", 0), ("Bob", 0), ("Charlie", 0)]), None)
        .await?;

    handle.start_batch(3).await?;
    // Let a few scan steps through.
    for _ in 0..3 {
        let event = events.recv().await.expect("event");
        assert!(matches!(event, DrawEvent::ScanHighlight { .. }));
    }

    assert!(handle.cancel().await?);
    let seen = until_batch_end(&mut events).await?;
    assert!(matches!(seen.last(), Some(DrawEvent::BatchCancelled { .. })));

    // No stale tick may fire after cancellation.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(events.try_recv().is_err());

    let status = handle.status().await?;
    assert_eq!(status.phase, Phase::Idle);
    assert_eq!(status.roster.counters(), vec![0, 0, 0]);
    assert!(!handle.cancel().await?);

    handle.start_batch(1).await?;
    let seen = until_batch_end(&mut events).await?;
    assert!(matches!(seen.last(), Some(DrawEvent::BatchComplete { .. })));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn empty_roster_and_zero_count_are_invalid() -> Result<()> {
    let (handle, _events, _worker) = spawn_engine(StdRng::seed_from_u64(4));

    let err = handle.start_batch(1).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DrawError>(),
        Some(DrawError::InvalidInput(_))
    ));

    handle.load_roster(roster(&[("Alice", 0)]), None).await?;
    let err = handle.start_batch(0).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DrawError>(),
        Some(DrawError::InvalidInput(_))
    ));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn invalid_config_is_rejected() -> Result<()> {
    let (handle, _events, _worker) = spawn_engine(StdRng::seed_from_u64(5));
    let config = DrawConfig {
        scan_growth_factor: 0.9,
        ..DrawConfig::default()
    };

    let err = handle.set_config(config).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DrawError>(),
        Some(DrawError::Config(_))
    ));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn file_backed_batch_is_saved() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("names.csv");
    fs::write(&path, "\u{feff}Name;Counter\r\nAlice;1\r\nBob;0\r\n")?;

    let (handle, mut events, _worker) = spawn_engine(StdRng::seed_from_u64(6));
    handle.load_file(&path).await?;
    handle.start_batch(1).await?;
    let seen = until_batch_end(&mut events).await?;

    assert_eq!(
        seen.last(),
        Some(&DrawEvent::BatchComplete {
            winners: vec!["Bob".to_string()],
        })
    );
    let saved = codec::load_file(&path)?;
    assert_eq!(saved.counters(), vec![0, 0]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn load_error_is_reported_and_previous_roster_kept() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (handle, mut events, _worker) = spawn_engine(StdRng::seed_from_u64(7));
    handle.load_roster(roster(&[("Alice", 3)]), None).await?;

    let err = handle
        .load_file(dir.path().join("missing.csv"))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DrawError>(),
        Some(DrawError::Load(_))
    ));
    assert!(matches!(
        events.recv().await,
        Some(DrawEvent::LoadError { .. })
    ));
    assert_eq!(handle.status().await?.roster.counters(), vec![3]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn clearing_marks_is_announced() -> Result<()> {
    let (handle, mut events, _worker) = spawn_engine(StdRng::seed_from_u64(8));
    handle.load_roster(roster(&[("Solo", 0)]), None).await?;
    handle.start_batch(1).await?;
    until_batch_end(&mut events).await?;
    assert_eq!(handle.status().await?.marked_winners, vec![0]);

    handle.clear_winner_marks().await?;
    assert_eq!(events.recv().await, Some(DrawEvent::WinnerMarksCleared));
    assert!(handle.status().await?.marked_winners.is_empty());
    Ok(())
}
