//! Progress channel behavior against a scripted TCP counterparty

use seqscope::io::DataSource;
use seqscope::pipeline::Pipeline;
use seqscope::progress::{
    AnalysisStatus, ChannelConfig, ProgressChannel, ProgressEvent, WireMessage,
};
use seqscope::SeqscopeError;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn fast_config() -> ChannelConfig {
    ChannelConfig {
        base_delay: Duration::from_millis(10),
        max_reconnect_attempts: 2,
        resubscribe_on_reconnect: false,
    }
}

fn event(job_id: &str, progress: u8) -> ProgressEvent {
    ProgressEvent {
        job_id: job_id.to_string(),
        status: AnalysisStatus::Clustering,
        progress,
        stage: "Clustering records".to_string(),
        message: String::new(),
        data: None,
    }
}

async fn write_event(half: &mut OwnedWriteHalf, event: &ProgressEvent) {
    let mut line =
        serde_json::to_string(&WireMessage::AnalysisProgress(event.clone())).unwrap();
    line.push('\n');
    half.write_all(line.as_bytes()).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn subscribe_mirrors_control_message_and_dispatches_in_order() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let channel = ProgressChannel::connect(&addr, ChannelConfig::default()).await.unwrap();
    let (stream, _) = listener.accept().await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = channel.subscribe("job-1", move |e: &ProgressEvent| {
        let _ = tx.send(e.clone());
    });

    let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
    let control: WireMessage = serde_json::from_str(&line).unwrap();
    assert_eq!(control, WireMessage::Subscribe { job_id: "job-1".to_string() });

    for progress in [10u8, 30, 50] {
        write_event(&mut write_half, &event("job-1", progress)).await;
    }
    for expected in [10u8, 30, 50] {
        let received = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(received.progress, expected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unsubscribe_stops_one_job_without_affecting_others() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let channel = ProgressChannel::connect(&addr, ChannelConfig::default()).await.unwrap();
    let (stream, _) = listener.accept().await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let (tx_a, mut rx_a) = mpsc::unbounded_channel();
    let sub_a = channel.subscribe("job-a", move |e: &ProgressEvent| {
        let _ = tx_a.send(e.clone());
    });
    let (tx_b, mut rx_b) = mpsc::unbounded_channel();
    let _sub_b = channel.subscribe("job-b", move |e: &ProgressEvent| {
        let _ = tx_b.send(e.clone());
    });

    // Two subscribe control messages, then the unsubscribe mirror
    for _ in 0..2 {
        timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
    }
    sub_a.unsubscribe();
    let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
    let control: WireMessage = serde_json::from_str(&line).unwrap();
    assert_eq!(control, WireMessage::Unsubscribe { job_id: "job-a".to_string() });

    write_event(&mut write_half, &event("job-a", 50)).await;
    write_event(&mut write_half, &event("job-b", 70)).await;

    // job-b's event arrives; dispatch is FIFO in one task, so by now the
    // job-a event has already been dropped on the floor.
    let received = timeout(WAIT, rx_b.recv()).await.unwrap().unwrap();
    assert_eq!(received.job_id, "job-b");
    assert!(rx_a.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panicking_callback_does_not_block_later_callbacks() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let channel = ProgressChannel::connect(&addr, ChannelConfig::default()).await.unwrap();
    let (stream, _) = listener.accept().await.unwrap();
    let (_read_half, mut write_half) = stream.into_split();

    let _sub_panicky = channel.subscribe("job-1", |_e: &ProgressEvent| {
        panic!("callback exploded");
    });
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub_ok = channel.subscribe("job-1", move |e: &ProgressEvent| {
        let _ = tx.send(e.clone());
    });

    write_event(&mut write_half, &event("job-1", 30)).await;
    let received = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(received.progress, 30);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn send_fails_cleanly_after_disconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let channel = ProgressChannel::connect(&addr, ChannelConfig::default()).await.unwrap();
    let (_stream, _) = listener.accept().await.unwrap();

    assert!(channel.send(&event("job-1", 10)));
    channel.disconnect();
    assert!(!channel.send(&event("job-1", 30)));
    assert!(!channel.is_connected());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn exhausted_reconnect_budget_notifies_error_observers() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let channel = ProgressChannel::connect(&addr, fast_config()).await.unwrap();
    let (stream, _) = listener.accept().await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _observer = channel.on_error(move |err: &SeqscopeError| {
        let _ = tx.send(err.to_string());
    });

    // Kill the connection and the listener so every reconnect is refused
    let started = Instant::now();
    drop(stream);
    drop(listener);

    let message = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert!(message.contains("2 reconnect attempts"), "got: {message}");
    // Linear backoff: attempts waited 10ms then 20ms before giving up
    assert!(started.elapsed() >= Duration::from_millis(30));
    assert!(!channel.is_connected());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reconnect_replays_subscriptions_when_configured() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let config = ChannelConfig {
        base_delay: Duration::from_millis(10),
        max_reconnect_attempts: 5,
        resubscribe_on_reconnect: true,
    };
    let channel = ProgressChannel::connect(&addr, config).await.unwrap();
    let (stream, _) = listener.accept().await.unwrap();
    let (read_half, _write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = channel.subscribe("job-1", move |e: &ProgressEvent| {
        let _ = tx.send(e.clone());
    });
    let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
    assert!(line.contains("subscribe"));

    // Drop the first connection; the listener stays up for the reconnect
    drop(lines);
    drop(_write_half);

    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
    let control: WireMessage = serde_json::from_str(&line).unwrap();
    assert_eq!(control, WireMessage::Subscribe { job_id: "job-1".to_string() });

    write_event(&mut write_half, &event("job-1", 85)).await;
    let received = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(received.progress, 85);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pipeline_events_reach_subscriber_through_counterparty() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let channel = ProgressChannel::connect(&addr, ChannelConfig::default()).await.unwrap();
    let (stream, _) = listener.accept().await.unwrap();
    let (read_half, mut write_half) = stream.into_split();

    // Counterparty fans analysis_progress lines straight back and swallows
    // control messages, standing in for the server-side fan-out.
    tokio::spawn(async move {
        let mut lines = BufReader::new(read_half).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.contains("analysis_progress") {
                let mut echoed = line;
                echoed.push('\n');
                if write_half.write_all(echoed.as_bytes()).await.is_err() {
                    break;
                }
            }
        }
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = channel.subscribe("job-e2e", move |e: &ProgressEvent| {
        let _ = tx.send(e.clone());
    });

    let publisher = channel.clone();
    tokio::task::spawn_blocking(move || {
        let pipeline = Pipeline::new(publisher);
        let source = DataSource::from_bytes("@R1\nGGCC\n+\nIIII".as_bytes());
        pipeline.run("job-e2e", &source).unwrap();
    })
    .await
    .unwrap();

    let mut events = Vec::new();
    loop {
        let event = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        let done = event.status == AnalysisStatus::Complete;
        events.push(event);
        if done {
            break;
        }
    }
    assert_eq!(events.len(), 6);
    assert!(events.iter().all(|e| e.job_id == "job-e2e"));
    assert!(events.windows(2).all(|w| w[0].progress <= w[1].progress));
    assert_eq!(events.first().unwrap().progress, 10);
    assert_eq!(events.last().unwrap().progress, 100);
}
