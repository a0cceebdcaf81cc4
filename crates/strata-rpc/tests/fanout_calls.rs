/// Integration tests for fan-out calls: bounded parallelism, partial
/// results under failure and cancellation, submission-order collection.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use strata_rpc::{
    ClientConfig, ErrorBody, PeerId, ProtocolId, Response, RpcClient, RpcError, RuntimeId, Version,
};
use strata_transport::testing::MemoryTransport;

fn peer(seed: u8) -> PeerId {
    PeerId::from_bytes([seed; 32])
}

fn protocol() -> ProtocolId {
    ProtocolId::new(
        RuntimeId::from_bytes([7; 32]),
        "fanout",
        Version::new(1, 0, 0),
    )
}

fn marker_frame(marker: &str) -> Vec<u8> {
    let payload = rmp_serde::to_vec(marker).expect("encode marker");
    Response::Ok(payload).to_bytes().expect("encode response")
}

#[tokio::test]
async fn collects_all_responses_under_parallelism_bound() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .try_init();

    let transport = Arc::new(MemoryTransport::new());
    for (seed, marker) in [(1, "one"), (2, "two"), (3, "three")] {
        transport.register_fn(peer(seed), move |_frame| async move {
            Some(marker_frame(marker))
        });
    }

    let client = RpcClient::new(transport, protocol(), ClientConfig::new());
    let ctx = CancellationToken::new();

    let (responses, feedbacks): (Vec<String>, _) = client
        .call_multi(&ctx, "who", "x", Duration::from_secs(2), 2)
        .await
        .unwrap();

    // Collected in submission order regardless of completion order.
    assert_eq!(responses, vec!["one", "two", "three"]);
    assert_eq!(feedbacks.len(), 3);

    let served: Vec<_> = feedbacks.iter().filter_map(|f| f.peer_id()).collect();
    assert_eq!(served, vec![peer(1), peer(2), peer(3)]);
    for feedback in feedbacks {
        feedback.record_success();
    }
}

#[tokio::test(start_paused = true)]
async fn never_exceeds_max_parallel_attempts() {
    let transport = Arc::new(MemoryTransport::new());
    let inflight = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    for seed in 1..=5 {
        let inflight = inflight.clone();
        let max_seen = max_seen.clone();
        transport.register_fn(peer(seed), move |_frame| {
            let inflight = inflight.clone();
            let max_seen = max_seen.clone();
            async move {
                let now = inflight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                inflight.fetch_sub(1, Ordering::SeqCst);
                Some(marker_frame("done"))
            }
        });
    }

    let client = RpcClient::new(transport, protocol(), ClientConfig::new());
    let ctx = CancellationToken::new();

    let (responses, _feedbacks): (Vec<String>, _) = client
        .call_multi(&ctx, "slow", "x", Duration::from_secs(30), 2)
        .await
        .unwrap();

    assert_eq!(responses.len(), 5);
    assert!(
        max_seen.load(Ordering::SeqCst) <= 2,
        "worker pool must cap in-flight attempts at 2, saw {}",
        max_seen.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn per_peer_failures_never_fail_the_fanout() {
    let transport = Arc::new(MemoryTransport::new());
    // Peer 1: garbage frame. Peer 2: good answer. Peer 3: remote error.
    transport.register_fn(peer(1), |_frame| async move { Some(vec![0xff, 0x00]) });
    transport.register_fn(peer(2), |_frame| async move { Some(marker_frame("two")) });
    transport.register_fn(peer(3), |_frame| async move {
        let body = ErrorBody {
            module: "test".into(),
            code: 9,
            message: "refused".into(),
        };
        Some(Response::Error(body).to_bytes().expect("encode response"))
    });

    let client = RpcClient::new(transport, protocol(), ClientConfig::new());
    let ctx = CancellationToken::new();

    let (responses, feedbacks): (Vec<String>, _) = client
        .call_multi(&ctx, "who", "x", Duration::from_secs(2), 8)
        .await
        .unwrap();

    assert_eq!(responses, vec!["two"]);
    assert_eq!(feedbacks.len(), 1);
    assert_eq!(feedbacks[0].peer_id(), Some(peer(2)));

    // Failed attempts were scored immediately.
    assert_eq!(client.peer_manager().stats(&peer(1)).unwrap().failures, 1);
    assert_eq!(client.peer_manager().stats(&peer(3)).unwrap().failures, 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_with_partial_results_returns_them() {
    let transport = Arc::new(MemoryTransport::new());
    transport.register_fn(peer(1), |_frame| async move { Some(marker_frame("fast")) });
    transport.register_fn(peer(2), |_frame| async move { None }); // never answers

    let client = RpcClient::new(transport, protocol(), ClientConfig::new());
    let ctx = CancellationToken::new();

    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let (responses, feedbacks): (Vec<String>, _) = client
        .call_multi(&ctx, "who", "x", Duration::from_secs(60), 4)
        .await
        .expect("partial success is not a failure");

    assert_eq!(responses, vec!["fast"]);
    assert_eq!(feedbacks.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_with_no_results_is_an_error() {
    let transport = Arc::new(MemoryTransport::new());
    transport.register_fn(peer(1), |_frame| async move { None });
    transport.register_fn(peer(2), |_frame| async move { None });

    let client = RpcClient::new(transport, protocol(), ClientConfig::new());
    let ctx = CancellationToken::new();

    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let err = client
        .call_multi::<_, String>(&ctx, "who", "x", Duration::from_secs(60), 4)
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Cancelled));
}

#[tokio::test]
async fn empty_peer_set_yields_empty_results() {
    let transport = Arc::new(MemoryTransport::new());
    let client = RpcClient::new(transport, protocol(), ClientConfig::new());
    let ctx = CancellationToken::new();

    let (responses, feedbacks): (Vec<String>, _) = client
        .call_multi(&ctx, "who", "x", Duration::from_secs(2), 4)
        .await
        .unwrap();
    assert!(responses.is_empty());
    assert!(feedbacks.is_empty());
}
