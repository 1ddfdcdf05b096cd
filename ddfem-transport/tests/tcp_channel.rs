//! Integration tests for TCP channels over loopback.
//!
//! These tests exercise:
//! - Listener accept + client connect
//! - Header, integer, vector and matrix frames in both directions
//! - Close detection when the peer goes away

use ddfem_core::{Channel, ChannelError, ChannelExt, Frame, Header, Matrix, Opcode, Vector};
use ddfem_transport::{TcpChannel, TcpChannelListener, TransportConfig};
use tokio::task::LocalSet;

async fn connected_pair() -> (TcpChannel, TcpChannel) {
    let listener = TcpChannelListener::bind("127.0.0.1:0", TransportConfig::local_network())
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let (client, server) = tokio::join!(
        TcpChannel::connect(addr, TransportConfig::local_network()),
        listener.accept()
    );
    (client.expect("connect"), server.expect("accept"))
}

#[tokio::test]
async fn test_request_reply_over_loopback() {
    LocalSet::new()
        .run_until(async {
            let (mut shadow_end, mut actor_end) = connected_pair().await;

            shadow_end
                .send_header(Header::new(Opcode::GetTang))
                .expect("send header");

            let header = actor_end.recv_header().await.expect("recv header");
            assert_eq!(header.opcode(), Ok(Opcode::GetTang));

            let tangent = Matrix::from_shape_fn((3, 3), |(i, j)| (i * 3 + j) as f64);
            actor_end.send_matrix(tangent.clone()).expect("send matrix");

            let received = shadow_end.recv_matrix().await.expect("recv matrix");
            assert_eq!(received, tangent);
        })
        .await;
}

#[tokio::test]
async fn test_many_frames_preserve_order() {
    LocalSet::new()
        .run_until(async {
            let (a, mut b) = connected_pair().await;

            for i in 0..100 {
                a.send_frame(Frame::Ints(vec![i])).expect("send");
            }
            a.send_vector(Vector::from(vec![1.0; 4096])).expect("send");

            for i in 0..100 {
                assert_eq!(b.recv_ints().await.expect("recv"), vec![i]);
            }
            let tail = b.recv_vector().await.expect("recv vector");
            assert_eq!(tail.len(), 4096);
            assert_eq!(a.metrics().frames_sent, 101);
            assert_eq!(b.metrics().frames_received, 101);
        })
        .await;
}

#[tokio::test]
async fn test_peer_close_is_observed() {
    LocalSet::new()
        .run_until(async {
            let (a, mut b) = connected_pair().await;
            a.send_status(0).expect("send");
            drop(a);

            assert_eq!(b.recv_status().await.expect("status"), 0);
            assert!(matches!(b.recv_frame().await, Err(ChannelError::Closed)));
        })
        .await;
}

#[tokio::test]
async fn test_oversized_frame_is_refused_locally() {
    LocalSet::new()
        .run_until(async {
            let listener = TcpChannelListener::bind("127.0.0.1:0", TransportConfig::default())
                .await
                .expect("bind");
            let addr = listener.local_addr().expect("local addr");
            let config = TransportConfig::small_models().with_max_payload_size(64);

            let (client, _server) =
                tokio::join!(TcpChannel::connect(addr, config), listener.accept());
            let client = client.expect("connect");

            let result = client.send_vector(Vector::zeros(1000));
            assert!(matches!(result, Err(ChannelError::Wire(_))));
        })
        .await;
}
