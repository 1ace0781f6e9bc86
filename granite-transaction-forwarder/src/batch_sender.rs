use std::net::{SocketAddr, UdpSocket};

use crate::errors::ForwarderResult;

/// Pushes wire-serialized transactions to a leader's TPU endpoint.
pub trait BatchSender: Send + Sync {
    fn send_wire_batch(
        &self,
        wire_transactions: &[&[u8]],
        addr: &SocketAddr,
    ) -> ForwarderResult<()>;
}

pub struct UdpBatchSender {
    socket: UdpSocket,
}

impl UdpBatchSender {
    pub fn new() -> ForwarderResult<Self> {
        Ok(Self {
            socket: UdpSocket::bind("0.0.0.0:0")?,
        })
    }
}

impl BatchSender for UdpBatchSender {
    fn send_wire_batch(
        &self,
        wire_transactions: &[&[u8]],
        addr: &SocketAddr,
    ) -> ForwarderResult<()> {
        for wire_transaction in wire_transactions {
            self.socket.send_to(wire_transaction, addr)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_udp_batch_sender_delivers_datagrams() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let addr = receiver.local_addr().unwrap();

        let sender = UdpBatchSender::new().unwrap();
        sender
            .send_wire_batch(&[b"one".as_slice(), b"two".as_slice()], &addr)
            .unwrap();

        let mut buf = [0u8; 16];
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"one");
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"two");
    }
}
