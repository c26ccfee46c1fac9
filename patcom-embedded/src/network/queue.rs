use core::net::SocketAddrV4;

use alloc::vec::Vec;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

pub const PACKET_QUEUE_DEPTH: usize = 8;

/// Port a packet arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketChannel {
    Discovery,
    Config,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPacket {
    pub channel: PacketChannel,
    pub source: SocketAddrV4,
    pub data: Vec<u8>,
}

/// Bounded hand-off from socket receive callbacks to the control loop
pub struct PacketQueue {
    channel: Channel<CriticalSectionRawMutex, InboundPacket, PACKET_QUEUE_DEPTH>,
}

impl Default for PacketQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Queue a packet. When the loop is behind the packet is dropped and false returned.
    pub fn push(&self, packet: InboundPacket) -> bool {
        match self.channel.try_send(packet) {
            Ok(()) => true,
            Err(_) => {
                log::warn!("Packet queue full, dropping packet");
                false
            }
        }
    }

    pub fn pop(&self) -> Option<InboundPacket> {
        self.channel.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use core::net::Ipv4Addr;

    use super::*;

    fn packet(n: u8) -> InboundPacket {
        InboundPacket {
            channel: PacketChannel::Discovery,
            source: SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, n), 4000),
            data: alloc::vec![n],
        }
    }

    #[test]
    fn test_queue_is_fifo_and_bounded() {
        let queue = PacketQueue::new();
        for n in 0..PACKET_QUEUE_DEPTH as u8 {
            assert!(queue.push(packet(n)));
        }
        assert!(!queue.push(packet(99)));
        assert_eq!(queue.len(), PACKET_QUEUE_DEPTH);

        assert_eq!(queue.pop(), Some(packet(0)));
        assert_eq!(queue.pop(), Some(packet(1)));
    }
}
