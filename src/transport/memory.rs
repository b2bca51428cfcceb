//! In-process transport: one endpoint per worker thread, wired together
//! with unbounded crossbeam channels.

use std::collections::{HashMap, HashSet, VecDeque};

use crossbeam::channel::{unbounded, Receiver, Sender};
use tracing::trace;

use super::{tag, AxisMessages, Direction, ExchangeError, Transport};

// Sent by an endpoint as it is dropped. Channels are FIFO per sender, so
// once this arrives nothing else from that rank ever will.
const HANGUP: u16 = u16::MAX;

#[derive(Debug)]
struct Envelope {
    source: usize,
    tag: u16,
    payload: Vec<u8>,
}

/// Channel endpoint of one worker.
///
/// Receives match on `(source, tag)`. Messages that arrive before their
/// receive is posted wait in a per-key FIFO, which keeps the
/// non-overtaking order MPI guarantees between a pair of ranks.
///
/// Dropping an endpoint (a worker finishing, failing or panicking) tells
/// every peer. A receive still waiting on that rank then fails with
/// [`ExchangeError::PeerUnreachable`] instead of blocking forever.
#[derive(Debug)]
pub struct MemoryTransport {
    rank: usize,
    size: usize,
    // None at our own index: self-sends go straight to `pending`
    peers: Vec<Option<Sender<Envelope>>>,
    inbox: Receiver<Envelope>,
    pending: HashMap<(usize, u16), VecDeque<Vec<u8>>>,
    departed: HashSet<usize>,
}

impl MemoryTransport {
    /// Endpoints for `size` workers, index = rank.
    pub fn mesh(size: usize) -> Vec<MemoryTransport> {
        let (senders, inboxes): (Vec<_>, Vec<_>) = (0..size).map(|_| unbounded()).unzip();
        inboxes
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| MemoryTransport {
                rank,
                size,
                peers: senders
                    .iter()
                    .enumerate()
                    .map(|(peer, tx)| (peer != rank).then(|| tx.clone()))
                    .collect(),
                inbox,
                pending: HashMap::new(),
                departed: HashSet::new(),
            })
            .collect()
    }

    fn check_rank(&self, peer: usize) -> Result<(), ExchangeError> {
        if peer < self.size {
            Ok(())
        } else {
            Err(ExchangeError::UnknownRank {
                rank: peer,
                size: self.size,
            })
        }
    }

    fn post(&mut self, peer: usize, tag: u16, payload: &[u8]) -> Result<(), ExchangeError> {
        self.check_rank(peer)?;
        trace!(rank = self.rank, peer, tag, len = payload.len(), "send");
        match &self.peers[peer] {
            None => {
                self.pending
                    .entry((peer, tag))
                    .or_default()
                    .push_back(payload.to_vec());
                Ok(())
            }
            Some(tx) => tx
                .send(Envelope {
                    source: self.rank,
                    tag,
                    payload: payload.to_vec(),
                })
                .map_err(|_| ExchangeError::PeerUnreachable { peer }),
        }
    }

    fn receive(&mut self, peer: usize, tag: u16, into: &mut [u8]) -> Result<(), ExchangeError> {
        self.check_rank(peer)?;
        let payload = loop {
            if let Some(payload) = self
                .pending
                .get_mut(&(peer, tag))
                .and_then(VecDeque::pop_front)
            {
                break payload;
            }
            if self.departed.contains(&peer) {
                return Err(ExchangeError::PeerUnreachable { peer });
            }
            let envelope = self
                .inbox
                .recv()
                .map_err(|_| ExchangeError::PeerUnreachable { peer })?;
            if envelope.tag == HANGUP {
                self.departed.insert(envelope.source);
                continue;
            }
            self.pending
                .entry((envelope.source, envelope.tag))
                .or_default()
                .push_back(envelope.payload);
        };
        if payload.len() != into.len() {
            return Err(ExchangeError::LengthMismatch {
                peer,
                expected: into.len(),
                actual: payload.len(),
            });
        }
        into.copy_from_slice(&payload);
        trace!(rank = self.rank, peer, tag, "receive");
        Ok(())
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        for tx in self.peers.iter().flatten() {
            // a peer that is already gone needs no notice
            let _ = tx.send(Envelope {
                source: self.rank,
                tag: HANGUP,
                payload: Vec::new(),
            });
        }
    }
}

impl Transport for MemoryTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn exchange(&mut self, messages: AxisMessages<'_>) -> Result<(), ExchangeError> {
        let AxisMessages {
            axis,
            predecessor,
            successor,
            to_predecessor,
            to_successor,
            from_predecessor,
            from_successor,
        } = messages;

        // channel sends never block, so both are in flight before we wait
        self.post(predecessor, tag(axis, Direction::Predecessor), to_predecessor)?;
        self.post(successor, tag(axis, Direction::Successor), to_successor)?;

        self.receive(predecessor, tag(axis, Direction::Successor), from_predecessor)?;
        self.receive(successor, tag(axis, Direction::Predecessor), from_successor)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Axis;
    use std::thread;

    fn swap_with(
        transport: &mut MemoryTransport,
        axis: Axis,
        peer: usize,
        up: &[u8],
        down: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>), ExchangeError> {
        let mut from_pred = vec![0; up.len()];
        let mut from_succ = vec![0; down.len()];
        transport.exchange(AxisMessages {
            axis,
            predecessor: peer,
            successor: peer,
            to_predecessor: up,
            to_successor: down,
            from_predecessor: &mut from_pred,
            from_successor: &mut from_succ,
        })?;
        Ok((from_pred, from_succ))
    }

    #[test]
    fn two_workers_swap_both_directions() {
        let mut endpoints = MemoryTransport::mesh(2);
        let mut second = endpoints.pop().unwrap();
        let mut first = endpoints.pop().unwrap();

        let handle = thread::spawn(move || swap_with(&mut second, Axis::Y, 0, &[3], &[4]));
        let (from_pred, from_succ) = swap_with(&mut first, Axis::Y, 1, &[1], &[2]).unwrap();
        let (second_pred, second_succ) = handle.join().unwrap().unwrap();

        // what rank 1 sent toward its successor lands in rank 0's predecessor slot
        assert_eq!(from_pred, vec![4]);
        assert_eq!(from_succ, vec![3]);
        assert_eq!(second_pred, vec![2]);
        assert_eq!(second_succ, vec![1]);
    }

    #[test]
    fn early_messages_wait_for_their_receive() {
        let mut endpoints = MemoryTransport::mesh(2);
        let mut second = endpoints.pop().unwrap();
        let mut first = endpoints.pop().unwrap();

        // rank 1 runs ahead: columns go out before rank 0 has asked for rows
        let handle = thread::spawn(move || {
            let rows = swap_with(&mut second, Axis::Y, 0, &[5], &[6])?;
            let cols = swap_with(&mut second, Axis::X, 0, &[7, 7], &[8, 8])?;
            Ok::<_, ExchangeError>((rows, cols))
        });
        let rows = swap_with(&mut first, Axis::Y, 1, &[0], &[0]).unwrap();
        let cols = swap_with(&mut first, Axis::X, 1, &[0, 0], &[0, 0]).unwrap();
        handle.join().unwrap().unwrap();

        assert_eq!(rows, (vec![6], vec![5]));
        assert_eq!(cols, (vec![8, 8], vec![7, 7]));
    }

    #[test]
    fn self_exchange_wraps() {
        let mut solo = MemoryTransport::mesh(1).pop().unwrap();
        let (from_pred, from_succ) = swap_with(&mut solo, Axis::X, 0, &[1, 0], &[0, 1]).unwrap();
        assert_eq!(from_pred, vec![0, 1]);
        assert_eq!(from_succ, vec![1, 0]);
    }

    #[test]
    fn vanished_peer_is_fatal() {
        let mut endpoints = MemoryTransport::mesh(2);
        drop(endpoints.pop());
        let mut first = endpoints.pop().unwrap();
        assert_eq!(
            swap_with(&mut first, Axis::Y, 1, &[1], &[1]),
            Err(ExchangeError::PeerUnreachable { peer: 1 })
        );
    }

    #[test]
    fn peer_dropping_mid_run_wakes_blocked_receivers() {
        let mut endpoints = MemoryTransport::mesh(3);
        let third = endpoints.pop().unwrap();
        let _second = endpoints.pop().unwrap();
        let mut first = endpoints.pop().unwrap();

        // rank 2 leaves without sending anything while rank 1 stays alive,
        // so rank 0's inbox never disconnects on its own
        let handle = thread::spawn(move || swap_with(&mut first, Axis::X, 2, &[1], &[1]));
        drop(third);
        assert_eq!(
            handle.join().unwrap(),
            Err(ExchangeError::PeerUnreachable { peer: 2 })
        );
    }

    #[test]
    fn unknown_rank_is_rejected() {
        let mut solo = MemoryTransport::mesh(1).pop().unwrap();
        assert_eq!(
            swap_with(&mut solo, Axis::Y, 3, &[1], &[1]),
            Err(ExchangeError::UnknownRank { rank: 3, size: 1 })
        );
    }
}
