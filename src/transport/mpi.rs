//! One worker per MPI process.

use mpi::datatype::Equivalence;
use mpi::environment::Universe;
use mpi::topology::SystemCommunicator;
use mpi::traits::*;
use mpi::{Rank, Tag};
use tracing::trace;

use super::{tag, AxisMessages, Direction, ExchangeError, Transport};

pub struct MpiTransport {
    world: SystemCommunicator,
    // finalizes MPI on drop, so it has to outlive the communicator
    _universe: Universe,
}

impl MpiTransport {
    /// Initializes MPI. Only one transport can exist per process.
    pub fn initialize() -> Result<Self, ExchangeError> {
        let universe = mpi::initialize()
            .ok_or_else(|| ExchangeError::Backend("MPI was already initialized".to_string()))?;
        let world = universe.world();
        Ok(Self {
            world,
            _universe: universe,
        })
    }

    /// Tears down every rank of the job. A single rank calls this when it
    /// hits a fatal error, so peers blocked in an exchange do not hang.
    pub fn abort(&self, code: i32) -> ! {
        self.world.abort(code)
    }

    fn peer(&self, rank: usize) -> Result<Rank, ExchangeError> {
        if rank < self.size() {
            Ok(rank as Rank)
        } else {
            Err(ExchangeError::UnknownRank {
                rank,
                size: self.size(),
            })
        }
    }
}

impl Transport for MpiTransport {
    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    fn size(&self) -> usize {
        self.world.size() as usize
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

        let pred_rank = self.peer(predecessor)?;
        let succ_rank = self.peer(successor)?;
        let expected_pred = from_predecessor.len();
        let expected_succ = from_successor.len();
        let toward_pred = tag(axis, Direction::Predecessor) as Tag;
        let toward_succ = tag(axis, Direction::Successor) as Tag;

        let world = &self.world;
        let (pred_status, succ_status) = mpi::request::scope(|scope| {
            let pred = world.process_at_rank(pred_rank);
            let succ = world.process_at_rank(succ_rank);

            // Post everything first, then wait on all four requests.
            let send_pred = pred.immediate_send_with_tag(scope, to_predecessor, toward_pred);
            let send_succ = succ.immediate_send_with_tag(scope, to_successor, toward_succ);
            let recv_pred = pred.immediate_receive_into_with_tag(scope, from_predecessor, toward_succ);
            let recv_succ = succ.immediate_receive_into_with_tag(scope, from_successor, toward_pred);

            send_pred.wait_without_status();
            send_succ.wait_without_status();
            (recv_pred.wait(), recv_succ.wait())
        });

        for (peer, status, expected) in [
            (predecessor, pred_status, expected_pred),
            (successor, succ_status, expected_succ),
        ] {
            let actual = status.count(u8::equivalent_datatype()) as usize;
            if actual != expected {
                return Err(ExchangeError::LengthMismatch {
                    peer,
                    expected,
                    actual,
                });
            }
        }
        trace!(rank = self.rank(), ?axis, "mpi exchange complete");
        Ok(())
    }
}
