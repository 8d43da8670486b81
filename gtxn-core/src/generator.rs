//! Round-Session Generator (spec §4.6): per-client stream of
//! `(roundId, txnType, amount)` events in 3-5-transaction bursts before
//! rotating to a new round.

use crate::model::{Amount, TxnType};

const TYPE_CYCLE: [TxnType; 5] = [
    TxnType::Bet,
    TxnType::Win,
    TxnType::Bonus,
    TxnType::Rake,
    TxnType::Jackpot,
];

/// One generated event: the round to append to, the transaction type, and
/// the amount.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedEvent {
    pub round_id: String,
    pub txn_type: TxnType,
    pub amount: Amount,
}

/// Produces the infinite per-client event stream described in spec §4.6.
/// `runTag` and `clientId` are fixed at construction; `roundId` rotates
/// every 3-5 transactions following `rand`'s thread-local RNG for both the
/// burst length and the amount jitter.
pub struct RoundSessionGenerator {
    run_tag: String,
    client_id: u32,
    local_round_counter: u64,
    txn_ordinal_in_round: u32,
    burst_size: u32,
    type_cursor: usize,
}

impl RoundSessionGenerator {
    pub fn new(run_tag: impl Into<String>, client_id: u32) -> Self {
        let mut gen = RoundSessionGenerator {
            run_tag: run_tag.into(),
            client_id,
            local_round_counter: 0,
            txn_ordinal_in_round: 0,
            burst_size: 0,
            type_cursor: 0,
        };
        gen.start_new_round();
        gen
    }

    fn start_new_round(&mut self) {
        use rand::Rng;
        self.local_round_counter += 1;
        self.txn_ordinal_in_round = 0;
        self.burst_size = rand::thread_rng().gen_range(3..=5);
    }

    fn current_round_id(&self) -> String {
        format!(
            "{}-client{}-round{}",
            self.run_tag, self.client_id, self.local_round_counter
        )
    }

    /// Produces the next event, rotating to a new round once the current
    /// burst is exhausted.
    pub fn next_event(&mut self) -> GeneratedEvent {
        if self.txn_ordinal_in_round >= self.burst_size {
            self.start_new_round();
        }

        let round_id = self.current_round_id();
        let txn_type = TYPE_CYCLE[self.type_cursor % TYPE_CYCLE.len()];
        self.type_cursor += 1;

        // `10.0 + i * 5.0 + U[0, 50)` with `i` the ordinal within the round.
        use rand::Rng;
        let jitter: f64 = rand::thread_rng().gen_range(0.0..50.0);
        let dollars = 10.0 + (self.txn_ordinal_in_round as f64) * 5.0 + jitter;
        let amount = Amount::from_dollars(dollars);

        self.txn_ordinal_in_round += 1;

        GeneratedEvent {
            round_id,
            txn_type,
            amount,
        }
    }
}
