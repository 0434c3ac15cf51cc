use super::{logsumexp2, IbdHmm, Parameters, Sequence, State, TransitionKernel};
use crate::dptable::DPTable;

impl<K: TransitionKernel> IbdHmm<K> {
    /// Return the forward table and the likelihood of the pair,
    /// summarizing all the state paths. In other words, it returns log Pr{Data|params}.
    pub fn forward(&self, seq: &Sequence, params: &Parameters) -> (DPTable, f64) {
        let mut table = DPTable::new(seq.length(), 0f64);
        let lk = self.forward_into(seq, params, &mut table);
        (table, lk)
    }
    /// Forward algorithm on a caller-owned table. The table should have `seq.length() + 1` rows.
    pub fn forward_into(&self, seq: &Sequence, params: &Parameters, table: &mut DPTable) -> f64 {
        for state in State::ALL {
            table[(0, state)] = params.log_initial(state);
        }
        for (s, site) in seq.sites() {
            let trans = self.transitions(site.dist, params);
            for to in State::ALL {
                let emission = site.emission(to);
                let from_non_ibd = table[(s - 1, State::NonIbd)] + trans[0][to as usize];
                let from_ibd = table[(s - 1, State::Ibd)] + trans[1][to as usize];
                table[(s, to)] = logsumexp2(from_non_ibd, from_ibd) + emission;
            }
        }
        let last = table.row(seq.length());
        logsumexp2(last[0], last[1])
    }
    /// Return the backward table and the likelihood of the pair.
    /// The likelihood should be the same as the one from `forward`.
    pub fn backward(&self, seq: &Sequence, params: &Parameters) -> (DPTable, f64) {
        let mut table = DPTable::new(seq.length(), 0f64);
        let lk = self.backward_into(seq, params, &mut table);
        (table, lk)
    }
    pub fn backward_into(&self, seq: &Sequence, params: &Parameters, table: &mut DPTable) -> f64 {
        let length = seq.length();
        table[(length, State::NonIbd)] = 0f64;
        table[(length, State::Ibd)] = 0f64;
        for s in (1..=length).rev() {
            let site = seq.site(s);
            let trans = self.transitions(site.dist, params);
            let to_non_ibd = site.emission(State::NonIbd) + table[(s, State::NonIbd)];
            let to_ibd = site.emission(State::Ibd) + table[(s, State::Ibd)];
            for from in State::ALL {
                let trans = &trans[from as usize];
                table[(s - 1, from)] = logsumexp2(trans[0] + to_non_ibd, trans[1] + to_ibd);
            }
        }
        for state in State::ALL {
            table[(0, state)] += params.log_initial(state);
        }
        let first = table.row(0);
        logsumexp2(first[0], first[1])
    }
    /// Viterbi algorithm. Return the table, the state labels, and the score of the best path.
    /// The label of the `s`-th site is the state with the larger value in the `s`-th row.
    /// The first label is always `State::NonIbd`, as the first row is the boundary.
    pub fn viterbi(&self, seq: &Sequence, params: &Parameters) -> (DPTable, Vec<State>, f64) {
        let mut table = DPTable::new(seq.length(), 0f64);
        let mut path = vec![State::NonIbd; seq.length() + 1];
        let score = self.viterbi_into(seq, params, &mut table, &mut path);
        (table, path, score)
    }
    pub fn viterbi_into(
        &self,
        seq: &Sequence,
        params: &Parameters,
        table: &mut DPTable,
        path: &mut [State],
    ) -> f64 {
        for state in State::ALL {
            table[(0, state)] = params.log_initial(state);
        }
        for (s, site) in seq.sites() {
            let trans = self.transitions(site.dist, params);
            for to in State::ALL {
                let emission = site.emission(to);
                let from_non_ibd = table[(s - 1, State::NonIbd)] + trans[0][to as usize];
                let from_ibd = table[(s - 1, State::Ibd)] + trans[1][to as usize];
                table[(s, to)] = from_non_ibd.max(from_ibd) + emission;
            }
        }
        for (s, label) in path.iter_mut().enumerate().skip(1) {
            *label = match table[(s, State::NonIbd)] > table[(s, State::Ibd)] {
                true => State::NonIbd,
                false => State::Ibd,
            };
        }
        let last = table.row(seq.length());
        last[0].max(last[1])
    }
    /// Posterior probabilities of the states at each site, Pr{state at s|Data}.
    /// If the data is impossible under `params`, every row is zero.
    pub fn posterior(&self, seq: &Sequence, params: &Parameters) -> Vec<[f64; 2]> {
        let (fw, lk) = self.forward(seq, params);
        let (bw, _) = self.backward(seq, params);
        if lk == f64::NEG_INFINITY {
            return vec![[0f64; 2]; seq.length() + 1];
        }
        // The first row of the backward table has the initial distribution folded in.
        let mut posterior = vec![[0f64; 2]; seq.length() + 1];
        for state in State::ALL {
            posterior[0][state as usize] = (bw[(0, state)] - lk).exp();
        }
        for (s, probs) in posterior.iter_mut().enumerate().skip(1) {
            for state in State::ALL {
                probs[state as usize] = (fw[(s, state)] + bw[(s, state)] - lk).exp();
            }
        }
        posterior
    }
}
