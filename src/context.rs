use bitflags::bitflags;
use ndarray::{s, Array2};

bitflags! {
    /// Reset flags
    pub struct Reset: u32 {
        /// Reset state scores
        const STATE = 0x01;
        /// Reset transition scores
        const TRANS = 0x02;
        /// Reset all
        const ALL = 0xFF;
    }
}

/// Context maintains the Viterbi lattice for one label sequence
#[derive(Debug, Clone)]
pub struct Context {
    /// The total number of distinct labels
    pub num_labels: u32,
    /// The number of items in the sequence
    pub num_items: u32,
    /// The number of items the buffers can hold
    cap_items: u32,
    /// State scores
    ///
    /// This is a `[T][L]` matrix whose element `[t][l]` presents total score
    /// of the features associating label #l at #t.
    pub state: Array2<f64>,
    /// Transition scores
    ///
    /// This is a `[L + 1][L]` matrix whose element `[i][j]` represents the
    /// total score of the transition from label #i to label #j. Row `L`
    /// holds the scores of starting the sequence with label #j.
    pub trans: Array2<f64>,
    /// Alpha score matrix
    ///
    /// This is a `[T][L]` matrix whose element `[t][l]` presents the score of
    /// the best path starting at BOS and arriving at (t, l).
    alpha_score: Array2<f64>,
    /// Backward edges
    ///
    /// This is a `[T][L]` matrix whose element `[t][j]` represents the label #i
    /// that yields the maximum score to arrive at (t, j).
    backward_edge: Array2<u32>,
}

impl Context {
    pub fn new(l: u32, t: u32) -> Self {
        let labels = l as usize;
        let mut ctx = Self {
            num_labels: l,
            num_items: 0,
            cap_items: 0,
            state: Array2::zeros((0, labels)),
            trans: Array2::zeros((labels + 1, labels)),
            alpha_score: Array2::zeros((0, labels)),
            backward_edge: Array2::zeros((0, labels)),
        };
        ctx.set_num_items(t);
        ctx
    }

    /// Number of items the buffers can hold without reallocating
    pub fn capacity(&self) -> u32 {
        self.cap_items
    }

    /// Set the sequence length, growing the buffers if needed. Scores of a
    /// previous sequence are left in place until [`reset`](Self::reset).
    pub fn set_num_items(&mut self, t: u32) {
        self.num_items = t;
        if self.cap_items < t {
            let l = self.num_labels as usize;
            let t = t as usize;

            self.state = Array2::zeros((t, l));
            self.alpha_score = Array2::zeros((t, l));
            self.backward_edge = Array2::zeros((t, l));

            self.cap_items = t as u32;
        }
    }

    pub fn reset(&mut self, flag: Reset) {
        let t = self.num_items as usize;

        if flag.contains(Reset::STATE) && t > 0 {
            self.state.slice_mut(s![..t, ..]).fill(0.0);
        }
        if flag.contains(Reset::TRANS) {
            self.trans.fill(0.0);
        }
    }

    /// Find the best scoring label sequence.
    ///
    /// Ties are broken toward the lowest label index. The returned score is
    /// `NEG_INFINITY` when every path goes through a forbidden state.
    pub fn viterbi(&mut self) -> (Vec<u32>, f64) {
        let l = self.num_labels as usize;
        let t = self.num_items as usize;
        if t == 0 {
            return (Vec::new(), 0.0);
        }

        // Compute the scores at (0, *)
        for j in 0..l {
            self.alpha_score[[0, j]] = self.trans[[l, j]] + self.state[[0, j]];
        }

        // Compute the scores at (t, *)
        for time in 1..t {
            // Compute the score of (t, j)
            for j in 0..l {
                let mut max_score = f64::NEG_INFINITY;
                let mut argmax_score = 0;

                for i in 0..l {
                    // Transit from (t-1, i) to (t, j)
                    let score = self.alpha_score[[time - 1, i]] + self.trans[[i, j]];

                    // Store this path if it has the maximum score
                    if max_score < score {
                        max_score = score;
                        argmax_score = i;
                    }
                }

                // Backward link (#t, #j) -> (#t-1, #i)
                self.backward_edge[[time, j]] = argmax_score as u32;

                // Add the state score on (t, j)
                self.alpha_score[[time, j]] = max_score + self.state[[time, j]];
            }
        }

        // Find the node (#T, #i) that reaches EOS with the maximum score
        let mut max_score = f64::NEG_INFINITY;
        let mut labels = vec![0u32; t];

        for (i, &score) in self.alpha_score.row(t - 1).iter().enumerate() {
            if max_score < score {
                max_score = score;
                labels[t - 1] = i as u32;
            }
        }

        // Tag labels by tracing the backward links
        for time in (0..t - 1).rev() {
            let next_label = labels[time + 1] as usize;
            labels[time] = self.backward_edge[[time + 1, next_label]];
        }

        (labels, max_score)
    }
}
