//! Myers O(ND) shortest edit script over lines
//!
//! The edit graph walk is phrased over diagonals `k = x - y`. A step
//! either enters a diagonal from above (an insertion, x unchanged) or
//! from the left (a deletion, x advances), then slides down the free
//! diagonal run of matching lines. The backward pass replays those
//! decisions from the goal corner and emits the script directly.

use derive_new::new;

/// A numbered source line (1-based)
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub(crate) struct Line {
    pub number: usize,
    pub text: String,
}

/// One step of the edit script
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Edit {
    Delete { line: Line },
    Insert { line: Line },
    Equal { line_a: Line, line_b: Line },
}

impl Edit {
    pub fn is_change(&self) -> bool {
        !matches!(self, Edit::Equal { .. })
    }
}

/// Furthest-reaching x per diagonal, indexed by signed diagonal number
#[derive(Debug, Clone)]
struct Frontier {
    reach: Vec<isize>,
    center: usize,
}

impl Frontier {
    fn new(span: usize) -> Self {
        Frontier {
            reach: vec![0; 2 * span + 1],
            center: span,
        }
    }

    fn get(&self, diagonal: isize) -> isize {
        self.reach[(self.center as isize + diagonal) as usize]
    }

    fn set(&mut self, diagonal: isize, x: isize) {
        self.reach[(self.center as isize + diagonal) as usize] = x;
    }

    /// Whether the best path enters `diagonal` at step `step` from the
    /// diagonal above (an insertion) rather than from the left (a
    /// deletion). Ties favor the deletion, which puts removals before
    /// insertions in the script.
    fn enters_from_above(&self, diagonal: isize, step: isize) -> bool {
        diagonal == -step
            || (diagonal != step && self.get(diagonal - 1) < self.get(diagonal + 1))
    }
}

/// Myers diff over two line sequences
#[derive(Debug)]
pub(crate) struct Myers {
    a: Vec<Line>,
    b: Vec<Line>,
}

impl Myers {
    pub fn new(a: Vec<String>, b: Vec<String>) -> Self {
        let number = |lines: Vec<String>| {
            lines
                .into_iter()
                .enumerate()
                .map(|(index, text)| Line::new(index + 1, text))
                .collect::<Vec<_>>()
        };

        Myers {
            a: number(a),
            b: number(b),
        }
    }

    /// Forward search. Snapshot `history[s]` holds the frontier as it
    /// stood before step `s`, which is what the backward pass needs to
    /// re-derive each step's entry decision.
    fn forward_history(&self) -> Vec<Frontier> {
        let goal_x = self.a.len() as isize;
        let goal_y = self.b.len() as isize;

        let mut frontier = Frontier::new((goal_x + goal_y) as usize);
        let mut history = Vec::new();

        for step in 0..=(goal_x + goal_y) {
            history.push(frontier.clone());

            let mut diagonal = -step;
            while diagonal <= step {
                let mut x = if frontier.enters_from_above(diagonal, step) {
                    frontier.get(diagonal + 1)
                } else {
                    frontier.get(diagonal - 1) + 1
                };
                let mut y = x - diagonal;

                // slide down the run of matching lines
                while x < goal_x && y < goal_y && self.a[x as usize].text == self.b[y as usize].text
                {
                    x += 1;
                    y += 1;
                }

                frontier.set(diagonal, x);
                if x >= goal_x && y >= goal_y {
                    return history;
                }

                diagonal += 2;
            }
        }

        history
    }

    /// The full edit script, oldest line first
    pub fn edits(&self) -> Vec<Edit> {
        if self.a.is_empty() && self.b.is_empty() {
            return Vec::new();
        }

        let history = self.forward_history();
        let mut script = Vec::new();

        let mut x = self.a.len() as isize;
        let mut y = self.b.len() as isize;

        // walk the steps backwards, emitting each step's snake and then
        // the single insertion or deletion that opened it
        for (step, frontier) in history.iter().enumerate().rev() {
            let step = step as isize;

            if step == 0 {
                // only a leading snake remains
                while x > 0 && y > 0 {
                    script.push(Edit::Equal {
                        line_a: self.a[(x - 1) as usize].clone(),
                        line_b: self.b[(y - 1) as usize].clone(),
                    });
                    x -= 1;
                    y -= 1;
                }
                break;
            }

            let diagonal = x - y;
            let from_above = frontier.enters_from_above(diagonal, step);
            let source_diagonal = if from_above { diagonal + 1 } else { diagonal - 1 };
            let source_x = frontier.get(source_diagonal);
            let source_y = source_x - source_diagonal;

            // position right after this step's insertion or deletion
            let (entry_x, entry_y) = if from_above {
                (source_x, source_y + 1)
            } else {
                (source_x + 1, source_y)
            };

            while x > entry_x && y > entry_y {
                script.push(Edit::Equal {
                    line_a: self.a[(x - 1) as usize].clone(),
                    line_b: self.b[(y - 1) as usize].clone(),
                });
                x -= 1;
                y -= 1;
            }

            if from_above {
                script.push(Edit::Insert {
                    line: self.b[source_y as usize].clone(),
                });
            } else {
                script.push(Edit::Delete {
                    line: self.a[source_x as usize].clone(),
                });
            }

            (x, y) = (source_x, source_y);
        }

        script.reverse();
        script
    }
}
