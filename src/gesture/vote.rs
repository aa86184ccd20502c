use std::collections::VecDeque;

use super::labels::GestureSet;

/// 直近フレームのラベル集合の多数決
///
/// 最頻の集合がバッファ容量 × acceptance_fraction を超えて出現したときだけそれを返す。
/// 満たなければ空集合（ジェスチャなし）。
#[derive(Debug, Clone, PartialEq)]
pub struct VoteBuffer {
    capacity: usize,
    acceptance_fraction: f32,
    frames: VecDeque<GestureSet>,
}

impl VoteBuffer {
    pub fn new(capacity: usize, acceptance_fraction: f32) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            acceptance_fraction,
            frames: VecDeque::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn push(&mut self, labels: GestureSet) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(labels);
    }

    /// 最頻の集合と出現回数。同数なら先に現れた方
    pub fn mode(&self) -> Option<(&GestureSet, usize)> {
        let mut counts: Vec<(&GestureSet, usize)> = Vec::new();
        for set in &self.frames {
            match counts.iter_mut().find(|(s, _)| *s == set) {
                Some((_, n)) => *n += 1,
                None => counts.push((set, 1)),
            }
        }
        counts
            .into_iter()
            .fold(None, |best: Option<(&GestureSet, usize)>, (s, n)| match best {
                Some((_, m)) if m >= n => best,
                _ => Some((s, n)),
            })
    }

    pub fn stable(&self) -> GestureSet {
        let required = self.acceptance_fraction * self.capacity as f32;
        match self.mode() {
            Some((set, n)) if n as f32 > required => set.clone(),
            _ => GestureSet::new(),
        }
    }
}
