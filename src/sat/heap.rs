use crate::Var;

/// A binary max-heap of variables ordered by their activity.
///
/// The heap keeps, for every variable, its position in the underlying array
/// so that membership tests and activity updates run in O(1)/O(log n). The
/// activity table lives in the solver and is passed to each operation.
#[derive(Default)]
pub(crate) struct VarHeap {
    heap: Vec<Var>,
    indices: Vec<i32>,
}

impl VarHeap {
    pub fn grow_to(&mut self, n_vars: usize) {
        while self.indices.len() < n_vars {
            self.indices.push(-1);
        }
    }

    #[must_use]
    pub fn contains(&self, v: Var) -> bool {
        self.indices[v] >= 0
    }

    pub fn clear(&mut self) {
        for v in &self.heap {
            self.indices[*v] = -1;
        }
        self.heap.clear();
    }

    pub fn insert(&mut self, v: Var, activity: &[f64]) {
        debug_assert!(!self.contains(v));
        self.indices[v] = i32::try_from(self.heap.len()).expect("heap overflows i32 indices");
        self.heap.push(v);
        self.percolate_up(self.heap.len() - 1, activity);
    }

    /// Restores the heap property after the activity of `v` increased.
    pub fn bump(&mut self, v: Var, activity: &[f64]) {
        if self.contains(v) {
            let i = usize::try_from(self.indices[v]).expect("negative heap index");
            self.percolate_up(i, activity);
        }
    }

    pub fn pop_max(&mut self) -> Option<Var> {
        let top = *self.heap.first()?;
        let last = self.heap.pop().expect("non-empty heap");
        self.indices[top] = -1;
        if !self.heap.is_empty() {
            self.heap[0] = last;
            self.indices[last] = 0;
        }
        Some(top)
    }

    /// Second half of [`pop_max`](Self::pop_max): must be called with the
    /// activity table once the root has been replaced.
    pub fn sift_root(&mut self, activity: &[f64]) {
        if !self.heap.is_empty() {
            self.percolate_down(0, activity);
        }
    }

    fn percolate_up(&mut self, mut i: usize, activity: &[f64]) {
        let v = self.heap[i];
        while i > 0 {
            let parent = (i - 1) >> 1;
            if activity[self.heap[parent]] >= activity[v] {
                break;
            }
            self.heap[i] = self.heap[parent];
            self.indices[self.heap[i]] = i32::try_from(i).expect("heap index overflow");
            i = parent;
        }
        self.heap[i] = v;
        self.indices[v] = i32::try_from(i).expect("heap index overflow");
    }

    fn percolate_down(&mut self, mut i: usize, activity: &[f64]) {
        let v = self.heap[i];
        loop {
            let left = (i << 1) + 1;
            if left >= self.heap.len() {
                break;
            }
            let right = left + 1;
            let child = if right < self.heap.len()
                && activity[self.heap[right]] > activity[self.heap[left]]
            {
                right
            } else {
                left
            };
            if activity[self.heap[child]] <= activity[v] {
                break;
            }
            self.heap[i] = self.heap[child];
            self.indices[self.heap[i]] = i32::try_from(i).expect("heap index overflow");
            i = child;
        }
        self.heap[i] = v;
        self.indices[v] = i32::try_from(i).expect("heap index overflow");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pop(heap: &mut VarHeap, activity: &[f64]) -> Option<Var> {
        let v = heap.pop_max();
        heap.sift_root(activity);
        v
    }

    #[test]
    fn test_ordering() {
        let activity = vec![1., 5., 3., 4., 2.];
        let mut heap = VarHeap::default();
        heap.grow_to(5);
        for v in 0..5 {
            heap.insert(v, &activity);
        }
        let mut popped = Vec::new();
        while let Some(v) = pop(&mut heap, &activity) {
            popped.push(v);
        }
        assert_eq!(vec![1, 3, 2, 4, 0], popped);
    }

    #[test]
    fn test_bump() {
        let mut activity = vec![1., 2., 3.];
        let mut heap = VarHeap::default();
        heap.grow_to(3);
        for v in 0..3 {
            heap.insert(v, &activity);
        }
        activity[0] = 10.;
        heap.bump(0, &activity);
        assert_eq!(Some(0), pop(&mut heap, &activity));
    }

    #[test]
    fn test_clear_and_contains() {
        let activity = vec![1., 2.];
        let mut heap = VarHeap::default();
        heap.grow_to(2);
        heap.insert(1, &activity);
        assert!(heap.contains(1));
        assert!(!heap.contains(0));
        heap.clear();
        assert!(!heap.contains(1));
        assert_eq!(None, heap.pop_max());
    }
}
