//! A persistent, append-only chain of steps.
//!
//! Appending never touches the receiver: the new chain points at the old one,
//! so chains derived from a common ancestor share that ancestor and stay
//! independent afterwards. Folding applies the steps oldest first.

use std::{fmt::Debug, sync::Arc};

use crate::error::{Error, Result};

/// One deferred transformation of a `T`. The first step of a chain receives
/// `None` and must produce the initial value.
pub trait Step<T> {
    fn apply(&self, input: Option<T>) -> Result<T>;
}

struct Node<S> {
    step: S,
    parent: Option<Arc<Node<S>>>,
}

impl<S> Drop for Node<S> {
    // unlinks uniquely owned ancestors one by one, long chains would
    // otherwise drop recursively
    fn drop(&mut self) {
        let mut parent = self.parent.take();
        while let Some(node) = parent {
            parent = match Arc::try_unwrap(node) {
                Ok(mut node) => node.parent.take(),
                Err(_) => None,
            };
        }
    }
}

pub struct Pipeline<S> {
    tail: Option<Arc<Node<S>>>,
    len: usize,
}

impl<S> Clone for Pipeline<S> {
    fn clone(&self) -> Self {
        Self {
            tail: self.tail.clone(),
            len: self.len,
        }
    }
}

impl<S> Default for Pipeline<S> {
    fn default() -> Self {
        Self { tail: None, len: 0 }
    }
}

impl<S> Pipeline<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new chain consisting of this one plus `step`.
    pub fn append(&self, step: S) -> Self {
        Self {
            tail: Some(Arc::new(Node {
                step,
                parent: self.tail.clone(),
            })),
            len: self.len + 1,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// steps in the order they were appended
    pub fn steps(&self) -> Vec<&S> {
        let mut steps = Vec::with_capacity(self.len);
        let mut node = self.tail.as_deref();
        while let Some(n) = node {
            steps.push(&n.step);
            node = n.parent.as_deref();
        }
        steps.reverse();
        steps
    }

    /// Applies all steps left to right, starting from nothing.
    pub fn fold<T>(&self) -> Result<T>
    where
        S: Step<T>,
    {
        let mut acc = None;
        for step in self.steps() {
            acc = Some(step.apply(acc)?);
        }
        acc.ok_or_else(|| Error::Argument("cannot build from an empty pipeline".to_string()))
    }
}

impl<S: Debug> Debug for Pipeline<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.steps()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum Op {
        Start(i64),
        Add(i64),
        Mul(i64),
    }

    impl Step<i64> for Op {
        fn apply(&self, input: Option<i64>) -> Result<i64> {
            match (self, input) {
                (Op::Start(v), _) => Ok(*v),
                (Op::Add(v), Some(acc)) => Ok(acc + v),
                (Op::Mul(v), Some(acc)) => Ok(acc * v),
                (_, None) => Err(Error::Argument("no start".to_string())),
            }
        }
    }

    #[test]
    fn folds_in_append_order() {
        let p = Pipeline::new().append(Op::Start(1)).append(Op::Add(2)).append(Op::Mul(10));
        assert_eq!(30, p.fold::<i64>().unwrap());

        let q = Pipeline::new().append(Op::Start(1)).append(Op::Mul(10)).append(Op::Add(2));
        assert_eq!(12, q.fold::<i64>().unwrap());
    }

    #[test]
    fn branches_are_independent() {
        let base = Pipeline::new().append(Op::Start(5));
        let left = base.append(Op::Add(1));
        let right = base.append(Op::Mul(3));
        assert_eq!(5, base.fold::<i64>().unwrap());
        assert_eq!(6, left.fold::<i64>().unwrap());
        assert_eq!(15, right.fold::<i64>().unwrap());
        assert_eq!(1, base.len());
        assert_eq!(2, left.len());
    }

    #[test]
    fn empty_pipeline_fails() {
        assert!(Pipeline::<Op>::new().fold::<i64>().is_err());
        assert!(Pipeline::new().append(Op::Add(1)).fold::<i64>().is_err());
    }

    #[test]
    fn long_chains_drop_without_recursion() {
        let mut p = Pipeline::new().append(Op::Start(0));
        for _ in 0..500_000 {
            p = p.append(Op::Add(1));
        }
        let shorter = p.clone();
        drop(p);
        assert_eq!(500_001, shorter.len());
        drop(shorter);
    }
}
