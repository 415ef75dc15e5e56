//! Dense factors for variable elimination.
//!
//! A factor uses the table index convention: its scope is ordered and the
//! last variable varies fastest. A table converts to a factor without
//! reshuffling because the node's own axis is already innermost.

use sa_math::NeumaierSum;

use crate::model::{Table, VarId};

/// A non-negative (or payoff) function over a set of discrete variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Factor {
    scope: Vec<VarId>,
    cards: Vec<usize>,
    values: Vec<f64>,
}

impl Factor {
    /// Factor over `scope` with the given values.
    ///
    /// Returns `None` when `values` does not match the product of `cards`.
    pub fn new(scope: Vec<VarId>, cards: Vec<usize>, values: Vec<f64>) -> Option<Self> {
        if scope.len() != cards.len() || cards.iter().product::<usize>() != values.len() {
            return None;
        }
        Some(Self {
            scope,
            cards,
            values,
        })
    }

    /// A constant with empty scope.
    pub fn scalar(value: f64) -> Self {
        Self {
            scope: Vec::new(),
            cards: Vec::new(),
            values: vec![value],
        }
    }

    /// Uniform policy over one variable.
    pub fn uniform(var: VarId, cardinality: usize) -> Self {
        Self {
            scope: vec![var],
            cards: vec![cardinality],
            values: vec![1.0 / cardinality as f64; cardinality],
        }
    }

    /// Factor over a table's parents followed by its node.
    ///
    /// Utility tables have width 1 and produce a factor over the parents only.
    pub fn from_table(table: &Table) -> Self {
        let mut scope: Vec<VarId> = table.parents().iter().map(|p| p.id()).collect();
        let mut cards: Vec<usize> = table.parents().iter().map(|p| p.cardinality()).collect();
        if !table.is_utility() {
            scope.push(table.node().id());
            cards.push(table.width());
        }
        Self {
            scope,
            cards,
            values: table.values().to_vec(),
        }
    }

    pub fn scope(&self) -> &[VarId] {
        &self.scope
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, var: VarId) -> bool {
        self.scope.contains(&var)
    }

    /// Cardinality of a variable in scope.
    pub fn cardinality(&self, var: VarId) -> Option<usize> {
        self.position(var).map(|pos| self.cards[pos])
    }

    /// Value of a scalar factor, or the total of a non-scalar one.
    pub fn total(&self) -> f64 {
        let mut acc = NeumaierSum::new();
        acc.extend(self.values.iter().copied());
        acc.value()
    }

    fn position(&self, var: VarId) -> Option<usize> {
        self.scope.iter().position(|v| *v == var)
    }

    fn strides(cards: &[usize]) -> Vec<usize> {
        let mut strides = vec![0; cards.len()];
        let mut stride = 1;
        for (slot, card) in strides.iter_mut().zip(cards).rev() {
            *slot = stride;
            stride *= card;
        }
        strides
    }

    /// Fix `var` to `index`, dropping it from the scope.
    ///
    /// A factor that does not mention `var` is returned unchanged.
    pub fn restrict(&self, var: VarId, index: usize) -> Factor {
        let Some(pos) = self.position(var) else {
            return self.clone();
        };
        let strides = Self::strides(&self.cards);
        let outer = self.cards[..pos].iter().product::<usize>();
        let inner = strides[pos];
        let mut values = Vec::with_capacity(self.values.len() / self.cards[pos]);
        for o in 0..outer {
            let base = o * self.cards[pos] * inner + index * inner;
            values.extend_from_slice(&self.values[base..base + inner]);
        }
        let mut scope = self.scope.clone();
        let mut cards = self.cards.clone();
        scope.remove(pos);
        cards.remove(pos);
        Factor {
            scope,
            cards,
            values,
        }
    }

    /// Pointwise product over the union of both scopes.
    ///
    /// The result lists `self`'s variables first, then the new ones of `other`.
    pub fn product(&self, other: &Factor) -> Factor {
        let mut scope = self.scope.clone();
        let mut cards = self.cards.clone();
        for (v, c) in other.scope.iter().zip(&other.cards) {
            if !scope.contains(v) {
                scope.push(*v);
                cards.push(*c);
            }
        }

        let self_strides = Self::projected_strides(&scope, &self.scope, &self.cards);
        let other_strides = Self::projected_strides(&scope, &other.scope, &other.cards);
        let size: usize = cards.iter().product();

        let mut values = Vec::with_capacity(size);
        let mut counter = vec![0usize; scope.len()];
        let (mut a, mut b) = (0usize, 0usize);
        for _ in 0..size {
            values.push(self.values[a] * other.values[b]);
            // Odometer over the result scope, last variable fastest.
            for pos in (0..scope.len()).rev() {
                counter[pos] += 1;
                a += self_strides[pos];
                b += other_strides[pos];
                if counter[pos] < cards[pos] {
                    break;
                }
                a -= self_strides[pos] * cards[pos];
                b -= other_strides[pos] * cards[pos];
                counter[pos] = 0;
            }
        }
        Factor {
            scope,
            cards,
            values,
        }
    }

    /// Stride of each `target` variable inside a factor over `scope`; zero
    /// for variables the factor does not mention.
    fn projected_strides(target: &[VarId], scope: &[VarId], cards: &[usize]) -> Vec<usize> {
        let strides = Self::strides(cards);
        target
            .iter()
            .map(|v| {
                scope
                    .iter()
                    .position(|s| s == v)
                    .map_or(0, |pos| strides[pos])
            })
            .collect()
    }

    /// Sum `var` out of the factor.
    pub fn sum_out(&self, var: VarId) -> Factor {
        let Some(pos) = self.position(var) else {
            return self.clone();
        };
        let card = self.cards[pos];
        let inner: usize = self.cards[pos + 1..].iter().product();
        let outer: usize = self.cards[..pos].iter().product();
        let mut values = Vec::with_capacity(outer * inner);
        for o in 0..outer {
            for i in 0..inner {
                let mut acc = NeumaierSum::new();
                for k in 0..card {
                    acc.add(self.values[(o * card + k) * inner + i]);
                }
                values.push(acc.value());
            }
        }
        let mut scope = self.scope.clone();
        let mut cards = self.cards.clone();
        scope.remove(pos);
        cards.remove(pos);
        Factor {
            scope,
            cards,
            values,
        }
    }

    /// Values of a factor whose scope is exactly `[var]`.
    pub fn as_distribution_over(&self, var: VarId) -> Option<&[f64]> {
        match self.scope.as_slice() {
            [only] if *only == var => Some(&self.values),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(i: usize) -> VarId {
        VarId(i)
    }

    #[test]
    fn new_checks_shape() {
        assert!(Factor::new(vec![v(0)], vec![2], vec![0.5, 0.5]).is_some());
        assert!(Factor::new(vec![v(0)], vec![2], vec![1.0]).is_none());
        assert_eq!(Factor::scalar(3.0).total(), 3.0);
    }

    #[test]
    fn restrict_drops_variable() {
        // scope [A(2), B(3)], value = 10*a + b
        let f = Factor::new(
            vec![v(0), v(1)],
            vec![2, 3],
            vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0],
        )
        .unwrap();
        let a1 = f.restrict(v(0), 1);
        assert_eq!(a1.scope(), &[v(1)]);
        assert_eq!(a1.values(), &[10.0, 11.0, 12.0]);
        let b2 = f.restrict(v(1), 2);
        assert_eq!(b2.scope(), &[v(0)]);
        assert_eq!(b2.values(), &[2.0, 12.0]);
        assert_eq!(f.restrict(v(7), 0), f);
    }

    #[test]
    fn product_broadcasts_over_union() {
        let a = Factor::new(vec![v(0)], vec![2], vec![2.0, 3.0]).unwrap();
        let b = Factor::new(vec![v(1)], vec![3], vec![1.0, 10.0, 100.0]).unwrap();
        let ab = a.product(&b);
        assert_eq!(ab.scope(), &[v(0), v(1)]);
        assert_eq!(ab.values(), &[2.0, 20.0, 200.0, 3.0, 30.0, 300.0]);

        let shared = Factor::new(vec![v(1), v(0)], vec![3, 2], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap();
        let p = a.product(&shared);
        assert_eq!(p.scope(), &[v(0), v(1)]);
        // p[a, b] = a_val[a] * shared[b, a]
        assert_eq!(p.values(), &[2.0, 6.0, 10.0, 6.0, 12.0, 18.0]);
    }

    #[test]
    fn product_with_scalar() {
        let a = Factor::new(vec![v(0)], vec![2], vec![2.0, 3.0]).unwrap();
        assert_eq!(a.product(&Factor::scalar(2.0)).values(), &[4.0, 6.0]);
        assert_eq!(Factor::scalar(2.0).product(&a).values(), &[4.0, 6.0]);
    }

    #[test]
    fn sum_out_marginalizes() {
        let f = Factor::new(
            vec![v(0), v(1)],
            vec![2, 3],
            vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0],
        )
        .unwrap();
        assert_eq!(f.sum_out(v(0)).values(), &[10.0, 12.0, 14.0]);
        assert_eq!(f.sum_out(v(1)).values(), &[3.0, 33.0]);
        let scalar = f.sum_out(v(0)).sum_out(v(1));
        assert!(scalar.scope().is_empty());
        assert_eq!(scalar.total(), 36.0);
    }

    #[test]
    fn uniform_policy() {
        let u = Factor::uniform(v(3), 4);
        assert_eq!(u.values(), &[0.25; 4]);
        assert_eq!(u.as_distribution_over(v(3)), Some(&[0.25; 4][..]));
        assert_eq!(u.as_distribution_over(v(2)), None);
        assert_eq!(u.cardinality(v(3)), Some(4));
    }
}
