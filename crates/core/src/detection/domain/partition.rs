//! Union-find partitioning of items under a similarity predicate.

/// Find root of element `i` with path halving for amortized near-O(1).
pub fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Merge the sets containing `a` and `b`.
pub fn union(parent: &mut [usize], a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        parent[ra] = rb;
    }
}

/// Splits `items` into equivalence classes of the transitive closure of
/// `similar`.
///
/// Returns one class label per item. Labels are dense (`0..n_classes`) and
/// numbered in order of each class's first member, so the result does not
/// depend on union order.
pub fn partition<T>(items: &[T], similar: impl Fn(&T, &T) -> bool) -> (Vec<usize>, usize) {
    let n = items.len();
    let mut parent: Vec<usize> = (0..n).collect();

    for i in 0..n {
        for j in (i + 1)..n {
            if similar(&items[i], &items[j]) {
                union(&mut parent, i, j);
            }
        }
    }

    let mut root_label: Vec<Option<usize>> = vec![None; n];
    let mut labels = Vec::with_capacity(n);
    let mut next = 0;
    for i in 0..n {
        let root = find(&mut parent, i);
        let label = *root_label[root].get_or_insert_with(|| {
            next += 1;
            next - 1
        });
        labels.push(label);
    }
    (labels, next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_find_transitive() {
        let mut parent = vec![0, 1, 2];
        union(&mut parent, 0, 1);
        union(&mut parent, 1, 2);
        assert_eq!(find(&mut parent, 0), find(&mut parent, 2));
    }

    #[test]
    fn test_union_find_separate() {
        let mut parent = vec![0, 1, 2, 3];
        union(&mut parent, 0, 1);
        union(&mut parent, 2, 3);
        assert_ne!(find(&mut parent, 0), find(&mut parent, 2));
    }

    #[test]
    fn test_partition_chains_transitively() {
        // 0~1, 1~2 but 0 and 2 are not directly similar.
        let items = [0, 2, 4, 20];
        let (labels, n) = partition(&items, |a: &i32, b: &i32| (a - b).abs() <= 2);
        assert_eq!(n, 2);
        assert_eq!(labels, vec![0, 0, 0, 1]);
    }

    #[test]
    fn test_partition_labels_follow_first_member() {
        let items = [10, 0, 11, 1];
        let (labels, n) = partition(&items, |a: &i32, b: &i32| (a - b).abs() <= 1);
        assert_eq!(n, 2);
        assert_eq!(labels, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_partition_empty() {
        let (labels, n) = partition(&[] as &[i32], |_, _| true);
        assert!(labels.is_empty());
        assert_eq!(n, 0);
    }
}
