//! Myers O(ND) shortest edit script over token slices.

/// One step of an edit script, indexing into the input slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Edit {
    Equal(usize),
    Delete(usize),
    Insert(usize),
}

/// Edit distance beyond which the middle section is reported as a bulk
/// replacement. Bounds trace memory to O(MAX_EDIT_DISTANCE²).
const MAX_EDIT_DISTANCE: usize = 2_000;

/// Shortest edit script turning `a` into `b`.
///
/// Common prefix and suffix are peeled off before the search. Each `Equal`
/// carries the index into `a`, `Delete` into `a`, `Insert` into `b`.
pub(crate) fn diff<T: PartialEq>(a: &[T], b: &[T]) -> Vec<Edit> {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let mid_a = &a[prefix..a.len() - suffix];
    let mid_b = &b[prefix..b.len() - suffix];

    let mut edits: Vec<Edit> = (0..prefix).map(Edit::Equal).collect();

    let middle = shortest_edit(mid_a, mid_b).unwrap_or_else(|| {
        (0..mid_a.len())
            .map(Edit::Delete)
            .chain((0..mid_b.len()).map(Edit::Insert))
            .collect()
    });
    edits.extend(middle.into_iter().map(|edit| match edit {
        Edit::Equal(i) => Edit::Equal(i + prefix),
        Edit::Delete(i) => Edit::Delete(i + prefix),
        Edit::Insert(j) => Edit::Insert(j + prefix),
    }));

    let a_tail = a.len() - suffix;
    edits.extend((a_tail..a.len()).map(Edit::Equal));
    edits
}

fn shortest_edit<T: PartialEq>(a: &[T], b: &[T]) -> Option<Vec<Edit>> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    if n == 0 {
        return Some((0..b.len()).map(Edit::Insert).collect());
    }
    if m == 0 {
        return Some((0..a.len()).map(Edit::Delete).collect());
    }

    let max = (n + m) as usize;
    let offset = max as isize;
    let mut v = vec![0isize; 2 * max + 2];
    // trace[d] holds v[k] for k in -d..=d at the end of round d
    let mut trace: Vec<Vec<isize>> = Vec::new();

    for d in 0..=max.min(MAX_EDIT_DISTANCE) as isize {
        let mut done = false;
        let mut k = -d;
        while k <= d {
            let idx = (k + offset) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1]
            } else {
                v[idx - 1] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx] = x;
            if x >= n && y >= m {
                done = true;
                break;
            }
            k += 2;
        }
        let lo = (offset - d) as usize;
        let hi = (offset + d) as usize;
        trace.push(v[lo..=hi].to_vec());
        if done {
            return Some(backtrack(&trace, n, m));
        }
    }
    None
}

fn backtrack(trace: &[Vec<isize>], n: isize, m: isize) -> Vec<Edit> {
    let mut edits = Vec::new();
    let (mut x, mut y) = (n, m);

    for d in (0..trace.len() as isize).rev() {
        if d == 0 {
            while x > 0 && y > 0 {
                x -= 1;
                y -= 1;
                edits.push(Edit::Equal(x as usize));
            }
            break;
        }

        let prev = &trace[(d - 1) as usize];
        let at = |k: isize| prev[(k + d - 1) as usize];
        let k = x - y;
        let prev_k = if k == -d || (k != d && at(k - 1) < at(k + 1)) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = at(prev_k);
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            x -= 1;
            y -= 1;
            edits.push(Edit::Equal(x as usize));
        }
        if x == prev_x {
            edits.push(Edit::Insert((y - 1) as usize));
        } else {
            edits.push(Edit::Delete((x - 1) as usize));
        }
        x = prev_x;
        y = prev_y;
    }

    edits.reverse();
    edits
}
