//! The 0/1 knapsack problem.
//!
//! Five objects with profits `[10, 3, 9, 4, 8]` and sizes
//! `[14, 4, 10, 6, 9]` and a capacity of 20. The optimum picks objects 3
//! and 5 for a profit of 17.

use std::collections::BTreeSet;

use mznforge_core::{Assignment, Value};

use crate::fake::FakeSolver;

pub const MODEL: &str = "\
int: n;
set of int: OBJ = 1..n;
int: capacity;
array[OBJ] of int: profit;
array[OBJ] of int: size;

var set of OBJ: x;

% total size must fit
constraint sum(i in x)(size[i]) <= capacity;

solve maximize sum(i in x)(profit[i]);
";

/// The model with the capacity left as a template variable.
pub const TEMPLATE: &str = "\
int: n;
set of int: OBJ = 1..n;
array[OBJ] of int: profit;
array[OBJ] of int: size;

var set of OBJ: x;

constraint sum(i in x)(size[i]) <= {{capacity}};

solve maximize sum(i in x)(profit[i]);
";

/// What `minizinc --output-mode dzn --output-time -a` prints for the model.
pub const OUTPUT: &str = "\
x = {1};
% time elapsed: 0.01 s
----------
x = {3, 5};
% time elapsed: 0.02 s
----------
==========
";

pub fn data() -> Assignment {
    let mut data = Assignment::new();
    data.insert("n".into(), Value::Int(5));
    data.insert("profit".into(), Value::from(vec![10i64, 3, 9, 4, 8]));
    data.insert("size".into(), Value::from(vec![14i64, 4, 10, 6, 9]));
    data.insert("capacity".into(), Value::Int(20));
    data
}

pub fn optimum() -> BTreeSet<i64> {
    BTreeSet::from([3, 5])
}

/// A fake solver printing [`OUTPUT`].
pub fn fake_solver() -> FakeSolver {
    FakeSolver::printing(OUTPUT)
}

/// True when a `minizinc` executable is on `PATH`.
pub fn minizinc_available() -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join("minizinc").is_file()))
        .unwrap_or(false)
}
