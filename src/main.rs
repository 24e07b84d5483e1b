#![allow(dead_code)]
use bit_set::BitSet;

pub mod dominators;
pub mod error;
pub mod graph;
pub mod ir;
pub mod printer;
pub mod verify;

use dominators::DominatorTree;
use ir::{BinaryOp, Graph};
use printer::{DomTreePrinter, GraphPrinter};

macro_rules! define_id_type {
    ($prefix:expr, $name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(usize);

        impl From<usize> for $name { fn from(id: usize) -> Self { $name(id) } }
        impl From<$name> for usize { fn from(id: $name) -> Self { id.0 } }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
                write!(f, "{self}")
            }
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct TypedBitSet<T> {
    set: BitSet,
    phantom: std::marker::PhantomData<T>,
}

impl<T> TypedBitSet<T> where T: From<usize>, usize: From<T> {
    pub fn new() -> Self {
        Self { set: BitSet::new(), phantom: Default::default() }
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn contains(&self, item: T) -> bool {
        self.set.contains(item.into())
    }

    pub fn insert(&mut self, item: T) -> bool {
        self.set.insert(item.into())
    }

    pub fn as_vec(&self) -> Vec<T> {
        self.set.iter().map(|idx| idx.into()).collect()
    }
}

impl<T> FromIterator<T> for TypedBitSet<T> where T: From<usize>, usize: From<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self { set: iter.into_iter().map(usize::from).collect(), phantom: Default::default() }
    }
}

define_id_type!("i", InsnId);
define_id_type!("BB", BlockId);

pub type BlockSet = TypedBitSet<BlockId>;

/// Iterative factorial of parameter 0:
///
/// ```text
/// res = 1; i = 2;
/// while (i cmp n) { res = res * i; i = i + 1; }
/// return res;
/// ```
pub fn factorial() -> Graph {
    let mut graph = Graph::new("factorial");
    let entry = graph.new_block("entry");
    let header = graph.new_block("loop.header");
    let body = graph.new_block("loop.body");
    let exit = graph.new_block("exit");
    graph.set_entry(entry);

    let n = graph.push_param(entry, 0);
    let res_init = graph.push_const(entry, 1);
    let i_init = graph.push_const(entry, 2);
    graph.push_jump(entry, header);

    let res_phi = graph.push_phi(header);
    let i_phi = graph.push_phi(header);
    let cmp = graph.push_binary(header, BinaryOp::Cmp, i_phi, n);
    graph.push_cond_jump(header, cmp, body, exit);

    let res_new = graph.push_binary(body, BinaryOp::Mul, res_phi, i_phi);
    let one = graph.push_const(body, 1);
    let i_new = graph.push_binary(body, BinaryOp::Add, i_phi, one);
    graph.push_jump(body, header);

    graph.add_phi_incoming(res_phi, res_init, entry);
    graph.add_phi_incoming(res_phi, res_new, body);
    graph.add_phi_incoming(i_phi, i_init, entry);
    graph.add_phi_incoming(i_phi, i_new, body);

    graph.push_return(exit, Some(res_phi));
    graph.recompute_preds();
    graph
}

fn main() -> Result<(), error::DomError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let graph = factorial();
    if let Err(errors) = verify::verify(&graph) {
        for error in errors {
            eprintln!("verify: {error}");
        }
    }
    println!("{}", GraphPrinter::new(&graph));

    let mut tree = DominatorTree::new(&graph);
    tree.run()?;
    println!("{}", DomTreePrinter::new(&tree));
    Ok(())
}
