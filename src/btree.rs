//! A B+Tree laid out directly in storage pages.
//!
//! Keys and values have a fixed serialized width, so every node is a plain array inside one page
//! and moving an entry is a byte copy. All comparisons run on the serialized keys.
//!
//! Interior nodes route and leaves hold the data:
//!
//! | **Property**           | **Interior Node**                    | **Leaf Node**          |
//! |------------------------|--------------------------------------|------------------------|
//! | **Stores**             | Separator keys and child page ids    | Keys and values        |
//! | **Number of keys**     | Up to the interior capacity          | Up to the leaf capacity|
//! | **Number of pointers** | Number of keys + 1                   | None                   |
//! | **Summaries**          | One per child                        | Derived from entries   |
//!
//! ## Inserting
//!
//! Inserts split proactively. Walking down from the root, any node that is already full is split
//! before the walk enters it, so the parent of the node being split always has room for the new
//! separator. After each split the walk starts again from the root. A split of the root grows the
//! tree by one level: a new interior root is created with the old root as its only child, and the
//! old root is then split under it like any other node.
//!
//! ## Summaries
//!
//! Each tree carries a monoid (see [`crate::monoid`]). Interior pages store the summary of every
//! child next to its page id. Splits refresh the two affected slots of the parent and every leaf
//! mutation re-folds the summaries along the path it was reached by, so a range aggregate only
//! reads the pages along the two boundaries of the range.
//!
//! |                        | Leaf split                   | Interior split                   |
//! |------------------------|------------------------------|----------------------------------|
//! | **Moves right**        | Upper `count / 2` entries    | Keys after the middle key        |
//! | **Separator**          | First key of the right half  | Middle key, removed from the node|
//! | **Re-parenting**       | None                         | Every child that moved right     |
pub mod interior;
pub mod layout;
pub mod leaf;
pub mod node;
pub mod page;
pub mod tree;

pub use interior::InteriorNodeCursor;
pub use layout::{NodeKind, NodeLayout, TreeSchema};
pub use leaf::LeafNodeCursor;
pub use node::NodeCursor;
pub use page::Page;
pub use tree::{BTree, TreeStats};
