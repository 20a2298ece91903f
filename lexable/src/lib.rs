//! NFA/DFA construction, token-precedence conflict resolution, token-group
//! partitioning, and flat-array table packing for table-driven tokenizers.

pub mod builtins;
pub mod charset;
pub mod conflicts;
pub mod dfa;
pub mod groups;
pub mod location;
pub mod nfa;
pub mod pack;

pub use charset::CharSet;
pub use conflicts::PrecedenceGraph;
pub use dfa::Dfa;
pub use groups::Group;
pub use location::Location;
pub use nfa::{Nfa, TermId, TokenExpr, TokenRule};
pub use pack::LexTables;
