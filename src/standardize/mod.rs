mod charge;
pub use charge::*;

mod fragment;
pub use fragment::*;

mod parent;
pub use parent::*;

mod standardizer;
pub use standardizer::*;

mod tautomer;
pub use tautomer::*;
