pub mod error;
pub mod flags;
pub mod interp;
pub mod ir;
pub mod scope;
pub mod util;
pub mod val;
