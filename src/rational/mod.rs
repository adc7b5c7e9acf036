//! Exact rational arithmetic.
//!
//! Every comparison the solver makes across locked priority stages goes
//! through [`Rational`], so a goal frozen at priority 0 reads back bit-for-bit
//! identical at priority 5. Floating point is confined to the search
//! strategies inside [`continuous`](crate::continuous); their results are
//! snapped back with [`Rational::approximate`].

mod value;

pub use value::Rational;
