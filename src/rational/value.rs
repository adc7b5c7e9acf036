//! The [`Rational`] value type.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use num_rational::Ratio;
use num_traits::{CheckedAdd, CheckedDiv, CheckedMul, CheckedSub, Signed, Zero};

use crate::error::{GoalError, GoalResult};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Repr {
    Number(Ratio<i64>),
    NaN,
}

/// An exact, always-reduced rational number.
///
/// Values are stored as [`Ratio<i64>`] and every arithmetic operation is
/// carried out on `Ratio<i128>` before narrowing. A result whose reduced
/// numerator or denominator does not fit `[-i64::MAX, i64::MAX]` is rejected
/// with [`GoalError::Overflow`] rather than wrapped.
///
/// Because the representation is canonical (lowest terms, positive
/// denominator), structural equality is value equality.
///
/// # Examples
///
/// ```
/// use u_goalprog::rational::Rational;
///
/// let a = Rational::new(6, -8).unwrap();
/// assert_eq!(a.numer(), -3);
/// assert_eq!(a.denom(), 4);
///
/// let b = a.try_add(Rational::new(1, 4).unwrap()).unwrap();
/// assert_eq!(b, Rational::new(-1, 2).unwrap());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "(i64, i64)", into = "(i64, i64)")
)]
pub struct Rational(Repr);

impl Rational {
    /// Zero.
    pub const ZERO: Rational = Rational::raw(0, 1);

    /// One.
    pub const ONE: Rational = Rational::raw(1, 1);

    /// Upper "unbounded" marker. Leaves headroom below the storage limit so a
    /// marker can still take part in a handful of additions.
    pub const MAX_VALUE: Rational = Rational::raw(1 << 62, 1);

    /// Lower "unbounded" marker.
    pub const MIN_VALUE: Rational = Rational::raw(-(1 << 62), 1);

    /// Smallest magnitude treated as non-zero by pivot and ratio decisions.
    pub const EPSILON: Rational = Rational::raw(1, 1_000_000_000);

    /// Out-of-band "no preference" marker. Never produced by arithmetic;
    /// using it as an operand is an error.
    pub const NAN: Rational = Rational(Repr::NaN);

    /// Caller guarantees lowest terms and a positive denominator.
    const fn raw(numer: i64, denom: i64) -> Rational {
        Rational(Repr::Number(Ratio::new_raw(numer, denom)))
    }

    /// Creates `numer / denom`, reduced to lowest terms.
    pub fn new(numer: i64, denom: i64) -> GoalResult<Self> {
        Self::from_wide(numer as i128, denom as i128)
    }

    /// Creates the integer `value`.
    pub fn integer(value: i64) -> GoalResult<Self> {
        Self::from_wide(value as i128, 1)
    }

    fn from_wide(numer: i128, denom: i128) -> GoalResult<Self> {
        if denom == 0 {
            return Err(GoalError::DivideByZero);
        }
        Self::narrow(Ratio::new(numer, denom))
    }

    /// Range-checks a reduced wide ratio back into `i64` storage.
    fn narrow(wide: Ratio<i128>) -> GoalResult<Self> {
        let limit = i64::MAX as i128;
        let (numer, denom) = (*wide.numer(), *wide.denom());
        if numer > limit || numer < -limit || denom > limit {
            return Err(GoalError::Overflow(format!("{numer}/{denom}")));
        }
        Ok(Rational::raw(numer as i64, denom as i64))
    }

    fn ratio(&self) -> Option<&Ratio<i64>> {
        match &self.0 {
            Repr::Number(r) => Some(r),
            Repr::NaN => None,
        }
    }

    /// Numerator (carries the sign; `0` for [`Rational::NAN`]).
    pub fn numer(&self) -> i64 {
        self.ratio().map_or(0, |r| *r.numer())
    }

    /// Denominator (positive, or zero for [`Rational::NAN`]).
    pub fn denom(&self) -> i64 {
        self.ratio().map_or(0, |r| *r.denom())
    }

    pub fn is_nan(&self) -> bool {
        matches!(self.0, Repr::NaN)
    }

    pub fn is_zero(&self) -> bool {
        self.ratio().is_some_and(Zero::is_zero)
    }

    pub fn is_integer(&self) -> bool {
        self.ratio().is_some_and(Ratio::is_integer)
    }

    pub fn is_positive(&self) -> bool {
        self.ratio().is_some_and(Signed::is_positive)
    }

    pub fn is_negative(&self) -> bool {
        self.ratio().is_some_and(Signed::is_negative)
    }

    /// -1, 0 or 1.
    pub fn signum(&self) -> i64 {
        self.numer().signum()
    }

    fn wide(self) -> GoalResult<Ratio<i128>> {
        let r = self.ratio().ok_or(GoalError::NotANumber)?;
        Ok(Ratio::new_raw(*r.numer() as i128, *r.denom() as i128))
    }

    fn combine(
        self,
        other: Rational,
        op: impl FnOnce(&Ratio<i128>, &Ratio<i128>) -> Option<Ratio<i128>>,
    ) -> GoalResult<Rational> {
        let (a, b) = (self.wide()?, other.wide()?);
        let result = op(&a, &b).ok_or_else(|| GoalError::Overflow(format!("{self} with {other}")))?;
        Self::narrow(result)
    }

    /// Exact addition.
    pub fn try_add(self, other: Rational) -> GoalResult<Rational> {
        self.combine(other, CheckedAdd::checked_add)
    }

    /// Exact subtraction.
    pub fn try_sub(self, other: Rational) -> GoalResult<Rational> {
        self.combine(other, CheckedSub::checked_sub)
    }

    /// Exact multiplication.
    pub fn try_mul(self, other: Rational) -> GoalResult<Rational> {
        self.combine(other, CheckedMul::checked_mul)
    }

    /// Exact division. Fails with [`GoalError::DivideByZero`] on a zero divisor.
    pub fn try_div(self, other: Rational) -> GoalResult<Rational> {
        if other.is_zero() {
            return Err(GoalError::DivideByZero);
        }
        self.combine(other, CheckedDiv::checked_div)
    }

    /// Multiplicative inverse.
    pub fn recip(self) -> GoalResult<Rational> {
        Rational::ONE.try_div(self)
    }

    pub fn abs(self) -> Rational {
        match self.0 {
            Repr::Number(r) => Rational(Repr::Number(r.abs())),
            Repr::NaN => self,
        }
    }

    /// Largest integer not greater than `self`.
    pub fn floor(self) -> GoalResult<Rational> {
        let r = self.ratio().ok_or(GoalError::NotANumber)?;
        Ok(Rational(Repr::Number(r.floor())))
    }

    /// Smallest integer not less than `self`.
    pub fn ceil(self) -> GoalResult<Rational> {
        let r = self.ratio().ok_or(GoalError::NotANumber)?;
        Ok(Rational(Repr::Number(r.ceil())))
    }

    /// Distance to the nearest integer, in `[0, 1/2]`.
    pub fn fractional_distance(self) -> GoalResult<Rational> {
        let down = self.try_sub(self.floor()?)?;
        let up = self.ceil()?.try_sub(self)?;
        Ok(down.min(up))
    }

    /// Lossy conversion for the floating-point search strategies.
    pub fn to_f64(self) -> f64 {
        match self.ratio() {
            Some(r) => *r.numer() as f64 / *r.denom() as f64,
            None => f64::NAN,
        }
    }

    /// Best rational approximation of `value` with denominator at most
    /// `max_denom`, by continued-fraction expansion.
    ///
    /// Values that are exactly representable with a small denominator (0.5,
    /// 1/3, 0.25 ...) come back exact, so no fixed decimal scale is imposed.
    ///
    /// ```
    /// use u_goalprog::rational::Rational;
    ///
    /// let third = Rational::approximate(1.0 / 3.0, 1_000_000).unwrap();
    /// assert_eq!(third, Rational::new(1, 3).unwrap());
    /// let one = Rational::approximate(0.999_999_999_9, 1_000_000).unwrap();
    /// assert_eq!(one, Rational::ONE);
    /// ```
    pub fn approximate(value: f64, max_denom: i64) -> GoalResult<Rational> {
        if value.is_nan() {
            return Err(GoalError::NotANumber);
        }
        if !value.is_finite() || value.abs() > Rational::MAX_VALUE.to_f64() {
            return Err(GoalError::Overflow(format!("{value} exceeds rational range")));
        }
        if max_denom < 1 {
            return Err(GoalError::invalid("max_denom must be at least 1"));
        }
        let negative = value < 0.0;
        let mut rest = value.abs();
        let (mut h_prev, mut h) = (0_i128, 1_i128);
        let (mut k_prev, mut k) = (1_i128, 0_i128);
        for _ in 0..64 {
            let whole = rest.floor();
            let a = whole as i128;
            let (Some(h_next), Some(k_next)) = (
                a.checked_mul(h).and_then(|v| v.checked_add(h_prev)),
                a.checked_mul(k).and_then(|v| v.checked_add(k_prev)),
            ) else {
                break;
            };
            if k_next > max_denom as i128 {
                break;
            }
            h_prev = h;
            h = h_next;
            k_prev = k;
            k = k_next;
            let frac = rest - whole;
            if frac < 1e-12 {
                break;
            }
            rest = 1.0 / frac;
        }
        if k == 0 {
            // First partial quotient already exceeded the denominator cap.
            return Ok(Rational::ZERO);
        }
        let numer = if negative { -h } else { h };
        Self::from_wide(numer, k)
    }
}

impl Default for Rational {
    fn default() -> Self {
        Rational::ZERO
    }
}

impl From<i32> for Rational {
    fn from(value: i32) -> Self {
        Rational(Repr::Number(Ratio::from_integer(value as i64)))
    }
}

impl TryFrom<(i64, i64)> for Rational {
    type Error = GoalError;

    fn try_from((numer, denom): (i64, i64)) -> GoalResult<Self> {
        if numer == 0 && denom == 0 {
            return Ok(Rational::NAN);
        }
        Rational::new(numer, denom)
    }
}

impl From<Rational> for (i64, i64) {
    fn from(value: Rational) -> Self {
        (value.numer(), value.denom())
    }
}

impl std::ops::Neg for Rational {
    type Output = Rational;

    fn neg(self) -> Rational {
        // |numer| <= i64::MAX, so negation cannot overflow.
        match self.0 {
            Repr::Number(r) => Rational(Repr::Number(-r)),
            Repr::NaN => self,
        }
    }
}

impl Ord for Rational {
    /// Exact cross-multiplied comparison. `NAN` equals itself and sorts
    /// below every number.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.ratio(), other.ratio()) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ratio() {
            Some(r) => write!(f, "{r}"),
            None => write!(f, "NaN"),
        }
    }
}

impl fmt::Debug for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rational({self})")
    }
}

impl FromStr for Rational {
    type Err = GoalError;

    /// Parses `"n"`, `"n/d"` or a plain decimal such as `"-0.125"`.
    fn from_str(s: &str) -> GoalResult<Self> {
        let s = s.trim();
        let parse = |t: &str| {
            t.trim()
                .parse::<i64>()
                .map_err(|e| GoalError::invalid(format!("cannot parse {t:?}: {e}")))
        };
        if s == "NaN" {
            return Ok(Rational::NAN);
        }
        if let Some((n, d)) = s.split_once('/') {
            return Rational::new(parse(n)?, parse(d)?);
        }
        if let Some((whole, frac)) = s.split_once('.') {
            if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) || frac.len() > 18 {
                return Err(GoalError::invalid(format!("cannot parse {s:?}")));
            }
            let negative = whole.trim_start().starts_with('-');
            let whole = if whole.is_empty() || whole == "-" {
                0
            } else {
                parse(whole)?
            };
            let scale = 10_i128.pow(frac.len() as u32);
            let frac_part = parse(frac)? as i128;
            let magnitude = (whole as i128).abs() * scale + frac_part;
            let numer = if negative { -magnitude } else { magnitude };
            return Rational::from_wide(numer, scale);
        }
        Rational::integer(parse(s)?)
    }
}
