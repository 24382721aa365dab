use crate::error::{LimitError, LimitResult};
use std::{fmt, num::NonZeroUsize, str::FromStr};

/// Maximum number of tasks a limiter runs at once. Always >= 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Capacity(NonZeroUsize);

impl Capacity {
    pub const ONE: Capacity = Capacity(NonZeroUsize::MIN);

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<NonZeroUsize> for Capacity {
    fn from(value: NonZeroUsize) -> Self {
        Self(value)
    }
}

macro_rules! capacity_from_int {
    ($($int:ty),+ $(,)?) => {
        $(
            impl TryFrom<$int> for Capacity {
                type Error = LimitError;

                fn try_from(value: $int) -> LimitResult<Self> {
                    usize::try_from(value)
                        .ok()
                        .and_then(NonZeroUsize::new)
                        .map(Self)
                        .ok_or_else(|| LimitError::invalid_capacity(value))
                }
            }
        )+
    };
}

capacity_from_int!(i32, i64, u32, u64, usize);

impl TryFrom<f64> for Capacity {
    type Error = LimitError;

    fn try_from(value: f64) -> LimitResult<Self> {
        // Integral and in range, so the cast is exact.
        if value.is_finite() && value.fract() == 0.0 && value >= 1.0 && value <= usize::MAX as f64 {
            Self::try_from(value as usize)
        } else {
            Err(LimitError::invalid_capacity(value))
        }
    }
}

impl FromStr for Capacity {
    type Err = LimitError;

    fn from_str(s: &str) -> LimitResult<Self> {
        s.trim()
            .parse::<NonZeroUsize>()
            .map(Self)
            .map_err(|_| LimitError::invalid_capacity(format!("{:?}", s)))
    }
}

impl TryFrom<&str> for Capacity {
    type Error = LimitError;

    fn try_from(value: &str) -> LimitResult<Self> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejects<T>(value: T)
    where
        T: TryInto<Capacity, Error = LimitError> + fmt::Debug + Copy,
    {
        match value.try_into() {
            Err(LimitError::InvalidArgument { .. }) => {}
            other => panic!("{:?} should be rejected, got {:?}", value, other),
        }
    }

    #[test]
    fn test_accepts_positive_integers() {
        assert_eq!(Capacity::try_from(1).unwrap(), Capacity::ONE);
        assert_eq!(Capacity::try_from(5i64).unwrap().get(), 5);
        assert_eq!(Capacity::try_from(12usize).unwrap().get(), 12);
        assert_eq!(Capacity::try_from(3.0).unwrap().get(), 3);
        assert_eq!(" 8 ".parse::<Capacity>().unwrap().get(), 8);
    }

    #[test]
    fn test_rejects_zero_and_negative() {
        rejects(0);
        rejects(0usize);
        rejects(-1);
        rejects(i64::MIN);
    }

    #[test]
    fn test_rejects_fractional_and_non_finite() {
        rejects(1.5);
        rejects(0.0);
        rejects(-2.0);
        rejects(f64::NAN);
        rejects(f64::INFINITY);
    }

    #[test]
    fn test_rejects_non_numeric() {
        rejects("abc");
        rejects("");
        rejects("2.5");
        rejects("-1");
        rejects("0");
    }
}
