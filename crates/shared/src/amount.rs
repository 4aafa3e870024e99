//! 金额（积分）定点数类型
//!
//! 所有金额、积分、价格统一以"分"（百分之一）为单位存储为 `i64`，
//! 避免浮点误差在余额累加中漂移。JSON 线上格式仍为数字（如 `10.5`），
//! 数据库以 BIGINT 存储最小单位。

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 两位小数的定点金额
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, sqlx::Type)]
#[sqlx(transparent)]
pub struct Amount(i64);

impl Amount {
    /// 每个单位包含的最小单位数
    pub const SCALE: i64 = 100;

    pub const ZERO: Amount = Amount(0);

    /// 由最小单位（分）构造
    pub const fn from_minor(minor: i64) -> Self {
        Amount(minor)
    }

    /// 由整数单位构造，`Amount::from_units(10)` 即 `10.00`
    pub const fn from_units(units: i64) -> Self {
        Amount(units * Self::SCALE)
    }

    /// 由浮点数构造，四舍五入到分（远离零方向）
    ///
    /// 仅用于线上 JSON 解码边界，内部计算一律使用整数。
    /// 非有限值或超出 i64 可表示范围时返回 `None`，不做饱和截断。
    pub fn from_f64(value: f64) -> Option<Self> {
        let scaled = (value * Self::SCALE as f64).round();
        // i64::MAX as f64 向上取整为 2^63，需严格小于
        if !scaled.is_finite() || scaled >= i64::MAX as f64 || scaled < i64::MIN as f64 {
            return None;
        }
        Some(Amount(scaled as i64))
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// 加法，溢出返回 `None`
    pub const fn checked_add(self, rhs: Amount) -> Option<Amount> {
        match self.0.checked_add(rhs.0) {
            Some(v) => Some(Amount(v)),
            None => None,
        }
    }

    /// 计算 `self × percent / 100`，结果保留两位小数，四舍五入（远离零）
    ///
    /// `percent` 同样是两位小数的定点数，因此 `7.5%` 可精确表示。
    /// 中间结果使用 i128 整数运算，不经过浮点；结果超出 i64 时返回 `None`。
    pub fn percent_of(self, percent: Amount) -> Option<Amount> {
        // self.0 与 percent.0 均带 SCALE，再除以 100（百分比），共需除以 SCALE * 100
        let numerator = i128::from(self.0) * i128::from(percent.0);
        let denominator = i128::from(Self::SCALE * 100);
        i64::try_from(div_round_half_away(numerator, denominator))
            .ok()
            .map(Amount)
    }

    /// 求和，任一步溢出返回 `None`
    pub fn checked_sum<I: IntoIterator<Item = Amount>>(iter: I) -> Option<Amount> {
        iter.into_iter()
            .try_fold(Amount::ZERO, |acc, amount| acc.checked_add(amount))
    }
}

/// 整数除法，四舍五入（0.5 远离零）
fn div_round_half_away(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder.abs() * 2 >= denominator.abs() {
        if (numerator < 0) != (denominator < 0) {
            quotient - 1
        } else {
            quotient + 1
        }
    } else {
        quotient
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = Self::SCALE as u64;
        write!(f, "{sign}{}.{:02}", abs / scale, abs % scale)
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Amount(self.0 - rhs.0)
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Amount::from_f64(value).ok_or_else(|| serde::de::Error::custom("金额超出可表示范围"))
    }
}
