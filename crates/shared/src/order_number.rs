//! 订单号校验
//!
//! 订单号由外部系统提供，仅包含数字。历史上同时存在两套校验规则
//! （Luhn 校验和、按长度的纯数字校验），两者的取舍属于产品决策，
//! 因此只暴露一个可配置的校验器，由 `order_number.policy` 决定具体规则，
//! 订单提交与提现两条路径共用同一个实例。

use serde::Deserialize;

/// 订单号校验策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderNumberPolicy {
    /// 纯数字且通过 Luhn 校验
    #[default]
    Luhn,
    /// 纯数字且长度在 [min, max] 区间内
    Digits { min: usize, max: usize },
}

/// 订单号校验器
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderNumberValidator {
    policy: OrderNumberPolicy,
}

impl OrderNumberValidator {
    pub fn new(policy: OrderNumberPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> OrderNumberPolicy {
        self.policy
    }

    pub fn is_valid(&self, number: &str) -> bool {
        match self.policy {
            OrderNumberPolicy::Luhn => is_digits(number) && luhn_checksum_ok(number),
            OrderNumberPolicy::Digits { min, max } => {
                is_digits(number) && (min..=max).contains(&number.len())
            }
        }
    }
}

fn is_digits(number: &str) -> bool {
    !number.is_empty() && number.bytes().all(|b| b.is_ascii_digit())
}

/// Luhn 校验：从右往左，偶数位乘 2（大于 9 则减 9），总和能被 10 整除
fn luhn_checksum_ok(number: &str) -> bool {
    let sum: u32 = number
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let digit = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                digit
            }
        })
        .sum();
    sum % 10 == 0
}
