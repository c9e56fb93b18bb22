use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// UUIDをラップしたID値オブジェクトを定義する
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn value(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

define_id!(
    /// 貸出ID - 貸出レコードの識別子
    LoanId
);

define_id!(
    /// 書籍ID - カタログ管理コンテキストへの参照
    BookId
);

define_id!(
    /// 会員ID - 会員管理コンテキストへの参照
    MemberId
);

define_id!(
    /// 職員ID - 貸出処理を行った職員への参照
    StaffId
);

/// 貸出ステータス
///
/// 常にいずれか1つだけが成立する。Returned と Lost は終端状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    /// 貸出中
    Active,
    /// 延滞中
    Overdue,
    /// 返却済み
    Returned,
    /// 紛失
    Lost,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Returned => "returned",
            LoanStatus::Lost => "lost",
        }
    }

    /// 未返却（貸出中または延滞中）か
    pub fn is_open(&self) -> bool {
        matches!(self, LoanStatus::Active | LoanStatus::Overdue)
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(LoanStatus::Active),
            "overdue" => Ok(LoanStatus::Overdue),
            "returned" => Ok(LoanStatus::Returned),
            "lost" => Ok(LoanStatus::Lost),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

/// 延長回数の上限
pub const MAX_RENEWALS: u8 = 3;

/// 延長回数エラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewalError {
    /// 延長回数の上限を超えた
    LimitExceeded,
}

/// 延長回数
///
/// 不変条件：延長は3回まで。
/// 型システムでこの制約を強制し、不正な値（4以上）を作成できないようにする。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct RenewalCount(u8);

impl RenewalCount {
    /// 新規作成（0回）
    pub fn new() -> Self {
        Self(0)
    }

    /// 延長回数を増やす
    ///
    /// # エラー
    /// 既に上限まで延長済みの場合は`RenewalError::LimitExceeded`を返す
    pub fn increment(self) -> Result<Self, RenewalError> {
        if !self.can_renew() {
            return Err(RenewalError::LimitExceeded);
        }
        Ok(Self(self.0 + 1))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn can_renew(&self) -> bool {
        self.0 < MAX_RENEWALS
    }
}

impl Default for RenewalCount {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<u8> for RenewalCount {
    type Error = RenewalError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > MAX_RENEWALS {
            return Err(RenewalError::LimitExceeded);
        }
        Ok(Self(value))
    }
}

impl From<RenewalCount> for u8 {
    fn from(count: RenewalCount) -> Self {
        count.0
    }
}

impl fmt::Display for RenewalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "renewal count exceeds {}", MAX_RENEWALS)
    }
}

/// 金額エラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// 負の金額
    Negative(Decimal),
    /// 小数点以下3桁以上の金額
    TooPrecise(Decimal),
}

impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoneyError::Negative(amount) => write!(f, "amount cannot be negative: {}", amount),
            MoneyError::TooPrecise(amount) => {
                write!(f, "amount has more than 2 decimal places: {}", amount)
            }
        }
    }
}

impl std::error::Error for MoneyError {}

/// 金額（延滞料金・支払額）
///
/// 不変条件：0以上、小数点以下2桁の固定小数点。
/// JSONでは "5.00" のような文字列として表現される。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// 小数点以下の桁数
    pub const SCALE: u32 = 2;

    pub fn zero() -> Self {
        Self::normalized(Decimal::ZERO)
    }

    /// 金額を作成する
    ///
    /// 端数は丸めない。
    ///
    /// # エラー
    /// - 負の金額は`MoneyError::Negative`
    /// - 1セント未満の端数があれば`MoneyError::TooPrecise`
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative(amount));
        }
        if amount.normalize().scale() > Self::SCALE {
            return Err(MoneyError::TooPrecise(amount));
        }
        Ok(Self::normalized(amount))
    }

    /// 整数単位の金額を作成する
    pub fn from_units(units: u32) -> Self {
        Self::normalized(Decimal::from(units))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// 日数などの回数を掛ける
    pub fn times(self, count: u32) -> Self {
        Self::normalized(self.0 * Decimal::from(count))
    }

    fn normalized(amount: Decimal) -> Self {
        let mut amount = amount.round_dp(Self::SCALE);
        amount.rescale(Self::SCALE);
        Self(amount)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money::normalized(self.0 + rhs.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
